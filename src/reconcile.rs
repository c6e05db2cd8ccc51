/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::reconcile
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Diff a freshly scanned catalog against the persisted one,
    producing add/update/remove sets and the outdated flags
    orphaned by version changes.

  Security / Safety Notes:
    Pure computation; no I/O performed in this module.

  Dependencies:
    None beyond std.

  Operational Scope:
    Runs after every catalog scan has settled; its delta is
    committed by the persistence gateway in one transaction.

  Revision History:
    2026-09-14 COD  Authored catalog reconciler.
    2026-10-02 COD  Checksum-inclusive update classification.
    2026-10-19 COD  Scope limits pairing and removal only.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Identity carried across scans, never reinvented
    - Every record lands in exactly one outcome set
============================================================*/

use std::collections::HashMap;

use crate::package::{Flag, Package};

/// Outcome of reconciling two catalogs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogDelta {
    /// New records without persisted identity.
    pub add: Vec<Package>,
    /// Records carrying an existing identity whose content changed.
    pub update: Vec<Package>,
    /// Persisted records absent from the new scan.
    pub remove: Vec<Package>,
    /// Flags whose package version no longer exists.
    pub orphaned_flags: Vec<Flag>,
    /// Number of new records identical to their persisted counterpart.
    pub unchanged: usize,
}

impl CatalogDelta {
    /// True when committing the delta would not touch the store.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty()
            && self.update.is_empty()
            && self.remove.is_empty()
            && self.orphaned_flags.is_empty()
    }
}

/// Persisted repositories a scan speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogScope {
    /// Every persisted repository except the listed ones (failed scans).
    AllExcept(Vec<String>),
    /// Only the listed repositories.
    Only(Vec<String>),
}

impl CatalogScope {
    pub fn covers(&self, repository: &str) -> bool {
        match self {
            CatalogScope::AllExcept(skipped) => !skipped.iter().any(|r| r == repository),
            CatalogScope::Only(listed) => listed.iter().any(|r| r == repository),
        }
    }
}

impl Default for CatalogScope {
    fn default() -> Self {
        CatalogScope::AllExcept(Vec::new())
    }
}

/// Compute the delta that turns `old` into `new`.
///
/// New records are paired with persisted ones by `(repository, name)`,
/// preferring an exact version match. A paired record inherits the persisted
/// identity and git metadata; it inherits the flag only when the version is
/// unchanged, otherwise the flag is orphaned. Records still lacking git
/// metadata adopt it from another repository variant of the same name.
///
/// Only persisted records inside `scope` are paired or removed; git metadata
/// is adopted from the whole of `old`.
pub fn reconcile(old: &[Package], new: Vec<Package>, scope: &CatalogScope) -> CatalogDelta {
    let mut delta = CatalogDelta::default();
    if old.is_empty() {
        delta.add = new;
        return delta;
    }

    let mut by_group: HashMap<(&str, &str), Vec<usize>> = HashMap::new();
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, pkg) in old.iter().enumerate() {
        by_name.entry(pkg.name.as_str()).or_default().push(idx);
        if scope.covers(&pkg.repository) {
            by_group
                .entry((pkg.repository.as_str(), pkg.name.as_str()))
                .or_default()
                .push(idx);
        }
    }
    let mut matched = vec![false; old.len()];

    for mut np in new {
        let candidate = by_group
            .get(&(np.repository.as_str(), np.name.as_str()))
            .and_then(|idxs| {
                idxs.iter()
                    .copied()
                    .find(|&i| !matched[i] && old[i].version == np.version)
                    .or_else(|| idxs.iter().copied().find(|&i| !matched[i]))
            });

        let previous = candidate.map(|i| {
            matched[i] = true;
            &old[i]
        });

        if let Some(op) = previous {
            np.id = op.id;
            np.git = op.git.clone();
            if np.version == op.version {
                np.flag = op.flag.clone();
            } else {
                np.flag = None;
                if let Some(flag) = &op.flag {
                    delta.orphaned_flags.push(flag.clone());
                }
            }
        }

        if np.git.is_none() {
            np.git = by_name.get(np.name.as_str()).and_then(|idxs| {
                idxs.iter()
                    .map(|&i| &old[i])
                    .filter(|p| p.repository != np.repository)
                    .find_map(|p| p.git.clone())
            });
        }

        match previous {
            None => delta.add.push(np),
            Some(op) if is_unchanged(op, &np) => delta.unchanged += 1,
            Some(_) => delta.update.push(np),
        }
    }

    for (idx, pkg) in old.iter().enumerate() {
        if matched[idx] || !scope.covers(&pkg.repository) {
            continue;
        }
        if let Some(flag) = &pkg.flag {
            delta.orphaned_flags.push(flag.clone());
        }
        delta.remove.push(pkg.clone());
    }

    delta
}

fn is_unchanged(old: &Package, new: &Package) -> bool {
    old.version == new.version
        && old.md5sum == new.md5sum
        && old.sha256sum == new.sha256sum
        && old.git == new.git
}
