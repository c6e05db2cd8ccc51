/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::store::memory
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Volatile gateway used by dry runs and tests.

  Security / Safety Notes:
    Commits are staged on a copy and swapped in only when every
    step succeeded.

  Revision History:
    2026-09-16 COD  Authored in-memory store.
============================================================*/

use std::collections::BTreeMap;

use super::{PersistenceGateway, UpdateBatch};
use crate::error::{Result, SynrepoError};
use crate::package::{Flag, GitMetadata, Package};
use crate::reconcile::CatalogDelta;
use crate::topology::Country;

#[derive(Debug, Clone, Default)]
struct State {
    countries: Vec<Country>,
    packages: BTreeMap<i64, Package>,
    flags: BTreeMap<i64, Flag>,
    git: BTreeMap<i64, GitMetadata>,
    next_id: i64,
}

impl State {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn apply(&mut self, delta: &CatalogDelta) -> Result<()> {
        for flag in &delta.orphaned_flags {
            if let Some(id) = flag.id {
                self.remove_flag(id);
            }
        }
        for pkg in &delta.remove {
            if let Some(id) = pkg.id {
                self.packages.remove(&id);
            }
        }
        for pkg in &delta.update {
            let id = pkg
                .id
                .ok_or_else(|| SynrepoError::Store(format!("{} has no identity", pkg.full_name())))?;
            let slot = self
                .packages
                .get_mut(&id)
                .ok_or_else(|| SynrepoError::Store(format!("Unknown package id {id}")))?;
            *slot = pkg.clone();
        }
        for pkg in &delta.add {
            let id = self.allocate();
            let mut pkg = pkg.clone();
            pkg.id = Some(id);
            self.packages.insert(id, pkg);
        }
        Ok(())
    }

    fn remove_flag(&mut self, id: i64) -> bool {
        for pkg in self.packages.values_mut() {
            if pkg.flag_id() == Some(id) {
                pkg.flag = None;
            }
        }
        self.flags.remove(&id).is_some()
    }
}

/// Gateway holding everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: State,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceGateway for MemoryStore {
    fn load_catalog(&self) -> Result<Vec<Package>> {
        Ok(self.state.packages.values().cloned().collect())
    }

    fn load_topology(&self) -> Result<Vec<Country>> {
        let mut countries = self.state.countries.clone();
        for mirror in countries.iter_mut().flat_map(|c| c.mirrors.iter_mut()) {
            for repo in &mut mirror.repos {
                repo.fingerprint = None;
            }
        }
        Ok(countries)
    }

    fn commit(&mut self, batch: UpdateBatch<'_>) -> Result<()> {
        let mut staged = self.state.clone();
        if let Some(countries) = batch.countries {
            staged.countries = countries.to_vec();
        }
        if let Some(delta) = batch.delta {
            staged.apply(delta)?;
        }
        self.state = staged;
        Ok(())
    }

    fn create_flag(&mut self, mut flag: Flag) -> Result<Flag> {
        let key = flag.key();
        let Some(id) = self
            .state
            .packages
            .iter()
            .find(|(_, p)| p.key() == key)
            .map(|(id, _)| *id)
        else {
            return Err(SynrepoError::NotFound(format!(
                "{}/{}-{}",
                key.repository, key.name, key.version
            )));
        };

        if let Some(existing) = self.state.packages.get(&id).and_then(|p| p.flag.clone()) {
            return Ok(existing);
        }
        let flag_id = self.state.allocate();
        flag.id = Some(flag_id);
        self.state.flags.insert(flag_id, flag.clone());
        if let Some(pkg) = self.state.packages.get_mut(&id) {
            pkg.flag = Some(flag.clone());
        }
        Ok(flag)
    }

    fn delete_flags(&mut self, ids: &[i64]) -> Result<usize> {
        Ok(ids.iter().filter(|id| self.state.remove_flag(**id)).count())
    }

    fn attach_git(&mut self, mut git: GitMetadata) -> Result<(GitMetadata, usize)> {
        let existing = self
            .state
            .git
            .iter()
            .find(|(_, g)| g.name == git.name)
            .map(|(id, _)| *id);
        let id = match existing {
            Some(id) => id,
            None => self.state.allocate(),
        };
        git.id = Some(id);
        self.state.git.insert(id, git.clone());

        let mut linked = 0;
        for pkg in self.state.packages.values_mut().filter(|p| p.name == git.name) {
            pkg.git = Some(git.clone());
            linked += 1;
        }
        Ok((git, linked))
    }

    fn find_package(&self, repository: &str, name: &str) -> Result<Option<Package>> {
        Ok(self
            .state
            .packages
            .values()
            .find(|p| p.repository == repository && p.name == name)
            .cloned())
    }
}
