/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::package
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Catalog entities: package records, outdated flags and the
    git metadata shared by repository variants of a package.

  Security / Safety Notes:
    Pure data containers; no I/O performed in this module.

  Dependencies:
    chrono for build dates and flag stamps.

  Revision History:
    2026-09-14 COD  Introduced catalog entity types.
============================================================*/

use chrono::{DateTime, TimeZone, Utc};

/// Business key `(repository, name, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageKey {
    pub repository: String,
    pub name: String,
    pub version: String,
}

/// "Outdated" marker submitted against one package version.
#[derive(Debug, Clone, PartialEq)]
pub struct Flag {
    pub id: Option<i64>,
    pub repository: String,
    pub name: String,
    pub version: String,
    pub email: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Flag {
    pub fn new(
        repository: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        email: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            repository: repository.into(),
            name: name.into(),
            version: version.into(),
            email: email.into(),
            comment: comment.into(),
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> PackageKey {
        PackageKey {
            repository: self.repository.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

/// Upstream source location, keyed by package name only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitMetadata {
    pub id: Option<i64>,
    pub name: String,
    pub repository: String,
    pub folder: String,
}

/// One binary package as listed in a repository archive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Package {
    /// Persisted identity; `None` for freshly scanned records.
    pub id: Option<i64>,
    pub repository: String,
    pub name: String,
    pub version: String,
    pub arch: String,
    pub description: String,
    /// Compressed (download) size in bytes.
    pub package_size: i64,
    pub installed_size: i64,
    pub url: String,
    pub licenses: Vec<String>,
    pub groups: Vec<String>,
    pub build_date: Option<DateTime<Utc>>,
    pub depends: Vec<String>,
    pub make_depends: Vec<String>,
    pub opt_depends: Vec<String>,
    pub files: Vec<String>,
    pub md5sum: String,
    pub sha256sum: String,
    pub filename: String,
    pub flag: Option<Flag>,
    pub git: Option<GitMetadata>,
}

impl Package {
    pub fn key(&self) -> PackageKey {
        PackageKey {
            repository: self.repository.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }

    /// `repository/name`, the grouping used to pair versions across scans.
    pub fn repo_name(&self) -> String {
        format!("{}/{}", self.repository, self.name)
    }

    /// `repository/name-version`.
    pub fn full_name(&self) -> String {
        format!("{}/{}-{}", self.repository, self.name, self.version)
    }

    pub fn flag_id(&self) -> Option<i64> {
        self.flag.as_ref().and_then(|f| f.id)
    }

    pub fn git_id(&self) -> Option<i64> {
        self.git.as_ref().and_then(|g| g.id)
    }
}

/// Convert unix seconds to a UTC timestamp; out-of-range input yields `None`.
pub fn date_from_unix(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}
