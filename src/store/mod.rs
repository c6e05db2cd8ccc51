/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::store
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Persistence contract for the mirror topology and the package
    catalog, plus the two stores implementing it.

  Security / Safety Notes:
    Every write path is transactional: a failed commit leaves
    the previously persisted state untouched.

  Dependencies:
    rusqlite (sqlite store), serde_json for list columns.

  Operational Scope:
    Owned by the update context; callers hold it exclusively
    for the duration of one command.

  Revision History:
    2026-09-16 COD  Introduced gateway trait and stores.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Typed entities at the storage seam
    - All-or-nothing commits
============================================================*/

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::package::{Flag, GitMetadata, Package};
use crate::reconcile::CatalogDelta;
use crate::topology::Country;

/// Upper bound on records touched by one delete/update/insert statement group.
pub const BATCH_SIZE: usize = 100;

/// Work committed atomically by [`PersistenceGateway::commit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateBatch<'a> {
    /// Replacement mirror tree; the persisted tree is dropped first.
    pub countries: Option<&'a [Country]>,
    pub delta: Option<&'a CatalogDelta>,
}

/// Typed storage seam used by the update context and CLI commands.
pub trait PersistenceGateway: Send {
    /// Every persisted package with its flag and git metadata attached.
    fn load_catalog(&self) -> Result<Vec<Package>>;

    /// Persisted mirror tree in stored order. Fingerprints are not persisted.
    fn load_topology(&self) -> Result<Vec<Country>>;

    /// Apply a topology replacement and/or catalog delta in one transaction.
    fn commit(&mut self, batch: UpdateBatch<'_>) -> Result<()>;

    fn replace_topology(&mut self, countries: &[Country]) -> Result<()> {
        self.commit(UpdateBatch {
            countries: Some(countries),
            delta: None,
        })
    }

    fn apply_catalog_delta(&mut self, delta: &CatalogDelta) -> Result<()> {
        self.commit(UpdateBatch {
            countries: None,
            delta: Some(delta),
        })
    }

    /// Attach `flag` to the package version it names. A version that is
    /// already flagged keeps its existing flag, which is returned.
    fn create_flag(&mut self, flag: Flag) -> Result<Flag>;

    /// Detach and delete flags; returns how many existed.
    fn delete_flags(&mut self, ids: &[i64]) -> Result<usize>;

    /// Upsert git metadata by package name and link every package of that
    /// name to it. Returns the stored metadata and the number of linked packages.
    fn attach_git(&mut self, git: GitMetadata) -> Result<(GitMetadata, usize)>;

    fn find_package(&self, repository: &str, name: &str) -> Result<Option<Package>>;
}
