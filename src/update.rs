/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::update
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Explicit context tying configuration, transport, logger and
    store together for the update, flag and git commands.

  Security / Safety Notes:
    Nothing is persisted until every pipeline of a run has
    succeeded; dry runs never write.

  Dependencies:
    tokio for joining the pipelines; serde for the summary.

  Operational Scope:
    Constructed once per CLI invocation by `main`; integration
    tests drive it with local fixtures.

  Revision History:
    2026-09-18 COD  Authored update context.
    2026-10-02 COD  Scoped reconciliation to scanned repos.
    2026-10-19 COD  Unrestricted runs reconcile every stored repo.
  ------------------------------------------------------------
  SSE Principles Observed:
    - No process-wide state
    - Summaries reflect exactly what was committed
============================================================*/

use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{CatalogPipeline, CatalogSnapshot};
use crate::config::SynrepoConfig;
use crate::error::{Result, SynrepoError};
use crate::git::resolve_git;
use crate::logger::Logger;
use crate::mirror::MirrorPipeline;
use crate::package::{Flag, GitMetadata};
use crate::reconcile::{reconcile, CatalogDelta, CatalogScope};
use crate::store::{PersistenceGateway, UpdateBatch};
use crate::topology::{load_topology, Topology};
use crate::transport::MirrorTransport;

/// Counts reported after an update command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirrors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online_mirrors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages_added: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages_updated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages_removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags_removed: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_repositories: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

impl UpdateSummary {
    fn record_topology(&mut self, topology: &Topology) {
        self.countries = Some(topology.countries.len());
        self.mirrors = Some(topology.mirror_count());
        self.online_mirrors = Some(topology.online_count());
    }

    fn record_catalog(&mut self, snapshot: &CatalogSnapshot, delta: &CatalogDelta) {
        self.packages_added = Some(delta.add.len());
        self.packages_updated = Some(delta.update.len());
        self.packages_removed = Some(delta.remove.len());
        self.flags_removed = Some(delta.orphaned_flags.len());
        self.failed_repositories = snapshot.failed.clone();
    }
}

/// Everything one command needs, passed explicitly.
pub struct UpdateContext<S: PersistenceGateway> {
    config: SynrepoConfig,
    transport: Arc<dyn MirrorTransport>,
    client: reqwest::Client,
    logger: Arc<Logger>,
    store: S,
    dry_run: bool,
}

impl<S: PersistenceGateway> UpdateContext<S> {
    pub fn new(
        config: SynrepoConfig,
        transport: Arc<dyn MirrorTransport>,
        client: reqwest::Client,
        logger: Arc<Logger>,
        store: S,
    ) -> Self {
        Self {
            config,
            transport,
            client,
            logger,
            store,
            dry_run: false,
        }
    }

    /// Compute everything but skip every write.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    async fn evaluate_mirrors(&self) -> Result<Topology> {
        let topology = load_topology(&self.client, &self.config.mirror, &self.logger).await?;
        self.logger.info(
            "TOPOLOGY",
            format!(
                "{} repositories across {} mirror(s) in {} countries",
                topology.repositories.len(),
                topology.mirror_count(),
                topology.countries.len()
            ),
        );
        MirrorPipeline::new(self.transport.clone(), self.logger.clone(), &self.config.mirror)
            .run(topology)
            .await
    }

    async fn scan_catalog(&self, requested: &[String]) -> Result<(CatalogSnapshot, CatalogDelta)> {
        let pipeline = CatalogPipeline::new(self.client.clone(), self.logger.clone(), &self.config.catalog);
        let repositories = pipeline.select_repositories(requested).await?;
        if repositories.is_empty() {
            self.logger.warn("CATALOG", "No repositories selected for scanning");
        }
        let mut snapshot = pipeline.run(&repositories).await?;

        // An explicit request speaks only for the repositories it scanned.
        let scope = if requested.is_empty() {
            CatalogScope::AllExcept(snapshot.failed.clone())
        } else {
            CatalogScope::Only(snapshot.repositories.clone())
        };
        let old = self.store.load_catalog()?;
        let scanned = std::mem::take(&mut snapshot.packages);
        let delta = reconcile(&old, scanned, &scope);
        self.logger.info(
            "RECONCILE",
            format!(
                "add={} update={} remove={} unchanged={} flags_removed={}",
                delta.add.len(),
                delta.update.len(),
                delta.remove.len(),
                delta.unchanged,
                delta.orphaned_flags.len()
            ),
        );
        Ok((snapshot, delta))
    }

    /// Rebuild and persist the mirror tree.
    pub async fn update_mirrors(&mut self) -> Result<UpdateSummary> {
        let topology = self.evaluate_mirrors().await?;
        if !self.dry_run {
            self.store.replace_topology(&topology.countries)?;
        }

        let mut summary = self.summary();
        summary.record_topology(&topology);
        Ok(summary)
    }

    /// Rescan the selected repositories and persist the catalog delta.
    pub async fn update_catalog(&mut self, requested: &[String]) -> Result<UpdateSummary> {
        let (snapshot, delta) = self.scan_catalog(requested).await?;
        if !self.dry_run && !delta.is_empty() {
            self.store.apply_catalog_delta(&delta)?;
        }

        let mut summary = self.summary();
        summary.record_catalog(&snapshot, &delta);
        Ok(summary)
    }

    /// Run both pipelines concurrently and commit their results together.
    pub async fn update_all(&mut self) -> Result<UpdateSummary> {
        let (topology, catalog) = tokio::join!(self.evaluate_mirrors(), self.scan_catalog(&[]));
        let topology = topology?;
        let (snapshot, delta) = catalog?;

        if !self.dry_run {
            self.store.commit(UpdateBatch {
                countries: Some(&topology.countries),
                delta: Some(&delta),
            })?;
        }

        let mut summary = self.summary();
        summary.record_topology(&topology);
        summary.record_catalog(&snapshot, &delta);
        Ok(summary)
    }

    /// Flag a package version as outdated.
    pub fn add_flag(&mut self, flag: Flag) -> Result<Flag> {
        let created = self.store.create_flag(flag)?;
        self.logger.info(
            "FLAG",
            format!(
                "{}/{}-{} flagged as outdated (flag #{})",
                created.repository,
                created.name,
                created.version,
                created.id.unwrap_or_default()
            ),
        );
        Ok(created)
    }

    pub fn remove_flags(&mut self, ids: &[i64]) -> Result<usize> {
        let removed = self.store.delete_flags(ids)?;
        if removed < ids.len() {
            self.logger.warn(
                "FLAG",
                format!("{} of {} flag id(s) did not exist", ids.len() - removed, ids.len()),
            );
        }
        Ok(removed)
    }

    /// Read git metadata from the package file and link it to every package
    /// sharing the name. Returns the stored metadata and linked package count.
    pub async fn resolve_git(&mut self, repository: &str, name: &str) -> Result<(GitMetadata, usize)> {
        let package = self
            .store
            .find_package(repository, name)?
            .ok_or_else(|| SynrepoError::NotFound(format!("{repository}/{name}")))?;
        let git = resolve_git(&self.client, &self.config.catalog, &package)
            .await?
            .ok_or_else(|| {
                SynrepoError::NotFound(format!("{} declares no git repository", package.full_name()))
            })?;
        let (git, linked) = self.store.attach_git(git)?;
        self.logger.info(
            "GIT",
            format!("{name} -> {} ({linked} package(s))", git.repository),
        );
        Ok((git, linked))
    }

    fn summary(&self) -> UpdateSummary {
        UpdateSummary {
            dry_run: self.dry_run,
            ..UpdateSummary::default()
        }
    }
}
