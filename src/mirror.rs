/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::mirror
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Probe every mirror, fingerprint every (mirror, repository)
    index with bounded concurrency and stamp each repo with a
    synced verdict relative to the reference mirror.

  Security / Safety Notes:
    Outbound fan-out is capped by a semaphore so third-party
    mirrors never see more than the configured number of
    simultaneous requests from one run.

  Dependencies:
    tokio for tasks and Semaphore, transport seam for I/O.

  Operational Scope:
    Invoked by the update context for `update-mirrors` and
    `update-all`; the evaluated tree replaces the stored one.

  Revision History:
    2026-09-14 COD  Authored mirror pipeline.
    2026-10-02 COD  Probe unlisted reference mirrors.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Failures absorbed per mirror and per repo
    - Single aggregator owns the fingerprint table
    - Evaluation only after every fetch has settled
============================================================*/

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::MirrorConfig;
use crate::error::{Result, SynrepoError};
use crate::fingerprint::Fingerprint;
use crate::logger::Logger;
use crate::topology::{index_url, same_mirror, Topology};
use crate::transport::MirrorTransport;

/// Repository name → fingerprint, for one mirror.
pub type RepoFingerprints = HashMap<String, Fingerprint>;
/// Mirror URL → its repository fingerprints.
pub type FingerprintTable = HashMap<String, RepoFingerprints>;

/// Orchestrates liveness probes, index fingerprinting and evaluation.
pub struct MirrorPipeline {
    transport: Arc<dyn MirrorTransport>,
    logger: Arc<Logger>,
    reference: String,
    max_parallel_requests: usize,
}

impl MirrorPipeline {
    pub fn new(
        transport: Arc<dyn MirrorTransport>,
        logger: Arc<Logger>,
        config: &MirrorConfig,
    ) -> Self {
        Self {
            transport,
            logger,
            reference: config.reference_mirror.clone(),
            max_parallel_requests: config.max_parallel_requests,
        }
    }

    /// Probe, fetch and evaluate an unevaluated topology.
    pub async fn run(&self, mut topology: Topology) -> Result<Topology> {
        let mut targets: Vec<String> = Vec::new();
        for mirror in topology.mirrors() {
            if !targets.contains(&mirror.url) {
                targets.push(mirror.url.clone());
            }
        }
        if topology.find_mirror(&self.reference).is_none() {
            self.logger.info(
                "REFERENCE",
                format!("Reference mirror {} is not listed; probing it separately", self.reference),
            );
            targets.push(self.reference.clone());
        }

        let online = self.probe_all(targets).await?;
        for mirror in topology.mirrors_mut() {
            mirror.online = online.contains(&mirror.url);
            if !mirror.online {
                self.logger.warn("OFFLINE", format!("Mirror {} is offline", mirror.url));
            }
        }

        let online_urls: Vec<String> = online.into_iter().collect();
        let table = self
            .fetch_all(&online_urls, &topology.repositories)
            .await?;

        let reference = table
            .iter()
            .find(|(url, _)| same_mirror(url, &self.reference))
            .map(|(_, prints)| prints.clone())
            .unwrap_or_default();
        if reference.is_empty() {
            self.logger.warn(
                "REFERENCE",
                format!(
                    "No fingerprints from reference mirror {}; every repo is unsynced",
                    self.reference
                ),
            );
        }

        evaluate_sync(&mut topology, &table, &reference);
        self.logger.info(
            "MIRRORS",
            format!(
                "countries={} mirrors={} online={}",
                topology.countries.len(),
                topology.mirror_count(),
                topology.online_count()
            ),
        );
        Ok(topology)
    }

    async fn probe_all(&self, targets: Vec<String>) -> Result<HashSet<String>> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel_requests));
        let mut tasks = Vec::with_capacity(targets.len());

        for url in targets {
            let transport = self.transport.clone();
            let semaphore = semaphore.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| SynrepoError::Runtime("Probe semaphore closed".into()))?;
                let alive = transport.probe(&url).await;
                Ok::<_, SynrepoError>((url, alive))
            }));
        }

        let mut online = HashSet::new();
        for task in tasks {
            let (url, alive) = task
                .await
                .map_err(|err| SynrepoError::Runtime(format!("Probe task failed: {err}")))??;
            if alive {
                online.insert(url);
            }
        }
        Ok(online)
    }

    async fn fetch_all(&self, mirrors: &[String], repositories: &[String]) -> Result<FingerprintTable> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel_requests));
        let mut tasks = Vec::with_capacity(mirrors.len() * repositories.len());

        for base in mirrors {
            for repo in repositories {
                let transport = self.transport.clone();
                let semaphore = semaphore.clone();
                let logger = self.logger.clone();
                let url = index_url(base, repo);
                let base = base.clone();
                let repo = repo.clone();
                tasks.push(tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| SynrepoError::Runtime("Fetch semaphore closed".into()))?;
                    logger.debug("FETCH", format!("Begin fingerprint of {url}"));
                    let print = transport
                        .fetch_index(&url)
                        .await
                        .map(|bytes| Fingerprint::of(&bytes));
                    match &print {
                        Some(fp) => logger.debug("FETCH", format!("{url} → {fp}")),
                        None => logger.debug("FETCH", format!("Failed to fingerprint {url}")),
                    }
                    Ok::<_, SynrepoError>((base, repo, print))
                }));
            }
        }

        let mut table = FingerprintTable::new();
        for task in tasks {
            let (base, repo, print) = task
                .await
                .map_err(|err| SynrepoError::Runtime(format!("Fetch task failed: {err}")))??;
            let entry = table.entry(base).or_default();
            if let Some(fp) = print {
                entry.insert(repo, fp);
            }
        }
        Ok(table)
    }
}

/// Stamp every repo: synced iff its mirror is online, its fingerprint is
/// present, and it equals the reference fingerprint for the same repository.
pub fn evaluate_sync(topology: &mut Topology, table: &FingerprintTable, reference: &RepoFingerprints) {
    for mirror in topology.mirrors_mut() {
        let prints = if mirror.online {
            table.get(&mirror.url)
        } else {
            None
        };
        for repo in &mut mirror.repos {
            repo.fingerprint = prints.and_then(|p| p.get(&repo.name)).copied();
            repo.synced = match (repo.fingerprint, reference.get(&repo.name)) {
                (Some(own), Some(truth)) => own == *truth,
                _ => false,
            };
        }
    }
}
