/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::catalog
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Select the repositories to scan, decode every repository
    archive concurrently and merge the results into a single
    catalog snapshot.

  Security / Safety Notes:
    Archive reads and decompressions are capped by a semaphore;
    decoding runs on the blocking pool so it never stalls the
    network workers.

  Dependencies:
    tokio for tasks, Semaphore and spawn_blocking; scanner for
    decoding; resource for byte access.

  Operational Scope:
    Invoked by the update context for `update-repos` and
    `update-all` ahead of reconciliation.

  Revision History:
    2026-09-14 COD  Authored catalog pipeline.
  ------------------------------------------------------------
  SSE Principles Observed:
    - One unreadable repository never aborts the others
    - Merge only after every scan has settled
============================================================*/

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::CatalogConfig;
use crate::error::{Result, SynrepoError};
use crate::logger::Logger;
use crate::package::Package;
use crate::resource::{is_url, join, open_resource};
use crate::scanner::{scan_archive, Compression};

/// Packages gathered from one catalog run.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// Repositories whose archive was decoded, sorted.
    pub repositories: Vec<String>,
    /// Repositories that could not be opened or decoded.
    pub failed: Vec<String>,
    pub packages: Vec<Package>,
}

/// Fans ArchiveRecordScanner out over repositories.
pub struct CatalogPipeline {
    client: reqwest::Client,
    logger: Arc<Logger>,
    config: CatalogConfig,
}

impl CatalogPipeline {
    pub fn new(client: reqwest::Client, logger: Arc<Logger>, config: &CatalogConfig) -> Self {
        Self {
            client,
            logger,
            config: config.clone(),
        }
    }

    /// Requested names, else configured names, else the subdirectories of a
    /// local base directory; excluded names are always dropped.
    pub async fn select_repositories(&self, requested: &[String]) -> Result<Vec<String>> {
        let mut repositories = if !requested.is_empty() {
            requested.to_vec()
        } else if !self.config.repositories.is_empty() {
            self.config.repositories.clone()
        } else {
            self.discover().await?
        };

        repositories.retain(|repo| !self.config.exclude.contains(repo));
        repositories.sort();
        repositories.dedup();
        Ok(repositories)
    }

    async fn discover(&self) -> Result<Vec<String>> {
        let base = &self.config.base_dir;
        if is_url(base) {
            return Err(SynrepoError::Config(format!(
                "catalog.repositories must be set when base_dir is remote ({base})"
            )));
        }
        let mut reader = tokio::fs::read_dir(base).await.map_err(|err| {
            SynrepoError::Filesystem(format!("Failed to list repositories in {base}: {err}"))
        })?;

        let mut found = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                found.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(found)
    }

    /// `<base>/<repo>/<repo>.<extension>`.
    pub fn archive_location(&self, repository: &str) -> String {
        let file = format!("{repository}.{}", self.config.extension);
        join(&self.config.base_dir, &[repository, &file])
    }

    /// Scan every repository and merge the partial catalogs.
    pub async fn run(&self, repositories: &[String]) -> Result<CatalogSnapshot> {
        let compression = Compression::detect(&self.config.extension)?;
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_scans));
        let mut tasks = Vec::with_capacity(repositories.len());

        for repository in repositories {
            let client = self.client.clone();
            let logger = self.logger.clone();
            let semaphore = semaphore.clone();
            let location = self.archive_location(repository);
            let repository = repository.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| SynrepoError::Runtime("Scan semaphore closed".into()))?;
                logger.debug("SCAN", format!("Extracting {location}"));
                let outcome = scan_repository(&client, &location, &repository, compression).await;
                if let Err(err) = &outcome {
                    logger.warn("SCAN", format!("Failed to load repo [{repository}]: {err}"));
                }
                Ok::<_, SynrepoError>((repository, outcome.ok()))
            }));
        }

        let mut snapshot = CatalogSnapshot::default();
        for task in tasks {
            let (repository, packages) = task
                .await
                .map_err(|err| SynrepoError::Runtime(format!("Scan task failed: {err}")))??;
            match packages {
                Some(packages) => {
                    self.logger.debug(
                        "SCAN",
                        format!("{repository}: {} package(s)", packages.len()),
                    );
                    snapshot.repositories.push(repository);
                    snapshot.packages.extend(packages);
                }
                None => snapshot.failed.push(repository),
            }
        }
        snapshot.repositories.sort();
        snapshot.failed.sort();

        self.logger.info(
            "CATALOG",
            format!(
                "repositories={} failed={} packages={}",
                snapshot.repositories.len(),
                snapshot.failed.len(),
                snapshot.packages.len()
            ),
        );
        Ok(snapshot)
    }
}

async fn scan_repository(
    client: &reqwest::Client,
    location: &str,
    repository: &str,
    compression: Compression,
) -> Result<Vec<Package>> {
    let bytes = open_resource(client, location).await?;
    let repository = repository.to_string();
    tokio::task::spawn_blocking(move || scan_archive(&bytes, compression, &repository))
        .await
        .map_err(|err| SynrepoError::Runtime(format!("Decode task failed: {err}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(config: CatalogConfig) -> CatalogPipeline {
        CatalogPipeline::new(reqwest::Client::new(), Arc::new(Logger::silent()), &config)
    }

    #[tokio::test]
    async fn discovery_lists_directories_minus_excludes() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["core", "main", "ISO", "build"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("README"), "not a repo").unwrap();

        let pipeline = pipeline(CatalogConfig {
            base_dir: dir.path().to_string_lossy().into_owned(),
            ..CatalogConfig::default()
        });
        let repos = pipeline.select_repositories(&[]).await.unwrap();
        assert_eq!(repos, vec!["build", "core", "main"]);
    }

    #[tokio::test]
    async fn requested_names_override_configuration() {
        let pipeline = pipeline(CatalogConfig {
            repositories: vec!["core".into(), "main".into()],
            exclude: vec!["main".into()],
            ..CatalogConfig::default()
        });
        let repos = pipeline
            .select_repositories(&["testing".to_string(), "core".to_string()])
            .await
            .unwrap();
        assert_eq!(repos, vec!["core", "testing"]);
        let repos = pipeline.select_repositories(&[]).await.unwrap();
        assert_eq!(repos, vec!["core"]);
    }

    #[tokio::test]
    async fn remote_base_requires_explicit_repositories() {
        let pipeline = pipeline(CatalogConfig {
            base_dir: "https://repo.example.org/".into(),
            repositories: Vec::new(),
            ..CatalogConfig::default()
        });
        let err = pipeline.select_repositories(&[]).await.unwrap_err();
        assert!(matches!(err, SynrepoError::Config(_)));
    }

    #[tokio::test]
    async fn unreadable_repository_degrades_to_failed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("core")).unwrap();
        std::fs::write(dir.path().join("core").join("core.files.tar.gz"), b"garbage").unwrap();

        let pipeline = pipeline(CatalogConfig {
            base_dir: dir.path().to_string_lossy().into_owned(),
            ..CatalogConfig::default()
        });
        let snapshot = pipeline
            .run(&["core".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert!(snapshot.packages.is_empty());
        assert!(snapshot.repositories.is_empty());
        assert_eq!(snapshot.failed, vec!["core", "missing"]);
    }

    #[test]
    fn archive_location_uses_extension() {
        let pipeline = pipeline(CatalogConfig {
            base_dir: "/srv/repo/".into(),
            ..CatalogConfig::default()
        });
        assert_eq!(pipeline.archive_location("core"), "/srv/repo/core/core.files.tar.gz");
    }
}
