/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::transport
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Network seam of the mirror pipeline: a liveness probe and
    a whole-object index download, both failure-absorbing.

  Security / Safety Notes:
    Performs read-only HEAD/GET requests to public mirrors.
    No credentials are transmitted.

  Dependencies:
    reqwest for HTTP, async-trait for the object-safe seam.

  Operational Scope:
    HttpTransport serves production runs; tests substitute
    in-memory transports through the same trait.

  Revision History:
    2026-09-14 COD  Implemented HTTP mirror transport.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Bounded timeouts on every outbound request
    - Failures degrade to negative results, never panics
============================================================*/

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::MirrorConfig;
use crate::error::{Result, SynrepoError};
use crate::resource::is_url;

/// Outbound operations the mirror pipeline needs.
#[async_trait]
pub trait MirrorTransport: Send + Sync {
    /// True iff the mirror answered a HEAD request with a 2xx status.
    async fn probe(&self, url: &str) -> bool;

    /// Whole index object, or `None` on any transport or status failure.
    async fn fetch_index(&self, url: &str) -> Option<Vec<u8>>;
}

/// reqwest-backed transport. Local paths are accepted as mirrors too.
#[derive(Clone)]
pub struct HttpTransport {
    probe_client: reqwest::Client,
    fetch_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &MirrorConfig) -> Result<Self> {
        let probe_client = build_client(config, config.probe_timeout)?;
        let fetch_client = build_client(config, config.fetch_timeout)?;
        Ok(Self {
            probe_client,
            fetch_client,
        })
    }

    /// Client used for non-mirror resources (lists, catalog archives).
    pub fn client(&self) -> &reqwest::Client {
        &self.fetch_client
    }
}

fn build_client(config: &MirrorConfig, timeout: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|err| SynrepoError::Network(format!("Failed to build HTTP client: {err}")))
}

#[async_trait]
impl MirrorTransport for HttpTransport {
    async fn probe(&self, url: &str) -> bool {
        if !is_url(url) {
            return Path::new(url).exists();
        }
        match self.probe_client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn fetch_index(&self, url: &str) -> Option<Vec<u8>> {
        if !is_url(url) {
            return tokio::fs::read(url).await.ok();
        }
        let response = self.fetch_client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.bytes().await.ok().map(|body| body.to_vec())
    }
}
