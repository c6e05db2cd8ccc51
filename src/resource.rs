/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::resource
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Open a resource named either by a local path or by an
    http(s) URL and hand back its raw bytes.

  Security / Safety Notes:
    Performs read-only GET requests and file reads; nothing is
    written or executed.

  Dependencies:
    reqwest for HTTP, tokio::fs for local reads.

  Operational Scope:
    Backs repository-list, mirror-list and catalog archive
    loading so callers treat every source as a byte stream.

  Revision History:
    2026-09-14 COD  Authored generic resource opener.
============================================================*/

use std::path::Path;

use crate::error::{Result, SynrepoError};

/// True when `uri` must be fetched over HTTP.
pub fn is_url(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

/// Join path segments onto a base that may be a URL or a directory.
pub fn join(base: &str, segments: &[&str]) -> String {
    let mut joined = base.trim_end_matches('/').to_string();
    for segment in segments {
        joined.push('/');
        joined.push_str(segment.trim_matches('/'));
    }
    joined
}

/// Read the whole resource into memory.
pub async fn open_resource(client: &reqwest::Client, uri: &str) -> Result<Vec<u8>> {
    if is_url(uri) {
        let response = client
            .get(uri)
            .send()
            .await
            .map_err(|err| SynrepoError::Network(format!("GET {uri} failed: {err}")))?;
        if !response.status().is_success() {
            return Err(SynrepoError::Network(format!(
                "GET {uri} answered {}",
                response.status()
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| SynrepoError::Network(format!("Reading {uri} failed: {err}")))?;
        Ok(body.to_vec())
    } else {
        tokio::fs::read(Path::new(uri)).await.map_err(|err| {
            SynrepoError::Filesystem(format!("Failed to read {uri}: {err}"))
        })
    }
}

/// Read a resource that must be UTF-8 text.
pub async fn open_text(client: &reqwest::Client, uri: &str) -> Result<String> {
    let bytes = open_resource(client, uri).await?;
    String::from_utf8(bytes)
        .map_err(|err| SynrepoError::Serialization(format!("{uri} is not UTF-8: {err}")))
}
