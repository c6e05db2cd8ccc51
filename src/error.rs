/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-Repo-Core error types to provide consistent
    diagnostics and exit semantics.

  Security / Safety Notes:
    Error contexts only expose resource locations and counts;
    mail addresses attached to flags are never echoed.

  Dependencies:
    thiserror for ergonomic error definitions, rusqlite for
    store failures.

  Operational Scope:
    Used across modules to propagate fatal failures and to
    consolidate exit codes for the binary entry point.

  Revision History:
    2026-09-14 COD  Established shared error definitions.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for Syn-Repo-Core operations.
pub type Result<T> = std::result::Result<T, SynrepoError>;

/// Enumerates high-level error domains surfaced by Syn-Repo-Core.
#[derive(Debug, Error)]
pub enum SynrepoError {
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Archive: {0}")]
    Archive(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Store: {0}")]
    Store(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SynrepoError {
    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SynrepoError::Config(_) => ExitCode::from(20),
            SynrepoError::Network(_) => ExitCode::from(30),
            SynrepoError::Serialization(_) => ExitCode::from(31),
            SynrepoError::Archive(_) => ExitCode::from(32),
            SynrepoError::Filesystem(_) => ExitCode::from(40),
            SynrepoError::Io(_) => ExitCode::from(41),
            SynrepoError::Store(_) => ExitCode::from(60),
            SynrepoError::Database(_) => ExitCode::from(61),
            SynrepoError::NotFound(_) => ExitCode::from(64),
            SynrepoError::Runtime(_) => ExitCode::from(50),
        }
    }
}
