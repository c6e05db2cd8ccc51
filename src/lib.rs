/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Library surface of Syn-Repo Core: mirror topology checks,
    repository catalog scanning, reconciliation and storage.

  Operational Scope:
    Consumed by the `synrepo` binary and by integration tests.

  Revision History:
    2026-09-14 COD  Split runtime into library and binary.
============================================================*/

pub mod catalog;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod git;
pub mod logger;
pub mod mirror;
pub mod package;
pub mod reconcile;
pub mod resource;
pub mod scanner;
pub mod store;
pub mod topology;
pub mod transport;
pub mod update;

pub use config::SynrepoConfig;
pub use error::{Result, SynrepoError};
pub use logger::Logger;
pub use update::{UpdateContext, UpdateSummary};
