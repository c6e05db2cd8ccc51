/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::fingerprint
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Fixed-size content digest used to compare two mirrors'
    copies of one repository index.

  Dependencies:
    sha2 for SHA-256.

  Revision History:
    2026-09-14 COD  Introduced Fingerprint type.
============================================================*/

use std::fmt;

use sha2::{Digest, Sha256};

/// SHA-256 digest of a downloaded repository index.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Digest the raw bytes of an index download.
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}
