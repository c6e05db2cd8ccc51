/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::git
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Recover the upstream git location of a package from the
    `.PKGINFO` member of its binary package file.

  Security / Safety Notes:
    Only the `.PKGINFO` member is read; package payloads are
    streamed past and never written anywhere.

  Dependencies:
    tar plus the scanner's decoders; resource for byte access.

  Operational Scope:
    Used by `resolve-git`; the result is linked to every package
    of the same name through the persistence gateway.

  Revision History:
    2026-09-18 COD  Authored PKGINFO lookup.
============================================================*/

use std::io::Read;

use tar::Archive;

use crate::config::CatalogConfig;
use crate::error::{Result, SynrepoError};
use crate::package::{GitMetadata, Package};
use crate::resource::{join, open_resource};
use crate::scanner::{decoder, Compression};

const PKGINFO_ENTRY: &str = ".PKGINFO";
const GIT_REPO_KEY: &str = "gitrepo = ";
const GIT_FOLDER_KEY: &str = "gitfolder = ";

/// Extract git metadata for `name` from `.PKGINFO` text. Returns `None` when
/// the package declares no git repository.
pub fn parse_pkginfo(name: &str, text: &str) -> Option<GitMetadata> {
    let mut repository = String::new();
    let mut folder = String::new();
    for line in text.lines() {
        if let Some(value) = line.strip_prefix(GIT_REPO_KEY) {
            repository = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix(GIT_FOLDER_KEY) {
            folder = value.trim().to_string();
        }
    }
    if repository.is_empty() {
        return None;
    }
    Some(GitMetadata {
        id: None,
        name: name.to_string(),
        repository,
        folder,
    })
}

/// Return the `.PKGINFO` member of a package archive, if present.
pub fn read_pkginfo(bytes: &[u8], compression: Compression) -> Result<Option<String>> {
    let mut archive = Archive::new(decoder(bytes, compression)?);
    let entries = archive
        .entries()
        .map_err(|err| SynrepoError::Archive(format!("Failed to read package entries: {err}")))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|err| SynrepoError::Archive(format!("Failed to read package entry: {err}")))?;
        let is_pkginfo = entry
            .path()
            .map(|p| p.to_string_lossy().trim_start_matches("./") == PKGINFO_ENTRY)
            .unwrap_or(false);
        if !is_pkginfo {
            continue;
        }
        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|err| SynrepoError::Archive(format!("Failed to read {PKGINFO_ENTRY}: {err}")))?;
        return Ok(Some(text));
    }
    Ok(None)
}

/// Open `<base>/<repository>/<filename>` and look up its git metadata.
pub async fn resolve_git(
    client: &reqwest::Client,
    config: &CatalogConfig,
    package: &Package,
) -> Result<Option<GitMetadata>> {
    if package.filename.is_empty() {
        return Err(SynrepoError::NotFound(format!(
            "{} has no package file name",
            package.full_name()
        )));
    }
    let location = join(&config.base_dir, &[&package.repository, &package.filename]);
    let compression = Compression::detect(&package.filename)?;
    let bytes = open_resource(client, &location).await?;

    let info = tokio::task::spawn_blocking(move || read_pkginfo(&bytes, compression))
        .await
        .map_err(|err| SynrepoError::Runtime(format!("PKGINFO task failed: {err}")))??;
    Ok(info.and_then(|text| parse_pkginfo(&package.name, &text)))
}
