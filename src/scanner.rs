/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::scanner
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Decode one repository's package-index archive into package
    records, joining each `desc` sub-record with the `files`
    sub-record of the same package directory.

  Security / Safety Notes:
    Archive entries are read into memory only; nothing is
    extracted to disk and entry paths are never trusted as
    filesystem locations.

  Dependencies:
    tar for entry iteration; flate2, zstd and xz2 for the
    compression layers pacman repositories ship.

  Operational Scope:
    Runs on the blocking pool, once per repository, under the
    catalog pipeline's scan permits.

  Revision History:
    2026-09-14 COD  Authored archive record scanner.
    2026-10-02 COD  Order-independent desc/files join.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Structured parsing with clear failure modes
    - Deterministic output ordering
============================================================*/

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use flate2::read::GzDecoder;
use tar::Archive;
use xz2::read::XzDecoder;

use crate::error::{Result, SynrepoError};
use crate::package::{date_from_unix, Package};

const DESC_ENTRY: &str = "desc";
const FILES_ENTRY: &str = "files";
const FILES_SECTION: &str = "FILES";

/// Compression layer wrapping the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zstd,
    Xz,
    Plain,
}

impl Compression {
    /// Pick the decoder from an archive name or extension.
    pub fn detect(name: &str) -> Result<Self> {
        if name.ends_with(".gz") || name.ends_with(".tgz") {
            Ok(Compression::Gzip)
        } else if name.ends_with(".zst") {
            Ok(Compression::Zstd)
        } else if name.ends_with(".xz") {
            Ok(Compression::Xz)
        } else if name.ends_with(".tar") {
            Ok(Compression::Plain)
        } else {
            Err(SynrepoError::Archive(format!(
                "Unsupported compression format for {name}"
            )))
        }
    }
}

pub(crate) fn decoder<'a>(bytes: &'a [u8], compression: Compression) -> Result<Box<dyn Read + 'a>> {
    let reader: Box<dyn Read + 'a> = match compression {
        Compression::Gzip => Box::new(GzDecoder::new(bytes)),
        Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(bytes).map_err(|err| {
            SynrepoError::Archive(format!("Failed to create zstd decoder: {err}"))
        })?),
        Compression::Xz => Box::new(XzDecoder::new(bytes)),
        Compression::Plain => Box::new(bytes),
    };
    Ok(reader)
}

/// Decode an archive into packages of `repository`, sorted by entry directory.
pub fn scan_archive(bytes: &[u8], compression: Compression, repository: &str) -> Result<Vec<Package>> {
    let mut archive = Archive::new(decoder(bytes, compression)?);
    let mut descs: BTreeMap<String, Package> = BTreeMap::new();
    let mut files: HashMap<String, Vec<String>> = HashMap::new();

    let entries = archive
        .entries()
        .map_err(|err| SynrepoError::Archive(format!("Failed to read archive entries: {err}")))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|err| SynrepoError::Archive(format!("Failed to read archive entry: {err}")))?;
        if entry.header().entry_type().is_dir() {
            continue;
        }

        let path = entry
            .path()
            .map_err(|err| SynrepoError::Archive(format!("Invalid entry path: {err}")))?
            .to_string_lossy()
            .into_owned();
        let Some((dir, kind)) = path.trim_end_matches('/').rsplit_once('/') else {
            continue;
        };
        if kind != DESC_ENTRY && kind != FILES_ENTRY {
            continue;
        }
        let dir = dir.rsplit('/').next().unwrap_or(dir).to_string();

        let mut raw = Vec::new();
        entry
            .read_to_end(&mut raw)
            .map_err(|err| SynrepoError::Archive(format!("Failed to read {path}: {err}")))?;
        let text = String::from_utf8_lossy(&raw);

        if kind == DESC_ENTRY {
            let mut package = parse_desc(&text);
            if package.name.is_empty() {
                package.name = dir.clone();
            }
            package.repository = repository.to_string();
            descs.insert(dir, package);
        } else {
            files.insert(dir, parse_files(&text));
        }
    }

    Ok(descs
        .into_iter()
        .map(|(dir, mut package)| {
            if let Some(list) = files.remove(&dir) {
                package.files = list;
            }
            package
        })
        .collect())
}

/// Walk `%SECTION%` blocks, yielding `(section, value)` for every value line.
fn section_values(text: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut section = "";
    text.lines().filter_map(move |line| {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line.len() >= 2 && line.starts_with('%') && line.ends_with('%') {
            section = &line[1..line.len() - 1];
            return None;
        }
        Some((section, line))
    })
}

/// Build a package record from a `desc` sub-record.
pub fn parse_desc(text: &str) -> Package {
    let mut package = Package::default();
    for (section, value) in section_values(text) {
        match section {
            "NAME" => package.name = value.to_string(),
            "VERSION" => package.version = value.to_string(),
            "ARCH" => package.arch = value.to_string(),
            "DESC" => package.description = value.to_string(),
            "CSIZE" => package.package_size = value.parse().unwrap_or(0),
            "ISIZE" => package.installed_size = value.parse().unwrap_or(0),
            "URL" => package.url = value.to_string(),
            "LICENSE" => package.licenses.push(value.to_string()),
            "GROUPS" => package.groups.push(value.to_string()),
            "BUILDDATE" => package.build_date = value.parse().ok().and_then(date_from_unix),
            "DEPENDS" => package.depends.push(value.to_string()),
            "MAKEDEPENDS" => package.make_depends.push(value.to_string()),
            "OPTDEPENDS" => package.opt_depends.push(value.to_string()),
            "MD5SUM" => package.md5sum = value.to_string(),
            "SHA256SUM" => package.sha256sum = value.to_string(),
            "FILENAME" => package.filename = value.to_string(),
            _ => {}
        }
    }
    package
}

/// Collect the `FILES` section of a `files` sub-record.
pub fn parse_files(text: &str) -> Vec<String> {
    section_values(text)
        .filter(|(section, _)| *section == FILES_SECTION)
        .map(|(_, value)| value.to_string())
        .collect()
}
