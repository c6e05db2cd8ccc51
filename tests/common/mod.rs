// tests/common/mod.rs

//! Shared fixtures for integration tests: a temporary tree holding a
//! repository list, a mirrorlist, local-path mirrors and catalog archives.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::write::GzEncoder;
use synrepo_core::config::{CatalogConfig, MirrorConfig};
use synrepo_core::store::PersistenceGateway;
use synrepo_core::transport::HttpTransport;
use synrepo_core::{Logger, SynrepoConfig, UpdateContext};
use tempfile::TempDir;

pub const REPOSITORIES: [&str; 2] = ["core", "apps"];

/// Build an in-memory tar archive compressed with gzip.
pub fn gzip_tar(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    finish_tar(entries, encoder).finish().unwrap()
}

/// Build an in-memory tar archive compressed with xz.
pub fn xz_tar(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    finish_tar(entries, encoder).finish().unwrap()
}

fn finish_tar<W: std::io::Write>(entries: &[(String, Vec<u8>)], writer: W) -> W {
    let mut builder = tar::Builder::new(writer);
    for (path, body) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, body.as_slice()).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Package file name used in `desc` records.
pub fn package_file(name: &str, version: &str) -> String {
    format!("{name}-{version}-x86_64.pkg.tar.xz")
}

/// `desc` and `files` sub-records for one package.
pub fn package_entries(name: &str, version: &str) -> Vec<(String, Vec<u8>)> {
    let dir = format!("{name}-{version}");
    let desc = format!(
        "%FILENAME%\n{file}\n\n%NAME%\n{name}\n\n%VERSION%\n{version}\n\n%DESC%\n{name} test package\n\n%CSIZE%\n1024\n\n%ISIZE%\n4096\n\n%MD5SUM%\nmd5-{name}-{version}\n\n%SHA256SUM%\nsha-{name}-{version}\n\n%ARCH%\nx86_64\n\n%BUILDDATE%\n1716000000\n\n%DEPENDS%\nglibc\n\n",
        file = package_file(name, version)
    );
    let files = format!("%FILES%\nusr/\nusr/bin/\nusr/bin/{name}\n");
    vec![
        (format!("{dir}/desc"), desc.into_bytes()),
        (format!("{dir}/files"), files.into_bytes()),
    ]
}

/// Temporary deployment: lists, mirrors and catalog under one directory.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// Two listed mirrors (Germany in sync, Austria stale on `core`), one
    /// offline mirror, an unlisted reference mirror and a catalog with
    /// `core` and `apps` plus an excluded `ISO` directory.
    pub fn new() -> Self {
        let fixture = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        let root = fixture.root();

        std::fs::write(
            root.join("pacman.conf"),
            "[options]\nArchitecture = auto\n\n[core]\nInclude = /etc/pacman.d/mirrorlist\n\n[apps]\nInclude = /etc/pacman.d/mirrorlist\n",
        )
        .unwrap();
        let mirrorlist = format!(
            "# Germany\nServer = {de}/$repo\n# Austria\nServer = {at}/$repo\n# Nowhere\nServer = {gone}/$repo\n",
            de = root.join("mirror-de").display(),
            at = root.join("mirror-at").display(),
            gone = root.join("missing").display(),
        );
        std::fs::write(root.join("mirrorlist"), mirrorlist).unwrap();

        for repo in REPOSITORIES {
            fixture.write_index("reference", repo, format!("{repo} index v2").as_bytes());
            fixture.write_index("mirror-de", repo, format!("{repo} index v2").as_bytes());
        }
        fixture.write_index("mirror-at", "core", b"core index v1");
        fixture.write_index("mirror-at", "apps", b"apps index v2");

        fixture.write_catalog("core", &[("bash", "5.2-1"), ("linux", "6.9.1-1")]);
        fixture.write_catalog("apps", &[("kate", "24.05.0-1")]);
        std::fs::create_dir_all(root.join("repo").join("ISO")).unwrap();
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.root().join("repo")
    }

    pub fn write_index(&self, mirror: &str, repo: &str, body: &[u8]) {
        let dir = self.root().join(mirror).join(repo);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{repo}.db.tar.gz")), body).unwrap();
    }

    /// Replace the catalog archive of `repo` with the given packages.
    pub fn write_catalog(&self, repo: &str, packages: &[(&str, &str)]) {
        let entries: Vec<(String, Vec<u8>)> = packages
            .iter()
            .flat_map(|(name, version)| package_entries(name, version))
            .collect();
        self.write_catalog_bytes(repo, &gzip_tar(&entries));
    }

    pub fn write_catalog_bytes(&self, repo: &str, bytes: &[u8]) {
        let dir = self.catalog_dir().join(repo);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{repo}.files.tar.gz")), bytes).unwrap();
    }

    /// Drop a binary package file carrying `.PKGINFO` next to the catalog.
    pub fn write_package_file(&self, repo: &str, name: &str, version: &str, pkginfo: &str) {
        let archive = xz_tar(&[
            (".PKGINFO".to_string(), pkginfo.as_bytes().to_vec()),
            (format!("usr/bin/{name}"), b"\x7fELF".to_vec()),
        ]);
        let dir = self.catalog_dir().join(repo);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(package_file(name, version)), archive).unwrap();
    }

    pub fn config(&self) -> SynrepoConfig {
        let root = self.root();
        SynrepoConfig {
            mirror: MirrorConfig {
                repo_list: root.join("pacman.conf").display().to_string(),
                mirror_list: root.join("mirrorlist").display().to_string(),
                reference_mirror: format!("{}/", root.join("reference").display()),
                max_parallel_requests: 3,
                ..MirrorConfig::default()
            },
            catalog: CatalogConfig {
                base_dir: self.catalog_dir().display().to_string(),
                ..CatalogConfig::default()
            },
            ..SynrepoConfig::default()
        }
    }

    pub fn context<S: PersistenceGateway>(&self, store: S) -> UpdateContext<S> {
        context_with(self.config(), store)
    }
}

pub fn context_with<S: PersistenceGateway>(config: SynrepoConfig, store: S) -> UpdateContext<S> {
    let transport = HttpTransport::new(&config.mirror).unwrap();
    let client = transport.client().clone();
    UpdateContext::new(config, Arc::new(transport), client, Arc::new(Logger::silent()), store)
}
