/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::store::sqlite
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    SQLite-backed gateway holding the mirror tree, package
    catalog, outdated flags and git metadata.

  Security / Safety Notes:
    All statements are parameterised. Each commit runs in one
    transaction which rolls back when dropped on error.

  Dependencies:
    rusqlite (bundled SQLite), serde_json for list columns.

  Operational Scope:
    Default store of the CLI; the database lives under the XDG
    data directory unless `[store] database` says otherwise.

  Revision History:
    2026-09-16 COD  Authored SQLite store.
    2026-10-02 COD  Batched delta statements.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Referential cleanup before deletion
    - Bounded statement groups
============================================================*/

use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{PersistenceGateway, UpdateBatch, BATCH_SIZE};
use crate::error::{Result, SynrepoError};
use crate::package::{date_from_unix, Flag, GitMetadata, Package};
use crate::reconcile::CatalogDelta;
use crate::topology::{Country, Mirror, Repo};

const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS countries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS mirrors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        country_id INTEGER NOT NULL REFERENCES countries(id),
        url TEXT NOT NULL,
        online INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS repos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        mirror_id INTEGER NOT NULL REFERENCES mirrors(id),
        name TEXT NOT NULL,
        synced INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS git (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        repository TEXT NOT NULL,
        folder TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS flags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        repository TEXT NOT NULL,
        name TEXT NOT NULL,
        version TEXT NOT NULL,
        email TEXT NOT NULL,
        comment TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS packages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        repository TEXT NOT NULL,
        name TEXT NOT NULL,
        version TEXT NOT NULL,
        arch TEXT NOT NULL,
        description TEXT NOT NULL,
        package_size INTEGER NOT NULL,
        installed_size INTEGER NOT NULL,
        url TEXT NOT NULL,
        licenses TEXT NOT NULL,
        package_groups TEXT NOT NULL,
        build_date INTEGER,
        depends TEXT NOT NULL,
        make_depends TEXT NOT NULL,
        opt_depends TEXT NOT NULL,
        files TEXT NOT NULL,
        md5sum TEXT NOT NULL,
        sha256sum TEXT NOT NULL,
        filename TEXT NOT NULL,
        flag_id INTEGER REFERENCES flags(id),
        git_id INTEGER REFERENCES git(id)
    );
    CREATE INDEX IF NOT EXISTS idx_packages_repo_name ON packages(repository, name);
    CREATE INDEX IF NOT EXISTS idx_packages_name ON packages(name);
";

const PACKAGE_SELECT: &str = "
    SELECT p.id, p.repository, p.name, p.version, p.arch, p.description,
           p.package_size, p.installed_size, p.url, p.licenses, p.package_groups,
           p.build_date, p.depends, p.make_depends, p.opt_depends, p.files,
           p.md5sum, p.sha256sum, p.filename,
           f.id, f.repository, f.name, f.version, f.email, f.comment, f.created_at,
           g.id, g.name, g.repository, g.folder
    FROM packages p
    LEFT JOIN flags f ON f.id = p.flag_id
    LEFT JOIN git g ON g.id = p.git_id";

const PACKAGE_INSERT: &str = "
    INSERT INTO packages (repository, name, version, arch, description, package_size,
        installed_size, url, licenses, package_groups, build_date, depends, make_depends,
        opt_depends, files, md5sum, sha256sum, filename, flag_id, git_id)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)";

const PACKAGE_UPDATE: &str = "
    UPDATE packages SET repository = ?1, name = ?2, version = ?3, arch = ?4,
        description = ?5, package_size = ?6, installed_size = ?7, url = ?8, licenses = ?9,
        package_groups = ?10, build_date = ?11, depends = ?12, make_depends = ?13,
        opt_depends = ?14, files = ?15, md5sum = ?16, sha256sum = ?17, filename = ?18,
        flag_id = ?19, git_id = ?20
    WHERE id = ?21";

/// Gateway over one SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating when absent) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                SynrepoError::Filesystem(format!(
                    "Failed to create database directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        let version: Option<i32> = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
        match version {
            None => {
                conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [SCHEMA_VERSION])?;
            }
            Some(found) if found > SCHEMA_VERSION => {
                return Err(SynrepoError::Store(format!(
                    "Database schema version {found} is newer than supported {SCHEMA_VERSION}"
                )));
            }
            Some(_) => {}
        }
        Ok(Self { conn })
    }
}

impl PersistenceGateway for SqliteStore {
    fn load_catalog(&self) -> Result<Vec<Package>> {
        let mut stmt = self.conn.prepare(&format!("{PACKAGE_SELECT} ORDER BY p.id"))?;
        let packages = stmt
            .query_map([], package_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(packages)
    }

    fn load_topology(&self) -> Result<Vec<Country>> {
        let mut countries_stmt = self.conn.prepare("SELECT id, name FROM countries ORDER BY id")?;
        let mut mirrors_stmt = self
            .conn
            .prepare("SELECT id, url, online FROM mirrors WHERE country_id = ?1 ORDER BY id")?;
        let mut repos_stmt = self
            .conn
            .prepare("SELECT name, synced FROM repos WHERE mirror_id = ?1 ORDER BY id")?;

        let rows = countries_stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut countries = Vec::with_capacity(rows.len());
        for (country_id, name) in rows {
            let mirror_rows = mirrors_stmt
                .query_map([country_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut mirrors = Vec::with_capacity(mirror_rows.len());
            for (mirror_id, url, online) in mirror_rows {
                let repos = repos_stmt
                    .query_map([mirror_id], |row| {
                        Ok(Repo {
                            synced: row.get(1)?,
                            ..Repo::new(row.get::<_, String>(0)?)
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                mirrors.push(Mirror { url, online, repos });
            }
            countries.push(Country { name, mirrors });
        }
        Ok(countries)
    }

    fn commit(&mut self, batch: UpdateBatch<'_>) -> Result<()> {
        let tx = self.conn.transaction()?;
        if let Some(countries) = batch.countries {
            write_topology(&tx, countries)?;
        }
        if let Some(delta) = batch.delta {
            write_delta(&tx, delta)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn create_flag(&mut self, mut flag: Flag) -> Result<Flag> {
        let tx = self.conn.transaction()?;
        let target: Option<(i64, Option<i64>)> = tx
            .query_row(
                "SELECT id, flag_id FROM packages
                 WHERE repository = ?1 AND name = ?2 AND version = ?3
                 ORDER BY id LIMIT 1",
                params![&flag.repository, &flag.name, &flag.version],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((package_id, existing)) = target else {
            return Err(SynrepoError::NotFound(format!(
                "{}/{}-{}",
                flag.repository, flag.name, flag.version
            )));
        };
        if let Some(existing) = existing {
            let found = tx.query_row(
                "SELECT id, repository, name, version, email, comment, created_at
                 FROM flags WHERE id = ?1",
                [existing],
                |row| flag_from_row(row, 0),
            )?;
            return Ok(found);
        }

        tx.execute(
            "INSERT INTO flags (repository, name, version, email, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &flag.repository,
                &flag.name,
                &flag.version,
                &flag.email,
                &flag.comment,
                flag.created_at.timestamp(),
            ],
        )?;
        let flag_id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE packages SET flag_id = ?1 WHERE id = ?2",
            params![flag_id, package_id],
        )?;
        tx.commit()?;

        flag.id = Some(flag_id);
        Ok(flag)
    }

    fn delete_flags(&mut self, ids: &[i64]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let removed = remove_flags(&tx, ids)?;
        tx.commit()?;
        Ok(removed)
    }

    fn attach_git(&mut self, mut git: GitMetadata) -> Result<(GitMetadata, usize)> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO git (name, repository, folder) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET repository = excluded.repository, folder = excluded.folder",
            params![&git.name, &git.repository, &git.folder],
        )?;
        let id: i64 = tx.query_row("SELECT id FROM git WHERE name = ?1", [&git.name], |row| {
            row.get(0)
        })?;
        let linked = tx.execute(
            "UPDATE packages SET git_id = ?1 WHERE name = ?2",
            params![id, &git.name],
        )?;
        tx.commit()?;

        git.id = Some(id);
        Ok((git, linked))
    }

    fn find_package(&self, repository: &str, name: &str) -> Result<Option<Package>> {
        let found = self
            .conn
            .query_row(
                &format!("{PACKAGE_SELECT} WHERE p.repository = ?1 AND p.name = ?2 ORDER BY p.id LIMIT 1"),
                params![repository, name],
                package_from_row,
            )
            .optional()?;
        Ok(found)
    }
}

fn write_topology(conn: &Connection, countries: &[Country]) -> Result<()> {
    conn.execute("DELETE FROM repos", [])?;
    conn.execute("DELETE FROM mirrors", [])?;
    conn.execute("DELETE FROM countries", [])?;

    let mut country_stmt = conn.prepare("INSERT INTO countries (name) VALUES (?1)")?;
    let mut mirror_stmt =
        conn.prepare("INSERT INTO mirrors (country_id, url, online) VALUES (?1, ?2, ?3)")?;
    let mut repo_stmt =
        conn.prepare("INSERT INTO repos (mirror_id, name, synced) VALUES (?1, ?2, ?3)")?;

    for country in countries {
        let country_id = country_stmt.insert([&country.name])?;
        for mirror in &country.mirrors {
            let mirror_id = mirror_stmt.insert(params![country_id, &mirror.url, mirror.online])?;
            for repo in &mirror.repos {
                repo_stmt.insert(params![mirror_id, &repo.name, repo.synced])?;
            }
        }
    }
    Ok(())
}

fn write_delta(conn: &Connection, delta: &CatalogDelta) -> Result<()> {
    let orphaned: Vec<i64> = delta.orphaned_flags.iter().filter_map(|f| f.id).collect();
    remove_flags(conn, &orphaned)?;

    let removed: Vec<i64> = delta.remove.iter().filter_map(|p| p.id).collect();
    for chunk in removed.chunks(BATCH_SIZE) {
        conn.execute(
            &format!("DELETE FROM packages WHERE id IN ({})", placeholders(chunk.len())),
            params_from_iter(chunk),
        )?;
    }

    for chunk in delta.update.chunks(BATCH_SIZE) {
        let mut stmt = conn.prepare_cached(PACKAGE_UPDATE)?;
        for pkg in chunk {
            let id = pkg
                .id
                .ok_or_else(|| SynrepoError::Store(format!("{} has no identity", pkg.full_name())))?;
            let lists = EncodedLists::of(pkg)?;
            let changed = stmt.execute(params![
                &pkg.repository,
                &pkg.name,
                &pkg.version,
                &pkg.arch,
                &pkg.description,
                pkg.package_size,
                pkg.installed_size,
                &pkg.url,
                &lists.licenses,
                &lists.groups,
                pkg.build_date.map(|d| d.timestamp()),
                &lists.depends,
                &lists.make_depends,
                &lists.opt_depends,
                &lists.files,
                &pkg.md5sum,
                &pkg.sha256sum,
                &pkg.filename,
                pkg.flag_id(),
                pkg.git_id(),
                id,
            ])?;
            if changed == 0 {
                return Err(SynrepoError::Store(format!("Unknown package id {id}")));
            }
        }
    }

    for chunk in delta.add.chunks(BATCH_SIZE) {
        let mut stmt = conn.prepare_cached(PACKAGE_INSERT)?;
        for pkg in chunk {
            let lists = EncodedLists::of(pkg)?;
            stmt.execute(params![
                &pkg.repository,
                &pkg.name,
                &pkg.version,
                &pkg.arch,
                &pkg.description,
                pkg.package_size,
                pkg.installed_size,
                &pkg.url,
                &lists.licenses,
                &lists.groups,
                pkg.build_date.map(|d| d.timestamp()),
                &lists.depends,
                &lists.make_depends,
                &lists.opt_depends,
                &lists.files,
                &pkg.md5sum,
                &pkg.sha256sum,
                &pkg.filename,
                pkg.flag_id(),
                pkg.git_id(),
            ])?;
        }
    }
    Ok(())
}

/// Null out package references, then delete; returns the number of flags deleted.
fn remove_flags(conn: &Connection, ids: &[i64]) -> Result<usize> {
    let mut removed = 0;
    for chunk in ids.chunks(BATCH_SIZE) {
        let marks = placeholders(chunk.len());
        conn.execute(
            &format!("UPDATE packages SET flag_id = NULL WHERE flag_id IN ({marks})"),
            params_from_iter(chunk),
        )?;
        removed += conn.execute(
            &format!("DELETE FROM flags WHERE id IN ({marks})"),
            params_from_iter(chunk),
        )?;
    }
    Ok(removed)
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

struct EncodedLists {
    licenses: String,
    groups: String,
    depends: String,
    make_depends: String,
    opt_depends: String,
    files: String,
}

impl EncodedLists {
    fn of(pkg: &Package) -> Result<Self> {
        Ok(Self {
            licenses: encode_list(&pkg.licenses)?,
            groups: encode_list(&pkg.groups)?,
            depends: encode_list(&pkg.depends)?,
            make_depends: encode_list(&pkg.make_depends)?,
            opt_depends: encode_list(&pkg.opt_depends)?,
            files: encode_list(&pkg.files)?,
        })
    }
}

fn encode_list(list: &[String]) -> Result<String> {
    serde_json::to_string(list)
        .map_err(|err| SynrepoError::Serialization(format!("Failed to encode list column: {err}")))
}

fn decode_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
    })
}

fn flag_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Flag> {
    Ok(Flag {
        id: Some(row.get(base)?),
        repository: row.get(base + 1)?,
        name: row.get(base + 2)?,
        version: row.get(base + 3)?,
        email: row.get(base + 4)?,
        comment: row.get(base + 5)?,
        created_at: date_from_unix(row.get(base + 6)?).unwrap_or_default(),
    })
}

fn package_from_row(row: &Row<'_>) -> rusqlite::Result<Package> {
    let flag = match row.get::<_, Option<i64>>(19)? {
        Some(_) => Some(flag_from_row(row, 19)?),
        None => None,
    };
    let git = match row.get::<_, Option<i64>>(26)? {
        Some(id) => Some(GitMetadata {
            id: Some(id),
            name: row.get(27)?,
            repository: row.get(28)?,
            folder: row.get(29)?,
        }),
        None => None,
    };

    Ok(Package {
        id: Some(row.get(0)?),
        repository: row.get(1)?,
        name: row.get(2)?,
        version: row.get(3)?,
        arch: row.get(4)?,
        description: row.get(5)?,
        package_size: row.get(6)?,
        installed_size: row.get(7)?,
        url: row.get(8)?,
        licenses: decode_list(row, 9)?,
        groups: decode_list(row, 10)?,
        build_date: row.get::<_, Option<i64>>(11)?.and_then(date_from_unix),
        depends: decode_list(row, 12)?,
        make_depends: decode_list(row, 13)?,
        opt_depends: decode_list(row, 14)?,
        files: decode_list(row, 15)?,
        md5sum: row.get(16)?,
        sha256sum: row.get(17)?,
        filename: row.get(18)?,
        flag,
        git,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{reconcile, CatalogScope};
    use crate::store::contract;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn topology_is_replaced_wholesale() {
        contract::topology_is_replaced_wholesale(&mut store());
    }

    #[test]
    fn delta_round_trip() {
        contract::delta_round_trip(&mut store());
    }

    #[test]
    fn flags_follow_versions() {
        contract::flags_follow_versions(&mut store());
    }

    #[test]
    fn delete_flags_detaches() {
        contract::delete_flags_detaches(&mut store());
    }

    #[test]
    fn git_links_every_variant() {
        contract::git_links_every_variant(&mut store());
    }

    #[test]
    fn large_deltas_span_batches() {
        contract::large_deltas_span_batches(&mut store());
    }

    #[test]
    fn failed_commit_persists_nothing() {
        contract::failed_commit_persists_nothing(&mut store());
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("syn-repo.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            let mut pkg = contract::package("core", "foo", "1.0-1");
            pkg.build_date = date_from_unix(1_716_000_000);
            store.apply_catalog_delta(&reconcile(&[], vec![pkg], &CatalogScope::default())).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let foo = store.find_package("core", "foo").unwrap().unwrap();
        assert_eq!(foo.build_date.unwrap().timestamp(), 1_716_000_000);
        assert_eq!(foo.files, vec!["usr/bin/foo"]);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syn-repo.db");
        drop(SqliteStore::open(&path).unwrap());
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("INSERT INTO schema_version (version) VALUES (99)", []).unwrap();
        }
        assert!(matches!(SqliteStore::open(&path), Err(SynrepoError::Store(_))));
    }
}
