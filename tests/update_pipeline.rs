// tests/update_pipeline.rs

//! End-to-end update runs against local-path mirrors and catalog archives.

mod common;

use common::{context_with, Fixture};
use synrepo_core::package::Flag;
use synrepo_core::store::{MemoryStore, PersistenceGateway, SqliteStore};
use synrepo_core::SynrepoError;

fn sync_state(store: &impl PersistenceGateway, country: &str, repo: &str) -> (bool, bool) {
    let countries = store.load_topology().unwrap();
    let mirror = &countries
        .iter()
        .find(|c| c.name == country)
        .unwrap_or_else(|| panic!("country {country} missing"))
        .mirrors[0];
    let synced = mirror.repos.iter().find(|r| r.name == repo).unwrap().synced;
    (mirror.online, synced)
}

#[tokio::test]
async fn update_all_populates_store_and_rescan_is_idempotent() {
    let fixture = Fixture::new();
    let mut context = fixture.context(SqliteStore::open_in_memory().unwrap());

    let summary = context.update_all().await.unwrap();

    assert_eq!(summary.countries, Some(3));
    assert_eq!(summary.mirrors, Some(3));
    assert_eq!(summary.online_mirrors, Some(2));
    assert_eq!(summary.packages_added, Some(3));
    assert_eq!(summary.packages_removed, Some(0));
    assert!(summary.failed_repositories.is_empty());

    let store = context.into_store();
    let names: Vec<String> = store
        .load_topology()
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Austria", "Germany", "Nowhere"]);
    assert_eq!(sync_state(&store, "Germany", "core"), (true, true));
    assert_eq!(sync_state(&store, "Austria", "core"), (true, false));
    assert_eq!(sync_state(&store, "Austria", "apps"), (true, true));
    assert_eq!(sync_state(&store, "Nowhere", "apps"), (false, false));
    // `build` is always tracked but the reference does not carry it.
    assert_eq!(sync_state(&store, "Germany", "build"), (true, false));

    let catalog = store.load_catalog().unwrap();
    assert_eq!(catalog.len(), 3);
    let linux = store.find_package("core", "linux").unwrap().unwrap();
    assert_eq!(linux.files, vec!["usr/", "usr/bin/", "usr/bin/linux"]);
    assert_eq!(linux.package_size, 1024);
    assert!(catalog.iter().all(|p| p.repository != "ISO"));

    let mut again = fixture.context(store);
    let summary = again.update_all().await.unwrap();
    assert_eq!(summary.packages_added, Some(0));
    assert_eq!(summary.packages_updated, Some(0));
    assert_eq!(summary.packages_removed, Some(0));
    assert_eq!(summary.flags_removed, Some(0));
    assert_eq!(again.store().load_catalog().unwrap(), catalog);
}

#[tokio::test]
async fn version_bump_orphans_flag() {
    let fixture = Fixture::new();
    let mut context = fixture.context(SqliteStore::open_in_memory().unwrap());
    context.update_catalog(&[]).await.unwrap();

    let flag = context
        .add_flag(Flag::new("core", "bash", "5.2-1", "packager@example.org", "5.3 released"))
        .unwrap();
    assert!(flag.id.is_some());

    fixture.write_catalog("core", &[("bash", "5.3-1"), ("linux", "6.9.1-1")]);
    let summary = context.update_catalog(&["core".to_string()]).await.unwrap();

    assert_eq!(summary.packages_updated, Some(1));
    assert_eq!(summary.flags_removed, Some(1));
    let bash = context.store().find_package("core", "bash").unwrap().unwrap();
    assert_eq!(bash.version, "5.3-1");
    assert!(bash.flag.is_none());
    assert_eq!(context.remove_flags(&[flag.id.unwrap()]).unwrap(), 0);
}

#[tokio::test]
async fn restricted_rescan_keeps_other_repositories() {
    let fixture = Fixture::new();
    let mut context = fixture.context(MemoryStore::new());
    context.update_catalog(&[]).await.unwrap();

    fixture.write_catalog("core", &[("bash", "5.2-1")]);
    let summary = context.update_catalog(&["core".to_string()]).await.unwrap();

    assert_eq!(summary.packages_removed, Some(1));
    assert!(context.store().find_package("apps", "kate").unwrap().is_some());
    assert!(context.store().find_package("core", "linux").unwrap().is_none());
}

#[tokio::test]
async fn unreadable_repository_is_reported_and_kept() {
    let fixture = Fixture::new();
    let mut context = fixture.context(MemoryStore::new());
    context.update_catalog(&[]).await.unwrap();

    fixture.write_catalog_bytes("apps", b"truncated download");
    let summary = context.update_catalog(&[]).await.unwrap();

    assert_eq!(summary.failed_repositories, vec!["apps"]);
    assert_eq!(summary.packages_removed, Some(0));
    assert!(context.store().find_package("apps", "kate").unwrap().is_some());
}

#[tokio::test]
async fn dry_run_persists_nothing() {
    let fixture = Fixture::new();
    let mut context = fixture
        .context(SqliteStore::open_in_memory().unwrap())
        .with_dry_run(true);

    let summary = context.update_all().await.unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.packages_added, Some(3));
    assert!(context.store().load_catalog().unwrap().is_empty());
    assert!(context.store().load_topology().unwrap().is_empty());
}

#[tokio::test]
async fn missing_mirror_list_aborts_without_writes() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.mirror.mirror_list = fixture.root().join("absent").display().to_string();
    let mut context = context_with(config, SqliteStore::open_in_memory().unwrap());

    let err = context.update_all().await.unwrap_err();

    assert!(matches!(err, SynrepoError::Filesystem(_)), "{err:?}");
    assert!(context.store().load_catalog().unwrap().is_empty());
    assert!(context.store().load_topology().unwrap().is_empty());
}

#[tokio::test]
async fn resolve_git_links_every_variant() {
    let fixture = Fixture::new();
    fixture.write_catalog("core", &[("bash", "5.2-1"), ("linux", "6.9.1-1"), ("kate", "24.05.0-1")]);
    fixture.write_package_file(
        "apps",
        "kate",
        "24.05.0-1",
        "pkgname = kate\ngitrepo = https://github.com/KaOSx/apps\ngitfolder = kate\n",
    );
    let mut context = fixture.context(MemoryStore::new());
    context.update_catalog(&[]).await.unwrap();

    let (git, linked) = context.resolve_git("apps", "kate").await.unwrap();

    assert_eq!(git.repository, "https://github.com/KaOSx/apps");
    assert_eq!(linked, 2);
    let core_kate = context.store().find_package("core", "kate").unwrap().unwrap();
    assert_eq!(core_kate.git_id(), git.id);

    let missing = context.resolve_git("core", "linux").await.unwrap_err();
    assert!(matches!(missing, SynrepoError::Filesystem(_)), "{missing:?}");
}

#[tokio::test]
async fn restricted_rescan_adopts_git_from_unscanned_variant() {
    let fixture = Fixture::new();
    fixture.write_package_file(
        "apps",
        "kate",
        "24.05.0-1",
        "pkgname = kate\ngitrepo = https://github.com/KaOSx/apps\ngitfolder = kate\n",
    );
    let mut context = fixture.context(SqliteStore::open_in_memory().unwrap());
    context.update_catalog(&[]).await.unwrap();
    let (git, linked) = context.resolve_git("apps", "kate").await.unwrap();
    assert_eq!(linked, 1);

    fixture.write_catalog("core", &[("bash", "5.2-1"), ("linux", "6.9.1-1"), ("kate", "24.05.0-1")]);
    let summary = context.update_catalog(&["core".to_string()]).await.unwrap();

    assert_eq!(summary.packages_added, Some(1));
    assert_eq!(summary.packages_removed, Some(0));
    let core_kate = context.store().find_package("core", "kate").unwrap().unwrap();
    assert_eq!(core_kate.git_id(), git.id);
}

#[tokio::test]
async fn full_rescan_drops_vanished_repository() {
    let fixture = Fixture::new();
    let mut context = fixture.context(MemoryStore::new());
    context.update_catalog(&[]).await.unwrap();
    context
        .add_flag(Flag::new("apps", "kate", "24.05.0-1", "packager@example.org", "24.08 released"))
        .unwrap();

    std::fs::remove_dir_all(fixture.catalog_dir().join("apps")).unwrap();
    let summary = context.update_catalog(&[]).await.unwrap();

    assert!(summary.failed_repositories.is_empty());
    assert_eq!(summary.packages_removed, Some(1));
    assert_eq!(summary.flags_removed, Some(1));
    assert!(context.store().find_package("apps", "kate").unwrap().is_none());
    assert!(context.store().find_package("core", "bash").unwrap().is_some());
}

#[tokio::test]
async fn newly_excluded_repository_is_dropped() {
    let fixture = Fixture::new();
    let mut context = fixture.context(MemoryStore::new());
    context.update_catalog(&[]).await.unwrap();

    let mut config = fixture.config();
    config.catalog.exclude.push("apps".to_string());
    let mut context = context_with(config, context.into_store());
    let summary = context.update_catalog(&[]).await.unwrap();

    assert_eq!(summary.packages_removed, Some(1));
    assert!(context.store().find_package("apps", "kate").unwrap().is_none());
}
