mod common;

use common::{setup_test_env, write_mod, write_version_file, FakeFetcher, TestEnv};
use mod_vault::config::AppConfig;
use mod_vault::core::access::Access;
use mod_vault::core::archives::AlwaysOverwrite;
use mod_vault::models::error::SError;
use mod_vault::models::paths::GamePathRules;
use mod_vault::models::version::Version;
use std::fs;
use std::sync::Arc;

fn access(env: &TestEnv, fetcher: FakeFetcher) -> Access {
    Access::new(&env.config(), Arc::new(fetcher), Arc::new(AlwaysOverwrite)).unwrap()
}

fn enable_in_game(env: &TestEnv, ids: &[&str]) {
    let quoted: Vec<String> = ids.iter().map(|id| format!("\"{id}\"")).collect();
    fs::write(
        GamePathRules::new(&env.game).enabled_mods,
        format!(r#"{{"enabledMods": [{}]}}"#, quoted.join(", ")),
    )
    .unwrap();
}

#[tokio::test]
async fn test_archive_then_switch_variant() {
    let env = setup_test_env();
    let access = access(&env, FakeFetcher::default());
    let mut reloads = access.reload_events();

    write_mod(&env.mods, "Foo", "foo", "2.0");
    enable_in_game(&env, &["foo"]);
    let incoming = write_mod(&env.root.join("incoming"), "Foo", "foo", "1.0");

    let written = access.compress(incoming.clone()).await.unwrap();
    assert_eq!(written.len(), 1);
    assert!(written[0].starts_with(&env.archives));
    assert!(reloads.try_recv().is_ok());
    fs::remove_dir_all(&incoming).unwrap();

    let mods = access.reload().await.unwrap();
    let foo = mods.find("foo").unwrap().clone();
    assert_eq!(foo.enabled_variants().len(), 1);
    let old = foo
        .variants
        .iter()
        .find(|v| *v.version() == Version::parse("1.0"))
        .cloned()
        .unwrap();

    access.change_active_variant(foo, Some(old)).await.unwrap();

    let mods = access.reload().await.unwrap();
    let enabled: Vec<Version> = mods
        .find("foo")
        .unwrap()
        .enabled_variants()
        .iter()
        .map(|v| v.version().clone())
        .collect();
    assert_eq!(enabled, vec![Version::parse("1.0")]);
    assert!(access.modification_states().borrow().is_empty());
    assert!(!*access.io_busy().borrow());
}

#[tokio::test]
async fn test_snapshot_subscribers_see_reloads() {
    let env = setup_test_env();
    let access = access(&env, FakeFetcher::default());
    let mut snapshots = access.subscribe_mods();
    assert!(access.mods().mods.is_empty());

    write_mod(&env.mods, "Foo", "foo", "1.0");
    access.reload().await.unwrap();

    snapshots.changed().await.unwrap();
    let latest = snapshots.borrow_and_update().clone();
    assert_eq!(latest.mods.len(), 1);
    assert_eq!(latest.added.len(), 1);
    assert!(latest.removed.is_empty());
}

#[tokio::test]
async fn test_repairs_run_on_current_snapshot() {
    let env = setup_test_env();
    let access = access(&env, FakeFetcher::default());
    write_mod(&env.mods, "Baz1", "baz", "1.0");
    write_mod(&env.mods, "Baz2", "baz", "2.0");
    enable_in_game(&env, &["baz"]);

    access.reload().await.unwrap();
    assert_eq!(access.enforce_single_enabled_variants().await.unwrap(), 1);

    let mods = access.reload().await.unwrap();
    assert!(!mods.find("baz").unwrap().has_enabled_conflict());
    assert_eq!(access.enforce_single_enabled_variants().await.unwrap(), 0);
}

#[tokio::test]
async fn test_version_lookup_through_access() {
    let env = setup_test_env();
    let url = "https://example.com/foo.version";
    let mut fetcher = FakeFetcher::default();
    fetcher.responses.insert(
        url.to_string(),
        r#"{"modVersion": {"major": 1, "minor": 5, "patch": 0}}"#.to_string(),
    );
    let access = access(&env, fetcher);

    let foo = write_mod(&env.mods, "Foo", "foo", "1.0");
    write_version_file(&foo, url, ("1", "0", "0"));
    let mods = access.reload().await.unwrap();

    assert_eq!(access.lookup_versions(true).await.unwrap(), 1);
    assert!(access.online_version("foo").is_some());
    assert!(access.has_update(mods.find("foo").unwrap()));
}

#[tokio::test]
async fn test_shutdown_cancels_compression() {
    let env = setup_test_env();
    let access = access(&env, FakeFetcher::default());
    let incoming = write_mod(&env.root.join("incoming"), "Foo", "foo", "1.0");

    access.clone().shutdown();
    let err = access.compress(incoming).await.unwrap_err();

    assert_eq!(err, SError::Cancelled);
    assert_eq!(*access.archive_status().borrow(), SError::Cancelled.to_string());
}

#[test]
fn test_access_requires_game_path() {
    let env = setup_test_env();
    let config = AppConfig {
        game_path: None,
        ..env.config()
    };

    let err = Access::new(&config, Arc::new(FakeFetcher::default()), Arc::new(AlwaysOverwrite))
        .err()
        .unwrap();
    assert!(matches!(err, SError::Config(_)));
}
