mod common;

use common::{setup_test_env, write_mod, write_version_file, FakeFetcher, Harness};
use mod_vault::core::io_lock::IoLock;
use mod_vault::core::version_checker::{VersionChecker, DEFAULT_CHECK_INTERVAL};
use mod_vault::models::paths::LibPathRules;
use std::sync::Arc;

const FOO_URL: &str = "https://example.com/foo.version";
const BAR_URL: &str = "https://example.com/bar.version";

fn online(major: u32, minor: u32) -> String {
    format!(
        r#"{{
    # served by the mod author
    "masterVersionFile": "{FOO_URL}",
    "modName": "Foo",
    "modVersion": {{"major": {major}, "minor": {minor}, "patch": 0}},
}}"#
    )
}

fn fetcher(responses: &[(&str, String)]) -> Arc<FakeFetcher> {
    Arc::new(FakeFetcher {
        responses: responses.iter().map(|(u, r)| (u.to_string(), r.clone())).collect(),
        ..FakeFetcher::default()
    })
}

#[test]
fn test_lookup_records_online_versions_and_skips_failures() {
    let env = setup_test_env();
    let h = Harness::new(&env);
    let foo = write_mod(&env.mods, "Foo", "foo", "1.0");
    write_version_file(&foo, FOO_URL, ("1", "0", "0"));
    let bar = write_mod(&env.mods, "Bar", "bar", "1.0");
    write_version_file(&bar, BAR_URL, ("1", "0", "0"));
    write_mod(&env.mods, "Plain", "plain", "1.0");

    let fake = fetcher(&[(FOO_URL, online(1, 2))]);
    let cache_file = LibPathRules::new(&env.data).version_cache;
    let checker = VersionChecker::new(h.io_lock.clone(), &cache_file, fake.clone(), DEFAULT_CHECK_INTERVAL);

    let mods = h.reload();
    assert_eq!(checker.lookup_versions(&mods.mods, true).unwrap(), 1);

    let mut calls = fake.calls.lock().clone();
    calls.sort();
    assert_eq!(calls, vec![BAR_URL, FOO_URL]);
    assert!(checker.online_version("foo").is_some());
    assert!(checker.online_version("bar").is_none());
    assert!(checker.has_update(mods.find("foo").unwrap()));
    assert!(!checker.has_update(mods.find("bar").unwrap()));
    assert!(checker.last_check_timestamp() > 0);
}

#[test]
fn test_lookup_is_throttled_unless_forced() {
    let env = setup_test_env();
    let h = Harness::new(&env);
    let foo = write_mod(&env.mods, "Foo", "foo", "1.0");
    write_version_file(&foo, FOO_URL, ("1", "0", "0"));

    let fake = fetcher(&[(FOO_URL, online(1, 0))]);
    let cache_file = LibPathRules::new(&env.data).version_cache;
    let checker = VersionChecker::new(h.io_lock.clone(), &cache_file, fake.clone(), DEFAULT_CHECK_INTERVAL);
    let mods = h.reload();

    assert_eq!(checker.lookup_versions(&mods.mods, false).unwrap(), 1);
    assert_eq!(checker.lookup_versions(&mods.mods, false).unwrap(), 0);
    assert_eq!(fake.calls.lock().len(), 1);

    assert_eq!(checker.lookup_versions(&mods.mods, true).unwrap(), 1);
    assert_eq!(fake.calls.lock().len(), 2);
    assert!(!checker.has_update(mods.find("foo").unwrap()));
}

#[test]
fn test_cache_survives_restart() {
    let env = setup_test_env();
    let h = Harness::new(&env);
    let foo = write_mod(&env.mods, "Foo", "foo", "1.0");
    write_version_file(&foo, FOO_URL, ("1", "0", "0"));
    let cache_file = LibPathRules::new(&env.data).version_cache;
    let mods = h.reload();

    let first = VersionChecker::new(
        h.io_lock.clone(),
        &cache_file,
        fetcher(&[(FOO_URL, online(3, 0))]),
        DEFAULT_CHECK_INTERVAL,
    );
    first.lookup_versions(&mods.mods, true).unwrap();

    let io_lock = Arc::new(IoLock::new());
    let second = VersionChecker::new(io_lock, &cache_file, fetcher(&[]), DEFAULT_CHECK_INTERVAL);
    assert_eq!(second.last_check_timestamp(), first.last_check_timestamp());
    assert!(second.has_update(mods.find("foo").unwrap()));

    // Still inside the interval, so nothing is fetched and the cache is kept.
    assert_eq!(second.lookup_versions(&mods.mods, false).unwrap(), 0);
    assert!(second.online_version("foo").is_some());
}

#[test]
fn test_unreadable_cache_starts_empty() {
    let env = setup_test_env();
    let cache_file = LibPathRules::new(&env.data).version_cache;
    std::fs::write(&cache_file, "garbage").unwrap();

    let checker = VersionChecker::new(
        Arc::new(IoLock::new()),
        &cache_file,
        fetcher(&[]),
        DEFAULT_CHECK_INTERVAL,
    );
    assert_eq!(checker.last_check_timestamp(), 0);
    assert!(checker.online_version("foo").is_none());
}
