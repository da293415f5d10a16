use camino::Utf8PathBuf;
use mod_vault::core::dependencies::{find_dependencies, find_dependency_states, DependencyState};
use mod_vault::core::mod_fs::ModFS;
use mod_vault::models::mod_dto::{Mod, ModList, ModVariant, ModsFolderInfo, StagingInfo};
use mod_vault::models::version::Version;

fn variant(id: &str, version: &str, deps: &str, enabled_copy: bool) -> ModVariant {
    let info = ModFS::parse_mod_info(&format!(
        r#"{{"id": "{id}", "name": "{id}", "version": "{version}", "dependencies": [{deps}]}}"#
    ))
    .unwrap();
    let folder = Utf8PathBuf::from(format!("/mods/{id}-{version}"));

    let mut variant = ModVariant::new(info, None);
    if enabled_copy {
        variant.mods_folder_info = Some(ModsFolderInfo { folder });
    } else {
        variant.staging_info = Some(StagingInfo { folder });
    }
    variant
}

fn library(extra: Vec<Mod>) -> ModList {
    let mut mods = vec![Mod::new(
        "app".into(),
        true,
        vec![variant(
            "app",
            "1.0",
            r#"{"id": "lib"}, {"id": "ui", "version": "2.0"}, {"id": "ghost"}"#,
            true,
        )],
    )];
    mods.extend(extra);
    ModList::new(mods)
}

#[test]
fn test_find_dependencies_pairs_each_with_installed_mod() {
    let mods = library(vec![Mod::new("lib".into(), false, vec![variant("lib", "1.0", "", false)])]);
    let app = &mods.find("app").unwrap().variants[0];

    let found: Vec<(String, bool)> = find_dependencies(app, &mods)
        .into_iter()
        .map(|(dep, m)| (dep.id.clone(), m.is_some()))
        .collect();

    assert_eq!(
        found,
        vec![
            ("lib".to_string(), true),
            ("ui".to_string(), false),
            ("ghost".to_string(), false)
        ]
    );
}

#[test]
fn test_dependency_states() {
    let mods = library(vec![
        Mod::new("lib".into(), true, vec![variant("lib", "0.5", "", true)]),
        Mod::new(
            "ui".into(),
            false,
            vec![variant("ui", "1.5", "", false), variant("ui", "2.1", "", false)],
        ),
    ]);
    let states = find_dependency_states(mods.find("app").unwrap(), &mods);
    assert_eq!(states.len(), 3);

    match &states[0] {
        DependencyState::Enabled { variant, .. } => assert_eq!(*variant.version(), Version::parse("0.5")),
        other => panic!("lib should be enabled: {other:?}"),
    }
    match &states[1] {
        DependencyState::Disabled { variant, .. } => assert_eq!(*variant.version(), Version::parse("2.1")),
        other => panic!("ui should be disabled: {other:?}"),
    }
    assert!(matches!(
        states[2],
        DependencyState::Missing { outdated_mod_if_found: None, .. }
    ));
    assert_eq!(states[2].dependency().id, "ghost");
    assert!(states[0].is_satisfied());
    assert!(!states[1].is_satisfied());
}

#[test]
fn test_too_old_dependency_is_missing_but_reported() {
    let mods = library(vec![Mod::new("ui".into(), true, vec![variant("ui", "1.9", "", true)])]);
    let states = find_dependency_states(mods.find("app").unwrap(), &mods);

    match &states[1] {
        DependencyState::Missing {
            outdated_mod_if_found: Some(found),
            ..
        } => assert_eq!(found.id, "ui"),
        other => panic!("ui should be outdated: {other:?}"),
    }
}

#[test]
fn test_enabled_qualifying_variant_beats_higher_disabled_one() {
    let mods = library(vec![Mod::new(
        "ui".into(),
        true,
        vec![variant("ui", "2.0", "", true), variant("ui", "3.0", "", false)],
    )]);
    let states = find_dependency_states(mods.find("app").unwrap(), &mods);

    match &states[1] {
        DependencyState::Enabled { variant, .. } => assert_eq!(*variant.version(), Version::parse("2.0")),
        other => panic!("ui 2.0 should be enabled: {other:?}"),
    }
}

#[test]
fn test_equal_versions_resolve_to_first_variant() {
    // "2.0" and "2.0.0" compare equal but have different smol ids.
    let mods = library(vec![Mod::new(
        "ui".into(),
        false,
        vec![variant("ui", "2.0", "", false), variant("ui", "2.0.0", "", false)],
    )]);
    let ui = mods.find("ui").unwrap();
    assert_eq!(ui.variants.len(), 2);

    let states = find_dependency_states(mods.find("app").unwrap(), &mods);
    match &states[1] {
        DependencyState::Disabled { variant, .. } => assert_eq!(variant.smol_id(), ui.variants[0].smol_id()),
        other => panic!("ui should be disabled: {other:?}"),
    }
}

#[test]
fn test_disabled_mod_uses_highest_variant_dependencies() {
    let mods = ModList::new(vec![Mod::new(
        "app".into(),
        false,
        vec![
            variant("app", "1.0", r#"{"id": "old_dep"}"#, false),
            variant("app", "2.0", r#"{"id": "new_dep"}"#, false),
        ],
    )]);

    let states = find_dependency_states(mods.find("app").unwrap(), &mods);
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].dependency().id, "new_dep");
}
