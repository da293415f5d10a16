#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use mod_vault::config::AppConfig;
use mod_vault::core::archives::{AlwaysOverwrite, Archives, OverwriteConfirmation};
use mod_vault::core::game_enabled_mods::GameEnabledMods;
use mod_vault::core::io_lock::IoLock;
use mod_vault::core::mod_loader::{FolderModLoader, ModLoader};
use mod_vault::core::modification::{ModificationTracker, ReloadTrigger};
use mod_vault::core::mods_cache::ModsCache;
use mod_vault::core::staging::{Staging, StagingContext};
use mod_vault::core::version_checker::VersionFetcher;
use mod_vault::models::error::SError;
use mod_vault::models::mod_dto::ModList;
use mod_vault::models::paths::GamePathRules;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Scratch layout: a game folder with `mods/`, plus archive, staging, and data folders.
pub struct TestEnv {
    pub _tmp: TempDir,
    pub root: Utf8PathBuf,
    pub game: Utf8PathBuf,
    pub mods: Utf8PathBuf,
    pub archives: Utf8PathBuf,
    pub staging: Utf8PathBuf,
    pub data: Utf8PathBuf,
}

pub fn setup_test_env() -> TestEnv {
    let tmp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();

    let game = root.join("game");
    let mods = GamePathRules::new(&game).mods;
    let archives = root.join("archives");
    let staging = root.join("staging");
    let data = root.join("data");

    for dir in [&mods, &archives, &staging, &data] {
        fs::create_dir_all(dir).unwrap();
    }

    TestEnv {
        _tmp: tmp,
        root,
        game,
        mods,
        archives,
        staging,
        data,
    }
}

impl TestEnv {
    pub fn config(&self) -> AppConfig {
        AppConfig {
            data_path: self.data.clone(),
            game_path: Some(self.game.clone()),
            archives_path: self.archives.clone(),
            staging_path: self.staging.clone(),
            log_to_file: false,
            ..AppConfig::default()
        }
    }
}

/// Writes a mod folder `parent/folder` with a manifest and one content file.
pub fn write_mod(parent: &Utf8Path, folder: &str, id: &str, version: &str) -> Utf8PathBuf {
    write_mod_with_dependencies(parent, folder, id, version, &[])
}

/// Like [`write_mod`], declaring `(id, minimum version)` dependencies.
pub fn write_mod_with_dependencies(
    parent: &Utf8Path,
    folder: &str,
    id: &str,
    version: &str,
    dependencies: &[(&str, Option<&str>)],
) -> Utf8PathBuf {
    let mod_dir = parent.join(folder);
    fs::create_dir_all(mod_dir.join("data")).unwrap();
    fs::write(mod_dir.join("data/content.txt"), format!("{id} {version}")).unwrap();

    let deps: Vec<String> = dependencies
        .iter()
        .map(|(dep_id, min)| match min {
            Some(v) => format!(r#"{{"id": "{dep_id}", "version": "{v}"}}"#),
            None => format!(r#"{{"id": "{dep_id}"}}"#),
        })
        .collect();

    let manifest = format!(
        r#"{{
    # mod authors like comments
    "id": "{id}",
    "name": "{id}",
    "author": "test",
    "version": "{version}",
    "dependencies": [{}],
}}"#,
        deps.join(", ")
    );
    fs::write(mod_dir.join("mod_info.json"), manifest).unwrap();
    mod_dir
}

/// Adds a `.version` file pointing at `url` to an existing mod folder.
pub fn write_version_file(mod_dir: &Utf8Path, url: &str, version: (&str, &str, &str)) {
    let json = format!(
        r#"{{"masterVersionFile": "{url}", "modName": "test", "modThreadId": 1234,
            "modVersion": {{"major": {}, "minor": "{}", "patch": "{}"}}}}"#,
        version.0, version.1, version.2
    );
    fs::write(mod_dir.join("test.version"), json).unwrap();
}

/// Zips `folder` into `archive`, placing its contents under `prefix` inside the archive.
pub fn zip_folder(folder: &Utf8Path, archive: &Utf8Path, prefix: &str) {
    let mut writer = ZipWriter::new(File::create(archive).unwrap());
    let options = SimpleFileOptions::default();

    for entry in walkdir::WalkDir::new(folder).min_depth(1).sort_by_file_name() {
        let entry = entry.unwrap();
        let rel = entry.path().strip_prefix(folder).unwrap();
        let name = format!("{prefix}{}", rel.to_string_lossy().replace('\\', "/"));

        if entry.file_type().is_dir() {
            writer.add_directory(name, options).unwrap();
        } else {
            writer.start_file(name, options).unwrap();
            writer.write_all(&fs::read(entry.path()).unwrap()).unwrap();
        }
    }
    writer.finish().unwrap();
}

/// A zip holding only the given `(name, content)` files.
pub fn zip_files(archive: &Utf8Path, files: &[(&str, &str)]) {
    let mut writer = ZipWriter::new(File::create(archive).unwrap());
    for (name, content) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

pub fn folder_names(folder: &Utf8Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(folder)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub struct RefuseOverwrite;

impl OverwriteConfirmation for RefuseOverwrite {
    fn confirm_overwrite(&self, _existing: &Utf8Path) -> bool {
        false
    }
}

/// Serves canned responses by URL; anything else fails.
#[derive(Default)]
pub struct FakeFetcher {
    pub responses: HashMap<String, String>,
    pub calls: parking_lot::Mutex<Vec<String>>,
}

impl VersionFetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> Result<String, SError> {
        self.calls.lock().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| SError::NotFound(format!("404 Not Found\n<html>{url}</html>")))
    }
}

/// Every component wired against a [`TestEnv`], without the async layer.
pub struct Harness {
    pub io_lock: Arc<IoLock>,
    pub archives: Arc<Archives>,
    pub enabled_mods: Arc<GameEnabledMods>,
    pub loader: Arc<dyn ModLoader>,
    pub cache: Arc<ModsCache>,
    pub tracker: Arc<ModificationTracker>,
    pub staging: Staging,
}

impl Harness {
    pub fn new(env: &TestEnv) -> Self {
        Self::with_confirmation(env, Arc::new(AlwaysOverwrite))
    }

    pub fn with_confirmation(env: &TestEnv, confirmation: Arc<dyn OverwriteConfirmation>) -> Self {
        let io_lock = Arc::new(IoLock::new());
        let archives = Arc::new(Archives::new(io_lock.clone(), env.archives.clone(), confirmation));
        let enabled_mods = Arc::new(GameEnabledMods::new(io_lock.clone(), GamePathRules::new(&env.game)));
        let loader: Arc<dyn ModLoader> = Arc::new(FolderModLoader::new(
            io_lock.clone(),
            env.mods.clone(),
            env.staging.clone(),
            archives.clone(),
            enabled_mods.clone(),
        ));
        let cache = Arc::new(ModsCache::new());
        let tracker = Arc::new(ModificationTracker::new(ReloadTrigger::new()));
        let staging = Staging::new(StagingContext {
            io_lock: io_lock.clone(),
            mods_folder: env.mods.clone(),
            staging_folder: env.staging.clone(),
            archives: archives.clone(),
            enabled_mods: enabled_mods.clone(),
            loader: loader.clone(),
            cache: cache.clone(),
            tracker: tracker.clone(),
            shutdown: CancellationToken::new(),
        });

        Self {
            io_lock,
            archives,
            enabled_mods,
            loader,
            cache,
            tracker,
            staging,
        }
    }

    pub fn reload(&self) -> Arc<ModList> {
        self.cache.replace(self.loader.reload().unwrap())
    }
}
