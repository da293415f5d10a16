use crate::models::error::SError;
use crate::models::paths::{GamePathRules, LibPathRules};
use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const APP_NAME: &str = "mod_vault";
const CONFIG_NAME: &str = "config";

/// User settings, persisted with `confy` in the platform config folder.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub version: u8,
    /// Where the library keeps its own files (version cache, logs).
    pub data_path: Utf8PathBuf,
    /// Game install folder; its `mods` folder is what the game loads.
    pub game_path: Option<Utf8PathBuf>,
    pub archives_path: Utf8PathBuf,
    pub staging_path: Utf8PathBuf,
    pub version_check_interval_secs: u64,
    /// `EnvFilter` directive, e.g. `info` or `mod_vault=debug`.
    pub log_level: String,
    pub log_to_file: bool,
}

/// Where the library keeps its own files when nothing else is configured.
pub fn data_dir() -> Utf8PathBuf {
    let dir = ProjectDirs::from("com", "martes", APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe_path| exe_path.parent().map(|p| p.to_path_buf()))
        })
        .unwrap_or_else(|| PathBuf::from("."));

    Utf8PathBuf::from_path_buf(dir).unwrap_or_else(|_| Utf8PathBuf::from("."))
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_path = data_dir();
        let lib = LibPathRules::new(&data_path);
        Self {
            version: 0,
            data_path,
            game_path: None,
            archives_path: lib.archives,
            staging_path: lib.staging,
            version_check_interval_secs: 5 * 60,
            log_level: "info".to_string(),
            log_to_file: true,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<AppConfig, SError> {
        Ok(confy::load(APP_NAME, CONFIG_NAME)?)
    }

    pub fn save(&self) -> Result<(), SError> {
        Ok(confy::store(APP_NAME, CONFIG_NAME, self)?)
    }

    pub fn load_path(path: &Utf8Path) -> Result<AppConfig, SError> {
        Ok(confy::load_path(path)?)
    }

    pub fn store_path(&self, path: &Utf8Path) -> Result<(), SError> {
        Ok(confy::store_path(path, self)?)
    }

    pub fn lib_paths(&self) -> LibPathRules {
        LibPathRules::new(&self.data_path)
    }

    /// Paths inside the game folder. Fails when no game folder is configured.
    pub fn game_paths(&self) -> Result<GamePathRules, SError> {
        self.game_path
            .as_deref()
            .map(GamePathRules::new)
            .ok_or_else(|| SError::Config("Game path is not set".into()))
    }

    /// Reports every configured path that is missing or unusable.
    pub fn validate(&self) -> Result<(), SError> {
        let mut problems = Vec::new();

        match &self.game_path {
            None => problems.push("Game path invalid or not set!".to_string()),
            Some(path) => match dunce::canonicalize(path) {
                Err(_) => problems.push(format!("Game path '{path}' doesn't exist!")),
                Ok(canonical) if !canonical.join("mods").is_dir() => {
                    problems.push(format!("Game path '{path}' has no 'mods' folder!"))
                }
                Ok(_) => {}
            },
        }

        for (label, path) in [("Archives", &self.archives_path), ("Staging", &self.staging_path)] {
            if path.exists() && !path.is_dir() {
                problems.push(format!("{label} path '{path}' is not a folder!"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SError::Config(problems.join(" ")))
        }
    }
}
