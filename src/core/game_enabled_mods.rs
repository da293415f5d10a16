use crate::core::io_lock::IoLock;
use crate::models::error::SError;
use crate::models::mod_info::EnabledMods;
use crate::models::paths::GamePathRules;
use crate::utils::json::from_lenient_str;
use camino::Utf8Path;
use std::fs;
use std::sync::Arc;
use tracing::{debug, info};

/// The game's own list of mods to load, `mods/enabled_mods.json`.
///
/// A copy of the file is kept as `enabled_mods.json.bak` the first time it is modified.
pub struct GameEnabledMods {
    io_lock: Arc<IoLock>,
    paths: GamePathRules,
}

impl GameEnabledMods {
    pub fn new(io_lock: Arc<IoLock>, paths: GamePathRules) -> Self {
        Self { io_lock, paths }
    }

    /// Reads the registry, creating an empty one if the game has none yet.
    pub fn enabled_mods(&self) -> Result<EnabledMods, SError> {
        if !self.paths.enabled_mods.exists() {
            let _guard = self.io_lock.write();
            if !self.paths.enabled_mods.exists() {
                Self::write(&self.paths.enabled_mods, &EnabledMods::default())?;
            }
        }

        let _guard = self.io_lock.read();
        from_lenient_str(&fs::read_to_string(&self.paths.enabled_mods)?)
    }

    pub fn is_enabled(&self, mod_id: &str) -> Result<bool, SError> {
        Ok(self
            .enabled_mods()?
            .enabled_mods
            .iter()
            .any(|id| id == mod_id))
    }

    pub fn enable(&self, mod_id: &str) -> Result<(), SError> {
        self.update(|mut enabled| {
            if !enabled.enabled_mods.iter().any(|id| id == mod_id) {
                enabled.enabled_mods.push(mod_id.to_string());
            }
            enabled.enabled_mods.sort_by_key(|id| id.to_lowercase());
            Some(enabled)
        })?;
        info!("Enabled mod for game: {mod_id}");
        Ok(())
    }

    pub fn disable(&self, mod_id: &str) -> Result<(), SError> {
        self.update(|mut enabled| {
            let before = enabled.enabled_mods.len();
            enabled.enabled_mods.retain(|id| id != mod_id);
            if enabled.enabled_mods.len() == before {
                debug!("Mod was already disabled: {mod_id}");
                return None;
            }
            Some(enabled)
        })?;
        info!("Disabled mod for game: {mod_id}");
        Ok(())
    }

    /// `mutate` returns `None` when there is nothing to write.
    fn update(&self, mutate: impl FnOnce(EnabledMods) -> Option<EnabledMods>) -> Result<(), SError> {
        let _guard = self.io_lock.write();
        let previous = self.enabled_mods()?;

        if !self.paths.enabled_mods_backup.exists() {
            fs::copy(&self.paths.enabled_mods, &self.paths.enabled_mods_backup)?;
        }

        if let Some(updated) = mutate(previous) {
            Self::write(&self.paths.enabled_mods, &updated)?;
        }
        Ok(())
    }

    fn write(path: &Utf8Path, enabled: &EnabledMods) -> Result<(), SError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(enabled)?)?;
        Ok(())
    }
}
