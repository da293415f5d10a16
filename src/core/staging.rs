//! Moves variants between the archive store, the staging folder, and the game's
//! mods folder.
//!
//! A variant is loaded by the game when its folder sits in the mods folder under
//! the canonical manifest name and the mod is listed in `enabled_mods.json`. A
//! variant can be taken out of the game either by renaming its manifest to the
//! disabled name (fast, used when switching variants) or by moving its folder to
//! staging.

use crate::core::archives::Archives;
use crate::core::game_enabled_mods::GameEnabledMods;
use crate::core::io_lock::IoLock;
use crate::core::mod_fs::ModFS;
use crate::core::mod_loader::ModLoader;
use crate::core::modification::ModificationTracker;
use crate::core::mods_cache::ModsCache;
use crate::models::error::SError;
use crate::models::mod_dto::{highest_version, Mod, ModVariant};
use crate::models::modification::ModModificationState;
use crate::models::paths::{
    is_disabled_mod_info_name, is_mod_info_name, MOD_INFO_FILE, MOD_INFO_FILE_DISABLED,
};
use crate::utils::file::FileUtils;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct Staging {
    io_lock: Arc<IoLock>,
    mods_folder: Utf8PathBuf,
    staging_folder: Utf8PathBuf,
    archives: Arc<Archives>,
    enabled_mods: Arc<GameEnabledMods>,
    loader: Arc<dyn ModLoader>,
    cache: Arc<ModsCache>,
    tracker: Arc<ModificationTracker>,
    shutdown: CancellationToken,
}

/// Everything `Staging` works with, bundled for construction.
pub struct StagingContext {
    pub io_lock: Arc<IoLock>,
    pub mods_folder: Utf8PathBuf,
    pub staging_folder: Utf8PathBuf,
    pub archives: Arc<Archives>,
    pub enabled_mods: Arc<GameEnabledMods>,
    pub loader: Arc<dyn ModLoader>,
    pub cache: Arc<ModsCache>,
    pub tracker: Arc<ModificationTracker>,
    pub shutdown: CancellationToken,
}

impl Staging {
    pub fn new(ctx: StagingContext) -> Self {
        Self {
            io_lock: ctx.io_lock,
            mods_folder: ctx.mods_folder,
            staging_folder: ctx.staging_folder,
            archives: ctx.archives,
            enabled_mods: ctx.enabled_mods,
            loader: ctx.loader,
            cache: ctx.cache,
            tracker: ctx.tracker,
            shutdown: ctx.shutdown,
        }
    }

    // --- Public operations ---

    /// Makes `target` the only enabled variant of `mod_`, or disables the mod when `None`.
    pub fn change_active_variant(&self, mod_: &Mod, target: Option<&ModVariant>) -> Result<(), SError> {
        info!(
            "Changing active variant of {} to {:?} (current: {:?}).",
            mod_.id,
            target.map(ModVariant::smol_id),
            mod_.find_first_enabled().map(ModVariant::smol_id)
        );

        // Every exit, including the early ones, clears the state and asks for a reload.
        let scope = self.tracker.begin(
            [mod_.id.clone()],
            ModModificationState::DisablingVariants,
            format!("For mod {}, staged variant: {:?}", mod_.id, target.map(ModVariant::smol_id)),
        );

        if let Some(target) = target {
            let parent_id = self
                .cache
                .current()
                .parent_of(target)
                .map(|m| m.id.clone())
                .unwrap_or_else(|| target.mod_id().to_string());
            if parent_id != mod_.id {
                return Err(SError::Conflict(format!(
                    "Variant {} does not belong to mod {}",
                    target.smol_id(),
                    mod_.id
                )));
            }

            if mod_.is_enabled(target) && mod_.enabled_variants().len() <= 1 {
                info!("Variant is already active, nothing to do: {}", target.smol_id());
                return Ok(());
            }
        } else if !mod_.has_enabled_variant() {
            info!("No variants of {} active, nothing to do.", mod_.id);
            return Ok(());
        }

        let _guard = self.io_lock.write();

        // Anything else left in the mods folder must be invisible to the game.
        let target_id = target.map(ModVariant::smol_id);
        for variant in mod_
            .variants
            .iter()
            .filter(|v| Some(v.smol_id()) != target_id)
        {
            self.take_out_of_game(variant, true)?;
        }

        let Some(target) = target else {
            return self.enabled_mods.disable(&mod_.id);
        };

        // Locations changed on disk, so work from a fresh snapshot.
        let fresh = self.cache.replace(self.loader.reload()?);
        let fresh_variant = fresh.find_variant(&target.smol_id()).ok_or_else(|| {
            SError::NotFound(format!(
                "After disabling, couldn't find mod variant {}",
                target.smol_id()
            ))
        })?;

        scope.set(ModModificationState::EnablingVariant);
        self.enable_variant(fresh_variant)
    }

    /// Puts a single variant into the game. Prefer [`Staging::change_active_variant`],
    /// which also takes the other variants out.
    pub fn enable_mod_variant(&self, variant: &ModVariant) -> Result<(), SError> {
        let _scope = self.tracker.begin(
            [variant.mod_id().to_string()],
            ModModificationState::EnablingVariant,
            format!("Enabled mod: {}", variant.smol_id()),
        );
        let _guard = self.io_lock.write();
        self.enable_variant(variant)
    }

    /// Takes a variant out of the game. With `change_file_extension` its folder stays in
    /// the mods folder with a disabled manifest; otherwise the folder moves to staging.
    pub fn disable_mod_variant(&self, variant: &ModVariant, change_file_extension: bool) -> Result<(), SError> {
        let snapshot = self.cache.current();
        let mod_ = snapshot.parent_of(variant).ok_or_else(|| {
            SError::NotFound(format!("No mod found for variant {}", variant.smol_id()))
        })?;

        let _scope = self.tracker.begin(
            [mod_.id.clone()],
            ModModificationState::DisablingVariants,
            format!("Disabled mod variant: {}", variant.smol_id()),
        );
        let _guard = self.io_lock.write();

        self.take_out_of_game(variant, change_file_extension)?;

        let others_enabled = mod_
            .enabled_variants()
            .iter()
            .any(|v| v.smol_id() != variant.smol_id());
        if !others_enabled {
            self.enabled_mods.disable(&mod_.id)?;
        }
        Ok(())
    }

    /// Disables every enabled variant of `mod_` and removes it from the game's list.
    pub fn disable_mod(&self, mod_: &Mod) -> Result<(), SError> {
        let _scope = self.tracker.begin(
            [mod_.id.clone()],
            ModModificationState::DisablingVariants,
            format!("Disabled mod: {}", mod_.id),
        );
        let _guard = self.io_lock.write();

        for variant in mod_.enabled_variants() {
            self.take_out_of_game(variant, false)?;
        }
        self.enabled_mods.disable(&mod_.id)
    }

    /// Deletes the variant's folder in the mods folder when `remove_active_copy`.
    /// Staged copies and the archive are kept.
    pub fn delete_variant(&self, variant: &ModVariant, remove_active_copy: bool) -> Result<(), SError> {
        info!(
            "Deleting mod variant {} folders. Remove mods folder copy? {remove_active_copy}.",
            variant.smol_id()
        );
        let _scope = self.tracker.begin(
            [variant.mod_id().to_string()],
            ModModificationState::DeletingVariants,
            format!("Deleted mod variant: {}", variant.smol_id()),
        );
        let _guard = self.io_lock.write();

        if !remove_active_copy {
            return Ok(());
        }

        match &variant.mods_folder_info {
            Some(info) if info.folder.exists() => FileUtils::remove_any(&info.folder),
            Some(info) => {
                warn!(
                    "Unable to delete folder for variant {}, {} doesn't exist.",
                    variant.smol_id(),
                    info.folder
                );
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// For every mod the game does not list as enabled, leaves its highest version
    /// visible (as a disabled mod) to the game's own launcher and hides the rest.
    /// Mods listed by the game are left for the user to repair. Failures are logged per mod.
    pub fn ensure_latest_disabled_variant_visible(&self, mods: &[Mod]) -> Result<(), SError> {
        let candidates: Vec<&Mod> = mods.iter().filter(|m| !m.is_enabled_in_game).collect();
        if candidates.is_empty() {
            return Ok(());
        }

        let _scope = self.tracker.begin(
            candidates.iter().map(|m| m.id.clone()),
            ModModificationState::DisablingVariants,
            "Made latest disabled variants visible",
        );
        let _guard = self.io_lock.write();

        for mod_ in candidates {
            if let Err(e) = self.show_latest_variant(mod_) {
                error!("Unable to update launcher visibility of {}: {e}", mod_.id);
            }
        }
        Ok(())
    }

    /// Repairs a mod with several enabled variants by keeping the highest version.
    /// Returns whether anything was changed.
    pub fn enforce_single_enabled_variant(&self, mod_: &Mod) -> Result<bool, SError> {
        if !mod_.has_enabled_conflict() {
            return Ok(false);
        }

        let enabled = mod_.enabled_variants();
        let Some(keep) = highest_version(enabled.iter().copied()) else {
            return Ok(false);
        };
        warn!(
            "{} has {} enabled variants, keeping {}.",
            mod_.id,
            enabled.len(),
            keep.smol_id()
        );

        let _scope = self.tracker.begin(
            [mod_.id.clone()],
            ModModificationState::DisablingVariants,
            format!("Kept single enabled variant of {}", mod_.id),
        );
        let _guard = self.io_lock.write();

        let keep_id = keep.smol_id();
        for variant in enabled.iter().filter(|v| v.smol_id() != keep_id) {
            self.take_out_of_game(variant, true)?;
        }
        Ok(true)
    }

    // --- Filesystem work, always called with the write lock held ---

    /// Puts `variant` into the mods folder under the canonical manifest name and lists
    /// its mod in the registry.
    fn enable_variant(&self, variant: &ModVariant) -> Result<(), SError> {
        let in_mods_folder = variant
            .mods_folder_info
            .as_ref()
            .is_some_and(|i| i.folder.exists());
        let staged = variant
            .staging_info
            .as_ref()
            .map(|i| i.folder.clone())
            .filter(|folder| folder.exists());

        if in_mods_folder {
            debug!("{} is already in the mods folder.", variant.smol_id());
        } else if let Some(folder) = staged {
            if folder.starts_with(&self.mods_folder) {
                Self::restore_manifest_name(&folder)?;
            } else {
                let target = self.mods_folder.join(
                    folder
                        .file_name()
                        .map(str::to_string)
                        .unwrap_or_else(|| variant.generate_variant_folder_name()),
                );
                if target.exists() {
                    return Err(SError::Conflict(format!(
                        "Cannot move {folder} into the mods folder, {target} already exists"
                    )));
                }
                FileUtils::move_dir(&folder, &target)?;
                Self::restore_manifest_name(&target)?;
            }
        } else if variant.archive_info.is_some() {
            self.archives
                .extract_mod(variant, &self.mods_folder, &self.shutdown.child_token())?;
        } else {
            return Err(SError::NotFound(format!(
                "{} has no mods folder, staging, or archive copy",
                variant.smol_id()
            )));
        }

        self.enabled_mods.enable(variant.mod_id())?;
        info!("Enabled {}", variant.smol_id());
        Ok(())
    }

    /// Removes the variant's mods-folder copy from the game without touching the registry.
    fn take_out_of_game(&self, variant: &ModVariant, change_file_extension: bool) -> Result<(), SError> {
        let Some(folder) = variant
            .mods_folder_info
            .as_ref()
            .map(|i| i.folder.as_path())
            .filter(|folder| folder.exists())
        else {
            debug!("{} isn't in the mods folder, nothing to disable.", variant.smol_id());
            return Ok(());
        };

        if change_file_extension {
            return Self::hide_manifest(folder);
        }

        let staged_copy = variant
            .staging_info
            .as_ref()
            .map(|i| i.folder.clone())
            .filter(|f| f.exists() && !f.starts_with(&self.mods_folder))
            .unwrap_or_else(|| self.staging_folder.join(variant.generate_variant_folder_name()));

        if staged_copy.exists() {
            debug!("{staged_copy} already holds {}, deleting {folder}.", variant.smol_id());
            FileUtils::remove_any(folder)?;
        } else {
            FileUtils::move_dir(folder, &staged_copy)?;
            debug!("Moved {folder} to {staged_copy}");
        }
        Ok(())
    }

    fn show_latest_variant(&self, mod_: &Mod) -> Result<(), SError> {
        let in_mods_folder: Vec<(&ModVariant, &Utf8Path)> = mod_
            .variants
            .iter()
            .filter_map(|v| self.folder_in_mods_folder(v).map(|f| (v, f)))
            .collect();

        let Some(latest) = highest_version(in_mods_folder.iter().map(|(v, _)| *v)) else {
            return Ok(());
        };
        let latest_id = latest.smol_id();

        for (variant, folder) in in_mods_folder {
            if variant.smol_id() == latest_id {
                Self::restore_manifest_name(folder)?;
            } else {
                Self::hide_manifest(folder)?;
            }
        }
        Ok(())
    }

    fn folder_in_mods_folder<'a>(&self, variant: &'a ModVariant) -> Option<&'a Utf8Path> {
        variant
            .mods_folder_info
            .as_ref()
            .map(|i| i.folder.as_path())
            .or_else(|| {
                variant
                    .staging_info
                    .as_ref()
                    .map(|i| i.folder.as_path())
                    .filter(|f| f.starts_with(&self.mods_folder))
            })
            .filter(|f| f.exists())
    }

    /// `mod_info.json` -> `mod_info.json.disabled`.
    fn hide_manifest(folder: &Utf8Path) -> Result<(), SError> {
        Self::rename_manifest(folder, is_mod_info_name, MOD_INFO_FILE_DISABLED)
    }

    /// `mod_info.json.disabled` -> `mod_info.json`.
    fn restore_manifest_name(folder: &Utf8Path) -> Result<(), SError> {
        Self::rename_manifest(folder, is_disabled_mod_info_name, MOD_INFO_FILE)
    }

    fn rename_manifest(
        folder: &Utf8Path,
        is_source: fn(&str) -> bool,
        new_name: &str,
    ) -> Result<(), SError> {
        let current = ModFS::find_mod_info_file(folder)
            .ok_or_else(|| SError::InvalidPackage(format!("No mod manifest in {folder}")))?;

        if !current.file_name().is_some_and(is_source) {
            return Ok(());
        }

        let target = folder.join(new_name);
        FileUtils::remove_any(&target)?;
        fs::rename(&current, &target)?;
        debug!("Renamed {current} to {target}");
        Ok(())
    }
}
