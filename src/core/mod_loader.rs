use crate::core::archives::Archives;
use crate::core::game_enabled_mods::GameEnabledMods;
use crate::core::io_lock::IoLock;
use crate::core::mod_fs::ModFS;
use crate::models::error::SError;
use crate::models::mod_dto::{ArchiveInfo, Mod, ModList, ModVariant, ModsFolderInfo, StagingInfo};
use crate::models::mod_info::ModId;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Produces a fresh snapshot of every mod the library knows about.
pub trait ModLoader: Send + Sync {
    fn reload(&self) -> Result<ModList, SError>;
}

/// Scans the game's mods folder, the staging folder, and the archive manifest.
///
/// A mods-folder copy whose manifest carries the disabled name counts as staged
/// rather than loaded.
pub struct FolderModLoader {
    io_lock: Arc<IoLock>,
    mods_folder: Utf8PathBuf,
    staging_folder: Utf8PathBuf,
    archives: Arc<Archives>,
    enabled_mods: Arc<GameEnabledMods>,
}

impl FolderModLoader {
    pub fn new(
        io_lock: Arc<IoLock>,
        mods_folder: Utf8PathBuf,
        staging_folder: Utf8PathBuf,
        archives: Arc<Archives>,
        enabled_mods: Arc<GameEnabledMods>,
    ) -> Self {
        Self {
            io_lock,
            mods_folder,
            staging_folder,
            archives,
            enabled_mods,
        }
    }

    fn scan_folder(folder: &Utf8Path) -> Result<Vec<ModFS>, SError> {
        if !folder.is_dir() {
            debug!("{folder} doesn't exist, no mods there.");
            return Ok(Vec::new());
        }
        ModFS::find_mods_in_folder(folder)
    }

    fn from_mods_folder(mod_fs: ModFS) -> ModVariant {
        let parked = mod_fs.is_parked();
        let folder = mod_fs.root;
        let mut variant = ModVariant::new(
            mod_fs.data_files.mod_info,
            mod_fs.data_files.version_checker_info,
        );
        if parked {
            variant.staging_info = Some(StagingInfo { folder });
        } else {
            variant.mods_folder_info = Some(ModsFolderInfo { folder });
        }
        variant
    }

    fn from_staging(mod_fs: ModFS) -> ModVariant {
        let mut variant = ModVariant::new(
            mod_fs.data_files.mod_info,
            mod_fs.data_files.version_checker_info,
        );
        variant.staging_info = Some(StagingInfo {
            folder: mod_fs.root,
        });
        variant
    }
}

impl ModLoader for FolderModLoader {
    fn reload(&self) -> Result<ModList, SError> {
        let start = Instant::now();
        let enabled: HashSet<ModId> = self
            .enabled_mods
            .enabled_mods()?
            .enabled_mods
            .into_iter()
            .collect();
        let manifest = self.archives.archives_manifest()?;

        let _guard = self.io_lock.read();

        // 1. Loaded and parked copies in the game's mods folder.
        let mut variants: Vec<ModVariant> = Self::scan_folder(&self.mods_folder)?
            .into_iter()
            .map(Self::from_mods_folder)
            .collect();

        // 2. Copies held back in staging.
        variants.extend(
            Self::scan_folder(&self.staging_folder)?
                .into_iter()
                .map(Self::from_staging),
        );

        // 3. Archives that are still on disk.
        variants.extend(
            manifest
                .manifest_items
                .into_values()
                .filter(|item| item.archive_path.exists())
                .map(|item| {
                    let mut variant = ModVariant::new(item.mod_info, item.version_checker_info);
                    variant.archive_info = Some(ArchiveInfo {
                        path: item.archive_path,
                    });
                    variant
                }),
        );

        let mut by_id: BTreeMap<ModId, Vec<ModVariant>> = BTreeMap::new();
        for variant in variants {
            by_id
                .entry(variant.mod_id().to_string())
                .or_default()
                .push(variant);
        }

        let mods: Vec<Mod> = by_id
            .into_iter()
            .map(|(id, variants)| {
                let is_enabled = enabled.contains(&id);
                Mod::new(id, is_enabled, variants)
            })
            .collect();

        info!("Loaded {} mods in {:?}.", mods.len(), start.elapsed());
        Ok(ModList::new(mods))
    }
}
