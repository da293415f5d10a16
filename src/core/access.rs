use crate::config::AppConfig;
use crate::core::archives::{Archives, OverwriteConfirmation};
use crate::core::game_enabled_mods::GameEnabledMods;
use crate::core::io_lock::IoLock;
use crate::core::mod_loader::{FolderModLoader, ModLoader};
use crate::core::modification::{ModificationTracker, ReloadTrigger};
use crate::core::mods_cache::ModsCache;
use crate::core::staging::{Staging, StagingContext};
use crate::core::version_checker::{VersionChecker, VersionFetcher};
use crate::models::error::SError;
use crate::models::manifest::ArchivesManifest;
use crate::models::mod_dto::{Mod, ModList, ModVariant};
use crate::models::mod_info::{ModId, VersionCheckerInfo};
use crate::models::modification::ModModificationState;
use crate::utils::worker::run_blocking;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct Services {
    io_lock: Arc<IoLock>,
    mods_folder: Utf8PathBuf,
    archives: Arc<Archives>,
    staging: Staging,
    loader: Arc<dyn ModLoader>,
    cache: Arc<ModsCache>,
    tracker: Arc<ModificationTracker>,
    version_checker: VersionChecker,
}

/// Async entry point to the library. Every call runs on tokio's blocking pool.
#[derive(Clone)]
pub struct Access {
    services: Arc<Services>,
    shutdown: CancellationToken,
}

impl Access {
    /// Wires every component for the folders in `config`.
    pub fn new(
        config: &AppConfig,
        fetcher: Arc<dyn VersionFetcher>,
        confirmation: Arc<dyn OverwriteConfirmation>,
    ) -> Result<Self, SError> {
        let game = config.game_paths()?;
        let lib = config.lib_paths();
        let io_lock = Arc::new(IoLock::new());
        let shutdown = CancellationToken::new();

        let archives = Arc::new(Archives::new(
            io_lock.clone(),
            config.archives_path.clone(),
            confirmation,
        ));
        let enabled_mods = Arc::new(GameEnabledMods::new(io_lock.clone(), game.clone()));
        let loader: Arc<dyn ModLoader> = Arc::new(FolderModLoader::new(
            io_lock.clone(),
            game.mods.clone(),
            config.staging_path.clone(),
            archives.clone(),
            enabled_mods.clone(),
        ));
        let cache = Arc::new(ModsCache::new());
        let tracker = Arc::new(ModificationTracker::new(ReloadTrigger::new()));

        let staging = Staging::new(StagingContext {
            io_lock: io_lock.clone(),
            mods_folder: game.mods.clone(),
            staging_folder: config.staging_path.clone(),
            archives: archives.clone(),
            enabled_mods,
            loader: loader.clone(),
            cache: cache.clone(),
            tracker: tracker.clone(),
            shutdown: shutdown.clone(),
        });
        let version_checker = VersionChecker::new(
            io_lock.clone(),
            &lib.version_cache,
            fetcher,
            Duration::from_secs(config.version_check_interval_secs),
        );

        Ok(Self {
            services: Arc::new(Services {
                io_lock,
                mods_folder: game.mods,
                archives,
                staging,
                loader,
                cache,
                tracker,
                version_checker,
            }),
            shutdown,
        })
    }

    async fn blocking<R, F>(&self, f: F) -> Result<R, SError>
    where
        F: FnOnce(&Services) -> Result<R, SError> + Send + 'static,
        R: Send + 'static,
    {
        let services = self.services.clone();
        run_blocking(move || f(&services)).await
    }

    /// Cancels long-running work started through this handle (or any clone of it).
    pub fn shutdown(&self) {
        warn!("Cancelling running operations.");
        self.shutdown.cancel();
    }

    fn cancel_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    // --- Observation ---

    pub fn mods(&self) -> Arc<ModList> {
        self.services.cache.current()
    }

    pub fn subscribe_mods(&self) -> watch::Receiver<Arc<ModList>> {
        self.services.cache.subscribe()
    }

    pub fn modification_states(&self) -> watch::Receiver<HashMap<ModId, ModModificationState>> {
        self.services.tracker.subscribe()
    }

    pub fn reload_events(&self) -> broadcast::Receiver<String> {
        self.services.tracker.reload_trigger().subscribe()
    }

    /// `true` while a filesystem write is in progress.
    pub fn io_busy(&self) -> watch::Receiver<bool> {
        self.services.io_lock.state()
    }

    pub fn archive_status(&self) -> watch::Receiver<String> {
        self.services.archives.status()
    }

    pub fn mods_folder(&self) -> &Utf8Path {
        &self.services.mods_folder
    }

    // --- Library ---

    /// Rescans every location and publishes the new snapshot.
    pub async fn reload(&self) -> Result<Arc<ModList>, SError> {
        self.blocking(|s| Ok(s.cache.replace(s.loader.reload()?))).await
    }

    /// Installs a dropped file or folder into `dest_folder` (usually the mods folder).
    pub async fn install(
        &self,
        input: Utf8PathBuf,
        dest_folder: Utf8PathBuf,
        should_compress: bool,
    ) -> Result<Vec<Utf8PathBuf>, SError> {
        let cancel = self.cancel_token();
        self.blocking(move |s| {
            let written = s.archives.install(&input, &dest_folder, should_compress, &cancel)?;
            s.tracker.reload_trigger().trigger(format!("Installed {input}"));
            Ok(written)
        })
        .await
    }

    // --- Activation ---

    pub async fn change_active_variant(&self, mod_: Mod, variant: Option<ModVariant>) -> Result<(), SError> {
        self.blocking(move |s| s.staging.change_active_variant(&mod_, variant.as_ref()))
            .await
    }

    pub async fn enable_mod_variant(&self, variant: ModVariant) -> Result<(), SError> {
        self.blocking(move |s| s.staging.enable_mod_variant(&variant)).await
    }

    pub async fn disable_mod_variant(&self, variant: ModVariant, change_file_extension: bool) -> Result<(), SError> {
        self.blocking(move |s| s.staging.disable_mod_variant(&variant, change_file_extension))
            .await
    }

    pub async fn disable_mod(&self, mod_: Mod) -> Result<(), SError> {
        self.blocking(move |s| s.staging.disable_mod(&mod_)).await
    }

    pub async fn delete_variant(&self, variant: ModVariant, remove_active_copy: bool) -> Result<(), SError> {
        self.blocking(move |s| s.staging.delete_variant(&variant, remove_active_copy))
            .await
    }

    /// Runs on the current snapshot.
    pub async fn ensure_latest_disabled_variant_visible(&self) -> Result<(), SError> {
        self.blocking(|s| {
            let mods = s.cache.current();
            s.staging.ensure_latest_disabled_variant_visible(&mods.mods)
        })
        .await
    }

    /// Repairs every mod in the current snapshot that has more than one enabled
    /// variant. Returns how many were repaired.
    pub async fn enforce_single_enabled_variants(&self) -> Result<usize, SError> {
        self.blocking(|s| {
            let mods = s.cache.current();
            let mut repaired = 0;
            for mod_ in mods.mods.iter().filter(|m| m.has_enabled_conflict()) {
                match s.staging.enforce_single_enabled_variant(mod_) {
                    Ok(true) => repaired += 1,
                    Ok(false) => {}
                    Err(e) => warn!("Unable to repair {}: {e}", mod_.id),
                }
            }
            Ok(repaired)
        })
        .await
    }

    // --- Archives ---

    /// Archives every mod in `mod_folder` into the archive store.
    pub async fn compress(&self, mod_folder: Utf8PathBuf) -> Result<Vec<Utf8PathBuf>, SError> {
        let cancel = self.cancel_token();
        self.blocking(move |s| {
            let written = s.archives.compress(&mod_folder, &s.archives.folder(), &cancel)?;
            s.tracker.reload_trigger().trigger(format!("Archived {mod_folder}"));
            Ok(written)
        })
        .await
    }

    pub async fn archives_manifest(&self) -> Result<ArchivesManifest, SError> {
        self.blocking(|s| s.archives.archives_manifest()).await
    }

    pub async fn refresh_manifest(&self) -> Result<ArchivesManifest, SError> {
        let cancel = self.cancel_token();
        self.blocking(move |s| s.archives.refresh_manifest(&cancel)).await
    }

    pub async fn remove_archive(&self, variant: ModVariant) -> Result<(), SError> {
        self.blocking(move |s| {
            s.archives.remove_archive(&variant)?;
            s.tracker
                .reload_trigger()
                .trigger(format!("Removed archive of {}", variant.smol_id()));
            Ok(())
        })
        .await
    }

    /// Moves the archive store. The caller persists the new path in its config.
    pub async fn change_archives_path(&self, new_path: Utf8PathBuf) -> Result<(), SError> {
        self.blocking(move |s| {
            s.archives.change_path(&new_path)?;
            info!("Archive store is now at {new_path}");
            Ok(())
        })
        .await
    }

    // --- Versions ---

    /// Looks up online versions for the current snapshot. Returns how many were found.
    pub async fn lookup_versions(&self, force: bool) -> Result<usize, SError> {
        self.blocking(move |s| {
            let mods = s.cache.current();
            s.version_checker.lookup_versions(&mods.mods, force)
        })
        .await
    }

    pub fn online_version(&self, mod_id: &str) -> Option<VersionCheckerInfo> {
        self.services.version_checker.online_version(mod_id)
    }

    pub fn has_update(&self, mod_: &Mod) -> bool {
        self.services.version_checker.has_update(mod_)
    }
}
