use crate::core::compression::{Compression, CompressionProgress};
use crate::core::decompression::Decompression;
use crate::core::io_lock::IoLock;
use crate::core::mod_fs::ModFS;
use crate::models::error::SError;
use crate::models::manifest::{ArchivesManifest, ManifestItemValue};
use crate::models::mod_dto::{create_smol_id, ModVariant};
use crate::models::mod_info::ModInfo;
use crate::models::paths::{is_mod_info_name, ArchivePaths, ARCHIVE_EXTENSION};
use crate::utils::file::FileUtils;
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Asked before an install replaces something that already exists.
pub trait OverwriteConfirmation: Send + Sync {
    fn confirm_overwrite(&self, existing: &Utf8Path) -> bool;
}

/// Always says yes. Used when nobody is around to ask.
pub struct AlwaysOverwrite;

impl OverwriteConfirmation for AlwaysOverwrite {
    fn confirm_overwrite(&self, _existing: &Utf8Path) -> bool {
        true
    }
}

/// The compressed store of every variant ever archived, plus its manifest.
pub struct Archives {
    io_lock: Arc<IoLock>,
    folder: RwLock<Utf8PathBuf>,
    status: watch::Sender<String>,
    confirmation: Arc<dyn OverwriteConfirmation>,
}

/// `{id with '-' replaced by '_'}{version}-{smolId}.zip`, with characters
/// that are invalid in file names replaced.
pub fn archive_file_name(mod_info: &ModInfo) -> String {
    let stem = format!(
        "{}{}-{}",
        mod_info.id.replace('-', "_"),
        mod_info.version,
        create_smol_id(&mod_info.id, &mod_info.version)
    );
    let stem: String = stem
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect();
    format!("{stem}.{ARCHIVE_EXTENSION}")
}

impl Archives {
    pub fn new(
        io_lock: Arc<IoLock>,
        folder: Utf8PathBuf,
        confirmation: Arc<dyn OverwriteConfirmation>,
    ) -> Self {
        let (status, _) = watch::channel(String::new());
        Self {
            io_lock,
            folder: RwLock::new(folder),
            status,
            confirmation,
        }
    }

    pub fn folder(&self) -> Utf8PathBuf {
        self.folder.read().clone()
    }

    fn paths(&self) -> ArchivePaths {
        ArchivePaths::new(&self.folder())
    }

    /// Human-readable progress of the current archive operation.
    pub fn status(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }

    fn publish(&self, message: impl Into<String>) {
        self.status.send_replace(message.into());
    }

    // --- Manifest ---

    /// Loads the manifest. A missing file is an empty manifest; an unreadable one is
    /// backed up (unless a backup already exists) and replaced by an empty one.
    pub fn archives_manifest(&self) -> Result<ArchivesManifest, SError> {
        let paths = self.paths();

        let text = match self.io_lock.with_read(|| fs::read_to_string(&paths.manifest)) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ArchivesManifest::default())
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<ArchivesManifest>(&text) {
            Ok(manifest) => Ok(manifest),
            Err(e) => {
                warn!("Archive manifest at {} is corrupt, resetting it: {e}", paths.manifest);
                self.io_lock.with_write(|| Self::reset_manifest(&paths))?;
                Ok(ArchivesManifest::default())
            }
        }
    }

    fn reset_manifest(paths: &ArchivePaths) -> Result<(), SError> {
        if paths.manifest.exists() && !paths.manifest_backup.exists() {
            if let Err(e) = fs::copy(&paths.manifest, &paths.manifest_backup) {
                error!("Unable to back up {}: {e}", paths.manifest);
            }
        }
        Self::write_manifest(paths, &ArchivesManifest::default())
    }

    fn write_manifest(paths: &ArchivePaths, manifest: &ArchivesManifest) -> Result<(), SError> {
        if let Some(parent) = paths.manifest.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = paths.manifest.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(manifest)?)?;
        fs::rename(&tmp, &paths.manifest)?;
        Ok(())
    }

    /// Read-modify-write of the manifest under the write lock. Nothing is written when
    /// `mutate` leaves the manifest unchanged.
    pub fn update_manifest(
        &self,
        mutate: impl FnOnce(&mut ArchivesManifest),
    ) -> Result<ArchivesManifest, SError> {
        let _guard = self.io_lock.write();
        let original = self.archives_manifest()?;
        let mut updated = original.clone();
        mutate(&mut updated);

        if updated == original {
            info!("No manifest change, not updating file.");
            return Ok(updated);
        }

        let paths = self.paths();
        Self::write_manifest(&paths, &updated)?;
        info!(
            "Updated manifest at {} from {} to {} items.",
            paths.manifest,
            original.len(),
            updated.len()
        );
        Ok(updated)
    }

    /// Rebuilds the manifest from the archives on disk. Archives that can't be read
    /// are logged and left out.
    pub fn refresh_manifest(&self, cancel: &CancellationToken) -> Result<ArchivesManifest, SError> {
        let start = Instant::now();
        let paths = self.paths();
        let folder = self.folder();

        if !folder.is_dir() {
            debug!("Archive folder {folder} doesn't exist, nothing to refresh.");
            return self.update_manifest(|m| m.manifest_items.clear());
        }

        let items: Vec<(u32, ManifestItemValue)> = {
            let _guard = self.io_lock.read();
            let archives: Vec<Utf8PathBuf> = FileUtils::list_dir(&folder)?
                .into_iter()
                .filter(|p| p.is_file() && !paths.is_bookkeeping(p))
                .collect();

            archives
                .par_iter()
                .filter_map(|archive| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let started = Instant::now();
                    match Decompression::find_data_files(archive) {
                        Ok(Some(data)) => {
                            debug!(
                                "Read {} {} from {archive} in {:?}.",
                                data.mod_info.id,
                                data.mod_info.version,
                                started.elapsed()
                            );
                            Some((
                                ArchivesManifest::key_for(&data.mod_info),
                                ManifestItemValue {
                                    archive_path: archive.clone(),
                                    mod_info: data.mod_info,
                                    version_checker_info: data.version_checker_info,
                                },
                            ))
                        }
                        Ok(None) => {
                            debug!("No mod manifest inside {archive}, skipping.");
                            None
                        }
                        Err(e) => {
                            warn!("Unable to read {archive}: {e}");
                            None
                        }
                    }
                })
                .collect()
        };

        if cancel.is_cancelled() {
            return Err(SError::Cancelled);
        }

        let count = items.len();
        let manifest = self.update_manifest(|m| m.manifest_items = items.into_iter().collect())?;
        info!("Time to refresh manifest: {:?} ({count} items).", start.elapsed());
        Ok(manifest)
    }

    // --- Archiving ---

    /// Archives every mod found in `mod_folder` into `dest_folder`, skipping mods that
    /// already have an archive. Returns the archives written.
    pub fn compress(
        &self,
        mod_folder: &Utf8Path,
        dest_folder: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<Utf8PathBuf>, SError> {
        let result = self.compress_mods(mod_folder, dest_folder, cancel);
        match &result {
            Ok(_) => self.publish("Finished adding mods to archive."),
            Err(e) => self.publish(e.to_string()),
        }
        result
    }

    fn compress_mods(
        &self,
        mod_folder: &Utf8Path,
        dest_folder: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<Utf8PathBuf>, SError> {
        let mods = self.io_lock.with_read(|| ModFS::find_mods_in_folder(mod_folder))?;
        if mods.is_empty() {
            return Err(SError::InvalidPackage(format!("No mods found in {mod_folder}")));
        }

        let manifest = self.archives_manifest()?;
        let mut written = Vec::new();

        for mod_fs in mods {
            let mod_info = mod_fs.mod_info();
            let key = ArchivesManifest::key_for(mod_info);
            if manifest.contains_archive(key) {
                debug!("[{}, {}] archive already exists, skipping.", mod_info.id, mod_info.version);
                continue;
            }

            let archive_file = dest_folder.join(archive_file_name(mod_info));
            match self.compress_one(&mod_fs, &archive_file, cancel) {
                Ok(()) => written.push(archive_file),
                Err(SError::Cancelled) => return Err(SError::Cancelled),
                Err(e) => warn!("Unable to archive {}: {e}", mod_fs.root),
            }
        }

        self.refresh_manifest(cancel)?;
        Ok(written)
    }

    fn compress_one(
        &self,
        mod_fs: &ModFS,
        archive_file: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<(), SError> {
        let mod_info = mod_fs.mod_info();
        let _guard = self.io_lock.write();

        Compression::compress_folder(&mod_fs.root, archive_file, cancel, &mut |p: CompressionProgress| {
            let message = format!(
                "[{:.2}%] Archiving '{} v{}'. File: {}",
                p.percent(),
                mod_info.id,
                mod_info.version,
                p.current_file
            );
            trace!("{message}");
            self.publish(message);
        })?;

        info!("Archived {} {} to {archive_file}", mod_info.id, mod_info.version);
        Ok(())
    }

    // --- Installing ---

    /// Installs a mod from a dropped `mod_info.json`, an archive, or a folder into
    /// `dest_folder`. With `should_compress` the result is archived into `dest_folder`
    /// instead of unpacked. Returns what was written.
    pub fn install(
        &self,
        input: &Utf8Path,
        dest_folder: &Utf8Path,
        should_compress: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Utf8PathBuf>, SError> {
        if !input.exists() {
            return Err(SError::NotFound(format!("File does not exist: {input}")));
        }
        fs::create_dir_all(dest_folder)?;

        // Chain strategies: dropped manifest -> archive -> folder.
        self.install_from_mod_info(input, dest_folder, should_compress, cancel)
            .or_else(|| self.install_from_archive(input, dest_folder, should_compress, cancel))
            .or_else(|| self.install_from_folder(input, dest_folder, should_compress, cancel))
            .unwrap_or_else(|| {
                Err(SError::InvalidPackage(format!(
                    "{input} not recognized as file or folder."
                )))
            })
            .inspect(|written| info!("Installed {input} as {written:?}"))
    }

    fn install_from_mod_info(
        &self,
        input: &Utf8Path,
        dest_folder: &Utf8Path,
        should_compress: bool,
        cancel: &CancellationToken,
    ) -> Option<Result<Vec<Utf8PathBuf>, SError>> {
        let name = input.file_name()?;
        if !input.is_file() || !is_mod_info_name(name) {
            return None;
        }

        Some(match input.parent() {
            Some(mod_folder) if mod_folder.is_dir() => {
                self.copy_or_compress_folder(mod_folder, dest_folder, should_compress, cancel)
            }
            _ => Err(SError::NotFound(format!("No mod folder around {input}"))),
        })
    }

    fn install_from_archive(
        &self,
        input: &Utf8Path,
        dest_folder: &Utf8Path,
        should_compress: bool,
        cancel: &CancellationToken,
    ) -> Option<Result<Vec<Utf8PathBuf>, SError>> {
        if !input.is_file() {
            return None;
        }
        Some(self.install_archive(input, dest_folder, should_compress, cancel))
    }

    fn install_archive(
        &self,
        archive: &Utf8Path,
        dest_folder: &Utf8Path,
        should_compress: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Utf8PathBuf>, SError> {
        let data = self
            .io_lock
            .with_read(|| Decompression::find_data_files(archive))?
            .ok_or_else(|| {
                SError::InvalidPackage(format!("Archive did not have a valid mod_info.json inside: {archive}"))
            })?;

        if should_compress {
            let target = dest_folder.join(archive.file_name().unwrap_or("archive.zip"));
            if FileUtils::same_location(archive, &target) {
                debug!("{archive} is already in {dest_folder}");
            } else {
                self.confirm_overwrite(&target)?;
                self.copy_archive(archive, &target, dest_folder)?;
            }
            self.refresh_manifest(cancel)?;
            return Ok(vec![target]);
        }

        let variant = ModVariant::new(data.mod_info, data.version_checker_info);
        let target = dest_folder.join(variant.generate_variant_folder_name());
        self.confirm_overwrite(&target)?;

        let temp_root = dest_folder.join(format!(".install-{}", Uuid::new_v4()));
        let _guard = self.io_lock.write();
        let result = Decompression::extract(archive, &temp_root, cancel)
            .and_then(|_| self.removed_nested_folders(&temp_root))
            .and_then(|_| FileUtils::remove_any(&target))
            .and_then(|_| FileUtils::move_dir(&temp_root, &target));

        if result.is_err() {
            if let Err(e) = FileUtils::remove_any(&temp_root) {
                warn!("Unable to clean up {temp_root}: {e}");
            }
        }
        result.map(|_| vec![target])
    }

    fn install_from_folder(
        &self,
        input: &Utf8Path,
        dest_folder: &Utf8Path,
        should_compress: bool,
        cancel: &CancellationToken,
    ) -> Option<Result<Vec<Utf8PathBuf>, SError>> {
        if !input.is_dir() {
            return None;
        }
        Some(self.copy_or_compress_folder(input, dest_folder, should_compress, cancel))
    }

    fn copy_or_compress_folder(
        &self,
        mod_folder: &Utf8Path,
        dest_folder: &Utf8Path,
        should_compress: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Utf8PathBuf>, SError> {
        if should_compress {
            return self.compress(mod_folder, dest_folder, cancel);
        }

        let name = mod_folder
            .file_name()
            .ok_or_else(|| SError::InvalidPackage(format!("Unnamed folder: {mod_folder}")))?;
        let target = dest_folder.join(name);
        if FileUtils::same_location(mod_folder, &target) {
            debug!("{mod_folder} is already in {dest_folder}");
            return Ok(vec![target]);
        }
        if FileUtils::is_within(mod_folder, &target) || FileUtils::is_within(dest_folder, mod_folder) {
            return Err(SError::Conflict(format!(
                "Cannot install {mod_folder} into {target}, one contains the other"
            )));
        }
        self.confirm_overwrite(&target)?;

        // Copy next to the target first so a failed copy leaves the existing folder alone.
        let temp = dest_folder.join(format!(".install-{}", Uuid::new_v4()));
        let _guard = self.io_lock.write();
        let result = FileUtils::copy_recursive(mod_folder, &temp)
            .and_then(|_| FileUtils::remove_any(&target))
            .and_then(|_| FileUtils::move_dir(&temp, &target));

        if result.is_err() {
            if let Err(e) = FileUtils::remove_any(&temp) {
                warn!("Unable to clean up {temp}: {e}");
            }
        }
        result.map(|_| vec![target])
    }

    fn copy_archive(&self, archive: &Utf8Path, target: &Utf8Path, dest_folder: &Utf8Path) -> Result<(), SError> {
        let temp = dest_folder.join(format!(".install-{}.zip", Uuid::new_v4()));
        let _guard = self.io_lock.write();
        fs::create_dir_all(dest_folder)?;

        let result = fs::copy(archive, &temp)
            .and_then(|_| fs::rename(&temp, target))
            .map_err(SError::from);
        if result.is_err() {
            if let Err(e) = FileUtils::remove_any(&temp) {
                warn!("Unable to clean up {temp}: {e}");
            }
        }
        result
    }

    fn confirm_overwrite(&self, target: &Utf8Path) -> Result<(), SError> {
        if target.exists() && !self.confirmation.confirm_overwrite(target) {
            return Err(SError::Conflict(format!("Not overwriting {target}")));
        }
        Ok(())
    }

    // --- Extracting ---

    /// Rearranges `folder` so that its mod manifest sits directly inside it.
    ///
    /// The folder holding the manifest is renamed to a temporary name inside `folder`,
    /// the wrapper folders it left behind are removed once empty, and the temporary
    /// folder's contents are moved up into `folder`.
    pub fn removed_nested_folders(&self, folder: &Utf8Path) -> Result<(), SError> {
        if !folder.is_dir() {
            return Err(SError::NotFound(format!("Not a folder: {folder}")));
        }

        let mod_info_file = WalkDir::new(folder)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_str().is_some_and(is_mod_info_name))
            .min_by_key(|e| e.depth())
            .ok_or_else(|| SError::NotFound(format!("Expected a mod_info.json in {folder}")))?;
        let mod_info_file = FileUtils::utf8(mod_info_file.path())?.to_path_buf();

        let source = match mod_info_file.parent() {
            Some(parent) if parent != folder => parent.to_path_buf(),
            _ => return Ok(()),
        };

        let _guard = self.io_lock.write();
        let temp = folder.join(Uuid::new_v4().to_string());

        // 1. Move the real mod folder out of its wrappers.
        fs::rename(&source, &temp)?;

        // 2. Remove the wrapper chain, stopping at the first folder that still has content.
        let mut wrapper = source.parent();
        while let Some(dir) = wrapper {
            if dir == folder || fs::remove_dir(dir).is_err() {
                break;
            }
            wrapper = dir.parent();
        }

        // 3. Move the mod up to the top, unless that would overwrite something left in `folder`.
        let collisions: Vec<String> = FileUtils::list_dir(&temp)?
            .iter()
            .filter_map(|child| child.file_name())
            .filter(|name| folder.join(name).exists())
            .map(str::to_string)
            .collect();
        if !collisions.is_empty() {
            if let Some(parent) = source.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&temp, &source)?;
            return Err(SError::Conflict(format!(
                "Cannot flatten {source} into {folder}, these already exist: {}",
                collisions.join(", ")
            )));
        }
        FileUtils::move_contents(&temp, folder)?;
        fs::remove_dir(&temp)?;

        debug!("Flattened {source} into {folder}");
        Ok(())
    }

    /// Unpacks an archived variant into `dest_folder/{variant folder name}`.
    pub fn extract_mod(
        &self,
        variant: &ModVariant,
        dest_folder: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<Utf8PathBuf, SError> {
        let archive = variant
            .archive_info
            .as_ref()
            .ok_or_else(|| SError::NotFound(format!("{} is not archived", variant.smol_id())))?;

        let mod_folder = dest_folder.join(variant.generate_variant_folder_name());
        let _guard = self.io_lock.write();

        let result = Decompression::extract(&archive.path, &mod_folder, cancel)
            .and_then(|_| self.removed_nested_folders(&mod_folder));

        if let Err(e) = result {
            if let Err(cleanup) = FileUtils::remove_any(&mod_folder) {
                warn!("Unable to clean up {mod_folder}: {cleanup}");
            }
            return Err(e);
        }

        info!("Extracted {} to {mod_folder}", archive.path);
        Ok(mod_folder)
    }

    // --- Maintenance ---

    /// Deletes a variant's archive and drops it from the manifest.
    pub fn remove_archive(&self, variant: &ModVariant) -> Result<(), SError> {
        let archive = variant
            .archive_info
            .as_ref()
            .ok_or_else(|| SError::NotFound(format!("{} is not archived", variant.smol_id())))?;

        let _guard = self.io_lock.write();
        FileUtils::remove_any(&archive.path)?;
        self.update_manifest(|m| {
            m.manifest_items.retain(|_, item| item.archive_path != archive.path);
        })?;
        info!("Removed archive {}", archive.path);
        Ok(())
    }

    /// Moves the whole archive folder to `new_path` and points the store there.
    pub fn change_path(&self, new_path: &Utf8Path) -> Result<(), SError> {
        let _guard = self.io_lock.write();
        let old = self.folder();

        if old == new_path {
            return Ok(());
        }

        if old.exists() {
            FileUtils::move_contents(&old, new_path)?;
            if let Err(e) = fs::remove_dir(&old) {
                warn!("Left old archive folder {old} behind: {e}");
            }
        } else {
            fs::create_dir_all(new_path)?;
        }

        *self.folder.write() = new_path.to_path_buf();
        info!("Moved archives from {old} to {new_path}");

        // Stored archive paths point at the old folder.
        self.refresh_manifest(&CancellationToken::new())?;
        Ok(())
    }
}
