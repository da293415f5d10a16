use crate::core::mod_fs::ModFS;
use crate::models::error::SError;
use crate::models::mod_info::DataFiles;
use crate::models::paths::{MOD_INFO_FILE, VERSION_CHECKER_FILE_ENDING};
use crate::utils::file::FileUtils;
use camino::Utf8Path;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use zip::ZipArchive;

pub struct Decompression;

impl Decompression {
    fn open(archive_path: &Utf8Path) -> Result<ZipArchive<BufReader<File>>, SError> {
        let file = File::open(archive_path)?;
        Ok(ZipArchive::new(BufReader::new(file))?)
    }

    /// Unpacks `archive_path` into `destination`, checking `cancel` between entries and chunks.
    /// Entries that would escape `destination` are skipped.
    pub fn extract(
        archive_path: &Utf8Path,
        destination: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<(), SError> {
        let mut archive = Self::open(archive_path)?;
        fs::create_dir_all(destination)?;

        for i in 0..archive.len() {
            if cancel.is_cancelled() {
                return Err(SError::Cancelled);
            }

            let mut entry = archive.by_index(i)?;

            // enclosed_name() rejects absolute paths and `..` components (zip slip).
            let Some(safe_path) = entry.enclosed_name() else {
                debug!("Skipping unsafe archive entry {}", entry.name());
                continue;
            };
            let output_path = destination.as_std_path().join(&safe_path);

            if entry.is_dir() {
                fs::create_dir_all(&output_path)?;
            } else {
                if let Some(parent) = output_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut outfile = File::create(&output_path)?;
                FileUtils::copy_cancellable(&mut entry, &mut outfile, cancel)?;
                trace!("Extracted {}", safe_path.display());
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    let _ = fs::set_permissions(&output_path, fs::Permissions::from_mode(mode));
                }
            }
        }

        Ok(())
    }

    /// Path inside the archive of its mod manifest, matched by file-name suffix.
    /// The shallowest match wins when a package bundles several.
    pub fn find_mod_info_entry(archive_path: &Utf8Path) -> Result<Option<String>, SError> {
        let archive = Self::open(archive_path)?;
        Ok(Self::mod_info_entry_name(&archive))
    }

    fn mod_info_entry_name<R: Read + std::io::Seek>(archive: &ZipArchive<R>) -> Option<String> {
        archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .filter(|name| {
                name.rsplit('/')
                    .next()
                    .is_some_and(|file| file.eq_ignore_ascii_case(MOD_INFO_FILE))
            })
            .min_by_key(|name| name.matches('/').count())
            .map(str::to_owned)
    }

    /// Reads the mod manifest and version checker file straight out of the archive
    /// without unpacking it. `Ok(None)` when the archive holds no manifest.
    pub fn find_data_files(archive_path: &Utf8Path) -> Result<Option<DataFiles>, SError> {
        let mut archive = Self::open(archive_path)?;

        let Some(mod_info_name) = Self::mod_info_entry_name(&archive) else {
            return Ok(None);
        };
        let mod_root = mod_info_name
            .rsplit_once('/')
            .map(|(root, _)| format!("{root}/"))
            .unwrap_or_default();

        let mod_info = ModFS::parse_mod_info(&Self::read_entry(&mut archive, &mod_info_name)?)?;

        let version_file = archive
            .file_names()
            .filter(|name| name.starts_with(&mod_root))
            .find(|name| name.ends_with(VERSION_CHECKER_FILE_ENDING))
            .map(str::to_owned);

        let version_checker_info = match version_file {
            Some(name) => Self::read_entry(&mut archive, &name)
                .and_then(|json| ModFS::parse_version_checker(&json))
                .inspect_err(|e| debug!("Ignoring unreadable {name} in {archive_path}: {e}"))
                .ok(),
            None => None,
        };

        Ok(Some(DataFiles {
            mod_info,
            version_checker_info,
        }))
    }

    fn read_entry<R: Read + std::io::Seek>(
        archive: &mut ZipArchive<R>,
        name: &str,
    ) -> Result<String, SError> {
        let mut entry = archive.by_name(name)?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
