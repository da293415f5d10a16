use crate::core::mod_fs::ModFS;
use crate::models::error::SError;
use crate::models::paths::{is_disabled_mod_info_name, MOD_INFO_FILE};
use crate::utils::file::FileUtils;
use camino::Utf8Path;
use std::fs::{self, File};
use std::io::BufWriter;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Progress of a single archive being written.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressionProgress {
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub current_file: String,
}

impl CompressionProgress {
    pub fn percent(&self) -> f32 {
        if self.bytes_total == 0 {
            return 100.0;
        }
        (self.bytes_done as f32 / self.bytes_total as f32) * 100.0
    }
}

pub struct Compression;

impl Compression {
    /// Writes every entry below `mod_folder` into a new zip at `archive_file`.
    ///
    /// Entry paths are relative to `mod_folder`, so the manifest sits at the archive root.
    /// A parked manifest is stored under the canonical name.
    /// On cancellation or any failure the partial archive is deleted before returning.
    pub fn compress_folder(
        mod_folder: &Utf8Path,
        archive_file: &Utf8Path,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(CompressionProgress),
    ) -> Result<(), SError> {
        let result = Self::write_archive(mod_folder, archive_file, cancel, on_progress);

        if let Err(e) = &result {
            if e.is_cancelled() {
                warn!("Cancelled archiving {mod_folder}, removing {archive_file}");
            }
            if let Err(cleanup) = FileUtils::remove_any(archive_file) {
                warn!("Unable to remove partial archive {archive_file}: {cleanup}");
            }
        }

        result
    }

    fn write_archive(
        mod_folder: &Utf8Path,
        archive_file: &Utf8Path,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(CompressionProgress),
    ) -> Result<(), SError> {
        let entries = ModFS::collect_entries(mod_folder)?;
        let bytes_total: u64 = entries
            .iter()
            .filter(|(_, is_dir)| !is_dir)
            .filter_map(|(rel, _)| fs::metadata(mod_folder.join(rel)).ok())
            .map(|m| m.len())
            .sum();

        if let Some(parent) = archive_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = ZipWriter::new(BufWriter::new(File::create(archive_file)?));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut bytes_done = 0u64;
        let has_canonical_manifest = mod_folder.join(MOD_INFO_FILE).is_file();

        for (rel, is_dir) in entries {
            if cancel.is_cancelled() {
                return Err(SError::Cancelled);
            }

            let parked_manifest =
                !is_dir && rel.components().count() == 1 && is_disabled_mod_info_name(rel.as_str());
            if parked_manifest && has_canonical_manifest {
                continue;
            }

            // Zip entry names always use forward slashes.
            let name = if parked_manifest {
                MOD_INFO_FILE.to_string()
            } else {
                rel.components().map(|c| c.as_str()).collect::<Vec<_>>().join("/")
            };

            if is_dir {
                writer.add_directory(name, options)?;
                continue;
            }

            writer.start_file(name.as_str(), options)?;
            let mut source = File::open(mod_folder.join(&rel))?;
            bytes_done += FileUtils::copy_cancellable(&mut source, &mut writer, cancel)?;
            trace!("Archived {name}");

            on_progress(CompressionProgress {
                bytes_done,
                bytes_total,
                current_file: name,
            });
        }

        writer.finish()?.into_inner().map_err(|e| SError::from(e.into_error()))?;
        Ok(())
    }
}
