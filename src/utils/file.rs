use crate::models::error::SError;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::{Read, Write};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

const COPY_CHUNK: usize = 64 * 1024;

pub struct FileUtils;

impl FileUtils {
    /// Recursively copies a directory tree from source to destination.
    /// Creates all necessary directories and overwrites existing files.
    pub fn copy_recursive(src: &Utf8Path, dst: &Utf8Path) -> Result<(), SError> {
        fs::create_dir_all(dst)?;

        for entry in WalkDir::new(src) {
            let entry = entry?;
            let src_path = Self::utf8(entry.path())?;
            let dst_path = dst.join(src_path.strip_prefix(src)?);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&dst_path)?;
            } else {
                if let Some(parent) = dst_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(src_path, &dst_path)?;
            }
        }

        Ok(())
    }

    /// Moves a directory. Falls back to copy + delete when a rename is not possible
    /// (e.g. across filesystems).
    pub fn move_dir(src: &Utf8Path, dst: &Utf8Path) -> Result<(), SError> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }

        if fs::rename(src, dst).is_ok() {
            return Ok(());
        }

        Self::copy_recursive(src, dst)?;
        fs::remove_dir_all(src)?;
        Ok(())
    }

    /// Moves every child of `src` into `dst`, replacing anything with the same name.
    pub fn move_contents(src: &Utf8Path, dst: &Utf8Path) -> Result<(), SError> {
        fs::create_dir_all(dst)?;

        for entry in fs::read_dir(src)? {
            let entry = entry?;
            let from = Self::utf8(&entry.path())?.to_path_buf();
            let to = dst.join(from.file_name().unwrap_or_default());

            Self::remove_any(&to)?;
            if entry.file_type()?.is_dir() {
                Self::move_dir(&from, &to)?;
            } else if fs::rename(&from, &to).is_err() {
                fs::copy(&from, &to)?;
                fs::remove_file(&from)?;
            }
        }

        Ok(())
    }

    /// Removes a file or a directory tree if it exists.
    pub fn remove_any(path: &Utf8Path) -> Result<(), SError> {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
            Ok(_) => fs::remove_file(path)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Streams `reader` into `writer`, checking the token between chunks.
    /// Returns the number of bytes copied.
    pub fn copy_cancellable(
        reader: &mut impl Read,
        writer: &mut impl Write,
        cancel: &CancellationToken,
    ) -> Result<u64, SError> {
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut total = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(SError::Cancelled);
            }
            let read = reader.read(&mut buf)?;
            if read == 0 {
                return Ok(total);
            }
            writer.write_all(&buf[..read])?;
            total += read as u64;
        }
    }

    /// True when both paths exist and resolve to the same location.
    pub fn same_location(a: &Utf8Path, b: &Utf8Path) -> bool {
        match (dunce::canonicalize(a), dunce::canonicalize(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// True when `inner` exists and resolves to `outer` or somewhere below it.
    pub fn is_within(inner: &Utf8Path, outer: &Utf8Path) -> bool {
        match (dunce::canonicalize(inner), dunce::canonicalize(outer)) {
            (Ok(inner), Ok(outer)) => inner.starts_with(outer),
            _ => false,
        }
    }

    /// Lists the direct children of a folder, skipping unreadable entries.
    pub fn list_dir(folder: &Utf8Path) -> Result<Vec<Utf8PathBuf>, SError> {
        let mut children: Vec<Utf8PathBuf> = fs::read_dir(folder)?
            .filter_map(|e| e.ok())
            .filter_map(|e| Utf8PathBuf::from_path_buf(e.path()).ok())
            .collect();
        children.sort();
        Ok(children)
    }

    pub fn utf8(path: &std::path::Path) -> Result<&Utf8Path, SError> {
        Utf8Path::from_path(path)
            .ok_or_else(|| SError::ParseError(format!("Invalid UTF-8 path: {:?}", path)))
    }
}
