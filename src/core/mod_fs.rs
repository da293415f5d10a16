use crate::models::error::SError;
use crate::models::mod_info::{DataFiles, ModInfo, VersionCheckerInfo};
use crate::models::paths::{
    is_disabled_mod_info_name, MOD_INFO_FILE, MOD_INFO_FILE_NAMES, VERSION_CHECKER_CSV,
    VERSION_CHECKER_FILE_ENDING,
};
use crate::utils::file::FileUtils;
use crate::utils::json::from_lenient_str;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// An unpacked mod folder on disk.
#[derive(Clone, Debug)]
pub struct ModFS {
    pub root: Utf8PathBuf,
    pub mod_info_file: Utf8PathBuf,
    pub data_files: DataFiles,
}

impl ModFS {
    /// Reads the mod whose manifest lies directly inside `root`.
    pub fn new(root: &Utf8Path) -> Result<Self, SError> {
        let mod_info_file = Self::find_mod_info_file(root).ok_or_else(|| {
            SError::InvalidPackage(format!("No {MOD_INFO_FILE} in {root}"))
        })?;
        let mod_info = Self::parse_mod_info(&std::fs::read_to_string(&mod_info_file)?)?;
        let version_checker_info = Self::read_version_checker_info(root);

        Ok(ModFS {
            root: root.to_owned(),
            mod_info_file,
            data_files: DataFiles {
                mod_info,
                version_checker_info,
            },
        })
    }

    pub fn mod_info(&self) -> &ModInfo {
        &self.data_files.mod_info
    }

    /// True when the manifest carries the disabled name, i.e. the game skips this folder.
    pub fn is_parked(&self) -> bool {
        self.mod_info_file
            .file_name()
            .is_some_and(is_disabled_mod_info_name)
    }

    /// Looks for the manifest directly in `folder`, trying the canonical name first.
    pub fn find_mod_info_file(folder: &Utf8Path) -> Option<Utf8PathBuf> {
        let children = FileUtils::list_dir(folder).ok()?;
        MOD_INFO_FILE_NAMES.iter().find_map(|wanted| {
            children
                .iter()
                .find(|c| {
                    c.is_file()
                        && c.file_name()
                            .is_some_and(|name| name.eq_ignore_ascii_case(wanted))
                })
                .cloned()
        })
    }

    pub fn parse_mod_info(json: &str) -> Result<ModInfo, SError> {
        let mod_info: ModInfo = from_lenient_str(json)?;
        if mod_info.id.trim().is_empty() {
            return Err(SError::InvalidPackage("Mod manifest has an empty id".into()));
        }
        Ok(mod_info)
    }

    pub fn parse_version_checker(json: &str) -> Result<VersionCheckerInfo, SError> {
        from_lenient_str(json)
    }

    /// Finds the `.version` file through the version checker csv, falling back to a scan.
    fn read_version_checker_info(root: &Utf8Path) -> Option<VersionCheckerInfo> {
        let from_csv = std::fs::read_to_string(root.join(VERSION_CHECKER_CSV))
            .ok()
            .and_then(|csv| {
                csv.lines()
                    .skip(1)
                    .filter_map(|line| line.split(',').next())
                    .map(|cell| cell.trim().trim_matches('"'))
                    .find(|cell| cell.ends_with(VERSION_CHECKER_FILE_ENDING))
                    .map(|rel| root.join(rel))
            });

        let path = from_csv.filter(|p| p.is_file()).or_else(|| {
            WalkDir::new(root)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| Utf8PathBuf::from_path_buf(e.into_path()).ok())
                .find(|p| p.as_str().ends_with(VERSION_CHECKER_FILE_ENDING))
        })?;

        std::fs::read_to_string(&path)
            .map_err(SError::from)
            .and_then(|json| Self::parse_version_checker(&json))
            .inspect_err(|e| debug!("Ignoring unreadable version file {path}: {e}"))
            .ok()
    }

    /// Finds every mod in `folder`: the folder itself if it is a mod, otherwise each
    /// child folder that is. A dropped manifest file stands for its parent folder.
    /// Unreadable mods are logged and skipped.
    pub fn find_mods_in_folder(folder: &Utf8Path) -> Result<Vec<ModFS>, SError> {
        let folder = match folder.file_name() {
            Some(name) if folder.is_file() && name.eq_ignore_ascii_case(MOD_INFO_FILE) => {
                folder.parent().unwrap_or(folder)
            }
            _ => folder,
        };

        if !folder.is_dir() {
            return Err(SError::NotFound(format!("Mod folder doesn't exist: {folder}")));
        }

        if Self::find_mod_info_file(folder).is_some() {
            return Ok(vec![Self::new(folder)?]);
        }

        Ok(FileUtils::list_dir(folder)?
            .into_iter()
            .filter(|child| child.is_dir())
            .filter(|child| Self::find_mod_info_file(child).is_some())
            .filter_map(|child| {
                Self::new(&child)
                    .inspect_err(|e| warn!("Skipping unreadable mod at {child}: {e}"))
                    .ok()
            })
            .collect())
    }

    /// Every file and folder below `root`, as paths relative to it, parents before children.
    pub fn collect_entries(root: &Utf8Path) -> Result<Vec<(Utf8PathBuf, bool)>, SError> {
        WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| {
                let entry = entry?;
                let path = FileUtils::utf8(entry.path())?;
                Ok((
                    path.strip_prefix(root)?.to_path_buf(),
                    entry.file_type().is_dir(),
                ))
            })
            .collect()
    }
}
