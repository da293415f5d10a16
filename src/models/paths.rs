use camino::{Utf8Path, Utf8PathBuf};

macro_rules! define_paths {
    ($name:ident { $($field:ident : $default:expr),* $(,)? }) => {
        #[derive(Clone, Debug)]
        pub struct $name {
            $(pub $field: Utf8PathBuf,)*
        }

        impl $name {
            pub fn to_absolute(mut self, base: &Utf8Path) -> Self {
                $(self.$field = base.join(self.$field);)*
                self
            }

            pub fn new(base: &Utf8Path) -> Self {
                Self::default().to_absolute(base)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $($field: $default.into(),)*
                }
            }
        }
    };
}

/// File names a single mod folder is recognised by.
pub const MOD_INFO_FILE: &str = "mod_info.json";
/// Name given to the mod manifest when a variant is parked so the game ignores it.
pub const MOD_INFO_FILE_DISABLED: &str = "mod_info.json.disabled";
pub const VERSION_CHECKER_FILE_ENDING: &str = ".version";
pub const VERSION_CHECKER_CSV: &str = "data/config/version/version_files.csv";
pub const ARCHIVE_EXTENSION: &str = "zip";

define_paths!(GamePathRules {
    mods: "mods",
    enabled_mods: "mods/enabled_mods.json",
    enabled_mods_backup: "mods/enabled_mods.json.bak",
});

define_paths!(LibPathRules {
    archives: "archives",
    staging: "staging",
    version_cache: "version_checker_cache.json",
    logs: "logs",
});

define_paths!(ArchivePaths {
    manifest: "manifest.json",
    manifest_backup: "manifest.json.bak",
});

impl ArchivePaths {
    /// Files in the archive folder that are bookkeeping rather than mod archives.
    pub fn is_bookkeeping(&self, path: &Utf8Path) -> bool {
        path.file_name()
            .map(|name| name.starts_with("manifest.json"))
            .unwrap_or(false)
    }
}

/// Every manifest name a mod folder may carry, canonical first.
pub const MOD_INFO_FILE_NAMES: [&str; 2] = [MOD_INFO_FILE, MOD_INFO_FILE_DISABLED];

pub fn is_mod_info_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(MOD_INFO_FILE)
}

pub fn is_disabled_mod_info_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(MOD_INFO_FILE_DISABLED)
}
