use crate::models::mod_info::{ModInfo, VersionCheckerInfo};
use crate::models::version::Version;
use crate::utils::id::hash_key;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ManifestKey = u32;

/// Index of every archived variant, persisted as `manifest.json` in the archive folder.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArchivesManifest {
    #[serde(default)]
    pub manifest_items: BTreeMap<ManifestKey, ManifestItemValue>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItemValue {
    pub archive_path: Utf8PathBuf,
    pub mod_info: ModInfo,
    #[serde(default)]
    pub version_checker_info: Option<VersionCheckerInfo>,
}

/// Content key of a variant: integer hash of its mod id and version string.
pub fn manifest_key(mod_id: &str, version: &Version) -> ManifestKey {
    hash_key(&format!("{mod_id}\u{0}{version}"))
}

impl ArchivesManifest {
    pub fn key_for(mod_info: &ModInfo) -> ManifestKey {
        manifest_key(&mod_info.id, &mod_info.version)
    }

    /// True when the manifest lists the key and the archive it points at still exists.
    pub fn contains_archive(&self, key: ManifestKey) -> bool {
        self.manifest_items
            .get(&key)
            .is_some_and(|item| item.archive_path.exists())
    }

    pub fn len(&self) -> usize {
        self.manifest_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest_items.is_empty()
    }
}
