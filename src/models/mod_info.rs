use crate::models::version::Version;
use crate::utils::json::string_or_number;
use serde::{Deserialize, Serialize};

pub type ModId = String;

/// Parsed contents of a mod's `mod_info.json`. Immutable once read.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModInfo {
    pub id: ModId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub version: Version,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub game_version: Option<String>,
    #[serde(default)]
    pub utility: bool,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Dependency {
    pub id: ModId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Minimum acceptable version, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

impl ModInfo {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Contents of a mod's `.version` file, used for online update checks.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VersionCheckerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_version_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub mod_thread_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub mod_nexus_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_version: Option<Version>,
}

/// A mod manifest together with the optional version checker file found next to it.
#[derive(Clone, Debug, PartialEq)]
pub struct DataFiles {
    pub mod_info: ModInfo,
    pub version_checker_info: Option<VersionCheckerInfo>,
}

/// Contents of the game's `enabled_mods.json`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnabledMods {
    #[serde(default)]
    pub enabled_mods: Vec<ModId>,
}
