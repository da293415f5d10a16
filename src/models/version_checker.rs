use crate::models::mod_info::{ModId, VersionCheckerInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last known online version of each mod, persisted between runs.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionCheckerCache {
    #[serde(default)]
    pub online_versions: BTreeMap<ModId, VersionCheckerInfo>,
    /// Unix time in milliseconds of the last completed lookup.
    #[serde(default)]
    pub last_check_timestamp: i64,
}
