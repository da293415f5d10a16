use crate::models::mod_info::{ModId, ModInfo, VersionCheckerInfo};
use crate::models::version::Version;
use crate::utils::id::hash_id;
use camino::Utf8PathBuf;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub type SmolId = String;

/// Location of a variant's loaded copy inside the game's mods folder.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ModsFolderInfo {
    pub folder: Utf8PathBuf,
}

/// Location of a variant held back from the game (staging folder, or a
/// mods-folder copy whose manifest carries the disabled name).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StagingInfo {
    pub folder: Utf8PathBuf,
}

/// Location of a variant's compressed copy in the archive store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub path: Utf8PathBuf,
}

/// One version of a mod. May exist in any combination of the three locations.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModVariant {
    pub mod_info: ModInfo,
    pub version_checker_info: Option<VersionCheckerInfo>,
    pub mods_folder_info: Option<ModsFolderInfo>,
    pub staging_info: Option<StagingInfo>,
    pub archive_info: Option<ArchiveInfo>,
}

fn smol_id_filter() -> &'static Regex {
    static FILTER: OnceLock<Regex> = OnceLock::new();
    FILTER.get_or_init(|| Regex::new(r"[^0-9a-zA-Z\.\-_]").expect("static regex"))
}

/// Composite key built from a mod id and version: a readable prefix plus a stable hash.
///
/// `("lw_lazylib", "2.7b")` gives something like `lw_laz-2.7b-Xq3...`.
pub fn create_smol_id(id: &str, version: &Version) -> SmolId {
    let filter = smol_id_filter();
    let version_str = version.to_string();
    let id_part: String = filter.replace_all(id, "").chars().take(6).collect();
    let version_part: String = filter.replace_all(&version_str, "").chars().take(9).collect();

    format!(
        "{id_part}-{version_part}-{}",
        hash_id(&format!("{id}\u{0}{version_str}"))
    )
}

impl ModVariant {
    pub fn new(mod_info: ModInfo, version_checker_info: Option<VersionCheckerInfo>) -> Self {
        Self {
            mod_info,
            version_checker_info,
            mods_folder_info: None,
            staging_info: None,
            archive_info: None,
        }
    }

    pub fn smol_id(&self) -> SmolId {
        create_smol_id(&self.mod_info.id, &self.mod_info.version)
    }

    pub fn mod_id(&self) -> &str {
        &self.mod_info.id
    }

    pub fn version(&self) -> &Version {
        &self.mod_info.version
    }

    /// Folder name used whenever this variant is unpacked, unique per variant.
    pub fn generate_variant_folder_name(&self) -> String {
        let name: String = self
            .mod_info
            .display_name()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}_{}", name, self.smol_id())
    }

    /// Merges the locations of another sighting of the same variant into this one.
    pub fn merge_locations(&mut self, other: ModVariant) {
        self.mods_folder_info = self.mods_folder_info.take().or(other.mods_folder_info);
        self.staging_info = self.staging_info.take().or(other.staging_info);
        self.archive_info = self.archive_info.take().or(other.archive_info);
        self.version_checker_info = self
            .version_checker_info
            .take()
            .or(other.version_checker_info);
    }

    /// Resolves the parent mod by id in the given snapshot.
    pub fn parent<'a>(&self, mods: &'a ModList) -> Option<&'a Mod> {
        mods.find(self.mod_id())
    }
}

/// A logical mod and every variant of it that was found.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Mod {
    pub id: ModId,
    /// Whether the game's enabled-mods registry lists this mod.
    pub is_enabled_in_game: bool,
    /// Sorted by version, one entry per smol id.
    pub variants: Vec<ModVariant>,
}

impl Mod {
    pub fn new(id: ModId, is_enabled_in_game: bool, variants: Vec<ModVariant>) -> Self {
        let mut merged: Vec<ModVariant> = Vec::with_capacity(variants.len());
        for variant in variants {
            let smol_id = variant.smol_id();
            match merged.iter_mut().find(|v| v.smol_id() == smol_id) {
                Some(existing) => existing.merge_locations(variant),
                None => merged.push(variant),
            }
        }
        merged.sort_by(|a, b| a.version().cmp(b.version()));

        Self {
            id,
            is_enabled_in_game,
            variants: merged,
        }
    }

    /// A variant is enabled when the game lists the mod and the variant sits in the mods folder.
    pub fn is_enabled(&self, variant: &ModVariant) -> bool {
        self.is_enabled_in_game && variant.mods_folder_info.is_some()
    }

    pub fn enabled_variants(&self) -> Vec<&ModVariant> {
        self.variants.iter().filter(|v| self.is_enabled(v)).collect()
    }

    pub fn find_first_enabled(&self) -> Option<&ModVariant> {
        self.variants.iter().find(|v| self.is_enabled(v))
    }

    /// Highest version; ties go to the first in list order.
    pub fn find_highest_version(&self) -> Option<&ModVariant> {
        highest_version(self.variants.iter())
    }

    pub fn has_enabled_variant(&self) -> bool {
        self.find_first_enabled().is_some()
    }

    /// More than one variant enabled at once, which the game would load twice.
    pub fn has_enabled_conflict(&self) -> bool {
        self.enabled_variants().len() > 1
    }

    pub fn find_variant(&self, smol_id: &str) -> Option<&ModVariant> {
        self.variants.iter().find(|v| v.smol_id() == smol_id)
    }
}

/// Maximum by version that keeps the first of equal candidates.
pub fn highest_version<'a>(variants: impl Iterator<Item = &'a ModVariant>) -> Option<&'a ModVariant> {
    variants.fold(None, |best: Option<&ModVariant>, v| match best {
        Some(b) if b.version() >= v.version() => Some(b),
        _ => Some(v),
    })
}

/// A complete, immutable view of the library at one point in time.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ModList {
    pub mods: Vec<Mod>,
    /// Variants that appeared since the previous snapshot.
    pub added: Vec<SmolId>,
    /// Variants that disappeared since the previous snapshot.
    pub removed: Vec<SmolId>,
}

impl ModList {
    pub fn new(mods: Vec<Mod>) -> Self {
        Self {
            mods,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn find(&self, mod_id: &str) -> Option<&Mod> {
        self.mods.iter().find(|m| m.id == mod_id)
    }

    pub fn find_variant(&self, smol_id: &str) -> Option<&ModVariant> {
        self.mods.iter().find_map(|m| m.find_variant(smol_id))
    }

    pub fn parent_of(&self, variant: &ModVariant) -> Option<&Mod> {
        variant.parent(self)
    }

    pub fn variants(&self) -> impl Iterator<Item = &ModVariant> {
        self.mods.iter().flat_map(|m| m.variants.iter())
    }

    /// Records which variants were added and removed relative to `previous`.
    pub fn with_diff(mut self, previous: &ModList) -> Self {
        let before: std::collections::BTreeSet<SmolId> =
            previous.variants().map(ModVariant::smol_id).collect();
        let after: std::collections::BTreeSet<SmolId> =
            self.variants().map(ModVariant::smol_id).collect();

        self.added = after.difference(&before).cloned().collect();
        self.removed = before.difference(&after).cloned().collect();
        self
    }
}
