use crate::models::mod_dto::{highest_version, Mod, ModList, ModVariant};
use crate::models::mod_info::Dependency;
use tracing::{debug, trace};

/// How a declared dependency is met by the current library.
#[derive(Clone, Debug, PartialEq)]
pub enum DependencyState<'a> {
    /// A suitable variant is enabled.
    Enabled {
        dependency: &'a Dependency,
        variant: &'a ModVariant,
    },
    /// A suitable variant exists but is not enabled.
    Disabled {
        dependency: &'a Dependency,
        variant: &'a ModVariant,
    },
    /// Nothing suitable is installed. When the mod exists but every variant is too
    /// old, it is reported in `outdated_mod_if_found`.
    Missing {
        dependency: &'a Dependency,
        outdated_mod_if_found: Option<&'a Mod>,
    },
}

impl<'a> DependencyState<'a> {
    pub fn dependency(&self) -> &'a Dependency {
        match self {
            DependencyState::Enabled { dependency, .. }
            | DependencyState::Disabled { dependency, .. }
            | DependencyState::Missing { dependency, .. } => dependency,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, DependencyState::Enabled { .. })
    }
}

/// Pairs each dependency of `variant` with the installed mod of that id, if any.
pub fn find_dependencies<'a>(
    variant: &'a ModVariant,
    mods: &'a ModList,
) -> Vec<(&'a Dependency, Option<&'a Mod>)> {
    variant
        .mod_info
        .dependencies
        .iter()
        .map(|dep| (dep, mods.find(&dep.id)))
        .collect()
}

/// Resolves the dependencies of `mod_`'s enabled variant, or of its highest version
/// when nothing is enabled.
pub fn find_dependency_states<'a>(mod_: &'a Mod, mods: &'a ModList) -> Vec<DependencyState<'a>> {
    let Some(variant) = mod_
        .find_first_enabled()
        .or_else(|| mod_.find_highest_version())
    else {
        return Vec::new();
    };

    find_dependencies(variant, mods)
        .into_iter()
        .map(|(dependency, found)| resolve(dependency, found))
        .inspect(|state| match state {
            DependencyState::Enabled { .. } => trace!("{}: dependency enabled: {state:?}", mod_.id),
            _ => debug!("{}: dependency not enabled: {state:?}", mod_.id),
        })
        .collect()
}

fn resolve<'a>(dependency: &'a Dependency, found: Option<&'a Mod>) -> DependencyState<'a> {
    let Some(target) = found.filter(|m| !m.variants.is_empty()) else {
        return DependencyState::Missing {
            dependency,
            outdated_mod_if_found: None,
        };
    };

    let Some(required) = &dependency.version else {
        return match target.find_first_enabled() {
            Some(variant) => DependencyState::Enabled { dependency, variant },
            None => match target.find_highest_version() {
                Some(variant) => DependencyState::Disabled { dependency, variant },
                None => DependencyState::Missing {
                    dependency,
                    outdated_mod_if_found: Some(target),
                },
            },
        };
    };

    let qualifying: Vec<&ModVariant> = target
        .variants
        .iter()
        .filter(|v| v.version() >= required)
        .collect();

    if let Some(variant) = highest_version(qualifying.iter().copied().filter(|v| target.is_enabled(v))) {
        return DependencyState::Enabled { dependency, variant };
    }

    match highest_version(qualifying.into_iter()) {
        Some(variant) => DependencyState::Disabled { dependency, variant },
        None => DependencyState::Missing {
            dependency,
            outdated_mod_if_found: Some(target),
        },
    }
}
