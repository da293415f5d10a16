use serde::{Deserialize, Serialize};

/// What the engine is currently doing to a mod. Purely informational; it does
/// not exclude other operations on the same mod.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ModModificationState {
    #[default]
    Ready,
    DisablingVariants,
    DeletingVariants,
    EnablingVariant,
}
