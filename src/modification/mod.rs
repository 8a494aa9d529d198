//! Modification variants and the rules for folding them into a queue.

mod modification;
mod serialized;

pub use modification::{InPlaceModification, Modification, ModificationKind};
pub use serialized::DecodeError;
