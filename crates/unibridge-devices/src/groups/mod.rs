//! Fabric group ↔ device group mapping.

mod store;
mod translator;

pub use store::{GroupMapping, GroupStore, ALLOCATOR_TABLE, MAPPINGS_TABLE};
pub use translator::{GroupTranslator, MAX_GROUP_NAME_LEN};
