//! Per-page selector registries: named selectors with a category tag, validated
//! in-place patching, regeneration from a page catalog and YAML persistence.

pub mod errors;
pub mod model;
pub mod store;

pub use errors::RegistryError;
pub use model::{infer_mode, validate_selector, RegistryEntry, SelectorRegistry};
pub use store::{FileRegistryStore, InMemoryRegistryStore, RegistryStore};
