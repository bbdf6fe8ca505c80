pub mod manifest;
pub mod registry;

pub use manifest::{FieldType, InterfaceId, InterfaceManifest, OptionField};
pub use registry::{ExtensionRegistry, ResolvedOptions};
