pub mod component;
pub mod config;
pub mod debouncer;
pub mod status;
pub mod target;

pub use component::AutosaveComponent;
pub use config::AutosaveConfig;
pub use debouncer::{Completion, Debouncer};
pub use status::SaveStatus;
pub use target::{FileTarget, SaveTarget};
