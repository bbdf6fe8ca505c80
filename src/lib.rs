//! Autosave interface extension.
//!
//! [`interface`] declares the extension the way a host registry consumes it,
//! [`autosave`] holds the debounced save component it mounts, and [`app`] is a
//! small terminal host that exercises both.

pub mod app;
pub mod autosave;
pub mod error;
pub mod interface;
pub mod model;
pub mod msg;
