//! OCI image transfer library
//!
//! Pulls a tagged image from a container registry into an on-disk OCI
//! layout and pushes such a layout back to a registry, negotiating both
//! the legacy schema-1 and the OCI schema-2 manifest formats.

pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod image;
pub mod layout;
pub mod output;
pub mod registry;
pub mod transfer;

pub use config::{ImageReference, ServiceRequest};
pub use error::{RegistryError, Result};
pub use output::OutputManager;
