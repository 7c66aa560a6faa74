//! Registry access: credential resolution, the distribution-API client,
//! and the pull/push orchestrators.

pub mod auth;
pub mod client;
pub mod pull;
pub mod push;

pub use auth::{Credentials, Scope};
pub use client::{RegistryClient, RegistryClientBuilder};
pub use pull::copy_to_disk;
pub use push::push_to_registry;
