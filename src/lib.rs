//! Provisioning profile resolution for iOS app bundles
//!
//! Finds a valid provisioning profile for a bundle identifier on the Apple
//! Developer Portal, creating or regenerating one when needed, and writes the
//! signed profile to disk.

#[macro_use]
pub mod output;

pub mod apple_api;
pub mod config;
pub mod error;
pub mod keychain;
pub mod portal;
pub mod resolver;

// Re-export common types
pub use config::{ApiKeyConfig, ProvisionConfig, ProvisionOptions};
pub use error::{ProvisionError, Result};
pub use keychain::KeychainTrustChecker;
pub use portal::{PortalSession, ProfileType};
pub use resolver::{ProfileResolver, Resolution, resolve};
