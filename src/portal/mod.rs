//! Developer portal collaborators
//!
//! The resolver only talks to the portal through these traits:
//! - `AuthSession` - account login and capabilities
//! - `ProfileStore` - provisioning profiles and the devices they cover
//! - `CertificateStore` - signing certificates by pool
//! - `AppRegistry` - registered App IDs
//! - `TrustChecker` - certificates installed on this machine
//!
//! `PortalSession` implements the remote traits on top of the App Store
//! Connect API; `KeychainTrustChecker` implements the local one.

mod model;
mod session;

pub use model::{App, Certificate, CertificatePool, Device, ProfileType, RemoteProfile};
pub use session::PortalSession;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Authenticated account on the developer portal
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Account the session is logged in as, if any
    fn current_user(&self) -> Option<String>;

    /// Log in as `username`
    async fn login(&mut self, username: &str) -> Result<()>;

    /// Select the team subsequent calls act on
    async fn select_team(&mut self) -> Result<()>;

    /// Whether the selected team is an enterprise (in-house) team
    fn is_in_house(&self) -> bool;
}

/// Provisioning profiles stored on the portal
///
/// Listings are returned in server order; callers must not assume any
/// sorting beyond that.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Profiles of `profile_type` for the App ID `bundle_id`
    async fn find_by_bundle_id(
        &self,
        profile_type: ProfileType,
        bundle_id: &str,
    ) -> Result<Vec<RemoteProfile>>;

    /// Every profile of `profile_type`, or of any type when `None`
    async fn list_all(&self, profile_type: Option<ProfileType>) -> Result<Vec<RemoteProfile>>;

    /// Create a profile signed with `certificates`
    ///
    /// Device-scoped types get every device registered for that type.
    async fn create(
        &self,
        profile_type: ProfileType,
        name: &str,
        bundle_id: &str,
        certificates: &[Certificate],
    ) -> Result<RemoteProfile>;

    /// Regenerate `profile` with its current certificates and devices
    async fn update(&self, profile: &RemoteProfile) -> Result<RemoteProfile>;

    /// Devices a profile of `profile_type` may include
    async fn devices_for_profile_type(&self, profile_type: ProfileType) -> Result<Vec<Device>>;

    /// Signed profile bytes
    async fn download(&self, profile: &RemoteProfile) -> Result<Vec<u8>>;
}

/// Signing certificates registered with the team
#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn development(&self) -> Result<Vec<Certificate>>;

    async fn in_house(&self) -> Result<Vec<Certificate>>;

    async fn production(&self) -> Result<Vec<Certificate>>;

    /// DER encoded certificate
    async fn download_raw(&self, certificate: &Certificate) -> Result<Vec<u8>>;
}

/// Registered App IDs
#[async_trait]
pub trait AppRegistry: Send + Sync {
    async fn find(&self, bundle_id: &str) -> Result<Option<App>>;
}

/// Certificates installed on this machine
#[async_trait]
pub trait TrustChecker: Send + Sync {
    /// Whether the DER certificate at `cert_path` has a usable signing identity
    async fn is_installed(&self, cert_path: &Path) -> Result<bool>;
}

/// Everything the resolver needs from the remote side
pub trait Portal: AuthSession + ProfileStore + CertificateStore + AppRegistry {}

impl<T> Portal for T where T: AuthSession + ProfileStore + CertificateStore + AppRegistry {}
