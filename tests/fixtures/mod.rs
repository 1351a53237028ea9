//! In-memory developer portal and keychain for resolver tests

#![allow(dead_code)]

use async_trait::async_trait;
use kodegen_bundler_provision::portal::{
    App, AppRegistry, AuthSession, Certificate, CertificatePool, CertificateStore, Device,
    ProfileStore, ProfileType, RemoteProfile, TrustChecker,
};
use kodegen_bundler_provision::{ProvisionConfig, ProvisionError, Result};
use std::path::Path;
use std::sync::Mutex;

pub const BUNDLE_ID: &str = "com.acme.app";
pub const USERNAME: &str = "dev@acme.com";

#[derive(Default)]
pub struct FakePortal {
    pub user: Option<String>,
    pub in_house: bool,
    pub fail_login: bool,
    pub fail_update: bool,
    /// `download` hands back an empty body
    pub empty_download: bool,
    /// `download_raw` fails with an I/O error
    pub fail_certificate_download: bool,
    /// Returned by `find_by_bundle_id`, filtered by type and bundle id
    pub profiles: Vec<RemoteProfile>,
    /// Extra profiles only visible through `list_all`
    pub other_profiles: Vec<RemoteProfile>,
    pub devices: Vec<Device>,
    pub development_certs: Vec<Certificate>,
    pub in_house_certs: Vec<Certificate>,
    pub production_certs: Vec<Certificate>,
    pub apps: Vec<App>,
    pub calls: Mutex<Vec<String>>,
    pub created: Mutex<Vec<CreatedProfile>>,
    pub updated: Mutex<Vec<RemoteProfile>>,
}

#[derive(Debug, Clone)]
pub struct CreatedProfile {
    pub profile_type: ProfileType,
    pub name: String,
    pub bundle_id: String,
    pub certificates: Vec<Certificate>,
}

impl FakePortal {
    pub fn with_app() -> Self {
        Self {
            apps: vec![app(BUNDLE_ID)],
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls().iter().any(|c| c == name)
    }

    pub fn created(&self) -> Vec<CreatedProfile> {
        self.created.lock().unwrap().clone()
    }

    pub fn updated(&self) -> Vec<RemoteProfile> {
        self.updated.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl AuthSession for FakePortal {
    fn current_user(&self) -> Option<String> {
        self.user.clone()
    }

    async fn login(&mut self, username: &str) -> Result<()> {
        self.record("login");
        if self.fail_login {
            return Err(ProvisionError::Authentication("invalid credentials".to_string()));
        }
        self.user = Some(username.to_string());
        Ok(())
    }

    async fn select_team(&mut self) -> Result<()> {
        self.record("select_team");
        Ok(())
    }

    fn is_in_house(&self) -> bool {
        self.in_house
    }
}

#[async_trait]
impl ProfileStore for FakePortal {
    async fn find_by_bundle_id(
        &self,
        profile_type: ProfileType,
        bundle_id: &str,
    ) -> Result<Vec<RemoteProfile>> {
        self.record("find_by_bundle_id");
        Ok(self
            .profiles
            .iter()
            .filter(|p| p.profile_type == profile_type && p.bundle_id == bundle_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self, profile_type: Option<ProfileType>) -> Result<Vec<RemoteProfile>> {
        self.record("list_all");
        Ok(self
            .profiles
            .iter()
            .chain(&self.other_profiles)
            .filter(|p| profile_type.is_none_or(|ty| p.profile_type == ty))
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        profile_type: ProfileType,
        name: &str,
        bundle_id: &str,
        certificates: &[Certificate],
    ) -> Result<RemoteProfile> {
        self.record("create");
        self.created.lock().unwrap().push(CreatedProfile {
            profile_type,
            name: name.to_string(),
            bundle_id: bundle_id.to_string(),
            certificates: certificates.to_vec(),
        });

        let mut created = profile("NEW", name, profile_type, certificates.to_vec());
        created.content = Some(b"created-profile".to_vec());
        Ok(created)
    }

    async fn update(&self, profile: &RemoteProfile) -> Result<RemoteProfile> {
        self.record("update");
        if self.fail_update {
            return Err(ProvisionError::AppStoreConnectApi("HTTP 409".to_string()));
        }
        self.updated.lock().unwrap().push(profile.clone());

        let mut regenerated = profile.clone();
        regenerated.id = format!("{}-regenerated", profile.id);
        regenerated.content = Some(b"regenerated-profile".to_vec());
        Ok(regenerated)
    }

    async fn devices_for_profile_type(&self, _profile_type: ProfileType) -> Result<Vec<Device>> {
        self.record("devices_for_profile_type");
        Ok(self.devices.clone())
    }

    async fn download(&self, profile: &RemoteProfile) -> Result<Vec<u8>> {
        self.record("download");
        if self.empty_download {
            return Ok(Vec::new());
        }
        Ok(profile
            .content
            .clone()
            .unwrap_or_else(|| format!("profile:{}", profile.id).into_bytes()))
    }
}

#[async_trait]
impl CertificateStore for FakePortal {
    async fn development(&self) -> Result<Vec<Certificate>> {
        self.record("certificates");
        Ok(self.development_certs.clone())
    }

    async fn in_house(&self) -> Result<Vec<Certificate>> {
        self.record("certificates");
        Ok(self.in_house_certs.clone())
    }

    async fn production(&self) -> Result<Vec<Certificate>> {
        self.record("certificates");
        Ok(self.production_certs.clone())
    }

    async fn download_raw(&self, certificate: &Certificate) -> Result<Vec<u8>> {
        self.record("download_raw");
        if self.fail_certificate_download {
            return Err(ProvisionError::Io(std::io::Error::other(format!(
                "connection reset while fetching {}",
                certificate.id
            ))));
        }
        Ok(certificate
            .content
            .clone()
            .unwrap_or_else(|| certificate.id.clone().into_bytes()))
    }
}

#[async_trait]
impl AppRegistry for FakePortal {
    async fn find(&self, bundle_id: &str) -> Result<Option<App>> {
        self.record("find_app");
        Ok(self.apps.iter().find(|a| a.identifier == bundle_id).cloned())
    }
}

/// Keychain holding certificates whose raw bytes equal their id
pub struct FakeKeychain {
    pub installed: Vec<String>,
}

impl FakeKeychain {
    pub fn with(ids: &[&str]) -> Self {
        Self {
            installed: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::with(&[])
    }
}

#[async_trait]
impl TrustChecker for FakeKeychain {
    async fn is_installed(&self, cert_path: &Path) -> Result<bool> {
        let raw = tokio::fs::read(cert_path).await?;
        let id = String::from_utf8_lossy(&raw);
        Ok(self.installed.iter().any(|i| *i == id))
    }
}

/// Keychain whose lookup always fails
pub struct BrokenKeychain;

#[async_trait]
impl TrustChecker for BrokenKeychain {
    async fn is_installed(&self, _cert_path: &Path) -> Result<bool> {
        Err(ProvisionError::CommandExecution("security: keychain unavailable".to_string()))
    }
}

pub fn app(identifier: &str) -> App {
    App {
        id: format!("APP-{identifier}"),
        identifier: identifier.to_string(),
        name: "Acme".to_string(),
    }
}

pub fn cert(id: &str, owner: &str, pool: CertificatePool) -> Certificate {
    Certificate {
        id: id.to_string(),
        owner_name: owner.to_string(),
        expires: None,
        pool,
        content: None,
    }
}

pub fn device(id: &str) -> Device {
    Device {
        id: id.to_string(),
        name: format!("iPhone {id}"),
        udid: format!("UDID-{id}"),
    }
}

pub fn profile(
    id: &str,
    name: &str,
    profile_type: ProfileType,
    certificates: Vec<Certificate>,
) -> RemoteProfile {
    RemoteProfile {
        id: id.to_string(),
        name: name.to_string(),
        uuid: None,
        bundle_id: BUNDLE_ID.to_string(),
        profile_type,
        devices: Vec::new(),
        certificates,
        valid: true,
        expires: None,
        content: None,
    }
}

/// Config for `BUNDLE_ID` writing into `output_dir`, already logged in
pub fn config(output_dir: &Path) -> ProvisionConfig {
    let mut config = ProvisionConfig::new(USERNAME, BUNDLE_ID);
    config.output_path = output_dir.to_path_buf();
    config
}
