//! Developer portal resources handled during resolution

use chrono::{DateTime, Utc};
use std::fmt;

/// Kind of provisioning profile to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileType {
    Development,
    AdHoc,
    InHouse,
    AppStore,
}

impl ProfileType {
    /// Label used in generated profile names and file names
    #[must_use]
    pub fn pretty_type(&self) -> &'static str {
        match self {
            Self::Development => "Development",
            Self::AdHoc => "AdHoc",
            Self::InHouse => "InHouse",
            Self::AppStore => "AppStore",
        }
    }

    /// Convert to Apple API profile type string
    ///
    /// See: <https://developer.apple.com/documentation/appstoreconnectapi/profile/attributes>
    #[must_use]
    pub fn to_apple_api_string(&self) -> &'static str {
        match self {
            Self::Development => "IOS_APP_DEVELOPMENT",
            Self::AdHoc => "IOS_APP_ADHOC",
            Self::InHouse => "IOS_APP_INHOUSE",
            Self::AppStore => "IOS_APP_STORE",
        }
    }

    #[must_use]
    pub fn from_apple_api_string(value: &str) -> Option<Self> {
        match value {
            "IOS_APP_DEVELOPMENT" => Some(Self::Development),
            "IOS_APP_ADHOC" => Some(Self::AdHoc),
            "IOS_APP_INHOUSE" => Some(Self::InHouse),
            "IOS_APP_STORE" => Some(Self::AppStore),
            _ => None,
        }
    }

    /// Development and ad-hoc profiles carry an explicit device list
    #[must_use]
    pub fn is_device_scoped(&self) -> bool {
        matches!(self, Self::Development | Self::AdHoc)
    }

    /// Certificate pool a new profile of this type signs with
    #[must_use]
    pub fn certificate_pool(&self) -> CertificatePool {
        match self {
            Self::Development => CertificatePool::Development,
            Self::InHouse => CertificatePool::InHouse,
            Self::AdHoc | Self::AppStore => CertificatePool::Production,
        }
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pretty_type())
    }
}

/// Group of signing certificates a profile type can use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificatePool {
    Development,
    Production,
    InHouse,
}

impl CertificatePool {
    /// Apple API certificate types belonging to this pool
    ///
    /// Enterprise teams issue in-house certificates with the distribution
    /// types, so the in-house pool is the distribution pool of an enterprise
    /// session.
    #[must_use]
    pub fn apple_api_types(&self) -> &'static [&'static str] {
        match self {
            Self::Development => &["IOS_DEVELOPMENT", "DEVELOPMENT"],
            Self::Production | Self::InHouse => &["IOS_DISTRIBUTION", "DISTRIBUTION"],
        }
    }
}

/// A code signing certificate registered with the team
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub id: String,
    pub owner_name: String,
    pub expires: Option<DateTime<Utc>>,
    pub pool: CertificatePool,
    /// DER bytes, when the listing already carried them
    pub content: Option<Vec<u8>>,
}

impl Certificate {
    /// One line description used when listing candidates
    #[must_use]
    pub fn describe(&self) -> String {
        let expires = self
            .expires
            .map(|e| e.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!("Name: {} - ID: {} - Expires {}", self.owner_name, self.id, expires)
    }
}

/// A device registered with the team
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub udid: String,
}

/// A registered App ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub id: String,
    pub identifier: String,
    pub name: String,
}

/// A provisioning profile as stored on the developer portal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProfile {
    pub id: String,
    pub name: String,
    pub uuid: Option<String>,
    pub bundle_id: String,
    pub profile_type: ProfileType,
    pub devices: Vec<Device>,
    pub certificates: Vec<Certificate>,
    /// `true` while the portal reports the profile as active
    pub valid: bool,
    pub expires: Option<DateTime<Utc>>,
    /// Signed profile bytes, when the listing already carried them
    pub content: Option<Vec<u8>>,
}
