//! Configuration structures for provisioning profile resolution.

use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the Apple account name
pub const ENV_USERNAME: &str = "APPLE_ID";

/// Environment variables for App Store Connect API keys
pub const ENV_API_KEY: &str = "APPLE_API_KEY";
pub const ENV_API_ISSUER: &str = "APPLE_API_ISSUER";
pub const ENV_API_KEY_PATH: &str = "APPLE_API_KEY_PATH";

/// Options as they come from a TOML file or the command line.
///
/// Every field is optional so layers can be merged before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisionOptions {
    pub username: Option<String>,
    pub app_identifier: Option<String>,
    #[serde(default)]
    pub adhoc: bool,
    #[serde(default)]
    pub development: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub skip_fetch_profiles: bool,
    #[serde(default)]
    pub skip_certificate_verification: bool,
    pub provisioning_name: Option<String>,
    #[serde(default)]
    pub ignore_profiles_with_different_name: bool,
    pub cert_id: Option<String>,
    pub cert_owner_name: Option<String>,
    pub output_path: Option<PathBuf>,
    pub filename: Option<String>,
    pub api_key: Option<ApiKeyConfig>,
}

impl ProvisionOptions {
    /// Load options from a TOML file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProvisionError::InvalidConfig(format!(
                "Cannot read config file {}: {e}",
                path.display()
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Layer `overlay` on top of `self`: set values win, flags are OR'ed.
    #[must_use]
    pub fn merge(self, overlay: Self) -> Self {
        Self {
            username: overlay.username.or(self.username),
            app_identifier: overlay.app_identifier.or(self.app_identifier),
            adhoc: self.adhoc || overlay.adhoc,
            development: self.development || overlay.development,
            force: self.force || overlay.force,
            skip_fetch_profiles: self.skip_fetch_profiles || overlay.skip_fetch_profiles,
            skip_certificate_verification: self.skip_certificate_verification
                || overlay.skip_certificate_verification,
            provisioning_name: overlay.provisioning_name.or(self.provisioning_name),
            ignore_profiles_with_different_name: self.ignore_profiles_with_different_name
                || overlay.ignore_profiles_with_different_name,
            cert_id: overlay.cert_id.or(self.cert_id),
            cert_owner_name: overlay.cert_owner_name.or(self.cert_owner_name),
            output_path: overlay.output_path.or(self.output_path),
            filename: overlay.filename.or(self.filename),
            api_key: overlay.api_key.or(self.api_key),
        }
    }

    /// Validate and split into the resolver configuration and API credentials.
    ///
    /// `username` falls back to the API key id when neither the options nor
    /// the environment name an account.
    pub fn into_config(self) -> Result<(ProvisionConfig, Option<ApiKeyConfig>)> {
        let app_identifier = non_empty(self.app_identifier).ok_or_else(|| {
            ProvisionError::MissingConfig(
                "app_identifier (pass --app-identifier or set it in the config file)".to_string(),
            )
        })?;

        let username = non_empty(self.username)
            .or_else(|| self.api_key.as_ref().map(|key| key.key_id.clone()))
            .ok_or_else(|| {
                ProvisionError::MissingConfig(format!(
                    "username (pass --username or set {ENV_USERNAME})"
                ))
            })?;

        let provisioning_name = non_empty(self.provisioning_name);
        if self.ignore_profiles_with_different_name && provisioning_name.is_none() {
            return Err(ProvisionError::InvalidConfig(
                "ignore_profiles_with_different_name requires provisioning_name".to_string(),
            ));
        }

        let output_path = match self.output_path {
            Some(path) => PathBuf::from(expand_tilde_path(&path.to_string_lossy())?),
            None => default_output_path(),
        };

        let config = ProvisionConfig {
            username,
            app_identifier,
            adhoc: self.adhoc,
            development: self.development,
            force: self.force,
            skip_fetch_profiles: self.skip_fetch_profiles,
            skip_certificate_verification: self.skip_certificate_verification,
            provisioning_name,
            ignore_profiles_with_different_name: self.ignore_profiles_with_different_name,
            cert_id: non_empty(self.cert_id),
            cert_owner_name: non_empty(self.cert_owner_name),
            output_path,
            filename: non_empty(self.filename),
        };

        Ok((config, self.api_key))
    }
}

/// Validated configuration for one resolution run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    pub username: String,
    pub app_identifier: String,
    pub adhoc: bool,
    pub development: bool,
    pub force: bool,
    pub skip_fetch_profiles: bool,
    pub skip_certificate_verification: bool,
    pub provisioning_name: Option<String>,
    pub ignore_profiles_with_different_name: bool,
    pub cert_id: Option<String>,
    pub cert_owner_name: Option<String>,
    /// Directory the downloaded profile is written to
    pub output_path: PathBuf,
    /// Overrides the derived `<type>_<bundle id>` file name
    pub filename: Option<String>,
}

impl ProvisionConfig {
    /// Configuration with every flag off and the default output directory
    #[must_use]
    pub fn new(username: impl Into<String>, app_identifier: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            app_identifier: app_identifier.into(),
            adhoc: false,
            development: false,
            force: false,
            skip_fetch_profiles: false,
            skip_certificate_verification: false,
            provisioning_name: None,
            ignore_profiles_with_different_name: false,
            cert_id: None,
            cert_owner_name: None,
            output_path: default_output_path(),
            filename: None,
        }
    }
}

/// App Store Connect API key credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyConfig {
    pub key_id: String,
    pub issuer_id: String,
    pub private_key_path: PathBuf,
    /// Key belongs to an Apple Developer Enterprise Program team
    #[serde(default)]
    pub in_house: bool,
}

impl ApiKeyConfig {
    /// Load credentials from environment variables
    ///
    /// Requires `APPLE_API_KEY` + `APPLE_API_ISSUER`. The key file comes from
    /// `APPLE_API_KEY_PATH` or the standard `AuthKey_<id>.p8` locations.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let (Ok(key_id), Ok(issuer_id)) =
            (std::env::var(ENV_API_KEY), std::env::var(ENV_API_ISSUER))
        else {
            return None;
        };

        let private_key_path = std::env::var(ENV_API_KEY_PATH)
            .map(PathBuf::from)
            .ok()
            .or_else(|| find_p8_key_in_standard_locations(&key_id))?;

        Some(Self {
            key_id,
            issuer_id,
            private_key_path,
            in_house: false,
        })
    }

    /// Copy with `~` expanded in the key path
    pub fn expanded(mut self) -> Result<Self> {
        self.private_key_path =
            PathBuf::from(expand_tilde_path(&self.private_key_path.to_string_lossy())?);
        Ok(self)
    }
}

/// Expand tilde in path, returning error if HOME is not set
///
/// When HOME is unset, shellexpand leaves `~` unchanged.
pub fn expand_tilde_path(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path).to_string();

    if path.starts_with('~') && expanded.starts_with('~') {
        return Err(ProvisionError::InvalidConfig(
            "Could not expand ~ in path (HOME environment variable not set).\n\
             Please use absolute path instead.\n\
             Example: /Users/username/key.p8 instead of ~/key.p8"
                .to_string(),
        ));
    }

    Ok(expanded)
}

fn find_p8_key_in_standard_locations(key_id: &str) -> Option<PathBuf> {
    let filename = format!("AuthKey_{key_id}.p8");

    let mut search_paths = vec![PathBuf::from("./private_keys")];

    if let Some(home) = dirs::home_dir() {
        search_paths.push(home.join("private_keys"));
        search_paths.push(home.join(".private_keys"));
        search_paths.push(home.join(".appstoreconnect/private_keys"));
    }

    search_paths
        .into_iter()
        .map(|dir| dir.join(&filename))
        .find(|path| path.is_file())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_output_path() -> PathBuf {
    std::env::temp_dir()
}
