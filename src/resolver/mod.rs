//! Provisioning profile resolution
//!
//! Given a bundle identifier, find or create a matching provisioning profile
//! and write it to disk:
//! - `certificate` - picking signing certificates for new profiles
//! - `filter` - narrowing fetched profiles by name and installed certificates
//! - `download` - naming and writing the profile file
//!
//! Remote listings are used in the order the portal returns them. Nothing is
//! re-sorted, so "first" always means first in server order.

mod certificate;
mod download;
mod filter;

pub use certificate::{CertificateFilters, CertificateSelection, select_certificate};
pub use download::{PROFILE_EXTENSION, persist, profile_file_name};
pub use filter::{filter_by_name, filter_installed};

use crate::config::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use crate::portal::{Portal, ProfileType, RemoteProfile, TrustChecker};
use crate::{error, info, notice, success, warn};
use chrono::Utc;
use std::path::PathBuf;

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub profile: RemoteProfile,
    pub profile_type: ProfileType,
    /// Absolute path of the written profile
    pub path: PathBuf,
    /// Profile belongs to an enterprise (in-house) team
    pub in_house: bool,
}

/// Profile type for this run.
///
/// Starts from App Store and applies overrides in order: in-house account,
/// `adhoc`, `development`. The last applicable override wins.
#[must_use]
pub fn select_profile_type(config: &ProvisionConfig, in_house_account: bool) -> ProfileType {
    let mut profile_type = ProfileType::AppStore;
    if in_house_account {
        profile_type = ProfileType::InHouse;
    }
    if config.adhoc {
        profile_type = ProfileType::AdHoc;
    }
    if config.development {
        profile_type = ProfileType::Development;
    }
    profile_type
}

/// Resolve the profile described by `config` and return the written path
pub async fn resolve<P, T>(config: &ProvisionConfig, portal: &mut P, trust: &T) -> Result<PathBuf>
where
    P: Portal + ?Sized,
    T: TrustChecker + ?Sized,
{
    let resolution = ProfileResolver::new(config, trust).run(portal).await?;
    Ok(resolution.path)
}

pub struct ProfileResolver<'a, T: ?Sized> {
    config: &'a ProvisionConfig,
    trust: &'a T,
}

impl<'a, T> ProfileResolver<'a, T>
where
    T: TrustChecker + ?Sized,
{
    #[must_use]
    pub fn new(config: &'a ProvisionConfig, trust: &'a T) -> Self {
        Self { config, trust }
    }

    /// Reuse, refresh or create the profile and download it
    pub async fn run<P>(&self, portal: &mut P) -> Result<Resolution>
    where
        P: Portal + ?Sized,
    {
        self.ensure_session(portal).await?;

        if self.config.adhoc && self.config.development {
            warn!("Both adhoc and development are set, resolving a Development profile");
        }
        let profile_type = select_profile_type(self.config, portal.is_in_house());

        let profiles = if self.config.skip_fetch_profiles {
            Vec::new()
        } else {
            self.fetch_profiles(&*portal, profile_type).await?
        };

        let profile = match profiles.into_iter().next() {
            Some(profile) if self.config.force => {
                self.refresh(&*portal, profile, profile_type).await?
            }
            Some(profile) => profile,
            None => {
                notice!(
                    "No existing profiles found that match the certificates you have installed, creating a new one for you"
                );
                info!(
                    "You can run with --skip-certificate-verification to not verify the local certificates of the profile"
                );
                self.ensure_app_exists(&*portal).await?;
                self.create_profile(&*portal, profile_type).await?
            }
        };

        let path = persist(
            &*portal,
            &profile,
            &self.config.app_identifier,
            &self.config.output_path,
            self.config.filename.as_deref(),
        )
        .await?;

        Ok(Resolution {
            profile,
            profile_type,
            path,
            in_house: profile_type == ProfileType::InHouse,
        })
    }

    async fn ensure_session<P>(&self, portal: &mut P) -> Result<()>
    where
        P: Portal + ?Sized,
    {
        let username = self.config.username.as_str();
        if portal.current_user().as_deref() == Some(username) {
            return Ok(());
        }

        info!("Starting login with user '{username}'");
        portal.login(username).await?;
        portal.select_team().await?;
        success!("Successfully logged in");
        Ok(())
    }

    /// Valid profiles for the bundle id that pass the name and keychain filters
    async fn fetch_profiles<P>(&self, portal: &P, profile_type: ProfileType) -> Result<Vec<RemoteProfile>>
    where
        P: Portal + ?Sized,
    {
        info!("Fetching profiles...");
        let mut profiles: Vec<RemoteProfile> = portal
            .find_by_bundle_id(profile_type, &self.config.app_identifier)
            .await?
            .into_iter()
            .filter(|p| p.valid)
            .collect();

        if let Some(name) = &self.config.provisioning_name {
            profiles = filter_by_name(
                profiles,
                name,
                self.config.ignore_profiles_with_different_name,
            );
        }

        if !self.config.skip_certificate_verification {
            profiles = filter_installed(profiles, portal, self.trust).await?;
        }

        if !profiles.is_empty() {
            notice!("Found {} matching profile(s)", profiles.len());
        }
        Ok(profiles)
    }

    /// Regenerate an existing profile, widening device-scoped profiles to
    /// every registered device first
    async fn refresh<P>(
        &self,
        portal: &P,
        mut profile: RemoteProfile,
        profile_type: ProfileType,
    ) -> Result<RemoteProfile>
    where
        P: Portal + ?Sized,
    {
        if profile_type.is_device_scoped() {
            notice!("Updating the profile to include all devices");
            profile.devices = portal.devices_for_profile_type(profile.profile_type).await?;
        } else {
            notice!("Updating the provisioning profile");
        }

        portal
            .update(&profile)
            .await
            .map_err(|e| ProvisionError::Resolution(format!("update failed: {e}")))
    }

    async fn ensure_app_exists<P>(&self, portal: &P) -> Result<()>
    where
        P: Portal + ?Sized,
    {
        let bundle_id = &self.config.app_identifier;
        if portal.find(bundle_id).await?.is_some() {
            return Ok(());
        }

        print_register_app_guidance(&self.config.username, bundle_id);
        Err(ProvisionError::AppNotFound {
            bundle_id: bundle_id.clone(),
        })
    }

    async fn create_profile<P>(&self, portal: &P, profile_type: ProfileType) -> Result<RemoteProfile>
    where
        P: Portal + ?Sized,
    {
        let filters = CertificateFilters {
            cert_id: self.config.cert_id.clone(),
            owner_name: self.config.cert_owner_name.clone(),
        };
        let certificates = select_certificate(portal, profile_type, &filters)
            .await?
            .into_vec();

        let bundle_id = &self.config.app_identifier;
        let mut name = self
            .config
            .provisioning_name
            .clone()
            .unwrap_or_else(|| format!("{bundle_id} {}", profile_type.pretty_type()));

        // Names are unique across every profile type of the team
        if !self.config.skip_fetch_profiles
            && portal.list_all(None).await?.iter().any(|p| p.name == name)
        {
            error!("The name '{name}' is already taken, using another one.");
            name = format!("{name} {}", Utc::now().timestamp());
        }

        notice!("Creating new provisioning profile for '{bundle_id}' with name '{name}'");
        portal
            .create(profile_type, &name, bundle_id, &certificates)
            .await
    }
}

fn print_register_app_guidance(username: &str, bundle_id: &str) {
    let rule = "=".repeat(42);
    info!("");
    notice!("{rule}");
    info!("Could not find App ID with bundle identifier '{bundle_id}'");
    info!("Register it on the Developer Portal:");
    info!("  https://developer.apple.com/account/resources/identifiers/add/bundleId");
    info!("or create it with fastlane produce:");
    info!("");
    notice!("  produce -u {username} -a {bundle_id} --skip_itc");
    info!("");
    notice!("{rule}");
    info!("");
}
