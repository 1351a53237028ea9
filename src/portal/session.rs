//! App Store Connect backed portal session

use super::{
    App, AppRegistry, AuthSession, Certificate, CertificatePool, CertificateStore, Device,
    ProfileStore, ProfileType, RemoteProfile,
};
use crate::apple_api::{
    AppleAPIClient, BundleIdAttributes, CertificateAttributes, CreateProfileAttributes,
    CreateProfileData, CreateProfileRelationships, CreateProfileRequest, DeviceAttributes,
    Document, PAGE_LIMIT, ProfileAttributes, Resource, ResourceRef, ToMany, ToOne,
};
use crate::config::ApiKeyConfig;
use crate::error::{ProvisionError, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

const PROFILE_ACTIVE: &str = "ACTIVE";
const DEVICE_ENABLED: &str = "ENABLED";

// Maximum number of related resources the API returns per included relationship
const RELATIONSHIP_LIMIT: &str = "50";

/// Portal session authenticated with an App Store Connect API key.
///
/// An API key is bound to a single team, so team selection only confirms the
/// key is accepted.
pub struct PortalSession {
    api_key: ApiKeyConfig,
    client: Option<AppleAPIClient>,
    user: Option<String>,
}

impl PortalSession {
    #[must_use]
    pub fn new(api_key: ApiKeyConfig) -> Self {
        Self {
            api_key,
            client: None,
            user: None,
        }
    }

    fn client(&self) -> Result<&AppleAPIClient> {
        self.client
            .as_ref()
            .ok_or_else(|| ProvisionError::Authentication("not logged in".to_string()))
    }

    async fn fetch_profiles(
        &self,
        profile_type: Option<ProfileType>,
        include: &str,
    ) -> Result<Vec<RemoteProfile>> {
        let mut query = vec![("include", include), ("limit", PAGE_LIMIT)];
        if include.contains("certificates") {
            query.push(("limit[certificates]", RELATIONSHIP_LIMIT));
        }
        if include.contains("devices") {
            query.push(("limit[devices]", RELATIONSHIP_LIMIT));
        }
        if let Some(ty) = profile_type {
            query.push(("filter[profileType]", ty.to_apple_api_string()));
        }

        let doc: Document<Vec<Resource<ProfileAttributes>>> = self
            .client()?
            .get_all("/v1/profiles", &query)
            .await
            .map_err(api_error)?;

        profiles_from_document(doc)
    }

    async fn certificates_in_pool(&self, pool: CertificatePool) -> Result<Vec<Certificate>> {
        let types = pool.apple_api_types().join(",");
        let doc: Document<Vec<Resource<CertificateAttributes>>> = self
            .client()?
            .get_all(
                "/v1/certificates",
                &[("filter[certificateType]", types.as_str()), ("limit", PAGE_LIMIT)],
            )
            .await
            .map_err(api_error)?;

        doc.data
            .into_iter()
            .map(|r| certificate_from_resource(r.id, &r.attributes, pool))
            .collect()
    }

    async fn require_app(&self, bundle_id: &str) -> Result<App> {
        self.find(bundle_id)
            .await?
            .ok_or_else(|| ProvisionError::AppNotFound {
                bundle_id: bundle_id.to_string(),
            })
    }

    async fn post_profile(
        &self,
        profile_type: ProfileType,
        name: &str,
        app: &App,
        certificates: &[Certificate],
        devices: Option<&[Device]>,
    ) -> Result<RemoteProfile> {
        let request = CreateProfileRequest {
            data: CreateProfileData {
                type_: "profiles".to_string(),
                attributes: CreateProfileAttributes {
                    name: name.to_string(),
                    profile_type: profile_type.to_apple_api_string().to_string(),
                },
                relationships: CreateProfileRelationships {
                    bundle_id: ToOne {
                        data: ResourceRef::new("bundleIds", &app.id),
                    },
                    certificates: ToMany {
                        data: certificates
                            .iter()
                            .map(|c| ResourceRef::new("certificates", &c.id))
                            .collect(),
                    },
                    devices: devices.map(|devices| ToMany {
                        data: devices
                            .iter()
                            .map(|d| ResourceRef::new("devices", &d.id))
                            .collect(),
                    }),
                },
            },
        };

        let doc: Document<Resource<ProfileAttributes>> = self
            .client()?
            .post("/v1/profiles", &request)
            .await
            .map_err(api_error)?;

        let profile_type_name = doc.data.attributes.profile_type.clone();
        let mut profile = profile_from_resource(doc.data, &HashMap::new())?.ok_or_else(|| {
            ProvisionError::AppStoreConnectApi(format!(
                "unsupported profile type '{profile_type_name}'"
            ))
        })?;
        profile.bundle_id = app.identifier.clone();
        profile.certificates = certificates.to_vec();
        profile.devices = devices.map(<[Device]>::to_vec).unwrap_or_default();
        Ok(profile)
    }
}

#[async_trait]
impl AuthSession for PortalSession {
    fn current_user(&self) -> Option<String> {
        self.user.clone()
    }

    async fn login(&mut self, username: &str) -> Result<()> {
        let key = &self.api_key;
        let client = AppleAPIClient::new(&key.key_id, &key.issuer_id, &key.private_key_path)
            .await
            .map_err(|e| ProvisionError::Authentication(format!("{e:#}")))?;
        client
            .test_credentials()
            .map_err(|e| ProvisionError::Authentication(format!("{e:#}")))?;

        self.client = Some(client);
        self.user = Some(username.to_string());
        Ok(())
    }

    async fn select_team(&mut self) -> Result<()> {
        let _: Document<Vec<Resource<BundleIdAttributes>>> = self
            .client()?
            .get("/v1/bundleIds", &[("limit", "1")])
            .await
            .map_err(|e| ProvisionError::Authentication(format!("team selection failed: {e:#}")))?;
        Ok(())
    }

    fn is_in_house(&self) -> bool {
        self.api_key.in_house
    }
}

#[async_trait]
impl ProfileStore for PortalSession {
    async fn find_by_bundle_id(
        &self,
        profile_type: ProfileType,
        bundle_id: &str,
    ) -> Result<Vec<RemoteProfile>> {
        let profiles = self
            .fetch_profiles(Some(profile_type), "bundleId,certificates,devices")
            .await?;
        Ok(profiles
            .into_iter()
            .filter(|p| p.bundle_id == bundle_id)
            .collect())
    }

    async fn list_all(&self, profile_type: Option<ProfileType>) -> Result<Vec<RemoteProfile>> {
        self.fetch_profiles(profile_type, "bundleId").await
    }

    async fn create(
        &self,
        profile_type: ProfileType,
        name: &str,
        bundle_id: &str,
        certificates: &[Certificate],
    ) -> Result<RemoteProfile> {
        let app = self.require_app(bundle_id).await?;
        let devices = if profile_type.is_device_scoped() {
            Some(self.devices_for_profile_type(profile_type).await?)
        } else {
            None
        };

        self.post_profile(profile_type, name, &app, certificates, devices.as_deref())
            .await
    }

    /// Profiles cannot be edited through the API, so the profile is deleted
    /// and recreated under the same name.
    async fn update(&self, profile: &RemoteProfile) -> Result<RemoteProfile> {
        let app = self.require_app(&profile.bundle_id).await?;

        self.client()?
            .delete(&format!("/v1/profiles/{}", profile.id))
            .await
            .map_err(api_error)?;

        let devices = profile
            .profile_type
            .is_device_scoped()
            .then_some(profile.devices.as_slice());
        self.post_profile(
            profile.profile_type,
            &profile.name,
            &app,
            &profile.certificates,
            devices,
        )
        .await
    }

    async fn devices_for_profile_type(&self, _profile_type: ProfileType) -> Result<Vec<Device>> {
        let doc: Document<Vec<Resource<DeviceAttributes>>> = self
            .client()?
            .get_all(
                "/v1/devices",
                &[
                    ("filter[platform]", "IOS"),
                    ("filter[status]", DEVICE_ENABLED),
                    ("limit", PAGE_LIMIT),
                ],
            )
            .await
            .map_err(api_error)?;

        Ok(doc
            .data
            .into_iter()
            .filter(|r| r.attributes.status.as_deref().is_none_or(|s| s == DEVICE_ENABLED))
            .map(|r| Device {
                id: r.id,
                name: r.attributes.name,
                udid: r.attributes.udid,
            })
            .collect())
    }

    async fn download(&self, profile: &RemoteProfile) -> Result<Vec<u8>> {
        if let Some(content) = &profile.content {
            return Ok(content.clone());
        }

        let doc: Document<Resource<ProfileAttributes>> = self
            .client()?
            .get(&format!("/v1/profiles/{}", profile.id), &[])
            .await
            .map_err(api_error)?;

        let encoded = doc.data.attributes.profile_content.ok_or_else(|| {
            ProvisionError::AppStoreConnectApi(format!(
                "profile '{}' has no downloadable content",
                profile.name
            ))
        })?;
        decode_base64(&encoded, "profile content")
    }
}

#[async_trait]
impl CertificateStore for PortalSession {
    async fn development(&self) -> Result<Vec<Certificate>> {
        self.certificates_in_pool(CertificatePool::Development).await
    }

    async fn in_house(&self) -> Result<Vec<Certificate>> {
        self.certificates_in_pool(CertificatePool::InHouse).await
    }

    async fn production(&self) -> Result<Vec<Certificate>> {
        self.certificates_in_pool(CertificatePool::Production).await
    }

    async fn download_raw(&self, certificate: &Certificate) -> Result<Vec<u8>> {
        if let Some(content) = &certificate.content {
            return Ok(content.clone());
        }

        let doc: Document<Resource<CertificateAttributes>> = self
            .client()?
            .get(&format!("/v1/certificates/{}", certificate.id), &[])
            .await
            .map_err(api_error)?;

        let encoded = doc.data.attributes.certificate_content.ok_or_else(|| {
            ProvisionError::AppStoreConnectApi(format!(
                "certificate '{}' has no downloadable content",
                certificate.id
            ))
        })?;
        decode_base64(&encoded, "certificate content")
    }
}

#[async_trait]
impl AppRegistry for PortalSession {
    async fn find(&self, bundle_id: &str) -> Result<Option<App>> {
        // The identifier filter also matches prefixes, so compare exactly
        let doc: Document<Vec<Resource<BundleIdAttributes>>> = self
            .client()?
            .get_all(
                "/v1/bundleIds",
                &[("filter[identifier]", bundle_id), ("limit", PAGE_LIMIT)],
            )
            .await
            .map_err(api_error)?;

        Ok(doc
            .data
            .into_iter()
            .find(|r| r.attributes.identifier == bundle_id)
            .map(|r| App {
                id: r.id,
                identifier: r.attributes.identifier,
                name: r.attributes.name,
            }))
    }
}

fn api_error(e: anyhow::Error) -> ProvisionError {
    ProvisionError::AppStoreConnectApi(format!("{e:#}"))
}

fn decode_base64(encoded: &str, what: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| ProvisionError::AppStoreConnectApi(format!("Failed to decode {what}: {e}")))
}

/// Parse `expirationDate`, which Apple sends with a `+0000` style offset
pub(crate) fn parse_apple_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn certificate_from_resource(
    id: String,
    attributes: &CertificateAttributes,
    pool: CertificatePool,
) -> Result<Certificate> {
    let owner_name = attributes
        .display_name
        .clone()
        .or_else(|| attributes.name.clone())
        .unwrap_or_default();

    let content = attributes
        .certificate_content
        .as_deref()
        .map(|c| decode_base64(c, "certificate content"))
        .transpose()?;

    Ok(Certificate {
        id,
        owner_name,
        expires: attributes.expiration_date.as_deref().and_then(parse_apple_date),
        pool,
        content,
    })
}

fn pool_for_certificate_type(certificate_type: Option<&str>) -> CertificatePool {
    match certificate_type {
        Some("IOS_DEVELOPMENT" | "DEVELOPMENT") => CertificatePool::Development,
        _ => CertificatePool::Production,
    }
}

/// Resolve included bundle ids, certificates and devices into profiles.
///
/// Profiles of platforms this crate does not handle are skipped; any other
/// decode failure fails the whole fetch.
fn profiles_from_document(
    doc: Document<Vec<Resource<ProfileAttributes>>>,
) -> Result<Vec<RemoteProfile>> {
    let included: HashMap<(String, String), serde_json::Value> = doc
        .included
        .into_iter()
        .map(|r| ((r.kind, r.id), r.attributes))
        .collect();

    let mut profiles = Vec::with_capacity(doc.data.len());
    for resource in doc.data {
        if let Some(profile) = profile_from_resource(resource, &included)? {
            profiles.push(profile);
        }
    }
    Ok(profiles)
}

fn profile_from_resource(
    resource: Resource<ProfileAttributes>,
    included: &HashMap<(String, String), serde_json::Value>,
) -> Result<Option<RemoteProfile>> {
    let lookup = |kind: &str, id: &str| included.get(&(kind.to_string(), id.to_string()));

    let Some(profile_type) = ProfileType::from_apple_api_string(&resource.attributes.profile_type)
    else {
        return Ok(None);
    };

    let bundle_id = match resource
        .related_ids("bundleId")
        .first()
        .and_then(|id| lookup("bundleIds", id))
    {
        Some(value) => serde_json::from_value::<BundleIdAttributes>(value.clone())?.identifier,
        None => String::new(),
    };

    let mut certificates = Vec::new();
    for id in resource.related_ids("certificates") {
        let Some(value) = lookup("certificates", id) else {
            continue;
        };
        let attributes: CertificateAttributes = serde_json::from_value(value.clone())?;
        let pool = if profile_type == ProfileType::InHouse {
            CertificatePool::InHouse
        } else {
            pool_for_certificate_type(attributes.certificate_type.as_deref())
        };
        certificates.push(certificate_from_resource(id.to_string(), &attributes, pool)?);
    }

    let mut devices = Vec::new();
    for id in resource.related_ids("devices") {
        let Some(value) = lookup("devices", id) else {
            continue;
        };
        let attributes: DeviceAttributes = serde_json::from_value(value.clone())?;
        devices.push(Device {
            id: id.to_string(),
            name: attributes.name,
            udid: attributes.udid,
        });
    }

    let attributes = resource.attributes;
    let content = attributes
        .profile_content
        .as_deref()
        .map(|c| decode_base64(c, "profile content"))
        .transpose()?;

    Ok(Some(RemoteProfile {
        id: resource.id,
        name: attributes.name,
        uuid: attributes.uuid,
        bundle_id,
        profile_type,
        devices,
        certificates,
        valid: attributes.profile_state.as_deref() == Some(PROFILE_ACTIVE),
        expires: attributes.expiration_date.as_deref().and_then(parse_apple_date),
        content,
    }))
}
