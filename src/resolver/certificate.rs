//! Signing certificate selection for new profiles

use crate::error::{ProvisionError, Result};
use crate::portal::{Certificate, CertificatePool, CertificateStore, ProfileType};
use crate::{info, notice};

/// Optional exact-match filters, compared after trimming
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateFilters {
    pub cert_id: Option<String>,
    pub owner_name: Option<String>,
}

impl CertificateFilters {
    fn matches(&self, certificate: &Certificate) -> bool {
        let id_ok = self
            .cert_id
            .as_deref()
            .is_none_or(|id| certificate.id.trim() == id.trim());
        let owner_ok = self
            .owner_name
            .as_deref()
            .is_none_or(|owner| certificate.owner_name.trim() == owner.trim());
        id_ok && owner_ok
    }

    /// Human-readable description of the active filters
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        let mut filters = Vec::new();
        if let Some(owner) = &self.owner_name {
            filters.push(format!("Owner Name: '{owner}'"));
        }
        if let Some(id) = &self.cert_id {
            filters.push(format!("Certificate ID: '{id}'"));
        }
        filters
    }
}

/// Certificates a new profile is signed with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSelection {
    /// Distribution profiles take exactly one certificate
    Single(Certificate),
    /// Development profiles can carry every matching certificate
    Multiple(Vec<Certificate>),
}

impl CertificateSelection {
    #[must_use]
    pub fn into_vec(self) -> Vec<Certificate> {
        match self {
            Self::Single(cert) => vec![cert],
            Self::Multiple(certs) => certs,
        }
    }
}

/// Pick the certificate(s) for a new profile of `profile_type`.
///
/// Ties are broken by server order: when several certificates match a
/// distribution profile, the first one listed wins.
pub async fn select_certificate<S>(
    store: &S,
    profile_type: ProfileType,
    filters: &CertificateFilters,
) -> Result<CertificateSelection>
where
    S: CertificateStore + ?Sized,
{
    let pool = match profile_type.certificate_pool() {
        CertificatePool::Development => store.development().await?,
        CertificatePool::InHouse => store.in_house().await?,
        CertificatePool::Production => store.production().await?,
    };

    let mut candidates: Vec<Certificate> =
        pool.into_iter().filter(|c| filters.matches(c)).collect();

    if candidates.is_empty() {
        let active = filters.describe();
        if !active.is_empty() {
            notice!("No certificates for filter: {}", active.join(" "));
        }
        return Err(ProvisionError::NoCertificate {
            profile_type: profile_type.to_string(),
            filters: active,
        });
    }

    if profile_type == ProfileType::Development {
        return Ok(CertificateSelection::Multiple(candidates));
    }

    if candidates.len() > 1 {
        notice!(
            "Found more than one code signing identity. Choosing the first one. \
             Use --cert-id or --cert-owner-name to pick another."
        );
        info!("Available Code Signing Identities for current filters:");
        for cert in &candidates {
            info!("\t- {}", cert.describe());
        }
    }

    Ok(CertificateSelection::Single(candidates.remove(0)))
}
