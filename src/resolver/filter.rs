//! Narrowing fetched profiles down to usable candidates

use crate::error::{ProvisionError, Result};
use crate::portal::{CertificateStore, RemoteProfile, TrustChecker};
use tempfile::TempDir;

/// Keep profiles whose trimmed name equals `name`.
///
/// With `strict`, the filtered set replaces the input even when empty.
/// Otherwise an empty match falls back to the unfiltered input.
#[must_use]
pub fn filter_by_name(profiles: Vec<RemoteProfile>, name: &str, strict: bool) -> Vec<RemoteProfile> {
    let target = name.trim();
    let matching: Vec<RemoteProfile> = profiles
        .iter()
        .filter(|p| p.name.trim() == target)
        .cloned()
        .collect();

    if strict || !matching.is_empty() {
        matching
    } else {
        profiles
    }
}

/// Keep profiles signed by at least one certificate installed locally.
///
/// Each certificate is written to its own temporary directory, which is
/// removed as soon as that check finishes. Write or lookup failures abort
/// the whole filter instead of counting as "not installed".
pub async fn filter_installed<S, T>(
    profiles: Vec<RemoteProfile>,
    store: &S,
    trust: &T,
) -> Result<Vec<RemoteProfile>>
where
    S: CertificateStore + ?Sized,
    T: TrustChecker + ?Sized,
{
    let mut installed = Vec::with_capacity(profiles.len());
    for profile in profiles {
        if has_installed_certificate(&profile, store, trust).await? {
            installed.push(profile);
        }
    }
    Ok(installed)
}

async fn has_installed_certificate<S, T>(profile: &RemoteProfile, store: &S, trust: &T) -> Result<bool>
where
    S: CertificateStore + ?Sized,
    T: TrustChecker + ?Sized,
{
    for cert in &profile.certificates {
        let raw = store.download_raw(cert).await?;

        let temp_dir = TempDir::new()?;
        let cert_path = temp_dir.path().join("cert.cer");
        tokio::fs::write(&cert_path, &raw).await.map_err(|e| {
            ProvisionError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write certificate {} for verification: {e}", cert.id),
            ))
        })?;

        let found = trust.is_installed(&cert_path).await;
        drop(temp_dir);

        if found? {
            return Ok(true);
        }
    }
    Ok(false)
}
