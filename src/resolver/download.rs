//! Writing downloaded profiles to disk

use crate::error::{ProvisionError, Result};
use crate::portal::{ProfileStore, RemoteProfile};
use crate::success;
use std::path::{Path, PathBuf};

/// Extension of signed iOS provisioning profiles
pub const PROFILE_EXTENSION: &str = ".mobileprovision";

/// File name for a profile: `<type>_<bundle id>.mobileprovision`, or the
/// override with the extension appended when it does not already end in it.
#[must_use]
pub fn profile_file_name(profile: &RemoteProfile, bundle_id: &str, filename: Option<&str>) -> String {
    let label = match filename {
        Some(name) => name.to_string(),
        None => format!("{}_{bundle_id}", profile.profile_type.pretty_type()),
    };

    if label.ends_with(PROFILE_EXTENSION) {
        label
    } else {
        format!("{label}{PROFILE_EXTENSION}")
    }
}

/// Download `profile` and write it into `output_dir`, replacing any
/// existing file. Returns the absolute path written.
pub async fn persist<S>(
    store: &S,
    profile: &RemoteProfile,
    bundle_id: &str,
    output_dir: &Path,
    filename: Option<&str>,
) -> Result<PathBuf>
where
    S: ProfileStore + ?Sized,
{
    crate::notice!("Downloading provisioning profile...");
    let content = store.download(profile).await?;
    if content.is_empty() {
        return Err(ProvisionError::Resolution(format!(
            "profile missing: '{}' downloaded without content",
            profile.name
        )));
    }

    tokio::fs::create_dir_all(output_dir).await?;
    let output_path = std::path::absolute(output_dir.join(profile_file_name(
        profile, bundle_id, filename,
    )))?;

    tokio::fs::write(&output_path, &content).await.map_err(|e| {
        ProvisionError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to write {}: {e}", output_path.display()),
        ))
    })?;

    success!("Successfully downloaded provisioning profile");
    Ok(output_path)
}
