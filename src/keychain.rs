//! Local keychain lookups for downloaded certificates
//!
//! A certificate counts as installed when the login keychain holds a valid
//! code signing identity whose SHA-1 hash matches the certificate.

use crate::error::{ProvisionError, Result};
use crate::portal::TrustChecker;
use async_trait::async_trait;
use std::path::Path;

/// Trust checker backed by `security` and `openssl`
#[derive(Debug, Default, Clone, Copy)]
pub struct KeychainTrustChecker;

#[async_trait]
impl TrustChecker for KeychainTrustChecker {
    async fn is_installed(&self, cert_path: &Path) -> Result<bool> {
        let fingerprint = certificate_fingerprint(cert_path).await?;

        let output = tokio::process::Command::new("security")
            .args(["find-identity", "-v", "-p", "codesigning"])
            .output()
            .await
            .map_err(|e| {
                ProvisionError::CommandExecution(format!(
                    "Failed to run security command (macOS required): {e}"
                ))
            })?;

        let identities = parse_identity_hashes(output)?;
        Ok(identities
            .iter()
            .any(|hash| hash.eq_ignore_ascii_case(&fingerprint)))
    }
}

/// SHA-1 fingerprint of a DER certificate, upper-case hex without colons
async fn certificate_fingerprint(cert_path: &Path) -> Result<String> {
    let output = tokio::process::Command::new("openssl")
        .args(["x509", "-inform", "DER", "-fingerprint", "-sha1", "-noout", "-in"])
        .arg(cert_path)
        .output()
        .await
        .map_err(|e| {
            ProvisionError::CommandExecution(format!("Failed to run openssl (is it in PATH?): {e}"))
        })?;

    if !output.status.success() {
        return Err(ProvisionError::CommandExecution(format!(
            "openssl could not read certificate {}: {}",
            cert_path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_fingerprint(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `SHA1 Fingerprint=AB:CD:...` (LibreSSL) or `sha1 Fingerprint=...` (OpenSSL 3)
fn parse_fingerprint(line: &str) -> Result<String> {
    let (label, hash) = line
        .trim()
        .split_once('=')
        .ok_or_else(|| ProvisionError::CommandExecution("Invalid fingerprint format".to_string()))?;

    if !label.to_ascii_lowercase().contains("fingerprint") {
        return Err(ProvisionError::CommandExecution(format!(
            "Invalid fingerprint format: {line}"
        )));
    }

    Ok(hash.trim().replace(':', "").to_ascii_uppercase())
}

/// Extract identity hashes from `security find-identity -v -p codesigning`
///
/// # Example Output Parsing
/// Input: `  1) 0123ABCD... "Apple Distribution: Acme Corp (TEAM123)"`
/// Output: `["0123ABCD..."]`
fn parse_identity_hashes(output: std::process::Output) -> Result<Vec<String>> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProvisionError::CommandExecution(format!(
            "security find-identity failed with status {}: {}",
            output.status.code().unwrap_or(-1),
            stderr
        )));
    }

    let output_str = std::str::from_utf8(&output.stdout).map_err(|e| {
        ProvisionError::CommandExecution(format!("security command output is not valid UTF-8: {e}"))
    })?;

    Ok(output_str
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("valid identities found"))
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter(|hash| hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit()))
        .map(str::to_string)
        .collect())
}
