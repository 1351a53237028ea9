//! Error types for provisioning profile resolution.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error(
        "Could not find a matching code signing identity for {profile_type}{}",
        describe_filters(.filters)
    )]
    NoCertificate {
        profile_type: String,
        filters: Vec<String>,
    },

    #[error("Could not find App with App Identifier '{bundle_id}'")]
    AppNotFound { bundle_id: String },

    #[error("Profile resolution failed: {0}")]
    Resolution(String),

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("App Store Connect API error: {0}")]
    AppStoreConnectApi(String),

    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

fn describe_filters(filters: &[String]) -> String {
    if filters.is_empty() {
        String::new()
    } else {
        format!(" (filters: {})", filters.join(", "))
    }
}
