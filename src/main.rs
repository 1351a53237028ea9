use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use kodegen_bundler_provision::config::{ENV_USERNAME, expand_tilde_path};
use kodegen_bundler_provision::{
    ApiKeyConfig, KeychainTrustChecker, PortalSession, ProfileResolver, ProvisionError,
    ProvisionOptions, error, output, success,
};

// ============================================================================
// ERROR HANDLING STRATEGY
// ============================================================================
//
// CRITICAL I/O (config files, API calls, the profile write) is propagated
// with `?` and ends the run with a non-zero exit code.
//
// DECORATIVE I/O (colored status lines) ignores errors with `let _ =`, so a
// closed stdout or missing TTY never fails the run.
//
// The resolved path is the only thing printed with `println!`, as the last
// line on stdout, so scripts can capture it.
// ============================================================================

#[derive(Parser)]
#[command(name = "kodegen_provision")]
#[command(version, about = "Fetch or create an iOS provisioning profile for a bundle identifier")]
struct Cli {
    /// Path to options file (TOML)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Apple account the profile is resolved for
    #[arg(long, short = 'u', env = ENV_USERNAME)]
    username: Option<String>,

    /// Bundle identifier of the app
    #[arg(long, short = 'a')]
    app_identifier: Option<String>,

    /// Resolve an ad-hoc profile
    #[arg(long)]
    adhoc: bool,

    /// Resolve a development profile (wins over --adhoc)
    #[arg(long)]
    development: bool,

    /// Regenerate the profile; device-scoped profiles get every registered device
    #[arg(long)]
    force: bool,

    /// Always create a new profile without looking for existing ones
    #[arg(long)]
    skip_fetch_profiles: bool,

    /// Do not require the profile's certificate in the local keychain
    #[arg(long)]
    skip_certificate_verification: bool,

    /// Name of the profile to use or create
    #[arg(long, short = 'n')]
    provisioning_name: Option<String>,

    /// Only accept profiles named exactly --provisioning-name
    #[arg(long)]
    ignore_profiles_with_different_name: bool,

    /// Certificate id to sign new profiles with
    #[arg(long)]
    cert_id: Option<String>,

    /// Certificate owner name to sign new profiles with
    #[arg(long)]
    cert_owner_name: Option<String>,

    /// Directory the profile is written to (defaults to the temp directory)
    #[arg(long, short = 'o')]
    output_path: Option<PathBuf>,

    /// File name of the written profile
    #[arg(long, short = 'q')]
    filename: Option<String>,

    /// App Store Connect Key ID
    #[arg(long, requires_all = ["issuer_id", "private_key"])]
    key_id: Option<String>,

    /// App Store Connect Issuer ID
    #[arg(long, requires_all = ["key_id", "private_key"])]
    issuer_id: Option<String>,

    /// Path to .p8 private key file
    #[arg(long, requires_all = ["key_id", "issuer_id"])]
    private_key: Option<PathBuf>,

    /// The API key belongs to an enterprise (in-house) team
    #[arg(long)]
    in_house: bool,

    /// Do not print the options summary before resolving
    #[arg(long)]
    no_summary: bool,
}

impl Cli {
    fn options(&self) -> ProvisionOptions {
        let api_key = match (&self.key_id, &self.issuer_id, &self.private_key) {
            (Some(key_id), Some(issuer_id), Some(private_key)) => Some(ApiKeyConfig {
                key_id: key_id.clone(),
                issuer_id: issuer_id.clone(),
                private_key_path: private_key.clone(),
                in_house: self.in_house,
            }),
            _ => None,
        };

        ProvisionOptions {
            username: self.username.clone(),
            app_identifier: self.app_identifier.clone(),
            adhoc: self.adhoc,
            development: self.development,
            force: self.force,
            skip_fetch_profiles: self.skip_fetch_profiles,
            skip_certificate_verification: self.skip_certificate_verification,
            provisioning_name: self.provisioning_name.clone(),
            ignore_profiles_with_different_name: self.ignore_profiles_with_different_name,
            cert_id: self.cert_id.clone(),
            cert_owner_name: self.cert_owner_name.clone(),
            output_path: self.output_path.clone(),
            filename: self.filename.clone(),
            api_key,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<PathBuf> {
    let file_options = match &cli.config {
        Some(path) => {
            let path = PathBuf::from(expand_tilde_path(&path.to_string_lossy())?);
            ProvisionOptions::from_file(&path)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => ProvisionOptions::default(),
    };

    let mut options = file_options.merge(cli.options());
    if options.api_key.is_none() {
        options.api_key = ApiKeyConfig::from_env();
    }
    if cli.in_house
        && let Some(key) = options.api_key.as_mut()
    {
        key.in_house = true;
    }

    let (config, api_key) = options.into_config()?;
    let api_key = api_key
        .ok_or_else(|| {
            ProvisionError::MissingConfig(
                "App Store Connect API key (pass --key-id/--issuer-id/--private-key, \
                 add an [api_key] table to the config file, or set APPLE_API_KEY and APPLE_API_ISSUER)"
                    .to_string(),
            )
        })?
        .expanded()?;

    if !cli.no_summary {
        output::print_summary(&config);
    }

    let mut portal = PortalSession::new(api_key);
    let trust = KeychainTrustChecker;
    let resolution = ProfileResolver::new(&config, &trust)
        .run(&mut portal)
        .await?;

    success!(
        "{} profile '{}' ready{}",
        resolution.profile_type,
        resolution.profile.name,
        if resolution.in_house { " (in-house)" } else { "" }
    );
    Ok(resolution.path)
}
