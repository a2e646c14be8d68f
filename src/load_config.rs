/// `load_config` module: merges the optional YAML settings file, CLI flags and
/// environment secrets into the immutable settings of one invocation.
///
/// # Responsibilities
/// - Parse the YAML settings file (`organization`, `workspace`, `hostname`).
/// - Apply precedence: CLI flag, then settings file, then environment/default.
/// - Read `TFE_TOKEN` (required for uploads) and `TFE_HOSTNAME` from the environment.
/// - Build the core [`UploadConfig`] and the client-side [`ApiSettings`].
///
/// # Errors
/// Everything surfaces as `anyhow::Error` at the CLI boundary; missing values are
/// reported as [`UploadError::Config`] so the message names the missing key.
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use tfc_upload_core::config::{ArchiverChoice, SelectionPolicy, UploadConfig};
use tfc_upload_core::error::UploadError;

pub const TOKEN_ENV: &str = "TFE_TOKEN";
pub const HOSTNAME_ENV: &str = "TFE_HOSTNAME";
pub const DEFAULT_HOSTNAME: &str = "app.terraform.io";

/// Contents of the optional YAML settings file. Every key may be omitted.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub organization: Option<String>,
    pub workspace: Option<String>,
    pub hostname: Option<String>,
}

/// Values given on the command line; they win over the settings file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub organization: Option<String>,
    pub workspace: Option<String>,
    pub hostname: Option<String>,
}

/// Where and how to reach the workspace service.
#[derive(Clone)]
pub struct ApiSettings {
    pub hostname: String,
    pub token: String,
}

impl ApiSettings {
    /// `https://<hostname>/api/v2`, keeping an explicit scheme if one was given.
    pub fn base_url(&self) -> String {
        let host = self.hostname.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/api/v2")
        } else {
            format!("https://{host}/api/v2")
        }
    }
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("hostname", &self.hostname)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Read and parse the YAML settings file.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<SettingsFile> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading settings from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read settings file");
            return Err(anyhow::anyhow!(
                "Failed to read settings file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file deserializes to unit, not to a map.
    if content.trim().is_empty() {
        return Ok(SettingsFile::default());
    }

    match serde_yaml::from_str(&content) {
        Ok(settings) => {
            info!(config_path = ?path_ref, "Parsed settings YAML successfully");
            Ok(settings)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse settings YAML");
            Err(anyhow::anyhow!("Failed to parse settings YAML: {e}"))
        }
    }
}

/// Resolve the API endpoint and token. The hostname comes from the flag, then
/// the settings file, then `TFE_HOSTNAME`, then the public default.
pub fn api_settings(overrides: &Overrides, file: &SettingsFile) -> Result<ApiSettings> {
    let hostname = overrides
        .hostname
        .clone()
        .or_else(|| file.hostname.clone())
        .or_else(|| non_empty_env(HOSTNAME_ENV))
        .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string());

    let token = match non_empty_env(TOKEN_ENV) {
        Some(token) => token,
        None => {
            error!(var = TOKEN_ENV, "API token missing in environment");
            return Err(UploadError::Config(format!("{TOKEN_ENV} is not set")).into());
        }
    };

    info!(%hostname, token_set = !token.is_empty(), "Resolved API settings");
    Ok(ApiSettings { hostname, token })
}

/// Build the core configuration for an upload.
pub fn upload_config(
    root: PathBuf,
    policy: SelectionPolicy,
    archiver: ArchiverChoice,
    poll_secs: u64,
    overrides: &Overrides,
    file: &SettingsFile,
) -> Result<UploadConfig> {
    let organization = required("organization", &overrides.organization, &file.organization)?;
    let workspace = required("workspace", &overrides.workspace, &file.workspace)?;

    Ok(UploadConfig {
        root,
        policy,
        poll_interval: Duration::from_secs(poll_secs),
        organization,
        workspace,
        archiver,
    })
}

fn required(key: &str, flag: &Option<String>, file: &Option<String>) -> Result<String> {
    match flag.clone().or_else(|| file.clone()) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => {
            error!(key, "Required setting missing");
            Err(UploadError::Config(format!(
                "{key} must be given with --{key} or in the settings file"
            ))
            .into())
        }
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
