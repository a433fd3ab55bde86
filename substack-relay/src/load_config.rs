/// `load_config` module: loads the static YAML relay config and injects the session secret from the environment.
///
/// This is the only place where user-supplied YAML is parsed and mapped onto typed settings.
///
/// # Responsibilities
/// - Parse the YAML file into [`CliConfig`]
/// - Take the API key (`SUBSTACK_API_KEY`) from the environment, never from the file
/// - Fall back to `SUBSTACK_PUBLICATION_ADDRESS` when the file names no publication
/// - Reject settings the operation layer cannot run with (zero limits, invalid hosts)
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
///
/// Example file:
///
/// ```yaml
/// publication_address: example.substack.com
/// api_base: https://substack.com/api/v1   # optional
/// defaults:
///   limit: 25
///   note_format: markdown
/// continue_on_fail: true
/// ```
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use substack_relay_core::convert::NoteFormat;
use substack_relay_core::credentials::Credentials;
use substack_relay_core::operation::{ExecuteOptions, DEFAULT_LIMIT};
use tracing::{error, info};

pub const API_KEY_ENV: &str = "SUBSTACK_API_KEY";
pub const PUBLICATION_ENV: &str = "SUBSTACK_PUBLICATION_ADDRESS";

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub credentials: Credentials,
    pub api_base: Option<String>,
    pub defaults: DefaultsSection,
    pub continue_on_fail: bool,
}

impl CliConfig {
    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            continue_on_fail: self.continue_on_fail,
            default_limit: self.defaults.limit,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub note_format: NoteFormat,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            note_format: NoteFormat::default(),
        }
    }
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Loads a static YAML config file (no secrets) and injects the API key from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    #[derive(Debug, Deserialize)]
    struct RawConfig {
        #[serde(default)]
        publication_address: Option<String>,
        #[serde(default)]
        api_base: Option<String>,
        #[serde(default)]
        defaults: DefaultsSection,
        #[serde(default)]
        continue_on_fail: bool,
    }

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if raw.defaults.limit == 0 {
        error!(config_path = ?path_ref, "defaults.limit must be at least 1");
        return Err(anyhow!("Invalid config: defaults.limit must be at least 1"));
    }

    let publication_address = match raw.publication_address.filter(|a| !a.trim().is_empty()) {
        Some(address) => address,
        None => env::var(PUBLICATION_ENV).map_err(|_| {
            error!("No publication address in config or environment");
            anyhow!("Missing publication_address in config and {PUBLICATION_ENV} is not set")
        })?,
    };

    let api_key = env::var(API_KEY_ENV).map_err(|e| {
        error!(error = ?e, "{} missing in environment", API_KEY_ENV);
        anyhow!("{API_KEY_ENV} must be set in the environment")
    })?;

    let credentials = Credentials::new(publication_address, api_key);
    credentials
        .validate()
        .map_err(|e| anyhow!("Invalid credentials: {e}"))?;
    info!(
        publication = %credentials.publication_address,
        limit = raw.defaults.limit,
        note_format = %raw.defaults.note_format,
        continue_on_fail = raw.continue_on_fail,
        "Configuration loaded"
    );

    Ok(CliConfig {
        credentials,
        api_base: raw.api_base,
        defaults: raw.defaults,
        continue_on_fail: raw.continue_on_fail,
    })
}
