use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Environment variable consulted when `[smms]` carries no `api-token`
pub const SMMS_TOKEN_ENV: &str = "SMMS_API_TOKEN";

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use md_rehost::config::load_config;
///
/// let config = load_config(Path::new("rehost.toml")).unwrap();
/// println!("Scanning: {}", config.documents.root.display());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Resolves the SM.MS API token
///
/// The token from the config file wins; otherwise `SMMS_API_TOKEN` is read.
/// Returns `Ok(None)` when no `[smms]` section and no environment token exist,
/// which means the run is download-only.
pub fn resolve_smms_token(config: &Config) -> Result<Option<String>, ConfigError> {
    select_smms_token(config, std::env::var(SMMS_TOKEN_ENV).ok())
}

/// Picks between the file token and an environment token
///
/// An `[smms]` section with neither is a [`ConfigError::MissingCredential`].
fn select_smms_token(
    config: &Config,
    env_token: Option<String>,
) -> Result<Option<String>, ConfigError> {
    let usable = |token: &String| !token.trim().is_empty();

    let token = config
        .smms
        .as_ref()
        .and_then(|smms| smms.api_token.clone())
        .filter(usable)
        .or_else(|| env_token.filter(usable));

    match token {
        None if config.smms.is_some() => Err(ConfigError::MissingCredential(format!(
            "[smms] is configured but neither api-token nor {} is set",
            SMMS_TOKEN_ENV
        ))),
        token => Ok(token),
    }
}
