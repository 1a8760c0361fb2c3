//! Configuration management for the backoffice tools.
//!
//! Loads configuration from ${BACKOFFICE_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// This ensures new comments/sections from the template are always present,
/// while preserving user's customized values.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;

    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for backoffice configuration and data files.
    //!
    //! BACKOFFICE_HOME resolution order:
    //! 1. BACKOFFICE_HOME environment variable (if set)
    //! 2. ~/.config/backoffice (default)
    //! 3. ./.backoffice when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the backoffice home directory.
    pub fn backoffice_home() -> PathBuf {
        if let Ok(home) = std::env::var("BACKOFFICE_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".backoffice"),
            |h| h.join(".config").join("backoffice"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        backoffice_home().join("config.toml")
    }

    /// Returns the path to the durable token file (`adminToken`/`refreshToken`).
    pub fn tokens_path() -> PathBuf {
        backoffice_home().join("tokens.json")
    }

    /// Returns the path to the identity provider's persisted session.
    pub fn session_path() -> PathBuf {
        backoffice_home().join("session.json")
    }

    /// Returns the directory holding log files.
    pub fn logs_dir() -> PathBuf {
        backoffice_home().join("logs")
    }
}

/// Admin API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the admin API.
    pub base_url: Option<String>,
    /// Venue/tenant code sent with refresh requests.
    pub venue: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: Some(Config::DEFAULT_BACKEND_URL.to_string()),
            venue: None,
        }
    }
}

/// Identity provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base URL of the identity provider REST API.
    pub base_url: Option<String>,
    /// Public API key sent as `apikey` on provider calls.
    pub api_key: Option<String>,
}

/// Static keys identifying admin console traffic to the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub client_key: Option<String>,
}

/// Session lifecycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime assumed for a refreshed access token (the refresh response has no expiry).
    pub lifetime_secs: u64,
    /// Timeout for the initial session lookup (0 waits forever).
    pub lookup_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: Config::DEFAULT_LIFETIME_SECS,
            lookup_timeout_secs: Config::DEFAULT_LOOKUP_TIMEOUT_SECS,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level used when `BACKOFFICE_LOG` is unset.
    pub log_level: String,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Self::DEFAULT_LOG_LEVEL.to_string(),
            backend: BackendConfig::default(),
            identity: IdentityConfig::default(),
            client: ClientConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    const DEFAULT_LOG_LEVEL: &str = "info";
    const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
    const DEFAULT_VENUE: &str = "main";
    const DEFAULT_LIFETIME_SECS: u64 = 3600;
    const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Saves only the backend venue to a specific config file path.
    ///
    /// Creates the file with default template if it doesn't exist.
    /// If file exists, merges user values into the latest template.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read, parsed or written.
    pub fn save_venue_to(path: &Path, venue: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["backend"]["venue"] = value(venue);

        Self::write_config(path, &doc.to_string())
    }

    /// Resolves the admin API base URL with precedence: env > config > default.
    ///
    /// # Errors
    /// Returns an error if the resolved URL is malformed.
    pub fn backend_url(&self) -> Result<String> {
        resolve_base_url(
            env_value("BACKOFFICE_API_URL"),
            self.backend.base_url.as_deref(),
            Some(Self::DEFAULT_BACKEND_URL),
            "backend",
        )
        .map(|url| url.unwrap_or_else(|| Self::DEFAULT_BACKEND_URL.to_string()))
    }

    /// Resolves the identity provider base URL, if one is configured.
    ///
    /// # Errors
    /// Returns an error if the resolved URL is malformed.
    pub fn identity_url(&self) -> Result<Option<String>> {
        resolve_base_url(
            env_value("BACKOFFICE_IDENTITY_URL"),
            self.identity.base_url.as_deref(),
            None,
            "identity",
        )
    }

    /// Resolves the venue code with precedence: env > config > default.
    pub fn venue(&self) -> String {
        first_non_empty(env_value("BACKOFFICE_VENUE"), self.backend.venue.as_deref())
            .unwrap_or_else(|| Self::DEFAULT_VENUE.to_string())
    }

    /// Resolves the identity provider API key with precedence: config > env.
    pub fn identity_api_key(&self) -> Option<String> {
        first_non_empty(
            self.identity.api_key.clone(),
            env_value("BACKOFFICE_IDENTITY_API_KEY").as_deref(),
        )
    }

    /// Resolves the client API key with precedence: config > env.
    pub fn client_api_key(&self) -> Option<String> {
        first_non_empty(
            self.client.api_key.clone(),
            env_value("BACKOFFICE_CLIENT_API_KEY").as_deref(),
        )
    }

    /// Resolves the client key with precedence: config > env.
    pub fn client_key(&self) -> Option<String> {
        first_non_empty(
            self.client.client_key.clone(),
            env_value("BACKOFFICE_CLIENT_KEY").as_deref(),
        )
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session.lifetime_secs)
    }

    /// Timeout for the initial session lookup; `None` when disabled.
    pub fn lookup_timeout(&self) -> Option<Duration> {
        if self.session.lookup_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.session.lookup_timeout_secs))
        }
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Returns the first trimmed, non-empty value.
fn first_non_empty(primary: Option<String>, fallback: Option<&str>) -> Option<String> {
    primary
        .as_deref()
        .into_iter()
        .chain(fallback)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Resolves a base URL with precedence: env > config > default.
fn resolve_base_url(
    env_url: Option<String>,
    config_url: Option<&str>,
    default_url: Option<&str>,
    name: &str,
) -> Result<Option<String>> {
    let Some(url) = first_non_empty(env_url, config_url) else {
        return Ok(default_url.map(ToString::to_string));
    };
    url::Url::parse(&url).with_context(|| format!("Invalid {name} base URL: {url}"))?;
    Ok(Some(url.trim_end_matches('/').to_string()))
}
