//! # Harvest Configuration
//!
//! Configuration management for the sync engine and the API service.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     HARVEST_CLIENT_ID=...                                              │
//! │     HARVEST_API_BASE_URL=https://partnerapi.deere.com/platform         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/harvest-mirror/harvest.toml (Linux)                      │
//! │     ~/Library/Application Support/com.harvest.mirror/harvest.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Sandbox API, literal refresh policy, sequential sync               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # harvest.toml
//! [vendor]
//! api_base_url = "https://sandboxapi.deere.com/platform"
//! aemp_base_url = "https://sandboxaemp.deere.com"
//! request_timeout_secs = 30
//!
//! [oauth]
//! client_id = "0oa..."
//! client_secret = "..."
//! redirect_uri = "http://localhost:8787/auth/callback"
//!
//! [sync]
//! parallel_branches = false
//! refresh_policy = { kind = "fixed_margin", margin_secs = 300 }
//!
//! [database]
//! path = "harvest.db"
//!
//! [server]
//! bind_addr = "127.0.0.1"
//! port = 8787
//! ```
//!
//! The client secret is never logged.

use harvest_core::RefreshPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Vendor API Settings
// =============================================================================

/// Where and how the vendor API is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorSettings {
    /// Base of the versioned JSON API; relative endpoints are joined onto it.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base of the AEMP fleet feed.
    #[serde(default = "default_aemp_base_url")]
    pub aemp_base_url: String,

    /// Media type sent in the Accept header of JSON requests.
    #[serde(default = "default_accept")]
    pub accept: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://sandboxapi.deere.com/platform".to_string()
}

fn default_aemp_base_url() -> String {
    "https://sandboxaemp.deere.com".to_string()
}

fn default_accept() -> String {
    "application/vnd.deere.axiom.v3+json".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for VendorSettings {
    fn default() -> Self {
        VendorSettings {
            api_base_url: default_api_base_url(),
            aemp_base_url: default_aemp_base_url(),
            accept: default_accept(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl VendorSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// OAuth Settings
// =============================================================================

/// OAuth2 client registration and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthSettings {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Where the vendor sends the user back with `code` and `state`.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Space-separated scopes requested at login.
    #[serde(default = "default_scopes")]
    pub scopes: String,

    /// Base of the organization-connection flow.
    #[serde(default = "default_connections_url")]
    pub connections_url: String,
}

fn default_auth_url() -> String {
    "https://signin.johndeere.com/oauth2/aus78tnlaysMraFhC1t7/v1/authorize".to_string()
}

fn default_token_url() -> String {
    "https://signin.johndeere.com/oauth2/aus78tnlaysMraFhC1t7/v1/token".to_string()
}

fn default_redirect_uri() -> String {
    "http://localhost:8787/auth/callback".to_string()
}

fn default_scopes() -> String {
    "ag1 ag2 eq1 eq2 org1 org2 work1 work2 files offline_access".to_string()
}

fn default_connections_url() -> String {
    "https://connections.deere.com/connections".to_string()
}

impl Default for OAuthSettings {
    fn default() -> Self {
        OAuthSettings {
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            connections_url: default_connections_url(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Orchestrator behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Run each dependency wave concurrently instead of one step at a time.
    #[serde(default)]
    pub parallel_branches: bool,

    /// When a stored access token is refreshed before use.
    #[serde(default)]
    pub refresh_policy: RefreshPolicy,
}

// =============================================================================
// Database / Server Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file; created on first start.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("harvest.db")
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestConfig {
    #[serde(default)]
    pub vendor: VendorSettings,

    #[serde(default)]
    pub oauth: OAuthSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub server: ServerSettings,
}

impl HarvestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (harvest.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading harvest config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load harvest config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Harvest config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        for (name, value) in [
            ("vendor.api_base_url", &self.vendor.api_base_url),
            ("vendor.aemp_base_url", &self.vendor.aemp_base_url),
            ("oauth.auth_url", &self.oauth.auth_url),
            ("oauth.token_url", &self.oauth.token_url),
            ("oauth.redirect_uri", &self.oauth.redirect_uri),
            ("oauth.connections_url", &self.oauth.connections_url),
        ] {
            let url = Url::parse(value)
                .map_err(|e| SyncError::InvalidUrl(format!("{}: {} ({})", name, value, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(SyncError::InvalidUrl(format!(
                    "{} must be http(s), got: {}",
                    name, value
                )));
            }
        }

        if self.vendor.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if !self.sync.refresh_policy.is_valid() {
            return Err(SyncError::InvalidConfig(format!(
                "Invalid refresh policy: {:?}",
                self.sync.refresh_policy
            )));
        }

        if self.oauth.client_id.is_empty() {
            warn!("oauth.client_id is not set; login and refresh will be rejected by the vendor");
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("HARVEST_CLIENT_ID") {
            debug!(client_id = %id, "Overriding client ID from environment");
            self.oauth.client_id = id;
        }

        if let Ok(secret) = std::env::var("HARVEST_CLIENT_SECRET") {
            self.oauth.client_secret = secret;
        }

        if let Ok(uri) = std::env::var("HARVEST_REDIRECT_URI") {
            self.oauth.redirect_uri = uri;
        }

        if let Ok(scopes) = std::env::var("HARVEST_SCOPES") {
            self.oauth.scopes = scopes;
        }

        if let Ok(url) = std::env::var("HARVEST_API_BASE_URL") {
            debug!(url = %url, "Overriding API base from environment");
            self.vendor.api_base_url = url;
        }

        if let Ok(url) = std::env::var("HARVEST_AEMP_BASE_URL") {
            self.vendor.aemp_base_url = url;
        }

        if let Ok(secs) = std::env::var("HARVEST_REQUEST_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.vendor.request_timeout_secs = s;
            }
        }

        if let Ok(flag) = std::env::var("HARVEST_PARALLEL_BRANCHES") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.sync.parallel_branches = true,
                "0" | "false" | "no" => self.sync.parallel_branches = false,
                _ => warn!(value = %flag, "Unknown HARVEST_PARALLEL_BRANCHES value"),
            }
        }

        if let Ok(path) = std::env::var("HARVEST_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }

        if let Ok(port) = std::env::var("HARVEST_PORT") {
            if let Ok(p) = port.parse::<u16>() {
                debug!(port = p, "Overriding server port from environment");
                self.server.port = p;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "harvest", "mirror")
            .map(|dirs| dirs.config_dir().join("harvest.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.sync.refresh_policy
    }

    pub fn parallel_branches(&self) -> bool {
        self.sync.parallel_branches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarvestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.vendor.request_timeout_secs, 30);
        assert_eq!(config.vendor.accept, "application/vnd.deere.axiom.v3+json");
        assert!(!config.sync.parallel_branches);
        assert_eq!(config.sync.refresh_policy, RefreshPolicy::default());
        assert!(config.oauth.scopes.contains("offline_access"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
            [vendor]
            api_base_url = "https://partnerapi.deere.com/platform"

            [oauth]
            client_id = "client-123"

            [sync]
            parallel_branches = true
            refresh_policy = { kind = "fixed_margin", margin_secs = 300 }
        "#;

        let config: HarvestConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.vendor.api_base_url, "https://partnerapi.deere.com/platform");
        assert_eq!(config.vendor.aemp_base_url, default_aemp_base_url());
        assert_eq!(config.oauth.client_id, "client-123");
        assert_eq!(config.oauth.token_url, default_token_url());
        assert!(config.parallel_branches());
        assert_eq!(
            config.refresh_policy(),
            RefreshPolicy::FixedMargin { margin_secs: 300 }
        );
        assert_eq!(config.server.port, 8787);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let mut config = HarvestConfig::default();
        config.vendor.api_base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        let mut config = HarvestConfig::default();
        config.oauth.token_url = "ftp://signin.example.com/token".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));
    }

    #[test]
    fn test_invalid_policy_and_timeout_rejected() {
        let mut config = HarvestConfig::default();
        config.sync.refresh_policy = RefreshPolicy::RemainingFraction { fraction: 1.5 };
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));

        let mut config = HarvestConfig::default();
        config.sync.refresh_policy = RefreshPolicy::FixedMargin { margin_secs: i64::MAX };
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));

        let mut config = HarvestConfig::default();
        config.vendor.request_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_toml_serialization() {
        let config = HarvestConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[vendor]"));
        assert!(toml_str.contains("[oauth]"));
        assert!(toml_str.contains("[server]"));

        let parsed: HarvestConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.vendor.api_base_url, config.vendor.api_base_url);
    }

    #[test]
    fn test_bind_address() {
        let server = ServerSettings::default();
        assert_eq!(server.bind_address(), "127.0.0.1:8787");
    }
}
