//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind (default: all interfaces).
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port (legacy env: `PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Record store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecordStoreConfig {
    /// SQLite database (single instance deployments and tests).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database. Insert notifications use LISTEN/NOTIFY, so inserts
    /// made by other processes also trigger reconciliation.
    Postgres {
        /// Connection URL.
        url: String,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds.
        #[serde(default)]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/records.db"),
        }
    }
}

impl RecordStoreConfig {
    /// Validate record store configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Sqlite { .. } => Ok(()),
            Self::Postgres {
                url,
                max_connections,
                ..
            } => {
                if url.trim().is_empty() {
                    return Err("records.url must not be empty for postgres".to_string());
                }
                if *max_connections == 0 {
                    return Err("records.max_connections must be at least 1".to_string());
                }
                Ok(())
            }
        }
    }
}

/// E-signature provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API base URL (legacy env: `SKRIBBLE_BASE_URL`).
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    /// API username (legacy env: `SKRIBBLE_USERNAME`).
    #[serde(default)]
    pub username: Option<String>,
    /// API key (legacy env: `SKRIBBLE_API_KEY`).
    /// WARNING: Prefer env vars over storing secrets in config files.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Provider environment label, informational only.
    #[serde(default = "default_provider_environment")]
    pub environment: String,
    /// Seconds an access token is reused before logging in again.
    /// The provider issues tokens valid for 20 minutes.
    #[serde(default = "default_token_lifetime_secs")]
    pub token_lifetime_secs: u64,
    /// User-Agent sent with every provider request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_provider_base_url() -> String {
    "https://api.skribble.com".to_string()
}

fn default_provider_environment() -> String {
    "sandbox".to_string()
}

/// How long the provider honours an access token.
pub const PROVIDER_TOKEN_VALIDITY_SECS: u64 = 18 * 60;

/// Margin kept between the cached token's expiry and the provider's.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

fn default_token_lifetime_secs() -> u64 {
    PROVIDER_TOKEN_VALIDITY_SECS - TOKEN_EXPIRY_MARGIN_SECS
}

fn default_user_agent() -> String {
    format!("sigtrack/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            username: None,
            api_key: None,
            environment: default_provider_environment(),
            token_lifetime_secs: default_token_lifetime_secs(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate provider configuration. Missing credentials are fatal.
    pub fn validate(&self) -> Result<(), String> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !present(&self.username) || !present(&self.api_key) {
            return Err("Missing Skribble credentials (provider.username, provider.api_key)"
                .to_string());
        }
        if self.base_url.trim().is_empty() {
            return Err("provider.base_url must not be empty".to_string());
        }
        if self.token_lifetime_secs == 0 || self.token_lifetime_secs >= PROVIDER_TOKEN_VALIDITY_SECS
        {
            return Err(format!(
                "provider.token_lifetime_secs must be between 1 and {}, got {}",
                PROVIDER_TOKEN_VALIDITY_SECS - 1,
                self.token_lifetime_secs
            ));
        }
        Ok(())
    }
}

/// Archive backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ArchiveBackendConfig {
    /// Local filesystem archive.
    Filesystem {
        /// Root directory for archived artifacts.
        path: PathBuf,
        /// Base URL the root directory is served under. Without it, `file://`
        /// URLs are returned.
        #[serde(default)]
        public_base_url: Option<String>,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the ambient credential chain if not set.
        access_key_id: Option<String>,
        /// AWS secret access key.
        secret_access_key: Option<String>,
        /// Force path-style URLs (required for MinIO).
        #[serde(default)]
        force_path_style: bool,
        /// Public base URL (CDN or bucket website) used to build artifact URLs.
        #[serde(default)]
        public_base_url: Option<String>,
    },
    /// Cloudinary media storage.
    Cloudinary {
        cloud_name: String,
        api_key: String,
        /// WARNING: Prefer env vars over storing secrets in config files.
        api_secret: String,
        #[serde(default = "default_cloudinary_api_base_url")]
        api_base_url: String,
    },
}

fn default_cloudinary_api_base_url() -> String {
    "https://api.cloudinary.com".to_string()
}

impl Default for ArchiveBackendConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/archive"),
            public_base_url: None,
        }
    }
}

impl ArchiveBackendConfig {
    /// Validate archive backend invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Filesystem { .. } => Ok(()),
            Self::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.trim().is_empty() {
                    return Err("archive.backend.bucket must not be empty".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            Self::Cloudinary {
                cloud_name,
                api_key,
                api_secret,
                ..
            } => {
                if [cloud_name, api_key, api_secret]
                    .iter()
                    .any(|v| v.trim().is_empty())
                {
                    return Err(
                        "cloudinary config requires cloud_name, api_key and api_secret".to_string(),
                    );
                }
                Ok(())
            }
        }
    }
}

/// Artifact archive configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Folder (key prefix) for archived artifacts.
    #[serde(default = "default_archive_folder")]
    pub folder: String,
    /// Return URLs that open the PDF inline in the browser instead of
    /// downloading it (legacy env: `SKRIBBLE_DOWNLOAD`).
    #[serde(default)]
    pub force_inline: bool,
    /// Storage backend.
    #[serde(default)]
    pub backend: ArchiveBackendConfig,
}

fn default_archive_folder() -> String {
    crate::DEFAULT_ARCHIVE_FOLDER.to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            folder: default_archive_folder(),
            force_inline: false,
            backend: ArchiveBackendConfig::default(),
        }
    }
}

impl ArchiveConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.folder.contains("..") || self.folder.starts_with('/') {
            return Err(format!("archive.folder is not a relative path: {}", self.folder));
        }
        self.backend.validate()
    }
}

/// Reconciliation scheduling configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Minutes between poll cycles (legacy env: `POLL_INTERVAL_MIN`).
    #[serde(default = "default_poll_interval_min")]
    pub poll_interval_min: f64,
    /// Maximum status checks running at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Maximum status checks started per window.
    #[serde(default = "default_max_starts_per_window")]
    pub max_starts_per_window: u32,
    /// Window length in milliseconds for `max_starts_per_window`.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Run one cycle immediately at startup instead of waiting a full interval.
    #[serde(default = "default_reconcile_on_startup")]
    pub reconcile_on_startup: bool,
}

/// Longest accepted poll interval (one week).
pub const MAX_POLL_INTERVAL_MIN: f64 = 7.0 * 24.0 * 60.0;

fn default_poll_interval_min() -> f64 {
    5.0
}

fn default_max_concurrent() -> usize {
    3
}

fn default_max_starts_per_window() -> u32 {
    5
}

fn default_window_ms() -> u64 {
    1000
}

fn default_reconcile_on_startup() -> bool {
    true
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            poll_interval_min: default_poll_interval_min(),
            max_concurrent: default_max_concurrent(),
            max_starts_per_window: default_max_starts_per_window(),
            window_ms: default_window_ms(),
            reconcile_on_startup: default_reconcile_on_startup(),
        }
    }
}

impl ReconcileConfig {
    /// Poll interval as a Duration, clamped to [`MAX_POLL_INTERVAL_MIN`].
    pub fn poll_interval(&self) -> Duration {
        let minutes = self.poll_interval_min.clamp(0.0, MAX_POLL_INTERVAL_MIN);
        Duration::try_from_secs_f64(minutes * 60.0).unwrap_or(Duration::ZERO)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Validate reconcile settings (zero values would stall or panic timers).
    pub fn validate(&self) -> Result<(), String> {
        if !self.poll_interval_min.is_finite()
            || self.poll_interval_min <= 0.0
            || self.poll_interval_min > MAX_POLL_INTERVAL_MIN
        {
            return Err(format!(
                "reconcile.poll_interval_min must be in (0, {MAX_POLL_INTERVAL_MIN}], got {}",
                self.poll_interval_min
            ));
        }
        if self.max_concurrent == 0 {
            return Err("reconcile.max_concurrent must be at least 1".to_string());
        }
        if self.max_starts_per_window == 0 {
            return Err("reconcile.max_starts_per_window must be at least 1".to_string());
        }
        if self.window_ms == 0 {
            return Err("reconcile.window_ms must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub records: RecordStoreConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl AppConfig {
    /// Validate every section, returning the first error.
    pub fn validate(&self) -> Result<(), String> {
        self.records.validate()?;
        self.provider.validate()?;
        self.archive.validate()?;
        self.reconcile.validate()?;
        Ok(())
    }

    /// Create a test configuration with dummy provider credentials.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            provider: ProviderConfig {
                username: Some("api_demo_test".to_string()),
                api_key: Some("test-api-key".to_string()),
                ..ProviderConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Unprefixed environment variables accepted for compatibility with existing
/// deployments, and the config keys they map to.
pub const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("PORT", "server.port"),
    ("POLL_INTERVAL_MIN", "reconcile.poll_interval_min"),
    ("SKRIBBLE_USERNAME", "provider.username"),
    ("SKRIBBLE_API_KEY", "provider.api_key"),
    ("SKRIBBLE_BASE_URL", "provider.base_url"),
    ("SKRIBBLE_ENVIRONMENT", "provider.environment"),
    ("SKRIBBLE_DOWNLOAD", "archive.force_inline"),
];

/// Map a legacy environment variable name to its config key.
pub fn legacy_env_key(var: &str) -> Option<&'static str> {
    LEGACY_ENV_KEYS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(var))
        .map(|(_, key)| *key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_expectations() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.reconcile.poll_interval(), Duration::from_secs(300));
        assert_eq!(config.reconcile.max_concurrent, 3);
        assert_eq!(config.reconcile.max_starts_per_window, 5);
        assert_eq!(config.provider.token_lifetime(), Duration::from_secs(17 * 60));
        assert_eq!(config.archive.folder, "skribble_signed_docs");
        assert!(!config.archive.force_inline);
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.contains("Missing Skribble credentials"));

        let mut config = AppConfig::for_testing();
        config.provider.api_key = Some("  ".to_string());
        assert!(config.validate().is_err());

        assert!(AppConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn fractional_poll_interval() {
        let config = ReconcileConfig {
            poll_interval_min: 0.5,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert!(config.validate().is_ok());

        let zero = ReconcileConfig {
            poll_interval_min: 0.0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn token_lifetime_stays_below_provider_validity() {
        let mut config = AppConfig::for_testing();
        assert!(config.provider.token_lifetime_secs < PROVIDER_TOKEN_VALIDITY_SECS);

        config.provider.token_lifetime_secs = PROVIDER_TOKEN_VALIDITY_SECS;
        assert!(config.validate().is_err());

        config.provider.token_lifetime_secs = PROVIDER_TOKEN_VALIDITY_SECS - 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_poll_interval_is_rejected() {
        let config = ReconcileConfig {
            poll_interval_min: 1e300,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(
            config.poll_interval(),
            Duration::from_secs_f64(MAX_POLL_INTERVAL_MIN * 60.0)
        );

        let week = ReconcileConfig {
            poll_interval_min: MAX_POLL_INTERVAL_MIN,
            ..Default::default()
        };
        assert!(week.validate().is_ok());
        assert_eq!(week.poll_interval(), Duration::from_secs(7 * 24 * 60 * 60));
    }

    #[test]
    fn archive_backend_deserializes_tagged() {
        let json = r#"{"type":"cloudinary","cloud_name":"demo","api_key":"k","api_secret":"s"}"#;
        let backend: ArchiveBackendConfig = serde_json::from_str(json).unwrap();
        match backend {
            ArchiveBackendConfig::Cloudinary { api_base_url, .. } => {
                assert_eq!(api_base_url, "https://api.cloudinary.com");
            }
            _ => panic!("expected cloudinary config"),
        }
    }

    #[test]
    fn s3_partial_credentials_rejected() {
        let backend = ArchiveBackendConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("access".to_string()),
            secret_access_key: None,
            force_path_style: false,
            public_base_url: None,
        };
        assert!(backend.validate().is_err());
    }

    #[test]
    fn archive_folder_must_be_relative() {
        let config = ArchiveConfig {
            folder: "../escape".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn legacy_env_mapping() {
        assert_eq!(legacy_env_key("PORT"), Some("server.port"));
        assert_eq!(legacy_env_key("skribble_download"), Some("archive.force_inline"));
        assert_eq!(legacy_env_key("HOME"), None);
    }
}
