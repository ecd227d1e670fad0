//! Configuration loading.
//!
//! Sources, lowest precedence first:
//! 1. the TOML file (optional),
//! 2. legacy unprefixed variables such as `PORT` or `SKRIBBLE_API_KEY`,
//! 3. `SIGTRACK_`-prefixed variables, nested with `__`
//!    (`SIGTRACK_PROVIDER__API_KEY`).

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use figment::value::Uncased;
use sigtrack_core::config::{AppConfig, LEGACY_ENV_KEYS, legacy_env_key};
use std::path::Path;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SIGTRACK_CONFIG";

/// Config file used when neither `--config` nor `SIGTRACK_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/sigtrack.toml";

/// Legacy variables mapped onto their config keys.
fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(name, _)| *name).collect();
    Env::raw()
        .only(&names)
        .map(|key| match legacy_env_key(key.as_str()) {
            Some(mapped) => Uncased::from(mapped),
            None => Uncased::from(key.as_str()),
        })
}

/// Build the layered figment. A missing file is skipped.
pub fn figment(config_path: &Path) -> Figment {
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %config_path.display(), "loading configuration from file");
        figment = figment.merge(Toml::file(config_path));
    } else {
        tracing::debug!(config_path = %config_path.display(), "no config file found");
    }
    figment
        .merge(legacy_env())
        .merge(Env::prefixed("SIGTRACK_").ignore(&["CONFIG"]).split("__"))
}

/// Load and extract the configuration. Validation is left to the caller.
pub fn load(config_path: &Path) -> Result<AppConfig, Box<figment::Error>> {
    figment(config_path).extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use sigtrack_core::config::{ArchiveBackendConfig, RecordStoreConfig};

    #[test]
    fn defaults_without_any_source() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let config = load(Path::new("missing.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 3001);
            assert_eq!(config.reconcile.poll_interval_min, 5.0);
            assert!(config.provider.username.is_none());
            assert!(config.validate().is_err());
            Ok(())
        });
    }

    #[test]
    fn legacy_variables_are_mapped() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("PORT", "8080");
            jail.set_env("POLL_INTERVAL_MIN", "0.5");
            jail.set_env("SKRIBBLE_USERNAME", "api_demo_acme");
            jail.set_env("SKRIBBLE_API_KEY", "secret-key");
            jail.set_env("SKRIBBLE_BASE_URL", "https://sandbox.skribble.test");
            jail.set_env("SKRIBBLE_DOWNLOAD", "true");

            let config = load(Path::new("missing.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.reconcile.poll_interval_min, 0.5);
            assert_eq!(config.provider.username.as_deref(), Some("api_demo_acme"));
            assert_eq!(config.provider.api_key.as_deref(), Some("secret-key"));
            assert_eq!(config.provider.base_url, "https://sandbox.skribble.test");
            assert!(config.archive.force_inline);
            assert!(config.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn prefixed_variables_override_file_and_legacy() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "sigtrack.toml",
                r#"
                [server]
                port = 4000

                [records]
                type = "sqlite"
                path = "/var/lib/sigtrack/records.db"

                [provider]
                username = "from-file"
                api_key = "file-key"

                [archive]
                folder = "signed"

                [archive.backend]
                type = "s3"
                bucket = "signed-docs"
                "#,
            )?;
            jail.set_env("PORT", "5000");
            jail.set_env("SIGTRACK_SERVER__PORT", "6000");
            jail.set_env("SIGTRACK_PROVIDER__USERNAME", "from-env");
            jail.set_env("SIGTRACK_CONFIG", "ignored.toml");

            let config = load(Path::new("sigtrack.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 6000);
            assert_eq!(config.provider.username.as_deref(), Some("from-env"));
            assert_eq!(config.provider.api_key.as_deref(), Some("file-key"));
            assert_eq!(config.archive.folder, "signed");
            assert!(matches!(
                config.records,
                RecordStoreConfig::Sqlite { ref path } if path == Path::new("/var/lib/sigtrack/records.db")
            ));
            assert!(matches!(
                config.archive.backend,
                ArchiveBackendConfig::S3 { ref bucket, .. } if bucket == "signed-docs"
            ));
            Ok(())
        });
    }

    #[test]
    fn legacy_file_value_loses_to_legacy_env() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("sigtrack.toml", "[reconcile]\npoll_interval_min = 10\n")?;
            jail.set_env("POLL_INTERVAL_MIN", "2");
            let config = load(Path::new("sigtrack.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.reconcile.poll_interval_min, 2.0);
            Ok(())
        });
    }
}
