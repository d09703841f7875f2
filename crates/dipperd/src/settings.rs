//! Daemon settings
//!
//! Two environment variables locate everything else:
//!
//! - `DIPPER_CONFIG`: path to the TOML configuration file
//!   (default `/etc/dipper/config.toml`)
//! - `DIPPER_LOG_LEVEL`: trace, debug, info, warn or error (default `info`)
//!
//! The file carries the `[schedule]` section, the `[accounts.*]` sections and
//! an optional `[resolver]` section.

use anyhow::{Context, Result};
use dipper_core::DipperConfig;
use dipper_resolver_dns::DnsResolverConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/dipper/config.toml";

/// Settings taken from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSettings {
    pub config_path: PathBuf,
    pub log_level: String,
}

impl EnvSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup` (the environment, or a map in tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            config_path: lookup("DIPPER_CONFIG")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            log_level: lookup("DIPPER_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Parse the log level
    pub fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "DIPPER_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ResolverSection {
    #[serde(default)]
    resolver: DnsResolverConfig,
}

/// Everything read from the configuration file
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub dipper: DipperConfig,
    pub resolver: DnsResolverConfig,
}

impl LoadedConfig {
    /// Parse and validate a configuration document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let dipper = DipperConfig::from_toml_str(input)?;
        dipper.validate()?;

        let ResolverSection { resolver } =
            toml::from_str(input).context("Invalid [resolver] section")?;
        resolver.validate()?;

        Ok(Self { dipper, resolver })
    }

    /// Read, parse and validate the configuration file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read configuration file {}", path.display()))?;
        Self::from_toml_str(&input)
            .with_context(|| format!("Invalid configuration file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const CONFIG: &str = r#"
        [schedule]
        notification_interval_sec = 21600
        check_interval_sec = 300

        [resolver]
        timeout_sec = 3

        [accounts.home]
        provider = "mydns"
        username = "mydns123"
        password = "pw"
        domain = "home.example.com"
        ipv4_url = "https://ipv4.mydns.jp/login.html"
    "#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn env_defaults() {
        let settings = EnvSettings::from_lookup(|_| None);
        assert_eq!(settings.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(settings.level().unwrap(), Level::INFO);
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DIPPER_CONFIG", "/tmp/dipper.toml"),
            ("DIPPER_LOG_LEVEL", "DEBUG"),
        ]
        .into_iter()
        .collect();
        let settings = EnvSettings::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.config_path, PathBuf::from("/tmp/dipper.toml"));
        assert_eq!(settings.level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let settings = EnvSettings::from_lookup(|key| {
            (key == "DIPPER_LOG_LEVEL").then(|| "chatty".to_string())
        });
        assert!(settings.level().is_err());
    }

    #[test]
    fn loads_file_with_resolver_section() {
        let file = write_config(CONFIG);
        let loaded = LoadedConfig::load(file.path()).unwrap();

        assert_eq!(loaded.resolver.timeout_sec, 3);
        assert_eq!(loaded.dipper.account_configs().unwrap().len(), 1);
    }

    #[test]
    fn resolver_section_is_optional() {
        let loaded = LoadedConfig::from_toml_str(
            "[schedule]\nnotification_interval_sec = 60\ncheck_interval_sec = 30\n",
        )
        .unwrap();
        assert_eq!(loaded.resolver, DnsResolverConfig::default());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = LoadedConfig::load(Path::new("/nonexistent/dipper.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/dipper.toml"));
    }

    #[test]
    fn duplicate_domain_is_fatal() {
        let file = write_config(
            r#"
            [schedule]
            notification_interval_sec = 60
            check_interval_sec = 30

            [accounts.one]
            provider = "google_domains"
            username = "u"
            password = "p"
            domain = "dup.example.com"
            url = "https://domains.google.com/nic/update"

            [accounts.two]
            provider = "google_domains"
            username = "u"
            password = "p"
            domain = "dup.example.com"
            url = "https://domains.google.com/nic/update"
            "#,
        );

        let err = LoadedConfig::load(file.path()).unwrap_err();
        let core = err.downcast_ref::<dipper_core::Error>().unwrap();
        assert!(matches!(core, dipper_core::Error::DuplicateDomain(_)));
        assert!(core.is_fatal());
    }

    #[test]
    fn invalid_resolver_section_is_rejected() {
        let result = LoadedConfig::from_toml_str(
            "[schedule]\nnotification_interval_sec = 60\ncheck_interval_sec = 30\n\
             [resolver]\ntimeout_sec = 0\n",
        );
        assert!(result.is_err());
    }
}
