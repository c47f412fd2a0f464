use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::errors::ConfigurationError;
use crate::domain::models::{Config, ServiceKey, TransferMode};

/// Project config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "cmsdev.yaml";

/// Prefix of environment variable overrides, e.g. `CMSDEV_TIMEOUTS__GRACE_SECS`
pub const ENV_PREFIX: &str = "CMSDEV_";

/// Unprefixed variables naming the default IMS recipe
pub const IMS_RECIPE_VARS: [&str; 2] = ["IMS_RECIPE_NAME", "IMS_RECIPE_DISTRO"];

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. cmsdev.yaml in the working directory (optional)
    /// 3. `extra` file, e.g. from `--config` (optional)
    /// 4. `IMS_RECIPE_NAME` / `IMS_RECIPE_DISTRO`, mapped to `ims.recipe_*`
    /// 5. Environment variables (CMSDEV_* prefix, highest priority)
    pub fn load(extra: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(DEFAULT_CONFIG_FILE));
        if let Some(path) = extra {
            if !path.exists() {
                anyhow::bail!("Config file {} does not exist", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }

        let ims_recipe = Env::raw().only(&IMS_RECIPE_VARS).map(|key| {
            key.as_str()
                .to_ascii_lowercase()
                .replacen("ims_", "ims.", 1)
                .into()
        });

        let config: Config = figment
            .merge(ims_recipe)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, ignoring the environment
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigurationError> {
        if config.namespace.trim().is_empty() {
            return Err(ConfigurationError::EmptyNamespace);
        }

        if config.timeouts.default_secs == 0 {
            return Err(ConfigurationError::InvalidDefaultTimeout(
                config.timeouts.default_secs,
            ));
        }

        // Per-service keys are free-form in YAML; catch typos here
        for key in config.timeouts.per_service.keys() {
            if key.parse::<ServiceKey>().is_err() {
                return Err(ConfigurationError::UnknownServiceKey(key.clone()));
            }
        }

        if !config.transfer.artifact_dir.starts_with('/') {
            return Err(ConfigurationError::InvalidArtifactDir(
                config.transfer.artifact_dir.clone(),
            ));
        }

        if config.transfer.max_consistency_redos == 0 {
            return Err(ConfigurationError::InvalidMaxRedos(
                config.transfer.max_consistency_redos,
            ));
        }

        if config.transfer.mode.parse::<TransferMode>().is_err() {
            return Err(ConfigurationError::InvalidTransferMode(
                config.transfer.mode.clone(),
            ));
        }

        let base_url = config.api.base_url.as_str();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigurationError::InvalidApiUrl(base_url.to_string()));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigurationError::InvalidLogLevel(
                config.logging.level.clone(),
            ));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigurationError::InvalidLogFormat(
                config.logging.format.clone(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.namespace, "services");
        assert_eq!(config.timeouts.default_secs, 60);
        assert_eq!(config.timeouts.grace_secs, 30);
        assert_eq!(config.transfer.max_consistency_redos, 10);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
namespace: cms
timeouts:
  default_secs: 90
  per_service:
    tftp: 600
transfer:
  tftp_services: [cray-tftp]
  max_consistency_redos: 4
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.namespace, "cms");
        assert_eq!(config.timeout_for(ServiceKey::Tftp), 600);
        // per_service given explicitly replaces the default map
        assert_eq!(config.timeout_for(ServiceKey::Bos), 90);
        assert_eq!(config.transfer.tftp_services, vec!["cray-tftp".to_string()]);
        assert_eq!(config.transfer.max_consistency_redos, 4);
        assert_eq!(config.logging.format, "json");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_empty_namespace() {
        let config = Config {
            namespace: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigurationError::EmptyNamespace
        ));
    }

    #[test]
    fn test_validate_zero_default_timeout() {
        let mut config = Config::default();
        config.timeouts.default_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigurationError::InvalidDefaultTimeout(0)
        ));
    }

    #[test]
    fn test_validate_unknown_service_key() {
        let mut config = Config::default();
        config.timeouts.per_service.insert("hsm".to_string(), 100);
        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigurationError::UnknownServiceKey(key) => assert_eq!(key, "hsm"),
            other => panic!("Expected UnknownServiceKey error, got {other}"),
        }
    }

    #[test]
    fn test_validate_relative_artifact_dir() {
        let mut config = Config::default();
        config.transfer.artifact_dir = "shared_tftp".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigurationError::InvalidArtifactDir(_)
        ));
    }

    #[test]
    fn test_validate_zero_max_redos() {
        let mut config = Config::default();
        config.transfer.max_consistency_redos = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigurationError::InvalidMaxRedos(0)
        ));
    }

    #[test]
    fn test_validate_unknown_transfer_mode() {
        let mut config = Config::default();
        config.transfer.mode = "mail".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigurationError::InvalidTransferMode(_)
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigurationError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            _ => panic!("Expected InvalidLogLevel error"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigurationError::InvalidLogFormat(format) => assert_eq!(format, "xml"),
            _ => panic!("Expected InvalidLogFormat error"),
        }
    }

    #[test]
    fn test_env_override() {
        temp_env::with_vars(
            [
                ("CMSDEV_NAMESPACE", Some("cms-test")),
                ("CMSDEV_TIMEOUTS__GRACE_SECS", Some("45")),
                ("CMSDEV_LOGGING__LEVEL", Some("debug")),
            ],
            || {
                let config = ConfigLoader::load(None).expect("config should load");
                assert_eq!(config.namespace, "cms-test");
                assert_eq!(config.timeouts.grace_secs, 45);
                assert_eq!(config.logging.level, "debug");
            },
        );
    }

    #[test]
    fn test_validate_api_url_scheme() {
        let mut config = Config::default();
        config.api.base_url = "api-gw-service-nmn.local".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigurationError::InvalidApiUrl(_)
        ));
    }

    #[test]
    fn test_ims_recipe_from_plain_env() {
        temp_env::with_vars(
            [
                ("IMS_RECIPE_NAME", Some("cray-shasta-csm-sles15sp5-barebones")),
                ("IMS_RECIPE_DISTRO", Some("sles15")),
                ("CMSDEV_IMS__RECIPE_DISTRO", None::<&str>),
            ],
            || {
                let config = ConfigLoader::load(None).expect("config should load");
                let recipe = config.ims.expected_recipe().expect("recipe should be set");
                assert_eq!(recipe.name, "cray-shasta-csm-sles15sp5-barebones");
                assert_eq!(recipe.distro, "sles15");
            },
        );
    }

    #[test]
    fn test_prefixed_env_beats_plain_ims_env() {
        temp_env::with_vars(
            [
                ("IMS_RECIPE_NAME", Some("plain")),
                ("IMS_RECIPE_DISTRO", None),
                ("CMSDEV_IMS__RECIPE_NAME", Some("prefixed")),
            ],
            || {
                let config = ConfigLoader::load(None).expect("config should load");
                assert_eq!(config.ims.recipe_name.as_deref(), Some("prefixed"));
                assert_eq!(config.ims.recipe_distro, "sles15");
            },
        );
    }

    #[test]
    fn test_missing_extra_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigLoader::load(Some(&dir.path().join("absent.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "namespace: base\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "namespace: override\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.namespace, "override", "Override should win");
        assert_eq!(
            config.logging.level, "debug",
            "Override should win for nested fields"
        );
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "transfer:\n  skip_on_master: false").unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert!(!config.transfer.skip_on_master);
        assert_eq!(config.transfer.artifact_dir, "/shared_tftp");
    }
}
