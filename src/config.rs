use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub cloud: CloudConfig,
    pub storage: StorageConfig,
}

/// Cloud sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Base URL of the sync server
    pub server_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Minutes between periodic background syncs
    pub sync_interval_mins: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            request_timeout_secs: 10,
            sync_interval_mins: 5,
        }
    }
}

/// Local storage settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory (empty = default per-user data dir)
    pub data_dir: Option<String>,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("aisle");

        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory")?;

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from file, or create default if not exists
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .context("Failed to read config file")?;

            let config: Config = toml::from_str(&contents)
                .context("Failed to parse config file")?;

            Ok(config)
        } else {
            // Create default config and save it
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Resolved data directory: the configured override or the per-user
    /// default location
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => crate::store::LocalStore::default_dir(),
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(&path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Generate example config content for documentation
    pub fn example_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.cloud.server_url, "http://127.0.0.1:3000");
        assert_eq!(config.cloud.request_timeout_secs, 10);
        assert_eq!(config.cloud.sync_interval_mins, 5);
        assert!(config.storage.data_dir.is_none());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.cloud.server_url, deserialized.cloud.server_url);
        assert_eq!(
            config.cloud.request_timeout_secs,
            deserialized.cloud.request_timeout_secs
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial_toml = r#"
[cloud]
server_url = "https://wedding.example.com"
"#;

        let config: Config = toml::from_str(partial_toml).unwrap();

        // Custom value
        assert_eq!(config.cloud.server_url, "https://wedding.example.com");
        // Default values
        assert_eq!(config.cloud.request_timeout_secs, 10);
        assert_eq!(config.cloud.sync_interval_mins, 5);
        assert!(config.storage.data_dir.is_none());
    }

    #[test]
    fn test_full_config_parsing() {
        let full_toml = r#"
[cloud]
server_url = "https://wedding.example.com"
request_timeout_secs = 30
sync_interval_mins = 15

[storage]
data_dir = "/custom/path"
"#;

        let config: Config = toml::from_str(full_toml).unwrap();

        assert_eq!(config.cloud.server_url, "https://wedding.example.com");
        assert_eq!(config.cloud.request_timeout_secs, 30);
        assert_eq!(config.cloud.sync_interval_mins, 15);
        assert_eq!(config.storage.data_dir, Some("/custom/path".to_string()));
    }

    #[test]
    fn test_data_dir_override() {
        let mut config = Config::default();
        config.storage.data_dir = Some("/tmp/aisle-test".to_string());

        assert_eq!(
            config.data_dir().unwrap(),
            PathBuf::from("/tmp/aisle-test")
        );
    }

    #[test]
    fn test_example_config_is_valid() {
        let example = Config::example_config();
        let parsed: Result<Config, _> = toml::from_str(&example);
        assert!(parsed.is_ok(), "Example config should be valid TOML");
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let invalid_toml = "this is not valid [[ toml";
        let result: Result<Config, _> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_with_unknown_fields_is_ignored() {
        let toml_with_extra = r#"
[cloud]
server_url = "http://127.0.0.1:3000"
unknown_field = "should be ignored"

[unknown_section]
foo = "bar"
"#;

        let result: Result<Config, _> = toml::from_str(toml_with_extra);
        assert!(result.is_ok());
    }
}
