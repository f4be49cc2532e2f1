//! Configuration handling for the parcel tool.
//!
//! Settings come from the shared YAML config file, then environment
//! variables, then command-line flags (applied by `main`). The log level is
//! not part of this file: logging is up before the config is read.

use anyhow::{bail, Result};
use parcel_wire::{DEFAULT_FRAGMENT_SIZE, MAX_CHUNK_PAYLOAD};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Parcel tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Maximum chunk payload produced when encoding
    pub fragment_size: usize,
    /// Largest chunk payload accepted when decoding
    pub max_chunk_payload: usize,
    /// Read and write hex instead of raw bytes
    pub hex_output: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            max_chunk_payload: MAX_CHUNK_PAYLOAD,
            hex_output: false,
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    services: Option<ServicesConfig>,
}

#[derive(Debug, Deserialize)]
struct ServicesConfig {
    parcel: Option<ServiceConfig>,
}

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    config: Option<HashMap<String, String>>,
}

impl ToolConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        if let Ok(content) = std::fs::read_to_string(&config_path) {
            match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root_config) => {
                    config.apply_root_config(root_config);
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => warn!(
                    "Failed to parse config file {:?} ({}), using defaults",
                    config_path.as_ref(),
                    e
                ),
            }
        } else {
            warn!(
                "Config file {:?} not found, using defaults",
                config_path.as_ref()
            );
        }

        config.apply_environment_overrides();
        config.validate()?;

        info!(
            "Final parcel configuration: fragment_size={}, max_chunk_payload={}, hex_output={}",
            config.fragment_size, config.max_chunk_payload, config.hex_output
        );

        Ok(config)
    }

    fn apply_root_config(&mut self, root_config: RootConfig) {
        let Some(config_map) = root_config
            .services
            .and_then(|s| s.parcel)
            .and_then(|p| p.config)
        else {
            return;
        };

        for (key, value) in config_map {
            match key.as_str() {
                "services.parcel.fragment_size" => {
                    if let Ok(size) = value.parse::<usize>() {
                        self.fragment_size = size;
                    }
                }
                "services.parcel.max_chunk_payload" => {
                    if let Ok(size) = value.parse::<usize>() {
                        self.max_chunk_payload = size;
                    }
                }
                "services.parcel.hex_output" => {
                    self.hex_output = value.to_lowercase() == "true";
                }
                _ => {
                    // Ignore unknown configuration keys
                }
            }
        }
    }

    /// Apply environment variable overrides
    pub fn apply_environment_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(size) = lookup("PARCEL_FRAGMENT_SIZE").and_then(|v| v.parse::<usize>().ok()) {
            self.fragment_size = size;
            info!("Fragment size overridden by environment: {}", size);
        }

        if let Some(size) =
            lookup("PARCEL_MAX_CHUNK_PAYLOAD").and_then(|v| v.parse::<usize>().ok())
        {
            self.max_chunk_payload = size;
            info!("Max chunk payload overridden by environment: {}", size);
        }

        if let Some(hex) = lookup("PARCEL_HEX_OUTPUT") {
            self.hex_output = hex.to_lowercase() == "true";
        }
    }

    /// Check that sizes fit the chunk header
    pub fn validate(&self) -> Result<()> {
        if self.fragment_size == 0 || self.fragment_size > MAX_CHUNK_PAYLOAD {
            bail!(
                "fragment_size must be between 1 and {}, got {}",
                MAX_CHUNK_PAYLOAD,
                self.fragment_size
            );
        }
        if self.max_chunk_payload > MAX_CHUNK_PAYLOAD {
            bail!(
                "max_chunk_payload must not exceed {}, got {}",
                MAX_CHUNK_PAYLOAD,
                self.max_chunk_payload
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ToolConfig::default();
        assert_eq!(config.fragment_size, 2048);
        assert_eq!(config.max_chunk_payload, 65535);
        assert!(!config.hex_output);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
services:
  parcel:
    enabled: true
    config:
      services.parcel.fragment_size: "512"
      services.parcel.hex_output: "true"
      services.parcel.max_chunk_payload: "4096"
      services.parcel.unknown: "ignored"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let mut config = ToolConfig::default();
        let root: RootConfig = serde_yaml::from_str(yaml_content).unwrap();
        config.apply_root_config(root);

        assert_eq!(config.fragment_size, 512);
        assert!(config.hex_output);
        assert_eq!(config.max_chunk_payload, 4096);

        assert!(ToolConfig::load_from_file(temp_file.path()).is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ToolConfig::load_from_file("/nonexistent/parcel.yaml");
        assert!(config.is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut config = ToolConfig::default();
        config.apply_overrides(|key| match key {
            "PARCEL_FRAGMENT_SIZE" => Some("1024".to_string()),
            "PARCEL_MAX_CHUNK_PAYLOAD" => Some("not-a-number".to_string()),
            "PARCEL_HEX_OUTPUT" => Some("TRUE".to_string()),
            _ => None,
        });

        assert_eq!(config.fragment_size, 1024);
        assert_eq!(config.max_chunk_payload, 65535);
        assert!(config.hex_output);
    }

    #[test]
    fn test_validate_rejects_bad_sizes() {
        let mut config = ToolConfig::default();
        config.fragment_size = 0;
        assert!(config.validate().is_err());

        config.fragment_size = 70_000;
        assert!(config.validate().is_err());

        config.fragment_size = 10;
        config.max_chunk_payload = 70_000;
        assert!(config.validate().is_err());
    }
}
