//! Bridge configuration loaded from `olebridge.toml`

use crate::activation::ServerTarget;
use crate::errors::{OleError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "olebridge.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub libraries: LibraryConfig,

    #[serde(default)]
    pub activation: ActivationConfig,

    #[serde(default)]
    pub logging: LoggingSection,
}

/// Module names the system platform resolves its entry points from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default = "default_ole32")]
    pub ole32: String,

    #[serde(default = "default_oleaut32")]
    pub oleaut32: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationConfig {
    /// Empty means local activation
    #[serde(default)]
    pub default_host: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_format")]
    pub format: String,

    /// Empty means stderr
    #[serde(default)]
    pub directory: String,

    #[serde(default)]
    pub spans: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            ole32: default_ole32(),
            oleaut32: default_oleaut32(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            directory: String::new(),
            spans: false,
        }
    }
}

fn default_ole32() -> String { "ole32.dll".to_string() }
fn default_oleaut32() -> String { "oleaut32.dll".to_string() }
fn default_level() -> String { "info".to_string() }
fn default_format() -> String { "compact".to_string() }

impl ActivationConfig {
    /// Where activation goes when the caller does not say
    pub fn target(&self) -> ServerTarget {
        ServerTarget::from_host(&self.default_host)
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| OleError::Config(format!("failed to parse config: {}", e)))
    }

    /// Find and load configuration file from current directory or parents
    pub fn discover() -> Self {
        let mut current = std::env::current_dir().ok();

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                if let Ok(config) = Self::load(&config_path) {
                    return config;
                }
            }
            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }

    /// Generate default configuration file content
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| OleError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.libraries.ole32, "ole32.dll");
        assert_eq!(config.libraries.oleaut32, "oleaut32.dll");
        assert_eq!(config.activation.target(), ServerTarget::Local);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[activation]
default_host = "build-server"

[logging]
level = "trace"
"#;
        let config = BridgeConfig::parse(toml).unwrap();
        assert_eq!(config.activation.target(), ServerTarget::Remote("build-server".to_string()));
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.libraries, LibraryConfig::default());
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(BridgeConfig::parse("[activation"), Err(OleError::Config(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = BridgeConfig::default();
        config.libraries.oleaut32 = "C:\\Windows\\System32\\oleaut32.dll".to_string();
        config.logging.spans = true;
        config.save(&path).unwrap();

        assert_eq!(BridgeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_generate_default_round_trips() {
        let text = BridgeConfig::generate_default();
        assert_eq!(BridgeConfig::parse(&text).unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            BridgeConfig::load(&dir.path().join("absent.toml")),
            Err(OleError::Io(_))
        ));
    }
}
