//! # Configuration File Loading
//!
//! Loads fixture configuration from TOML or YAML files.
//!
//! Supports automatic format detection based on file extension.

use crate::config::FixtureConfig;
use std::path::Path;
use validator::Validate;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),
}

/// Load fixture configuration from a TOML file.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_toml;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_toml(Path::new("fixtures.toml"))?;
///     println!("Redis image: {}", config.redis.image_ref());
///     Ok(())
/// }
/// ```
///
/// ## Error Handling
/// Returns `ConfigFileError` for a missing file, invalid TOML syntax or
/// values that fail validation.
pub fn load_from_toml(path: &Path) -> Result<FixtureConfig, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    let config: FixtureConfig =
        toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))?;

    config.validate()?;
    Ok(config)
}

/// Load fixture configuration from a YAML file.
pub fn load_from_yaml(path: &Path) -> Result<FixtureConfig, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    let config: FixtureConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))?;

    config.validate()?;
    Ok(config)
}

/// Load fixture configuration from file, detecting the format from the
/// extension (`.toml`, `.yaml`, `.yml`).
pub fn load_from_file(path: &Path) -> Result<FixtureConfig, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixtures.toml");

        let toml_content = r#"
[postgres]
tag = "15-alpine"
database = "orders"
startup_timeout_seconds = 90

[redis]
image = "valkey/valkey"
tag = "8"

[wait]
poll_interval_ms = 50
"#;
        fs::write(&path, toml_content).unwrap();

        let config = load_from_toml(&path).unwrap();
        assert_eq!(config.postgres.image_ref(), "postgres:15-alpine");
        assert_eq!(config.postgres.database, "orders");
        assert_eq!(config.postgres.startup_timeout_seconds, 90);
        assert_eq!(config.postgres.user, "test");
        assert_eq!(config.redis.image_ref(), "valkey/valkey:8");
        assert_eq!(config.wait.poll_interval_ms, 50);
    }

    #[test]
    fn test_load_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixtures.yml");

        let yaml_content = r#"
postgres:
  user: app
  password: secret
redis:
  startup_timeout_seconds: 30
"#;
        fs::write(&path, yaml_content).unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.postgres.user, "app");
        assert_eq!(config.postgres.password, "secret");
        assert_eq!(config.redis.startup_timeout_seconds, 30);
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixtures.toml");
        fs::write(&path, "[wait]\npoll_interval_ms = 0\n").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file_missing() {
        let result = load_from_file(Path::new("/definitely/missing/fixtures.toml"));
        assert!(matches!(result, Err(ConfigFileError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_file_unsupported_extension() {
        let result = load_from_file(Path::new("fixtures.ini"));
        assert!(matches!(result, Err(ConfigFileError::UnsupportedFormat(ext)) if ext == "ini"));
    }

    #[test]
    fn test_load_from_file_no_extension() {
        let result = load_from_file(Path::new("fixtures"));
        assert!(matches!(result, Err(ConfigFileError::NoExtension)));
    }

    #[test]
    fn test_load_from_toml_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[postgres\nuser = ").unwrap();

        let result = load_from_toml(&path);
        assert!(matches!(result, Err(ConfigFileError::TomlParse(_))));
    }
}
