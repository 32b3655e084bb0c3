//! # Configuration Precedence
//!
//! Merges fixture configuration from multiple sources.
//!
//! # Precedence Order
//! 1. Environment variables (highest priority)
//! 2. Configuration file
//! 3. Default values (lowest priority)

use crate::config::{FixtureConfig, PostgresFixtureConfig, RedisFixtureConfig, WaitConfig};
use crate::file_loader::load_from_file;
use crate::loader::load_from_env;
use std::path::Path;
use validator::Validate;

/// Environment variable naming an optional TOML/YAML configuration file.
pub const CONFIG_FILE_ENV: &str = "FX_CONFIG_FILE";

/// Load the effective configuration: env over `FX_CONFIG_FILE` over defaults.
///
/// Without `FX_CONFIG_FILE` this is [`load_from_env`].
pub fn load_config() -> Result<FixtureConfig, Box<dyn std::error::Error>> {
    match std::env::var(CONFIG_FILE_ENV) {
        Ok(path) if !path.is_empty() => load_layered(Some(Path::new(&path))),
        _ => load_layered(None),
    }
}

/// Merge defaults, the optional file at `file` and the environment.
pub fn load_layered(file: Option<&Path>) -> Result<FixtureConfig, Box<dyn std::error::Error>> {
    let from_env = load_from_env()?;
    let Some(path) = file else {
        return Ok(from_env);
    };

    let from_file = load_from_file(path)?;
    let merged = merge_configs(
        FixtureConfig::default(),
        from_file,
        &path.display().to_string(),
        from_env,
        "env",
    );
    merged.validate()?;
    Ok(merged)
}

/// Merge configuration sources with precedence.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// A field from a higher-priority source wins only when it differs from the
/// default value, so an env loader that falls back to defaults never erases
/// what the file set.
///
/// ## Usage
/// ```rust,no_run
/// use config::{FixtureConfig, load_from_env, load_from_file, merge_configs};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let from_file = load_from_file(Path::new("fixtures.toml"))?;
///     let from_env = load_from_env()?;
///     let _config = merge_configs(FixtureConfig::default(), from_file, "file", from_env, "env");
///     Ok(())
/// }
/// ```
pub fn merge_configs(
    defaults: FixtureConfig,
    file_config: FixtureConfig,
    file_source_name: &str,
    env_config: FixtureConfig,
    env_source_name: &str,
) -> FixtureConfig {
    let config = merge_with_logging(defaults, &file_config, file_source_name);
    merge_with_logging(config, &env_config, env_source_name)
}

fn merge_with_logging(
    mut base: FixtureConfig,
    override_config: &FixtureConfig,
    source_name: &str,
) -> FixtureConfig {
    let mut changes = Vec::new();

    merge_postgres(&mut base.postgres, &override_config.postgres, &mut changes);
    merge_redis(&mut base.redis, &override_config.redis, &mut changes);
    merge_wait(&mut base.wait, &override_config.wait, &mut changes);

    if !changes.is_empty() {
        tracing::info!("Fixture configuration from {}: {:?}", source_name, changes);
    }

    base
}

fn merge_field<T: PartialEq + Clone + std::fmt::Debug>(
    base: &mut T,
    candidate: &T,
    default: &T,
    name: &str,
    changes: &mut Vec<String>,
) {
    if candidate != default && candidate != base {
        changes.push(format!("{} = {:?}", name, candidate));
        base.clone_from(candidate);
    }
}

fn merge_postgres(
    base: &mut PostgresFixtureConfig,
    candidate: &PostgresFixtureConfig,
    changes: &mut Vec<String>,
) {
    let d = PostgresFixtureConfig::default();
    merge_field(&mut base.image, &candidate.image, &d.image, "postgres.image", changes);
    merge_field(&mut base.tag, &candidate.tag, &d.tag, "postgres.tag", changes);
    merge_field(&mut base.user, &candidate.user, &d.user, "postgres.user", changes);
    if candidate.password != d.password && candidate.password != base.password {
        changes.push("postgres.password = ***".to_string());
        base.password.clone_from(&candidate.password);
    }
    merge_field(
        &mut base.database,
        &candidate.database,
        &d.database,
        "postgres.database",
        changes,
    );
    merge_field(
        &mut base.startup_timeout_seconds,
        &candidate.startup_timeout_seconds,
        &d.startup_timeout_seconds,
        "postgres.startup_timeout_seconds",
        changes,
    );
    merge_field(
        &mut base.pool_size,
        &candidate.pool_size,
        &d.pool_size,
        "postgres.pool_size",
        changes,
    );
    merge_field(
        &mut base.connect_timeout_seconds,
        &candidate.connect_timeout_seconds,
        &d.connect_timeout_seconds,
        "postgres.connect_timeout_seconds",
        changes,
    );
}

fn merge_redis(
    base: &mut RedisFixtureConfig,
    candidate: &RedisFixtureConfig,
    changes: &mut Vec<String>,
) {
    let d = RedisFixtureConfig::default();
    merge_field(&mut base.image, &candidate.image, &d.image, "redis.image", changes);
    merge_field(&mut base.tag, &candidate.tag, &d.tag, "redis.tag", changes);
    merge_field(
        &mut base.startup_timeout_seconds,
        &candidate.startup_timeout_seconds,
        &d.startup_timeout_seconds,
        "redis.startup_timeout_seconds",
        changes,
    );
}

fn merge_wait(base: &mut WaitConfig, candidate: &WaitConfig, changes: &mut Vec<String>) {
    let d = WaitConfig::default();
    merge_field(
        &mut base.poll_interval_ms,
        &candidate.poll_interval_ms,
        &d.poll_interval_ms,
        "wait.poll_interval_ms",
        changes,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn clear_layered_env() {
        unsafe {
            for key in [CONFIG_FILE_ENV, "FX_PG_TAG", "FX_PG_DATABASE", "FX_WAIT_POLL_INTERVAL_MS"] {
                std::env::remove_var(key);
            }
        }
    }

    fn write_fixture_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("fixtures.toml");
        fs::write(
            &path,
            "[postgres]\ntag = \"15-alpine\"\ndatabase = \"file_db\"\n\n[wait]\npoll_interval_ms = 50\n",
        )
        .unwrap();
        path
    }

    #[test]
    #[serial]
    fn test_load_config_env_over_file_over_defaults() {
        clear_layered_env();
        let dir = TempDir::new().unwrap();
        let path = write_fixture_file(&dir);
        unsafe {
            std::env::set_var(CONFIG_FILE_ENV, &path);
            std::env::set_var("FX_PG_DATABASE", "env_db");
        }

        let config = load_config();
        clear_layered_env();
        let config = config.unwrap();

        assert_eq!(config.postgres.tag, "15-alpine");
        assert_eq!(config.postgres.database, "env_db");
        assert_eq!(config.postgres.user, "test");
        assert_eq!(config.wait.poll_interval_ms, 50);
    }

    #[test]
    #[serial]
    fn test_load_config_without_file_reads_env() {
        clear_layered_env();
        unsafe {
            std::env::set_var("FX_PG_TAG", "17-alpine");
        }
        let config = load_config();
        clear_layered_env();
        assert_eq!(config.unwrap().postgres.tag, "17-alpine");
    }

    #[test]
    #[serial]
    fn test_load_layered_reports_missing_file() {
        clear_layered_env();
        let dir = TempDir::new().unwrap();
        assert!(load_layered(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = FixtureConfig::default();
        file.postgres.tag = "15-alpine".to_string();
        let mut env = FixtureConfig::default();
        env.postgres.tag = "17-alpine".to_string();

        let merged = merge_configs(FixtureConfig::default(), file, "file", env, "env");
        assert_eq!(merged.postgres.tag, "17-alpine");
    }

    #[test]
    fn test_default_env_values_keep_file_values() {
        let mut file = FixtureConfig::default();
        file.redis.startup_timeout_seconds = 15;
        file.wait.poll_interval_ms = 20;

        let merged = merge_configs(
            FixtureConfig::default(),
            file,
            "file",
            FixtureConfig::default(),
            "env",
        );
        assert_eq!(merged.redis.startup_timeout_seconds, 15);
        assert_eq!(merged.wait.poll_interval_ms, 20);
    }

    #[test]
    fn test_merge_of_defaults_is_default() {
        let merged = merge_configs(
            FixtureConfig::default(),
            FixtureConfig::default(),
            "file",
            FixtureConfig::default(),
            "env",
        );
        assert_eq!(merged, FixtureConfig::default());
    }

    #[test]
    fn test_password_override() {
        let mut env = FixtureConfig::default();
        env.postgres.password = "s3cret".to_string();
        let merged = merge_configs(
            FixtureConfig::default(),
            FixtureConfig::default(),
            "file",
            env,
            "env",
        );
        assert_eq!(merged.postgres.password, "s3cret");
    }
}
