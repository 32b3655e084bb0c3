//! # Fixture Configuration
//!
//! Configuration for the disposable backing services used in integration
//! tests.
//!
//! This crate provides:
//! - Configuration structures for each fixture kind
//! - Environment variable loading (`FX_*`)
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (env > file > defaults)
//! - Validation through the `validator` crate

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;

pub use config::{FixtureConfig, PostgresFixtureConfig, RedisFixtureConfig, WaitConfig};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::load_from_env;
pub use precedence::{CONFIG_FILE_ENV, load_config, load_layered, merge_configs};
pub use validator::Validate;
