//! Configuration loading and schema.
//!
//! Config files: `switchyard.toml`, `switchyard.yaml`, or `switchyard.json`,
//! searched in `./` then `~/.config/switchyard/`. `${ENV_VAR}` placeholders
//! in the raw file are substituted before parsing. A missing or broken file
//! falls back to defaults — configuration is never fatal.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    env_subst::substitute_env,
    error::{Error, Result},
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        AdaptersConfig, ConsoleSection, DeviceSection, DispatchConfig, IdentityConfig,
        LoggingConfig, SwitchyardConfig, WireSection,
    },
};
