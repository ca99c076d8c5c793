use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::SwitchyardConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "switchyard.toml",
    "switchyard.yaml",
    "switchyard.yml",
    "switchyard.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<SwitchyardConfig> {
    let raw = std::fs::read_to_string(path)?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./switchyard.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/switchyard/switchyard.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SwitchyardConfig::default()` if no config file is found or the
/// file fails to parse — configuration is never fatal.
#[must_use]
pub fn discover_and_load() -> SwitchyardConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(config) => return config,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    SwitchyardConfig::default()
}

/// Find the first config file in standard locations.
#[must_use]
pub fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/switchyard/
    if let Some(dir) = config_dir() {
        for name in CONFIG_FILENAMES {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/switchyard/`).
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "switchyard").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<SwitchyardConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::unsupported_format(ext)),
    }
}
