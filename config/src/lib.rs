//! Load configuration from XDG `config.toml` and project `.env`, apply it to the process
//! environment with priority **existing env > .env > XDG**, then read typed [`Settings`].
//!
//! ```no_run
//! config::load_and_apply("rincewrite", None).expect("config");
//! let settings = config::Settings::from_env().expect("settings");
//! println!("model: {}", settings.model);
//! ```

mod dotenv;
#[cfg(feature = "tracing-init")]
pub mod logging;
mod settings;
mod xdg_toml;

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;

pub use settings::{
    Settings, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_SECS, TEMPERATURE_RANGE,
};
pub use xdg_toml::config_path;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Sets environment variables from project `.env` and `$XDG_CONFIG_HOME/<app_name>/config.toml`,
/// only for keys that are **not** already set.
///
/// When a key is missing from the process environment:
/// 1. the project `.env` value wins (current directory, or `override_dir` when given);
/// 2. otherwise the `[env]` table of the XDG config file is used.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let xdg_map = xdg_toml::load_env_map(app_name)?;
    let dotenv_map = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;

    let keys: HashSet<&String> = xdg_map.keys().chain(dotenv_map.keys()).collect();
    for key in keys {
        if std::env::var_os(key).is_some() {
            continue;
        }
        if let Some(v) = dotenv_map.get(key).or_else(|| xdg_map.get(key)) {
            std::env::set_var(key, v);
        }
    }
    Ok(())
}
