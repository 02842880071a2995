//! Typed settings read from the environment after [`load_and_apply`](crate::load_and_apply).

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use crate::LoadError;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;

/// Model and storage settings for a Rincewrite session.
///
/// | Field           | Variables (first set wins)         | Default          |
/// |-----------------|------------------------------------|------------------|
/// | `model`         | `RINCEWRITE_MODEL`, `OPENAI_MODEL`, `MODEL` | `gpt-3.5-turbo` |
/// | `temperature`   | `RINCEWRITE_TEMPERATURE`           | `0.7`            |
/// | `model_timeout` | `RINCEWRITE_TIMEOUT_SECS`          | 120s             |
/// | `db_path`       | `RINCEWRITE_DB`                    | in-memory store  |
/// | `prompts_dir`   | `PROMPTS_DIR`                      | embedded prompts |
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub model: String,
    pub temperature: f32,
    pub model_timeout: Duration,
    pub db_path: Option<PathBuf>,
    pub prompts_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            model_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            db_path: None,
            prompts_dir: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, LoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings from `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoadError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let model = ["RINCEWRITE_MODEL", "OPENAI_MODEL", "MODEL"]
            .iter()
            .find_map(|k| get(*k))
            .unwrap_or(defaults.model);

        let temperature = match get("RINCEWRITE_TEMPERATURE") {
            Some(raw) => {
                let t: f32 = parse("RINCEWRITE_TEMPERATURE", &raw)?;
                if !TEMPERATURE_RANGE.contains(&t) {
                    return Err(invalid("RINCEWRITE_TEMPERATURE", &raw, "expected 0.0 to 2.0"));
                }
                t
            }
            None => defaults.temperature,
        };

        let model_timeout = match get("RINCEWRITE_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = parse("RINCEWRITE_TIMEOUT_SECS", &raw)?;
                if secs == 0 {
                    return Err(invalid("RINCEWRITE_TIMEOUT_SECS", &raw, "must be positive"));
                }
                Duration::from_secs(secs)
            }
            None => defaults.model_timeout,
        };

        Ok(Self {
            model,
            temperature,
            model_timeout,
            db_path: get("RINCEWRITE_DB").map(PathBuf::from),
            prompts_dir: get("PROMPTS_DIR").map(PathBuf::from),
        })
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> LoadError {
    LoadError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, LoadError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, raw, &e.to_string()))
}
