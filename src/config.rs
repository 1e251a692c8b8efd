//! Engine settings, loadable from TOML.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Settings for decoding and building jq functions.
///
/// ```
/// use jqfunc::Settings;
///
/// let settings = Settings::from_toml_str(r#"block_type = "jq""#).unwrap();
/// assert_eq!(settings.block_type, "jq");
/// assert_eq!(settings.subject_param, "input");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Block type that declares a function.
    pub block_type: String,
    /// Name of the subject parameter in each function's signature.
    pub subject_param: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            block_type: "jqfunction".to_string(),
            subject_param: "input".to_string(),
        }
    }
}

/// Error loading [`Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
