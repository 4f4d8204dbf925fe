use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Numeric half of the Telegram bot credential.
    api_id: u64,
    /// Secret half of the Telegram bot credential.
    api_hash: String,
    gemini_api_key: String,
    #[serde(default = "default_gemini_model")]
    gemini_model: String,
    /// Directory for state files (logs, profile pictures). Defaults to current directory.
    data_dir: Option<String>,
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

pub struct Config {
    /// Path the config was loaded from (the persona file lives beside it).
    pub config_path: PathBuf,
    pub api_id: u64,
    pub api_hash: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Directory for state files (logs, profile pictures).
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        // Validate required fields
        if file.api_id == 0 {
            return Err(ConfigError::Validation("api_id is required".into()));
        }
        if file.api_hash.is_empty() {
            return Err(ConfigError::Validation("api_hash is required".into()));
        }
        if file.gemini_api_key.is_empty() {
            return Err(ConfigError::Validation("gemini_api_key is required".into()));
        }
        if file.gemini_model.is_empty() {
            return Err(ConfigError::Validation("gemini_model must not be empty".into()));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            config_path,
            api_id: file.api_id,
            api_hash: file.api_hash,
            gemini_api_key: file.gemini_api_key,
            gemini_model: file.gemini_model,
            data_dir,
        })
    }

    /// Bot API token, formatted as `{api_id}:{api_hash}`.
    pub fn bot_token(&self) -> String {
        format!("{}:{}", self.api_id, self.api_hash)
    }

    /// The sectioned prompt/persona file sits next to the settings file.
    pub fn prompt_config_path(&self) -> PathBuf {
        self.config_path.with_file_name("prompt_config.txt")
    }
}
