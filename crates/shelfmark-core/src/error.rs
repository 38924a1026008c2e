use thiserror::Error;

/// All errors that can occur in shelfmark-core.
#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Missing credential: set the {env_var} environment variable ({purpose})")]
    MissingCredential { env_var: String, purpose: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{backend} request failed: {message}")]
    Store { backend: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl ShelfError {
    pub(crate) fn store(backend: &str, message: impl Into<String>) -> Self {
        Self::Store {
            backend: backend.to_string(),
            message: message.into(),
        }
    }

    /// True for errors that mean the process cannot start at all.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::MissingCredential { .. } | Self::TomlParse(_)
        )
    }
}

/// Process exit codes used by the CLI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    WriteFailed = 6,
    Duplicate = 7,
    ConfigMissing = 9,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

pub type Result<T> = std::result::Result<T, ShelfError>;
