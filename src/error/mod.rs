use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::presets::PresetError;
use crate::request::RequestError;
use crate::rules::RuleValidationError;
use crate::session::SessionError;
use crate::storage::StorageError;
use crate::validate::ValidationError;

/// Result alias used by the public entry points
pub type Result<T> = std::result::Result<T, RandomizerError>;

/// The unified error type for the randomizer
///
/// Module errors convert into this type; the variant encodes how the
/// session reacts to the failure (fatal, retried, or logged).
#[derive(Error, Debug)]
pub enum RandomizerError {
    /// The rule set cannot be satisfied by any site variant. Fatal.
    #[error("[E{code:04}] {message}")]
    Constraint {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Network or file hiccup; retried, then the cycle is abandoned.
    #[error("[E{code:04}] Transient I/O error: {message}")]
    TransientIo {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Downloaded artifact failed post-fetch checks. Non-fatal.
    #[error("[E{code:04}] Validation error: {message}")]
    Validation {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A skip budget ran out. Fatal.
    #[error("[E{code:04}] {message}")]
    BudgetExhausted { code: u16, message: String },

    /// Session or replay data could not be written. Logged, never fatal.
    #[error("[E{code:04}] Persistence error: {message}")]
    Persistence {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Session error: {message}")]
    Session { code: u16, message: String },

    #[error("[E{code:04}] {message}")]
    Other { code: u16, message: String },
}

impl RandomizerError {
    /// Create a constraint error with the default code
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            code: ErrorCode::REQUEST_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with the default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::CONFIG_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with a specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a session error with the default code
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            code: ErrorCode::SESSION_GENERIC,
            message: message.into(),
        }
    }

    /// Create an uncategorized error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_GENERIC,
            message: message.into(),
        }
    }

    /// Attach a source error
    pub fn with_source(mut self, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        match &mut self {
            Self::Constraint { source, .. }
            | Self::TransientIo { source, .. }
            | Self::Validation { source, .. }
            | Self::Persistence { source, .. }
            | Self::Config { source, .. } => {
                *source = Some(Box::new(err));
            }
            Self::BudgetExhausted { .. } | Self::Session { .. } | Self::Other { .. } => {}
        }
        self
    }

    /// Get the numeric error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Constraint { code, .. }
            | Self::TransientIo { code, .. }
            | Self::Validation { code, .. }
            | Self::BudgetExhausted { code, .. }
            | Self::Persistence { code, .. }
            | Self::Config { code, .. }
            | Self::Session { code, .. }
            | Self::Other { code, .. } => *code,
        }
    }

    /// Whether this error ends a running session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Constraint { .. } | Self::BudgetExhausted { .. } | Self::Config { .. }
        )
    }

    /// Message suitable for showing to the user verbatim
    pub fn user_message(&self) -> String {
        match self {
            Self::Constraint { message, .. } | Self::BudgetExhausted { message, .. } => {
                message.clone()
            }
            _ => self.to_string(),
        }
    }
}

impl From<RequestError> for RandomizerError {
    fn from(err: RequestError) -> Self {
        let code = match &err {
            RequestError::NoCompatibleSite { .. } => ErrorCode::REQUEST_NO_COMPATIBLE_SITE,
            RequestError::InvalidUrl(_) => ErrorCode::REQUEST_INVALID_URL,
        };
        Self::Constraint {
            code,
            message: err.to_string(),
            source: None,
        }
        .with_source(err)
    }
}

impl From<FetchError> for RandomizerError {
    fn from(err: FetchError) -> Self {
        let code = if err.is_transient() {
            ErrorCode::FETCH_TRANSIENT
        } else {
            ErrorCode::FETCH_PERMANENT
        };
        Self::TransientIo {
            code,
            message: err.to_string(),
            source: None,
        }
        .with_source(err)
    }
}

impl From<ValidationError> for RandomizerError {
    fn from(err: ValidationError) -> Self {
        let code = match &err {
            ValidationError::Corrupt(_) => ErrorCode::VALIDATION_CORRUPT,
            ValidationError::Rejected(_) => ErrorCode::VALIDATION_REJECTED,
        };
        Self::Validation {
            code,
            message: err.to_string(),
            source: None,
        }
        .with_source(err)
    }
}

impl From<StorageError> for RandomizerError {
    fn from(err: StorageError) -> Self {
        let code = match &err {
            StorageError::Io(_) => ErrorCode::STORAGE_IO_ERROR,
            StorageError::Serialization(_) => ErrorCode::STORAGE_SERIALIZATION_ERROR,
            StorageError::NotFound(_) => ErrorCode::STORAGE_NOT_FOUND,
            StorageError::InvalidName(_) => ErrorCode::STORAGE_GENERIC,
        };
        Self::Persistence {
            code,
            message: err.to_string(),
            source: None,
        }
        .with_source(err)
    }
}

impl From<SessionError> for RandomizerError {
    fn from(err: SessionError) -> Self {
        match &err {
            SessionError::SkipBudgetExhausted { .. } => Self::BudgetExhausted {
                code: ErrorCode::SESSION_SKIP_BUDGET_EXHAUSTED,
                message: err.to_string(),
            },
            SessionError::NoCurrentMap => Self::Session {
                code: ErrorCode::SESSION_NO_CURRENT_MAP,
                message: err.to_string(),
            },
            SessionError::InvalidTransition { .. } => Self::Session {
                code: ErrorCode::SESSION_INVALID_TRANSITION,
                message: err.to_string(),
            },
        }
    }
}

impl From<RuleValidationError> for RandomizerError {
    fn from(err: RuleValidationError) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_INVALID_RULES, err.to_string()).with_source(err)
    }
}

impl From<PresetError> for RandomizerError {
    fn from(err: PresetError) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_INVALID_PRESET, err.to_string()).with_source(err)
    }
}

impl From<ConfigError> for RandomizerError {
    fn from(err: ConfigError) -> Self {
        let code = match &err {
            ConfigError::Yaml(_) => ErrorCode::CONFIG_INVALID_YAML,
            ConfigError::NoHomeDirectory | ConfigError::Io(_) => ErrorCode::CONFIG_GENERIC,
        };
        Self::config_with_code(code, err.to_string()).with_source(err)
    }
}
