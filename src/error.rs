use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilterError>;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid item: length {len} exceeds maximum {max}")]
    InvalidItem { len: usize, max: usize },

    #[error("invalid time: {0}")]
    InvalidTime(String),

    #[error("wrong number of arguments for '{command}' command")]
    WrongArity { command: String },

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Failed to parse environment variable {var_name}: value '{value}' - {error}")]
    EnvParseError {
        var_name: String,
        value: String,
        error: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilterError {
    /// Errors caused by the caller's arguments rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FilterError::InvalidItem { .. }
                | FilterError::InvalidTime(_)
                | FilterError::WrongArity { .. }
                | FilterError::UnknownCommand(_)
                | FilterError::Protocol(_)
        )
    }
}

impl From<serde_json::Error> for FilterError {
    fn from(err: serde_json::Error) -> Self {
        FilterError::SerializationError(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for FilterError {
    fn from(err: bincode::error::EncodeError) -> Self {
        FilterError::SerializationError(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for FilterError {
    fn from(err: bincode::error::DecodeError) -> Self {
        FilterError::SerializationError(err.to_string())
    }
}
