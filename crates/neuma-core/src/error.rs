use thiserror::Error;

#[derive(Error, Debug)]
pub enum NeumaError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No mode with that name found: {0}")]
    UnknownMode(String),

    #[error("No persona with that name found: {0}")]
    UnknownPersona(String),

    #[error("Invalid {name}: {message}")]
    InvalidSetting { name: String, message: String },

    #[error("Conversation error: {0}")]
    Conversation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl NeumaError {
    pub fn invalid_setting(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSetting {
            name: name.into(),
            message: message.into(),
        }
    }

    /// True for failures that only abort the current turn.
    pub fn is_turn_local(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, NeumaError>;
