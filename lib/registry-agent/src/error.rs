use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("error fetching {path}: {status}")]
    Metadata { path: String, status: u16 },

    #[error("malformed metadata value at {path}: {reason}")]
    MalformedMetadata { path: String, reason: String },

    #[error("error registering endpoint: {0}")]
    Registration(u16),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
