use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
