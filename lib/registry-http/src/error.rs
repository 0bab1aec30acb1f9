use hyper::StatusCode;
use registry_core::CoreError;
use thiserror::Error;

/// Errors surfaced synchronously to registrants
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("malformed JSON payload: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("unreadable request body: {0}")]
    Body(String),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error(transparent)]
    Rejected(#[from] CoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
