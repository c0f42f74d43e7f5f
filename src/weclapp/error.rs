use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeclappError {
    #[error("WeClapp is not configured: {0} missing")]
    NotConfigured(&'static str),

    #[error("WeClapp API token is not a valid header value")]
    InvalidToken,

    #[error("WeClapp entity not found: {0}")]
    NotFound(String),

    #[error("WeClapp returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("WeClapp request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected WeClapp payload: {0}")]
    Decode(String),

    #[error("Cannot map WeClapp record: {0}")]
    Mapping(String),
}
