//! Transport errors

/// Errors constructing the HTTP transport
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Base URL is empty or not http(s)
    #[error("invalid base url: '{0}'")]
    InvalidBaseUrl(String),

    /// Bearer token contains characters not allowed in a header
    #[error("bearer token is not a valid header value")]
    InvalidToken,

    /// Client could not be built
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}
