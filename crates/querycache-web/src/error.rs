use querycache::{QueryError, StoreError};
use thiserror::Error;

/// An error sending or decoding an HTTP request.
#[derive(Debug, Error)]
pub enum WebError {
    /// The request could not be sent, or the response could not be read.
    #[error("request failed")]
    Request(#[from] reqwest::Error),
    /// The response body was not valid JSON for the requested type.
    #[error("failed to decode response body")]
    Decode(#[from] serde_json::Error),
    /// The HTTP method is not supported.
    #[error("invalid or unsupported HTTP method `{0}`")]
    InvalidMethod(String),
    /// A configured header name or value is invalid.
    #[error("invalid header `{0}`")]
    InvalidHeader(String),
    /// A fetch was requested before a URI was set.
    #[error("no URI set")]
    MissingUri,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The error returned when retrieving the result of a [`WebQuery`](crate::WebQuery).
pub type WebQueryError = QueryError<WebError>;
