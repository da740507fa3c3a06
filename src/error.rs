//! Error types for Frisquet Connect API calls.
//!
//! Errors keep the raw response body and HTTP status whenever the backend
//! answered, so callers can tell a rejected login apart from a transport
//! failure or an unexpected payload.

use http::{HeaderMap, StatusCode};

/// The main error type for the Frisquet Connect client.
///
/// # Examples
///
/// ```no_run
/// use frisquet_connect::{Client, ClientConfig, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let config = ClientConfig::new("https://api.example.com", "me@example.com", "secret")?;
/// let client = Client::new(config)?;
///
/// match client.login().await {
///     Ok(session) => println!("Logged in, token length {}", session.token.len()),
///     Err(Error::LoginFailed { status, raw_response }) => {
///         eprintln!("Login rejected ({}): {}", status, raw_response);
///     }
///     Err(Error::MissingToken) => eprintln!("Backend answered without a token"),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection refused, DNS failure, etc.).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request exceeded the timeout configured on the client.
    #[error("Request timed out")]
    Timeout,

    /// The response body could not be decoded into the expected type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// A typed request received a non-2xx status.
    ///
    /// Only the typed helpers (`get`, `post`, ...) produce this variant;
    /// [`Client::request`](crate::Client::request) hands non-2xx responses
    /// back as ordinary responses.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// The login exchange was rejected by the backend.
    ///
    /// This is not retried, whether it happened during an explicit
    /// [`Client::login`](crate::Client::login) or during re-authentication.
    #[error("Login failed with status {status}: {raw_response}")]
    LoginFailed {
        /// The HTTP status code of the authentication response
        status: StatusCode,
        /// The raw body of the authentication response
        raw_response: String,
    },

    /// The login response did not contain a usable `token`.
    #[error("Unexpected missing token in login response")]
    MissingToken,

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// An invalid URL was provided or built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::LoginFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            Error::LoginFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns `true` if the backend rejected the credentials or the session.
    ///
    /// # Examples
    ///
    /// ```
    /// use frisquet_connect::Error;
    /// use http::StatusCode;
    ///
    /// let err = Error::LoginFailed {
    ///     status: StatusCode::FORBIDDEN,
    ///     raw_response: String::new(),
    /// };
    /// assert!(err.is_auth_failure());
    /// assert!(!Error::Timeout.is_auth_failure());
    /// ```
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Error::LoginFailed { .. } | Error::MissingToken => true,
            Error::HttpError { status, .. } => crate::interceptor::is_auth_failure(*status),
            _ => false,
        }
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err)
        }
    }
}

/// A specialized `Result` type for Frisquet Connect calls.
pub type Result<T> = std::result::Result<T, Error>;
