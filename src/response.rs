//! Response wrapper that keeps the decoded body next to the transport details.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A response as returned by [`Client::request`](crate::Client::request): the
/// body decoded as untyped JSON, whatever the status code.
pub type RawResponse = Response<serde_json::Value>;

/// An HTTP response with its decoded body.
///
/// # Examples
///
/// ```no_run
/// use frisquet_connect::{Client, ClientConfig};
///
/// # async fn example() -> Result<(), frisquet_connect::Error> {
/// let client = Client::new(ClientConfig::new("https://api.example.com", "me", "secret")?)?;
///
/// let response = client.get::<serde_json::Value>("sites").await?;
/// println!("Took {:?} over {} attempt(s)", response.latency, response.attempts);
/// if response.was_retried() {
///     println!("Session was renewed on the way");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded response data.
    pub data: T,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the first send until this response arrived, including any
    /// re-login and backoff in between.
    pub latency: Duration,

    /// The number of times the request was sent.
    ///
    /// `1` when the session was valid, `2` after one re-login, and so on.
    pub attempts: usize,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the response data to a different type, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use frisquet_connect::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     215,
    ///     "215".to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    ///     1,
    /// );
    ///
    /// let celsius = response.map(|decidegrees| decidegrees as f64 / 10.0);
    /// assert_eq!(celsius.data, 21.5);
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the request had to be replayed.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns `true` for a 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
