//! Request descriptions.
//!
//! [`RequestMetadata`] describes one call site (method, path, headers, query
//! parameters). The client serializes the body once into a
//! [`PreparedRequest`] so the same request can be replayed after a re-login.

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::collections::BTreeMap;

/// Query parameter carrying the session token on every authenticated request.
pub const TOKEN_PARAM: &str = "token";

/// Method, path and per-call options of a request.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path, relative to the configured hostname.
    pub path: String,

    /// Additional headers for this request.
    pub headers: HeaderMap,

    /// Query parameters for this request.
    ///
    /// A `token` entry here overrides the session token for this call only.
    pub query_params: BTreeMap<String, String>,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query_params: BTreeMap::new(),
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// Query parameters to send, with the session token merged in.
    ///
    /// With `allow_override`, a `token` set by the call site is kept as-is;
    /// without it, the session token replaces it.
    pub(crate) fn merged_query<'a>(
        &'a self,
        token: Option<&'a str>,
        allow_override: bool,
    ) -> Vec<(&'a str, &'a str)> {
        let keep_own_token = allow_override || token.is_none();
        let mut pairs: Vec<(&str, &str)> = self
            .query_params
            .iter()
            .filter(|(k, _)| keep_own_token || k.as_str() != TOKEN_PARAM)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let Some(token) = token {
            if !(allow_override && self.query_params.contains_key(TOKEN_PARAM)) {
                pairs.push((TOKEN_PARAM, token));
            }
        }
        pairs
    }
}

/// A request whose body has already been turned into JSON, ready to be sent
/// and, if the session expired, sent again.
#[derive(Debug, Clone)]
pub(crate) struct PreparedRequest {
    pub(crate) metadata: RequestMetadata,
    pub(crate) body: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_is_appended() {
        let metadata = RequestMetadata::new(Method::GET, "devices").with_query_param("page", "1");

        let pairs = metadata.merged_query(Some("tok1"), true);
        assert_eq!(pairs, vec![("page", "1"), ("token", "tok1")]);
    }

    #[test]
    fn test_per_call_token_wins() {
        let metadata =
            RequestMetadata::new(Method::GET, "devices").with_query_param("token", "override");

        let pairs = metadata.merged_query(Some("tok1"), true);
        assert_eq!(pairs, vec![("token", "override")]);
    }

    #[test]
    fn test_session_token_replaces_per_call_token_on_replay() {
        let metadata = RequestMetadata::new(Method::GET, "devices")
            .with_query_param("page", "1")
            .with_query_param("token", "expired");

        let pairs = metadata.merged_query(Some("tok1"), false);
        assert_eq!(pairs, vec![("page", "1"), ("token", "tok1")]);
    }

    #[test]
    fn test_no_session_token() {
        let metadata = RequestMetadata::new(Method::GET, "devices");
        assert!(metadata.merged_query(None, true).is_empty());
        assert!(metadata.merged_query(None, false).is_empty());
    }
}
