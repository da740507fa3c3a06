//! Authenticated HTTP client for the Frisquet Connect backend.
//!
//! The [`Client`] type is the main entry point. It attaches the session token
//! to every request, and when the backend answers 401 or 403 it backs off,
//! logs in again and replays the request with the new token.
//! Use [`ClientBuilder`] to tune timings or swap the interceptor.

use crate::{
    config::{ClientConfig, PlatformConfig},
    interceptor::{AuthInterceptor, Interceptor, Retry},
    metadata::{PreparedRequest, RequestMetadata},
    reauth::{AttemptCounter, ReauthPolicy},
    session::Session,
    Error, RawResponse, Response, Result,
};
use async_trait::async_trait;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use url::Url;

/// Path of the login exchange, relative to the hostname.
pub const AUTH_PATH: &str = "authentifications";

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    /// The session token now attached to every request.
    pub token: String,
    /// The account profile returned by the backend, left untyped.
    pub utilisateur: Value,
}

#[derive(Serialize)]
struct Credentials<'a> {
    locale: &'a str,
    email: &'a str,
    password: &'a str,
    type_client: &'a str,
}

/// A client for the Frisquet Connect API.
///
/// Cloning is cheap and clones share the session, so a token renewed by one
/// clone is used by all of them.
///
/// # Examples
///
/// ```no_run
/// use frisquet_connect::{Client, ClientConfig};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Sites {
///     sites: Vec<serde_json::Value>,
/// }
///
/// # async fn example() -> Result<(), frisquet_connect::Error> {
/// let config = ClientConfig::new("https://fcutappli.frisquet.com/api/v1", "me@example.com", "secret")?;
/// let client = Client::new(config)?;
///
/// // No explicit login needed: the first 401 triggers one.
/// let sites = client.get::<Sites>("sites").await?;
/// println!("{} site(s)", sites.data.sites.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: Url,
    default_headers: HeaderMap,
    config: ClientConfig,
    session: Session,
    attempts: AttemptCounter,
    reauth_policy: ReauthPolicy,
    interceptor: Box<dyn Interceptor>,
    timeout: Option<Duration>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client with default timings.
    ///
    /// # Errors
    ///
    /// Returns an error if the hostname is not a valid base URL.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Validates a host platform configuration and builds a client from it.
    ///
    /// A value in [`PASSWORD_ENV_VAR`](crate::PASSWORD_ENV_VAR) is used as the
    /// password as-is; see [`Client::from_platform_config_with`] to decode it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if `hostname`, `username` or
    /// `password` is missing. No request is sent in that case.
    pub fn from_platform_config(platform: &PlatformConfig) -> Result<Self> {
        Self::from_platform_config_with(platform, |encoded| Ok(encoded.to_string()))
    }

    /// Like [`Client::from_platform_config`], decoding the environment
    /// password override with `decode`.
    pub fn from_platform_config_with<F>(platform: &PlatformConfig, decode: F) -> Result<Self>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        let config = ClientConfig::from_platform_env(platform, decode)?;
        let mut builder = Self::builder().config(config);
        if let Some(cap) = platform.reauth_max_exponent {
            builder = builder.reauth_policy(ReauthPolicy::builder().max_exponent(cap).build());
        }
        builder.build()
    }

    /// Returns the configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the session token currently attached to requests.
    pub async fn token(&self) -> Option<String> {
        self.inner.session.token().await
    }

    /// Returns the number of authentication failure episodes so far.
    pub fn attempt_count(&self) -> u64 {
        self.inner.attempts.current()
    }

    /// Sends a request and returns the response whatever its status.
    ///
    /// A 401 or 403 is handled by the interceptor (by default: re-login and
    /// replay). Other statuses come back as-is; check
    /// [`Response::status`](crate::Response) yourself.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use frisquet_connect::{Client, ClientConfig, metadata::RequestMetadata};
    /// use http::Method;
    ///
    /// # async fn example() -> Result<(), frisquet_connect::Error> {
    /// let client = Client::new(ClientConfig::new("https://api.example.com", "me", "secret")?)?;
    ///
    /// let metadata = RequestMetadata::new(Method::GET, "sites/42");
    /// let response = client.request::<()>(metadata, None).await?;
    /// if !response.is_success() {
    ///     eprintln!("Backend answered {}", response.status);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn request<Req>(
        &self,
        metadata: RequestMetadata,
        body: Option<&Req>,
    ) -> Result<RawResponse>
    where
        Req: Serialize,
    {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| Error::SerializationFailed(e.to_string()))?;
        let request = PreparedRequest { metadata, body };

        let exchange = Exchange {
            client: self,
            request: &request,
            started: Instant::now(),
        };
        exchange.run().await
    }

    /// Sends a request and decodes a successful body into `Res`.
    ///
    /// # Errors
    ///
    /// Non-2xx statuses surface as [`Error::HttpError`]; a body that does not
    /// match `Res` as [`Error::DeserializationFailed`].
    pub async fn call<Req, Res>(
        &self,
        metadata: RequestMetadata,
        body: Option<&Req>,
    ) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let response = self.request(metadata, body).await?;
        into_typed(response)
    }

    /// Makes a GET request to the specified path.
    pub async fn get<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::GET, path);
        self.call::<(), Res>(metadata, None).await
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub async fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::POST, path);
        self.call(metadata, Some(body)).await
    }

    /// Makes a PUT request to the specified path with a JSON body.
    pub async fn put<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::PUT, path);
        self.call(metadata, Some(body)).await
    }

    /// Makes a PATCH request to the specified path with a JSON body.
    pub async fn patch<Req, Res>(
        &self,
        path: impl Into<String>,
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::PATCH, path);
        self.call(metadata, Some(body)).await
    }

    /// Makes a DELETE request to the specified path.
    pub async fn delete<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::DELETE, path);
        self.call::<(), Res>(metadata, None).await
    }

    /// Logs in with the configured credentials and installs the new token.
    ///
    /// The current token is dropped before the credentials are posted, and
    /// the login request itself never carries a token. Waits for any login
    /// already in progress on this client.
    ///
    /// # Errors
    ///
    /// - [`Error::LoginFailed`] if the backend rejects the credentials.
    /// - [`Error::MissingToken`] if the response has no `token`.
    ///
    /// Neither is retried, and the client is left without a token.
    pub async fn login(&self) -> Result<LoginResponse> {
        let _guard = self.inner.session.lock_login().await;
        self.login_locked().await
    }

    /// Renews the session unless another caller already did.
    ///
    /// `seen_generation` is the session generation the failing request was
    /// sent with. If a newer token has been installed since, it is returned
    /// without a second login; concurrent failures share one login.
    pub async fn refresh_token(&self, seen_generation: u64) -> Result<String> {
        let _guard = self.inner.session.lock_login().await;

        if let Some(token) = self.inner.session.token_newer_than(seen_generation).await {
            tracing::debug!(seen_generation, "Session already renewed, reusing token");
            return Ok(token);
        }

        Ok(self.login_locked().await?.token)
    }

    // Caller must hold the session login guard.
    async fn login_locked(&self) -> Result<LoginResponse> {
        let session = &self.inner.session;
        let config = &self.inner.config;
        session.clear().await;

        let credentials = Credentials {
            locale: "fr",
            email: config.username(),
            password: config.password(),
            type_client: "IOS",
        };
        let body = serde_json::to_value(&credentials)
            .map_err(|e| Error::SerializationFailed(e.to_string()))?;
        let request = PreparedRequest {
            metadata: RequestMetadata::new(Method::POST, AUTH_PATH)
                .with_query_param("appId", config.app_id()),
            body: Some(body),
        };

        let Response {
            data,
            raw_body,
            status,
            ..
        } = self.send(&request, None, 1, Instant::now()).await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Login rejected");
            return Err(Error::LoginFailed {
                status,
                raw_response: raw_body,
            });
        }

        let token = data
            .get("token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or(Error::MissingToken)?;
        let utilisateur = data.get("utilisateur").cloned().unwrap_or(Value::Null);

        let generation = session.install(token.clone()).await;
        tracing::info!(
            username = %config.username(),
            generation,
            "Logged in to Frisquet Connect"
        );

        Ok(LoginResponse { token, utilisateur })
    }

    /// Sends one attempt of a request and decodes its body.
    async fn send(
        &self,
        request: &PreparedRequest,
        token: Option<&str>,
        attempt: usize,
        started: Instant,
    ) -> Result<RawResponse> {
        let metadata = &request.metadata;
        let mut url = self
            .inner
            .base_url
            .join(metadata.path.trim_start_matches('/'))?;

        // Logged before the query is attached so the token stays out of logs.
        tracing::info!(
            method = %metadata.method,
            url = %url,
            attempt = attempt,
            authenticated = token.is_some(),
            "About to request"
        );

        // Replays always carry the renewed session token.
        let query = metadata.merged_query(token, attempt == 1);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let mut builder = self.inner.http_client.request(metadata.method.clone(), url);

        for (name, value) in &self.inner.default_headers {
            builder = builder.header(name, value);
        }

        for (name, value) in &metadata.headers {
            builder = builder.header(name, value);
        }

        if let Some(timeout) = self.inner.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(Error::from_transport)?;
        let status = response.status();
        let headers = response.headers().clone();
        let raw_body = response.text().await.map_err(Error::from_transport)?;
        let latency = started.elapsed();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            attempt = attempt,
            "Received HTTP response"
        );

        let data = decode_body(&raw_body, status)?;
        Ok(Response::new(data, raw_body, status, headers, latency, attempt))
    }
}

/// One logical request, possibly sent several times.
struct Exchange<'a> {
    client: &'a Client,
    request: &'a PreparedRequest,
    started: Instant,
}

impl Exchange<'_> {
    /// Sends the request and feeds each response to the interceptor.
    ///
    /// A replayed response goes back through the interceptor on the next
    /// turn of the loop rather than from inside the replay, so a session
    /// that keeps being rejected does not nest futures.
    async fn run(&self) -> Result<RawResponse> {
        let session = self.client.inner.session.snapshot().await;
        let mut response = self
            .client
            .send(self.request, session.token.as_deref(), 1, self.started)
            .await?;
        let mut seen_generation = session.generation;

        loop {
            let retry = Replay {
                exchange: self,
                attempt: response.attempts,
                seen_generation,
                replayed_with: OnceLock::new(),
            };
            let outcome = self
                .client
                .inner
                .interceptor
                .intercept(response, &retry)
                .await?;

            match retry.replayed_with.get() {
                Some(generation) => {
                    seen_generation = *generation;
                    response = outcome;
                }
                None => return Ok(outcome),
            }
        }
    }
}

/// The [`Retry`] capability handed to the interceptor for one attempt.
struct Replay<'a> {
    exchange: &'a Exchange<'a>,
    attempt: usize,
    seen_generation: u64,
    // Session generation the replay was sent with, once it has been sent.
    replayed_with: OnceLock<u64>,
}

#[async_trait]
impl Retry for Replay<'_> {
    async fn replay(&self) -> Result<RawResponse> {
        let client = self.exchange.client;
        let policy = &client.inner.reauth_policy;
        let metadata = &self.exchange.request.metadata;

        let episode = client.inner.attempts.next();
        let delay = policy.delay_for_attempt(episode);
        tracing::info!(
            episode = episode,
            delay_ms = delay.as_millis() as u64,
            method = %metadata.method,
            path = %metadata.path,
            "Renewing session before retry"
        );
        tokio::time::sleep(delay).await;

        client.refresh_token(self.seen_generation).await?;
        tokio::time::sleep(policy.settle_delay).await;

        let session = client.inner.session.snapshot().await;
        let _ = self.replayed_with.set(session.generation);

        tracing::info!(
            attempt = self.attempt + 1,
            path = %metadata.path,
            "Retrying with renewed session"
        );
        client
            .send(
                self.exchange.request,
                session.token.as_deref(),
                self.attempt + 1,
                self.exchange.started,
            )
            .await
    }
}

fn decode_body(raw_body: &str, status: StatusCode) -> Result<Value> {
    if raw_body.trim().is_empty() {
        return Ok(Value::Null);
    }

    match serde_json::from_str(raw_body) {
        Ok(value) => Ok(value),
        // Error pages are often HTML; keep them in `raw_body` only.
        Err(_) if !status.is_success() => Ok(Value::Null),
        Err(e) => {
            tracing::error!(
                error = %e,
                raw_response = %raw_body,
                "Failed to decode JSON response"
            );
            Err(Error::DeserializationFailed {
                raw_response: raw_body.to_string(),
                serde_error: e.to_string(),
                status,
            })
        }
    }
}

fn into_typed<Res>(response: RawResponse) -> Result<Response<Res>>
where
    Res: DeserializeOwned,
{
    let Response {
        data,
        raw_body,
        status,
        headers,
        latency,
        attempts,
    } = response;

    if !status.is_success() {
        return Err(Error::HttpError {
            status,
            raw_response: raw_body,
            headers,
        });
    }

    match serde_json::from_value::<Res>(data) {
        Ok(data) => Ok(Response::new(
            data, raw_body, status, headers, latency, attempts,
        )),
        Err(e) => {
            tracing::error!(
                error = %e,
                raw_response = %raw_body,
                "Failed to deserialize response"
            );
            Err(Error::DeserializationFailed {
                raw_response: raw_body,
                serde_error: e.to_string(),
                status,
            })
        }
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use frisquet_connect::{ClientBuilder, ClientConfig, ReauthPolicy};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), frisquet_connect::Error> {
/// let client = ClientBuilder::new()
///     .config(ClientConfig::new("https://api.example.com", "me", "secret")?)
///     .timeout(Duration::from_secs(30))
///     .reauth_policy(ReauthPolicy::builder().max_exponent(6).build())
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    config: Option<ClientConfig>,
    default_headers: HeaderMap,
    reauth_policy: ReauthPolicy,
    interceptor: Option<Box<dyn Interceptor>>,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            config: None,
            default_headers: HeaderMap::new(),
            reauth_policy: ReauthPolicy::default(),
            interceptor: None,
            timeout: None,
        }
    }

    /// Sets the connection settings. Required.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the backoff and settle timings used when re-authenticating.
    pub fn reauth_policy(mut self, policy: ReauthPolicy) -> Self {
        self.reauth_policy = policy;
        self
    }

    /// Replaces the default [`AuthInterceptor`].
    pub fn interceptor(mut self, interceptor: Box<dyn Interceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Sets a per-request timeout. By default the transport's is used.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no configuration was provided, if the hostname is
    /// not a usable base URL, or if the user agent is not a valid header.
    pub fn build(self) -> Result<Client> {
        let config = self
            .config
            .ok_or_else(|| Error::ConfigurationError("Client configuration is required".to_string()))?;

        let base_url = base_url(config.hostname())?;

        let user_agent = HeaderValue::try_from(config.user_agent())
            .map_err(|e| Error::ConfigurationError(format!("Invalid user agent: {}", e)))?;
        let mut default_headers = HeaderMap::new();
        default_headers.insert(header::USER_AGENT, user_agent);
        default_headers.extend(self.default_headers);

        let http_client = reqwest::Client::builder().build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;

        let interceptor = self
            .interceptor
            .unwrap_or_else(|| Box::new(AuthInterceptor));

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                default_headers,
                config,
                session: Session::new(),
                attempts: AttemptCounter::default(),
                reauth_policy: self.reauth_policy,
                interceptor,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses the hostname so that relative paths resolve underneath it.
fn base_url(hostname: &str) -> Result<Url> {
    let mut url = Url::parse(hostname)?;
    if url.cannot_be_a_base() {
        return Err(Error::ConfigurationError(format!(
            "Hostname is not a base URL: {}",
            hostname
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_keeps_api_prefix() {
        let url = base_url("https://fcutappli.frisquet.com/api/v1").unwrap();
        assert_eq!(url.as_str(), "https://fcutappli.frisquet.com/api/v1/");
        assert_eq!(
            url.join("authentifications").unwrap().as_str(),
            "https://fcutappli.frisquet.com/api/v1/authentifications"
        );
    }

    #[test]
    fn test_base_url_rejects_garbage() {
        assert!(matches!(base_url("not a url"), Err(Error::InvalidUrl(_))));
        assert!(matches!(
            base_url("mailto:me@example.com"),
            Err(Error::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body("", StatusCode::NO_CONTENT).unwrap(), Value::Null);
        assert_eq!(
            decode_body(r#"{"devices":[]}"#, StatusCode::OK).unwrap(),
            serde_json::json!({"devices": []})
        );
        assert_eq!(
            decode_body("<html>oops</html>", StatusCode::BAD_GATEWAY).unwrap(),
            Value::Null
        );
        assert!(matches!(
            decode_body("<html>oops</html>", StatusCode::OK),
            Err(Error::DeserializationFailed { .. })
        ));
    }

    #[test]
    fn test_build_requires_config() {
        assert!(matches!(
            Client::builder().build(),
            Err(Error::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Client>();
    }
}
