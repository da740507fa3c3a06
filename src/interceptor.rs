//! Response interception.
//!
//! Every response the client receives passes through an [`Interceptor`]
//! before it reaches the caller. The interceptor is handed a [`Retry`]
//! capability; calling it renews the session and sends the same request
//! again. The default [`AuthInterceptor`] uses it on 401 and 403.
//!
//! # Examples
//!
//! ```
//! use async_trait::async_trait;
//! use frisquet_connect::interceptor::{Interceptor, Retry};
//! use frisquet_connect::{RawResponse, Result};
//!
//! /// Never renews the session; useful when credentials must not be replayed.
//! struct PassThrough;
//!
//! #[async_trait]
//! impl Interceptor for PassThrough {
//!     async fn intercept(&self, response: RawResponse, _retry: &dyn Retry) -> Result<RawResponse> {
//!         Ok(response)
//!     }
//! }
//! ```

use crate::{RawResponse, Result};
use async_trait::async_trait;
use http::StatusCode;

/// Renews the session and replays the intercepted request.
#[async_trait]
pub trait Retry: Send + Sync {
    /// Backs off, logs in again and sends the request once more.
    ///
    /// The replay always carries the renewed session token. Once `intercept`
    /// returns the replayed response, the client runs it through the
    /// interceptor again.
    async fn replay(&self) -> Result<RawResponse>;
}

/// Inspects a response and decides whether to hand it back or replay.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Returns the response the caller receives.
    async fn intercept(&self, response: RawResponse, retry: &dyn Retry) -> Result<RawResponse>;
}

/// Returns `true` for the statuses the backend uses for an expired session.
pub fn is_auth_failure(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

/// Replays on 401/403 and lets everything else through.
///
/// Statuses other than 200 and 201 are logged but returned unchanged; the
/// caller decides what they mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthInterceptor;

#[async_trait]
impl Interceptor for AuthInterceptor {
    async fn intercept(&self, response: RawResponse, retry: &dyn Retry) -> Result<RawResponse> {
        let status = response.status;

        if is_auth_failure(status) {
            tracing::warn!(
                status = status.as_u16(),
                attempts = response.attempts,
                "Session rejected by backend"
            );
            return retry.replay().await;
        }

        if !matches!(status, StatusCode::OK | StatusCode::CREATED) {
            tracing::warn!(
                status = status.as_u16(),
                response = %response.raw_body,
                "Unexpected status"
            );
        }

        Ok(response)
    }
}
