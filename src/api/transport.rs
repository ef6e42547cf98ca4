// FairPlay Core - FairPlay Streaming license client
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! License server transport
//!
//! # Wire Format
//! **POST** `<license server url>`
//! Content-Type: application/x-www-form-urlencoded
//!
//! ```text
//! spc=<Base64(SPC)>&assetId=<content id>
//! ```
//!
//! Response body: Base64 text wrapping the CKC. Decoding is left to the
//! session so that a bad body is reported as `CannotDecodeResponse` rather
//! than a transport failure.
//!
//! # Hardening
//! The base transport makes exactly one attempt. Timeout and bounded retry
//! are opt-in decorators:
//!
//! ```rust,no_run
//! # use fairplay_core::api::{LicenseServerClient, ClientConfig, RetryPolicy, TransportExt};
//! # use std::time::Duration;
//! # fn example() -> fairplay_core::error::Result<()> {
//! let transport = LicenseServerClient::new(ClientConfig::new("https://keys.example.com/ckc"))?
//!     .with_timeout(Duration::from_secs(10))
//!     .with_retry(RetryPolicy::new(2, Duration::from_millis(500)));
//! # Ok(())
//! # }
//! ```

use crate::crypto::key::{ChallengePayload, ContentIdentifier};
use crate::error::TransportError;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Content type of the license request body
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// One SPC on its way to the license server
#[derive(Debug)]
pub struct LicenseRequest {
    pub identifier: ContentIdentifier,
    pub challenge: ChallengePayload,
}

impl LicenseRequest {
    pub fn new(identifier: ContentIdentifier, challenge: ChallengePayload) -> Self {
        Self {
            identifier,
            challenge,
        }
    }

    /// Encode the form body `spc=<Base64(SPC)>&assetId=<id>`
    ///
    /// Both values are percent-encoded, so Base64 `+`, `/` and `=` survive
    /// form decoding on the server.
    pub fn form_body(&self) -> String {
        let spc = general_purpose::STANDARD.encode(self.challenge.as_bytes());
        format!(
            "spc={}&assetId={}",
            urlencoding::encode(&spc),
            urlencoding::encode(&self.identifier.to_text())
        )
    }
}

/// Request/response byte exchange with the license server
#[async_trait]
pub trait LicenseTransport: Send + Sync {
    /// Send the SPC and return the raw response body
    ///
    /// Single attempt. An empty body is `NetworkUnavailable`.
    async fn exchange(&self, request: &LicenseRequest) -> Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<T: LicenseTransport + ?Sized> LicenseTransport for Arc<T> {
    async fn exchange(&self, request: &LicenseRequest) -> Result<Vec<u8>, TransportError> {
        (**self).exchange(request).await
    }
}

// ============================================================================
// TIMEOUT
// ============================================================================

/// Timeout decorator for transports
pub struct TimeoutTransport<T> {
    inner: T,
    timeout: Duration,
}

impl<T: LicenseTransport> TimeoutTransport<T> {
    pub fn new(inner: T, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<T: LicenseTransport> LicenseTransport for TimeoutTransport<T> {
    async fn exchange(&self, request: &LicenseRequest) -> Result<Vec<u8>, TransportError> {
        tokio::time::timeout(self.timeout, self.inner.exchange(request))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}

// ============================================================================
// RETRY
// ============================================================================

/// Bounded retry with exponential backoff
///
/// `max_retries = 0` means a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (0-based): 1x, 2x, 4x...
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2_u32.saturating_pow(attempt))
    }

    pub fn should_retry(&self, error: &TransportError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Retry decorator for transports
///
/// Retries timeouts, connection failures and 5xx rejections. 4xx rejections
/// are returned immediately.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: LicenseTransport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<T: LicenseTransport> LicenseTransport for RetryingTransport<T> {
    async fn exchange(&self, request: &LicenseRequest) -> Result<Vec<u8>, TransportError> {
        let mut attempt = 0;
        loop {
            match self.inner.exchange(request).await {
                Ok(body) => return Ok(body),
                Err(error) if self.policy.should_retry(&error, attempt) => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    tracing::warn!(
                        asset_id = %request.identifier,
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        ?delay,
                        %error,
                        "license exchange failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Decorator helpers for any transport
pub trait TransportExt: LicenseTransport + Sized {
    /// Add timeout layer
    fn with_timeout(self, timeout: Duration) -> TimeoutTransport<Self> {
        TimeoutTransport::new(self, timeout)
    }

    /// Add retry layer
    fn with_retry(self, policy: RetryPolicy) -> RetryingTransport<Self> {
        RetryingTransport::new(self, policy)
    }
}

impl<T: LicenseTransport> TransportExt for T {}
