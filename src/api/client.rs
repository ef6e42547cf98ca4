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


//! HTTP client for the license server
//!
//! [`LicenseServerClient`] is both the outbound [`LicenseTransport`] and,
//! when a certificate URL is configured, a [`CertificateSource`].
//!
//! # Architecture
//!
//! ## Client Structure
//! The client wraps `reqwest::Client` and provides:
//! - Custom headers (User-Agent, Accept)
//! - Timeout and connection pooling configuration
//! - One attempt per call (retry is layered on with [`TransportExt`](super::TransportExt))
//!
//! ## Status Mapping
//! | Outcome                         | Result                          |
//! |---------------------------------|---------------------------------|
//! | 2xx with body                   | body bytes                      |
//! | 2xx with empty body             | `NetworkUnavailable`            |
//! | non-2xx                         | `ServerRejected { status }`     |
//! | reqwest timeout                 | `Timeout`                       |
//! | connect / other I/O failure     | `NetworkUnavailable`            |

use crate::api::certificate::CertificateSource;
use crate::api::transport::{LicenseRequest, LicenseTransport, FORM_CONTENT_TYPE};
use crate::crypto::key::Certificate;
use crate::error::{FairPlayError, Result, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent sent to license and certificate servers
pub const DEFAULT_USER_AGENT: &str = concat!("fairplay-core/", env!("CARGO_PKG_VERSION"));

/// Configuration for LicenseServerClient
/// Provides a builder pattern for client customization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Key server module endpoint receiving the SPC
    pub license_server_url: String,
    /// Where to download the application certificate, if not bundled
    pub certificate_url: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            license_server_url: String::new(),
            certificate_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Configuration with defaults for everything but the license server URL
    pub fn new<S: Into<String>>(license_server_url: S) -> Self {
        Self {
            license_server_url: license_server_url.into(),
            ..Self::default()
        }
    }

    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Check URLs and limits
    ///
    /// # Errors
    /// - `MissingRequiredField` if the license server URL is empty
    /// - `InvalidConfiguration` for unparsable or non-HTTP URLs, or a zero timeout
    pub fn validate(&self) -> Result<()> {
        if self.license_server_url.trim().is_empty() {
            return Err(FairPlayError::MissingRequiredField(
                "license_server_url".to_string(),
            ));
        }
        parse_http_url("license_server_url", &self.license_server_url)?;

        if let Some(ref certificate_url) = self.certificate_url {
            parse_http_url("certificate_url", certificate_url)?;
        }

        if self.timeout.is_zero() {
            return Err(FairPlayError::invalid_config("timeout must be greater than zero"));
        }

        Ok(())
    }
}

fn parse_http_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value.trim())
        .map_err(|e| FairPlayError::invalid_config(format!("{} is not a valid URL: {}", field, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FairPlayError::invalid_config(format!(
            "{} must use http or https, got {}",
            field, other
        ))),
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn license_server_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.license_server_url = url.into();
        self
    }

    pub fn certificate_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.certificate_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// HTTP client for the FairPlay key server
///
/// # Example
/// ```rust,no_run
/// use fairplay_core::api::{ClientConfig, LicenseServerClient};
///
/// # fn example() -> fairplay_core::error::Result<()> {
/// let config = ClientConfig::builder()
///     .license_server_url("https://keys.example.com/ckc")
///     .certificate_url("https://keys.example.com/fairplay.cer")
///     .build();
/// let client = LicenseServerClient::new(config)?;
/// assert_eq!(client.license_server_url().path(), "/ckc");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LicenseServerClient {
    client: Client,
    license_server_url: Url,
    certificate_url: Option<Url>,
    config: ClientConfig,
}

impl LicenseServerClient {
    /// Create a client from validated configuration
    ///
    /// # Arguments
    /// * `config` - URLs, timeout and user agent
    ///
    /// # Errors
    /// Returns error if:
    /// - Configuration fails validation
    /// - User agent is not a valid header value
    /// - HTTP client cannot be built
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let license_server_url = parse_http_url("license_server_url", &config.license_server_url)?;
        let certificate_url = config
            .certificate_url
            .as_deref()
            .map(|u| parse_http_url("certificate_url", u))
            .transpose()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| FairPlayError::InvalidInput(format!("Invalid user agent: {}", e)))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            license_server_url,
            certificate_url,
            config,
        })
    }

    pub fn license_server_url(&self) -> &Url {
        &self.license_server_url
    }

    pub fn certificate_url(&self) -> Option<&Url> {
        self.certificate_url.as_ref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

/// Classify a reqwest failure into the session transport taxonomy
fn map_reqwest_error(error: &reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::NetworkUnavailable
    }
}

#[async_trait]
impl LicenseTransport for LicenseServerClient {
    async fn exchange(&self, request: &LicenseRequest) -> std::result::Result<Vec<u8>, TransportError> {
        tracing::debug!(
            url = %self.license_server_url,
            asset_id = %request.identifier,
            spc_len = request.challenge.len(),
            "posting SPC to license server"
        );

        let response = self
            .client
            .post(self.license_server_url.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(request.form_body())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "license server request failed");
                map_reqwest_error(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "license server rejected request");
            return Err(TransportError::ServerRejected {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| map_reqwest_error(&e))?;
        if body.is_empty() {
            return Err(TransportError::NetworkUnavailable);
        }

        tracing::debug!(len = body.len(), "license server responded");
        Ok(body.to_vec())
    }
}

#[async_trait]
impl CertificateSource for LicenseServerClient {
    async fn fetch(&self) -> Result<Certificate> {
        let url = self
            .certificate_url
            .as_ref()
            .ok_or_else(|| FairPlayError::MissingRequiredField("certificate_url".to_string()))?;

        tracing::debug!(url = %url, "downloading application certificate");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            FairPlayError::network_error(
                format!("Certificate download failed: {}", e),
                e.is_timeout() || e.is_connect(),
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FairPlayError::UnexpectedStatusCode {
                status_code: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(FairPlayError::network_error(
                "Certificate server returned an empty body",
                false,
            ));
        }

        Ok(Certificate::new(bytes.to_vec()))
    }
}

// ===== TESTS =====
