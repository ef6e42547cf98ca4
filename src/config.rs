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


//! File configuration
//!
//! A JSON document tying together the HTTP client, transport hardening,
//! router policy and key store. Every field has a default; only the license
//! server URL is required before a client can be built.
//!
//! ```json
//! {
//!   "license_server": {
//!     "url": "https://keys.example.com/ckc",
//!     "certificate_url": "https://keys.example.com/app.cer",
//!     "timeout_secs": 30
//!   },
//!   "transport": { "exchange_timeout_secs": 10, "max_retries": 2, "initial_backoff_ms": 500 },
//!   "router": { "key_reuse": "reuse_persisted" },
//!   "storage": { "database_path": "/var/lib/fairplay/keys.db" }
//! }
//! ```
//!
//! Environment overrides (applied after the file):
//! - `FAIRPLAY_LICENSE_SERVER_URL`
//! - `FAIRPLAY_CERTIFICATE_URL`
//! - `FAIRPLAY_DATABASE_PATH`

use crate::api::certificate::{CertificateSource, FileCertificateSource};
use crate::api::client::{ClientConfig, LicenseServerClient, DEFAULT_USER_AGENT};
use crate::api::transport::{LicenseTransport, RetryPolicy, TransportExt};
use crate::error::{FairPlayError, Result};
use crate::license::router::RouterConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const ENV_LICENSE_SERVER_URL: &str = "FAIRPLAY_LICENSE_SERVER_URL";
pub const ENV_CERTIFICATE_URL: &str = "FAIRPLAY_CERTIFICATE_URL";
pub const ENV_DATABASE_PATH: &str = "FAIRPLAY_DATABASE_PATH";

/// Upper bound on configured retries; more than this is almost certainly a typo
const MAX_CONFIGURED_RETRIES: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FairPlayConfig {
    pub license_server: LicenseServerSettings,
    pub transport: TransportSettings,
    pub router: RouterConfig,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseServerSettings {
    pub url: String,
    /// Download the application certificate from here
    pub certificate_url: Option<String>,
    /// Or read it from a bundled file (takes precedence over the URL)
    pub certificate_path: Option<PathBuf>,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for LicenseServerSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            certificate_url: None,
            certificate_path: None,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Opt-in hardening for the license exchange; all off by default
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub exchange_timeout_secs: Option<u64>,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `None` disables the persisted key store
    pub database_path: Option<PathBuf>,
}

impl FairPlayConfig {
    /// Load configuration from a JSON file
    ///
    /// # Errors
    /// - `FileIoError` if the file cannot be read
    /// - `SerdeJsonError` if it is not valid configuration JSON
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FairPlayError::FileIoError(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config = Self::from_json_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply `FAIRPLAY_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(url) = lookup(ENV_LICENSE_SERVER_URL) {
            tracing::info!("Environment override: {}", ENV_LICENSE_SERVER_URL);
            self.license_server.url = url;
        }
        if let Some(url) = lookup(ENV_CERTIFICATE_URL) {
            tracing::info!("Environment override: {}", ENV_CERTIFICATE_URL);
            self.license_server.certificate_url = Some(url);
        }
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            tracing::info!("Environment override: {}", ENV_DATABASE_PATH);
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    /// Validate everything needed to build a client
    pub fn validate(&self) -> Result<()> {
        self.client_config().validate()?;

        if self.license_server.certificate_url.is_none() && self.license_server.certificate_path.is_none() {
            return Err(FairPlayError::MissingRequiredField(
                "license_server.certificate_url or license_server.certificate_path".to_string(),
            ));
        }

        if self.transport.exchange_timeout_secs == Some(0) {
            return Err(FairPlayError::invalid_config(
                "transport.exchange_timeout_secs must be greater than zero",
            ));
        }

        if self.transport.max_retries > MAX_CONFIGURED_RETRIES {
            return Err(FairPlayError::invalid_config(format!(
                "transport.max_retries must be at most {}",
                MAX_CONFIGURED_RETRIES
            )));
        }

        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        let settings = &self.license_server;
        let mut builder = ClientConfig::builder()
            .license_server_url(settings.url.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone());
        if let Some(ref url) = settings.certificate_url {
            builder = builder.certificate_url(url.clone());
        }
        builder.build()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.transport.max_retries,
            Duration::from_millis(self.transport.initial_backoff_ms),
        )
    }

    pub fn router_config(&self) -> RouterConfig {
        self.router
    }

    /// Build the HTTP client and the transport stack configured for it
    ///
    /// Returns the bare client (also usable as a certificate source) and the
    /// transport with timeout and retry layers applied as configured.
    pub fn build_transport(&self) -> Result<(Arc<LicenseServerClient>, Arc<dyn LicenseTransport>)> {
        self.validate()?;
        let client = Arc::new(LicenseServerClient::new(self.client_config())?);

        let transport: Arc<dyn LicenseTransport> = match self.transport.exchange_timeout_secs {
            Some(secs) => Arc::new(
                Arc::clone(&client)
                    .with_timeout(Duration::from_secs(secs))
                    .with_retry(self.retry_policy()),
            ),
            None => Arc::new(Arc::clone(&client).with_retry(self.retry_policy())),
        };

        Ok((client, transport))
    }

    /// Certificate source per configuration: bundled file first, then URL
    pub fn certificate_source(&self, client: Arc<LicenseServerClient>) -> Arc<dyn CertificateSource> {
        match self.license_server.certificate_path {
            Some(ref path) => Arc::new(FileCertificateSource::new(path)),
            None => client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::router::KeyReusePolicy;
    use std::collections::HashMap;

    fn minimal() -> FairPlayConfig {
        FairPlayConfig::from_json_str(
            r#"{
                "license_server": {
                    "url": "https://keys.example.com/ckc",
                    "certificate_url": "https://keys.example.com/app.cer"
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = minimal();
        assert_eq!(config.license_server.timeout_secs, 30);
        assert_eq!(config.transport, TransportSettings::default());
        assert_eq!(config.router.key_reuse, KeyReusePolicy::ReusePersisted);
        assert!(config.storage.database_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_document() {
        let config = FairPlayConfig::from_json_str(
            r#"{
                "license_server": { "url": "https://keys.example.com/ckc", "certificate_path": "app.cer" },
                "transport": { "exchange_timeout_secs": 10, "max_retries": 2, "initial_backoff_ms": 250 },
                "router": { "key_reuse": "always_exchange" },
                "storage": { "database_path": "keys.db" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.router_config().key_reuse, KeyReusePolicy::AlwaysExchange);
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(2, Duration::from_millis(250))
        );
        assert_eq!(config.storage.database_path, Some(PathBuf::from("keys.db")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        assert!(FairPlayConfig::default().validate().unwrap_err().is_configuration_error());

        let mut config = minimal();
        config.license_server.certificate_url = None;
        assert!(matches!(
            config.validate(),
            Err(FairPlayError::MissingRequiredField(_))
        ));

        let mut config = minimal();
        config.transport.exchange_timeout_secs = Some(0);
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.transport.max_retries = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            FairPlayConfig::from_json_str("{ not json"),
            Err(FairPlayError::SerdeJsonError(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_LICENSE_SERVER_URL, "https://other.example.com/ckc"),
            (ENV_DATABASE_PATH, "/tmp/keys.db"),
        ]
        .into_iter()
        .collect();

        let mut config = minimal();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.license_server.url, "https://other.example.com/ckc");
        assert_eq!(
            config.license_server.certificate_url.as_deref(),
            Some("https://keys.example.com/app.cer")
        );
        assert_eq!(config.storage.database_path, Some(PathBuf::from("/tmp/keys.db")));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fairplay.json");
        std::fs::write(&path, r#"{"license_server":{"url":"https://keys.example.com/ckc"}}"#).unwrap();

        let config = FairPlayConfig::from_json_file(&path).unwrap();
        assert_eq!(config.license_server.url, "https://keys.example.com/ckc");

        assert!(matches!(
            FairPlayConfig::from_json_file(dir.path().join("missing.json")),
            Err(FairPlayError::FileIoError(_))
        ));
    }

    #[tokio::test]
    async fn test_build_transport_and_certificate_source() {
        let config = minimal();
        let (client, _transport) = config.build_transport().unwrap();
        assert_eq!(client.license_server_url().path(), "/ckc");

        let mut bundled = minimal();
        bundled.license_server.certificate_path = Some(PathBuf::from("/nonexistent/app.cer"));
        let source = bundled.certificate_source(client);
        assert!(matches!(source.fetch().await, Err(FairPlayError::FileIoError(_))));
    }
}
