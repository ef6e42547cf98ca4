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


//! Application certificate sources
//!
//! The certificate identifies the application to the FairPlay trust
//! authority. It is fetched once (network, bundled file, or compiled-in
//! bytes) and shared read-only by every session.
//!
//! [`CachedCertificateSource`] wraps any source:
//! - the first successful fetch is cached until [`invalidate`](CachedCertificateSource::invalidate)
//! - concurrent first fetches are coalesced into one inner fetch
//! - failures are not cached
//!
//! Sessions hold their own clone of the certificate, so invalidating the
//! cache never affects a session that already has one.

use crate::crypto::key::Certificate;
use crate::error::{FairPlayError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Supplies the application certificate
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Fetch the certificate bytes
    async fn fetch(&self) -> Result<Certificate>;

    /// Drop any cached copy; the next fetch goes to the origin
    fn invalidate(&self) {}
}

#[async_trait]
impl<T: CertificateSource + ?Sized> CertificateSource for Arc<T> {
    async fn fetch(&self) -> Result<Certificate> {
        (**self).fetch().await
    }

    fn invalidate(&self) {
        (**self).invalidate()
    }
}

/// Certificate bytes known up front
#[derive(Debug, Clone)]
pub struct StaticCertificateSource {
    certificate: Certificate,
}

impl StaticCertificateSource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            certificate: Certificate::new(bytes),
        }
    }
}

#[async_trait]
impl CertificateSource for StaticCertificateSource {
    async fn fetch(&self) -> Result<Certificate> {
        Ok(self.certificate.clone())
    }
}

/// Certificate bundled with the application as a DER file
#[derive(Debug, Clone)]
pub struct FileCertificateSource {
    path: PathBuf,
}

impl FileCertificateSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CertificateSource for FileCertificateSource {
    async fn fetch(&self) -> Result<Certificate> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            FairPlayError::FileIoError(format!(
                "Failed to read certificate {}: {}",
                self.path.display(),
                e
            ))
        })?;

        if bytes.is_empty() {
            return Err(FairPlayError::invalid_input(format!(
                "Certificate file {} is empty",
                self.path.display()
            )));
        }

        Ok(Certificate::new(bytes))
    }
}

/// Process-scoped cache in front of another source
pub struct CachedCertificateSource<S> {
    inner: S,
    cached: std::sync::RwLock<Option<Certificate>>,
    /// Serialises origin fetches so concurrent misses share one request
    fetch_lock: Mutex<()>,
    /// Bumped by `invalidate` so a fetch racing an invalidation is not cached
    generation: AtomicU64,
}

impl<S: CertificateSource> CachedCertificateSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cached: std::sync::RwLock::new(None),
            fetch_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Cached certificate, if any
    pub fn cached(&self) -> Option<Certificate> {
        self.cached.read().ok().and_then(|c| c.clone())
    }

    pub fn is_cached(&self) -> bool {
        self.cached().is_some()
    }
}

#[async_trait]
impl<S: CertificateSource> CertificateSource for CachedCertificateSource<S> {
    async fn fetch(&self) -> Result<Certificate> {
        if let Some(certificate) = self.cached() {
            return Ok(certificate);
        }

        let _guard = self.fetch_lock.lock().await;

        // Another caller may have filled the cache while we waited
        if let Some(certificate) = self.cached() {
            return Ok(certificate);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let certificate = self.inner.fetch().await?;

        // Compared under the slot lock; `invalidate` bumps under the same lock
        let mut slot = self
            .cached
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.generation.load(Ordering::Acquire) == generation {
            *slot = Some(certificate.clone());
            tracing::debug!(
                len = certificate.len(),
                fingerprint = %certificate.fingerprint(),
                "application certificate cached"
            );
        } else {
            tracing::debug!("certificate fetch raced an invalidation, not caching");
        }
        drop(slot);

        Ok(certificate)
    }

    fn invalidate(&self) {
        {
            let mut slot = self
                .cached
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *slot = None;
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        self.inner.invalidate();
        tracing::debug!("application certificate cache invalidated");
    }
}
