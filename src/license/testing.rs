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


//! Counting fakes for session and router unit tests

use crate::api::certificate::CertificateSource;
use crate::api::transport::{LicenseRequest, LicenseTransport};
use crate::crypto::key::{Certificate, ChallengePayload, ContentIdentifier, KeyKind, LicenseResponse, ResolvedKey};
use crate::crypto::provider::{ProviderError, SecureChallengeProvider};
use crate::error::{FairPlayError, Result, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub struct FakeCertificates {
    result: std::result::Result<Vec<u8>, String>,
    pub calls: AtomicUsize,
}

impl FakeCertificates {
    pub fn ok(bytes: &[u8]) -> Self {
        Self {
            result: Ok(bytes.to_vec()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CertificateSource for FakeCertificates {
    async fn fetch(&self) -> Result<Certificate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(bytes) => Ok(Certificate::new(bytes.clone())),
            Err(reason) => Err(FairPlayError::network_error(reason.clone(), false)),
        }
    }
}

/// Provider returning a fixed SPC and, by default, the CKC itself as the key
pub struct FakeProvider {
    challenge: std::result::Result<Vec<u8>, String>,
    key: Option<std::result::Result<Vec<u8>, String>>,
    pub challenge_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            challenge: Ok(b"SPC".to_vec()),
            key: None,
            challenge_calls: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_challenge(reason: &str) -> Self {
        Self {
            challenge: Err(reason.to_string()),
            ..Self::new()
        }
    }

    pub fn failing_resolve(reason: &str) -> Self {
        Self {
            key: Some(Err(reason.to_string())),
            ..Self::new()
        }
    }

    pub fn with_challenge(mut self, spc: &[u8]) -> Self {
        self.challenge = Ok(spc.to_vec());
        self
    }

    pub fn with_key(mut self, key: &[u8]) -> Self {
        self.key = Some(Ok(key.to_vec()));
        self
    }
}

#[async_trait]
impl SecureChallengeProvider for FakeProvider {
    async fn make_challenge(
        &self,
        _certificate: &Certificate,
        _identifier: &ContentIdentifier,
        _kind: KeyKind,
    ) -> std::result::Result<ChallengePayload, ProviderError> {
        self.challenge_calls.fetch_add(1, Ordering::SeqCst);
        self.challenge
            .clone()
            .map(ChallengePayload::new)
            .map_err(ProviderError::new)
    }

    async fn resolve_key(
        &self,
        response: &LicenseResponse,
        kind: KeyKind,
    ) -> std::result::Result<ResolvedKey, ProviderError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let bytes = match &self.key {
            None => response.as_bytes().to_vec(),
            Some(Ok(key)) => key.clone(),
            Some(Err(reason)) => return Err(ProviderError::new(reason.clone())),
        };
        Ok(match kind {
            KeyKind::Ephemeral => ResolvedKey::Ephemeral(bytes),
            KeyKind::Persistable => ResolvedKey::Persistable(bytes),
        })
    }
}

/// Transport with a fixed reply and an optional gate that holds every exchange
pub struct FakeTransport {
    reply: std::result::Result<Vec<u8>, TransportError>,
    gate: Option<Arc<Semaphore>>,
    requests: Mutex<Vec<(String, Vec<u8>)>>,
    pub calls: AtomicUsize,
}

impl FakeTransport {
    pub fn replying(body: &[u8]) -> Self {
        Self {
            reply: Ok(body.to_vec()),
            gate: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: TransportError) -> Self {
        Self {
            reply: Err(error),
            ..Self::replying(b"")
        }
    }

    /// Exchanges wait until the returned semaphore is given permits
    pub fn gated(body: &[u8]) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let transport = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::replying(body)
        };
        (transport, gate)
    }

    /// (asset id, SPC) pairs in call order
    pub fn requests(&self) -> Vec<(String, Vec<u8>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LicenseTransport for FakeTransport {
    async fn exchange(&self, request: &LicenseRequest) -> std::result::Result<Vec<u8>, TransportError> {
        self.requests.lock().unwrap().push((
            request.identifier.to_text(),
            request.challenge.as_bytes().to_vec(),
        ));
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        self.reply.clone()
    }
}
