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


//! Shared test doubles for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use fairplay_core::api::{CertificateSource, LicenseRequest, LicenseTransport};
use fairplay_core::crypto::{
    Certificate, ChallengePayload, ContentIdentifier, KeyKind, LicenseResponse, ProviderError,
    ResolvedKey, SecureChallengeProvider,
};
use fairplay_core::error::{FairPlayError, TransportError};
use fairplay_core::license::SessionDeps;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Certificate source that counts fetches and can be made to fail
pub struct CountingCertificates {
    bytes: Option<Vec<u8>>,
    pub calls: AtomicUsize,
}

impl CountingCertificates {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            bytes: Some(b"APP-CERT".to_vec()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            bytes: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CertificateSource for CountingCertificates {
    async fn fetch(&self) -> fairplay_core::Result<Certificate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.bytes {
            Some(bytes) => Ok(Certificate::new(bytes.clone())),
            None => Err(FairPlayError::network_error("certificate host unreachable", true)),
        }
    }
}

/// Provider that emits `SPC:<id>` and resolves the CKC into a key of the requested kind
pub struct EchoProvider {
    pub challenges: AtomicUsize,
    pub resolutions: AtomicUsize,
}

impl EchoProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            challenges: AtomicUsize::new(0),
            resolutions: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SecureChallengeProvider for EchoProvider {
    async fn make_challenge(
        &self,
        _certificate: &Certificate,
        identifier: &ContentIdentifier,
        _kind: KeyKind,
    ) -> Result<ChallengePayload, ProviderError> {
        self.challenges.fetch_add(1, Ordering::SeqCst);
        Ok(ChallengePayload::new(
            [b"SPC:".as_slice(), identifier.as_bytes()].concat(),
        ))
    }

    async fn resolve_key(
        &self,
        response: &LicenseResponse,
        kind: KeyKind,
    ) -> Result<ResolvedKey, ProviderError> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        let bytes = response.as_bytes().to_vec();
        Ok(match kind {
            KeyKind::Ephemeral => ResolvedKey::Ephemeral(bytes),
            KeyKind::Persistable => ResolvedKey::Persistable(bytes),
        })
    }
}

/// Transport answering every exchange with the same body, optionally held at a gate
pub struct ScriptedTransport {
    reply: Result<Vec<u8>, TransportError>,
    gate: Option<Arc<Semaphore>>,
    pub calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn body(body: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(body.as_bytes().to_vec()),
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn error(error: TransportError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn gated(body: &str) -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let transport = Arc::new(Self {
            reply: Ok(body.as_bytes().to_vec()),
            gate: Some(Arc::clone(&gate)),
            calls: AtomicUsize::new(0),
        });
        (transport, gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, calls: usize) {
        while self.calls() < calls {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl LicenseTransport for ScriptedTransport {
    async fn exchange(&self, _request: &LicenseRequest) -> Result<Vec<u8>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }
        self.reply.clone()
    }
}

pub fn deps(
    certificates: Arc<CountingCertificates>,
    provider: Arc<EchoProvider>,
    transport: Arc<ScriptedTransport>,
) -> SessionDeps {
    SessionDeps::new(certificates, provider, transport)
}

pub fn id(text: &str) -> ContentIdentifier {
    ContentIdentifier::new(text.as_bytes().to_vec()).expect("non-empty identifier")
}

/// Provider whose first challenge panics; later calls behave like [`EchoProvider`]
pub struct PanicOnceProvider {
    echo: Arc<EchoProvider>,
    pub challenges: AtomicUsize,
}

impl PanicOnceProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            echo: EchoProvider::new(),
            challenges: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SecureChallengeProvider for PanicOnceProvider {
    async fn make_challenge(
        &self,
        certificate: &Certificate,
        identifier: &ContentIdentifier,
        kind: KeyKind,
    ) -> Result<ChallengePayload, ProviderError> {
        if self.challenges.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("secure element fault");
        }
        self.echo.make_challenge(certificate, identifier, kind).await
    }

    async fn resolve_key(
        &self,
        response: &LicenseResponse,
        kind: KeyKind,
    ) -> Result<ResolvedKey, ProviderError> {
        self.echo.resolve_key(response, kind).await
    }
}
