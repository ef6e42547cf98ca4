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


//! Key request router
//!
//! Entry point for the media pipeline. Each inbound key request (or renewal)
//! is mapped to a [`KeyRequestSession`]; concurrent requests for the same
//! content identifier join the session already in flight instead of starting
//! a second license exchange.
//!
//! # Flow
//! 1. Extract the identifier from the `skd://` locator (reject if absent)
//! 2. Join the in-flight session for that identifier, queue behind it when it
//!    is for the other key kind, or register a new one
//! 3. New sessions run on their own task:
//!    - persistable initial requests may be answered from the key store
//!    - otherwise the session runs the full exchange
//! 4. The outcome is fanned out to every joined ticket and published to the
//!    status observer
//!
//! Dropping a [`KeyRequestTicket`] never aborts the session.
//!
//! # Example
//! ```rust,no_run
//! use fairplay_core::api::{ClientConfig, LicenseServerClient};
//! use fairplay_core::crypto::RecordedChallengeProvider;
//! use fairplay_core::license::{KeyRequestRouter, RouterConfig, SessionDeps};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(LicenseServerClient::new(
//!     ClientConfig::builder()
//!         .license_server_url("https://keys.example.com/ckc")
//!         .certificate_url("https://keys.example.com/app.cer")
//!         .build(),
//! )?);
//! let provider = Arc::new(RecordedChallengeProvider::new(std::fs::read("spc.bin")?));
//! let router = KeyRequestRouter::new(
//!     SessionDeps::new(client.clone(), provider, client),
//!     RouterConfig::default(),
//! );
//!
//! let ticket = router.handle_key_request("skd://asset-42", false);
//! assert!(ticket.accepted);
//! let response = ticket.wait().await?;
//! println!("{} bytes, {}", response.data.len(), response.content_type);
//! # Ok(())
//! # }
//! ```

use crate::api::certificate::{CachedCertificateSource, CertificateSource};
use crate::crypto::key::{fingerprint, ContentIdentifier, KeyKind, ResolvedKey};
use crate::error::{KeyRequestError, KeyRequestResult};
use crate::license::session::{KeyRequestSession, RequestTrigger, SessionDeps};
use crate::license::status::{StatusObserver, StatusSnapshot};
use crate::storage::keys::PersistedKeyStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

/// Whether a stored persistable key may answer a request without an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyReusePolicy {
    /// Answer initial persistable requests from the store when possible
    #[default]
    ReusePersisted,
    /// Always exchange; the store is still written
    AlwaysExchange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub key_reuse: KeyReusePolicy,
}

/// Key in the shape the pipeline consumes
#[derive(Clone, PartialEq, Eq)]
pub struct KeyResponse {
    pub data: Vec<u8>,
    /// Content type marker for the pipeline's content information request
    pub content_type: &'static str,
    /// Answered from the persisted key store rather than an exchange
    pub from_store: bool,
}

impl KeyResponse {
    fn from_key(key: ResolvedKey, from_store: bool) -> Self {
        let content_type = key.content_type();
        Self {
            data: key.into_bytes(),
            content_type,
            from_store,
        }
    }
}

impl fmt::Debug for KeyResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyResponse")
            .field("len", &self.data.len())
            .field("fingerprint", &fingerprint(&self.data))
            .field("content_type", &self.content_type)
            .field("from_store", &self.from_store)
            .finish()
    }
}

type Outcome = KeyRequestResult<KeyResponse>;

enum Pending {
    Ready(Outcome),
    Waiting(watch::Receiver<Option<Outcome>>),
}

/// Handle returned to the pipeline for one key request
pub struct KeyRequestTicket {
    /// Whether the request will be serviced; false only when no identifier
    /// could be read, in which case `wait` yields `NoIdentifier`
    pub accepted: bool,
    /// Whether this request joined a session that was already in flight
    pub joined: bool,
    identifier: Option<ContentIdentifier>,
    pending: Pending,
}

impl KeyRequestTicket {
    fn rejected(error: KeyRequestError) -> Self {
        Self {
            accepted: false,
            joined: false,
            identifier: None,
            pending: Pending::Ready(Err(error)),
        }
    }

    pub fn identifier(&self) -> Option<&ContentIdentifier> {
        self.identifier.as_ref()
    }

    /// Wait for the session outcome
    ///
    /// Every ticket joined to the same session receives the same outcome.
    pub async fn wait(self) -> KeyRequestResult<KeyResponse> {
        match self.pending {
            Pending::Ready(outcome) => outcome,
            Pending::Waiting(mut rx) => match rx.wait_for(|outcome| outcome.is_some()).await {
                Ok(outcome) => outcome.clone().unwrap_or(Err(KeyRequestError::Cancelled)),
                // Session task went away without publishing (runtime shutdown)
                Err(_) => Err(KeyRequestError::Cancelled),
            },
        }
    }
}

impl fmt::Debug for KeyRequestTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRequestTicket")
            .field("accepted", &self.accepted)
            .field("joined", &self.joined)
            .field("identifier", &self.identifier)
            .finish()
    }
}

/// In-flight table entry
struct InFlight {
    session_id: Uuid,
    kind: KeyKind,
    trigger: RequestTrigger,
    outcome: watch::Receiver<Option<Outcome>>,
    cancel: Option<oneshot::Sender<()>>,
}

struct RouterInner {
    deps: SessionDeps,
    config: RouterConfig,
    store: Option<PersistedKeyStore>,
    sessions: Mutex<HashMap<ContentIdentifier, InFlight>>,
    status: StatusObserver,
    runtime: Handle,
}

/// Routes pipeline key requests to deduplicated sessions
///
/// Cheap to clone; clones share the same table, certificate cache and
/// status surface.
#[derive(Clone)]
pub struct KeyRequestRouter {
    inner: Arc<RouterInner>,
}

impl KeyRequestRouter {
    /// Router without a persisted key store
    ///
    /// The certificate source is wrapped in a cache owned by the router.
    /// Sessions are spawned on the runtime current at construction.
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn new(deps: SessionDeps, config: RouterConfig) -> Self {
        Self::with_runtime(deps, config, None, Handle::current())
    }

    /// Router that persists (and, per policy, reuses) persistable keys
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn with_store(deps: SessionDeps, config: RouterConfig, store: PersistedKeyStore) -> Self {
        Self::with_runtime(deps, config, Some(store), Handle::current())
    }

    /// Router spawning its sessions on `runtime`
    ///
    /// The hooks of a router built this way may be called from any thread,
    /// including host threads outside the runtime.
    pub fn with_runtime(
        mut deps: SessionDeps,
        config: RouterConfig,
        store: Option<PersistedKeyStore>,
        runtime: Handle,
    ) -> Self {
        let cached: Arc<dyn CertificateSource> =
            Arc::new(CachedCertificateSource::new(deps.certificates));
        deps.certificates = cached;

        Self {
            inner: Arc::new(RouterInner {
                deps,
                config,
                store,
                sessions: Mutex::new(HashMap::new()),
                status: StatusObserver::new(),
                runtime,
            }),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    pub fn store(&self) -> Option<&PersistedKeyStore> {
        self.inner.store.as_ref()
    }

    /// Inbound key request hook
    ///
    /// # Arguments
    /// * `locator` - Key URL from the playlist, e.g. `skd://asset-42`
    /// * `persistable` - Whether the pipeline requires a persistable key
    ///
    /// Malformed locators are rejected immediately (`accepted == false`)
    /// without any network activity.
    pub fn handle_key_request(&self, locator: &str, persistable: bool) -> KeyRequestTicket {
        match ContentIdentifier::from_locator(locator) {
            Ok(identifier) => self.request(
                identifier,
                KeyKind::from_persistable(persistable),
                RequestTrigger::Initial,
            ),
            Err(error) => {
                tracing::warn!(locator, "key request without a content identifier");
                self.inner.status.publish(StatusSnapshot::failed(None, error.clone()));
                KeyRequestTicket::rejected(error)
            }
        }
    }

    /// Renewal hook; always performs a fresh exchange
    pub fn handle_renewal(&self, identifier: ContentIdentifier, persistable: bool) -> KeyRequestTicket {
        self.request(
            identifier,
            KeyKind::from_persistable(persistable),
            RequestTrigger::Renewal,
        )
    }

    /// Join or start the session for `identifier`
    ///
    /// The table is keyed by identifier. A request that arrives while a
    /// session of the same key kind is in flight joins it, whatever its
    /// trigger. A request for the other kind waits for that session to
    /// finish and then starts (or joins) its own.
    pub fn request(
        &self,
        identifier: ContentIdentifier,
        kind: KeyKind,
        trigger: RequestTrigger,
    ) -> KeyRequestTicket {
        let mut sessions = self.inner.lock_sessions();

        if let Some(existing) = sessions.get(&identifier).filter(|e| e.kind != kind) {
            tracing::debug!(
                asset_id = %identifier,
                session_id = %existing.session_id,
                running = ?existing.kind,
                requested = ?kind,
                "key kind differs from in-flight session, queueing behind it"
            );
            let running = existing.outcome.clone();
            drop(sessions);
            return self.queue_after(running, identifier, kind, trigger);
        }

        if let Some(existing) = sessions.get(&identifier) {
            tracing::debug!(
                asset_id = %identifier,
                session_id = %existing.session_id,
                existing_trigger = %existing.trigger,
                %trigger,
                "joining in-flight key request"
            );
            return KeyRequestTicket {
                accepted: true,
                joined: true,
                identifier: Some(identifier),
                pending: Pending::Waiting(existing.outcome.clone()),
            };
        }

        let session_id = Uuid::new_v4();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        sessions.insert(
            identifier.clone(),
            InFlight {
                session_id,
                kind,
                trigger,
                outcome: outcome_rx.clone(),
                cancel: Some(cancel_tx),
            },
        );
        drop(sessions);

        let inner = Arc::clone(&self.inner);
        let task_identifier = identifier.clone();
        let session = self.inner.runtime.spawn(async move {
            inner
                .service(session_id, &task_identifier, kind, trigger, cancel_rx)
                .await
        });

        // Completion lives outside the session task; a panic there still
        // retires the entry and resolves every ticket
        let inner = Arc::clone(&self.inner);
        let task_identifier = identifier.clone();
        self.inner.runtime.spawn(async move {
            let outcome = match session.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    tracing::error!(asset_id = %task_identifier, %session_id, "key request session panicked");
                    Err(KeyRequestError::KeyResolutionFailed(
                        "key request session panicked".to_string(),
                    ))
                }
                Err(_) => Err(KeyRequestError::Cancelled),
            };
            inner.complete(session_id, &task_identifier, outcome, outcome_tx);
        });

        KeyRequestTicket {
            accepted: true,
            joined: false,
            identifier: Some(identifier),
            pending: Pending::Waiting(outcome_rx),
        }
    }

    /// Ticket for a request that must wait out a session of the other kind
    fn queue_after(
        &self,
        mut running: watch::Receiver<Option<Outcome>>,
        identifier: ContentIdentifier,
        kind: KeyKind,
        trigger: RequestTrigger,
    ) -> KeyRequestTicket {
        let (tx, rx) = watch::channel(None);
        let router = self.clone();
        let task_identifier = identifier.clone();
        self.inner.runtime.spawn(async move {
            // Any outcome (or a vanished sender) frees the identifier
            let _ = running.wait_for(|outcome| outcome.is_some()).await;
            let outcome = router.request(task_identifier, kind, trigger).wait().await;
            tx.send_replace(Some(outcome));
        });

        KeyRequestTicket {
            accepted: true,
            joined: false,
            identifier: Some(identifier),
            pending: Pending::Waiting(rx),
        }
    }

    /// Signal the in-flight session for `identifier` to stop
    ///
    /// Returns false if nothing was in flight or it was already signalled.
    /// The session finishes its current step and completes with `Cancelled`.
    pub fn cancel(&self, identifier: &ContentIdentifier) -> bool {
        let mut sessions = self.inner.lock_sessions();
        let signalled = sessions
            .get_mut(identifier)
            .and_then(|entry| entry.cancel.take())
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false);

        if signalled {
            tracing::info!(asset_id = %identifier, "key request cancelled");
        }
        signalled
    }

    /// Number of sessions in flight
    pub fn in_flight(&self) -> usize {
        self.inner.lock_sessions().len()
    }

    pub fn is_in_flight(&self, identifier: &ContentIdentifier) -> bool {
        self.inner.lock_sessions().contains_key(identifier)
    }

    /// Drop the cached certificate and cancel everything in flight
    ///
    /// Cancelled sessions drain in the background and report `Cancelled` to
    /// their tickets. Requests made after `reset` start new sessions.
    /// Returns the number of sessions signalled.
    pub fn reset(&self) -> usize {
        self.inner.deps.certificates.invalidate();

        let drained: Vec<_> = self.inner.lock_sessions().drain().collect();
        let count = drained
            .into_iter()
            .filter_map(|(_, mut entry)| entry.cancel.take())
            .filter(|tx| !tx.is_closed())
            .map(|tx| tx.send(()))
            .filter(|sent| sent.is_ok())
            .count();

        tracing::info!(cancelled = count, "key request router reset");
        count
    }

    /// Observe playback readiness
    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.inner.status.subscribe()
    }

    pub fn current_status(&self) -> StatusSnapshot {
        self.inner.status.current()
    }
}

impl fmt::Debug for KeyRequestRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRequestRouter")
            .field("config", &self.inner.config)
            .field("in_flight", &self.in_flight())
            .field("has_store", &self.inner.store.is_some())
            .finish()
    }
}

impl RouterInner {
    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<ContentIdentifier, InFlight>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn service(
        &self,
        session_id: Uuid,
        identifier: &ContentIdentifier,
        kind: KeyKind,
        trigger: RequestTrigger,
        cancel: oneshot::Receiver<()>,
    ) -> Outcome {
        if let Some(key) = self.lookup_persisted(identifier, kind, trigger).await {
            tracing::info!(
                asset_id = %identifier,
                fingerprint = %key.fingerprint(),
                "answered key request from persisted key store"
            );
            return Ok(KeyResponse::from_key(key, true));
        }

        let mut session = KeyRequestSession::new(identifier.clone(), kind, trigger, self.deps.clone())
            .with_id(session_id);
        let key = session.run(Some(cancel)).await?;

        if key.is_persistable() {
            self.remember(identifier, &key).await;
        }

        Ok(KeyResponse::from_key(key, false))
    }

    async fn lookup_persisted(
        &self,
        identifier: &ContentIdentifier,
        kind: KeyKind,
        trigger: RequestTrigger,
    ) -> Option<ResolvedKey> {
        if !kind.is_persistable()
            || trigger == RequestTrigger::Renewal
            || self.config.key_reuse == KeyReusePolicy::AlwaysExchange
        {
            return None;
        }

        let store = self.store.as_ref()?;
        match store.load(identifier).await {
            Ok(record) => record.map(|r| ResolvedKey::Persistable(r.key_data)),
            Err(e) => {
                tracing::warn!(
                    asset_id = %identifier,
                    error = %e,
                    "persisted key lookup failed, falling back to license exchange"
                );
                None
            }
        }
    }

    async fn remember(&self, identifier: &ContentIdentifier, key: &ResolvedKey) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(e) = store.store(identifier, key.as_bytes()).await {
            tracing::warn!(asset_id = %identifier, error = %e, "failed to persist content key");
        }
    }

    /// Retire the table entry (if still ours), then fan out the outcome
    fn complete(
        &self,
        session_id: Uuid,
        identifier: &ContentIdentifier,
        outcome: Outcome,
        outcome_tx: watch::Sender<Option<Outcome>>,
    ) {
        {
            let mut sessions = self.lock_sessions();
            if sessions
                .get(identifier)
                .map(|entry| entry.session_id == session_id)
                .unwrap_or(false)
            {
                sessions.remove(identifier);
            }
        }

        let snapshot = match &outcome {
            Ok(_) => StatusSnapshot::ready(identifier),
            Err(e) => StatusSnapshot::failed(Some(identifier), e.clone()),
        };
        self.status.publish(snapshot);

        outcome_tx.send_replace(Some(outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::status::ItemStatus;
    use crate::license::testing::{FakeCertificates, FakeProvider, FakeTransport};
    use std::sync::atomic::Ordering;

    fn id(text: &str) -> ContentIdentifier {
        ContentIdentifier::new(text.as_bytes().to_vec()).unwrap()
    }

    fn router_with(
        certificates: Arc<FakeCertificates>,
        transport: Arc<FakeTransport>,
    ) -> KeyRequestRouter {
        KeyRequestRouter::new(
            SessionDeps::new(certificates, Arc::new(FakeProvider::new()), transport),
            RouterConfig::default(),
        )
    }

    async fn wait_for_calls(transport: &FakeTransport, calls: usize) {
        while transport.calls.load(Ordering::SeqCst) < calls {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_duplicate_requests_join() {
        let (transport, gate) = FakeTransport::gated(b"Q0tD");
        let transport = Arc::new(transport);
        let router = router_with(Arc::new(FakeCertificates::ok(b"CERT")), transport.clone());

        let first = router.handle_key_request("skd://asset-42", false);
        let second = router.handle_key_request("skd://asset-42", false);
        assert!(!first.joined);
        assert!(second.joined);
        assert_eq!(router.in_flight(), 1);

        gate.add_permits(1);
        let (a, b) = tokio::join!(first.wait(), second.wait());

        assert_eq!(a, b);
        assert_eq!(a.unwrap().data, b"CKC");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(router.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_identifiers_run_separately() {
        let transport = Arc::new(FakeTransport::replying(b"Q0tD"));
        let router = router_with(Arc::new(FakeCertificates::ok(b"CERT")), transport.clone());

        let a = router.handle_key_request("skd://asset-1", false);
        let b = router.handle_key_request("skd://asset-2", false);
        assert!(!b.joined);

        assert!(a.wait().await.is_ok());
        assert!(b.wait().await.is_ok());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_certificate_cached_across_sessions() {
        let certificates = Arc::new(FakeCertificates::ok(b"CERT"));
        let router = router_with(certificates.clone(), Arc::new(FakeTransport::replying(b"Q0tD")));

        router.handle_key_request("skd://asset-1", false).wait().await.unwrap();
        router.handle_key_request("skd://asset-2", false).wait().await.unwrap();
        assert_eq!(certificates.calls.load(Ordering::SeqCst), 1);

        router.reset();
        router.handle_key_request("skd://asset-3", false).wait().await.unwrap();
        assert_eq!(certificates.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_malformed_locator_is_rejected() {
        let transport = Arc::new(FakeTransport::replying(b"Q0tD"));
        let router = router_with(Arc::new(FakeCertificates::ok(b"CERT")), transport.clone());

        let ticket = router.handle_key_request("skd:asset-42", false);
        assert!(!ticket.accepted);
        assert!(ticket.identifier().is_none());
        assert_eq!(ticket.wait().await, Err(KeyRequestError::NoIdentifier));
        assert_eq!(router.current_status().status, ItemStatus::Failed);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_in_flight_session() {
        let (transport, gate) = FakeTransport::gated(b"Q0tD");
        let transport = Arc::new(transport);
        let router = router_with(Arc::new(FakeCertificates::ok(b"CERT")), transport.clone());

        let ticket = router.handle_key_request("skd://asset-42", false);
        wait_for_calls(&transport, 1).await;

        assert!(router.cancel(&id("asset-42")));
        assert!(!router.cancel(&id("asset-42")));
        gate.add_permits(1);

        assert_eq!(ticket.wait().await, Err(KeyRequestError::Cancelled));
        assert!(!router.is_in_flight(&id("asset-42")));
        assert_eq!(
            router.current_status().error,
            Some(KeyRequestError::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_cancel_unknown_identifier() {
        let router = router_with(
            Arc::new(FakeCertificates::ok(b"CERT")),
            Arc::new(FakeTransport::replying(b"Q0tD")),
        );
        assert!(!router.cancel(&id("asset-42")));
    }

    #[tokio::test]
    async fn test_reset_cancels_and_clears_table() {
        let (transport, gate) = FakeTransport::gated(b"Q0tD");
        let transport = Arc::new(transport);
        let router = router_with(Arc::new(FakeCertificates::ok(b"CERT")), transport.clone());

        let a = router.handle_key_request("skd://asset-1", false);
        let b = router.handle_key_request("skd://asset-2", false);
        wait_for_calls(&transport, 2).await;

        assert_eq!(router.reset(), 2);
        assert_eq!(router.in_flight(), 0);

        // A new request after reset starts a new session
        let c = router.handle_key_request("skd://asset-1", false);
        assert!(!c.joined);

        gate.add_permits(3);
        assert_eq!(a.wait().await, Err(KeyRequestError::Cancelled));
        assert_eq!(b.wait().await, Err(KeyRequestError::Cancelled));
        assert!(c.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_ticket_still_completes() {
        let transport = Arc::new(FakeTransport::replying(b"Q0tD"));
        let router = router_with(Arc::new(FakeCertificates::ok(b"CERT")), transport.clone());
        let mut status = router.subscribe_status();

        drop(router.handle_key_request("skd://asset-42", false));

        status
            .wait_for(|s| s.status == ItemStatus::ReadyToPlay)
            .await
            .unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_router_config_deserializes_policy() {
        let config: RouterConfig = serde_json::from_str(r#"{"key_reuse":"always_exchange"}"#).unwrap();
        assert_eq!(config.key_reuse, KeyReusePolicy::AlwaysExchange);

        let config: RouterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.key_reuse, KeyReusePolicy::ReusePersisted);
    }

    #[test]
    fn test_key_response_debug_hides_bytes() {
        let response = KeyResponse::from_key(ResolvedKey::Persistable(b"SECRET".to_vec()), false);
        assert!(!format!("{:?}", response).contains("SECRET"));
    }
}
