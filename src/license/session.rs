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


//! Key request session
//!
//! One session services one content identifier, start to finish:
//!
//! ```text
//! Idle
//!  -> AwaitingCertificate      certificate source
//!  -> GeneratingChallenge      secure challenge provider (SPC)
//!  -> AwaitingServerResponse   license transport, Base64 decode (CKC)
//!  -> ResolvingKey             secure challenge provider (key)
//!  -> Completed(Success | Failed(error))
//! ```
//!
//! States only move forward. Any failure goes straight to `Completed` with
//! the error that caused it. Initial and renewal requests run the same
//! machine; the [`RequestTrigger`] is carried for logging and policy only.
//!
//! # Cancellation
//! A cancellation signal is checked between steps. A step that has already
//! started (e.g. an outstanding POST) is allowed to finish, then the session
//! completes with `Cancelled`.

use crate::api::certificate::CertificateSource;
use crate::api::transport::{LicenseRequest, LicenseTransport};
use crate::crypto::key::{ContentIdentifier, KeyKind, LicenseResponse, ResolvedKey};
use crate::crypto::provider::SecureChallengeProvider;
use crate::error::{KeyRequestError, KeyRequestResult, TransportError};
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::Instrument;
use uuid::Uuid;

/// What caused the pipeline to ask for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestTrigger {
    /// First request for the key during playback or download
    Initial,
    /// The pipeline asked to renew a key it already holds
    Renewal,
}

impl fmt::Display for RequestTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestTrigger::Initial => f.write_str("initial"),
            RequestTrigger::Renewal => f.write_str("renewal"),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Success,
    Failed(KeyRequestError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingCertificate,
    GeneratingChallenge,
    AwaitingServerResponse,
    ResolvingKey,
    Completed(Completion),
}

impl SessionState {
    fn rank(&self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::AwaitingCertificate => 1,
            SessionState::GeneratingChallenge => 2,
            SessionState::AwaitingServerResponse => 3,
            SessionState::ResolvingKey => 4,
            SessionState::Completed(_) => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingCertificate => "awaiting_certificate",
            SessionState::GeneratingChallenge => "generating_challenge",
            SessionState::AwaitingServerResponse => "awaiting_server_response",
            SessionState::ResolvingKey => "resolving_key",
            SessionState::Completed(Completion::Success) => "completed",
            SessionState::Completed(Completion::Failed(_)) => "failed",
        }
    }
}

/// Collaborators a session talks to
///
/// Shared by every session the router starts.
#[derive(Clone)]
pub struct SessionDeps {
    pub certificates: Arc<dyn CertificateSource>,
    pub provider: Arc<dyn SecureChallengeProvider>,
    pub transport: Arc<dyn LicenseTransport>,
}

impl SessionDeps {
    pub fn new(
        certificates: Arc<dyn CertificateSource>,
        provider: Arc<dyn SecureChallengeProvider>,
        transport: Arc<dyn LicenseTransport>,
    ) -> Self {
        Self {
            certificates,
            provider,
            transport,
        }
    }
}

pub struct KeyRequestSession {
    id: Uuid,
    identifier: Option<ContentIdentifier>,
    kind: KeyKind,
    trigger: RequestTrigger,
    deps: SessionDeps,
    state: SessionState,
    history: Vec<SessionState>,
}

impl KeyRequestSession {
    pub fn new(
        identifier: ContentIdentifier,
        kind: KeyKind,
        trigger: RequestTrigger,
        deps: SessionDeps,
    ) -> Self {
        Self::build(Some(identifier), kind, trigger, deps)
    }

    /// Session for identifier bytes as received; empty bytes fail with `NoIdentifier`
    pub fn from_raw(
        identifier: &[u8],
        kind: KeyKind,
        trigger: RequestTrigger,
        deps: SessionDeps,
    ) -> Self {
        Self::build(ContentIdentifier::new(identifier.to_vec()).ok(), kind, trigger, deps)
    }

    fn build(
        identifier: Option<ContentIdentifier>,
        kind: KeyKind,
        trigger: RequestTrigger,
        deps: SessionDeps,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identifier,
            kind,
            trigger,
            deps,
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
        }
    }

    /// Use a caller-chosen session id (the router's table entry id)
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identifier(&self) -> Option<&ContentIdentifier> {
        self.identifier.as_ref()
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn trigger(&self) -> RequestTrigger {
        self.trigger
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Every state visited so far, starting with `Idle`
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Drive the session to completion
    ///
    /// # Arguments
    /// * `cancel` - Optional cancellation signal, observed between steps
    ///
    /// # Errors
    /// Returns the error that moved the session to `Failed`. Calling `run`
    /// again on a completed session returns the same outcome without doing
    /// any work.
    pub async fn run(
        &mut self,
        mut cancel: Option<oneshot::Receiver<()>>,
    ) -> KeyRequestResult<ResolvedKey> {
        if let SessionState::Completed(Completion::Failed(e)) = &self.state {
            return Err(e.clone());
        }
        if self.state.is_terminal() {
            return Err(KeyRequestError::KeyResolutionFailed(
                "session already delivered its key".to_string(),
            ));
        }

        let asset_id = self
            .identifier
            .as_ref()
            .map(|id| id.to_text())
            .unwrap_or_default();
        let span = tracing::info_span!(
            "key_request",
            session_id = %self.id,
            asset_id = %asset_id,
            trigger = %self.trigger,
            kind = ?self.kind,
        );

        async {
            let result = self.drive(&mut cancel).await;
            match &result {
                Ok(key) => {
                    self.transition(SessionState::Completed(Completion::Success));
                    tracing::info!(fingerprint = %key.fingerprint(), "content key resolved");
                }
                Err(e) => {
                    self.transition(SessionState::Completed(Completion::Failed(e.clone())));
                    tracing::warn!(error = %e, code = e.code(), "key request failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &mut self,
        cancel: &mut Option<oneshot::Receiver<()>>,
    ) -> KeyRequestResult<ResolvedKey> {
        let identifier = self.identifier.clone().ok_or(KeyRequestError::NoIdentifier)?;
        let kind = self.kind;
        let deps = self.deps.clone();

        check_cancelled(cancel)?;
        self.transition(SessionState::AwaitingCertificate);
        let certificate = deps
            .certificates
            .fetch()
            .await
            .map_err(|e| KeyRequestError::CertificateUnavailable(e.to_string()))?;
        if certificate.is_empty() {
            return Err(KeyRequestError::CertificateUnavailable(
                "certificate source returned no bytes".to_string(),
            ));
        }

        check_cancelled(cancel)?;
        self.transition(SessionState::GeneratingChallenge);
        let challenge = deps
            .provider
            .make_challenge(&certificate, &identifier, kind)
            .await
            .map_err(|e| KeyRequestError::ChallengeGenerationFailed(e.reason))?;
        if challenge.is_empty() {
            return Err(KeyRequestError::ChallengeGenerationFailed(
                "provider returned an empty challenge".to_string(),
            ));
        }

        check_cancelled(cancel)?;
        self.transition(SessionState::AwaitingServerResponse);
        let body = deps
            .transport
            .exchange(&LicenseRequest::new(identifier, challenge))
            .await?;
        let response = decode_response(&body)?;

        check_cancelled(cancel)?;
        self.transition(SessionState::ResolvingKey);
        let key = deps
            .provider
            .resolve_key(&response, kind)
            .await
            .map_err(|e| KeyRequestError::KeyResolutionFailed(e.reason))?;
        if key.is_empty() {
            return Err(KeyRequestError::KeyResolutionFailed(
                "provider returned an empty key".to_string(),
            ));
        }
        if key.kind() != kind {
            return Err(KeyRequestError::KeyResolutionFailed(format!(
                "provider returned a {:?} key for a {:?} request",
                key.kind(),
                kind
            )));
        }

        Ok(key)
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            next.rank() > self.state.rank(),
            "session state moved backwards: {} -> {}",
            self.state.name(),
            next.name()
        );
        tracing::debug!(from = self.state.name(), to = next.name(), "session transition");
        self.history.push(next.clone());
        self.state = next;
    }
}

impl fmt::Debug for KeyRequestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRequestSession")
            .field("id", &self.id)
            .field("identifier", &self.identifier)
            .field("kind", &self.kind)
            .field("trigger", &self.trigger)
            .field("state", &self.state.name())
            .finish()
    }
}

fn check_cancelled(cancel: &mut Option<oneshot::Receiver<()>>) -> KeyRequestResult<()> {
    match cancel.as_mut().map(|rx| rx.try_recv()) {
        Some(Ok(())) => Err(KeyRequestError::Cancelled),
        // A dropped sender means nobody can cancel any more
        Some(Err(TryRecvError::Closed)) => {
            *cancel = None;
            Ok(())
        }
        Some(Err(TryRecvError::Empty)) | None => Ok(()),
    }
}

/// Decode the license server body into the CKC
///
/// Surrounding ASCII whitespace (a trailing newline is common) is ignored. A
/// body with nothing else in it counts as no data from the server.
pub fn decode_response(body: &[u8]) -> KeyRequestResult<LicenseResponse> {
    let start = body.iter().position(|b| !b.is_ascii_whitespace());
    let end = body.iter().rposition(|b| !b.is_ascii_whitespace());
    let trimmed = match (start, end) {
        (Some(start), Some(end)) => &body[start..=end],
        _ => return Err(KeyRequestError::Transport(TransportError::NetworkUnavailable)),
    };

    let decoded = general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| KeyRequestError::CannotDecodeResponse(e.to_string()))?;
    if decoded.is_empty() {
        return Err(KeyRequestError::CannotDecodeResponse(
            "response decoded to zero bytes".to_string(),
        ));
    }

    Ok(LicenseResponse::new(decoded))
}
