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


//! Secure challenge provider capability
//!
//! The SPC/CKC conversion happens inside the platform's trusted execution
//! environment (on Apple platforms, `AVContentKeyRequest` /
//! `AVAssetResourceLoadingRequest`). This crate never performs that
//! cryptography; hosts inject an implementation of
//! [`SecureChallengeProvider`] that forwards to the platform.

use crate::crypto::key::{Certificate, ChallengePayload, ContentIdentifier, KeyKind, LicenseResponse, ResolvedKey};
use async_trait::async_trait;
use thiserror::Error;

/// Reason reported by the platform when a challenge or key operation fails
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ProviderError {
    pub reason: String,
}

impl ProviderError {
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Trusted capability that produces SPCs and unwraps CKCs
///
/// Both operations may suspend (platform completion handlers); the session
/// awaits them without blocking other sessions.
#[async_trait]
pub trait SecureChallengeProvider: Send + Sync {
    /// Produce the opaque challenge for `identifier`
    ///
    /// `kind` tells the platform whether the pipeline requires a persistable
    /// key, which changes the SPC the platform generates.
    async fn make_challenge(
        &self,
        certificate: &Certificate,
        identifier: &ContentIdentifier,
        kind: KeyKind,
    ) -> Result<ChallengePayload, ProviderError>;

    /// Convert the server's CKC into a key the pipeline accepts
    async fn resolve_key(
        &self,
        response: &LicenseResponse,
        kind: KeyKind,
    ) -> Result<ResolvedKey, ProviderError>;
}
