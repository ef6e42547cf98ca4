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


//! Replay provider for exercising a license server off-device
//!
//! Replays an SPC captured on a real device and returns the CKC verbatim as
//! an ephemeral key, which is the form the pipeline accepts for
//! non-persistent keys. Persistable keys need the platform and are refused.

use crate::crypto::key::{Certificate, ChallengePayload, ContentIdentifier, KeyKind, LicenseResponse, ResolvedKey};
use crate::crypto::provider::{ProviderError, SecureChallengeProvider};
use crate::error::{FairPlayError, Result};
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RecordedChallengeProvider {
    spc: Vec<u8>,
    /// Identifier the SPC was captured for, if known
    captured_for: Option<ContentIdentifier>,
}

impl RecordedChallengeProvider {
    pub fn new(spc: Vec<u8>) -> Self {
        Self {
            spc,
            captured_for: None,
        }
    }

    /// Load a raw SPC dump from disk
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let spc = tokio::fs::read(path).await.map_err(|e| {
            FairPlayError::FileIoError(format!("Failed to read SPC {}: {}", path.display(), e))
        })?;
        if spc.is_empty() {
            return Err(FairPlayError::invalid_input(format!(
                "SPC file {} is empty",
                path.display()
            )));
        }
        Ok(Self::new(spc))
    }

    /// Only replay the SPC for the identifier it was captured for
    pub fn captured_for(mut self, identifier: ContentIdentifier) -> Self {
        self.captured_for = Some(identifier);
        self
    }
}

#[async_trait]
impl SecureChallengeProvider for RecordedChallengeProvider {
    async fn make_challenge(
        &self,
        _certificate: &Certificate,
        identifier: &ContentIdentifier,
        kind: KeyKind,
    ) -> std::result::Result<ChallengePayload, ProviderError> {
        if kind.is_persistable() {
            return Err(ProviderError::new(
                "recorded challenges cannot produce persistable keys",
            ));
        }
        if let Some(expected) = &self.captured_for {
            if expected != identifier {
                return Err(ProviderError::new(format!(
                    "recorded SPC was captured for {}, not {}",
                    expected, identifier
                )));
            }
        }
        Ok(ChallengePayload::new(self.spc.clone()))
    }

    async fn resolve_key(
        &self,
        response: &LicenseResponse,
        kind: KeyKind,
    ) -> std::result::Result<ResolvedKey, ProviderError> {
        match kind {
            KeyKind::Ephemeral => Ok(ResolvedKey::Ephemeral(response.as_bytes().to_vec())),
            KeyKind::Persistable => Err(ProviderError::new(
                "persistable keys require the platform key session",
            )),
        }
    }
}
