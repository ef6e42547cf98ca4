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


//! Key exchange data model and the secure challenge capability
//!
//! # FairPlay Streaming Exchange
//! 1. Pipeline asks for a key for `skd://<content id>`
//! 2. Platform produces an SPC from (application certificate, content id)
//! 3. SPC is posted to the key server, which answers with a CKC
//! 4. Platform turns the CKC into a content key (ephemeral or persistable)
//!
//! Steps 2 and 4 are the [`SecureChallengeProvider`]; this crate only moves
//! the opaque blobs between them.

pub mod key;
pub mod provider;
pub mod recorded;

// Re-export commonly used types
pub use key::{
    fingerprint,
    Certificate,
    ChallengePayload,
    ContentIdentifier,
    KeyKind,
    LicenseResponse,
    ResolvedKey,
    CONTENT_KEY_TYPE,
    PERSISTENT_CONTENT_KEY_TYPE,
};
pub use provider::{ProviderError, SecureChallengeProvider};
pub use recorded::RecordedChallengeProvider;
