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


//! Key exchange data model
//!
//! Everything in here is opaque to the crate. The only inspections made are
//! presence and length checks; bytes are never parsed.
//!
//! # Key Request Locators
//! FairPlay key requests arrive as `skd://` URLs taken from the
//! `#EXT-X-KEY` tag of an HLS playlist. The content identifier is the host
//! component:
//!
//! ```text
//! skd://asset-42            -> asset-42
//! skd://asset-42?kid=7      -> asset-42
//! skd:asset-42              -> (no identifier)
//! ```

use crate::error::{KeyRequestError, KeyRequestResult};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Content type marker the pipeline expects alongside a persistable key
pub const PERSISTENT_CONTENT_KEY_TYPE: &str = "com.apple.streamingkeydelivery.persistentcontentkey";

/// Content type marker for a key usable only in the current playback session
pub const CONTENT_KEY_TYPE: &str = "com.apple.streamingkeydelivery.contentkey";

/// Short SHA-256 fingerprint, safe to log in place of key material
///
/// Returns the first 16 hex characters (8 bytes) of the digest.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..8])
}

// ============================================================================
// CONTENT IDENTIFIER
// ============================================================================

/// Opaque identifier of a protected asset/key
///
/// Always non-empty. Cheap to clone; used as the key of the router's
/// in-flight table.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContentIdentifier(Arc<[u8]>);

impl ContentIdentifier {
    /// Create an identifier from raw bytes
    ///
    /// # Errors
    /// - `NoIdentifier` if `bytes` is empty
    pub fn new(bytes: impl Into<Vec<u8>>) -> KeyRequestResult<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(KeyRequestError::NoIdentifier);
        }
        Ok(Self(Arc::from(bytes)))
    }

    /// Extract the identifier from a key request locator
    ///
    /// The identifier is the host/authority component of the URL, as UTF-8
    /// bytes. Locators that fail to parse, have no host, or have an empty
    /// host yield `NoIdentifier`.
    ///
    /// # Example
    /// ```
    /// use fairplay_core::crypto::ContentIdentifier;
    ///
    /// let id = ContentIdentifier::from_locator("skd://asset-42").unwrap();
    /// assert_eq!(id.as_bytes(), b"asset-42");
    /// assert!(ContentIdentifier::from_locator("skd:asset-42").is_err());
    /// ```
    pub fn from_locator(locator: &str) -> KeyRequestResult<Self> {
        let url = Url::parse(locator.trim()).map_err(|_| KeyRequestError::NoIdentifier)?;
        let host = url.host_str().ok_or(KeyRequestError::NoIdentifier)?;
        Self::new(host.as_bytes().to_vec())
    }

    /// Raw identifier bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Identifier as text, for the `assetId` form field and for logs
    ///
    /// Identifiers extracted from a locator are always valid UTF-8; raw
    /// identifiers are rendered lossily.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentIdentifier({:?})", String::from_utf8_lossy(&self.0))
    }
}

// ============================================================================
// CERTIFICATE
// ============================================================================

/// Application certificate issued by the DRM trust authority
///
/// Shared read-only across sessions. Cloning shares the underlying bytes, so
/// a session's captured copy survives cache invalidation.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate(Arc<[u8]>);

impl Certificate {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("len", &self.0.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

// ============================================================================
// CHALLENGE / RESPONSE
// ============================================================================

/// Server Playback Context (SPC) produced by the secure challenge provider
///
/// Not `Clone`: a challenge is consumed exactly once by the transport step.
#[derive(PartialEq, Eq)]
pub struct ChallengePayload(Vec<u8>);

impl ChallengePayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ChallengePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChallengePayload({} bytes)", self.0.len())
    }
}

/// Content Key Context (CKC) returned by the license server, Base64-decoded
#[derive(Clone, PartialEq, Eq)]
pub struct LicenseResponse(Vec<u8>);

impl LicenseResponse {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for LicenseResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LicenseResponse({} bytes)", self.0.len())
    }
}

// ============================================================================
// RESOLVED KEY
// ============================================================================

/// Which form of key the pipeline asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Usable only for the current playback session
    Ephemeral,
    /// Usable offline, e.g. for downloaded content
    Persistable,
}

impl KeyKind {
    pub fn from_persistable(persistable: bool) -> Self {
        if persistable {
            KeyKind::Persistable
        } else {
            KeyKind::Ephemeral
        }
    }

    pub fn is_persistable(&self) -> bool {
        matches!(self, KeyKind::Persistable)
    }
}

/// Key handed back to the pipeline
///
/// Exactly one is produced per successful session.
#[derive(Clone, PartialEq, Eq)]
pub enum ResolvedKey {
    Ephemeral(Vec<u8>),
    Persistable(Vec<u8>),
}

impl ResolvedKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            ResolvedKey::Ephemeral(_) => KeyKind::Ephemeral,
            ResolvedKey::Persistable(_) => KeyKind::Persistable,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ResolvedKey::Ephemeral(b) | ResolvedKey::Persistable(b) => b,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ResolvedKey::Ephemeral(b) | ResolvedKey::Persistable(b) => b,
        }
    }

    pub fn is_persistable(&self) -> bool {
        matches!(self, ResolvedKey::Persistable(_))
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Content type marker to set on the pipeline's content information request
    pub fn content_type(&self) -> &'static str {
        match self {
            ResolvedKey::Ephemeral(_) => CONTENT_KEY_TYPE,
            ResolvedKey::Persistable(_) => PERSISTENT_CONTENT_KEY_TYPE,
        }
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self.as_bytes())
    }
}

impl fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("kind", &self.kind())
            .field("len", &self.as_bytes().len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_from_skd_locator() {
        let id = ContentIdentifier::from_locator("skd://asset-42").unwrap();
        assert_eq!(id.as_bytes(), b"asset-42");
        assert_eq!(id.to_text(), "asset-42");
    }

    #[test]
    fn test_identifier_ignores_path_and_query() {
        let id = ContentIdentifier::from_locator("skd://asset-42/key?kid=7").unwrap();
        assert_eq!(id.to_text(), "asset-42");
    }

    #[test]
    fn test_identifier_from_https_locator() {
        let id = ContentIdentifier::from_locator("https://keys.example.com/k/1").unwrap();
        assert_eq!(id.to_text(), "keys.example.com");
    }

    #[test]
    fn test_malformed_locators_have_no_identifier() {
        for locator in ["", "   ", "asset-42", "skd:asset-42", "skd://", "not a url"] {
            assert_eq!(
                ContentIdentifier::from_locator(locator),
                Err(KeyRequestError::NoIdentifier),
                "locator {:?}",
                locator
            );
        }
    }

    #[test]
    fn test_empty_identifier_rejected() {
        assert_eq!(
            ContentIdentifier::new(Vec::new()),
            Err(KeyRequestError::NoIdentifier)
        );
    }

    #[test]
    fn test_certificate_clone_shares_bytes() {
        let cert = Certificate::new(b"cert".to_vec());
        let copy = cert.clone();
        drop(cert);
        assert_eq!(copy.as_bytes(), b"cert");
    }

    #[test]
    fn test_resolved_key_content_type() {
        let persistable = ResolvedKey::Persistable(vec![1, 2, 3]);
        assert_eq!(persistable.content_type(), PERSISTENT_CONTENT_KEY_TYPE);
        assert_eq!(persistable.kind(), KeyKind::Persistable);

        let ephemeral = ResolvedKey::Ephemeral(vec![1, 2, 3]);
        assert_eq!(ephemeral.content_type(), CONTENT_KEY_TYPE);
        assert!(!ephemeral.is_persistable());
    }

    #[test]
    fn test_fingerprint_is_short_and_stable() {
        let fp = fingerprint(b"CKC-BYTES");
        assert_eq!(fp.len(), 16);
        assert_eq!(fp, fingerprint(b"CKC-BYTES"));
        assert_ne!(fp, fingerprint(b"other"));
    }

    #[test]
    fn test_debug_never_prints_key_bytes() {
        let key = ResolvedKey::Persistable(b"SECRET".to_vec());
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains("SECRET"));
        assert!(rendered.contains("Persistable"));
    }
}
