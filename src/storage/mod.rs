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


//! Database storage for persistable keys
//!
//! # Database Schema
//! - PersistedKeys: one row per content identifier (key bytes, fingerprint,
//!   store time, renewal count)
//!
//! # Usage Example
//! ```no_run
//! use fairplay_core::crypto::ContentIdentifier;
//! use fairplay_core::storage::{Database, PersistedKeyStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PersistedKeyStore::new(Database::new("./keys.db").await?);
//!
//! let id = ContentIdentifier::from_locator("skd://asset-42")?;
//! store.store(&id, b"persistable key bytes").await?;
//! assert!(store.load(&id).await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod keys;
pub mod migrations;

// Re-export commonly used types
pub use database::Database;
pub use keys::{PersistedKeyRecord, PersistedKeyStore, PersistedKeySummary};
