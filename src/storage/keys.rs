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


//! Persisted key store
//!
//! Persistable keys returned by the platform are stored per content
//! identifier so that offline playback (and repeat requests) can be served
//! without another license exchange. Overwriting an existing key counts as a
//! renewal.
//!
//! Key bytes never leave this module except through [`PersistedKeyStore::load`];
//! listings carry a fingerprint instead.

use crate::crypto::key::{fingerprint, ContentIdentifier};
use crate::error::{FairPlayError, Result};
use crate::storage::database::Database;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row};
use std::fmt;

/// Stored persistable key
#[derive(Clone)]
pub struct PersistedKeyRecord {
    pub identifier: ContentIdentifier,
    pub key_data: Vec<u8>,
    pub fingerprint: String,
    pub stored_at: DateTime<Utc>,
    /// Number of times the key was overwritten after the first store
    pub renewed_count: u32,
}

impl fmt::Debug for PersistedKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedKeyRecord")
            .field("identifier", &self.identifier)
            .field("len", &self.key_data.len())
            .field("fingerprint", &self.fingerprint)
            .field("stored_at", &self.stored_at)
            .field("renewed_count", &self.renewed_count)
            .finish()
    }
}

/// Listing entry; never carries key bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistedKeySummary {
    pub identifier: String,
    pub fingerprint: String,
    pub len: usize,
    pub stored_at: DateTime<Utc>,
    pub renewed_count: u32,
}

/// SQLite-backed store of persistable keys
#[derive(Debug, Clone)]
pub struct PersistedKeyStore {
    db: Database,
}

impl PersistedKeyStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store backed by a fresh in-memory database
    pub async fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::new_in_memory().await?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Load the stored key for `identifier`
    pub async fn load(&self, identifier: &ContentIdentifier) -> Result<Option<PersistedKeyRecord>> {
        let row = sqlx::query(
            "SELECT content_id, key_data, fingerprint, stored_at, renewed_count \
             FROM PersistedKeys WHERE content_id = ?",
        )
        .bind(identifier.as_bytes())
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|r| row_to_record(&r)).transpose()
    }

    /// Insert or overwrite the key for `identifier`
    ///
    /// Overwriting bumps `renewed_count`.
    ///
    /// # Errors
    /// - `InvalidInput` if `key_data` is empty
    pub async fn store(&self, identifier: &ContentIdentifier, key_data: &[u8]) -> Result<()> {
        if key_data.is_empty() {
            return Err(FairPlayError::invalid_input("refusing to persist an empty key"));
        }

        let fp = fingerprint(key_data);
        sqlx::query(
            r#"
            INSERT INTO PersistedKeys (content_id, key_data, fingerprint, stored_at, renewed_count)
            VALUES (?, ?, ?, ?, 0)
            ON CONFLICT(content_id) DO UPDATE SET
                key_data = excluded.key_data,
                fingerprint = excluded.fingerprint,
                stored_at = excluded.stored_at,
                renewed_count = PersistedKeys.renewed_count + 1
            "#,
        )
        .bind(identifier.as_bytes())
        .bind(key_data)
        .bind(&fp)
        .bind(Utc::now().to_rfc3339())
        .execute(self.db.pool())
        .await?;

        tracing::debug!(asset_id = %identifier, fingerprint = %fp, "persisted content key");
        Ok(())
    }

    /// Remove the key for `identifier`; returns whether one existed
    pub async fn forget(&self, identifier: &ContentIdentifier) -> Result<bool> {
        let result = sqlx::query("DELETE FROM PersistedKeys WHERE content_id = ?")
            .bind(identifier.as_bytes())
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All stored keys, most recently stored first
    pub async fn list(&self) -> Result<Vec<PersistedKeySummary>> {
        let rows = sqlx::query(
            "SELECT content_id, key_data, fingerprint, stored_at, renewed_count \
             FROM PersistedKeys ORDER BY stored_at DESC, content_id",
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.iter()
            .map(|row| {
                let record = row_to_record(row)?;
                Ok(PersistedKeySummary {
                    identifier: record.identifier.to_text(),
                    fingerprint: record.fingerprint,
                    len: record.key_data.len(),
                    stored_at: record.stored_at,
                    renewed_count: record.renewed_count,
                })
            })
            .collect()
    }

    /// Remove every stored key; returns how many were removed
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM PersistedKeys")
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM PersistedKeys")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

fn row_to_record(row: &SqliteRow) -> Result<PersistedKeyRecord> {
    let content_id: Vec<u8> = row.try_get("content_id")?;
    let stored_at: String = row.try_get("stored_at")?;
    let renewed_count: i64 = row.try_get("renewed_count")?;

    let identifier = ContentIdentifier::new(content_id)
        .map_err(|_| FairPlayError::internal("persisted key row has an empty content id"))?;
    let stored_at = DateTime::parse_from_rfc3339(&stored_at)
        .map_err(|e| FairPlayError::internal(format!("invalid stored_at '{}': {}", stored_at, e)))?
        .with_timezone(&Utc);

    Ok(PersistedKeyRecord {
        identifier,
        key_data: row.try_get("key_data")?,
        fingerprint: row.try_get("fingerprint")?,
        stored_at,
        renewed_count: u32::try_from(renewed_count).unwrap_or(u32::MAX),
    })
}
