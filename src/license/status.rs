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


//! Playback readiness status
//!
//! Mirrors the status property of a player item: every completed key
//! request moves it to `ReadyToPlay` or `Failed`. Observers hold a
//! `watch::Receiver` and see the latest snapshot.

use crate::crypto::key::ContentIdentifier;
use crate::error::KeyRequestError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Unknown,
    ReadyToPlay,
    Failed,
}

/// Latest status published by the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: ItemStatus,
    /// Identifier the status refers to; `None` when no identifier could be read
    pub identifier: Option<String>,
    pub error: Option<KeyRequestError>,
    pub updated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn unknown() -> Self {
        Self {
            status: ItemStatus::Unknown,
            identifier: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn ready(identifier: &ContentIdentifier) -> Self {
        Self {
            status: ItemStatus::ReadyToPlay,
            identifier: Some(identifier.to_text()),
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn failed(identifier: Option<&ContentIdentifier>, error: KeyRequestError) -> Self {
        Self {
            status: ItemStatus::Failed,
            identifier: identifier.map(|id| id.to_text()),
            error: Some(error),
            updated_at: Utc::now(),
        }
    }
}

/// Publisher side of the status surface
#[derive(Debug)]
pub struct StatusObserver {
    tx: watch::Sender<StatusSnapshot>,
}

impl StatusObserver {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::unknown());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    /// Publish a snapshot, whether or not anyone is subscribed
    pub fn publish(&self, snapshot: StatusSnapshot) {
        tracing::debug!(status = ?snapshot.status, identifier = ?snapshot.identifier, "item status changed");
        self.tx.send_replace(snapshot);
    }

    pub fn current(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }
}

impl Default for StatusObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_is_unknown() {
        let observer = StatusObserver::new();
        assert_eq!(observer.current().status, ItemStatus::Unknown);
    }

    #[tokio::test]
    async fn test_subscribers_see_latest_snapshot() {
        let observer = StatusObserver::new();
        let mut rx = observer.subscribe();
        let id = ContentIdentifier::new(b"asset-42".to_vec()).unwrap();

        observer.publish(StatusSnapshot::ready(&id));
        rx.changed().await.unwrap();

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.status, ItemStatus::ReadyToPlay);
        assert_eq!(snapshot.identifier.as_deref(), Some("asset-42"));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let observer = StatusObserver::new();
        observer.publish(StatusSnapshot::failed(None, KeyRequestError::NoIdentifier));
        assert_eq!(observer.current().error, Some(KeyRequestError::NoIdentifier));
    }

    #[test]
    fn test_snapshot_serializes_snake_case() {
        let id = ContentIdentifier::new(b"asset-42".to_vec()).unwrap();
        let json = serde_json::to_value(StatusSnapshot::ready(&id)).unwrap();
        assert_eq!(json["status"], "ready_to_play");
    }
}
