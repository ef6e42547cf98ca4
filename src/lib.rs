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


//! FairPlay Streaming license acquisition
//!
//! When a media pipeline meets an encrypted HLS segment it asks the host for
//! a content key. This crate services those requests:
//!
//! 1. [`license::KeyRequestRouter`] receives the request and deduplicates it
//!    per content identifier
//! 2. A [`license::KeyRequestSession`] fetches the application certificate,
//!    has the platform generate an SPC, posts it to the key server and hands
//!    the CKC back to the platform for the key
//! 3. The key (ephemeral or persistable) is returned to every waiting caller
//!    and the playback status is updated
//!
//! The platform cryptography sits behind [`crypto::SecureChallengeProvider`].

pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod license;
pub mod storage;

pub use config::FairPlayConfig;
pub use error::{FairPlayError, KeyRequestError, Result, TransportError};
pub use license::{KeyRequestRouter, KeyResponse, RouterConfig};
