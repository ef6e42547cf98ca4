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


//! Key request orchestration
//!
//! - [`session`] - per-identifier state machine
//! - [`router`] - pipeline hooks, deduplication, key reuse
//! - [`status`] - playback readiness surface

pub mod router;
pub mod session;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use router::{KeyRequestRouter, KeyRequestTicket, KeyResponse, KeyReusePolicy, RouterConfig};
pub use session::{
    decode_response,
    Completion,
    KeyRequestSession,
    RequestTrigger,
    SessionDeps,
    SessionState,
};
pub use status::{ItemStatus, StatusObserver, StatusSnapshot};
