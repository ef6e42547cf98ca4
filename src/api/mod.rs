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


//! Network side of the key exchange
//!
//! - [`transport`] - license server exchange trait, form encoding, decorators
//! - [`certificate`] - application certificate sources and cache
//! - [`client`] - reqwest-backed implementation of both

pub mod certificate;
pub mod client;
pub mod transport;

// Re-export commonly used types
pub use certificate::{
    CachedCertificateSource,
    CertificateSource,
    FileCertificateSource,
    StaticCertificateSource,
};
pub use client::{ClientConfig, ClientConfigBuilder, LicenseServerClient};
pub use transport::{
    LicenseRequest,
    LicenseTransport,
    RetryPolicy,
    RetryingTransport,
    TimeoutTransport,
    TransportExt,
};
