// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PKCE authorization-code flow for kubectl exec credentials.
//!
//! The pieces compose bottom-up:
//!
//! - [`challenge`] and [`state`] mint the per-attempt secrets.
//! - [`callback`] runs the loopback listener that receives the redirect.
//! - [`code_provider`] drives the browser round-trip and returns a code.
//! - [`exchange`] talks to the token endpoint.
//! - [`provider`] turns a code (or a refresh token) into a [`TokenResult`].
//! - [`caching`] decides between cache, refresh and full re-authentication.

pub mod browser;
pub mod cache;
pub mod callback;
pub mod caching;
pub mod challenge;
pub mod code_provider;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod issuer;
pub mod jwt;
pub mod provider;
pub mod state;
pub mod test_support;
pub mod token;

use std::sync::Once;

pub use error::AuthError;
pub use issuer::{Issuer, OidcEndpoints};
pub use token::TokenResult;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
///
/// reqwest is built without a bundled provider, so this must run before the
/// first client is constructed, even for plain HTTP. Only the first call has
/// effect.
pub fn ensure_crypto_provider() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
