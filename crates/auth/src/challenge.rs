// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PKCE (RFC 7636) verifier and challenge generation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// The only challenge method this client speaks.
pub const CHALLENGE_METHOD: &str = "S256";

/// Random bytes drawn for each verifier (encodes to 43 characters).
const VERIFIER_BYTES: usize = 32;

/// A verifier/challenge pair for a single authorization attempt.
///
/// The verifier stays local until the code exchange; only `code` and
/// `method` travel in the authorize URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub verifier: String,
    pub code: String,
    pub method: &'static str,
}

impl Challenge {
    /// Derive the S256 challenge for an existing verifier.
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let code = compute_code_challenge(&verifier);
        Self { verifier, code, method: CHALLENGE_METHOD }
    }
}

/// Produces a fresh challenge per authorization attempt.
pub type Challenger = fn() -> Challenge;

/// Generate a challenge from 32 bytes of thread-local CSPRNG output.
pub fn generate_challenge() -> Challenge {
    Challenge::from_verifier(generate_code_verifier())
}

/// Generate a PKCE code verifier (43-char URL-safe random string).
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute code_challenge = base64url_nopad(sha256(verifier)).
pub fn compute_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

#[cfg(test)]
#[path = "challenge_tests.rs"]
mod tests;
