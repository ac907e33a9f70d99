// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unverified JWT claim inspection for cache freshness.
//!
//! Nothing here checks a signature. These helpers only decide whether a
//! cached token is still worth handing out; the resource server does the
//! real verification. Never use them to make a trust decision.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

/// JWS `alg` values a token header may name.
const SIGNING_ALGORITHMS: &[&str] = &[
    "none", "HS256", "HS384", "HS512", "RS256", "RS384", "RS512", "PS256", "PS384", "PS512",
    "ES256", "ES384", "ES512", "EdDSA",
];

/// Decode the payload claims of a JWT-shaped token without verifying it.
///
/// Returns `None` unless the token has exactly three segments, the header
/// is a JSON object naming a known `alg`, and the payload is a JSON object.
pub fn peek_claims_unverified(token: &str) -> Option<Map<String, Value>> {
    let mut segments = token.split('.');
    let (header, payload) = (segments.next()?, segments.next()?);
    segments.next()?;
    if segments.next().is_some() {
        return None;
    }

    let alg = decode_object(header)?.get("alg")?.as_str()?.to_owned();
    if !SIGNING_ALGORITHMS.contains(&alg.as_str()) {
        return None;
    }
    decode_object(payload)
}

/// The `exp` claim in seconds since the epoch, if present and numeric.
pub fn peek_expiry_unverified(token: &str) -> Option<f64> {
    peek_claims_unverified(token)?.get("exp")?.as_f64()
}

/// Whether `token` is JWT-shaped and its `exp` lies strictly after `now`.
///
/// A token expiring exactly at `now` is expired. Missing `exp` counts as
/// expired.
pub fn is_unexpired_at(token: &str, now: SystemTime) -> bool {
    let Some(exp) = peek_expiry_unverified(token) else {
        return false;
    };
    let Ok(now) = now.duration_since(UNIX_EPOCH) else {
        return false;
    };
    now.as_secs_f64() < exp
}

/// [`is_unexpired_at`] against the current wall clock.
pub fn is_unexpired(token: &str) -> bool {
    is_unexpired_at(token, SystemTime::now())
}

fn decode_object(segment: &str) -> Option<Map<String, Value>> {
    // Some issuers pad their segments; the no-pad engine rejects that.
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
#[path = "jwt_tests.rs"]
mod tests;
