// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Tokens obtained from the issuer; the unit stored in the cache.
///
/// Any field may be empty depending on the grant and requested scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResult {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Lifetime in seconds as reported by the issuer.
    #[serde(default)]
    pub expires_in: u64,
}
