// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Identity of the issuer and the client registered with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuer {
    pub issuer_endpoint: String,
    pub client_id: String,
    pub audience: String,
}

impl Issuer {
    /// Key under which this client's tokens are cached.
    pub fn cache_identifier(&self) -> String {
        format!("{}-{}", self.client_id, self.audience)
    }
}

/// Endpoints resolved from the issuer's discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}
