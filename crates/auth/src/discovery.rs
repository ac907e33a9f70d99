// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tracing::debug;

use crate::error::AuthError;
use crate::exchange::decode_success;
use crate::issuer::OidcEndpoints;

pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Discovery document URL for `issuer_endpoint`.
pub fn discovery_url(issuer_endpoint: &str) -> String {
    format!("{}{WELL_KNOWN_PATH}", issuer_endpoint.trim_end_matches('/'))
}

/// Fetch the issuer's authorization and token endpoints.
pub async fn discover(
    http: &reqwest::Client,
    issuer_endpoint: &str,
) -> anyhow::Result<OidcEndpoints> {
    let url = discovery_url(issuer_endpoint);
    debug!(%url, "fetching openid configuration");
    let resp = http.get(&url).send().await.map_err(AuthError::Transport)?;
    let endpoints: OidcEndpoints = decode_success(resp).await?;
    Ok(endpoints)
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
