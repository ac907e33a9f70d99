// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token endpoint exchanges: authorization code and refresh token grants.

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::AuthError;
use crate::token::TokenResult;

/// Input to the `authorization_code` grant.
#[derive(Debug, Clone)]
pub struct AuthorizationCodeExchangeRequest {
    pub client_id: String,
    pub code_verifier: String,
    pub code: String,
    pub redirect_uri: String,
}

/// Input to the `refresh_token` grant.
#[derive(Debug, Clone)]
pub struct RefreshTokenExchangeRequest {
    pub client_id: String,
    pub refresh_token: String,
}

/// Performs the two token endpoint grants.
pub trait TokenExchanger: Send + Sync {
    fn exchange_code<'a>(
        &'a self,
        req: &'a AuthorizationCodeExchangeRequest,
    ) -> BoxFuture<'a, anyhow::Result<TokenResult>>;

    fn exchange_refresh_token<'a>(
        &'a self,
        req: &'a RefreshTokenExchangeRequest,
    ) -> BoxFuture<'a, anyhow::Result<TokenResult>>;
}

/// Raw token endpoint response.
#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

impl From<TokenResponse> for TokenResult {
    fn from(r: TokenResponse) -> Self {
        Self {
            access_token: r.access_token.unwrap_or_default(),
            id_token: r.id_token.unwrap_or_default(),
            refresh_token: r.refresh_token.unwrap_or_default(),
            expires_in: r.expires_in.unwrap_or_default(),
        }
    }
}

/// [`TokenExchanger`] that POSTs form-encoded grants to a token endpoint.
pub struct TokenRetriever {
    token_endpoint: String,
    http: reqwest::Client,
}

impl TokenRetriever {
    pub fn new(token_endpoint: impl Into<String>, http: reqwest::Client) -> Self {
        Self { token_endpoint: token_endpoint.into(), http }
    }

    async fn post_grant(
        &self,
        grant: &str,
        fields: &[(&str, &str)],
    ) -> anyhow::Result<TokenResult> {
        debug!(endpoint = %self.token_endpoint, grant, "token request");
        let mut form = Vec::with_capacity(fields.len() + 1);
        form.push(("grant_type", grant));
        form.extend_from_slice(fields);
        let resp = self
            .http
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(AuthError::Transport)?;
        let body: TokenResponse = decode_success(resp).await?;
        Ok(body.into())
    }
}

impl TokenExchanger for TokenRetriever {
    fn exchange_code<'a>(
        &'a self,
        req: &'a AuthorizationCodeExchangeRequest,
    ) -> BoxFuture<'a, anyhow::Result<TokenResult>> {
        Box::pin(async move {
            self.post_grant(
                "authorization_code",
                &[
                    ("client_id", req.client_id.as_str()),
                    ("code_verifier", req.code_verifier.as_str()),
                    ("code", req.code.as_str()),
                    ("redirect_uri", req.redirect_uri.as_str()),
                ],
            )
            .await
        })
    }

    fn exchange_refresh_token<'a>(
        &'a self,
        req: &'a RefreshTokenExchangeRequest,
    ) -> BoxFuture<'a, anyhow::Result<TokenResult>> {
        Box::pin(async move {
            self.post_grant(
                "refresh_token",
                &[
                    ("client_id", req.client_id.as_str()),
                    ("refresh_token", req.refresh_token.as_str()),
                ],
            )
            .await
        })
    }
}

/// Map a non-2xx status to [`AuthError::Status`], otherwise decode the JSON body.
pub(crate) async fn decode_success<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, AuthError> {
    let status = resp.status();
    let body = resp.bytes().await.map_err(AuthError::Transport)?;
    if !status.is_success() {
        debug!(status = status.as_u16(), len = body.len(), "issuer returned an error status");
        return Err(AuthError::Status(status.as_u16()));
    }
    serde_json::from_slice(&body).map_err(AuthError::Decode)
}

#[cfg(test)]
#[path = "exchange_tests.rs"]
mod tests;
