// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use anyhow::Context;
use futures_util::future::BoxFuture;
use tracing::debug;

use crate::callback::CallbackListener;
use crate::challenge::{generate_challenge, Challenger};
use crate::code_provider::{AuthorizationCodeProvider, LocalhostCodeProvider, UrlOpener};
use crate::error::AuthError;
use crate::exchange::{
    AuthorizationCodeExchangeRequest, RefreshTokenExchangeRequest, TokenExchanger, TokenRetriever,
};
use crate::issuer::{Issuer, OidcEndpoints};
use crate::state::generate_state;
use crate::token::TokenResult;

/// Scope requested in addition to the base scopes when refresh is enabled.
pub const OFFLINE_ACCESS_SCOPE: &str = "offline_access";

/// Obtains tokens from an issuer, either interactively or by refresh.
pub trait IssuerTokenProvider: Send + Sync {
    /// Run the full browser flow.
    fn authenticate(&self) -> BoxFuture<'_, anyhow::Result<TokenResult>>;

    /// Trade a refresh token for a fresh set of tokens.
    fn from_refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<TokenResult>>;
}

/// [`IssuerTokenProvider`] composed of a code provider and an exchanger.
pub struct TokenProvider {
    allow_refresh: bool,
    issuer: Issuer,
    code_provider: Arc<dyn AuthorizationCodeProvider>,
    exchanger: Arc<dyn TokenExchanger>,
    challenger: Challenger,
}

impl TokenProvider {
    pub fn new(
        allow_refresh: bool,
        issuer: Issuer,
        code_provider: Arc<dyn AuthorizationCodeProvider>,
        exchanger: Arc<dyn TokenExchanger>,
        challenger: Challenger,
    ) -> Self {
        Self { allow_refresh, issuer, code_provider, exchanger, challenger }
    }

    /// Wire the loopback code provider and the HTTP exchanger for `endpoints`.
    pub fn for_endpoints(
        allow_refresh: bool,
        issuer: Issuer,
        endpoints: OidcEndpoints,
        listener: Arc<dyn CallbackListener>,
        opener: Arc<dyn UrlOpener>,
        http: reqwest::Client,
    ) -> Self {
        let exchanger = Arc::new(TokenRetriever::new(endpoints.token_endpoint.clone(), http));
        let code_provider = Arc::new(LocalhostCodeProvider::new(
            issuer.clone(),
            endpoints,
            listener,
            opener,
            generate_state,
        ));
        Self::new(allow_refresh, issuer, code_provider, exchanger, generate_challenge)
    }

    async fn run_authenticate(&self) -> anyhow::Result<TokenResult> {
        let challenge = (self.challenger)();
        let scopes =
            if self.allow_refresh { vec![OFFLINE_ACCESS_SCOPE.to_owned()] } else { Vec::new() };

        let code = self.code_provider.get_code(&challenge, &scopes).await?;
        debug!("authorization code received, exchanging");

        let req = AuthorizationCodeExchangeRequest {
            client_id: self.issuer.client_id.clone(),
            code_verifier: challenge.verifier,
            code: code.code,
            redirect_uri: code.redirect_uri,
        };
        self.exchanger.exchange_code(&req).await.context("could not exchange code")
    }

    async fn run_refresh(&self, refresh_token: &str) -> anyhow::Result<TokenResult> {
        if !self.allow_refresh {
            return Err(AuthError::RefreshNotAllowed.into());
        }
        let req = RefreshTokenExchangeRequest {
            client_id: self.issuer.client_id.clone(),
            refresh_token: refresh_token.to_owned(),
        };
        self.exchanger.exchange_refresh_token(&req).await
    }
}

impl IssuerTokenProvider for TokenProvider {
    fn authenticate(&self) -> BoxFuture<'_, anyhow::Result<TokenResult>> {
        Box::pin(self.run_authenticate())
    }

    fn from_refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<TokenResult>> {
        Box::pin(self.run_refresh(refresh_token))
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
