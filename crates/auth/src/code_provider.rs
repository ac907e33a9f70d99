// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Obtains an authorization code by sending the user through the browser.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use reqwest::Url;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::callback::{CallbackListener, CallbackResponse};
use crate::challenge::Challenge;
use crate::error::AuthError;
use crate::issuer::{Issuer, OidcEndpoints};
use crate::state::StateGenerator;

/// Scopes requested on every authorization.
pub const BASE_SCOPES: [&str; 2] = ["openid", "email"];

/// Opens a URL for the user, typically in their default browser.
pub trait UrlOpener: Send + Sync {
    fn open_url(&self, url: &str) -> anyhow::Result<()>;
}

/// The code returned by the issuer and the redirect URI it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCodeResult {
    pub code: String,
    pub redirect_uri: String,
}

/// Produces an authorization code bound to a PKCE challenge.
pub trait AuthorizationCodeProvider: Send + Sync {
    fn get_code<'a>(
        &'a self,
        challenge: &'a Challenge,
        additional_scopes: &'a [String],
    ) -> BoxFuture<'a, anyhow::Result<AuthorizationCodeResult>>;
}

/// [`AuthorizationCodeProvider`] that redirects back to a loopback listener.
pub struct LocalhostCodeProvider {
    issuer: Issuer,
    endpoints: OidcEndpoints,
    listener: Arc<dyn CallbackListener>,
    opener: Arc<dyn UrlOpener>,
    state: StateGenerator,
}

impl LocalhostCodeProvider {
    pub fn new(
        issuer: Issuer,
        endpoints: OidcEndpoints,
        listener: Arc<dyn CallbackListener>,
        opener: Arc<dyn UrlOpener>,
        state: StateGenerator,
    ) -> Self {
        Self { issuer, endpoints, listener, opener, state }
    }

    async fn run(
        &self,
        challenge: &Challenge,
        additional_scopes: &[String],
    ) -> anyhow::Result<AuthorizationCodeResult> {
        let state = (self.state)();
        let (tx, rx) = oneshot::channel();
        self.listener.await_response(tx, state.clone())?;
        let redirect_uri = self.listener.callback_url();

        let url = build_authorize_url(
            &self.endpoints.authorization_endpoint,
            &self.issuer,
            challenge,
            &redirect_uri,
            &scope_string(additional_scopes),
            &state,
        );
        let url = match url {
            Ok(url) => url,
            Err(e) => {
                self.listener.close();
                return Err(e);
            }
        };

        info!(%url, "starting browser authorization");
        if let Err(e) = self.opener.open_url(url.as_str()) {
            warn!("could not open browser: {e:#}");
            eprintln!("Could not open a browser. Open this URL to continue:\n\n  {url}\n");
        }

        debug!("waiting for authorization callback");
        let outcome = rx.await;
        self.listener.close();

        match outcome {
            Ok(CallbackResponse::Code(code)) => Ok(AuthorizationCodeResult { code, redirect_uri }),
            Ok(CallbackResponse::Error(e)) => Err(e.into()),
            Err(_) => Err(AuthError::ListenerClosed.into()),
        }
    }
}

impl AuthorizationCodeProvider for LocalhostCodeProvider {
    fn get_code<'a>(
        &'a self,
        challenge: &'a Challenge,
        additional_scopes: &'a [String],
    ) -> BoxFuture<'a, anyhow::Result<AuthorizationCodeResult>> {
        Box::pin(self.run(challenge, additional_scopes))
    }
}

/// Base scopes followed by `additional`, space separated.
pub fn scope_string(additional: &[String]) -> String {
    let scopes: Vec<&str> =
        BASE_SCOPES.iter().copied().chain(additional.iter().map(String::as_str)).collect();
    scopes.join(" ")
}

/// Build the authorize URL with its query parameters in a fixed order.
pub fn build_authorize_url(
    authorization_endpoint: &str,
    issuer: &Issuer,
    challenge: &Challenge,
    redirect_uri: &str,
    scope: &str,
    state: &str,
) -> anyhow::Result<Url> {
    let params = [
        ("audience", issuer.audience.as_str()),
        ("client_id", issuer.client_id.as_str()),
        ("code_challenge", challenge.code.as_str()),
        ("code_challenge_method", challenge.method),
        ("redirect_uri", redirect_uri),
        ("response_type", "code"),
        ("scope", scope),
        ("state", state),
    ];
    Url::parse_with_params(authorization_endpoint, &params).map_err(|e| {
        anyhow::anyhow!("invalid authorization endpoint {authorization_endpoint:?}: {e}")
    })
}

#[cfg(test)]
#[path = "code_provider_tests.rs"]
mod tests;
