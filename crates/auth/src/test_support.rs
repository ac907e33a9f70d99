// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: unsigned JWTs and recording stubs for each
//! capability trait.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::callback::{CallbackListener, CallbackResponse};
use crate::challenge::Challenge;
use crate::code_provider::{AuthorizationCodeProvider, AuthorizationCodeResult, UrlOpener};
use crate::error::AuthError;
use crate::exchange::{
    AuthorizationCodeExchangeRequest, RefreshTokenExchangeRequest, TokenExchanger,
};
use crate::provider::IssuerTokenProvider;
use crate::token::TokenResult;

/// Unsigned JWT-shaped token carrying `claims` as its payload.
pub fn jwt_with_claims(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({ "alg": "none", "typ": "JWT" }).to_string());
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

pub fn jwt_with_exp(exp: u64) -> String {
    jwt_with_claims(&json!({ "sub": "tester", "exp": exp }))
}

/// Token that expires an hour from now.
pub fn unexpired_jwt() -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    jwt_with_exp(now + 3600)
}

pub fn expired_jwt() -> String {
    jwt_with_exp(1_000)
}

pub fn tokens(access_token: &str, id_token: &str, refresh_token: &str) -> TokenResult {
    TokenResult {
        access_token: access_token.to_owned(),
        id_token: id_token.to_owned(),
        refresh_token: refresh_token.to_owned(),
        expires_in: 3600,
    }
}

/// Listener that answers (or abandons) the flow without any network.
pub struct StubListener {
    url: String,
    response: Mutex<Option<CallbackResponse>>,
    fail_bind: bool,
    states: Mutex<Vec<String>>,
    closes: AtomicU32,
}

impl StubListener {
    fn build(url: &str, response: Option<CallbackResponse>, fail_bind: bool) -> Self {
        Self {
            url: url.to_owned(),
            response: Mutex::new(response),
            fail_bind,
            states: Mutex::new(Vec::new()),
            closes: AtomicU32::new(0),
        }
    }

    /// Delivers `response` as soon as the flow starts waiting.
    pub fn replying(url: &str, response: CallbackResponse) -> Self {
        Self::build(url, Some(response), false)
    }

    /// Drops the sender without a value.
    pub fn abandoning(url: &str) -> Self {
        Self::build(url, None, false)
    }

    /// Fails to start.
    pub fn unbindable(url: &str) -> Self {
        Self::build(url, None, true)
    }

    /// `state` values the listener was asked to enforce.
    pub fn states(&self) -> Vec<String> {
        self.states.lock().clone()
    }

    pub fn close_count(&self) -> u32 {
        self.closes.load(Ordering::Relaxed)
    }
}

impl CallbackListener for StubListener {
    fn callback_url(&self) -> String {
        self.url.clone()
    }

    fn await_response(
        &self,
        response: oneshot::Sender<CallbackResponse>,
        state: String,
    ) -> anyhow::Result<()> {
        self.states.lock().push(state);
        if self.fail_bind {
            anyhow::bail!("address already in use");
        }
        if let Some(outcome) = self.response.lock().take() {
            let _ = response.send(outcome);
        }
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Opener that records URLs instead of launching anything.
#[derive(Default)]
pub struct RecordingOpener {
    urls: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the URL, then reports that no browser could be opened.
    pub fn failing() -> Self {
        Self { urls: Mutex::new(Vec::new()), fail: true }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

impl UrlOpener for RecordingOpener {
    fn open_url(&self, url: &str) -> anyhow::Result<()> {
        self.urls.lock().push(url.to_owned());
        if self.fail {
            anyhow::bail!("no browser available");
        }
        Ok(())
    }
}

/// Code provider returning a fixed code, or a fixed error.
pub struct StubCodeProvider {
    result: Result<AuthorizationCodeResult, fn() -> AuthError>,
    calls: Mutex<Vec<(Challenge, Vec<String>)>>,
}

impl StubCodeProvider {
    pub fn returning(code: &str, redirect_uri: &str) -> Self {
        Self {
            result: Ok(AuthorizationCodeResult {
                code: code.to_owned(),
                redirect_uri: redirect_uri.to_owned(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: fn() -> AuthError) -> Self {
        Self { result: Err(error), calls: Mutex::new(Vec::new()) }
    }

    /// Challenge and additional scopes of every call.
    pub fn calls(&self) -> Vec<(Challenge, Vec<String>)> {
        self.calls.lock().clone()
    }
}

impl AuthorizationCodeProvider for StubCodeProvider {
    fn get_code<'a>(
        &'a self,
        challenge: &'a Challenge,
        additional_scopes: &'a [String],
    ) -> BoxFuture<'a, anyhow::Result<AuthorizationCodeResult>> {
        self.calls.lock().push((challenge.clone(), additional_scopes.to_vec()));
        let result = match &self.result {
            Ok(code) => Ok(code.clone()),
            Err(error) => Err(error().into()),
        };
        Box::pin(async move { result })
    }
}

/// Exchanger that replays queued results and records every request.
#[derive(Default)]
pub struct StubExchanger {
    code_results: Mutex<VecDeque<anyhow::Result<TokenResult>>>,
    refresh_results: Mutex<VecDeque<anyhow::Result<TokenResult>>>,
    code_requests: Mutex<Vec<AuthorizationCodeExchangeRequest>>,
    refresh_requests: Mutex<Vec<RefreshTokenExchangeRequest>>,
}

impl StubExchanger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_code(self, result: anyhow::Result<TokenResult>) -> Self {
        self.code_results.lock().push_back(result);
        self
    }

    pub fn on_refresh(self, result: anyhow::Result<TokenResult>) -> Self {
        self.refresh_results.lock().push_back(result);
        self
    }

    pub fn code_requests(&self) -> Vec<AuthorizationCodeExchangeRequest> {
        self.code_requests.lock().clone()
    }

    pub fn refresh_requests(&self) -> Vec<RefreshTokenExchangeRequest> {
        self.refresh_requests.lock().clone()
    }
}

impl TokenExchanger for StubExchanger {
    fn exchange_code<'a>(
        &'a self,
        req: &'a AuthorizationCodeExchangeRequest,
    ) -> BoxFuture<'a, anyhow::Result<TokenResult>> {
        self.code_requests.lock().push(req.clone());
        let result = self
            .code_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("unexpected code exchange")));
        Box::pin(async move { result })
    }

    fn exchange_refresh_token<'a>(
        &'a self,
        req: &'a RefreshTokenExchangeRequest,
    ) -> BoxFuture<'a, anyhow::Result<TokenResult>> {
        self.refresh_requests.lock().push(req.clone());
        let result = self
            .refresh_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("unexpected refresh exchange")));
        Box::pin(async move { result })
    }
}

/// Issuer provider that replays queued results and counts calls.
#[derive(Default)]
pub struct StubTokenProvider {
    authenticate_results: Mutex<VecDeque<anyhow::Result<TokenResult>>>,
    refresh_results: Mutex<VecDeque<anyhow::Result<TokenResult>>>,
    authenticate_calls: AtomicU32,
    refresh_tokens: Mutex<Vec<String>>,
}

impl StubTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_authenticate(self, result: anyhow::Result<TokenResult>) -> Self {
        self.authenticate_results.lock().push_back(result);
        self
    }

    pub fn on_refresh(self, result: anyhow::Result<TokenResult>) -> Self {
        self.refresh_results.lock().push_back(result);
        self
    }

    pub fn authenticate_calls(&self) -> u32 {
        self.authenticate_calls.load(Ordering::Relaxed)
    }

    /// Refresh tokens passed to `from_refresh_token`, in call order.
    pub fn refresh_tokens(&self) -> Vec<String> {
        self.refresh_tokens.lock().clone()
    }
}

impl IssuerTokenProvider for StubTokenProvider {
    fn authenticate(&self) -> BoxFuture<'_, anyhow::Result<TokenResult>> {
        self.authenticate_calls.fetch_add(1, Ordering::Relaxed);
        let result = self
            .authenticate_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("unexpected authenticate")));
        Box::pin(async move { result })
    }

    fn from_refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<TokenResult>> {
        self.refresh_tokens.lock().push(refresh_token.to_owned());
        let result = self
            .refresh_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("unexpected refresh")));
        Box::pin(async move { result })
    }
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
