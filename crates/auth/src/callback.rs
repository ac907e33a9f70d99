// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loopback listener for the authorization redirect.
//!
//! [`LocalCallbackListener`] serves `GET /callback` on `127.0.0.1` and hands
//! the outcome of the first request to the waiting flow through a oneshot
//! channel. The handler is the only writer and writes at most once.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::AuthError;

/// Path the issuer redirects to.
pub const CALLBACK_PATH: &str = "/callback";

const AUTHORIZED_PAGE: &str = "You've been authorized and may now close this browser page.";
const FAILED_PAGE: &str = "An error occurred. Please check terminal for output.";
const ALREADY_HANDLED_PAGE: &str =
    "This authorization request has already been handled. Please check terminal for output.";

/// Outcome of the redirect: either an authorization code or the reason
/// there is none.
#[derive(Debug)]
pub enum CallbackResponse {
    Code(String),
    Error(AuthError),
}

/// Receives the issuer's redirect for one authorization attempt.
pub trait CallbackListener: Send + Sync {
    /// `http://<address>/callback` for the address the listener serves.
    fn callback_url(&self) -> String;

    /// Start serving and deliver the first callback's outcome to `response`.
    ///
    /// Returns once the listener is bound; the caller awaits the receiver.
    fn await_response(
        &self,
        response: oneshot::Sender<CallbackResponse>,
        state: String,
    ) -> anyhow::Result<()>;

    /// Stop serving. Safe to call repeatedly or before `await_response`.
    fn close(&self);
}

/// [`CallbackListener`] bound to the IPv4 loopback interface.
pub struct LocalCallbackListener {
    addr: Mutex<SocketAddr>,
    shutdown: Mutex<Option<CancellationToken>>,
}

impl LocalCallbackListener {
    /// Listener for `127.0.0.1:<port>`; port `0` picks a free port at bind time.
    pub fn new(port: u16) -> Self {
        Self {
            addr: Mutex::new(SocketAddr::from((Ipv4Addr::LOCALHOST, port))),
            shutdown: Mutex::new(None),
        }
    }
}

impl CallbackListener for LocalCallbackListener {
    fn callback_url(&self) -> String {
        format!("http://{}{CALLBACK_PATH}", *self.addr.lock())
    }

    fn await_response(
        &self,
        response: oneshot::Sender<CallbackResponse>,
        state: String,
    ) -> anyhow::Result<()> {
        let requested = *self.addr.lock();
        let std_listener = std::net::TcpListener::bind(requested)
            .with_context(|| format!("could not listen for the callback on {requested}"))?;
        std_listener.set_nonblocking(true)?;
        let bound = std_listener.local_addr()?;
        let listener = tokio::net::TcpListener::from_std(std_listener)?;
        *self.addr.lock() = bound;

        let token = CancellationToken::new();
        if let Some(previous) = self.shutdown.lock().replace(token.clone()) {
            previous.cancel();
        }

        let router = callback_router(response, state);
        debug!(%bound, "callback listener started");
        tokio::spawn(async move {
            let result =
                axum::serve(listener, router).with_graceful_shutdown(token.cancelled_owned()).await;
            if let Err(e) = result {
                error!("callback server error: {e}");
            }
        });
        Ok(())
    }

    fn close(&self) {
        if let Some(token) = self.shutdown.lock().take() {
            debug!("callback listener shutting down");
            token.cancel();
        }
    }
}

impl Drop for LocalCallbackListener {
    fn drop(&mut self) {
        self.close();
    }
}

/// Query parameters the issuer may append to the redirect.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Classify a redirect. Order matters: state first, then error, then code.
pub fn evaluate_callback(params: &CallbackParams, expected_state: &str) -> CallbackResponse {
    if params.state.as_deref() != Some(expected_state) {
        return CallbackResponse::Error(AuthError::StateMismatch);
    }
    if let Some(error) = non_empty(&params.error) {
        return CallbackResponse::Error(AuthError::Issuer {
            error: error.to_owned(),
            description: params.error_description.clone().unwrap_or_default(),
        });
    }
    if let Some(code) = non_empty(&params.code) {
        return CallbackResponse::Code(code.to_owned());
    }
    CallbackResponse::Error(AuthError::MissingCode)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

struct CallbackState {
    expected_state: String,
    response: Mutex<Option<oneshot::Sender<CallbackResponse>>>,
}

/// Router serving [`CALLBACK_PATH`] for a single pending flow.
pub fn callback_router(response: oneshot::Sender<CallbackResponse>, state: String) -> Router {
    let state =
        Arc::new(CallbackState { expected_state: state, response: Mutex::new(Some(response)) });
    Router::new().route(CALLBACK_PATH, get(handle_callback)).with_state(state)
}

async fn handle_callback(
    State(s): State<Arc<CallbackState>>,
    query: Result<Query<CallbackParams>, QueryRejection>,
) -> Html<&'static str> {
    let params = match query {
        Ok(Query(params)) => params,
        Err(e) => {
            debug!("unparseable callback query: {e}");
            CallbackParams::default()
        }
    };

    let Some(sender) = s.response.lock().take() else {
        debug!("ignoring callback after the flow already received one");
        return Html(ALREADY_HANDLED_PAGE);
    };

    let outcome = evaluate_callback(&params, &s.expected_state);
    let page = match outcome {
        CallbackResponse::Code(_) => AUTHORIZED_PAGE,
        CallbackResponse::Error(_) => FAILED_PAGE,
    };
    if sender.send(outcome).is_err() {
        debug!("callback receiver dropped before delivery");
    }
    Html(page)
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
