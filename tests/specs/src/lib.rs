// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end authorization flows.
//!
//! [`MockIssuer`] is an in-process OIDC issuer: discovery document, an
//! `/authorize` endpoint that redirects straight back to the client, and a
//! token endpoint with scripted responses. [`SimulatedBrowser`] stands in
//! for the user's browser by following the authorize URL, redirects
//! included, so the real loopback listener receives the callback.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use pixy_auth::code_provider::UrlOpener;
use pixy_auth::OidcEndpoints;
use reqwest::Url;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub use pixy_auth::ensure_crypto_provider as ensure_crypto;

/// What `/authorize` does with the next request.
#[derive(Debug, Clone)]
pub enum Consent {
    /// Redirect back with this code and the client's state.
    Approve { code: String },
    /// Redirect back with an OAuth error.
    Deny { error: String, description: String },
    /// Redirect back with a code but someone else's state.
    ForgeState { code: String },
}

type Params = HashMap<String, String>;

struct IssuerState {
    addr: SocketAddr,
    consent: Mutex<Consent>,
    token_responses: Mutex<VecDeque<(u16, Value)>>,
    last_response: Mutex<Option<(u16, Value)>>,
    authorize_requests: Mutex<Vec<Params>>,
    token_requests: Mutex<Vec<Params>>,
}

/// In-process OIDC issuer bound to an ephemeral loopback port.
pub struct MockIssuer {
    state: Arc<IssuerState>,
}

impl MockIssuer {
    pub async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(IssuerState {
            addr,
            consent: Mutex::new(Consent::Approve { code: "XYZ".to_owned() }),
            token_responses: Mutex::new(VecDeque::new()),
            last_response: Mutex::new(None),
            authorize_requests: Mutex::new(Vec::new()),
            token_requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/.well-known/openid-configuration", get(discovery))
            .route("/authorize", get(authorize))
            .route("/oauth/token", post(token))
            .with_state(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Ok(Self { state })
    }

    pub fn issuer_endpoint(&self) -> String {
        format!("http://{}", self.state.addr)
    }

    pub fn endpoints(&self) -> OidcEndpoints {
        endpoints_for(self.state.addr)
    }

    pub fn set_consent(&self, consent: Consent) {
        *self.state.consent.lock() = consent;
    }

    /// Queue a token endpoint response. Each request takes the next one;
    /// once the queue is empty the last response served repeats.
    pub fn respond_with(&self, status: u16, body: Value) {
        self.state.token_responses.lock().push_back((status, body));
    }

    pub fn authorize_requests(&self) -> Vec<Params> {
        self.state.authorize_requests.lock().clone()
    }

    pub fn token_requests(&self) -> Vec<Params> {
        self.state.token_requests.lock().clone()
    }
}

fn endpoints_for(addr: SocketAddr) -> OidcEndpoints {
    OidcEndpoints {
        authorization_endpoint: format!("http://{addr}/authorize"),
        token_endpoint: format!("http://{addr}/oauth/token"),
    }
}

async fn discovery(State(s): State<Arc<IssuerState>>) -> Json<Value> {
    let endpoints = endpoints_for(s.addr);
    Json(json!({
        "issuer": format!("http://{}/", s.addr),
        "authorization_endpoint": endpoints.authorization_endpoint,
        "token_endpoint": endpoints.token_endpoint,
        "response_types_supported": ["code"],
        "code_challenge_methods_supported": ["S256"],
    }))
}

async fn authorize(State(s): State<Arc<IssuerState>>, Query(params): Query<Params>) -> Response {
    s.authorize_requests.lock().push(params.clone());

    let (Some(redirect_uri), Some(state)) = (params.get("redirect_uri"), params.get("state"))
    else {
        return (StatusCode::BAD_REQUEST, "missing redirect_uri or state").into_response();
    };
    let reply: Vec<(&str, String)> = match s.consent.lock().clone() {
        Consent::Approve { code } => vec![("code", code), ("state", state.clone())],
        Consent::Deny { error, description } => {
            vec![("error", error), ("error_description", description), ("state", state.clone())]
        }
        Consent::ForgeState { code } => vec![("code", code), ("state", "forged".to_owned())],
    };
    match Url::parse_with_params(redirect_uri, &reply) {
        Ok(target) => Redirect::to(target.as_str()).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, format!("bad redirect_uri: {e}")).into_response(),
    }
}

async fn token(State(s): State<Arc<IssuerState>>, Form(form): Form<Params>) -> Response {
    s.token_requests.lock().push(form);

    let next = match s.token_responses.lock().pop_front() {
        Some(next) => {
            *s.last_response.lock() = Some(next.clone());
            Some(next)
        }
        None => s.last_response.lock().clone(),
    };
    let (status, body) = next.unwrap_or((500, json!({ "error": "no scripted response" })));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

/// Browser stand-in that visits URLs with an HTTP client.
#[derive(Default)]
pub struct SimulatedBrowser {
    visits: Mutex<Vec<JoinHandle<anyhow::Result<String>>>>,
    urls: Mutex<Vec<String>>,
}

impl SimulatedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    /// Wait for every visit so far and return the final page bodies.
    pub async fn pages(&self) -> anyhow::Result<Vec<String>> {
        let visits: Vec<_> = self.visits.lock().drain(..).collect();
        let mut pages = Vec::with_capacity(visits.len());
        for visit in visits {
            pages.push(visit.await??);
        }
        Ok(pages)
    }
}

impl UrlOpener for SimulatedBrowser {
    fn open_url(&self, url: &str) -> anyhow::Result<()> {
        ensure_crypto();
        self.urls.lock().push(url.to_owned());
        let url = url.to_owned();
        let visit = tokio::spawn(async move { Ok(reqwest::get(url).await?.text().await?) });
        self.visits.lock().push(visit);
        Ok(())
    }
}

/// Token endpoint body for a successful grant.
pub fn token_body(access_token: &str, refresh_token: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access_token,
        "id_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
    });
    if let (Some(refresh), Some(map)) = (refresh_token, body.as_object_mut()) {
        map.insert("refresh_token".to_owned(), Value::String(refresh.to_owned()));
    }
    body
}
