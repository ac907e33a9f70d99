// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end flows: real loopback listener, real HTTP exchange, scripted
//! issuer and a simulated browser.

use std::sync::Arc;

use clap::Parser;
use pixy::config::Config;
use pixy_auth::cache::{FileTokenCache, MemoryTokenCache, TokenCache};
use pixy_auth::callback::LocalCallbackListener;
use pixy_auth::caching::CachingTokenProvider;
use pixy_auth::code_provider::UrlOpener;
use pixy_auth::challenge::compute_code_challenge;
use pixy_auth::error::find_auth_error;
use pixy_auth::provider::{IssuerTokenProvider, TokenProvider};
use pixy_auth::test_support::{expired_jwt, tokens, unexpired_jwt};
use pixy_auth::{AuthError, Issuer, TokenResult};
use pixy_specs::{ensure_crypto, token_body, Consent, MockIssuer, SimulatedBrowser};
use serde_json::json;

/// Parse a command line the way the binary does.
fn parse_config(args: &[&str]) -> anyhow::Result<Config> {
    let config = Config::try_parse_from(args)?;
    config.validate()?;
    Ok(config)
}

fn issuer(mock: &MockIssuer) -> Issuer {
    Issuer {
        issuer_endpoint: mock.issuer_endpoint(),
        client_id: "kubectl".to_owned(),
        audience: "api://cluster".to_owned(),
    }
}

fn provider(
    mock: &MockIssuer,
    allow_refresh: bool,
    browser: Arc<SimulatedBrowser>,
) -> TokenProvider {
    ensure_crypto();
    TokenProvider::for_endpoints(
        allow_refresh,
        issuer(mock),
        mock.endpoints(),
        Arc::new(LocalCallbackListener::new(0)),
        browser,
        reqwest::Client::new(),
    )
}

#[tokio::test]
async fn authenticate_round_trip() -> anyhow::Result<()> {
    let mock = MockIssuer::start().await?;
    mock.respond_with(
        200,
        json!({ "access_token": "AT1", "refresh_token": "RT1", "expires_in": 3600 }),
    );
    let browser = Arc::new(SimulatedBrowser::new());

    let result = provider(&mock, true, Arc::clone(&browser)).authenticate().await?;
    assert_eq!(
        result,
        TokenResult {
            access_token: "AT1".to_owned(),
            id_token: String::new(),
            refresh_token: "RT1".to_owned(),
            expires_in: 3600,
        }
    );

    let pages = browser.pages().await?;
    assert_eq!(pages.len(), 1);
    assert!(pages[0].contains("You've been authorized"), "{pages:?}");

    let authorize = mock.authorize_requests();
    assert_eq!(authorize.len(), 1);
    let authorize = &authorize[0];
    assert_eq!(authorize["scope"], "openid email offline_access");
    assert_eq!(authorize["response_type"], "code");
    assert_eq!(authorize["code_challenge_method"], "S256");
    assert_eq!(authorize["client_id"], "kubectl");
    assert_eq!(authorize["audience"], "api://cluster");
    assert!(authorize["redirect_uri"].starts_with("http://127.0.0.1:"));
    assert!(authorize["redirect_uri"].ends_with("/callback"));
    assert!(!authorize.contains_key("code_verifier"));

    let token_requests = mock.token_requests();
    assert_eq!(token_requests.len(), 1);
    let exchange = &token_requests[0];
    assert_eq!(exchange["grant_type"], "authorization_code");
    assert_eq!(exchange["code"], "XYZ");
    assert_eq!(exchange["client_id"], "kubectl");
    assert_eq!(exchange["redirect_uri"], authorize["redirect_uri"]);
    assert_eq!(compute_code_challenge(&exchange["code_verifier"]), authorize["code_challenge"]);
    Ok(())
}

#[tokio::test]
async fn empty_cache_authenticates_and_stores_result() -> anyhow::Result<()> {
    let mock = MockIssuer::start().await?;
    mock.respond_with(
        200,
        json!({ "access_token": "AT1", "refresh_token": "RT1", "expires_in": 3600 }),
    );
    let cache = Arc::new(MemoryTokenCache::new());
    let id = issuer(&mock).cache_identifier();
    let caching = CachingTokenProvider::new(
        id.clone(),
        Arc::clone(&cache) as Arc<dyn TokenCache>,
        Arc::new(provider(&mock, true, Arc::new(SimulatedBrowser::new()))),
    );

    assert_eq!(caching.get_access_token().await?, "AT1");
    assert_eq!(cache.get_tokens(&id)?, Some(tokens("AT1", "", "RT1")));
    Ok(())
}

#[tokio::test]
async fn without_refresh_offline_access_is_not_requested() -> anyhow::Result<()> {
    let mock = MockIssuer::start().await?;
    mock.respond_with(200, token_body("AT1", None));
    let browser = Arc::new(SimulatedBrowser::new());

    provider(&mock, false, Arc::clone(&browser)).authenticate().await?;
    assert_eq!(mock.authorize_requests()[0]["scope"], "openid email");
    Ok(())
}

#[tokio::test]
async fn forged_state_is_rejected_before_exchange() -> anyhow::Result<()> {
    let mock = MockIssuer::start().await?;
    mock.set_consent(Consent::ForgeState { code: "XYZ".to_owned() });
    mock.respond_with(200, token_body("AT1", None));
    let browser = Arc::new(SimulatedBrowser::new());

    let err = provider(&mock, false, Arc::clone(&browser)).authenticate().await.err();
    let err = err.ok_or_else(|| anyhow::anyhow!("expected an error"))?;
    assert!(matches!(find_auth_error(&err), Some(AuthError::StateMismatch)), "{err:?}");
    assert!(mock.token_requests().is_empty());
    assert!(browser.pages().await?[0].contains("An error occurred"));
    Ok(())
}

#[tokio::test]
async fn issuer_denial_carries_error_and_description() -> anyhow::Result<()> {
    let mock = MockIssuer::start().await?;
    mock.set_consent(Consent::Deny {
        error: "access_denied".to_owned(),
        description: "user declined".to_owned(),
    });
    let browser = Arc::new(SimulatedBrowser::new());

    let err = provider(&mock, false, browser).authenticate().await.err();
    let err = err.ok_or_else(|| anyhow::anyhow!("expected an error"))?;
    assert_eq!(err.to_string(), "access_denied: user declined");
    assert!(mock.token_requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn rejected_code_is_wrapped() -> anyhow::Result<()> {
    let mock = MockIssuer::start().await?;
    mock.respond_with(400, json!({ "error": "invalid_grant" }));
    let browser = Arc::new(SimulatedBrowser::new());

    let err = provider(&mock, false, browser).authenticate().await.err();
    let err = err.ok_or_else(|| anyhow::anyhow!("expected an error"))?;
    assert_eq!(
        format!("{err:#}"),
        "could not exchange code: a non-success status code was received: 400"
    );
    Ok(())
}

#[tokio::test]
async fn cache_then_refresh_then_reauthenticate() -> anyhow::Result<()> {
    let mock = MockIssuer::start().await?;
    let dir = tempfile::tempdir()?;
    let cache = Arc::new(FileTokenCache::new(dir.path().join("tokens.json")));
    let id = issuer(&mock).cache_identifier();
    let browser = Arc::new(SimulatedBrowser::new());
    let caching = CachingTokenProvider::new(
        id.clone(),
        Arc::clone(&cache) as Arc<dyn TokenCache>,
        Arc::new(provider(&mock, true, Arc::clone(&browser))),
    );

    // Expired access token with a refresh token: one refresh, no browser.
    cache.cache_tokens(&id, &tokens(&expired_jwt(), "", "RT1"))?;
    let refreshed = unexpired_jwt();
    mock.respond_with(200, token_body(&refreshed, Some("RT-rotated")));

    assert_eq!(caching.get_access_token().await?, refreshed);
    assert!(browser.urls().is_empty());
    let requests = mock.token_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["grant_type"], "refresh_token");
    assert_eq!(requests[0]["refresh_token"], "RT1");
    assert_eq!(cache.get_tokens(&id)?.map(|t| t.refresh_token), Some("RT1".to_owned()));

    // Still valid: served from the cache.
    assert_eq!(caching.get_access_token().await?, refreshed);
    assert_eq!(mock.token_requests().len(), 1);

    // Expired again and the issuer refuses the refresh: full browser flow.
    cache.cache_tokens(&id, &tokens(&expired_jwt(), "", "RT1"))?;
    let mock_fresh = unexpired_jwt();
    mock.respond_with(400, json!({ "error": "invalid_grant" }));
    mock.respond_with(200, token_body(&mock_fresh, Some("RT2")));

    assert_eq!(caching.get_access_token().await?, mock_fresh);
    assert_eq!(browser.urls().len(), 1);
    let grants: Vec<String> =
        mock.token_requests().iter().map(|r| r["grant_type"].clone()).collect();
    assert_eq!(grants, ["refresh_token", "refresh_token", "authorization_code"]);
    assert_eq!(cache.get_tokens(&id)?.map(|t| t.refresh_token), Some("RT2".to_owned()));
    Ok(())
}

#[tokio::test]
async fn cli_run_discovers_and_prints_exec_credential() -> anyhow::Result<()> {
    let mock = MockIssuer::start().await?;
    let at = unexpired_jwt();
    mock.respond_with(200, token_body(&at, Some("RT1")));
    let dir = tempfile::tempdir()?;
    let cache_file = dir.path().join("tokens.json");
    let issuer_endpoint = mock.issuer_endpoint();
    let cache_arg = cache_file.to_string_lossy().into_owned();

    let config = parse_config(&[
        "k8s-pixy-auth",
        "-i",
        issuer_endpoint.as_str(),
        "-c",
        "kubectl",
        "-a",
        "api://cluster",
        "--callback-port",
        "0",
        "--cache-file",
        cache_arg.as_str(),
        "auth",
        "--with-refresh-token",
    ])?;

    ensure_crypto();
    let browser = Arc::new(SimulatedBrowser::new());
    let mut collaborators = pixy::run::Collaborators::system(&config)?;
    collaborators.opener = Arc::clone(&browser) as Arc<dyn UrlOpener>;

    let out = pixy::run::run(&config, collaborators).await?;
    let doc: serde_json::Value = serde_json::from_str(&out)?;
    assert_eq!(doc["apiVersion"], "client.authentication.k8s.io/v1beta1");
    assert_eq!(doc["kind"], "ExecCredential");
    assert_eq!(doc["status"]["token"], at.as_str());

    let stored = FileTokenCache::new(&cache_file).get_tokens("kubectl-api://cluster")?;
    assert_eq!(stored.map(|t| t.refresh_token), Some("RT1".to_owned()));
    assert_eq!(browser.urls().len(), 1);
    Ok(())
}
