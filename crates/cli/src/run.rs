// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use anyhow::Context;
use pixy_auth::browser::SystemBrowser;
use pixy_auth::cache::{FileTokenCache, KeyringTokenCache, TokenCache, KEYRING_SERVICE};
use pixy_auth::callback::{CallbackListener, LocalCallbackListener};
use pixy_auth::caching::CachingTokenProvider;
use pixy_auth::code_provider::UrlOpener;
use pixy_auth::discovery;
use pixy_auth::error::find_auth_error;
use pixy_auth::provider::TokenProvider;
use pixy_auth::{AuthError, Issuer, OidcEndpoints};
use tracing::{debug, info};

use crate::config::{AuthArgs, Command, Config};
use crate::exec_credential::ExecCredential;

/// Everything `auth` talks to outside the process.
pub struct Collaborators {
    pub listener: Arc<dyn CallbackListener>,
    pub opener: Arc<dyn UrlOpener>,
    pub cache: Arc<dyn TokenCache>,
    pub http: reqwest::Client,
}

impl Collaborators {
    /// Loopback listener, system browser and the cache selected by `config`.
    pub fn system(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build().context("could not build HTTP client")?;
        let cache: Arc<dyn TokenCache> = match config.cache_file() {
            Some(path) => {
                let file = FileTokenCache::new(path);
                debug!(path = %file.path().display(), "using file token cache");
                Arc::new(file)
            }
            None => {
                debug!(service = KEYRING_SERVICE, "using keyring token cache");
                Arc::new(KeyringTokenCache::system())
            }
        };
        Ok(Self {
            listener: Arc::new(LocalCallbackListener::new(config.callback_port)),
            opener: Arc::new(SystemBrowser),
            cache,
            http,
        })
    }
}

/// Run the selected subcommand and return what it prints on stdout.
pub async fn run(config: &Config, collaborators: Collaborators) -> anyhow::Result<String> {
    match &config.command {
        Command::Version => Ok(version_line()),
        Command::Auth(args) => exec_credential(config, args, collaborators).await?.to_json(),
    }
}

pub fn version_line() -> String {
    format!("k8s-pixy-auth {}", env!("CARGO_PKG_VERSION"))
}

/// Short code for a failure: that of the first [`AuthError`] in the chain.
pub fn failure_code(err: &anyhow::Error) -> &'static str {
    find_auth_error(err).map_or("FAILED", AuthError::as_str)
}

/// Obtain the requested token and wrap it for kubectl.
pub async fn exec_credential(
    config: &Config,
    args: &AuthArgs,
    collaborators: Collaborators,
) -> anyhow::Result<ExecCredential> {
    let issuer = config.issuer()?;
    let endpoints = resolve_endpoints(config, &issuer, &collaborators.http).await?;

    let provider = TokenProvider::for_endpoints(
        args.with_refresh_token,
        issuer.clone(),
        endpoints,
        collaborators.listener,
        collaborators.opener,
        collaborators.http,
    );
    let caching = CachingTokenProvider::new(
        issuer.cache_identifier(),
        collaborators.cache,
        Arc::new(provider),
    );

    let token = if args.use_id_token {
        caching.get_id_token().await
    } else {
        caching.get_access_token().await
    };
    let token = token.context("could not get token for auth")?;
    Ok(ExecCredential::with_token(token))
}

/// Endpoints from the command line, or from the issuer's discovery document.
pub async fn resolve_endpoints(
    config: &Config,
    issuer: &Issuer,
    http: &reqwest::Client,
) -> anyhow::Result<OidcEndpoints> {
    if let Some(endpoints) = config.endpoint_overrides() {
        debug!("using configured issuer endpoints");
        return Ok(endpoints);
    }
    let endpoints = discovery::discover(http, &issuer.issuer_endpoint)
        .await
        .context("could not discover issuer endpoints")?;
    info!(
        authorization_endpoint = %endpoints.authorization_endpoint,
        token_endpoint = %endpoints.token_endpoint,
        "discovered issuer endpoints"
    );
    Ok(endpoints)
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
