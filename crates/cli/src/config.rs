// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use pixy_auth::{Issuer, OidcEndpoints};
use reqwest::Url;

/// kubectl exec credential plugin using the OAuth2 authorization code flow with PKCE.
#[derive(Debug, Parser)]
#[command(name = "k8s-pixy-auth", version)]
pub struct Config {
    /// Issuer base URL.
    #[arg(short = 'i', long, env = "PIXY_ISSUER_ENDPOINT", global = true)]
    pub issuer_endpoint: Option<String>,

    /// OAuth client id registered with the issuer.
    #[arg(short = 'c', long, env = "PIXY_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// Audience of the API the token is for.
    #[arg(short = 'a', long, env = "PIXY_AUDIENCE", global = true)]
    pub audience: Option<String>,

    /// Loopback port for the authorization redirect (0 picks a free port).
    #[arg(long, env = "PIXY_CALLBACK_PORT", default_value_t = 8080, global = true)]
    pub callback_port: u16,

    /// Authorization endpoint; skips discovery together with --token-endpoint.
    #[arg(long, env = "PIXY_AUTHORIZATION_ENDPOINT", global = true)]
    pub authorization_endpoint: Option<String>,

    /// Token endpoint; skips discovery together with --authorization-endpoint.
    #[arg(long, env = "PIXY_TOKEN_ENDPOINT", global = true)]
    pub token_endpoint: Option<String>,

    /// Cache tokens in this JSON file instead of the OS keyring.
    #[arg(long, env = "PIXY_CACHE_FILE", global = true)]
    pub cache_file: Option<PathBuf>,

    /// Log filter directive (e.g. debug, pixy_auth=trace).
    #[arg(long, env = "PIXY_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    /// Log format (text or json).
    #[arg(long, env = "PIXY_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print an ExecCredential for kubectl, authenticating if needed.
    Auth(AuthArgs),
    /// Print the version of this binary.
    Version,
}

#[derive(Debug, Clone, Default, Args)]
pub struct AuthArgs {
    /// Return the id token instead of the access token.
    #[arg(long)]
    pub use_id_token: bool,

    /// Request and use refresh tokens.
    #[arg(long)]
    pub with_refresh_token: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("invalid log format: {other} (expected text or json)"),
        }

        if !matches!(self.command, Command::Auth(_)) {
            return Ok(());
        }

        let issuer = self.issuer()?;
        check_http_url("--issuer-endpoint", &issuer.issuer_endpoint)?;

        match (&self.authorization_endpoint, &self.token_endpoint) {
            (Some(authorize), Some(token)) => {
                check_http_url("--authorization-endpoint", authorize)?;
                check_http_url("--token-endpoint", token)?;
            }
            (None, None) => {}
            _ => anyhow::bail!(
                "--authorization-endpoint and --token-endpoint must be given together"
            ),
        }
        Ok(())
    }

    /// Issuer identity from the required flags.
    pub fn issuer(&self) -> anyhow::Result<Issuer> {
        Ok(Issuer {
            issuer_endpoint: required("--issuer-endpoint", &self.issuer_endpoint)?,
            client_id: required("--client-id", &self.client_id)?,
            audience: required("--audience", &self.audience)?,
        })
    }

    /// Endpoints given on the command line, if both were.
    pub fn endpoint_overrides(&self) -> Option<OidcEndpoints> {
        match (&self.authorization_endpoint, &self.token_endpoint) {
            (Some(authorization_endpoint), Some(token_endpoint)) => Some(OidcEndpoints {
                authorization_endpoint: authorization_endpoint.clone(),
                token_endpoint: token_endpoint.clone(),
            }),
            _ => None,
        }
    }

    /// File cache path; `None` means the OS keyring.
    pub fn cache_file(&self) -> Option<&Path> {
        self.cache_file.as_deref()
    }
}

fn required(flag: &str, value: &Option<String>) -> anyhow::Result<String> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.to_owned()),
        _ => anyhow::bail!("{flag} is required"),
    }
}

fn check_http_url(flag: &str, value: &str) -> anyhow::Result<()> {
    let url = Url::parse(value).map_err(|e| anyhow::anyhow!("{flag}: invalid URL {value:?}: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => anyhow::bail!("{flag}: unsupported scheme {other:?} (expected http or https)"),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
