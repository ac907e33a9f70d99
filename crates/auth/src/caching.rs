// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reuse, refresh or re-authenticate, in that order of preference.

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, warn};

use crate::cache::TokenCache;
use crate::jwt;
use crate::provider::IssuerTokenProvider;
use crate::token::TokenResult;

/// Which field of a [`TokenResult`] the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Id,
}

impl TokenKind {
    pub fn select(self, tokens: &TokenResult) -> &str {
        match self {
            Self::Access => &tokens.access_token,
            Self::Id => &tokens.id_token,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Id => "id",
        }
    }
}

/// Front end for the CLI: serves tokens from the cache while they are
/// unexpired and falls back to the issuer otherwise.
pub struct CachingTokenProvider {
    identifier: String,
    cache: Arc<dyn TokenCache>,
    provider: Arc<dyn IssuerTokenProvider>,
}

impl CachingTokenProvider {
    pub fn new(
        identifier: impl Into<String>,
        cache: Arc<dyn TokenCache>,
        provider: Arc<dyn IssuerTokenProvider>,
    ) -> Self {
        Self { identifier: identifier.into(), cache, provider }
    }

    pub async fn get_access_token(&self) -> anyhow::Result<String> {
        self.get_token(TokenKind::Access).await
    }

    pub async fn get_id_token(&self) -> anyhow::Result<String> {
        self.get_token(TokenKind::Id).await
    }

    pub async fn get_token(&self, kind: TokenKind) -> anyhow::Result<String> {
        let tokens = self.get_token_result(kind).await?;
        Ok(kind.select(&tokens).to_owned())
    }

    async fn get_token_result(&self, kind: TokenKind) -> anyhow::Result<TokenResult> {
        let cached = self
            .cache
            .get_tokens(&self.identifier)
            .context("could not get tokens from the cache")?;

        if let Some(ref cached) = cached {
            if jwt::is_unexpired(kind.select(cached)) {
                debug!(kind = kind.as_str(), "using cached token");
                return Ok(cached.clone());
            }
        }

        let mut fresh = None;
        if let Some(cached) = cached.filter(|c| !c.refresh_token.is_empty()) {
            debug!("cached token expired, refreshing");
            match self.provider.from_refresh_token(&cached.refresh_token).await {
                Ok(mut refreshed) => {
                    refreshed.refresh_token = cached.refresh_token;
                    fresh = Some(refreshed);
                }
                Err(e) => warn!("refresh failed, re-authenticating: {e:#}"),
            }
        }

        let tokens = match fresh {
            Some(tokens) => tokens,
            None => self.provider.authenticate().await?,
        };

        self.cache.cache_tokens(&self.identifier, &tokens).context("could not cache tokens")?;
        Ok(tokens)
    }
}

#[cfg(test)]
#[path = "caching_tests.rs"]
mod tests;
