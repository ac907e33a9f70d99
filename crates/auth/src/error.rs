// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Typed root causes for authentication failures.
///
/// Operations return `anyhow::Result`; the concrete failure can be
/// recovered with `err.downcast_ref::<AuthError>()` (or by walking
/// `err.chain()` when context has been attached).
#[derive(Debug)]
pub enum AuthError {
    /// The callback's `state` did not match the one issued for this flow.
    StateMismatch,
    /// The issuer redirected back with an `error` parameter.
    Issuer { error: String, description: String },
    /// The callback carried neither `error` nor `code`.
    MissingCode,
    /// The listener went away before delivering a callback.
    ListenerClosed,
    /// The HTTP request could not be sent or its body not received.
    Transport(reqwest::Error),
    /// The issuer answered with a status outside 200-299.
    Status(u16),
    /// The success body did not have the expected shape.
    Decode(serde_json::Error),
    /// A refresh was requested from a provider built without refresh support.
    RefreshNotAllowed,
}

impl AuthError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateMismatch => "STATE_MISMATCH",
            Self::Issuer { .. } => "ISSUER_ERROR",
            Self::MissingCode => "MISSING_CODE",
            Self::ListenerClosed => "LISTENER_CLOSED",
            Self::Transport(_) => "TRANSPORT",
            Self::Status(_) => "STATUS",
            Self::Decode(_) => "DECODE",
            Self::RefreshNotAllowed => "REFRESH_NOT_ALLOWED",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateMismatch => f.write_str("callback completed with incorrect state"),
            Self::Issuer { error, description } => write!(f, "{error}: {description}"),
            Self::MissingCode => f.write_str("callback completed with no error or code"),
            Self::ListenerClosed => {
                f.write_str("callback listener closed before a response was received")
            }
            Self::Transport(_) => f.write_str("request to issuer failed"),
            Self::Status(code) => write!(f, "a non-success status code was received: {code}"),
            Self::Decode(_) => f.write_str("could not decode issuer response"),
            Self::RefreshNotAllowed => f.write_str(
                "cannot use refresh token as it was not allowed to be used by the client",
            ),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

/// Find the first [`AuthError`] in an error chain.
pub fn find_auth_error(err: &anyhow::Error) -> Option<&AuthError> {
    err.chain().find_map(|e| e.downcast_ref::<AuthError>())
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
