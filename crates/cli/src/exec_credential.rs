// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The document kubectl reads from an exec credential plugin's stdout.

use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "client.authentication.k8s.io/v1beta1";
pub const KIND: &str = "ExecCredential";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredential {
    pub api_version: String,
    pub kind: String,
    pub status: ExecCredentialStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecCredentialStatus {
    pub token: String,
}

impl ExecCredential {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION.to_owned(),
            kind: KIND.to_owned(),
            status: ExecCredentialStatus { token: token.into() },
        }
    }

    /// Single-line JSON as printed on stdout.
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
