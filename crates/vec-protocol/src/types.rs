//! Typed request/response envelopes for the HTTP endpoints.
//!
//! Responses are strongly typed and reject unknown fields; a server
//! speaking a different dialect fails loudly instead of being half-read.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `GET /refs/heads` response: branch name → commit digest (hex).
pub type RefsResponse = BTreeMap<String, String>;

/// `POST /fetch/negotiate` request body.
#[derive(Debug, Clone, Serialize)]
pub struct NegotiateRequest {
    pub want: Vec<String>,
    pub have: Vec<String>,
}

/// `POST /fetch/negotiate` response: digests the client is missing.
pub type NegotiateResponse = Vec<String>;

/// Push metadata, sent ahead of the packfile bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PushMeta {
    pub branch: String,
    /// Empty string when the remote branch does not exist yet.
    pub old_commit: String,
    pub new_commit: String,
    pub force: bool,
}

/// Push endpoint response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PushResult {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
}

/// `POST /login` request body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub user: String,
    pub pass: String,
}

/// `POST /refresh` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair returned by login and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TokenResponse {
    pub token: String,
    pub refresh_token: String,
}
