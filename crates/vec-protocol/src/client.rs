//! HTTP client for the sync endpoints.
//!
//! All requests carry `Authorization: Bearer <token>` when a token is
//! known, plus any extra headers configured on the remote. Transport
//! failures retry up to three times with linearly increasing delay; a 401
//! triggers one token refresh before the request is retried.

use std::sync::Mutex;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use vec_config::{CredentialProvider, Remote};

use crate::types::{
    LoginRequest, NegotiateRequest, NegotiateResponse, PushMeta, PushResult, RefreshRequest,
    RefsResponse, TokenResponse,
};
use crate::ProtocolError;

/// Timeout for the refs enumeration request.
pub const REFS_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for negotiation and packfile transfer.
pub const PACK_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for the push upload.
pub const PUSH_TIMEOUT: Duration = Duration::from_secs(300);

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// A client bound to one configured remote.
pub struct HttpClient {
    base_url: String,
    remote_name: String,
    headers: Vec<(String, String)>,
    token: Mutex<Option<String>>,
    creds: CredentialProvider,
    http: Client,
}

impl HttpClient {
    /// Build a client for a configured remote.
    ///
    /// The initial token comes from the remote's config entry first, then
    /// the on-disk credentials file.
    pub fn for_remote(remote: &Remote, creds: CredentialProvider) -> Result<Self, ProtocolError> {
        let token = creds.token(&remote.name, remote.token.as_deref())?;
        Ok(Self {
            base_url: remote.url.trim_end_matches('/').to_string(),
            remote_name: remote.name.clone(),
            headers: remote.headers.clone(),
            token: Mutex::new(token),
            creds,
            http: Client::builder().build()?,
        })
    }

    /// The remote this client talks to.
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    /// `GET /refs/heads`: the remote's branch map.
    pub fn refs(&self) -> Result<RefsResponse, ProtocolError> {
        let url = format!("{}/refs/heads", self.base_url);
        let resp = self.send(REFS_TIMEOUT, &|http: &Client| http.get(&url))?;
        Ok(resp.json()?)
    }

    /// `POST /fetch/negotiate`: digests the server has that we want.
    pub fn negotiate(
        &self,
        want: &[String],
        have: &[String],
    ) -> Result<NegotiateResponse, ProtocolError> {
        let url = format!("{}/fetch/negotiate", self.base_url);
        let body = NegotiateRequest {
            want: want.to_vec(),
            have: have.to_vec(),
        };
        let resp = self.send(PACK_TIMEOUT, &|http: &Client| http.post(&url).json(&body))?;
        Ok(resp.json()?)
    }

    /// `POST /fetch/packfile`: raw pack bytes for the requested digests.
    pub fn fetch_pack(&self, digests: &[String]) -> Result<Vec<u8>, ProtocolError> {
        let url = format!("{}/fetch/packfile", self.base_url);
        let resp = self.send(PACK_TIMEOUT, &|http: &Client| {
            http.post(&url).json(&digests.to_vec())
        })?;
        Ok(resp.bytes()?.to_vec())
    }

    /// `POST /push`: metadata followed by the packfile bytes.
    ///
    /// The body is the sequential variant: a big-endian `u32` metadata
    /// length, the metadata JSON, then the raw pack.
    pub fn push(&self, meta: &PushMeta, pack: &[u8]) -> Result<PushResult, ProtocolError> {
        let url = format!("{}/push", self.base_url);
        let meta_json = serde_json::to_vec(meta).expect("push metadata serializes");

        let mut body = Vec::with_capacity(4 + meta_json.len() + pack.len());
        body.extend_from_slice(&(meta_json.len() as u32).to_be_bytes());
        body.extend_from_slice(&meta_json);
        body.extend_from_slice(pack);

        let resp = self.send(PUSH_TIMEOUT, &|http: &Client| {
            http.post(&url)
                .header("Content-Type", "application/octet-stream")
                .body(body.clone())
        })?;
        Ok(resp.json()?)
    }

    /// `POST /login`: obtain and persist a token pair.
    pub fn login(&self, user: &str, pass: &str) -> Result<(), ProtocolError> {
        let url = format!("{}/login", self.base_url);
        let body = LoginRequest {
            user: user.to_string(),
            pass: pass.to_string(),
        };
        let resp = self.send(REFS_TIMEOUT, &|http: &Client| http.post(&url).json(&body))?;
        let tokens: TokenResponse = resp.json()?;
        self.adopt_tokens(&tokens)?;
        Ok(())
    }

    /// Exchange the stored refresh token for a fresh token pair.
    ///
    /// Returns false when no refresh token exists or the server declines.
    fn try_refresh(&self) -> Result<bool, ProtocolError> {
        let Some(refresh_token) = self.creds.refresh_token(&self.remote_name)? else {
            return Ok(false);
        };

        let url = format!("{}/refresh", self.base_url);
        let body = RefreshRequest { refresh_token };
        let resp = self
            .http
            .post(&url)
            .timeout(REFS_TIMEOUT)
            .json(&body)
            .send()?;

        if !resp.status().is_success() {
            return Ok(false);
        }
        let tokens: TokenResponse = resp.json()?;
        self.adopt_tokens(&tokens)?;
        Ok(true)
    }

    fn adopt_tokens(&self, tokens: &TokenResponse) -> Result<(), ProtocolError> {
        self.creds
            .store_tokens(&self.remote_name, &tokens.token, &tokens.refresh_token)?;
        *self.token.lock().expect("token lock") = Some(tokens.token.clone());
        Ok(())
    }

    /// Send a request with retry, auth, extra headers, and status mapping.
    fn send(
        &self,
        timeout: Duration,
        build: &dyn Fn(&Client) -> RequestBuilder,
    ) -> Result<Response, ProtocolError> {
        let mut attempt: u32 = 0;
        let mut refreshed = false;

        loop {
            let mut req = build(&self.http).timeout(timeout);
            if let Some(token) = self.token.lock().expect("token lock").as_deref() {
                req = req.bearer_auth(token);
            }
            for (name, value) in &self.headers {
                req = req.header(name, value);
            }

            match req.send() {
                Err(e) => {
                    attempt += 1;
                    if attempt >= RETRY_ATTEMPTS {
                        return Err(e.into());
                    }
                    std::thread::sleep(RETRY_BASE_DELAY * attempt);
                }
                Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => {
                    if !refreshed && self.try_refresh()? {
                        refreshed = true;
                        continue;
                    }
                    return Err(ProtocolError::Auth(self.remote_name.clone()));
                }
                Ok(resp) => return self.classify(resp),
            }
        }
    }

    fn classify(&self, resp: Response) -> Result<Response, ProtocolError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        match status {
            StatusCode::FORBIDDEN => Err(ProtocolError::Auth(self.remote_name.clone())),
            StatusCode::NOT_FOUND => Err(ProtocolError::NotFound(
                resp.url().path().to_string(),
            )),
            StatusCode::CONFLICT => Err(ProtocolError::NonFastForward),
            _ => {
                let body = resp.text().unwrap_or_default();
                Err(ProtocolError::Protocol(format!(
                    "unexpected status {status}: {body}"
                )))
            }
        }
    }
}
