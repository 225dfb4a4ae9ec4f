pub mod endpoints;

use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct LmsConfig {
    pub base_url: String,
    pub api_token: String,
    /// Custom auth header name; when unset the token is sent as a bearer.
    pub auth_header: Option<String>,
}

impl LmsConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let base_url = env::var("LMS_BASE_URL")
            .map_err(|_| AppError::BadRequest("LMS_BASE_URL is not set".to_string()))?;
        let api_token = env::var("LMS_API_TOKEN")
            .map_err(|_| AppError::BadRequest("LMS_API_TOKEN is not set".to_string()))?;
        let auth_header = env::var("LMS_AUTH_HEADER").ok();

        Ok(Self {
            base_url,
            api_token,
            auth_header,
        })
    }
}

#[derive(Debug, Error)]
pub enum LmsError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LMS returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid JSON payload: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Raw HTTP access to the LMS. The sync engine layers endpoint probing and
/// pagination on top of this; tests substitute a canned implementation.
#[async_trait]
pub trait LmsClient: Send + Sync {
    async fn get(&self, path_and_query: &str) -> Result<Value, LmsError>;
    async fn post(&self, path_and_query: &str, body: &Value) -> Result<Value, LmsError>;
}

pub struct LmsHttpClient {
    client: Client,
    config: LmsConfig,
}

impl LmsHttpClient {
    pub fn new(config: LmsConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::BadRequest(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path_and_query: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path_and_query.trim_start_matches('/')
        )
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_header {
            Some(header) => request.header(header.as_str(), self.config.api_token.as_str()),
            None => request.header("Authorization", format!("Bearer {}", self.config.api_token)),
        }
    }

    async fn decode(&self, response: reqwest::Response) -> Result<Value, LmsError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LmsError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let unescaped = decode_escaped_unicode(&body);
        Ok(serde_json::from_str(&unescaped)?)
    }
}

#[async_trait]
impl LmsClient for LmsHttpClient {
    async fn get(&self, path_and_query: &str) -> Result<Value, LmsError> {
        let request = self.apply_auth(self.client.get(self.url(path_and_query)));
        let response = request.send().await?;
        self.decode(response).await
    }

    async fn post(&self, path_and_query: &str, body: &Value) -> Result<Value, LmsError> {
        let request = self
            .apply_auth(self.client.post(self.url(path_and_query)))
            .json(body);
        let response = request.send().await?;
        self.decode(response).await
    }
}

/// The LMS double-escapes non-ASCII characters inside JSON string values:
/// `\\u00e9` arrives where `\u00e9` was meant. Collapse those sequences
/// before handing the body to the JSON parser.
pub fn decode_escaped_unicode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 6 < bytes.len()
            && bytes[i + 1] == b'\\'
            && bytes[i + 2] == b'u'
            && bytes[i + 3..i + 7].iter().all(u8::is_ascii_hexdigit)
        {
            out.extend_from_slice(&bytes[i + 1..i + 7]);
            i += 7;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
