//! src/services/drive_client.rs
//!
//! DriveClient: read-only Google Drive v3 access for the migration source.
//! Authenticates as a service account through the OAuth2 JWT-bearer grant and
//! caches the access token until shortly before it expires.

use crate::{
    errors::{ClientError, ClientResult},
    models::{credential::ServiceAccountCredential, file::FileDescriptor},
    services::{ByteStream, FileSource},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::{StreamExt, TryStreamExt};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use std::io;
use tokio::sync::Mutex;
use tracing::debug;

const SERVICE: &str = "drive";

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const LIST_FIELDS: &str = "nextPageToken,files(id,name)";
const PAGE_SIZE: &str = "1000";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListPage {
    #[serde(default)]
    files: Vec<FileDescriptor>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > now
    }
}

pub struct DriveClient {
    http: Client,
    credential: ServiceAccountCredential,
    signing_key: EncodingKey,
    api_base: Url,
    token: Mutex<Option<CachedToken>>,
}

impl DriveClient {
    pub fn new(http: Client, credential: ServiceAccountCredential) -> ClientResult<Self> {
        Self::with_api_base(http, credential, DEFAULT_API_BASE)
    }

    /// Build a client against a non-default API host (used by tests).
    ///
    /// Fails when the private key is not a PEM-encoded RSA key.
    pub fn with_api_base(
        http: Client,
        credential: ServiceAccountCredential,
        api_base: &str,
    ) -> ClientResult<Self> {
        let signing_key = EncodingKey::from_rsa_pem(credential.private_key.as_bytes())
            .map_err(|e| ClientError::Auth(format!("invalid service account private key: {}", e)))?;
        let api_base = Url::parse(api_base)
            .map_err(|e| ClientError::Decode(format!("invalid Drive API base `{}`: {}", api_base, e)))?;

        Ok(Self {
            http,
            credential,
            signing_key,
            api_base,
            token: Mutex::new(None),
        })
    }

    /// Return a cached access token, exchanging a new signed assertion when the
    /// cached one is missing or about to expire.
    async fn access_token(&self) -> ClientResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn fetch_token(&self) -> ClientResult<CachedToken> {
        let now = Utc::now();
        let claims = AssertionClaims {
            iss: &self.credential.client_email,
            scope: DRIVE_READONLY_SCOPE,
            aud: &self.credential.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| ClientError::Auth(format!("could not sign assertion: {}", e)))?;

        debug!("Requesting Drive access token for {}", self.credential.client_email);
        let resp = self
            .http
            .post(&self.credential.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(ClientError::http(SERVICE))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<TokenErrorBody>(&body) {
                Ok(TokenErrorBody {
                    error,
                    error_description: Some(description),
                }) => format!("{}: {}", error, description),
                Ok(TokenErrorBody { error, .. }) => error,
                Err(_) => format!("token endpoint returned {}", status),
            };
            return Err(ClientError::Auth(reason));
        }

        let token: TokenResponse = resp.json().await.map_err(ClientError::http(SERVICE))?;
        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }

    fn files_url(&self, file_id: Option<&str>) -> ClientResult<Url> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::Decode("Drive API base cannot carry a path".into()))?;
            segments.pop_if_empty().extend(["drive", "v3", "files"]);
            if let Some(id) = file_id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl FileSource for DriveClient {
    async fn list_files(&self, folder_id: &str) -> ClientResult<Vec<FileDescriptor>> {
        let url = self.files_url(None)?;
        let query = format!(
            "'{}' in parents and trashed=false",
            escape_query_literal(folder_id)
        );

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let token = self.access_token().await?;
            let mut params = vec![
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("pageSize", PAGE_SIZE),
            ];
            if let Some(next) = page_token.as_deref() {
                params.push(("pageToken", next));
            }

            let resp = self
                .http
                .get(url.clone())
                .bearer_auth(&token)
                .query(&params)
                .send()
                .await
                .map_err(ClientError::http(SERVICE))?;
            let page: FileListPage = check_status(resp)
                .await?
                .json()
                .await
                .map_err(ClientError::http(SERVICE))?;

            debug!("Drive listing page returned {} files", page.files.len());
            files.extend(page.files);

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(files)
    }

    async fn download(&self, file_id: &str) -> ClientResult<ByteStream> {
        let url = self.files_url(Some(file_id))?;
        let token = self.access_token().await?;

        let resp = self
            .http
            .get(url)
            .bearer_auth(&token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(ClientError::http(SERVICE))?;
        let resp = check_status(resp).await?;

        Ok(resp.bytes_stream().map_err(io::Error::other).boxed())
    }
}

/// Escape a value for use inside a single-quoted Drive query literal.
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

async fn check_status(resp: Response) -> ClientResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    Err(ClientError::Remote {
        service: SERVICE,
        status,
        message,
    })
}
