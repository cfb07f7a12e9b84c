//! Google service-account credential decoded from a base64 configuration value.

use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("service account credential is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("service account credential is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("service account credential is missing `{0}`")]
    MissingField(&'static str),
}

/// The subset of a service-account key file needed to mint access tokens.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountCredential {
    #[serde(default)]
    pub client_email: String,

    /// PEM-encoded RSA private key.
    #[serde(default)]
    pub private_key: String,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountCredential {
    /// Decode `base64(json)` and check that the identity and key are present.
    pub fn from_base64(encoded: &str) -> Result<Self, CredentialError> {
        let raw = general_purpose::STANDARD.decode(encoded.trim())?;
        let credential: Self = serde_json::from_slice(&raw)?;
        credential.validate()?;
        Ok(credential)
    }

    fn validate(&self) -> Result<(), CredentialError> {
        if self.client_email.trim().is_empty() {
            return Err(CredentialError::MissingField("client_email"));
        }
        if self.private_key.trim().is_empty() {
            return Err(CredentialError::MissingField("private_key"));
        }
        Ok(())
    }
}

impl fmt::Debug for ServiceAccountCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredential")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}
