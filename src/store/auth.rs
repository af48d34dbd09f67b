use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::StoreError;

const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// refresh a little before the reported expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a service-account key file that the token exchange needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenReply {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl ServiceAccountKey {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let not_usable = |reason: String| {
            StoreError::NotConfigured(format!("service-account key {}: {}", path.display(), reason))
        };
        let raw = fs::read_to_string(path).map_err(|e| not_usable(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| not_usable(e.to_string()))
    }

    /// Signed RS256 assertion for the JWT-bearer grant, issued at `now`.
    pub fn assertion(&self, now: i64) -> Result<String, StoreError> {
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| StoreError::NotConfigured(format!("service-account private key: {}", e)))?;
        let claims = Claims {
            iss: &self.client_email,
            scope: SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| StoreError::NotConfigured(format!("signing token request: {}", e)))
    }
}

/// How requests to the sheets API are authorized. A configured access token
/// wins over the service-account key file.
pub enum Credentials {
    Token(String),
    ServiceAccount {
        key: ServiceAccountKey,
        cached: Option<(String, Instant)>,
    },
}

impl Credentials {
    pub fn from_settings(settings: &Settings) -> Result<Self, StoreError> {
        if let Some(token) = settings
            .sheets_access_token
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            debug!("Using configured sheets access token");
            return Ok(Credentials::Token(token.to_string()));
        }
        let path = &settings.google_credentials_path;
        if !path.exists() {
            return Err(StoreError::NotConfigured(format!(
                "no sheets access token and no service-account key at {}",
                path.display()
            )));
        }
        let key = ServiceAccountKey::load(path)?;
        Ok(Credentials::ServiceAccount { key, cached: None })
    }

    /// Bearer token for the next request, exchanging the service-account
    /// assertion when there is no live cached token.
    pub fn bearer(&mut self, http: &Client) -> Result<String, StoreError> {
        match self {
            Credentials::Token(token) => Ok(token.clone()),
            Credentials::ServiceAccount { key, cached } => {
                if let Some((token, expires)) = cached.as_ref() {
                    if Instant::now() < *expires {
                        return Ok(token.clone());
                    }
                }
                let assertion = key.assertion(chrono::Utc::now().timestamp())?;
                let reply: TokenReply = http
                    .post(&key.token_uri)
                    .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
                    .send()
                    .and_then(|r| r.error_for_status())
                    .and_then(|r| r.json())
                    .map_err(|e| StoreError::Remote(format!("token exchange failed: {}", e)))?;
                info!("Authorized as {}", key.client_email);

                let lifetime = Duration::from_secs(reply.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS as u64));
                let expires = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);
                *cached = Some((reply.access_token.clone(), expires));
                Ok(reply.access_token)
            }
        }
    }
}
