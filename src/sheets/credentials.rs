use anyhow::{bail, Context, Result};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields we need from a Google service-account key file
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ServiceAccountKey {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse credentials: {}", path.display()))
    }

    /// Signed JWT asserting this account wants the spreadsheets scope
    fn assertion(&self, issued_at: i64) -> Result<String> {
        let claims = Claims {
            iss: &self.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .context("Service account private_key is not a valid RSA PEM key")?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .context("Failed to sign token assertion")
    }

    /// Exchange a signed assertion for a bearer token
    pub fn fetch_access_token(&self, client: &reqwest::blocking::Client) -> Result<String> {
        let assertion = self.assertion(chrono::Utc::now().timestamp())?;

        debug!(account = %self.client_email, "requesting access token");
        let response: TokenResponse = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .context("Failed to reach token endpoint")?
            .json()
            .context("Failed to parse token response")?;

        match response.access_token {
            Some(token) => Ok(token),
            None => bail!(
                "Token request for {} rejected: {} {}",
                self.client_email,
                response.error.unwrap_or_default(),
                response.error_description.unwrap_or_default()
            ),
        }
    }
}
