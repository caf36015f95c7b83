//! Service-account authorization for the Sheets API
//!
//! A service-account key (the JSON file downloaded from the Cloud console)
//! is traded for a short-lived bearer token by posting a signed RS256 JWT to
//! the key's token endpoint.

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{GarminError, Result};

/// Scopes requested for the access token
pub const SHEETS_SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a service-account key file this program needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    pub client_email: String,
    /// PEM-encoded RSA private key
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
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl ServiceAccountKey {
    /// Parse the contents of a key file
    pub fn from_json(json: &str) -> Result<Self> {
        let key: Self = serde_json::from_str(json.trim())
            .map_err(|e| GarminError::config(format!("Invalid service account credentials: {}", e)))?;

        match key.key_type.as_deref() {
            None | Some("service_account") => Ok(key),
            Some(other) => Err(GarminError::config(format!(
                "Expected a service_account key, got '{}'",
                other
            ))),
        }
    }

    /// Signed JWT asserting this account, valid for an hour from `issued_at`
    pub fn assertion(&self, issued_at: i64) -> Result<String> {
        let claims = Claims {
            iss: &self.client_email,
            scope: SHEETS_SCOPES,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| GarminError::config(format!("Invalid service account private key: {}", e)))?;

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| GarminError::config(format!("Failed to sign token request: {}", e)))
    }

    /// Exchange a fresh assertion for an access token
    pub async fn access_token(&self, client: &Client) -> Result<String> {
        let assertion = self.assertion(chrono::Utc::now().timestamp())?;

        let response = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(GarminError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GarminError::store(format!(
                "service account token exchange failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            GarminError::invalid_response(format!("Failed to parse token response: {}", e))
        })?;
        tracing::debug!(account = %self.client_email, expires_in = ?token.expires_in, "obtained Sheets access token");
        Ok(token.access_token)
    }
}
