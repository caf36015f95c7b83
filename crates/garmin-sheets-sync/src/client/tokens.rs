use std::io::{Cursor, Read};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use zip::ZipArchive;

use crate::error::{GarminError, Result};

/// OAuth1 token obtained after SSO login.
/// Long-lived (~1 year), exchanged for short-lived OAuth2 tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuth1Token {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_token: Option<String>,
    #[serde(default = "default_domain", deserialize_with = "domain_or_default")]
    pub domain: String,
}

fn default_domain() -> String {
    "garmin.com".to_string()
}

fn domain_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|d| !d.is_empty())
        .unwrap_or_else(default_domain))
}

impl OAuth1Token {
    pub fn new(oauth_token: String, oauth_token_secret: String) -> Self {
        Self {
            oauth_token,
            oauth_token_secret,
            mfa_token: None,
            domain: default_domain(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }
}

/// OAuth2 bearer token for Connect API requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuth2Token {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub jti: String,
    pub token_type: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub refresh_token_expires_in: i64,
    #[serde(default)]
    pub refresh_token_expires_at: i64,
}

impl OAuth2Token {
    /// Set the absolute expiry times from the relative ones, counted from now.
    pub fn stamp_expiry(&mut self) {
        let now = Utc::now().timestamp();
        self.expires_at = now + self.expires_in;
        self.refresh_token_expires_at = now + self.refresh_token_expires_in;
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now().timestamp()
    }

    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// The token pair that makes up a resumable session.
///
/// Serialized as base64 over JSON so it fits in a single environment
/// variable (`GARMIN_SESSION_BASE64`). Decoding also accepts base64 of a
/// zip archive holding `oauth1_token.json` and `oauth2_token.json`, the
/// layout garth saves a session in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionTokens {
    pub oauth1: OAuth1Token,
    pub oauth2: OAuth2Token,
}

impl SessionTokens {
    pub fn encode(&self) -> Result<String> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }

    pub fn decode(blob: &str) -> Result<Self> {
        let compact: String = blob.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(GarminError::session("session blob is empty"));
        }
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| GarminError::session(format!("session blob is not base64: {}", e)))?;
        if bytes.starts_with(ZIP_MAGIC) {
            return Self::from_archive(&bytes);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| GarminError::session(format!("session blob is not a token pair: {}", e)))
    }

    fn from_archive(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| GarminError::session(format!("session archive is unreadable: {}", e)))?;

        Ok(Self {
            oauth1: archive_entry(&mut archive, OAUTH1_ENTRY)?,
            oauth2: archive_entry(&mut archive, OAUTH2_ENTRY)?,
        })
    }
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OAUTH1_ENTRY: &str = "oauth1_token.json";
const OAUTH2_ENTRY: &str = "oauth2_token.json";

/// Parse the entry named `file_name`, at the archive root or in a directory
fn archive_entry<T: DeserializeOwned>(archive: &mut ZipArchive<Cursor<&[u8]>>, file_name: &str) -> Result<T> {
    let name = archive
        .file_names()
        .find(|n| *n == file_name || n.ends_with(&format!("/{}", file_name)))
        .map(str::to_string)
        .ok_or_else(|| GarminError::session(format!("session archive has no {}", file_name)))?;

    let mut contents = String::new();
    archive
        .by_name(&name)
        .map_err(|e| GarminError::session(format!("cannot open {}: {}", name, e)))?
        .read_to_string(&mut contents)?;

    serde_json::from_str(&contents)
        .map_err(|e| GarminError::session(format!("{} is not a token: {}", name, e)))
}

#[cfg(test)]
pub(crate) fn test_oauth2(expires_at: i64) -> OAuth2Token {
    OAuth2Token {
        scope: "test".to_string(),
        jti: "jti123".to_string(),
        token_type: "Bearer".to_string(),
        access_token: "test-access-token".to_string(),
        refresh_token: "refresh123".to_string(),
        expires_in: 3600,
        expires_at,
        refresh_token_expires_in: 86400,
        refresh_token_expires_at: expires_at + 86400,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionTokens {
        SessionTokens {
            oauth1: OAuth1Token::new("tok".into(), "secret".into()),
            oauth2: test_oauth2(Utc::now().timestamp() + 3600),
        }
    }

    #[test]
    fn test_oauth1_defaults_domain() {
        let token: OAuth1Token =
            serde_json::from_str(r#"{"oauth_token":"a","oauth_token_secret":"b"}"#).unwrap();
        assert_eq!(token.domain, "garmin.com");
        assert!(token.mfa_token.is_none());
        assert_eq!(token.with_domain("garmin.cn").domain, "garmin.cn");
    }

    #[test]
    fn test_oauth2_expiry() {
        assert!(test_oauth2(0).is_expired());
        assert!(!test_oauth2(Utc::now().timestamp() + 3600).is_expired());

        let mut fresh = test_oauth2(0);
        fresh.stamp_expiry();
        assert!(!fresh.is_expired());
        assert!(fresh.refresh_token_expires_at > fresh.expires_at);
    }

    #[test]
    fn test_authorization_header() {
        assert_eq!(test_oauth2(0).authorization_header(), "Bearer test-access-token");
    }

    #[test]
    fn test_session_blob_roundtrip() {
        let original = session();
        let blob = original.encode().unwrap();
        assert_eq!(SessionTokens::decode(&blob).unwrap(), original);

        let wrapped: String = blob
            .as_bytes()
            .chunks(20)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(SessionTokens::decode(&wrapped).unwrap(), original);
    }

    #[test]
    fn test_garth_archive_blob() {
        let blob = include_str!("../../tests/fixtures/garth_session.b64");
        let session = SessionTokens::decode(blob).unwrap();

        assert_eq!(session.oauth1.oauth_token, "garth-oauth1-token");
        assert_eq!(session.oauth1.oauth_token_secret, "garth-oauth1-secret");
        assert_eq!(session.oauth1.domain, "garmin.com");
        assert!(session.oauth1.mfa_token.is_none());
        assert_eq!(session.oauth2.access_token, "garth-access-token");
        assert_eq!(session.oauth2.expires_at, 1709280000);
        assert!(session.oauth2.is_expired());
    }

    #[test]
    fn test_incomplete_archive_is_a_session_error() {
        let blob = include_str!("../../tests/fixtures/garth_session_no_oauth2.b64");
        match SessionTokens::decode(blob) {
            Err(GarminError::Session(msg)) => assert!(msg.contains("oauth2_token.json")),
            other => panic!("unexpected result: {other:?}"),
        }

        let mut truncated = b"PK\x03\x04".to_vec();
        truncated.extend_from_slice(&[0; 8]);
        assert!(matches!(
            SessionTokens::decode(&STANDARD.encode(&truncated)),
            Err(GarminError::Session(_))
        ));
    }

    #[test]
    fn test_null_domain_falls_back() {
        let token: OAuth1Token = serde_json::from_str(
            r#"{"oauth_token":"a","oauth_token_secret":"b","mfa_token":null,"mfa_expiration_timestamp":null,"domain":null}"#,
        )
        .unwrap();
        assert_eq!(token.domain, "garmin.com");
    }

    #[test]
    fn test_malformed_session_blob() {
        assert!(matches!(SessionTokens::decode(""), Err(GarminError::Session(_))));
        assert!(matches!(SessionTokens::decode("%%%"), Err(GarminError::Session(_))));
        let not_tokens = STANDARD.encode(b"{\"hello\":1}");
        assert!(matches!(SessionTokens::decode(&not_tokens), Err(GarminError::Session(_))));
    }
}
