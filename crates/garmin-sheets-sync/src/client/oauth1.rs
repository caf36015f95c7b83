//! HMAC-SHA1 OAuth1 signing for the Garmin token exchange endpoints

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::error::{GarminError, Result};

/// RFC 5849 unreserved characters stay as they are, everything else is
/// percent-encoded.
const OAUTH_RESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Consumer key pair published for the Garmin mobile app
#[derive(Debug, Clone)]
pub struct OAuthConsumer {
    pub key: String,
    pub secret: String,
}

/// Signs requests with the consumer and, once known, the user's OAuth1 token
pub struct OAuth1Signer {
    consumer: OAuthConsumer,
    token: Option<(String, String)>,
}

impl OAuth1Signer {
    pub fn new(consumer: OAuthConsumer) -> Self {
        Self {
            consumer,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, secret: impl Into<String>) -> Self {
        self.token = Some((token.into(), secret.into()));
        self
    }

    /// `Authorization` header value for a request
    pub fn authorization(&self, method: &str, url: &str, form: &[(&str, &str)]) -> Result<String> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
            .to_string();
        let nonce: String = (0..16)
            .map(|_| format!("{:02x}", rand::random::<u8>()))
            .collect();

        self.authorization_at(method, url, form, &timestamp, &nonce)
    }

    /// Deterministic variant of [`authorization`](Self::authorization)
    pub fn authorization_at(
        &self,
        method: &str,
        url: &str,
        form: &[(&str, &str)],
        timestamp: &str,
        nonce: &str,
    ) -> Result<String> {
        let parsed = Url::parse(url)
            .map_err(|e| GarminError::auth(format!("Cannot sign malformed URL {}: {}", url, e)))?;
        let base_url = format!(
            "{}://{}{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or_default(),
            parsed.path()
        );

        let mut protocol: BTreeMap<String, String> = BTreeMap::new();
        protocol.insert("oauth_consumer_key".into(), self.consumer.key.clone());
        protocol.insert("oauth_nonce".into(), nonce.into());
        protocol.insert("oauth_signature_method".into(), "HMAC-SHA1".into());
        protocol.insert("oauth_timestamp".into(), timestamp.into());
        protocol.insert("oauth_version".into(), "1.0".into());
        if let Some((token, _)) = &self.token {
            protocol.insert("oauth_token".into(), token.clone());
        }

        let mut signed = protocol.clone();
        signed.extend(parsed.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())));
        signed.extend(form.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let params = signed
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let base_string = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            encode(&base_url),
            encode(&params)
        );

        let token_secret = self.token.as_ref().map(|(_, s)| s.as_str()).unwrap_or_default();
        let key = format!("{}&{}", encode(&self.consumer.secret), encode(token_secret));
        let mut mac = Hmac::<sha1::Sha1>::new_from_slice(key.as_bytes())
            .map_err(|e| GarminError::auth(format!("Cannot build signing key: {}", e)))?;
        mac.update(base_string.as_bytes());
        let signature = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            mac.finalize().into_bytes(),
        );
        protocol.insert("oauth_signature".into(), signature);

        let header = protocol
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {}", header))
    }
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_RESERVED).to_string()
}

/// Parse a `key=value&key=value` token response body.
pub fn parse_form_body(body: &str) -> BTreeMap<String, String> {
    body.trim()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| {
            (
                urlencoding::decode(k).map(|s| s.into_owned()).unwrap_or_default(),
                urlencoding::decode(v).map(|s| s.into_owned()).unwrap_or_default(),
            )
        })
        .collect()
}
