//! Garmin SSO credential login
//!
//! Flow: embed widget (cookies) → signin page (CSRF) → credential form
//! (service ticket, or an MFA challenge answered with a one-time code) →
//! preauthorized OAuth1 token → OAuth2 exchange.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, REFERER, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;

use crate::client::oauth1::{parse_form_body, OAuth1Signer, OAuthConsumer};
use crate::client::tokens::{OAuth1Token, OAuth2Token, SessionTokens};
use crate::error::{GarminError, Result};

pub const DEFAULT_DOMAIN: &str = "garmin.com";

/// User agent of the Connect mobile app, expected by the OAuth endpoints
const MOBILE_USER_AGENT: &str = "com.garmin.android.apps.connectmobile";

/// User agent for the SSO pages
const SSO_USER_AGENT: &str = "GCM-iOS-5.7.2.1";

/// Published consumer credentials for the OAuth1 step
const OAUTH_CONSUMER_URL: &str = "https://thegarth.s3.amazonaws.com/oauth_consumer.json";

#[derive(Debug, Deserialize)]
struct ConsumerResponse {
    consumer_key: String,
    consumer_secret: String,
}

/// Where the login flow sends its requests
#[derive(Debug, Clone)]
pub struct SsoEndpoints {
    /// SSO root, e.g. `https://sso.garmin.com/sso`
    pub sso: String,
    /// Connect API root hosting the OAuth service
    pub connectapi: String,
    /// Consumer credentials document
    pub consumer: String,
}

impl SsoEndpoints {
    pub fn for_domain(domain: &str) -> Self {
        Self {
            sso: format!("https://sso.{}/sso", domain),
            connectapi: format!("https://connectapi.{}", domain),
            consumer: OAUTH_CONSUMER_URL.to_string(),
        }
    }
}

/// Outcome of submitting the credential form
enum SigninPage {
    Ticket(String),
    MfaRequired,
}

pub struct SsoClient {
    client: Client,
    domain: String,
    endpoints: SsoEndpoints,
    referer: Option<String>,
}

impl SsoClient {
    pub fn new(domain: Option<&str>) -> Result<Self> {
        let domain = domain.unwrap_or(DEFAULT_DOMAIN);
        Self::with_endpoints(domain, SsoEndpoints::for_domain(domain))
    }

    /// Create a client with explicit endpoints (for testing)
    #[doc(hidden)]
    pub fn with_endpoints(domain: &str, endpoints: SsoEndpoints) -> Result<Self> {
        let client = Client::builder()
            .cookie_provider(Arc::new(Jar::default()))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(GarminError::Http)?;

        Ok(Self {
            client,
            domain: domain.to_string(),
            endpoints,
            referer: None,
        })
    }

    fn sso_base(&self) -> String {
        self.endpoints.sso.trim_end_matches('/').to_string()
    }

    fn signin_query(&self) -> Vec<(&'static str, String)> {
        let embed = format!("{}/embed", self.sso_base());
        vec![
            ("id", "gauth-widget".to_string()),
            ("embedWidget", "true".to_string()),
            ("gauthHost", embed.clone()),
            ("service", embed.clone()),
            ("source", embed.clone()),
            ("redirectAfterAccountLoginUrl", embed.clone()),
            ("redirectAfterAccountCreationUrl", embed),
        ]
    }

    /// Log in with email and password.
    ///
    /// When the account asks for a one-time code, `mfa_code` is called to
    /// supply it. Without one the login fails with
    /// [`GarminError::MfaRequired`].
    pub async fn login<F>(&mut self, email: &str, password: &str, mfa_code: Option<F>) -> Result<SessionTokens>
    where
        F: FnOnce() -> Result<String>,
    {
        let csrf = self.fetch_csrf().await?;
        let ticket = match self.submit_credentials(email, password, &csrf).await? {
            SigninPage::Ticket(ticket) => ticket,
            SigninPage::MfaRequired => {
                let prompt = mfa_code.ok_or(GarminError::MfaRequired)?;
                let code = prompt()?;
                self.submit_mfa(code.trim(), &csrf).await?
            }
        };

        let consumer = self.fetch_consumer().await?;
        let oauth1 = self.preauthorize(&consumer, &ticket).await?;
        let oauth2 = self.exchange(&consumer, &oauth1).await?;

        Ok(SessionTokens { oauth1, oauth2 })
    }

    /// Trade a still-valid OAuth1 token for a fresh OAuth2 token
    pub async fn refresh_oauth2(&self, oauth1: &OAuth1Token) -> Result<OAuth2Token> {
        let consumer = self.fetch_consumer().await?;
        self.exchange(&consumer, oauth1).await
    }

    async fn fetch_csrf(&mut self) -> Result<String> {
        let base = self.sso_base();
        self.client
            .get(format!("{}/embed", base))
            .query(&[
                ("id", "gauth-widget"),
                ("embedWidget", "true"),
                ("gauthHost", base.as_str()),
            ])
            .header(USER_AGENT, SSO_USER_AGENT)
            .send()
            .await
            .map_err(GarminError::Http)?
            .text()
            .await
            .map_err(GarminError::Http)?;

        let response = self
            .client
            .get(format!("{}/signin", base))
            .query(&self.signin_query())
            .header(USER_AGENT, SSO_USER_AGENT)
            .send()
            .await
            .map_err(GarminError::Http)?;
        self.referer = Some(response.url().to_string());
        let html = response.text().await.map_err(GarminError::Http)?;

        capture(csrf_re(), &html).ok_or_else(|| GarminError::invalid_response("Could not find CSRF token"))
    }

    async fn submit_credentials(&mut self, email: &str, password: &str, csrf: &str) -> Result<SigninPage> {
        let mut request = self
            .client
            .post(format!("{}/signin", self.sso_base()))
            .query(&self.signin_query())
            .header(USER_AGENT, SSO_USER_AGENT)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&[
                ("username", email),
                ("password", password),
                ("embed", "true"),
                ("_csrf", csrf),
            ]);
        if let Some(referer) = &self.referer {
            request = request.header(REFERER, referer.as_str());
        }

        let response = request.send().await.map_err(GarminError::Http)?;
        self.referer = Some(response.url().to_string());
        let html = response.text().await.map_err(GarminError::Http)?;

        let title = page_title(&html)?;
        if title.contains("MFA") {
            return Ok(SigninPage::MfaRequired);
        }
        if title != "Success" {
            return Err(GarminError::auth(format!("Unexpected login response: {}", title)));
        }
        ticket(&html).map(SigninPage::Ticket)
    }

    async fn submit_mfa(&mut self, code: &str, csrf: &str) -> Result<String> {
        let mut request = self
            .client
            .post(format!("{}/verifyMFA/loginEnterMfaCode", self.sso_base()))
            .query(&self.signin_query())
            .header(USER_AGENT, SSO_USER_AGENT)
            .form(&[
                ("mfa-code", code),
                ("embed", "true"),
                ("_csrf", csrf),
                ("fromPage", "setupEnterMfaCode"),
            ]);
        if let Some(referer) = &self.referer {
            request = request.header(REFERER, referer.as_str());
        }

        let response = request.send().await.map_err(GarminError::Http)?;
        self.referer = Some(response.url().to_string());
        let html = response.text().await.map_err(GarminError::Http)?;

        let title = page_title(&html)?;
        if title != "Success" {
            return Err(GarminError::auth(format!("MFA verification failed: {}", title)));
        }
        ticket(&html)
    }

    async fn fetch_consumer(&self) -> Result<OAuthConsumer> {
        let consumer: ConsumerResponse = self
            .client
            .get(&self.endpoints.consumer)
            .send()
            .await
            .map_err(GarminError::Http)?
            .json()
            .await
            .map_err(|e| GarminError::invalid_response(format!("Failed to parse OAuth consumer: {}", e)))?;

        Ok(OAuthConsumer {
            key: consumer.consumer_key,
            secret: consumer.consumer_secret,
        })
    }

    async fn preauthorize(&self, consumer: &OAuthConsumer, ticket: &str) -> Result<OAuth1Token> {
        let url = format!(
            "{}/oauth-service/oauth/preauthorized?ticket={}&login-url={}/embed&accepts-mfa-tokens=true",
            self.endpoints.connectapi.trim_end_matches('/'),
            ticket,
            self.sso_base()
        );
        let authorization = OAuth1Signer::new(consumer.clone()).authorization("GET", &url, &[])?;

        // The OAuth endpoints reject requests that carry the SSO cookies.
        let response = plain_client()?
            .get(&url)
            .header(USER_AGENT, MOBILE_USER_AGENT)
            .header("Authorization", authorization)
            .send()
            .await
            .map_err(GarminError::Http)?;

        if !response.status().is_success() {
            return Err(GarminError::auth(format!(
                "Failed to get OAuth1 token: {}",
                response.status()
            )));
        }

        let body = response.text().await.map_err(GarminError::Http)?;
        let mut params = parse_form_body(&body);
        let token = params
            .remove("oauth_token")
            .ok_or_else(|| GarminError::invalid_response("Missing oauth_token"))?;
        let secret = params
            .remove("oauth_token_secret")
            .ok_or_else(|| GarminError::invalid_response("Missing oauth_token_secret"))?;

        let mut oauth1 = OAuth1Token::new(token, secret).with_domain(&self.domain);
        oauth1.mfa_token = params.remove("mfa_token").filter(|m| !m.is_empty());
        Ok(oauth1)
    }

    async fn exchange(&self, consumer: &OAuthConsumer, oauth1: &OAuth1Token) -> Result<OAuth2Token> {
        let url = format!(
            "{}/oauth-service/oauth/exchange/user/2.0",
            self.endpoints.connectapi.trim_end_matches('/')
        );
        let form: Vec<(&str, &str)> = oauth1
            .mfa_token
            .as_deref()
            .map(|mfa| vec![("mfa_token", mfa)])
            .unwrap_or_default();

        let authorization = OAuth1Signer::new(consumer.clone())
            .with_token(&oauth1.oauth_token, &oauth1.oauth_token_secret)
            .authorization("POST", &url, &form)?;

        let response = plain_client()?
            .post(&url)
            .header(USER_AGENT, MOBILE_USER_AGENT)
            .header("Authorization", authorization)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&form)
            .send()
            .await
            .map_err(GarminError::Http)?;

        if !response.status().is_success() {
            return Err(GarminError::auth(format!(
                "Failed to exchange OAuth1 for OAuth2: {}",
                response.status()
            )));
        }

        let mut token: OAuth2Token = response
            .json()
            .await
            .map_err(|e| GarminError::invalid_response(format!("Failed to parse OAuth2 token: {}", e)))?;
        token.stamp_expiry();
        Ok(token)
    }
}

fn plain_client() -> Result<Client> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(GarminError::Http)
}

fn page_title(html: &str) -> Result<String> {
    capture(title_re(), html).ok_or_else(|| GarminError::invalid_response("Could not find page title"))
}

fn ticket(html: &str) -> Result<String> {
    capture(ticket_re(), html).ok_or_else(|| GarminError::invalid_response("Could not find ticket in response"))
}

fn capture(re: &Regex, html: &str) -> Option<String> {
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn csrf_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"name="_csrf"\s+value="([^"]+)""#).expect("valid regex"))
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<title>([^<]+)</title>").expect("valid regex"))
}

fn ticket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"embed\?ticket=([^"]+)""#).expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_csrf_token() {
        let html = r#"<input type="hidden" name="_csrf" value="abc123xyz" />"#;
        assert_eq!(capture(csrf_re(), html).as_deref(), Some("abc123xyz"));
        assert_eq!(capture(csrf_re(), "<html></html>"), None);
    }

    #[test]
    fn test_extract_title_and_ticket() {
        let html = r#"<title>Success</title><script>var u = "https://sso.garmin.com/sso/embed?ticket=ST-0123-abc";</script>"#;
        assert_eq!(capture(title_re(), html).as_deref(), Some("Success"));
        assert_eq!(capture(ticket_re(), html).as_deref(), Some("ST-0123-abc"));
        assert_eq!(
            capture(title_re(), "<title>GARMIN Authentication Application - MFA</title>").as_deref(),
            Some("GARMIN Authentication Application - MFA")
        );
    }

    #[test]
    fn test_signin_query_targets_embed() {
        let client = SsoClient::new(Some("garmin.cn")).unwrap();
        let query = client.signin_query();
        assert_eq!(query.len(), 7);
        assert!(query
            .iter()
            .any(|(k, v)| *k == "service" && v == "https://sso.garmin.cn/sso/embed"));
    }

    #[test]
    fn test_endpoints_follow_domain() {
        let endpoints = SsoEndpoints::for_domain("garmin.cn");
        assert_eq!(endpoints.sso, "https://sso.garmin.cn/sso");
        assert_eq!(endpoints.connectapi, "https://connectapi.garmin.cn");
        assert_eq!(endpoints.consumer, OAUTH_CONSUMER_URL);
    }
}
