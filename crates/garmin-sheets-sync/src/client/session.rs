//! Establishing an authenticated Connect session
//!
//! A session is resumed from a token pair when one is available (a session
//! blob or the local token cache) and otherwise created by a credential
//! login. Resuming refreshes an expired OAuth2 token and always confirms the
//! profile by reading its `displayName`.

use serde::Deserialize;

use crate::client::api::GarminClient;
use crate::client::source::ConnectSource;
use crate::client::sso::SsoClient;
use crate::client::tokens::SessionTokens;
use crate::error::{GarminError, Result};

/// An authenticated session bound to one profile
#[derive(Debug, Clone)]
pub struct Session {
    pub tokens: SessionTokens,
    pub display_name: String,
}

impl Session {
    /// Telemetry source reading this session's profile
    pub fn source(&self, client: GarminClient) -> ConnectSource {
        ConnectSource::new(client, self.tokens.oauth2.clone(), self.display_name.clone())
    }
}

/// Everything that can be used to authenticate, tried in order.
#[derive(Debug, Default, Clone)]
pub struct AuthSources {
    /// Base64 session blob
    pub blob: Option<String>,
    /// Token pair from the local cache
    pub cached: Option<SessionTokens>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocialProfile {
    display_name: Option<String>,
}

/// Resume a session from an existing token pair
pub async fn resume(mut tokens: SessionTokens, client: &GarminClient) -> Result<Session> {
    if tokens.oauth2.is_expired() {
        tracing::info!("access token expired, refreshing");
        let sso = SsoClient::new(Some(&tokens.oauth1.domain))?;
        tokens.oauth2 = sso.refresh_oauth2(&tokens.oauth1).await?;
    }

    let display_name = confirm_profile(&tokens, client).await?;
    Ok(Session {
        tokens,
        display_name,
    })
}

/// Create a session with an SSO credential login.
///
/// `mfa_code` answers an MFA challenge; without it such accounts fail with
/// [`GarminError::MfaRequired`].
pub async fn login<F>(
    sso: &mut SsoClient,
    email: &str,
    password: &str,
    mfa_code: Option<F>,
    client: &GarminClient,
) -> Result<Session>
where
    F: FnOnce() -> Result<String>,
{
    let tokens = sso.login(email, password, mfa_code).await?;
    let display_name = confirm_profile(&tokens, client).await?;
    Ok(Session {
        tokens,
        display_name,
    })
}

/// Try the token pair first (blob, else cache), then credentials.
pub async fn authenticate(sources: &AuthSources, client: &GarminClient) -> Result<Session> {
    let mut failures: Vec<String> = Vec::new();

    match resumable(sources) {
        Ok(Some((origin, tokens))) => match resume(tokens, client).await {
            Ok(session) => {
                tracing::info!(origin, profile = %session.display_name, "resumed session");
                return Ok(session);
            }
            Err(e) => {
                tracing::warn!(origin, error = %e, "session resume failed, falling back to credentials");
                failures.push(format!("{} resume: {}", origin, e));
            }
        },
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, "session blob unusable, falling back to credentials");
            failures.push(e.to_string());
        }
    }

    match (sources.email.as_deref(), sources.password.as_deref()) {
        (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
            let mut sso = SsoClient::new(None)?;
            match login(&mut sso, email, password, None::<fn() -> Result<String>>, client).await {
                Ok(session) => {
                    tracing::info!(profile = %session.display_name, "logged in with credentials");
                    return Ok(session);
                }
                Err(GarminError::MfaRequired) => return Err(GarminError::MfaRequired),
                Err(e) => failures.push(format!("credential login: {}", e)),
            }
        }
        _ if failures.is_empty() => return Err(GarminError::NotAuthenticated),
        _ => failures.push("no credentials supplied".to_string()),
    }

    Err(GarminError::auth(failures.join("; ")))
}

fn resumable(sources: &AuthSources) -> Result<Option<(&'static str, SessionTokens)>> {
    match sources.blob.as_deref().filter(|b| !b.trim().is_empty()) {
        Some(blob) => SessionTokens::decode(blob).map(|t| Some(("session blob", t))),
        None => Ok(sources.cached.clone().map(|t| ("token cache", t))),
    }
}

async fn confirm_profile(tokens: &SessionTokens, client: &GarminClient) -> Result<String> {
    let profile: SocialProfile = client
        .get_json(&tokens.oauth2, "/userprofile-service/socialProfile")
        .await?;

    profile
        .display_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| GarminError::auth("Profile has no displayName"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_nothing_to_authenticate_with() {
        let client = GarminClient::new_with_base_url("http://127.0.0.1:9").unwrap();
        let err = authenticate(&AuthSources::default(), &client).await.unwrap_err();
        assert!(matches!(err, GarminError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_bad_blob_without_credentials_is_fatal() {
        let client = GarminClient::new_with_base_url("http://127.0.0.1:9").unwrap();
        let sources = AuthSources {
            blob: Some("not-a-session".to_string()),
            ..Default::default()
        };
        let err = authenticate(&sources, &client).await.unwrap_err();
        match err {
            GarminError::Authentication(msg) => {
                assert!(msg.contains("session blob"));
                assert!(msg.contains("no credentials supplied"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_blob_takes_precedence_over_cache() {
        let tokens = SessionTokens {
            oauth1: crate::client::OAuth1Token::new("a".into(), "b".into()),
            oauth2: crate::client::tokens::test_oauth2(0),
        };
        let sources = AuthSources {
            blob: Some(tokens.encode().unwrap()),
            cached: Some(tokens.clone()),
            ..Default::default()
        };
        let (origin, _) = resumable(&sources).unwrap().unwrap();
        assert_eq!(origin, "session blob");

        let cache_only = AuthSources {
            blob: Some("  ".to_string()),
            cached: Some(tokens),
            ..Default::default()
        };
        let (origin, _) = resumable(&cache_only).unwrap().unwrap();
        assert_eq!(origin, "token cache");
    }
}
