//! Credential login against a mocked SSO, including the MFA challenge

use garmin_sheets_sync::cli::commands::auth::login_with;
use garmin_sheets_sync::client::{GarminClient, SsoClient, SsoEndpoints};
use garmin_sheets_sync::config::CredentialStore;
use garmin_sheets_sync::{GarminError, Result};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SIGNIN_PAGE: &str = r#"<html><head><title>GARMIN Authentication Application</title></head>
<body><form><input type="hidden" name="_csrf" value="csrf-7f3a" /></form></body></html>"#;

const MFA_PAGE: &str = r#"<html><head><title>GARMIN Authentication Application - MFA</title></head></html>"#;

const SUCCESS_PAGE: &str = r#"<html><head><title>Success</title></head>
<script>window.location = "https://sso.garmin.com/sso/embed?ticket=ST-0425-mfa-cas";</script></html>"#;

fn sso_client(server: &MockServer) -> SsoClient {
    SsoClient::with_endpoints(
        "garmin.com",
        SsoEndpoints {
            sso: format!("{}/sso", server.uri()),
            connectapi: server.uri(),
            consumer: format!("{}/oauth_consumer.json", server.uri()),
        },
    )
    .unwrap()
}

/// Everything except the credential form, which each test mounts itself
async fn mount_sso(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/sso/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sso/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SIGNIN_PAGE))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth_consumer.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "consumer_key": "consumer-key",
            "consumer_secret": "consumer-secret",
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth-service/oauth/preauthorized"))
        .and(query_param("ticket", "ST-0425-mfa-cas"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "oauth_token=oauth1-token&oauth_token_secret=oauth1-secret&mfa_token=mfa-7781",
        ))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth-service/oauth/exchange/user/2.0"))
        .and(body_string_contains("mfa_token=mfa-7781"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "scope": "CONNECT_READ",
            "jti": "jti-1",
            "token_type": "Bearer",
            "access_token": "fresh-access-token",
            "refresh_token": "fresh-refresh-token",
            "expires_in": 3600,
            "refresh_token_expires_in": 7200,
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userprofile-service/socialProfile"))
        .respond_with(ResponseTemplate::new(200).set_body_string(include_str!("fixtures/social_profile.json")))
        .mount(server)
        .await;
}

async fn mount_mfa_challenge(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/sso/signin"))
        .and(body_string_contains("username=runner%40example.com"))
        .and(body_string_contains("_csrf=csrf-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MFA_PAGE))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_mfa_code_completes_login_and_caches_tokens() {
    let server = MockServer::start().await;
    mount_sso(&server).await;
    mount_mfa_challenge(&server).await;
    Mock::given(method("POST"))
        .and(path("/sso/verifyMFA/loginEnterMfaCode"))
        .and(body_string_contains("mfa-code=123456"))
        .and(body_string_contains("fromPage=setupEnterMfaCode"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::with_dir("default", dir.path().to_path_buf()).unwrap();
    let client = GarminClient::new_with_base_url(&server.uri()).unwrap();
    let mut sso = sso_client(&server);

    let session = login_with(
        &store,
        &mut sso,
        &client,
        "runner@example.com",
        "hunter2",
        Some(|| Ok::<_, GarminError>(" 123456\n".to_string())),
    )
    .await
    .expect("login with MFA code");

    assert_eq!(session.display_name, "runner-4821");
    assert_eq!(session.tokens.oauth1.mfa_token.as_deref(), Some("mfa-7781"));
    assert_eq!(session.tokens.oauth2.access_token, "fresh-access-token");
    assert!(!session.tokens.oauth2.is_expired());

    let cached = store.load_session().unwrap().expect("tokens cached");
    assert_eq!(cached, session.tokens);
}

#[tokio::test]
async fn test_mfa_challenge_without_code_source_fails() {
    let server = MockServer::start().await;
    mount_sso(&server).await;
    mount_mfa_challenge(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::with_dir("default", dir.path().to_path_buf()).unwrap();
    let client = GarminClient::new_with_base_url(&server.uri()).unwrap();
    let mut sso = sso_client(&server);

    let err = login_with(
        &store,
        &mut sso,
        &client,
        "runner@example.com",
        "hunter2",
        None::<fn() -> Result<String>>,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, GarminError::MfaRequired));
    assert!(!store.has_session());
}

#[tokio::test]
async fn test_rejected_mfa_code_is_an_auth_error() {
    let server = MockServer::start().await;
    mount_sso(&server).await;
    mount_mfa_challenge(&server).await;
    Mock::given(method("POST"))
        .and(path("/sso/verifyMFA/loginEnterMfaCode"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><head><title>GARMIN Authentication Application - MFA</title></head></html>"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::with_dir("default", dir.path().to_path_buf()).unwrap();
    let client = GarminClient::new_with_base_url(&server.uri()).unwrap();
    let mut sso = sso_client(&server);

    let err = login_with(
        &store,
        &mut sso,
        &client,
        "runner@example.com",
        "hunter2",
        Some(|| Ok::<_, GarminError>("000000".to_string())),
    )
    .await
    .unwrap_err();

    match err {
        GarminError::Authentication(msg) => assert!(msg.contains("MFA verification failed")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!store.has_session());
}
