//! Token cache commands for garmin-sheets

use std::io::{self, Write};

use crate::client::session::{self, Session};
use crate::client::{GarminClient, SsoClient, DEFAULT_DOMAIN};
use crate::config::CredentialStore;
use crate::error::{GarminError, Result};

/// Execute the login command
pub async fn login(email: Option<String>, password: Option<String>, profile: Option<String>) -> Result<()> {
    let store = CredentialStore::new(profile)?;

    if let Some(cached) = store.load_session()? {
        if !cached.oauth2.is_expired() {
            println!("Already logged in. Use 'garmin-sheets auth logout' to log out first.");
            return Ok(());
        }
    }

    let email = match email.filter(|e| !e.trim().is_empty()) {
        Some(e) => e,
        None => prompt_line("Email: ")?,
    };
    let password = match password.filter(|p| !p.is_empty()) {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ")?,
    };

    println!("Logging in...");
    let mut sso = SsoClient::new(None)?;
    let client = GarminClient::new(DEFAULT_DOMAIN)?;
    let session = login_with(&store, &mut sso, &client, &email, &password, Some(prompt_mfa)).await?;

    println!("Successfully logged in as {}.", session.display_name);
    println!("Profile: {}", store.profile());
    println!("Run 'garmin-sheets auth export-session' to get a GARMIN_SESSION_BASE64 value.");
    Ok(())
}

/// Log in and cache the resulting tokens in `store`
pub async fn login_with<F>(
    store: &CredentialStore,
    sso: &mut SsoClient,
    client: &GarminClient,
    email: &str,
    password: &str,
    mfa_code: Option<F>,
) -> Result<Session>
where
    F: FnOnce() -> Result<String>,
{
    let session = session::login(sso, email, password, mfa_code, client).await?;
    store.save_session(&session.tokens)?;
    tracing::info!(profile = store.profile(), display_name = %session.display_name, "cached session tokens");
    Ok(session)
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_mfa() -> Result<String> {
    prompt_line("MFA Code: ")
}

/// Execute the logout command
pub async fn logout(profile: Option<String>) -> Result<()> {
    let store = CredentialStore::new(profile)?;

    if !store.has_session() {
        println!("Not logged in.");
        return Ok(());
    }

    store.clear()?;
    println!("Cleared cached tokens for profile '{}'.", store.profile());
    Ok(())
}

/// Execute the status command
pub async fn status(profile: Option<String>) -> Result<()> {
    let store = CredentialStore::new(profile)?;

    let Some(session) = store.load_session()? else {
        println!("Status: No cached session");
        println!("Run 'garmin-sheets auth login', or 'garmin-sheets sync' with GARMIN_SESSION_BASE64 or GARMIN_EMAIL/GARMIN_PASSWORD set.");
        return Ok(());
    };

    println!("Status: Cached session");
    println!("Profile: {}", store.profile());
    println!("Domain: {}", session.oauth1.domain);

    let oauth2 = &session.oauth2;
    if oauth2.is_expired() {
        println!("Access Token: Expired (will refresh on next sync)");
    } else {
        let expires_in = oauth2.expires_at - chrono::Utc::now().timestamp();
        if expires_in > 3600 {
            println!("Access Token: Valid (expires in {} hours)", expires_in / 3600);
        } else if expires_in > 60 {
            println!("Access Token: Valid (expires in {} minutes)", expires_in / 60);
        } else {
            println!("Access Token: Valid (expires in {} seconds)", expires_in);
        }
    }

    if session.oauth1.mfa_token.is_some() {
        println!("MFA: Enabled");
    }

    Ok(())
}

/// Print the cached session as a blob for `GARMIN_SESSION_BASE64`
pub async fn export_session(profile: Option<String>) -> Result<()> {
    let store = CredentialStore::new(profile)?;
    let session = store.load_session()?.ok_or(GarminError::NotAuthenticated)?;

    println!("{}", session.encode()?);
    Ok(())
}
