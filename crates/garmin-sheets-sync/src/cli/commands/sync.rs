//! Sync command for garmin-sheets

use chrono::{Local, NaiveDate};

use crate::client::session::AuthSources;
use crate::client::{authenticate, GarminClient, TelemetrySource, DEFAULT_DOMAIN};
use crate::config::CredentialStore;
use crate::error::{GarminError, Result};
use crate::store::{MemoryWorkbook, ServiceAccountKey, SheetsWorkbook, Workbook};
use crate::sync::{SyncEngine, SyncOptions};

/// Everything the sync command is configured with
#[derive(Debug, Default)]
pub struct SyncArgs {
    pub profile: Option<String>,
    pub session_blob: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub sheet_id: Option<String>,
    /// Service-account key, inline JSON or a path to the key file
    pub google_credentials: Option<String>,
    /// Bearer token used instead of the service account
    pub google_token: Option<String>,
    pub activities: bool,
    pub health: bool,
    pub limit: u32,
    pub days: u32,
    /// Last day of the health window, `YYYY-MM-DD`
    pub until: Option<String>,
    pub retries: u32,
    pub dry_run: bool,
}

impl SyncArgs {
    fn options(&self) -> SyncOptions {
        // Neither flag means both kinds.
        let sync_all = !self.activities && !self.health;
        SyncOptions {
            activities: self.activities || sync_all,
            health: self.health || sync_all,
            activity_limit: self.limit,
            health_days: self.days,
            dry_run: self.dry_run,
            ..Default::default()
        }
    }
}

/// Run one sync cycle
pub async fn run(args: SyncArgs) -> Result<()> {
    let today = match args.until.as_deref() {
        Some(date) => parse_date(date)?,
        None => Local::now().date_naive(),
    };
    let store = CredentialStore::new(args.profile.clone())?;
    let has_blob = args
        .session_blob
        .as_deref()
        .is_some_and(|b| !b.trim().is_empty());
    let cached = if has_blob {
        None
    } else {
        store.load_session().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable token cache");
            None
        })
    };

    let client = GarminClient::new(DEFAULT_DOMAIN)?.with_retries(args.retries);
    let sources = AuthSources {
        blob: args.session_blob.clone(),
        cached,
        email: args.email.clone(),
        password: args.password.clone(),
    };
    let session = authenticate(&sources, &client).await?;
    if let Err(e) = store.save_session(&session.tokens) {
        tracing::warn!(error = %e, "could not cache session tokens");
    }

    let options = args.options();
    let source = session.source(client);

    let sheet_id = args.sheet_id.as_deref().filter(|id| !id.trim().is_empty());
    let token = args.google_token.as_deref().filter(|t| !t.trim().is_empty());
    let credentials = args
        .google_credentials
        .as_deref()
        .filter(|c| !c.trim().is_empty());

    match (sheet_id, token, credentials) {
        (Some(sheet_id), Some(token), _) => {
            execute(source, SheetsWorkbook::new(sheet_id, token)?, options, today).await;
        }
        (Some(sheet_id), None, Some(credentials)) => {
            let key = load_service_account(credentials)?;
            let workbook = SheetsWorkbook::with_service_account(sheet_id, &key).await?;
            execute(source, workbook, options, today).await;
        }
        _ if args.dry_run => {
            println!("No spreadsheet configured, previewing against an empty sheet.");
            execute(source, MemoryWorkbook::new(), options, today).await;
        }
        (None, _, _) => return Err(GarminError::config("SHEET_ID is not set")),
        (Some(_), None, None) => {
            return Err(GarminError::config(
                "GOOGLE_CREDENTIALS (or GOOGLE_ACCESS_TOKEN) is not set",
            ))
        }
    }

    Ok(())
}

/// Inline key JSON, or the path of a key file
fn load_service_account(credentials: &str) -> Result<ServiceAccountKey> {
    let credentials = credentials.trim();
    if credentials.starts_with('{') {
        return ServiceAccountKey::from_json(credentials);
    }
    let json = std::fs::read_to_string(credentials).map_err(|e| {
        GarminError::config(format!("Cannot read service account key '{}': {}", credentials, e))
    })?;
    ServiceAccountKey::from_json(&json)
}

async fn execute<S: TelemetrySource, W: Workbook>(source: S, workbook: W, options: SyncOptions, today: NaiveDate) {
    let engine = SyncEngine::new(source, workbook, options);
    let report = engine.run(today).await;
    print!("\nSync complete.\n{}", report);
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| GarminError::InvalidDateFormat(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_kind_flags_selects_both() {
        let options = SyncArgs {
            limit: 30,
            days: 3,
            ..Default::default()
        }
        .options();
        assert!(options.activities && options.health);
        assert_eq!(options.activity_limit, 30);
        assert_eq!(options.health_days, 3);
    }

    #[test]
    fn test_single_kind_flag() {
        let options = SyncArgs {
            health: true,
            ..Default::default()
        }
        .options();
        assert!(options.health);
        assert!(!options.activities);
    }

    #[test]
    fn test_service_account_inline_or_file() {
        let json = include_str!("../../../tests/fixtures/service_account.json");
        let inline = load_service_account(json).unwrap();
        assert_eq!(inline.client_email, "sheets-sync@sheets-sync-test.iam.gserviceaccount.com");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");
        std::fs::write(&path, json).unwrap();
        let from_file = load_service_account(path.to_str().unwrap()).unwrap();
        assert_eq!(from_file.client_email, inline.client_email);

        let missing = dir.path().join("absent.json");
        assert!(matches!(
            load_service_account(missing.to_str().unwrap()),
            Err(GarminError::Config(_))
        ));
    }

    #[test]
    fn test_parse_until_date() {
        assert_eq!(parse_date("2024-03-01").unwrap(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(matches!(parse_date("03/01/2024"), Err(GarminError::InvalidDateFormat(_))));
    }
}
