//! Google Sheets v4 values API backend
//!
//! Authorization is a bearer access token, either minted from a
//! service-account key ([`ServiceAccountKey`]) or supplied directly.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Cell, ColumnSpan, ServiceAccountKey, TabularStore, Workbook};
use crate::error::{GarminError, Result};

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// A spreadsheet addressed by id.
#[derive(Clone)]
pub struct SheetsWorkbook {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
}

impl SheetsWorkbook {
    pub fn new(spreadsheet_id: &str, access_token: &str) -> Result<Self> {
        Self::new_with_base_url(SHEETS_BASE_URL, spreadsheet_id, access_token)
    }

    /// Authorize with a service-account key
    pub async fn with_service_account(spreadsheet_id: &str, key: &ServiceAccountKey) -> Result<Self> {
        Self::with_service_account_at(SHEETS_BASE_URL, spreadsheet_id, key).await
    }

    /// [`Self::with_service_account`] against a custom API base URL (for testing)
    #[doc(hidden)]
    pub async fn with_service_account_at(
        base_url: &str,
        spreadsheet_id: &str,
        key: &ServiceAccountKey,
    ) -> Result<Self> {
        let mut book = Self::new_with_base_url(base_url, spreadsheet_id, "")?;
        book.access_token = key.access_token(&book.client).await?;
        Ok(book)
    }

    /// Create a workbook against a custom API base URL (for testing)
    #[doc(hidden)]
    pub fn new_with_base_url(base_url: &str, spreadsheet_id: &str, access_token: &str) -> Result<Self> {
        if spreadsheet_id.trim().is_empty() {
            return Err(GarminError::config("spreadsheet id is empty"));
        }
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(GarminError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            access_token: access_token.to_string(),
        })
    }
}

impl Workbook for SheetsWorkbook {
    type Sheet = SheetsStore;

    fn worksheet(&self, name: &str) -> Result<SheetsStore> {
        if name.is_empty() {
            return Err(GarminError::config("worksheet name is empty"));
        }
        Ok(SheetsStore {
            book: self.clone(),
            title: name.to_string(),
        })
    }
}

/// One worksheet (tab) of a spreadsheet.
pub struct SheetsStore {
    book: SheetsWorkbook,
    title: String,
}

impl SheetsStore {
    /// A1 range for the whole sheet or a part of it.
    fn range(&self, cells: Option<&str>) -> String {
        let quoted = format!("'{}'", self.title.replace('\'', "''"));
        match cells {
            Some(cells) => format!("{}!{}", quoted, cells),
            None => quoted,
        }
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{}",
            self.book.base_url,
            self.book.spreadsheet_id,
            urlencoding::encode(range),
            suffix
        )
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.book.access_token))
            .map_err(|e| GarminError::config(format!("Invalid access token: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                GarminError::store(format!("access to '{}' denied: {}", self.title, body))
            }
            StatusCode::TOO_MANY_REQUESTS => GarminError::RateLimited,
            _ => GarminError::store(format!("{} on '{}': {}", status, self.title, body)),
        })
    }
}

#[async_trait]
impl TabularStore for SheetsStore {
    async fn read_all(&self) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(&self.range(None), "");
        let response = self
            .book
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(GarminError::Http)?;

        let body: ValueRange = self.check(response).await?.json().await.map_err(|e| {
            GarminError::store(format!("Failed to parse values of '{}': {}", self.title, e))
        })?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.iter().map(value_text).collect())
            .collect())
    }

    async fn append_row(&self, row: &[Cell]) -> Result<()> {
        let range = self.range(Some("A1"));
        let url = self.values_url(
            &range,
            ":append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
        );
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [row.iter().map(Cell::to_json).collect::<Vec<_>>()],
        });

        let response = self
            .book
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(GarminError::Http)?;
        self.check(response).await?;
        Ok(())
    }

    async fn update_range(&self, row: usize, span: ColumnSpan, values: &[Cell]) -> Result<()> {
        if values.len() != span.width() {
            return Err(GarminError::store(format!(
                "update of {} columns got {} values",
                span.width(),
                values.len()
            )));
        }

        let line = row + 1;
        let range = self.range(Some(&format!(
            "{}{}:{}{}",
            column_letter(span.first),
            line,
            column_letter(span.last),
            line
        )));
        let url = self.values_url(&range, "?valueInputOption=RAW");
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [values.iter().map(Cell::to_json).collect::<Vec<_>>()],
        });

        let response = self
            .book
            .client
            .put(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(GarminError::Http)?;
        self.check(response).await?;
        Ok(())
    }
}

/// Zero-based column number to A1 letters (0 → A, 25 → Z, 26 → AA).
pub(crate) fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
