//! Raw telemetry payloads from Garmin Connect

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::client::api::GarminClient;
use crate::client::tokens::OAuth2Token;
use crate::error::Result;

/// Where the sync engine pulls untyped payloads from.
///
/// Every method returns the JSON document exactly as the service sent it;
/// interpretation happens in the extraction layer.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Most recent activities, newest first.
    async fn list_activities(&self, start: u32, limit: u32) -> Result<Vec<Value>>;

    async fn daily_summary(&self, date: NaiveDate) -> Result<Value>;

    async fn sleep_summary(&self, date: NaiveDate) -> Result<Value>;

    async fn training_status(&self, date: NaiveDate) -> Result<Value>;

    async fn heart_rate_variability(&self, date: NaiveDate) -> Result<Value>;
}

/// [`TelemetrySource`] backed by the Connect API
pub struct ConnectSource {
    client: GarminClient,
    token: OAuth2Token,
    display_name: String,
}

impl ConnectSource {
    pub fn new(client: GarminClient, token: OAuth2Token, display_name: impl Into<String>) -> Self {
        Self {
            client,
            token,
            display_name: display_name.into(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn fetch(&self, path: &str) -> Result<Value> {
        tracing::debug!(path, "fetching");
        self.client.get_json(&self.token, path).await
    }
}

#[async_trait]
impl TelemetrySource for ConnectSource {
    async fn list_activities(&self, start: u32, limit: u32) -> Result<Vec<Value>> {
        let path = format!(
            "/activitylist-service/activities/search/activities?limit={}&start={}",
            limit, start
        );
        match self.fetch(&path).await? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }

    async fn daily_summary(&self, date: NaiveDate) -> Result<Value> {
        let path = format!(
            "/usersummary-service/usersummary/daily/{}?calendarDate={}",
            urlencoding::encode(&self.display_name),
            date
        );
        self.fetch(&path).await
    }

    async fn sleep_summary(&self, date: NaiveDate) -> Result<Value> {
        let path = format!(
            "/wellness-service/wellness/dailySleepData/{}?date={}&nonSleepBufferMinutes=60",
            urlencoding::encode(&self.display_name),
            date
        );
        self.fetch(&path).await
    }

    async fn training_status(&self, date: NaiveDate) -> Result<Value> {
        self.fetch(&format!("/metrics-service/metrics/trainingstatus/aggregated/{}", date))
            .await
    }

    async fn heart_rate_variability(&self, date: NaiveDate) -> Result<Value> {
        self.fetch(&format!("/hrv-service/hrv/{}", date)).await
    }
}
