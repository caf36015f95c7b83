//! Upsert synchronization of Garmin records into the tabular store
//!
//! One cycle runs two independent steps:
//! - Activities: the most recent N entries, appended oldest first. Keys
//!   already in the sheet are skipped, recorded activities never change.
//! - Daily health: a trailing window of D days ending today. Existing days
//!   are overwritten in place over the health columns, new days appended.
//!
//! A failing record is logged and skipped. A failing store aborts only the
//! step it belongs to.

mod report;

pub use report::{KindStats, SyncReport};

use chrono::{Duration, NaiveDate};
use serde_json::Value;

use crate::client::TelemetrySource;
use crate::error::Result;
use crate::extract::mapper::HEALTH_COLUMNS;
use crate::extract::{map_activity, map_daily_health, DailyHealthRecord, PayloadBundle};
use crate::store::{ColumnSpan, RowIndex, TabularStore, Workbook};

/// Default worksheet for activity rows
pub const ACTIVITY_SHEET: &str = "workout_database";

/// Default worksheet for daily health rows
pub const HEALTH_SHEET: &str = "health_data";

/// Options for a sync cycle
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Sync activities
    pub activities: bool,
    /// Sync daily health
    pub health: bool,
    /// Number of most recent activities to fetch
    pub activity_limit: u32,
    /// Days in the health window, today included
    pub health_days: u32,
    /// Decide every row but write nothing
    pub dry_run: bool,
    pub activity_sheet: String,
    pub health_sheet: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            activities: true,
            health: true,
            activity_limit: 10,
            health_days: 7,
            dry_run: false,
            activity_sheet: ACTIVITY_SHEET.to_string(),
            health_sheet: HEALTH_SHEET.to_string(),
        }
    }
}

/// Drives a sync cycle from a telemetry source into a workbook
pub struct SyncEngine<S, W> {
    source: S,
    workbook: W,
    options: SyncOptions,
}

impl<S, W> SyncEngine<S, W>
where
    S: TelemetrySource,
    W: Workbook,
{
    pub fn new(source: S, workbook: W, options: SyncOptions) -> Self {
        Self {
            source,
            workbook,
            options,
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one cycle. `today` closes the health window.
    pub async fn run(&self, today: NaiveDate) -> SyncReport {
        let mut report = SyncReport {
            dry_run: self.options.dry_run,
            ..Default::default()
        };

        if self.options.activities {
            report.activities = Some(self.sync_activities().await);
        }
        if self.options.health {
            report.health = Some(self.sync_health(today).await);
        }

        report
    }

    /// Append activities not yet in the sheet
    pub async fn sync_activities(&self) -> KindStats {
        let mut stats = KindStats::default();
        if let Err(e) = self.try_sync_activities(&mut stats).await {
            tracing::error!(sheet = %self.options.activity_sheet, error = %e, "activity sync aborted");
            stats.error = Some(e.to_string());
        }
        stats
    }

    async fn try_sync_activities(&self, stats: &mut KindStats) -> Result<()> {
        let sheet = self.workbook.worksheet(&self.options.activity_sheet)?;
        let mut index = RowIndex::by_timestamp(&sheet.read_all().await?);
        tracing::debug!(rows = index.row_count(), keys = index.key_count(), "loaded activity index");

        let recent = self
            .source
            .list_activities(0, self.options.activity_limit)
            .await?;
        tracing::info!(count = recent.len(), "fetched recent activities");

        // The list is newest first.
        for raw in recent.iter().rev() {
            let record = match map_activity(raw) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(activity_id = ?raw.get("activityId"), error = %e, "skipping activity");
                    stats.failed += 1;
                    continue;
                }
            };

            let key = record.key();
            if index.contains(&key) {
                tracing::debug!(%key, "activity already recorded");
                stats.skipped += 1;
                continue;
            }

            if !self.options.dry_run {
                sheet.append_row(&record.cells).await?;
            }
            index.record_append(key.clone());
            tracing::info!(%key, "appended activity");
            stats.appended += 1;
        }

        Ok(())
    }

    /// Upsert one row per day of the health window
    pub async fn sync_health(&self, today: NaiveDate) -> KindStats {
        let mut stats = KindStats::default();
        if let Err(e) = self.try_sync_health(today, &mut stats).await {
            tracing::error!(sheet = %self.options.health_sheet, error = %e, "health sync aborted");
            stats.error = Some(e.to_string());
        }
        stats
    }

    async fn try_sync_health(&self, today: NaiveDate, stats: &mut KindStats) -> Result<()> {
        let sheet = self.workbook.worksheet(&self.options.health_sheet)?;
        let mut index = RowIndex::by_date(&sheet.read_all().await?);
        tracing::debug!(rows = index.row_count(), keys = index.key_count(), "loaded health index");

        // Only feeds the activity fallback of a few metrics.
        let recent = match self
            .source
            .list_activities(0, self.options.activity_limit)
            .await
        {
            Ok(recent) => recent,
            Err(e) => {
                tracing::warn!(error = %e, "recent activities unavailable for health metrics");
                Vec::new()
            }
        };

        let span = ColumnSpan::leading(HEALTH_COLUMNS);
        for date in health_window(today, self.options.health_days) {
            let record = match self.health_record(date, &recent).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(%date, error = %e, "skipping day");
                    stats.failed += 1;
                    continue;
                }
            };

            let key = record.key();
            match index.position(&key) {
                Some(row) => {
                    if !self.options.dry_run {
                        sheet.update_range(row, span, &record.cells).await?;
                    }
                    tracing::info!(%date, row, "updated health row");
                    stats.updated += 1;
                }
                None => {
                    if !self.options.dry_run {
                        sheet.append_row(&record.cells).await?;
                    }
                    index.record_append(key);
                    tracing::info!(%date, "appended health row");
                    stats.appended += 1;
                }
            }
        }

        Ok(())
    }

    async fn health_record(&self, date: NaiveDate, recent: &[Value]) -> Result<DailyHealthRecord> {
        let summary = self.source.daily_summary(date).await?;
        let sleep = self.source.sleep_summary(date).await?;
        let training_status = optional(self.source.training_status(date).await, "training status", date);
        let hrv = optional(self.source.heart_rate_variability(date).await, "hrv", date);

        let bundle = PayloadBundle {
            summary: Some(&summary),
            sleep: Some(&sleep),
            training_status: training_status.as_ref(),
            hrv: hrv.as_ref(),
            activities: Vec::new(),
        }
        .with_activities_on(recent, date);

        Ok(map_daily_health(date, &bundle))
    }
}

/// Payloads some accounts never have. Their failure leaves the dependent
/// metrics unavailable.
fn optional(result: Result<Value>, what: &str, date: NaiveDate) -> Option<Value> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(%date, what, error = %e, "fetch failed, metrics unavailable");
            None
        }
    }
}

/// Longest health window accepted, in days
pub const MAX_HEALTH_DAYS: u32 = 3660;

/// The `days` dates ending with `today`, oldest first.
///
/// `days` is capped at [`MAX_HEALTH_DAYS`]; dates before the calendar's
/// lower bound are dropped.
pub fn health_window(today: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..i64::from(days.min(MAX_HEALTH_DAYS)))
        .rev()
        .filter_map(|back| today.checked_sub_signed(Duration::days(back)))
        .collect()
}
