//! Projection of raw Garmin payloads into worksheet rows
//!
//! Both record kinds have a fixed column order. They use different
//! conventions for missing values: activity columns fall back to `0`, health
//! columns to the unavailable placeholder.

use chrono::NaiveDate;
use serde_json::Value;

use super::deep_search::lookup;
use super::resolver::{resolve, Metric, PayloadBundle, Resolved};
use crate::error::{GarminError, Result};
use crate::store::Cell;

/// Number of columns in a workout row.
pub const ACTIVITY_COLUMNS: usize = 35;

/// Number of columns in a health row (A..J).
pub const HEALTH_COLUMNS: usize = 10;

/// Header row for the workout sheet.
pub const ACTIVITY_HEADER: [&str; ACTIVITY_COLUMNS] = [
    "date",
    "time",
    "type",
    "name",
    "distance_km",
    "calories",
    "duration_min",
    "avg_hr",
    "max_hr",
    "aerobic_te",
    "avg_cadence",
    "max_cadence",
    "avg_speed_kmh",
    "max_speed_kmh",
    "elevation_gain",
    "elevation_loss",
    "stride_length_m",
    "gct_balance",
    "gct_ms",
    "vertical_oscillation",
    "grade_adjusted_speed_kmh",
    "avg_power",
    "max_power",
    "training_stress_score",
    "steps",
    "total_reps",
    "total_poses",
    "body_battery_drain",
    "min_temperature",
    "max_temperature",
    "avg_respiration",
    "moving_duration_min",
    "elapsed_duration_min",
    "min_elevation",
    "max_elevation",
];

/// Header row for the health sheet.
pub const HEALTH_HEADER: [&str; HEALTH_COLUMNS] = [
    "date",
    "sleep_score",
    "sleep_hours",
    "hrv_avg",
    "resting_hr",
    "body_battery_max",
    "avg_stress",
    "steps",
    "vo2max",
    "acute_load",
];

/// A mapped workout row.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub date: String,
    pub time: String,
    pub cells: Vec<Cell>,
}

impl ActivityRecord {
    /// Natural key, matching [`crate::store::RowIndex::by_timestamp`].
    pub fn key(&self) -> String {
        format!("{} {}", self.date, self.time)
    }
}

/// A mapped health row.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyHealthRecord {
    pub date: NaiveDate,
    pub cells: Vec<Cell>,
}

impl DailyHealthRecord {
    pub fn key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Split a local start timestamp (`2024-03-01 07:15:00`) into date and time.
pub fn split_start_time(start: &str) -> (String, String) {
    let start = start.trim();
    match start.split_once([' ', 'T']) {
        Some((date, time)) => (date.to_string(), time.to_string()),
        None => (start.to_string(), String::new()),
    }
}

fn number(activity: &Value, key: &str) -> Option<f64> {
    lookup(activity, &[key]).and_then(Value::as_f64)
}

/// Raw value or `0`.
fn raw(activity: &Value, key: &str) -> Cell {
    match lookup(activity, &[key]) {
        Some(v) if v.is_number() => Cell::from_json(v),
        _ => Cell::Integer(0),
    }
}

/// First present key of a fallback list, or `0`.
fn raw_first(activity: &Value, keys: &[&str]) -> Cell {
    keys.iter()
        .find_map(|key| lookup(activity, &[*key]).filter(|v| v.is_number()))
        .map_or(Cell::Integer(0), Cell::from_json)
}

/// `value * factor` rounded to `places`, or `0`.
fn scaled(activity: &Value, key: &str, factor: f64, places: usize) -> Cell {
    Cell::decimal(number(activity, key).unwrap_or(0.0) * factor, places)
}

fn text(activity: &Value, path: &[&str]) -> Cell {
    Cell::Text(
        lookup(activity, path)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    )
}

/// Left/right ground contact time balance from the left-foot percentage.
pub fn ground_contact_balance(left: Option<f64>) -> Cell {
    match left {
        Some(l) if l > 0.0 && l < 100.0 => {
            let left = round_to(l, 1);
            let right = round_to(100.0 - l, 1);
            Cell::Text(format!("{:.1}% L / {:.1}% R", left, right))
        }
        _ => Cell::Unavailable,
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Map one entry of the activity list to a workout row.
pub fn map_activity(activity: &Value) -> Result<ActivityRecord> {
    let start = lookup(activity, &["startTimeLocal"])
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| GarminError::invalid_response("activity without startTimeLocal"))?;
    let (date, time) = split_start_time(start);

    let cells = vec![
        Cell::Text(date.clone()),
        Cell::Text(time.clone()),
        text(activity, &["activityType", "typeKey"]),
        text(activity, &["activityName"]),
        scaled(activity, "distance", 1.0 / 1000.0, 2),
        raw(activity, "calories"),
        scaled(activity, "duration", 1.0 / 60.0, 2),
        raw(activity, "averageHR"),
        raw(activity, "maxHR"),
        raw(activity, "aerobicTrainingEffect"),
        raw_first(
            activity,
            &["averageRunningCadenceInStepsPerMinute", "averageBikingCadenceInRevPerMinute"],
        ),
        raw_first(
            activity,
            &["maxRunningCadenceInStepsPerMinute", "maxBikingCadenceInRevPerMinute"],
        ),
        scaled(activity, "averageSpeed", 3.6, 2),
        scaled(activity, "maxSpeed", 3.6, 2),
        raw(activity, "elevationGain"),
        raw(activity, "elevationLoss"),
        scaled(activity, "avgStrideLength", 1.0 / 100.0, 2),
        ground_contact_balance(number(activity, "avgGroundContactBalance")),
        scaled(activity, "avgGroundContactTime", 1.0, 0),
        scaled(activity, "avgVerticalOscillation", 1.0, 1),
        scaled(activity, "avgGradeAdjustedSpeed", 3.6, 2),
        raw(activity, "avgPower"),
        raw(activity, "maxPower"),
        raw(activity, "trainingStressScore"),
        raw(activity, "steps"),
        raw(activity, "totalReps"),
        raw(activity, "totalPoses"),
        raw(activity, "bodyBatteryDrainValue"),
        raw(activity, "minTemperature"),
        raw(activity, "maxTemperature"),
        raw(activity, "averageRespirationRate"),
        scaled(activity, "movingDuration", 1.0 / 60.0, 2),
        scaled(activity, "elapsedDuration", 1.0 / 60.0, 2),
        raw(activity, "minElevation"),
        raw(activity, "maxElevation"),
    ];
    debug_assert_eq!(cells.len(), ACTIVITY_COLUMNS);

    Ok(ActivityRecord { date, time, cells })
}

/// Cell for a resolved health metric.
fn metric_cell(resolved: Resolved<'_>) -> Cell {
    match resolved.value() {
        // Some payloads wrap scores as {"value": 81, "qualifierKey": ...}
        Some(Value::Object(map)) => map
            .get("value")
            .filter(|v| !v.is_null())
            .map_or(Cell::Unavailable, Cell::from_json),
        Some(v) => Cell::from_json(v),
        None => Cell::Unavailable,
    }
}

fn sleep_hours(resolved: Resolved<'_>) -> Cell {
    match resolved.value().and_then(Value::as_f64) {
        Some(seconds) if seconds > 0.0 => Cell::decimal(seconds / 3600.0, 2),
        _ => Cell::Unavailable,
    }
}

/// Build the health row for `date` from the payloads fetched for it.
pub fn map_daily_health(date: NaiveDate, bundle: &PayloadBundle<'_>) -> DailyHealthRecord {
    let cells = vec![
        Cell::Text(date.format("%Y-%m-%d").to_string()),
        metric_cell(resolve(Metric::SleepScore, bundle)),
        sleep_hours(resolve(Metric::SleepSeconds, bundle)),
        metric_cell(resolve(Metric::HrvAverage, bundle)),
        metric_cell(resolve(Metric::RestingHeartRate, bundle)),
        metric_cell(resolve(Metric::BodyBatteryMax, bundle)),
        metric_cell(resolve(Metric::AverageStress, bundle)),
        metric_cell(resolve(Metric::Steps, bundle)),
        metric_cell(resolve(Metric::Vo2Max, bundle)),
        metric_cell(resolve(Metric::AcuteLoad, bundle)),
    ];
    debug_assert_eq!(cells.len(), HEALTH_COLUMNS);

    DailyHealthRecord { date, cells }
}
