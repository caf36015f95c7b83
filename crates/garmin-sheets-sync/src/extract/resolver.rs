//! Source-priority resolution for the daily health metrics.
//!
//! The same logical quantity is reported by several Garmin endpoints, and
//! which one carries it depends on device generation and account tier. Each
//! metric owns a fixed, ordered probe chain; the first probe that yields a
//! non-null value wins.

use chrono::NaiveDate;
use serde_json::Value;

use super::deep_search;

/// Payload a probe reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Daily user summary (`usersummary-service`)
    Summary,
    /// Sleep data (`dailySleepData`)
    Sleep,
    /// Aggregated training status; absent for accounts without the feature
    TrainingStatus,
    /// Heart rate variability
    Hrv,
    /// Recent activities that started on the same calendar date
    Activity,
}

/// How a probe looks inside its source payload.
#[derive(Debug, Clone, Copy)]
pub enum Lookup {
    /// Exact key chain from the payload root
    Path(&'static [&'static str]),
    /// Deep search by key name
    Deep(&'static str),
}

/// One step of a probe chain.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub source: Source,
    pub lookup: Lookup,
}

const fn path(source: Source, keys: &'static [&'static str]) -> Probe {
    Probe {
        source,
        lookup: Lookup::Path(keys),
    }
}

const fn deep(source: Source, key: &'static str) -> Probe {
    Probe {
        source,
        lookup: Lookup::Deep(key),
    }
}

const SLEEP_SCORE: &[Probe] = &[
    path(Source::Sleep, &["dailySleepDTO", "sleepScores", "overall", "value"]),
    path(Source::Sleep, &["dailySleepDTO", "sleepScore"]),
    deep(Source::Sleep, "sleepScore"),
    deep(Source::Summary, "sleepScore"),
];

const SLEEP_SECONDS: &[Probe] = &[
    path(Source::Sleep, &["dailySleepDTO", "sleepTimeSeconds"]),
    deep(Source::Sleep, "sleepTimeSeconds"),
    path(Source::Summary, &["sleepingSeconds"]),
];

const VO2_MAX: &[Probe] = &[
    path(Source::Summary, &["vo2MaxRunning"]),
    path(Source::Summary, &["vo2MaxCycling"]),
    path(Source::Summary, &["vo2MaxValue"]),
    deep(Source::TrainingStatus, "vo2MaxPreciseValue"),
    deep(Source::TrainingStatus, "vo2MaxValue"),
    deep(Source::Activity, "vO2MaxValue"),
];

const ACUTE_LOAD: &[Probe] = &[
    path(Source::TrainingStatus, &["acuteLoad"]),
    path(Source::TrainingStatus, &["loadCombined"]),
    deep(Source::TrainingStatus, "dailyTrainingLoadAcute"),
    deep(Source::TrainingStatus, "acuteLoad"),
];

const HRV_AVERAGE: &[Probe] = &[
    path(Source::Hrv, &["hrvSummary", "lastNightAvg"]),
    deep(Source::Hrv, "lastNightAvg"),
];

const RESTING_HEART_RATE: &[Probe] = &[
    path(Source::Summary, &["restingHeartRate"]),
    deep(Source::Summary, "restingHeartRate"),
];

const BODY_BATTERY_MAX: &[Probe] = &[
    path(Source::Summary, &["bodyBatteryHighestValue"]),
    path(Source::Summary, &["bodyBatteryMostRecentValue"]),
];

const AVERAGE_STRESS: &[Probe] = &[path(Source::Summary, &["averageStressLevel"])];

const STEPS: &[Probe] = &[
    path(Source::Summary, &["totalSteps"]),
    path(Source::Summary, &["steps"]),
];

/// Logical metrics written to the health sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    SleepScore,
    SleepSeconds,
    Vo2Max,
    AcuteLoad,
    HrvAverage,
    RestingHeartRate,
    BodyBatteryMax,
    AverageStress,
    Steps,
}

impl Metric {
    /// The probe chain for this metric, highest priority first.
    pub fn probes(self) -> &'static [Probe] {
        match self {
            Metric::SleepScore => SLEEP_SCORE,
            Metric::SleepSeconds => SLEEP_SECONDS,
            Metric::Vo2Max => VO2_MAX,
            Metric::AcuteLoad => ACUTE_LOAD,
            Metric::HrvAverage => HRV_AVERAGE,
            Metric::RestingHeartRate => RESTING_HEART_RATE,
            Metric::BodyBatteryMax => BODY_BATTERY_MAX,
            Metric::AverageStress => AVERAGE_STRESS,
            Metric::Steps => STEPS,
        }
    }
}

/// Outcome of a probe chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Found(&'a Value),
    /// Every probe came back empty. Distinct from a measured zero.
    Unavailable,
}

impl<'a> Resolved<'a> {
    pub fn value(self) -> Option<&'a Value> {
        match self {
            Resolved::Found(v) => Some(v),
            Resolved::Unavailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Resolved::Found(_))
    }
}

/// The payloads fetched for one calendar date.
///
/// Any member may be missing: an endpoint can fail, return nothing for the
/// day, or not exist for the account.
#[derive(Debug, Default, Clone)]
pub struct PayloadBundle<'a> {
    pub summary: Option<&'a Value>,
    pub sleep: Option<&'a Value>,
    pub training_status: Option<&'a Value>,
    pub hrv: Option<&'a Value>,
    pub activities: Vec<&'a Value>,
}

impl<'a> PayloadBundle<'a> {
    /// Keep the recent activities that started on `date`.
    pub fn with_activities_on(mut self, recent: &'a [Value], date: NaiveDate) -> Self {
        let prefix = date.format("%Y-%m-%d").to_string();
        self.activities = recent
            .iter()
            .filter(|a| {
                a.get("startTimeLocal")
                    .and_then(Value::as_str)
                    .is_some_and(|s| s.starts_with(&prefix))
            })
            .collect();
        self
    }

    fn trees(&self, source: Source) -> Vec<&'a Value> {
        match source {
            Source::Summary => self.summary.into_iter().collect(),
            Source::Sleep => self.sleep.into_iter().collect(),
            Source::TrainingStatus => self.training_status.into_iter().collect(),
            Source::Hrv => self.hrv.into_iter().collect(),
            Source::Activity => self.activities.clone(),
        }
    }
}

/// Evaluate a probe chain against a bundle.
pub fn resolve_with<'a>(probes: &[Probe], bundle: &PayloadBundle<'a>) -> Resolved<'a> {
    probes
        .iter()
        .find_map(|probe| {
            bundle
                .trees(probe.source)
                .into_iter()
                .find_map(|tree| match probe.lookup {
                    Lookup::Path(keys) => deep_search::lookup(tree, keys),
                    Lookup::Deep(key) => deep_search::find(tree, key),
                })
        })
        .map_or(Resolved::Unavailable, Resolved::Found)
}

/// Resolve one metric. Independent of every other metric's resolution.
pub fn resolve<'a>(metric: Metric, bundle: &PayloadBundle<'a>) -> Resolved<'a> {
    resolve_with(metric.probes(), bundle)
}
