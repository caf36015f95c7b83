//! Extraction of sheet rows from drifting Garmin payloads
//!
//! - [`deep_search`]: key lookup at unknown depth
//! - [`resolver`]: per-metric source priority chains
//! - [`mapper`]: payload → fixed-width row projection

pub mod deep_search;
pub mod mapper;
pub mod resolver;

pub use mapper::{map_activity, map_daily_health, ActivityRecord, DailyHealthRecord};
pub use resolver::{resolve, Metric, PayloadBundle, Resolved};
