//! Tabular store the synced rows land in
//!
//! The store is a spreadsheet-like collaborator: a set of named worksheets,
//! each an ordered list of rows. Rows are read back as text, written as
//! typed [`Cell`]s.
//!
//! - [`SheetsWorkbook`] talks to the Google Sheets v4 values API.
//! - [`MemoryWorkbook`] keeps everything in process (tests, dry runs).

mod google_auth;
mod index;
mod memory;
mod sheets;

pub use google_auth::{ServiceAccountKey, SHEETS_SCOPES};
pub use index::RowIndex;
pub use memory::{MemoryStore, MemoryWorkbook};
pub use sheets::{SheetsStore, SheetsWorkbook};

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// One output field.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Integer(i64),
    Number(f64),
    /// A rounded quantity rendered with a fixed number of decimals
    Decimal { value: f64, places: usize },
    Bool(bool),
    /// The value could not be resolved from any source. Rendered as `-`.
    Unavailable,
}

/// Placeholder written for unavailable values.
pub const PLACEHOLDER: &str = "-";

impl Cell {
    /// Round `value` to `places` decimals.
    pub fn decimal(value: f64, places: usize) -> Self {
        let factor = 10f64.powi(places as i32);
        Cell::Decimal {
            value: (value * factor).round() / factor,
            places,
        }
    }

    /// Convert a scalar from a Garmin payload.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Empty,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Integer(i),
                None => n.as_f64().map_or(Cell::Empty, Cell::Number),
            },
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// JSON form sent to the spreadsheet API.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::String(String::new()),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Integer(i) => Value::from(*i),
            Cell::Number(n) => Value::from(*n),
            Cell::Decimal { value, .. } => Value::from(*value),
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Unavailable => Value::String(PLACEHOLDER.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Decimal { value, places } => write!(f, "{:.*}", places, value),
            Cell::Bool(true) => f.write_str("TRUE"),
            Cell::Bool(false) => f.write_str("FALSE"),
            Cell::Unavailable => f.write_str(PLACEHOLDER),
        }
    }
}

/// Contiguous column range of a row, zero-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpan {
    pub first: usize,
    pub last: usize,
}

impl ColumnSpan {
    /// The first `width` columns of a row.
    pub fn leading(width: usize) -> Self {
        Self {
            first: 0,
            last: width.saturating_sub(1),
        }
    }

    pub fn width(&self) -> usize {
        self.last - self.first + 1
    }
}

/// One worksheet.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// All rows, top to bottom, as displayed text.
    async fn read_all(&self) -> Result<Vec<Vec<String>>>;

    /// Add a row after the last one.
    async fn append_row(&self, row: &[Cell]) -> Result<()>;

    /// Overwrite `span` of the row at zero-based position `row`.
    async fn update_range(&self, row: usize, span: ColumnSpan, values: &[Cell]) -> Result<()>;
}

/// A collection of worksheets selected by name.
pub trait Workbook {
    type Sheet: TabularStore;

    fn worksheet(&self, name: &str) -> Result<Self::Sheet>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimal_rounds_and_renders_fixed() {
        assert_eq!(Cell::decimal(5000.0 / 1000.0, 2).to_string(), "5.00");
        assert_eq!(Cell::decimal(1800.0 / 60.0, 2).to_string(), "30.00");
        assert_eq!(Cell::decimal(3.14159, 2), Cell::Decimal { value: 3.14, places: 2 });
        assert_eq!(Cell::decimal(243.6, 0).to_string(), "244");
    }

    #[test]
    fn test_from_json_keeps_integers() {
        assert_eq!(Cell::from_json(&json!(12345)), Cell::Integer(12345));
        assert_eq!(Cell::from_json(&json!(3.2)), Cell::Number(3.2));
        assert_eq!(Cell::from_json(&json!("run")), Cell::Text("run".into()));
        assert_eq!(Cell::from_json(&json!(0)), Cell::Integer(0));
        assert_eq!(Cell::from_json(&Value::Null), Cell::Empty);
    }

    #[test]
    fn test_unavailable_is_distinct_from_zero() {
        assert_ne!(Cell::Unavailable, Cell::Integer(0));
        assert_eq!(Cell::Unavailable.to_string(), "-");
        assert_eq!(Cell::Unavailable.to_json(), json!("-"));
        assert_eq!(Cell::Integer(0).to_json(), json!(0));
    }

    #[test]
    fn test_column_span() {
        let span = ColumnSpan::leading(10);
        assert_eq!(span, ColumnSpan { first: 0, last: 9 });
        assert_eq!(span.width(), 10);
    }
}
