use std::collections::HashMap;

use chrono::NaiveTime;

/// Natural key → zero-based row position, built from a full read of a
/// worksheet at the start of a sync cycle.
#[derive(Debug, Default, Clone)]
pub struct RowIndex {
    positions: HashMap<String, usize>,
    len: usize,
}

impl RowIndex {
    /// Build an index with `key_of` extracting each row's natural key.
    /// Rows without a key are counted but not indexed. On duplicate keys the
    /// last row wins.
    pub fn build<F>(rows: &[Vec<String>], key_of: F) -> Self
    where
        F: Fn(&[String]) -> Option<String>,
    {
        let positions = rows
            .iter()
            .enumerate()
            .filter_map(|(pos, row)| key_of(row).map(|key| (key, pos)))
            .collect();

        Self {
            positions,
            len: rows.len(),
        }
    }

    /// Index keyed by the first column (calendar date).
    pub fn by_date(rows: &[Vec<String>]) -> Self {
        Self::build(rows, |row| {
            row.first()
                .map(|d| d.trim())
                .filter(|d| !d.is_empty())
                .map(str::to_string)
        })
    }

    /// Index keyed by `"<date> <time>"` from the first two columns.
    ///
    /// Times are zero-padded to `HH:MM:SS`, so a cell displayed as `7:15:00`
    /// still matches the key of the activity that wrote it.
    pub fn by_timestamp(rows: &[Vec<String>]) -> Self {
        Self::build(rows, |row| match row {
            [date, time, ..] if !date.trim().is_empty() => {
                Some(format!("{} {}", date.trim(), normalize_time(time)))
            }
            _ => None,
        })
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    /// Record a row appended during the current cycle. Returns its position.
    pub fn record_append(&mut self, key: String) -> usize {
        let pos = self.len;
        self.positions.insert(key, pos);
        self.len += 1;
        pos
    }

    /// Number of rows in the worksheet, indexed or not.
    pub fn row_count(&self) -> usize {
        self.len
    }

    pub fn key_count(&self) -> usize {
        self.positions.len()
    }
}

fn normalize_time(raw: &str) -> String {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}
