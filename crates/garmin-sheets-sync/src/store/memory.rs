use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Cell, ColumnSpan, TabularStore, Workbook};
use crate::error::{GarminError, Result};

#[derive(Debug, Default)]
struct Book {
    sheets: HashMap<String, Vec<Vec<String>>>,
    failing: HashSet<String>,
}

/// In-process workbook. Clones share the same sheets.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    book: Arc<Mutex<Book>>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a worksheet with the given rows.
    pub fn insert_sheet(&self, name: &str, rows: Vec<Vec<String>>) {
        lock(&self.book).sheets.insert(name.to_string(), rows);
    }

    /// Snapshot of a worksheet's rows.
    pub fn rows(&self, name: &str) -> Vec<Vec<String>> {
        lock(&self.book).sheets.get(name).cloned().unwrap_or_default()
    }

    /// Make every operation on `name` fail with a store error.
    pub fn set_failing(&self, name: &str, failing: bool) {
        let mut book = lock(&self.book);
        if failing {
            book.failing.insert(name.to_string());
        } else {
            book.failing.remove(name);
        }
    }
}

impl Workbook for MemoryWorkbook {
    type Sheet = MemoryStore;

    fn worksheet(&self, name: &str) -> Result<MemoryStore> {
        lock(&self.book).sheets.entry(name.to_string()).or_default();
        Ok(MemoryStore {
            book: Arc::clone(&self.book),
            name: name.to_string(),
        })
    }
}

/// One worksheet of a [`MemoryWorkbook`].
#[derive(Debug, Clone)]
pub struct MemoryStore {
    book: Arc<Mutex<Book>>,
    name: String,
}

impl MemoryStore {
    fn with_sheet<T>(&self, f: impl FnOnce(&mut Vec<Vec<String>>) -> Result<T>) -> Result<T> {
        let mut book = lock(&self.book);
        if book.failing.contains(&self.name) {
            return Err(GarminError::store(format!("worksheet '{}' is unavailable", self.name)));
        }
        let sheet = book
            .sheets
            .get_mut(&self.name)
            .ok_or_else(|| GarminError::store(format!("worksheet '{}' not found", self.name)))?;
        f(sheet)
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn read_all(&self) -> Result<Vec<Vec<String>>> {
        self.with_sheet(|sheet| Ok(sheet.clone()))
    }

    async fn append_row(&self, row: &[Cell]) -> Result<()> {
        self.with_sheet(|sheet| {
            sheet.push(row.iter().map(Cell::to_string).collect());
            Ok(())
        })
    }

    async fn update_range(&self, row: usize, span: ColumnSpan, values: &[Cell]) -> Result<()> {
        if values.len() != span.width() {
            return Err(GarminError::store(format!(
                "update of {} columns got {} values",
                span.width(),
                values.len()
            )));
        }
        self.with_sheet(|sheet| {
            let target = sheet
                .get_mut(row)
                .ok_or_else(|| GarminError::store(format!("row {} out of range", row)))?;
            if target.len() <= span.last {
                target.resize(span.last + 1, String::new());
            }
            for (slot, cell) in target[span.first..=span.last].iter_mut().zip(values) {
                *slot = cell.to_string();
            }
            Ok(())
        })
    }
}

fn lock(book: &Mutex<Book>) -> MutexGuard<'_, Book> {
    book.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let book = MemoryWorkbook::new();
        let sheet = book.worksheet("health_data").unwrap();

        sheet
            .append_row(&[Cell::Text("2024-03-01".into()), Cell::Integer(80), Cell::Unavailable])
            .await
            .unwrap();

        assert_eq!(sheet.read_all().await.unwrap(), vec![vec!["2024-03-01", "80", "-"]]);
    }

    #[tokio::test]
    async fn test_update_range_overwrites_only_span() {
        let book = MemoryWorkbook::new();
        book.insert_sheet(
            "health_data",
            vec![vec!["2024-03-01".into(), "1".into(), "2".into(), "note".into()]],
        );
        let sheet = book.worksheet("health_data").unwrap();

        sheet
            .update_range(
                0,
                ColumnSpan::leading(3),
                &[Cell::Text("2024-03-01".into()), Cell::Integer(9), Cell::Integer(8)],
            )
            .await
            .unwrap();

        assert_eq!(book.rows("health_data"), vec![vec!["2024-03-01", "9", "8", "note"]]);
    }

    #[tokio::test]
    async fn test_update_out_of_range_fails() {
        let book = MemoryWorkbook::new();
        let sheet = book.worksheet("s").unwrap();
        let err = sheet
            .update_range(3, ColumnSpan::leading(1), &[Cell::Empty])
            .await
            .unwrap_err();
        assert!(matches!(err, GarminError::Store(_)));
    }

    #[tokio::test]
    async fn test_failing_sheet() {
        let book = MemoryWorkbook::new();
        let sheet = book.worksheet("workout_database").unwrap();
        book.set_failing("workout_database", true);
        assert!(sheet.read_all().await.is_err());
        book.set_failing("workout_database", false);
        assert!(sheet.read_all().await.unwrap().is_empty());
    }
}
