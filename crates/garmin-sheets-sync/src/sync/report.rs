use std::fmt;

/// Outcome of one record kind's sync step
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KindStats {
    /// New rows added
    pub appended: u32,
    /// Existing rows overwritten in place
    pub updated: u32,
    /// Records already present and left untouched
    pub skipped: u32,
    /// Records dropped after a fetch or mapping error
    pub failed: u32,
    /// Set when the whole step was abandoned
    pub error: Option<String>,
}

impl KindStats {
    /// Rows written or that would be written
    pub fn written(&self) -> u32 {
        self.appended + self.updated
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.error.is_none()
    }
}

impl fmt::Display for KindStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Appended: {}, Updated: {}, Skipped: {}, Failed: {}",
            self.appended, self.updated, self.skipped, self.failed
        )?;
        if let Some(error) = &self.error {
            write!(f, ", Aborted: {}", error)?;
        }
        Ok(())
    }
}

/// Per-kind results of a sync cycle. A kind is `None` when not selected.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub activities: Option<KindStats>,
    pub health: Option<KindStats>,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        [&self.activities, &self.health]
            .into_iter()
            .flatten()
            .all(KindStats::is_clean)
    }

    /// Rows written across all selected kinds
    pub fn written(&self) -> u32 {
        [&self.activities, &self.health]
            .into_iter()
            .flatten()
            .map(KindStats::written)
            .sum()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "Dry run, no rows were written.")?;
        }
        if let Some(stats) = &self.activities {
            writeln!(f, "Activities: {}", stats)?;
        }
        if let Some(stats) = &self.health {
            writeln!(f, "Health:     {}", stats)?;
        }
        if self.dry_run {
            writeln!(f, "Rows that would be written: {}", self.written())?;
        } else {
            writeln!(f, "Rows written: {}", self.written())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_stats_display() {
        let stats = KindStats {
            appended: 2,
            updated: 5,
            skipped: 1,
            failed: 0,
            error: None,
        };
        assert_eq!(stats.to_string(), "Appended: 2, Updated: 5, Skipped: 1, Failed: 0");
        assert_eq!(stats.written(), 7);
        assert!(stats.is_clean());

        let aborted = KindStats {
            error: Some("Store error: quota".to_string()),
            ..Default::default()
        };
        assert!(aborted.to_string().ends_with(", Aborted: Store error: quota"));
        assert!(!aborted.is_clean());
    }

    #[test]
    fn test_report_lists_selected_kinds_only() {
        let report = SyncReport {
            health: Some(KindStats::default()),
            ..Default::default()
        };
        let text = report.to_string();
        assert!(text.starts_with("Health:"));
        assert!(!text.contains("Activities"));
        assert!(report.is_clean());
    }

    #[test]
    fn test_report_totals_rows_written() {
        let report = SyncReport {
            activities: Some(KindStats {
                appended: 3,
                skipped: 7,
                ..Default::default()
            }),
            health: Some(KindStats {
                appended: 1,
                updated: 6,
                ..Default::default()
            }),
            dry_run: false,
        };
        assert_eq!(report.written(), 10);
        assert!(report.to_string().ends_with("Rows written: 10\n"));

        let preview = SyncReport {
            dry_run: true,
            ..report
        };
        assert!(preview.to_string().ends_with("Rows that would be written: 10\n"));
    }
}
