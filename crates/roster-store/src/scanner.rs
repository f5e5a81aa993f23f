//! Bulk expiry scan: one range query, then an in-memory split into records
//! that already expired and records expiring within the lookahead window.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use roster_core::dates::{self, format_date};
use roster_core::record::UserRecord;

use crate::error::Result;
use crate::records::{window_end, RecordService};

/// One report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub name: String,
    pub national_id: String,
    pub room_number: String,
    pub expiry_date: NaiveDate,
    /// Negative once expired.
    pub days_until: i64,
}

impl ReportLine {
    fn from_record(record: &UserRecord, today: NaiveDate) -> Self {
        Self {
            name: record.name.clone(),
            national_id: record.national_id.clone(),
            room_number: record.room_number.clone(),
            expiry_date: record.expiry_date,
            days_until: dates::days_until(record.expiry_date, today),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.days_until < 0
    }

    pub fn render(&self) -> String {
        let body = format!(
            "{}|{}|R.{}|{}",
            self.name,
            self.national_id,
            self.room_number,
            format_date(self.expiry_date)
        );
        if self.is_expired() {
            format!("EXPIRED {}d: {body}", -self.days_until)
        } else {
            format!("{}d left: {body}", self.days_until)
        }
    }
}

/// Result of a bulk scan, each partition ordered by ascending expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiryReport {
    pub today: NaiveDate,
    pub window_days: i64,
    pub expired: Vec<ReportLine>,
    pub soon: Vec<ReportLine>,
}

impl ExpiryReport {
    /// Split records into `expired` (delta < 0) and `soon` (delta >= 0).
    /// Records past the window are left out.
    pub fn partition<'a>(
        records: impl IntoIterator<Item = &'a UserRecord>,
        today: NaiveDate,
        window_days: i64,
    ) -> Self {
        let bound = window_end(today, window_days);
        let mut due: Vec<&UserRecord> = records
            .into_iter()
            .filter(|r| r.expiry_date <= bound)
            .collect();
        due.sort_by_key(|r| r.expiry_date);

        let (expired, soon) = due
            .into_iter()
            .map(|r| ReportLine::from_record(r, today))
            .partition(ReportLine::is_expired);

        Self {
            today,
            window_days,
            expired,
            soon,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.soon.is_empty()
    }

    pub fn total(&self) -> usize {
        self.expired.len() + self.soon.len()
    }

    /// Plain-text body showing at most `cap` lines per partition.
    pub fn render(&self, cap: usize) -> String {
        if self.is_empty() {
            return format!(
                "Nobody has expired or expires within {} days.",
                self.window_days
            );
        }

        let mut sections = Vec::new();
        if !self.expired.is_empty() {
            sections.push(section("-- EXPIRED --", &self.expired, cap, "expired"));
        }
        if !self.soon.is_empty() {
            let header = format!("-- EXPIRING SOON (<= {} days) --", self.window_days);
            sections.push(section(&header, &self.soon, cap, "expiring soon"));
        }
        sections.join("\n\n")
    }
}

fn section(header: &str, lines: &[ReportLine], cap: usize, label: &str) -> String {
    let mut out = String::from(header);
    for line in lines.iter().take(cap) {
        out.push('\n');
        out.push_str(&line.render());
    }
    if lines.len() > cap {
        out.push_str(&format!("\n... {} more {label}", lines.len() - cap));
    }
    out
}

/// Runs the bulk scan against storage.
#[derive(Clone)]
pub struct ExpiryScanner {
    records: RecordService,
    window_days: i64,
}

impl ExpiryScanner {
    pub fn new(records: RecordService, window_days: i64) -> Self {
        Self {
            records,
            window_days,
        }
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    pub async fn scan(&self, today: NaiveDate) -> Result<ExpiryReport> {
        let due = self.records.due_within(today, self.window_days).await?;
        let report = ExpiryReport::partition(&due, today, self.window_days);
        debug!(
            expired = report.expired.len(),
            soon = report.soon.len(),
            "expiry scan finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDateTime};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn record(id: i64, national_id: &str, expiry: NaiveDate) -> UserRecord {
        UserRecord {
            id,
            name: format!("Resident {id}"),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            national_id: national_id.to_string(),
            room_number: "101".to_string(),
            registration_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            expiry_date: expiry,
            created_at: NaiveDateTime::default(),
        }
    }

    fn offset(days: i64) -> NaiveDate {
        if days >= 0 {
            today().checked_add_days(Days::new(days as u64)).unwrap()
        } else {
            today().checked_sub_days(Days::new((-days) as u64)).unwrap()
        }
    }

    #[test]
    fn partitions_by_sign_of_delta() {
        let records = vec![
            record(1, "A", offset(-5)),
            record(2, "B", offset(10)),
            record(3, "C", offset(0)),
        ];
        let report = ExpiryReport::partition(&records, today(), 30);

        assert_eq!(report.expired.len(), 1);
        assert_eq!(report.expired[0].days_until, -5);
        let soon: Vec<i64> = report.soon.iter().map(|l| l.days_until).collect();
        assert_eq!(soon, [0, 10]);
    }

    #[test]
    fn partition_is_exhaustive_and_disjoint_within_window() {
        let records: Vec<UserRecord> = (-40..=40)
            .map(|d| record(d + 100, &format!("N{d}"), offset(d)))
            .collect();
        let report = ExpiryReport::partition(&records, today(), 30);

        // -40..=30 is inside the window.
        assert_eq!(report.total(), 71);
        let mut seen: Vec<&str> = report
            .expired
            .iter()
            .chain(&report.soon)
            .map(|l| l.national_id.as_str())
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 71);
        assert!(report.expired.iter().all(|l| l.days_until < 0));
        assert!(report.soon.iter().all(|l| (0..=30).contains(&l.days_until)));
    }

    #[test]
    fn renders_lines_with_display_dates() {
        let records = vec![record(1, "A", offset(-5)), record(2, "B", offset(10))];
        let text = ExpiryReport::partition(&records, today(), 30).render(100);

        assert!(text.contains("-- EXPIRED --\nEXPIRED 5d: Resident 1|A|R.101|14/10/2026"));
        assert!(text.contains("-- EXPIRING SOON (<= 30 days) --\n10d left: Resident 2|B|R.101|29/10/2026"));
    }

    #[test]
    fn render_caps_oldest_first_with_overflow_line() {
        let records: Vec<UserRecord> = (1..=5)
            .map(|d| record(d, &format!("N{d}"), offset(-d)))
            .collect();
        let text = ExpiryReport::partition(&records, today(), 30).render(2);

        assert!(text.contains("EXPIRED 5d"));
        assert!(text.contains("EXPIRED 4d"));
        assert!(!text.contains("EXPIRED 3d"));
        assert!(text.ends_with("... 3 more expired"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = ExpiryReport::partition(&[], today(), 30);
        assert!(report.is_empty());
        assert_eq!(
            report.render(100),
            "Nobody has expired or expires within 30 days."
        );
    }
}
