use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::info;

use roster_core::dates;
use roster_core::record::{NewRecord, RecordStatus, UserRecord};

use crate::driver::DbError;
use crate::error::{Result, StoreError};
use crate::manager::ConnectionManager;
use crate::value::{Row, Value};

/// Statements issued by [`RecordService`].
pub mod sql {
    pub const INSERT: &str = "INSERT INTO users
        (name, birth_date, national_id, room_number, registration_date, expiry_date)
        VALUES (?, ?, ?, ?, ?, ?)";

    pub const SELECT_BY_NATIONAL_ID: &str = "SELECT id, name, birth_date, national_id, room_number,
        registration_date, expiry_date, created_at
        FROM users WHERE national_id = ? LIMIT 1";

    pub const DELETE_BY_NATIONAL_ID: &str = "DELETE FROM users WHERE national_id = ? LIMIT 1";

    pub const RENEW: &str = "UPDATE users SET registration_date = ?, expiry_date = ?
        WHERE national_id = ? LIMIT 1";

    /// Everything expiring on or before the bound, oldest expiry first.
    pub const SELECT_DUE: &str = "SELECT id, name, birth_date, national_id, room_number,
        registration_date, expiry_date, created_at
        FROM users WHERE expiry_date <= ? ORDER BY expiry_date ASC, id ASC";
}

/// Record operations keyed on national ID.
#[derive(Clone)]
pub struct RecordService {
    db: Arc<ConnectionManager>,
}

impl RecordService {
    pub fn new(db: Arc<ConnectionManager>) -> Self {
        Self { db }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.db
    }

    /// Insert a record and read it back with its storage-assigned fields.
    pub async fn create(&self, new: &NewRecord) -> Result<UserRecord> {
        let expiry = new.expiry_date()?;
        let params = [
            Value::from(new.name.as_str()),
            Value::from(new.birth_date),
            Value::from(new.national_id.as_str()),
            Value::from(new.room_number.as_str()),
            Value::from(new.registration_date),
            Value::from(expiry),
        ];
        match self.db.execute(sql::INSERT, &params, true).await {
            Ok(_) => {}
            Err(StoreError::Database(DbError::UniqueViolation(_))) => {
                return Err(StoreError::DuplicateNationalId {
                    national_id: new.national_id.clone(),
                });
            }
            Err(e) => return Err(e),
        }
        info!(national_id = %new.national_id, expiry = %expiry, "record created");

        self.find(&new.national_id).await?.ok_or_else(|| {
            StoreError::Decode(format!("record {} missing after insert", new.national_id))
        })
    }

    /// Returns `false` when no record has this national ID.
    pub async fn delete(&self, national_id: &str) -> Result<bool> {
        let affected = self
            .db
            .execute(sql::DELETE_BY_NATIONAL_ID, &[Value::from(national_id)], true)
            .await?;
        if affected > 0 {
            info!(national_id, "record deleted");
        }
        Ok(affected > 0)
    }

    /// Overwrite the registration date and recompute the expiry.
    ///
    /// Returns the stored `(registration, expiry)` pair, or `None` when the
    /// national ID is unknown.
    pub async fn renew(
        &self,
        national_id: &str,
        registration: NaiveDate,
    ) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let expiry = dates::expiry_for(registration)?;
        let params = [
            Value::from(registration),
            Value::from(expiry),
            Value::from(national_id),
        ];
        let affected = self.db.execute(sql::RENEW, &params, true).await?;
        if affected > 0 {
            info!(national_id, expiry = %expiry, "record renewed");
            return Ok(Some((registration, expiry)));
        }
        // An identical renewal can report zero changed rows.
        Ok(self
            .find(national_id)
            .await?
            .map(|_| (registration, expiry)))
    }

    pub async fn find(&self, national_id: &str) -> Result<Option<UserRecord>> {
        let rows = self
            .db
            .query(sql::SELECT_BY_NATIONAL_ID, &[Value::from(national_id)])
            .await?;
        rows.first().map(record_from_row).transpose()
    }

    /// Expiry status of one record relative to `today`.
    pub async fn check_one(&self, national_id: &str, today: NaiveDate) -> Result<Option<RecordStatus>> {
        Ok(self.find(national_id).await?.map(|record| RecordStatus {
            status: record.status(today),
            record,
        }))
    }

    /// Records expiring on or before `today + window_days`, oldest first.
    pub async fn due_within(&self, today: NaiveDate, window_days: i64) -> Result<Vec<UserRecord>> {
        let bound = window_end(today, window_days);
        let rows = self.db.query(sql::SELECT_DUE, &[Value::from(bound)]).await?;
        rows.iter().map(record_from_row).collect()
    }

    pub async fn health_check(&self) -> Result<i64> {
        self.db.health_check().await
    }
}

/// Last day included in the lookahead window.
pub fn window_end(today: NaiveDate, window_days: i64) -> NaiveDate {
    today
        .checked_add_days(Days::new(window_days.max(0) as u64))
        .unwrap_or(NaiveDate::MAX)
}

/// Map a raw `users` row onto the typed record.
pub fn record_from_row(row: &Row) -> Result<UserRecord> {
    Ok(UserRecord {
        id: row.int("id")?,
        name: row.text("name")?.to_string(),
        birth_date: row.date("birth_date")?,
        national_id: row.text("national_id")?.to_string(),
        room_number: row.text("room_number")?.to_string(),
        registration_date: row.date("registration_date")?,
        expiry_date: row.date("expiry_date")?,
        created_at: row.timestamp("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn maps_a_full_row() {
        let created = NaiveDateTime::parse_from_str("2026-10-19 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let row = Row::new()
            .with("id", 1)
            .with("name", "Alice")
            .with("birth_date", d(1995, 5, 20))
            .with("national_id", "012345678901")
            .with("room_number", "101")
            .with("registration_date", d(2024, 9, 1))
            .with("expiry_date", d(2026, 9, 1))
            .with("created_at", created);
        let record = record_from_row(&row).unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.national_id, "012345678901");
        assert_eq!(record.expiry_date, d(2026, 9, 1));
        assert_eq!(record.created_at, created);
    }

    #[test]
    fn row_without_expected_column_is_rejected() {
        let row = Row::new().with("id", 1).with("name", "Alice");
        assert!(matches!(record_from_row(&row), Err(StoreError::Decode(_))));
    }

    #[test]
    fn window_end_adds_days() {
        assert_eq!(window_end(d(2026, 10, 19), 30), d(2026, 11, 18));
        assert_eq!(window_end(d(2026, 10, 19), -4), d(2026, 10, 19));
    }
}
