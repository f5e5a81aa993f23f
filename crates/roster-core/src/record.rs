use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::dates::{self, ExpiryStatus};
use crate::error::{CoreError, Result};

/// Column widths of the `users` table, in characters.
pub const MAX_NAME_CHARS: usize = 255;
pub const MAX_NATIONAL_ID_CHARS: usize = 20;
pub const MAX_ROOM_CHARS: usize = 20;

/// A persisted residency registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Surrogate key assigned by storage.
    pub id: i64,
    pub name: String,
    pub birth_date: NaiveDate,
    /// Unique external key for lookup, renewal and deletion.
    pub national_id: String,
    pub room_number: String,
    pub registration_date: NaiveDate,
    /// Always `dates::expiry_for(registration_date)`.
    pub expiry_date: NaiveDate,
    /// Set by storage on insert.
    pub created_at: NaiveDateTime,
}

impl UserRecord {
    pub fn status(&self, today: NaiveDate) -> ExpiryStatus {
        ExpiryStatus::classify(self.expiry_date, today)
    }
}

/// Validated input for creating a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub name: String,
    pub birth_date: NaiveDate,
    pub national_id: String,
    pub room_number: String,
    pub registration_date: NaiveDate,
}

impl NewRecord {
    /// Build a record, trimming text fields and rejecting empty ones and
    /// ones wider than their column.
    pub fn new(
        name: &str,
        birth_date: NaiveDate,
        national_id: &str,
        room_number: &str,
        registration_date: NaiveDate,
    ) -> Result<Self> {
        Ok(Self {
            name: required("name", name, MAX_NAME_CHARS)?,
            birth_date,
            national_id: required("national_id", national_id, MAX_NATIONAL_ID_CHARS)?,
            room_number: required("room_number", room_number, MAX_ROOM_CHARS)?,
            registration_date,
        })
    }

    pub fn expiry_date(&self) -> Result<NaiveDate> {
        dates::expiry_for(self.registration_date)
    }
}

fn required(field: &'static str, value: &str, max: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::EmptyField { field });
    }
    if trimmed.chars().count() > max {
        return Err(CoreError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

/// Outcome of a single-record expiry check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStatus {
    pub record: UserRecord,
    pub status: ExpiryStatus,
}
