//! Registration date rules and the day/month/year format used in chat.
//!
//! A registration is valid for two calendar years. A registration made on
//! Feb 29 expires on Feb 28 when the target year is not a leap year.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Length of a registration term.
pub const REGISTRATION_TERM: Months = Months::new(24);

/// Input format accepted from operators (`1/9/2024` and `01/09/2024` both parse).
pub const INPUT_FORMAT: &str = "%d/%m/%Y";
/// Output format used in every reply.
pub const DISPLAY_FORMAT: &str = "%d/%m/%Y";

/// Parse a `D/M/Y` date typed by an operator.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, INPUT_FORMAT).map_err(|_| CoreError::InvalidDate {
        input: trimmed.to_string(),
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DISPLAY_FORMAT).to_string()
}

/// Expiry date for a registration made on `registration`.
///
/// Month arithmetic clamps to the last day of the month, which turns Feb 29
/// into Feb 28 for non-leap target years.
pub fn expiry_for(registration: NaiveDate) -> Result<NaiveDate> {
    registration
        .checked_add_months(REGISTRATION_TERM)
        .ok_or_else(|| CoreError::InvalidDate {
            input: format_date(registration),
        })
}

/// Signed number of days from `today` until `expiry` (negative once expired).
pub fn days_until(expiry: NaiveDate, today: NaiveDate) -> i64 {
    (expiry - today).num_days()
}

/// Where a registration stands relative to a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExpiryStatus {
    /// Expired `days` days ago (always > 0).
    Expired { days: i64 },
    /// Expires today.
    DueToday,
    /// `days` days remaining (always > 0).
    Remaining { days: i64 },
}

impl ExpiryStatus {
    pub fn classify(expiry: NaiveDate, today: NaiveDate) -> Self {
        let delta = days_until(expiry, today);
        match delta {
            d if d < 0 => ExpiryStatus::Expired { days: -d },
            0 => ExpiryStatus::DueToday,
            d => ExpiryStatus::Remaining { days: d },
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, ExpiryStatus::Expired { .. })
    }
}

impl std::fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpiryStatus::Expired { days } => write!(f, "EXPIRED {days} days ago"),
            ExpiryStatus::DueToday => write!(f, "expires today"),
            ExpiryStatus::Remaining { days } => write!(f, "{days} days remaining"),
        }
    }
}
