//! Reply texts.

use chrono::NaiveDate;
use roster_core::dates::format_date;
use roster_core::record::{RecordStatus, UserRecord};
use roster_store::StoreError;

pub const HELP: &str = "Residency roster commands:\n\
    /createuser Name|Birth(D/M/Y)|NationalID|Room|Registered(D/M/Y)\n\
    /deleteuser NationalID\n\
    /renew NationalID Registered(D/M/Y)\n\
    /check - everyone expired or expiring soon\n\
    /check NationalID - one registration\n\
    /pingdb - database health\n\
    /chatid - id of this chat";

pub fn chat_id(chat_id: i64) -> String {
    format!("Current chat ID: {chat_id}")
}

pub fn created(record: &UserRecord) -> String {
    format!(
        "OK: {} (expires {})",
        record.name,
        format_date(record.expiry_date)
    )
}

pub fn deleted(national_id: &str) -> String {
    format!("Deleted national ID {national_id}")
}

pub fn renewed(national_id: &str, registration: NaiveDate, expiry: NaiveDate) -> String {
    format!(
        "Renewed {national_id}: registered {}, expires {}",
        format_date(registration),
        format_date(expiry)
    )
}

pub fn not_found(national_id: &str) -> String {
    format!("National ID {national_id} not found")
}

pub fn status(status: &RecordStatus) -> String {
    let r = &status.record;
    format!(
        "Name: {}\nNational ID: {}\nRoom: {}\nRegistered: {}\nExpires: {}\nStatus: {}",
        r.name,
        r.national_id,
        r.room_number,
        format_date(r.registration_date),
        format_date(r.expiry_date),
        status.status
    )
}

pub fn health(value: i64) -> String {
    format!("DB OK: {value}")
}

pub fn storage_error(err: &StoreError) -> String {
    match err {
        StoreError::DuplicateNationalId { national_id } => {
            format!("National ID {national_id} is already registered")
        }
        StoreError::NotConfigured => {
            "Database is not configured; record commands are unavailable.".to_string()
        }
        other => format!("Error: {other}"),
    }
}
