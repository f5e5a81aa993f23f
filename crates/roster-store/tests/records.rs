// Record lifecycle and expiry scanning against the in-memory server.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use roster_core::dates::ExpiryStatus;
use roster_core::record::NewRecord;
use roster_store::memory::MemoryBackend;
use roster_store::{ConnectionManager, ExpiryScanner, RecordService, RetryPolicy};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn today() -> NaiveDate {
    d(2026, 10, 19)
}

async fn setup() -> (MemoryBackend, RecordService) {
    let backend = MemoryBackend::empty("roster");
    let manager = ConnectionManager::start(backend.connector(), RetryPolicy::immediate(3)).await;
    (backend, RecordService::new(Arc::new(manager)))
}

fn resident(national_id: &str, registration: NaiveDate) -> NewRecord {
    NewRecord::new("Resident", d(1990, 1, 1), national_id, "204", registration).unwrap()
}

/// Registration date whose expiry lands `offset` days from today.
fn registered_for(offset: i64) -> NaiveDate {
    let expiry = if offset >= 0 {
        today().checked_add_days(Days::new(offset as u64)).unwrap()
    } else {
        today().checked_sub_days(Days::new((-offset) as u64)).unwrap()
    };
    expiry.checked_sub_months(chrono::Months::new(24)).unwrap()
}

#[tokio::test]
async fn create_then_check_is_consistent() {
    let (_backend, records) = setup().await;
    let created = records
        .create(&resident("111", d(2024, 9, 1)))
        .await
        .unwrap();
    assert_eq!(created.expiry_date, d(2026, 9, 1));

    let status = records.check_one("111", today()).await.unwrap().unwrap();
    assert_eq!(status.record, created);
    assert_eq!(status.status, ExpiryStatus::Expired { days: 48 });
}

#[tokio::test]
async fn leap_day_registration_expires_feb_28() {
    let (_backend, records) = setup().await;
    let created = records
        .create(&resident("222", d(2024, 2, 29)))
        .await
        .unwrap();
    assert_eq!(created.expiry_date, d(2026, 2, 28));
}

#[tokio::test]
async fn delete_missing_is_not_found_not_error() {
    let (_backend, records) = setup().await;
    assert!(!records.delete("nobody").await.unwrap());
    assert!(records.check_one("nobody", today()).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_removes_the_record() {
    let (backend, records) = setup().await;
    records.create(&resident("333", d(2025, 1, 1))).await.unwrap();
    assert!(records.delete("333").await.unwrap());
    assert_eq!(backend.user_count(), 0);
    assert!(records.find("333").await.unwrap().is_none());
}

#[tokio::test]
async fn renew_overwrites_and_is_idempotent() {
    let (_backend, records) = setup().await;
    records.create(&resident("444", d(2024, 1, 10))).await.unwrap();

    let renewed = records.renew("444", d(2026, 10, 1)).await.unwrap();
    assert_eq!(renewed, Some((d(2026, 10, 1), d(2028, 10, 1))));
    let again = records.renew("444", d(2026, 10, 1)).await.unwrap();
    assert_eq!(again, renewed);

    let stored = records.find("444").await.unwrap().unwrap();
    assert_eq!(stored.registration_date, d(2026, 10, 1));
    assert_eq!(stored.expiry_date, d(2028, 10, 1));
}

#[tokio::test]
async fn renew_unknown_id_is_none() {
    let (_backend, records) = setup().await;
    assert_eq!(records.renew("nobody", d(2026, 1, 1)).await.unwrap(), None);
}

#[tokio::test]
async fn scan_partitions_records_inside_the_window() {
    let (_backend, records) = setup().await;
    records.create(&resident("expired", registered_for(-5))).await.unwrap();
    records.create(&resident("today", registered_for(0))).await.unwrap();
    records.create(&resident("soon", registered_for(10))).await.unwrap();
    records.create(&resident("edge", registered_for(30))).await.unwrap();
    records.create(&resident("later", registered_for(31))).await.unwrap();

    let scanner = ExpiryScanner::new(records.clone(), 30);
    let report = scanner.scan(today()).await.unwrap();

    let expired: Vec<(&str, i64)> = report
        .expired
        .iter()
        .map(|l| (l.national_id.as_str(), l.days_until))
        .collect();
    let soon: Vec<(&str, i64)> = report
        .soon
        .iter()
        .map(|l| (l.national_id.as_str(), l.days_until))
        .collect();
    assert_eq!(expired, [("expired", -5)]);
    assert_eq!(soon, [("today", 0), ("soon", 10), ("edge", 30)]);
}

#[tokio::test]
async fn scan_of_empty_table_renders_explicit_message() {
    let (_backend, records) = setup().await;
    let report = ExpiryScanner::new(records, 30).scan(today()).await.unwrap();
    assert!(report.is_empty());
    assert!(report.render(100).contains("Nobody"));
}
