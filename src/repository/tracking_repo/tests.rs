use super::TrackingRecordRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::stage::Stage;
use crate::domain::tracking::TrackingRecord;
use crate::domain::types::{Incoterm, PurchaseVariant};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::RepositoryError;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::init_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

fn ts(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 5, day)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn make_record(id: &str, line_id: &str, sku: &str, variant: PurchaseVariant) -> TrackingRecord {
    let mut r = TrackingRecord::new(
        id.to_string(),
        "Q1".to_string(),
        line_id.to_string(),
        sku.to_string(),
        variant,
        ts(1),
    );
    r.complete_stage(Stage::Quoted, ts(1), None);
    r.stage_mut(Stage::Discounted).unwrap().deadline = NaiveDate::from_ymd_opt(2025, 5, 3);
    r
}

#[test]
fn test_insert_and_find_round_trip() {
    let repo = TrackingRecordRepository::new(setup_test_db());
    let mut record = make_record("R1", "L1", "SKU-1", PurchaseVariant::Internacional);
    record.incoterm = Some(Incoterm::Cif);
    record.supplier_name = Some("Aceros del Sur".to_string());

    repo.insert(&record, None).unwrap();

    let found = repo.find_by_id("R1").unwrap().expect("记录应存在");
    assert_eq!(found.stages.len(), 13);
    assert_eq!(found.current_stage(), Stage::Quoted);
    assert_eq!(found.stage(Stage::Quoted).unwrap().actual_date, Some(ts(1)));
    assert_eq!(
        found.stage(Stage::Discounted).unwrap().deadline,
        NaiveDate::from_ymd_opt(2025, 5, 3)
    );
    assert_eq!(found.incoterm, Some(Incoterm::Cif));
    assert_eq!(found.supplier_name.as_deref(), Some("Aceros del Sur"));

    let by_line = repo.find_by_line_id("L1").unwrap().expect("记录应存在");
    assert_eq!(by_line.record_id, "R1");
}

#[test]
fn test_duplicate_line_rejected() {
    let repo = TrackingRecordRepository::new(setup_test_db());
    repo.insert(&make_record("R1", "L1", "SKU-1", PurchaseVariant::Nacional), None)
        .unwrap();

    let err = repo
        .insert(&make_record("R2", "L1", "SKU-1", PurchaseVariant::Nacional), None)
        .unwrap_err();
    assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
}

#[test]
fn test_update_with_optimistic_lock() {
    let repo = TrackingRecordRepository::new(setup_test_db());
    let record = make_record("R1", "L1", "SKU-1", PurchaseVariant::Nacional);
    repo.insert(&record, None).unwrap();

    let mut first = repo.find_by_id("R1").unwrap().unwrap();
    let mut second = first.clone();

    first.complete_stage(Stage::Discounted, ts(2), None);
    let new_revision = repo.update(&first, None).unwrap();
    assert_eq!(new_revision, 1);

    second.approved = true;
    let err = repo.update(&second, None).unwrap_err();
    match err {
        RepositoryError::OptimisticLockFailure { expected, actual, .. } => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("Expected OptimisticLockFailure, got {:?}", other),
    }

    let stored = repo.find_by_id("R1").unwrap().unwrap();
    assert!(stored.is_completed(Stage::Discounted));
    assert!(!stored.approved);
}

#[test]
fn test_update_missing_record() {
    let repo = TrackingRecordRepository::new(setup_test_db());
    let record = make_record("R9", "L9", "SKU-1", PurchaseVariant::Nacional);
    assert!(matches!(
        repo.update(&record, None),
        Err(RepositoryError::NotFound { .. })
    ));
}

#[test]
fn test_audit_written_in_same_transaction() {
    let conn = setup_test_db();
    let repo = TrackingRecordRepository::new(conn.clone());
    let logs = ActionLogRepository::new(conn);

    let record = make_record("R1", "L1", "SKU-1", PurchaseVariant::Nacional);
    let audit = ActionLog::new(Some("R1".into()), ActionType::CreateRecord, "sync", ts(1));
    repo.insert(&record, Some(&audit)).unwrap();

    // 冲突的更新不应留下审计日志
    let mut stale = record.clone();
    stale.revision = 5;
    let audit = ActionLog::new(Some("R1".into()), ActionType::Approve, "ana", ts(2));
    assert!(repo.update(&stale, Some(&audit)).is_err());

    let trail = logs.find_by_record_id("R1").unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action_type, "CreateRecord");
}

#[test]
fn test_active_queries() {
    let repo = TrackingRecordRepository::new(setup_test_db());

    let active = make_record("R1", "L1", "SKU-1", PurchaseVariant::Nacional);
    let mut rejected = make_record("R2", "L2", "SKU-1", PurchaseVariant::Nacional);
    rejected.rejected = true;
    let mut received = make_record("R3", "L3", "SKU-1", PurchaseVariant::Nacional);
    received.complete_stage(Stage::Received, ts(9), None);
    let mut approved = make_record("R4", "L4", "SKU-2", PurchaseVariant::Nacional);
    approved.approved = true;

    for r in [&active, &rejected, &received, &approved] {
        repo.insert(r, None).unwrap();
    }

    let ids: Vec<String> = repo
        .list_active()
        .unwrap()
        .into_iter()
        .map(|r| r.record_id)
        .collect();
    assert_eq!(ids, vec!["R1".to_string(), "R4".to_string()]);
    assert_eq!(repo.count_active_by_sku("SKU-1").unwrap(), 1);
    assert_eq!(repo.count_active_by_sku("SKU-3").unwrap(), 0);
    assert_eq!(repo.list_by_quotation("Q1").unwrap().len(), 4);

    let approvals = repo.approvals_by_quotation("Q1").unwrap();
    assert_eq!(approvals.iter().filter(|a| **a).count(), 1);
}
