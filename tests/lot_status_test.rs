// ==========================================
// 原料批次质检状态集成测试
// ==========================================
// 场景: 放行触发重新分配事件、隔离/拒收不触发、非法状态与未知批次
// ==========================================


use food_production_aps::domain::types::LotStatus;
use food_production_aps::engine::events::{OptionalEventPublisher, PlanningEventKind};
use food_production_aps::engine::lot_status::{LotStatusService, LotStatusUpdate};
use food_production_aps::repository::RepositoryError;
use test_helpers::*;

fn update(lot_id: i64, new_status: LotStatus) -> LotStatusUpdate {
    LotStatusUpdate {
        lot_id,
        new_status,
        expiration_date: None,
        lot_code: None,
    }
}

#[test]
fn test_release_from_quarantine_requests_reallocation() {
    let (_file, db) = open_test_database();
    insert_material(&db, 1);
    insert_lot(&db, 7, 1, "25", None, LotStatus::Quarantined);
    let recorder = RecordingPublisher::new();
    let service = LotStatusService::new(
        db.clone(),
        OptionalEventPublisher::with_publisher(recorder.clone()),
    );

    let lot = service
        .update(&LotStatusUpdate {
            lot_id: 7,
            new_status: LotStatus::Available,
            expiration_date: Some(date(2026, 6, 30)),
            lot_code: Some("QA-2026-007".to_string()),
        })
        .unwrap();

    assert_eq!(lot.status, LotStatus::Available);
    assert_eq!(lot.expiration_date, Some(date(2026, 6, 30)));
    assert_eq!(lot.lot_code.as_deref(), Some("QA-2026-007"));
    assert_eq!(lot.available_qty, dec("25"));

    let events = recorder.taken();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, PlanningEventKind::Reallocate);
    assert_eq!(events[0].origin, "lot:7");
}

#[test]
fn test_quarantine_and_reject_do_not_publish() {
    let (_file, db) = open_test_database();
    insert_material(&db, 1);
    insert_lot(&db, 1, 1, "10", Some(date(2026, 5, 1)), LotStatus::Available);
    let recorder = RecordingPublisher::new();
    let service = LotStatusService::new(
        db.clone(),
        OptionalEventPublisher::with_publisher(recorder.clone()),
    );

    let lot = service.update(&update(1, LotStatus::Quarantined)).unwrap();
    // 未提供的到期日 / 批号保持原值
    assert_eq!(lot.expiration_date, Some(date(2026, 5, 1)));
    assert_eq!(lot.lot_code.as_deref(), Some("LOT-1"));

    service.update(&update(1, LotStatus::Rejected)).unwrap();
    assert_eq!(lot_state(&db, 1).1, LotStatus::Rejected);
    assert!(recorder.taken().is_empty());
}

#[test]
fn test_non_receiving_status_is_rejected() {
    let (_file, db) = open_test_database();
    insert_material(&db, 1);
    insert_lot(&db, 1, 1, "10", None, LotStatus::Available);
    let service = LotStatusService::new(db.clone(), OptionalEventPublisher::none());

    for status in [LotStatus::Depleted, LotStatus::Ordered] {
        let err = service.update(&update(1, status)).unwrap_err();
        assert!(matches!(err, RepositoryError::ValidationError(_)));
    }
    assert_eq!(lot_state(&db, 1).1, LotStatus::Available);
}

#[test]
fn test_unknown_lot_is_not_found() {
    let (_file, db) = open_test_database();
    let service = LotStatusService::new(db.clone(), OptionalEventPublisher::none());

    let err = service.update(&update(404, LotStatus::Available)).unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

#[test]
fn test_empty_lot_cannot_be_released() {
    let (_file, db) = open_test_database();
    insert_material(&db, 1);
    insert_lot(&db, 3, 1, "0", None, LotStatus::Depleted);
    let recorder = RecordingPublisher::new();
    let service = LotStatusService::new(
        db.clone(),
        OptionalEventPublisher::with_publisher(recorder.clone()),
    );

    for status in [LotStatus::Available, LotStatus::Quarantined] {
        let err = service.update(&update(3, status)).unwrap_err();
        assert!(matches!(err, RepositoryError::ValidationError(_)));
    }
    assert_eq!(lot_state(&db, 3), (dec("0"), LotStatus::Depleted));
    assert!(recorder.taken().is_empty());
}
