// ==========================================
// 排产 API 端到端测试
// ==========================================
// 场景: 分配 → 排程 → 预览 → 快照；配置覆写；错误状态码；
//       批次状态变更经 ReplanWorker 触发异步重排
// ==========================================


use std::sync::Arc;

use food_production_aps::api::{ApiError, PreviewRequest, WhatIfRequest};
use food_production_aps::app::AppState;
use food_production_aps::config::config_keys;
use food_production_aps::domain::types::{BatchStatus, LotStatus, OrderStatus};
use food_production_aps::engine::clock::FixedClock;
use food_production_aps::engine::lot_allocator::AllocationRequest;
use food_production_aps::engine::reconciler::BatchStatusRequest;
use food_production_aps::engine::WorkerStats;
use tempfile::NamedTempFile;
use test_helpers::*;

fn app_state() -> (NamedTempFile, AppState) {
    let (file, path) = create_test_db().unwrap();
    let state = AppState::with_publisher(path, None, Arc::new(FixedClock(test_now()))).unwrap();
    (file, state)
}

/// 原料充足的单产品场景；产线 150kg
fn seed(state: &AppState) {
    let db = &state.db;
    insert_product(db, 1, "1");
    insert_material(db, 1);
    insert_recipe(db, 1, 1, "0.25");
    insert_lot(db, 1, 1, "1000", Some(date(2026, 6, 1)), LotStatus::Available);
    insert_line(db, 1, "150", true);
    insert_compat(db, 1, 1, None);
    insert_sales_order(db, 1, Some(date(2026, 3, 13)), false);
    insert_order(db, 1, Some(1), 1, "400", OrderStatus::Pending);
}

#[test]
fn test_allocate_plan_preview_flow() {
    let (_file, state) = app_state();
    seed(&state);
    let api = &state.planning_api;

    let report = api.allocate(&AllocationRequest::default()).unwrap();
    assert_eq!(report.results[0].final_status, OrderStatus::ReadyForProduction);
    assert_eq!(lot_state(&state.db, 1).0, dec("900"));

    let summary = api.plan().unwrap();
    assert_eq!(summary.new_batches, 3);

    let preview = api.preview(&PreviewRequest::default()).unwrap();
    assert!(preview.snapshot_written);
    assert_eq!(preview.plan.len(), 2);
    assert!(preview.unplaced.is_empty());

    let daily = api.daily_plan().unwrap();
    assert_eq!(daily.entries.len(), 2);
    assert_eq!(daily.entries[0].plan_date, date(2026, 3, 9));

    // 预览不改变已提交批次
    assert_eq!(batch_rows(&state.db).len(), 3);
}

#[test]
fn test_config_override_changes_daily_capacity() {
    let (_file, state) = app_state();
    seed(&state);
    let api = &state.planning_api;
    api.allocate(&AllocationRequest::default()).unwrap();

    state
        .config_manager
        .set_global_config_value(config_keys::DAILY_CAPACITY_FACTOR, "3")
        .unwrap();

    let preview = api.preview(&PreviewRequest::default()).unwrap();
    // 日产能 450：三个批次同一天
    assert_eq!(preview.plan.len(), 1);
}

#[test]
fn test_preview_with_fixed_days_and_start() {
    let (_file, state) = app_state();
    seed(&state);
    let api = &state.planning_api;
    api.allocate(&AllocationRequest::default()).unwrap();

    let preview = api
        .preview(&PreviewRequest {
            days: Some(1),
            from: Some(date(2026, 3, 14)),
        })
        .unwrap();
    assert_eq!(preview.plan.len(), 1);
    assert_eq!(preview.plan[0].date, date(2026, 3, 16));
    assert_eq!(preview.unplaced.len(), 1);

    let json = serde_json::to_value(&preview).unwrap();
    assert!(json["plan"][0]["2026-03-16"].is_array());
}

#[test]
fn test_error_status_codes() {
    let (_file, state) = app_state();
    seed(&state);
    let api = &state.planning_api;

    let err = api.what_if(&WhatIfRequest { sales_order_id: 404 }).unwrap_err();
    assert_eq!(err.status_code(), 404);

    let err = api
        .update_batch_status(&BatchStatusRequest {
            batch_ids: vec![],
            target_state: BatchStatus::Completed,
        })
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = api
        .preview(&PreviewRequest {
            days: Some(0),
            from: None,
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
    assert_eq!(err.status_code(), 400);

    let err = api
        .allocate(&AllocationRequest {
            order_ids: None,
            limit: Some(0),
        })
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_batch_status_change_triggers_async_replan() {
    let (_file, path) = create_test_db().unwrap();
    let (state, worker) =
        AppState::with_replan_worker(path, Arc::new(FixedClock(test_now()))).unwrap();
    let worker = worker.spawn();

    let db = state.db.clone();
    insert_product(&db, 1, "1");
    insert_line(&db, 1, "150", true);
    insert_line(&db, 2, "150", true);
    insert_compat(&db, 1, 1, None);
    insert_compat(&db, 1, 2, None);
    insert_order(&db, 1, None, 1, "150", OrderStatus::ReadyForProduction);
    insert_order(&db, 2, None, 1, "300", OrderStatus::ReadyForProduction);

    state.planning_api.plan().unwrap();
    let (order_1_batch, busy_line) = batch_rows(&db)
        .into_iter()
        .find(|row| row.1 == 1)
        .map(|row| (row.0, row.2))
        .unwrap();
    let free_line = if busy_line == 1 { 2 } else { 1 };

    state
        .planning_api
        .update_batch_status(&BatchStatusRequest {
            batch_ids: vec![order_1_batch],
            target_state: BatchStatus::InProgress,
        })
        .unwrap();

    drop(state);
    let stats = worker.await.unwrap();
    assert_eq!(stats, WorkerStats { processed: 1, failed: 0 });

    // 订单 1 已投产占用其产线，订单 2 的 300kg 全部重排到另一条产线
    let planned: Vec<_> = batch_rows(&db)
        .into_iter()
        .filter(|row| row.4 == "planned")
        .collect();
    assert_eq!(planned.len(), 2);
    assert!(planned.iter().all(|row| row.1 == 2 && row.2 == free_line));
    let total: rust_decimal::Decimal = planned.iter().map(|row| row.3).sum();
    assert_eq!(total, dec("300"));
    assert!(!line_active(&db, busy_line));
    assert_eq!(order_status(&db, 1), OrderStatus::InProcess);
}
