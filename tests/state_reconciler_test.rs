// ==========================================
// 批次状态协调集成测试
// ==========================================
// 场景: 状态机校验、产线占用/释放、订单与销售订单级联、重排事件
// ==========================================


use std::sync::Arc;

use food_production_aps::config::PlannerConfig;
use food_production_aps::db::{Database, TxPolicy};
use food_production_aps::domain::types::{BatchStatus, OrderStatus, SalesOrderStatus};
use food_production_aps::engine::batch_scheduler::BatchScheduler;
use food_production_aps::engine::events::{OptionalEventPublisher, PlanningEventKind};
use food_production_aps::engine::reconciler::{
    BatchStatusRequest, OrderStatusChange, StateReconciler,
};
use food_production_aps::repository::RepositoryError;
use test_helpers::*;

fn plan(db: &Database) -> Vec<i64> {
    let config = PlannerConfig::default();
    let summary = db
        .run_in_transaction(TxPolicy::Commit, |tx| {
            BatchScheduler::new().plan(tx, &config, test_now())
        })
        .unwrap();
    summary.batches.iter().map(|b| b.id).collect()
}

fn request(batch_ids: &[i64], target_state: BatchStatus) -> BatchStatusRequest {
    BatchStatusRequest {
        batch_ids: batch_ids.to_vec(),
        target_state,
    }
}

/// 150kg 产线；销售订单 1 下有订单 1 (400kg)
fn seed_single_order(db: &Database) {
    insert_product(db, 1, "1");
    insert_line(db, 1, "150", true);
    insert_compat(db, 1, 1, None);
    insert_sales_order(db, 1, Some(date(2026, 3, 20)), false);
    insert_order(db, 1, Some(1), 1, "400", OrderStatus::ReadyForProduction);
}

#[test]
fn test_start_batch_occupies_line_and_moves_order_in_process() {
    let (_file, db) = open_test_database();
    seed_single_order(&db);
    let batches = plan(&db);
    let recorder = RecordingPublisher::new();
    let reconciler =
        StateReconciler::new(db.clone(), OptionalEventPublisher::with_publisher(recorder.clone()));

    let report = reconciler
        .reconcile(&request(&[batches[0]], BatchStatus::InProgress), &PlannerConfig::default())
        .unwrap();

    assert_eq!(report.updated_batches, vec![batches[0]]);
    assert_eq!(
        report.affected_orders,
        vec![OrderStatusChange {
            order_id: 1,
            old_status: OrderStatus::ReadyForProduction,
            new_status: OrderStatus::InProcess,
        }]
    );
    assert!(!line_active(&db, 1));

    let events = recorder.taken();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, PlanningEventKind::Replan);
    assert_eq!(events[0].origin, "batch:in_progress");
    assert_eq!(events[0].batch_ids, Some(vec![batches[0]]));
}

#[test]
fn test_line_released_only_when_no_batch_in_progress() {
    let (_file, db) = open_test_database();
    seed_single_order(&db);
    let batches = plan(&db);
    let reconciler = StateReconciler::new(db.clone(), OptionalEventPublisher::none());
    let config = PlannerConfig::default();

    reconciler
        .reconcile(&request(&batches[0..2], BatchStatus::InProgress), &config)
        .unwrap();
    reconciler
        .reconcile(&request(&[batches[0]], BatchStatus::Completed), &config)
        .unwrap();
    assert!(!line_active(&db, 1));

    reconciler
        .reconcile(&request(&[batches[1]], BatchStatus::Cancelled), &config)
        .unwrap();
    assert!(line_active(&db, 1));
    assert_eq!(order_status(&db, 1), OrderStatus::InProcess);
}

#[test]
fn test_invalid_requests_are_rejected_without_changes() {
    let (_file, db) = open_test_database();
    seed_single_order(&db);
    let batches = plan(&db);
    let reconciler = StateReconciler::new(db.clone(), OptionalEventPublisher::none());
    let config = PlannerConfig::default();

    let err = reconciler
        .reconcile(&request(&[], BatchStatus::Completed), &config)
        .unwrap_err();
    assert!(matches!(err, RepositoryError::ValidationError(_)));

    let err = reconciler
        .reconcile(&request(&[batches[0], 999], BatchStatus::Completed), &config)
        .unwrap_err();
    assert!(matches!(err, RepositoryError::ValidationError(_)));

    let err = reconciler
        .reconcile(&request(&[batches[0]], BatchStatus::Planned), &config)
        .unwrap_err();
    assert!(matches!(err, RepositoryError::ValidationError(_)));

    reconciler
        .reconcile(&request(&[batches[0]], BatchStatus::Completed), &config)
        .unwrap();
    let err = reconciler
        .reconcile(&request(&[batches[0], batches[1]], BatchStatus::InProgress), &config)
        .unwrap_err();
    match err {
        RepositoryError::InvalidStateTransition { batch_id, from, to } => {
            assert_eq!(batch_id, batches[0]);
            assert_eq!(from, "completed");
            assert_eq!(to, "in_progress");
        }
        other => panic!("Expected InvalidStateTransition, got {:?}", other),
    }
    // 批次 2 未随失败请求变更
    let rows = batch_rows(&db);
    let second = rows.iter().find(|r| r.0 == batches[1]).unwrap();
    assert_eq!(second.4, "planned");
    assert!(line_active(&db, 1));
}

#[test]
fn test_finishing_all_orders_readies_sales_order() {
    let (_file, db) = open_test_database();
    insert_product(&db, 1, "1");
    insert_line(&db, 1, "150", true);
    insert_compat(&db, 1, 1, None);
    insert_sales_order(&db, 1, Some(date(2026, 3, 20)), false);
    insert_order(&db, 1, Some(1), 1, "150", OrderStatus::ReadyForProduction);
    insert_order(&db, 2, Some(1), 1, "150", OrderStatus::ReadyForProduction);
    let batches = plan(&db);
    assert_eq!(batches.len(), 2);
    let reconciler = StateReconciler::new(db.clone(), OptionalEventPublisher::none());
    let config = PlannerConfig::default();

    let report = reconciler
        .reconcile(&request(&[batches[0]], BatchStatus::Completed), &config)
        .unwrap();
    assert_eq!(report.affected_orders[0].new_status, OrderStatus::Finished);
    assert_eq!(order_status(&db, 1), OrderStatus::Finished);
    assert_eq!(sales_order_status(&db, 1), SalesOrderStatus::Pending);

    reconciler
        .reconcile(&request(&[batches[1]], BatchStatus::InProgress), &config)
        .unwrap();
    assert_eq!(order_status(&db, 2), OrderStatus::InProcess);
    reconciler
        .reconcile(&request(&[batches[1]], BatchStatus::Completed), &config)
        .unwrap();
    assert_eq!(order_status(&db, 2), OrderStatus::Finished);
    assert_eq!(sales_order_status(&db, 1), SalesOrderStatus::ReadyForDispatch);
}

#[test]
fn test_partial_completion_does_not_finish_order() {
    let (_file, db) = open_test_database();
    seed_single_order(&db);
    let batches = plan(&db);
    let reconciler = StateReconciler::new(db.clone(), OptionalEventPublisher::none());

    // 完成前两批（300kg），第三批取消：落实重量不足 400kg
    let config = PlannerConfig::default();
    reconciler
        .reconcile(&request(&batches[0..2], BatchStatus::Completed), &config)
        .unwrap();
    reconciler
        .reconcile(&request(&[batches[2]], BatchStatus::Cancelled), &config)
        .unwrap();

    assert_eq!(order_status(&db, 1), OrderStatus::ReadyForProduction);
    assert_eq!(sales_order_status(&db, 1), SalesOrderStatus::Pending);
}

#[test]
fn test_event_publication_failure_does_not_fail_request() {
    use food_production_aps::engine::events::{PlanningEvent, PlanningEventPublisher};

    struct Broken;
    impl PlanningEventPublisher for Broken {
        fn publish(
            &self,
            _event: PlanningEvent,
        ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            Err("channel closed".into())
        }
    }

    let (_file, db) = open_test_database();
    seed_single_order(&db);
    let batches = plan(&db);
    let reconciler =
        StateReconciler::new(db.clone(), OptionalEventPublisher::with_publisher(Arc::new(Broken)));

    let report = reconciler
        .reconcile(&request(&[batches[0]], BatchStatus::InProgress), &PlannerConfig::default())
        .unwrap();
    assert_eq!(report.updated_batches.len(), 1);
}

#[test]
fn test_unchanged_order_is_reported_with_same_status() {
    let (_file, db) = open_test_database();
    seed_single_order(&db);
    let batches = plan(&db);
    let reconciler = StateReconciler::new(db.clone(), OptionalEventPublisher::none());

    // 第三批仍为 planned，订单状态不变
    let report = reconciler
        .reconcile(&request(&batches[0..2], BatchStatus::Completed), &PlannerConfig::default())
        .unwrap();
    assert_eq!(
        report.affected_orders,
        vec![OrderStatusChange {
            order_id: 1,
            old_status: OrderStatus::ReadyForProduction,
            new_status: OrderStatus::ReadyForProduction,
        }]
    );
}

#[test]
fn test_in_process_order_remainder_is_replanned_until_finished() {
    let (_file, db) = open_test_database();
    insert_product(&db, 1, "1");
    insert_line(&db, 1, "150", true);
    insert_line(&db, 2, "150", true);
    insert_compat(&db, 1, 1, None);
    insert_compat(&db, 1, 2, None);
    insert_sales_order(&db, 1, Some(date(2026, 3, 20)), false);
    insert_order(&db, 1, Some(1), 1, "400", OrderStatus::ReadyForProduction);
    let batches = plan(&db);
    assert_eq!(batches.len(), 3);
    let reconciler = StateReconciler::new(db.clone(), OptionalEventPublisher::none());
    let config = PlannerConfig::default();

    reconciler
        .reconcile(&request(&[batches[0]], BatchStatus::InProgress), &config)
        .unwrap();
    assert_eq!(order_status(&db, 1), OrderStatus::InProcess);
    let busy_line = batch_rows(&db)
        .into_iter()
        .find(|row| row.0 == batches[0])
        .map(|row| row.2)
        .unwrap();
    let free_line = if busy_line == 1 { 2 } else { 1 };

    // 重排后剩余 250kg 全部落在空闲产线
    let replanned = plan(&db);
    let planned: Vec<_> = batch_rows(&db)
        .into_iter()
        .filter(|row| row.4 == "planned")
        .collect();
    assert_eq!(planned.len(), replanned.len());
    assert!(planned.iter().all(|row| row.1 == 1 && row.2 == free_line));
    let remaining: rust_decimal::Decimal = planned.iter().map(|row| row.3).sum();
    assert_eq!(remaining, dec("250"));

    reconciler
        .reconcile(&request(&[batches[0]], BatchStatus::Completed), &config)
        .unwrap();
    assert_eq!(order_status(&db, 1), OrderStatus::InProcess);
    reconciler
        .reconcile(&request(&replanned, BatchStatus::InProgress), &config)
        .unwrap();
    reconciler
        .reconcile(&request(&replanned, BatchStatus::Completed), &config)
        .unwrap();

    assert_eq!(order_status(&db, 1), OrderStatus::Finished);
    assert_eq!(sales_order_status(&db, 1), SalesOrderStatus::ReadyForDispatch);
}
