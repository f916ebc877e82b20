// ==========================================
// 食品生产排产核心 - 批次状态协调器
// ==========================================
// 职责: 批次状态机 + 产线占用/释放 + 订单/销售订单状态级联
// 状态机: planned → {in_progress, completed, cancelled}
//         in_progress → {completed, cancelled}
// 说明: 提交后发布重排事件（不阻塞调用方）
// ==========================================

use crate::config::PlannerConfig;
use crate::db::{Database, TxPolicy};
use crate::domain::types::{BatchStatus, OrderStatus, SalesOrderStatus};
use crate::engine::events::{OptionalEventPublisher, PlanningEvent};
use crate::repository::{
    BatchRepository, LineRepository, OrderRepository, ProductRepository, RepositoryError,
    RepositoryResult, SalesOrderRepository,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// 批次状态变更请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatusRequest {
    pub batch_ids: Vec<i64>,
    pub target_state: BatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChange {
    pub order_id: i64,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub updated_batches: Vec<i64>,
    /// 涉及的全部订单（含状态未变者）
    pub affected_orders: Vec<OrderStatusChange>,
}

/// 根据批次汇总推导订单新状态
///
/// # 参数
/// - current: 当前状态
/// - total_kg: 订单总重量
/// - firm_kg: in_progress + completed 批次重量
/// - in_progress / planned: 对应状态批次数
/// - epsilon: 重量比较容差
///
/// # 返回
/// Some(新状态) 或 None（不变）
pub fn derive_order_status(
    current: OrderStatus,
    total_kg: Decimal,
    firm_kg: Decimal,
    in_progress: usize,
    planned: usize,
    epsilon: Decimal,
) -> Option<OrderStatus> {
    if matches!(current, OrderStatus::Finished | OrderStatus::Cancelled) {
        return None;
    }
    if firm_kg + epsilon >= total_kg && in_progress == 0 && planned == 0 {
        return Some(OrderStatus::Finished);
    }
    if in_progress > 0
        && matches!(current, OrderStatus::ReadyForProduction | OrderStatus::Planned)
    {
        return Some(OrderStatus::InProcess);
    }
    None
}

/// 重新计算单个订单状态并级联到销售订单（在调用方事务内）
///
/// # 返回
/// 订单的新旧状态（状态未变时二者相同）；订单不存在时 None
pub(crate) fn reconcile_order(
    conn: &Connection,
    order_id: i64,
    epsilon: Decimal,
) -> RepositoryResult<Option<OrderStatusChange>> {
    let order_repo = OrderRepository::new(conn);
    let Some(order) = order_repo.find_by_id(order_id)? else {
        return Ok(None);
    };
    let unit_weight = ProductRepository::new(conn)
        .find_by_id(order.product_id)?
        .map(|p| p.unit_weight_kg)
        .ok_or_else(|| RepositoryError::not_found("Product", order.product_id))?;

    let batches = BatchRepository::new(conn).find_by_order(order_id)?;
    let firm_kg: Decimal = batches
        .iter()
        .filter(|b| b.status.is_firm())
        .map(|b| b.quantity_kg)
        .sum();
    let in_progress = batches
        .iter()
        .filter(|b| b.status == BatchStatus::InProgress)
        .count();
    let planned = batches
        .iter()
        .filter(|b| b.status == BatchStatus::Planned)
        .count();

    let total_kg = order.quantity.checked_mul(unit_weight).ok_or_else(|| {
        RepositoryError::ValidationError(format!("订单 {} 的重量超出可计算范围", order_id))
    })?;
    let new_status =
        match derive_order_status(order.status, total_kg, firm_kg, in_progress, planned, epsilon) {
            Some(status) if status != order.status => status,
            _ => {
                return Ok(Some(OrderStatusChange {
                    order_id,
                    old_status: order.status,
                    new_status: order.status,
                }));
            }
        };

    order_repo.update_status(order_id, new_status)?;
    debug!(order_id, from = %order.status, to = %new_status, "订单状态变更");

    if new_status == OrderStatus::Finished {
        if let Some(sales_order_id) = order.sales_order_id {
            let siblings = order_repo.find_by_sales_order(sales_order_id)?;
            if siblings.iter().all(|o| o.status == OrderStatus::Finished) {
                SalesOrderRepository::new(conn)
                    .update_status(sales_order_id, SalesOrderStatus::ReadyForDispatch)?;
                info!(sales_order_id, "销售订单全部完工，待发货");
            }
        }
    }

    Ok(Some(OrderStatusChange {
        order_id,
        old_status: order.status,
        new_status,
    }))
}

// ==========================================
// StateReconciler - 批次状态协调器
// ==========================================
pub struct StateReconciler {
    db: Database,
    publisher: OptionalEventPublisher,
}

impl StateReconciler {
    pub fn new(db: Database, publisher: OptionalEventPublisher) -> Self {
        Self { db, publisher }
    }

    /// 变更批次状态（单事务），提交后发布重排事件
    ///
    /// # 返回
    /// - Err(ValidationError): 空请求 / 批次不存在 / 已处于目标状态
    /// - Err(InvalidStateTransition): 状态机不允许
    #[instrument(skip(self, config), fields(target = %request.target_state, count = request.batch_ids.len()))]
    pub fn reconcile(
        &self,
        request: &BatchStatusRequest,
        config: &PlannerConfig,
    ) -> RepositoryResult<ReconcileReport> {
        let batch_ids: Vec<i64> = request
            .batch_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if batch_ids.is_empty() {
            return Err(RepositoryError::ValidationError(
                "必须至少指定一个批次".to_string(),
            ));
        }

        let target = request.target_state;
        let report = self.db.run_in_transaction(TxPolicy::Commit, |tx| {
            Self::apply(tx, &batch_ids, target, config.firm_mass_epsilon_kg)
        })?;

        info!(
            batches = report.updated_batches.len(),
            orders = report.affected_orders.len(),
            changed = report
                .affected_orders
                .iter()
                .filter(|c| c.old_status != c.new_status)
                .count(),
            "批次状态已更新"
        );
        self.publisher.publish_or_log(PlanningEvent::replan(
            format!("batch:{}", target),
            report.updated_batches.clone(),
        ));
        Ok(report)
    }

    /// 在调用方事务内应用状态变更
    pub fn apply(
        conn: &Connection,
        batch_ids: &[i64],
        target: BatchStatus,
        epsilon: Decimal,
    ) -> RepositoryResult<ReconcileReport> {
        let batch_repo = BatchRepository::new(conn);
        let line_repo = LineRepository::new(conn);

        let batches = batch_repo.find_by_ids(batch_ids)?;
        let missing: Vec<i64> = batch_ids
            .iter()
            .filter(|id| !batches.iter().any(|b| b.id == **id))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(RepositoryError::ValidationError(format!(
                "批次不存在: {:?}",
                missing
            )));
        }

        for batch in &batches {
            if batch.status == target {
                return Err(RepositoryError::ValidationError(format!(
                    "批次 {} 已处于 {} 状态",
                    batch.id, target
                )));
            }
            if !batch.status.can_transition_to(target) {
                return Err(RepositoryError::InvalidStateTransition {
                    batch_id: batch.id,
                    from: batch.status.to_string(),
                    to: target.to_string(),
                });
            }
        }

        batch_repo.update_status(batch_ids, target)?;

        // 产线占用 / 释放
        let lines: BTreeSet<i64> = batches.iter().map(|b| b.line_id).collect();
        match target {
            BatchStatus::InProgress => {
                for line_id in &lines {
                    line_repo.set_active(*line_id, false)?;
                }
            }
            BatchStatus::Completed | BatchStatus::Cancelled => {
                for line_id in &lines {
                    if batch_repo.count_by_line_and_status(*line_id, BatchStatus::InProgress)? == 0 {
                        line_repo.set_active(*line_id, true)?;
                    }
                }
            }
            BatchStatus::Planned => {}
        }

        let orders: BTreeSet<i64> = batches.iter().map(|b| b.production_order_id).collect();
        let mut affected_orders = Vec::new();
        for order_id in orders {
            if let Some(change) = reconcile_order(conn, order_id, epsilon)? {
                affected_orders.push(change);
            }
        }

        Ok(ReconcileReport {
            updated_batches: batch_ids.to_vec(),
            affected_orders,
        })
    }
}
