// ==========================================
// 食品生产排产核心 - 生产批次排程引擎
// ==========================================
// 职责: 把订单未落实重量切分为不超过产线上限的批次并分配到兼容产线
// 输入: ready_for_production / planned / in_process 订单 + 启用产线 + 兼容关系
// 输出: planned 批次（每次全量删除后重建）+ 告警
// 红线: 批次重量 ≤ 产线上限；同一产线序号连续递增
// ==========================================

use crate::config::PlannerConfig;
use crate::domain::batch::{NewBatch, ProductionBatch};
use crate::domain::order::OrderDemand;
use crate::domain::types::{BatchStatus, OrderStatus};
use crate::repository::{
    BatchRepository, LineRepository, OrderRepository, RepositoryError, RepositoryResult,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

// ==========================================
// 结果类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    /// 产品没有任何兼容产线
    NoCompatibleLine,
    /// 兼容产线均未启用
    NoAvailableLine,
    /// 选中产线的上限不为正
    InvalidCapacity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingAlert {
    pub order_id: i64,
    pub reason: AlertReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_kg: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedOrder {
    pub order_id: i64,
    pub batches_created: usize,
    pub total_kg: Decimal,
}

/// 排程摘要
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchedulingSummary {
    pub removed_batches: usize,
    pub new_batches: usize,
    pub planned_orders: Vec<PlannedOrder>,
    pub alerts: Vec<SchedulingAlert>,
    pub batches: Vec<ProductionBatch>,
}

// ==========================================
// 排程中间态
// ==========================================

/// 待排程需求
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDemand {
    pub order_id: i64,
    pub product_id: i64,
    pub pending_kg: Decimal,
    pub due_date: Option<NaiveDate>,
    pub priority: bool,
    pub created_at: NaiveDateTime,
}

/// 产线运行态
#[derive(Debug, Clone, PartialEq)]
pub struct LineSlot {
    pub line_id: i64,
    pub capacity_kg: Decimal,
    pub last_sequence: i64,
    pub planned_kg: Decimal,
    pub clock: NaiveDateTime,
}

/// 计算未落实重量，过滤已基本完成的订单
///
/// # 参数
/// - demands: 订单需求
/// - firm_kg: 订单已投产/已完成批次重量
/// - epsilon: 小于等于该值视为无需排程
///
/// # 返回
/// - Err(ValidationError): 订单重量溢出
pub fn collect_pending(
    demands: Vec<OrderDemand>,
    firm_kg: &HashMap<i64, Decimal>,
    epsilon: Decimal,
) -> RepositoryResult<Vec<PendingDemand>> {
    let mut pending = Vec::with_capacity(demands.len());
    for d in demands {
        let total = d.total_kg().ok_or_else(|| {
            RepositoryError::ValidationError(format!(
                "订单 {} 的重量超出可计算范围 (数量 {} × 单重 {})",
                d.order.id, d.order.quantity, d.unit_weight_kg
            ))
        })?;
        let firm = firm_kg.get(&d.order.id).copied().unwrap_or(Decimal::ZERO);
        let pending_kg = total - firm;
        if pending_kg <= epsilon {
            continue;
        }
        pending.push(PendingDemand {
            order_id: d.order.id,
            product_id: d.order.product_id,
            pending_kg,
            due_date: d.due_date,
            priority: d.priority,
            created_at: d.order.created_at,
        });
    }
    Ok(pending)
}

/// 交期优先排序: 交期升序(无交期最后) → 优先单在前 → 创建时间 → ID
pub fn sort_demands(demands: &mut [PendingDemand]) {
    demands.sort_by(|a, b| {
        let due_cmp = match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        due_cmp
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.order_id.cmp(&b.order_id))
    });
}

/// 在候选产线中选取 (序号, 已排重量, 产线ID) 最小者
pub fn select_line(candidates: &[i64], slots: &HashMap<i64, LineSlot>) -> Option<i64> {
    candidates
        .iter()
        .filter_map(|id| slots.get(id))
        .min_by(|a, b| {
            a.last_sequence
                .cmp(&b.last_sequence)
                .then_with(|| a.planned_kg.cmp(&b.planned_kg))
                .then_with(|| a.line_id.cmp(&b.line_id))
        })
        .map(|slot| slot.line_id)
}

// ==========================================
// BatchScheduler - 生产批次排程引擎
// ==========================================
pub struct BatchScheduler {
    // 无状态引擎
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self {}
    }

    /// 全量重排（在调用方事务内）
    ///
    /// 删除全部 planned 批次后重新生成；in_progress / completed 批次保留，
    /// 其重量计入订单已落实重量，其序号作为产线序号起点。
    ///
    /// # 参数
    /// - conn: 事务连接
    /// - config: 排产参数
    /// - now: 当前时间（用于计划开工/完工时间）
    ///
    /// # 返回
    /// - Ok(SchedulingSummary): 新批次、已排订单、告警
    /// - Err(ValidationError): 没有启用的产线
    #[instrument(skip(self, conn, config))]
    pub fn plan(
        &self,
        conn: &Connection,
        config: &PlannerConfig,
        now: DateTime<Utc>,
    ) -> RepositoryResult<SchedulingSummary> {
        let batch_repo = BatchRepository::new(conn);
        let line_repo = LineRepository::new(conn);
        let order_repo = OrderRepository::new(conn);

        let removed_batches = batch_repo.delete_by_status(BatchStatus::Planned)?;

        let active_lines = line_repo.find_active()?;
        if active_lines.is_empty() {
            return Err(RepositoryError::ValidationError(
                "没有启用的生产线".to_string(),
            ));
        }

        // 产品 → 兼容产线（已按兼容优先级排序，含停用产线）
        let mut compatibility: HashMap<i64, Vec<i64>> = HashMap::new();
        for c in line_repo.find_compatibilities()? {
            compatibility.entry(c.product_id).or_default().push(c.line_id);
        }

        let firm = [BatchStatus::InProgress, BatchStatus::Completed];
        let last_sequence = batch_repo.max_sequence_by_line(&firm)?;
        let latest_finish = batch_repo.latest_finish_by_line(&firm)?;
        let firm_kg = batch_repo.kg_by_order(&firm)?;

        let start_clock = now.naive_utc();
        let mut slots: HashMap<i64, LineSlot> = active_lines
            .iter()
            .map(|line| {
                let clock = latest_finish
                    .get(&line.id)
                    .map(|t| (*t).max(start_clock))
                    .unwrap_or(start_clock);
                (
                    line.id,
                    LineSlot {
                        line_id: line.id,
                        capacity_kg: line.max_capacity_kg,
                        last_sequence: last_sequence.get(&line.id).copied().unwrap_or(0),
                        planned_kg: Decimal::ZERO,
                        clock,
                    },
                )
            })
            .collect();

        let demands = order_repo.find_demands(OrderStatus::SCHEDULABLE)?;
        let mut pending = collect_pending(demands, &firm_kg, config.firm_mass_epsilon_kg)?;
        sort_demands(&mut pending);

        let duration = config.batch_duration()?;
        let mut summary = SchedulingSummary {
            removed_batches,
            ..Default::default()
        };

        for demand in &pending {
            let compatible = match compatibility.get(&demand.product_id) {
                Some(lines) if !lines.is_empty() => lines,
                _ => {
                    warn!(order_id = demand.order_id, product_id = demand.product_id, "产品没有兼容产线");
                    summary.alerts.push(SchedulingAlert {
                        order_id: demand.order_id,
                        reason: AlertReason::NoCompatibleLine,
                        line_id: None,
                        pending_kg: None,
                    });
                    continue;
                }
            };

            let candidates: Vec<i64> = compatible
                .iter()
                .filter(|id| slots.contains_key(*id))
                .copied()
                .collect();
            if candidates.is_empty() {
                warn!(order_id = demand.order_id, pending_kg = %demand.pending_kg, "兼容产线均未启用");
                summary.alerts.push(SchedulingAlert {
                    order_id: demand.order_id,
                    reason: AlertReason::NoAvailableLine,
                    line_id: None,
                    pending_kg: Some(demand.pending_kg),
                });
                continue;
            }

            let mut remaining = demand.pending_kg;
            let mut created = 0usize;
            let mut total = Decimal::ZERO;

            while remaining > Decimal::ZERO {
                let Some(line_id) = select_line(&candidates, &slots) else {
                    break;
                };
                let Some(slot) = slots.get_mut(&line_id) else {
                    break;
                };
                if slot.capacity_kg <= Decimal::ZERO {
                    warn!(order_id = demand.order_id, line_id, "产线上限不为正");
                    summary.alerts.push(SchedulingAlert {
                        order_id: demand.order_id,
                        reason: AlertReason::InvalidCapacity,
                        line_id: Some(line_id),
                        pending_kg: None,
                    });
                    break;
                }

                let quantity = remaining.min(slot.capacity_kg);
                slot.last_sequence += 1;
                slot.planned_kg += quantity;
                let start = slot.clock;
                let finish = start + duration;
                slot.clock = finish;

                let new_batch = NewBatch {
                    production_order_id: demand.order_id,
                    line_id,
                    quantity_kg: quantity,
                    status: BatchStatus::Planned,
                    line_sequence: slot.last_sequence,
                    planned_start: Some(start),
                    planned_finish: Some(finish),
                };
                let id = batch_repo.insert(&new_batch)?;
                debug!(batch_id = id, order_id = demand.order_id, line_id, quantity = %quantity, "生成批次");

                summary.batches.push(ProductionBatch {
                    id,
                    production_order_id: new_batch.production_order_id,
                    line_id: new_batch.line_id,
                    quantity_kg: new_batch.quantity_kg,
                    status: new_batch.status,
                    line_sequence: new_batch.line_sequence,
                    planned_start: new_batch.planned_start,
                    planned_finish: new_batch.planned_finish,
                });

                remaining -= quantity;
                created += 1;
                total += quantity;
            }

            if remaining <= Decimal::ZERO && created > 0 {
                summary.planned_orders.push(PlannedOrder {
                    order_id: demand.order_id,
                    batches_created: created,
                    total_kg: total,
                });
            }
        }

        summary.new_batches = summary.batches.len();
        info!(
            removed = summary.removed_batches,
            created = summary.new_batches,
            planned_orders = summary.planned_orders.len(),
            alerts = summary.alerts.len(),
            "批次排程完成"
        );
        Ok(summary)
    }
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new()
    }
}
