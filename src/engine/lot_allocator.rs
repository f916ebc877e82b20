// ==========================================
// 食品生产排产核心 - 原料批次分配引擎
// ==========================================
// 职责: 为生产订单按配方挑选原料批次（先到期先出）
// 输入: 订单集合（指定ID 或 按创建时间取前 N 个待处理订单）
// 输出: 批次消耗记录 + 短缺报告 + 订单最终状态
// 红线: 批次扣减后不为负；同一订单集重复执行结果一致
// ==========================================

use crate::config::PlannerConfig;
use crate::domain::lot::{LotConsumption, RawMaterialLot};
use crate::domain::order::ProductionOrder;
use crate::domain::types::{LotStatus, OrderStatus};
use crate::repository::{
    ConsumptionRepository, LotRepository, OrderRepository, ProductRepository, RepositoryError,
    RepositoryResult,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

// ==========================================
// 请求与结果
// ==========================================

/// 分配请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationRequest {
    /// 指定订单；为空时按创建时间选取待处理订单
    #[serde(default)]
    pub order_ids: Option<Vec<i64>>,
    /// 未指定订单时的数量上限
    #[serde(default)]
    pub limit: Option<usize>,
}

/// 单个批次的分配量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotAssignment {
    pub material_id: i64,
    pub lot_id: i64,
    pub quantity: Decimal,
}

/// 原料短缺
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortfall {
    pub material_id: i64,
    pub missing: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationOutcome {
    /// 全部配方需求已满足
    Complete,
    /// 存在短缺
    Partial,
    /// 订单数量不为正，跳过
    NoQuantity,
}

/// 单个订单的分配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAllocation {
    pub id: i64,
    pub assignments: Vec<LotAssignment>,
    pub shortfalls: Vec<Shortfall>,
    pub final_status: OrderStatus,
    pub outcome: AllocationOutcome,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AllocationReport {
    pub results: Vec<OrderAllocation>,
}

// ==========================================
// 纯函数: 贪心取批
// ==========================================

/// 按给定顺序从批次中取量，直到满足需求
///
/// # 参数
/// - required: 需求量
/// - lots: 已按先到期先出排序的批次
///
/// # 返回
/// (每个批次的取用量, 未满足量)
pub fn plan_lot_takes(required: Decimal, lots: &[RawMaterialLot]) -> (Vec<(&RawMaterialLot, Decimal)>, Decimal) {
    let mut remaining = required;
    let mut takes = Vec::new();
    for lot in lots {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = remaining.min(lot.available_qty);
        if take <= Decimal::ZERO {
            continue;
        }
        takes.push((lot, take));
        remaining -= take;
    }
    (takes, remaining.max(Decimal::ZERO))
}

// ==========================================
// LotAllocator - 原料批次分配引擎
// ==========================================
pub struct LotAllocator {
    // 无状态引擎
}

impl LotAllocator {
    pub fn new() -> Self {
        Self {}
    }

    /// 执行分配（在调用方事务内）
    ///
    /// 先撤销该订单集此前的消耗并归还批次，再重新计算，保证幂等。
    ///
    /// # 参数
    /// - conn: 事务连接
    /// - request: 分配请求
    /// - config: 排产参数（到期截止天数 / 默认上限）
    /// - now: 当前时间
    ///
    /// # 返回
    /// - Ok(AllocationReport): 每个订单的分配、短缺与最终状态
    /// - Err(ValidationError): 无待分配订单 / 订单不存在 / 缺配方 / 配方原料不存在 / 截止日或需求量溢出
    #[instrument(skip(self, conn, config), fields(explicit = request.order_ids.is_some()))]
    pub fn allocate(
        &self,
        conn: &Connection,
        request: &AllocationRequest,
        config: &PlannerConfig,
        now: DateTime<Utc>,
    ) -> RepositoryResult<AllocationReport> {
        let cutoff = config.allocation_cutoff(now)?;
        let orders = self.resolve_orders(conn, request, config)?;
        let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();

        let released = self.release_previous(conn, &order_ids)?;

        let mut results = Vec::with_capacity(orders.len());
        for order in &orders {
            results.push(self.allocate_order(conn, order, cutoff)?);
        }

        let complete = results
            .iter()
            .filter(|r| r.outcome == AllocationOutcome::Complete)
            .count();
        info!(
            orders = results.len(),
            complete,
            released,
            cutoff = %cutoff,
            "原料分配完成"
        );

        Ok(AllocationReport { results })
    }

    fn resolve_orders(
        &self,
        conn: &Connection,
        request: &AllocationRequest,
        config: &PlannerConfig,
    ) -> RepositoryResult<Vec<ProductionOrder>> {
        let order_repo = OrderRepository::new(conn);

        let explicit: BTreeSet<i64> = request
            .order_ids
            .iter()
            .flatten()
            .copied()
            .collect();

        if !explicit.is_empty() {
            let ids: Vec<i64> = explicit.iter().copied().collect();
            let orders = order_repo.find_by_ids(&ids)?;
            let missing: Vec<i64> = explicit
                .iter()
                .filter(|id| !orders.iter().any(|o| o.id == **id))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(RepositoryError::ValidationError(format!(
                    "生产订单不存在: {:?}",
                    missing
                )));
            }
            return Ok(orders);
        }

        let limit = request.limit.unwrap_or(config.allocation_default_limit);
        if limit == 0 {
            return Err(RepositoryError::FieldValueError {
                field: "limit".to_string(),
                message: "必须大于 0".to_string(),
            });
        }

        let orders = order_repo.find_by_statuses(OrderStatus::ALLOCATABLE, limit)?;
        if orders.is_empty() {
            return Err(RepositoryError::ValidationError(
                "没有待分配的生产订单 (pending / planned)".to_string(),
            ));
        }
        Ok(orders)
    }

    /// 撤销订单集此前的消耗，把数量归还到批次
    fn release_previous(&self, conn: &Connection, order_ids: &[i64]) -> RepositoryResult<usize> {
        let lot_repo = LotRepository::new(conn);
        let consumption_repo = ConsumptionRepository::new(conn);

        let previous = consumption_repo.find_by_orders(order_ids)?;
        for consumption in &previous {
            let Some(lot) = lot_repo.find_by_id(consumption.lot_id)? else {
                continue;
            };
            let status = if lot.status == LotStatus::Depleted {
                LotStatus::Available
            } else {
                lot.status
            };
            lot_repo.update_quantity(lot.id, lot.available_qty + consumption.quantity, status)?;
        }
        consumption_repo.delete_by_orders(order_ids)?;

        if !previous.is_empty() {
            debug!(count = previous.len(), "已归还此前的批次消耗");
        }
        Ok(previous.len())
    }

    fn allocate_order(
        &self,
        conn: &Connection,
        order: &ProductionOrder,
        cutoff: NaiveDate,
    ) -> RepositoryResult<OrderAllocation> {
        if order.quantity <= Decimal::ZERO {
            debug!(order_id = order.id, "订单数量不为正，跳过");
            return Ok(OrderAllocation {
                id: order.id,
                assignments: Vec::new(),
                shortfalls: Vec::new(),
                final_status: order.status,
                outcome: AllocationOutcome::NoQuantity,
            });
        }

        let lot_repo = LotRepository::new(conn);
        let consumption_repo = ConsumptionRepository::new(conn);
        let order_repo = OrderRepository::new(conn);

        let recipe = ProductRepository::new(conn).find_recipe(order.product_id)?;
        if recipe.is_empty() {
            return Err(RepositoryError::ValidationError(format!(
                "产品 {} 没有配方 (订单 {})",
                order.product_id, order.id
            )));
        }

        let mut assignments = Vec::new();
        let mut shortfalls = Vec::new();

        for requirement in &recipe {
            if !lot_repo.material_exists(requirement.material_id)? {
                return Err(RepositoryError::ValidationError(format!(
                    "配方引用的原料 {} 不存在 (产品 {})",
                    requirement.material_id, requirement.product_id
                )));
            }

            let required = order
                .quantity
                .checked_mul(requirement.qty_per_unit)
                .ok_or_else(|| {
                    RepositoryError::ValidationError(format!(
                        "订单 {} 的原料 {} 需求量超出可计算范围",
                        order.id, requirement.material_id
                    ))
                })?;
            let already = consumption_repo.consumed_for(order.id, requirement.material_id)?;
            let pending = required - already;
            if pending <= Decimal::ZERO {
                continue;
            }

            let lots = lot_repo.find_allocatable(requirement.material_id, cutoff)?;
            let (takes, missing) = plan_lot_takes(pending, &lots);

            for (lot, qty) in takes {
                let (remaining, status) = lot.consume(qty);
                lot_repo.update_quantity(lot.id, remaining, status)?;
                consumption_repo.insert(&LotConsumption {
                    lot_id: lot.id,
                    production_order_id: order.id,
                    quantity: qty,
                })?;
                assignments.push(LotAssignment {
                    material_id: requirement.material_id,
                    lot_id: lot.id,
                    quantity: qty,
                });
            }

            if missing > Decimal::ZERO {
                warn!(
                    order_id = order.id,
                    material_id = requirement.material_id,
                    missing = %missing,
                    "原料短缺"
                );
                shortfalls.push(Shortfall {
                    material_id: requirement.material_id,
                    missing,
                });
            }
        }

        let (final_status, outcome) = if shortfalls.is_empty() {
            let promoted = order_repo.update_status_from(
                order.id,
                OrderStatus::ReadyForProduction,
                OrderStatus::ALLOCATABLE,
            )?;
            let status = if promoted > 0 {
                OrderStatus::ReadyForProduction
            } else {
                order.status
            };
            (status, AllocationOutcome::Complete)
        } else {
            (order.status, AllocationOutcome::Partial)
        };

        Ok(OrderAllocation {
            id: order.id,
            assignments,
            shortfalls,
            final_status,
            outcome,
        })
    }
}

impl Default for LotAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(id: i64, qty: i64) -> RawMaterialLot {
        RawMaterialLot {
            id,
            material_id: 1,
            available_qty: Decimal::from(qty),
            expiration_date: None,
            status: LotStatus::Available,
            lot_code: None,
        }
    }

    #[test]
    fn test_plan_lot_takes_spans_lots_in_order() {
        let lots = vec![lot(1, 40), lot(2, 70)];
        let (takes, missing) = plan_lot_takes(Decimal::from(100), &lots);

        let summary: Vec<(i64, Decimal)> = takes.iter().map(|(l, q)| (l.id, *q)).collect();
        assert_eq!(summary, vec![(1, Decimal::from(40)), (2, Decimal::from(60))]);
        assert_eq!(missing, Decimal::ZERO);
    }

    #[test]
    fn test_plan_lot_takes_reports_missing() {
        let lots = vec![lot(1, 30)];
        let (takes, missing) = plan_lot_takes(Decimal::from(50), &lots);
        assert_eq!(takes.len(), 1);
        assert_eq!(missing, Decimal::from(20));
    }

    #[test]
    fn test_plan_lot_takes_stops_when_met() {
        let lots = vec![lot(1, 100), lot(2, 100)];
        let (takes, _) = plan_lot_takes(Decimal::from(10), &lots);
        assert_eq!(takes.len(), 1);
    }
}
