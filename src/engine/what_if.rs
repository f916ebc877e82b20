// ==========================================
// 食品生产排产核心 - 假设分析（销售订单提前投产）
// ==========================================
// 职责: 将某销售订单下的生产订单提升为 ready_for_production，
//       对比提升前后的延误订单集，然后恢复原状态
// 红线: 结束后订单状态与执行前一致（恢复总会尝试）
// ==========================================

use crate::db::{Database, TxPolicy};
use crate::domain::types::OrderStatus;
use crate::engine::daily_projector::{Projection, ProjectionHorizon};
use crate::engine::shadow::ShadowSimulator;
use crate::repository::{OrderRepository, RepositoryError, RepositoryResult, SalesOrderRepository};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

/// 因提升而新增延误的订单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedOrder {
    pub production_order_id: i64,
    /// 提升前的最后计划日（未排入为 None）
    pub date_before: Option<NaiveDate>,
    pub date_after: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatIfReport {
    pub sales_order_id: i64,
    pub promoted_orders: Vec<i64>,
    pub affected_orders: Vec<AffectedOrder>,
}

/// 对比两次投影，找出新增延误订单（排除被提升的订单本身）
pub fn diff_late_orders(
    baseline: &Projection,
    promoted: &Projection,
    target_orders: &BTreeSet<i64>,
) -> Vec<AffectedOrder> {
    let baseline_late = baseline.late_orders();
    let before = baseline.last_date_by_order();
    let after = promoted.last_date_by_order();

    promoted
        .late_orders()
        .difference(&baseline_late)
        .filter(|id| !target_orders.contains(*id))
        .map(|id| AffectedOrder {
            production_order_id: *id,
            date_before: before.get(id).copied(),
            date_after: after.get(id).copied(),
        })
        .collect()
}

// ==========================================
// WhatIfComparator - 假设分析
// ==========================================
pub struct WhatIfComparator<'a> {
    db: &'a Database,
    shadow: &'a ShadowSimulator,
}

impl<'a> WhatIfComparator<'a> {
    pub fn new(db: &'a Database, shadow: &'a ShadowSimulator) -> Self {
        Self { db, shadow }
    }

    /// 执行假设分析
    ///
    /// 步骤: 基线影子 → 记录并提升订单状态(提交) → 新影子 → 恢复状态(提交) → 刷新快照
    ///
    /// # 返回
    /// - Err(NotFound): 销售订单不存在或其下没有生产订单
    #[instrument(skip(self))]
    pub fn compare(&self, sales_order_id: i64, now: DateTime<Utc>) -> RepositoryResult<WhatIfReport> {
        let horizon = self.horizon();
        let baseline = self.shadow.project_only(horizon, None, now)?.projection;

        let recorded = self.promote(sales_order_id)?;
        let target_orders: BTreeSet<i64> = recorded.iter().map(|(id, _)| *id).collect();

        let promoted = self.shadow.project_only(horizon, None, now);
        let reverted = self.revert(&recorded);

        if let Err(e) = &reverted {
            warn!(sales_order_id, error = %e, "恢复订单状态失败");
        }
        let promoted = promoted?.projection;
        reverted?;

        if let Err(e) = self.shadow.simulate(horizon, None, now) {
            warn!(error = %e, "假设分析后刷新日计划快照失败");
        }

        let affected_orders = diff_late_orders(&baseline, &promoted, &target_orders);
        info!(
            sales_order_id,
            promoted = target_orders.len(),
            affected = affected_orders.len(),
            "假设分析完成"
        );

        Ok(WhatIfReport {
            sales_order_id,
            promoted_orders: target_orders.into_iter().collect(),
            affected_orders,
        })
    }

    fn horizon(&self) -> ProjectionHorizon {
        ProjectionHorizon::Open {
            max_days: self.shadow.config().max_projection_days,
        }
    }

    /// 记录原状态并提升，返回 (订单ID, 原状态)
    fn promote(&self, sales_order_id: i64) -> RepositoryResult<Vec<(i64, OrderStatus)>> {
        self.db.run_in_transaction(TxPolicy::Commit, |tx| {
            if SalesOrderRepository::new(tx).find_by_id(sales_order_id)?.is_none() {
                return Err(RepositoryError::not_found("SalesOrder", sales_order_id));
            }

            let order_repo = OrderRepository::new(tx);
            let orders = order_repo.find_by_sales_order(sales_order_id)?;
            if orders.is_empty() {
                return Err(RepositoryError::not_found(
                    "ProductionOrder",
                    format!("sales_order={}", sales_order_id),
                ));
            }

            let recorded: Vec<(i64, OrderStatus)> =
                orders.iter().map(|o| (o.id, o.status)).collect();
            for (id, status) in &recorded {
                if *status != OrderStatus::ReadyForProduction {
                    order_repo.update_status(*id, OrderStatus::ReadyForProduction)?;
                }
            }
            Ok(recorded)
        })
    }

    fn revert(&self, recorded: &[(i64, OrderStatus)]) -> RepositoryResult<()> {
        self.db.run_in_transaction(TxPolicy::Commit, |tx| {
            let order_repo = OrderRepository::new(tx);
            for (id, status) in recorded {
                if *status != OrderStatus::ReadyForProduction {
                    order_repo.update_status(*id, *status)?;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Punctuality;
    use crate::engine::daily_projector::{ProjectionDay, ProjectionEntry};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn day(d: u32, entries: &[(i64, Punctuality)]) -> ProjectionDay {
        ProjectionDay {
            date: date(d),
            entries: entries
                .iter()
                .map(|(id, p)| ProjectionEntry {
                    order_id: *id,
                    punctuality: *p,
                })
                .collect(),
        }
    }

    #[test]
    fn test_diff_excludes_targets_and_existing_late() {
        let baseline = Projection {
            days: vec![
                day(9, &[(1, Punctuality::OnTime), (2, Punctuality::Late)]),
                day(10, &[(3, Punctuality::OnTime)]),
            ],
            unplaced: vec![],
        };
        let promoted = Projection {
            days: vec![
                day(9, &[(4, Punctuality::OnTime)]),
                day(10, &[(1, Punctuality::Late), (2, Punctuality::Late)]),
                day(11, &[(3, Punctuality::Late), (4, Punctuality::Late)]),
            ],
            unplaced: vec![],
        };
        let targets: BTreeSet<i64> = [4].into_iter().collect();

        let affected = diff_late_orders(&baseline, &promoted, &targets);
        assert_eq!(
            affected,
            vec![
                AffectedOrder {
                    production_order_id: 1,
                    date_before: Some(date(9)),
                    date_after: Some(date(10)),
                },
                AffectedOrder {
                    production_order_id: 3,
                    date_before: Some(date(10)),
                    date_after: Some(date(11)),
                },
            ]
        );
    }
}
