// ==========================================
// 食品生产排产核心 - 影子模拟
// ==========================================
// 职责: 在无条件回滚的事务内执行 排程 + 日历投影，预览而不落库
// 说明: 回滚后在独立事务中整体替换日计划快照；快照失败只记日志
// ==========================================

use crate::config::PlannerConfig;
use crate::db::{Database, TxPolicy};
use crate::engine::batch_scheduler::{BatchScheduler, SchedulingSummary};
use crate::engine::daily_projector::{DailyProjector, Projection, ProjectionHorizon};
use crate::repository::{BatchRepository, DailyPlanRepository, LineRepository, RepositoryResult};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// 影子模拟结果
#[derive(Debug, Clone)]
pub struct ShadowRun {
    pub summary: SchedulingSummary,
    pub projection: Projection,
    /// 快照写入行数；None 表示未写入或写入失败
    pub snapshot_rows: Option<usize>,
}

// ==========================================
// ShadowSimulator - 影子模拟器
// ==========================================
pub struct ShadowSimulator {
    db: Database,
    config: PlannerConfig,
}

impl ShadowSimulator {
    pub fn new(db: Database, config: PlannerConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// 预览并刷新日计划快照
    ///
    /// # 参数
    /// - horizon: 投影天数范围
    /// - from: 起始日期；None 为业务时区今天
    /// - now: 当前时间
    #[instrument(skip(self))]
    pub fn simulate(
        &self,
        horizon: ProjectionHorizon,
        from: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<ShadowRun> {
        let mut run = self.project_only(horizon, from, now)?;
        run.snapshot_rows = match self.persist_snapshot(&run.projection) {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!(error = %e, "日计划快照写入失败，预览结果仍有效");
                None
            }
        };
        Ok(run)
    }

    /// 仅预览（不写快照），数据库状态不变
    pub fn project_only(
        &self,
        horizon: ProjectionHorizon,
        from: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<ShadowRun> {
        let config = &self.config;
        let (summary, projection) = self.db.run_in_transaction(TxPolicy::AlwaysRollback, |tx| {
            let summary = BatchScheduler::new().plan(tx, config, now)?;
            let batches = BatchRepository::new(tx).find_projectable()?;
            let daily_capacity: HashMap<i64, Decimal> = LineRepository::new(tx)
                .find_active()?
                .into_iter()
                .map(|line| (line.id, config.daily_capacity(line.max_capacity_kg)))
                .collect();

            let start = from.unwrap_or_else(|| config.business_date(now));
            let projection = DailyProjector::new().project(&batches, &daily_capacity, start, horizon);
            Ok((summary, projection))
        })?;

        info!(
            batches = summary.new_batches,
            days = projection.days.len(),
            unplaced = projection.unplaced.len(),
            "影子模拟完成（已回滚）"
        );

        Ok(ShadowRun {
            summary,
            projection,
            snapshot_rows: None,
        })
    }

    fn persist_snapshot(&self, projection: &Projection) -> RepositoryResult<usize> {
        let entries = projection.plan_entries();
        let rows = self.db.run_in_transaction(TxPolicy::Commit, |tx| {
            DailyPlanRepository::new(tx).replace_all(&entries)
        })?;
        info!(rows, "日计划快照已刷新");
        Ok(rows)
    }
}
