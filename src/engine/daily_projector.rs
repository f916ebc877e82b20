// ==========================================
// 食品生产排产核心 - 日历投影引擎
// ==========================================
// 职责: 把计划批次按产线日产能装入工作日，并判定订单交期状态
// 输入: 计划批次（按 产线/序号/ID 排序）+ 各产线日产能 + 起始日期
// 输出: 按日期排列的 (订单, 交期状态) + 未能装入的批次
// 红线: 任一产线在任一天的装载量不超过其日产能
// ==========================================

use crate::domain::batch::ProjectableBatch;
use crate::domain::plan::DailyPlanEntry;
use crate::domain::types::Punctuality;
use crate::engine::calendar;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{instrument, warn};

/// 投影天数范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionHorizon {
    /// 固定 N 个工作日（全部预先开启，装不下的批次记为未排入）
    Fixed(u32),
    /// 按需逐日开启，最多 max_days 个工作日
    Open { max_days: u32 },
}

/// 交期判定
///
/// - 无交期 → en_tiempo
/// - 计划日晚于交期 → atrasado
/// - 计划日恰为交期前一天 → por_vencer
/// - 其他 → en_tiempo
pub fn classify(plan_date: NaiveDate, due_date: Option<NaiveDate>) -> Punctuality {
    let Some(due) = due_date else {
        return Punctuality::OnTime;
    };
    let diff = (due - plan_date).num_days();
    if diff < 0 {
        Punctuality::Late
    } else if diff == 1 {
        Punctuality::DueSoon
    } else {
        Punctuality::OnTime
    }
}

// ==========================================
// 投影结果
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionEntry {
    pub order_id: i64,
    pub punctuality: Punctuality,
}

/// 单日投影；序列化为 `{"YYYY-MM-DD": [...]}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionDay {
    pub date: NaiveDate,
    pub entries: Vec<ProjectionEntry>,
}

impl Serialize for ProjectionDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.date.format("%Y-%m-%d").to_string(), &self.entries)?;
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnplacedReason {
    /// 产线日产能不为正或产线未启用
    LineWithoutCapacity,
    /// 单个批次超过产线日产能
    ExceedsDailyCapacity,
    /// 投影天数用尽
    HorizonExhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnplacedBatch {
    pub batch_id: i64,
    pub order_id: i64,
    pub line_id: i64,
    pub quantity_kg: Decimal,
    pub reason: UnplacedReason,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Projection {
    pub days: Vec<ProjectionDay>,
    pub unplaced: Vec<UnplacedBatch>,
}

impl Projection {
    /// 至少有一天被判定为 atrasado 的订单
    pub fn late_orders(&self) -> BTreeSet<i64> {
        self.days
            .iter()
            .flat_map(|d| d.entries.iter())
            .filter(|e| e.punctuality == Punctuality::Late)
            .map(|e| e.order_id)
            .collect()
    }

    /// 每个订单最后出现的计划日
    pub fn last_date_by_order(&self) -> BTreeMap<i64, NaiveDate> {
        let mut last = BTreeMap::new();
        for day in &self.days {
            for entry in &day.entries {
                last.insert(entry.order_id, day.date);
            }
        }
        last
    }

    /// 转换为日计划快照行
    pub fn plan_entries(&self) -> Vec<DailyPlanEntry> {
        self.days
            .iter()
            .flat_map(|day| {
                day.entries.iter().map(move |e| DailyPlanEntry {
                    plan_date: day.date,
                    production_order_id: e.order_id,
                })
            })
            .collect()
    }
}

// ==========================================
// 日桶
// ==========================================
struct DayBucket {
    date: NaiveDate,
    used: HashMap<i64, Decimal>,
    seen: HashSet<i64>,
    entries: Vec<ProjectionEntry>,
}

impl DayBucket {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            used: HashMap::new(),
            seen: HashSet::new(),
            entries: Vec::new(),
        }
    }

    fn fits(&self, line_id: i64, quantity: Decimal, daily_capacity: Decimal) -> bool {
        let used = self.used.get(&line_id).copied().unwrap_or(Decimal::ZERO);
        daily_capacity - used >= quantity
    }

    fn place(&mut self, batch: &ProjectableBatch) {
        *self.used.entry(batch.line_id).or_insert(Decimal::ZERO) += batch.quantity_kg;
        // 同一天同一订单只报告一次
        if self.seen.insert(batch.order_id) {
            self.entries.push(ProjectionEntry {
                order_id: batch.order_id,
                punctuality: classify(self.date, batch.due_date),
            });
        }
    }
}

// ==========================================
// DailyProjector - 日历投影引擎
// ==========================================
pub struct DailyProjector {
    // 无状态引擎
}

impl DailyProjector {
    pub fn new() -> Self {
        Self {}
    }

    /// 将批次装入工作日
    ///
    /// # 参数
    /// - batches: 计划批次（调用方保证 产线/序号/ID 顺序）
    /// - daily_capacity: 产线ID → 日产能
    /// - start: 起始日期（周末顺延到下一个工作日）
    /// - horizon: 投影天数范围
    #[instrument(skip(self, batches, daily_capacity), fields(batches = batches.len()))]
    pub fn project(
        &self,
        batches: &[ProjectableBatch],
        daily_capacity: &HashMap<i64, Decimal>,
        start: NaiveDate,
        horizon: ProjectionHorizon,
    ) -> Projection {
        let first_day = calendar::roll_to_business_day(start);
        let (mut days, limit): (Vec<DayBucket>, usize) = match horizon {
            ProjectionHorizon::Fixed(n) => {
                let n = n.max(1) as usize;
                let days = calendar::business_days_from(first_day, n)
                    .into_iter()
                    .map(DayBucket::new)
                    .collect();
                (days, n)
            }
            ProjectionHorizon::Open { max_days } => {
                (vec![DayBucket::new(first_day)], max_days.max(1) as usize)
            }
        };

        let mut unplaced = Vec::new();
        let unplaced_of = |batch: &ProjectableBatch, reason: UnplacedReason| UnplacedBatch {
            batch_id: batch.batch_id,
            order_id: batch.order_id,
            line_id: batch.line_id,
            quantity_kg: batch.quantity_kg,
            reason,
        };

        for batch in batches {
            let capacity = daily_capacity
                .get(&batch.line_id)
                .copied()
                .unwrap_or(Decimal::ZERO);

            if capacity <= Decimal::ZERO {
                warn!(batch_id = batch.batch_id, line_id = batch.line_id, "产线日产能为 0，跳过批次");
                unplaced.push(unplaced_of(batch, UnplacedReason::LineWithoutCapacity));
                continue;
            }
            if batch.quantity_kg > capacity {
                warn!(
                    batch_id = batch.batch_id,
                    line_id = batch.line_id,
                    quantity = %batch.quantity_kg,
                    capacity = %capacity,
                    "批次超过产线日产能"
                );
                unplaced.push(unplaced_of(batch, UnplacedReason::ExceedsDailyCapacity));
                continue;
            }

            if let Some(day) = days
                .iter_mut()
                .find(|d| d.fits(batch.line_id, batch.quantity_kg, capacity))
            {
                day.place(batch);
                continue;
            }

            let can_open = matches!(horizon, ProjectionHorizon::Open { .. }) && days.len() < limit;
            match days.last().map(|d| d.date) {
                Some(last) if can_open => {
                    let mut day = DayBucket::new(calendar::next_business_day(last));
                    day.place(batch);
                    days.push(day);
                }
                _ => {
                    warn!(batch_id = batch.batch_id, days = days.len(), "投影天数内无剩余产能");
                    unplaced.push(unplaced_of(batch, UnplacedReason::HorizonExhausted));
                }
            }
        }

        Projection {
            days: days
                .into_iter()
                .map(|d| ProjectionDay {
                    date: d.date,
                    entries: d.entries,
                })
                .collect(),
            unplaced,
        }
    }
}

impl Default for DailyProjector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch(id: i64, order_id: i64, line_id: i64, kg: i64, due: Option<NaiveDate>) -> ProjectableBatch {
        ProjectableBatch {
            batch_id: id,
            order_id,
            line_id,
            quantity_kg: Decimal::from(kg),
            line_sequence: id,
            due_date: due,
        }
    }

    fn caps(pairs: &[(i64, i64)]) -> HashMap<i64, Decimal> {
        pairs.iter().map(|(l, c)| (*l, Decimal::from(*c))).collect()
    }

    #[rstest]
    #[case(date(2026, 3, 10), None, Punctuality::OnTime)]
    #[case(date(2026, 3, 10), Some(date(2026, 3, 9)), Punctuality::Late)]
    #[case(date(2026, 3, 10), Some(date(2026, 3, 11)), Punctuality::DueSoon)]
    #[case(date(2026, 3, 10), Some(date(2026, 3, 10)), Punctuality::OnTime)]
    #[case(date(2026, 3, 10), Some(date(2026, 3, 20)), Punctuality::OnTime)]
    fn test_classify(
        #[case] plan: NaiveDate,
        #[case] due: Option<NaiveDate>,
        #[case] expected: Punctuality,
    ) {
        assert_eq!(classify(plan, due), expected);
    }

    #[test]
    fn test_open_horizon_opens_business_days() {
        // 2026-03-06 周五；日产能 300，三个 150kg 批次 → 周五两个、周一一个
        let batches = vec![
            batch(1, 10, 1, 150, None),
            batch(2, 10, 1, 150, None),
            batch(3, 10, 1, 150, None),
        ];
        let projection = DailyProjector::new().project(
            &batches,
            &caps(&[(1, 300)]),
            date(2026, 3, 6),
            ProjectionHorizon::Open { max_days: 10 },
        );

        assert_eq!(projection.days.len(), 2);
        assert_eq!(projection.days[0].date, date(2026, 3, 6));
        assert_eq!(projection.days[1].date, date(2026, 3, 9));
        // 同日同订单只报告一次
        assert_eq!(projection.days[0].entries.len(), 1);
        assert!(projection.unplaced.is_empty());
    }

    #[test]
    fn test_first_fit_uses_earlier_day_for_other_line() {
        let batches = vec![
            batch(1, 10, 1, 300, None),
            batch(2, 11, 1, 300, None),
            batch(3, 12, 2, 100, None),
        ];
        let projection = DailyProjector::new().project(
            &batches,
            &caps(&[(1, 300), (2, 300)]),
            date(2026, 3, 9),
            ProjectionHorizon::Open { max_days: 10 },
        );
        let first_day: Vec<i64> = projection.days[0].entries.iter().map(|e| e.order_id).collect();
        assert_eq!(first_day, vec![10, 12]);
    }

    #[test]
    fn test_oversized_and_zero_capacity_batches_unplaced() {
        let batches = vec![batch(1, 10, 1, 500, None), batch(2, 11, 2, 10, None)];
        let projection = DailyProjector::new().project(
            &batches,
            &caps(&[(1, 300), (2, 0)]),
            date(2026, 3, 9),
            ProjectionHorizon::Open { max_days: 10 },
        );
        let reasons: Vec<UnplacedReason> = projection.unplaced.iter().map(|u| u.reason).collect();
        assert_eq!(
            reasons,
            vec![UnplacedReason::ExceedsDailyCapacity, UnplacedReason::LineWithoutCapacity]
        );
    }

    #[test]
    fn test_fixed_horizon_reports_overflow() {
        let batches = vec![
            batch(1, 10, 1, 300, None),
            batch(2, 11, 1, 300, None),
            batch(3, 12, 1, 300, None),
        ];
        let projection = DailyProjector::new().project(
            &batches,
            &caps(&[(1, 300)]),
            date(2026, 3, 9),
            ProjectionHorizon::Fixed(2),
        );
        assert_eq!(projection.days.len(), 2);
        assert_eq!(projection.unplaced.len(), 1);
        assert_eq!(projection.unplaced[0].reason, UnplacedReason::HorizonExhausted);
    }

    #[test]
    fn test_open_horizon_cap() {
        let batches: Vec<ProjectableBatch> = (1..=5).map(|i| batch(i, i, 1, 300, None)).collect();
        let projection = DailyProjector::new().project(
            &batches,
            &caps(&[(1, 300)]),
            date(2026, 3, 9),
            ProjectionHorizon::Open { max_days: 3 },
        );
        assert_eq!(projection.days.len(), 3);
        assert_eq!(projection.unplaced.len(), 2);
    }

    #[test]
    fn test_late_set_and_serialization() {
        let due = Some(date(2026, 3, 9));
        let batches = vec![batch(1, 10, 1, 300, due), batch(2, 10, 1, 300, due)];
        let projection = DailyProjector::new().project(
            &batches,
            &caps(&[(1, 300)]),
            date(2026, 3, 9),
            ProjectionHorizon::Open { max_days: 10 },
        );
        assert_eq!(projection.late_orders().into_iter().collect::<Vec<_>>(), vec![10]);
        assert_eq!(projection.last_date_by_order()[&10], date(2026, 3, 10));

        let json = serde_json::to_value(&projection.days).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"2026-03-09": [{"order_id": 10, "punctuality": "en_tiempo"}]},
                {"2026-03-10": [{"order_id": 10, "punctuality": "atrasado"}]}
            ])
        );
    }
}
