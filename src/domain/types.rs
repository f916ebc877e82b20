// ==========================================
// 食品生产排产核心 - 领域类型定义
// ==========================================
// 职责: 原料批次 / 生产订单 / 生产批次 / 销售订单的状态枚举
// 序列化格式: snake_case (与数据库存储值一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 原料批次状态 (Lot Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    Available,   // 可用
    Depleted,    // 已耗尽
    Quarantined, // 隔离待检
    Rejected,    // 拒收
    Ordered,     // 已订购未到货
}

impl LotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Available => "available",
            LotStatus::Depleted => "depleted",
            LotStatus::Quarantined => "quarantined",
            LotStatus::Rejected => "rejected",
            LotStatus::Ordered => "ordered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(LotStatus::Available),
            "depleted" => Some(LotStatus::Depleted),
            "quarantined" => Some(LotStatus::Quarantined),
            "rejected" => Some(LotStatus::Rejected),
            "ordered" => Some(LotStatus::Ordered),
            _ => None,
        }
    }

    /// 入库质检可设置的目标状态
    pub fn is_receiving_target(&self) -> bool {
        matches!(
            self,
            LotStatus::Quarantined | LotStatus::Available | LotStatus::Rejected
        )
    }
}

impl fmt::Display for LotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 生产订单状态 (Production Order Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,            // 待处理
    Planned,            // 已计划
    ReadyForProduction, // 原料齐套，可投产
    InProcess,          // 生产中
    Finished,           // 已完成
    Cancelled,          // 已取消
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Planned => "planned",
            OrderStatus::ReadyForProduction => "ready_for_production",
            OrderStatus::InProcess => "in_process",
            OrderStatus::Finished => "finished",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "planned" => Some(OrderStatus::Planned),
            "ready_for_production" => Some(OrderStatus::ReadyForProduction),
            "in_process" => Some(OrderStatus::InProcess),
            "finished" => Some(OrderStatus::Finished),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// 原料分配可处理的状态
    pub const ALLOCATABLE: &'static [OrderStatus] = &[OrderStatus::Pending, OrderStatus::Planned];

    /// 排程器纳入的状态；in_process 订单的剩余重量继续排程
    pub const SCHEDULABLE: &'static [OrderStatus] = &[
        OrderStatus::ReadyForProduction,
        OrderStatus::Planned,
        OrderStatus::InProcess,
    ];
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 生产批次状态 (Batch Status)
// ==========================================
// 状态机: planned → {in_progress, completed, cancelled}
//         in_progress → {completed, cancelled}
//         completed / cancelled 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Planned => "planned",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(BatchStatus::Planned),
            "in_progress" => Some(BatchStatus::InProgress),
            "completed" => Some(BatchStatus::Completed),
            "cancelled" => Some(BatchStatus::Cancelled),
            _ => None,
        }
    }

    /// 允许的后继状态
    pub fn successors(&self) -> &'static [BatchStatus] {
        match self {
            BatchStatus::Planned => &[
                BatchStatus::InProgress,
                BatchStatus::Completed,
                BatchStatus::Cancelled,
            ],
            BatchStatus::InProgress => &[BatchStatus::Completed, BatchStatus::Cancelled],
            BatchStatus::Completed | BatchStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: BatchStatus) -> bool {
        self.successors().contains(&target)
    }

    /// 已投产或已完成的批次（重排时保留，计入已落实重量）
    pub fn is_firm(&self) -> bool {
        matches!(self, BatchStatus::InProgress | BatchStatus::Completed)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 销售订单状态 (Sales Order Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    Pending,
    InProcess,
    ReadyForDispatch, // 全部生产订单完成，待发货
    Delivered,
    Cancelled,
}

impl SalesOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::Pending => "pending",
            SalesOrderStatus::InProcess => "in_process",
            SalesOrderStatus::ReadyForDispatch => "ready_for_dispatch",
            SalesOrderStatus::Delivered => "delivered",
            SalesOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SalesOrderStatus::Pending),
            "in_process" => Some(SalesOrderStatus::InProcess),
            "ready_for_dispatch" => Some(SalesOrderStatus::ReadyForDispatch),
            "delivered" => Some(SalesOrderStatus::Delivered),
            "cancelled" => Some(SalesOrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for SalesOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 交期状态 (Punctuality)
// ==========================================
// 对外线上值保持西语: atrasado / por_vencer / en_tiempo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Punctuality {
    #[serde(rename = "atrasado")]
    Late,
    #[serde(rename = "por_vencer")]
    DueSoon,
    #[serde(rename = "en_tiempo")]
    OnTime,
}

impl Punctuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Punctuality::Late => "atrasado",
            Punctuality::DueSoon => "por_vencer",
            Punctuality::OnTime => "en_tiempo",
        }
    }
}

impl fmt::Display for Punctuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_transitions() {
        assert!(BatchStatus::Planned.can_transition_to(BatchStatus::InProgress));
        assert!(BatchStatus::Planned.can_transition_to(BatchStatus::Completed));
        assert!(BatchStatus::InProgress.can_transition_to(BatchStatus::Cancelled));
        assert!(!BatchStatus::InProgress.can_transition_to(BatchStatus::Planned));
        assert!(!BatchStatus::Completed.can_transition_to(BatchStatus::Cancelled));
        assert!(!BatchStatus::Planned.can_transition_to(BatchStatus::Planned));
    }

    #[test]
    fn test_status_round_trip_strings() {
        for s in ["pending", "planned", "ready_for_production", "in_process", "finished", "cancelled"] {
            assert_eq!(OrderStatus::from_str(s).unwrap().as_str(), s);
        }
        assert!(LotStatus::from_str("agotado").is_none());
    }

    #[test]
    fn test_punctuality_wire_values() {
        let json = serde_json::to_string(&Punctuality::DueSoon).unwrap();
        assert_eq!(json, "\"por_vencer\"");
        assert!(!LotStatus::Depleted.is_receiving_target());
    }
}
