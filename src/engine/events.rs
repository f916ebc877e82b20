// ==========================================
// 食品生产排产核心 - 引擎层事件发布
// ==========================================
// 职责: 定义排产事件发布 trait，实现依赖倒置
// 说明: 事件在事务提交之后发布；发布失败只记日志，不影响调用方
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use uuid::Uuid;

// ==========================================
// 事件类型
// ==========================================

/// 排产事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningEventKind {
    /// 请求重新排程批次
    Replan,
    /// 请求重新分配原料批次
    Reallocate,
}

impl PlanningEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanningEventKind::Replan => "replan",
            PlanningEventKind::Reallocate => "reallocate",
        }
    }
}

/// 排产事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningEvent {
    pub event_id: String,
    pub kind: PlanningEventKind,
    /// 事件来源，如 `batch:in_progress`、`lot:42`
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_ids: Option<Vec<i64>>,
    pub occurred_at: DateTime<Utc>,
}

impl PlanningEvent {
    fn new(kind: PlanningEventKind, origin: String, batch_ids: Option<Vec<i64>>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            kind,
            origin,
            batch_ids,
            occurred_at: Utc::now(),
        }
    }

    /// 重新排程事件
    pub fn replan(origin: impl Into<String>, batch_ids: Vec<i64>) -> Self {
        let ids = if batch_ids.is_empty() {
            None
        } else {
            Some(batch_ids)
        };
        Self::new(PlanningEventKind::Replan, origin.into(), ids)
    }

    /// 重新分配原料事件
    pub fn reallocate(origin: impl Into<String>) -> Self {
        Self::new(PlanningEventKind::Reallocate, origin.into(), None)
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 排产事件发布者
///
/// # 实现说明
/// - `ChannelEventPublisher` 把事件投递给异步 `ReplanWorker`
/// - 测试中可用 `NoOpEventPublisher` 或自定义记录器
pub trait PlanningEventPublisher: Send + Sync {
    /// 发布事件
    ///
    /// # 返回
    /// - `Ok(event_id)`: 已投递
    /// - `Err`: 发布失败
    fn publish(&self, event: PlanningEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl PlanningEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: PlanningEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - kind={}, origin={}",
            event.kind.as_str(),
            event.origin
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn PlanningEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn PlanningEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn from_option(publisher: Option<Arc<dyn PlanningEventPublisher>>) -> Self {
        Self { inner: publisher }
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: PlanningEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - kind={}, origin={}",
                    event.kind.as_str(),
                    event.origin
                );
                Ok(String::new())
            }
        }
    }

    /// 发布事件，失败仅记录告警
    pub fn publish_or_log(&self, event: PlanningEvent) {
        let kind = event.kind;
        let origin = event.origin.clone();
        if let Err(e) = self.publish(event) {
            tracing::warn!(kind = kind.as_str(), origin = %origin, error = %e, "事件发布失败");
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FailingPublisher;

    impl PlanningEventPublisher for FailingPublisher {
        fn publish(&self, _event: PlanningEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            Err("queue closed".into())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<PlanningEvent>>);

    impl PlanningEventPublisher for Recorder {
        fn publish(&self, event: PlanningEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            let id = event.event_id.clone();
            self.0.lock().unwrap().push(event);
            Ok(id)
        }
    }

    #[test]
    fn test_replan_event_fields() {
        let event = PlanningEvent::replan("batch:completed", vec![3, 4]);
        assert_eq!(event.kind, PlanningEventKind::Replan);
        assert_eq!(event.batch_ids, Some(vec![3, 4]));
        assert!(!event.event_id.is_empty());

        let empty = PlanningEvent::replan("manual", vec![]);
        assert!(empty.batch_ids.is_none());
    }

    #[test]
    fn test_noop_publisher() {
        let result = NoOpEventPublisher.publish(PlanningEvent::reallocate("lot:1"));
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_optional_publisher_forwards() {
        let recorder = Arc::new(Recorder::default());
        let publisher = OptionalEventPublisher::with_publisher(recorder.clone());
        assert!(publisher.is_configured());

        publisher.publish_or_log(PlanningEvent::reallocate("lot:9"));
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_publish_failure_is_swallowed() {
        let publisher = OptionalEventPublisher::with_publisher(Arc::new(FailingPublisher));
        // 不应 panic
        publisher.publish_or_log(PlanningEvent::replan("batch:cancelled", vec![1]));
        assert!(!OptionalEventPublisher::none().is_configured());
    }
}
