// ==========================================
// 食品生产排产核心 - 异步重排工作器
// ==========================================
// 职责: 消费排产事件（重排 / 重新分配），逐个串行执行
// 说明: 发布端非阻塞（无界通道）；通道全部发送端关闭后工作器退出
// ==========================================

use crate::engine::events::{PlanningEvent, PlanningEventPublisher};
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 事件处理器
#[async_trait]
pub trait PlanningEventHandler: Send + Sync {
    async fn handle(&self, event: PlanningEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 基于 tokio 通道的事件发布者
#[derive(Clone)]
pub struct ChannelEventPublisher {
    tx: mpsc::UnboundedSender<PlanningEvent>,
}

impl PlanningEventPublisher for ChannelEventPublisher {
    fn publish(&self, event: PlanningEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        let event_id = event.event_id.clone();
        self.tx
            .send(event)
            .map_err(|e| format!("事件通道已关闭: {}", e))?;
        Ok(event_id)
    }
}

/// 工作器运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub failed: usize,
}

// ==========================================
// ReplanWorker - 异步重排工作器
// ==========================================
pub struct ReplanWorker {
    rx: mpsc::UnboundedReceiver<PlanningEvent>,
    handler: Arc<dyn PlanningEventHandler>,
}

impl ReplanWorker {
    /// 创建发布者与工作器
    pub fn channel(handler: Arc<dyn PlanningEventHandler>) -> (ChannelEventPublisher, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelEventPublisher { tx }, Self { rx, handler })
    }

    /// 串行处理事件直到通道关闭
    pub async fn run(mut self) -> WorkerStats {
        let mut stats = WorkerStats::default();
        while let Some(event) = self.rx.recv().await {
            let event_id = event.event_id.clone();
            let kind = event.kind.as_str();
            match self.handler.handle(event).await {
                Ok(()) => {
                    stats.processed += 1;
                    tracing::info!(event_id = %event_id, kind, "排产事件处理完成");
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(event_id = %event_id, kind, error = %e, "排产事件处理失败");
                }
            }
        }
        tracing::debug!(?stats, "事件通道关闭，工作器退出");
        stats
    }

    /// 在当前 tokio 运行时上启动
    pub fn spawn(self) -> JoinHandle<WorkerStats> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::PlanningEventKind;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<PlanningEventKind>>,
    }

    #[async_trait]
    impl PlanningEventHandler for RecordingHandler {
        async fn handle(&self, event: PlanningEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            if event.origin == "fail" {
                return Err("boom".into());
            }
            self.seen.lock().unwrap().push(event.kind);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_worker_processes_in_order_and_stops() {
        let handler = Arc::new(RecordingHandler::default());
        let (publisher, worker) = ReplanWorker::channel(handler.clone());
        let join = worker.spawn();

        publisher
            .publish(PlanningEvent::replan("batch:in_progress", vec![1]))
            .unwrap();
        publisher.publish(PlanningEvent::reallocate("fail")).unwrap();
        publisher.publish(PlanningEvent::reallocate("lot:2")).unwrap();
        drop(publisher);

        let stats = join.await.unwrap();
        assert_eq!(stats, WorkerStats { processed: 2, failed: 1 });
        assert_eq!(
            *handler.seen.lock().unwrap(),
            vec![PlanningEventKind::Replan, PlanningEventKind::Reallocate]
        );
    }

    #[tokio::test]
    async fn test_publish_after_worker_gone_fails() {
        let handler = Arc::new(RecordingHandler::default());
        let (publisher, worker) = ReplanWorker::channel(handler);
        drop(worker);
        assert!(publisher.publish(PlanningEvent::reallocate("lot:1")).is_err());
    }
}
