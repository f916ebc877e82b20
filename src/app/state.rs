// ==========================================
// 食品生产排产核心 - 应用状态
// ==========================================
// 职责: 组装数据库、配置管理器、事件发布与 API 实例
// ==========================================

use std::sync::Arc;

use crate::api::PlanningApi;
use crate::app::replan_handler::EngineEventHandler;
use crate::config::ConfigManager;
use crate::db::Database;
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::events::{OptionalEventPublisher, PlanningEventPublisher};
use crate::engine::replan_worker::ReplanWorker;

/// 应用状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    pub db: Database,

    pub config_manager: Arc<ConfigManager>,

    /// 排产API
    pub planning_api: Arc<PlanningApi>,

    /// 事件发布器（用于触发异步重排）
    pub event_publisher: Option<Arc<dyn PlanningEventPublisher>>,
}

impl AppState {
    /// 创建不带事件发布的 AppState
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_publisher(db_path, None, Arc::new(SystemClock))
    }

    /// 创建 AppState
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（不存在则创建并建表）
    /// - event_publisher: 可选事件发布器
    /// - clock: 时钟
    pub fn with_publisher(
        db_path: String,
        event_publisher: Option<Arc<dyn PlanningEventPublisher>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, String> {
        let db = Database::open(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        Ok(Self::assemble(db_path, db, event_publisher, clock))
    }

    /// 创建 AppState 与配套的 ReplanWorker
    ///
    /// 工作器需由调用方在 tokio 运行时上启动（`worker.spawn()`）
    pub fn with_replan_worker(
        db_path: String,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, ReplanWorker), String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);
        let db = Database::open(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        let config_manager = Arc::new(ConfigManager::from_connection(db.shared_connection()));
        let handler = EngineEventHandler::new(db.clone(), config_manager, clock.clone());
        let (publisher, worker) = ReplanWorker::channel(Arc::new(handler));

        let publisher: Arc<dyn PlanningEventPublisher> = Arc::new(publisher);
        let state = Self::assemble(db_path, db, Some(publisher), clock);
        Ok((state, worker))
    }

    fn assemble(
        db_path: String,
        db: Database,
        event_publisher: Option<Arc<dyn PlanningEventPublisher>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config_manager = Arc::new(ConfigManager::from_connection(db.shared_connection()));
        let planning_api = Arc::new(PlanningApi::new(
            db.clone(),
            config_manager.clone(),
            OptionalEventPublisher::from_option(event_publisher.clone()),
            clock,
        ));

        Self {
            db_path,
            db,
            config_manager,
            planning_api,
            event_publisher,
        }
    }
}

/// 获取默认数据库路径
///
/// 优先使用环境变量 FOOD_APS_DB，其次为用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("FOOD_APS_DB") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./food_aps.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("food-production-aps");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("food_aps.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.db").to_string_lossy().to_string();
        let state = AppState::new(db_path).unwrap();
        assert!(state.event_publisher.is_none());
        let daily = state.planning_api.daily_plan().unwrap();
        assert!(daily.entries.is_empty());
    }
}
