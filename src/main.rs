// ==========================================
// 食品生产排产核心 - 命令行入口
// ==========================================
// 用法: food-aps <command> [json]
// 命令: allocate / plan / preview / what-if / batch-status / lot-status /
//       manual-batches / line-active / due-date / purchase-lot / daily-plan
// 输出: stdout 为 JSON 结果；日志走 stderr
// ==========================================

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use food_production_aps::api::{ApiError, PlanningApi};
use food_production_aps::app::{get_default_db_path, AppState};
use food_production_aps::engine::SystemClock;

const USAGE: &str = "用法: food-aps <allocate|plan|preview|what-if|batch-status|lot-status|manual-batches|line-active|due-date|purchase-lot|daily-plan> [json]";

fn parse<T: DeserializeOwned>(payload: Option<&str>, default: Option<&str>) -> Result<T> {
    let raw = payload
        .or(default)
        .ok_or_else(|| anyhow!("缺少 JSON 请求参数\n{}", USAGE))?;
    serde_json::from_str(raw).with_context(|| format!("请求 JSON 解析失败: {}", raw))
}

fn render<T: Serialize>(value: Result<T, ApiError>) -> Result<String> {
    match value {
        Ok(v) => Ok(serde_json::to_string_pretty(&v)?),
        Err(e) => bail!("[{} {}] {}", e.status_code(), e.code(), e),
    }
}

fn dispatch(api: &PlanningApi, command: &str, payload: Option<&str>) -> Result<String> {
    match command {
        "allocate" => render(api.allocate(&parse(payload, Some("{}"))?)),
        "plan" => render(api.plan()),
        "preview" => render(api.preview(&parse(payload, Some("{}"))?)),
        "what-if" => render(api.what_if(&parse(payload, None)?)),
        "batch-status" => render(api.update_batch_status(&parse(payload, None)?)),
        "lot-status" => render(api.update_lot_status(&parse(payload, None)?)),
        "manual-batches" => render(api.replace_line_batches(&parse(payload, None)?)),
        "line-active" => render(api.set_line_active(&parse(payload, None)?)),
        "due-date" => render(api.update_due_date(&parse(payload, None)?)),
        "purchase-lot" => render(api.create_purchase_lot(&parse(payload, None)?)),
        "daily-plan" => render(api.daily_plan()),
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    food_production_aps::logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };
    let payload = args.get(1).map(String::as_str);

    let db_path = get_default_db_path();
    tracing::info!(version = food_production_aps::VERSION, db = %db_path, "{}", food_production_aps::APP_NAME);

    let (state, worker) = AppState::with_replan_worker(db_path, Arc::new(SystemClock))
        .map_err(|e| anyhow!(e))?;
    let worker = worker.spawn();

    let api = state.planning_api.clone();
    let command = command.clone();
    let payload = payload.map(str::to_string);
    let output = tokio::task::spawn_blocking(move || dispatch(&api, &command, payload.as_deref()))
        .await
        .context("命令执行线程异常退出")?;

    // 关闭发布端后等待工作器把已入队的事件处理完
    drop(state);
    let stats = worker.await.context("重排工作器异常退出")?;
    tracing::debug!(processed = stats.processed, failed = stats.failed, "重排工作器已停止");

    println!("{}", output?);
    Ok(())
}
