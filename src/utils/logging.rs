/// 日志工具模块
///
/// 初始化 tracing，并提供批处理日志的格式化输出
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::Stage;

/// 初始化日志
///
/// 级别由 `RUST_LOG` 控制，默认 `info`。重复调用不会报错。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(max_concurrent: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 讲解视频生产流水线");
    info!("📊 最大并发数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
pub fn log_batch_start(stage: Stage, count: usize, max_concurrent: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始批量执行 {} 阶段", stage);
    info!("📄 候选条目: {} 个，最大并发 {}", count, max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(
    stage: Stage,
    success: usize,
    provisional: usize,
    failed: usize,
    total: usize,
) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ {} 阶段完成 ({}): 成功 {}/{}",
        stage,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        success,
        total
    );
    if provisional > 0 {
        info!("⏳ 待确认 (render_pending): {}", provisional);
    }
    info!("❌ 失败: {}", failed);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
