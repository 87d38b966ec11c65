//! 日志工具模块
//!
//! 提供启动信息、阶段计时和长文本预览等辅助函数

use std::time::Instant;

use tracing::info;

use crate::config::{Backend, Config};

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 论文评审生成");
    info!(
        "🤖 提问模型: {} / 评审模型: {}",
        config.question_model.model_id, config.review_model.model_id
    );
    info!(
        "📐 目标上下文: {} tokens, 提示词版本: {}",
        config.max_seq_len, config.prompt_version
    );
    if config.backend == Backend::Scripted {
        info!("🧪 演练模式：使用预设回复，不加载模型权重");
    }
    info!("{}", "=".repeat(60));
}

/// 阶段计时器
///
/// ```ignore
/// let timer = StageTimer::start("extraction");
/// // ...
/// let seconds = timer.finish();
/// ```
pub struct StageTimer {
    stage: &'static str,
    started: Instant,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        info!("⏱️ 开始阶段: {}", stage);
        Self {
            stage,
            started: Instant::now(),
        }
    }

    /// 结束计时并记录，返回用时（秒）
    pub fn finish(self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        info!("✓ 阶段 {} 完成，用时 {:.4}s", self.stage, elapsed);
        elapsed
    }
}

/// 截断文本用于日志预览（按字符，不按字节）
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// 报告中的时间戳
pub fn report_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
