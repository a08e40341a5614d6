/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::{error, info};

use crate::config::Config;
use crate::models::TranscriptFile;
use crate::services::ComplianceReport;
use crate::workflow::{Phase, WorkflowState};

/// 记录程序启动信息
pub fn log_startup(config: &Config, file: &TranscriptFile) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 转写文件合规分析");
    info!("📄 文件: {} ({} 字节)", file.name, file.len());
    info!("🌐 服务地址: {}", config.api_base_url);
    match config.max_poll_attempts {
        Some(max) => info!("⏱ 轮询间隔: {} 秒, 上限 {} 次", config.poll_interval_secs, max),
        None => info!("⏱ 轮询间隔: {} 秒, 不限次数", config.poll_interval_secs),
    }
    info!("{}", "=".repeat(60));
}

/// 记录状态变化
pub fn log_phase_change(state: &WorkflowState) {
    match (state.phase, state.phase.step(), state.phase.progress_message()) {
        (_, Some(step), Some(message)) => info!("[{}/3] {}", step, message),
        (Phase::Error, _, _) => error!(
            "❌ {} 处理失败: {}",
            state.file_name,
            state.error.as_deref().unwrap_or_default()
        ),
        _ => info!("状态: {}", state.phase),
    }
}

/// 打印最终统计信息
pub fn print_final_stats(report: &ComplianceReport, report_file: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 分析完成统计");
    info!(
        "完成时间: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 合规分数: {}%", report.score);
    info!(
        "🚩 命中: {} 条 / 被标记句子: {}/{}",
        report.total_hits, report.flagged_sentences, report.total_sentences
    );
    info!("{}", "=".repeat(60));
    info!("\n报告已保存至: {}", report_file);
}
