//! 命令行应用
//!
//! 充当展示层：只派发意图（选择文件、重试、关闭错误）并读取状态快照。

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::{JobApi, QasClient};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::TranscriptFile;
use crate::orchestrator::{Delivery, DeliveryReceiver, Orchestrator};
use crate::services::{ComplianceReport, ReportOptions};
use crate::utils::logging::{log_phase_change, log_startup, print_final_stats};
use crate::utils::truncate_text;
use crate::workflow::{Phase, PollPolicy};

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: Orchestrator,
    deliveries: DeliveryReceiver,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> AppResult<Self> {
        let client = QasClient::new(&config)?;
        Ok(Self::with_api(config, Arc::new(client)))
    }

    /// 使用自定义的远程接口
    pub fn with_api(config: Config, api: Arc<dyn JobApi>) -> Self {
        let (orchestrator, deliveries) = Orchestrator::new(api, PollPolicy::from_config(&config));
        Self {
            config,
            orchestrator,
            deliveries,
        }
    }

    /// 分析一个文件，返回生成的报告
    pub async fn run(mut self, path: &Path) -> AppResult<ComplianceReport> {
        let file = TranscriptFile::load(path).await?;
        log_startup(&self.config, &file);
        self.analyze(file).await
    }

    /// 驱动一次完整的工作流，直到交付、失败或用户中断
    pub async fn analyze(&mut self, file: TranscriptFile) -> AppResult<ComplianceReport> {
        let mut state_rx = self.orchestrator.subscribe();
        let mut retries_left = self.config.auto_retry;

        self.orchestrator.select_file(file);

        loop {
            tokio::select! {
                delivery = self.deliveries.recv() => {
                    let delivery = delivery
                        .ok_or_else(|| AppError::Other("结果通道已关闭".to_string()))?;
                    return self.finish(delivery).await;
                }
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return Err(AppError::Other("状态通道已关闭".to_string()));
                    }
                    let state = state_rx.borrow_and_update().clone();
                    log_phase_change(&state);

                    if state.phase == Phase::Error {
                        let message = state.error.unwrap_or_default();
                        if retries_left > 0 {
                            retries_left -= 1;
                            warn!("🔁 自动重试 (剩余 {} 次)", retries_left);
                            self.orchestrator.retry();
                        } else {
                            self.orchestrator.dismiss_error();
                            return Err(AppError::workflow(message));
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    warn!("⏹ 收到中断信号，放弃当前任务");
                    self.orchestrator.cancel();
                    return Err(AppError::workflow("已取消"));
                }
            }
        }
    }

    /// 生成报告，输出并写入文件
    async fn finish(&self, delivery: Delivery) -> AppResult<ComplianceReport> {
        let options = ReportOptions::from_config(&self.config);
        let report = ComplianceReport::build(&delivery.result, &delivery.file_name, &options);

        for issue in &report.discrepancies {
            warn!("⚠️ 数据不一致: {}", issue);
        }
        for row in report.rows.iter().take(3) {
            info!(
                "  #{} {} {}",
                row.sentence_number,
                row.level,
                truncate_text(&row.text, 60)
            );
        }

        let text = report.render_text();
        println!("{}", text);

        tokio::fs::write(&self.config.report_file, &text)
            .await
            .map_err(|e| AppError::file_write_failed(self.config.report_file.clone(), e))?;

        print_final_stats(&report, &self.config.report_file);
        Ok(report)
    }
}
