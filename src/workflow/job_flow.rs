//! 任务处理流程 - 流程层
//!
//! 核心职责：定义"一个文件"的完整远程处理流程
//!
//! 流程顺序（严格串行，前一步成功后才开始下一步）：
//! 1. upload
//! 2. submit
//! 3. check_status 轮询直到 completed
//! 4. fetch_result
//!
//! 每个挂起点都与取消信号竞争，过期序列的响应不会被处理。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::clients::JobApi;
use crate::config::{Config, DEFAULT_POLL_INTERVAL_SECS};
use crate::error::{ClientError, FlowError};
use crate::models::{EvaluationResult, JobStatus, TranscriptFile};
use crate::workflow::sequence_ctx::SequenceCtx;
use crate::workflow::state::WorkflowEvent;

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS);

/// 轮询策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` 表示不限次数，只在完成、失败或取消时结束
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
        }
    }
}

/// 任务处理流程
///
/// - 不持有任何状态，状态转移通过 `SequenceCtx` 汇报
/// - 不做重试，失败直接返回
pub struct JobFlow {
    api: Arc<dyn JobApi>,
    policy: PollPolicy,
}

impl JobFlow {
    pub fn new(api: Arc<dyn JobApi>, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    /// 执行完整流程，返回评估结果
    pub async fn run(
        &self,
        file: &TranscriptFile,
        ctx: &mut SequenceCtx,
    ) -> Result<EvaluationResult, FlowError> {
        // ========== 1. 上传 ==========
        if file.is_empty() {
            warn!("{} ⚠️ 文件内容为空，仍然提交", ctx);
        }
        info!("{} 📤 正在上传 ({} 字节)...", ctx, file.len());
        let job = guarded(ctx, self.api.upload(file)).await?;
        info!("{} ✓ 上传成功，doc_id={}", ctx, job.doc_id);

        if !ctx.transition(WorkflowEvent::Uploaded) {
            return Err(FlowError::Cancelled);
        }

        // ========== 2. 提交处理 ==========
        let doc_id = guarded(ctx, self.api.submit(&job)).await?;
        info!("{} ✓ 已提交处理，doc_id={}", ctx, doc_id);

        // ========== 3. 轮询 ==========
        let result_url = self.poll_until_complete(&doc_id, ctx).await?;

        if !ctx.transition(WorkflowEvent::ResultReady) {
            return Err(FlowError::Cancelled);
        }

        // ========== 4. 取回结果 ==========
        info!("{} 📥 正在取回评估结果...", ctx);
        let result = guarded(ctx, self.api.fetch_result(&result_url)).await?;
        info!(
            "{} ✓ 评估结果: {} 个句子, {} 条命中",
            ctx,
            result.total_sentences(),
            result.total_hits()
        );

        Ok(result)
    }

    /// 轮询直到任务完成
    ///
    /// 显式循环；每轮开始、等待前后都检查取消。
    async fn poll_until_complete(
        &self,
        doc_id: &str,
        ctx: &mut SequenceCtx,
    ) -> Result<String, FlowError> {
        let mut attempts: u32 = 0;

        loop {
            if ctx.token.is_cancelled() {
                return Err(FlowError::Cancelled);
            }

            attempts += 1;
            debug!("{} 🔍 第 {} 次状态查询", ctx, attempts);

            match guarded(ctx, self.api.check_status(doc_id)).await? {
                JobStatus::Completed { result_url } => {
                    info!("{} ✓ 任务完成 (共查询 {} 次)", ctx, attempts);
                    return Ok(result_url);
                }
                JobStatus::Processing => {}
            }

            if let Some(max) = self.policy.max_attempts {
                if attempts >= max {
                    warn!("{} ⚠️ 已达到轮询上限 {} 次", ctx, max);
                    return Err(FlowError::PollLimitReached { attempts });
                }
            }

            debug!(
                "{} ⏳ 仍在处理中，{} 秒后再次查询",
                ctx,
                self.policy.interval.as_secs()
            );

            tokio::select! {
                biased;
                _ = ctx.token.cancelled() => return Err(FlowError::Cancelled),
                _ = sleep(self.policy.interval) => {}
            }
        }
    }
}

/// 远程调用与取消信号竞争
///
/// 取消优先：即使响应已就绪，过期序列也不会拿到它。
async fn guarded<T, F>(ctx: &mut SequenceCtx, call: F) -> Result<T, FlowError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    let result = tokio::select! {
        biased;
        _ = ctx.token.cancelled() => return Err(FlowError::Cancelled),
        result = call => result,
    };

    if ctx.token.is_cancelled() {
        return Err(FlowError::Cancelled);
    }
    result.map_err(FlowError::from)
}
