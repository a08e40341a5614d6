//! 序列上下文
//!
//! 封装"我是第几个序列、处理哪个文件"以及向状态容器汇报的通道

use std::fmt::Display;
use std::sync::Arc;

use crate::models::EvaluationResult;
use crate::workflow::cancel::SequenceToken;
use crate::workflow::state::WorkflowEvent;

/// 状态容器对序列暴露的能力
///
/// 两个方法都必须在同一把锁内检查序列号是否仍为最新；
/// 返回 `false` 表示序列已过期，调用方应立即放弃。
pub trait SequenceSink: Send + Sync {
    fn transition(&self, seq: u64, event: WorkflowEvent) -> bool;

    fn deliver(&self, seq: u64, result: EvaluationResult) -> bool;
}

/// 序列上下文
pub struct SequenceCtx {
    pub file_name: String,
    pub token: SequenceToken,
    sink: Arc<dyn SequenceSink>,
}

impl SequenceCtx {
    pub fn new(file_name: String, token: SequenceToken, sink: Arc<dyn SequenceSink>) -> Self {
        Self {
            file_name,
            token,
            sink,
        }
    }

    pub fn seq(&self) -> u64 {
        self.token.seq()
    }

    /// 汇报状态转移，已取消或过期时返回 `false`
    pub fn transition(&self, event: WorkflowEvent) -> bool {
        !self.token.is_cancelled() && self.sink.transition(self.seq(), event)
    }

    /// 一次性交付结果
    pub fn deliver(&self, result: EvaluationResult) -> bool {
        !self.token.is_cancelled() && self.sink.deliver(self.seq(), result)
    }
}

impl Display for SequenceCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[序列 {} | {}]", self.seq(), self.file_name)
    }
}
