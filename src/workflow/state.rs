//! 工作流状态与纯状态转移函数
//!
//! `reduce(state, event) -> state` 不做任何 IO，编排层负责副作用。
//! 对任意阶段的任意事件都有定义：不适用的事件返回原状态。

use std::fmt;

/// 工作流阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Uploading,
    Processing,
    Fetching,
    Error,
}

impl Phase {
    /// 是否有进行中的序列
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Uploading | Phase::Processing | Phase::Fetching)
    }

    /// 进度指示器的步骤（Upload=1, Analyze=2, Results=3）
    pub fn step(self) -> Option<u8> {
        match self {
            Phase::Uploading => Some(1),
            Phase::Processing => Some(2),
            Phase::Fetching => Some(3),
            Phase::Idle | Phase::Error => None,
        }
    }

    /// 进度提示文本
    pub fn progress_message(self) -> Option<&'static str> {
        match self {
            Phase::Uploading => Some("正在上传转写文件..."),
            Phase::Processing => Some("正在分析合规问题..."),
            Phase::Fetching => Some("正在加载评估结果..."),
            Phase::Idle | Phase::Error => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Uploading => "uploading",
            Phase::Processing => "processing",
            Phase::Fetching => "fetching",
            Phase::Error => "error",
        };
        f.write_str(name)
    }
}

/// 展示层唯一的数据来源
///
/// 不变式：`error.is_some()` 当且仅当 `phase == Phase::Error`。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkflowState {
    pub phase: Phase,
    pub file_name: String,
    pub error: Option<String>,
}

/// 状态转移事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// 选择了文件（包括重试）
    FileSelected { file_name: String },
    /// 上传成功
    Uploaded,
    /// 状态查询返回 completed
    ResultReady,
    /// 结果已交付给调用方
    Delivered,
    /// 任一远程调用失败
    Failed { message: String },
    /// 用户关闭错误提示
    Dismissed,
}

/// 错误消息为空时的替代文本
const FALLBACK_ERROR: &str = "发生未知错误";

/// 纯状态转移
pub fn reduce(state: &WorkflowState, event: &WorkflowEvent) -> WorkflowState {
    match (state.phase, event) {
        (_, WorkflowEvent::FileSelected { file_name }) => WorkflowState {
            phase: Phase::Uploading,
            file_name: file_name.clone(),
            error: None,
        },
        (Phase::Uploading, WorkflowEvent::Uploaded) => WorkflowState {
            phase: Phase::Processing,
            ..state.clone()
        },
        (Phase::Processing, WorkflowEvent::ResultReady) => WorkflowState {
            phase: Phase::Fetching,
            ..state.clone()
        },
        (Phase::Fetching, WorkflowEvent::Delivered) => WorkflowState {
            phase: Phase::Idle,
            file_name: state.file_name.clone(),
            error: None,
        },
        (phase, WorkflowEvent::Failed { message }) if phase.is_active() => {
            let message = if message.trim().is_empty() {
                FALLBACK_ERROR.to_string()
            } else {
                message.clone()
            };
            WorkflowState {
                phase: Phase::Error,
                file_name: state.file_name.clone(),
                error: Some(message),
            }
        }
        (Phase::Error, WorkflowEvent::Dismissed) => WorkflowState {
            phase: Phase::Idle,
            file_name: state.file_name.clone(),
            error: None,
        },
        _ => state.clone(),
    }
}
