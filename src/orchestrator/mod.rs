//! 编排层（Orchestration Layer）
//!
//! ### `workflow_orchestrator` - 工作流编排器
//! - 持有唯一的 `WorkflowState`
//! - 接收用户意图（选择文件、重试、关闭错误）
//! - 管理序列取消与结果交付
//!
//! ### `app` - 命令行应用
//! - 初始化客户端与编排器
//! - 监听状态变化并输出日志
//! - 收到结果后生成报告
//!
//! ## 层次关系
//!
//! ```text
//! app (命令行驱动)
//!     ↓
//! workflow_orchestrator (状态容器 + 取消)
//!     ↓
//! workflow::JobFlow (单个序列: upload → submit → poll → fetch)
//!     ↓
//! clients::JobApi (远程调用)
//! ```

pub mod app;
pub mod workflow_orchestrator;

pub use app::App;
pub use workflow_orchestrator::{Delivery, DeliveryReceiver, Orchestrator};
