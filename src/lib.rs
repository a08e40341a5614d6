//! # Transcript Compliance
//!
//! 提交转写文本到远程合规分析服务，跟踪多阶段异步任务直到完成，
//! 并把两路检测结果（regex / llm）聚合成可浏览的报告。
//!
//! ## 架构设计
//!
//! ### ① 远程接口层（Clients）
//! - `clients/` - 无状态的四个远程操作
//! - `JobApi` - upload / submit / check_status / fetch_result
//! - `QasClient` - 基于 reqwest 的实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 纯函数，只读取评估结果
//! - `aggregation` - 合并、按句索引、等级、合规分数、筛选排序
//! - `report` - 组装并渲染报告
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文件"的完整处理流程
//! - `state` - 纯状态转移函数
//! - `JobFlow` - upload → submit → poll → fetch，每个挂起点都可取消
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/workflow_orchestrator` - 唯一的状态所有者，管理取消与交付
//! - `orchestrator/app` - 命令行驱动

pub mod clients;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{JobApi, QasClient};
pub use config::Config;
pub use error::{AppError, AppResult, ClientError, FlowError, Operation};
pub use models::{EvaluationResult, FaultLevel, Hit, HitSource, Job, JobStatus, Sentence, TranscriptFile};
pub use orchestrator::{App, Delivery, Orchestrator};
pub use services::{ComplianceReport, ReportOptions};
pub use workflow::{Phase, PollPolicy, WorkflowEvent, WorkflowState};
