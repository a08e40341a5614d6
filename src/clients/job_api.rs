//! 远程任务接口
//!
//! 四个无状态的远程操作。任何一个都不在内部重试，重试策略属于编排层。

use async_trait::async_trait;

use crate::error::ClientError;
use crate::models::{EvaluationResult, Job, JobStatus, TranscriptFile};

#[async_trait]
pub trait JobApi: Send + Sync {
    /// 上传原始文件，返回服务端分配的 doc_id 与存储地址
    async fn upload(&self, file: &TranscriptFile) -> Result<Job, ClientError>;

    /// 提交文档进行处理，返回服务端确认的 doc_id
    async fn submit(&self, job: &Job) -> Result<String, ClientError>;

    /// 查询任务状态
    async fn check_status(&self, doc_id: &str) -> Result<JobStatus, ClientError>;

    /// 取回最终评估结果
    async fn fetch_result(&self, result_url: &str) -> Result<EvaluationResult, ClientError>;
}
