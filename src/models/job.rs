//! 远程任务相关的请求/响应结构

use serde::{Deserialize, Serialize};

/// 一次已上传的任务
///
/// 上传成功时创建，提交与轮询阶段使用，取回结果或出错后丢弃。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub doc_id: String,
    pub source_url: String,
}

/// `POST /upload` 响应
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub status: String,
    pub doc_id: String,
    pub input_s3_url: String,
}

impl From<UploadResponse> for Job {
    fn from(resp: UploadResponse) -> Self {
        Self {
            doc_id: resp.doc_id,
            source_url: resp.input_s3_url,
        }
    }
}

/// `POST /process` 请求体
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRequest<'a> {
    pub doc_id: &'a str,
    pub input_s3_url: &'a str,
}

/// `POST /process` 响应
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessResponse {
    pub doc_id: String,
    #[serde(default)]
    pub input_s3_url: String,
}

/// `GET /status/{doc_id}` 原始响应
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub final_evaluation_url: Option<String>,
}

/// 任务状态
///
/// `Completed` 一定携带结果地址。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Processing,
    Completed { result_url: String },
}

impl StatusResponse {
    /// 转换为任务状态
    ///
    /// 只有 `completed` 且带有非空地址时才视为完成；其余情况继续轮询。
    pub fn into_status(self) -> JobStatus {
        match (self.status.as_str(), self.final_evaluation_url) {
            ("completed", Some(url)) if !url.is_empty() => JobStatus::Completed { result_url: url },
            _ => JobStatus::Processing,
        }
    }
}
