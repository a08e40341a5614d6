/// 合规分析服务（QAS）HTTP 客户端
///
/// 封装上传、提交、状态查询、取回结果四个接口
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::clients::JobApi;
use crate::config::Config;
use crate::error::{ClientError, ConfigError, Operation};
use crate::models::{
    EvaluationResult, Job, JobStatus, ProcessRequest, ProcessResponse, StatusResponse,
    TranscriptFile, UploadResponse,
};

/// 响应体无法读取时的替代文本
const UNKNOWN_ERROR_BODY: &str = "Unknown error";

/// QAS 客户端
#[derive(Clone, Debug)]
pub struct QasClient {
    client: Client,
    base_url: Url,
}

impl QasClient {
    /// 创建新的客户端
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Self::with_client(client, &config.api_base_url)
    }

    /// 使用现成的 reqwest 客户端
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 拼接接口地址
    fn endpoint(&self, path: &str, operation: Operation) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::network(operation, e))
    }

    /// `status/{doc_id}`，doc_id 作为单个路径段编码
    fn status_endpoint(&self, doc_id: &str) -> Result<Url, ClientError> {
        let mut url = self.endpoint("status", Operation::Status)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::network(Operation::Status, "服务地址不能拼接路径"))?
            .push(doc_id);
        Ok(url)
    }

    /// 解析结果地址，相对地址以 base_url 为基准
    pub fn resolve_result_url(&self, result_url: &str) -> Result<Url, ClientError> {
        match Url::parse(result_url) {
            Ok(url) => Ok(url),
            Err(_) => self
                .base_url
                .join(result_url)
                .map_err(|e| ClientError::network(Operation::FetchEvaluation, e)),
        }
    }
}

#[async_trait]
impl JobApi for QasClient {
    async fn upload(&self, file: &TranscriptFile) -> Result<Job, ClientError> {
        let url = self.endpoint("upload", Operation::Upload)?;
        debug!("上传文件 {} ({} 字节) -> {}", file.name, file.len(), url);

        let part = Part::bytes(file.bytes.to_vec()).file_name(file.name.clone());
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::network(Operation::Upload, e))?;

        let body: UploadResponse = read_json(response, Operation::Upload).await?;
        debug!("上传完成: doc_id={} status={}", body.doc_id, body.status);
        Ok(body.into())
    }

    async fn submit(&self, job: &Job) -> Result<String, ClientError> {
        let url = self.endpoint("process", Operation::Process)?;
        let request = ProcessRequest {
            doc_id: &job.doc_id,
            input_s3_url: &job.source_url,
        };
        debug!("提交处理: doc_id={}", job.doc_id);

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::network(Operation::Process, e))?;

        let body: ProcessResponse = read_json(response, Operation::Process).await?;
        Ok(body.doc_id)
    }

    async fn check_status(&self, doc_id: &str) -> Result<JobStatus, ClientError> {
        let url = self.status_endpoint(doc_id)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::network(Operation::Status, e))?;

        let body: StatusResponse = read_json(response, Operation::Status).await?;
        debug!("状态查询: doc_id={} status={}", doc_id, body.status);
        if body.status == "completed" && body.final_evaluation_url.as_deref().unwrap_or("").is_empty() {
            warn!("doc_id={} 状态为 completed 但缺少结果地址，继续轮询", doc_id);
        }
        Ok(body.into_status())
    }

    async fn fetch_result(&self, result_url: &str) -> Result<EvaluationResult, ClientError> {
        let url = self.resolve_result_url(result_url)?;
        debug!("取回评估结果: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::network(Operation::FetchEvaluation, e))?;

        read_json(response, Operation::FetchEvaluation).await
    }
}

// ========== 辅助函数 ==========

/// 保证 base_url 以 `/` 结尾，使 `join` 追加而不是替换最后一段
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// 检查状态码后按 JSON 解析响应体
async fn read_json<T: DeserializeOwned>(
    response: Response,
    operation: Operation,
) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| UNKNOWN_ERROR_BODY.to_string());
        return Err(ClientError::status(operation, status.as_u16(), body));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ClientError::network(operation, e))?;
    decode_body(&bytes, operation)
}

/// 解析失败作为可报告的错误返回
pub(crate) fn decode_body<T: DeserializeOwned>(
    bytes: &[u8],
    operation: Operation,
) -> Result<T, ClientError> {
    serde_json::from_slice(bytes).map_err(|e| ClientError::decode(operation, e))
}
