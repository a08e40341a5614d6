use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 远程服务调用错误
    #[error("{0}")]
    Client(#[from] ClientError),
    /// 工作流以错误状态结束
    #[error("工作流失败: {message}")]
    Workflow { message: String },
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 远程任务客户端错误
///
/// 消息格式会原样进入工作流的错误状态，供用户查看。
#[derive(Debug, Error)]
pub enum ClientError {
    /// 非成功状态码或网络失败（`status` 为 `None`）
    #[error("{}", transport_message(.operation, .status, .body))]
    Transport {
        operation: Operation,
        status: Option<u16>,
        body: String,
    },
    /// 响应体不符合预期结构
    #[error("{operation}: 响应解析失败: {source}")]
    Decode {
        operation: Operation,
        #[source]
        source: serde_json::Error,
    },
}

/// 远程操作（用于错误消息）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Process,
    Status,
    FetchEvaluation,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Operation::Upload => "上传失败",
            Operation::Process => "提交处理失败",
            Operation::Status => "状态查询失败",
            Operation::FetchEvaluation => "获取评估结果失败",
        };
        f.write_str(text)
    }
}

fn transport_message(operation: &Operation, status: &Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("{} ({}): {}", operation, code, body),
        None => format!("{} (网络错误): {}", operation, body),
    }
}

impl ClientError {
    /// 非成功状态码
    pub fn status(operation: Operation, status: u16, body: impl Into<String>) -> Self {
        ClientError::Transport {
            operation,
            status: Some(status),
            body: body.into(),
        }
    }

    /// 网络层失败
    pub fn network(operation: Operation, source: impl std::fmt::Display) -> Self {
        ClientError::Transport {
            operation,
            status: None,
            body: source.to_string(),
        }
    }

    pub fn decode(operation: Operation, source: serde_json::Error) -> Self {
        ClientError::Decode { operation, source }
    }
}

/// 单次工作流序列的错误
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Client(#[from] ClientError),
    /// 序列被主动放弃（仅内部使用，绝不进入用户可见状态）
    #[error("序列已取消")]
    Cancelled,
    /// 达到配置的轮询上限
    #[error("轮询 {attempts} 次后任务仍未完成")]
    PollLimitReached { attempts: u32 },
}

impl FlowError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FlowError::Cancelled)
    }
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    #[error("仅支持 .txt 文件: {path}")]
    Unsupported { path: String },
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("无效的API地址 {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("无法创建HTTP客户端: {0}")]
    HttpClient(String),
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 不支持的文件类型
    pub fn unsupported_file(path: impl Into<String>) -> Self {
        AppError::File(FileError::Unsupported { path: path.into() })
    }

    pub fn workflow(message: impl Into<String>) -> Self {
        AppError::Workflow {
            message: message.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_message_contains_status_and_body() {
        let err = ClientError::status(Operation::Status, 500, "internal error");
        assert_eq!(err.to_string(), "状态查询失败 (500): internal error");
    }

    #[test]
    fn test_network_message() {
        let err = ClientError::network(Operation::Upload, "connection refused");
        assert!(err.to_string().contains("connection refused"));
        assert!(matches!(
            err,
            ClientError::Transport {
                operation: Operation::Upload,
                status: None,
                ..
            }
        ));
    }

    #[test]
    fn test_flow_error_passes_client_message_through() {
        let err: FlowError = ClientError::status(Operation::Process, 422, "bad doc").into();
        assert_eq!(err.to_string(), "提交处理失败 (422): bad doc");
        assert!(!err.is_cancelled());
        assert!(FlowError::Cancelled.is_cancelled());
    }
}
