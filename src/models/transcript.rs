//! 待分析的转写文件

use crate::error::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;

/// 用户选择的转写文件
///
/// 内容以 `Arc` 共享，重试时复用同一份字节。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFile {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl TranscriptFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// 从磁盘加载，只接受 `.txt` 文件
    pub async fn load(path: &Path) -> AppResult<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if !is_transcript_name(&name) {
            return Err(AppError::unsupported_file(path.display().to_string()));
        }

        let bytes = fs::read(path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

        Ok(Self::new(name, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 文件名是否为可接受的转写文件
pub fn is_transcript_name(name: &str) -> bool {
    name.ends_with(".txt")
}
