use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// 默认轮询间隔（秒）
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 合规分析服务地址（包含 `/qas` 前缀）
    pub api_base_url: String,
    /// 两次状态查询之间的间隔（秒）
    pub poll_interval_secs: u64,
    /// 轮询次数上限，`None` 表示不限
    pub max_poll_attempts: Option<u32>,
    /// 出错后自动重试次数
    pub auto_retry: u32,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 报告输出文件
    pub report_file: String,
    // --- 报告表格的筛选与排序 ---
    pub category_filter: String,
    pub source_filter: String,
    pub sort_field: String,
    pub sort_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/qas".to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_poll_attempts: None,
            auto_retry: 0,
            verbose_logging: false,
            report_file: "compliance_report.txt".to_string(),
            category_filter: "all".to_string(),
            source_filter: "all".to_string(),
            sort_field: "sentence_idx".to_string(),
            sort_dir: "asc".to_string(),
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 优先读取 `COMPLIANCE_CONFIG` 指向的 TOML 文件，再叠加环境变量
    pub fn load() -> Result<Self, ConfigError> {
        match env_string("COMPLIANCE_CONFIG") {
            Some(path) => Ok(Self::from_toml_file(Path::new(&path))?.with_env_overrides()),
            None => Ok(Self::from_env()),
        }
    }

    /// 从 TOML 文件加载，缺失的键使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(content)?;
        Ok(config.normalized())
    }

    fn with_env_overrides(self) -> Self {
        let config = Self {
            api_base_url: env_string("QAS_API_BASE_URL").unwrap_or(self.api_base_url),
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS").unwrap_or(self.poll_interval_secs),
            max_poll_attempts: match env_parse::<u32>("MAX_POLL_ATTEMPTS") {
                Some(n) => Some(n),
                None => self.max_poll_attempts,
            },
            auto_retry: env_parse("AUTO_RETRY").unwrap_or(self.auto_retry),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            report_file: env_string("REPORT_FILE").unwrap_or(self.report_file),
            category_filter: env_string("CATEGORY_FILTER").unwrap_or(self.category_filter),
            source_filter: env_string("SOURCE_FILTER").unwrap_or(self.source_filter),
            sort_field: env_string("SORT_FIELD").unwrap_or(self.sort_field),
            sort_dir: env_string("SORT_DIR").unwrap_or(self.sort_dir),
        };
        config.normalized()
    }

    /// 上限为 0 视为不限；间隔为 0 回退到默认值
    fn normalized(mut self) -> Self {
        if self.max_poll_attempts == Some(0) {
            self.max_poll_attempts = None;
        }
        if self.poll_interval_secs == 0 {
            warn!(
                "轮询间隔不能为 0，使用默认值 {} 秒",
                DEFAULT_POLL_INTERVAL_SECS
            );
            self.poll_interval_secs = DEFAULT_POLL_INTERVAL_SECS;
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("环境变量 {} 的值 '{}' 无法解析，使用默认值", name, raw);
            None
        }
    }
}
