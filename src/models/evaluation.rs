//! 评估结果数据模型
//!
//! 对应远程服务 `final_evaluation_url` 返回的 JSON 结构。
//! 所有类型在接收后不可变，聚合层只读取、不修改。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 违规等级（有序：HIGH > MEDIUM > LOW）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FaultLevel {
    Low,
    Medium,
    High,
}

impl FaultLevel {
    /// 排序权重：HIGH=3, MEDIUM=2, LOW=1
    pub fn weight(self) -> u8 {
        match self {
            FaultLevel::High => 3,
            FaultLevel::Medium => 2,
            FaultLevel::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FaultLevel::High => "HIGH",
            FaultLevel::Medium => "MEDIUM",
            FaultLevel::Low => "LOW",
        }
    }

    pub const ALL: [FaultLevel; 3] = [FaultLevel::High, FaultLevel::Medium, FaultLevel::Low];
}

impl fmt::Display for FaultLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// 命中来源（哪个检测器产生）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    Regex,
    Llm,
}

impl HitSource {
    pub fn as_str(self) -> &'static str {
        match self {
            HitSource::Regex => "regex",
            HitSource::Llm => "llm",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HitSource::Regex => "Regex",
            HitSource::Llm => "LLM",
        }
    }
}

impl fmt::Display for HitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// 句子
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub idx: usize,
    pub text: String,
}

/// 单条违规命中
///
/// `sentence_idx` 不会与句子列表做越界校验（可能为负），见 `services::aggregation::audit`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub sentence_idx: i64,
    pub text: String,
    pub category: String,
    pub fault_level: FaultLevel,
    pub confidence_score: f64,
    pub source: HitSource,
}

impl Hit {
    /// 置信度百分比（四舍五入）
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence_score * 100.0).round().max(0.0) as u32
    }
}

/// 预处理后的文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedText {
    #[serde(default)]
    pub full_text: String,
    pub sentences: Vec<Sentence>,
}

/// 最终评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub processed: ProcessedText,
    #[serde(default)]
    pub regex_hits: Vec<Hit>,
    #[serde(default)]
    pub llm_hits: Vec<Hit>,
    /// 分类 → 数量（权威计数，可能与命中列表不一致）
    #[serde(default)]
    pub summary: BTreeMap<String, u64>,
}

impl EvaluationResult {
    pub fn sentences(&self) -> &[Sentence] {
        &self.processed.sentences
    }

    pub fn total_sentences(&self) -> usize {
        self.processed.sentences.len()
    }

    pub fn total_hits(&self) -> usize {
        self.regex_hits.len() + self.llm_hits.len()
    }
}
