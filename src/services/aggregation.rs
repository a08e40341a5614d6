//! 结果聚合引擎 - 业务能力层
//!
//! 纯函数：只读取 `EvaluationResult`，从不修改输入，可在每次渲染时重新计算。

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::models::{EvaluationResult, FaultLevel, Hit, Sentence};
use crate::utils::format::format_category;

/// 句子索引 → 该句的命中（保持合并顺序）
///
/// 键是命中中的原始 `sentence_idx`，不保证对应真实句子。
pub type SentenceIndex<'a> = BTreeMap<i64, Vec<&'a Hit>>;

/// 合并两路命中，按 `sentence_idx` 稳定升序
///
/// 同一句内 regex 命中排在 llm 命中之前。
pub fn merge<'a>(regex_hits: &'a [Hit], llm_hits: &'a [Hit]) -> Vec<&'a Hit> {
    let mut merged: Vec<&Hit> = regex_hits.iter().chain(llm_hits.iter()).collect();
    merged.sort_by_key(|h| h.sentence_idx);
    merged
}

/// 合并评估结果中的两路命中
pub fn merged_hits(result: &EvaluationResult) -> Vec<&Hit> {
    merge(&result.regex_hits, &result.llm_hits)
}

/// 按句子分组
pub fn index_by_sentence<'a>(ordered: &[&'a Hit]) -> SentenceIndex<'a> {
    let mut index: SentenceIndex<'a> = BTreeMap::new();
    for hit in ordered {
        index.entry(hit.sentence_idx).or_default().push(*hit);
    }
    index
}

/// 一组命中的最高等级；空列表没有等级
pub fn severity_of(hits: &[&Hit]) -> Option<FaultLevel> {
    hits.iter().map(|h| h.fault_level).max()
}

/// 合规分数：无命中句子所占百分比（四舍五入）
///
/// 没有句子时为 100；标记数超过总数时为 0。
pub fn compliance_score(total_sentences: usize, flagged_sentences: usize) -> u8 {
    if total_sentences == 0 {
        return 100;
    }
    let clean = total_sentences.saturating_sub(flagged_sentences) as u64;
    let total = total_sentences as u64;
    // round(100 * clean / total)，整数运算避免浮点误差
    ((200 * clean + total) / (2 * total)) as u8
}

/// 合规等级（用于仪表盘颜色）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceBand {
    Good,
    Warning,
    Poor,
}

impl ComplianceBand {
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            ComplianceBand::Good
        } else if score >= 50 {
            ComplianceBand::Warning
        } else {
            ComplianceBand::Poor
        }
    }
}

// ========== 表格筛选与排序 ==========

/// 排序字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    SentenceIdx,
    FaultLevel,
    ConfidenceScore,
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn toggled(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

/// 无法识别的排序参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSortParam(pub String);

impl fmt::Display for UnknownSortParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "无法识别的排序参数: {}", self.0)
    }
}

impl std::error::Error for UnknownSortParam {}

impl FromStr for SortField {
    type Err = UnknownSortParam;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sentence_idx" => Ok(SortField::SentenceIdx),
            "fault_level" => Ok(SortField::FaultLevel),
            "confidence_score" => Ok(SortField::ConfidenceScore),
            other => Err(UnknownSortParam(other.to_string())),
        }
    }
}

impl FromStr for SortDir {
    type Err = UnknownSortParam;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDir::Asc),
            "desc" => Ok(SortDir::Desc),
            other => Err(UnknownSortParam(other.to_string())),
        }
    }
}

/// 排序状态（点击表头的行为）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub field: SortField,
    pub dir: SortDir,
}

impl SortState {
    /// 同一字段切换方向，换字段时重置为升序
    pub fn toggle(self, field: SortField) -> Self {
        if self.field == field {
            Self {
                field,
                dir: self.dir.toggled(),
            }
        } else {
            Self {
                field,
                dir: SortDir::Asc,
            }
        }
    }
}

/// 表格筛选条件，`None` 表示 "all"
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HitFilter {
    pub category: Option<String>,
    pub source: Option<String>,
}

impl HitFilter {
    /// 从界面参数构造，`"all"` 表示不过滤
    pub fn from_params(category: &str, source: &str) -> Self {
        let param = |v: &str| (v != "all").then(|| v.to_string());
        Self {
            category: param(category),
            source: param(source),
        }
    }

    pub fn matches(&self, hit: &Hit) -> bool {
        let category_ok = self.category.as_deref().map_or(true, |c| hit.category == c);
        let source_ok = self.source.as_deref().map_or(true, |s| hit.source.as_str() == s);
        category_ok && source_ok
    }
}

/// 筛选后稳定排序
///
/// 等级与置信度的 "asc" 把最严重、最可信的排在最前面。
pub fn filter_and_sort<'a>(hits: &[&'a Hit], filter: &HitFilter, sort: SortState) -> Vec<&'a Hit> {
    let mut rows: Vec<&Hit> = hits.iter().copied().filter(|h| filter.matches(h)).collect();
    rows.sort_by(|a, b| {
        let cmp = compare(a, b, sort.field);
        match sort.dir {
            SortDir::Asc => cmp,
            SortDir::Desc => cmp.reverse(),
        }
    });
    rows
}

fn compare(a: &Hit, b: &Hit, field: SortField) -> Ordering {
    match field {
        SortField::SentenceIdx => a.sentence_idx.cmp(&b.sentence_idx),
        SortField::FaultLevel => b.fault_level.weight().cmp(&a.fault_level.weight()),
        SortField::ConfidenceScore => b.confidence_score.total_cmp(&a.confidence_score),
    }
}

/// 出现过的分类（首次出现顺序，去重）
pub fn categories<'a>(hits: &[&'a Hit]) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    hits.iter()
        .map(|h| h.category.as_str())
        .filter(|c| seen.insert(*c))
        .collect()
}

// ========== 原文高亮 ==========

/// 高亮显示的等级开关
///
/// 至少保留一个等级处于开启状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityFilter {
    active: BTreeSet<FaultLevel>,
}

impl Default for SeverityFilter {
    fn default() -> Self {
        Self {
            active: FaultLevel::ALL.into_iter().collect(),
        }
    }
}

impl SeverityFilter {
    pub fn is_active(&self, level: FaultLevel) -> bool {
        self.active.contains(&level)
    }

    /// 切换等级；关闭最后一个开启的等级会被拒绝
    pub fn toggle(&mut self, level: FaultLevel) {
        if self.active.contains(&level) {
            if self.active.len() > 1 {
                self.active.remove(&level);
            }
        } else {
            self.active.insert(level);
        }
    }
}

/// 原文中的一个句子
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceView<'a> {
    pub idx: usize,
    pub text: &'a str,
    /// 有命中且其等级处于开启状态时才有值
    pub highlight: Option<Highlight>,
}

/// 高亮信息
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub severity: FaultLevel,
    /// 去重后格式化的分类，逗号连接
    pub categories: String,
    /// 每条命中的置信度百分比
    pub confidences: Vec<u32>,
}

/// 生成带高亮的句子列表
pub fn highlight_sentences<'a>(
    sentences: &'a [Sentence],
    index: &SentenceIndex<'_>,
    filter: &SeverityFilter,
) -> Vec<SentenceView<'a>> {
    sentences
        .iter()
        .map(|sentence| {
            let highlight = sentence_key(sentence).and_then(|key| index.get(&key)).and_then(|hits| {
                let severity = severity_of(hits)?;
                if !filter.is_active(severity) {
                    return None;
                }
                let categories = categories(hits)
                    .into_iter()
                    .map(format_category)
                    .collect::<Vec<_>>()
                    .join(", ");
                Some(Highlight {
                    severity,
                    categories,
                    confidences: hits.iter().map(|h| h.confidence_percent()).collect(),
                })
            });
            SentenceView {
                idx: sentence.idx,
                text: &sentence.text,
                highlight,
            }
        })
        .collect()
}

/// 句子在索引中的键
fn sentence_key(sentence: &Sentence) -> Option<i64> {
    i64::try_from(sentence.idx).ok()
}

// ========== 数据核对 ==========

/// 输入数据中的不一致（只报告，不修正）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    /// 命中指向不存在的句子
    SentenceOutOfRange { sentence_idx: i64, total_sentences: usize },
    /// summary 计数与命中数不一致
    SummaryMismatch {
        category: String,
        summary: u64,
        hits: u64,
    },
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::SentenceOutOfRange {
                sentence_idx,
                total_sentences,
            } => write!(
                f,
                "命中指向句子 {}，但只有 {} 个句子",
                sentence_idx, total_sentences
            ),
            Discrepancy::SummaryMismatch {
                category,
                summary,
                hits,
            } => write!(
                f,
                "分类 {} 的汇总计数为 {}，实际命中 {} 条",
                category, summary, hits
            ),
        }
    }
}

/// 核对命中与句子、汇总计数
pub fn audit(result: &EvaluationResult) -> Vec<Discrepancy> {
    let total_sentences = result.total_sentences();
    let known: HashSet<i64> = result.sentences().iter().filter_map(sentence_key).collect();
    let merged = merged_hits(result);

    let mut issues = Vec::new();
    let mut reported = HashSet::new();
    for hit in &merged {
        if !known.contains(&hit.sentence_idx) && reported.insert(hit.sentence_idx) {
            issues.push(Discrepancy::SentenceOutOfRange {
                sentence_idx: hit.sentence_idx,
                total_sentences,
            });
        }
    }

    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for hit in &merged {
        *counts.entry(hit.category.as_str()).or_default() += 1;
    }
    let all_categories: BTreeSet<&str> = counts
        .keys()
        .copied()
        .chain(result.summary.keys().map(String::as_str))
        .collect();
    for category in all_categories {
        let summary = result.summary.get(category).copied().unwrap_or(0);
        let hits = counts.get(category).copied().unwrap_or(0);
        if summary != hits {
            issues.push(Discrepancy::SummaryMismatch {
                category: category.to_string(),
                summary,
                hits,
            });
        }
    }

    issues
}
