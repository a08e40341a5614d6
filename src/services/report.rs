//! 合规报告 - 业务能力层
//!
//! 把聚合引擎的各个投影组装成一份报告，并渲染为纯文本

use chrono::{DateTime, Local};
use phf::phf_map;
use std::fmt::Write as _;
use tracing::warn;

use crate::config::Config;
use crate::models::{EvaluationResult, FaultLevel};
use crate::services::aggregation::{
    audit, compliance_score, filter_and_sort, highlight_sentences, index_by_sentence, merged_hits,
    ComplianceBand, Discrepancy, Highlight, HitFilter, SeverityFilter, SortDir, SortField,
    SortState,
};
use crate::utils::format::format_category;

/// 已知分类的图标，其余使用默认图标
static CATEGORY_ICONS: phf::Map<&'static str, &'static str> = phf_map! {
    "job_demeaning" => "💼",
    "earnings" => "💰",
    "lifestyle" => "🚀",
};

const DEFAULT_ICON: &str = "⚠️";

pub fn category_icon(category: &str) -> &'static str {
    CATEGORY_ICONS.get(category).copied().unwrap_or(DEFAULT_ICON)
}

/// 报告视图参数
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub filter: HitFilter,
    pub sort: SortState,
    pub severity: SeverityFilter,
}

impl ReportOptions {
    /// 从配置读取表格筛选与排序，无法识别的值回退为默认并记录警告
    pub fn from_config(config: &Config) -> Self {
        let field = config.sort_field.parse::<SortField>().unwrap_or_else(|e| {
            warn!("{}，使用 sentence_idx", e);
            SortField::default()
        });
        let dir = config.sort_dir.parse::<SortDir>().unwrap_or_else(|e| {
            warn!("{}，使用 asc", e);
            SortDir::default()
        });
        Self {
            filter: HitFilter::from_params(&config.category_filter, &config.source_filter),
            sort: SortState { field, dir },
            severity: SeverityFilter::default(),
        }
    }
}

/// 汇总卡片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryCard {
    pub category: String,
    pub label: String,
    pub icon: &'static str,
    pub count: u64,
}

/// 表格中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct HitRow {
    /// 从 1 开始的句子编号
    /// 从 1 开始；越界的命中原样换算，可能不大于 0
    pub sentence_number: i64,
    pub text: String,
    pub category: String,
    pub level: FaultLevel,
    pub confidence_percent: u32,
    pub source: &'static str,
}

/// 原文中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptLine {
    pub sentence_number: usize,
    pub text: String,
    pub highlight: Option<Highlight>,
}

/// 完整报告
#[derive(Debug, Clone)]
pub struct ComplianceReport {
    pub file_name: String,
    pub generated_at: DateTime<Local>,
    pub score: u8,
    pub band: ComplianceBand,
    pub total_sentences: usize,
    pub flagged_sentences: usize,
    pub total_hits: usize,
    pub summary: Vec<SummaryCard>,
    pub rows: Vec<HitRow>,
    pub transcript: Vec<TranscriptLine>,
    pub discrepancies: Vec<Discrepancy>,
}

impl ComplianceReport {
    pub fn build(result: &EvaluationResult, file_name: &str, options: &ReportOptions) -> Self {
        let merged = merged_hits(result);
        let index = index_by_sentence(&merged);
        let total_sentences = result.total_sentences();
        let score = compliance_score(total_sentences, index.len());

        let summary = result
            .summary
            .iter()
            .map(|(category, count)| SummaryCard {
                category: category.clone(),
                label: format_category(category),
                icon: category_icon(category),
                count: *count,
            })
            .collect();

        let rows = filter_and_sort(&merged, &options.filter, options.sort)
            .into_iter()
            .map(|hit| HitRow {
                sentence_number: hit.sentence_idx.saturating_add(1),
                text: hit.text.clone(),
                category: format_category(&hit.category),
                level: hit.fault_level,
                confidence_percent: hit.confidence_percent(),
                source: hit.source.label(),
            })
            .collect();

        let transcript = highlight_sentences(result.sentences(), &index, &options.severity)
            .into_iter()
            .map(|view| TranscriptLine {
                sentence_number: view.idx + 1,
                text: view.text.to_string(),
                highlight: view.highlight,
            })
            .collect();

        Self {
            file_name: file_name.to_string(),
            generated_at: Local::now(),
            score,
            band: ComplianceBand::from_score(score),
            total_sentences,
            flagged_sentences: index.len(),
            total_hits: merged.len(),
            summary,
            rows,
            transcript,
            discrepancies: audit(result),
        }
    }

    /// 渲染为纯文本
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let thin = "─".repeat(60);

        let band = match self.band {
            ComplianceBand::Good => "🟢",
            ComplianceBand::Warning => "🟡",
            ComplianceBand::Poor => "🔴",
        };

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "合规分析报告 - {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "文件: {}", self.file_name);
        let _ = writeln!(
            out,
            "{} 合规分数: {}% ({} 个句子, {} 个被标记)",
            band, self.score, self.total_sentences, self.flagged_sentences
        );
        let _ = writeln!(out, "🚩 命中总数: {}", self.total_hits);
        for card in &self.summary {
            let _ = writeln!(out, "{} {}: {}", card.icon, card.label, card.count);
        }

        let _ = writeln!(out, "\n{}", thin);
        let _ = writeln!(out, "标记项 ({} / {})", self.rows.len(), self.total_hits);
        let _ = writeln!(out, "{}", thin);
        if self.total_hits == 0 {
            let _ = writeln!(out, "✅ 未发现合规问题");
        } else if self.rows.is_empty() {
            let _ = writeln!(out, "没有符合当前筛选条件的项");
        }
        for row in &self.rows {
            let _ = writeln!(
                out,
                "#{:<4} {:<6} {:>3}% {:<5} {} | {}",
                row.sentence_number, row.level, row.confidence_percent, row.source, row.category, row.text
            );
        }

        let _ = writeln!(out, "\n{}", thin);
        let _ = writeln!(out, "完整原文");
        let _ = writeln!(out, "{}", thin);
        for line in &self.transcript {
            match &line.highlight {
                Some(hl) => {
                    let confidences = hl
                        .confidences
                        .iter()
                        .map(|c| format!("{}%", c))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let _ = writeln!(
                        out,
                        "[S{} {}] {}  <{} | {}>",
                        line.sentence_number, hl.severity, line.text, hl.categories, confidences
                    );
                }
                None => {
                    let _ = writeln!(out, "      {}", line.text);
                }
            }
        }

        if !self.discrepancies.is_empty() {
            let _ = writeln!(out, "\n{}", thin);
            let _ = writeln!(out, "⚠️ 数据不一致");
            for issue in &self.discrepancies {
                let _ = writeln!(out, "- {}", issue);
            }
        }

        out
    }
}
