pub mod aggregation;
pub mod report;

pub use aggregation::{
    audit, categories, compliance_score, filter_and_sort, highlight_sentences, index_by_sentence,
    merge, merged_hits, severity_of, ComplianceBand, Discrepancy, HitFilter,
    SeverityFilter, SortDir, SortField, SortState,
};
pub use report::{ComplianceReport, ReportOptions};
