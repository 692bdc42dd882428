use crate::merger::MatchTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Share of `missing` in `total` as a percentage rounded to two decimals.
/// An empty set has nothing missing.
pub fn missing_percentage(missing: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = 100.0 * missing as f64 / total as f64;
    (pct * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierReport {
    pub tier: MatchTier,
    /// Records that received a value at this tier.
    pub filled: usize,
    /// Records still missing `reportedEPS` after this tier.
    pub missing_after: usize,
    pub missing_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MergeReport {
    pub balance_sheet_rows: usize,
    pub income_statement_rows: usize,
    /// Rows surviving the balance sheet / income statement join.
    pub statement_rows: usize,
    /// Repeated (symbol, fiscalDateEnding) keys across both statement tables.
    pub duplicate_statement_keys: usize,
    pub tiers: Vec<TierReport>,
    pub missing_eps: usize,
    pub missing_eps_pct: f64,
    pub entities_without_metadata: usize,
    /// The statement join produced no rows at all.
    pub empty_result: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateYears {
    pub entity: String,
    pub records: usize,
    pub distinct_years: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelReport {
    pub horizon_years: u32,
    pub input_rows: usize,
    pub aggregation_required: bool,
    pub duplicated_entities: Vec<DuplicateYears>,
    pub output_rows: usize,
    pub missing_future_eps: usize,
    pub missing_future_eps_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub generated_at: DateTime<Utc>,
    pub merge: MergeReport,
    pub labels: LabelReport,
}

impl DatasetReport {
    pub fn new(merge: MergeReport, labels: LabelReport) -> Self {
        Self {
            generated_at: Utc::now(),
            merge,
            labels,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} merged rows ({:.2}% missing EPS), {} labeled rows ({:.2}% missing future EPS, horizon {} year(s), aggregation {})",
            self.merge.statement_rows,
            self.merge.missing_eps_pct,
            self.labels.output_rows,
            self.labels.missing_future_eps_pct,
            self.labels.horizon_years,
            if self.labels.aggregation_required {
                "applied"
            } else {
                "not required"
            }
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
