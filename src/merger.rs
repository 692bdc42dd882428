use crate::config::EpsTieBreak;
use crate::error::Result;
use crate::frame::{
    column_names, count_duplicate_keys, null_count, require_absent, require_columns,
    select_columns, ROW_INDEX,
};
use crate::report::{missing_percentage, MergeReport, TierReport};
use crate::schema::*;
use log::{debug, info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const MERGED: &str = "merged";
const TIER_KEY: &str = "__tier_key";
const TIER_EPS: &str = "__tier_eps";
const MATCHED: &str = "__matched";

/// Date-key granularity used to match earnings to statement periods,
/// ordered strict to loose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchTier {
    /// Full `YYYY-MM-DD` period end.
    Exact,
    /// `YYYY-MM` prefix.
    YearMonth,
    /// `YYYY` prefix.
    Year,
}

impl MatchTier {
    pub const ALL: [MatchTier; 3] = [MatchTier::Exact, MatchTier::YearMonth, MatchTier::Year];

    /// Number of leading characters compared at this tier, `None` for the
    /// whole value.
    pub fn prefix_len(&self) -> Option<i64> {
        match self {
            MatchTier::Exact => None,
            MatchTier::YearMonth => Some(7),
            MatchTier::Year => Some(4),
        }
    }

    /// The part of a period end compared at this tier. Shorter strings are
    /// used whole.
    pub fn date_key(&self, period_end: Expr) -> Expr {
        let text = period_end.cast(DataType::String);
        match self.prefix_len() {
            None => text,
            Some(len) => text.str().slice(lit(0), lit(len)),
        }
    }
}

/// Combines the statement, earnings and overview tables into one record per
/// (symbol, fiscalDateEnding).
pub struct SourceMerger {
    tie_break: EpsTieBreak,
}

impl Default for SourceMerger {
    fn default() -> Self {
        Self::new(EpsTieBreak::default())
    }
}

impl SourceMerger {
    pub fn new(tie_break: EpsTieBreak) -> Self {
        Self { tie_break }
    }

    pub fn merge(&self, sources: SourceTables) -> Result<(DataFrame, MergeReport)> {
        sources.validate()?;

        let SourceTables {
            balance_sheet,
            income_statement,
            earnings,
            overview,
        } = sources;

        let mut report = MergeReport {
            balance_sheet_rows: balance_sheet.height(),
            income_statement_rows: income_statement.height(),
            duplicate_statement_keys: count_duplicate_keys(&balance_sheet, BALANCE_SHEET, &STATEMENT_KEY)?
                + count_duplicate_keys(&income_statement, INCOME_STATEMENT, &STATEMENT_KEY)?,
            ..Default::default()
        };

        info!(
            "Merging {} balance sheet rows with {} income statement rows",
            report.balance_sheet_rows, report.income_statement_rows
        );
        if report.duplicate_statement_keys > 0 {
            warn!(
                "Statements repeat {} (symbol, fiscalDateEnding) key(s); first occurrences are kept",
                report.duplicate_statement_keys
            );
        }

        let records = self.merge_statements(balance_sheet, income_statement)?;
        report.statement_rows = records.height();
        if records.height() == 0 {
            warn!("Statement join produced no rows");
            report.empty_result = true;
        }

        let (records, tiers) = self.attach_eps(records, &earnings)?;
        report.tiers = tiers;

        report.missing_eps = null_count(&records, REPORTED_EPS)?;
        report.missing_eps_pct = missing_percentage(report.missing_eps, records.height());
        if report.missing_eps > 0 {
            warn!(
                "{} record(s) ({}%) have no reported EPS after all match tiers",
                report.missing_eps, report.missing_eps_pct
            );
        }

        report.entities_without_metadata = entities_without_metadata(&records, &overview)?;
        let records = self.attach_metadata(records, &overview)?;

        info!(
            "Merged {} records, {}% missing EPS",
            records.height(),
            report.missing_eps_pct
        );

        Ok((records, report))
    }

    /// Inner join of the two statements on (symbol, fiscalDateEnding).
    ///
    /// Currency columns are dropped from both sides first. Other non-key
    /// columns present on both sides are suffixed `_x` / `_y`. Only the first
    /// row for a repeated key in either table takes part in the join, and
    /// rows keep balance-sheet order.
    pub fn merge_statements(
        &self,
        balance_sheet: DataFrame,
        income_statement: DataFrame,
    ) -> Result<DataFrame> {
        require_columns(&balance_sheet, BALANCE_SHEET, &STATEMENT_KEY)?;
        require_columns(&income_statement, INCOME_STATEMENT, &STATEMENT_KEY)?;

        let left_values = value_columns(&balance_sheet);
        let right_values = value_columns(&income_statement);
        let overlapping: HashSet<String> = left_values
            .iter()
            .filter(|c| right_values.contains(c))
            .cloned()
            .collect();
        if !overlapping.is_empty() {
            debug!("Suffixing overlapping statement columns: {:?}", overlapping);
        }

        let suffixed = |name: &str, suffix: &str| {
            if overlapping.contains(name) {
                format!("{}{}", name, suffix)
            } else {
                name.to_string()
            }
        };

        let mut left_aggs: Vec<Expr> = left_values
            .iter()
            .map(|c| col(c.as_str()).first().alias(suffixed(c, LEFT_SUFFIX)))
            .collect();
        left_aggs.push(col(ROW_INDEX).first());
        let right_aggs: Vec<Expr> = right_values
            .iter()
            .map(|c| col(c.as_str()).first().alias(suffixed(c, RIGHT_SUFFIX)))
            .collect();

        let mut columns: Vec<String> = column_names(&balance_sheet)
            .into_iter()
            .filter(|c| c != REPORTED_CURRENCY)
            .map(|c| suffixed(&c, LEFT_SUFFIX))
            .collect();
        columns.extend(right_values.iter().map(|c| suffixed(c, RIGHT_SUFFIX)));

        let left = balance_sheet
            .lazy()
            .with_row_index(ROW_INDEX, None)
            .group_by_stable(key_exprs(&STATEMENT_KEY))
            .agg(left_aggs);
        let right = income_statement
            .lazy()
            .group_by_stable(key_exprs(&STATEMENT_KEY))
            .agg(right_aggs);

        let joined = left
            .join(
                right,
                key_exprs(&STATEMENT_KEY),
                key_exprs(&STATEMENT_KEY),
                JoinArgs::new(JoinType::Inner),
            )
            .sort([ROW_INDEX], Default::default());

        let merged = select_columns(joined, &columns).collect()?;
        debug!("Statement join kept {} rows", merged.height());
        Ok(merged)
    }

    /// Resolves `reportedEPS` through the exact, year-month and year tiers.
    /// A tier only fills records left empty by the stricter ones, and no tier
    /// removes records.
    pub fn attach_eps(
        &self,
        records: DataFrame,
        earnings: &DataFrame,
    ) -> Result<(DataFrame, Vec<TierReport>)> {
        require_columns(&records, MERGED, &STATEMENT_KEY)?;
        require_absent(&records, MERGED, &[REPORTED_EPS])?;
        require_columns(earnings, EARNINGS, &EARNINGS_COLUMNS)?;

        let mut columns = column_names(&records);
        columns.push(REPORTED_EPS.to_string());

        let mut resolved = records
            .lazy()
            .with_column(lit(NULL).cast(DataType::Float64).alias(REPORTED_EPS))
            .collect()?;
        let mut reports = Vec::with_capacity(MatchTier::ALL.len());

        for tier in MatchTier::ALL {
            let missing_before = null_count(&resolved, REPORTED_EPS)?;

            let joined = resolved
                .lazy()
                .with_row_index(ROW_INDEX, None)
                .with_column(tier.date_key(col(FISCAL_DATE_ENDING)).alias(TIER_KEY))
                .join(
                    self.earnings_lookup(earnings, tier),
                    [col(SYMBOL), col(TIER_KEY)],
                    [col(SYMBOL), col(TIER_KEY)],
                    JoinArgs::new(JoinType::Left),
                )
                .with_column(col(REPORTED_EPS).fill_null(col(TIER_EPS)))
                .sort([ROW_INDEX], Default::default());
            resolved = select_columns(joined, &columns).collect()?;

            let missing_after = null_count(&resolved, REPORTED_EPS)?;
            let missing_pct = missing_percentage(missing_after, resolved.height());
            let filled = missing_before - missing_after;
            debug!(
                "{:?} tier filled {} record(s), {}% still missing",
                tier, filled, missing_pct
            );
            reports.push(TierReport {
                tier,
                filled,
                missing_after,
                missing_pct,
            });
        }

        Ok((resolved, reports))
    }

    /// Adds `Sector` and `Industry` by symbol. When the overview repeats a
    /// symbol, its first row wins.
    pub fn attach_metadata(&self, records: DataFrame, overview: &DataFrame) -> Result<DataFrame> {
        require_columns(&records, MERGED, &[SYMBOL])?;
        require_absent(&records, MERGED, &[SECTOR, INDUSTRY])?;
        require_columns(overview, OVERVIEW, &OVERVIEW_COLUMNS)?;

        let mut columns = column_names(&records);
        columns.extend([SECTOR.to_string(), INDUSTRY.to_string()]);

        let lookup = overview
            .clone()
            .lazy()
            .filter(col(SYMBOL).is_not_null())
            .group_by_stable([col(SYMBOL)])
            .agg([col(SECTOR).first(), col(INDUSTRY).first()]);

        let joined = records
            .lazy()
            .with_row_index(ROW_INDEX, None)
            .join(
                lookup,
                [col(SYMBOL)],
                [col(SYMBOL)],
                JoinArgs::new(JoinType::Left),
            )
            .sort([ROW_INDEX], Default::default());

        Ok(select_columns(joined, &columns).collect()?)
    }

    /// One EPS per (symbol, tier key). Missing and NaN EPS never take part,
    /// so an empty exact-date row cannot shadow a looser match.
    fn earnings_lookup(&self, earnings: &DataFrame, tier: MatchTier) -> LazyFrame {
        let pick = match self.tie_break {
            EpsTieBreak::Maximum => col(TIER_EPS).max(),
            EpsTieBreak::FirstSeen => col(TIER_EPS).first(),
        };

        earnings
            .clone()
            .lazy()
            .select([
                col(SYMBOL),
                tier.date_key(col(FISCAL_DATE_ENDING)).alias(TIER_KEY),
                col(REPORTED_EPS)
                    .cast(DataType::Float64)
                    .fill_nan(lit(NULL))
                    .alias(TIER_EPS),
            ])
            .filter(col(TIER_EPS).is_not_null())
            .group_by_stable([col(SYMBOL), col(TIER_KEY)])
            .agg([pick])
    }
}

fn key_exprs(names: &[&str]) -> Vec<Expr> {
    names.iter().map(|name| col(*name)).collect()
}

/// Non-key, non-currency columns of a statement table, in table order.
fn value_columns(df: &DataFrame) -> Vec<String> {
    column_names(df)
        .into_iter()
        .filter(|c| !STATEMENT_KEY.contains(&c.as_str()) && c != REPORTED_CURRENCY)
        .collect()
}

/// Distinct symbols in `records` that the overview has no row for.
fn entities_without_metadata(records: &DataFrame, overview: &DataFrame) -> Result<usize> {
    let known = overview
        .clone()
        .lazy()
        .filter(col(SYMBOL).is_not_null())
        .group_by([col(SYMBOL)])
        .agg([len().alias(MATCHED)]);

    let unmatched = records
        .clone()
        .lazy()
        .filter(col(SYMBOL).is_not_null())
        .group_by([col(SYMBOL)])
        .agg([len().alias("records")])
        .join(
            known,
            [col(SYMBOL)],
            [col(SYMBOL)],
            JoinArgs::new(JoinType::Left),
        )
        .filter(col(MATCHED).is_null())
        .collect()?;

    Ok(unmatched.height())
}
