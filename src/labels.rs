use crate::config::validate_horizon;
use crate::error::{DatasetError, Result};
use crate::frame::{
    column_names, i64_values, null_count, require_absent, require_columns, select_columns,
    string_values, ROW_INDEX,
};
use crate::report::{missing_percentage, DuplicateYears, LabelReport};
use crate::schema::{FISCAL_DATE_ENDING, FUTURE_EPS, REPORTED_EPS, SYMBOL, YEAR};
use log::{debug, info};
use polars::prelude::*;

const MERGED: &str = "merged";
const RECORDS: &str = "records";
const DISTINCT_YEARS: &str = "distinct_years";

/// Turns merged records into a labeled set: one record per (symbol, year)
/// carrying the EPS reported `horizon_years` later as `futureEPS`.
pub struct LabelBuilder {
    horizon_years: u32,
}

impl LabelBuilder {
    pub fn new(horizon_years: u32) -> Result<Self> {
        validate_horizon(horizon_years)?;
        Ok(Self { horizon_years })
    }

    pub fn horizon_years(&self) -> u32 {
        self.horizon_years
    }

    pub fn build(&self, records: DataFrame) -> Result<(DataFrame, LabelReport)> {
        info!(
            "Creating target variable with a {} year horizon",
            self.horizon_years
        );

        let input_rows = records.height();
        let records = Self::normalize_year(records)?;
        let duplicated_entities = find_duplicate_years(&records)?;
        let (records, aggregation_required) = Self::detect_and_deduplicate(records)?;
        let labeled = Self::build_target(records, self.horizon_years)?;

        let missing_future_eps = null_count(&labeled, FUTURE_EPS)?;
        let report = LabelReport {
            horizon_years: self.horizon_years,
            input_rows,
            aggregation_required,
            duplicated_entities,
            output_rows: labeled.height(),
            missing_future_eps,
            missing_future_eps_pct: missing_percentage(missing_future_eps, labeled.height()),
        };

        info!(
            "Labeled {} records, {} without a future EPS",
            report.output_rows, report.missing_future_eps
        );
        Ok((labeled, report))
    }

    /// Sets `year` from the first four characters of `fiscalDateEnding`,
    /// replacing any existing `year` column.
    pub fn normalize_year(records: DataFrame) -> Result<DataFrame> {
        require_columns(&records, MERGED, &[SYMBOL, FISCAL_DATE_ENDING])?;

        let mut columns: Vec<String> = column_names(&records)
            .into_iter()
            .filter(|c| c != YEAR)
            .collect();
        columns.push(YEAR.to_string());

        let with_year = records.lazy().with_column(
            col(FISCAL_DATE_ENDING)
                .cast(DataType::String)
                .str()
                .slice(lit(0), lit(4))
                .cast(DataType::Int64)
                .alias(YEAR),
        );
        let with_year = select_columns(with_year, &columns).collect()?;

        let invalid = with_year
            .clone()
            .lazy()
            .filter(col(YEAR).is_null())
            .limit(1)
            .collect()?;
        if invalid.height() > 0 {
            let first = |name: &str| -> Result<String> {
                Ok(string_values(&invalid, name)?
                    .into_iter()
                    .next()
                    .flatten()
                    .unwrap_or_default())
            };
            return Err(DatasetError::InvalidPeriod {
                entity: first(SYMBOL)?,
                value: first(FISCAL_DATE_ENDING)?,
            });
        }

        Ok(with_year)
    }

    /// Collapses records sharing (symbol, year) when any entity repeats a
    /// year. Every other column keeps its maximum (lexicographic for text,
    /// missing values skipped). Without repeats the records pass through
    /// untouched. The flag reports whether aggregation happened.
    pub fn detect_and_deduplicate(records: DataFrame) -> Result<(DataFrame, bool)> {
        let duplicates = find_duplicate_years(&records)?;
        if duplicates.is_empty() {
            debug!("No duplicate (symbol, year) found");
            return Ok((records, false));
        }

        for dup in &duplicates {
            debug!(
                "symbol: {} | records: {} | distinct years: {} | duplicate(s): {}",
                dup.entity, dup.records, dup.distinct_years, dup.duplicates
            );
        }

        let input_rows = records.height();
        let columns = column_names(&records);
        let aggs: Vec<Expr> = columns
            .iter()
            .filter(|c| c.as_str() != SYMBOL && c.as_str() != YEAR)
            .map(|c| col(c.as_str()).max())
            .collect();

        let grouped = records
            .lazy()
            .group_by([col(SYMBOL), col(YEAR)])
            .agg(aggs)
            .sort([SYMBOL, YEAR], Default::default());
        let aggregated = select_columns(grouped, &columns).collect()?;

        info!(
            "Aggregated {} records into {} (symbol, year) groups",
            input_rows,
            aggregated.height()
        );
        Ok((aggregated, true))
    }

    /// Left-joins each record with the EPS its entity reported
    /// `horizon_years` later, stored as `futureEPS`.
    pub fn build_target(records: DataFrame, horizon_years: u32) -> Result<DataFrame> {
        validate_horizon(horizon_years)?;
        require_columns(&records, MERGED, &[SYMBOL, YEAR, REPORTED_EPS])?;
        require_absent(&records, MERGED, &[FUTURE_EPS])?;

        let mut columns = column_names(&records);
        columns.push(FUTURE_EPS.to_string());

        let shifted = records
            .clone()
            .lazy()
            .select([
                col(SYMBOL),
                (col(YEAR).cast(DataType::Int64) - lit(i64::from(horizon_years))).alias(YEAR),
                col(REPORTED_EPS).alias(FUTURE_EPS),
            ])
            .group_by_stable([col(SYMBOL), col(YEAR)])
            .agg([col(FUTURE_EPS).first()]);

        let joined = records
            .lazy()
            .with_row_index(ROW_INDEX, None)
            .with_column(col(YEAR).cast(DataType::Int64))
            .join(
                shifted,
                [col(SYMBOL), col(YEAR)],
                [col(SYMBOL), col(YEAR)],
                JoinArgs::new(JoinType::Left),
            )
            .sort([ROW_INDEX], Default::default());

        Ok(select_columns(joined, &columns).collect()?)
    }
}

/// Entities whose records repeat a year, in order of first appearance.
pub fn find_duplicate_years(records: &DataFrame) -> Result<Vec<DuplicateYears>> {
    require_columns(records, MERGED, &[SYMBOL, YEAR])?;

    let summary = records
        .clone()
        .lazy()
        .group_by_stable([col(SYMBOL)])
        .agg([
            len().alias(RECORDS),
            col(YEAR).n_unique().alias(DISTINCT_YEARS),
        ])
        .filter(col(RECORDS).neq(col(DISTINCT_YEARS)))
        .collect()?;

    let entities = string_values(&summary, SYMBOL)?;
    let counts = i64_values(&summary, RECORDS)?;
    let distinct = i64_values(&summary, DISTINCT_YEARS)?;

    Ok(entities
        .into_iter()
        .zip(counts)
        .zip(distinct)
        .map(|((entity, records), distinct_years)| {
            let records = records.unwrap_or_default() as usize;
            let distinct_years = distinct_years.unwrap_or_default() as usize;
            DuplicateYears {
                entity: entity.unwrap_or_default(),
                records,
                distinct_years,
                duplicates: records - distinct_years,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(rows: &[(&str, &str, f64, Option<f64>)]) -> DataFrame {
        df!(
            SYMBOL => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
            FISCAL_DATE_ENDING => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
            "totalAssets" => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
            REPORTED_EPS => rows.iter().map(|r| r.3).collect::<Vec<_>>()
        )
        .unwrap()
    }

    fn float(df: &DataFrame, column: &str, row: usize) -> Option<f64> {
        df.column(column).unwrap().f64().unwrap().get(row)
    }

    #[test]
    fn test_normalize_year() {
        let out = LabelBuilder::normalize_year(records(&[("X", "2019-06-30", 1.0, None)])).unwrap();
        assert_eq!(out.column(YEAR).unwrap().i64().unwrap().get(0), Some(2019));
        assert_eq!(column_names(&out).last().map(String::as_str), Some(YEAR));
    }

    #[test]
    fn test_normalize_year_rejects_bad_period() {
        let result = LabelBuilder::normalize_year(records(&[
            ("X", "2019-06-30", 1.0, None),
            ("Y", "FY19", 1.0, None),
        ]));
        match result {
            Err(DatasetError::InvalidPeriod { entity, value }) => {
                assert_eq!(entity, "Y");
                assert_eq!(value, "FY19");
            }
            other => panic!("expected invalid period, got {:?}", other),
        }
    }

    #[test]
    fn test_aggregation_takes_column_maximum() {
        let recs = LabelBuilder::normalize_year(records(&[
            ("X", "2020-03-31", 100.0, Some(1.0)),
            ("X", "2020-12-31", 150.0, Some(0.5)),
            ("Y", "2020-12-31", 10.0, None),
        ]))
        .unwrap();

        let (out, aggregated) = LabelBuilder::detect_and_deduplicate(recs).unwrap();
        assert!(aggregated);
        assert_eq!(out.height(), 2);
        assert_eq!(float(&out, "totalAssets", 0), Some(150.0));
        assert_eq!(float(&out, REPORTED_EPS, 0), Some(1.0));
        assert_eq!(
            out.column(FISCAL_DATE_ENDING).unwrap().str().unwrap().get(0),
            Some("2020-12-31")
        );
        assert_eq!(float(&out, REPORTED_EPS, 1), None);
    }

    #[test]
    fn test_deduplicate_is_idempotent() {
        let recs = LabelBuilder::normalize_year(records(&[
            ("X", "2020-03-31", 100.0, Some(1.0)),
            ("X", "2020-12-31", 150.0, Some(0.5)),
            ("X", "2021-12-31", 170.0, Some(2.0)),
        ]))
        .unwrap();

        let (once, first) = LabelBuilder::detect_and_deduplicate(recs).unwrap();
        let (twice, second) = LabelBuilder::detect_and_deduplicate(once.clone()).unwrap();
        assert!(first);
        assert!(!second);
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_no_duplicates_pass_through() {
        let recs = LabelBuilder::normalize_year(records(&[
            ("X", "2021-12-31", 1.0, None),
            ("X", "2020-12-31", 2.0, None),
        ]))
        .unwrap();

        let (out, aggregated) = LabelBuilder::detect_and_deduplicate(recs.clone()).unwrap();
        assert!(!aggregated);
        assert!(out.equals_missing(&recs));
    }

    #[test]
    fn test_build_target_shifts_by_horizon() {
        let recs = LabelBuilder::normalize_year(records(&[
            ("X", "2019-12-31", 1.0, Some(1.0)),
            ("X", "2020-12-31", 1.0, Some(1.5)),
        ]))
        .unwrap();

        let out = LabelBuilder::build_target(recs, 1).unwrap();
        assert_eq!(float(&out, FUTURE_EPS, 0), Some(1.5));
        assert_eq!(float(&out, FUTURE_EPS, 1), None);
    }

    #[test]
    fn test_build_target_multi_year_horizon() {
        let recs = LabelBuilder::normalize_year(records(&[
            ("X", "2018-12-31", 1.0, Some(1.0)),
            ("X", "2019-12-31", 1.0, Some(2.0)),
            ("X", "2020-12-31", 1.0, Some(3.0)),
            ("Y", "2020-12-31", 1.0, Some(9.0)),
        ]))
        .unwrap();

        let out = LabelBuilder::build_target(recs, 2).unwrap();
        assert_eq!(out.height(), 4);
        assert_eq!(float(&out, FUTURE_EPS, 0), Some(3.0));
        assert_eq!(float(&out, FUTURE_EPS, 1), None);
        assert_eq!(float(&out, FUTURE_EPS, 3), None);
    }

    #[test]
    fn test_zero_horizon_rejected() {
        assert!(matches!(
            LabelBuilder::new(0),
            Err(DatasetError::InvalidHorizon(0))
        ));
    }

    #[test]
    fn test_build_reports_duplicates() {
        let builder = LabelBuilder::new(1).unwrap();
        let (out, report) = builder
            .build(records(&[
                ("X", "2020-03-31", 100.0, Some(1.0)),
                ("X", "2020-12-31", 150.0, Some(1.2)),
                ("X", "2021-12-31", 170.0, Some(2.0)),
            ]))
            .unwrap();

        assert_eq!(out.height(), 2);
        assert!(report.aggregation_required);
        assert_eq!(report.duplicated_entities.len(), 1);
        assert_eq!(report.duplicated_entities[0].entity, "X");
        assert_eq!(report.duplicated_entities[0].records, 3);
        assert_eq!(report.duplicated_entities[0].duplicates, 1);
        assert_eq!(report.missing_future_eps, 1);
        assert_eq!(float(&out, FUTURE_EPS, 0), Some(2.0));
    }
}
