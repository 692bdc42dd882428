use crate::error::Result;
use crate::frame::require_columns;
use polars::prelude::DataFrame;

/// Entity identifier shared by every source.
pub const SYMBOL: &str = "symbol";
/// Fiscal period end date, `YYYY-MM-DD`.
pub const FISCAL_DATE_ENDING: &str = "fiscalDateEnding";
pub const REPORTED_CURRENCY: &str = "reportedCurrency";
pub const REPORTED_EPS: &str = "reportedEPS";
pub const SECTOR: &str = "Sector";
pub const INDUSTRY: &str = "Industry";

pub const YEAR: &str = "year";
pub const FUTURE_EPS: &str = "futureEPS";

pub const BALANCE_SHEET: &str = "balance_sheet";
pub const INCOME_STATEMENT: &str = "income_statement";
pub const EARNINGS: &str = "earnings";
pub const OVERVIEW: &str = "overview";

/// Suffixes for non-key columns present in both statement tables.
pub const LEFT_SUFFIX: &str = "_x";
pub const RIGHT_SUFFIX: &str = "_y";

pub const STATEMENT_KEY: [&str; 2] = [SYMBOL, FISCAL_DATE_ENDING];
pub const EARNINGS_COLUMNS: [&str; 3] = [SYMBOL, FISCAL_DATE_ENDING, REPORTED_EPS];
pub const OVERVIEW_COLUMNS: [&str; 3] = [SYMBOL, SECTOR, INDUSTRY];

/// Columns always read as text, whatever their cells look like.
pub const KEY_COLUMNS: [&str; 2] = [SYMBOL, FISCAL_DATE_ENDING];

/// The four parsed input tables, handed over by value to the merge stage.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub balance_sheet: DataFrame,
    pub income_statement: DataFrame,
    pub earnings: DataFrame,
    pub overview: DataFrame,
}

impl SourceTables {
    pub fn new(
        balance_sheet: DataFrame,
        income_statement: DataFrame,
        earnings: DataFrame,
        overview: DataFrame,
    ) -> Self {
        Self {
            balance_sheet,
            income_statement,
            earnings,
            overview,
        }
    }

    /// Checks every column the merge consumes, so that a schema problem
    /// surfaces before any join runs.
    pub fn validate(&self) -> Result<()> {
        require_columns(&self.balance_sheet, BALANCE_SHEET, &STATEMENT_KEY)?;
        require_columns(&self.income_statement, INCOME_STATEMENT, &STATEMENT_KEY)?;
        require_columns(&self.earnings, EARNINGS, &EARNINGS_COLUMNS)?;
        require_columns(&self.overview, OVERVIEW, &OVERVIEW_COLUMNS)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatasetError;
    use polars::prelude::{Column, DataType};

    fn empty(columns: &[&str]) -> DataFrame {
        DataFrame::new(
            columns
                .iter()
                .map(|c| Column::new_empty((*c).into(), &DataType::String))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_validate_names_offending_table() {
        let sources = SourceTables::new(
            empty(&[SYMBOL, FISCAL_DATE_ENDING]),
            empty(&[SYMBOL, FISCAL_DATE_ENDING]),
            empty(&[SYMBOL, FISCAL_DATE_ENDING]),
            empty(&[SYMBOL, SECTOR, INDUSTRY]),
        );

        match sources.validate() {
            Err(DatasetError::SchemaError { table, column }) => {
                assert_eq!(table, EARNINGS);
                assert_eq!(column, REPORTED_EPS);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_accepts_minimal_schema() {
        let sources = SourceTables::new(
            empty(&[SYMBOL, FISCAL_DATE_ENDING, REPORTED_CURRENCY]),
            empty(&[FISCAL_DATE_ENDING, SYMBOL]),
            empty(&[SYMBOL, FISCAL_DATE_ENDING, REPORTED_EPS]),
            empty(&[SYMBOL, SECTOR, INDUSTRY, "Name"]),
        );
        assert!(sources.validate().is_ok());
    }
}
