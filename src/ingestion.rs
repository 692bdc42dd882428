use crate::config::SourcePaths;
use crate::error::{DatasetError, Result};
use crate::schema::{SourceTables, BALANCE_SHEET, EARNINGS, INCOME_STATEMENT, KEY_COLUMNS, OVERVIEW};
use log::{debug, info};
use polars::prelude::*;
use std::fs;
use std::path::Path;

/// Cell spellings read as a missing value.
pub const MISSING_TOKENS: [&str; 10] = [
    "", "None", "none", "null", "NULL", "NaN", "nan", "NAN", "N/A", "n/a",
];

/// Reads a CSV file with a header row.
///
/// `symbol` and `fiscalDateEnding` always stay text. Any other column whose
/// present cells all parse as numbers becomes `Float64`, with NaN read as
/// missing; the rest stay text.
pub fn read_table(path: impl AsRef<Path>, table_name: &str) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(DatasetError::MissingSource {
            table: table_name.to_string(),
            path: path.display().to_string(),
        });
    }

    let null_values = NullValues::AllColumns(MISSING_TOKENS.iter().map(|t| (*t).into()).collect());
    let raw = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(move |options| options.with_null_values(Some(null_values.clone())))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let mut numeric = Vec::new();
    let mut columns = Vec::with_capacity(raw.width());
    for column in raw.get_columns() {
        if KEY_COLUMNS.contains(&column.name().as_str()) {
            columns.push(column.clone());
            continue;
        }
        let parsed = column.cast(&DataType::Float64)?;
        if parsed.null_count() == column.null_count() {
            numeric.push(column.name().to_string());
            columns.push(parsed);
        } else {
            columns.push(column.clone());
        }
    }

    let table = DataFrame::new(columns)?
        .lazy()
        .with_columns(
            numeric
                .iter()
                .map(|name| col(name.as_str()).fill_nan(lit(NULL)))
                .collect::<Vec<_>>(),
        )
        .collect()?;

    debug!(
        "Read {} rows x {} columns for '{}' from {} ({} numeric)",
        table.height(),
        table.width(),
        table_name,
        path.display(),
        numeric.len()
    );
    Ok(table)
}

/// Writes `table` as CSV, creating parent directories. Missing values are
/// written as empty cells.
pub fn write_table(path: impl AsRef<Path>, table: &DataFrame) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = fs::File::create(path)?;
    let mut out = table.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut out)?;

    info!("Wrote {} rows to {}", table.height(), path.display());
    Ok(())
}

pub fn load_sources(paths: &SourcePaths) -> Result<SourceTables> {
    Ok(SourceTables::new(
        read_table(&paths.balance_sheet, BALANCE_SHEET)?,
        read_table(&paths.income_statement, INCOME_STATEMENT)?,
        read_table(&paths.earnings, EARNINGS)?,
        read_table(&paths.overview, OVERVIEW)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FISCAL_DATE_ENDING, REPORTED_EPS, SYMBOL};
    use tempfile::tempdir;

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let result = read_table(dir.path().join("nope.csv"), EARNINGS);
        match result {
            Err(DatasetError::MissingSource { table, .. }) => assert_eq!(table, EARNINGS),
            other => panic!("expected missing source, got {:?}", other),
        }
    }

    #[test]
    fn test_write_then_read_preserves_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");

        let table = df!(
            "symbol" => ["IBM", "AAPL"],
            "eps" => [Some(1.25), None]
        )
        .unwrap();

        write_table(&path, &table).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "symbol,eps\nIBM,1.25\nAAPL,\n");

        let back = read_table(&path, "t").unwrap();
        assert!(back.equals_missing(&table));
    }

    #[test]
    fn test_read_treats_none_as_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("earnings.csv");
        fs::write(
            &path,
            "symbol,fiscalDateEnding,reportedEPS\nIBM,2020-12-31,None\nIBM,2021-12-31,7.93\n",
        )
        .unwrap();

        let table = read_table(&path, EARNINGS).unwrap();
        let eps = table.column(REPORTED_EPS).unwrap().f64().unwrap();
        assert_eq!(eps.get(0), None);
        assert_eq!(eps.get(1), Some(7.93));
        assert_eq!(
            table.column(FISCAL_DATE_ENDING).unwrap().str().unwrap().get(1),
            Some("2021-12-31")
        );
    }

    #[test]
    fn test_read_treats_nan_spellings_as_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("earnings.csv");
        fs::write(
            &path,
            "symbol,fiscalDateEnding,reportedEPS\nA,2020-12-31,NAN\nA,2019-12-31,NaN\nA,2018-12-31,1.5\n",
        )
        .unwrap();

        let table = read_table(&path, EARNINGS).unwrap();
        let eps = table.column(REPORTED_EPS).unwrap().f64().unwrap();
        assert_eq!(eps.null_count(), 2);
        assert_eq!(eps.get(2), Some(1.5));
        assert!(eps.into_iter().flatten().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_numeric_looking_keys_stay_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overview.csv");
        fs::write(
            &path,
            "symbol,fiscalDateEnding,Sector\n0700,20201231,TECH\n0005,20191231,FIN\n",
        )
        .unwrap();

        let table = read_table(&path, OVERVIEW).unwrap();
        let symbols = table.column(SYMBOL).unwrap().str().unwrap();
        assert_eq!(symbols.get(0), Some("0700"));
        assert_eq!(symbols.get(1), Some("0005"));
        assert_eq!(
            table.column(FISCAL_DATE_ENDING).unwrap().str().unwrap().get(0),
            Some("20201231")
        );
    }
}
