use crate::error::{DatasetError, Result};
use polars::prelude::*;

/// Scratch column used to restore input order after joins and group-bys.
pub(crate) const ROW_INDEX: &str = "__row";

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

pub fn require_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<()> {
    match columns.iter().find(|c| !has_column(df, c)) {
        Some(missing) => Err(DatasetError::SchemaError {
            table: table.to_string(),
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

/// Fails when `df` already carries a column the caller is about to add.
pub fn require_absent(df: &DataFrame, table: &str, columns: &[&str]) -> Result<()> {
    match columns.iter().find(|c| has_column(df, c)) {
        Some(present) => Err(DatasetError::DuplicateColumn {
            table: table.to_string(),
            column: present.to_string(),
        }),
        None => Ok(()),
    }
}

pub fn null_count(df: &DataFrame, name: &str) -> Result<usize> {
    Ok(df.column(name)?.null_count())
}

pub fn select_columns(frame: LazyFrame, names: &[String]) -> LazyFrame {
    frame.select(
        names
            .iter()
            .map(|name| col(name.as_str()))
            .collect::<Vec<_>>(),
    )
}

pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}

pub fn i64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let values = series.i64()?.into_iter().collect();
    Ok(values)
}

/// Number of rows whose full key is present and already appeared earlier.
/// Rows with a missing key part never match anything, so they are not
/// counted as repeats.
pub fn count_duplicate_keys(df: &DataFrame, table: &str, key: &[&str]) -> Result<usize> {
    require_columns(df, table, key)?;

    let present = key
        .iter()
        .map(|name| col(*name).is_not_null())
        .reduce(|acc, expr| acc.and(expr))
        .unwrap_or_else(|| lit(true));
    let keyed = df.clone().lazy().filter(present);

    let total = keyed.clone().collect()?.height();
    let distinct = keyed
        .group_by(key.iter().map(|name| col(*name)).collect::<Vec<_>>())
        .agg([len().alias("rows")])
        .collect()?
        .height();

    Ok(total - distinct)
}
