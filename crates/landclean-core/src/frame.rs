// crates/landclean-core/src/frame.rs

//! Loading and row/column helpers shared by both cleaners.
//!
//! Raw files are read with every column as `String`; each cleaner then coerces only the
//! columns it reasons about, so a stray value in an unrelated column never aborts a run.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate};
use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Day-month-year layout used by every date column in the raw exports.
pub const DMY_FORMAT: &str = "%d-%m-%Y";

pub fn read_raw_csv(path: &Path) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }

    let parse_options = CsvParseOptions::default().with_missing_is_null(true);

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(parse_options)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    Ok(df)
}

pub fn require_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<()> {
    let present: HashSet<&str> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();

    match columns.iter().find(|column| !present.contains(**column)) {
        Some(missing) => Err(PipelineError::MissingColumn {
            table: table.to_string(),
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

/// Selects `columns` in the given order, failing on the first one that is absent.
pub fn select_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<DataFrame> {
    require_columns(df, table, columns)?;
    Ok(df.select(columns.iter().copied())?)
}

pub fn drop_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<DataFrame> {
    require_columns(df, table, columns)?;
    Ok(df.drop_many(columns.iter().copied()))
}

pub fn drop_columns_where(df: &DataFrame, predicate: impl Fn(&str) -> bool) -> DataFrame {
    let doomed: Vec<PlSmallStr> = df
        .get_column_names()
        .into_iter()
        .filter(|name| predicate(name.as_str()))
        .cloned()
        .collect();
    df.drop_many(doomed)
}

pub fn retain_rows(df: &DataFrame, keep: impl IntoIterator<Item = bool>) -> Result<DataFrame> {
    let mask: BooleanChunked = keep.into_iter().collect();
    Ok(df.filter(&mask)?)
}

/// Keeps rows whose text value in `column` is one of `allowed`. Nulls are dropped.
pub fn keep_values_in(df: &DataFrame, column: &str, allowed: &[&str]) -> Result<DataFrame> {
    let values = df.column(column)?.str()?;
    let mask: BooleanChunked = values
        .into_iter()
        .map(|value| value.is_some_and(|value| allowed.contains(&value)))
        .collect();
    Ok(df.filter(&mask)?)
}

/// Drops rows whose text value in `column` is one of `excluded`. Nulls are kept.
pub fn drop_values_in(df: &DataFrame, column: &str, excluded: &[&str]) -> Result<DataFrame> {
    let values = df.column(column)?.str()?;
    let mask: BooleanChunked = values
        .into_iter()
        .map(|value| !value.is_some_and(|value| excluded.contains(&value)))
        .collect();
    Ok(df.filter(&mask)?)
}

pub fn floats(df: &DataFrame, column: &str) -> Result<Float64Chunked> {
    let cast = df.column(column)?.cast(&DataType::Float64)?;
    Ok(cast.f64()?.clone())
}

/// Casts text columns to `Float64`; values that do not parse become null.
pub fn coerce_floats(df: &mut DataFrame, columns: &[&str]) -> Result<()> {
    for name in columns {
        let cast = df.column(name)?.cast(&DataType::Float64)?;
        df.with_column(cast)?;
    }
    Ok(())
}

/// Casts text columns to `Int64` by way of `Float64`, so exports that render codes as
/// `2.0` still land on `2`.
pub fn coerce_ints(df: &mut DataFrame, columns: &[&str]) -> Result<()> {
    for name in columns {
        let cast = df
            .column(name)?
            .cast(&DataType::Float64)?
            .cast(&DataType::Int64)?;
        df.with_column(cast)?;
    }
    Ok(())
}

/// Replaces a `DD-MM-YYYY` text column with a `Date` column and returns the parsed values
/// for row filtering. Unparseable or missing values become null.
pub fn parse_dmy_column(df: &mut DataFrame, column: &str) -> Result<Vec<Option<NaiveDate>>> {
    let parsed: Vec<Option<NaiveDate>> = df
        .column(column)?
        .str()?
        .into_iter()
        .map(|value| value.and_then(parse_dmy))
        .collect();

    let epoch = DateTime::UNIX_EPOCH.date_naive();
    let days: Vec<Option<i32>> = parsed
        .iter()
        .map(|date| date.map(|date| (date - epoch).num_days() as i32))
        .collect();

    let series = Series::new(column.into(), days).cast(&DataType::Date)?;
    df.with_column(series)?;

    Ok(parsed)
}

pub fn parse_dmy(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DMY_FORMAT).ok()
}
