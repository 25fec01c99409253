// crates/landclean-core/src/merge.rs

use std::collections::{HashMap, HashSet};

use polars::prelude::*;
use thiserror::Error;

pub const LEFT_SUFFIX: &str = "_x";
pub const RIGHT_SUFFIX: &str = "_y";

const ROW_ORDER: &str = "__left_row_order";

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
    #[error("join key '{key}' missing from {side} frame")]
    MissingKey { key: String, side: &'static str },
}

/// Left join on a single integer key.
///
/// Non-key columns present on both sides are renamed with `_x` (left) and `_y` (right).
/// Left row order is preserved; a left row with several matches is repeated once per
/// match, and null keys never match.
pub fn left_join(left: &DataFrame, right: &DataFrame, key: &str) -> Result<DataFrame, JoinError> {
    let mut left = keyed_frame(left, key, "left")?;
    let mut right = keyed_frame(right, key, "right")?;

    let right_names: HashSet<String> = right
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let overlapping: Vec<String> = left
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .filter(|name| name != key && right_names.contains(name))
        .collect();

    for name in &overlapping {
        left.rename(name, format!("{name}{LEFT_SUFFIX}").into())?;
        right.rename(name, format!("{name}{RIGHT_SUFFIX}").into())?;
    }

    let joined = left
        .lazy()
        .with_row_index(ROW_ORDER, None)
        .join(
            right.lazy(),
            [col(key)],
            [col(key)],
            JoinArgs::new(JoinType::Left),
        )
        .sort(
            [ROW_ORDER],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;

    Ok(joined.drop(ROW_ORDER)?)
}

fn keyed_frame(df: &DataFrame, key: &str, side: &'static str) -> Result<DataFrame, JoinError> {
    if df.get_column_index(key).is_none() {
        return Err(JoinError::MissingKey {
            key: key.to_string(),
            side,
        });
    }
    let mut keyed = df.clone();
    let cast = keyed.column(key)?.cast(&DataType::Int64)?;
    keyed.with_column(cast)?;
    Ok(keyed)
}

/// First value of `value_column` per non-null key, in row order.
pub fn first_value_lookup(
    df: &DataFrame,
    key_column: &str,
    value_column: &str,
) -> PolarsResult<HashMap<i64, Option<String>>> {
    let key_cast = df.column(key_column)?.cast(&DataType::Int64)?;
    let keys = key_cast.i64()?;
    let values = df.column(value_column)?.str()?;

    let mut lookup: HashMap<i64, Option<String>> = HashMap::new();
    for (key, value) in keys.into_iter().zip(values) {
        if let Some(key) = key {
            lookup
                .entry(key)
                .or_insert_with(|| value.map(str::to_string));
        }
    }
    Ok(lookup)
}

/// Overwrites `value_column` with `lookup[key]`; keys absent from the lookup become null.
pub fn map_from_lookup(
    df: &DataFrame,
    key_column: &str,
    value_column: &str,
    lookup: &HashMap<i64, Option<String>>,
) -> PolarsResult<DataFrame> {
    let key_cast = df.column(key_column)?.cast(&DataType::Int64)?;
    let keys = key_cast.i64()?;

    let mapped: StringChunked = keys
        .into_iter()
        .map(|key| key.and_then(|key| lookup.get(&key).and_then(|value| value.as_deref())))
        .collect();

    let mut dataframe = df.clone();
    dataframe.with_column(mapped.with_name(value_column.into()).into_series())?;
    Ok(dataframe)
}
