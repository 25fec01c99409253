// crates/landclean-core/src/rules.rs

//! Ordered conditional rewrites over a `DataFrame`.
//!
//! A rule table is plain data: each [`RewriteRule`] lists the conditions a row must meet
//! and the fixed values written into matching rows. Rules run in table order and each one
//! sees the rows as left by its predecessors.

use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
    #[error("rule '{rule}' references missing column '{column}'")]
    MissingColumn {
        rule: &'static str,
        column: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    /// Text column equals the value exactly. Nulls never match.
    Equals(&'static str, &'static str),
    /// Text column contains the needle, ignoring ASCII case. Nulls never match.
    ContainsIgnoreCase(&'static str, &'static str),
    IsNull(&'static str),
    /// Numeric column lies in the closed range. Nulls never match.
    Between(&'static str, f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assignment {
    Text(&'static str, &'static str),
    Int(&'static str, i64),
}

#[derive(Debug, Clone, Copy)]
pub struct RewriteRule {
    pub name: &'static str,
    pub conditions: &'static [Condition],
    pub assignments: &'static [Assignment],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleHit {
    pub rule: &'static str,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub dataframe: DataFrame,
    pub hits: Vec<RuleHit>,
}

impl RuleOutcome {
    pub fn rows_rewritten(&self) -> usize {
        self.hits.iter().map(|hit| hit.rows).sum()
    }
}

impl Condition {
    fn column(&self) -> &'static str {
        match self {
            Condition::Equals(column, _)
            | Condition::ContainsIgnoreCase(column, _)
            | Condition::IsNull(column)
            | Condition::Between(column, _, _) => column,
        }
    }

    fn evaluate(&self, df: &DataFrame, mask: &mut [bool]) -> Result<(), PolarsError> {
        match *self {
            Condition::Equals(column, expected) => {
                let values = df.column(column)?.str()?;
                for (keep, value) in mask.iter_mut().zip(values) {
                    *keep &= value == Some(expected);
                }
            }
            Condition::ContainsIgnoreCase(column, needle) => {
                let needle = needle.to_ascii_lowercase();
                let values = df.column(column)?.str()?;
                for (keep, value) in mask.iter_mut().zip(values) {
                    *keep &= value.is_some_and(|value| {
                        value.to_ascii_lowercase().contains(needle.as_str())
                    });
                }
            }
            Condition::IsNull(column) => {
                let nulls = df.column(column)?.is_null();
                for (keep, is_null) in mask.iter_mut().zip(&nulls) {
                    *keep &= is_null.unwrap_or(false);
                }
            }
            Condition::Between(column, low, high) => {
                let cast = df.column(column)?.cast(&DataType::Float64)?;
                let values = cast.f64()?;
                for (keep, value) in mask.iter_mut().zip(values) {
                    *keep &= value.is_some_and(|value| (low..=high).contains(&value));
                }
            }
        }
        Ok(())
    }
}

impl Assignment {
    fn column(&self) -> &'static str {
        match self {
            Assignment::Text(column, _) | Assignment::Int(column, _) => column,
        }
    }

    fn apply(&self, df: &mut DataFrame, mask: &[bool]) -> Result<(), PolarsError> {
        let series = match *self {
            Assignment::Text(column, value) => {
                let current = df.column(column)?.str()?;
                let updated: StringChunked = current
                    .into_iter()
                    .zip(mask)
                    .map(|(existing, &hit)| if hit { Some(value) } else { existing })
                    .collect();
                updated.with_name(column.into()).into_series()
            }
            Assignment::Int(column, value) => {
                let cast = df.column(column)?.cast(&DataType::Int64)?;
                let current = cast.i64()?;
                let updated: Int64Chunked = current
                    .into_iter()
                    .zip(mask)
                    .map(|(existing, &hit)| if hit { Some(value) } else { existing })
                    .collect();
                updated.with_name(column.into()).into_series()
            }
        };
        df.with_column(series)?;
        Ok(())
    }
}

impl RewriteRule {
    pub fn matches(&self, df: &DataFrame) -> Result<Vec<bool>, RuleError> {
        let mut mask = vec![true; df.height()];
        for condition in self.conditions {
            self.check_column(df, condition.column())?;
            condition.evaluate(df, &mut mask)?;
        }
        Ok(mask)
    }

    fn check_column(&self, df: &DataFrame, column: &'static str) -> Result<(), RuleError> {
        if df.get_column_index(column).is_none() {
            return Err(RuleError::MissingColumn {
                rule: self.name,
                column,
            });
        }
        Ok(())
    }
}

/// Runs `rules` in order over a copy of `df`.
pub fn apply_rules(df: &DataFrame, rules: &[RewriteRule]) -> Result<RuleOutcome, RuleError> {
    let mut dataframe = df.clone();
    let mut hits = Vec::with_capacity(rules.len());

    for rule in rules {
        for assignment in rule.assignments {
            rule.check_column(&dataframe, assignment.column())?;
        }

        let mask = rule.matches(&dataframe)?;
        let rows = mask.iter().filter(|hit| **hit).count();
        if rows > 0 {
            for assignment in rule.assignments {
                assignment.apply(&mut dataframe, &mask)?;
            }
        }

        debug!(rule = rule.name, rows, "rewrite rule applied");
        hits.push(RuleHit {
            rule: rule.name,
            rows,
        });
    }

    Ok(RuleOutcome { dataframe, hits })
}
