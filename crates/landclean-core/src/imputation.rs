// crates/landclean-core/src/imputation.rs

use std::collections::{BTreeMap, HashMap};

use polars::prelude::*;

/// Observed `[min, max]` area for one label within one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaRange {
    pub min: f64,
    pub max: f64,
}

impl AreaRange {
    pub fn contains(&self, area: f64) -> bool {
        self.min <= area && area <= self.max
    }

    fn widen(&mut self, area: f64) {
        self.min = self.min.min(area);
        self.max = self.max.max(area);
    }
}

/// Label ranges keyed by group, each group's labels in sorted order.
pub type RangeTable = BTreeMap<String, Vec<(String, AreaRange)>>;

/// Fills missing labels from the area ranges observed for labelled rows of the same group.
///
/// A row is filled only when its label is null and both its group and area are present;
/// it takes the first label (in sorted order) whose range contains its area.
#[derive(Debug, Clone, Copy)]
pub struct RangeImputer {
    pub group_column: &'static str,
    pub label_column: &'static str,
    pub area_column: &'static str,
    pub allowed_labels: Option<&'static [&'static str]>,
}

#[derive(Debug, Clone)]
pub struct Imputation {
    pub dataframe: DataFrame,
    pub filled: usize,
}

impl RangeImputer {
    pub fn ranges(&self, df: &DataFrame) -> PolarsResult<RangeTable> {
        let groups = df.column(self.group_column)?.str()?;
        let labels = df.column(self.label_column)?.str()?;
        let area_cast = df.column(self.area_column)?.cast(&DataType::Float64)?;
        let areas = area_cast.f64()?;

        let mut flat: BTreeMap<(String, String), AreaRange> = BTreeMap::new();
        for ((group, label), area) in groups.into_iter().zip(labels).zip(areas) {
            let (Some(group), Some(label), Some(area)) = (group, label, area) else {
                continue;
            };
            if let Some(allowed) = self.allowed_labels {
                if !allowed.contains(&label) {
                    continue;
                }
            }
            flat.entry((group.to_string(), label.to_string()))
                .and_modify(|range| range.widen(area))
                .or_insert(AreaRange {
                    min: area,
                    max: area,
                });
        }

        let mut table = RangeTable::new();
        for ((group, label), range) in flat {
            table.entry(group).or_default().push((label, range));
        }
        Ok(table)
    }

    pub fn impute(&self, df: &DataFrame) -> PolarsResult<Imputation> {
        let table = self.ranges(df)?;

        let groups = df.column(self.group_column)?.str()?;
        let labels = df.column(self.label_column)?.str()?;
        let area_cast = df.column(self.area_column)?.cast(&DataType::Float64)?;
        let areas = area_cast.f64()?;

        let mut filled = 0usize;
        let updated: StringChunked = groups
            .into_iter()
            .zip(labels)
            .zip(areas)
            .map(|((group, label), area)| {
                if label.is_some() {
                    return label;
                }
                let found = group
                    .zip(area)
                    .and_then(|(group, area)| lookup(&table, group, area));
                if found.is_some() {
                    filled += 1;
                }
                found
            })
            .collect();

        let mut dataframe = df.clone();
        dataframe.with_column(updated.with_name(self.label_column.into()).into_series())?;

        Ok(Imputation { dataframe, filled })
    }
}

fn lookup<'a>(table: &'a RangeTable, group: &str, area: f64) -> Option<&'a str> {
    table
        .get(group)?
        .iter()
        .find(|(_, range)| range.contains(area))
        .map(|(label, _)| label.as_str())
}

/// Rebuilds `id_column` from `label_column` using the first non-null id seen for each
/// label. Null labels, and labels never seen with an id, get a null id.
pub fn rederive_ids(
    df: &DataFrame,
    label_column: &str,
    id_column: &str,
) -> PolarsResult<DataFrame> {
    let labels = df.column(label_column)?.str()?;
    let id_cast = df.column(id_column)?.cast(&DataType::Int64)?;
    let ids = id_cast.i64()?;

    let mut first_ids: HashMap<&str, i64> = HashMap::new();
    for (label, id) in labels.into_iter().zip(ids) {
        if let (Some(label), Some(id)) = (label, id) {
            first_ids.entry(label).or_insert(id);
        }
    }

    let rebuilt: Int64Chunked = labels
        .into_iter()
        .map(|label| label.and_then(|label| first_ids.get(label).copied()))
        .collect();

    let mut dataframe = df.clone();
    dataframe.with_column(rebuilt.with_name(id_column.into()).into_series())?;
    Ok(dataframe)
}
