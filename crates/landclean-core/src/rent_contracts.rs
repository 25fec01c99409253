// crates/landclean-core/src/rent_contracts.rs

//! Ejari rent-contract cleaning.
//!
//! Each stage is a free function over a `DataFrame` so it can be exercised alone;
//! [`clean_rent_contracts`] chains them in order and records row counts.

use std::collections::HashMap;

use chrono::Datelike;
use once_cell::sync::Lazy;
use polars::prelude::*;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::frame::{
    coerce_floats, coerce_ints, drop_columns, drop_columns_where, drop_values_in, floats,
    keep_values_in, parse_dmy_column, read_raw_csv, require_columns, retain_rows,
};
use crate::imputation::{rederive_ids, RangeImputer};
use crate::pipelines::{CleaningPipeline, OutputTable, PipelineOutput, StageLog};
use crate::rules::{apply_rules, Assignment, Condition, RewriteRule, RuleOutcome};

pub const INPUT_FILE: &str = "rent_contracts.csv";
pub const OUTPUT_FILE: &str = "rent_contracts_3y.csv";
pub const MASTER_PROJECT_OUTPUT_FILE: &str = "master_project_rent_contracts_3y.csv";

pub const START_DATE: &str = "contract_start_date";
pub const END_DATE: &str = "contract_end_date";
pub const USAGE: &str = "property_usage_en";
pub const PROPERTY_COUNT: &str = "no_of_prop";
pub const LINE_NUMBER: &str = "line_number";
pub const BUS_TYPE: &str = "ejari_bus_property_type_en";
pub const BUS_TYPE_ID: &str = "ejari_bus_property_type_id";
pub const PROPERTY_TYPE: &str = "ejari_property_type_en";
pub const PROPERTY_TYPE_ID: &str = "ejari_property_type_id";
pub const SUB_TYPE: &str = "ejari_property_sub_type_en";
pub const SUB_TYPE_ID: &str = "ejari_property_sub_type_id";
pub const PROJECT_NUMBER: &str = "project_number";
pub const PROJECT_NAME: &str = "project_name_en";
pub const AREA_NAME: &str = "area_name_en";
pub const ACTUAL_AREA: &str = "actual_area";
pub const TENANT_TYPE_ID: &str = "tenant_type_id";
pub const TENANT_TYPE: &str = "tenant_type_en";
pub const CONTRACT_AMOUNT: &str = "contract_amount";
pub const ANNUAL_AMOUNT: &str = "annual_amount";

const TABLE: &str = "rent_contracts";

const REQUIRED_COLUMNS: &[&str] = &[
    START_DATE,
    END_DATE,
    USAGE,
    PROPERTY_COUNT,
    LINE_NUMBER,
    BUS_TYPE,
    BUS_TYPE_ID,
    PROPERTY_TYPE,
    PROPERTY_TYPE_ID,
    SUB_TYPE,
    SUB_TYPE_ID,
    PROJECT_NUMBER,
    PROJECT_NAME,
    AREA_NAME,
    ACTUAL_AREA,
    TENANT_TYPE_ID,
    TENANT_TYPE,
    CONTRACT_AMOUNT,
    ANNUAL_AMOUNT,
];

/// Contracts starting in the reference year or any of this many years before it are kept.
pub const LOOKBACK_YEARS: i32 = 3;

pub const BUSINESS_TYPES: &[&str] = &["Unit", "Villa"];
pub const PROPERTY_TYPES: &[&str] = &[
    "Flat",
    "Villa",
    "Studio",
    "Complex Villas",
    "Arabian House",
    "Penthouse",
];
pub const EXCLUDED_SUB_TYPES: &[&str] = &[
    "Office",
    "Room in labor Camp",
    "Hotel",
    "Pharmacy",
    "Boardroom",
    "Shop",
    "Commercial villa",
];

pub const VILLA_AREA_BOUNDS: (f64, f64) = (57.0, 15200.0);
pub const UNIT_AREA_BOUNDS: (f64, f64) = (9.0, 3201.0);

pub const LOWER_AMOUNT_QUANTILE: f64 = 0.01;
pub const UPPER_AMOUNT_QUANTILE: f64 = 0.99;

/// Corrections for business-type / property-type / sub-type combinations that are
/// mislabelled in the registry.
pub const RECLASSIFICATION_RULES: &[RewriteRule] = &[
    RewriteRule {
        name: "unit_villa_to_flat",
        conditions: &[
            Condition::Equals(BUS_TYPE, "Unit"),
            Condition::Equals(PROPERTY_TYPE, "Villa"),
        ],
        assignments: &[
            Assignment::Text(PROPERTY_TYPE, "Flat"),
            Assignment::Int(PROPERTY_TYPE_ID, 842),
        ],
    },
    RewriteRule {
        name: "villa_flat_to_villa",
        conditions: &[
            Condition::Equals(BUS_TYPE, "Villa"),
            Condition::Equals(PROPERTY_TYPE, "Flat"),
        ],
        assignments: &[
            Assignment::Text(PROPERTY_TYPE, "Villa"),
            Assignment::Int(PROPERTY_TYPE_ID, 841),
        ],
    },
    RewriteRule {
        name: "villa_studio_to_unit_flat",
        conditions: &[
            Condition::Equals(PROPERTY_TYPE, "Villa"),
            Condition::Equals(SUB_TYPE, "Studio"),
        ],
        assignments: &[
            Assignment::Int(BUS_TYPE_ID, 2),
            Assignment::Text(BUS_TYPE, "Unit"),
            Assignment::Int(PROPERTY_TYPE_ID, 842),
            Assignment::Text(PROPERTY_TYPE, "Flat"),
        ],
    },
    RewriteRule {
        name: "villa_duplex_to_unit_flat",
        conditions: &[
            Condition::Equals(PROPERTY_TYPE, "Villa"),
            Condition::Equals(SUB_TYPE, "Duplex"),
        ],
        assignments: &[
            Assignment::Text(BUS_TYPE, "Unit"),
            Assignment::Int(BUS_TYPE_ID, 2),
            Assignment::Text(PROPERTY_TYPE, "Flat"),
            Assignment::Int(PROPERTY_TYPE_ID, 842),
        ],
    },
    RewriteRule {
        name: "unit_arabian_house_to_villa",
        conditions: &[
            Condition::Equals(BUS_TYPE, "Unit"),
            Condition::Equals(PROPERTY_TYPE, "Arabian House"),
        ],
        assignments: &[
            Assignment::Text(BUS_TYPE, "Villa"),
            Assignment::Int(BUS_TYPE_ID, 4),
        ],
    },
    RewriteRule {
        name: "unit_complex_villas_to_villa",
        conditions: &[
            Condition::Equals(BUS_TYPE, "Unit"),
            Condition::Equals(PROPERTY_TYPE, "Complex Villas"),
        ],
        assignments: &[
            Assignment::Text(BUS_TYPE, "Villa"),
            Assignment::Int(BUS_TYPE_ID, 4),
        ],
    },
    RewriteRule {
        name: "complex_villas_duplex_to_unit_flat",
        conditions: &[
            Condition::Equals(BUS_TYPE, "Villa"),
            Condition::Equals(PROPERTY_TYPE, "Complex Villas"),
            Condition::Equals(SUB_TYPE, "Duplex"),
        ],
        assignments: &[
            Assignment::Int(BUS_TYPE_ID, 2),
            Assignment::Text(BUS_TYPE, "Unit"),
            Assignment::Int(PROPERTY_TYPE_ID, 842),
            Assignment::Text(PROPERTY_TYPE, "Flat"),
        ],
    },
    RewriteRule {
        name: "flat_penthouse_to_penthouse",
        conditions: &[
            Condition::Equals(PROPERTY_TYPE, "Flat"),
            Condition::Equals(SUB_TYPE, "Penthouse"),
        ],
        assignments: &[
            Assignment::Int(PROPERTY_TYPE_ID, 352_361_946),
            Assignment::Text(PROPERTY_TYPE, "Penthouse"),
            Assignment::Int(SUB_TYPE_ID, 621),
            Assignment::Text(SUB_TYPE, "Penthouse"),
        ],
    },
];

const PROJECT_RANGE_IMPUTER: RangeImputer = RangeImputer {
    group_column: PROJECT_NAME,
    label_column: SUB_TYPE,
    area_column: ACTUAL_AREA,
    allowed_labels: None,
};

const AREA_RANGE_IMPUTER: RangeImputer = RangeImputer {
    group_column: AREA_NAME,
    label_column: SUB_TYPE,
    area_column: ACTUAL_AREA,
    allowed_labels: Some(&["Studio", "1bed room+Hall", "2 bed rooms+hall"]),
};

const SANDHURST_STUDIOS: &[RewriteRule] = &[RewriteRule {
    name: "sandhurst_house_studios",
    conditions: &[
        Condition::Equals(PROPERTY_TYPE, "Flat"),
        Condition::Equals(PROJECT_NAME, "SANDHURST HOUSE"),
        Condition::IsNull(SUB_TYPE),
        Condition::Between(ACTUAL_AREA, 47.0, 48.0),
    ],
    assignments: &[Assignment::Text(SUB_TYPE, "Studio")],
}];

const MAIDS_ROOM_FOLD: &[RewriteRule] = &[RewriteRule {
    name: "maids_room_into_two_bedrooms",
    conditions: &[Condition::Equals(SUB_TYPE, "2 bed rooms+hall+Maids Room")],
    assignments: &[Assignment::Text(SUB_TYPE, "2 bed rooms+hall")],
}];

/// Lowercased sub-type labels removed outright during normalization.
pub const DROPPED_SUB_TYPES: &[&str] = &["11 bed rooms+hall", "15 bed room+hall", "room"];
pub const LARGE_BEDROOM_SUB_TYPES: &[&str] =
    &["8 bed rooms+hall", "9 bed rooms+hall", "10 bed rooms+hall"];
pub const LARGE_BEDROOM_LABEL: &str = "8-10 Bed + Hall";

static SUB_TYPE_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("1bed room+hall", "1 Bed + Hall"),
        ("2 bed rooms+hall", "2 Beds + Hall"),
        ("3 bed rooms+hall", "3 Beds + Hall"),
        ("4 bed rooms+hall", "4 Beds + Hall"),
        ("5 bed rooms+hall", "5 Beds + Hall"),
        ("6 bed rooms+hall", "6 Beds + Hall"),
        ("7 bed rooms+hall", "7 Beds + Hall"),
        ("studio", "Studio"),
        ("duplex", "Duplex"),
        ("penthouse", "Penthouse"),
    ])
});

pub struct RentContractsPipeline;

impl CleaningPipeline for RentContractsPipeline {
    fn code_identifier(&self) -> &'static str {
        "rent"
    }

    fn description(&self) -> &'static str {
        "Residential Ejari rent contracts for the last four calendar years"
    }

    fn run(&self, config: &PipelineConfig) -> Result<PipelineOutput> {
        let path = config.raw_path(INPUT_FILE);
        info!(path = %path.display(), "loading rent contracts");
        let raw = read_raw_csv(&path)?;
        clean_rent_contracts(raw, config.reference_year)
    }
}

/// Runs every rent stage over a raw (all-text) contracts frame.
pub fn clean_rent_contracts(raw: DataFrame, reference_year: i32) -> Result<PipelineOutput> {
    require_columns(&raw, TABLE, REQUIRED_COLUMNS)?;
    let mut log = StageLog::new("rent");

    let mut df = raw;
    coerce_floats(&mut df, &[ACTUAL_AREA, CONTRACT_AMOUNT, ANNUAL_AMOUNT])?;
    coerce_ints(
        &mut df,
        &[BUS_TYPE_ID, PROPERTY_TYPE_ID, SUB_TYPE_ID, PROJECT_NUMBER],
    )?;

    let rows = df.height();
    df = filter_recent_contracts(df, reference_year)?;
    log.record("date_filter", rows, df.height());

    df = drop_arabic_columns(&df);

    let rows = df.height();
    df = keep_residential_usage(&df)?;
    log.record("usage_filter", rows, df.height());

    let rows = df.height();
    df = keep_single_property_lines(&df)?;
    log.record("line_filter", rows, df.height());

    let rows = df.height();
    df = keep_values_in(&df, BUS_TYPE, BUSINESS_TYPES)?;
    log.record("business_type_filter", rows, df.height());

    let rows = df.height();
    df = keep_values_in(&df, PROPERTY_TYPE, PROPERTY_TYPES)?;
    log.record("property_type_filter", rows, df.height());

    let rows = df.height();
    df = drop_values_in(&df, SUB_TYPE, EXCLUDED_SUB_TYPES)?;
    log.record("sub_type_exclusion", rows, df.height());

    let outcome = reclassify(&df)?;
    debug!(rows = outcome.rows_rewritten(), "rent reclassification");
    df = outcome.dataframe;

    df = impute_sub_types(&df)?;

    let rows = df.height();
    df = enforce_area_bounds(&df)?;
    log.record("area_bounds", rows, df.height());

    let rows = df.height();
    df = normalize_sub_types(&df)?;
    log.record("sub_type_normalization", rows, df.height());

    let rows = df.height();
    df = remove_amount_outliers(&df)?;
    log.record("amount_outliers", rows, df.height());

    df = drop_columns_where(&df, |name| name.contains("nearest"));

    let master_project = with_project_number(&df)?;
    log.record("master_project_split", df.height(), master_project.height());

    Ok(PipelineOutput {
        tables: vec![
            OutputTable {
                file_name: OUTPUT_FILE,
                dataframe: df,
            },
            OutputTable {
                file_name: MASTER_PROJECT_OUTPUT_FILE,
                dataframe: master_project,
            },
        ],
        stages: log,
    })
}

/// Parses both contract dates and keeps contracts starting within the lookback window.
pub fn filter_recent_contracts(mut df: DataFrame, reference_year: i32) -> Result<DataFrame> {
    let starts = parse_dmy_column(&mut df, START_DATE)?;
    parse_dmy_column(&mut df, END_DATE)?;

    let window = (reference_year - LOOKBACK_YEARS)..=reference_year;
    retain_rows(
        &df,
        starts
            .iter()
            .map(|start| start.is_some_and(|date| window.contains(&date.year()))),
    )
}

pub fn drop_arabic_columns(df: &DataFrame) -> DataFrame {
    drop_columns_where(df, |name| name.ends_with("_ar"))
}

pub fn keep_residential_usage(df: &DataFrame) -> Result<DataFrame> {
    let residential = keep_values_in(df, USAGE, &["Residential"])?;
    drop_columns(&residential, TABLE, &[USAGE])
}

/// Keeps the first line of single-property contracts; multi-unit contracts carry one
/// amount for several properties.
pub fn keep_single_property_lines(df: &DataFrame) -> Result<DataFrame> {
    let counts = floats(df, PROPERTY_COUNT)?;
    let lines = floats(df, LINE_NUMBER)?;
    let kept = retain_rows(
        df,
        counts
            .into_iter()
            .zip(&lines)
            .map(|(count, line)| count == Some(1.0) && line == Some(1.0)),
    )?;
    drop_columns(&kept, TABLE, &[PROPERTY_COUNT, LINE_NUMBER])
}

pub fn reclassify(df: &DataFrame) -> Result<RuleOutcome> {
    Ok(apply_rules(df, RECLASSIFICATION_RULES)?)
}

/// Fills missing sub-types from observed area ranges, then rebuilds the sub-type id
/// column from the (possibly new) labels.
pub fn impute_sub_types(df: &DataFrame) -> Result<DataFrame> {
    let missing_before = df.column(SUB_TYPE)?.null_count();

    let by_project = PROJECT_RANGE_IMPUTER.impute(df)?;
    let sandhurst = apply_rules(&by_project.dataframe, SANDHURST_STUDIOS)?;
    let by_area = AREA_RANGE_IMPUTER.impute(&sandhurst.dataframe)?;
    let folded = apply_rules(&by_area.dataframe, MAIDS_ROOM_FOLD)?;

    let rebuilt = rederive_ids(&folded.dataframe, SUB_TYPE, SUB_TYPE_ID)?;

    info!(
        missing_before,
        by_project = by_project.filled,
        by_named_project = sandhurst.rows_rewritten(),
        by_area = by_area.filled,
        missing_after = rebuilt.column(SUB_TYPE)?.null_count(),
        "sub-type imputation"
    );

    Ok(rebuilt)
}

/// Drops zero-area 15-bedroom records, then applies the per business-type area bounds.
/// Rows with any other business type, or no area, fail the bound check.
pub fn enforce_area_bounds(df: &DataFrame) -> Result<DataFrame> {
    let areas = floats(df, ACTUAL_AREA)?;
    let bus_types = df.column(BUS_TYPE)?.str()?;
    let sub_types = df.column(SUB_TYPE)?.str()?;

    let keep = areas
        .into_iter()
        .zip(bus_types)
        .zip(sub_types)
        .map(|((area, bus_type), sub_type)| {
            let Some(area) = area else {
                return false;
            };
            if area == 0.0 && sub_type == Some("15 bed room+hall") {
                return false;
            }
            let (low, high) = match bus_type {
                Some("Villa") => VILLA_AREA_BOUNDS,
                Some("Unit") => UNIT_AREA_BOUNDS,
                _ => return false,
            };
            low <= area && area <= high
        });

    retain_rows(df, keep.collect::<Vec<_>>())
}

/// Result of normalizing one sub-type label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubTypeLabel {
    Keep(String),
    Drop,
}

pub fn canonical_sub_type(raw: &str) -> SubTypeLabel {
    let lowered = raw.trim().to_lowercase();
    if DROPPED_SUB_TYPES.contains(&lowered.as_str()) {
        return SubTypeLabel::Drop;
    }
    if LARGE_BEDROOM_SUB_TYPES.contains(&lowered.as_str()) {
        return SubTypeLabel::Keep(LARGE_BEDROOM_LABEL.to_string());
    }
    match SUB_TYPE_NAMES.get(lowered.as_str()) {
        Some(name) => SubTypeLabel::Keep((*name).to_string()),
        None => SubTypeLabel::Keep(lowered),
    }
}

pub fn normalize_sub_types(df: &DataFrame) -> Result<DataFrame> {
    let labels = df.column(SUB_TYPE)?.str()?;

    let mut keep = Vec::with_capacity(df.height());
    let mut normalized: Vec<Option<String>> = Vec::with_capacity(df.height());
    for label in labels {
        match label.map(canonical_sub_type) {
            Some(SubTypeLabel::Drop) => {
                keep.push(false);
                normalized.push(None);
            }
            Some(SubTypeLabel::Keep(name)) => {
                keep.push(true);
                normalized.push(Some(name));
            }
            None => {
                keep.push(true);
                normalized.push(None);
            }
        }
    }

    let mut relabelled = df.clone();
    relabelled.with_column(Series::new(SUB_TYPE.into(), normalized))?;
    let kept = retain_rows(&relabelled, keep)?;
    drop_columns(&kept, TABLE, &[TENANT_TYPE_ID, TENANT_TYPE])
}

/// Drops non-positive amounts, then keeps rows inside the 1st-99th percentile band of
/// both the contract and the annual amount.
pub fn remove_amount_outliers(df: &DataFrame) -> Result<DataFrame> {
    let contract = floats(df, CONTRACT_AMOUNT)?;
    let annual = floats(df, ANNUAL_AMOUNT)?;
    let positive = retain_rows(
        df,
        contract
            .into_iter()
            .zip(&annual)
            .map(|(contract, annual)| {
                contract.is_some_and(|value| value > 0.0) && annual.is_some_and(|value| value > 0.0)
            }),
    )?;

    let contract = floats(&positive, CONTRACT_AMOUNT)?;
    let annual = floats(&positive, ANNUAL_AMOUNT)?;
    let (Some(contract_band), Some(annual_band)) =
        (percentile_band(&contract)?, percentile_band(&annual)?)
    else {
        return Ok(positive);
    };
    debug!(?contract_band, ?annual_band, "amount percentile bands");

    let keep: Vec<bool> = contract
        .into_iter()
        .zip(&annual)
        .map(|(contract, annual)| {
            within(contract, contract_band) && within(annual, annual_band)
        })
        .collect();
    retain_rows(&positive, keep)
}

/// Linear-interpolated 1st and 99th percentiles, ignoring nulls.
pub fn percentile_band(values: &Float64Chunked) -> PolarsResult<Option<(f64, f64)>> {
    let low = values.quantile(LOWER_AMOUNT_QUANTILE, QuantileMethod::Linear)?;
    let high = values.quantile(UPPER_AMOUNT_QUANTILE, QuantileMethod::Linear)?;
    Ok(low.zip(high))
}

fn within(value: Option<f64>, (low, high): (f64, f64)) -> bool {
    value.is_some_and(|value| low <= value && value <= high)
}

pub fn with_project_number(df: &DataFrame) -> Result<DataFrame> {
    let present = df.column(PROJECT_NUMBER)?.is_not_null();
    Ok(df.filter(&present)?)
}
