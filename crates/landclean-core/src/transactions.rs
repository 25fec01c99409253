// crates/landclean-core/src/transactions.rs

//! Sales transaction cleaning and enrichment with project and developer metadata.

use chrono::Datelike;
use polars::prelude::*;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::frame::{
    coerce_floats, coerce_ints, drop_columns, drop_columns_where, floats, keep_values_in,
    parse_dmy_column, read_raw_csv, require_columns, retain_rows, select_columns,
};
use crate::merge::{first_value_lookup, left_join, map_from_lookup};
use crate::pipelines::{CleaningPipeline, OutputTable, PipelineOutput, StageLog};
use crate::rules::{apply_rules, Assignment, Condition, RewriteRule, RuleOutcome};

pub const TRANSACTIONS_FILE: &str = "transactions.csv";
pub const PROJECTS_FILE: &str = "projects.csv";
pub const DEVELOPERS_FILE: &str = "developers.csv";

pub const SNAPSHOT_OUTPUT_FILE: &str = "transactions_3y.csv";
pub const PROJECTS_DEVELOPERS_OUTPUT_FILE: &str = "projects_developers.csv";
pub const MERGED_OUTPUT_FILE: &str = "transactions_merged_auto.csv";
pub const MERGED_CLEANED_OUTPUT_FILE: &str = "transactions_merged_cleaned.csv";

pub const INSTANCE_DATE: &str = "instance_date";
pub const TRANS_GROUP_ID: &str = "trans_group_id";
pub const TRANS_GROUP: &str = "trans_group_en";
pub const PROCEDURE_ID: &str = "procedure_id";
pub const PROCEDURE_NAME: &str = "procedure_name_en";
pub const USAGE: &str = "property_usage_en";
pub const PROPERTY_TYPE_ID: &str = "property_type_id";
pub const PROPERTY_TYPE: &str = "property_type_en";
pub const SUB_TYPE_ID: &str = "property_sub_type_id";
pub const SUB_TYPE: &str = "property_sub_type_en";
pub const MASTER_PROJECT: &str = "master_project_en";
pub const PROJECT_NUMBER: &str = "project_number";
pub const PROJECT_NAME: &str = "project_name_en";
pub const BUILDING_NAME: &str = "building_name_en";
pub const ROOMS: &str = "rooms_en";
pub const PROCEDURE_AREA: &str = "procedure_area";
pub const DEVELOPER_NUMBER: &str = "developer_number";

/// Sales from the reference year and this many years before it are kept.
pub const LOOKBACK_YEARS: i32 = 3;

/// Column layout of the three-year snapshot, in output order.
pub const SNAPSHOT_COLUMNS: &[&str] = &[
    INSTANCE_DATE,
    "transaction_id",
    TRANS_GROUP_ID,
    TRANS_GROUP,
    PROCEDURE_ID,
    PROCEDURE_NAME,
    "reg_type_id",
    "reg_type_en",
    USAGE,
    PROPERTY_TYPE_ID,
    PROPERTY_TYPE,
    SUB_TYPE_ID,
    SUB_TYPE,
    "area_id",
    "area_name_en",
    MASTER_PROJECT,
    PROJECT_NUMBER,
    PROJECT_NAME,
    BUILDING_NAME,
    ROOMS,
    "has_parking",
    PROCEDURE_AREA,
    "meter_sale_price",
    "actual_worth",
];

pub const PROJECT_COLUMNS: &[&str] = &[
    PROJECT_NUMBER,
    PROJECT_NAME,
    DEVELOPER_NUMBER,
    "developer_name",
    "master_developer_number",
    "master_developer_name",
    "project_start_date",
    "project_end_date",
    "project_status",
    "percent_completed",
    "completion_date",
    "area_id",
    "area_name_en",
    MASTER_PROJECT,
];

pub const DEVELOPER_COLUMNS: &[&str] = &[DEVELOPER_NUMBER, "developer_name_en"];

pub const PROJECTS_DEVELOPERS_COLUMNS: &[&str] = &[
    PROJECT_NUMBER,
    PROJECT_NAME,
    "developer_name_en",
    "area_id",
    "area_name_en",
    MASTER_PROJECT,
    "project_start_date",
    "project_end_date",
    "project_status",
    "percent_completed",
    "completion_date",
];

/// Final column selection; where a name existed on both sides of the merge the
/// transaction-side (`_x`) copy is the one kept.
pub const MERGED_CLEANED_COLUMNS: &[&str] = &[
    INSTANCE_DATE,
    "transaction_id",
    "reg_type_en",
    PROPERTY_TYPE,
    PROPERTY_TYPE_ID,
    "area_id_x",
    "area_name_en_x",
    PROJECT_NUMBER,
    "project_name_en_x",
    ROOMS,
    "has_parking",
    PROCEDURE_AREA,
    "meter_sale_price",
    "actual_worth",
    "developer_name_en",
    "project_start_date",
    "project_end_date",
    "completion_date",
    "project_status",
    "percent_completed",
];

pub const SALE_PROCEDURES: &[&str] = &["Sell", "Sell - Pre registration"];
pub const PROPERTY_TYPES: &[&str] = &["Villa", "Unit"];

pub const UNIT_AREA_BOUNDS: (f64, f64) = (21.0, 2988.0);
pub const VILLA_AREA_BOUNDS: (f64, f64) = (47.0, 10062.0);

pub const RECLASSIFICATION_RULES: &[RewriteRule] = &[
    RewriteRule {
        name: "townhouse_projects_to_villa",
        conditions: &[Condition::ContainsIgnoreCase(PROJECT_NAME, "townhouse")],
        assignments: &[
            Assignment::Int(PROPERTY_TYPE_ID, 4),
            Assignment::Text(PROPERTY_TYPE, "Villa"),
        ],
    },
    RewriteRule {
        name: "villa_flat_sub_type_to_villa",
        conditions: &[
            Condition::Equals(PROPERTY_TYPE, "Villa"),
            Condition::Equals(SUB_TYPE, "Flat"),
        ],
        assignments: &[
            Assignment::Int(SUB_TYPE_ID, 4),
            Assignment::Text(SUB_TYPE, "Villa"),
        ],
    },
];

/// Raw inputs of the transactions pipeline, all columns as text.
pub struct TransactionInputs {
    pub transactions: DataFrame,
    pub projects: DataFrame,
    pub developers: DataFrame,
}

impl TransactionInputs {
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let transactions_path = config.raw_path(TRANSACTIONS_FILE);
        let projects_path = config.raw_path(PROJECTS_FILE);
        let developers_path = config.raw_path(DEVELOPERS_FILE);
        info!(
            transactions = %transactions_path.display(),
            projects = %projects_path.display(),
            developers = %developers_path.display(),
            "loading transaction inputs"
        );

        Ok(Self {
            transactions: read_raw_csv(&transactions_path)?,
            projects: read_raw_csv(&projects_path)?,
            developers: read_raw_csv(&developers_path)?,
        })
    }
}

pub struct TransactionsPipeline;

impl CleaningPipeline for TransactionsPipeline {
    fn code_identifier(&self) -> &'static str {
        "transactions"
    }

    fn description(&self) -> &'static str {
        "Residential sales joined with project and developer metadata"
    }

    fn run(&self, config: &PipelineConfig) -> Result<PipelineOutput> {
        let inputs = TransactionInputs::load(config)?;
        clean_transactions(inputs, config.reference_year)
    }
}

pub fn clean_transactions(inputs: TransactionInputs, reference_year: i32) -> Result<PipelineOutput> {
    let TransactionInputs {
        transactions,
        projects,
        developers,
    } = inputs;
    require_columns(&transactions, "transactions", &[INSTANCE_DATE])?;
    require_columns(&projects, "projects", PROJECT_COLUMNS)?;
    require_columns(&developers, "developers", DEVELOPER_COLUMNS)?;

    let mut log = StageLog::new("transactions");

    let rows = transactions.height();
    let snapshot = recent_snapshot(transactions, reference_year)?;
    log.record("date_column_filter", rows, snapshot.height());

    let rows = snapshot.height();
    let mut df = keep_residential_sales(&snapshot)?;
    log.record("sales_filter", rows, df.height());

    let outcome = reclassify(&df)?;
    debug!(rows = outcome.rows_rewritten(), "transaction reclassification");
    df = drop_columns(&outcome.dataframe, "transactions", &[SUB_TYPE_ID, SUB_TYPE])?;

    let rows = df.height();
    df = remove_area_outliers(&df)?;
    log.record("area_outliers", rows, df.height());

    let rows = df.height();
    df = drop_unlocated(&df)?;
    log.record("null_location_filter", rows, df.height());

    let project_names = first_value_lookup(&df, PROJECT_NUMBER, PROJECT_NAME)?;
    debug!(projects = project_names.len(), "project name lookup built");

    let mut projects = select_columns(&projects, "projects", PROJECT_COLUMNS)?;
    coerce_ints(&mut projects, &[PROJECT_NUMBER, DEVELOPER_NUMBER])?;
    let projects = map_from_lookup(&projects, PROJECT_NUMBER, PROJECT_NAME, &project_names)?;
    let mut developers = select_columns(&developers, "developers", DEVELOPER_COLUMNS)?;
    coerce_ints(&mut developers, &[DEVELOPER_NUMBER])?;

    let rows = projects.height();
    let joined = left_join(&projects, &developers, DEVELOPER_NUMBER)?;
    let projects_developers =
        select_columns(&joined, "projects_developers", PROJECTS_DEVELOPERS_COLUMNS)?;
    log.record("projects_developers_merge", rows, projects_developers.height());

    let rows = df.height();
    let merged = left_join(&df, &projects_developers, PROJECT_NUMBER)?;
    log.record("transactions_merge", rows, merged.height());

    let selected = select_columns(&merged, "transactions_merged", MERGED_CLEANED_COLUMNS)?;
    let present = selected.column(PROJECT_NUMBER)?.is_not_null();
    let merged_cleaned = selected.filter(&present)?;
    log.record("final_selection", merged.height(), merged_cleaned.height());

    Ok(PipelineOutput {
        tables: vec![
            OutputTable {
                file_name: SNAPSHOT_OUTPUT_FILE,
                dataframe: snapshot,
            },
            OutputTable {
                file_name: PROJECTS_DEVELOPERS_OUTPUT_FILE,
                dataframe: projects_developers,
            },
            OutputTable {
                file_name: MERGED_OUTPUT_FILE,
                dataframe: merged,
            },
            OutputTable {
                file_name: MERGED_CLEANED_OUTPUT_FILE,
                dataframe: merged_cleaned,
            },
        ],
        stages: log,
    })
}

/// Keeps recent transactions, prunes Arabic, amenity and party columns, and fixes the
/// column layout. The result is published as the three-year snapshot.
pub fn recent_snapshot(mut df: DataFrame, reference_year: i32) -> Result<DataFrame> {
    let dates = parse_dmy_column(&mut df, INSTANCE_DATE)?;
    let earliest = reference_year - LOOKBACK_YEARS;
    let recent = retain_rows(
        &df,
        dates
            .iter()
            .map(|date| date.is_some_and(|date| date.year() >= earliest)),
    )?;

    let pruned = drop_columns_where(&recent, |name| {
        name.ends_with("_ar") || name.starts_with("nearest") || name.contains("parties")
    });

    let mut snapshot = select_columns(&pruned, "transactions", SNAPSHOT_COLUMNS)?;
    coerce_floats(&mut snapshot, &[PROCEDURE_AREA])?;
    coerce_ints(&mut snapshot, &[PROPERTY_TYPE_ID, SUB_TYPE_ID, PROJECT_NUMBER])?;
    Ok(snapshot)
}

/// Narrows the snapshot to residential villa/unit sales, dropping each filter column
/// once it carries no information.
pub fn keep_residential_sales(df: &DataFrame) -> Result<DataFrame> {
    let sales = keep_values_in(df, TRANS_GROUP, &["Sales"])?;
    let sales = drop_columns(&sales, "transactions", &[TRANS_GROUP_ID, TRANS_GROUP])?;

    let sells = keep_values_in(&sales, PROCEDURE_NAME, SALE_PROCEDURES)?;
    let sells = drop_columns(&sells, "transactions", &[PROCEDURE_ID, PROCEDURE_NAME])?;

    let residential = keep_values_in(&sells, USAGE, &["Residential"])?;
    let residential = drop_columns(&residential, "transactions", &[USAGE])?;

    keep_values_in(&residential, PROPERTY_TYPE, PROPERTY_TYPES)
}

pub fn reclassify(df: &DataFrame) -> Result<RuleOutcome> {
    Ok(apply_rules(df, RECLASSIFICATION_RULES)?)
}

pub fn area_within_bounds(property_type: Option<&str>, area: Option<f64>) -> bool {
    let (low, high) = match property_type {
        Some("Unit") => UNIT_AREA_BOUNDS,
        Some("Villa") => VILLA_AREA_BOUNDS,
        _ => return false,
    };
    area.is_some_and(|area| low <= area && area <= high)
}

pub fn remove_area_outliers(df: &DataFrame) -> Result<DataFrame> {
    let areas = floats(df, PROCEDURE_AREA)?;
    let types = df.column(PROPERTY_TYPE)?.str()?;
    let keep: Vec<bool> = types
        .into_iter()
        .zip(&areas)
        .map(|(property_type, area)| area_within_bounds(property_type, area))
        .collect();
    retain_rows(df, keep)
}

/// Drops rows with no rooms, building, project, or master project recorded.
pub fn drop_unlocated(df: &DataFrame) -> Result<DataFrame> {
    let mut located = vec![false; df.height()];
    for name in [ROOMS, BUILDING_NAME, PROJECT_NUMBER, MASTER_PROJECT] {
        let present = df.column(name)?.is_not_null();
        for (flag, value) in located.iter_mut().zip(&present) {
            *flag |= value.unwrap_or(false);
        }
    }
    retain_rows(df, located)
}
