use polars::prelude::*;

use landclean_core::transactions::*;

#[test]
fn area_bounds_by_property_type() {
    assert!(area_within_bounds(Some("Unit"), Some(21.0)));
    assert!(area_within_bounds(Some("Unit"), Some(2988.0)));
    assert!(!area_within_bounds(Some("Unit"), Some(20.9)));
    assert!(!area_within_bounds(Some("Unit"), Some(3000.0)));
    assert!(area_within_bounds(Some("Villa"), Some(47.0)));
    assert!(area_within_bounds(Some("Villa"), Some(10062.0)));
    assert!(!area_within_bounds(Some("Villa"), Some(10062.5)));
    assert!(!area_within_bounds(Some("Land"), Some(500.0)));
    assert!(!area_within_bounds(None, Some(500.0)));
    assert!(!area_within_bounds(Some("Unit"), None));
}

#[test]
fn outlier_removal_filters_rows() -> anyhow::Result<()> {
    let df = df![
        PROPERTY_TYPE => &["Unit", "Unit", "Villa", "Villa"],
        PROCEDURE_AREA => &[Some(80.0), Some(5.0), Some(300.0), None],
    ]?;
    let kept = remove_area_outliers(&df)?;
    let areas: Vec<Option<f64>> = kept.column(PROCEDURE_AREA)?.f64()?.into_iter().collect();
    assert_eq!(areas, vec![Some(80.0), Some(300.0)]);
    Ok(())
}

#[test]
fn residential_sales_filter_drops_spent_columns() -> anyhow::Result<()> {
    let df = df![
        TRANS_GROUP_ID => &[1i64, 2, 1, 1, 1],
        TRANS_GROUP => &["Sales", "Mortgages", "Sales", "Sales", "Sales"],
        PROCEDURE_ID => &[11i64, 13, 102, 11, 11],
        PROCEDURE_NAME => &["Sell", "Mortgage Registration", "Sell - Pre registration", "Delayed Sell", "Sell"],
        USAGE => &["Residential", "Residential", "Residential", "Residential", "Commercial"],
        PROPERTY_TYPE => &["Unit", "Unit", "Villa", "Unit", "Unit"],
        "transaction_id" => &["t1", "t2", "t3", "t4", "t5"],
    ]?;

    let sales = keep_residential_sales(&df)?;
    let ids: Vec<Option<&str>> = sales.column("transaction_id")?.str()?.into_iter().collect();
    assert_eq!(ids, vec![Some("t1"), Some("t3")]);

    let names: Vec<&str> = sales
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(names, vec![PROPERTY_TYPE, "transaction_id"]);
    Ok(())
}

#[test]
fn land_sales_are_excluded() -> anyhow::Result<()> {
    let df = df![
        TRANS_GROUP_ID => &[1i64],
        TRANS_GROUP => &["Sales"],
        PROCEDURE_ID => &[11i64],
        PROCEDURE_NAME => &["Sell"],
        USAGE => &["Residential"],
        PROPERTY_TYPE => &["Land"],
    ]?;
    assert_eq!(keep_residential_sales(&df)?.height(), 0);
    Ok(())
}

#[test]
fn unlocated_rows_need_every_location_field_null() -> anyhow::Result<()> {
    let df = df![
        ROOMS => &[None, Some("1 B/R"), None, None, None],
        BUILDING_NAME => &[None, None, Some("ALPHA"), None, None],
        PROJECT_NUMBER => &[None, None, None, Some(101i64), None],
        MASTER_PROJECT => &[None, None, None, None, Some("Dubai Marina")],
    ]?;

    let located = drop_unlocated(&df)?;
    assert_eq!(located.height(), 4);
    Ok(())
}

#[test]
fn snapshot_prunes_and_orders_columns() -> anyhow::Result<()> {
    let mut columns: Vec<Column> = SNAPSHOT_COLUMNS
        .iter()
        .rev()
        .map(|name| Column::new((*name).into(), &["1", "1", "1"]))
        .collect();
    columns.push(Column::new("area_name_ar".into(), &["x", "x", "x"]));
    columns.push(Column::new("nearest_metro_en".into(), &["x", "x", "x"]));
    columns.push(Column::new("no_of_parties_role_1".into(), &["x", "x", "x"]));
    let mut df = DataFrame::new(columns)?;
    df.with_column(Column::new(
        INSTANCE_DATE.into(),
        &[Some("05-03-2021"), Some("31-12-2020"), None],
    ))?;

    let snapshot = recent_snapshot(df, 2024)?;
    assert_eq!(snapshot.height(), 1);

    let names: Vec<&str> = snapshot
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(names, SNAPSHOT_COLUMNS.to_vec());
    assert_eq!(snapshot.column(INSTANCE_DATE)?.dtype(), &DataType::Date);
    assert_eq!(snapshot.column(PROJECT_NUMBER)?.dtype(), &DataType::Int64);
    assert_eq!(snapshot.column(PROCEDURE_AREA)?.dtype(), &DataType::Float64);
    Ok(())
}
