use polars::prelude::*;

use landclean_core::rent_contracts::*;

#[test]
fn date_filter_keeps_lookback_window() -> anyhow::Result<()> {
    let df = df![
        START_DATE => &[Some("15-03-2021"), Some("31-12-2020"), Some("not a date"), Some("01-01-2024"), Some("01-01-2025"), None],
        END_DATE => &[Some("14-03-2022"), Some("30-12-2021"), None, Some("31-12-2024"), Some("31-12-2025"), None],
        "id" => &[1i64, 2, 3, 4, 5, 6],
    ]?;

    let recent = filter_recent_contracts(df, 2024)?;
    let ids: Vec<Option<i64>> = recent.column("id")?.i64()?.into_iter().collect();
    assert_eq!(ids, vec![Some(1), Some(4)]);
    assert_eq!(recent.column(START_DATE)?.dtype(), &DataType::Date);
    assert_eq!(recent.column(END_DATE)?.dtype(), &DataType::Date);
    Ok(())
}

#[test]
fn arabic_columns_are_dropped() -> anyhow::Result<()> {
    let df = df![
        "area_name_en" => &["Marsa"],
        "area_name_ar" => &["مرسى"],
        "project_name_ar" => &["x"],
    ]?;
    let cleaned = drop_arabic_columns(&df);
    let names: Vec<&str> = cleaned
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(names, vec!["area_name_en"]);
    Ok(())
}

#[test]
fn usage_and_line_filters() -> anyhow::Result<()> {
    let df = df![
        USAGE => &[Some("Residential"), Some("Commercial"), Some("Residential"), None, Some("Residential")],
        PROPERTY_COUNT => &[1.0, 1.0, 2.0, 1.0, 1.0],
        LINE_NUMBER => &[1.0, 1.0, 1.0, 1.0, 2.0],
        "id" => &[1i64, 2, 3, 4, 5],
    ]?;

    let residential = keep_residential_usage(&df)?;
    assert!(residential.column(USAGE).is_err());
    assert_eq!(residential.height(), 3);

    let single = keep_single_property_lines(&residential)?;
    let ids: Vec<Option<i64>> = single.column("id")?.i64()?.into_iter().collect();
    assert_eq!(ids, vec![Some(1)]);
    assert!(single.column(PROPERTY_COUNT).is_err());
    assert!(single.column(LINE_NUMBER).is_err());
    Ok(())
}

#[test]
fn area_bounds_depend_on_business_type() -> anyhow::Result<()> {
    let df = df![
        BUS_TYPE => &[Some("Villa"), Some("Villa"), Some("Villa"), Some("Unit"), Some("Unit"), Some("Unit"), None, Some("Villa")],
        ACTUAL_AREA => &[Some(57.0), Some(15200.0), Some(56.9), Some(9.0), Some(3201.0), Some(3201.5), Some(100.0), None],
        SUB_TYPE => &[Some("Villa"); 8],
    ]?;

    let bounded = enforce_area_bounds(&df)?;
    let areas: Vec<Option<f64>> = bounded.column(ACTUAL_AREA)?.f64()?.into_iter().collect();
    assert_eq!(
        areas,
        vec![Some(57.0), Some(15200.0), Some(9.0), Some(3201.0)]
    );
    Ok(())
}

#[test]
fn zero_area_fifteen_bedroom_rows_are_dropped() -> anyhow::Result<()> {
    let df = df![
        BUS_TYPE => &["Villa"],
        ACTUAL_AREA => &[0.0],
        SUB_TYPE => &["15 bed room+hall"],
    ]?;
    assert_eq!(enforce_area_bounds(&df)?.height(), 0);
    Ok(())
}

#[test]
fn sub_type_labels_are_canonicalised() {
    assert_eq!(
        canonical_sub_type("1bed room+Hall"),
        SubTypeLabel::Keep("1 Bed + Hall".to_string())
    );
    assert_eq!(
        canonical_sub_type("2 bed rooms+hall"),
        SubTypeLabel::Keep("2 Beds + Hall".to_string())
    );
    assert_eq!(
        canonical_sub_type("9 Bed Rooms+Hall"),
        SubTypeLabel::Keep("8-10 Bed + Hall".to_string())
    );
    assert_eq!(canonical_sub_type(" Duplex "), SubTypeLabel::Keep("Duplex".to_string()));
    assert_eq!(canonical_sub_type("Room"), SubTypeLabel::Drop);
    assert_eq!(canonical_sub_type("11 bed rooms+hall"), SubTypeLabel::Drop);
    assert_eq!(
        canonical_sub_type("Hotel Apartment"),
        SubTypeLabel::Keep("hotel apartment".to_string())
    );
}

#[test]
fn normalization_drops_rooms_and_tenant_columns() -> anyhow::Result<()> {
    let df = df![
        SUB_TYPE => &[Some("STUDIO"), Some("room"), None, Some("10 bed rooms+hall")],
        TENANT_TYPE_ID => &[1i64, 1, 2, 2],
        TENANT_TYPE => &["Person", "Person", "Authority", "Authority"],
    ]?;

    let normalized = normalize_sub_types(&df)?;
    let labels: Vec<Option<&str>> = normalized.column(SUB_TYPE)?.str()?.into_iter().collect();
    assert_eq!(labels, vec![Some("Studio"), None, Some("8-10 Bed + Hall")]);
    assert_eq!(normalized.width(), 1);
    Ok(())
}

#[test]
fn sub_type_imputation_uses_project_then_area() -> anyhow::Result<()> {
    let df = df![
        PROPERTY_TYPE => &["Flat", "Flat", "Flat", "Flat", "Flat", "Flat"],
        PROJECT_NAME => &[Some("ALPHA"), Some("ALPHA"), Some("SANDHURST HOUSE"), Some("BETA"), None, Some("GAMMA")],
        AREA_NAME => &["Marsa", "Marsa", "Jumeirah", "Marsa", "Marsa", "Marsa"],
        SUB_TYPE => &[Some("1bed room+Hall"), None, None, Some("2 bed rooms+hall+Maids Room"), None, None],
        SUB_TYPE_ID => &[Some(3i64), None, None, Some(7), None, None],
        ACTUAL_AREA => &[80.0, 80.0, 47.5, 120.0, 80.0, 300.0],
    ]?;

    let imputed = impute_sub_types(&df)?;
    let labels: Vec<Option<&str>> = imputed.column(SUB_TYPE)?.str()?.into_iter().collect();
    assert_eq!(
        labels,
        vec![
            Some("1bed room+Hall"),
            Some("1bed room+Hall"),
            Some("Studio"),
            Some("2 bed rooms+hall"),
            Some("1bed room+Hall"),
            None,
        ]
    );

    let ids: Vec<Option<i64>> = imputed.column(SUB_TYPE_ID)?.i64()?.into_iter().collect();
    assert_eq!(ids, vec![Some(3), Some(3), None, Some(7), Some(3), None]);
    Ok(())
}

#[test]
fn amount_outliers_outside_percentile_band_are_dropped() -> anyhow::Result<()> {
    let mut amounts: Vec<f64> = (1..=100).map(f64::from).collect();
    amounts.push(0.0);

    let df = df![
        CONTRACT_AMOUNT => amounts.clone(),
        ANNUAL_AMOUNT => amounts,
    ]?;

    let kept = remove_amount_outliers(&df)?;
    let contract = kept.column(CONTRACT_AMOUNT)?.f64()?;
    assert_eq!(kept.height(), 98);
    assert_eq!(contract.min(), Some(2.0));
    assert_eq!(contract.max(), Some(99.0));
    Ok(())
}

#[test]
fn rows_must_fall_inside_both_amount_bands() -> anyhow::Result<()> {
    // Contract extremes sit on ids 1 and 100, annual extremes on ids 50 and 51.
    let ids: Vec<i64> = (1..=100).collect();
    let contract: Vec<f64> = ids.iter().map(|id| *id as f64 * 1_000.0).collect();
    let annual: Vec<f64> = ids
        .iter()
        .map(|id| ((id + 49) % 100 + 1) as f64 * 12_000.0)
        .collect();

    let df = df![
        "contract_id" => ids,
        CONTRACT_AMOUNT => contract,
        ANNUAL_AMOUNT => annual,
    ]?;

    let kept = remove_amount_outliers(&df)?;
    let survivors: Vec<Option<i64>> = kept.column("contract_id")?.i64()?.into_iter().collect();
    let expected: Vec<Option<i64>> = (2..=99)
        .filter(|id| *id != 50 && *id != 51)
        .map(Some)
        .collect();
    assert_eq!(survivors, expected);
    Ok(())
}

#[test]
fn percentile_band_interpolates_and_skips_nulls() -> anyhow::Result<()> {
    let values: Float64Chunked = (1..=100).map(|value| Some(f64::from(value))).collect();
    let (low, high) = percentile_band(&values)?.expect("band");
    assert!((low - 1.99).abs() < 1e-9);
    assert!((high - 99.01).abs() < 1e-9);

    let empty = Float64Chunked::full_null("amount".into(), 3);
    assert_eq!(percentile_band(&empty)?, None);
    Ok(())
}

#[test]
fn master_project_subset_requires_project_number() -> anyhow::Result<()> {
    let df = df![
        PROJECT_NUMBER => &[Some(101i64), None, Some(102)],
    ]?;
    let subset = with_project_number(&df)?;
    assert_eq!(subset.height(), 2);
    assert_eq!(subset.column(PROJECT_NUMBER)?.null_count(), 0);
    Ok(())
}

#[test]
fn missing_required_column_aborts() -> anyhow::Result<()> {
    let df = df![START_DATE => &["01-01-2024"]]?;
    let err = match clean_rent_contracts(df, 2024) {
        Ok(_) => anyhow::bail!("expected a missing column error"),
        Err(err) => err,
    };
    assert!(err.to_string().contains(END_DATE));
    Ok(())
}
