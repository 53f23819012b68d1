use monetary_lab::error::LabError;
use monetary_lab::loader::{FieldMapping, FileSource, SeriesLoader, SeriesSource, SourceSpec, StaticSource};
use monetary_lab::period::{DateFormat, Granularity, Period};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;

fn obfr_spec() -> SourceSpec {
    SourceSpec {
        name: "obfr".to_string(),
        url: "https://markets.newyorkfed.org/api/rates/unsecured/obfr/search.json".to_string(),
        records_path: vec!["refRates".to_string()],
        date_field: "effectiveDate".to_string(),
        date_format: None,
        granularity: Granularity::Monthly,
        fields: vec![FieldMapping::new("percentRate", "obfr")],
    }
}

fn hibor_spec() -> SourceSpec {
    SourceSpec {
        name: "hibor".to_string(),
        url: "https://api.hkma.gov.hk/hibor".to_string(),
        records_path: vec!["result".to_string(), "records".to_string()],
        date_field: "end_of_month".to_string(),
        date_format: Some(DateFormat::CompactYearMonth),
        granularity: Granularity::Monthly,
        fields: vec![
            FieldMapping::new("ir_overnight", "hibor_overnight"),
            FieldMapping::new("ir_1m", "hibor_1m"),
        ],
    }
}

#[test]
fn test_daily_records_collapse_to_last_date_of_month() {
    // Unordered daily observations across two months
    let document = json!({
        "refRates": [
            { "effectiveDate": "2023-03-01", "percentRate": 4.55 },
            { "effectiveDate": "2023-03-31", "percentRate": 4.82 },
            { "effectiveDate": "2023-02-28", "percentRate": 4.57 },
            { "effectiveDate": "2023-03-15", "percentRate": 4.58 },
            { "effectiveDate": "2023-02-01", "percentRate": 4.32 },
        ]
    });

    let series = SeriesLoader::from_json(&obfr_spec(), &document).unwrap();

    assert_eq!(series.name(), "obfr");
    assert_eq!(
        series.periods(),
        &[Period::monthly(2023, 2).unwrap(), Period::monthly(2023, 3).unwrap()]
    );
    assert_eq!(series.column("obfr").unwrap(), &[Some(4.57), Some(4.82)]);
}

#[test]
fn test_nested_envelope_and_rename() {
    let document = json!({
        "header": { "success": true },
        "result": {
            "datasize": 3,
            "records": [
                { "end_of_month": 202303, "ir_overnight": "3.1", "ir_1m": 3.5 },
                { "end_of_month": "202301", "ir_overnight": 1.2, "ir_1m": null },
                { "end_of_month": "202302", "ir_overnight": "1,000.5", "ir_1m": "." },
            ]
        }
    });

    let series = SeriesLoader::from_json(&hibor_spec(), &document).unwrap();

    assert_eq!(series.column_names(), vec!["hibor_overnight", "hibor_1m"]);
    assert_eq!(series.len(), 3);
    assert_eq!(
        series.column("hibor_overnight").unwrap(),
        &[Some(1.2), Some(1000.5), Some(3.1)]
    );
    assert_eq!(series.column("hibor_1m").unwrap(), &[None, None, Some(3.5)]);
}

#[test]
fn test_missing_mapped_field_is_schema_mismatch() {
    let document = json!({
        "result": { "records": [ { "end_of_month": "202301", "ir_overnight": 1.0 } ] }
    });

    match SeriesLoader::from_json(&hibor_spec(), &document).unwrap_err() {
        LabError::SchemaMismatch { series, detail } => {
            assert_eq!(series, "hibor");
            assert!(detail.contains("ir_1m"));
        }
        other => panic!("Expected SchemaMismatch, got {:?}", other),
    }
}

#[test]
fn test_missing_envelope_key_is_schema_mismatch() {
    let document = json!({ "result": { "rows": [] } });
    let err = SeriesLoader::from_json(&hibor_spec(), &document).unwrap_err();
    assert!(matches!(err, LabError::SchemaMismatch { detail, .. } if detail.contains("records")));
}

#[test]
fn test_non_numeric_cell_is_schema_mismatch() {
    let document = json!({
        "refRates": [ { "effectiveDate": "2023-03-01", "percentRate": "n/a today" } ]
    });
    let err = SeriesLoader::from_json(&obfr_spec(), &document).unwrap_err();
    assert!(matches!(err, LabError::SchemaMismatch { detail, .. } if detail.contains("2023-03-01")));
}

#[test]
fn test_non_finite_text_reads_as_missing() {
    let document = json!({
        "refRates": [
            { "effectiveDate": "2023-01-31", "percentRate": "NaN" },
            { "effectiveDate": "2023-02-28", "percentRate": "inf" },
            { "effectiveDate": "2023-03-31", "percentRate": "-Infinity" },
            { "effectiveDate": "2023-04-28", "percentRate": "4.8" },
        ]
    });

    let series = SeriesLoader::from_json(&obfr_spec(), &document).unwrap();

    assert_eq!(series.column("obfr").unwrap(), &[None, None, None, Some(4.8)]);
}

#[test]
fn test_empty_source_is_an_error() {
    let document = json!({ "refRates": [] });
    let err = SeriesLoader::from_json(&obfr_spec(), &document).unwrap_err();
    assert!(matches!(err, LabError::SchemaMismatch { .. }));
}

#[test]
fn test_bad_date_names_the_series() {
    let document = json!({
        "refRates": [ { "effectiveDate": "sometime", "percentRate": 4.5 } ]
    });
    match SeriesLoader::from_json(&obfr_spec(), &document).unwrap_err() {
        LabError::UnparseableDate { value, reason } => {
            assert_eq!(value, "sometime");
            assert!(reason.contains("obfr"));
        }
        other => panic!("Expected UnparseableDate, got {:?}", other),
    }
}

#[test]
fn test_unregistered_source_is_unavailable() {
    let source = StaticSource::new();
    let err = SeriesLoader::load(&source, &obfr_spec()).unwrap_err();
    assert!(matches!(err, LabError::SourceUnavailable { series, .. } if series == "obfr"));
}

#[test]
fn test_static_source_round_trip() {
    let body = json!({ "refRates": [ { "effectiveDate": "2023-01-31", "percentRate": 4.3 } ] });
    let source = StaticSource::new().with_payload("obfr", body.to_string());

    let series = SeriesLoader::load(&source, &obfr_spec()).unwrap();
    assert_eq!(series.value(0, "obfr"), Some(4.3));
}

#[test]
fn test_load_all_aborts_on_first_failure() {
    let body = json!({ "refRates": [ { "effectiveDate": "2023-01-31", "percentRate": 4.3 } ] });
    let source = StaticSource::new().with_payload("obfr", body.to_string());

    let result = SeriesLoader::load_all(&source, &[obfr_spec(), hibor_spec()]);
    assert!(matches!(result, Err(LabError::SourceUnavailable { series, .. }) if series == "hibor"));
}

#[test]
fn test_file_source_reads_saved_response() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("obfr.json")).unwrap();
    writeln!(
        file,
        r#"{{"refRates": [{{"effectiveDate": "2022-12-30", "percentRate": 4.33}}]}}"#
    )
    .unwrap();

    let source = FileSource::new(dir.path());
    let document = source.fetch(&obfr_spec()).unwrap();
    let series = SeriesLoader::from_json(&obfr_spec(), &document).unwrap();

    assert_eq!(series.periods(), &[Period::monthly(2022, 12).unwrap()]);

    // A missing file is a source failure, not a parse failure
    let mut other = obfr_spec();
    other.name = "sofr".to_string();
    assert!(matches!(
        source.fetch(&other),
        Err(LabError::SourceUnavailable { .. })
    ));
}

#[test]
fn test_invalid_json_is_schema_mismatch() {
    let source = StaticSource::new().with_payload("obfr", "<html>maintenance</html>");
    let err = SeriesLoader::load(&source, &obfr_spec()).unwrap_err();
    assert!(matches!(err, LabError::SchemaMismatch { .. }));
}
