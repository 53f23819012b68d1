use monetary_lab::error::LabError;
use regress_math::MathError;
use std::io;

#[test]
fn test_error_conversion() {
    // IO errors keep their kind
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    match LabError::from(io_error) {
        LabError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
        other => panic!("Expected Io variant, got {:?}", other),
    }

    // Fold errors from the kernels surface as pipeline errors
    let math = MathError::InsufficientFolds { folds: 5, rows: 3 };
    assert!(matches!(
        LabError::from(math),
        LabError::InsufficientFolds { folds: 5, rows: 3 }
    ));

    let math = MathError::InvalidInput("n_lambda must be greater than zero".to_string());
    assert!(matches!(LabError::from(math), LabError::InvalidParameter(_)));

    let math = MathError::CalculationError("overflow".to_string());
    assert!(matches!(LabError::from(math), LabError::Math(_)));
}

#[test]
fn test_error_display_carries_context() {
    let error = LabError::SourceUnavailable {
        series: "obfr".to_string(),
        reason: "HTTP status 503".to_string(),
    };
    let message = error.to_string();
    assert!(message.contains("obfr"));
    assert!(message.contains("503"));

    let error = LabError::SchemaMismatch {
        series: "hibor".to_string(),
        detail: "record for 202301 lacks field 'ir_1m'".to_string(),
    };
    assert!(error.to_string().contains("ir_1m"));

    let error = LabError::UnparseableDate {
        value: "2023-13".to_string(),
        reason: "month out of range".to_string(),
    };
    assert!(error.to_string().contains("2023-13"));

    let error = LabError::SingularDesign {
        column: "aggregate_balance".to_string(),
        rank: 2,
    };
    assert!(error.to_string().contains("aggregate_balance"));

    let error = LabError::UnmappedField {
        field: "fiscal_reserves".to_string(),
    };
    assert!(error.to_string().contains("fiscal_reserves"));

    let error = LabError::EmptyDesignMatrix {
        response: "hibor_overnight".to_string(),
    };
    assert!(error.to_string().contains("hibor_overnight"));
}

#[test]
fn test_errors_work_with_anyhow() {
    fn fails() -> anyhow::Result<()> {
        Err(LabError::ResponseNotFound("cpi".to_string()).into())
    }
    let err = fails().unwrap_err();
    assert!(err.to_string().contains("cpi"));
    assert!(err.downcast_ref::<LabError>().is_some());
}
