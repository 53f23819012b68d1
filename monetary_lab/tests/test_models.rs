use approx::assert_relative_eq;
use monetary_lab::data::{AnalysisTable, TimeTable};
use monetary_lab::error::LabError;
use monetary_lab::loader::{FieldMapping, SeriesLoader, SourceSpec};
use monetary_lab::models::{
    build_design, Estimator, LassoCv, LassoCvSettings, ModelKind, ModelSpec, Ols, RegressionModel,
    INTERCEPT,
};
use monetary_lab::period::{Granularity, Period};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn months(n: usize) -> Vec<Period> {
    (0..n)
        .map(|i| Period::monthly(2015 + (i / 12) as i32, (i % 12) as u32 + 1).unwrap())
        .collect()
}

fn analysis(columns: &[(&str, Vec<Option<f64>>)]) -> AnalysisTable {
    let n = columns[0].1.len();
    let rows = months(n)
        .into_iter()
        .enumerate()
        .map(|(i, p)| (p, columns.iter().map(|(_, v)| v[i]).collect()))
        .collect();
    let names = columns.iter().map(|(name, _)| name.to_string()).collect();
    let table = TimeTable::from_rows("test", Granularity::Monthly, names, rows).unwrap();
    AnalysisTable::new(table, vec!["test".to_string()])
}

fn ten_periods() -> AnalysisTable {
    analysis(&[
        ("rate", (1..=10).map(|i| Some(i as f64 * 10.0)).collect()),
        ("balance", (1..=10).map(|i| Some(i as f64)).collect()),
    ])
}

#[test]
fn test_lead_excludes_last_rows() {
    let table = ten_periods();
    let spec = ModelSpec::new("rate", vec!["balance".to_string()]).with_horizon(2);

    let design = build_design(&table, &spec).unwrap();

    assert_eq!(design.len(), 8);
    assert_eq!(design.periods(), &table.periods()[..8]);
    for i in 0..8 {
        // Response at row i is the rate two periods later
        assert_eq!(design.y()[i], (i as f64 + 3.0) * 10.0);
        assert_eq!(design.x()[[i, 0]], i as f64 + 1.0);
    }
}

#[test]
fn test_lag_excludes_first_rows() {
    let table = ten_periods();
    let spec = ModelSpec::new("rate", vec!["balance".to_string()]).with_horizon(-3);

    let design = build_design(&table, &spec).unwrap();

    assert_eq!(design.len(), 7);
    assert_eq!(design.periods(), &table.periods()[3..]);
    assert_eq!(design.y()[0], 10.0);
    assert_eq!(design.x()[[0, 0]], 4.0);
}

#[test]
fn test_complete_case_omission() {
    let table = analysis(&[
        ("rate", vec![Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)]),
        ("a", vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)]),
        ("b", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), None]),
    ]);
    let spec = ModelSpec::new("rate", vec!["a".to_string(), "b".to_string()]);

    let design = build_design(&table, &spec).unwrap();

    assert_eq!(design.len(), 2);
    assert_eq!(design.y().to_vec(), vec![1.0, 4.0]);
    assert_eq!(design.predictors(), &["a".to_string(), "b".to_string()]);
}

#[test]
fn test_filter_selection() {
    let table = analysis(&[
        ("hibor_overnight", vec![Some(1.0); 4]),
        ("hibor_1m", vec![Some(1.0); 4]),
        ("aggregate_balance", vec![Some(1.0); 4]),
        ("obfr", vec![Some(1.0); 4]),
        ("hibor_obfr_spread", vec![Some(1.0); 4]),
    ]);

    let spec = ModelSpec::filtered("hibor_overnight", vec![], vec!["hibor".to_string()]);
    assert_eq!(
        spec.resolve_predictors(&table).unwrap(),
        vec!["aggregate_balance".to_string(), "obfr".to_string()]
    );

    let spec = ModelSpec::filtered(
        "hibor_overnight",
        vec!["hibor".to_string(), "balance".to_string()],
        vec!["spread".to_string()],
    );
    assert_eq!(
        spec.resolve_predictors(&table).unwrap(),
        vec!["hibor_1m".to_string(), "aggregate_balance".to_string()]
    );

    let spec = ModelSpec::filtered("hibor_overnight", vec!["cpi".to_string()], vec![]);
    assert!(matches!(
        spec.resolve_predictors(&table),
        Err(LabError::PredictorNotFound(_))
    ));
}

#[rstest]
#[case("missing", vec!["balance"], 0)]
#[case("rate", vec!["balance", "missing"], 0)]
#[case("rate", vec!["balance"], 10)]
#[case("rate", vec!["balance"], -12)]
fn test_design_errors(#[case] response: &str, #[case] predictors: Vec<&str>, #[case] horizon: i32) {
    let table = ten_periods();
    let spec = ModelSpec::new(response, predictors.iter().map(|p| p.to_string()).collect())
        .with_horizon(horizon);

    let err = build_design(&table, &spec).unwrap_err();
    match (response, predictors.len(), err) {
        ("missing", _, LabError::ResponseNotFound(name)) => assert_eq!(name, "missing"),
        (_, 2, LabError::PredictorNotFound(name)) => assert_eq!(name, "missing"),
        (_, 1, LabError::EmptyDesignMatrix { response }) => assert_eq!(response, "rate"),
        (_, _, other) => panic!("Unexpected error {:?}", other),
    }
}

#[test]
fn test_design_split_is_chronological() {
    let table = ten_periods();
    let design = build_design(&table, &ModelSpec::new("rate", vec!["balance".to_string()])).unwrap();
    let cutoff = table.periods()[6];

    let (train, test) = design.split_at(cutoff);

    assert!(train.periods().iter().all(|p| *p < cutoff));
    assert!(test.periods().iter().all(|p| *p >= cutoff));
    let rejoined: Vec<Period> = train.periods().iter().chain(test.periods()).copied().collect();
    assert_eq!(rejoined, design.periods().to_vec());
    assert_eq!(train.y().len() + test.y().len(), design.len());
    assert_eq!(test.x()[[0, 0]], 7.0);
}

#[test]
fn test_lead_split_keeps_responses_on_their_side() {
    let table = ten_periods();
    let design = build_design(&table, &ModelSpec::new("rate", vec!["balance".to_string()]).with_horizon(2)).unwrap();
    let cutoff = Period::monthly(2015, 6).unwrap();

    let (train, test) = design.split_at(cutoff);

    // Rows for April and May read their response from June and July
    assert!(train.response_periods().iter().all(|p| *p < cutoff));
    assert!(test.periods().iter().all(|p| *p >= cutoff));
    assert_eq!(train.y().to_vec(), vec![30.0, 40.0, 50.0]);
    assert_eq!(test.y().to_vec(), vec![80.0, 90.0, 100.0]);
    assert_eq!(train.len() + test.len(), design.len() - 2);

    // Same rows as building each part from the split table
    let (train_table, test_table) = table.split_at(cutoff);
    let spec = ModelSpec::new("rate", vec!["balance".to_string()]).with_horizon(2);
    assert_eq!(build_design(&train_table, &spec).unwrap(), train);
    assert_eq!(build_design(&test_table, &spec).unwrap(), test);
}

#[test]
fn test_lag_split_keeps_responses_on_their_side() {
    let table = ten_periods();
    let spec = ModelSpec::new("rate", vec!["balance".to_string()]).with_horizon(-1);
    let design = build_design(&table, &spec).unwrap();
    let cutoff = Period::monthly(2015, 6).unwrap();

    let (train, test) = design.split_at(cutoff);

    assert!(test.response_periods().iter().all(|p| *p >= cutoff));
    assert_eq!(test.y().to_vec(), vec![60.0, 70.0, 80.0, 90.0]);
    assert_eq!(train.len(), 4);
}

#[test]
fn test_ols_hand_computed() {
    let table = analysis(&[
        ("y", vec![Some(2.0), Some(4.0), Some(5.0), Some(4.0), Some(5.0)]),
        ("x", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]),
    ]);
    let design = build_design(&table, &ModelSpec::new("y", vec!["x".to_string()])).unwrap();

    let model = Ols::new().fit(&design).unwrap();

    assert_eq!(model.kind(), ModelKind::Ols);
    assert_eq!(model.penalty(), 0.0);
    assert_relative_eq!(model.intercept(), 2.2, epsilon = 1e-10);
    assert_relative_eq!(model.coefficient("x").unwrap(), 0.6, epsilon = 1e-10);

    let solution = model.ols_solution().unwrap();
    assert_relative_eq!(solution.r_squared, 0.6, epsilon = 1e-10);
    assert_relative_eq!(solution.sigma, (2.4f64 / 3.0).sqrt(), epsilon = 1e-10);
    assert_eq!(model.training().n_obs, 5);
    assert_eq!(model.training().first, table.periods()[0]);
    assert_eq!(model.training().last, table.periods()[4]);

    let rows = model.coefficient_table();
    assert_eq!(rows[0].term, INTERCEPT);
    assert_eq!(rows[1].term, "x");
    assert_relative_eq!(rows[1].std_error.unwrap(), 0.08f64.sqrt(), epsilon = 1e-10);
    assert!(rows[1].p_value.unwrap() > 0.0 && rows[1].p_value.unwrap() < 1.0);

    let summary = model.to_string();
    assert!(summary.contains("OLS model for y"));
    assert!(summary.contains("R² 0.6000"));
}

#[test]
fn test_ols_reports_aliased_predictor() {
    let table = analysis(&[
        ("y", vec![Some(1.0), Some(3.0), Some(2.0), Some(5.0), Some(4.0)]),
        ("a", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]),
        ("b", vec![Some(2.0), Some(4.0), Some(6.0), Some(8.0), Some(10.0)]),
    ]);
    let design =
        build_design(&table, &ModelSpec::new("y", vec!["a".to_string(), "b".to_string()])).unwrap();

    match Ols::new().fit(&design).unwrap_err() {
        LabError::SingularDesign { column, rank } => {
            assert_eq!(column, "b");
            assert_eq!(rank, 2);
        }
        other => panic!("Expected SingularDesign, got {:?}", other),
    }
}

#[test]
fn test_ols_constant_predictor_aliases_intercept() {
    let table = analysis(&[
        ("y", vec![Some(1.0), Some(3.0), Some(2.0), Some(5.0)]),
        ("flat", vec![Some(7.0); 4]),
    ]);
    let design = build_design(&table, &ModelSpec::new("y", vec!["flat".to_string()])).unwrap();

    assert!(matches!(
        Ols::new().fit(&design),
        Err(LabError::SingularDesign { column, .. }) if column == "flat"
    ));
}

#[test]
fn test_ols_needs_enough_rows() {
    let table = analysis(&[
        ("y", vec![Some(1.0), Some(2.0)]),
        ("a", vec![Some(1.0), Some(5.0)]),
        ("b", vec![Some(3.0), Some(1.0)]),
    ]);
    let design =
        build_design(&table, &ModelSpec::new("y", vec!["a".to_string(), "b".to_string()])).unwrap();
    match Ols::new().fit(&design).unwrap_err() {
        LabError::SingularDesign { column, rank } => {
            assert_eq!(column, "(rows < parameters: 2 < 3)");
            assert_eq!(rank, 2);
        }
        other => panic!("Expected SingularDesign, got {:?}", other),
    }
}

/// y depends on x1 only; x2 and x3 are deterministic distractors
fn sparse_signal(n: usize) -> AnalysisTable {
    let x1: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin() * 4.0 + i as f64 * 0.05).collect();
    let x2: Vec<f64> = (0..n).map(|i| (i as f64 * 1.3).cos() * 2.0).collect();
    let x3: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64 - 5.0).collect();
    let y: Vec<f64> = (0..n)
        .map(|i| 1.5 + 3.0 * x1[i] + 0.02 * (i as f64 * 2.9).sin())
        .collect();

    let wrap = |v: &[f64]| v.iter().map(|x| Some(*x)).collect::<Vec<_>>();
    analysis(&[("y", wrap(&y)), ("x1", wrap(&x1)), ("x2", wrap(&x2)), ("x3", wrap(&x3))])
}

fn lasso(seed: u64) -> LassoCv {
    LassoCv::new(LassoCvSettings {
        seed,
        ..LassoCvSettings::default()
    })
    .unwrap()
}

#[test]
fn test_lasso_recovers_sparse_signal() {
    let table = sparse_signal(60);
    let spec = ModelSpec::filtered("y", vec!["x".to_string()], vec![]);
    let design = build_design(&table, &spec).unwrap();

    let model = lasso(11).fit(&design).unwrap();

    assert_eq!(model.kind(), ModelKind::Lasso);
    assert!(model.penalty() > 0.0);
    assert!((model.coefficient("x1").unwrap() - 3.0).abs() < 0.05);
    assert!(model.coefficient("x2").unwrap().abs() < 0.05);
    assert!(model.coefficient("x3").unwrap().abs() < 0.05);
    assert!((model.intercept() - 1.5).abs() < 0.1);

    let curve = model.cv_curve().unwrap();
    assert_eq!(curve.lambdas.len(), 100);
    assert_eq!(model.penalty(), curve.lambda_min());
    let best = curve.mean_error[curve.best_index];
    assert!(curve.mean_error.iter().all(|e| *e >= best));
}

#[test]
fn test_lasso_is_reproducible_for_a_seed() {
    let design = build_design(
        &sparse_signal(40),
        &ModelSpec::new("y", vec!["x1".to_string(), "x2".to_string(), "x3".to_string()]),
    )
    .unwrap();

    let first = lasso(5).fit(&design).unwrap();
    let second = lasso(5).fit(&design).unwrap();
    let other = lasso(6).fit(&design).unwrap();

    assert_eq!(first.penalty(), second.penalty());
    assert_eq!(first.coefficients(), second.coefficients());
    assert_eq!(first.cv_curve().unwrap().fold_ids, second.cv_curve().unwrap().fold_ids);
    assert_ne!(first.cv_curve().unwrap().fold_ids, other.cv_curve().unwrap().fold_ids);
}

#[test]
fn test_lasso_fold_checks() {
    let table = ten_periods();
    let design = build_design(&table, &ModelSpec::new("rate", vec!["balance".to_string()]).with_horizon(7)).unwrap();
    assert_eq!(design.len(), 3);

    let settings = LassoCvSettings {
        folds: 4,
        ..LassoCvSettings::default()
    };
    assert!(matches!(
        LassoCv::new(settings).unwrap().fit(&design),
        Err(LabError::InsufficientFolds { folds: 4, rows: 3 })
    ));

    let settings = LassoCvSettings {
        folds: 1,
        ..LassoCvSettings::default()
    };
    assert!(matches!(LassoCv::new(settings), Err(LabError::InvalidParameter(_))));
}

#[test]
fn test_lasso_reports_exhausted_sweeps() {
    let spec = ModelSpec::filtered("y", vec!["x".to_string()], vec![]);
    let design = build_design(&sparse_signal(60), &spec).unwrap();

    let one_sweep = LassoCv::new(LassoCvSettings {
        max_iter: 1,
        tolerance: 1e-15,
        ..LassoCvSettings::default()
    })
    .unwrap();
    let model = one_sweep.fit(&design).unwrap();
    assert!(model.cv_curve().unwrap().unconverged_fits > 0);
}

#[test]
fn test_estimator_dispatch() {
    let design = build_design(
        &sparse_signal(30),
        &ModelSpec::new("y", vec!["x1".to_string()]),
    )
    .unwrap();

    let estimators = [Estimator::Ols(Ols::new()), Estimator::Lasso(lasso(1))];
    for estimator in &estimators {
        let model = estimator.fit(&design).unwrap();
        assert_eq!(model.kind(), estimator.kind());
        assert_eq!(model.training().n_obs, 30);
        let predictions = model.predict_design(&design).unwrap();
        assert_eq!(predictions.len(), 30);
    }
    assert_eq!(estimators[0].name(), "OLS");
    assert_eq!(estimators[1].name(), "LASSO");
}

#[test]
fn test_non_finite_cells_do_not_reach_the_fit() {
    let document = serde_json::json!({
        "rows": [
            { "date": "2023-01", "rate": 2.0, "balance": 1.0 },
            { "date": "2023-02", "rate": 4.0, "balance": "NaN" },
            { "date": "2023-03", "rate": 5.0, "balance": 3.0 },
            { "date": "2023-04", "rate": "inf", "balance": 4.0 },
            { "date": "2023-05", "rate": 5.0, "balance": 5.0 },
        ]
    });
    let spec = SourceSpec {
        name: "mixed".to_string(),
        url: String::new(),
        records_path: vec!["rows".to_string()],
        date_field: "date".to_string(),
        date_format: None,
        granularity: Granularity::Monthly,
        fields: vec![
            FieldMapping::new("rate", "rate"),
            FieldMapping::new("balance", "balance"),
        ],
    };
    let series = SeriesLoader::from_json(&spec, &document).unwrap();
    let table = AnalysisTable::new(series, vec!["mixed".to_string()]);

    let design = build_design(&table, &ModelSpec::new("rate", vec!["balance".to_string()])).unwrap();
    let model = Ols::new().fit(&design).unwrap();

    assert_eq!(design.len(), 3);
    assert!(model.intercept().is_finite());
    assert!(model.coefficient("balance").unwrap().is_finite());
}
