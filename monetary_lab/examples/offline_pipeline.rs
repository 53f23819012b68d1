//! Run the whole pipeline on synthetic payloads shaped like the HKMA and
//! New York Fed responses, without touching the network.

use monetary_lab::loader::StaticSource;
use monetary_lab::{pipeline, PipelineConfig};
use serde_json::json;

const CONFIG: &str = r#"
[[sources]]
name = "hibor"
url = "https://api.hkma.gov.hk/hibor"
records_path = ["result", "records"]
date_field = "end_of_month"
fields = [{ from = "ir_overnight", to = "hibor_overnight" }]

[[sources]]
name = "monetary_base"
url = "https://api.hkma.gov.hk/monetary-base"
records_path = ["result", "records"]
date_field = "end_of_month"
fields = [
    { from = "aggr_balance", to = "aggregate_balance" },
    { from = "cert_of_indebtedness", to = "certificates_of_indebtedness" },
    { from = "notes_coins", to = "notes_and_coins" },
]

[[sources]]
name = "obfr"
url = "https://markets.newyorkfed.org/api/rates/unsecured/obfr/search.json"
records_path = ["refRates"]
date_field = "effectiveDate"
fields = [{ from = "percentRate", to = "obfr" }]

[[tables]]
name = "macro"
members = ["hibor", "monetary_base", "obfr"]

[[transforms]]
table = "macro"
transform = { kind = "spread", minuend = "hibor_overnight", subtrahend = "obfr", output = "spread" }

[balance_sheet]
table = "macro"
assets = []
liabilities = ["certificates_of_indebtedness", "notes_and_coins", "aggregate_balance"]
misc_components = ["notes_and_coins"]

[balance_sheet.labels]
certificates_of_indebtedness = "Certificates of Indebtedness"
aggregate_balance = "Aggregate Balance"
misc_liabilities = "Other Liabilities"

[[models]]
name = "hibor"
table = "macro"
response = "hibor_overnight"
horizon = 1
predictors = ["aggregate_balance", "obfr"]

[evaluation]
folds = 3
seed = 7
test_ratio = 0.25
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_toml(CONFIG)?;

    let months: Vec<(i32, u32)> = (0..36).map(|i| (2020 + i / 12, (i % 12) as u32 + 1)).collect();
    let balance = |i: usize| 450_000.0 - 11_000.0 * i as f64;
    let obfr = |i: usize| 0.1 + 0.12 * i as f64;

    let hibor: Vec<_> = months
        .iter()
        .enumerate()
        .map(|(i, (y, m))| {
            let value = 4.0 - balance(i) / 150_000.0 + 0.4 * obfr(i) + 0.05 * (i as f64).sin();
            json!({ "end_of_month": format!("{}-{:02}", y, m), "ir_overnight": format!("{:.4}", value) })
        })
        .collect();
    let base: Vec<_> = months
        .iter()
        .enumerate()
        .map(|(i, (y, m))| {
            let notes = if i % 7 == 0 { None } else { Some(12_500.0) };
            json!({
                "end_of_month": format!("{}-{:02}", y, m),
                "aggr_balance": balance(i),
                "cert_of_indebtedness": 520_000.0 + 900.0 * i as f64,
                "notes_coins": notes,
            })
        })
        .collect();
    // Daily observations: the last business day of each month wins
    let rates: Vec<_> = months
        .iter()
        .enumerate()
        .flat_map(|(i, (y, m))| {
            [10, 20, 27].into_iter().map(move |d| {
                json!({ "effectiveDate": format!("{}-{:02}-{:02}", y, m, d), "percentRate": obfr(i) })
            })
        })
        .collect();

    let source = StaticSource::new()
        .with_payload("hibor", json!({ "result": { "records": hibor } }).to_string())
        .with_payload("monetary_base", json!({ "result": { "records": base } }).to_string())
        .with_payload("obfr", json!({ "refRates": rates }).to_string());

    let output = pipeline::run(&config, &source)?;

    for run in &output.runs {
        println!("{}\n", run.full_sample);
        if let Some(report) = &run.out_of_sample {
            println!(
                "{}: train R² {:.3}, test R² {:.3} on {} months after {}\n",
                run.kind, report.in_sample.r_squared, report.out_of_sample.r_squared, report.out_of_sample.n, report.cutoff
            );
        }
    }
    if let Some(view) = &output.balance_sheet {
        println!("balance sheet view: {} long-form records", view.to_long().len());
    }
    Ok(())
}
