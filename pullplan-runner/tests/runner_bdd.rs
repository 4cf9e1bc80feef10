//! BDD scenarios for the runner: catalog on disk → batch → schedule → artifacts.

use std::fs;
use std::path::Path;

use chrono::Duration;
use pullplan_core::ScopePolicy;
use pullplan_runner::{
    format_offset, write_artifacts, BatchResolver, Catalog, CatalogError, RunnerConfig, Schedule,
};
use serde_json::{json, Value};

fn write_json(dir: &Path, name: &str, value: &Value) {
    fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn seed_catalog(dir: &Path) {
    write_json(
        dir,
        "equities.json",
        &json!({
            "common": {"vendor": "acme", "endpoint": "/bars", "resolution": "PT15M",
                       "start": "2024-01-01", "field": ["open", "close"]},
            "templates": [
                {"symbol": ["AAPL", "MSFT"]},
                {"symbol": ["SPY"], "orientation": "long"},
                {"symbol": ["QQQ"], "start": "2025-01-01", "end": "2024-01-01"}
            ]
        }),
    );
    write_json(
        dir,
        "rates.json",
        &json!({
            "templates": [{"vendor": "fed", "endpoint": "/series", "resolution": "P1D",
                           "start": "2020-01-01", "symbol": ["DGS10"], "field": ["value"]}]
        }),
    );
    write_json(dir, "_schema.json", &json!({"type": "object"}));
    fs::write(dir.join("notes.txt"), "not a document").unwrap();
}

#[test]
fn bdd_scenario_catalog_run_end_to_end() {
    // GIVEN a templates directory with two documents, a schema file and a stray note
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    seed_catalog(templates.path());

    // WHEN the catalog is loaded
    let catalog = Catalog::load_dir(templates.path()).unwrap();

    // THEN only the two documents are present, in name order
    assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["equities", "rates"]);
    assert!(catalog.get("equities").unwrap().path.is_some());

    // WHEN it is resolved with the default config
    let config = RunnerConfig::default();
    let batch = BatchResolver::from_config(&config).resolve_catalog(&catalog);

    // THEN the reversed template fails alone and the rest plan
    let equities = batch.get("equities").unwrap().report().unwrap();
    assert_eq!(equities.plans().count(), 2);
    assert_eq!(equities.failures().count(), 1);
    assert_eq!(batch.unit_count(), 4 + 2 + 1);

    // WHEN artifacts are written
    let written = write_artifacts(output.path(), &batch).unwrap();

    // THEN each document has units.csv and report.json
    assert_eq!(written.len(), 4);
    let units = fs::read_to_string(output.path().join("equities/units.csv")).unwrap();
    assert_eq!(units.lines().count(), 1 + 6);
    assert!(units.contains("1,acme,/bars,2024-01-01,,PT15M,SPY,close,1,2"));
    let report: Value = serde_json::from_str(
        &fs::read_to_string(output.path().join("rates/report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["status"], "resolved");
    assert_eq!(report["fingerprint"].as_str().unwrap().len(), 64);
}

#[test]
fn bdd_scenario_schedule_from_catalog() {
    // GIVEN a 15-minute and a daily plan, and a market-hours window
    let templates = tempfile::tempdir().unwrap();
    seed_catalog(templates.path());
    let config = RunnerConfig::from_toml(
        "[schedule]\nfirst_cycle = \"PT9H30M\"\nlast_cycle = \"PT10H30M\"",
    )
    .unwrap();

    // WHEN the schedule is derived
    let catalog = Catalog::load_dir(templates.path()).unwrap();
    let batch = BatchResolver::from_config(&config).resolve_catalog(&catalog);
    let schedule = Schedule::build(&batch, &config.schedule).unwrap();

    // THEN it ticks every 15 minutes across the window
    assert_eq!(schedule.interval.as_str(), "PT15M");
    let ticks: Vec<String> = schedule.cycles().map(format_offset).collect();
    assert_eq!(
        ticks,
        vec!["09:30:00", "09:45:00", "10:00:00", "10:15:00", "10:30:00"]
    );

    // AND the daily plan is only due on the first tick
    let daily_due = |offset: Duration| {
        schedule
            .due_at(offset)
            .any(|item| item.document == "rates")
    };
    assert!(daily_due(Duration::minutes(9 * 60 + 30)));
    assert!(!daily_due(Duration::minutes(9 * 60 + 45)));
}

#[test]
fn bdd_scenario_strict_scope_from_config() {
    // GIVEN a config that requires every template to carry a date
    let config = RunnerConfig::from_toml("scope = \"require\"\nparallel = false").unwrap();
    assert_eq!(config.scope, ScopePolicy::Require);
    let catalog = Catalog::from_documents([(
        "reference",
        json!({"templates": [{"vendor": "acme", "endpoint": "/meta",
            "symbol": ["A"], "field": ["name"]}]}),
    )])
    .unwrap();

    // WHEN resolved
    let batch = BatchResolver::from_config(&config).resolve_catalog(&catalog);

    // THEN the undated template fails
    assert_eq!(batch.failure_count(), 1);
    assert!(batch.plans().next().is_none());
}

#[test]
fn bdd_scenario_corrupt_file_stops_loading() {
    // GIVEN a catalog file that is not JSON
    let templates = tempfile::tempdir().unwrap();
    fs::write(templates.path().join("broken.json"), "{ not json").unwrap();

    // WHEN loading
    let err = Catalog::load_dir(templates.path()).unwrap_err();

    // THEN the error names the file
    assert!(matches!(err, CatalogError::Json { ref path, .. } if path.ends_with("broken.json")));
}

#[test]
fn bdd_scenario_rejected_document_still_reported() {
    // GIVEN a document whose common template is invalid
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_json(
        templates.path(),
        "bad.json",
        &json!({"common": {"orientation": "diagonal"}, "templates": []}),
    );

    // WHEN the catalog is resolved and exported
    let catalog = Catalog::load_dir(templates.path()).unwrap();
    let batch = BatchResolver::default().resolve_catalog(&catalog);
    let written = write_artifacts(output.path(), &batch).unwrap();

    // THEN only report.json is written, carrying the violation
    assert_eq!(written, vec![output.path().join("bad/report.json")]);
    let report: Value =
        serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
    assert_eq!(report["status"], "rejected");
    assert_eq!(report["violations"][0]["path"], "common.orientation");
}
