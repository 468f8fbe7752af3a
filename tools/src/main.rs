//! gate-runner: headless batch runner for the validation gate.
//!
//! Usage:
//!   gate-runner --input-dir ./batch --db bank.db
//!   gate-runner --input-dir ./batch --output-dir ./out --as-of 2024-05-01T00:00:00 --json

use anyhow::Result;
use bankgate_core::{
    batch_io,
    config::GateConfig,
    engine::{GateEngine, GateOutcome},
    gateway::PersistedStore,
    record::{format_timestamp, parse_timestamp},
    run_log::RunLog,
    store::GateStore,
};
use std::env;
use std::path::Path;

const DEFAULT_CONFIG: &str = "data/gate_config.json";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(input_dir) = flag_value(&args, "--input-dir") else {
        anyhow::bail!("--input-dir is required");
    };
    let output_dir = flag_value(&args, "--output-dir").unwrap_or(input_dir);
    let db = flag_value(&args, "--db");
    let config_path = flag_value(&args, "--config");
    let json = args.iter().any(|a| a == "--json");
    let as_of = match flag_value(&args, "--as-of") {
        Some(raw) => parse_timestamp(raw)
            .ok_or_else(|| anyhow::anyhow!("--as-of: cannot parse '{raw}' as a timestamp"))?,
        None => chrono::Utc::now().naive_utc(),
    };

    let config = load_config(config_path)?;

    if !json {
        println!("Bank validation gate: gate-runner");
        println!("  input:   {input_dir}");
        println!("  output:  {output_dir}");
        println!("  db:      {}", db.unwrap_or("(none)"));
        println!("  as-of:   {}", format_timestamp(as_of));
        println!();
    }

    // An unopenable store is an outage, not a fatal error.
    let store = db.and_then(|path| match GateStore::open_existing(path) {
        Ok(store) => Some(store),
        Err(e) => {
            log::warn!("persisted store {path} unavailable: {e}; running degraded");
            None
        }
    });

    let mut engine = GateEngine::build(config, as_of);
    if let Some(store) = store.as_ref() {
        engine = engine.with_store(store as &dyn PersistedStore);
    }

    let mut log = RunLog::new(engine.run_id.clone());
    let batch = batch_io::load_batch(Path::new(input_dir), &mut log)?;
    let outcome = engine.run_with_log(&batch, log);
    let written = batch_io::write_outputs(Path::new(output_dir), &outcome)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&outcome))?);
    } else {
        print_summary(&outcome, &written);
    }
    Ok(())
}

fn load_config(path: Option<&str>) -> Result<GateConfig> {
    match path {
        Some(path) => GateConfig::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => GateConfig::load(DEFAULT_CONFIG),
        None => {
            log::info!("no config file; using built-in defaults");
            Ok(GateConfig::default())
        }
    }
}

fn summary_json(outcome: &GateOutcome) -> serde_json::Value {
    serde_json::json!({
        "run_id": outcome.report.run_id,
        "status": outcome.status(),
        "issues": outcome.report.issues.len(),
        "warnings": outcome.report.warnings.len(),
        "failed_records": outcome.report.failed_count(),
        "alerts": outcome.alerts.len(),
        "data_summary": outcome.report.data_summary,
    })
}

fn print_summary(outcome: &GateOutcome, written: &[String]) {
    let report = &outcome.report;
    println!("=== GATE SUMMARY ===");
    println!("  run_id:    {}", report.run_id);
    println!("  status:    {:?}", outcome.status());
    println!("  issues:    {}", report.issues.len());
    println!("  warnings:  {}", report.warnings.len());
    println!("  alerts:    {}", outcome.alerts.len());
    println!();
    for (collection, summary) in &report.data_summary {
        println!(
            "  {collection:<13} total {:>6} | clean {:>6} | failed {:>6}",
            summary.total, summary.clean, summary.failed
        );
    }

    let resolution = &outcome.resolution;
    println!();
    println!("=== REFERENCES ===");
    println!("  deferred to store:   {}", resolution.deferred);
    println!("  resolved from store: {}", resolution.resolved_from_store);
    println!("  rejected targets:    {}", resolution.rejected_targets);
    println!("  unresolved:          {}", resolution.unresolved);
    println!("  cascaded rejections: {}", resolution.cascaded);

    println!();
    for path in written {
        println!("  wrote {path}");
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
