use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::simulation::SimulationResults;

// ═══════════════════════════════════════════════════════════════════════
// File exports — CSV time series, JSON results, TOML run config
// ═══════════════════════════════════════════════════════════════════════

/// Parameters of a run, echoed to disk next to the results so a run
/// directory is self-describing and reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub scenario: String,
    pub seed: u64,
    pub horizon_days: usize,
    pub enable_feedback: bool,
    pub feedback_iterations: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            scenario: "fast_channel".to_string(),
            seed: crate::config::DEFAULT_SEED,
            horizon_days: crate::config::DEFAULT_HORIZON_DAYS,
            enable_feedback: true,
            feedback_iterations: crate::config::DEFAULT_FEEDBACK_ITERATIONS,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = fs::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&text)?;
        Ok(config)
    }
}

/// Save the daily market time series as CSV.
pub fn save_market_csv(
    results: &SimulationResults,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for snapshot in &results.daily_market {
        writer.serialize(snapshot)?;
    }
    writer.flush()?;
    Ok(())
}

/// Save per-agent daily snapshots as CSV (one row per agent per day).
pub fn save_agents_csv(
    results: &SimulationResults,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for snapshot in &results.daily_agents {
        writer.serialize(snapshot)?;
    }
    writer.flush()?;
    Ok(())
}

/// Save amplification ratios as CSV, one row per agent/aggregate key.
pub fn save_amplification_csv(
    results: &SimulationResults,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["entity", "amplification_ratio"])?;
    for (name, ratio) in &results.amplification_ratios {
        writer.write_record([name.as_str(), &format!("{:.6}", ratio)])?;
    }
    writer.flush()?;
    Ok(())
}

/// Save the full results structure as pretty-printed JSON.
pub fn save_results_json(
    results: &SimulationResults,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(results)?;
    fs::write(path, json)?;
    Ok(())
}

/// Save the run configuration as TOML, with a generation timestamp.
pub fn save_run_config_toml(
    config: &RunConfig,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let body = toml::to_string_pretty(config)?;
    let stamped = format!(
        "# generated {}\n{}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        body
    );
    fs::write(path, stamped)?;
    Ok(())
}

/// Save everything for a run into a directory.
pub fn save_all(
    results: &SimulationResults,
    config: &RunConfig,
    output_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(output_dir)?;
    save_market_csv(results, &output_dir.join("daily_market.csv"))?;
    save_agents_csv(results, &output_dir.join("daily_agents.csv"))?;
    save_amplification_csv(results, &output_dir.join("amplification.csv"))?;
    save_results_json(results, &output_dir.join("results.json"))?;
    save_run_config_toml(config, &output_dir.join("run_config.toml"))?;
    Ok(())
}

/// Print a human-readable run summary to stdout.
pub fn print_summary(results: &SimulationResults) {
    let s = &results.summary;
    println!();
    println!("=== {} ===", results.scenario_name);
    println!(
        "  Agents reacted:        {}/{}",
        s.agents_reacted, s.total_agents
    );
    println!("  Total margin calls:    {:.0}mm", s.total_margin_calls_mm);
    println!("  Total asset sales:     {:.0}mm", s.total_asset_sales_mm);
    println!("  NBFI gilt sales:       {:.0}mm", s.nbfi_gilt_sales_mm);
    println!("  Total repo demand:     {:.0}mm", s.total_repo_demand_mm);
    println!(
        "  Gilt 10y yield change: {:+.1}bps",
        s.final_gilt_yield_chg_bps
    );
    println!(
        "  IG spread change:      {:+.1}bps",
        s.final_ig_spread_chg_bps
    );
    println!(
        "  Repo availability:     {:.0}%",
        s.final_repo_availability_pct * 100.0
    );
    println!(
        "  HFs seeking repo:      {} ({} refused by all)",
        s.hfs_seeking_repo, s.hfs_refused_by_all
    );
    if let Some(system) = results.amplification_ratios.get("System-Wide") {
        println!("  System amplification:  {:.3}x", system);
    }
}
