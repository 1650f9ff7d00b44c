use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::network::RelationshipNetwork;
use crate::population::generate_population;
use crate::scenario::Scenario;
use crate::simulation::{run_simulation, SimulationConfig};

// ═══════════════════════════════════════════════════════════════════════
// Multi-seed sweeps — how sensitive are the headline numbers to the
// random population and network draw?
// ═══════════════════════════════════════════════════════════════════════

/// Headline figures from one seeded run.
#[derive(Debug, Clone)]
pub struct SweepResult {
    pub seed: u64,
    pub system_amplification: f64,
    pub agents_reacted: usize,
    pub total_asset_sales_mm: f64,
    pub total_margin_calls_mm: f64,
    pub final_gilt_yield_chg_bps: f64,
    pub hfs_refused_by_all: usize,
}

/// Aggregate statistics over a sweep.
#[derive(Debug, Clone)]
pub struct SweepAggregate {
    pub runs: usize,
    pub mean_amplification: f64,
    pub min_amplification: f64,
    pub max_amplification: f64,
    pub mean_agents_reacted: f64,
    pub mean_asset_sales_mm: f64,
}

/// Engine that replays one scenario across many population seeds.
pub struct SweepEngine {
    pub scenario: Scenario,
    pub sim_config: SimulationConfig,
}

impl SweepEngine {
    pub fn new(scenario: Scenario, sim_config: SimulationConfig) -> Self {
        SweepEngine { scenario, sim_config }
    }

    /// Run the scenario once per seed, in parallel. Each run draws a
    /// fresh population and network so the sweep measures structural
    /// sensitivity, not path dependence.
    pub fn run_seeds(&self, start_seed: u64, count: usize) -> Vec<SweepResult> {
        let bar = ProgressBar::new(count as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{bar:40} {pos}/{len} seeds ({elapsed})")
        {
            bar.set_style(style);
        }
        let mut results: Vec<SweepResult> = (0..count)
            .into_par_iter()
            .map(|i| {
                let seed = start_seed.wrapping_add(i as u64);
                let mut agents = generate_population(seed);
                let network = RelationshipNetwork::build(&agents, seed);
                let run = run_simulation(&mut agents, &network, &self.scenario, &self.sim_config);
                bar.inc(1);
                SweepResult {
                    seed,
                    system_amplification: run
                        .amplification_ratios
                        .get("System-Wide")
                        .copied()
                        .unwrap_or(1.0),
                    agents_reacted: run.summary.agents_reacted,
                    total_asset_sales_mm: run.summary.total_asset_sales_mm,
                    total_margin_calls_mm: run.summary.total_margin_calls_mm,
                    final_gilt_yield_chg_bps: run.summary.final_gilt_yield_chg_bps,
                    hfs_refused_by_all: run.summary.hfs_refused_by_all,
                }
            })
            .collect();
        bar.finish_and_clear();
        results.sort_by_key(|r| r.seed);
        results
    }
}

pub fn aggregate(results: &[SweepResult]) -> SweepAggregate {
    let n = results.len().max(1) as f64;
    let amps: Vec<f64> = results.iter().map(|r| r.system_amplification).collect();
    SweepAggregate {
        runs: results.len(),
        mean_amplification: amps.iter().sum::<f64>() / n,
        min_amplification: amps.iter().copied().fold(f64::INFINITY, f64::min),
        max_amplification: amps.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean_agents_reacted: results.iter().map(|r| r.agents_reacted as f64).sum::<f64>() / n,
        mean_asset_sales_mm: results.iter().map(|r| r.total_asset_sales_mm).sum::<f64>() / n,
    }
}

/// Save sweep results as CSV, one row per seed.
pub fn save_sweep_csv(
    results: &[SweepResult],
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "seed",
        "system_amplification",
        "agents_reacted",
        "total_asset_sales_mm",
        "total_margin_calls_mm",
        "final_gilt_yield_chg_bps",
        "hfs_refused_by_all",
    ])?;
    for r in results {
        writer.write_record([
            r.seed.to_string(),
            format!("{:.6}", r.system_amplification),
            r.agents_reacted.to_string(),
            format!("{:.2}", r.total_asset_sales_mm),
            format!("{:.2}", r.total_margin_calls_mm),
            format!("{:.2}", r.final_gilt_yield_chg_bps),
            r.hfs_refused_by_all.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
