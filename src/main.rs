use clap::{Parser, Subcommand};
use std::path::PathBuf;

use swes_sim::network::RelationshipNetwork;
use swes_sim::output::{self, RunConfig};
use swes_sim::population::generate_population;
use swes_sim::scenario::{Scenario, ScenarioId};
use swes_sim::simulation::{run_simulation, SimulationConfig, SimulationResults};
use swes_sim::sweep::{self, SweepEngine};

#[derive(Parser)]
#[command(name = "swes-sim", about = "System-wide liquidity stress simulator for the gilt market")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single stress scenario
    Run {
        /// Scenario name (fast_channel, mild, severe)
        #[arg(long, default_value = "fast_channel")]
        scenario: String,

        /// Load the scenario from a JSON file instead
        #[arg(long)]
        scenario_file: Option<PathBuf>,

        /// Load run parameters from a TOML file (CLI flags override)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Random seed for population and network generation
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Simulation horizon in days
        #[arg(long, default_value = "10")]
        days: usize,

        /// Feedback iterations per day
        #[arg(long, default_value = "3")]
        iterations: usize,

        /// Disable second-round feedback (stage 3)
        #[arg(long)]
        no_feedback: bool,

        /// Output directory
        #[arg(long, default_value = "output/run")]
        output_dir: String,
    },

    /// Run a scenario with and without feedback and compare amplification
    Compare {
        /// Scenario name (fast_channel, mild, severe)
        #[arg(long, default_value = "fast_channel")]
        scenario: String,

        /// Random seed for population and network generation
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Simulation horizon in days
        #[arg(long, default_value = "10")]
        days: usize,

        /// Feedback iterations per day
        #[arg(long, default_value = "3")]
        iterations: usize,

        /// Output directory
        #[arg(long, default_value = "output/compare")]
        output_dir: String,
    },

    /// Replay a scenario across many population seeds in parallel
    Sweep {
        /// Scenario name (fast_channel, mild, severe)
        #[arg(long, default_value = "fast_channel")]
        scenario: String,

        /// First seed of the sweep
        #[arg(long, default_value = "42")]
        start_seed: u64,

        /// Number of seeds
        #[arg(long, default_value = "50")]
        seeds: usize,

        /// Simulation horizon in days
        #[arg(long, default_value = "10")]
        days: usize,

        /// Feedback iterations per day
        #[arg(long, default_value = "3")]
        iterations: usize,

        /// Output CSV path
        #[arg(long, default_value = "output/sweep/seeds.csv")]
        output: String,
    },
}

fn resolve_scenario(
    name: &str,
    file: Option<&PathBuf>,
    days: usize,
) -> Result<Scenario, Box<dyn std::error::Error>> {
    if let Some(path) = file {
        return Scenario::load(path);
    }
    let id = ScenarioId::parse(name)?;
    Ok(id.generate(days))
}

fn run_once(
    scenario: &Scenario,
    seed: u64,
    sim_config: &SimulationConfig,
) -> SimulationResults {
    let mut agents = generate_population(seed);
    let network = RelationshipNetwork::build(&agents, seed);
    run_simulation(&mut agents, &network, scenario, sim_config)
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            scenario_file,
            config,
            seed,
            days,
            iterations,
            no_feedback,
            output_dir,
        } => {
            let mut run_config = match &config {
                Some(path) => match RunConfig::load(path) {
                    Ok(c) => c,
                    Err(e) => {
                        eprintln!("Error loading config {}: {}", path.display(), e);
                        std::process::exit(1);
                    }
                },
                None => RunConfig::default(),
            };
            run_config.scenario = scenario;
            run_config.seed = seed;
            run_config.horizon_days = days;
            run_config.feedback_iterations = iterations;
            if no_feedback {
                run_config.enable_feedback = false;
            }

            let scenario = match resolve_scenario(
                &run_config.scenario,
                scenario_file.as_ref(),
                run_config.horizon_days,
            ) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };

            println!(
                "Running '{}' for {} days (seed {}, feedback {})",
                scenario.name,
                scenario.horizon_days,
                run_config.seed,
                if run_config.enable_feedback { "on" } else { "off" }
            );

            let sim_config = SimulationConfig {
                enable_feedback: run_config.enable_feedback,
                feedback_iterations: run_config.feedback_iterations,
            };
            let results = run_once(&scenario, run_config.seed, &sim_config);
            output::print_summary(&results);

            let dir = PathBuf::from(&output_dir);
            match output::save_all(&results, &run_config, &dir) {
                Ok(()) => println!("\nResults written to {}", dir.display()),
                Err(e) => eprintln!("Error saving results: {}", e),
            }
        }

        Commands::Compare {
            scenario,
            seed,
            days,
            iterations,
            output_dir,
        } => {
            let scenario = match resolve_scenario(&scenario, None, days) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };

            println!(
                "Comparing '{}' with and without feedback (seed {})",
                scenario.name, seed
            );

            let with_fb = run_once(
                &scenario,
                seed,
                &SimulationConfig { enable_feedback: true, feedback_iterations: iterations },
            );
            let without_fb = run_once(
                &scenario,
                seed,
                &SimulationConfig { enable_feedback: false, feedback_iterations: iterations },
            );

            output::print_summary(&with_fb);
            output::print_summary(&without_fb);

            let amp = |r: &SimulationResults| {
                r.amplification_ratios.get("System-Wide").copied().unwrap_or(1.0)
            };
            println!();
            println!("  With feedback:    {:.3}x system amplification", amp(&with_fb));
            println!("  Without feedback: {:.3}x system amplification", amp(&without_fb));
            println!(
                "  Feedback adds {:.0}mm of NBFI gilt sales",
                with_fb.summary.nbfi_gilt_sales_mm - without_fb.summary.nbfi_gilt_sales_mm
            );

            let dir = PathBuf::from(&output_dir);
            let base_config = RunConfig {
                scenario: scenario.name.clone(),
                seed,
                horizon_days: days,
                enable_feedback: true,
                feedback_iterations: iterations,
            };
            if let Err(e) = output::save_all(&with_fb, &base_config, &dir.join("with_feedback")) {
                eprintln!("Error saving results: {}", e);
            }
            let no_fb_config = RunConfig { enable_feedback: false, ..base_config };
            if let Err(e) =
                output::save_all(&without_fb, &no_fb_config, &dir.join("without_feedback"))
            {
                eprintln!("Error saving results: {}", e);
            }
            println!("\nResults written to {}", dir.display());
        }

        Commands::Sweep {
            scenario,
            start_seed,
            seeds,
            days,
            iterations,
            output,
        } => {
            let scenario = match resolve_scenario(&scenario, None, days) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };

            println!(
                "Sweeping '{}' over {} seeds starting at {}",
                scenario.name, seeds, start_seed
            );

            let engine = SweepEngine::new(
                scenario,
                SimulationConfig { enable_feedback: true, feedback_iterations: iterations },
            );
            let results = engine.run_seeds(start_seed, seeds);
            let agg = sweep::aggregate(&results);

            println!();
            println!("  Runs:                {}", agg.runs);
            println!(
                "  System amplification: mean {:.3}x, min {:.3}x, max {:.3}x",
                agg.mean_amplification, agg.min_amplification, agg.max_amplification
            );
            println!("  Mean agents reacted: {:.1}", agg.mean_agents_reacted);
            println!("  Mean asset sales:    {:.0}mm", agg.mean_asset_sales_mm);

            let path = PathBuf::from(&output);
            match sweep::save_sweep_csv(&results, &path) {
                Ok(()) => println!("\nSweep results written to {}", path.display()),
                Err(e) => eprintln!("Error saving sweep CSV: {}", e),
            }
        }
    }
}
