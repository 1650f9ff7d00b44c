use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agents::{run_stage1, run_stage2, Agent, AgentSnapshot, AgentType};
use crate::config::DEFAULT_FEEDBACK_ITERATIONS;
use crate::feedback::compute_stage3_feedback;
use crate::market::{MarketSnapshot, MarketState};
use crate::network::{NetworkSummary, RelationshipNetwork};
use crate::scenario::Scenario;

// ═══════════════════════════════════════════════════════════════════════
// Day loop with strict stage barriers
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub enable_feedback: bool,
    pub feedback_iterations: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            enable_feedback: true,
            feedback_iterations: DEFAULT_FEEDBACK_ITERATIONS,
        }
    }
}

/// Headline figures for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_agents: usize,
    pub agents_reacted: usize,
    pub total_margin_calls_mm: f64,
    pub total_asset_sales_mm: f64,
    pub nbfi_gilt_sales_mm: f64,
    pub total_repo_demand_mm: f64,
    pub final_gilt_yield_chg_bps: f64,
    pub final_ig_spread_chg_bps: f64,
    pub final_repo_availability_pct: f64,
    pub hfs_seeking_repo: usize,
    pub hfs_refused_by_all: usize,
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResults {
    pub scenario_name: String,
    pub daily_market: Vec<MarketSnapshot>,
    pub daily_agents: Vec<AgentSnapshot>,
    /// Keyed by agent name, `Type:<agent_type>`, and `System-Wide`.
    pub amplification_ratios: BTreeMap<String, f64>,
    pub summary: RunSummary,
    pub initial_buffers: BTreeMap<String, f64>,
    pub network_summary: NetworkSummary,
}

/// Run the multi-day stress simulation. Mutates the agent population in
/// place; callers wanting a pristine population should clone first.
pub fn run_simulation(
    agents: &mut [Agent],
    network: &RelationshipNetwork,
    scenario: &Scenario,
    cfg: &SimulationConfig,
) -> SimulationResults {
    let mut market = MarketState::new();
    let mut daily_market = Vec::new();
    let mut daily_agents = Vec::new();

    // Amplification is measured against the pre-stress buffers.
    for agent in agents.iter_mut() {
        agent.compute_initial_buffer();
    }
    let initial_buffers: BTreeMap<String, f64> = agents
        .iter()
        .map(|a| (a.name().to_string(), a.core().liquidity.b0))
        .collect();

    for day in 0..scenario.horizon_days {
        market.day = day;
        let day_values = scenario.day_values(day);
        let day_delta = scenario.day_delta(day);
        market.apply_exogenous_day(&day_values);

        // Stage 1: direct losses. Buffers are recomputed daily so prior
        // settlement flows through.
        run_stage1(agents, &market, &day_delta, network);

        // Stage 2: reactions flow through the network
        run_stage2(agents, &market, network);

        // Pass 1: everyone registers selling pressure
        for agent in agents.iter() {
            agent.register_actions_to_market(&mut market);
        }

        // Pass 2: banks absorb the day's totals pro rata on remaining
        // market-making capacity, simultaneously (shares computed from
        // pre-absorption totals)
        absorb_selling_pressure(agents, &market);

        // Stage 3: iterated second-round feedback
        if cfg.enable_feedback {
            for _ in 0..cfg.feedback_iterations {
                market.apply_endogenous_feedback();
                compute_stage3_feedback(agents, &market, network);
            }
        } else {
            for agent in agents.iter_mut() {
                let core = agent.core_mut();
                core.liquidity.e2 = 0.0;
                core.liquidity.b3 = core.liquidity.b2;
            }
        }

        daily_market.push(market.snapshot());
        for agent in agents.iter() {
            daily_agents.push(agent.daily_snapshot(day));
        }

        for agent in agents.iter_mut() {
            agent.settle_sales();
        }
    }

    let amplification_ratios = compute_amplification(agents, &initial_buffers);
    let summary = compute_summary(agents, &market);
    let network_summary = network.summary(agents.len());

    SimulationResults {
        scenario_name: scenario.name.clone(),
        daily_market,
        daily_agents,
        amplification_ratios,
        summary,
        initial_buffers,
        network_summary,
    }
}

fn absorb_selling_pressure(agents: &mut [Agent], market: &MarketState) {
    let gilt_remaining_total: f64 = agents
        .iter()
        .filter_map(|a| a.as_bank())
        .map(|b| b.gilt_appetite_remaining_mm())
        .sum();
    let corp_remaining_total: f64 = agents
        .iter()
        .filter_map(|a| a.as_bank())
        .map(|b| b.corp_appetite_remaining_mm())
        .sum();

    for agent in agents.iter_mut() {
        let Some(bank) = agent.as_bank_mut() else {
            continue;
        };
        let gilt_share = if gilt_remaining_total > 0.0 {
            market.endogenous_gilt_selling_mm
                * (bank.gilt_appetite_remaining_mm() / gilt_remaining_total)
        } else {
            0.0
        };
        let corp_share = if corp_remaining_total > 0.0 {
            market.endogenous_corp_selling_mm
                * (bank.corp_appetite_remaining_mm() / corp_remaining_total)
        } else {
            0.0
        };
        bank.post_registration_update(gilt_share, corp_share);
    }
}

/// Amplification = total loss (with feedback) over direct first-round
/// loss, measured from the pre-stress buffers. Agents with no direct loss
/// report 1.0; aggregates floor each term to keep ratios finite.
fn compute_amplification(
    agents: &[Agent],
    initial_buffers: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    let mut ratios = BTreeMap::new();

    for agent in agents {
        let b0 = initial_buffers.get(agent.name()).copied().unwrap_or(0.0);
        let direct = b0 - agent.core().liquidity.b1;
        let total = b0 - agent.core().liquidity.b3;
        let ratio = if direct > 0.0 { total / direct } else { 1.0 };
        ratios.insert(agent.name().to_string(), ratio);
    }

    let mut type_direct: BTreeMap<AgentType, f64> = BTreeMap::new();
    let mut type_total: BTreeMap<AgentType, f64> = BTreeMap::new();
    let mut system_direct = 0.0;
    let mut system_total = 0.0;
    for agent in agents {
        let b0 = initial_buffers.get(agent.name()).copied().unwrap_or(0.0);
        let direct = (b0 - agent.core().liquidity.b1).max(0.001);
        let total = (b0 - agent.core().liquidity.b3).max(0.001);
        *type_direct.entry(agent.agent_type()).or_insert(0.0) += direct;
        *type_total.entry(agent.agent_type()).or_insert(0.0) += total;
        system_direct += direct;
        system_total += total;
    }
    for (atype, direct) in &type_direct {
        let total = type_total.get(atype).copied().unwrap_or(0.0);
        ratios.insert(format!("Type:{}", atype.as_str()), total / direct);
    }
    ratios.insert(
        "System-Wide".to_string(),
        if system_direct > 0.0 { system_total / system_direct } else { 1.0 },
    );

    ratios
}

fn compute_summary(agents: &[Agent], market: &MarketState) -> RunSummary {
    let hfs: Vec<_> = agents.iter().filter_map(|a| a.as_hedge_fund()).collect();
    RunSummary {
        total_agents: agents.len(),
        agents_reacted: agents.iter().filter(|a| a.core().has_reacted).count(),
        total_margin_calls_mm: agents.iter().map(|a| a.core().cumulative_margin_calls_mm).sum(),
        total_asset_sales_mm: agents.iter().map(|a| a.core().cumulative_asset_sales_mm).sum(),
        nbfi_gilt_sales_mm: agents
            .iter()
            .filter(|a| a.agent_type() != AgentType::Bank)
            .map(|a| a.core().cumulative_gilt_sales_mm)
            .sum(),
        total_repo_demand_mm: agents.iter().map(|a| a.core().cumulative_repo_demand_mm).sum(),
        final_gilt_yield_chg_bps: market.gilt_10y_yield_chg_bps,
        final_ig_spread_chg_bps: market.ig_corp_spread_chg_bps,
        final_repo_availability_pct: market.repo_market_availability_pct,
        hfs_seeking_repo: hfs.iter().filter(|h| h.has_ever_sought_repo).count(),
        hfs_refused_by_all: hfs.iter().filter(|h| h.repo_refused_by_all).count(),
    }
}
