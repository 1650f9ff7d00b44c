use crate::agents::{find_agent, Agent};
use crate::balance_sheet::ItemCategory;
use crate::config::feedback::{
    BANK_COUNTERPARTY_LOSS_COEFF, BROADCAST_MTM_COEFF, CROWDING_COEFF, HF_FUNDING_STRESS_COEFF,
    POOLED_REDEMPTION_PRESSURE_COEFF, REPUTATION_COEFF,
};
use crate::market::MarketState;
use crate::network::RelationshipNetwork;

// ═══════════════════════════════════════════════════════════════════════
// Stage 3 — network-propagated second-round feedback
// ═══════════════════════════════════════════════════════════════════════

/// One second-round loss pass over the whole population.
///
/// Two layers:
/// 1. Bilateral (network-routed): a tightening bank only squeezes the
///    hedge funds connected to IT; a deleveraging fund only hits ITS
///    banks; pooled funds only feel redemptions from THEIR investors.
/// 2. Market-level (broadcast): aggregate selling pressure moves prices
///    for everyone with exposure, plus reputation and crowding penalties
///    on the reacting agents themselves.
///
/// E2 values are computed against a frozen view of the population and
/// applied afterwards, so within one pass no agent sees another's
/// same-pass losses.
pub fn compute_stage3_feedback(
    agents: &mut [Agent],
    market: &MarketState,
    network: &RelationshipNetwork,
) {
    let s = market.stress_intensity().max(1.0);
    let num_reacting = agents.iter().filter(|a| a.core().has_reacted).count();
    if num_reacting == 0 {
        for agent in agents.iter_mut() {
            agent.apply_stage3(0.0);
        }
        return;
    }

    let e2: Vec<f64> = (0..agents.len())
        .map(|i| second_round_loss(agents, i, s, num_reacting, network))
        .collect();
    for (agent, e2) in agents.iter_mut().zip(e2) {
        agent.apply_stage3(e2);
    }
}

fn second_round_loss(
    agents: &[Agent],
    idx: usize,
    s: f64,
    num_reacting: usize,
    network: &RelationshipNetwork,
) -> f64 {
    let target = &agents[idx];
    let mut e2 = 0.0;

    // ── Layer 1: bilateral feedback ──

    match target {
        Agent::HedgeFund(hf) => {
            // Funding stress from each connected bank that tightened
            for bank_name in network.connected_banks(target.name()) {
                let Some(bank) = find_agent(agents, bank_name) else {
                    continue;
                };
                if !bank.core().has_reacted {
                    continue;
                }
                let bank_reaction = bank.core().reaction_total();
                e2 += hf.repo_borrowing_mm()
                    * (bank_reaction / bank.core().liquidity.b0.max(1.0))
                    * s
                    * HF_FUNDING_STRESS_COEFF;
            }
        }
        Agent::Bank(_) => {
            // Counterparty risk from each connected hedge fund that
            // deleveraged, scaled by the bilateral repo exposure
            for hf_name in network.connected_hfs(target.name()) {
                let Some(agent) = find_agent(agents, hf_name) else {
                    continue;
                };
                if !agent.core().has_reacted {
                    continue;
                }
                let Some(hf) = agent.as_hedge_fund() else {
                    continue;
                };
                let hf_stress = agent.core().liquidity.e1 / agent.core().liquidity.b0.max(1.0);
                let n_banks = network.connected_banks(hf_name).len().max(1) as f64;
                let bilateral_exposure = hf.repo_borrowing_mm() / n_banks;
                e2 += hf_stress * bilateral_exposure * BANK_COUNTERPARTY_LOSS_COEFF * s;
            }
        }
        Agent::PooledFund(_) => {
            // Redemption pressure from each connected stressed investor
            for nbfi_name in network.fund_redeemers(target.name()) {
                let Some(nbfi) = find_agent(agents, nbfi_name) else {
                    continue;
                };
                if nbfi.core().has_reacted {
                    e2 += nbfi.core().reaction_total() * POOLED_REDEMPTION_PRESSURE_COEFF;
                }
            }
        }
        Agent::LdiPension(_) | Agent::Insurer(_) => {}
    }

    // ── Layer 2: market-level broadcast ──
    // Additional MTM on liquid holdings, scaled by how much of the system
    // is reacting.
    let participation = num_reacting as f64 / agents.len() as f64;
    for item in &target.core().balance_sheet {
        if item.category != ItemCategory::LiquidAsset {
            continue;
        }
        for (_, sens) in &item.sensitivities {
            e2 += item.amount_mm * sens.abs() * 0.0001 * s * BROADCAST_MTM_COEFF * participation;
        }
    }

    // ── Reputation: visible distress invites worse terms ──
    if target.core().has_reacted {
        e2 += target.core().reaction_total() * (s.sqrt() - 1.0) * REPUTATION_COEFF;
    }

    // ── Crowding: same-type agents dumping the same instruments ──
    if target.core().has_reacted {
        let same_type = |a: &Agent| a.agent_type() == target.agent_type();
        let same_type_total = agents.iter().filter(|a| same_type(a)).count();
        let same_type_reacting = agents
            .iter()
            .filter(|a| same_type(a) && a.core().has_reacted)
            .count();
        if same_type_total > 0 {
            let crowding =
                (same_type_reacting as f64 / same_type_total as f64).powi(2) * s * CROWDING_COEFF;
            e2 += target.core().reaction_total() * crowding;
        }
    }

    e2
}
