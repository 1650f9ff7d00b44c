use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::agents::{
    Agent, Bank, BankConfig, BankTier, HedgeFund, HedgeFundConfig, HfStrategy, Insurer,
    InsurerConfig, LdiPension, LdiPensionConfig, PooledFund, PooledFundConfig, RepoDependence,
};
use crate::config;

// ═══════════════════════════════════════════════════════════════════════
// Population factory — heterogeneous agents from calibrated ranges
// ═══════════════════════════════════════════════════════════════════════

/// Generate the standard 70-agent population from one seed. Every agent
/// is unique but drawn from realistic per-type ranges.
///
/// Pooled funds come last: their stage-1 redemption inflows read the
/// stage-1 losses of the other NBFIs, which must already be booked.
pub fn generate_population(seed: u64) -> Vec<Agent> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut agents = Vec::new();
    agents.extend(generate_banks(&mut rng).into_iter().map(Agent::Bank));
    agents.extend(generate_hedge_funds(&mut rng).into_iter().map(Agent::HedgeFund));
    agents.extend(generate_ldi_pensions(&mut rng).into_iter().map(Agent::LdiPension));
    agents.extend(generate_insurers(&mut rng).into_iter().map(Agent::Insurer));
    agents.extend(generate_pooled_funds(&mut rng).into_iter().map(Agent::PooledFund));
    agents
}

fn uniform(rng: &mut StdRng, range: (f64, f64)) -> f64 {
    rng.gen_range(range.0..range.1)
}

/// Normal draw centered on the range midpoint, clamped to the range.
fn centered(rng: &mut StdRng, range: (f64, f64)) -> f64 {
    let (lo, hi) = range;
    let mid = (lo + hi) / 2.0;
    match Normal::new(mid, (hi - lo) / 6.0) {
        Ok(normal) => normal.sample(rng).clamp(lo, hi),
        Err(_) => mid,
    }
}

// ── Banks: 12 across three size tiers ──

struct BankTierSpec {
    tier: BankTier,
    count: usize,
    total_bs_bn: (f64, f64),
    gilt_appetite_mm: (f64, f64),
}

pub fn generate_banks(rng: &mut StdRng) -> Vec<Bank> {
    let tiers = [
        BankTierSpec {
            tier: BankTier::Major,
            count: 4,
            total_bs_bn: (800.0, 1600.0),
            gilt_appetite_mm: (1500.0, 3000.0),
        },
        BankTierSpec {
            tier: BankTier::MidTier,
            count: 5,
            total_bs_bn: (200.0, 600.0),
            gilt_appetite_mm: (500.0, 1500.0),
        },
        BankTierSpec {
            tier: BankTier::Specialist,
            count: 3,
            total_bs_bn: (50.0, 200.0),
            gilt_appetite_mm: (150.0, 500.0),
        },
    ];
    debug_assert_eq!(
        tiers.iter().map(|t| t.count).sum::<usize>(),
        config::BANK_COUNT
    );

    let mut banks = Vec::new();
    let mut idx = 0;
    for spec in &tiers {
        for _ in 0..spec.count {
            idx += 1;
            let total_bs_mm = uniform(rng, spec.total_bs_bn) * 1000.0;
            let risk_appetite = uniform(rng, (0.4, 0.8));
            let gilt_appetite = uniform(rng, spec.gilt_appetite_mm);
            banks.push(Bank::new(BankConfig {
                name: format!("Bank_{:02}", idx),
                tier: spec.tier,
                total_bs_mm,
                theta: uniform(rng, config::BANK_THETA_RANGE),
                risk_appetite,
                gilt_holdings_mm: total_bs_mm * uniform(rng, (0.04, 0.07)),
                corp_bond_holdings_mm: total_bs_mm * uniform(rng, (0.015, 0.03)),
                equity_portfolio_mm: total_bs_mm * 0.005,
                repo_lending_mm: total_bs_mm * uniform(rng, (0.05, 0.08)),
                derivative_assets_mm: total_bs_mm * uniform(rng, (0.03, 0.06)),
                facility_eligible_mm: total_bs_mm * uniform(rng, (0.06, 0.10)),
                wholesale_funding_mm: total_bs_mm * uniform(rng, (0.12, 0.18)),
                cet1_buffer_mm: total_bs_mm * 0.5 * uniform(rng, (0.10, 0.14)),
                gilt_mm_appetite_mm: gilt_appetite,
                corp_mm_appetite_mm: gilt_appetite * 0.3,
                repo_capacity_mm: total_bs_mm * uniform(rng, (0.03, 0.08)),
                willingness_to_roll_pct: uniform(rng, (0.85, 1.0)),
                willingness_to_extend_new_pct: uniform(rng, (0.6, 0.9)),
            }));
        }
    }
    banks
}

// ── Hedge funds: 35 across strategies and size tiers ──

struct HfProfile {
    strategy: HfStrategy,
    count: usize,
    gilt_exposure_pct: (f64, f64),
    equity_exposure_pct: (f64, f64),
    corp_exposure_pct: (f64, f64),
    basis_trade_pct: (f64, f64),
    gross_leverage: (f64, f64),
    repo_dependence: RepoDependence,
}

fn hf_profiles() -> Vec<HfProfile> {
    vec![
        HfProfile {
            strategy: HfStrategy::RelativeValue,
            count: 8,
            gilt_exposure_pct: (0.30, 0.50),
            equity_exposure_pct: (0.0, 0.05),
            corp_exposure_pct: (0.05, 0.10),
            basis_trade_pct: (0.15, 0.30),
            gross_leverage: (8.0, 15.0),
            repo_dependence: RepoDependence::VeryHigh,
        },
        HfProfile {
            strategy: HfStrategy::MacroRates,
            count: 7,
            gilt_exposure_pct: (0.25, 0.45),
            equity_exposure_pct: (0.05, 0.15),
            corp_exposure_pct: (0.05, 0.10),
            basis_trade_pct: (0.0, 0.0),
            gross_leverage: (3.0, 7.0),
            repo_dependence: RepoDependence::High,
        },
        HfProfile {
            strategy: HfStrategy::LongShortEquity,
            count: 8,
            gilt_exposure_pct: (0.0, 0.05),
            equity_exposure_pct: (0.40, 0.60),
            corp_exposure_pct: (0.0, 0.05),
            basis_trade_pct: (0.0, 0.0),
            gross_leverage: (2.0, 4.0),
            repo_dependence: RepoDependence::Low,
        },
        HfProfile {
            strategy: HfStrategy::CreditLongShort,
            count: 6,
            gilt_exposure_pct: (0.05, 0.10),
            equity_exposure_pct: (0.05, 0.15),
            corp_exposure_pct: (0.30, 0.50),
            basis_trade_pct: (0.0, 0.0),
            gross_leverage: (2.0, 5.0),
            repo_dependence: RepoDependence::Medium,
        },
        HfProfile {
            strategy: HfStrategy::MultiStrategy,
            count: 6,
            gilt_exposure_pct: (0.15, 0.30),
            equity_exposure_pct: (0.10, 0.20),
            corp_exposure_pct: (0.10, 0.20),
            basis_trade_pct: (0.0, 0.10),
            gross_leverage: (4.0, 8.0),
            repo_dependence: RepoDependence::Medium,
        },
    ]
}

pub fn generate_hedge_funds(rng: &mut StdRng) -> Vec<HedgeFund> {
    let profiles = hf_profiles();
    debug_assert_eq!(
        profiles.iter().map(|p| p.count).sum::<usize>(),
        config::HEDGE_FUND_COUNT
    );

    // Decouple strategy and size: assign each independently, shuffled.
    let mut strategy_order: Vec<usize> = profiles
        .iter()
        .enumerate()
        .flat_map(|(i, p)| std::iter::repeat(i).take(p.count))
        .collect();
    strategy_order.shuffle(rng);

    let size_tiers = [(5usize, (20.0, 60.0)), (12, (5.0, 20.0)), (18, (0.5, 5.0))];
    let mut sizes_bn: Vec<f64> = size_tiers
        .iter()
        .flat_map(|(count, range)| (0..*count).map(|_| uniform(rng, *range)).collect::<Vec<_>>())
        .collect();
    sizes_bn.shuffle(rng);

    let mut funds = Vec::new();
    for (i, profile_idx) in strategy_order.iter().enumerate() {
        let profile = &profiles[*profile_idx];
        funds.push(HedgeFund::new(HedgeFundConfig {
            name: format!("HF_{:02}", i + 1),
            strategy: profile.strategy,
            aum_mm: sizes_bn[i] * 1000.0,
            theta: uniform(rng, config::HEDGE_FUND_THETA_RANGE),
            gross_leverage: centered(rng, profile.gross_leverage),
            var_utilisation: centered(rng, (0.5, 0.9)),
            repo_dependence: profile.repo_dependence,
            gilt_exposure_pct: uniform_or_zero(rng, profile.gilt_exposure_pct),
            equity_exposure_pct: uniform_or_zero(rng, profile.equity_exposure_pct),
            corp_exposure_pct: uniform_or_zero(rng, profile.corp_exposure_pct),
            basis_trade_pct: uniform_or_zero(rng, profile.basis_trade_pct),
        }));
    }
    funds
}

fn uniform_or_zero(rng: &mut StdRng, range: (f64, f64)) -> f64 {
    if range.1 <= range.0 {
        range.0
    } else {
        uniform(rng, range)
    }
}

// ── LDI / pension funds: 10, pooled vs segregated ──

pub fn generate_ldi_pensions(rng: &mut StdRng) -> Vec<LdiPension> {
    let mut funds = Vec::new();
    for i in 0..config::LDI_COUNT {
        let aum_mm = uniform(rng, (10.0, 80.0)) * 1000.0;
        let is_pooled = rng.gen_bool(0.4);
        funds.push(LdiPension::new(LdiPensionConfig {
            name: format!("LDI_{:02}", i + 1),
            theta: uniform(rng, config::LDI_THETA_RANGE),
            yield_buffer_bps: uniform(rng, (80.0, 160.0)),
            gilt_holdings_mm: aum_mm * uniform(rng, (0.45, 0.60)),
            il_gilt_holdings_mm: aum_mm * uniform(rng, (0.20, 0.35)),
            corp_bond_holdings_mm: aum_mm * uniform(rng, (0.05, 0.12)),
            cash_and_mmf_mm: aum_mm * uniform(rng, (0.03, 0.08)),
            derivatives_notional_mm: aum_mm * uniform(rng, (1.5, 3.0)),
            ldi_leverage_ratio: uniform(rng, (1.5, 4.0)),
            unencumbered_collateral_mm: aum_mm * uniform(rng, (0.05, 0.12)),
            recap_available_mm: aum_mm * uniform(rng, (0.05, 0.15)),
            recap_speed_days: if is_pooled { 1 } else { rng.gen_range(3..=7) },
            is_pooled,
        }));
    }
    funds
}

// ── Insurers: 6, hedge ratio and CSA dispersion ──

pub fn generate_insurers(rng: &mut StdRng) -> Vec<Insurer> {
    let mut insurers = Vec::new();
    for i in 0..config::INSURER_COUNT {
        let total_mm = uniform(rng, (50.0, 250.0)) * 1000.0;
        insurers.push(Insurer::new(InsurerConfig {
            name: format!("Insurer_{:02}", i + 1),
            theta: uniform(rng, config::INSURER_THETA_RANGE),
            hedge_ratio: uniform(rng, (0.5, 0.9)),
            dirty_csa_pct: uniform(rng, (0.1, 0.5)),
            gilt_holdings_mm: total_mm * uniform(rng, (0.20, 0.30)),
            corp_bond_holdings_mm: total_mm * uniform(rng, (0.25, 0.40)),
            equity_portfolio_mm: total_mm * uniform(rng, (0.05, 0.15)),
            derivative_hedges_notional_mm: total_mm * uniform(rng, (0.3, 0.6)),
            cash_and_liquid_mm: total_mm * uniform(rng, (0.03, 0.08)),
            committed_repo_lines_mm: total_mm * uniform(rng, (0.02, 0.05)),
            rcf_available_mm: total_mm * uniform(rng, (0.01, 0.03)),
        }));
    }
    insurers
}

// ── Pooled funds: 7 across mandates ──

pub fn generate_pooled_funds(rng: &mut StdRng) -> Vec<PooledFund> {
    // (gilt_pct, corp_pct) ranges per mandate
    let mandates = [
        ((0.35, 0.55), (0.10, 0.20)), // gilt-focused
        ((0.35, 0.55), (0.10, 0.20)),
        ((0.35, 0.55), (0.10, 0.20)),
        ((0.10, 0.20), (0.35, 0.50)), // credit-focused
        ((0.10, 0.20), (0.35, 0.50)),
        ((0.25, 0.35), (0.15, 0.25)), // mixed
        ((0.25, 0.35), (0.15, 0.25)),
    ];
    debug_assert_eq!(mandates.len(), config::POOLED_FUND_COUNT);

    let mut funds = Vec::new();
    for (i, (gilt_range, corp_range)) in mandates.iter().enumerate() {
        funds.push(PooledFund::new(PooledFundConfig {
            name: format!("Fund_{:02}", i + 1),
            theta: uniform(rng, config::POOLED_FUND_THETA_RANGE),
            aum_mm: uniform(rng, (10.0, 50.0)) * 1000.0,
            pension_investor_pct: uniform(rng, (0.2, 0.6)),
            insurer_investor_pct: uniform(rng, (0.1, 0.4)),
            gilt_pct: uniform(rng, *gilt_range),
            corp_pct: uniform(rng, *corp_range),
            abs_pct: uniform(rng, (0.0, 0.05)),
            cash_pct: uniform(rng, (0.03, 0.10)),
        }));
    }
    funds
}
