use approx::assert_relative_eq;

use swes_sim::config::CALM_VIX;
use swes_sim::market::{MarketState, MarketVariable};
use swes_sim::scenario::ScenarioId;

// ═══════════════════════════════════════════════════════════════════════
// Market state
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_exogenous_day_sets_values_and_resets_accumulators() {
    let scenario = ScenarioId::FastChannel.generate(10);
    let mut market = MarketState::new();
    market.endogenous_gilt_selling_mm = 500.0;
    market.endogenous_repo_demand_mm = 200.0;

    market.apply_exogenous_day(&scenario.day_values(9));

    assert_relative_eq!(market.gilt_10y_yield_chg_bps, 115.0, epsilon = 1e-9);
    assert_relative_eq!(market.vix_level, 33.0, epsilon = 1e-9);
    assert_relative_eq!(market.endogenous_gilt_selling_mm, 0.0);
    assert_relative_eq!(market.endogenous_repo_demand_mm, 0.0);
}

#[test]
fn test_stress_intensity_scales_market_functioning() {
    let mut market = MarketState::new();
    assert_relative_eq!(market.stress_intensity(), 1.0);

    let scenario = ScenarioId::FastChannel.generate(10);
    market.apply_exogenous_day(&scenario.day_values(9));
    let stress = 33.0 / CALM_VIX;
    assert_relative_eq!(market.stress_intensity(), stress, epsilon = 1e-9);
    assert_relative_eq!(market.gilt_bid_ask_spread_bps, 2.0 * stress, epsilon = 1e-9);
    assert_relative_eq!(
        market.repo_market_availability_pct,
        1.0 - (stress - 1.0) * 0.15,
        epsilon = 1e-9
    );
}

#[test]
fn test_endogenous_selling_moves_yields() {
    let mut market = MarketState::new();
    market.endogenous_gilt_selling_mm = 1000.0;

    // 1000mm into 5000mm depth: 4bps of impact, split across the curve
    market.apply_endogenous_feedback();
    assert_relative_eq!(market.endogenous_gilt_yield_add_bps, 4.0, epsilon = 1e-9);
    assert_relative_eq!(market.gilt_10y_yield_chg_bps, 2.0, epsilon = 1e-9);
    assert_relative_eq!(market.gilt_30y_yield_chg_bps, 2.8, epsilon = 1e-9);
}

#[test]
fn test_endogenous_corp_selling_widens_spreads() {
    let mut market = MarketState::new();
    market.endogenous_corp_selling_mm = 1000.0;

    market.apply_endogenous_feedback();
    assert_relative_eq!(market.endogenous_ig_spread_add_bps, 15.0, epsilon = 1e-9);
    assert_relative_eq!(market.ig_corp_spread_chg_bps, 9.0, epsilon = 1e-9);
    assert_relative_eq!(market.hy_corp_spread_chg_bps, 18.0, epsilon = 1e-9);
}

#[test]
fn test_repo_availability_floor() {
    let mut market = MarketState::new();
    market.endogenous_repo_demand_mm = 500_000.0;
    market.apply_endogenous_feedback();
    assert_relative_eq!(market.repo_market_availability_pct, 0.5);
}

#[test]
fn test_feedback_without_pressure_is_neutral_on_prices() {
    let mut market = MarketState::new();
    market.apply_endogenous_feedback();
    assert_relative_eq!(market.gilt_10y_yield_chg_bps, 0.0);
    assert_relative_eq!(market.ig_corp_spread_chg_bps, 0.0);
    assert_relative_eq!(market.repo_market_availability_pct, 1.0);
}

// ═══════════════════════════════════════════════════════════════════════
// Scenarios
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_scenario_paths_are_monotone_and_hit_targets() {
    let scenario = ScenarioId::FastChannel.generate(10);
    let path = &scenario.variable_paths[&MarketVariable::Gilt10yYield];
    assert_eq!(path.len(), 10);
    for w in path.windows(2) {
        assert!(w[1] >= w[0], "cumulative path must not retrace");
    }
    assert_relative_eq!(path[9], 115.0, epsilon = 1e-9);

    let vix = &scenario.variable_paths[&MarketVariable::Vix];
    assert_relative_eq!(vix[9], 33.0, epsilon = 1e-9);
}

#[test]
fn test_scenario_front_loading() {
    // More than half the move lands in the first half of the window
    let scenario = ScenarioId::FastChannel.generate(10);
    let path = &scenario.variable_paths[&MarketVariable::Gilt10yYield];
    assert!(
        path[4] > 115.0 * 0.5,
        "day-5 level {} is not front-loaded",
        path[4]
    );
}

#[test]
fn test_scenario_severity_ordering() {
    let mild = ScenarioId::Mild.generate(10);
    let fast = ScenarioId::FastChannel.generate(10);
    let severe = ScenarioId::Severe.generate(10);
    let terminal = |s: &swes_sim::scenario::Scenario| {
        s.variable_paths[&MarketVariable::Gilt10yYield][9]
    };
    assert!(terminal(&mild) < terminal(&fast));
    assert!(terminal(&fast) < terminal(&severe));
}

#[test]
fn test_day_deltas_sum_to_cumulative() {
    let scenario = ScenarioId::Severe.generate(10);
    let mut total = 0.0;
    for day in 0..10 {
        total += scenario.day_delta(day)[&MarketVariable::Gilt10yYield];
    }
    let cumulative = scenario.day_values(9)[&MarketVariable::Gilt10yYield];
    assert_relative_eq!(total, cumulative, epsilon = 1e-9);
}

#[test]
fn test_scenario_roundtrip_through_json() {
    let scenario = ScenarioId::Mild.generate(5);
    let dir = std::env::temp_dir().join("swes_sim_scenario_test");
    std::fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("mild.json");
    scenario.save(&path).expect("save scenario");
    let loaded = swes_sim::scenario::Scenario::load(&path).expect("load scenario");
    assert_eq!(loaded.name, scenario.name);
    assert_eq!(loaded.horizon_days, 5);
    assert_eq!(
        loaded.variable_paths[&MarketVariable::Gilt10yYield],
        scenario.variable_paths[&MarketVariable::Gilt10yYield]
    );
}
