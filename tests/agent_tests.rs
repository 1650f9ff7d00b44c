use approx::assert_relative_eq;

use swes_sim::agents::{
    plan_reactions, run_stage2, Agent, Bank, BankConfig, HedgeFund, HedgeFundConfig, LdiPension,
    LdiPensionConfig, PooledFund, PooledFundConfig,
};
use swes_sim::balance_sheet::item_amount;
use swes_sim::market::MarketState;
use swes_sim::network::RelationshipNetwork;
use swes_sim::reactions::{Reaction, ReactionAction};

// ═══════════════════════════════════════════════════════════════════════
// Liquidity ladder mechanics
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_stage1_ladder_identity() {
    let mut agent = Agent::Bank(Bank::new(BankConfig::default()));
    let b0 = agent.compute_initial_buffer();
    agent.apply_stage1(100.0, 40.0, 10.0);

    let liq = agent.core().liquidity;
    assert_relative_eq!(liq.e1, 150.0);
    assert_relative_eq!(liq.b1, b0 - 150.0);
    assert_relative_eq!(agent.core().cumulative_margin_calls_mm, 40.0);
    assert_relative_eq!(agent.core().cumulative_redemptions_mm, 10.0);
}

#[test]
fn test_should_react_threshold() {
    let mut agent = Agent::Bank(Bank::new(BankConfig { theta: 0.40, ..BankConfig::default() }));
    agent.core_mut().liquidity.b0 = 1000.0;

    agent.core_mut().liquidity.e1 = 399.0;
    assert!(!agent.should_react(), "loss below theta must not trigger");

    agent.core_mut().liquidity.e1 = 401.0;
    assert!(agent.should_react(), "loss above theta must trigger");

    // Degenerate buffer never triggers
    agent.core_mut().liquidity.b0 = 0.0;
    assert!(!agent.should_react());
}

#[test]
fn test_below_threshold_reaction_is_noop() {
    let mut agent = Agent::Bank(Bank::new(BankConfig::default()));
    agent.core_mut().liquidity.b0 = 1000.0;
    agent.core_mut().liquidity.e1 = 10.0;
    agent.core_mut().liquidity.b1 = 990.0;

    let market = MarketState::new();
    let network = RelationshipNetwork::default();
    run_stage2(std::slice::from_mut(&mut agent), &market, &network);

    assert!(!agent.core().has_reacted);
    assert!(agent.core().reactions.is_empty());
    assert_relative_eq!(agent.core().liquidity.b2, 990.0);
}

// ═══════════════════════════════════════════════════════════════════════
// Realization rates
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_realization_rates_in_calm_market() {
    let market = MarketState::new();
    // Calm bid-ask is 2bps, so sales realize at 98%
    assert_relative_eq!(ReactionAction::SellGilt.realization_rate(&market), 0.98);
    assert_relative_eq!(ReactionAction::SeekRepo.realization_rate(&market), 1.0);
    assert_relative_eq!(
        ReactionAction::CentralBankFacility.realization_rate(&market),
        0.95
    );
    assert_relative_eq!(ReactionAction::RedeemMmf.realization_rate(&market), 0.90);
    assert_relative_eq!(ReactionAction::PostCollateral.realization_rate(&market), 0.80);
}

#[test]
fn test_sale_realization_floor_under_wide_spreads() {
    let mut market = MarketState::new();
    market.gilt_bid_ask_spread_bps = 90.0;
    assert_relative_eq!(ReactionAction::SellGilt.realization_rate(&market), 0.5);
}

// ═══════════════════════════════════════════════════════════════════════
// Bank waterfall and repo provision
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_bank_waterfall_ordering_and_caps() {
    let mut agent = Agent::Bank(Bank::new(BankConfig::default()));
    agent.core_mut().liquidity.b0 = 1000.0;
    agent.core_mut().liquidity.e1 = 2000.0;
    agent.core_mut().liquidity.b1 = -1000.0;

    let market = MarketState::new();
    let network = RelationshipNetwork::default();
    let agents = [agent];
    let plan = plan_reactions(&agents, 0, &market, &network);

    // Facility first: 30% of the shortfall, well under half the eligible
    // collateral
    assert_eq!(plan.reactions[0].action, ReactionAction::CentralBankFacility);
    assert_relative_eq!(plan.reactions[0].amount_mm, 300.0);

    assert_eq!(plan.reactions[1].action, ReactionAction::ReduceRepoLending);
    assert_relative_eq!(plan.reactions[1].amount_mm, 210.0);

    assert_eq!(plan.reactions[2].action, ReactionAction::SellGilt);
    assert_relative_eq!(plan.reactions[2].amount_mm, 49.0);

    assert_eq!(plan.reactions[3].action, ReactionAction::SellCorpBonds);
    assert_relative_eq!(plan.reactions[3].amount_mm, 35.28);
}

#[test]
fn test_repo_request_refused_when_unconnected() {
    let bank = Bank::new(BankConfig::default());
    let network = RelationshipNetwork::default();
    assert_relative_eq!(
        bank.assess_repo_request("HF_99", 500.0, &network),
        0.0
    );
}

#[test]
fn test_repo_request_capped_by_willingness() {
    let bank = Bank::new(BankConfig::default());
    let mut network = RelationshipNetwork::default();
    network
        .bank_hf_edges
        .push(("Bank_01".to_string(), "HF_01".to_string()));

    // Unstressed bank: capacity 25000 * willingness 0.7 * appetite 0.6
    assert_relative_eq!(bank.assess_repo_request("HF_01", 500.0, &network), 500.0);
    assert_relative_eq!(
        bank.assess_repo_request("HF_01", 20_000.0, &network),
        10_500.0
    );
}

#[test]
fn test_repo_request_scaled_to_zero_under_stress() {
    let mut bank = Bank::new(BankConfig::default());
    bank.core.liquidity.b0 = 1000.0;
    bank.core.liquidity.e1 = 500.0; // stress ratio 0.5, past the refusal point

    let mut network = RelationshipNetwork::default();
    network
        .bank_hf_edges
        .push(("Bank_01".to_string(), "HF_01".to_string()));
    assert_relative_eq!(bank.assess_repo_request("HF_01", 500.0, &network), 0.0);
}

#[test]
fn test_absorption_consumes_appetite_and_tightens_only_after_reacting() {
    let mut bank = Bank::new(BankConfig::default());

    bank.post_registration_update(1000.0, 0.0);
    assert_relative_eq!(bank.gilt_appetite_remaining_mm(), 1000.0);
    assert_relative_eq!(bank.willingness_to_extend_new_pct, 0.7);

    bank.core.has_reacted = true;
    bank.post_registration_update(0.0, 0.0);
    assert_relative_eq!(bank.willingness_to_extend_new_pct, 0.58);
    assert_relative_eq!(bank.willingness_to_roll_pct, 0.84);
}

// ═══════════════════════════════════════════════════════════════════════
// Hedge fund and LDI specifics
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_hedge_fund_flags_refusal_by_all_counterparties() {
    let mut bank = Bank::new(BankConfig::default());
    bank.core.liquidity.b0 = 1.0;
    bank.core.liquidity.e1 = 10.0; // refuses everything

    let hf = HedgeFund::new(HedgeFundConfig::default());
    let hf_name = hf.core.name.clone();
    let bank_name = bank.core.name.clone();

    let mut agents = vec![Agent::Bank(bank), Agent::HedgeFund(hf)];
    agents[1].core_mut().liquidity.b0 = 100.0;
    agents[1].core_mut().liquidity.e1 = 50.0;
    agents[1].core_mut().liquidity.b1 = 50.0;

    let mut network = RelationshipNetwork::default();
    network.bank_hf_edges.push((bank_name, hf_name));

    let market = MarketState::new();
    run_stage2(&mut agents, &market, &network);

    let hf = agents[1].as_hedge_fund().expect("agent 1 is the hedge fund");
    assert!(hf.has_ever_sought_repo);
    assert!(hf.repo_refused_by_all);
}

#[test]
fn test_ldi_yield_buffer_escalates_margin() {
    let cfg = LdiPensionConfig { yield_buffer_bps: 100.0, ..LdiPensionConfig::default() };
    let mut agent = Agent::LdiPension(LdiPension::new(cfg));

    let mut market = MarketState::new();
    market.gilt_10y_yield_chg_bps = 160.0;

    // 60000 notional: VM 38.4 plus 21.6 of escalation past the buffer
    let margin = agent.compute_margin_calls(&market);
    assert_relative_eq!(margin, 60.0, epsilon = 1e-9);

    match &agent {
        Agent::LdiPension(l) => assert_relative_eq!(l.yield_buffer_consumed_pct, 1.0),
        _ => unreachable!(),
    }
}

#[test]
fn test_pooled_fund_swing_pricing_requires_heavy_inflows() {
    let market = MarketState::new();
    let network = RelationshipNetwork::default();

    let stressed_fund = |inflows_mm: f64| {
        let mut fund = PooledFund::new(PooledFundConfig::default());
        fund.cumulative_redemption_inflows_mm = inflows_mm;
        fund.core.liquidity.b0 = 100.0;
        fund.core.liquidity.e1 = 50.0;
        fund.core.liquidity.b1 = -10.0;
        [Agent::PooledFund(fund)]
    };

    // 5% of a 20bn fund: below the gate trigger
    let agents = stressed_fund(1000.0);
    let plan = plan_reactions(&agents, 0, &market, &network);
    assert!(
        !plan
            .reactions
            .iter()
            .any(|r| r.action == ReactionAction::SwingPricing),
        "swing pricing must not trigger at 5% lifetime inflows"
    );

    // 20%: past the trigger
    let agents = stressed_fund(4000.0);
    let plan = plan_reactions(&agents, 0, &market, &network);
    assert!(
        plan.reactions
            .iter()
            .any(|r| r.action == ReactionAction::SwingPricing),
        "swing pricing should trigger at 20% lifetime inflows"
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Settlement
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_settlement_floors_holdings_at_zero() {
    let mut agent = Agent::Bank(Bank::new(BankConfig::default()));
    agent
        .core_mut()
        .reactions
        .push(Reaction::new(ReactionAction::SellGilt, 1e9));
    agent.settle_sales();
    assert_relative_eq!(
        item_amount(&agent.core().balance_sheet, Bank::GILT),
        0.0
    );
}

#[test]
fn test_settlement_routes_il_sales_to_il_holdings() {
    let mut agent = Agent::LdiPension(LdiPension::new(LdiPensionConfig::default()));
    let gilt_before = item_amount(&agent.core().balance_sheet, LdiPension::GILT);
    let il_before = item_amount(&agent.core().balance_sheet, LdiPension::IL_GILT);

    agent
        .core_mut()
        .reactions
        .push(Reaction::new(ReactionAction::SellIlGilt, 100.0));
    agent.settle_sales();

    assert_relative_eq!(
        item_amount(&agent.core().balance_sheet, LdiPension::GILT),
        gilt_before
    );
    assert_relative_eq!(
        item_amount(&agent.core().balance_sheet, LdiPension::IL_GILT),
        il_before - 100.0
    );
}
