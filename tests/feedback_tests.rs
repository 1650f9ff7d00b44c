use approx::assert_relative_eq;

use swes_sim::agents::{Agent, Bank, BankConfig, HedgeFund, HedgeFundConfig};
use swes_sim::balance_sheet::get_item_mut;
use swes_sim::config::feedback::{BANK_COUNTERPARTY_LOSS_COEFF, CROWDING_COEFF, REPUTATION_COEFF};
use swes_sim::feedback::compute_stage3_feedback;
use swes_sim::market::MarketState;
use swes_sim::network::RelationshipNetwork;
use swes_sim::population::generate_population;
use swes_sim::reactions::{Reaction, ReactionAction};

fn zero_balance_sheet(agent: &mut Agent) {
    for item in &mut agent.core_mut().balance_sheet {
        item.amount_mm = 0.0;
    }
}

#[test]
fn test_no_reactions_means_no_second_round() {
    let mut agents = generate_population(42);
    let network = RelationshipNetwork::build(&agents, 42);
    for agent in agents.iter_mut() {
        agent.core_mut().liquidity.b2 = 5.0;
    }

    let market = MarketState::new();
    compute_stage3_feedback(&mut agents, &market, &network);

    for agent in &agents {
        assert_relative_eq!(agent.core().liquidity.e2, 0.0);
        assert_relative_eq!(agent.core().liquidity.b3, 5.0);
    }
}

#[test]
fn test_reputation_and_crowding_on_isolated_reactor() {
    let mut agent = Agent::HedgeFund(HedgeFund::new(HedgeFundConfig::default()));
    zero_balance_sheet(&mut agent);
    agent.core_mut().has_reacted = true;
    agent
        .core_mut()
        .reactions
        .push(Reaction::new(ReactionAction::SellGilt, 100.0));
    agent.core_mut().liquidity.b2 = 1000.0;

    let mut market = MarketState::new();
    market.vix_level = 30.0; // s = 2
    let network = RelationshipNetwork::default();

    let mut agents = vec![agent];
    compute_stage3_feedback(&mut agents, &market, &network);

    // The only reactor of its type: full crowding penalty plus reputation
    let s = 2.0_f64;
    let expected = 100.0 * (s.sqrt() - 1.0) * REPUTATION_COEFF + 100.0 * s * CROWDING_COEFF;
    assert_relative_eq!(agents[0].core().liquidity.e2, expected, epsilon = 1e-9);
    assert_relative_eq!(
        agents[0].core().liquidity.b3,
        1000.0 - expected,
        epsilon = 1e-9
    );
}

#[test]
fn test_bank_counterparty_losses_follow_the_network() {
    let mut bank = Agent::Bank(Bank::new(BankConfig::default()));
    zero_balance_sheet(&mut bank);
    let bank_name = bank.name().to_string();

    let mut hf = Agent::HedgeFund(HedgeFund::new(HedgeFundConfig::default()));
    zero_balance_sheet(&mut hf);
    if let Some(item) = get_item_mut(&mut hf.core_mut().balance_sheet, HedgeFund::REPO_BORROWING) {
        item.amount_mm = 2000.0;
    }
    hf.core_mut().has_reacted = true;
    hf.core_mut().liquidity.b0 = 100.0;
    hf.core_mut().liquidity.e1 = 50.0;
    let hf_name = hf.name().to_string();

    let mut network = RelationshipNetwork::default();
    network.bank_hf_edges.push((bank_name, hf_name));

    let market = MarketState::new(); // s = 1
    let mut agents = vec![bank, hf];
    compute_stage3_feedback(&mut agents, &market, &network);

    // stress 0.5 on a 2000mm bilateral exposure
    let expected = 0.5 * 2000.0 * BANK_COUNTERPARTY_LOSS_COEFF;
    assert_relative_eq!(agents[0].core().liquidity.e2, expected, epsilon = 1e-9);
}

#[test]
fn test_unconnected_bank_feels_no_counterparty_loss() {
    let mut bank = Agent::Bank(Bank::new(BankConfig::default()));
    zero_balance_sheet(&mut bank);

    let mut hf = Agent::HedgeFund(HedgeFund::new(HedgeFundConfig::default()));
    zero_balance_sheet(&mut hf);
    hf.core_mut().has_reacted = true;
    hf.core_mut().liquidity.b0 = 100.0;
    hf.core_mut().liquidity.e1 = 50.0;

    let network = RelationshipNetwork::default();
    let market = MarketState::new();
    let mut agents = vec![bank, hf];
    compute_stage3_feedback(&mut agents, &market, &network);

    assert_relative_eq!(agents[0].core().liquidity.e2, 0.0);
}

#[test]
fn test_broadcast_hits_liquid_holders_only() {
    // One reactor, one bystander holding sensitive liquid assets
    let mut reactor = Agent::HedgeFund(HedgeFund::new(HedgeFundConfig::default()));
    zero_balance_sheet(&mut reactor);
    reactor.core_mut().has_reacted = true;
    reactor
        .core_mut()
        .reactions
        .push(Reaction::new(ReactionAction::SellGilt, 100.0));

    let bystander = Agent::Bank(Bank::new(BankConfig::default()));

    let network = RelationshipNetwork::default();
    let market = MarketState::new();
    let mut agents = vec![reactor, bystander];
    compute_stage3_feedback(&mut agents, &market, &network);

    assert!(
        agents[1].core().liquidity.e2 > 0.0,
        "bystander with liquid exposure should feel broadcast MTM"
    );
    assert!(!agents[1].core().has_reacted);
}

#[test]
fn test_feedback_iterations_accumulate() {
    let mut agent = Agent::HedgeFund(HedgeFund::new(HedgeFundConfig::default()));
    zero_balance_sheet(&mut agent);
    agent.core_mut().has_reacted = true;
    agent
        .core_mut()
        .reactions
        .push(Reaction::new(ReactionAction::SellGilt, 100.0));
    agent.core_mut().liquidity.b2 = 1000.0;

    let mut market = MarketState::new();
    market.vix_level = 30.0;
    let network = RelationshipNetwork::default();
    let mut agents = vec![agent];

    compute_stage3_feedback(&mut agents, &market, &network);
    let after_one = agents[0].core().liquidity.e2;
    compute_stage3_feedback(&mut agents, &market, &network);

    assert_relative_eq!(agents[0].core().liquidity.e2, 2.0 * after_one, epsilon = 1e-9);
    assert_relative_eq!(
        agents[0].core().liquidity.b3,
        1000.0 - 2.0 * after_one,
        epsilon = 1e-9
    );
}
