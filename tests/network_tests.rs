use swes_sim::agents::AgentType;
use swes_sim::config;
use swes_sim::network::RelationshipNetwork;
use swes_sim::population::generate_population;

const TEST_SEED: u64 = 42;

#[test]
fn test_degrees_within_rules() {
    let agents = generate_population(TEST_SEED);
    let network = RelationshipNetwork::build(&agents, TEST_SEED);

    for agent in &agents {
        match agent.agent_type() {
            AgentType::HedgeFund => {
                let d = network.connected_banks(agent.name()).len();
                let (lo, hi) = config::HF_BANK_DEGREE;
                assert!(
                    d >= lo && d <= hi,
                    "{} has {} prime brokers, expected {}..={}",
                    agent.name(),
                    d,
                    lo,
                    hi
                );
            }
            AgentType::LdiPension => {
                let d = network.clearing_banks(agent.name()).len();
                let (lo, hi) = config::LDI_BANK_DEGREE;
                assert!(d >= lo && d <= hi, "{} clearing degree {}", agent.name(), d);
            }
            AgentType::Insurer => {
                let d = network.insurer_banks(agent.name()).len();
                let (lo, hi) = config::INSURER_BANK_DEGREE;
                assert!(d >= lo && d <= hi, "{} bank degree {}", agent.name(), d);
            }
            AgentType::Bank | AgentType::PooledFund => {}
        }
    }

    // Every non-bank NBFI except the funds themselves holds at least one
    // redemption link.
    for agent in &agents {
        if matches!(
            agent.agent_type(),
            AgentType::HedgeFund | AgentType::LdiPension | AgentType::Insurer
        ) {
            let d = network.redemption_targets(agent.name()).len();
            let (lo, hi) = config::NBFI_POOLED_FUND_DEGREE;
            assert!(
                d >= lo && d <= hi,
                "{} has {} redemption targets",
                agent.name(),
                d
            );
        }
    }
}

#[test]
fn test_edges_reference_real_agents() {
    let agents = generate_population(TEST_SEED);
    let network = RelationshipNetwork::build(&agents, TEST_SEED);
    let exists = |name: &str| agents.iter().any(|a| a.name() == name);

    let all_edges = network
        .bank_hf_edges
        .iter()
        .chain(&network.bank_ldi_edges)
        .chain(&network.bank_insurer_edges)
        .chain(&network.nbfi_fund_edges);
    for (a, b) in all_edges {
        assert!(exists(a), "edge references unknown agent {}", a);
        assert!(exists(b), "edge references unknown agent {}", b);
    }
}

#[test]
fn test_counterparty_check_matches_edges() {
    let agents = generate_population(TEST_SEED);
    let network = RelationshipNetwork::build(&agents, TEST_SEED);

    for (bank, hf) in &network.bank_hf_edges {
        assert!(network.is_bank_counterparty(bank, hf));
    }
    for (bank, ldi) in &network.bank_ldi_edges {
        assert!(network.is_bank_counterparty(bank, ldi));
    }
    assert!(!network.is_bank_counterparty("Bank_01", "NoSuchFund"));
}

#[test]
fn test_summary_totals() {
    let agents = generate_population(TEST_SEED);
    let network = RelationshipNetwork::build(&agents, TEST_SEED);
    let summary = network.summary(agents.len());
    assert_eq!(summary.total_nodes, agents.len());
    assert_eq!(
        summary.total_edges,
        summary.bank_hf_edges
            + summary.bank_ldi_edges
            + summary.bank_insurer_edges
            + summary.nbfi_fund_edges
    );
    assert!(summary.total_edges > 0);
}

#[test]
fn test_same_seed_same_network() {
    let agents = generate_population(TEST_SEED);
    let a = RelationshipNetwork::build(&agents, TEST_SEED);
    let b = RelationshipNetwork::build(&agents, TEST_SEED);
    assert_eq!(a.bank_hf_edges, b.bank_hf_edges);
    assert_eq!(a.bank_ldi_edges, b.bank_ldi_edges);
    assert_eq!(a.bank_insurer_edges, b.bank_insurer_edges);
    assert_eq!(a.nbfi_fund_edges, b.nbfi_fund_edges);
}

#[test]
fn test_different_seeds_different_networks() {
    let agents = generate_population(TEST_SEED);
    let a = RelationshipNetwork::build(&agents, TEST_SEED);
    let b = RelationshipNetwork::build(&agents, TEST_SEED + 1);
    assert_ne!(
        a.bank_hf_edges, b.bank_hf_edges,
        "different seeds should rewire the prime-brokerage edges"
    );
}
