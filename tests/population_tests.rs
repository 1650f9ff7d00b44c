use swes_sim::agents::{Agent, AgentType};
use swes_sim::config;
use swes_sim::population::generate_population;

const TEST_SEED: u64 = 42;

fn count_type(agents: &[Agent], t: AgentType) -> usize {
    agents.iter().filter(|a| a.agent_type() == t).count()
}

#[test]
fn test_population_counts() {
    let agents = generate_population(TEST_SEED);
    assert_eq!(
        agents.len(),
        config::BANK_COUNT
            + config::HEDGE_FUND_COUNT
            + config::LDI_COUNT
            + config::INSURER_COUNT
            + config::POOLED_FUND_COUNT
    );
    assert_eq!(count_type(&agents, AgentType::Bank), config::BANK_COUNT);
    assert_eq!(
        count_type(&agents, AgentType::HedgeFund),
        config::HEDGE_FUND_COUNT
    );
    assert_eq!(count_type(&agents, AgentType::LdiPension), config::LDI_COUNT);
    assert_eq!(count_type(&agents, AgentType::Insurer), config::INSURER_COUNT);
    assert_eq!(
        count_type(&agents, AgentType::PooledFund),
        config::POOLED_FUND_COUNT
    );
}

#[test]
fn test_pooled_funds_ordered_last() {
    // Stage-1 redemption computations read other agents' booked losses,
    // which requires pooled funds to come after every other type.
    let agents = generate_population(TEST_SEED);
    let first_fund = agents
        .iter()
        .position(|a| a.agent_type() == AgentType::PooledFund)
        .expect("population must contain pooled funds");
    for agent in &agents[first_fund..] {
        assert_eq!(
            agent.agent_type(),
            AgentType::PooledFund,
            "non-fund agent {} appears after the first pooled fund",
            agent.name()
        );
    }
}

#[test]
fn test_thetas_within_type_ranges() {
    let agents = generate_population(TEST_SEED);
    for agent in &agents {
        let (lo, hi) = match agent.agent_type() {
            AgentType::Bank => config::BANK_THETA_RANGE,
            AgentType::HedgeFund => config::HEDGE_FUND_THETA_RANGE,
            AgentType::LdiPension => config::LDI_THETA_RANGE,
            AgentType::Insurer => config::INSURER_THETA_RANGE,
            AgentType::PooledFund => config::POOLED_FUND_THETA_RANGE,
        };
        let theta = agent.core().theta;
        assert!(
            theta >= lo && theta <= hi,
            "{} theta {} outside [{}, {}]",
            agent.name(),
            theta,
            lo,
            hi
        );
    }
}

#[test]
fn test_unique_names_and_positive_sizes() {
    let agents = generate_population(TEST_SEED);
    let mut names: Vec<&str> = agents.iter().map(|a| a.name()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), agents.len(), "agent names must be unique");

    for agent in &agents {
        assert!(
            agent.core().size_factor > 0.0,
            "{} has non-positive size factor",
            agent.name()
        );
    }
}

#[test]
fn test_positive_initial_buffers() {
    let mut agents = generate_population(TEST_SEED);
    for agent in agents.iter_mut() {
        let b0 = agent.compute_initial_buffer();
        assert!(b0 > 0.0, "{} has non-positive B0: {}", agent.name(), b0);
    }
}

#[test]
fn test_same_seed_same_population() {
    let a = generate_population(TEST_SEED);
    let b = generate_population(TEST_SEED);
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.name(), y.name());
        assert_eq!(x.core().theta, y.core().theta);
        assert_eq!(x.core().size_factor, y.core().size_factor);
    }
}

#[test]
fn test_different_seeds_diverge() {
    let a = generate_population(TEST_SEED);
    let b = generate_population(TEST_SEED + 1);
    let diverged = a
        .iter()
        .zip(&b)
        .any(|(x, y)| x.core().theta != y.core().theta || x.core().size_factor != y.core().size_factor);
    assert!(diverged, "seeds 42 and 43 produced identical populations");
}
