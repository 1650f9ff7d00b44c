use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::agents::{Agent, AgentType};
use crate::config;

// ═══════════════════════════════════════════════════════════════════════
// Relationship network — who transacts with whom
// ═══════════════════════════════════════════════════════════════════════

/// Bilateral relationship graph with banks as hubs.
///
/// Edges are typed: hedge funds use banks as prime brokers, LDI funds
/// clear through banks, insurers hold derivatives/repo relationships with
/// banks, and the other NBFIs hold redemption links into pooled funds.
/// Contagion follows these edges: a tightening bank only squeezes ITS
/// hedge funds, and a deleveraging fund only hits ITS banks.
#[derive(Debug, Clone, Default)]
pub struct RelationshipNetwork {
    /// (bank, hedge fund) prime-brokerage / repo edges.
    pub bank_hf_edges: Vec<(String, String)>,
    /// (bank, LDI fund) clearing-member edges.
    pub bank_ldi_edges: Vec<(String, String)>,
    /// (bank, insurer) derivatives/repo edges.
    pub bank_insurer_edges: Vec<(String, String)>,
    /// (NBFI, pooled fund) redemption edges.
    pub nbfi_fund_edges: Vec<(String, String)>,
}

/// Node/edge counts by relation type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub bank_hf_edges: usize,
    pub bank_ldi_edges: usize,
    pub bank_insurer_edges: usize,
    pub nbfi_fund_edges: usize,
}

impl RelationshipNetwork {
    /// Build the graph from a seeded RNG with per-type degree rules.
    /// Larger banks (and larger pooled funds) attract proportionally more
    /// relationships.
    pub fn build(agents: &[Agent], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut network = RelationshipNetwork::default();

        let by_type = |t: AgentType| -> Vec<(&str, f64)> {
            agents
                .iter()
                .filter(|a| a.agent_type() == t)
                .map(|a| (a.name(), a.core().size_factor))
                .collect()
        };
        let banks = by_type(AgentType::Bank);
        let hfs = by_type(AgentType::HedgeFund);
        let ldis = by_type(AgentType::LdiPension);
        let insurers = by_type(AgentType::Insurer);
        let funds = by_type(AgentType::PooledFund);

        let (hf_lo, hf_hi) = config::HF_BANK_DEGREE;
        for (hf, _) in &hfs {
            let n = rng.gen_range(hf_lo..=hf_hi);
            for bank in pick_weighted(&mut rng, &banks, n) {
                network.bank_hf_edges.push((bank.to_string(), hf.to_string()));
            }
        }

        let (ldi_lo, ldi_hi) = config::LDI_BANK_DEGREE;
        for (ldi, _) in &ldis {
            let n = rng.gen_range(ldi_lo..=ldi_hi);
            for bank in pick_weighted(&mut rng, &banks, n) {
                network.bank_ldi_edges.push((bank.to_string(), ldi.to_string()));
            }
        }

        let (ins_lo, ins_hi) = config::INSURER_BANK_DEGREE;
        for (ins, _) in &insurers {
            let n = rng.gen_range(ins_lo..=ins_hi);
            for bank in pick_weighted(&mut rng, &banks, n) {
                network
                    .bank_insurer_edges
                    .push((bank.to_string(), ins.to_string()));
            }
        }

        // Pooled funds have no direct bank edges but are redeemed from by
        // the other NBFIs.
        let (fund_lo, fund_hi) = config::NBFI_POOLED_FUND_DEGREE;
        for (nbfi, _) in hfs.iter().chain(&ldis).chain(&insurers) {
            if funds.is_empty() {
                break;
            }
            let n = rng.gen_range(fund_lo..=fund_hi.min(funds.len()));
            for fund in pick_weighted(&mut rng, &funds, n) {
                network.nbfi_fund_edges.push((nbfi.to_string(), fund.to_string()));
            }
        }

        network
    }

    /// Hedge funds prime-brokered by a bank.
    pub fn connected_hfs(&self, bank: &str) -> Vec<&str> {
        self.bank_hf_edges
            .iter()
            .filter(|(b, _)| b == bank)
            .map(|(_, hf)| hf.as_str())
            .collect()
    }

    /// Banks a hedge fund borrows from.
    pub fn connected_banks(&self, hf: &str) -> Vec<&str> {
        self.bank_hf_edges
            .iter()
            .filter(|(_, h)| h == hf)
            .map(|(b, _)| b.as_str())
            .collect()
    }

    /// LDI funds clearing through a bank.
    pub fn connected_ldis(&self, bank: &str) -> Vec<&str> {
        self.bank_ldi_edges
            .iter()
            .filter(|(b, _)| b == bank)
            .map(|(_, l)| l.as_str())
            .collect()
    }

    /// Banks an LDI fund clears through.
    pub fn clearing_banks(&self, ldi: &str) -> Vec<&str> {
        self.bank_ldi_edges
            .iter()
            .filter(|(_, l)| l == ldi)
            .map(|(b, _)| b.as_str())
            .collect()
    }

    /// Banks an insurer transacts with.
    pub fn insurer_banks(&self, insurer: &str) -> Vec<&str> {
        self.bank_insurer_edges
            .iter()
            .filter(|(_, i)| i == insurer)
            .map(|(b, _)| b.as_str())
            .collect()
    }

    /// Insurers connected to a bank.
    pub fn bank_insurers(&self, bank: &str) -> Vec<&str> {
        self.bank_insurer_edges
            .iter()
            .filter(|(b, _)| b == bank)
            .map(|(_, i)| i.as_str())
            .collect()
    }

    /// NBFIs holding redemption links into a pooled fund.
    pub fn fund_redeemers(&self, fund: &str) -> Vec<&str> {
        self.nbfi_fund_edges
            .iter()
            .filter(|(_, f)| f == fund)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Pooled funds an NBFI can redeem from.
    pub fn redemption_targets(&self, nbfi: &str) -> Vec<&str> {
        self.nbfi_fund_edges
            .iter()
            .filter(|(n, _)| n == nbfi)
            .map(|(_, f)| f.as_str())
            .collect()
    }

    /// Whether a requester holds any bilateral relationship with a bank
    /// (prime brokerage, clearing or derivatives/repo).
    pub fn is_bank_counterparty(&self, bank: &str, requester: &str) -> bool {
        let hit = |edges: &[(String, String)]| {
            edges.iter().any(|(b, c)| b == bank && c == requester)
        };
        hit(&self.bank_hf_edges) || hit(&self.bank_ldi_edges) || hit(&self.bank_insurer_edges)
    }

    /// Counterparty degree of a bank by type.
    pub fn bank_degree(&self, bank: &str) -> (usize, usize, usize) {
        (
            self.connected_hfs(bank).len(),
            self.connected_ldis(bank).len(),
            self.bank_insurers(bank).len(),
        )
    }

    pub fn summary(&self, total_nodes: usize) -> NetworkSummary {
        NetworkSummary {
            total_nodes,
            total_edges: self.bank_hf_edges.len()
                + self.bank_ldi_edges.len()
                + self.bank_insurer_edges.len()
                + self.nbfi_fund_edges.len(),
            bank_hf_edges: self.bank_hf_edges.len(),
            bank_ldi_edges: self.bank_ldi_edges.len(),
            bank_insurer_edges: self.bank_insurer_edges.len(),
            nbfi_fund_edges: self.nbfi_fund_edges.len(),
        }
    }
}

/// Size-weighted sampling without replacement (roulette wheel).
fn pick_weighted<'a>(rng: &mut StdRng, pool: &[(&'a str, f64)], n: usize) -> Vec<&'a str> {
    let mut pool: Vec<(&str, f64)> = pool.to_vec();
    let mut picked = Vec::new();
    for _ in 0..n.min(pool.len()) {
        let total: f64 = pool.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            break;
        }
        let mut roll = rng.gen_range(0.0..total);
        let mut idx = pool.len() - 1;
        for (i, (_, w)) in pool.iter().enumerate() {
            if roll < *w {
                idx = i;
                break;
            }
            roll -= w;
        }
        picked.push(pool.remove(idx).0);
    }
    picked
}
