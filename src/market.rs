use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::CALM_VIX;

/// The named market variables a scenario drives. Yield/spread/basis moves
/// are cumulative basis points from the scenario start; equity and FX are
/// cumulative percent; haircuts are cumulative percentage points; vix is a
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketVariable {
    Gilt10yYield,
    Gilt30yYield,
    IlGiltYield,
    Ust10yYield,
    IgCorpSpread,
    HyCorpSpread,
    Equity,
    SoniaSwap,
    FxGbpUsd,
    RepoHaircutGilt,
    RepoHaircutCorp,
    BondFuturesBasis,
    Vix,
}

impl MarketVariable {
    pub fn all() -> Vec<MarketVariable> {
        use MarketVariable::*;
        vec![
            Gilt10yYield,
            Gilt30yYield,
            IlGiltYield,
            Ust10yYield,
            IgCorpSpread,
            HyCorpSpread,
            Equity,
            SoniaSwap,
            FxGbpUsd,
            RepoHaircutGilt,
            RepoHaircutCorp,
            BondFuturesBasis,
            Vix,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gilt10yYield => "gilt_10y_yield",
            Self::Gilt30yYield => "gilt_30y_yield",
            Self::IlGiltYield => "il_gilt_yield",
            Self::Ust10yYield => "ust_10y_yield",
            Self::IgCorpSpread => "ig_corp_spread",
            Self::HyCorpSpread => "hy_corp_spread",
            Self::Equity => "equity",
            Self::SoniaSwap => "sonia_swap",
            Self::FxGbpUsd => "fx_gbpusd",
            Self::RepoHaircutGilt => "repo_haircut_gilt",
            Self::RepoHaircutCorp => "repo_haircut_corp",
            Self::BondFuturesBasis => "bond_futures_basis",
            Self::Vix => "vix",
        }
    }
}

/// One day's scenario readings, keyed by variable. BTreeMap so iteration
/// order (and thus every export) is deterministic.
pub type DayValues = BTreeMap<MarketVariable, f64>;

/// Current market conditions: exogenous scenario moves plus endogenous
/// feedback from agent selling pressure.
///
/// The exogenous fields hold the cumulative scenario values for the current
/// day; the feedback engine adds its own price impact back into the same
/// fields, so later consumers always see shock-plus-feedback totals.
#[derive(Debug, Clone)]
pub struct MarketState {
    pub day: usize,

    // Cumulative scenario values (bps or %).
    pub gilt_10y_yield_chg_bps: f64,
    pub gilt_30y_yield_chg_bps: f64,
    pub il_gilt_yield_chg_bps: f64,
    pub ust_10y_yield_chg_bps: f64,
    pub ig_corp_spread_chg_bps: f64,
    pub hy_corp_spread_chg_bps: f64,
    pub equity_chg_pct: f64,
    pub sonia_swap_chg_bps: f64,
    pub fx_gbpusd_chg_pct: f64,
    pub repo_haircut_gilt_chg_pct: f64,
    pub repo_haircut_corp_chg_pct: f64,
    pub bond_futures_basis_chg_bps: f64,
    pub vix_level: f64,

    // Market functioning indicators.
    pub gilt_bid_ask_spread_bps: f64,
    pub corp_bid_ask_spread_bps: f64,
    pub repo_market_availability_pct: f64,
    pub market_depth_gilt_mm: f64,
    pub market_depth_corp_mm: f64,

    // Endogenous pressure accumulators (reset each day).
    pub endogenous_gilt_selling_mm: f64,
    pub endogenous_corp_selling_mm: f64,
    pub endogenous_repo_demand_mm: f64,

    // Endogenous additional price impacts accumulated so far today.
    pub endogenous_gilt_yield_add_bps: f64,
    pub endogenous_ig_spread_add_bps: f64,
}

impl Default for MarketState {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketState {
    pub fn new() -> Self {
        MarketState {
            day: 0,
            gilt_10y_yield_chg_bps: 0.0,
            gilt_30y_yield_chg_bps: 0.0,
            il_gilt_yield_chg_bps: 0.0,
            ust_10y_yield_chg_bps: 0.0,
            ig_corp_spread_chg_bps: 0.0,
            hy_corp_spread_chg_bps: 0.0,
            equity_chg_pct: 0.0,
            sonia_swap_chg_bps: 0.0,
            fx_gbpusd_chg_pct: 0.0,
            repo_haircut_gilt_chg_pct: 0.0,
            repo_haircut_corp_chg_pct: 0.0,
            bond_futures_basis_chg_bps: 0.0,
            vix_level: CALM_VIX,
            gilt_bid_ask_spread_bps: 2.0,
            corp_bid_ask_spread_bps: 5.0,
            repo_market_availability_pct: 1.0,
            market_depth_gilt_mm: 5000.0,
            market_depth_corp_mm: 2000.0,
            endogenous_gilt_selling_mm: 0.0,
            endogenous_corp_selling_mm: 0.0,
            endogenous_repo_demand_mm: 0.0,
            endogenous_gilt_yield_add_bps: 0.0,
            endogenous_ig_spread_add_bps: 0.0,
        }
    }

    /// Stress multiplier relative to the calm baseline.
    pub fn stress_intensity(&self) -> f64 {
        self.vix_level / CALM_VIX
    }

    /// Apply the scenario-driven cumulative values for this day and reset
    /// the endogenous accumulators.
    pub fn apply_exogenous_day(&mut self, values: &DayValues) {
        let get = |v: MarketVariable, default: f64| values.get(&v).copied().unwrap_or(default);

        self.gilt_10y_yield_chg_bps = get(MarketVariable::Gilt10yYield, 0.0);
        self.gilt_30y_yield_chg_bps = get(MarketVariable::Gilt30yYield, 0.0);
        self.il_gilt_yield_chg_bps = get(MarketVariable::IlGiltYield, 0.0);
        self.ust_10y_yield_chg_bps = get(MarketVariable::Ust10yYield, 0.0);
        self.ig_corp_spread_chg_bps = get(MarketVariable::IgCorpSpread, 0.0);
        self.hy_corp_spread_chg_bps = get(MarketVariable::HyCorpSpread, 0.0);
        self.equity_chg_pct = get(MarketVariable::Equity, 0.0);
        self.sonia_swap_chg_bps = get(MarketVariable::SoniaSwap, 0.0);
        self.fx_gbpusd_chg_pct = get(MarketVariable::FxGbpUsd, 0.0);
        self.repo_haircut_gilt_chg_pct = get(MarketVariable::RepoHaircutGilt, 0.0);
        self.repo_haircut_corp_chg_pct = get(MarketVariable::RepoHaircutCorp, 0.0);
        self.bond_futures_basis_chg_bps = get(MarketVariable::BondFuturesBasis, 0.0);
        self.vix_level = get(MarketVariable::Vix, CALM_VIX);

        self.endogenous_gilt_selling_mm = 0.0;
        self.endogenous_corp_selling_mm = 0.0;
        self.endogenous_repo_demand_mm = 0.0;
        self.endogenous_gilt_yield_add_bps = 0.0;
        self.endogenous_ig_spread_add_bps = 0.0;

        // Market functioning tracks scenario severity.
        let stress = self.stress_intensity();
        self.gilt_bid_ask_spread_bps = 2.0 * stress;
        self.corp_bid_ask_spread_bps = 5.0 * stress;
        self.repo_market_availability_pct = (1.0 - (stress - 1.0) * 0.15).max(0.5);
    }

    /// Convert today's aggregate selling pressure into additional price
    /// impact. The extra moves are written back into the cumulative
    /// exogenous fields, so everything downstream sees the combined total.
    pub fn apply_endogenous_feedback(&mut self) {
        if self.market_depth_gilt_mm > 0.0 {
            let gilt_impact =
                (self.endogenous_gilt_selling_mm / self.market_depth_gilt_mm) * 20.0;
            self.endogenous_gilt_yield_add_bps += gilt_impact;
            self.gilt_10y_yield_chg_bps += gilt_impact * 0.5;
            self.gilt_30y_yield_chg_bps += gilt_impact * 0.7;
        }

        if self.market_depth_corp_mm > 0.0 {
            let corp_impact =
                (self.endogenous_corp_selling_mm / self.market_depth_corp_mm) * 30.0;
            self.endogenous_ig_spread_add_bps += corp_impact;
            self.ig_corp_spread_chg_bps += corp_impact * 0.6;
            self.hy_corp_spread_chg_bps += corp_impact * 1.2;
        }

        // Repo demand crowds out availability.
        let total_repo_capacity = 50_000.0;
        let repo_pressure = self.endogenous_repo_demand_mm / total_repo_capacity;
        self.repo_market_availability_pct =
            (self.repo_market_availability_pct - repo_pressure * 0.25).max(0.5);

        // Bid-ask widens with selling; dealers pull depth under stress.
        self.gilt_bid_ask_spread_bps += self.endogenous_gilt_selling_mm * 0.001;
        self.corp_bid_ask_spread_bps += self.endogenous_corp_selling_mm * 0.002;

        let stress = self.stress_intensity();
        self.market_depth_gilt_mm = (5000.0 / stress).max(1000.0);
        self.market_depth_corp_mm = (2000.0 / stress).max(500.0);
    }

    /// Current cumulative value of a variable.
    pub fn variable(&self, var: MarketVariable) -> f64 {
        match var {
            MarketVariable::Gilt10yYield => self.gilt_10y_yield_chg_bps,
            MarketVariable::Gilt30yYield => self.gilt_30y_yield_chg_bps,
            MarketVariable::IlGiltYield => self.il_gilt_yield_chg_bps,
            MarketVariable::Ust10yYield => self.ust_10y_yield_chg_bps,
            MarketVariable::IgCorpSpread => self.ig_corp_spread_chg_bps,
            MarketVariable::HyCorpSpread => self.hy_corp_spread_chg_bps,
            MarketVariable::Equity => self.equity_chg_pct,
            MarketVariable::SoniaSwap => self.sonia_swap_chg_bps,
            MarketVariable::FxGbpUsd => self.fx_gbpusd_chg_pct,
            MarketVariable::RepoHaircutGilt => self.repo_haircut_gilt_chg_pct,
            MarketVariable::RepoHaircutCorp => self.repo_haircut_corp_chg_pct,
            MarketVariable::BondFuturesBasis => self.bond_futures_basis_chg_bps,
            MarketVariable::Vix => self.vix_level,
        }
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            day: self.day,
            gilt_10y_yield_chg_bps: self.gilt_10y_yield_chg_bps,
            gilt_30y_yield_chg_bps: self.gilt_30y_yield_chg_bps,
            il_gilt_yield_chg_bps: self.il_gilt_yield_chg_bps,
            ust_10y_yield_chg_bps: self.ust_10y_yield_chg_bps,
            ig_corp_spread_chg_bps: self.ig_corp_spread_chg_bps,
            hy_corp_spread_chg_bps: self.hy_corp_spread_chg_bps,
            equity_chg_pct: self.equity_chg_pct,
            sonia_swap_chg_bps: self.sonia_swap_chg_bps,
            fx_gbpusd_chg_pct: self.fx_gbpusd_chg_pct,
            repo_haircut_gilt_chg_pct: self.repo_haircut_gilt_chg_pct,
            repo_haircut_corp_chg_pct: self.repo_haircut_corp_chg_pct,
            bond_futures_basis_chg_bps: self.bond_futures_basis_chg_bps,
            vix_level: self.vix_level,
            gilt_bid_ask_spread_bps: self.gilt_bid_ask_spread_bps,
            corp_bid_ask_spread_bps: self.corp_bid_ask_spread_bps,
            repo_market_availability_pct: self.repo_market_availability_pct,
            market_depth_gilt_mm: self.market_depth_gilt_mm,
            market_depth_corp_mm: self.market_depth_corp_mm,
            endogenous_gilt_selling_mm: self.endogenous_gilt_selling_mm,
            endogenous_corp_selling_mm: self.endogenous_corp_selling_mm,
            endogenous_repo_demand_mm: self.endogenous_repo_demand_mm,
            endogenous_gilt_yield_add_bps: self.endogenous_gilt_yield_add_bps,
            endogenous_ig_spread_add_bps: self.endogenous_ig_spread_add_bps,
        }
    }
}

/// Per-day market state record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub day: usize,
    pub gilt_10y_yield_chg_bps: f64,
    pub gilt_30y_yield_chg_bps: f64,
    pub il_gilt_yield_chg_bps: f64,
    pub ust_10y_yield_chg_bps: f64,
    pub ig_corp_spread_chg_bps: f64,
    pub hy_corp_spread_chg_bps: f64,
    pub equity_chg_pct: f64,
    pub sonia_swap_chg_bps: f64,
    pub fx_gbpusd_chg_pct: f64,
    pub repo_haircut_gilt_chg_pct: f64,
    pub repo_haircut_corp_chg_pct: f64,
    pub bond_futures_basis_chg_bps: f64,
    pub vix_level: f64,
    pub gilt_bid_ask_spread_bps: f64,
    pub corp_bid_ask_spread_bps: f64,
    pub repo_market_availability_pct: f64,
    pub market_depth_gilt_mm: f64,
    pub market_depth_corp_mm: f64,
    pub endogenous_gilt_selling_mm: f64,
    pub endogenous_corp_selling_mm: f64,
    pub endogenous_repo_demand_mm: f64,
    pub endogenous_gilt_yield_add_bps: f64,
    pub endogenous_ig_spread_add_bps: f64,
}
