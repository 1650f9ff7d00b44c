use serde::{Deserialize, Serialize};

use crate::balance_sheet::{get_item_mut, item_amount, BalanceSheetItem, ItemCategory};
use crate::config::{self, buffer};
use crate::market::{DayValues, MarketState, MarketVariable};
use crate::network::RelationshipNetwork;
use crate::reactions::{total_amount, Reaction, ReactionAction};

// ═══════════════════════════════════════════════════════════════════════
// Shared agent state
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Bank,
    HedgeFund,
    LdiPension,
    Insurer,
    PooledFund,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::HedgeFund => "hedge_fund",
            Self::LdiPension => "ldi_pension",
            Self::Insurer => "insurer",
            Self::PooledFund => "pooled_fund",
        }
    }
}

/// Van den End liquidity ladder for one day: B0 initial buffer, E1 direct
/// losses, B1 post-shock, B2 post-mitigation, E2 accumulated second-round
/// losses, B3 final.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LiquidityPosition {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub b3: f64,
    pub e1: f64,
    pub e2: f64,
}

/// State every agent variant shares.
#[derive(Debug, Clone)]
pub struct AgentCore {
    pub name: String,
    pub theta: f64,
    /// Size proxy used for weighted network assignment and redemption
    /// scaling (balance-sheet total or AUM, in mm).
    pub size_factor: f64,
    pub balance_sheet: Vec<BalanceSheetItem>,
    pub liquidity: LiquidityPosition,
    pub has_reacted: bool,
    pub reactions: Vec<Reaction>,
    pub cumulative_margin_calls_mm: f64,
    pub cumulative_asset_sales_mm: f64,
    pub cumulative_gilt_sales_mm: f64,
    pub cumulative_repo_demand_mm: f64,
    pub cumulative_redemptions_mm: f64,
}

impl AgentCore {
    fn new(name: String, theta: f64, size_factor: f64) -> Self {
        AgentCore {
            name,
            theta,
            size_factor,
            balance_sheet: Vec::new(),
            liquidity: LiquidityPosition::default(),
            has_reacted: false,
            reactions: Vec::new(),
            cumulative_margin_calls_mm: 0.0,
            cumulative_asset_sales_mm: 0.0,
            cumulative_gilt_sales_mm: 0.0,
            cumulative_repo_demand_mm: 0.0,
            cumulative_redemptions_mm: 0.0,
        }
    }

    pub fn reaction_total(&self) -> f64 {
        total_amount(&self.reactions)
    }

    /// Stress ratio E1/B0, zero when the buffer is non-positive.
    pub fn stress_ratio(&self) -> f64 {
        if self.liquidity.b0 > 0.0 {
            self.liquidity.e1 / self.liquidity.b0
        } else {
            0.0
        }
    }
}

/// Daily per-agent record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub day: usize,
    pub agent: String,
    pub agent_type: AgentType,
    pub size_factor: f64,
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub b3: f64,
    pub e1: f64,
    pub e2: f64,
    pub has_reacted: bool,
    pub cum_margin_mm: f64,
    pub cum_sales_mm: f64,
    pub cum_gilt_sales_mm: f64,
    pub cum_repo_mm: f64,
    pub cum_redemptions_mm: f64,
}

/// Output of one agent's stage-2 planning, computed against an immutable
/// view of the whole population and applied afterwards.
#[derive(Debug, Clone, Default)]
pub struct ReactionPlan {
    pub reactions: Vec<Reaction>,
    pub sought_repo: bool,
    pub refused_by_all: bool,
    pub recap_drawn_mm: f64,
}

// ═══════════════════════════════════════════════════════════════════════
// 1. Bank — intermediary, repo provider, market maker
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankTier {
    Major,
    MidTier,
    Specialist,
}

#[derive(Debug, Clone)]
pub struct BankConfig {
    pub name: String,
    pub tier: BankTier,
    pub total_bs_mm: f64,
    pub theta: f64,
    pub risk_appetite: f64,
    pub gilt_holdings_mm: f64,
    pub corp_bond_holdings_mm: f64,
    pub equity_portfolio_mm: f64,
    pub repo_lending_mm: f64,
    pub derivative_assets_mm: f64,
    pub facility_eligible_mm: f64,
    pub wholesale_funding_mm: f64,
    pub cet1_buffer_mm: f64,
    pub gilt_mm_appetite_mm: f64,
    pub corp_mm_appetite_mm: f64,
    pub repo_capacity_mm: f64,
    pub willingness_to_roll_pct: f64,
    pub willingness_to_extend_new_pct: f64,
}

impl Default for BankConfig {
    fn default() -> Self {
        BankConfig {
            name: "Bank_01".to_string(),
            tier: BankTier::Major,
            total_bs_mm: 500_000.0,
            theta: 0.40,
            risk_appetite: 0.6,
            gilt_holdings_mm: 25_000.0,
            corp_bond_holdings_mm: 10_000.0,
            equity_portfolio_mm: 2500.0,
            repo_lending_mm: 30_000.0,
            derivative_assets_mm: 20_000.0,
            facility_eligible_mm: 40_000.0,
            wholesale_funding_mm: 75_000.0,
            cet1_buffer_mm: 30_000.0,
            gilt_mm_appetite_mm: 2000.0,
            corp_mm_appetite_mm: 600.0,
            repo_capacity_mm: 25_000.0,
            willingness_to_roll_pct: 0.9,
            willingness_to_extend_new_pct: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bank {
    pub core: AgentCore,
    pub tier: BankTier,
    pub risk_appetite: f64,
    pub total_bs_mm: f64,
    pub gilt_mm_appetite_mm: f64,
    pub corp_mm_appetite_mm: f64,
    pub gilt_appetite_consumed_pct: f64,
    pub corp_appetite_consumed_pct: f64,
    pub repo_capacity_mm: f64,
    pub willingness_to_roll_pct: f64,
    pub willingness_to_extend_new_pct: f64,
}

impl Bank {
    pub const GILT: &'static str = "Gilt Holdings";
    pub const CORP: &'static str = "Corporate Bond Holdings";
    pub const EQUITY: &'static str = "Equity Portfolio";
    pub const REPO_LENDING: &'static str = "Repo Lending";
    pub const DERIVATIVES: &'static str = "Derivative Assets";
    pub const FACILITY_ELIGIBLE: &'static str = "Facility Eligible Collateral";
    pub const WHOLESALE_FUNDING: &'static str = "Wholesale Funding";
    pub const CET1: &'static str = "CET1 Buffer";

    pub fn new(cfg: BankConfig) -> Self {
        use MarketVariable::*;
        let mut core = AgentCore::new(cfg.name, cfg.theta, cfg.total_bs_mm);
        core.balance_sheet = vec![
            BalanceSheetItem::new(Self::GILT, cfg.gilt_holdings_mm, ItemCategory::LiquidAsset)
                .with_sensitivities(vec![(Gilt10yYield, -0.00045), (Gilt30yYield, -0.00065)])
                .collateral_eligible()
                .reaction_instrument(),
            BalanceSheetItem::new(Self::CORP, cfg.corp_bond_holdings_mm, ItemCategory::LiquidAsset)
                .with_sensitivities(vec![(IgCorpSpread, -0.0004), (HyCorpSpread, -0.0002)])
                .collateral_eligible()
                .reaction_instrument(),
            BalanceSheetItem::new(Self::EQUITY, cfg.equity_portfolio_mm, ItemCategory::LiquidAsset)
                .with_sensitivities(vec![(Equity, 0.01)])
                .reaction_instrument(),
            BalanceSheetItem::new(Self::REPO_LENDING, cfg.repo_lending_mm, ItemCategory::LiquidAsset),
            BalanceSheetItem::new(
                Self::DERIVATIVES,
                cfg.derivative_assets_mm,
                ItemCategory::IlliquidAsset,
            )
            .with_sensitivities(vec![(Gilt10yYield, -0.0002), (SoniaSwap, -0.0002)]),
            BalanceSheetItem::new(
                Self::FACILITY_ELIGIBLE,
                cfg.facility_eligible_mm,
                ItemCategory::LiquidAsset,
            )
            .collateral_eligible(),
            BalanceSheetItem::new(
                Self::WHOLESALE_FUNDING,
                cfg.wholesale_funding_mm,
                ItemCategory::Liability,
            ),
            BalanceSheetItem::new(Self::CET1, cfg.cet1_buffer_mm, ItemCategory::Equity),
        ];
        Bank {
            core,
            tier: cfg.tier,
            risk_appetite: cfg.risk_appetite,
            total_bs_mm: cfg.total_bs_mm,
            gilt_mm_appetite_mm: cfg.gilt_mm_appetite_mm,
            corp_mm_appetite_mm: cfg.corp_mm_appetite_mm,
            gilt_appetite_consumed_pct: 0.0,
            corp_appetite_consumed_pct: 0.0,
            repo_capacity_mm: cfg.repo_capacity_mm,
            willingness_to_roll_pct: cfg.willingness_to_roll_pct,
            willingness_to_extend_new_pct: cfg.willingness_to_extend_new_pct,
        }
    }

    /// Buffer = facility-eligible collateral + CET1 headroom, less
    /// wholesale-funding runoff risk, floored at a sliver of the balance
    /// sheet.
    fn compute_initial_buffer(&mut self) -> f64 {
        let sheet = &self.core.balance_sheet;
        let b0 = item_amount(sheet, Self::FACILITY_ELIGIBLE) * buffer::BANK_FACILITY_MULT
            + item_amount(sheet, Self::CET1) * buffer::BANK_CET1_MULT
            - item_amount(sheet, Self::WHOLESALE_FUNDING) * buffer::BANK_WHOLESALE_RUNOFF_MULT;
        self.core.liquidity.b0 = b0.max(self.total_bs_mm * buffer::BANK_FLOOR_PCT_OF_BS);
        self.core.liquidity.b0
    }

    fn compute_mtm_impact(&self, day_delta: &DayValues) -> f64 {
        self.core
            .balance_sheet
            .iter()
            .map(|item| item.mtm_loss(day_delta))
            .sum()
    }

    fn compute_margin_calls(&self, market: &MarketState) -> f64 {
        let deriv = item_amount(&self.core.balance_sheet, Self::DERIVATIVES);
        if deriv <= 0.0 {
            return 0.0;
        }
        let stress = market.stress_intensity();
        let vm = deriv * market.gilt_10y_yield_chg_bps.abs() * 0.0001 * 0.05;
        let im = if stress > 1.0 { deriv * (stress - 1.0) * 0.005 } else { 0.0 };
        vm + im
    }

    fn compute_redemptions(&self, market: &MarketState) -> f64 {
        // No fund redemptions, but wholesale funding runs under severe
        // stress.
        let wf = item_amount(&self.core.balance_sheet, Self::WHOLESALE_FUNDING);
        let stress = market.stress_intensity();
        if wf > 0.0 && stress > 2.0 {
            wf * (stress - 2.0) * 0.02
        } else {
            0.0
        }
    }

    fn plan_reactions(&self) -> ReactionPlan {
        let mut plan = ReactionPlan::default();
        let sheet = &self.core.balance_sheet;
        let mut shortfall = (-self.core.liquidity.b1).max(0.0);

        // 1. Central bank facilities (preferred)
        let facility = item_amount(sheet, Self::FACILITY_ELIGIBLE);
        if facility > 0.0 {
            let draw = (shortfall * 0.3).min(facility * 0.5);
            if draw > 0.0 {
                plan.reactions.push(Reaction::new(ReactionAction::CentralBankFacility, draw));
            }
            shortfall -= draw;
        }

        // 2. Reduce repo lending (tighten for counterparties)
        if shortfall > 0.0 {
            let repo = item_amount(sheet, Self::REPO_LENDING);
            if repo > 0.0 {
                let cut = (shortfall * 0.3).min(repo * (1.0 - self.risk_appetite) * 0.3);
                if cut > 0.0 {
                    plan.reactions.push(Reaction::new(ReactionAction::ReduceRepoLending, cut));
                }
                shortfall -= cut;
            }
        }

        // 3. Sell gilts (last resort)
        if shortfall > 0.0 {
            let gilt = item_amount(sheet, Self::GILT);
            if gilt > 0.0 {
                let sell = config::BANK_SELL_GILT.apply(shortfall, gilt);
                if sell > 0.0 {
                    plan.reactions.push(Reaction::new(ReactionAction::SellGilt, sell));
                }
                shortfall -= sell;
            }
        }

        // 4. Sell corporate bonds
        if shortfall > 0.0 {
            let corp = item_amount(sheet, Self::CORP);
            if corp > 0.0 {
                let sell = config::BANK_SELL_CORP.apply(shortfall, corp);
                if sell > 0.0 {
                    plan.reactions.push(Reaction::new(ReactionAction::SellCorpBonds, sell));
                }
            }
        }

        plan
    }

    /// How much repo this bank will extend to a connected requester.
    /// Refuses outright when unconnected, and scales down linearly with
    /// its own stress ratio.
    pub fn assess_repo_request(
        &self,
        requester: &str,
        amount_mm: f64,
        network: &RelationshipNetwork,
    ) -> f64 {
        if !network.is_bank_counterparty(&self.core.name, requester) {
            return 0.0;
        }
        let threshold = config::feedback::BANK_REPO_REFUSAL_STRESS_THRESHOLD;
        let stress_ratio = self.core.liquidity.e1 / self.core.liquidity.b0.max(1.0);
        let scaling = (1.0 - stress_ratio / threshold).max(0.0);
        let available = self.repo_capacity_mm * self.willingness_to_extend_new_pct;
        amount_mm.min(available * self.risk_appetite * scaling)
    }

    pub fn gilt_appetite_remaining_mm(&self) -> f64 {
        self.gilt_mm_appetite_mm * (1.0 - self.gilt_appetite_consumed_pct)
    }

    pub fn corp_appetite_remaining_mm(&self) -> f64 {
        self.corp_mm_appetite_mm * (1.0 - self.corp_appetite_consumed_pct)
    }

    fn absorb_gilt_selling(&mut self, amount_mm: f64) -> f64 {
        let absorbed = amount_mm.min(self.gilt_appetite_remaining_mm() * self.risk_appetite);
        if self.gilt_mm_appetite_mm > 0.0 {
            self.gilt_appetite_consumed_pct =
                (self.gilt_appetite_consumed_pct + absorbed / self.gilt_mm_appetite_mm).min(1.0);
        }
        absorbed
    }

    fn absorb_corp_selling(&mut self, amount_mm: f64) -> f64 {
        let absorbed = amount_mm.min(self.corp_appetite_remaining_mm() * self.risk_appetite);
        if self.corp_mm_appetite_mm > 0.0 {
            self.corp_appetite_consumed_pct =
                (self.corp_appetite_consumed_pct + absorbed / self.corp_mm_appetite_mm).min(1.0);
        }
        absorbed
    }

    fn tighten_repo_for_counterparties(&mut self) {
        let tightening = (1.0 - self.risk_appetite) * 0.3;
        self.willingness_to_extend_new_pct =
            (self.willingness_to_extend_new_pct - tightening).max(0.0);
        self.willingness_to_roll_pct =
            (self.willingness_to_roll_pct - tightening * 0.5).max(0.5);
    }

    /// Called once per day after every agent has registered its selling,
    /// with this bank's pro-rata share of the day's totals. A reacting
    /// bank also permanently tightens its repo provision.
    pub fn post_registration_update(&mut self, gilt_share_mm: f64, corp_share_mm: f64) {
        self.absorb_gilt_selling(gilt_share_mm);
        self.absorb_corp_selling(corp_share_mm);
        if self.core.has_reacted {
            self.tighten_repo_for_counterparties();
        }
    }

    fn sale_item_name(action: ReactionAction) -> Option<&'static str> {
        match action {
            ReactionAction::SellGilt => Some(Self::GILT),
            ReactionAction::SellCorpBonds => Some(Self::CORP),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 2. Hedge fund — strategy-specific exposures and reactions
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HfStrategy {
    LongShortEquity,
    MacroRates,
    /// Basis trades — most directly exposed to a rates repricing.
    RelativeValue,
    CreditLongShort,
    MultiStrategy,
}

impl HfStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LongShortEquity => "long_short_equity",
            Self::MacroRates => "macro_rates",
            Self::RelativeValue => "relative_value",
            Self::CreditLongShort => "credit_long_short",
            Self::MultiStrategy => "multi_strategy",
        }
    }

    /// Variables the strategy is most exposed to; margin VM keys off the
    /// worst of these.
    pub fn primary_sensitivities(&self) -> &'static [MarketVariable] {
        use MarketVariable::*;
        match self {
            Self::RelativeValue => &[Gilt10yYield, Gilt30yYield, BondFuturesBasis],
            Self::MacroRates => &[Gilt10yYield, Gilt30yYield, SoniaSwap, Ust10yYield],
            Self::CreditLongShort => &[IgCorpSpread, HyCorpSpread],
            Self::LongShortEquity => &[Equity],
            Self::MultiStrategy => &[Gilt10yYield, Equity, IgCorpSpread],
        }
    }

    pub fn secondary_sensitivities(&self) -> &'static [MarketVariable] {
        use MarketVariable::*;
        match self {
            Self::RelativeValue => &[SoniaSwap],
            Self::MacroRates => &[],
            Self::CreditLongShort => &[Equity],
            Self::LongShortEquity => &[IgCorpSpread],
            Self::MultiStrategy => &[HyCorpSpread],
        }
    }

    fn has_primary(&self, var: MarketVariable) -> bool {
        self.primary_sensitivities().contains(&var)
    }

    fn has_secondary(&self, var: MarketVariable) -> bool {
        self.secondary_sensitivities().contains(&var)
    }

    fn gilt_sensitivities(&self) -> Vec<(MarketVariable, f64)> {
        use MarketVariable::*;
        let mut sens = Vec::new();
        if self.has_primary(Gilt10yYield) {
            sens.push((Gilt10yYield, -0.0006));
        } else if self.has_secondary(Gilt10yYield) {
            sens.push((Gilt10yYield, -0.0002));
        }
        if self.has_primary(Gilt30yYield) {
            sens.push((Gilt30yYield, -0.0008));
        }
        if self.has_primary(SoniaSwap) {
            sens.push((SoniaSwap, -0.0003));
        }
        if sens.is_empty() {
            sens.push((Gilt10yYield, -0.0002));
        }
        sens
    }

    fn equity_sensitivities(&self) -> Vec<(MarketVariable, f64)> {
        use MarketVariable::*;
        if self.has_primary(Equity) {
            vec![(Equity, 0.012)]
        } else if self.has_secondary(Equity) {
            vec![(Equity, 0.005)]
        } else {
            vec![(Equity, 0.002)]
        }
    }

    fn corp_sensitivities(&self) -> Vec<(MarketVariable, f64)> {
        use MarketVariable::*;
        let mut sens = Vec::new();
        if self.has_primary(IgCorpSpread) {
            sens.push((IgCorpSpread, -0.0005));
        }
        if self.has_primary(HyCorpSpread) {
            sens.push((HyCorpSpread, -0.0003));
        }
        if sens.is_empty() {
            sens.push((IgCorpSpread, -0.0002));
        }
        sens
    }
}

/// Reliance on repo funding, as a multiplier on repo-channel exposures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoDependence {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RepoDependence {
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Low => 0.2,
            Self::Medium => 0.5,
            Self::High => 0.8,
            Self::VeryHigh => 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HedgeFundConfig {
    pub name: String,
    pub strategy: HfStrategy,
    pub aum_mm: f64,
    pub theta: f64,
    pub gross_leverage: f64,
    pub var_utilisation: f64,
    pub repo_dependence: RepoDependence,
    /// Fractions of gross exposure held in each instrument family.
    pub gilt_exposure_pct: f64,
    pub equity_exposure_pct: f64,
    pub corp_exposure_pct: f64,
    pub basis_trade_pct: f64,
}

impl Default for HedgeFundConfig {
    fn default() -> Self {
        HedgeFundConfig {
            name: "HF_01".to_string(),
            strategy: HfStrategy::MacroRates,
            aum_mm: 5000.0,
            theta: 0.25,
            gross_leverage: 4.0,
            var_utilisation: 0.7,
            repo_dependence: RepoDependence::High,
            gilt_exposure_pct: 0.35,
            equity_exposure_pct: 0.05,
            corp_exposure_pct: 0.05,
            basis_trade_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HedgeFund {
    pub core: AgentCore,
    pub strategy: HfStrategy,
    pub aum_mm: f64,
    pub gross_leverage: f64,
    pub var_utilisation: f64,
    pub repo_dependence: RepoDependence,
    pub has_ever_sought_repo: bool,
    pub repo_refused_by_all: bool,
}

impl HedgeFund {
    pub const GILT: &'static str = "Gilt Positions";
    pub const EQUITY: &'static str = "Equity Positions";
    pub const CORP: &'static str = "Corp Bond Positions";
    pub const BASIS: &'static str = "Basis Trade Positions";
    pub const CASH: &'static str = "Cash & Margin";
    pub const REPO_BORROWING: &'static str = "Repo Borrowing";
    pub const MARGIN_POSTED: &'static str = "Margin Posted";

    pub fn new(cfg: HedgeFundConfig) -> Self {
        use MarketVariable::*;
        let mut core = AgentCore::new(cfg.name, cfg.theta, cfg.aum_mm);
        let gross = cfg.aum_mm * cfg.gross_leverage;
        let repo_mult = cfg.repo_dependence.multiplier();
        core.balance_sheet = vec![
            BalanceSheetItem::new(Self::GILT, gross * cfg.gilt_exposure_pct, ItemCategory::LiquidAsset)
                .with_sensitivities(cfg.strategy.gilt_sensitivities())
                .collateral_eligible()
                .reaction_instrument(),
            BalanceSheetItem::new(
                Self::EQUITY,
                gross * cfg.equity_exposure_pct,
                ItemCategory::LiquidAsset,
            )
            .with_sensitivities(cfg.strategy.equity_sensitivities())
            .reaction_instrument(),
            BalanceSheetItem::new(Self::CORP, gross * cfg.corp_exposure_pct, ItemCategory::LiquidAsset)
                .with_sensitivities(cfg.strategy.corp_sensitivities())
                .collateral_eligible()
                .reaction_instrument(),
            BalanceSheetItem::new(Self::BASIS, gross * cfg.basis_trade_pct, ItemCategory::LiquidAsset)
                .with_sensitivities(vec![
                    (BondFuturesBasis, -0.001),
                    (Gilt10yYield, -0.0003),
                ])
                .reaction_instrument(),
            BalanceSheetItem::new(Self::CASH, cfg.aum_mm * 0.10, ItemCategory::LiquidAsset),
            BalanceSheetItem::new(Self::REPO_BORROWING, gross * repo_mult * 0.3, ItemCategory::Liability),
            BalanceSheetItem::new(Self::MARGIN_POSTED, cfg.aum_mm * 0.08, ItemCategory::IlliquidAsset),
        ];
        HedgeFund {
            core,
            strategy: cfg.strategy,
            aum_mm: cfg.aum_mm,
            gross_leverage: cfg.gross_leverage,
            var_utilisation: cfg.var_utilisation,
            repo_dependence: cfg.repo_dependence,
            has_ever_sought_repo: false,
            repo_refused_by_all: false,
        }
    }

    pub fn repo_borrowing_mm(&self) -> f64 {
        item_amount(&self.core.balance_sheet, Self::REPO_BORROWING)
    }

    /// Cash only: invested positions are not free liquidity.
    fn compute_initial_buffer(&mut self) -> f64 {
        let cash = item_amount(&self.core.balance_sheet, Self::CASH);
        self.core.liquidity.b0 =
            (cash * buffer::HF_CASH_MULT).max(self.aum_mm * buffer::HF_FLOOR_PCT_OF_AUM);
        self.core.liquidity.b0
    }

    fn compute_mtm_impact(&self, day_delta: &DayValues) -> f64 {
        let base: f64 = self
            .core
            .balance_sheet
            .iter()
            .filter(|i| {
                matches!(i.category, ItemCategory::LiquidAsset | ItemCategory::IlliquidAsset)
            })
            .map(|item| item.mtm_loss(day_delta))
            .sum();
        // Leverage amplifies MTM
        base * (1.0 + (self.gross_leverage - 1.0) * 0.3)
    }

    fn compute_margin_calls(&self, market: &MarketState) -> f64 {
        let stress = market.stress_intensity();
        // VM on the worst primary move (netting offsets correlated legs)
        let max_move = self
            .strategy
            .primary_sensitivities()
            .iter()
            .map(|var| market.variable(*var).abs())
            .fold(0.0, f64::max);
        let vm = self.aum_mm * self.gross_leverage * max_move * 0.0001 * 0.022;
        let im = self.aum_mm * self.gross_leverage * (stress - 1.0).max(0.0) * 0.002;
        let mut haircut = 0.0;
        if self.repo_dependence.multiplier() > 0.5 {
            haircut = self.aum_mm
                * self.repo_dependence.multiplier()
                * market.repo_haircut_gilt_chg_pct
                * 0.003;
        }
        vm + im + haircut
    }

    fn compute_redemptions(&self, market: &MarketState) -> f64 {
        // LP requests only under extreme stress at high VaR utilisation
        let stress = market.stress_intensity();
        if stress > 2.5 && self.var_utilisation > 0.85 {
            self.aum_mm * 0.02
        } else {
            0.0
        }
    }

    fn plan_reactions(
        &self,
        agents: &[Agent],
        market: &MarketState,
        network: &RelationshipNetwork,
    ) -> ReactionPlan {
        let mut plan = ReactionPlan::default();
        let sheet = &self.core.balance_sheet;
        // Keep a margin of safety against further calls
        let mut shortfall = (-self.core.liquidity.b1).max(0.0) + self.core.liquidity.e1 * 0.2;

        // 1. Repo from connected prime brokers, split evenly
        let repo_mult = self.repo_dependence.multiplier();
        if repo_mult > 0.0 {
            let connected = network.connected_banks(&self.core.name);
            let repo_ask = shortfall * repo_mult.max(0.6) * config::HF_REPO_ASK_PCT;
            if repo_ask > 0.0 {
                plan.sought_repo = true;
            }
            let mut obtained = 0.0;
            for bank_name in &connected {
                let ask_per_bank = repo_ask / connected.len().max(1) as f64;
                obtained += match find_bank(agents, bank_name) {
                    Some(bank) => bank.assess_repo_request(&self.core.name, ask_per_bank, network),
                    None => ask_per_bank * market.repo_market_availability_pct,
                };
            }
            if obtained > 0.0 {
                plan.reactions.push(Reaction::new(ReactionAction::SeekRepo, obtained));
                shortfall -= obtained;
            } else if repo_ask > 0.0 {
                // Every counterparty refused — forced to sell
                plan.refused_by_all = true;
            }
        }

        // 2. Strategy-specific asset sales (last resort)
        if shortfall > 0.0 {
            match self.strategy {
                HfStrategy::RelativeValue => {
                    let basis = item_amount(sheet, Self::BASIS);
                    if basis > 0.0 {
                        let sell = config::HF_SELL_BASIS_UNWIND.apply(shortfall, basis);
                        if sell > 0.0 {
                            plan.reactions
                                .push(Reaction::new(ReactionAction::SellGiltBasisUnwind, sell));
                        }
                        shortfall -= sell;
                    }
                    let gilt = item_amount(sheet, Self::GILT);
                    if gilt > 0.0 && shortfall > 0.0 {
                        let sell = config::HF_SELL_GILT.apply(shortfall, gilt);
                        if sell > 0.0 {
                            plan.reactions.push(Reaction::new(ReactionAction::SellGilt, sell));
                        }
                        shortfall -= sell;
                    }
                }
                HfStrategy::MacroRates => {
                    let gilt = item_amount(sheet, Self::GILT);
                    if gilt > 0.0 {
                        let sell = config::HF_SELL_GILT.apply(shortfall, gilt);
                        if sell > 0.0 {
                            plan.reactions.push(Reaction::new(ReactionAction::SellGilt, sell));
                        }
                        shortfall -= sell;
                    }
                }
                HfStrategy::CreditLongShort => {
                    let corp = item_amount(sheet, Self::CORP);
                    if corp > 0.0 {
                        let sell = config::HF_SELL_CORP.apply(shortfall, corp);
                        if sell > 0.0 {
                            plan.reactions.push(Reaction::new(ReactionAction::SellCorpBonds, sell));
                        }
                        shortfall -= sell;
                    }
                }
                HfStrategy::LongShortEquity => {
                    let eq = item_amount(sheet, Self::EQUITY);
                    if eq > 0.0 {
                        let sell = config::HF_SELL_EQUITY.apply(shortfall, eq);
                        if sell > 0.0 {
                            plan.reactions.push(Reaction::new(ReactionAction::SellEquity, sell));
                        }
                        shortfall -= sell;
                    }
                }
                HfStrategy::MultiStrategy => {
                    let ladder = [
                        (Self::GILT, ReactionAction::SellGilt),
                        (Self::CORP, ReactionAction::SellCorpBonds),
                        (Self::EQUITY, ReactionAction::SellEquity),
                    ];
                    for (item_name, action) in ladder {
                        if shortfall <= 0.0 {
                            break;
                        }
                        let held = item_amount(sheet, item_name);
                        if held > 0.0 {
                            let sell = config::HF_MULTI_STRATEGY.apply(shortfall, held);
                            if sell > 0.0 {
                                plan.reactions.push(Reaction::new(action, sell));
                            }
                            shortfall -= sell;
                        }
                    }
                }
            }
        }

        // 3. Redeem from connected pooled funds
        if shortfall > 0.0 {
            let targets = network.redemption_targets(&self.core.name);
            if !targets.is_empty() {
                let redeem = (shortfall * 0.2).min(self.aum_mm * 0.05);
                if redeem > 0.0 {
                    plan.reactions.push(Reaction::new(ReactionAction::RedeemMmf, redeem));
                }
            }
        }

        plan
    }

    fn sale_item_name(action: ReactionAction) -> Option<&'static str> {
        match action {
            ReactionAction::SellGilt => Some(Self::GILT),
            ReactionAction::SellGiltBasisUnwind => Some(Self::BASIS),
            ReactionAction::SellCorpBonds => Some(Self::CORP),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. LDI / pension fund — leverage, yield buffers, recapitalisation
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct LdiPensionConfig {
    pub name: String,
    pub theta: f64,
    pub yield_buffer_bps: f64,
    pub gilt_holdings_mm: f64,
    pub il_gilt_holdings_mm: f64,
    pub corp_bond_holdings_mm: f64,
    pub cash_and_mmf_mm: f64,
    pub derivatives_notional_mm: f64,
    pub ldi_leverage_ratio: f64,
    pub unencumbered_collateral_mm: f64,
    pub recap_available_mm: f64,
    pub recap_speed_days: usize,
    /// Pooled mandates have a pre-agreed waterfall and recapitalise in a
    /// day; segregated ones are slower.
    pub is_pooled: bool,
}

impl Default for LdiPensionConfig {
    fn default() -> Self {
        LdiPensionConfig {
            name: "LDI_01".to_string(),
            theta: 0.30,
            yield_buffer_bps: 100.0,
            gilt_holdings_mm: 18_000.0,
            il_gilt_holdings_mm: 9000.0,
            corp_bond_holdings_mm: 3000.0,
            cash_and_mmf_mm: 1500.0,
            derivatives_notional_mm: 60_000.0,
            ldi_leverage_ratio: 2.5,
            unencumbered_collateral_mm: 2500.0,
            recap_available_mm: 3000.0,
            recap_speed_days: 5,
            is_pooled: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LdiPension {
    pub core: AgentCore,
    pub aum_mm: f64,
    pub yield_buffer_bps: f64,
    pub ldi_leverage_ratio: f64,
    pub is_pooled: bool,
    pub recap_available_mm: f64,
    pub recap_speed_days: usize,
    pub recap_used_mm: f64,
    pub yield_buffer_consumed_pct: f64,
}

impl LdiPension {
    pub const GILT: &'static str = "Gilt Holdings";
    pub const IL_GILT: &'static str = "IL Gilt Holdings";
    pub const CORP: &'static str = "Corporate Bond Holdings";
    pub const CASH: &'static str = "Cash & MMF";
    pub const DERIVATIVES: &'static str = "Derivatives Exposure";
    pub const COLLATERAL: &'static str = "Unencumbered Collateral";
    pub const MARGIN_POSTED: &'static str = "Margin Posted";

    pub fn new(cfg: LdiPensionConfig) -> Self {
        use MarketVariable::*;
        let aum_mm = cfg.gilt_holdings_mm
            + cfg.il_gilt_holdings_mm
            + cfg.corp_bond_holdings_mm
            + cfg.cash_and_mmf_mm;
        let mut core = AgentCore::new(cfg.name, cfg.theta, aum_mm);
        core.balance_sheet = vec![
            BalanceSheetItem::new(Self::GILT, cfg.gilt_holdings_mm, ItemCategory::LiquidAsset)
                .with_sensitivities(vec![(Gilt10yYield, -0.0006), (Gilt30yYield, -0.0009)])
                .collateral_eligible()
                .reaction_instrument(),
            BalanceSheetItem::new(Self::IL_GILT, cfg.il_gilt_holdings_mm, ItemCategory::LiquidAsset)
                .with_sensitivities(vec![(IlGiltYield, -0.0007)])
                .collateral_eligible()
                .reaction_instrument(),
            BalanceSheetItem::new(Self::CORP, cfg.corp_bond_holdings_mm, ItemCategory::LiquidAsset)
                .with_sensitivities(vec![(IgCorpSpread, -0.0004)])
                .collateral_eligible()
                .reaction_instrument(),
            BalanceSheetItem::new(Self::CASH, cfg.cash_and_mmf_mm, ItemCategory::LiquidAsset),
            BalanceSheetItem::new(
                Self::DERIVATIVES,
                cfg.derivatives_notional_mm,
                ItemCategory::OffBalanceSheet,
            )
            .with_sensitivities(vec![
                (Gilt10yYield, -0.0003),
                (SoniaSwap, -0.0003),
                (Gilt30yYield, -0.0004),
            ]),
            BalanceSheetItem::new(
                Self::COLLATERAL,
                cfg.unencumbered_collateral_mm,
                ItemCategory::LiquidAsset,
            )
            .collateral_eligible(),
            BalanceSheetItem::new(Self::MARGIN_POSTED, aum_mm * 0.05, ItemCategory::IlliquidAsset),
        ];
        LdiPension {
            core,
            aum_mm,
            yield_buffer_bps: cfg.yield_buffer_bps,
            ldi_leverage_ratio: cfg.ldi_leverage_ratio,
            is_pooled: cfg.is_pooled,
            recap_available_mm: cfg.recap_available_mm,
            recap_speed_days: cfg.recap_speed_days,
            recap_used_mm: 0.0,
            yield_buffer_consumed_pct: 0.0,
        }
    }

    fn compute_initial_buffer(&mut self) -> f64 {
        let sheet = &self.core.balance_sheet;
        let b0 = item_amount(sheet, Self::CASH) * buffer::LDI_CASH_MULT
            + item_amount(sheet, Self::COLLATERAL) * buffer::LDI_COLLATERAL_MULT;
        self.core.liquidity.b0 = b0.max(self.aum_mm * buffer::LDI_FLOOR_PCT_OF_AUM);
        self.core.liquidity.b0
    }

    fn compute_mtm_impact(&self, day_delta: &DayValues) -> f64 {
        let base: f64 = self
            .core
            .balance_sheet
            .iter()
            .map(|item| item.mtm_loss(day_delta))
            .sum();
        base * self.ldi_leverage_ratio * 0.5
    }

    /// Margin calls on the hedge book. Consumes the yield buffer: once the
    /// cumulative 10y move exceeds it, calls escalate.
    fn compute_margin_calls(&mut self, market: &MarketState) -> f64 {
        let deriv = item_amount(&self.core.balance_sheet, Self::DERIVATIVES);
        if deriv <= 0.0 {
            return 0.0;
        }

        // Worst gilt move, not the sum: the book nets across tenors
        let gilt_move = market
            .gilt_10y_yield_chg_bps
            .abs()
            .max(market.gilt_30y_yield_chg_bps.abs());
        let mut vm = deriv * gilt_move * 0.0001 * 0.04;

        let stress = market.stress_intensity();
        let im = deriv * (stress - 1.0).max(0.0) * 0.003;

        let cumulative_move = market.gilt_10y_yield_chg_bps.abs();
        self.yield_buffer_consumed_pct = (cumulative_move / self.yield_buffer_bps).min(1.0);
        if self.yield_buffer_consumed_pct >= 1.0 {
            let excess = cumulative_move - self.yield_buffer_bps;
            vm += deriv * excess * 0.0001 * 0.06;
        }

        vm + im
    }

    fn compute_redemptions(&self, network: &RelationshipNetwork) -> f64 {
        // Once the yield buffer is mostly gone, pull cash out of pooled
        // funds to meet calls.
        if self.yield_buffer_consumed_pct > 0.7 {
            let targets = network.redemption_targets(&self.core.name);
            let cash = item_amount(&self.core.balance_sheet, Self::CASH);
            if !targets.is_empty() && cash > 0.0 {
                return cash * self.yield_buffer_consumed_pct * 0.3;
            }
        }
        0.0
    }

    fn plan_reactions(
        &self,
        agents: &[Agent],
        market: &MarketState,
        network: &RelationshipNetwork,
    ) -> ReactionPlan {
        let mut plan = ReactionPlan::default();
        let sheet = &self.core.balance_sheet;
        let mut shortfall = (-self.core.liquidity.b1).max(0.0) + self.core.liquidity.e1 * 0.1;

        // 1. Post unencumbered collateral
        let uec = item_amount(sheet, Self::COLLATERAL);
        if uec > 0.0 {
            let use_amt = (shortfall * 0.4).min(uec * 0.5);
            if use_amt > 0.0 {
                plan.reactions.push(Reaction::new(ReactionAction::PostCollateral, use_amt));
            }
            shortfall -= use_amt;
        }

        // 2. Recapitalisation from the pension scheme
        if shortfall > 0.0 && self.recap_available_mm > self.recap_used_mm {
            let daily_recap = (self.recap_available_mm - self.recap_used_mm)
                / self.recap_speed_days.max(1) as f64;
            let recap = (shortfall * 0.3).min(daily_recap);
            if recap > 0.0 {
                plan.reactions.push(Reaction::new(ReactionAction::Recapitalisation, recap));
                plan.recap_drawn_mm = recap;
            }
            shortfall -= recap;
        }

        // 3. Repo via clearing banks (primary funding channel)
        if shortfall > 0.0 {
            let clearing = network.clearing_banks(&self.core.name);
            let repo_ask = shortfall * config::LDI_REPO_ASK_PCT;
            let mut obtained = 0.0;
            for bank_name in &clearing {
                let ask_per_bank = repo_ask / clearing.len().max(1) as f64;
                obtained += match find_bank(agents, bank_name) {
                    Some(bank) => bank.assess_repo_request(&self.core.name, ask_per_bank, network),
                    None => ask_per_bank * market.repo_market_availability_pct,
                };
            }
            if obtained > 0.0 {
                plan.reactions.push(Reaction::new(ReactionAction::SeekRepo, obtained));
                shortfall -= obtained;
            }
        }

        // 4-6. Sell gilts, IL gilts, then corp (last resort)
        let ladder = [
            (Self::GILT, ReactionAction::SellGilt, config::LDI_SELL_GILT),
            (Self::IL_GILT, ReactionAction::SellIlGilt, config::LDI_SELL_IL_GILT),
            (Self::CORP, ReactionAction::SellCorpBonds, config::LDI_SELL_CORP),
        ];
        for (item_name, action, cap) in ladder {
            if shortfall <= 0.0 {
                break;
            }
            let held = item_amount(sheet, item_name);
            if held > 0.0 {
                let sell = cap.apply(shortfall, held);
                if sell > 0.0 {
                    plan.reactions.push(Reaction::new(action, sell));
                }
                shortfall -= sell;
            }
        }

        // 7. Redeem pooled fund holdings
        if shortfall > 0.0 && !network.redemption_targets(&self.core.name).is_empty() {
            let redeem = (shortfall * 0.2).min(self.aum_mm * 0.05);
            if redeem > 0.0 {
                plan.reactions.push(Reaction::new(ReactionAction::RedeemMmf, redeem));
            }
        }

        plan
    }

    fn sale_item_name(action: ReactionAction) -> Option<&'static str> {
        match action {
            ReactionAction::SellGilt => Some(Self::GILT),
            ReactionAction::SellIlGilt => Some(Self::IL_GILT),
            ReactionAction::SellCorpBonds => Some(Self::CORP),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 4. Insurer — hedge ratio, dirty CSA mechanics
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct InsurerConfig {
    pub name: String,
    pub theta: f64,
    /// Fraction of rate exposure hedged; offsets part of MTM.
    pub hedge_ratio: f64,
    /// Fraction of CSAs accepting bonds as collateral, which get haircut
    /// during stress.
    pub dirty_csa_pct: f64,
    pub gilt_holdings_mm: f64,
    pub corp_bond_holdings_mm: f64,
    pub equity_portfolio_mm: f64,
    pub derivative_hedges_notional_mm: f64,
    pub cash_and_liquid_mm: f64,
    pub committed_repo_lines_mm: f64,
    pub rcf_available_mm: f64,
}

impl Default for InsurerConfig {
    fn default() -> Self {
        InsurerConfig {
            name: "Insurer_01".to_string(),
            theta: 0.45,
            hedge_ratio: 0.7,
            dirty_csa_pct: 0.3,
            gilt_holdings_mm: 30_000.0,
            corp_bond_holdings_mm: 35_000.0,
            equity_portfolio_mm: 10_000.0,
            derivative_hedges_notional_mm: 45_000.0,
            cash_and_liquid_mm: 5000.0,
            committed_repo_lines_mm: 4000.0,
            rcf_available_mm: 2500.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Insurer {
    pub core: AgentCore,
    pub total_mm: f64,
    pub hedge_ratio: f64,
    pub dirty_csa_pct: f64,
}

impl Insurer {
    pub const GILT: &'static str = "Gilt Holdings";
    pub const CORP: &'static str = "Corporate Bond Holdings";
    pub const EQUITY: &'static str = "Equity Portfolio";
    pub const DERIVATIVES: &'static str = "Derivative Hedges";
    pub const CASH: &'static str = "Cash & Liquid";
    pub const MARGIN_POSTED: &'static str = "Margin Posted";
    pub const REPO_LINES: &'static str = "Committed Repo Lines";
    pub const RCF: &'static str = "RCF Available";

    pub fn new(cfg: InsurerConfig) -> Self {
        use MarketVariable::*;
        let total_mm = cfg.gilt_holdings_mm
            + cfg.corp_bond_holdings_mm
            + cfg.equity_portfolio_mm
            + cfg.cash_and_liquid_mm;
        let mut core = AgentCore::new(cfg.name, cfg.theta, total_mm);
        core.balance_sheet = vec![
            BalanceSheetItem::new(Self::GILT, cfg.gilt_holdings_mm, ItemCategory::LiquidAsset)
                .with_sensitivities(vec![(Gilt10yYield, -0.0005), (Gilt30yYield, -0.0007)])
                .collateral_eligible()
                .reaction_instrument(),
            BalanceSheetItem::new(Self::CORP, cfg.corp_bond_holdings_mm, ItemCategory::LiquidAsset)
                .with_sensitivities(vec![(IgCorpSpread, -0.0004), (HyCorpSpread, -0.0002)])
                .collateral_eligible()
                .reaction_instrument(),
            BalanceSheetItem::new(Self::EQUITY, cfg.equity_portfolio_mm, ItemCategory::LiquidAsset)
                .with_sensitivities(vec![(Equity, 0.01)])
                .reaction_instrument(),
            BalanceSheetItem::new(
                Self::DERIVATIVES,
                cfg.derivative_hedges_notional_mm,
                ItemCategory::OffBalanceSheet,
            )
            .with_sensitivities(vec![(Gilt10yYield, -0.0002), (SoniaSwap, -0.0002)]),
            BalanceSheetItem::new(Self::CASH, cfg.cash_and_liquid_mm, ItemCategory::LiquidAsset),
            BalanceSheetItem::new(Self::MARGIN_POSTED, total_mm * 0.02, ItemCategory::IlliquidAsset),
            BalanceSheetItem::new(Self::REPO_LINES, cfg.committed_repo_lines_mm, ItemCategory::LiquidAsset)
                .collateral_eligible(),
            BalanceSheetItem::new(Self::RCF, cfg.rcf_available_mm, ItemCategory::LiquidAsset),
        ];
        Insurer {
            core,
            total_mm,
            hedge_ratio: cfg.hedge_ratio,
            dirty_csa_pct: cfg.dirty_csa_pct,
        }
    }

    fn compute_initial_buffer(&mut self) -> f64 {
        let sheet = &self.core.balance_sheet;
        let b0 = item_amount(sheet, Self::CASH) * buffer::INSURER_CASH_MULT
            + item_amount(sheet, Self::REPO_LINES) * buffer::INSURER_COMMITTED_REPO_MULT
            + item_amount(sheet, Self::RCF) * buffer::INSURER_RCF_MULT;
        self.core.liquidity.b0 = b0.max(self.total_mm * buffer::INSURER_FLOOR_PCT_OF_ASSETS);
        self.core.liquidity.b0
    }

    fn compute_mtm_impact(&self, day_delta: &DayValues) -> f64 {
        let mut total: f64 = self
            .core
            .balance_sheet
            .iter()
            .map(|item| item.mtm_loss(day_delta))
            .sum();
        // The hedge book offsets part of the impact
        if item_amount(&self.core.balance_sheet, Self::DERIVATIVES) > 0.0 {
            let offset = total * self.hedge_ratio * 0.3;
            total = (total - offset).max(0.0);
        }
        total
    }

    fn compute_margin_calls(&self, market: &MarketState) -> f64 {
        let deriv = item_amount(&self.core.balance_sheet, Self::DERIVATIVES);
        if deriv <= 0.0 {
            return 0.0;
        }
        let stress = market.stress_intensity();
        let mut vm = deriv * market.gilt_10y_yield_chg_bps.abs() * 0.0001 * 0.008;
        let im = deriv * (stress - 1.0).max(0.0) * 0.0008;

        // Dirty CSAs: bond collateral gets haircut during stress
        if self.dirty_csa_pct > 0.0 {
            vm += deriv * self.dirty_csa_pct * market.repo_haircut_corp_chg_pct * 0.01 * 0.05;
        }

        vm + im
    }

    fn compute_redemptions(&self, market: &MarketState) -> f64 {
        // Policy surrenders stay small inside a two-week window
        if market.stress_intensity() > 2.5 {
            self.total_mm * 0.005
        } else {
            0.0
        }
    }

    fn plan_reactions(
        &self,
        agents: &[Agent],
        market: &MarketState,
        network: &RelationshipNetwork,
    ) -> ReactionPlan {
        let mut plan = ReactionPlan::default();
        let sheet = &self.core.balance_sheet;
        let mut shortfall = (-self.core.liquidity.b1).max(0.0) + self.core.liquidity.e1 * 0.1;

        // 1. Draw committed repo lines
        let lines = item_amount(sheet, Self::REPO_LINES);
        if lines > 0.0 {
            let draw = (shortfall * 0.3).min(lines * 0.5);
            if draw > 0.0 {
                plan.reactions.push(Reaction::new(ReactionAction::DrawRepoLine, draw));
            }
            shortfall -= draw;
        }

        // 2. Draw the RCF
        let rcf = item_amount(sheet, Self::RCF);
        if rcf > 0.0 {
            let draw = (shortfall * 0.2).min(rcf * 0.5);
            if draw > 0.0 {
                plan.reactions.push(Reaction::new(ReactionAction::DrawRcf, draw));
            }
            shortfall -= draw;
        }

        // 3. Repo from relationship banks
        if shortfall > 0.0 {
            let connected = network.insurer_banks(&self.core.name);
            let repo_ask = shortfall * config::INSURER_REPO_ASK_PCT;
            let mut obtained = 0.0;
            for bank_name in &connected {
                let ask_per_bank = repo_ask / connected.len().max(1) as f64;
                obtained += match find_bank(agents, bank_name) {
                    Some(bank) => bank.assess_repo_request(&self.core.name, ask_per_bank, network),
                    None => ask_per_bank * market.repo_market_availability_pct,
                };
            }
            if obtained > 0.0 {
                plan.reactions.push(Reaction::new(ReactionAction::SeekRepo, obtained));
                shortfall -= obtained;
            }
        }

        // 4-6. Sell gilts, corp, then equity (last resort)
        let ladder = [
            (Self::GILT, ReactionAction::SellGilt, config::INSURER_SELL_GILT),
            (Self::CORP, ReactionAction::SellCorpBonds, config::INSURER_SELL_CORP),
            (Self::EQUITY, ReactionAction::SellEquity, config::INSURER_SELL_EQUITY),
        ];
        for (item_name, action, cap) in ladder {
            if shortfall <= 0.0 {
                break;
            }
            let held = item_amount(sheet, item_name);
            if held > 0.0 {
                let sell = cap.apply(shortfall, held);
                if sell > 0.0 {
                    plan.reactions.push(Reaction::new(action, sell));
                }
                shortfall -= sell;
            }
        }

        // 7. Redeem pooled fund holdings
        if shortfall > 0.0 && !network.redemption_targets(&self.core.name).is_empty() {
            let redeem = (shortfall * 0.15).min(self.total_mm * 0.03);
            if redeem > 0.0 {
                plan.reactions.push(Reaction::new(ReactionAction::RedeemMmf, redeem));
            }
        }

        plan
    }

    fn sale_item_name(action: ReactionAction) -> Option<&'static str> {
        match action {
            ReactionAction::SellGilt => Some(Self::GILT),
            ReactionAction::SellCorpBonds => Some(Self::CORP),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 5. Pooled fund — redemption-driven mechanics
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct PooledFundConfig {
    pub name: String,
    pub theta: f64,
    pub aum_mm: f64,
    pub pension_investor_pct: f64,
    pub insurer_investor_pct: f64,
    pub gilt_pct: f64,
    pub corp_pct: f64,
    pub abs_pct: f64,
    pub cash_pct: f64,
}

impl Default for PooledFundConfig {
    fn default() -> Self {
        PooledFundConfig {
            name: "Fund_01".to_string(),
            theta: 0.20,
            aum_mm: 20_000.0,
            pension_investor_pct: 0.4,
            insurer_investor_pct: 0.2,
            gilt_pct: 0.25,
            corp_pct: 0.15,
            abs_pct: 0.03,
            cash_pct: 0.08,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PooledFund {
    pub core: AgentCore,
    pub aum_mm: f64,
    pub pension_investor_pct: f64,
    pub insurer_investor_pct: f64,
    pub cumulative_redemption_inflows_mm: f64,
}

impl PooledFund {
    pub const GILT: &'static str = "Gilt Holdings";
    pub const CORP: &'static str = "Corporate Bond Holdings";
    pub const ABS: &'static str = "ABS Holdings";
    pub const CASH: &'static str = "Cash Buffer";

    pub fn new(cfg: PooledFundConfig) -> Self {
        use MarketVariable::*;
        let mut core = AgentCore::new(cfg.name, cfg.theta, cfg.aum_mm);
        core.balance_sheet = vec![
            BalanceSheetItem::new(Self::GILT, cfg.aum_mm * cfg.gilt_pct, ItemCategory::LiquidAsset)
                .with_sensitivities(vec![(Gilt10yYield, -0.0005), (Gilt30yYield, -0.0006)])
                .collateral_eligible()
                .reaction_instrument(),
            BalanceSheetItem::new(Self::CORP, cfg.aum_mm * cfg.corp_pct, ItemCategory::LiquidAsset)
                .with_sensitivities(vec![(IgCorpSpread, -0.0004), (HyCorpSpread, -0.0002)])
                .collateral_eligible()
                .reaction_instrument(),
            BalanceSheetItem::new(Self::ABS, cfg.aum_mm * cfg.abs_pct, ItemCategory::IlliquidAsset)
                .with_sensitivities(vec![(IgCorpSpread, -0.0002)]),
            BalanceSheetItem::new(Self::CASH, cfg.aum_mm * cfg.cash_pct, ItemCategory::LiquidAsset),
        ];
        PooledFund {
            core,
            aum_mm: cfg.aum_mm,
            pension_investor_pct: cfg.pension_investor_pct,
            insurer_investor_pct: cfg.insurer_investor_pct,
            cumulative_redemption_inflows_mm: 0.0,
        }
    }

    fn compute_initial_buffer(&mut self) -> f64 {
        let cash = item_amount(&self.core.balance_sheet, Self::CASH);
        self.core.liquidity.b0 = (cash * buffer::POOLED_CASH_MULT)
            .max(self.aum_mm * buffer::POOLED_FLOOR_PCT_OF_AUM);
        self.core.liquidity.b0
    }

    fn compute_mtm_impact(&self, day_delta: &DayValues) -> f64 {
        self.core
            .balance_sheet
            .iter()
            .map(|item| item.mtm_loss(day_delta))
            .sum()
    }

    /// Redemption demands from connected stressed investors. The caller
    /// routes the total back through `apply_stage1` so the lifetime inflow
    /// counter (which drives swing pricing) stays current.
    fn compute_redemptions(&self, agents: &[Agent], network: &RelationshipNetwork) -> f64 {
        let mut total = 0.0;
        for redeemer_name in network.fund_redeemers(&self.core.name) {
            let Some(redeemer) = find_agent(agents, redeemer_name) else {
                continue;
            };
            let stress_ratio = redeemer.core().stress_ratio();
            if stress_ratio <= config::REDEMPTION_STRESS_TRIGGER {
                continue;
            }
            let mut base = redeemer.core().size_factor * 0.001 * stress_ratio;
            base *= match redeemer.agent_type() {
                AgentType::LdiPension => self.pension_investor_pct * 2.0,
                AgentType::Insurer => self.insurer_investor_pct * 1.5,
                AgentType::HedgeFund => 0.5,
                _ => 1.0,
            };
            total += base;
        }
        total
    }

    fn plan_reactions(&self) -> ReactionPlan {
        let mut plan = ReactionPlan::default();
        let sheet = &self.core.balance_sheet;
        let mut shortfall = (-self.core.liquidity.b1).max(0.0) + self.core.liquidity.e1 * 0.1;

        // 1. Run down the cash buffer
        let cash = item_amount(sheet, Self::CASH);
        if cash > 0.0 {
            let use_amt = (shortfall * 0.5).min(cash * 0.7);
            if use_amt > 0.0 {
                plan.reactions.push(Reaction::new(ReactionAction::UseCashBuffer, use_amt));
            }
            shortfall -= use_amt;
        }

        // 2-3. Sell gilts then corp (last resort)
        let ladder = [
            (Self::GILT, ReactionAction::SellGilt, config::POOLED_SELL_GILT),
            (Self::CORP, ReactionAction::SellCorpBonds, config::POOLED_SELL_CORP),
        ];
        for (item_name, action, cap) in ladder {
            if shortfall <= 0.0 {
                break;
            }
            let held = item_amount(sheet, item_name);
            if held > 0.0 {
                let sell = cap.apply(shortfall, held);
                if sell > 0.0 {
                    plan.reactions.push(Reaction::new(action, sell));
                }
                shortfall -= sell;
            }
        }

        // 4. Swing pricing / gates once lifetime inflows are extreme
        if shortfall > 0.0 && self.aum_mm > 0.0 {
            let redemption_ratio = self.cumulative_redemption_inflows_mm / self.aum_mm;
            if redemption_ratio > config::POOLED_FUND_GATE_TRIGGER_PCT {
                plan.reactions
                    .push(Reaction::new(ReactionAction::SwingPricing, shortfall * 0.2));
            }
        }

        plan
    }

    fn sale_item_name(action: ReactionAction) -> Option<&'static str> {
        match action {
            ReactionAction::SellGilt => Some(Self::GILT),
            ReactionAction::SellCorpBonds => Some(Self::CORP),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Agent — closed polymorphic wrapper with uniform stage sequencing
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub enum Agent {
    Bank(Bank),
    HedgeFund(HedgeFund),
    LdiPension(LdiPension),
    Insurer(Insurer),
    PooledFund(PooledFund),
}

impl Agent {
    pub fn core(&self) -> &AgentCore {
        match self {
            Agent::Bank(a) => &a.core,
            Agent::HedgeFund(a) => &a.core,
            Agent::LdiPension(a) => &a.core,
            Agent::Insurer(a) => &a.core,
            Agent::PooledFund(a) => &a.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut AgentCore {
        match self {
            Agent::Bank(a) => &mut a.core,
            Agent::HedgeFund(a) => &mut a.core,
            Agent::LdiPension(a) => &mut a.core,
            Agent::Insurer(a) => &mut a.core,
            Agent::PooledFund(a) => &mut a.core,
        }
    }

    pub fn agent_type(&self) -> AgentType {
        match self {
            Agent::Bank(_) => AgentType::Bank,
            Agent::HedgeFund(_) => AgentType::HedgeFund,
            Agent::LdiPension(_) => AgentType::LdiPension,
            Agent::Insurer(_) => AgentType::Insurer,
            Agent::PooledFund(_) => AgentType::PooledFund,
        }
    }

    pub fn name(&self) -> &str {
        &self.core().name
    }

    pub fn as_bank(&self) -> Option<&Bank> {
        match self {
            Agent::Bank(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bank_mut(&mut self) -> Option<&mut Bank> {
        match self {
            Agent::Bank(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_hedge_fund(&self) -> Option<&HedgeFund> {
        match self {
            Agent::HedgeFund(h) => Some(h),
            _ => None,
        }
    }

    /// Clear the daily stress state. Lifetime counters, consumed
    /// capacities and repo flags persist across days.
    pub fn reset_daily(&mut self) {
        let core = self.core_mut();
        core.liquidity.e1 = 0.0;
        core.liquidity.e2 = 0.0;
        core.has_reacted = false;
        core.reactions.clear();
    }

    pub fn compute_initial_buffer(&mut self) -> f64 {
        match self {
            Agent::Bank(a) => a.compute_initial_buffer(),
            Agent::HedgeFund(a) => a.compute_initial_buffer(),
            Agent::LdiPension(a) => a.compute_initial_buffer(),
            Agent::Insurer(a) => a.compute_initial_buffer(),
            Agent::PooledFund(a) => a.compute_initial_buffer(),
        }
    }

    pub fn compute_mtm_impact(&self, day_delta: &DayValues) -> f64 {
        match self {
            Agent::Bank(a) => a.compute_mtm_impact(day_delta),
            Agent::HedgeFund(a) => a.compute_mtm_impact(day_delta),
            Agent::LdiPension(a) => a.compute_mtm_impact(day_delta),
            Agent::Insurer(a) => a.compute_mtm_impact(day_delta),
            Agent::PooledFund(a) => a.compute_mtm_impact(day_delta),
        }
    }

    /// Margin calls may consume state (the LDI yield buffer), so this
    /// takes `&mut self` and must run before redemptions each day.
    pub fn compute_margin_calls(&mut self, market: &MarketState) -> f64 {
        match self {
            Agent::Bank(a) => a.compute_margin_calls(market),
            Agent::HedgeFund(a) => a.compute_margin_calls(market),
            Agent::LdiPension(a) => a.compute_margin_calls(market),
            Agent::Insurer(a) => a.compute_margin_calls(market),
            Agent::PooledFund(_) => 0.0,
        }
    }

    /// Book the day's direct losses.
    pub fn apply_stage1(&mut self, mtm: f64, margin: f64, redemptions: f64) {
        if let Agent::PooledFund(f) = self {
            f.cumulative_redemption_inflows_mm += redemptions;
        }
        let core = self.core_mut();
        core.liquidity.e1 = mtm + margin + redemptions;
        core.liquidity.b1 = core.liquidity.b0 - core.liquidity.e1;
        core.cumulative_margin_calls_mm += margin;
        core.cumulative_redemptions_mm += redemptions;
    }

    /// Threshold test: react only when direct losses exceed theta of the
    /// initial buffer.
    pub fn should_react(&self) -> bool {
        let liq = &self.core().liquidity;
        liq.b0 > 0.0 && liq.e1 / liq.b0 > self.core().theta
    }

    /// Book a reaction plan: realize mitigation against market frictions,
    /// set B2, and update lifetime counters.
    pub fn apply_stage2(&mut self, plan: ReactionPlan, market: &MarketState) {
        if !self.should_react() {
            let core = self.core_mut();
            core.has_reacted = false;
            core.reactions.clear();
            core.liquidity.b2 = core.liquidity.b1;
            return;
        }

        match self {
            Agent::HedgeFund(h) => {
                h.has_ever_sought_repo |= plan.sought_repo;
                h.repo_refused_by_all |= plan.refused_by_all;
            }
            Agent::LdiPension(l) => {
                l.recap_used_mm += plan.recap_drawn_mm;
            }
            _ => {}
        }

        let mitigation: f64 = plan
            .reactions
            .iter()
            .map(|r| r.amount_mm * r.action.realization_rate(market))
            .sum();

        let core = self.core_mut();
        core.has_reacted = true;
        core.reactions = plan.reactions;
        core.liquidity.b2 = core.liquidity.b1 + mitigation;

        for r in &core.reactions {
            if r.action.is_sale() {
                core.cumulative_asset_sales_mm += r.amount_mm;
            }
            if r.action.is_gilt_sale() {
                core.cumulative_gilt_sales_mm += r.amount_mm;
            }
            if r.action.is_repo_demand() {
                core.cumulative_repo_demand_mm += r.amount_mm;
            }
        }
    }

    /// Accumulate second-round losses. Called once per feedback iteration.
    pub fn apply_stage3(&mut self, e2: f64) {
        let core = self.core_mut();
        core.liquidity.e2 += e2;
        core.liquidity.b3 = core.liquidity.b2 - core.liquidity.e2;
    }

    /// Push today's actions into the market's endogenous accumulators.
    pub fn register_actions_to_market(&self, market: &mut MarketState) {
        for r in &self.core().reactions {
            if r.action.is_gilt_sale() {
                market.endogenous_gilt_selling_mm += r.amount_mm;
            } else if r.action.is_corp_sale() {
                market.endogenous_corp_selling_mm += r.amount_mm;
            } else if r.action.is_repo_demand() {
                market.endogenous_repo_demand_mm += r.amount_mm;
            }
        }
    }

    /// End-of-day settlement: sold holdings shrink, floored at zero, so
    /// tomorrow's buffer and MTM base reflect today's sales.
    pub fn settle_sales(&mut self) {
        let sale_item: fn(ReactionAction) -> Option<&'static str> = match self {
            Agent::Bank(_) => Bank::sale_item_name,
            Agent::HedgeFund(_) => HedgeFund::sale_item_name,
            Agent::LdiPension(_) => LdiPension::sale_item_name,
            Agent::Insurer(_) => Insurer::sale_item_name,
            Agent::PooledFund(_) => PooledFund::sale_item_name,
        };
        let settlements: Vec<(&'static str, f64)> = self
            .core()
            .reactions
            .iter()
            .filter_map(|r| sale_item(r.action).map(|name| (name, r.amount_mm)))
            .collect();
        let sheet = &mut self.core_mut().balance_sheet;
        for (name, amount) in settlements {
            if let Some(item) = get_item_mut(sheet, name) {
                item.amount_mm = (item.amount_mm - amount).max(0.0);
            }
        }
    }

    pub fn daily_snapshot(&self, day: usize) -> AgentSnapshot {
        let core = self.core();
        AgentSnapshot {
            day,
            agent: core.name.clone(),
            agent_type: self.agent_type(),
            size_factor: core.size_factor,
            b0: core.liquidity.b0,
            b1: core.liquidity.b1,
            b2: core.liquidity.b2,
            b3: core.liquidity.b3,
            e1: core.liquidity.e1,
            e2: core.liquidity.e2,
            has_reacted: core.has_reacted,
            cum_margin_mm: core.cumulative_margin_calls_mm,
            cum_sales_mm: core.cumulative_asset_sales_mm,
            cum_gilt_sales_mm: core.cumulative_gilt_sales_mm,
            cum_repo_mm: core.cumulative_repo_demand_mm,
            cum_redemptions_mm: core.cumulative_redemptions_mm,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Cross-agent stage computations
// ═══════════════════════════════════════════════════════════════════════

pub fn find_agent<'a>(agents: &'a [Agent], name: &str) -> Option<&'a Agent> {
    agents.iter().find(|a| a.name() == name)
}

pub fn find_bank<'a>(agents: &'a [Agent], name: &str) -> Option<&'a Bank> {
    find_agent(agents, name).and_then(|a| a.as_bank())
}

/// Redemption outflows hitting one agent today. Pooled funds read other
/// agents' stage-1 losses, so pooled funds must be ordered last in the
/// agent vector.
pub fn compute_redemptions_for(
    agents: &[Agent],
    idx: usize,
    market: &MarketState,
    network: &RelationshipNetwork,
) -> f64 {
    match &agents[idx] {
        Agent::Bank(a) => a.compute_redemptions(market),
        Agent::HedgeFund(a) => a.compute_redemptions(market),
        Agent::LdiPension(a) => a.compute_redemptions(network),
        Agent::Insurer(a) => a.compute_redemptions(market),
        Agent::PooledFund(a) => a.compute_redemptions(agents, network),
    }
}

/// Plan one agent's stage-2 reactions against an immutable view of the
/// population (bank repo assessments read bank state).
pub fn plan_reactions(
    agents: &[Agent],
    idx: usize,
    market: &MarketState,
    network: &RelationshipNetwork,
) -> ReactionPlan {
    if !agents[idx].should_react() {
        return ReactionPlan::default();
    }
    match &agents[idx] {
        Agent::Bank(a) => a.plan_reactions(),
        Agent::HedgeFund(a) => a.plan_reactions(agents, market, network),
        Agent::LdiPension(a) => a.plan_reactions(agents, market, network),
        Agent::Insurer(a) => a.plan_reactions(agents, market, network),
        Agent::PooledFund(a) => a.plan_reactions(),
    }
}

/// Convenience for tests and callers that want the full stage-1 pass.
pub fn run_stage1(
    agents: &mut [Agent],
    market: &MarketState,
    day_delta: &DayValues,
    network: &RelationshipNetwork,
) {
    for i in 0..agents.len() {
        agents[i].reset_daily();
        agents[i].compute_initial_buffer();
        let mtm = agents[i].compute_mtm_impact(day_delta);
        let margin = agents[i].compute_margin_calls(market);
        let redemptions = compute_redemptions_for(agents, i, market, network);
        agents[i].apply_stage1(mtm, margin, redemptions);
    }
}

/// Full stage-2 pass: plan against the immutable population, then book.
pub fn run_stage2(agents: &mut [Agent], market: &MarketState, network: &RelationshipNetwork) {
    for i in 0..agents.len() {
        let plan = plan_reactions(agents, i, market, network);
        agents[i].apply_stage2(plan, market);
    }
}
