//! Behavioral constants and calibration parameters.
//!
//! Everything here is an externally supplied constant: the simulator never
//! estimates these, it only consumes them. Ranges are sampled once per run
//! by the population factory; scalars are used as-is by the agents and the
//! feedback engine.

/// Standard population counts (70 agents total).
pub const BANK_COUNT: usize = 12;
pub const HEDGE_FUND_COUNT: usize = 35;
pub const LDI_COUNT: usize = 10;
pub const INSURER_COUNT: usize = 6;
pub const POOLED_FUND_COUNT: usize = 7;

/// Network degree rules: (min, max) inclusive.
pub const HF_BANK_DEGREE: (usize, usize) = (2, 3);
pub const LDI_BANK_DEGREE: (usize, usize) = (1, 2);
pub const INSURER_BANK_DEGREE: (usize, usize) = (1, 3);
pub const NBFI_POOLED_FUND_DEGREE: (usize, usize) = (1, 3);

/// Reaction-threshold (theta) sampling ranges per agent type.
pub const BANK_THETA_RANGE: (f64, f64) = (0.35, 0.45);
pub const LDI_THETA_RANGE: (f64, f64) = (0.25, 0.35);
pub const HEDGE_FUND_THETA_RANGE: (f64, f64) = (0.20, 0.30);
pub const INSURER_THETA_RANGE: (f64, f64) = (0.40, 0.50);
pub const POOLED_FUND_THETA_RANGE: (f64, f64) = (0.15, 0.25);

/// A per-action sale cap: fraction of remaining shortfall this action may
/// address, and fraction of the instrument's holding it may consume.
#[derive(Debug, Clone, Copy)]
pub struct SaleCap {
    pub shortfall_alloc: f64,
    pub holding_cap: f64,
}

impl SaleCap {
    pub const fn new(shortfall_alloc: f64, holding_cap: f64) -> Self {
        SaleCap { shortfall_alloc, holding_cap }
    }

    /// min(shortfall allocation, holding cap) applied to concrete amounts.
    pub fn apply(&self, shortfall: f64, holding: f64) -> f64 {
        (shortfall * self.shortfall_alloc).min(holding * self.holding_cap)
    }
}

// Bank reaction caps.
pub const BANK_SELL_GILT: SaleCap = SaleCap::new(0.10, 0.20);
pub const BANK_SELL_CORP: SaleCap = SaleCap::new(0.08, 0.02);

// LDI / pension reaction caps.
pub const LDI_REPO_ASK_PCT: f64 = 0.85;
pub const LDI_SELL_GILT: SaleCap = SaleCap::new(0.15, 0.15);
pub const LDI_SELL_IL_GILT: SaleCap = SaleCap::new(0.08, 0.02);
pub const LDI_SELL_CORP: SaleCap = SaleCap::new(0.05, 0.015);

// Hedge fund reaction caps.
pub const HF_REPO_ASK_PCT: f64 = 0.85;
pub const HF_SELL_GILT: SaleCap = SaleCap::new(0.10, 0.10);
pub const HF_SELL_CORP: SaleCap = SaleCap::new(0.10, 0.025);
pub const HF_SELL_EQUITY: SaleCap = SaleCap::new(0.10, 0.025);
pub const HF_SELL_BASIS_UNWIND: SaleCap = SaleCap::new(0.10, 0.04);
pub const HF_MULTI_STRATEGY: SaleCap = SaleCap::new(0.05, 0.03);

// Insurer reaction caps.
pub const INSURER_REPO_ASK_PCT: f64 = 0.80;
pub const INSURER_SELL_GILT: SaleCap = SaleCap::new(0.15, 0.10);
pub const INSURER_SELL_CORP: SaleCap = SaleCap::new(0.08, 0.02);
pub const INSURER_SELL_EQUITY: SaleCap = SaleCap::new(0.05, 0.025);

// Pooled fund reaction caps.
pub const POOLED_SELL_GILT: SaleCap = SaleCap::new(0.10, 0.20);
pub const POOLED_SELL_CORP: SaleCap = SaleCap::new(0.08, 0.02);

/// Initial buffer (B0) multipliers per agent type. The floor prevents the
/// B0 <= 0 degeneracy that would make the reaction-threshold test
/// always-true or undefined.
pub mod buffer {
    pub const BANK_FACILITY_MULT: f64 = 0.15;
    pub const BANK_CET1_MULT: f64 = 0.08;
    pub const BANK_WHOLESALE_RUNOFF_MULT: f64 = 0.10;
    pub const BANK_FLOOR_PCT_OF_BS: f64 = 0.002;

    pub const LDI_CASH_MULT: f64 = 1.0;
    pub const LDI_COLLATERAL_MULT: f64 = 0.3;
    pub const LDI_FLOOR_PCT_OF_AUM: f64 = 0.005;

    pub const HF_CASH_MULT: f64 = 1.0;
    pub const HF_FLOOR_PCT_OF_AUM: f64 = 0.005;

    pub const INSURER_CASH_MULT: f64 = 0.5;
    pub const INSURER_COMMITTED_REPO_MULT: f64 = 0.2;
    pub const INSURER_RCF_MULT: f64 = 0.2;
    pub const INSURER_FLOOR_PCT_OF_ASSETS: f64 = 0.002;

    pub const POOLED_CASH_MULT: f64 = 0.5;
    pub const POOLED_FLOOR_PCT_OF_AUM: f64 = 0.01;
}

/// Stage-3 feedback coefficients.
pub mod feedback {
    /// Bank counterparty loss from a stressed hedge fund, scaled by the
    /// bilateral repo exposure and the volatility multiplier.
    pub const BANK_COUNTERPARTY_LOSS_COEFF: f64 = 0.005;

    /// When a bank's own stress ratio (E1/B0) reaches this level its
    /// willingness to extend new repo hits zero. Willingness decays
    /// linearly from 1.0 at zero stress.
    pub const BANK_REPO_REFUSAL_STRESS_THRESHOLD: f64 = 0.266353;

    /// Hedge-fund funding stress per connected reacting bank.
    pub const HF_FUNDING_STRESS_COEFF: f64 = 0.05;

    /// Pooled-fund redemption pressure per connected reacting NBFI.
    pub const POOLED_REDEMPTION_PRESSURE_COEFF: f64 = 0.1;

    /// Market-broadcast MTM on liquid holdings.
    pub const BROADCAST_MTM_COEFF: f64 = 0.05;

    /// Reputation penalty on an agent's own reaction total.
    pub const REPUTATION_COEFF: f64 = 0.15;

    /// Crowding penalty on an agent's own reaction total.
    pub const CROWDING_COEFF: f64 = 0.03;
}

/// Baseline "calm" volatility-index level; vix/CALM_VIX is the stress
/// multiplier used throughout.
pub const CALM_VIX: f64 = 15.0;

pub const DEFAULT_HORIZON_DAYS: usize = 10;
pub const DEFAULT_FEEDBACK_ITERATIONS: usize = 3;
pub const DEFAULT_SEED: u64 = 42;

/// Pooled funds apply swing pricing / gates once lifetime redemption
/// inflows exceed this fraction of assets.
pub const POOLED_FUND_GATE_TRIGGER_PCT: f64 = 0.15;

/// Requesters with stress ratio above this redeem aggressively from
/// pooled funds in stage 1.
pub const REDEMPTION_STRESS_TRIGGER: f64 = 0.3;
