use serde::{Deserialize, Serialize};

use crate::market::MarketState;

// ═══════════════════════════════════════════════════════════════════════
// Reaction actions — the closed set of mitigating actions agents can take
// ═══════════════════════════════════════════════════════════════════════

/// Every mitigating action the stage-2 waterfalls can produce. The tag
/// drives realization rates, market registration, cumulative counters and
/// end-of-day settlement, so adding a variant means deciding all four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionAction {
    SellGilt,
    SellIlGilt,
    SellGiltBasisUnwind,
    SellCorpBonds,
    SellEquity,
    SeekRepo,
    ReduceRepoLending,
    DrawRepoLine,
    DrawRcf,
    CentralBankFacility,
    PostCollateral,
    Recapitalisation,
    RedeemMmf,
    UseCashBuffer,
    SwingPricing,
}

/// Realization class: how much of a nominal action amount actually turns
/// into usable liquidity under current market conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionKind {
    /// Outright sale, discounted by the bid-ask spread.
    Sale,
    /// Repo-channel action, scaled by repo market availability.
    Repo,
    /// Central bank facility draw, near-certain.
    Facility,
    /// Fund redemption, small settlement friction.
    Redemption,
    /// Internal action (collateral, recap, RCF, cash, gates).
    Other,
}

impl ReactionAction {
    pub fn kind(&self) -> ReactionKind {
        match self {
            Self::SellGilt
            | Self::SellIlGilt
            | Self::SellGiltBasisUnwind
            | Self::SellCorpBonds
            | Self::SellEquity => ReactionKind::Sale,
            Self::SeekRepo | Self::ReduceRepoLending | Self::DrawRepoLine => ReactionKind::Repo,
            Self::CentralBankFacility => ReactionKind::Facility,
            Self::RedeemMmf => ReactionKind::Redemption,
            Self::DrawRcf
            | Self::PostCollateral
            | Self::Recapitalisation
            | Self::UseCashBuffer
            | Self::SwingPricing => ReactionKind::Other,
        }
    }

    /// Fraction of the nominal amount realized as liquidity.
    pub fn realization_rate(&self, market: &MarketState) -> f64 {
        match self.kind() {
            ReactionKind::Sale => (1.0 - market.gilt_bid_ask_spread_bps / 100.0).max(0.5),
            ReactionKind::Repo => market.repo_market_availability_pct,
            ReactionKind::Facility => 0.95,
            ReactionKind::Redemption => 0.90,
            ReactionKind::Other => 0.80,
        }
    }

    pub fn is_sale(&self) -> bool {
        self.kind() == ReactionKind::Sale
    }

    /// Gilt-family sales: nominal, index-linked, basis unwinds.
    pub fn is_gilt_sale(&self) -> bool {
        matches!(
            self,
            Self::SellGilt | Self::SellIlGilt | Self::SellGiltBasisUnwind
        )
    }

    pub fn is_corp_sale(&self) -> bool {
        matches!(self, Self::SellCorpBonds)
    }

    pub fn is_repo_demand(&self) -> bool {
        self.kind() == ReactionKind::Repo
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SellGilt => "sell_gilt",
            Self::SellIlGilt => "sell_gilt_il",
            Self::SellGiltBasisUnwind => "sell_gilt_basis_unwind",
            Self::SellCorpBonds => "sell_corp_bonds",
            Self::SellEquity => "sell_equity",
            Self::SeekRepo => "seek_repo",
            Self::ReduceRepoLending => "reduce_repo_lending",
            Self::DrawRepoLine => "draw_repo_line",
            Self::DrawRcf => "draw_rcf",
            Self::CentralBankFacility => "central_bank_facility",
            Self::PostCollateral => "post_collateral",
            Self::Recapitalisation => "recapitalisation",
            Self::RedeemMmf => "redeem_mmf",
            Self::UseCashBuffer => "use_cash_buffer",
            Self::SwingPricing => "swing_pricing",
        }
    }
}

/// One action with its nominal size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Reaction {
    pub action: ReactionAction,
    pub amount_mm: f64,
}

impl Reaction {
    pub fn new(action: ReactionAction, amount_mm: f64) -> Self {
        Reaction { action, amount_mm }
    }
}

/// Nominal total across a reaction list.
pub fn total_amount(reactions: &[Reaction]) -> f64 {
    reactions.iter().map(|r| r.amount_mm).sum()
}
