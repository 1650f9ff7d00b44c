use serde::{Deserialize, Serialize};

use crate::market::{DayValues, MarketVariable};

/// Accounting category of a balance-sheet line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    LiquidAsset,
    IlliquidAsset,
    Liability,
    Equity,
    OffBalanceSheet,
}

/// One balance-sheet line with first-order sensitivities to market
/// variables. Sensitivities are kept as a sorted Vec rather than a map so
/// MTM sums are order-stable across runs.
#[derive(Debug, Clone)]
pub struct BalanceSheetItem {
    pub name: &'static str,
    pub amount_mm: f64,
    pub category: ItemCategory,
    pub sensitivities: Vec<(MarketVariable, f64)>,
    pub is_collateral_eligible: bool,
    pub is_reaction_instrument: bool,
}

impl BalanceSheetItem {
    pub fn new(name: &'static str, amount_mm: f64, category: ItemCategory) -> Self {
        BalanceSheetItem {
            name,
            amount_mm,
            category,
            sensitivities: Vec::new(),
            is_collateral_eligible: false,
            is_reaction_instrument: false,
        }
    }

    pub fn with_sensitivities(
        mut self,
        mut sensitivities: Vec<(MarketVariable, f64)>,
    ) -> Self {
        sensitivities.sort_by_key(|(var, _)| *var);
        self.sensitivities = sensitivities;
        self
    }

    pub fn collateral_eligible(mut self) -> Self {
        self.is_collateral_eligible = true;
        self
    }

    pub fn reaction_instrument(mut self) -> Self {
        self.is_reaction_instrument = true;
        self
    }

    /// Absolute first-order MTM loss from one day of market moves.
    pub fn mtm_loss(&self, day_delta: &DayValues) -> f64 {
        self.sensitivities
            .iter()
            .map(|(var, sens)| {
                let delta = day_delta.get(var).copied().unwrap_or(0.0);
                (self.amount_mm * sens * delta).abs()
            })
            .sum()
    }
}

/// Look up an item by name on a balance sheet.
pub fn get_item<'a>(sheet: &'a [BalanceSheetItem], name: &str) -> Option<&'a BalanceSheetItem> {
    sheet.iter().find(|i| i.name == name)
}

pub fn get_item_mut<'a>(
    sheet: &'a mut [BalanceSheetItem],
    name: &str,
) -> Option<&'a mut BalanceSheetItem> {
    sheet.iter_mut().find(|i| i.name == name)
}

/// Amount held in a named item, zero when the line is absent.
pub fn item_amount(sheet: &[BalanceSheetItem], name: &str) -> f64 {
    get_item(sheet, name).map_or(0.0, |i| i.amount_mm)
}
