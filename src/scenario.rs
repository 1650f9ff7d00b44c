use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{CALM_VIX, DEFAULT_HORIZON_DAYS};
use crate::market::{DayValues, MarketVariable};

// ═══════════════════════════════════════════════════════════════════════
// Scenario — day-indexed cumulative paths for every market variable
// ═══════════════════════════════════════════════════════════════════════

/// A named stress scenario: one cumulative path per market variable over a
/// fixed horizon. Paths carry values in the same units as `MarketState`
/// (bps, %, levels).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub horizon_days: usize,
    pub variable_paths: BTreeMap<MarketVariable, Vec<f64>>,
}

impl Scenario {
    /// Cumulative values for one day. Variables missing a path read as
    /// zero (vix as the calm level).
    pub fn day_values(&self, day: usize) -> DayValues {
        let mut values = DayValues::new();
        for var in MarketVariable::all() {
            let v = self
                .variable_paths
                .get(&var)
                .and_then(|path| path.get(day))
                .copied()
                .unwrap_or(if var == MarketVariable::Vix { CALM_VIX } else { 0.0 });
            values.insert(var, v);
        }
        values
    }

    /// Day-over-day deltas (day 0 deltas are the day-0 cumulative values,
    /// with vix measured against the calm level).
    pub fn day_delta(&self, day: usize) -> DayValues {
        let today = self.day_values(day);
        let prev = if day == 0 {
            let mut base = DayValues::new();
            for var in MarketVariable::all() {
                base.insert(var, if var == MarketVariable::Vix { CALM_VIX } else { 0.0 });
            }
            base
        } else {
            self.day_values(day - 1)
        };
        today
            .iter()
            .map(|(var, v)| (*var, v - prev.get(var).copied().unwrap_or(0.0)))
            .collect()
    }

    pub fn load(path: &Path) -> Result<Scenario, Box<dyn Error>> {
        let raw = std::fs::read_to_string(path)?;
        let scenario: Scenario = serde_json::from_str(&raw)?;
        if scenario.horizon_days == 0 {
            return Err(format!("scenario {} has zero horizon", scenario.name).into());
        }
        for (var, path) in &scenario.variable_paths {
            if path.len() < scenario.horizon_days {
                return Err(format!(
                    "scenario {}: path for {} has {} days, horizon is {}",
                    scenario.name,
                    var.as_str(),
                    path.len(),
                    scenario.horizon_days
                )
                .into());
            }
        }
        Ok(scenario)
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in scenario generators
// ═══════════════════════════════════════════════════════════════════════

/// Built-in scenarios. `FastChannel` is the reference calibration: a sharp
/// global rates repricing concentrated in the first days of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Sharp rates repricing, vix 15 -> 33, front-loaded.
    FastChannel,
    /// Half-sized moves, vix peaks at 22.
    Mild,
    /// 1.5x moves, vix peaks at 45.
    Severe,
}

impl ScenarioId {
    pub fn all() -> Vec<ScenarioId> {
        vec![ScenarioId::FastChannel, ScenarioId::Mild, ScenarioId::Severe]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::FastChannel => "fast_channel",
            ScenarioId::Mild => "mild",
            ScenarioId::Severe => "severe",
        }
    }

    pub fn parse(s: &str) -> Result<ScenarioId, String> {
        match s {
            "fast_channel" => Ok(ScenarioId::FastChannel),
            "mild" => Ok(ScenarioId::Mild),
            "severe" => Ok(ScenarioId::Severe),
            other => Err(format!(
                "unknown scenario '{}' (expected fast_channel, mild or severe)",
                other
            )),
        }
    }

    fn scale(&self) -> f64 {
        match self {
            ScenarioId::FastChannel => 1.0,
            ScenarioId::Mild => 0.5,
            ScenarioId::Severe => 1.5,
        }
    }

    fn peak_vix(&self) -> f64 {
        match self {
            ScenarioId::FastChannel => 33.0,
            ScenarioId::Mild => 22.0,
            ScenarioId::Severe => 45.0,
        }
    }

    /// Generate the cumulative paths over a horizon. The ramp is
    /// front-loaded (t^0.6) so most of the move lands early in the window.
    pub fn generate(&self, horizon_days: usize) -> Scenario {
        use MarketVariable::*;

        let scale = self.scale();
        let targets: Vec<(MarketVariable, f64)> = vec![
            (Gilt10yYield, 115.0 * scale),
            (Gilt30yYield, 130.0 * scale),
            (IlGiltYield, 120.0 * scale),
            (Ust10yYield, 65.0 * scale),
            (IgCorpSpread, 65.0 * scale),
            (HyCorpSpread, 130.0 * scale),
            (Equity, -6.0 * scale),
            (SoniaSwap, 55.0 * scale),
            (FxGbpUsd, -4.0 * scale),
            (RepoHaircutGilt, 1.5 * scale),
            (RepoHaircutCorp, 2.5 * scale),
            (BondFuturesBasis, 25.0 * scale),
        ];

        let ramp: Vec<f64> = (0..horizon_days)
            .map(|day| ((day + 1) as f64 / horizon_days as f64).powf(0.6))
            .collect();

        let mut paths = BTreeMap::new();
        for (var, target) in targets {
            paths.insert(var, ramp.iter().map(|r| target * r).collect());
        }
        paths.insert(
            Vix,
            ramp.iter()
                .map(|r| CALM_VIX + (self.peak_vix() - CALM_VIX) * r)
                .collect(),
        );

        Scenario {
            name: self.name().to_string(),
            horizon_days,
            variable_paths: paths,
        }
    }

    pub fn default_scenario(&self) -> Scenario {
        self.generate(DEFAULT_HORIZON_DAYS)
    }
}
