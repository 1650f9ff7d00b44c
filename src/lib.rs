//! Multi-agent simulator for system-wide liquidity stress.
//!
//! A fixed population of heterogeneous financial institutions (banks, hedge
//! funds, LDI/pension funds, insurers, pooled funds) is pushed through a
//! multi-day market scenario. Each day runs three stages: direct
//! mark-to-market/margin/redemption losses, threshold-triggered mitigating
//! reactions routed through a bilateral relationship network, and iterated
//! second-round feedback (bilateral, market-broadcast, reputation, crowding).
//! The headline output is the amplification ratio: total loss including
//! feedback over direct first-round loss.

pub mod agents;
pub mod balance_sheet;
pub mod config;
pub mod feedback;
pub mod market;
pub mod network;
pub mod output;
pub mod population;
pub mod reactions;
pub mod scenario;
pub mod simulation;
pub mod sweep;
