//! tangent-rebalancer: maximum-Sharpe portfolio rebalancing against a brokerage.
//!
//! Runs the configured strategies, blends their weights, sizes whole-share
//! holdings from account capital, diffs them against open positions, and
//! submits sells before buys, retrying orders the broker caps.

pub mod blend;
pub mod broker;
pub mod config;
pub mod diff;
pub mod error;
pub mod execution;
pub mod orders;
pub mod sizing;
pub mod strategy;
