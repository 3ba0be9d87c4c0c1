//! Arbitrage Detection Module
//! Mission: Identify and quantify cross-venue price mismatches
//! Philosophy: Profit is in the spread, execution is in the speed

pub mod detector;
pub mod fees;
