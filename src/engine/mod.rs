//! Query engine.
//!
//! - `aggregator`: fans a query out to every price source and blends results

pub mod aggregator;
