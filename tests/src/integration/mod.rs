//! Cross-crate composition scenarios.

#[cfg(test)]
mod fixtures;

pub mod composition_flows;
pub mod concurrency;
pub mod failure_injection;
pub mod signers;
