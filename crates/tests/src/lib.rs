//! # Integration Tests
//!
//! End-to-end tests across the workspace crates.
//!
//! - Frame gating and join group scenarios on small graphs
//! - Control-plane visitors on full source/filter/result/sink pipelines
//! - Configuration loading feeding a graph and the timing aggregator

pub mod fixtures;

#[cfg(test)]
mod contract_tests {
    use contracts::{GroupId, SensorSelector};

    #[test]
    fn test_contracts_compile() {
        assert!(GroupId::IMMEDIATE.is_immediate());
        assert_eq!(SensorSelector::default(), SensorSelector::Any);
    }
}

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod control_tests;
#[cfg(test)]
mod e2e_tests;
