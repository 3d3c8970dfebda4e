//! Periodic OpenStack Ceilometer metrics collection agent.
//!
//! Authenticates against the identity service, polls a fixed set of meters on
//! an interval, maps statistics fields to reported metric names, and emits
//! them to the monitoring relay over stdout.

pub mod accumulator;
pub mod ceilometer;
pub mod config;
pub mod mappings;
pub mod poller;
pub mod report;
