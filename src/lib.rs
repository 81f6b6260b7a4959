//! STRIDE: autonomous career market agent.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod agents;
pub mod bus;
pub mod config;
pub mod marathon;
pub mod market;
pub mod pipeline;
pub mod reasoning;
pub mod sources;
pub mod storage;
pub mod tournament;
pub mod types;
