//! TWOOPT: two-stage optimization of data flow in virtualized networks.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod cli;
pub mod config;
pub mod data;
pub mod generator;
pub mod network;
pub mod optimizer;
pub mod orchestration;
pub mod planner;
pub mod processor;
pub mod report;
pub mod simulation;
pub mod storage;
pub mod types;
