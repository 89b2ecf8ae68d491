//! End-to-end tests over the public API.

mod common;
mod generator;
mod orchestration;
mod planner;
mod simulation;
