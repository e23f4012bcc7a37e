//! Grid Traffic Simulation Library
//!
//! A tick-driven grid traffic simulation with fixed-route and learning agents.

pub mod simulation;
