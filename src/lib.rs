//! Desk clock / environment station firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod bus;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod rtc;
pub mod station;
pub mod timebase;

pub mod pins;

// Driver and sensor modules. Hardware adapters live in `hw` and are
// guarded by cfg attributes inside.
pub mod drivers;
pub mod hw;
pub mod sensors;
