//! Peripheral drivers.
//!
//! Pure protocol logic over trait seams; the hardware endpoints live in
//! `crate::hw` and the test doubles next to each driver's tests.

pub mod expander;
pub mod keypad;
pub mod lcd;
