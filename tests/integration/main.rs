//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a subsystem against
//! the simulated I2C board. All tests run on the host with no real
//! hardware required.

mod mock_bus;
mod rtc_tests;
mod station_tests;
