//! Sensor subsystem.
//!
//! Three independent drivers, each advanced from the station poll loop:
//!
//! - [`environment`] — BME280 temperature/pressure/humidity behind the
//!   shared I2C transport.
//! - [`dht11`] — single-wire DHT11 with bounded bit-bang timing.
//! - [`soil`] — relay-switched resistive soil probe on an ADC channel.
//!
//! Every driver is generic over a trait seam (bus controller, data line,
//! ADC) so the logic runs host-side under test with scripted hardware.

pub mod dht11;
pub mod environment;
pub mod soil;
