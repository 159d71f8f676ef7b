//! Station configuration parameters
//!
//! All tunable parameters for the desk clock / environment station.
//! Compile-time defaults only; there is no runtime provisioning surface.

use serde::{Deserialize, Serialize};

/// Core station configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    // --- Bus ---
    /// MCP23017 hardware address pins A2..A0 (0-7).
    pub expander_addr_pins: u8,

    // --- RTC ---
    /// Interval between full DS3231 snapshot reads (milliseconds).
    pub rtc_refresh_ms: u32,

    // --- Environment sensor ---
    /// Interval between BME280 forced-mode samples (milliseconds).
    pub env_sample_ms: u32,

    // --- DHT11 ---
    /// Minimum time between DHT11 transactions (milliseconds).
    pub dht_cooldown_ms: u32,

    // --- Soil probe ---
    /// Interval between soil moisture samples (milliseconds).
    pub soil_sample_ms: u32,
    /// Relay-on stabilisation time before the first conversion (ms).
    pub soil_stabilize_ms: u32,
    /// Spacing between the averaged ADC conversions (ms).
    pub soil_sample_spacing_ms: u32,
    /// Raw ADC reading for bone-dry soil (calibration endpoint).
    pub soil_dry_raw: u16,
    /// Raw ADC reading for saturated soil (calibration endpoint).
    pub soil_wet_raw: u16,

    // --- Keypad ---
    /// Minimum spacing between keypad scans (milliseconds).
    pub keypad_sample_ms: u32,
    /// How long a key must read consistently before it is emitted (ms).
    pub keypad_hold_ms: u32,

    // --- Display ---
    /// Character columns on the LCD.
    pub lcd_cols: u8,
    /// Character rows on the LCD.
    pub lcd_rows: u8,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            // Bus
            expander_addr_pins: 0,

            // RTC
            rtc_refresh_ms: 1000, // 1 Hz clock refresh

            // Environment sensor
            env_sample_ms: 10_000,

            // DHT11
            dht_cooldown_ms: 2000, // datasheet minimum sampling period

            // Soil probe
            soil_sample_ms: 60_000,
            soil_stabilize_ms: 5, // keep the corrosion-prone probe energised briefly
            soil_sample_spacing_ms: 3,
            soil_dry_raw: 600,
            soil_wet_raw: 200,

            // Keypad
            keypad_sample_ms: 5,
            keypad_hold_ms: 250,

            // Display
            lcd_cols: 16,
            lcd_rows: 2,
        }
    }
}

impl StationConfig {
    /// Debounce samples required before a key is emitted.
    pub fn keypad_hold_samples(&self) -> u32 {
        (self.keypad_hold_ms / self.keypad_sample_ms).max(1)
    }
}
