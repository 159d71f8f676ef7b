//! GPIO / peripheral pin assignments for the station main board.
//!
//! Single source of truth — every hardware adapter references this module
//! rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// I2C bus (DS3231 + MCP23017 + BME280)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 14;
pub const I2C_SCL_GPIO: i32 = 15;
/// I2C bus clock (all three devices are 400 kHz capable).
pub const I2C_FREQ_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// DS3231 interrupt line (INT/SQW, active low, external pull-up)
// ---------------------------------------------------------------------------

pub const RTC_IRQ_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// MCP23017 reset line (active low)
// ---------------------------------------------------------------------------

pub const EXPANDER_RESET_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// HD44780 control lines (data bus is expander port B)
// ---------------------------------------------------------------------------

pub const LCD_RS_GPIO: i32 = 6;
pub const LCD_RW_GPIO: i32 = 7;
pub const LCD_EN_GPIO: i32 = 8;

// ---------------------------------------------------------------------------
// DHT11 single-wire data line (external 5.1k pull-up)
// ---------------------------------------------------------------------------

pub const DHT_DATA_GPIO: i32 = 9;

// ---------------------------------------------------------------------------
// Soil moisture probe
// ---------------------------------------------------------------------------

/// Relay that powers the probe only while sampling (limits electrolysis).
pub const SOIL_RELAY_GPIO: i32 = 10;
/// Probe output — ADC1 channel 0 (GPIO 1 on ESP32-S3).
pub const SOIL_ADC_GPIO: i32 = 1;

// ---------------------------------------------------------------------------
// 4x4 keypad matrix (rows driven, columns read with pull-downs)
// ---------------------------------------------------------------------------

pub const KEYPAD_ROW_GPIOS: [i32; 4] = [16, 17, 18, 21];
pub const KEYPAD_COL_GPIOS: [i32; 4] = [35, 36, 37, 38];
