//! Desk clock / environment station — firmware entry point.
//!
//! One shared I2C bus carries the DS3231 RTC, the MCP23017 expander
//! (which in turn holds the HD44780 data bus) and the BME280. A 1 kHz
//! esp_timer tick feeds the millisecond timebase; the main task runs the
//! cooperative poll loop and yields to the scheduler between passes.
//!
//! ```text
//!   I2C: DS3231 (time, alarms) · MCP23017 ─► HD44780 data · BME280
//!   direct GPIO: LCD RS/RW/E · DHT11 line · soil relay+ADC · keypad
//! ```

use anyhow::Result;
use log::info;

use deskclock::config::StationConfig;
use deskclock::hw;
use deskclock::pins;
use deskclock::station::Station;
use deskclock::timebase::{SpinDelay, TIMEBASE};

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("deskclock v{} starting", env!("CARGO_PKG_VERSION"));

    hw::init_peripherals().map_err(|e| anyhow::anyhow!("peripheral init: {e}"))?;
    hw::start_tick_timer().map_err(|e| anyhow::anyhow!("tick timer: {e}"))?;

    let engine = hw::EspI2cEngine::install(0).map_err(|e| anyhow::anyhow!("i2c: {e}"))?;
    let mut station = Station::new(
        engine,
        hw::EspControlLines,
        hw::EspDhtLine,
        hw::EspSoilAdc::new(hw::SOIL_ADC_CHANNEL),
        hw::SysOutputPin::new(pins::SOIL_RELAY_GPIO),
        hw::EspKeypadPort,
        StationConfig::default(),
    );

    let mut reset_pin = hw::SysOutputPin::new(pins::EXPANDER_RESET_GPIO);
    let mut delay = SpinDelay::new();
    station
        .init(&mut reset_pin, &mut delay)
        .map_err(|e| anyhow::anyhow!("station init: {e}"))?;

    loop {
        station.poll(&mut delay, TIMEBASE.now(), hw::rtc_irq_asserted());
        // Yield so the idle task can feed the watchdog.
        unsafe {
            esp_idf_svc::sys::vTaskDelay(1);
        }
    }
}
