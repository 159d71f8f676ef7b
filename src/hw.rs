//! ESP-IDF hardware adapters.
//!
//! Everything in here is guarded by `#[cfg(target_os = "espidf")]`; the
//! trait seams (`BusController`, `ControlLines`, `DhtLine`, `SoilAdc`,
//! `KeypadPort`) are what the rest of the crate sees, so host builds and
//! tests substitute scripted implementations instead.
//!
//! Peripheral setup follows the one-shot pattern: `init_peripherals()`
//! runs once from `main()` before the poll loop starts, and the handles
//! it writes (`static mut`, single writer at boot) are read only from the
//! single main-task context afterwards.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::bus::{BusController, BusEvent};
#[cfg(target_os = "espidf")]
use crate::drivers::keypad::KeypadPort;
#[cfg(target_os = "espidf")]
use crate::drivers::lcd::ControlLines;
#[cfg(target_os = "espidf")]
use crate::error::{BusFault, Result, SensorFault};
#[cfg(target_os = "espidf")]
use crate::pins;
#[cfg(target_os = "espidf")]
use crate::sensors::dht11::DhtLine;
#[cfg(target_os = "espidf")]
use crate::sensors::soil::SoilAdc;
#[cfg(target_os = "espidf")]
use crate::timebase::TIMEBASE;

/// Largest single bus read (BME280 calibration block).
#[cfg(target_os = "espidf")]
const READ_BUF_LEN: usize = 32;

/// Blocking-call timeout handed to the IDF I2C driver.
#[cfg(target_os = "espidf")]
const I2C_TIMEOUT_TICKS: u32 = 100;

// ── gpio helpers ──────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn gpio_read(pin: i32) -> bool {
    // SAFETY: read-only register access on an already-configured pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(target_os = "espidf")]
fn gpio_write(pin: i32, high: bool) {
    // SAFETY: level write on a pin configured as output during init.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

/// DS3231 INT/SQW is active low.
#[cfg(target_os = "espidf")]
pub fn rtc_irq_asserted() -> bool {
    !gpio_read(pins::RTC_IRQ_GPIO)
}

// ── i2c engine ────────────────────────────────────────────────────

/// [`BusController`] over the IDF legacy I2C master driver.
///
/// The IDF driver completes transfers synchronously, so `start_write` /
/// `start_read` run the transfer immediately and latch the outcome;
/// `service()` hands the latched event to the transport's wait loop on
/// its first call.
#[cfg(target_os = "espidf")]
pub struct EspI2cEngine {
    port: i2c_port_t,
    addr: u8,
    pending: Option<BusEvent>,
    rx: [u8; READ_BUF_LEN],
    rx_len: usize,
}

#[cfg(target_os = "espidf")]
impl EspI2cEngine {
    /// Install the I2C driver on `port` with the board pinout.
    pub fn install(port: i2c_port_t) -> Result<Self> {
        let cfg = i2c_config_t {
            mode: i2c_mode_t_I2C_MODE_MASTER,
            sda_io_num: pins::I2C_SDA_GPIO,
            scl_io_num: pins::I2C_SCL_GPIO,
            sda_pullup_en: true,
            scl_pullup_en: true,
            __bindgen_anon_1: i2c_config_t__bindgen_ty_1 {
                master: i2c_config_t__bindgen_ty_1__bindgen_ty_1 {
                    clk_speed: pins::I2C_FREQ_HZ,
                },
            },
            ..Default::default()
        };
        // SAFETY: one-shot driver install from the boot path.
        let rc = unsafe { i2c_param_config(port, &cfg) };
        if rc != ESP_OK {
            return Err(crate::error::Error::Init("i2c param config"));
        }
        let rc = unsafe { i2c_driver_install(port, i2c_mode_t_I2C_MODE_MASTER, 0, 0, 0) };
        if rc != ESP_OK {
            return Err(crate::error::Error::Init("i2c driver install"));
        }
        info!("i2c master up on port {port}");
        Ok(Self {
            port,
            addr: 0,
            pending: None,
            rx: [0; READ_BUF_LEN],
            rx_len: 0,
        })
    }

    fn outcome(rc: i32) -> BusEvent {
        match rc {
            ESP_OK => BusEvent::Complete,
            ESP_ERR_TIMEOUT => BusEvent::Fault(BusFault::Timeout),
            ESP_ERR_INVALID_STATE => BusEvent::Fault(BusFault::Busy),
            ESP_FAIL => BusEvent::Fault(BusFault::AddressNack),
            _ => BusEvent::Fault(BusFault::DataNack),
        }
    }
}

#[cfg(target_os = "espidf")]
impl BusController for EspI2cEngine {
    fn set_address(&mut self, addr: u8) {
        self.addr = addr;
    }

    fn reset(&mut self) {
        self.pending = None;
        self.rx_len = 0;
        // SAFETY: FIFO flush on an installed driver.
        unsafe {
            i2c_reset_tx_fifo(self.port);
            i2c_reset_rx_fifo(self.port);
        }
    }

    fn start_write(&mut self, bytes: &[u8]) {
        // SAFETY: buffer outlives the synchronous call.
        let rc = unsafe {
            i2c_master_write_to_device(
                self.port,
                self.addr,
                bytes.as_ptr(),
                bytes.len(),
                I2C_TIMEOUT_TICKS,
            )
        };
        self.pending = Some(Self::outcome(rc));
    }

    fn start_read(&mut self, len: usize) {
        let len = len.min(READ_BUF_LEN);
        // SAFETY: rx is owned and sized for the request.
        let rc = unsafe {
            i2c_master_read_from_device(
                self.port,
                self.addr,
                self.rx.as_mut_ptr(),
                len,
                I2C_TIMEOUT_TICKS,
            )
        };
        self.rx_len = if rc == ESP_OK { len } else { 0 };
        self.pending = Some(Self::outcome(rc));
    }

    fn service(&mut self) -> Option<BusEvent> {
        self.pending.take()
    }

    fn take_received(&mut self, buf: &mut [u8]) -> usize {
        let n = self.rx_len.min(buf.len());
        buf[..n].copy_from_slice(&self.rx[..n]);
        self.rx_len = 0;
        n
    }
}

// ── output pin / lcd control lines ────────────────────────────────

/// Plain push-pull output pin behind the e-h trait.
#[cfg(target_os = "espidf")]
pub struct SysOutputPin {
    pin: i32,
}

#[cfg(target_os = "espidf")]
impl SysOutputPin {
    pub fn new(pin: i32) -> Self {
        Self { pin }
    }
}

#[cfg(target_os = "espidf")]
impl embedded_hal::digital::ErrorType for SysOutputPin {
    type Error = core::convert::Infallible;
}

#[cfg(target_os = "espidf")]
impl embedded_hal::digital::OutputPin for SysOutputPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        gpio_write(self.pin, false);
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        gpio_write(self.pin, true);
        Ok(())
    }
}

/// LCD RS/RW/E on direct MCU pins.
#[cfg(target_os = "espidf")]
pub struct EspControlLines;

#[cfg(target_os = "espidf")]
impl ControlLines for EspControlLines {
    fn set_rs(&mut self, high: bool) {
        gpio_write(pins::LCD_RS_GPIO, high);
    }
    fn set_rw(&mut self, high: bool) {
        gpio_write(pins::LCD_RW_GPIO, high);
    }
    fn set_enable(&mut self, high: bool) {
        gpio_write(pins::LCD_EN_GPIO, high);
    }
}

// ── dht line ──────────────────────────────────────────────────────

/// Open-drain data line; the external pull-up gives the released level.
#[cfg(target_os = "espidf")]
pub struct EspDhtLine;

#[cfg(target_os = "espidf")]
impl DhtLine for EspDhtLine {
    fn drive_low(&mut self) {
        gpio_write(pins::DHT_DATA_GPIO, false);
    }
    fn release(&mut self) {
        gpio_write(pins::DHT_DATA_GPIO, true);
    }
    fn is_high(&mut self) -> bool {
        gpio_read(pins::DHT_DATA_GPIO)
    }
}

// ── soil adc ──────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: written once in `init_peripherals()` before the poll loop;
/// read only from the single main task afterwards.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

/// Soil probe channel on ADC1.
#[cfg(target_os = "espidf")]
pub struct EspSoilAdc {
    channel: u32,
}

#[cfg(target_os = "espidf")]
impl EspSoilAdc {
    pub fn new(channel: u32) -> Self {
        Self { channel }
    }
}

#[cfg(target_os = "espidf")]
impl SoilAdc for EspSoilAdc {
    fn read(&mut self) -> Result<u16> {
        let mut raw: i32 = 0;
        // SAFETY: adc1_handle() contract — main-task access only.
        let rc = unsafe { adc_oneshot_read(adc1_handle(), self.channel, &mut raw) };
        if rc != ESP_OK {
            return Err(SensorFault::AdcReadFailed.into());
        }
        Ok(raw.max(0) as u16)
    }
}

// ── keypad matrix ─────────────────────────────────────────────────

/// Rows driven high, columns read with pull-downs; the second scan phase
/// swaps drive direction to resolve the row.
#[cfg(target_os = "espidf")]
pub struct EspKeypadPort;

#[cfg(target_os = "espidf")]
impl EspKeypadPort {
    fn set_direction(pins4: &[i32; 4], output: bool) {
        for &pin in pins4 {
            let mode = if output {
                gpio_mode_t_GPIO_MODE_OUTPUT
            } else {
                gpio_mode_t_GPIO_MODE_INPUT
            };
            // SAFETY: direction change on pins configured at init.
            unsafe {
                gpio_set_direction(pin, mode);
            }
            if output {
                gpio_write(pin, true);
            }
        }
    }

    fn read_mask(pins4: &[i32; 4]) -> u8 {
        let mut mask = 0u8;
        for (i, &pin) in pins4.iter().enumerate() {
            if gpio_read(pin) {
                mask |= 1 << i;
            }
        }
        mask
    }
}

#[cfg(target_os = "espidf")]
impl KeypadPort for EspKeypadPort {
    fn drive_rows_read_cols(&mut self) -> u8 {
        Self::set_direction(&pins::KEYPAD_ROW_GPIOS, true);
        Self::set_direction(&pins::KEYPAD_COL_GPIOS, false);
        Self::read_mask(&pins::KEYPAD_COL_GPIOS)
    }

    fn drive_cols_read_rows(&mut self) -> u8 {
        Self::set_direction(&pins::KEYPAD_COL_GPIOS, true);
        Self::set_direction(&pins::KEYPAD_ROW_GPIOS, false);
        Self::read_mask(&pins::KEYPAD_ROW_GPIOS)
    }
}

// ── peripheral init ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn config_gpio(pin: i32, mode: gpio_mode_t, pull_up: bool, pull_down: bool) -> Result<()> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode,
        pull_up_en: u32::from(pull_up),
        pull_down_en: u32::from(pull_down),
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    // SAFETY: one-shot pin configuration from the boot path.
    let rc = unsafe { gpio_config(&cfg) };
    if rc != ESP_OK {
        return Err(crate::error::Error::Init("gpio config"));
    }
    Ok(())
}

/// Configure every non-I2C pin and the soil ADC channel. Called once
/// from `main()` before the poll loop.
#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<()> {
    for pin in [
        pins::EXPANDER_RESET_GPIO,
        pins::LCD_RS_GPIO,
        pins::LCD_RW_GPIO,
        pins::LCD_EN_GPIO,
        pins::SOIL_RELAY_GPIO,
    ] {
        config_gpio(pin, gpio_mode_t_GPIO_MODE_OUTPUT, false, false)?;
        gpio_write(pin, false);
    }
    // Reset line idles high (active low).
    gpio_write(pins::EXPANDER_RESET_GPIO, true);

    config_gpio(pins::RTC_IRQ_GPIO, gpio_mode_t_GPIO_MODE_INPUT, true, false)?;
    config_gpio(
        pins::DHT_DATA_GPIO,
        gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD,
        true,
        false,
    )?;
    gpio_write(pins::DHT_DATA_GPIO, true);

    for pin in pins::KEYPAD_ROW_GPIOS {
        config_gpio(pin, gpio_mode_t_GPIO_MODE_OUTPUT, false, false)?;
    }
    for pin in pins::KEYPAD_COL_GPIOS {
        config_gpio(pin, gpio_mode_t_GPIO_MODE_INPUT, false, true)?;
    }

    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let rc = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if rc != ESP_OK {
        return Err(crate::error::Error::Init("adc1 unit"));
    }
    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    // SAFETY: adc1_handle() contract — boot path.
    let rc = unsafe { adc_oneshot_config_channel(adc1_handle(), SOIL_ADC_CHANNEL, &chan_cfg) };
    if rc != ESP_OK {
        return Err(crate::error::Error::Init("adc1 soil channel"));
    }

    info!("peripherals configured");
    Ok(())
}

/// Soil probe channel (GPIO 1 = ADC1_CH0 on the S3).
#[cfg(target_os = "espidf")]
pub const SOIL_ADC_CHANNEL: u32 = adc_channel_t_ADC_CHANNEL_0;

// ── millisecond tick ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut TICK_TIMER: esp_timer_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
unsafe extern "C" fn tick_cb(_arg: *mut core::ffi::c_void) {
    TIMEBASE.tick();
}

/// Start the 1 kHz timebase tick. The callback runs in the esp_timer
/// task, not an ISR, and only touches atomics.
#[cfg(target_os = "espidf")]
pub fn start_tick_timer() -> Result<()> {
    let args = esp_timer_create_args_t {
        callback: Some(tick_cb),
        arg: core::ptr::null_mut(),
        dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
        name: c"tick".as_ptr(),
        skip_unhandled_events: true,
    };
    // SAFETY: TICK_TIMER is written here once at boot from the single
    // main-task context before any callbacks fire.
    unsafe {
        let rc = esp_timer_create(&args, &raw mut TICK_TIMER);
        if rc != ESP_OK {
            return Err(crate::error::Error::Init("tick timer create"));
        }
        let rc = esp_timer_start_periodic(TICK_TIMER, 1_000);
        if rc != ESP_OK {
            return Err(crate::error::Error::Init("tick timer start"));
        }
    }
    TIMEBASE.start();
    info!("timebase ticking at 1 kHz");
    Ok(())
}
