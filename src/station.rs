//! Station core: one cooperative poll pass over every subsystem, plus
//! the LCD presentation and keypad-driven time/alarm entry.
//!
//! The loop never blocks on a peripheral that is not ready: each driver
//! either finishes a short bus transaction or reports "not due" and the
//! pass moves on. Subsystem errors are logged and absorbed here so one
//! flaky sensor cannot stall the clock display.
//!
//! Display layout (16x2):
//!
//! ```text
//! 12:34:56 [cal]01/02[alarm]
//! [thermo] 23[deg] [hum]45% [drop]50%
//! ```
//!
//! Time digits are printed straight from the raw BCD snapshot bytes with
//! `{:02x}`: hex formatting of BCD yields the decimal digits, so the
//! displayed value needs no conversion round trip.

use core::fmt::Write as _;
use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use heapless::{String, Vec};
use log::{info, warn};

use crate::bus::{BusController, I2cMaster};
use crate::config::StationConfig;
use crate::drivers::expander::{Mcp23017, Port, PinDirection};
use crate::drivers::keypad::{Keypad, KeypadPort};
use crate::drivers::lcd::{ControlLines, ExpanderLcdBus, LcdDriver};
use crate::error::{Result, RtcFault};
use crate::rtc::{Alarm1Match, AlarmId, AlarmTime, Clock, Ds3231};
use crate::sensors::dht11::{Dht11, DhtLine};
use crate::sensors::environment::EnvironmentSensor;
use crate::sensors::soil::{SoilAdc, SoilSensor};
use crate::timebase::elapsed;

/// CGRAM glyph slots programmed at init.
pub mod glyph {
    pub const THERMOMETER: u8 = 0;
    pub const DEGREE: u8 = 1;
    pub const DROPLET: u8 = 2;
    pub const HUMIDITY: u8 = 3;
    pub const CLOCK: u8 = 4;
    pub const CALENDAR: u8 = 5;
}

/// 5x8 pixel rows for the six custom glyphs, indexed by slot.
const GLYPH_ROWS: [[u8; 8]; 6] = [
    // thermometer
    [0x04, 0x0A, 0x0A, 0x0A, 0x0A, 0x11, 0x1F, 0x0E],
    // degree
    [0x06, 0x09, 0x09, 0x06, 0x00, 0x00, 0x00, 0x00],
    // droplet
    [0x04, 0x04, 0x0A, 0x0A, 0x11, 0x11, 0x11, 0x0E],
    // humidity (drop over bars)
    [0x04, 0x0A, 0x11, 0x11, 0x0E, 0x00, 0x1F, 0x1F],
    // clock face
    [0x00, 0x0E, 0x15, 0x17, 0x11, 0x0E, 0x00, 0x00],
    // calendar
    [0x1F, 0x11, 0x1F, 0x15, 0x1B, 0x15, 0x1F, 0x00],
];

const DISPLAY_COLS: usize = 16;

/// Blink period exponent for the alarm glyph (2^9 ms halves).
const ALARM_BLINK_SHIFT: u32 = 9;

/// Set from the alarm callback, consumed by the UI on the next pass.
static ALARM_EVENT: AtomicBool = AtomicBool::new(false);

/// Alarm hook wired into [`Ds3231::set_alarm1`]; runs in poll context.
pub fn note_alarm(id: AlarmId) {
    info!("alarm fired: {id:?}");
    ALARM_EVENT.store(true, Ordering::Release);
}

fn take_alarm_event() -> bool {
    ALARM_EVENT.swap(false, Ordering::AcqRel)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UiMode {
    /// Normal clock display.
    Clock,
    /// Entering a new time of day.
    EditTime,
    /// Entering an alarm time.
    EditAlarm,
}

struct UiState {
    mode: UiMode,
    digits: Vec<u8, 6>,
    /// Alarm fired and not yet acknowledged.
    alarm_active: bool,
}

impl UiState {
    fn new() -> Self {
        Self {
            mode: UiMode::Clock,
            digits: Vec::new(),
            alarm_active: false,
        }
    }
}

// ── row rendering ─────────────────────────────────────────────────

/// Row 0 in clock mode: BCD time and date straight from the snapshot.
fn render_time_row(snapshot: &[u8], alarm_armed: bool, alarm_active: bool, blink_on: bool) -> Vec<u8, DISPLAY_COLS> {
    let mut s: String<DISPLAY_COLS> = String::new();
    let _ = write!(
        s,
        "{:02x}:{:02x}:{:02x} ",
        snapshot[2] & 0x3F,
        snapshot[1],
        snapshot[0]
    );
    let mut row: Vec<u8, DISPLAY_COLS> = Vec::from_slice(s.as_bytes()).unwrap_or_default();
    let _ = row.push(glyph::CALENDAR);
    let mut d: String<8> = String::new();
    let _ = write!(d, "{:02x}/{:02x}", snapshot[4] & 0x3F, snapshot[5] & 0x1F);
    let _ = row.extend_from_slice(d.as_bytes());
    // Col 15: steady glyph while armed, blinking while ringing.
    if alarm_active {
        let _ = row.push(if blink_on { glyph::CLOCK } else { b' ' });
    } else if alarm_armed {
        let _ = row.push(glyph::CLOCK);
    }
    row
}

/// Row 0 in an edit mode: prompt plus the digits entered so far.
fn render_edit_row(mode: UiMode, digits: &[u8]) -> Vec<u8, DISPLAY_COLS> {
    let mut row: Vec<u8, DISPLAY_COLS> = Vec::new();
    let prefix: &[u8] = match mode {
        UiMode::EditTime => b"SET ",
        _ => b"ALM ",
    };
    let _ = row.extend_from_slice(prefix);
    for slot in 0..6 {
        if slot == 2 || slot == 4 {
            let _ = row.push(b':');
        }
        let _ = row.push(digits.get(slot).map_or(b'_', |d| b'0' + d));
    }
    row
}

/// Row 1: temperature, air humidity, soil moisture with glyphs.
fn render_env_row(
    temp_c: Option<i32>,
    humidity_pct: Option<u8>,
    soil_pct: Option<u8>,
) -> Vec<u8, DISPLAY_COLS> {
    let mut s: String<DISPLAY_COLS> = String::new();
    let _ = s.push(glyph::THERMOMETER as char);
    match temp_c {
        Some(t) => {
            let _ = write!(s, "{t:>3}");
        }
        None => {
            let _ = s.push_str(" --");
        }
    }
    let _ = s.push(glyph::DEGREE as char);
    let _ = s.push(' ');
    let _ = s.push(glyph::HUMIDITY as char);
    match humidity_pct {
        // Cap at 99 so the row never outgrows the panel.
        Some(h) => {
            let _ = write!(s, "{:>2}%", h.min(99));
        }
        None => {
            let _ = s.push_str("--%");
        }
    }
    let _ = s.push(' ');
    let _ = s.push(glyph::DROPLET as char);
    match soil_pct {
        Some(p) => {
            let _ = write!(s, "{:>2}%", p.min(99));
        }
        None => {
            let _ = s.push_str("--%");
        }
    }
    Vec::from_slice(s.as_bytes()).unwrap_or_default()
}

// ── station ───────────────────────────────────────────────────────

/// Owns every driver plus the shared transport and UI state.
pub struct Station<C, L, W, A, R, K>
where
    C: BusController,
    L: ControlLines,
    W: DhtLine,
    A: SoilAdc,
    R: OutputPin,
    K: KeypadPort,
{
    bus: I2cMaster<C>,
    expander: Mcp23017,
    lcd: LcdDriver,
    lines: L,
    rtc: Ds3231,
    dht: Dht11<W>,
    soil: SoilSensor<A, R>,
    keypad: Keypad<K>,
    env: EnvironmentSensor,
    config: StationConfig,
    ui: UiState,
    soil_started: bool,
    last_soil_start_ms: u32,
    shown_row0: Vec<u8, DISPLAY_COLS>,
    shown_row1: Vec<u8, DISPLAY_COLS>,
}

impl<C, L, W, A, R, K> Station<C, L, W, A, R, K>
where
    C: BusController,
    L: ControlLines,
    W: DhtLine,
    A: SoilAdc,
    R: OutputPin,
    K: KeypadPort,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctrl: C,
        lines: L,
        dht_line: W,
        soil_adc: A,
        soil_relay: R,
        keypad_port: K,
        config: StationConfig,
    ) -> Self {
        Self {
            bus: I2cMaster::new(ctrl),
            expander: Mcp23017::new(config.expander_addr_pins),
            lcd: LcdDriver::new(config.lcd_cols, config.lcd_rows),
            lines,
            rtc: Ds3231::new(config.rtc_refresh_ms),
            dht: Dht11::new(dht_line, config.dht_cooldown_ms),
            soil: SoilSensor::new(
                soil_adc,
                soil_relay,
                config.soil_stabilize_ms,
                config.soil_sample_spacing_ms,
                config.soil_dry_raw,
                config.soil_wet_raw,
            ),
            keypad: Keypad::new(keypad_port, config.keypad_sample_ms, config.keypad_hold_samples()),
            env: EnvironmentSensor::new(config.env_sample_ms),
            config,
            ui: UiState::new(),
            soil_started: false,
            last_soil_start_ms: 0,
            shown_row0: Vec::new(),
            shown_row1: Vec::new(),
        }
    }

    pub fn rtc(&self) -> &Ds3231 {
        &self.rtc
    }

    /// Latest soil measurement, as shown on the display.
    pub fn soil_percent(&self) -> Option<u8> {
        self.soil.last_reading().map(|r| r.percent)
    }

    pub fn bus_mut(&mut self) -> &mut I2cMaster<C> {
        &mut self.bus
    }

    /// Bring up the expander, the LCD and the clock. `reset_pin` is the
    /// expander's hardware reset line.
    pub fn init<P: OutputPin, D: DelayNs>(
        &mut self,
        reset_pin: &mut P,
        delay: &mut D,
    ) -> Result<()> {
        self.expander.reset(reset_pin, delay)?;
        self.expander.configure(&mut self.bus, 0)?;
        self.expander
            .set_port_direction(&mut self.bus, Port::B, PinDirection::Output)?;

        {
            // The strobe widths are sub-microsecond; the caller's delay
            // handles the long command settles.
            let mut strobe = crate::timebase::SpinDelay::new();
            let mut lcd_bus = ExpanderLcdBus {
                expander: &mut self.expander,
                bus: &mut self.bus,
                lines: &mut self.lines,
                delay: &mut strobe,
            };
            self.lcd.init(&mut lcd_bus, delay)?;
            for (slot, rows) in GLYPH_ROWS.iter().enumerate() {
                self.lcd.define_glyph(&mut lcd_bus, delay, slot as u8, rows)?;
            }
        }

        // First snapshot; a stopped oscillator means the time is garbage,
        // so load the boot default and clear the flag.
        self.rtc.poll(&mut self.bus, 0, true)?;
        if self.rtc.status() & crate::rtc::regs::STAT_OSF != 0 {
            warn!("rtc lost time; loading boot default");
            self.rtc.set_time(&mut self.bus, &Clock::default())?;
            self.rtc.clear_oscillator_stop_flag(&mut self.bus)?;
        }
        info!("station up: {:?}", self.rtc.clock());
        Ok(())
    }

    /// One cooperative pass. Subsystem failures are logged, not fatal.
    pub fn poll<D: DelayNs>(&mut self, delay: &mut D, now_ms: u32, rtc_irq: bool) {
        if let Err(e) = self.rtc.poll(&mut self.bus, now_ms, rtc_irq) {
            warn!("rtc poll: {e}");
        }
        if take_alarm_event() {
            self.ui.alarm_active = true;
        }

        if let Err(e) = self.dht.poll(delay, now_ms) {
            warn!("dht poll: {e}");
        }

        let soil_due =
            !self.soil_started || elapsed(now_ms, self.last_soil_start_ms) >= self.config.soil_sample_ms;
        if soil_due {
            match self.soil.start_sample(now_ms) {
                Ok(()) => {
                    self.soil_started = true;
                    self.last_soil_start_ms = now_ms;
                }
                Err(e) => warn!("soil start: {e}"),
            }
        }
        match self.soil.poll(now_ms) {
            Ok(Some(_)) => {
                let _ = self.soil.take_reading();
            }
            Ok(None) => {}
            Err(e) => warn!("soil poll: {e}"),
        }

        if let Some(key) = self.keypad.poll(now_ms) {
            self.handle_key(key);
        }

        if let Err(e) = self.env.poll(&mut self.bus, delay, now_ms) {
            warn!("environment poll: {e}");
        }

        self.refresh_display(delay, now_ms);
    }

    /// Apply one debounced key press to the UI state machine.
    pub fn handle_key(&mut self, key: char) {
        match self.ui.mode {
            UiMode::Clock => match key {
                'A' => {
                    self.ui.digits.clear();
                    self.ui.mode = UiMode::EditTime;
                }
                'B' => {
                    self.ui.digits.clear();
                    self.ui.mode = UiMode::EditAlarm;
                }
                'D' => self.ui.alarm_active = false,
                _ => {}
            },
            UiMode::EditTime | UiMode::EditAlarm => match key {
                '0'..='9' => {
                    let _ = self.ui.digits.push(key as u8 - b'0');
                }
                '*' => {
                    self.ui.digits.clear();
                    self.ui.mode = UiMode::Clock;
                }
                'A' => {
                    self.ui.digits.clear();
                    self.ui.mode = UiMode::EditTime;
                }
                'B' => {
                    self.ui.digits.clear();
                    self.ui.mode = UiMode::EditAlarm;
                }
                '#' => self.commit_entry(),
                _ => {}
            },
        }
    }

    /// `#` pressed with a full HHMMSS entry: hand it to the clock.
    fn commit_entry(&mut self) {
        if self.ui.digits.len() != 6 {
            warn!("entry incomplete: {} of 6 digits", self.ui.digits.len());
            return;
        }
        let d = &self.ui.digits;
        let (hours, minutes, seconds) = (d[0] * 10 + d[1], d[2] * 10 + d[3], d[4] * 10 + d[5]);
        let result = match self.ui.mode {
            UiMode::EditTime => {
                let clock = Clock {
                    hours,
                    minutes,
                    seconds,
                    ..*self.rtc.clock()
                };
                self.rtc.set_time(&mut self.bus, &clock)
            }
            _ => {
                let when = AlarmTime {
                    seconds,
                    minutes,
                    hours,
                    day_or_date: 1,
                };
                self.rtc
                    .set_alarm1(
                        &mut self.bus,
                        &when,
                        Alarm1Match::HoursMinutesSecondsMatch,
                        Some(note_alarm),
                    )
                    .and_then(|()| self.rtc.set_alarm_interrupt_output(&mut self.bus, true))
                    .and_then(|()| self.rtc.set_alarm1_interrupt(&mut self.bus, true))
            }
        };
        match result {
            Ok(()) => {
                self.ui.digits.clear();
                self.ui.mode = UiMode::Clock;
            }
            Err(e) => {
                warn!("entry rejected: {e}");
                self.ui.digits.clear();
            }
        }
    }

    /// Rewrite any row whose content changed since it was last drawn.
    fn refresh_display<D: DelayNs>(&mut self, delay: &mut D, now_ms: u32) {
        let blink_on = now_ms >> ALARM_BLINK_SHIFT & 1 == 0;
        let row0 = match self.ui.mode {
            UiMode::Clock => render_time_row(
                self.rtc.snapshot(),
                self.rtc.alarm1_armed(),
                self.ui.alarm_active,
                blink_on,
            ),
            mode => render_edit_row(mode, &self.ui.digits),
        };
        let temp = self
            .env
            .last_reading()
            .map(|r| r.temperature_c as i32)
            .or_else(|| self.dht.last_reading().map(|r| i32::from(r.temperature_c)));
        let humidity = self
            .env
            .last_reading()
            .map(|r| r.humidity_pct as u8)
            .or_else(|| self.dht.last_reading().map(|r| r.humidity_pct));
        let soil = self.soil.last_reading().map(|r| r.percent);
        let row1 = render_env_row(temp, humidity, soil);

        if row0 != self.shown_row0 {
            if let Err(e) = self.write_row(delay, 0, &row0) {
                warn!("display row 0: {e}");
            } else {
                self.shown_row0 = row0;
            }
        }
        if row1 != self.shown_row1 {
            if let Err(e) = self.write_row(delay, 1, &row1) {
                warn!("display row 1: {e}");
            } else {
                self.shown_row1 = row1;
            }
        }
    }

    fn write_row<D: DelayNs>(&mut self, delay: &mut D, row: u8, content: &[u8]) -> Result<()> {
        let mut strobe = crate::timebase::SpinDelay::new();
        let mut lcd_bus = ExpanderLcdBus {
            expander: &mut self.expander,
            bus: &mut self.bus,
            lines: &mut self.lines,
            delay: &mut strobe,
        };
        self.lcd.set_cursor(&mut lcd_bus, delay, row, 0)?;
        for col in 0..DISPLAY_COLS {
            let byte = content.get(col).copied().unwrap_or(b' ');
            self.lcd.write_char(&mut lcd_bus, delay, byte)?;
        }
        Ok(())
    }

    /// Latent RTC trouble surfaced for diagnostics.
    pub fn rtc_fault_count(&self) -> u32 {
        self.rtc.fault_log().total()
    }

    pub fn last_rtc_fault(&self) -> Option<RtcFault> {
        self.rtc.fault_log().latest()
    }
}
