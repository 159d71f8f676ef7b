//! Station bring-up and keypad entry flows against the simulated board.

use core::convert::Infallible;

use deskclock::config::StationConfig;
use deskclock::drivers::keypad::KeypadPort;
use deskclock::drivers::lcd::ControlLines;
use deskclock::error::Result;
use deskclock::rtc::regs::{CTRL_A1IE, CTRL_INTCN, REG_CONTROL, REG_STATUS, STAT_OSF};
use deskclock::sensors::dht11::DhtLine;
use deskclock::sensors::soil::SoilAdc;
use deskclock::station::Station;
use deskclock::timebase::NullDelay;

use crate::mock_bus::MockBoard;

struct NullLines;

impl ControlLines for NullLines {
    fn set_rs(&mut self, _high: bool) {}
    fn set_rw(&mut self, _high: bool) {}
    fn set_enable(&mut self, _high: bool) {}
}

/// Data line that never answers (sensor absent).
struct DeadDht;

impl DhtLine for DeadDht {
    fn drive_low(&mut self) {}
    fn release(&mut self) {}
    fn is_high(&mut self) -> bool {
        true
    }
}

struct FixedAdc(u16);

impl SoilAdc for FixedAdc {
    fn read(&mut self) -> Result<u16> {
        Ok(self.0)
    }
}

struct HostPin;

impl embedded_hal::digital::ErrorType for HostPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for HostPin {
    fn set_low(&mut self) -> core::result::Result<(), Infallible> {
        Ok(())
    }
    fn set_high(&mut self) -> core::result::Result<(), Infallible> {
        Ok(())
    }
}

struct IdleKeys;

impl KeypadPort for IdleKeys {
    fn drive_rows_read_cols(&mut self) -> u8 {
        0
    }
    fn drive_cols_read_rows(&mut self) -> u8 {
        0
    }
}

type TestStation = Station<MockBoard, NullLines, DeadDht, FixedAdc, HostPin, IdleKeys>;

fn station_with(board: MockBoard) -> TestStation {
    Station::new(
        board,
        NullLines,
        DeadDht,
        FixedAdc(400),
        HostPin,
        IdleKeys,
        StationConfig::default(),
    )
}

fn feed_keys(station: &mut TestStation, keys: &str) {
    for key in keys.chars() {
        station.handle_key(key);
    }
}

#[test]
fn init_with_stopped_oscillator_loads_boot_default() {
    let mut board = MockBoard::new();
    board.rtc_regs[REG_STATUS as usize] = STAT_OSF;
    let mut station = station_with(board);
    station.init(&mut HostPin, &mut NullDelay).unwrap();

    let board = station.bus_mut().controller_mut();
    // 2000-01-01, Monday, midnight in BCD.
    assert_eq!(&board.rtc_regs[..7], &[0x00, 0x00, 0x00, 0x01, 0x01, 0x01, 0x00]);
    assert_eq!(board.rtc_regs[REG_STATUS as usize] & STAT_OSF, 0);
}

#[test]
fn init_configures_expander_for_the_lcd() {
    let mut board = MockBoard::new();
    board.expander_regs[0x00] = 0xFF; // IODIRA power-on default
    board.expander_regs[0x01] = 0xFF; // IODIRB
    let mut station = station_with(board);
    station.init(&mut HostPin, &mut NullDelay).unwrap();

    let board = station.bus_mut().controller_mut();
    assert_eq!(
        board.expander_regs[0x0A], 0x08,
        "IOCON is exactly HAEN; no other options requested at bring-up"
    );
    assert_eq!(board.expander_regs[0x01], 0x00, "port B all outputs");
}

#[test]
fn keypad_time_entry_writes_the_clock() {
    let mut station = station_with(MockBoard::new());
    feed_keys(&mut station, "A123456#");

    let board = station.bus_mut().controller_mut();
    assert_eq!(board.rtc_regs[0], 0x56);
    assert_eq!(board.rtc_regs[1], 0x34);
    assert_eq!(board.rtc_regs[2], 0x12);
    // Date fields carried over from the current clock.
    assert_eq!(&board.rtc_regs[3..7], &[0x01, 0x01, 0x01, 0x00]);
}

#[test]
fn keypad_alarm_entry_arms_alarm1_with_interrupts() {
    let mut station = station_with(MockBoard::new());
    feed_keys(&mut station, "B073000#");

    assert!(station.rtc().alarm1_armed());
    let board = station.bus_mut().controller_mut();
    assert_eq!(board.rtc_regs[0x07], 0x00);
    assert_eq!(board.rtc_regs[0x08], 0x30);
    assert_eq!(board.rtc_regs[0x09], 0x07);
    assert_eq!(board.rtc_regs[0x0A], 0x81, "M4 only, date mode, date 1");
    assert_eq!(
        board.rtc_regs[REG_CONTROL as usize] & (CTRL_A1IE | CTRL_INTCN),
        CTRL_A1IE | CTRL_INTCN
    );
}

#[test]
fn invalid_time_entry_is_rejected_without_device_writes() {
    let mut station = station_with(MockBoard::new());
    feed_keys(&mut station, "A99numbers");
    let before = station.bus_mut().controller_mut().writes;
    feed_keys(&mut station, "00");
    // "99:nu:mb" never happened; only digits count: 9,9,0,0 so far.
    feed_keys(&mut station, "00#");
    assert_eq!(
        station.bus_mut().controller_mut().writes,
        before,
        "hour 99 fails validation before any bus traffic"
    );
}

#[test]
fn cancelled_entry_commits_nothing() {
    let mut station = station_with(MockBoard::new());
    feed_keys(&mut station, "A1234*");
    let before = station.bus_mut().controller_mut().writes;
    feed_keys(&mut station, "#");
    assert_eq!(station.bus_mut().controller_mut().writes, before);
}

#[test]
fn poll_refreshes_clock_from_the_device() {
    let mut board = MockBoard::new();
    board.load_time(&[0x15, 0x27, 0x09, 0x04, 0x17, 0x07, 0x25]);
    let mut station = station_with(board);
    station.poll(&mut NullDelay, 0, false);

    let c = station.rtc().clock();
    assert_eq!((c.hours, c.minutes, c.seconds), (9, 27, 15));
    assert_eq!((c.day_of_week, c.date, c.month, c.year), (4, 17, 7, 25));
}

#[test]
fn soil_measurement_completes_across_poll_passes() {
    let mut board = MockBoard::new();
    board.load_time(&[0x00, 0x00, 0x00, 0x01, 0x01, 0x01, 0x00]);
    let mut station = station_with(board);
    for t in 0..=200u32 {
        station.poll(&mut NullDelay, t, false);
    }
    // FixedAdc(400) against the 600/200 defaults reads 50%.
    assert_eq!(station.soil_percent(), Some(50));
}
