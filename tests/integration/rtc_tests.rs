//! DS3231 driver against the simulated board.

use core::sync::atomic::{AtomicU32, Ordering};

use deskclock::bus::I2cMaster;
use deskclock::error::{BusFault, Error, RtcFault};
use deskclock::rtc::regs::{
    CTRL_A1IE, CTRL_INTCN, REG_CONTROL, REG_STATUS, STAT_A1F, STAT_A2F, STAT_OSF,
};
use deskclock::rtc::{Alarm1Match, Alarm2Match, AlarmId, AlarmTime, Clock, Ds3231};

use crate::mock_bus::MockBoard;

fn setup() -> (Ds3231, I2cMaster<MockBoard>) {
    (Ds3231::new(1000), I2cMaster::new(MockBoard::new()))
}

#[test]
fn set_then_read_round_trips_through_the_register_file() {
    let (mut rtc, mut bus) = setup();
    let clock = Clock {
        seconds: 5,
        minutes: 42,
        hours: 18,
        day_of_week: 3,
        date: 24,
        month: 10,
        year: 25,
        century: false,
    };
    rtc.set_time(&mut bus, &clock).unwrap();

    // A fresh driver instance decodes the same wall-clock time back.
    let mut other = Ds3231::new(1000);
    other.poll(&mut bus, 0, false).unwrap();
    assert_eq!(other.clock(), &clock);
}

#[test]
fn alarm1_end_to_end_fires_hook_and_clears_flag() {
    static FIRES: AtomicU32 = AtomicU32::new(0);
    fn hook(id: AlarmId) {
        assert_eq!(id, AlarmId::Alarm1);
        FIRES.fetch_add(1, Ordering::SeqCst);
    }

    let (mut rtc, mut bus) = setup();
    let when = AlarmTime {
        seconds: 0,
        minutes: 30,
        hours: 7,
        day_or_date: 1,
    };
    rtc.set_alarm1(&mut bus, &when, Alarm1Match::HoursMinutesSecondsMatch, Some(hook))
        .unwrap();
    rtc.set_alarm1_interrupt(&mut bus, true).unwrap();
    rtc.set_alarm_interrupt_output(&mut bus, true).unwrap();
    assert_eq!(
        bus.controller_mut().rtc_regs[REG_CONTROL as usize] & (CTRL_A1IE | CTRL_INTCN),
        CTRL_A1IE | CTRL_INTCN
    );

    // Device raises A1F; the driver consumes it exactly once.
    bus.controller_mut().rtc_regs[REG_STATUS as usize] |= STAT_A1F;
    rtc.poll(&mut bus, 0, true).unwrap();
    assert_eq!(FIRES.load(Ordering::SeqCst), 1);
    assert_eq!(
        bus.controller_mut().rtc_regs[REG_STATUS as usize] & STAT_A1F,
        0
    );
    rtc.poll(&mut bus, 5000, false).unwrap();
    assert_eq!(FIRES.load(Ordering::SeqCst), 1);
}

#[test]
fn unarmed_alarm2_flag_survives_alarm1_clear() {
    static FIRES: AtomicU32 = AtomicU32::new(0);
    fn hook(_id: AlarmId) {
        FIRES.fetch_add(1, Ordering::SeqCst);
    }

    let (mut rtc, mut bus) = setup();
    let when = AlarmTime {
        seconds: 0,
        minutes: 0,
        hours: 0,
        day_or_date: 1,
    };
    rtc.set_alarm1(&mut bus, &when, Alarm1Match::OncePerSecond, Some(hook))
        .unwrap();
    bus.controller_mut().rtc_regs[REG_STATUS as usize] |= STAT_A1F | STAT_A2F;
    rtc.poll(&mut bus, 0, true).unwrap();

    let status = bus.controller_mut().rtc_regs[REG_STATUS as usize];
    assert_eq!(status & STAT_A1F, 0);
    assert_eq!(status & STAT_A2F, STAT_A2F);
}

#[test]
fn alarm2_minutes_resolution_encoding_lands_in_device() {
    let (mut rtc, mut bus) = setup();
    let when = AlarmTime {
        seconds: 0,
        minutes: 45,
        hours: 21,
        day_or_date: 15,
    };
    rtc.set_alarm2(&mut bus, &when, Alarm2Match::HoursMinutesMatch, None)
        .unwrap();
    let regs = &bus.controller_mut().rtc_regs;
    assert_eq!(regs[0x0B], 0x45);
    assert_eq!(regs[0x0C], 0x21);
    assert_eq!(regs[0x0D], 0x80 | 0x15, "only M4 masked for h+m match");
}

#[test]
fn oscillator_stop_recorded_and_clearable() {
    let (mut rtc, mut bus) = setup();
    bus.controller_mut().rtc_regs[REG_STATUS as usize] = STAT_OSF;
    rtc.poll(&mut bus, 0, false).unwrap();
    assert_eq!(rtc.fault_log().latest(), Some(RtcFault::OscillatorStopped));

    rtc.clear_oscillator_stop_flag(&mut bus).unwrap();
    assert_eq!(
        bus.controller_mut().rtc_regs[REG_STATUS as usize] & STAT_OSF,
        0
    );
}

#[test]
fn injected_bus_fault_surfaces_and_is_logged() {
    let (mut rtc, mut bus) = setup();
    bus.controller_mut().fail_next = Some(BusFault::AddressNack);
    let err = rtc.poll(&mut bus, 0, false).unwrap_err();
    assert_eq!(err, Error::Bus(BusFault::AddressNack));
    assert_eq!(bus.fault_history().latest(), Some(BusFault::AddressNack));
    assert!(!bus.is_claimed(), "gate released after the fault");

    // Transport recovered: the next poll succeeds.
    rtc.poll(&mut bus, 0, false).unwrap();
}

#[test]
fn temperature_read_spans_both_registers() {
    let (mut rtc, mut bus) = setup();
    bus.controller_mut().rtc_regs[0x11] = (-3i8) as u8;
    bus.controller_mut().rtc_regs[0x12] = 0b0100_0000;
    let t = rtc.read_temperature(&mut bus).unwrap();
    assert!((t - (-2.75)).abs() < f32::EPSILON);
}
