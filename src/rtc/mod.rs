//! DS3231 real-time clock driver.
//!
//! The device shares the I2C bus with the expander and the environment
//! sensor, so every multi-step sequence (pointer write + read, write +
//! readback verification) runs with the command gate held. The driver is
//! a state machine:
//!
//! ```text
//!            set_time            set_control / set_status
//!   Idle ──────────────► SettingTime          Idle ──► SettingCtrlReg /
//!    ▲                        │                ▲        SettingStatusReg
//!    └────────────────────────┘                └──────────────┘
//!
//!            set_alarm1 / set_alarm2           poll (due or IRQ)
//!   Idle ──► SettingAlarm1 / SettingAlarm2    Idle ──► ReadingAllRegisters
//! ```
//!
//! A `Setting*` state is entered only if the gate grants; a denied gate
//! fails with no side effects. Every write is read back and verified:
//! control ignoring the self-clearing CONV bit, status ignoring the
//! read-only BSY bit, time and alarm registers bit-exactly (the alarm
//! bytes include the match-mask encoding, so verification also proves the
//! match condition landed).
//!
//! `poll()` is the sole advancer for observation: when the refresh
//! interval has elapsed or the interrupt line is asserted it takes the
//! full 19-byte snapshot, decodes time and flags, reports an oscillator
//! stop, invokes armed-alarm callbacks once, and writes status back
//! clearing ONLY the fired flags it consumed.

pub mod alarm;
pub mod regs;

use log::{debug, warn};

pub use alarm::{Alarm1Match, Alarm2Match, AlarmHook, AlarmId, AlarmTime};

use crate::bus::{BusController, I2cMaster};
use crate::diagnostics::FaultLog;
use crate::error::{BusFault, Result, RtcFault};
use crate::timebase::elapsed;
use regs::{
    ALARM1_LEN, ALARM2_LEN, CTRL_A1IE, CTRL_A2IE, CTRL_BBSQW, CTRL_CONV, CTRL_EOSC, CTRL_INTCN,
    CTRL_RS1, CTRL_RS2, DEV_ADDR, MONTH_CENTURY_BIT, REG_AGING, REG_ALARM1_BASE, REG_ALARM2_BASE,
    REG_CONTROL, REG_SECONDS, REG_STATUS, REG_TEMP_MSB, SNAPSHOT_LEN, STAT_A1F, STAT_A2F,
    STAT_BSY, STAT_OSF, TIME_LEN, pack_bcd, unpack_bcd,
};

/// Depth of the device-fault ledger.
const FAULT_DEPTH: usize = 16;

/// Wall-clock time and date as kept by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    pub seconds: u8,
    pub minutes: u8,
    /// 24-hour form.
    pub hours: u8,
    /// 1-7, 1 = Monday by station convention.
    pub day_of_week: u8,
    pub date: u8,
    pub month: u8,
    /// Two-digit year, 00-99.
    pub year: u8,
    /// Century rollover flag (bit 7 of the month register).
    pub century: bool,
}

impl Default for Clock {
    /// Boot default: 2000-01-01, Monday, midnight.
    fn default() -> Self {
        Self {
            seconds: 0,
            minutes: 0,
            hours: 0,
            day_of_week: 1,
            date: 1,
            month: 1,
            year: 0,
            century: false,
        }
    }
}

impl Clock {
    /// Range-check every field. Runs before any device I/O.
    pub fn validate(&self) -> Result<()> {
        let ok = self.seconds <= 59
            && self.minutes <= 59
            && self.hours <= 23
            && (1..=7).contains(&self.day_of_week)
            && (1..=31).contains(&self.date)
            && (1..=12).contains(&self.month)
            && self.year <= 99;
        if ok {
            Ok(())
        } else {
            Err(RtcFault::InvalidTime.into())
        }
    }
}

/// Driver activity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcState {
    Idle,
    SettingTime,
    SettingCtrlReg,
    SettingStatusReg,
    SettingAlarm1,
    SettingAlarm2,
    ReadingAllRegisters,
}

/// INT/SQW square-wave output rate (RS2/RS1 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquareWaveRate {
    Hz1,
    Hz1024,
    Hz4096,
    Hz8192,
}

impl SquareWaveRate {
    fn bits(self) -> u8 {
        match self {
            Self::Hz1 => 0,
            Self::Hz1024 => CTRL_RS1,
            Self::Hz4096 => CTRL_RS2,
            Self::Hz8192 => CTRL_RS2 | CTRL_RS1,
        }
    }
}

/// DS3231 driver and observation state machine.
pub struct Ds3231 {
    state: RtcState,
    clock: Clock,
    snapshot: [u8; SNAPSHOT_LEN],
    ctrl_shadow: u8,
    status_shadow: u8,
    alarm1_armed: bool,
    alarm1_hook: Option<AlarmHook>,
    alarm2_armed: bool,
    alarm2_hook: Option<AlarmHook>,
    faults: FaultLog<RtcFault, FAULT_DEPTH>,
    refresh_ms: u32,
    last_read_ms: u32,
    has_read: bool,
}

impl Ds3231 {
    pub fn new(refresh_ms: u32) -> Self {
        Self {
            state: RtcState::Idle,
            clock: Clock::default(),
            snapshot: [0; SNAPSHOT_LEN],
            ctrl_shadow: 0,
            status_shadow: 0,
            alarm1_armed: false,
            alarm1_hook: None,
            alarm2_armed: false,
            alarm2_hook: None,
            faults: FaultLog::new(),
            refresh_ms: refresh_ms.max(1),
            last_read_ms: 0,
            has_read: false,
        }
    }

    pub fn state(&self) -> RtcState {
        self.state
    }

    /// Last decoded wall-clock time.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Raw bytes of the last full register read (BCD fields included).
    pub fn snapshot(&self) -> &[u8; SNAPSHOT_LEN] {
        &self.snapshot
    }

    pub fn control(&self) -> u8 {
        self.ctrl_shadow
    }

    pub fn status(&self) -> u8 {
        self.status_shadow
    }

    pub fn alarm1_armed(&self) -> bool {
        self.alarm1_armed
    }

    pub fn alarm2_armed(&self) -> bool {
        self.alarm2_armed
    }

    pub fn fault_log(&self) -> &FaultLog<RtcFault, FAULT_DEPTH> {
        &self.faults
    }

    // ── setters ───────────────────────────────────────────────────

    /// Validate and write the seven time registers, then verify.
    pub fn set_time<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        clock: &Clock,
    ) -> Result<()> {
        clock.validate()?;
        self.run_gated(bus, RtcState::SettingTime, |rtc, bus| {
            let mut frame = [0u8; 1 + TIME_LEN];
            frame[0] = REG_SECONDS;
            frame[1] = pack_bcd(clock.seconds);
            frame[2] = pack_bcd(clock.minutes);
            frame[3] = pack_bcd(clock.hours);
            frame[4] = clock.day_of_week; // single digit, BCD-identical
            frame[5] = pack_bcd(clock.date);
            frame[6] = pack_bcd(clock.month) | if clock.century { MONTH_CENTURY_BIT } else { 0 };
            frame[7] = pack_bcd(clock.year);
            bus.transmit(DEV_ADDR, &frame)?;

            let mut back = [0u8; TIME_LEN];
            bus.transmit(DEV_ADDR, &[REG_SECONDS])?;
            bus.receive(DEV_ADDR, &mut back)?;
            if back != frame[1..] {
                return Err(rtc.fault(RtcFault::TimeVerifyFailed));
            }
            rtc.clock = *clock;
            rtc.snapshot[..TIME_LEN].copy_from_slice(&back);
            debug!("rtc time set: {clock:?}");
            Ok(())
        })
    }

    /// Write the control register and verify, ignoring the self-clearing
    /// CONV bit.
    pub fn set_control<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        value: u8,
    ) -> Result<()> {
        self.run_gated(bus, RtcState::SettingCtrlReg, |rtc, bus| {
            bus.transmit(DEV_ADDR, &[REG_CONTROL, value])?;
            let mut back = [0u8; 1];
            bus.transmit(DEV_ADDR, &[REG_CONTROL])?;
            bus.receive(DEV_ADDR, &mut back)?;
            if back[0] & !CTRL_CONV != value & !CTRL_CONV {
                return Err(rtc.fault(RtcFault::CtrlVerifyFailed));
            }
            rtc.ctrl_shadow = back[0];
            Ok(())
        })
    }

    /// Write the status register and verify, ignoring the read-only BSY
    /// bit.
    pub fn set_status<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        value: u8,
    ) -> Result<()> {
        self.run_gated(bus, RtcState::SettingStatusReg, |rtc, bus| {
            rtc.write_status_verified(bus, value)
        })
    }

    /// Arm alarm 1: validate, encode (BCD + match masks), write, verify
    /// bit-exactly.
    pub fn set_alarm1<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        when: &AlarmTime,
        condition: Alarm1Match,
        hook: Option<AlarmHook>,
    ) -> Result<()> {
        let bytes = alarm::encode_alarm1(when, condition)?;
        self.run_gated(bus, RtcState::SettingAlarm1, |rtc, bus| {
            let mut frame = [0u8; 1 + ALARM1_LEN];
            frame[0] = REG_ALARM1_BASE;
            frame[1..].copy_from_slice(&bytes);
            bus.transmit(DEV_ADDR, &frame)?;

            let mut back = [0u8; ALARM1_LEN];
            bus.transmit(DEV_ADDR, &[REG_ALARM1_BASE])?;
            bus.receive(DEV_ADDR, &mut back)?;
            if back != bytes {
                return Err(rtc.fault(RtcFault::AlarmVerifyFailed));
            }
            rtc.alarm1_armed = true;
            rtc.alarm1_hook = hook;
            debug!("alarm1 armed: {when:?} {condition:?}");
            Ok(())
        })
    }

    /// Arm alarm 2 (minutes resolution; the device has no seconds
    /// register for it).
    pub fn set_alarm2<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        when: &AlarmTime,
        condition: Alarm2Match,
        hook: Option<AlarmHook>,
    ) -> Result<()> {
        let bytes = alarm::encode_alarm2(when, condition)?;
        self.run_gated(bus, RtcState::SettingAlarm2, |rtc, bus| {
            let mut frame = [0u8; 1 + ALARM2_LEN];
            frame[0] = REG_ALARM2_BASE;
            frame[1..].copy_from_slice(&bytes);
            bus.transmit(DEV_ADDR, &frame)?;

            let mut back = [0u8; ALARM2_LEN];
            bus.transmit(DEV_ADDR, &[REG_ALARM2_BASE])?;
            bus.receive(DEV_ADDR, &mut back)?;
            if back != bytes {
                return Err(rtc.fault(RtcFault::AlarmVerifyFailed));
            }
            rtc.alarm2_armed = true;
            rtc.alarm2_hook = hook;
            debug!("alarm2 armed: {when:?} {condition:?}");
            Ok(())
        })
    }

    pub fn disarm_alarm1(&mut self) {
        self.alarm1_armed = false;
        self.alarm1_hook = None;
    }

    pub fn disarm_alarm2(&mut self) {
        self.alarm2_armed = false;
        self.alarm2_hook = None;
    }

    // ── control-bit helpers ───────────────────────────────────────

    /// EOSC is inverted: a SET bit stops the oscillator on battery.
    pub fn set_oscillator_enabled<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        enabled: bool,
    ) -> Result<()> {
        let v = self.with_ctrl_bit(CTRL_EOSC, !enabled);
        self.set_control(bus, v)
    }

    pub fn set_battery_backed_square_wave<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        enabled: bool,
    ) -> Result<()> {
        let v = self.with_ctrl_bit(CTRL_BBSQW, enabled);
        self.set_control(bus, v)
    }

    /// Kick a manual temperature conversion (CONV self-clears).
    pub fn force_temperature_conversion<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
    ) -> Result<()> {
        let v = self.with_ctrl_bit(CTRL_CONV, true);
        self.set_control(bus, v)
    }

    pub fn set_square_wave_rate<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        rate: SquareWaveRate,
    ) -> Result<()> {
        let v = (self.ctrl_shadow & !(CTRL_RS2 | CTRL_RS1)) | rate.bits();
        self.set_control(bus, v)
    }

    /// INTCN set routes alarms to the INT/SQW pin (instead of the square
    /// wave).
    pub fn set_alarm_interrupt_output<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        enabled: bool,
    ) -> Result<()> {
        let v = self.with_ctrl_bit(CTRL_INTCN, enabled);
        self.set_control(bus, v)
    }

    pub fn set_alarm1_interrupt<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        enabled: bool,
    ) -> Result<()> {
        let v = self.with_ctrl_bit(CTRL_A1IE, enabled);
        self.set_control(bus, v)
    }

    pub fn set_alarm2_interrupt<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        enabled: bool,
    ) -> Result<()> {
        let v = self.with_ctrl_bit(CTRL_A2IE, enabled);
        self.set_control(bus, v)
    }

    /// Clear the oscillator-stop flag after the fault has been handled.
    pub fn clear_oscillator_stop_flag<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
    ) -> Result<()> {
        let v = self.status_shadow & !STAT_OSF;
        self.set_status(bus, v)
    }

    // ── observation ───────────────────────────────────────────────

    /// Advance the observation machine. Reads the full snapshot when the
    /// refresh interval has elapsed (wraparound-safe) or the interrupt
    /// line is asserted; otherwise does nothing.
    pub fn poll<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        now_ms: u32,
        irq_asserted: bool,
    ) -> Result<()> {
        if self.state != RtcState::Idle {
            return Ok(());
        }
        let due =
            irq_asserted || !self.has_read || elapsed(now_ms, self.last_read_ms) >= self.refresh_ms;
        if !due {
            return Ok(());
        }
        self.run_gated(bus, RtcState::ReadingAllRegisters, |rtc, bus| {
            rtc.refresh(bus, now_ms)
        })
    }

    /// Die temperature in degrees Celsius (0.25 °C per LSB).
    pub fn read_temperature<C: BusController>(&mut self, bus: &mut I2cMaster<C>) -> Result<f32> {
        if !bus.claim() {
            return Err(BusFault::Busy.into());
        }
        let result = (|| {
            bus.transmit(DEV_ADDR, &[REG_TEMP_MSB])?;
            let mut raw = [0u8; 2];
            bus.receive(DEV_ADDR, &mut raw)?;
            Ok(f32::from(raw[0] as i8) + f32::from(raw[1] >> 6) * 0.25)
        })();
        bus.release();
        result
    }

    /// Crystal aging-offset trim register.
    pub fn read_aging_offset<C: BusController>(&mut self, bus: &mut I2cMaster<C>) -> Result<i8> {
        if !bus.claim() {
            return Err(BusFault::Busy.into());
        }
        let result = (|| {
            bus.transmit(DEV_ADDR, &[REG_AGING])?;
            let mut raw = [0u8; 1];
            bus.receive(DEV_ADDR, &mut raw)?;
            Ok(raw[0] as i8)
        })();
        bus.release();
        result
    }

    pub fn set_aging_offset<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        value: i8,
    ) -> Result<()> {
        bus.transmit(DEV_ADDR, &[REG_AGING, value as u8])?;
        Ok(())
    }

    // ── internals ─────────────────────────────────────────────────

    /// Claim the gate, enter `state`, run `op`, then restore Idle and
    /// release — on every path.
    fn run_gated<C: BusController, F>(
        &mut self,
        bus: &mut I2cMaster<C>,
        state: RtcState,
        op: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Self, &mut I2cMaster<C>) -> Result<()>,
    {
        if !bus.claim() {
            return Err(BusFault::Busy.into());
        }
        self.state = state;
        let result = op(self, bus);
        self.state = RtcState::Idle;
        bus.release();
        result
    }

    fn refresh<C: BusController>(&mut self, bus: &mut I2cMaster<C>, now_ms: u32) -> Result<()> {
        bus.transmit(DEV_ADDR, &[REG_SECONDS])?;
        let mut snap = [0u8; SNAPSHOT_LEN];
        bus.receive(DEV_ADDR, &mut snap)?;
        self.snapshot = snap;
        self.decode_time();
        self.ctrl_shadow = snap[REG_CONTROL as usize];
        self.status_shadow = snap[REG_STATUS as usize];
        self.last_read_ms = now_ms;
        self.has_read = true;

        if self.status_shadow & STAT_OSF != 0 {
            warn!("rtc oscillator stop flag set; time is suspect");
            self.faults.record(RtcFault::OscillatorStopped);
        }

        let mut fired = 0u8;
        if self.status_shadow & STAT_A1F != 0 && self.alarm1_armed {
            if let Some(hook) = self.alarm1_hook {
                hook(AlarmId::Alarm1);
            }
            fired |= STAT_A1F;
        }
        if self.status_shadow & STAT_A2F != 0 && self.alarm2_armed {
            if let Some(hook) = self.alarm2_hook {
                hook(AlarmId::Alarm2);
            }
            fired |= STAT_A2F;
        }
        if fired != 0 {
            // Clear only the flags whose callbacks ran; an unarmed
            // alarm's pending flag stays untouched.
            let value = self.status_shadow & !fired;
            self.write_status_verified(bus, value)?;
        }
        Ok(())
    }

    fn write_status_verified<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        value: u8,
    ) -> Result<()> {
        bus.transmit(DEV_ADDR, &[REG_STATUS, value])?;
        let mut back = [0u8; 1];
        bus.transmit(DEV_ADDR, &[REG_STATUS])?;
        bus.receive(DEV_ADDR, &mut back)?;
        if back[0] & !STAT_BSY != value & !STAT_BSY {
            return Err(self.fault(RtcFault::StatusVerifyFailed));
        }
        self.status_shadow = back[0];
        Ok(())
    }

    fn decode_time(&mut self) {
        let s = &self.snapshot;
        self.clock = Clock {
            seconds: unpack_bcd(s[0] & 0x7F),
            minutes: unpack_bcd(s[1] & 0x7F),
            hours: unpack_bcd(s[2] & 0x3F),
            day_of_week: s[3] & 0x07,
            date: unpack_bcd(s[4] & 0x3F),
            month: unpack_bcd(s[5] & 0x1F),
            year: unpack_bcd(s[6]),
            century: s[5] & MONTH_CENTURY_BIT != 0,
        };
    }

    fn with_ctrl_bit(&self, bit: u8, set: bool) -> u8 {
        if set {
            self.ctrl_shadow | bit
        } else {
            self.ctrl_shadow & !bit
        }
    }

    fn fault(&mut self, fault: RtcFault) -> crate::error::Error {
        warn!("rtc fault: {fault}");
        self.faults.record(fault);
        fault.into()
    }
}
