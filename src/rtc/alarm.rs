//! DS3231 alarm match conditions and register encoding.
//!
//! Each alarm byte carries a match-mask bit in bit 7; the day/date byte
//! additionally carries the DY/DT selector in bit 6. A set mask bit means
//! "ignore this field when matching", so the coarser the condition, the
//! more mask bits are set.

use crate::error::{Result, RtcFault};
use crate::rtc::regs::{ALARM_DYDT_BIT, ALARM_MASK_BIT, pack_bcd};

/// Which alarm a callback is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmId {
    Alarm1,
    Alarm2,
}

/// Callback invoked (at most once per observation) when an armed alarm's
/// fired flag is seen set.
pub type AlarmHook = fn(AlarmId);

/// Alarm 1 match condition. Mask bits M1..M4 cover seconds, minutes,
/// hours, day/date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alarm1Match {
    /// Fire every second (M1..M4 all set).
    OncePerSecond,
    /// Fire when seconds match (M2..M4 set).
    SecondsMatch,
    /// Fire when minutes and seconds match (M3, M4 set).
    MinutesSecondsMatch,
    /// Fire when hours, minutes, and seconds match (M4 set only).
    HoursMinutesSecondsMatch,
    /// Fire when day-of-week and h/m/s match (DY/DT set, no masks).
    DayHmsMatch,
    /// Fire when date and h/m/s match (no masks, DY/DT clear).
    DateHmsMatch,
}

impl Alarm1Match {
    /// Mask bits for [seconds, minutes, hours, day/date].
    fn masks(self) -> [bool; 4] {
        match self {
            Self::OncePerSecond => [true, true, true, true],
            Self::SecondsMatch => [false, true, true, true],
            Self::MinutesSecondsMatch => [false, false, true, true],
            Self::HoursMinutesSecondsMatch => [false, false, false, true],
            Self::DayHmsMatch | Self::DateHmsMatch => [false; 4],
        }
    }

    fn uses_day_of_week(self) -> bool {
        matches!(self, Self::DayHmsMatch)
    }
}

/// Alarm 2 match condition. Mask bits M2..M4 cover minutes, hours,
/// day/date (alarm 2 has no seconds register).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alarm2Match {
    /// Fire every minute, at :00 seconds (M2..M4 all set).
    OncePerMinute,
    /// Fire when minutes match (M3, M4 set).
    MinutesMatch,
    /// Fire when hours and minutes match (M4 set only).
    HoursMinutesMatch,
    /// Fire when day-of-week and h/m match (DY/DT set, no masks).
    DayHmMatch,
    /// Fire when date and h/m match (no masks, DY/DT clear).
    DateHmMatch,
}

impl Alarm2Match {
    /// Mask bits for [minutes, hours, day/date].
    fn masks(self) -> [bool; 3] {
        match self {
            Self::OncePerMinute => [true, true, true],
            Self::MinutesMatch => [false, true, true],
            Self::HoursMinutesMatch => [false, false, true],
            Self::DayHmMatch | Self::DateHmMatch => [false; 3],
        }
    }

    fn uses_day_of_week(self) -> bool {
        matches!(self, Self::DayHmMatch)
    }
}

/// Wall-clock fields an alarm matches against. `day_or_date` is a
/// day-of-week (1-7) or a date (1-31) depending on the match condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmTime {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub day_or_date: u8,
}

fn check_common(when: &AlarmTime, day_of_week: bool) -> Result<()> {
    let day_ok = if day_of_week {
        (1..=7).contains(&when.day_or_date)
    } else {
        (1..=31).contains(&when.day_or_date)
    };
    if when.seconds > 59 || when.minutes > 59 || when.hours > 23 || !day_ok {
        return Err(RtcFault::InvalidTime.into());
    }
    Ok(())
}

/// Validate and encode the four alarm-1 registers (0x07..=0x0A).
pub fn encode_alarm1(when: &AlarmTime, condition: Alarm1Match) -> Result<[u8; 4]> {
    check_common(when, condition.uses_day_of_week())?;
    let masks = condition.masks();
    let mut bytes = [
        pack_bcd(when.seconds),
        pack_bcd(when.minutes),
        pack_bcd(when.hours),
        pack_bcd(when.day_or_date),
    ];
    for (byte, mask) in bytes.iter_mut().zip(masks) {
        if mask {
            *byte |= ALARM_MASK_BIT;
        }
    }
    if condition.uses_day_of_week() {
        bytes[3] |= ALARM_DYDT_BIT;
    }
    Ok(bytes)
}

/// Validate and encode the three alarm-2 registers (0x0B..=0x0D).
pub fn encode_alarm2(when: &AlarmTime, condition: Alarm2Match) -> Result<[u8; 3]> {
    check_common(when, condition.uses_day_of_week())?;
    let masks = condition.masks();
    let mut bytes = [
        pack_bcd(when.minutes),
        pack_bcd(when.hours),
        pack_bcd(when.day_or_date),
    ];
    for (byte, mask) in bytes.iter_mut().zip(masks) {
        if mask {
            *byte |= ALARM_MASK_BIT;
        }
    }
    if condition.uses_day_of_week() {
        bytes[2] |= ALARM_DYDT_BIT;
    }
    Ok(bytes)
}
