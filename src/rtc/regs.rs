//! DS3231 register map, flag bits, and BCD helpers.

/// 7-bit bus address.
pub const DEV_ADDR: u8 = 0x68;

// Time/date registers (all BCD).
pub const REG_SECONDS: u8 = 0x00;
pub const REG_MINUTES: u8 = 0x01;
pub const REG_HOURS: u8 = 0x02;
pub const REG_DAY: u8 = 0x03;
pub const REG_DATE: u8 = 0x04;
pub const REG_MONTH: u8 = 0x05;
pub const REG_YEAR: u8 = 0x06;

// Alarm 1: seconds, minutes, hours, day/date.
pub const REG_ALARM1_BASE: u8 = 0x07;
// Alarm 2: minutes, hours, day/date (no seconds register).
pub const REG_ALARM2_BASE: u8 = 0x0B;

pub const REG_CONTROL: u8 = 0x0E;
pub const REG_STATUS: u8 = 0x0F;
pub const REG_AGING: u8 = 0x10;
pub const REG_TEMP_MSB: u8 = 0x11;
pub const REG_TEMP_LSB: u8 = 0x12;

/// A full register-file read, 0x00 through 0x12.
pub const SNAPSHOT_LEN: usize = 19;

pub const ALARM1_LEN: usize = 4;
pub const ALARM2_LEN: usize = 3;
pub const TIME_LEN: usize = 7;

// Control register bits.
pub const CTRL_EOSC: u8 = 1 << 7; // oscillator disable (battery)
pub const CTRL_BBSQW: u8 = 1 << 6; // battery-backed square wave
pub const CTRL_CONV: u8 = 1 << 5; // force temperature conversion
pub const CTRL_RS2: u8 = 1 << 4;
pub const CTRL_RS1: u8 = 1 << 3;
pub const CTRL_INTCN: u8 = 1 << 2; // INT/SQW pin carries alarms
pub const CTRL_A2IE: u8 = 1 << 1;
pub const CTRL_A1IE: u8 = 1 << 0;

// Status register bits.
pub const STAT_OSF: u8 = 1 << 7; // oscillator stop flag
pub const STAT_EN32KHZ: u8 = 1 << 3;
pub const STAT_BSY: u8 = 1 << 2;
pub const STAT_A2F: u8 = 1 << 1;
pub const STAT_A1F: u8 = 1 << 0;

/// Alarm match-mask bit (bit 7 of every alarm byte).
pub const ALARM_MASK_BIT: u8 = 0x80;
/// Day-of-week (vs date) selector, bit 6 of the day/date alarm byte.
pub const ALARM_DYDT_BIT: u8 = 0x40;

/// Century flag, bit 7 of the month register.
pub const MONTH_CENTURY_BIT: u8 = 0x80;

/// Pack a decimal value 0..=99 as BCD: tens digit in the high nibble.
/// `pack_bcd(47) == 0x47`.
pub fn pack_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Unpack a BCD byte back to its decimal value.
pub fn unpack_bcd(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}
