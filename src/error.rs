//! Unified error types for the desk clock firmware.
//!
//! Follows embedded best practice: a single `Error` enum that every subsystem
//! can convert into, keeping the top-level poll loop's error handling uniform.
//! All variants are `Copy` so they can be recorded in the bounded fault
//! ledgers without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The I2C transport reported a fault.
    Bus(BusFault),
    /// A sensor could not be read or returned inconsistent data.
    Sensor(SensorFault),
    /// The real-time clock reported a device fault.
    Rtc(RtcFault),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Rtc(e) => write!(f, "rtc: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// I2C transport faults
// ---------------------------------------------------------------------------

/// Faults the byte engine reports through its completion callbacks, plus
/// the two conditions the transport itself detects (`Busy`, `Timeout`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusFault {
    /// A start was issued while another operation was in flight, or the
    /// command gate is already held.
    Busy,
    /// Lost arbitration / write collision on the wire.
    WriteCollision,
    /// No ACK for the address byte.
    AddressNack,
    /// No ACK for a data byte.
    DataNack,
    /// The bounded busy-wait expired before the engine completed.
    Timeout,
}

impl fmt::Display for BusFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "bus busy"),
            Self::WriteCollision => write!(f, "write collision"),
            Self::AddressNack => write!(f, "address NACK"),
            Self::DataNack => write!(f, "data NACK"),
            Self::Timeout => write!(f, "transaction timeout"),
        }
    }
}

impl From<BusFault> for Error {
    fn from(e: BusFault) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFault {
    /// The device never produced its start-of-frame handshake.
    NoResponse,
    /// A pulse or conversion exceeded its bounded wait.
    Timeout,
    /// Frame checksum mismatch.
    BadChecksum,
    /// ADC conversion failed.
    AdcReadFailed,
    /// The probe has no dry/wet calibration endpoints yet.
    Uncalibrated,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// Vendor driver initialisation failed.
    VendorInit,
    /// Vendor driver measurement failed.
    VendorMeasure,
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse => write!(f, "no response"),
            Self::Timeout => write!(f, "read timeout"),
            Self::BadChecksum => write!(f, "bad checksum"),
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::Uncalibrated => write!(f, "probe not calibrated"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::VendorInit => write!(f, "vendor driver init failed"),
            Self::VendorMeasure => write!(f, "vendor driver measure failed"),
        }
    }
}

impl From<SensorFault> for Error {
    fn from(e: SensorFault) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// RTC device faults
// ---------------------------------------------------------------------------

/// Faults detected while talking to the DS3231. Verification faults mean
/// the device read back a different value than was just written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcFault {
    /// The oscillator-stop flag was set; timekeeping data is suspect.
    OscillatorStopped,
    /// A time/date field failed range validation before any I/O.
    InvalidTime,
    /// Time registers did not verify after write.
    TimeVerifyFailed,
    /// Control register did not verify after write.
    CtrlVerifyFailed,
    /// Status register did not verify after write.
    StatusVerifyFailed,
    /// Alarm registers did not verify after write.
    AlarmVerifyFailed,
}

impl fmt::Display for RtcFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OscillatorStopped => write!(f, "oscillator stopped"),
            Self::InvalidTime => write!(f, "invalid time field"),
            Self::TimeVerifyFailed => write!(f, "time readback mismatch"),
            Self::CtrlVerifyFailed => write!(f, "control readback mismatch"),
            Self::StatusVerifyFailed => write!(f, "status readback mismatch"),
            Self::AlarmVerifyFailed => write!(f, "alarm readback mismatch"),
        }
    }
}

impl From<RtcFault> for Error {
    fn from(e: RtcFault) -> Self {
        Self::Rtc(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
