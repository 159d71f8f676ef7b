//! DHT11 temperature/humidity sensor on a single open-drain data line.
//!
//! The transfer itself is a timed bit-bang and cannot be split across
//! poll passes: host pulls the line low for 20 ms, releases it, the
//! sensor answers with an 80 µs low / 80 µs high preamble and then 40
//! bits, each a 50 µs low followed by a high whose length encodes the
//! bit. Rather than measuring microseconds, the driver counts spin
//! iterations in each level and compares the high count against the
//! preceding low count — longer high than low reads as a one. Every
//! level wait is bounded by [`SPIN_LIMIT`] so a stuck line fails instead
//! of hanging the loop.
//!
//! Around the transfer the driver is a small pacing machine: a settle
//! window after power-up before the first read, then a cooldown between
//! reads (the part needs about two seconds to recover).

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::error::{Result, SensorFault};
use crate::timebase::elapsed;

/// Upper bound on spin iterations per level wait.
pub const SPIN_LIMIT: u32 = 0x320;

/// Power-up settle before the sensor answers reliably.
const SETTLE_MS: u32 = 100;

/// Host start signal: hold the line low this long.
const START_LOW_MS: u32 = 20;

const FRAME_BYTES: usize = 5;
const FRAME_BITS: usize = 40;

/// Data-line access. `release` floats the line so the sensor can drive
/// it; `is_high` samples the current level.
pub trait DhtLine {
    fn drive_low(&mut self);
    fn release(&mut self);
    fn is_high(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhtReading {
    pub humidity_pct: u8,
    pub temperature_c: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DhtState {
    /// Waiting out the power-up settle window.
    Idle,
    /// Waiting out the inter-read recovery period.
    Cooldown,
}

/// Decode and checksum a received 5-byte frame.
///
/// Byte 0 is integer humidity, byte 2 integer temperature; the
/// fractional bytes are always zero on this part. The checksum is the
/// low byte of the sum of the first four.
pub fn parse_frame(frame: &[u8; FRAME_BYTES]) -> Result<DhtReading> {
    let sum = frame[..4].iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    if sum != frame[4] {
        return Err(SensorFault::BadChecksum.into());
    }
    Ok(DhtReading {
        humidity_pct: frame[0],
        temperature_c: frame[2],
    })
}

/// DHT11 driver over a [`DhtLine`].
pub struct Dht11<L: DhtLine> {
    line: L,
    state: DhtState,
    entered_ms: u32,
    cooldown_ms: u32,
    last: Option<DhtReading>,
}

impl<L: DhtLine> Dht11<L> {
    pub fn new(line: L, cooldown_ms: u32) -> Self {
        Self {
            line,
            state: DhtState::Idle,
            entered_ms: 0,
            cooldown_ms: cooldown_ms.max(1),
            last: None,
        }
    }

    pub fn last_reading(&self) -> Option<DhtReading> {
        self.last
    }

    /// Attempt a read if pacing allows; `Ok(None)` while settling or
    /// cooling down. A failed read starts a fresh cooldown too.
    pub fn poll<D: DelayNs>(&mut self, delay: &mut D, now_ms: u32) -> Result<Option<DhtReading>> {
        let wait = match self.state {
            DhtState::Idle => SETTLE_MS,
            DhtState::Cooldown => self.cooldown_ms,
        };
        if elapsed(now_ms, self.entered_ms) < wait {
            return Ok(None);
        }
        self.state = DhtState::Cooldown;
        self.entered_ms = now_ms;
        let result = self.read(delay);
        if let Err(e) = &result {
            warn!("dht11 read failed: {e}");
        }
        result.map(|r| {
            self.last = Some(r);
            Some(r)
        })
    }

    fn read<D: DelayNs>(&mut self, delay: &mut D) -> Result<DhtReading> {
        self.line.drive_low();
        delay.delay_ms(START_LOW_MS);
        self.line.release();

        // Preamble: our released high, sensor low, sensor high, then the
        // low that starts bit 0.
        self.wait_level(false).map_err(|_| SensorFault::NoResponse)?;
        self.wait_level(true).map_err(|_| SensorFault::NoResponse)?;
        self.wait_level(false).map_err(|_| SensorFault::NoResponse)?;

        let mut frame = [0u8; FRAME_BYTES];
        for bit in 0..FRAME_BITS {
            let low = self.count_level(false)?;
            let high = self.count_level(true)?;
            if high > low {
                frame[bit / 8] |= 0x80 >> (bit % 8);
            }
        }
        let reading = parse_frame(&frame)?;
        debug!("dht11: {}% {}C", reading.humidity_pct, reading.temperature_c);
        Ok(reading)
    }

    /// Spin until the line reaches `level`, bounded by [`SPIN_LIMIT`].
    fn wait_level(&mut self, level: bool) -> Result<()> {
        for _ in 0..SPIN_LIMIT {
            if self.line.is_high() == level {
                return Ok(());
            }
        }
        Err(SensorFault::Timeout.into())
    }

    /// Count spins while the line stays at `level`; the count is the
    /// relative duration used for bit discrimination.
    fn count_level(&mut self, level: bool) -> Result<u32> {
        let mut n = 0u32;
        while self.line.is_high() == level {
            n += 1;
            if n >= SPIN_LIMIT {
                return Err(SensorFault::Timeout.into());
            }
        }
        Ok(n)
    }
}
