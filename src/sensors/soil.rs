//! Resistive soil-moisture probe behind a power relay.
//!
//! Resistive probes corrode if left energised, so the relay powers the
//! probe only for the duration of a measurement. A measurement is a
//! multi-pass state machine driven from the poll loop:
//!
//! ```text
//! Idle ──start──► Stabilizing ──settle──► Reading ──5 samples──► Complete
//!   ▲   (relay on)                                   (relay off)    │
//!   └──────────────────────── take_reading ───────────────────────┘
//! ```
//!
//! After the settle window one conversion is thrown away (the ADC input
//! has just seen a step), then five samples are averaged at a fixed
//! spacing and remapped against the dry/wet calibration points to a
//! clamped 0-100 percent.

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::error::{Error, Result, SensorFault};
use crate::timebase::elapsed;

const SAMPLE_COUNT: usize = 5;

/// ADC channel access for the probe.
pub trait SoilAdc {
    /// One raw conversion.
    fn read(&mut self) -> Result<u16>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoilReading {
    /// Averaged raw conversion.
    pub raw: u16,
    /// 0 = bone dry, 100 = saturated.
    pub percent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoilState {
    /// Calibration points are unusable; measurements refused.
    Uncalibrated,
    Idle,
    /// Relay on, waiting for the probe voltage to settle.
    Stabilizing,
    /// Collecting spaced samples.
    Reading,
    /// A reading is available for pickup.
    Complete,
}

/// Remap a raw average onto the dry..wet span as a percentage.
///
/// Wetter soil conducts better and reads lower here, so `wet_raw` is the
/// smaller calibration point. Out-of-span values clamp.
pub fn moisture_percent(avg: u16, dry_raw: u16, wet_raw: u16) -> u8 {
    let span = i32::from(dry_raw) - i32::from(wet_raw);
    if span <= 0 {
        return 0;
    }
    let pct = (i32::from(avg) - i32::from(wet_raw)) * 100 / span;
    pct.clamp(0, 100) as u8
}

/// Relay-gated soil probe driver.
pub struct SoilSensor<A: SoilAdc, P: OutputPin> {
    adc: A,
    relay: P,
    state: SoilState,
    entered_ms: u32,
    stabilize_ms: u32,
    spacing_ms: u32,
    dry_raw: u16,
    wet_raw: u16,
    samples: [u16; SAMPLE_COUNT],
    taken: usize,
    last_sample_ms: u32,
    last: Option<SoilReading>,
}

impl<A: SoilAdc, P: OutputPin> SoilSensor<A, P> {
    pub fn new(adc: A, relay: P, stabilize_ms: u32, spacing_ms: u32, dry_raw: u16, wet_raw: u16) -> Self {
        let state = if dry_raw > wet_raw {
            SoilState::Idle
        } else {
            SoilState::Uncalibrated
        };
        Self {
            adc,
            relay,
            state,
            entered_ms: 0,
            stabilize_ms: stabilize_ms.max(1),
            spacing_ms: spacing_ms.max(1),
            dry_raw,
            wet_raw,
            samples: [0; SAMPLE_COUNT],
            taken: 0,
            last_sample_ms: 0,
            last: None,
        }
    }

    pub fn state(&self) -> SoilState {
        self.state
    }

    pub fn last_reading(&self) -> Option<SoilReading> {
        self.last
    }

    /// Replace the calibration points. Dry must read above wet.
    pub fn calibrate(&mut self, dry_raw: u16, wet_raw: u16) -> Result<()> {
        if dry_raw <= wet_raw {
            return Err(SensorFault::Uncalibrated.into());
        }
        self.dry_raw = dry_raw;
        self.wet_raw = wet_raw;
        if self.state == SoilState::Uncalibrated {
            self.state = SoilState::Idle;
        }
        Ok(())
    }

    /// Energise the probe and begin a measurement.
    pub fn start_sample(&mut self, now_ms: u32) -> Result<()> {
        match self.state {
            SoilState::Uncalibrated => Err(SensorFault::Uncalibrated.into()),
            SoilState::Idle => {
                self.relay_set(true)?;
                self.state = SoilState::Stabilizing;
                self.entered_ms = now_ms;
                self.taken = 0;
                Ok(())
            }
            // Measurement already in flight.
            _ => Ok(()),
        }
    }

    /// Advance the measurement; returns a reading exactly once per cycle.
    pub fn poll(&mut self, now_ms: u32) -> Result<Option<SoilReading>> {
        match self.state {
            SoilState::Uncalibrated | SoilState::Idle | SoilState::Complete => Ok(None),
            SoilState::Stabilizing => {
                if elapsed(now_ms, self.entered_ms) < self.stabilize_ms {
                    return Ok(None);
                }
                // Throwaway conversion after the settle step.
                if let Err(e) = self.adc.read() {
                    self.abort();
                    warn!("soil discard conversion failed: {e}");
                    return Err(e);
                }
                self.state = SoilState::Reading;
                self.last_sample_ms = now_ms;
                Ok(None)
            }
            SoilState::Reading => {
                if elapsed(now_ms, self.last_sample_ms) < self.spacing_ms {
                    return Ok(None);
                }
                self.last_sample_ms = now_ms;
                match self.adc.read() {
                    Ok(raw) => {
                        self.samples[self.taken] = raw;
                        self.taken += 1;
                    }
                    Err(e) => {
                        self.abort();
                        warn!("soil sample failed: {e}");
                        return Err(e);
                    }
                }
                if self.taken < SAMPLE_COUNT {
                    return Ok(None);
                }
                self.relay_set(false)?;
                let sum: u32 = self.samples.iter().map(|&s| u32::from(s)).sum();
                let avg = (sum / SAMPLE_COUNT as u32) as u16;
                let reading = SoilReading {
                    raw: avg,
                    percent: moisture_percent(avg, self.dry_raw, self.wet_raw),
                };
                debug!("soil: raw {} -> {}%", reading.raw, reading.percent);
                self.last = Some(reading);
                self.state = SoilState::Complete;
                Ok(Some(reading))
            }
        }
    }

    /// Acknowledge a completed measurement and return to idle.
    pub fn take_reading(&mut self) -> Option<SoilReading> {
        if self.state == SoilState::Complete {
            self.state = SoilState::Idle;
            self.last
        } else {
            None
        }
    }

    /// Drop a measurement in flight and de-energise the probe.
    pub fn abort(&mut self) {
        let _ = self.relay.set_low();
        if self.state != SoilState::Uncalibrated {
            self.state = SoilState::Idle;
        }
    }

    fn relay_set(&mut self, on: bool) -> Result<()> {
        let r = if on {
            self.relay.set_high()
        } else {
            self.relay.set_low()
        };
        r.map_err(|_| Error::Init("soil relay drive"))
    }
}
