//! Millisecond timebase and delay sources.
//!
//! Two INDEPENDENT time sources:
//!
//! - [`Timebase`] — the periodic counter. A 1 kHz timer interrupt calls
//!   [`Timebase::tick`]; everything that schedules work ("is this due yet?")
//!   compares against [`Timebase::now`] with wraparound-safe subtraction.
//! - [`SpinDelay`] — bounded blocking micro/millisecond delays for bus and
//!   display settle times. Never touches the tick counter, so a delay can
//!   never corrupt scheduling and the counter can never shorten a delay.
//!
//! The counter wraps at `u32::MAX` (~49.7 days); `elapsed_since` stays exact
//! across the wrap because it subtracts modulo 2^32.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;

/// Shared monotonic millisecond counter.
///
/// Written by the tick ISR, read by the poll loop. All accesses are atomic;
/// no critical section is needed.
#[derive(Debug)]
pub struct Timebase {
    running: AtomicBool,
    millis: AtomicU32,
}

/// The firmware-wide timebase instance the tick ISR advances.
pub static TIMEBASE: Timebase = Timebase::new();

impl Timebase {
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            millis: AtomicU32::new(0),
        }
    }

    /// Allow the tick ISR to advance the counter.
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Freeze the counter (ticks are ignored while stopped).
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// ISR body — call once per millisecond.
    pub fn tick(&self) {
        if self.is_running() {
            self.millis.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current counter value in milliseconds.
    pub fn now(&self) -> u32 {
        self.millis.load(Ordering::Relaxed)
    }

    /// Milliseconds elapsed since `start_ms`, exact across counter wrap.
    pub fn elapsed_since(&self, start_ms: u32) -> u32 {
        self.now().wrapping_sub(start_ms)
    }

    /// Advance the counter by `ms`. Used by simulations and tests that
    /// stand in for the tick ISR.
    pub fn advance(&self, ms: u32) {
        if self.is_running() {
            self.millis.fetch_add(ms, Ordering::Relaxed);
        }
    }
}

/// Wraparound-safe elapsed time between two counter readings.
pub fn elapsed(now_ms: u32, start_ms: u32) -> u32 {
    now_ms.wrapping_sub(start_ms)
}

/// Blocking delay source, independent of [`Timebase`].
///
/// On the target this busy-waits on the ROM microsecond counter. On the
/// host it sleeps the thread, which is precise enough for the settle
/// times the drivers need.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinDelay;

impl SpinDelay {
    pub const fn new() -> Self {
        Self
    }
}

impl DelayNs for SpinDelay {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        let us = ns.div_ceil(1_000).max(1);
        unsafe { esp_idf_sys::esp_rom_delay_us(us) };
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}

/// Delay source that returns immediately. For host simulation and tests,
/// where device settle times have no meaning.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDelay;

impl DelayNs for NullDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_only_while_running() {
        let tb = Timebase::new();
        tb.tick();
        assert_eq!(tb.now(), 0, "stopped timebase must ignore ticks");
        tb.start();
        tb.tick();
        tb.tick();
        assert_eq!(tb.now(), 2);
        tb.stop();
        tb.tick();
        assert_eq!(tb.now(), 2);
    }

    #[test]
    fn elapsed_is_exact_across_wrap() {
        let tb = Timebase::new();
        tb.start();
        tb.millis.store(u32::MAX - 5, Ordering::Relaxed);
        let start = tb.now();
        tb.advance(10); // wraps past u32::MAX
        assert_eq!(tb.elapsed_since(start), 10);
        assert_eq!(elapsed(4, u32::MAX - 5), 10);
    }

    #[test]
    fn advance_accumulates() {
        let tb = Timebase::new();
        tb.start();
        tb.advance(250);
        tb.advance(250);
        assert_eq!(tb.now(), 500);
    }
}
