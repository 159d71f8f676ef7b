//! I2C master transport.
//!
//! The byte engine (hardware controller + its interrupt handlers) sits
//! behind the [`BusController`] trait; [`I2cMaster`] layers the blocking
//! transaction protocol on top:
//!
//! 1. set the target address (before EVERY operation),
//! 2. reset the engine,
//! 3. start the write or read,
//! 4. busy-wait on [`BusController::service`], bounded by a spin limit.
//!
//! A fault at any phase aborts the transaction, resets the engine, and is
//! recorded in a bounded [`FaultLog`]. There is no automatic retry — one
//! attempt per call, recovery is the caller's policy.
//!
//! Multi-step sequences (register-pointer write followed by a read, or an
//! alarm write followed by a control write) hold the command gate via
//! [`I2cMaster::claim`] so no other client can interleave a transaction.

use log::warn;

use crate::diagnostics::FaultLog;
use crate::error::BusFault;

/// Depth of the recorded fault history.
pub const FAULT_HISTORY: usize = 16;

/// Spin iterations allowed per transaction before declaring a timeout.
pub const MAX_WAIT_CYCLES: u32 = 0x2000;

/// Completion report from the byte engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// The started operation finished and ACKed throughout.
    Complete,
    /// The started operation failed; the engine has released the wire.
    Fault(BusFault),
}

/// The interrupt-driven byte engine, one I2C operation at a time.
///
/// `service()` is the interrupt analog: the transport calls it while
/// spinning, and it reports the completion or fault the hardware callbacks
/// would have delivered.
pub trait BusController {
    /// Latch the 7-bit target address for the next operation.
    fn set_address(&mut self, addr: u8);

    /// Abort any in-flight operation and return the engine to idle.
    fn reset(&mut self);

    /// Begin transmitting `bytes` to the latched address.
    fn start_write(&mut self, bytes: &[u8]);

    /// Begin receiving `len` bytes from the latched address.
    fn start_read(&mut self, len: usize);

    /// Drive the engine; `Some` when the started operation has finished.
    fn service(&mut self) -> Option<BusEvent>;

    /// Copy out the bytes received by the last completed read.
    /// Returns the number of bytes copied.
    fn take_received(&mut self, buf: &mut [u8]) -> usize;
}

/// Blocking I2C master over a [`BusController`].
#[derive(Debug)]
pub struct I2cMaster<C: BusController> {
    ctrl: C,
    claimed: bool,
    faults: FaultLog<BusFault, FAULT_HISTORY>,
}

impl<C: BusController> I2cMaster<C> {
    pub fn new(ctrl: C) -> Self {
        Self {
            ctrl,
            claimed: false,
            faults: FaultLog::new(),
        }
    }

    /// Take the command gate for a multi-step sequence.
    /// Returns `false` if another client already holds it.
    #[must_use]
    pub fn claim(&mut self) -> bool {
        if self.claimed {
            return false;
        }
        self.claimed = true;
        true
    }

    /// Release the command gate.
    pub fn release(&mut self) {
        self.claimed = false;
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// Write `bytes` to `addr`. One attempt, bounded wait, no retry.
    pub fn transmit(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BusFault> {
        self.ctrl.set_address(addr);
        self.ctrl.reset();
        self.ctrl.start_write(bytes);
        self.wait_complete()
    }

    /// Read `buf.len()` bytes from `addr`. One attempt, bounded wait.
    pub fn receive(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), BusFault> {
        self.ctrl.set_address(addr);
        self.ctrl.reset();
        self.ctrl.start_read(buf.len());
        self.wait_complete()?;
        let got = self.ctrl.take_received(buf);
        if got < buf.len() {
            self.record(BusFault::DataNack);
            return Err(BusFault::DataNack);
        }
        Ok(())
    }

    /// Recorded fault history, oldest first.
    pub fn fault_history(&self) -> &FaultLog<BusFault, FAULT_HISTORY> {
        &self.faults
    }

    pub fn clear_fault_history(&mut self) {
        self.faults.clear();
    }

    /// Direct access to the engine, for hardware bring-up paths.
    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.ctrl
    }

    fn wait_complete(&mut self) -> Result<(), BusFault> {
        for _ in 0..MAX_WAIT_CYCLES {
            match self.ctrl.service() {
                Some(BusEvent::Complete) => return Ok(()),
                Some(BusEvent::Fault(fault)) => {
                    self.record(fault);
                    self.ctrl.reset();
                    return Err(fault);
                }
                None => {}
            }
        }
        self.record(BusFault::Timeout);
        self.ctrl.reset();
        Err(BusFault::Timeout)
    }

    fn record(&mut self, fault: BusFault) {
        warn!("i2c fault: {fault}");
        self.faults.record(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted engine: answers each started operation from a queue of
    /// events, after a configurable number of idle service calls.
    struct ScriptedController {
        script: std::collections::VecDeque<BusEvent>,
        idle_calls: u32,
        pending: Option<(BusEvent, u32)>,
        last_addr: u8,
        resets: u32,
        written: Vec<Vec<u8>>,
        read_data: Vec<u8>,
        stall_forever: bool,
    }

    impl ScriptedController {
        fn new(script: Vec<BusEvent>) -> Self {
            Self {
                script: script.into(),
                idle_calls: 2,
                pending: None,
                last_addr: 0,
                resets: 0,
                written: Vec::new(),
                read_data: Vec::new(),
                stall_forever: false,
            }
        }
    }

    impl BusController for ScriptedController {
        fn set_address(&mut self, addr: u8) {
            self.last_addr = addr;
        }

        fn reset(&mut self) {
            self.resets += 1;
            self.pending = None;
        }

        fn start_write(&mut self, bytes: &[u8]) {
            self.written.push(bytes.to_vec());
            if let Some(ev) = self.script.pop_front() {
                self.pending = Some((ev, self.idle_calls));
            }
        }

        fn start_read(&mut self, _len: usize) {
            if let Some(ev) = self.script.pop_front() {
                self.pending = Some((ev, self.idle_calls));
            }
        }

        fn service(&mut self) -> Option<BusEvent> {
            if self.stall_forever {
                return None;
            }
            match self.pending.take() {
                Some((ev, 0)) => Some(ev),
                Some((ev, n)) => {
                    self.pending = Some((ev, n - 1));
                    None
                }
                None => None,
            }
        }

        fn take_received(&mut self, buf: &mut [u8]) -> usize {
            let n = self.read_data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.read_data[..n]);
            n
        }
    }

    #[test]
    fn transmit_sets_address_and_completes() {
        let ctrl = ScriptedController::new(vec![BusEvent::Complete]);
        let mut bus = I2cMaster::new(ctrl);
        assert!(bus.transmit(0x68, &[0x0E, 0x04]).is_ok());
        assert_eq!(bus.controller_mut().last_addr, 0x68);
        assert_eq!(bus.controller_mut().written, vec![vec![0x0E, 0x04]]);
        assert!(bus.fault_history().is_empty());
    }

    #[test]
    fn fault_recorded_and_engine_reset() {
        let ctrl = ScriptedController::new(vec![BusEvent::Fault(BusFault::AddressNack)]);
        let mut bus = I2cMaster::new(ctrl);
        assert_eq!(bus.transmit(0x20, &[0x00]), Err(BusFault::AddressNack));
        assert_eq!(bus.fault_history().latest(), Some(BusFault::AddressNack));
        // One reset at transaction start, one after the fault.
        assert_eq!(bus.controller_mut().resets, 2);
    }

    #[test]
    fn stalled_engine_times_out() {
        let mut ctrl = ScriptedController::new(vec![]);
        ctrl.stall_forever = true;
        let mut bus = I2cMaster::new(ctrl);
        assert_eq!(bus.transmit(0x68, &[0x00]), Err(BusFault::Timeout));
        assert_eq!(bus.fault_history().latest(), Some(BusFault::Timeout));
    }

    #[test]
    fn no_retry_after_fault() {
        let ctrl = ScriptedController::new(vec![BusEvent::Fault(BusFault::DataNack)]);
        let mut bus = I2cMaster::new(ctrl);
        let _ = bus.transmit(0x20, &[0x12, 0x34]);
        assert_eq!(
            bus.controller_mut().written.len(),
            1,
            "a failed transaction must not be re-attempted"
        );
    }

    #[test]
    fn receive_copies_engine_data() {
        let mut ctrl = ScriptedController::new(vec![BusEvent::Complete]);
        ctrl.read_data = vec![0xAA, 0x55];
        let mut bus = I2cMaster::new(ctrl);
        let mut buf = [0u8; 2];
        assert!(bus.receive(0x68, &mut buf).is_ok());
        assert_eq!(buf, [0xAA, 0x55]);
    }

    #[test]
    fn short_read_is_a_fault() {
        let mut ctrl = ScriptedController::new(vec![BusEvent::Complete]);
        ctrl.read_data = vec![0xAA];
        let mut bus = I2cMaster::new(ctrl);
        let mut buf = [0u8; 4];
        assert_eq!(bus.receive(0x68, &mut buf), Err(BusFault::DataNack));
    }

    #[test]
    fn gate_is_exclusive() {
        let ctrl = ScriptedController::new(vec![]);
        let mut bus = I2cMaster::new(ctrl);
        assert!(bus.claim());
        assert!(!bus.claim(), "second claim must be denied");
        bus.release();
        assert!(bus.claim());
    }

    #[test]
    fn history_is_bounded() {
        let script = vec![BusEvent::Fault(BusFault::DataNack); FAULT_HISTORY * 2];
        let ctrl = ScriptedController::new(script);
        let mut bus = I2cMaster::new(ctrl);
        for _ in 0..FAULT_HISTORY * 2 {
            let _ = bus.transmit(0x20, &[0]);
        }
        assert_eq!(bus.fault_history().len(), FAULT_HISTORY);
        assert_eq!(bus.fault_history().total(), (FAULT_HISTORY * 2) as u32);
    }
}
