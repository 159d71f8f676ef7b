//! Simulated I2C board for integration tests.
//!
//! One [`BusController`] carrying both bus devices: the DS3231 register
//! file at 0x68 and the MCP23017 register file at 0x20 (bank 0
//! addressing). Writes land in the register files with auto-increment,
//! reads serve from the current pointer, and a single fault can be
//! queued for injection on the next operation.

use deskclock::bus::{BusController, BusEvent};
use deskclock::error::BusFault;

pub const RTC_ADDR: u8 = 0x68;
pub const EXPANDER_ADDR: u8 = 0x20;

pub const RTC_REGS: usize = 19;
pub const EXPANDER_REGS: usize = 22;

pub struct MockBoard {
    pub rtc_regs: [u8; RTC_REGS],
    pub expander_regs: [u8; EXPANDER_REGS],
    addr: u8,
    rtc_pointer: usize,
    exp_pointer: usize,
    read_len: usize,
    pending: Option<BusEvent>,
    /// Injected on the next started operation, then cleared.
    pub fail_next: Option<BusFault>,
    pub writes: u32,
    pub resets: u32,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self {
            rtc_regs: [0; RTC_REGS],
            expander_regs: [0; EXPANDER_REGS],
            addr: 0,
            rtc_pointer: 0,
            exp_pointer: 0,
            read_len: 0,
            pending: None,
            fail_next: None,
            writes: 0,
            resets: 0,
        }
    }

    /// Load BCD time registers in one call (sec..year order).
    pub fn load_time(&mut self, time: &[u8; 7]) {
        self.rtc_regs[..7].copy_from_slice(time);
    }

    fn take_injected(&mut self) -> Option<BusEvent> {
        self.fail_next.take().map(BusEvent::Fault)
    }
}

impl BusController for MockBoard {
    fn set_address(&mut self, addr: u8) {
        self.addr = addr;
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.pending = None;
    }

    fn start_write(&mut self, bytes: &[u8]) {
        self.writes += 1;
        if let Some(fault) = self.take_injected() {
            self.pending = Some(fault);
            return;
        }
        let Some((&reg, data)) = bytes.split_first() else {
            self.pending = Some(BusEvent::Complete);
            return;
        };
        match self.addr {
            RTC_ADDR => {
                self.rtc_pointer = reg as usize;
                for &b in data {
                    if self.rtc_pointer < RTC_REGS {
                        self.rtc_regs[self.rtc_pointer] = b;
                    }
                    self.rtc_pointer = (self.rtc_pointer + 1) % RTC_REGS;
                }
                self.rtc_pointer = reg as usize;
            }
            EXPANDER_ADDR => {
                self.exp_pointer = reg as usize;
                for &b in data {
                    if self.exp_pointer < EXPANDER_REGS {
                        self.expander_regs[self.exp_pointer] = b;
                    }
                    self.exp_pointer += 1;
                }
                self.exp_pointer = reg as usize;
            }
            _ => {
                self.pending = Some(BusEvent::Fault(BusFault::AddressNack));
                return;
            }
        }
        self.pending = Some(BusEvent::Complete);
    }

    fn start_read(&mut self, len: usize) {
        if let Some(fault) = self.take_injected() {
            self.pending = Some(fault);
            return;
        }
        self.read_len = len;
        self.pending = Some(BusEvent::Complete);
    }

    fn service(&mut self) -> Option<BusEvent> {
        self.pending.take()
    }

    fn take_received(&mut self, buf: &mut [u8]) -> usize {
        let n = self.read_len.min(buf.len());
        for (i, b) in buf[..n].iter_mut().enumerate() {
            *b = match self.addr {
                RTC_ADDR => self.rtc_regs[(self.rtc_pointer + i) % RTC_REGS],
                EXPANDER_ADDR => {
                    let idx = self.exp_pointer + i;
                    if idx < EXPANDER_REGS {
                        self.expander_regs[idx]
                    } else {
                        0
                    }
                }
                _ => 0,
            };
        }
        n
    }
}
