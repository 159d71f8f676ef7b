//! MCP23017 16-bit I/O expander driver.
//!
//! Keeps a full shadow copy of the 22 device registers and never lets it
//! disagree with the last acknowledged device write: writes update the
//! shadow FIRST, and a NACKed transmit rolls the shadow back before the
//! error is surfaced.
//!
//! The device has two register-address layouts selected by IOCON.BANK:
//! bank 0 interleaves the A/B pairs (0x00..=0x15), bank 1 splits them into
//! an A block (0x00..=0x0A) and a B block (0x10..=0x1A). The driver
//! recomputes its address map whenever a configure call flips the bit.
//!
//! All writes are 2-byte frames `[reg, val]`; sequential-mode multi-byte
//! access is never relied upon.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::bus::{BusController, I2cMaster};
use crate::error::{BusFault, Error, Result};

/// Base device address; hardware pins A2..A0 form the low three bits.
const BASE_ADDR: u8 = 0x20;

/// Reset pulse width (datasheet minimum is 1 us).
const RESET_PULSE_US: u32 = 10;

/// IOCON option bits.
pub mod iocon {
    /// Register layout select (bank 1 splits the A/B blocks).
    pub const BANK: u8 = 1 << 7;
    /// Mirror the two interrupt outputs.
    pub const MIRROR: u8 = 1 << 6;
    /// Disable sequential address auto-increment.
    pub const SEQOP: u8 = 1 << 5;
    /// Disable SDA slew-rate control.
    pub const DISSLW: u8 = 1 << 4;
    /// Hardware address enable. Always set by this driver.
    pub const HAEN: u8 = 1 << 3;
    /// Open-drain interrupt outputs.
    pub const ODR: u8 = 1 << 2;
    /// Interrupt output polarity (active high).
    pub const INTPOL: u8 = 1 << 1;
}

/// GPIO port selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    A,
    B,
}

/// Pin direction for [`Mcp23017::set_pin_direction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
}

/// The 22 device registers, in shadow-file order.
///
/// IOCON is addressable at two locations; both appear here so the shadow
/// file maps one-to-one onto the device address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Reg {
    IodirA,
    IodirB,
    IpolA,
    IpolB,
    GpintenA,
    GpintenB,
    DefvalA,
    DefvalB,
    IntconA,
    IntconB,
    Iocon,
    IoconAlt,
    GppuA,
    GppuB,
    IntfA,
    IntfB,
    IntcapA,
    IntcapB,
    GpioA,
    GpioB,
    OlatA,
    OlatB,
}

/// Number of device registers (and shadow slots).
pub const REG_COUNT: usize = 22;

impl Reg {
    pub const ALL: [Reg; REG_COUNT] = [
        Reg::IodirA,
        Reg::IodirB,
        Reg::IpolA,
        Reg::IpolB,
        Reg::GpintenA,
        Reg::GpintenB,
        Reg::DefvalA,
        Reg::DefvalB,
        Reg::IntconA,
        Reg::IntconB,
        Reg::Iocon,
        Reg::IoconAlt,
        Reg::GppuA,
        Reg::GppuB,
        Reg::IntfA,
        Reg::IntfB,
        Reg::IntcapA,
        Reg::IntcapB,
        Reg::GpioA,
        Reg::GpioB,
        Reg::OlatA,
        Reg::OlatB,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn for_port(port: Port, a: Reg, b: Reg) -> Reg {
        match port {
            Port::A => a,
            Port::B => b,
        }
    }
}

/// MCP23017 driver with a write-through shadow register file.
#[derive(Debug)]
pub struct Mcp23017 {
    addr: u8,
    shadow: [u8; REG_COUNT],
    reg_addr: [u8; REG_COUNT],
    bank: bool,
}

impl Mcp23017 {
    /// `addr_pins` is the state of the A2..A0 straps (values above 7 are
    /// clamped to the three address bits).
    pub fn new(addr_pins: u8) -> Self {
        let mut dev = Self {
            addr: BASE_ADDR | (addr_pins & 0x07),
            shadow: [0; REG_COUNT],
            reg_addr: [0; REG_COUNT],
            bank: false,
        };
        dev.load_power_on_defaults();
        dev.rebuild_addr_map();
        dev
    }

    /// 7-bit bus address.
    pub fn address(&self) -> u8 {
        self.addr
    }

    /// Shadow copy of `reg` (the last acknowledged device state).
    pub fn shadow(&self, reg: Reg) -> u8 {
        self.shadow[reg.index()]
    }

    /// Pulse the reset line and reload the power-on register defaults.
    pub fn reset<P: OutputPin, D: DelayNs>(&mut self, pin: &mut P, delay: &mut D) -> Result<()> {
        pin.set_low().map_err(|_| Error::Init("expander reset line"))?;
        delay.delay_us(RESET_PULSE_US);
        pin.set_high().map_err(|_| Error::Init("expander reset line"))?;
        self.load_power_on_defaults();
        self.bank = false;
        self.rebuild_addr_map();
        Ok(())
    }

    /// Write IOCON with the caller's option bits. HAEN is always added so
    /// the address straps stay honoured. Flipping BANK remaps every
    /// register address for subsequent operations.
    pub fn configure<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        options: u8,
    ) -> Result<()> {
        let value = options | iocon::HAEN;
        self.write_reg(bus, Reg::Iocon, value)?;
        // The device keeps one IOCON; mirror the alias slot.
        self.shadow[Reg::IoconAlt.index()] = value;
        let bank = value & iocon::BANK != 0;
        if bank != self.bank {
            self.bank = bank;
            self.rebuild_addr_map();
        }
        Ok(())
    }

    /// Optimistic-update register write: shadow first, roll back on a
    /// transport fault.
    pub fn write_reg<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        reg: Reg,
        value: u8,
    ) -> Result<()> {
        let i = reg.index();
        let prev = self.shadow[i];
        self.shadow[i] = value;
        if let Err(fault) = bus.transmit(self.addr, &[self.reg_addr[i], value]) {
            self.shadow[i] = prev;
            return Err(fault.into());
        }
        Ok(())
    }

    /// Read one register and refresh its shadow slot. Holds the command
    /// gate across the pointer-write / read pair.
    pub fn read_reg<C: BusController>(&mut self, bus: &mut I2cMaster<C>, reg: Reg) -> Result<u8> {
        if !bus.claim() {
            return Err(BusFault::Busy.into());
        }
        let result = self.read_reg_inner(bus, reg);
        bus.release();
        result
    }

    fn read_reg_inner<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        reg: Reg,
    ) -> Result<u8> {
        let i = reg.index();
        bus.transmit(self.addr, &[self.reg_addr[i]])?;
        let mut buf = [0u8; 1];
        bus.receive(self.addr, &mut buf)?;
        self.shadow[i] = buf[0];
        Ok(buf[0])
    }

    /// Refresh the entire shadow file from the device.
    pub fn read_all<C: BusController>(&mut self, bus: &mut I2cMaster<C>) -> Result<()> {
        for reg in Reg::ALL {
            self.read_reg(bus, reg)?;
        }
        Ok(())
    }

    // ── pin / port helpers ────────────────────────────────────────

    pub fn set_pin_direction<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        port: Port,
        pin: u8,
        dir: PinDirection,
    ) -> Result<()> {
        let reg = Reg::for_port(port, Reg::IodirA, Reg::IodirB);
        let value = match dir {
            // IODIR: 1 = input, 0 = output.
            PinDirection::Input => self.shadow(reg) | (1 << (pin & 0x07)),
            PinDirection::Output => self.shadow(reg) & !(1 << (pin & 0x07)),
        };
        self.write_reg(bus, reg, value)
    }

    pub fn set_port_direction<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        port: Port,
        dir: PinDirection,
    ) -> Result<()> {
        let reg = Reg::for_port(port, Reg::IodirA, Reg::IodirB);
        let value = match dir {
            PinDirection::Input => 0xFF,
            PinDirection::Output => 0x00,
        };
        self.write_reg(bus, reg, value)
    }

    pub fn set_pin_pullup<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        port: Port,
        pin: u8,
        enabled: bool,
    ) -> Result<()> {
        let reg = Reg::for_port(port, Reg::GppuA, Reg::GppuB);
        let value = if enabled {
            self.shadow(reg) | (1 << (pin & 0x07))
        } else {
            self.shadow(reg) & !(1 << (pin & 0x07))
        };
        self.write_reg(bus, reg, value)
    }

    /// Drive one output pin, leaving the rest of the latch untouched.
    pub fn set_pin_level<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        port: Port,
        pin: u8,
        high: bool,
    ) -> Result<()> {
        let olat = Reg::for_port(port, Reg::OlatA, Reg::OlatB);
        let value = if high {
            self.shadow(olat) | (1 << (pin & 0x07))
        } else {
            self.shadow(olat) & !(1 << (pin & 0x07))
        };
        self.write_port(bus, port, value)
    }

    /// Invert (or restore) one input pin's read polarity via IPOL.
    pub fn set_pin_polarity<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        port: Port,
        pin: u8,
        inverted: bool,
    ) -> Result<()> {
        let reg = Reg::for_port(port, Reg::IpolA, Reg::IpolB);
        let value = if inverted {
            self.shadow(reg) | (1 << (pin & 0x07))
        } else {
            self.shadow(reg) & !(1 << (pin & 0x07))
        };
        self.write_reg(bus, reg, value)
    }

    /// Drive a whole output port (writes through to OLAT).
    pub fn write_port<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        port: Port,
        value: u8,
    ) -> Result<()> {
        let reg = Reg::for_port(port, Reg::GpioA, Reg::GpioB);
        self.write_reg(bus, reg, value)?;
        // A GPIO write lands in the output latch.
        let olat = Reg::for_port(port, Reg::OlatA, Reg::OlatB);
        self.shadow[olat.index()] = value;
        Ok(())
    }

    /// Sample a whole input port.
    pub fn read_port<C: BusController>(
        &mut self,
        bus: &mut I2cMaster<C>,
        port: Port,
    ) -> Result<u8> {
        let reg = Reg::for_port(port, Reg::GpioA, Reg::GpioB);
        self.read_reg(bus, reg)
    }

    fn load_power_on_defaults(&mut self) {
        self.shadow = [0; REG_COUNT];
        // All pins come up as inputs.
        self.shadow[Reg::IodirA.index()] = 0xFF;
        self.shadow[Reg::IodirB.index()] = 0xFF;
    }

    fn rebuild_addr_map(&mut self) {
        for reg in Reg::ALL {
            let i = reg.index();
            let pair = (i / 2) as u8; // register family, 0..=10
            let is_b = (i % 2) as u8; // 0 = A side, 1 = B side
            self.reg_addr[i] = if self.bank {
                // Bank 1: A block at 0x00, B block at 0x10.
                pair | (is_b << 4)
            } else {
                // Bank 0: interleaved A/B pairs.
                pair * 2 + is_b
            };
        }
    }
}
