//! HD44780 character LCD driver.
//!
//! The controller has no readable busy path in this design (busy-flag
//! polling is deliberately not used); instead every instruction is
//! followed by its datasheet settle time: >= 2 ms after clear/home,
//! >= 100 us after everything else. Initialisation uses the cold-start
//! sequence of three function-set writes spaced 50 ms / 5 ms / 150 us.
//!
//! The byte path is abstract ([`LcdBus`]); the real display hangs off
//! MCP23017 port B for data with three MCU control lines (RS, R/W, E),
//! which [`ExpanderLcdBus`] composes per call.

use embedded_hal::delay::DelayNs;

use crate::bus::{BusController, I2cMaster};
use crate::drivers::expander::{Mcp23017, PinDirection, Port};
use crate::error::Result;

// Instruction opcodes.
const CMD_CLEAR: u8 = 0x01;
const CMD_HOME: u8 = 0x02;
const CMD_ENTRY_MODE: u8 = 0x04;
const CMD_DISPLAY_CTRL: u8 = 0x08;
const CMD_SHIFT: u8 = 0x10;
const CMD_FUNCTION_SET: u8 = 0x20;
const CMD_SET_CGRAM: u8 = 0x40;
const CMD_SET_DDRAM: u8 = 0x80;

// Entry-mode bits.
const ENTRY_INCREMENT: u8 = 0x02;
const ENTRY_SHIFT: u8 = 0x01;

// Display-control bits.
const DISPLAY_ON: u8 = 0x04;
const CURSOR_ON: u8 = 0x02;
const BLINK_ON: u8 = 0x01;

// Shift bits.
const SHIFT_DISPLAY: u8 = 0x08;
const SHIFT_RIGHT: u8 = 0x04;

// Function-set bits (8-bit interface, 2 lines, 5x8 font).
const FUNC_8BIT: u8 = 0x10;
const FUNC_2LINE: u8 = 0x08;

/// DDRAM address where row 1 starts on a 2-row module.
const ROW1_OFFSET: u8 = 0x40;

// Settle times.
const SETTLE_LONG_MS: u32 = 2;
const SETTLE_SHORT_US: u32 = 100;
const INIT_FIRST_MS: u32 = 50;
const INIT_SECOND_MS: u32 = 5;
const INIT_THIRD_US: u32 = 150;

/// Byte path to the display: one instruction or data byte at a time.
pub trait LcdBus {
    /// Put `byte` on the data bus with RS = `is_data` and strobe E.
    fn write(&mut self, byte: u8, is_data: bool) -> Result<()>;
    /// Read one byte with RS = `is_data` (address counter or data).
    fn read(&mut self, is_data: bool) -> Result<u8>;
}

/// HD44780 driver state: shadows of the two write-only mode registers
/// plus the cursor position.
#[derive(Debug)]
pub struct LcdDriver {
    cols: u8,
    rows: u8,
    display_ctrl: u8,
    entry_mode: u8,
    row: u8,
    col: u8,
}

impl LcdDriver {
    pub fn new(cols: u8, rows: u8) -> Self {
        Self {
            cols,
            rows: rows.clamp(1, 2),
            display_ctrl: CMD_DISPLAY_CTRL,
            entry_mode: CMD_ENTRY_MODE | ENTRY_INCREMENT,
            row: 0,
            col: 0,
        }
    }

    /// Cold-start initialisation into 8-bit / 2-line / 5x8 mode with the
    /// display on, cursor hidden, left-to-right entry.
    pub fn init<B: LcdBus, D: DelayNs>(&mut self, bus: &mut B, delay: &mut D) -> Result<()> {
        delay.delay_ms(INIT_FIRST_MS);
        bus.write(CMD_FUNCTION_SET | FUNC_8BIT, false)?;
        delay.delay_ms(INIT_SECOND_MS);
        bus.write(CMD_FUNCTION_SET | FUNC_8BIT, false)?;
        delay.delay_us(INIT_THIRD_US);
        bus.write(CMD_FUNCTION_SET | FUNC_8BIT, false)?;
        delay.delay_us(SETTLE_SHORT_US);

        self.command(bus, delay, CMD_FUNCTION_SET | FUNC_8BIT | FUNC_2LINE)?;
        self.display_ctrl = CMD_DISPLAY_CTRL;
        self.command(bus, delay, self.display_ctrl)?; // display off
        self.clear(bus, delay)?;
        self.entry_mode = CMD_ENTRY_MODE | ENTRY_INCREMENT;
        self.command(bus, delay, self.entry_mode)?;
        self.display_ctrl |= DISPLAY_ON;
        self.command(bus, delay, self.display_ctrl)
    }

    /// Blank the display and return the cursor home.
    pub fn clear<B: LcdBus, D: DelayNs>(&mut self, bus: &mut B, delay: &mut D) -> Result<()> {
        self.row = 0;
        self.col = 0;
        self.command(bus, delay, CMD_CLEAR)
    }

    /// Return the cursor (and any display shift) home without blanking.
    pub fn home<B: LcdBus, D: DelayNs>(&mut self, bus: &mut B, delay: &mut D) -> Result<()> {
        self.row = 0;
        self.col = 0;
        self.command(bus, delay, CMD_HOME)
    }

    pub fn set_display<B: LcdBus, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        on: bool,
        cursor: bool,
        blink: bool,
    ) -> Result<()> {
        self.display_ctrl = CMD_DISPLAY_CTRL
            | if on { DISPLAY_ON } else { 0 }
            | if cursor { CURSOR_ON } else { 0 }
            | if blink { BLINK_ON } else { 0 };
        self.command(bus, delay, self.display_ctrl)
    }

    pub fn set_entry_mode<B: LcdBus, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        increment: bool,
        shift_display: bool,
    ) -> Result<()> {
        self.entry_mode = CMD_ENTRY_MODE
            | if increment { ENTRY_INCREMENT } else { 0 }
            | if shift_display { ENTRY_SHIFT } else { 0 };
        self.command(bus, delay, self.entry_mode)
    }

    /// Shift the display window (or just the cursor) one position.
    pub fn shift<B: LcdBus, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        display: bool,
        right: bool,
    ) -> Result<()> {
        let cmd = CMD_SHIFT
            | if display { SHIFT_DISPLAY } else { 0 }
            | if right { SHIFT_RIGHT } else { 0 };
        self.command(bus, delay, cmd)
    }

    /// Move the cursor to `row`/`col` (clamped to the geometry).
    pub fn set_cursor<B: LcdBus, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        row: u8,
        col: u8,
    ) -> Result<()> {
        self.row = row.min(self.rows - 1);
        self.col = col.min(self.cols.saturating_sub(1));
        let addr = self.col + if self.row == 1 { ROW1_OFFSET } else { 0 };
        self.command(bus, delay, CMD_SET_DDRAM | addr)
    }

    pub fn write_char<B: LcdBus, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        ch: u8,
    ) -> Result<()> {
        bus.write(ch, true)?;
        delay.delay_us(SETTLE_SHORT_US);
        self.col = self.col.saturating_add(1);
        Ok(())
    }

    pub fn write_str<B: LcdBus, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        s: &str,
    ) -> Result<()> {
        for &b in s.as_bytes() {
            self.write_char(bus, delay, b)?;
        }
        Ok(())
    }

    /// Program one of the eight CGRAM glyph slots (5x8, one row per byte,
    /// low five bits used), then restore the DDRAM cursor.
    pub fn define_glyph<B: LcdBus, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        slot: u8,
        rows: &[u8; 8],
    ) -> Result<()> {
        let slot = slot & 0x07;
        self.command(bus, delay, CMD_SET_CGRAM | (slot << 3))?;
        for &row in rows {
            bus.write(row, true)?;
            delay.delay_us(SETTLE_SHORT_US);
        }
        // Writing CGRAM moved the address counter; put it back.
        let (row, col) = (self.row, self.col);
        self.set_cursor(bus, delay, row, col)
    }

    /// Read the address counter (bit 7 is the busy flag, unused here).
    pub fn read_address<B: LcdBus>(&mut self, bus: &mut B) -> Result<u8> {
        bus.read(false)
    }

    /// Read the DDRAM/CGRAM byte at the address counter.
    pub fn read_data<B: LcdBus>(&mut self, bus: &mut B) -> Result<u8> {
        bus.read(true)
    }

    fn command<B: LcdBus, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        cmd: u8,
    ) -> Result<()> {
        bus.write(cmd, false)?;
        if cmd == CMD_CLEAR || cmd == CMD_HOME {
            delay.delay_ms(SETTLE_LONG_MS);
        } else {
            delay.delay_us(SETTLE_SHORT_US);
        }
        Ok(())
    }
}

/// Control lines the MCU drives directly: register select, read/write,
/// and the E strobe.
pub trait ControlLines {
    fn set_rs(&mut self, high: bool);
    fn set_rw(&mut self, high: bool);
    fn set_enable(&mut self, high: bool);
}

/// E strobe width; the datasheet wants >= 450 ns.
const ENABLE_PULSE_US: u32 = 1;

/// Per-call composition of the real byte path: data over expander port B,
/// control over MCU lines.
pub struct ExpanderLcdBus<'a, C: BusController, L: ControlLines, D: DelayNs> {
    pub expander: &'a mut Mcp23017,
    pub bus: &'a mut I2cMaster<C>,
    pub lines: &'a mut L,
    pub delay: &'a mut D,
}

impl<C: BusController, L: ControlLines, D: DelayNs> ExpanderLcdBus<'_, C, L, D> {
    fn strobe(&mut self) {
        self.lines.set_enable(true);
        self.delay.delay_us(ENABLE_PULSE_US);
        self.lines.set_enable(false);
        self.delay.delay_us(ENABLE_PULSE_US);
    }
}

impl<C: BusController, L: ControlLines, D: DelayNs> LcdBus for ExpanderLcdBus<'_, C, L, D> {
    fn write(&mut self, byte: u8, is_data: bool) -> Result<()> {
        self.lines.set_rs(is_data);
        self.lines.set_rw(false);
        self.expander.write_port(self.bus, Port::B, byte)?;
        self.strobe();
        Ok(())
    }

    fn read(&mut self, is_data: bool) -> Result<u8> {
        self.expander
            .set_port_direction(self.bus, Port::B, PinDirection::Input)?;
        self.lines.set_rs(is_data);
        self.lines.set_rw(true);
        self.lines.set_enable(true);
        self.delay.delay_us(ENABLE_PULSE_US);
        let value = self.expander.read_port(self.bus, Port::B);
        self.lines.set_enable(false);
        self.lines.set_rw(false);
        self.expander
            .set_port_direction(self.bus, Port::B, PinDirection::Output)?;
        value
    }
}
