//! 4x4 matrix keypad with count-based debounce.
//!
//! The scan is two-phase: drive the rows and read the columns to find the
//! active column, then swap drive direction to find the active row. A key
//! is only emitted after it has read identically for the full hold count
//! (250 ms at 5 ms scan spacing = 50 consecutive samples); any mismatch
//! restarts the count, and the key must be released before it can fire
//! again (no auto-repeat).

use crate::timebase::elapsed;

/// Key legends, row-major.
pub const KEYMAP: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

/// Raw matrix access. Both methods return a 4-bit mask of lines that read
/// active while the opposite set is driven.
pub trait KeypadPort {
    fn drive_rows_read_cols(&mut self) -> u8;
    fn drive_cols_read_rows(&mut self) -> u8;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyPos {
    row: u8,
    col: u8,
}

/// Debounced keypad scanner.
pub struct Keypad<P: KeypadPort> {
    port: P,
    sample_ms: u32,
    hold_samples: u32,
    last_sample_ms: u32,
    candidate: Option<KeyPos>,
    count: u32,
    emitted: bool,
}

impl<P: KeypadPort> Keypad<P> {
    pub fn new(port: P, sample_ms: u32, hold_samples: u32) -> Self {
        Self {
            port,
            sample_ms: sample_ms.max(1),
            hold_samples: hold_samples.max(1),
            last_sample_ms: 0,
            candidate: None,
            count: 0,
            emitted: false,
        }
    }

    /// Scan if a sample is due; returns a key at most once per press.
    pub fn poll(&mut self, now_ms: u32) -> Option<char> {
        if elapsed(now_ms, self.last_sample_ms) < self.sample_ms {
            return None;
        }
        self.last_sample_ms = now_ms;

        let Some(pos) = self.scan() else {
            // Released: rearm.
            self.candidate = None;
            self.count = 0;
            self.emitted = false;
            return None;
        };

        if self.candidate == Some(pos) {
            self.count += 1;
        } else {
            self.candidate = Some(pos);
            self.count = 1;
            self.emitted = false;
        }

        if self.count >= self.hold_samples && !self.emitted {
            self.emitted = true;
            return Some(KEYMAP[pos.row as usize][pos.col as usize]);
        }
        None
    }

    /// Resolve the pressed key's matrix position, if exactly resolvable.
    fn scan(&mut self) -> Option<KeyPos> {
        let cols = self.port.drive_rows_read_cols() & 0x0F;
        if cols == 0 {
            return None;
        }
        let rows = self.port.drive_cols_read_rows() & 0x0F;
        if rows == 0 {
            return None;
        }
        Some(KeyPos {
            row: rows.trailing_zeros() as u8,
            col: cols.trailing_zeros() as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Matrix stub holding one pressed key (or none).
    struct StubMatrix {
        pressed: Option<(u8, u8)>,
    }

    impl KeypadPort for StubMatrix {
        fn drive_rows_read_cols(&mut self) -> u8 {
            self.pressed.map_or(0, |(_, c)| 1 << c)
        }
        fn drive_cols_read_rows(&mut self) -> u8 {
            self.pressed.map_or(0, |(r, _)| 1 << r)
        }
    }

    const SAMPLE_MS: u32 = 5;
    const HOLD: u32 = 50;

    fn keypad(pressed: Option<(u8, u8)>) -> Keypad<StubMatrix> {
        Keypad::new(StubMatrix { pressed }, SAMPLE_MS, HOLD)
    }

    /// Run `n` due samples, returning the first emitted key.
    fn run(kp: &mut Keypad<StubMatrix>, start_ms: u32, n: u32) -> Option<char> {
        for i in 0..n {
            if let Some(k) = kp.poll(start_ms + (i + 1) * SAMPLE_MS) {
                return Some(k);
            }
        }
        None
    }

    #[test]
    fn emits_after_full_hold_count() {
        let mut kp = keypad(Some((1, 2)));
        assert_eq!(run(&mut kp, 0, HOLD - 1), None, "one sample short of hold");
        assert_eq!(kp.poll(HOLD * SAMPLE_MS), Some('6'));
    }

    #[test]
    fn no_repeat_while_held() {
        let mut kp = keypad(Some((3, 0)));
        assert_eq!(run(&mut kp, 0, HOLD), Some('*'));
        assert_eq!(run(&mut kp, HOLD * SAMPLE_MS, HOLD * 4), None);
    }

    #[test]
    fn release_rearms() {
        let mut kp = keypad(Some((0, 0)));
        assert_eq!(run(&mut kp, 0, HOLD), Some('1'));
        kp.port.pressed = None;
        assert_eq!(kp.poll(HOLD * SAMPLE_MS + SAMPLE_MS), None);
        kp.port.pressed = Some((0, 0));
        assert_eq!(
            run(&mut kp, (HOLD + 1) * SAMPLE_MS, HOLD),
            Some('1'),
            "a fresh press after release fires again"
        );
    }

    #[test]
    fn mismatch_restarts_count() {
        let mut kp = keypad(Some((2, 2)));
        assert_eq!(run(&mut kp, 0, HOLD / 2), None);
        // Bounce to a different key mid-hold.
        kp.port.pressed = Some((2, 3));
        let base = (HOLD / 2) * SAMPLE_MS;
        assert_eq!(
            run(&mut kp, base, HOLD - 1),
            None,
            "count must restart for the new key"
        );
        assert_eq!(kp.poll(base + HOLD * SAMPLE_MS), Some('C'));
    }

    #[test]
    fn samples_are_rate_limited() {
        let mut kp = keypad(Some((1, 1)));
        // Many polls inside one sample window count as a single sample.
        let _ = kp.poll(SAMPLE_MS);
        for _ in 0..1000 {
            assert_eq!(kp.poll(SAMPLE_MS + 1), None);
        }
        assert_eq!(kp.count, 1);
    }

    #[test]
    fn keymap_corners() {
        assert_eq!(KEYMAP[0][0], '1');
        assert_eq!(KEYMAP[0][3], 'A');
        assert_eq!(KEYMAP[3][0], '*');
        assert_eq!(KEYMAP[3][3], 'D');
    }
}
