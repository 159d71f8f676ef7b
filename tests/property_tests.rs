//! Property tests for the core encodings and data structures.
//!
//! Runs on host (x86_64) only — proptest is not available for ESP32
//! targets.

#![cfg(not(target_os = "espidf"))]

use deskclock::diagnostics::FaultLog;
use deskclock::error::BusFault;
use deskclock::rtc::alarm::{Alarm1Match, Alarm2Match, AlarmTime, encode_alarm1, encode_alarm2};
use deskclock::rtc::regs::{pack_bcd, unpack_bcd};
use deskclock::timebase::elapsed;
use proptest::prelude::*;

// ── BCD ───────────────────────────────────────────────────────

proptest! {
    /// pack/unpack invert each other over the full two-digit range.
    #[test]
    fn bcd_round_trip(v in 0u8..=99) {
        prop_assert_eq!(unpack_bcd(pack_bcd(v)), v);
    }

    /// Each nibble of a packed value is a single decimal digit.
    #[test]
    fn bcd_nibbles_are_decimal_digits(v in 0u8..=99) {
        let packed = pack_bcd(v);
        prop_assert!(packed >> 4 <= 9);
        prop_assert!(packed & 0x0F <= 9);
        prop_assert_eq!(u32::from(packed >> 4), u32::from(v) / 10);
    }
}

// ── alarm encoding ────────────────────────────────────────────

fn alarm1_conditions() -> impl Strategy<Value = Alarm1Match> {
    prop_oneof![
        Just(Alarm1Match::OncePerSecond),
        Just(Alarm1Match::SecondsMatch),
        Just(Alarm1Match::MinutesSecondsMatch),
        Just(Alarm1Match::HoursMinutesSecondsMatch),
        Just(Alarm1Match::DayHmsMatch),
        Just(Alarm1Match::DateHmsMatch),
    ]
}

/// Condition plus a day-or-date value drawn from that condition's valid
/// range (day-of-week 1-7, day-of-month 1-31).
fn alarm1_condition_with_dom() -> impl Strategy<Value = (Alarm1Match, u8)> {
    alarm1_conditions().prop_flat_map(|cond| {
        let dom = if cond == Alarm1Match::DayHmsMatch {
            1u8..=7
        } else {
            1u8..=31
        };
        dom.prop_map(move |d| (cond, d))
    })
}

fn alarm2_conditions() -> impl Strategy<Value = Alarm2Match> {
    prop_oneof![
        Just(Alarm2Match::OncePerMinute),
        Just(Alarm2Match::MinutesMatch),
        Just(Alarm2Match::HoursMinutesMatch),
        Just(Alarm2Match::DayHmMatch),
        Just(Alarm2Match::DateHmMatch),
    ]
}

fn alarm2_condition_with_dom() -> impl Strategy<Value = (Alarm2Match, u8)> {
    alarm2_conditions().prop_flat_map(|cond| {
        let dom = if cond == Alarm2Match::DayHmMatch {
            1u8..=7
        } else {
            1u8..=31
        };
        dom.prop_map(move |d| (cond, d))
    })
}

/// Expected (M1, M2, M3, M4, DY) bits per alarm 1 condition.
fn alarm1_expected(cond: Alarm1Match) -> (bool, bool, bool, bool, bool) {
    match cond {
        Alarm1Match::OncePerSecond => (true, true, true, true, false),
        Alarm1Match::SecondsMatch => (false, true, true, true, false),
        Alarm1Match::MinutesSecondsMatch => (false, false, true, true, false),
        Alarm1Match::HoursMinutesSecondsMatch => (false, false, false, true, false),
        Alarm1Match::DayHmsMatch => (false, false, false, false, true),
        Alarm1Match::DateHmsMatch => (false, false, false, false, false),
    }
}

proptest! {
    /// Mask bits land exactly where the condition table says, and the
    /// remaining bits stay pure BCD.
    #[test]
    fn alarm1_mask_bits_follow_the_condition(
        seconds in 0u8..=59,
        minutes in 0u8..=59,
        hours in 0u8..=23,
        (cond, dom) in alarm1_condition_with_dom(),
    ) {
        let when = AlarmTime { seconds, minutes, hours, day_or_date: dom };
        let bytes = encode_alarm1(&when, cond).unwrap();
        let (m1, m2, m3, m4, dy) = alarm1_expected(cond);

        prop_assert_eq!(bytes[0] & 0x80 != 0, m1);
        prop_assert_eq!(bytes[1] & 0x80 != 0, m2);
        prop_assert_eq!(bytes[2] & 0x80 != 0, m3);
        prop_assert_eq!(bytes[3] & 0x80 != 0, m4);
        prop_assert_eq!(bytes[3] & 0x40 != 0, dy);

        prop_assert_eq!(unpack_bcd(bytes[0] & 0x7F), seconds);
        prop_assert_eq!(unpack_bcd(bytes[1] & 0x7F), minutes);
        prop_assert_eq!(unpack_bcd(bytes[2] & 0x7F), hours);
        prop_assert_eq!(unpack_bcd(bytes[3] & 0x3F), dom);
    }

    #[test]
    fn alarm2_has_no_seconds_byte_and_masks_line_up(
        minutes in 0u8..=59,
        hours in 0u8..=23,
        (cond, dom) in alarm2_condition_with_dom(),
    ) {
        let when = AlarmTime { seconds: 0, minutes, hours, day_or_date: dom };
        let bytes = encode_alarm2(&when, cond).unwrap();
        let (m2, m3, m4, dy) = match cond {
            Alarm2Match::OncePerMinute => (true, true, true, false),
            Alarm2Match::MinutesMatch => (false, true, true, false),
            Alarm2Match::HoursMinutesMatch => (false, false, true, false),
            Alarm2Match::DayHmMatch => (false, false, false, true),
            Alarm2Match::DateHmMatch => (false, false, false, false),
        };
        prop_assert_eq!(bytes[0] & 0x80 != 0, m2);
        prop_assert_eq!(bytes[1] & 0x80 != 0, m3);
        prop_assert_eq!(bytes[2] & 0x80 != 0, m4);
        prop_assert_eq!(bytes[2] & 0x40 != 0, dy);
        prop_assert_eq!(unpack_bcd(bytes[0] & 0x7F), minutes);
        prop_assert_eq!(unpack_bcd(bytes[1] & 0x7F), hours);
    }

    /// Any out-of-range field is rejected before encoding.
    #[test]
    fn alarm1_rejects_out_of_range_seconds(
        seconds in 60u8..=99,
        cond in alarm1_conditions(),
    ) {
        let when = AlarmTime { seconds, minutes: 0, hours: 0, day_or_date: 1 };
        prop_assert!(encode_alarm1(&when, cond).is_err());
    }

    /// A day-of-week match only accepts 1-7 in the day-date field.
    #[test]
    fn day_of_week_conditions_reject_dates(dom in 8u8..=31) {
        let when = AlarmTime { seconds: 0, minutes: 0, hours: 0, day_or_date: dom };
        prop_assert!(encode_alarm1(&when, Alarm1Match::DayHmsMatch).is_err());
        prop_assert!(encode_alarm2(&when, Alarm2Match::DayHmMatch).is_err());
    }
}

// ── fault ledger ──────────────────────────────────────────────

fn any_fault() -> impl Strategy<Value = BusFault> {
    prop_oneof![
        Just(BusFault::Busy),
        Just(BusFault::WriteCollision),
        Just(BusFault::AddressNack),
        Just(BusFault::DataNack),
        Just(BusFault::Timeout),
    ]
}

proptest! {
    /// The ring never outgrows its capacity, keeps the newest entries,
    /// and the lifetime counter tracks every record.
    #[test]
    fn fault_log_is_bounded_and_keeps_newest(
        faults in proptest::collection::vec(any_fault(), 0..100),
    ) {
        let mut log: FaultLog<BusFault, 8> = FaultLog::new();
        for &f in &faults {
            log.record(f);
        }
        prop_assert!(log.len() <= 8);
        prop_assert_eq!(log.total(), faults.len() as u32);
        prop_assert_eq!(log.latest(), faults.last().copied());

        let kept: Vec<_> = log.iter().copied().collect();
        let expect: Vec<_> = faults
            .iter()
            .copied()
            .skip(faults.len().saturating_sub(8))
            .collect();
        prop_assert_eq!(kept, expect);
    }
}

// ── wraparound time ───────────────────────────────────────────

proptest! {
    /// elapsed() is exact for any start point and any delta, including
    /// across the u32 wrap.
    #[test]
    fn elapsed_is_wraparound_exact(start: u32, delta: u32) {
        prop_assert_eq!(elapsed(start.wrapping_add(delta), start), delta);
    }
}
