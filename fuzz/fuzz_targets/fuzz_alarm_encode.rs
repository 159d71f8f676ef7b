//! Fuzz target: alarm register encoding
//!
//! Drives arbitrary field values through both alarm encoders and asserts
//! that every accepted encoding stays within the device's BCD field
//! widths and that out-of-range inputs are always rejected.
//!
//! cargo fuzz run fuzz_alarm_encode

#![no_main]

use deskclock::rtc::alarm::{Alarm1Match, Alarm2Match, AlarmTime, encode_alarm1, encode_alarm2};
use libfuzzer_sys::fuzz_target;

const A1: [Alarm1Match; 6] = [
    Alarm1Match::OncePerSecond,
    Alarm1Match::SecondsMatch,
    Alarm1Match::MinutesSecondsMatch,
    Alarm1Match::HoursMinutesSecondsMatch,
    Alarm1Match::DayHmsMatch,
    Alarm1Match::DateHmsMatch,
];

const A2: [Alarm2Match; 5] = [
    Alarm2Match::OncePerMinute,
    Alarm2Match::MinutesMatch,
    Alarm2Match::HoursMinutesMatch,
    Alarm2Match::DayHmMatch,
    Alarm2Match::DateHmMatch,
];

fn in_range(when: &AlarmTime, day_of_week: bool) -> bool {
    let day_ok = if day_of_week {
        (1..=7).contains(&when.day_or_date)
    } else {
        (1..=31).contains(&when.day_or_date)
    };
    when.seconds <= 59 && when.minutes <= 59 && when.hours <= 23 && day_ok
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }
    let when = AlarmTime {
        seconds: data[0],
        minutes: data[1],
        hours: data[2],
        day_or_date: data[3],
    };

    let cond1 = A1[usize::from(data[4]) % A1.len()];
    match encode_alarm1(&when, cond1) {
        Ok(bytes) => {
            assert!(in_range(&when, cond1 == Alarm1Match::DayHmsMatch));
            // Strip mask and selector bits: what remains must be BCD.
            assert!(bytes[0] & 0x7F <= 0x59);
            assert!(bytes[1] & 0x7F <= 0x59);
            assert!(bytes[2] & 0x7F <= 0x23);
            assert!(bytes[3] & 0x3F <= 0x31);
        }
        Err(_) => assert!(!in_range(&when, cond1 == Alarm1Match::DayHmsMatch)),
    }

    let cond2 = A2[usize::from(data[4]) % A2.len()];
    let when2 = AlarmTime { seconds: 0, ..when };
    match encode_alarm2(&when2, cond2) {
        Ok(bytes) => {
            assert!(in_range(&when2, cond2 == Alarm2Match::DayHmMatch));
            assert!(bytes[0] & 0x7F <= 0x59);
            assert!(bytes[1] & 0x7F <= 0x23);
            assert!(bytes[2] & 0x3F <= 0x31);
        }
        Err(_) => assert!(!in_range(&when2, cond2 == Alarm2Match::DayHmMatch)),
    }
});
