//! Fuzz target: `dht11::parse_frame`
//!
//! Feeds arbitrary 5-byte frames into the sensor frame parser and
//! asserts the checksum law: a frame is accepted exactly when its fifth
//! byte equals the wrapping sum of the first four, and an accepted frame
//! reports exactly bytes 0 and 2.
//!
//! cargo fuzz run fuzz_dht_frame

#![no_main]

use deskclock::sensors::dht11::parse_frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }
    let frame = [data[0], data[1], data[2], data[3], data[4]];
    let sum = frame[..4].iter().fold(0u8, |a, &b| a.wrapping_add(b));

    match parse_frame(&frame) {
        Ok(reading) => {
            assert_eq!(sum, frame[4], "accepted frame must satisfy the checksum");
            assert_eq!(reading.humidity_pct, frame[0]);
            assert_eq!(reading.temperature_c, frame[2]);
        }
        Err(_) => {
            assert_ne!(sum, frame[4], "valid checksum must not be rejected");
        }
    }
});
