// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Fixed geometry and timing of the 16-channel sensor.
//!
//! Channels fire in an interleaved order, alternating between the lower and
//! upper half of the field of view, so the vertical angle table is not
//! monotonic. Every firing in a packet is 3.125 µs apart and the packet's
//! capture timestamp corresponds to the last firing.

/// Number of laser channels.
pub const CHANNELS: usize = 16;

/// Data blocks per packet.
pub const BLOCKS_PER_PACKET: usize = 12;

/// Firing slots per data block (two sequences of 16 channels).
pub const FIRINGS_PER_BLOCK: usize = 32;

/// Firings per packet.
pub const FIRINGS_PER_PACKET: usize = BLOCKS_PER_PACKET * FIRINGS_PER_BLOCK;

/// Interval between consecutive firings in seconds (3.125 µs).
pub const FIRING_INTERVAL: f64 = 3.125e-6;

/// Vertical angle of each channel in degrees, indexed by channel id.
pub const VERTICAL_ANGLES: [f64; CHANNELS] = [
    -15.0, 1.0, -13.0, 3.0, -11.0, 5.0, -9.0, 7.0, -7.0, 9.0, -5.0, 11.0, -3.0, 13.0, -1.0, 15.0,
];

/// Time of each firing relative to the packet capture timestamp, in seconds.
///
/// `TIMING_OFFSETS[i] = -3.125 µs * (383 - i)`, so the table increases
/// monotonically and the final entry is exactly zero.
pub const TIMING_OFFSETS: [f64; FIRINGS_PER_PACKET] = timing_offsets();

const fn timing_offsets() -> [f64; FIRINGS_PER_PACKET] {
    let mut offsets = [0.0; FIRINGS_PER_PACKET];
    let mut i = 0;
    while i < FIRINGS_PER_PACKET {
        let steps = (FIRINGS_PER_PACKET - 1 - i) as f64;
        offsets[i] = -3.125 * steps / 1_000_000.0;
        i += 1;
    }
    offsets
}

/// Vertical angle of `channel` in degrees.
#[inline]
pub fn vertical_angle(channel: usize) -> f64 {
    VERTICAL_ANGLES[channel % CHANNELS]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_offsets_endpoints() {
        assert_eq!(TIMING_OFFSETS[FIRINGS_PER_PACKET - 1], 0.0);
        assert!((TIMING_OFFSETS[0] + 383.0 * FIRING_INTERVAL).abs() < 1e-15);
    }

    #[test]
    fn test_timing_offsets_monotonic() {
        for pair in TIMING_OFFSETS.windows(2) {
            assert!(pair[1] > pair[0]);
            assert!((pair[1] - pair[0] - FIRING_INTERVAL).abs() < 1e-12);
        }
    }

    #[test]
    fn test_vertical_angles_interleaved() {
        assert_eq!(vertical_angle(0), -15.0);
        assert_eq!(vertical_angle(1), 1.0);
        assert_eq!(vertical_angle(15), 15.0);
        // Slot 16 starts the second sequence of a block
        assert_eq!(vertical_angle(16), -15.0);

        let mut sorted = VERTICAL_ANGLES;
        sorted.sort_by(f64::total_cmp);
        for pair in sorted.windows(2) {
            assert_eq!(pair[1] - pair[0], 2.0);
        }
    }
}
