// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common LiDAR types shared by the decoder, the frame assembler and the
//! output sinks.
//!
//! A [`Firing`] is one channel's calibrated measurement at one instant. The
//! assembler groups firings into a [`Frame`], one per full sensor rotation.

/// Common error type for LiDAR operations
///
/// Packet-level variants ([`Error::InvalidPacket`], [`Error::BadSentinel`])
/// cause the affected packet to be skipped. Source-level variants
/// ([`Error::Io`], [`Error::Pcap`]) abort the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (capture file, output files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid packet data
    #[error("invalid packet: {0}")]
    InvalidPacket(String),
    /// A data block did not start with the expected sentinel
    #[error("bad sentinel in block {block}: 0x{found:04x}")]
    BadSentinel { block: usize, found: u16 },
    /// Capture container could not be parsed
    #[error("capture error: {0}")]
    Pcap(String),
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
    /// Configuration file could not be parsed
    #[error("configuration file: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    /// Frame timestamp cannot be represented as a calendar time
    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(f64),
}

/// One decoded firing (a single channel return).
///
/// `vertical_angle` and `azimuth` are in degrees, `distance` and the
/// Cartesian coordinates in meters, `timestamp` in seconds since the epoch of
/// the capture clock.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Firing {
    /// Channel (laser) id, 0-15
    pub channel: u8,
    /// Interpolated azimuth in `[0, 360)`
    pub azimuth: f64,
    /// Range in meters; `0.0` marks an invalid return
    pub distance: f64,
    pub intensity: u8,
    pub vertical_angle: f64,
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Firing {
    /// Whether the sensor reported no return for this firing.
    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.distance == 0.0
    }
}

/// Firings collected over one full rotation.
///
/// Frames are produced by [`crate::assembler::FrameAssembler`] and handed to
/// an output sink; the assembler keeps no reference to them afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Frame sequence number, counting from 0
    pub index: u64,
    /// Timestamp of the first firing in seconds
    pub start_timestamp: f64,
    /// Firings in stream order
    pub firings: Vec<Firing>,
}

impl Frame {
    /// Build a frame, taking the start timestamp from the first firing.
    pub fn new(index: u64, firings: Vec<Firing>) -> Self {
        let start_timestamp = firings.first().map_or(0.0, |f| f.timestamp);
        Self {
            index,
            start_timestamp,
            firings,
        }
    }

    /// Number of firings, including invalid returns.
    pub fn len(&self) -> usize {
        self.firings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firings.is_empty()
    }

    /// Iterator over firings with a valid return.
    pub fn valid_firings(&self) -> impl Iterator<Item = &Firing> {
        self.firings.iter().filter(|f| !f.is_invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firing(timestamp: f64, distance: f64) -> Firing {
        Firing {
            timestamp,
            distance,
            ..Default::default()
        }
    }

    #[test]
    fn test_frame_start_timestamp() {
        let frame = Frame::new(3, vec![firing(10.5, 1.0), firing(10.6, 2.0)]);
        assert_eq!(frame.index, 3);
        assert_eq!(frame.start_timestamp, 10.5);
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::new(0, Vec::new());
        assert!(frame.is_empty());
        assert_eq!(frame.start_timestamp, 0.0);
    }

    #[test]
    fn test_valid_firings() {
        let frame = Frame::new(0, vec![firing(1.0, 0.0), firing(2.0, 4.5), firing(3.0, 0.0)]);
        let valid: Vec<_> = frame.valid_firings().collect();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].timestamp, 2.0);
    }

    #[test]
    fn test_error_display() {
        let err = Error::BadSentinel {
            block: 4,
            found: 0x1234,
        };
        assert_eq!(err.to_string(), "bad sentinel in block 4: 0x1234");
        let err = Error::InvalidPacket("too short".to_string());
        assert_eq!(err.to_string(), "invalid packet: too short");
    }
}
