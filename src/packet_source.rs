// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet source abstraction for offline frame extraction.
//!
//! This module provides a [`PacketSource`] trait that abstracts where sensor
//! packets come from, enabling:
//!
//! - **Pcap replay**: Reading from pcap files (with feature flag)
//! - **Testing**: Replaying pre-built packets
//!
//! # Example
//!
//! ```
//! use edgefirst_lidarframes::packet_source::{PacketSource, TestSource};
//!
//! let mut source = TestSource::new(vec![(0.0, vec![1, 2, 3]), (0.1, vec![4, 5])]);
//! assert_eq!(source.len(), 2);
//!
//! while let Some(packet) = source.recv().unwrap() {
//!     println!("{:.3}: {} bytes", packet.timestamp, packet.payload.len());
//! }
//! ```

use crate::lidar::Error;

/// One captured UDP payload with its capture time.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedPacket {
    /// Capture timestamp in seconds since the Unix epoch
    pub timestamp: f64,
    /// UDP payload
    pub payload: Vec<u8>,
}

/// Trait for packet sources.
///
/// Sources yield packets already filtered to the sensor's data port, in
/// capture order.
pub trait PacketSource: Send {
    /// Receive the next packet.
    ///
    /// # Returns
    /// - `Ok(Some(packet))` - Next packet in capture order
    /// - `Ok(None)` - Source exhausted
    /// - `Err` - I/O or source error
    fn recv(&mut self) -> Result<Option<CapturedPacket>, Error>;

    /// Total number of packets in the source.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Test packet source for unit testing.
///
/// Provides a sequence of pre-defined packets for exercising the pipeline
/// without a capture file.
pub struct TestSource {
    packets: Vec<CapturedPacket>,
    index: usize,
}

impl TestSource {
    /// Create a new test source from `(timestamp, payload)` pairs.
    pub fn new(packets: Vec<(f64, Vec<u8>)>) -> Self {
        let packets = packets
            .into_iter()
            .map(|(timestamp, payload)| CapturedPacket { timestamp, payload })
            .collect();
        Self { packets, index: 0 }
    }
}

impl PacketSource for TestSource {
    fn recv(&mut self) -> Result<Option<CapturedPacket>, Error> {
        let packet = self.packets.get(self.index).cloned();
        if packet.is_some() {
            self.index += 1;
        }
        Ok(packet)
    }

    fn len(&self) -> usize {
        self.packets.len()
    }
}
