// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! PCAP file packet source for offline frame extraction.
//!
//! This module provides [`PcapSource`], a [`PacketSource`] implementation that
//! reads UDP packets and their capture timestamps from PCAP/PCAPNG files.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_lidarframes::PcapSource;
//! use edgefirst_lidarframes::packet_source::PacketSource;
//!
//! // Load PCAP file, keeping packets sent to the data port
//! let mut source = PcapSource::from_file("sensor_data.pcap", Some(2368))?;
//!
//! while let Some(packet) = source.recv()? {
//!     // Decode packet.payload captured at packet.timestamp
//! }
//! ```

use crate::{
    lidar::Error,
    packet_source::{CapturedPacket, PacketSource},
};
use pcap_parser::traits::PcapReaderIterator;
use std::path::Path;
use tracing::{debug, warn};

/// Default pcapng timestamp resolution exponent (microseconds).
const DEFAULT_TSRESOL: u8 = 6;

/// PCAP file packet source.
///
/// Loads the entire PCAP file into memory and provides packets via the
/// [`PacketSource`] trait. Supports both legacy PCAP (micro- and nanosecond
/// timestamps) and PCAPNG formats.
pub struct PcapSource {
    /// Pre-extracted UDP payloads
    packets: Vec<CapturedPacket>,
    /// Current packet index
    index: usize,
}

impl PcapSource {
    /// Load PCAP file from disk, optionally filtering by destination port.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to PCAP or PCAPNG file
    /// * `port` - Optional destination port filter
    ///
    /// # Returns
    ///
    /// `PcapSource` with extracted UDP packets, or error on parse failure.
    pub fn from_file<P: AsRef<Path>>(path: P, port: Option<u16>) -> Result<Self, Error> {
        let data = std::fs::read(path.as_ref()).map_err(Error::Io)?;
        Self::from_bytes(&data, port)
    }

    /// Load PCAP from bytes, optionally filtering by destination port.
    ///
    /// # Arguments
    ///
    /// * `data` - Raw PCAP/PCAPNG file contents
    /// * `port` - Optional destination port filter
    pub fn from_bytes(data: &[u8], port: Option<u16>) -> Result<Self, Error> {
        let packets = Self::extract_packets(data, port)?;
        debug!(packets = packets.len(), ?port, "loaded capture");
        Ok(Self { packets, index: 0 })
    }

    /// Extract UDP packets from PCAP data.
    fn extract_packets(data: &[u8], port: Option<u16>) -> Result<Vec<CapturedPacket>, Error> {
        let mut packets = Vec::new();

        // Try PCAPNG first, then legacy PCAP
        if data.len() >= 4 && data[0..4] == [0x0a, 0x0d, 0x0d, 0x0a] {
            // PCAPNG format (Section Header Block magic)
            Self::extract_pcapng(data, port, &mut packets)?;
        } else {
            Self::extract_legacy_pcap(data, port, &mut packets)?;
        }

        Ok(packets)
    }

    /// Extract packets from legacy PCAP format.
    fn extract_legacy_pcap(
        data: &[u8],
        port: Option<u16>,
        packets: &mut Vec<CapturedPacket>,
    ) -> Result<(), Error> {
        use pcap_parser::*;

        // Buffer size must be at least as large as the data to avoid Incomplete errors
        let mut reader = LegacyPcapReader::new(data.len().max(65536), data)
            .map_err(|e| Error::Pcap(format!("failed to create PCAP reader: {:?}", e)))?;
        let mut subsec_scale = 1e-6;

        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    match block {
                        PcapBlockOwned::Legacy(packet) => {
                            let timestamp =
                                packet.ts_sec as f64 + packet.ts_usec as f64 * subsec_scale;
                            if let Some(payload) = Self::extract_udp_payload(packet.data, port) {
                                packets.push(CapturedPacket { timestamp, payload });
                            }
                        }
                        PcapBlockOwned::LegacyHeader(header) => {
                            if header.is_nanosecond_precision() {
                                subsec_scale = 1e-9;
                            }
                        }
                        _ => {}
                    }
                    reader.consume(offset);
                }
                Err(PcapError::Eof) => break,
                Err(PcapError::Incomplete(_) | PcapError::UnexpectedEof) => {
                    // Truncated trailing record; everything before it is kept
                    warn!(packets = packets.len(), "capture truncated, ignoring partial record");
                    break;
                }
                Err(e) => {
                    return Err(Error::Pcap(format!("PCAP parse error: {:?}", e)));
                }
            }
        }

        Ok(())
    }

    /// Extract packets from PCAPNG format.
    fn extract_pcapng(
        data: &[u8],
        port: Option<u16>,
        packets: &mut Vec<CapturedPacket>,
    ) -> Result<(), Error> {
        use pcap_parser::*;

        let mut reader = PcapNGReader::new(data.len().max(65536), data)
            .map_err(|e| Error::Pcap(format!("failed to create PCAPNG reader: {:?}", e)))?;

        // Timestamp resolution and offset per interface, in IDB order
        let mut interfaces: Vec<(f64, f64)> = Vec::new();
        let mut last_timestamp = 0.0;

        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    match block {
                        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                            // Interface ids restart in every section
                            interfaces.clear();
                        }
                        PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                            interfaces.push((
                                ticks_per_second(idb.if_tsresol),
                                idb.if_tsoffset as f64,
                            ));
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                            let (resolution, ts_offset) = interfaces
                                .get(epb.if_id as usize)
                                .copied()
                                .unwrap_or((ticks_per_second(DEFAULT_TSRESOL), 0.0));
                            let ticks = ((epb.ts_high as u64) << 32) | epb.ts_low as u64;
                            let timestamp = ticks as f64 / resolution + ts_offset;
                            last_timestamp = timestamp;
                            if let Some(payload) = Self::extract_udp_payload(epb.data, port) {
                                packets.push(CapturedPacket { timestamp, payload });
                            }
                        }
                        PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                            // Simple packets carry no timestamp
                            if let Some(payload) = Self::extract_udp_payload(spb.data, port) {
                                packets.push(CapturedPacket {
                                    timestamp: last_timestamp,
                                    payload,
                                });
                            }
                        }
                        _ => {}
                    }
                    reader.consume(offset);
                }
                Err(PcapError::Eof) => break,
                Err(PcapError::Incomplete(_) | PcapError::UnexpectedEof) => {
                    warn!(packets = packets.len(), "capture truncated, ignoring partial block");
                    break;
                }
                Err(e) => {
                    return Err(Error::Pcap(format!("PCAPNG parse error: {:?}", e)));
                }
            }
        }

        Ok(())
    }

    /// Extract UDP payload from raw packet data.
    ///
    /// Uses etherparse to handle Ethernet/IP/UDP headers.
    fn extract_udp_payload(data: &[u8], port: Option<u16>) -> Option<Vec<u8>> {
        use etherparse::SlicedPacket;

        let packet = SlicedPacket::from_ethernet(data).ok()?;

        let udp = match packet.transport {
            Some(etherparse::TransportSlice::Udp(udp)) => udp,
            _ => return None,
        };

        if let Some(filter_port) = port {
            if udp.destination_port() != filter_port {
                return None;
            }
        }

        let payload = udp.payload().to_vec();
        if payload.is_empty() {
            return None;
        }

        Some(payload)
    }
}

/// Decode a pcapng `if_tsresol` value: the low seven bits are a negative
/// power of ten, or of two when the high bit is set.
fn ticks_per_second(tsresol: u8) -> f64 {
    let exponent = (tsresol & 0x7f) as i32;
    if tsresol & 0x80 != 0 {
        2f64.powi(exponent)
    } else {
        10f64.powi(exponent)
    }
}

impl PacketSource for PcapSource {
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
