// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet decoder for the 16-channel spinning LiDAR.
//!
//! # Packet Structure
//!
//! Data packets are 1206 bytes:
//! - 12 data blocks × 100 bytes = 1200 bytes
//! - 6 trailing bytes (ignored)
//!
//! Each data block:
//! ```text
//! ┌──────────────┬──────────────┬────────────────────────────────────┐
//! │ sentinel:u16 │ azimuth:u16  │ 32 × (distance:u16, intensity:u8)  │
//! │ 0xEEFF (LE)  │ 0.01° (LE)   │ 96 bytes                           │
//! └──────────────┴──────────────┴────────────────────────────────────┘
//! ```
//!
//! A block carries a single azimuth sample for its first firing; the
//! azimuth of the remaining 31 firings is linearly interpolated towards the
//! next block. Slots 0-15 and 16-31 are two firing sequences over channels
//! 0-15.

use crate::{
    geometry::{
        BLOCKS_PER_PACKET, CHANNELS, FIRINGS_PER_BLOCK, FIRINGS_PER_PACKET, TIMING_OFFSETS,
        vertical_angle,
    },
    lidar::{Error, Firing},
};

/// Data packet size in bytes
pub const PACKET_SIZE: usize = 1206;

/// Size of each data block in bytes
pub const BLOCK_SIZE: usize = 100;

/// Block sentinel, little-endian on the wire (bytes `0xFF 0xEE`)
pub const BLOCK_SENTINEL: u16 = 0xEEFF;

/// Size of the sentinel and azimuth fields preceding the firings
const BLOCK_HEADER_SIZE: usize = 4;

/// Size of each firing record in bytes
const FIRING_SIZE: usize = 3;

/// Distance resolution in meters (2.5mm)
pub const DISTANCE_RESOLUTION: f64 = 0.0025;

/// One packet worth of decoded firings, in block-then-slot order.
pub type FiringBatch = [Firing; FIRINGS_PER_PACKET];

/// Zero-copy view of one 100-byte data block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockSlice<'a> {
    slice: &'a [u8],
}

impl<'a> BlockSlice<'a> {
    /// Wrap `slice`, verifying its length and sentinel. `block` is only used
    /// for error reporting.
    pub fn from_slice(slice: &'a [u8], block: usize) -> Result<BlockSlice<'a>, Error> {
        if slice.len() < BLOCK_SIZE {
            return Err(Error::InvalidPacket(format!(
                "block {} too small: {} bytes",
                block,
                slice.len()
            )));
        }

        let sentinel = u16::from_le_bytes([slice[0], slice[1]]);
        if sentinel != BLOCK_SENTINEL {
            return Err(Error::BadSentinel {
                block,
                found: sentinel,
            });
        }

        Ok(BlockSlice {
            slice: &slice[..BLOCK_SIZE],
        })
    }

    /// Raw azimuth in hundredths of a degree.
    pub fn raw_azimuth(&self) -> u16 {
        u16::from_le_bytes([self.slice[2], self.slice[3]])
    }

    /// Azimuth of the block's first firing in degrees.
    pub fn azimuth(&self) -> f64 {
        self.raw_azimuth() as f64 / 100.0
    }

    /// Raw distance count of firing `slot`, in 2.5mm units.
    pub fn raw_distance(&self, slot: usize) -> u16 {
        let offset = BLOCK_HEADER_SIZE + slot * FIRING_SIZE;
        u16::from_le_bytes([self.slice[offset], self.slice[offset + 1]])
    }

    pub fn intensity(&self, slot: usize) -> u8 {
        self.slice[BLOCK_HEADER_SIZE + slot * FIRING_SIZE + 2]
    }
}

/// Decode a data packet into its 384 firings.
///
/// Every block is validated before any firing is computed, so a packet with a
/// single bad sentinel yields an error and no firings. The transform is pure:
/// identical bytes and timestamp always decode to identical firings.
pub fn decode_packet(data: &[u8], capture_timestamp: f64) -> Result<Box<FiringBatch>, Error> {
    if data.len() != PACKET_SIZE {
        return Err(Error::InvalidPacket(format!(
            "packet size {} bytes, expected {}",
            data.len(),
            PACKET_SIZE
        )));
    }

    let mut blocks = [BlockSlice { slice: &[] }; BLOCKS_PER_PACKET];
    for (i, block) in blocks.iter_mut().enumerate() {
        let start = i * BLOCK_SIZE;
        *block = BlockSlice::from_slice(&data[start..start + BLOCK_SIZE], i)?;
    }

    let block_azimuths: [f64; BLOCKS_PER_PACKET] = std::array::from_fn(|i| blocks[i].azimuth());
    let azimuths = interpolate_azimuths(&block_azimuths);

    Ok(Box::new(std::array::from_fn(|i| {
        let block = &blocks[i / FIRINGS_PER_BLOCK];
        let slot = i % FIRINGS_PER_BLOCK;
        let channel = slot % CHANNELS;
        let distance = block.raw_distance(slot) as f64 * DISTANCE_RESOLUTION;
        let vertical_angle = vertical_angle(channel);
        let azimuth = azimuths[i];
        let (x, y, z) = to_cartesian(distance, vertical_angle, azimuth);

        Firing {
            channel: channel as u8,
            azimuth,
            distance,
            intensity: block.intensity(slot),
            vertical_angle,
            timestamp: capture_timestamp + TIMING_OFFSETS[i],
            x,
            y,
            z,
        }
    })))
}

/// Interpolate a per-firing azimuth from the per-block samples.
///
/// The gap to the next block is spread evenly over the 32 firing slots,
/// unwrapping a 360° rollover before differencing. The last block has no
/// successor and reuses the gap from its predecessor. Results are wrapped
/// into `[0, 360)`.
pub fn interpolate_azimuths(blocks: &[f64; BLOCKS_PER_PACKET]) -> [f64; FIRINGS_PER_PACKET] {
    let mut azimuths = [0.0; FIRINGS_PER_PACKET];

    for n in 0..BLOCKS_PER_PACKET {
        let (base, gap) = if n + 1 < BLOCKS_PER_PACKET {
            let next = unwrap_after(blocks[n], blocks[n + 1]);
            (blocks[n], next - blocks[n])
        } else {
            let current = unwrap_after(blocks[n - 1], blocks[n]);
            (current, current - blocks[n - 1])
        };

        let step = gap / FIRINGS_PER_BLOCK as f64;
        for k in 0..FIRINGS_PER_BLOCK {
            azimuths[n * FIRINGS_PER_BLOCK + k] = (base + step * k as f64).rem_euclid(360.0);
        }
    }

    azimuths
}

/// Add a full turn to `next` if the sensor rolled over since `previous`.
#[inline]
fn unwrap_after(previous: f64, next: f64) -> f64 {
    if next < previous { next + 360.0 } else { next }
}

/// Spherical to Cartesian conversion; angles in degrees.
///
/// The sensor's azimuth increases clockwise seen from above, hence the
/// negated Y axis.
#[inline]
pub fn to_cartesian(distance: f64, vertical_angle: f64, azimuth: f64) -> (f64, f64, f64) {
    let omega = vertical_angle.to_radians();
    let theta = azimuth.to_radians();
    let x = distance * omega.cos() * theta.cos();
    let y = distance * omega.cos() * (-theta).sin();
    let z = distance * omega.sin();
    (x, y, z)
}

/// Builder for synthetic data packets.
///
/// Used by tests and benchmarks to produce well-formed packets without a
/// sensor capture.
///
/// ```
/// use edgefirst_lidarframes::lsc16::{PacketBuilder, decode_packet};
///
/// let packet = PacketBuilder::sweep(35_900, 20).fill(1000, 42).build();
/// let firings = decode_packet(&packet, 100.0).unwrap();
/// assert_eq!(firings[0].azimuth, 359.0);
/// assert_eq!(firings[0].distance, 2.5);
/// ```
#[derive(Clone, Debug)]
pub struct PacketBuilder {
    data: Vec<u8>,
}

impl PacketBuilder {
    /// A packet with valid sentinels, zero azimuths and no returns.
    pub fn new() -> Self {
        let mut data = vec![0u8; PACKET_SIZE];
        for block in 0..BLOCKS_PER_PACKET {
            let start = block * BLOCK_SIZE;
            data[start..start + 2].copy_from_slice(&BLOCK_SENTINEL.to_le_bytes());
        }
        Self { data }
    }

    /// A packet whose block azimuths start at `start` and advance by `step`,
    /// both in hundredths of a degree, wrapping at 360°.
    pub fn sweep(start: u16, step: u16) -> Self {
        let mut builder = Self::new();
        for block in 0..BLOCKS_PER_PACKET {
            let raw = (start as u32 + step as u32 * block as u32) % 36_000;
            builder = builder.block_azimuth(block, raw as u16);
        }
        builder
    }

    /// Set the raw azimuth (0.01°) of `block`.
    pub fn block_azimuth(mut self, block: usize, raw: u16) -> Self {
        let start = block * BLOCK_SIZE + 2;
        self.data[start..start + 2].copy_from_slice(&raw.to_le_bytes());
        self
    }

    /// Set the raw distance (2.5mm units) and intensity of one firing.
    pub fn firing(mut self, block: usize, slot: usize, raw_distance: u16, intensity: u8) -> Self {
        let start = block * BLOCK_SIZE + BLOCK_HEADER_SIZE + slot * FIRING_SIZE;
        self.data[start..start + 2].copy_from_slice(&raw_distance.to_le_bytes());
        self.data[start + 2] = intensity;
        self
    }

    /// Set every firing to the same raw distance and intensity.
    pub fn fill(mut self, raw_distance: u16, intensity: u8) -> Self {
        for block in 0..BLOCKS_PER_PACKET {
            for slot in 0..FIRINGS_PER_BLOCK {
                self = self.firing(block, slot, raw_distance, intensity);
            }
        }
        self
    }

    /// Overwrite the sentinel of `block`.
    pub fn sentinel(mut self, block: usize, sentinel: u16) -> Self {
        let start = block * BLOCK_SIZE;
        self.data[start..start + 2].copy_from_slice(&sentinel.to_le_bytes());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}
