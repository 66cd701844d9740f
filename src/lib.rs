// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst LiDAR Frames Library
//!
//! This library reconstructs per-rotation point cloud frames from packet
//! captures of a 16-channel spinning LiDAR and writes them to disk.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │  PacketSource   │ ──► │  lsc16 decode │ ──► │  FrameAssembler │
//! │  (pcap/test)    │     │  (384 firings)│     │  (rollover)     │
//! └─────────────────┘     └───────────────┘     └─────────────────┘
//!                                                       │
//!                                                       ▼
//!                               ┌─────────────────────────────────────┐
//!                               │  FrameSink                          │
//!                               │  (data_txt/*.txt, data_pcd/*.pcd)   │
//!                               └─────────────────────────────────────┘
//! ```
//!
//! 1. The source yields UDP payloads sent to the sensor's data port, each
//!    with its capture timestamp
//! 2. Each 1206-byte packet decodes to 384 calibrated firings
//! 3. The assembler closes a frame whenever the azimuth rolls over 360°
//! 4. Completed frames pass by value to the sink
//!
//! [`pipeline::Pipeline`] drives these stages, optionally decoding on a pool
//! of worker threads.
//!
//! # Modules
//!
//! - [`lidar`]: Common types and error handling
//! - [`geometry`]: Channel elevations and firing time offsets
//! - [`lsc16`]: Packet decoder
//! - [`assembler`]: Rotation segmentation
//! - [`formats`]: Text and PCD serialization
//! - [`sink`]: Frame destinations
//! - [`packet_source`]: Packet source abstraction for testing
//! - [`pipeline`]: Capture-to-frames driver
//!
//! # Example
//!
//! ```
//! use edgefirst_lidarframes::{
//!     lidar::Frame,
//!     lsc16::PacketBuilder,
//!     packet_source::TestSource,
//!     pipeline::{Pipeline, Window},
//! };
//!
//! // Two packets either side of a rollover
//! let source = vec![
//!     (0.0, PacketBuilder::sweep(35_500, 20).fill(400, 1).build()),
//!     (0.001, PacketBuilder::sweep(10, 20).fill(400, 1).build()),
//! ];
//! let mut frames: Vec<Frame> = Vec::new();
//! let stats = Pipeline::new(Window::default(), 1)?
//!     .run(&mut TestSource::new(source), &mut frames)?;
//!
//! assert_eq!(stats.frames_written, 1);
//! assert_eq!(frames[0].len(), 384);
//! # Ok::<(), edgefirst_lidarframes::Error>(())
//! ```

pub mod args;
pub mod assembler;
pub mod formats;
pub mod geometry;
pub mod lidar;
pub mod lsc16;
pub mod packet_source;
#[cfg(feature = "pcap")]
pub mod pcap_source;
pub mod pipeline;
pub mod sink;

// Re-exports for convenience
pub use assembler::FrameAssembler;
pub use lidar::{Error, Firing, Frame};
pub use packet_source::PacketSource;
#[cfg(feature = "pcap")]
pub use pcap_source::PcapSource;
pub use pipeline::{Pipeline, RunStats, Window};
pub use sink::{DirectorySink, FrameSink, OutputFormats};
