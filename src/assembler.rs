// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Rotation segmentation of the decoded firing stream.
//!
//! The sensor has no frame counter, so a frame boundary is inferred from the
//! azimuth rolling over from ~360° back to ~0°. The rollover can fall inside
//! a packet or exactly between two packets, so the assembler carries the
//! pending firings and the previous packet's final azimuth across calls.
//!
//! # Limitations
//!
//! - At most one frame is completed per batch. A batch spanning two
//!   rollovers (not possible at the sensor's rotation rates) would merge the
//!   second boundary into the next frame.
//! - Firings still pending when the stream ends are never emitted; see
//!   [`FrameAssembler::finish`].

use crate::lidar::{Firing, Frame};
use tracing::trace;

/// Expected firings per rotation (~32k at 10Hz), used to size buffers.
const FIRINGS_PER_FRAME: usize = 32_768;

/// Stateful frame assembler.
///
/// Batches must be pushed in capture order; reordering corrupts frame
/// boundaries.
#[derive(Debug)]
pub struct FrameAssembler {
    /// Firings of the rotation in progress
    pending: Vec<Firing>,
    /// First and final azimuth of the previous batch, cleared after a
    /// rollover
    previous_azimuths: Option<(f64, f64)>,
    /// Index assigned to the next completed frame
    frame_index: u64,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(FIRINGS_PER_FRAME),
            previous_azimuths: None,
            frame_index: 0,
        }
    }

    /// Push the next batch of firings, returning the frame it completed.
    ///
    /// The first batch pushed starts the pending frame and is added to it
    /// once; a rollover inside it closes a first frame holding only the
    /// firings before the rollover. In general, if the batch contains a
    /// rollover at index `r`, firings before `r` close the pending frame and
    /// firings from `r` onwards start the next one.
    pub fn push(&mut self, batch: &[Firing]) -> Option<Frame> {
        let (first, last) = (batch.first()?, batch.last()?);

        match self.rollover_index(batch) {
            Some(r) => {
                self.pending.extend_from_slice(&batch[..r]);
                let firings =
                    std::mem::replace(&mut self.pending, Vec::with_capacity(FIRINGS_PER_FRAME));
                let frame = Frame::new(self.frame_index, firings);
                trace!(
                    frame = frame.index,
                    firings = frame.len(),
                    rollover = r,
                    "frame complete"
                );

                self.frame_index += 1;
                self.pending.extend_from_slice(&batch[r..]);
                self.previous_azimuths = None;
                Some(frame)
            }
            None => {
                self.pending.extend_from_slice(batch);
                self.previous_azimuths = Some((first.azimuth, last.azimuth));
                None
            }
        }
    }

    /// Locate the first firing of a new rotation within `batch`.
    ///
    /// A backwards azimuth step inside the batch wins; otherwise a backwards
    /// step from the previous batch's final azimuth places the boundary at
    /// index 0. Batches starting at the same azimuth as the previous one are
    /// not compared, so a repeated packet never closes a frame.
    fn rollover_index(&self, batch: &[Firing]) -> Option<usize> {
        let within = batch
            .windows(2)
            .position(|pair| pair[1].azimuth - pair[0].azimuth < 0.0)
            .map(|i| i + 1);

        within.or_else(|| {
            let (previous_first, previous_last) = self.previous_azimuths?;
            let first = batch.first()?;
            (first.azimuth != previous_first && first.azimuth - previous_last < 0.0).then_some(0)
        })
    }

    /// Number of firings waiting for the next rollover.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Index the next completed frame will carry.
    pub fn next_frame_index(&self) -> u64 {
        self.frame_index
    }

    /// End the stream.
    ///
    /// The partial rotation after the last rollover is discarded rather than
    /// emitted as a short frame. Returns the number of firings dropped.
    pub fn finish(self) -> usize {
        self.pending.len()
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
