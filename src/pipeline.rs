// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Capture-to-frames driver.
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌────────────────┐   ┌───────────┐
//! │ PacketSource │ ► │ decode workers   │ ► │ FrameAssembler │ ► │ FrameSink │
//! │ (reader)     │   │ (kanal, N thread)│   │ (in order)     │   │           │
//! └──────────────┘   └──────────────────┘   └────────────────┘   └───────────┘
//! ```
//!
//! Decoding is pure and runs on a bounded pool of worker threads; results
//! are re-sequenced by stream position before reaching the assembler, whose
//! rollover detection depends on capture order. With a single worker the
//! packets are decoded inline on the calling thread.

use crate::{
    assembler::FrameAssembler,
    lidar::Error,
    lsc16::{FiringBatch, decode_packet},
    packet_source::{CapturedPacket, PacketSource},
    sink::FrameSink,
};
use std::{collections::BTreeMap, thread};
use tracing::{debug, error, info, info_span, warn};

/// Frames between progress log lines
const PROGRESS_INTERVAL: u64 = 100;

/// Queue depth per decode worker
const QUEUE_DEPTH: usize = 4;

/// Half-open range `[from, to)` of stream positions to process.
///
/// Positions count packets delivered by the source, starting at 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Window {
    pub from: u64,
    /// Exclusive end; `None` is unbounded
    pub to: Option<u64>,
}

impl Window {
    /// Build a window from configuration values; `to <= 0` is unbounded.
    pub fn new(from: u64, to: i64) -> Self {
        let to = (to > 0).then_some(to as u64);
        Self { from, to }
    }

    pub fn contains(&self, position: u64) -> bool {
        position >= self.from && !self.is_past(position)
    }

    /// Whether `position` and everything after it lie beyond the window.
    pub fn is_past(&self, position: u64) -> bool {
        self.to.is_some_and(|to| position >= to)
    }
}

/// Counters reported at the end of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Packets taken from the source, including those before the window
    pub packets_seen: u64,
    pub packets_decoded: u64,
    /// Packets skipped because they failed to decode
    pub packets_rejected: u64,
    pub frames_written: u64,
    pub write_errors: u64,
    /// Firings after the last rollover, never written
    pub firings_discarded: usize,
}

/// Capture-to-frames driver configuration.
#[derive(Clone, Copy, Debug)]
pub struct Pipeline {
    window: Window,
    workers: usize,
}

impl Pipeline {
    /// Create a pipeline over `window` decoding on `workers` threads.
    pub fn new(window: Window, workers: usize) -> Result<Self, Error> {
        if workers == 0 {
            return Err(Error::Config("at least one decode worker is required".to_string()));
        }
        Ok(Self { window, workers })
    }

    /// Process `source` to exhaustion (or the end of the window), writing
    /// completed frames to `sink`.
    ///
    /// Packets that fail to decode and frames that fail to write are logged
    /// and counted; only source errors abort the run.
    pub fn run<S, K>(&self, source: &mut S, sink: &mut K) -> Result<RunStats, Error>
    where
        S: PacketSource,
        K: FrameSink,
    {
        let span = info_span!("extract", workers = self.workers);
        let _guard = span.enter();

        let mut collector = Collector::new(sink);
        if self.workers == 1 {
            self.run_inline(source, &mut collector)?;
        } else {
            self.run_parallel(source, &mut collector)?;
        }

        let stats = collector.finish();
        info!(
            packets = stats.packets_seen,
            decoded = stats.packets_decoded,
            rejected = stats.packets_rejected,
            frames = stats.frames_written,
            write_errors = stats.write_errors,
            "extraction complete"
        );
        Ok(stats)
    }

    fn run_inline<S, K>(&self, source: &mut S, collector: &mut Collector<'_, K>) -> Result<(), Error>
    where
        S: PacketSource,
        K: FrameSink,
    {
        let mut position = 0;
        while !self.window.is_past(position) {
            let Some(packet) = source.recv()? else {
                break;
            };
            collector.stats.packets_seen += 1;

            if self.window.contains(position) {
                let decoded = decode_packet(&packet.payload, packet.timestamp);
                collector.accept(position, decoded);
            }
            position += 1;
        }
        Ok(())
    }

    fn run_parallel<S, K>(
        &self,
        source: &mut S,
        collector: &mut Collector<'_, K>,
    ) -> Result<(), Error>
    where
        S: PacketSource,
        K: FrameSink,
    {
        let depth = self.workers * QUEUE_DEPTH;
        let (job_tx, job_rx) = kanal::bounded::<(u64, CapturedPacket)>(depth);
        let (result_tx, result_rx) =
            kanal::bounded::<(u64, Result<Box<FiringBatch>, Error>)>(depth);
        let window = self.window;

        thread::scope(|scope| -> Result<(), Error> {
            for worker in 0..self.workers {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                thread::Builder::new()
                    .name(format!("decode-{}", worker))
                    .spawn_scoped(scope, move || {
                        while let Ok((position, packet)) = jobs.recv() {
                            let decoded = decode_packet(&packet.payload, packet.timestamp);
                            if results.send((position, decoded)).is_err() {
                                break;
                            }
                        }
                    })?;
            }
            drop(job_rx);
            drop(result_tx);

            let reader = thread::Builder::new()
                .name("capture-reader".to_string())
                .spawn_scoped(scope, move || -> Result<u64, Error> {
                    let mut position = 0;
                    while !window.is_past(position) {
                        let Some(packet) = source.recv()? else {
                            break;
                        };
                        if window.contains(position) && job_tx.send((position, packet)).is_err() {
                            break;
                        }
                        position += 1;
                    }
                    Ok(position)
                })?;

            // Results arrive in completion order; release them in stream order
            let mut next = window.from;
            let mut reorder = BTreeMap::new();
            while let Ok((position, decoded)) = result_rx.recv() {
                reorder.insert(position, decoded);
                while let Some(decoded) = reorder.remove(&next) {
                    collector.accept(next, decoded);
                    next += 1;
                }
            }
            debug!(pending = reorder.len(), "decode workers finished");

            let read = match reader.join() {
                Ok(result) => result?,
                Err(panic) => std::panic::resume_unwind(panic),
            };
            collector.stats.packets_seen = read;
            Ok(())
        })
    }
}

/// Feeds decoded batches to the assembler and completed frames to the sink.
struct Collector<'a, K> {
    assembler: FrameAssembler,
    sink: &'a mut K,
    stats: RunStats,
}

impl<'a, K: FrameSink> Collector<'a, K> {
    fn new(sink: &'a mut K) -> Self {
        Self {
            assembler: FrameAssembler::new(),
            sink,
            stats: RunStats::default(),
        }
    }

    fn accept(&mut self, position: u64, decoded: Result<Box<FiringBatch>, Error>) {
        let batch = match decoded {
            Ok(batch) => batch,
            Err(e) => {
                warn!(position, error = %e, "skipping packet");
                self.stats.packets_rejected += 1;
                return;
            }
        };
        self.stats.packets_decoded += 1;

        let Some(frame) = self.assembler.push(&batch[..]) else {
            return;
        };

        let index = frame.index;
        let firings = frame.len();
        match self.sink.write_frame(frame) {
            Ok(()) => {
                self.stats.frames_written += 1;
                debug!(frame = index, firings, position, "frame written");
                if self.stats.frames_written % PROGRESS_INTERVAL == 0 {
                    info!(frames = self.stats.frames_written, position, "progress");
                }
            }
            Err(e) => {
                error!(frame = index, error = %e, "failed to write frame");
                self.stats.write_errors += 1;
            }
        }
    }

    fn finish(self) -> RunStats {
        let mut stats = self.stats;
        stats.firings_discarded = self.assembler.finish();
        if stats.firings_discarded > 0 {
            info!(
                firings = stats.firings_discarded,
                "discarding partial rotation at end of capture"
            );
        }
        stats
    }
}
