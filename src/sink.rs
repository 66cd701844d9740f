// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Destinations for completed frames.
//!
//! [`DirectorySink`] writes one file per frame and format:
//!
//! ```text
//! <out_root>/<capture_stem>/data_txt/<frame_index>_<civil_time>.txt
//! <out_root>/<capture_stem>/data_pcd/<frame_index>_<civil_time>.pcd
//! ```

use crate::{
    formats::{frame_stem, write_pcd, write_text},
    lidar::{Error, Frame},
};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Subdirectory holding text frames
pub const TEXT_DIR: &str = "data_txt";

/// Subdirectory holding point cloud frames
pub const PCD_DIR: &str = "data_pcd";

/// Consumer of completed frames. Ownership of each frame passes to the sink.
pub trait FrameSink {
    fn write_frame(&mut self, frame: Frame) -> Result<(), Error>;
}

/// Collects frames in memory.
impl FrameSink for Vec<Frame> {
    fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.push(frame);
        Ok(())
    }
}

/// Output formats to produce for each frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutputFormats {
    pub txt: bool,
    pub pcd: bool,
}

/// Writes frames as files below a per-capture output directory.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
    txt_dir: Option<PathBuf>,
    pcd_dir: Option<PathBuf>,
}

impl DirectorySink {
    /// Create the output hierarchy for `capture` below `out_root`.
    ///
    /// Only the subdirectories of enabled formats are created.
    pub fn create<P: AsRef<Path>, Q: AsRef<Path>>(
        out_root: P,
        capture: Q,
        formats: OutputFormats,
    ) -> Result<Self, Error> {
        let stem = capture.as_ref().file_stem().ok_or_else(|| {
            Error::Config(format!(
                "capture path has no file name: {}",
                capture.as_ref().display()
            ))
        })?;
        let root = out_root.as_ref().join(stem);
        std::fs::create_dir_all(&root)?;

        let make_dir = |enabled: bool, name: &str| -> Result<Option<PathBuf>, Error> {
            if !enabled {
                return Ok(None);
            }
            let dir = root.join(name);
            std::fs::create_dir_all(&dir)?;
            Ok(Some(dir))
        };
        let txt_dir = make_dir(formats.txt, TEXT_DIR)?;
        let pcd_dir = make_dir(formats.pcd, PCD_DIR)?;

        debug!(root = %root.display(), ?formats, "created output directories");
        Ok(Self {
            root,
            txt_dir,
            pcd_dir,
        })
    }

    /// Per-capture output directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FrameSink for DirectorySink {
    fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        let stem = frame_stem(&frame)?;

        if let Some(dir) = &self.txt_dir {
            let path = dir.join(format!("{}.txt", stem));
            let mut out = BufWriter::new(File::create(&path)?);
            let rows = write_text(&frame, &mut out)?;
            out.flush()?;
            debug!(path = %path.display(), rows, "wrote text frame");
        }

        if let Some(dir) = &self.pcd_dir {
            let path = dir.join(format!("{}.pcd", stem));
            let mut out = BufWriter::new(File::create(&path)?);
            let points = write_pcd(&frame, &mut out)?;
            out.flush()?;
            debug!(path = %path.display(), points, "wrote point cloud frame");
        }

        Ok(())
    }
}
