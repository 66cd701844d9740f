// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Frame serialization.
//!
//! # Formats
//!
//! ## Delimited text
//! ```text
//! timestamp,laser_id,X,Y,Z,intensity,vertical_angle,horizontal_angle,distance
//! 1600000000.099088,0,-3.521876,0.012291,-0.943707,12,-15,359.800,3.6450
//! ```
//! One row per firing with a valid return (`distance != 0`).
//!
//! ## PCD v0.7 (ASCII)
//! Fields `x y z intensity`, all 4-byte floats, unorganized (`HEIGHT 1`).
//! Points with any zero coordinate are dropped.
//!
//! # File naming
//!
//! Frames are written as `<frame_index>_<civil_time>`, where the civil time
//! is the frame's start timestamp in UTC+8 with `:` and ` ` replaced so the
//! name is valid on every filesystem, e.g. `12_2020-09-13_20-26-40.099088`.

use crate::lidar::{Error, Firing, Frame};
use chrono::{DateTime, FixedOffset};
use std::{fmt::Write as _, io::Write};

/// Column header of the text format.
pub const TEXT_HEADER: &str =
    "timestamp,laser_id,X,Y,Z,intensity,vertical_angle,horizontal_angle,distance";

/// Offset of the civil time used in file names (UTC+8).
pub const CIVIL_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Write `frame` as delimited text, returning the number of rows written.
pub fn write_text<W: Write>(frame: &Frame, mut out: W) -> std::io::Result<usize> {
    writeln!(out, "{}", TEXT_HEADER)?;

    let mut rows = 0;
    for firing in frame.valid_firings() {
        writeln!(
            out,
            "{:.6},{},{:.6},{:.6},{:.6},{},{},{:.3},{:.4}",
            firing.timestamp,
            firing.channel,
            firing.x,
            firing.y,
            firing.z,
            firing.intensity,
            firing.vertical_angle as i64,
            firing.azimuth,
            firing.distance,
        )?;
        rows += 1;
    }

    Ok(rows)
}

/// Whether a firing survives point cloud export.
#[inline]
fn has_position(firing: &Firing) -> bool {
    firing.x != 0.0 && firing.y != 0.0 && firing.z != 0.0
}

/// Write `frame` as an ASCII PCD file, returning the number of points.
///
/// Lines are separated, not terminated, by newlines; the file ends with the
/// last point.
pub fn write_pcd<W: Write>(frame: &Frame, mut out: W) -> std::io::Result<usize> {
    let n_points = frame.firings.iter().filter(|f| has_position(f)).count();

    write!(
        out,
        "# .PCD v0.7 - Point Cloud Data file format\n\
         VERSION 0.7\n\
         FIELDS x y z intensity\n\
         SIZE 4 4 4 4\n\
         TYPE F F F F\n\
         COUNT 1 1 1 1\n\
         WIDTH {n_points}\n\
         HEIGHT 1\n\
         VIEWPOINT 0 0 0 1 0 0 0\n\
         POINTS {n_points}\n\
         DATA ascii"
    )?;

    for firing in frame.firings.iter().filter(|f| has_position(f)) {
        write!(
            out,
            "\n{:?} {:?} {:?} {:?}",
            firing.x, firing.y, firing.z, firing.intensity as f64
        )?;
    }

    Ok(n_points)
}

/// Filesystem-safe civil time of `timestamp` (seconds since the Unix epoch)
/// at UTC+8.
///
/// Microseconds are appended only when non-zero.
pub fn civil_time(timestamp: f64) -> Result<String, Error> {
    let micros = (timestamp * 1_000_000.0).round();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return Err(Error::TimestampOutOfRange(timestamp));
    }

    let offset =
        FixedOffset::east_opt(CIVIL_UTC_OFFSET_SECS).ok_or(Error::TimestampOutOfRange(timestamp))?;
    let time = DateTime::from_timestamp_micros(micros as i64)
        .ok_or(Error::TimestampOutOfRange(timestamp))?
        .with_timezone(&offset);

    let mut name = time.format("%Y-%m-%d %H:%M:%S").to_string();
    let subsec = time.timestamp_subsec_micros();
    if subsec != 0 {
        // Writing to a String cannot fail
        let _ = write!(name, ".{:06}", subsec);
    }

    Ok(name.replace(':', "-").replace(' ', "_"))
}

/// File name of `frame` without extension.
pub fn frame_stem(frame: &Frame) -> Result<String, Error> {
    Ok(format!("{}_{}", frame.index, civil_time(frame.start_timestamp)?))
}
