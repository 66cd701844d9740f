// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Command line and configuration file handling.
//!
//! Options resolve in order of precedence: command line (or environment),
//! then the YAML configuration file, then built-in defaults.
//!
//! ```yaml
//! from: 0
//! to: 0          # <= 0 processes the whole capture
//! data-port: 2368
//! txt: true
//! pcd: false
//! workers: 4
//! ```

use crate::{lidar::Error, pipeline::Window, sink::OutputFormats};
use clap::Parser;
use serde::Deserialize;
use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};
use tracing::level_filters::LevelFilter;

/// UDP port the sensor sends data packets to
pub const DEFAULT_DATA_PORT: u16 = 2368;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Capture file (pcap or pcapng) to convert
    #[arg(short, long, env = "LIDARFRAMES_PATH")]
    pub path: PathBuf,

    /// Output root; frames are written below <OUT_DIR>/<capture name>/
    #[arg(short, long, env = "LIDARFRAMES_OUT_DIR")]
    pub out_dir: PathBuf,

    /// YAML configuration file
    #[arg(short, long, env = "LIDARFRAMES_CONFIG")]
    pub config: Option<PathBuf>,

    /// First packet position to process
    #[arg(long, env = "LIDARFRAMES_FROM")]
    pub from: Option<u64>,

    /// Packet position to stop at (exclusive), 0 or less for the whole capture
    #[arg(long, env = "LIDARFRAMES_TO", allow_negative_numbers = true)]
    pub to: Option<i64>,

    /// Destination UDP port of the sensor's data packets
    #[arg(long, env = "LIDARFRAMES_DATA_PORT")]
    pub data_port: Option<u16>,

    /// Write frames as delimited text
    #[arg(long, env = "LIDARFRAMES_TXT", num_args = 0..=1, default_missing_value = "true")]
    pub txt: Option<bool>,

    /// Write frames as ASCII PCD point clouds
    #[arg(long, env = "LIDARFRAMES_PCD", num_args = 0..=1, default_missing_value = "true")]
    pub pcd: Option<bool>,

    /// Number of decode threads, defaults to the available parallelism
    #[arg(long, env = "LIDARFRAMES_WORKERS")]
    pub workers: Option<usize>,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,
}

impl Args {
    /// Load the configuration file, if any, and resolve the final settings.
    pub fn settings(&self) -> Result<Settings, Error> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Settings::resolve(self, &file)
    }
}

/// Options read from the YAML configuration file. Every key is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub from: Option<u64>,
    pub to: Option<i64>,
    pub data_port: Option<u16>,
    pub txt: Option<bool>,
    pub pcd: Option<bool>,
    pub workers: Option<usize>,
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(text)?)
    }
}

/// Fully resolved and validated run settings.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub path: PathBuf,
    pub out_dir: PathBuf,
    pub window: Window,
    pub data_port: u16,
    pub formats: OutputFormats,
    pub workers: usize,
}

impl Settings {
    /// Merge command line options over `file`, falling back to defaults.
    pub fn resolve(args: &Args, file: &FileConfig) -> Result<Self, Error> {
        let from = args.from.or(file.from).unwrap_or(0);
        let to = args.to.or(file.to).unwrap_or(0);
        let workers = args
            .workers
            .or(file.workers)
            .unwrap_or_else(default_workers);
        if workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }

        Ok(Self {
            path: args.path.clone(),
            out_dir: args.out_dir.clone(),
            window: Window::new(from, to),
            data_port: args.data_port.or(file.data_port).unwrap_or(DEFAULT_DATA_PORT),
            formats: OutputFormats {
                txt: args.txt.or(file.txt).unwrap_or(true),
                pcd: args.pcd.or(file.pcd).unwrap_or(false),
            },
            workers,
        })
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
