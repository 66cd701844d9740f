// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser as _;
use edgefirst_lidarframes::{
    PcapSource,
    args::Args,
    packet_source::PacketSource as _,
    pipeline::Pipeline,
    sink::DirectorySink,
};
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::default().add_directive(args.rust_log.into()))
        .init();

    let settings = args.settings()?;
    if !settings.formats.txt && !settings.formats.pcd {
        warn!("no output format enabled, frames will be assembled but not written");
    }

    let mut source = match PcapSource::from_file(&settings.path, Some(settings.data_port)) {
        Ok(source) => source,
        Err(e) => {
            error!(path = %settings.path.display(), error = %e, "failed to open capture");
            return Err(e.into());
        }
    };
    info!(
        path = %settings.path.display(),
        packets = source.len(),
        data_port = settings.data_port,
        "opened capture"
    );

    let mut sink = DirectorySink::create(&settings.out_dir, &settings.path, settings.formats)?;
    let pipeline = Pipeline::new(settings.window, settings.workers)?;

    let start = Instant::now();
    let stats = pipeline.run(&mut source, &mut sink)?;
    info!(
        frames = stats.frames_written,
        output = %sink.root().display(),
        elapsed = ?start.elapsed(),
        "done"
    );

    Ok(())
}
