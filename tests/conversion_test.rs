// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! End-to-end conversion of synthetic captures.
//!
//! Captures are built in memory: 1206-byte data packets sweeping 0.2° per
//! block (150 packets per rotation) addressed to the data port, interleaved
//! with unrelated traffic on other ports.

#![cfg(feature = "pcap")]

use edgefirst_lidarframes::{
    DirectorySink, Error, OutputFormats, PcapSource, Pipeline, RunStats, Window,
    formats::TEXT_HEADER,
    lsc16::PacketBuilder,
    packet_source::PacketSource,
    sink::{PCD_DIR, TEXT_DIR},
};
use std::path::{Path, PathBuf};

const DATA_PORT: u16 = 2368;
const DEVICE_PORT: u16 = 2369;
const CAPTURE_SECONDS: u32 = 1_600_000_000;
/// Raw azimuth advance per packet (12 blocks × 0.2°)
const PACKET_STEP: usize = 240;
const PACKETS_PER_ROTATION: usize = 150;

fn udp_frame(dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let udp_len = 8 + payload.len();
    let ip_len = 20 + udp_len;

    let mut frame = Vec::with_capacity(14 + ip_len);
    frame.extend_from_slice(&[0xff; 6]);
    frame.extend_from_slice(&[0x60, 0x76, 0x88, 0x00, 0x00, 0x01]);
    frame.extend_from_slice(&[0x08, 0x00]);

    frame.extend_from_slice(&[0x45, 0x00]);
    frame.extend_from_slice(&(ip_len as u16).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00]);
    frame.extend_from_slice(&[192, 168, 1, 200]);
    frame.extend_from_slice(&[255, 255, 255, 255]);

    frame.extend_from_slice(&2368u16.to_be_bytes());
    frame.extend_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(&(udp_len as u16).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(payload);
    frame
}

/// Legacy pcap writer with microsecond timestamps.
#[derive(Default)]
struct Capture {
    records: Vec<u8>,
}

impl Capture {
    fn push(&mut self, micros: u32, dst_port: u16, payload: &[u8]) {
        let data = udp_frame(dst_port, payload);
        self.records.extend_from_slice(&CAPTURE_SECONDS.to_le_bytes());
        self.records.extend_from_slice(&micros.to_le_bytes());
        self.records.extend_from_slice(&(data.len() as u32).to_le_bytes());
        self.records.extend_from_slice(&(data.len() as u32).to_le_bytes());
        self.records.extend_from_slice(&data);
    }

    /// Data packet `i` of a sweep starting at azimuth 0, 500µs apart.
    fn push_sweep_packet(&mut self, i: usize) {
        let raw = ((i * PACKET_STEP) % 36_000) as u16;
        let packet = PacketBuilder::sweep(raw, 20).fill(800, 40).build();
        self.push(i as u32 * 500, DATA_PORT, &packet);
    }

    fn write(&self, path: &Path) {
        let mut data = vec![
            0xd4, 0xc3, 0xb2, 0xa1, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0xff, 0xff, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        ];
        data.extend_from_slice(&self.records);
        std::fs::write(path, data).unwrap();
    }
}

fn sweep_capture(packets: usize) -> Capture {
    let mut capture = Capture::default();
    for i in 0..packets {
        capture.push_sweep_packet(i);
    }
    capture
}

fn convert(
    capture: &Capture,
    window: Window,
    formats: OutputFormats,
    workers: usize,
) -> (tempfile::TempDir, PathBuf, RunStats) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drive_01.pcap");
    capture.write(&path);

    let mut source = PcapSource::from_file(&path, Some(DATA_PORT)).unwrap();
    let out = dir.path().join("out");
    let mut sink = DirectorySink::create(&out, &path, formats).unwrap();
    let stats = Pipeline::new(window, workers)
        .unwrap()
        .run(&mut source, &mut sink)
        .unwrap();

    let root = sink.root().to_path_buf();
    (dir, root, stats)
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

const BOTH: OutputFormats = OutputFormats {
    txt: true,
    pcd: true,
};

#[test]
fn test_convert_two_rotations() {
    let capture = sweep_capture(2 * PACKETS_PER_ROTATION + 20);
    let (_dir, root, stats) = convert(&capture, Window::default(), BOTH, 1);

    assert_eq!(root.file_name().unwrap(), "drive_01");
    assert_eq!(stats.packets_seen, 320);
    assert_eq!(stats.packets_decoded, 320);
    assert_eq!(stats.frames_written, 2);
    assert_eq!(stats.write_errors, 0);
    assert_eq!(stats.firings_discarded, 20 * 384);

    // First firing is 383 × 3.125µs before the first capture timestamp
    assert_eq!(
        file_names(&root.join(TEXT_DIR)),
        vec![
            "0_2020-09-13_20-26-39.998803.txt",
            "1_2020-09-13_20-26-40.073803.txt",
        ]
    );
    assert_eq!(
        file_names(&root.join(PCD_DIR)),
        vec![
            "0_2020-09-13_20-26-39.998803.pcd",
            "1_2020-09-13_20-26-40.073803.pcd",
        ]
    );
}

#[test]
fn test_text_frame_contents() {
    let capture = sweep_capture(PACKETS_PER_ROTATION + 1);
    let formats = OutputFormats {
        txt: true,
        pcd: false,
    };
    let (_dir, root, _) = convert(&capture, Window::default(), formats, 1);
    assert!(!root.join(PCD_DIR).exists());

    let names = file_names(&root.join(TEXT_DIR));
    assert_eq!(names.len(), 1);
    let text = std::fs::read_to_string(root.join(TEXT_DIR).join(&names[0])).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some(TEXT_HEADER));

    let rows: Vec<Vec<&str>> = lines.map(|line| line.split(',').collect()).collect();
    assert_eq!(rows.len(), PACKETS_PER_ROTATION * 384);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.len(), 9);
        assert_eq!(row[1], (i % 16).to_string());
        assert_eq!(row[5], "40");
        assert_eq!(row[8], "2.0000");
    }
    assert_eq!(rows[0][0], "1599999999.998803");
    assert_eq!(rows[0][7], "0.000");
    assert_eq!(rows[0][6], "-15");
    assert_eq!(rows[1][6], "1");
}

#[test]
fn test_point_cloud_contents() {
    let capture = sweep_capture(PACKETS_PER_ROTATION + 1);
    let formats = OutputFormats {
        txt: false,
        pcd: true,
    };
    let (_dir, root, _) = convert(&capture, Window::default(), formats, 2);
    assert!(!root.join(TEXT_DIR).exists());

    let names = file_names(&root.join(PCD_DIR));
    assert_eq!(names.len(), 1);
    let cloud = std::fs::read_to_string(root.join(PCD_DIR).join(&names[0])).unwrap();
    assert!(!cloud.ends_with('\n'));

    let (header, data) = cloud.split_once("DATA ascii\n").unwrap();
    let points: Vec<&str> = data.lines().collect();
    assert!(header.contains(&format!("WIDTH {}\n", points.len())));
    assert!(header.contains(&format!("POINTS {}\n", points.len())));

    // Firings exactly at azimuth 0 have y == 0 and are dropped
    assert!(points.len() < PACKETS_PER_ROTATION * 384);
    assert!(points.len() > PACKETS_PER_ROTATION * 384 - 16);
    for point in points {
        let values: Vec<f64> = point.split(' ').map(|v| v.parse().unwrap()).collect();
        assert_eq!(values.len(), 4);
        assert!(values[..3].iter().all(|&v| v != 0.0));
        assert_eq!(values[3], 40.0);
    }
}

#[test]
fn test_other_ports_and_bad_packets_skipped() {
    let mut capture = Capture::default();
    for i in 0..2 * PACKETS_PER_ROTATION {
        if i % 10 == 0 {
            capture.push(i as u32 * 500, DEVICE_PORT, &[0u8; 512]);
        }
        if i == 20 {
            let bad = PacketBuilder::sweep(4_800, 20).sentinel(2, 0x1234).build();
            capture.push(i as u32 * 500, DATA_PORT, &bad);
            continue;
        }
        if i == 21 {
            capture.push(i as u32 * 500, DATA_PORT, &[0xff, 0xee, 0x00, 0x00]);
            continue;
        }
        capture.push_sweep_packet(i);
    }

    let (_dir, root, stats) = convert(&capture, Window::default(), BOTH, 3);
    // Device packets never reach the pipeline
    assert_eq!(stats.packets_seen, 300);
    assert_eq!(stats.packets_rejected, 2);
    assert_eq!(stats.packets_decoded, 298);
    assert_eq!(stats.frames_written, 1);

    let names = file_names(&root.join(TEXT_DIR));
    assert_eq!(names.len(), 1);
    let text = std::fs::read_to_string(root.join(TEXT_DIR).join(&names[0])).unwrap();
    assert_eq!(text.lines().count(), 1 + 148 * 384);
}

#[test]
fn test_window_selects_positions() {
    let capture = sweep_capture(3 * PACKETS_PER_ROTATION);

    // [0, 200) completes only the first rotation
    let (_dir, root, stats) = convert(&capture, Window::new(0, 200), BOTH, 1);
    assert_eq!(stats.packets_seen, 200);
    assert_eq!(stats.frames_written, 1);
    assert_eq!(file_names(&root.join(TEXT_DIR)).len(), 1);

    // Starting mid-rotation, the first frame runs to the next rollover
    let (_dir, root, stats) = convert(&capture, Window::new(100, 0), BOTH, 2);
    assert_eq!(stats.packets_decoded, 350);
    assert_eq!(stats.frames_written, 2);
    let names = file_names(&root.join(TEXT_DIR));
    assert!(names[0].starts_with("0_2020-09-13_20-26-40.048803"));
    let text = std::fs::read_to_string(root.join(TEXT_DIR).join(&names[0])).unwrap();
    assert_eq!(text.lines().count(), 1 + 50 * 384);
}

#[test]
fn test_parallel_output_identical() {
    let capture = sweep_capture(3 * PACKETS_PER_ROTATION + 7);
    let (_a, inline_root, inline_stats) = convert(&capture, Window::default(), BOTH, 1);
    let (_b, parallel_root, parallel_stats) = convert(&capture, Window::default(), BOTH, 4);
    assert_eq!(inline_stats, parallel_stats);

    for dir in [TEXT_DIR, PCD_DIR] {
        let names = file_names(&inline_root.join(dir));
        assert_eq!(names, file_names(&parallel_root.join(dir)));
        for name in names {
            let inline = std::fs::read(inline_root.join(dir).join(&name)).unwrap();
            let parallel = std::fs::read(parallel_root.join(dir).join(&name)).unwrap();
            assert!(inline == parallel, "{} differs", name);
        }
    }
}

#[test]
fn test_partial_rotation_not_written() {
    let capture = sweep_capture(PACKETS_PER_ROTATION - 1);
    let (_dir, root, stats) = convert(&capture, Window::default(), BOTH, 1);
    assert_eq!(stats.frames_written, 0);
    assert_eq!(stats.firings_discarded, (PACKETS_PER_ROTATION - 1) * 384);
    assert!(file_names(&root.join(TEXT_DIR)).is_empty());
    assert!(file_names(&root.join(PCD_DIR)).is_empty());
}

#[test]
fn test_missing_capture() {
    let dir = tempfile::tempdir().unwrap();
    let result = PcapSource::from_file(dir.path().join("absent.pcap"), Some(DATA_PORT));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_source_length() {
    let mut capture = sweep_capture(12);
    capture.push(9_000, DEVICE_PORT, &[1, 2, 3]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.pcap");
    capture.write(&path);

    let source = PcapSource::from_file(&path, Some(DATA_PORT)).unwrap();
    assert_eq!(source.len(), 12);
    let source = PcapSource::from_file(&path, None).unwrap();
    assert_eq!(source.len(), 13);
}
