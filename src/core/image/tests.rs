// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Disc image backend tests
//!
//! Small images are fabricated in a temp directory; sector payloads are
//! patterned so reads can be checked for position as well as length.

use super::*;
use crate::core::error::ImageError;
use std::path::{Path, PathBuf};

/// A data file where sector n is filled with byte (n & 0xFF)
fn patterned(sectors: usize, sector_size: usize) -> Vec<u8> {
    let mut data = vec![0u8; sectors * sector_size];
    for (n, sector) in data.chunks_mut(sector_size).enumerate() {
        sector.fill(n as u8);
    }
    data
}

fn write_iso(dir: &Path, name: &str, sectors: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, patterned(sectors, 2048)).unwrap();
    path
}

#[test]
fn test_open_unknown_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.xyz");
    std::fs::write(&path, b"data").unwrap();
    assert!(matches!(
        ImageFile::open(&path),
        Err(ImageError::UnsupportedFormat { .. })
    ));
}

#[test]
fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(ImageFile::open(dir.path().join("missing.iso")).is_err());
}

#[test]
fn test_iso_basics() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_iso(dir.path(), "image.iso", 1024);

    let mut image = ImageFile::open(&path).unwrap();
    assert_eq!(image.file_type(), ImageType::Iso);
    assert_eq!(image.media_type(), MediaType::Cd);
    assert_eq!(image.size(), 1024 * 2048);
    assert_eq!(image.track_count(), 1);
    assert!(!image.is_audio_track(0));
    assert!(!image.has_subchannel());

    // The synthetic cue names a single MODE1/2048 track
    let cue = image.cue_sheet().unwrap();
    assert!(cue.contains("MODE1/2048"));
    assert!(cue.contains("INDEX 01 00:00:00"));

    // Read sector 5
    assert_eq!(image.seek(5 * 2048), 5 * 2048);
    let mut buf = vec![0u8; 2048];
    assert_eq!(image.read(&mut buf).unwrap(), 2048);
    assert!(buf.iter().all(|&b| b == 5));
    assert_eq!(image.tell(), 6 * 2048);
}

#[test]
fn test_iso_dvd_hint() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_iso(dir.path(), "movie.dvd.iso", 16);
    let image = ImageFile::open(&path).unwrap();
    assert_eq!(image.media_type(), MediaType::Dvd);
}

#[test]
fn test_cue_bin() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("game.bin"), patterned(200, 2352)).unwrap();
    std::fs::write(
        dir.path().join("game.cue"),
        "FILE \"game.bin\" BINARY\n\
         \x20 TRACK 01 MODE1/2352\n\
         \x20   INDEX 01 00:00:00\n\
         \x20 TRACK 02 AUDIO\n\
         \x20   INDEX 01 00:02:00\n",
    )
    .unwrap();

    let image = ImageFile::open(dir.path().join("game.cue")).unwrap();
    assert_eq!(image.file_type(), ImageType::CueBin);
    assert_eq!(image.track_count(), 2);
    assert_eq!(image.track_start(1), 150);
    assert!(image.is_audio_track(1));
    assert!(!image.is_audio_track(0));
    // 200 sectors total, 150 in track 1
    assert_eq!(image.track_length(0), 150);
    assert_eq!(image.track_length(1), 50);
}

#[test]
fn test_lone_bin_falls_back_to_iso() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("disc.bin"), patterned(16, 2048)).unwrap();
    let image = ImageFile::open(dir.path().join("disc.bin")).unwrap();
    assert_eq!(image.file_type(), ImageType::Iso);
}

#[test]
fn test_bin_prefers_sibling_cue() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("disc.bin"), patterned(16, 2352)).unwrap();
    std::fs::write(
        dir.path().join("disc.cue"),
        "FILE \"disc.bin\" BINARY\n  TRACK 01 AUDIO\n    INDEX 01 00:00:00\n",
    )
    .unwrap();

    let image = ImageFile::open(dir.path().join("disc.bin")).unwrap();
    assert_eq!(image.file_type(), ImageType::CueBin);
    assert!(image.is_audio_track(0));
}

fn write_ccd_set(dir: &Path, with_sub: bool) -> PathBuf {
    std::fs::write(
        dir.join("disc.ccd"),
        "[CloneCD]\r\n\
         Version=3\r\n\
         [TRACK 1]\r\n\
         MODE=1\r\n\
         INDEX 1=0\r\n\
         [TRACK 2]\r\n\
         MODE=0\r\n\
         INDEX 1=100\r\n",
    )
    .unwrap();
    std::fs::write(dir.join("disc.img"), patterned(150, 2352)).unwrap();
    if with_sub {
        let mut sub = vec![0u8; 150 * 96];
        for (n, frame) in sub.chunks_mut(96).enumerate() {
            frame.fill(n as u8 ^ 0xA5);
        }
        std::fs::write(dir.join("disc.sub"), sub).unwrap();
    }
    dir.join("disc.ccd")
}

#[test]
fn test_ccd_tracks() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_ccd_set(dir.path(), false);

    let image = ImageFile::open(&path).unwrap();
    assert_eq!(image.file_type(), ImageType::Ccd);
    assert_eq!(image.track_count(), 2);
    assert_eq!(image.track_start(0), 0);
    assert_eq!(image.track_start(1), 100);
    assert_eq!(image.track_length(0), 100);
    assert_eq!(image.track_length(1), 50);
    assert!(!image.is_audio_track(0));
    assert!(image.is_audio_track(1));
    assert!(!image.has_subchannel());

    let cue = image.cue_sheet().unwrap();
    assert!(cue.contains("TRACK 01 MODE1/2352"));
    assert!(cue.contains("TRACK 02 AUDIO"));
    // LBA 100 is 00:01:25 on the file-local timeline
    assert!(cue.contains("INDEX 01 00:01:25"));
}

#[test]
fn test_ccd_subchannel() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_ccd_set(dir.path(), true);

    let mut image = ImageFile::open(&path).unwrap();
    assert!(image.has_subchannel());

    let mut frame = [0u8; 96];
    image.read_subchannel(7, &mut frame).unwrap();
    assert!(frame.iter().all(|&b| b == 7 ^ 0xA5));
}

#[test]
fn test_ccd_without_img_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("disc.ccd"),
        "[TRACK 1]\nMODE=1\nINDEX 1=0\n",
    )
    .unwrap();
    assert!(ImageFile::open(dir.path().join("disc.ccd")).is_err());
}

#[test]
fn test_ccd_data_reads_from_img() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_ccd_set(dir.path(), false);

    let mut image = ImageFile::open(&path).unwrap();
    assert_eq!(image.seek(42 * 2352), 42 * 2352);
    let mut buf = vec![0u8; 2352];
    assert_eq!(image.read(&mut buf).unwrap(), 2352);
    assert!(buf.iter().all(|&b| b == 42));
}

#[test]
fn test_mds_with_filename_entry() {
    let dir = tempfile::tempdir().unwrap();
    // Descriptor bytes with an embedded Filename entry, as the mount
    // logic scans for it
    let mut descriptor = vec![0x4D, 0x45, 0x44, 0x49, 0x41, 0x00];
    descriptor.extend_from_slice(b"Filename=disc.mdf\r\n");
    std::fs::write(dir.path().join("disc.mds"), &descriptor).unwrap();
    std::fs::write(dir.path().join("disc.mdf"), patterned(32, 2352)).unwrap();

    let image = ImageFile::open(dir.path().join("disc.mds")).unwrap();
    assert_eq!(image.file_type(), ImageType::Mds);
    assert_eq!(image.size(), 32 * 2352);
    assert_eq!(image.track_count(), 1);
    assert!(!image.is_audio_track(0));
    assert!(image.cue_sheet().unwrap().contains("MODE1/2352"));
}

#[test]
fn test_mds_without_entry_uses_sibling() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("disc.mds"), [0u8; 16]).unwrap();
    std::fs::write(dir.path().join("disc.mdf"), patterned(8, 2352)).unwrap();

    let image = ImageFile::open(dir.path().join("disc.mds")).unwrap();
    assert_eq!(image.size(), 8 * 2352);
}

#[test]
fn test_mds_missing_mdf_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("disc.mds"), [0u8; 16]).unwrap();
    assert!(ImageFile::open(dir.path().join("disc.mds")).is_err());
}

#[test]
fn test_subchannel_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_iso(dir.path(), "image.iso", 4);
    let mut image = ImageFile::open(&path).unwrap();
    let mut frame = [0u8; 96];
    assert!(matches!(
        image.read_subchannel(0, &mut frame),
        Err(ImageError::NoSubchannel)
    ));
}

#[test]
fn test_short_read_at_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_iso(dir.path(), "image.iso", 2);
    let mut image = ImageFile::open(&path).unwrap();

    image.seek(2048 + 1024);
    let mut buf = vec![0u8; 2048];
    assert_eq!(image.read(&mut buf).unwrap(), 1024);
}
