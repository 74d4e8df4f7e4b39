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

//! CloneCD disc images (`.ccd` + `.img` + optional `.sub`)
//!
//! The `.ccd` file is INI-style text with one `[TRACK N]` section per
//! track, carrying `MODE=` (0 = audio, 1 = data) and `INDEX 1=` (start
//! LBA). Sector data lives in the sibling `.img` as raw 2352-byte sectors;
//! a sibling `.sub`, when present, holds one 96-byte subchannel frame per
//! sector. A CUE sheet is synthesized from the parsed table so the TOC
//! path is the same as for CUE/BIN images.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::super::cdrom::SUBCHANNEL_SIZE;
use super::super::error::ImageError;
use super::SEEK_FAIL;

#[derive(Debug, Clone, Copy, Default)]
struct CcdTrack {
    start_lba: u32,
    length: u32,
    is_audio: bool,
}

/// A CloneCD image
#[derive(Debug)]
pub struct CcdFileDevice {
    img_file: File,
    sub_file: Option<File>,
    img_size: u64,
    cue_sheet: String,
    tracks: Vec<CcdTrack>,
}

impl CcdFileDevice {
    /// Open a CloneCD image from its `.ccd` control file
    pub fn open(ccd_path: &Path) -> Result<Self, ImageError> {
        let text = std::fs::read_to_string(ccd_path).map_err(|source| ImageError::Open {
            path: ccd_path.to_path_buf(),
            source,
        })?;

        let mut tracks = parse_ccd(&text, ccd_path)?;

        let img_path = ccd_path.with_extension("img");
        let mut img_file = File::open(&img_path).map_err(|source| ImageError::Open {
            path: img_path.clone(),
            source,
        })?;
        let img_size = img_file.metadata()?.len();
        img_file.seek(SeekFrom::Start(0))?;

        // Track lengths: distance to the next track, last one from file size
        for i in 0..tracks.len().saturating_sub(1) {
            tracks[i].length = tracks[i + 1].start_lba.saturating_sub(tracks[i].start_lba);
        }
        if let Some(last) = tracks.last_mut() {
            last.length = ((img_size / 2352) as u32).saturating_sub(last.start_lba);
        }

        let sub_path = ccd_path.with_extension("sub");
        let sub_file = File::open(&sub_path).ok();
        if sub_file.is_some() {
            log::info!("Image: found subchannel data at {}", sub_path.display());
        }

        let cue_sheet = generate_cue(ccd_path, &tracks);

        log::info!(
            "Image: CCD {} with {} track(s), {} bytes",
            ccd_path.display(),
            tracks.len(),
            img_size
        );

        Ok(Self {
            img_file,
            sub_file,
            img_size,
            cue_sheet,
            tracks,
        })
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, ImageError> {
        Ok(self.img_file.read(buf)?)
    }

    pub fn seek(&mut self, offset: u64) -> u64 {
        match self.img_file.seek(SeekFrom::Start(offset)) {
            Ok(pos) => pos,
            Err(e) => {
                log::error!("Image: CCD seek to {} failed: {}", offset, e);
                SEEK_FAIL
            }
        }
    }

    pub fn size(&self) -> u64 {
        self.img_size
    }

    pub fn tell(&mut self) -> u64 {
        self.img_file.stream_position().unwrap_or(SEEK_FAIL)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track_start(&self, track: usize) -> u32 {
        self.tracks.get(track).map(|t| t.start_lba).unwrap_or(0)
    }

    pub fn track_length(&self, track: usize) -> u32 {
        self.tracks.get(track).map(|t| t.length).unwrap_or(0)
    }

    pub fn is_audio_track(&self, track: usize) -> bool {
        self.tracks.get(track).map(|t| t.is_audio).unwrap_or(false)
    }

    pub fn has_subchannel(&self) -> bool {
        self.sub_file.is_some()
    }

    /// Read the 96-byte subchannel frame for an LBA from the `.sub` file
    pub fn read_subchannel(&mut self, lba: u32, out: &mut [u8; 96]) -> Result<(), ImageError> {
        let Some(sub) = self.sub_file.as_mut() else {
            return Err(ImageError::NoSubchannel);
        };

        sub.seek(SeekFrom::Start(u64::from(lba) * SUBCHANNEL_SIZE as u64))?;
        sub.read_exact(out)?;
        Ok(())
    }

    pub fn cue_sheet(&self) -> &str {
        &self.cue_sheet
    }
}

/// Parse `[TRACK N]` sections with `MODE=` and `INDEX 1=` keys
fn parse_ccd(text: &str, path: &Path) -> Result<Vec<CcdTrack>, ImageError> {
    let track_count = text
        .lines()
        .filter(|l| {
            let l = l.trim();
            l.len() >= 7 && l[..7].eq_ignore_ascii_case("[TRACK ")
        })
        .count();

    if track_count == 0 {
        return Err(ImageError::Malformed {
            kind: "CCD",
            path: path.to_path_buf(),
            detail: "no [TRACK] sections".into(),
        });
    }

    let mut tracks = vec![CcdTrack::default(); track_count];
    let mut current: Option<usize> = None;

    for line in text.lines() {
        let line = line.trim();

        if line.len() >= 7 && line[..7].eq_ignore_ascii_case("[TRACK ") {
            let number: u32 = line[7..]
                .trim_end_matches(']')
                .trim()
                .parse()
                .unwrap_or(0);
            if number == 0 || number as usize > track_count {
                log::warn!("Image: CCD track number out of bounds: {}", line);
                current = None;
                continue;
            }
            current = Some(number as usize - 1);
        } else if line.starts_with('[') {
            // [CloneCD], [Disc], [Session N], [Entry N] sections are not needed
            current = None;
        } else if let Some(idx) = current {
            if let Some(value) = key_value(line, "MODE") {
                tracks[idx].is_audio = value.trim().parse::<u32>().unwrap_or(1) == 0;
            } else if let Some(value) =
                key_value(line, "INDEX 1").or_else(|| key_value(line, "INDEX 01"))
            {
                tracks[idx].start_lba = value.trim().parse().unwrap_or(0);
            }
        }
    }

    Ok(tracks)
}

/// Match a `KEY=value` line case-insensitively, returning the value
fn key_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    if line.len() > key.len() + 1
        && line[..key.len()].eq_ignore_ascii_case(key)
        && line.as_bytes()[key.len()] == b'='
    {
        Some(&line[key.len() + 1..])
    } else {
        None
    }
}

/// Synthesize a CUE sheet from the parsed track table
fn generate_cue(ccd_path: &Path, tracks: &[CcdTrack]) -> String {
    let img_name = ccd_path
        .with_extension("img")
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image.img")
        .to_string();

    let mut cue = format!("FILE \"{img_name}\" BINARY\n");
    for (i, track) in tracks.iter().enumerate() {
        let mode = if track.is_audio { "AUDIO" } else { "MODE1/2352" };
        cue.push_str(&format!("  TRACK {:02} {}\n", i + 1, mode));

        let lba = track.start_lba;
        cue.push_str(&format!(
            "    INDEX 01 {:02}:{:02}:{:02}\n",
            lba / (75 * 60),
            (lba / 75) % 60,
            lba % 75
        ));
    }
    cue
}
