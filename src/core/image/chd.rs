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

//! MAME CHD disc images
//!
//! CHD files store CD frames inside compressed hunks; track layout lives in
//! per-track metadata tags (`TRACK:n TYPE:... SUBTYPE:... FRAMES:n
//! PREGAP:n`). Hunks are decompressed on demand and the last one is cached,
//! so sequential reads decompress each hunk once. Byte offsets are in the
//! 2352-bytes-per-sector space the rest of the gadget uses; they are
//! translated here to (hunk, frame, in-frame) positions. CHD pads each
//! track to a multiple of 4 frames in the hunk stream and stores CD-DA
//! samples big-endian; both quirks are hidden from callers.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chd::iter::LendingIterator;
use chd::Chd;

use super::super::cdrom::{RAW_SECTOR_SIZE, SUBCHANNEL_SIZE};
use super::super::error::ImageError;
use super::SEEK_FAIL;

#[derive(Debug, Clone, Copy)]
struct ChdTrack {
    number: u8,
    is_audio: bool,
    is_mode2: bool,
    frames: u32,
    pregap: u32,
    has_subcode: bool,
    /// Cumulative stored frames before this track (logical space)
    stored_start: u32,
    /// Frame index in the hunk stream (tracks padded to 4-frame boundaries)
    physical_start: u32,
}

/// A CHD image
pub struct ChdFileDevice {
    chd: Chd<BufReader<File>>,
    tracks: Vec<ChdTrack>,
    cue_sheet: String,
    offset: u64,
    size: u64,
    frames_per_hunk: u32,
    unit_bytes: u32,
    compressed_buf: Vec<u8>,
    hunk_buf: Vec<u8>,
    cached_hunk: u32,
    frame_buf: [u8; RAW_SECTOR_SIZE],
}

impl std::fmt::Debug for ChdFileDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChdFileDevice")
            .field("tracks", &self.tracks.len())
            .field("size", &self.size)
            .field("cached_hunk", &self.cached_hunk)
            .finish()
    }
}

impl ChdFileDevice {
    /// Open a CHD image and parse its track metadata
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        let file = File::open(path).map_err(|source| ImageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut chd = Chd::open(BufReader::new(file), None)?;

        let mut metas = Vec::new();
        {
            let mut iter = chd.metadata();
            while let Some(mut entry) = iter.next() {
                let metadata = entry.read()?;
                if let Some(meta) = TrackMeta::parse(&metadata.value) {
                    metas.push(meta);
                }
            }
        }

        if metas.is_empty() {
            return Err(ImageError::Malformed {
                kind: "CHD",
                path: path.to_path_buf(),
                detail: "no CD track metadata".into(),
            });
        }
        metas.sort_by_key(|m| m.number);

        let mut tracks = Vec::with_capacity(metas.len());
        let mut stored = 0u32;
        let mut physical = 0u32;
        for meta in &metas {
            tracks.push(ChdTrack {
                number: meta.number,
                is_audio: meta.is_audio,
                is_mode2: meta.is_mode2,
                frames: meta.frames,
                pregap: meta.pregap,
                has_subcode: meta.has_subcode,
                stored_start: stored,
                physical_start: physical,
            });
            stored += meta.frames;
            // CHD pads every track to a multiple of 4 frames
            physical += meta.frames;
            if physical % 4 != 0 {
                physical = (physical & !3) + 4;
            }
        }

        let header = chd.header();
        let hunk_size = header.hunk_size();
        let unit_bytes = header.unit_bytes();
        let frames_per_hunk = hunk_size / unit_bytes;
        let hunk_buf = chd.get_hunksized_buffer();
        let compressed_buf = Vec::with_capacity(hunk_size as usize);

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.chd");
        let cue_sheet = generate_cue(name, &tracks);
        let size = u64::from(stored) * RAW_SECTOR_SIZE as u64;

        log::info!(
            "Image: CHD {} with {} track(s), {} frames, hunk {} bytes x {} frames",
            path.display(),
            tracks.len(),
            stored,
            hunk_size,
            frames_per_hunk
        );

        Ok(Self {
            chd,
            tracks,
            cue_sheet,
            offset: 0,
            size,
            frames_per_hunk,
            unit_bytes,
            compressed_buf,
            hunk_buf,
            cached_hunk: u32::MAX,
            frame_buf: [0; RAW_SECTOR_SIZE],
        })
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, ImageError> {
        let mut done = 0;
        while done < buf.len() && self.offset < self.size {
            let frame = (self.offset / RAW_SECTOR_SIZE as u64) as u32;
            let in_frame = (self.offset % RAW_SECTOR_SIZE as u64) as usize;

            self.load_frame(frame)?;

            let take = (buf.len() - done)
                .min(RAW_SECTOR_SIZE - in_frame)
                .min((self.size - self.offset) as usize);
            buf[done..done + take].copy_from_slice(&self.frame_buf[in_frame..in_frame + take]);
            done += take;
            self.offset += take as u64;
        }
        Ok(done)
    }

    /// Decode one stored frame into `frame_buf`, via the hunk cache
    fn load_frame(&mut self, frame: u32) -> Result<(), ImageError> {
        let track = self
            .tracks
            .iter()
            .rfind(|t| frame >= t.stored_start)
            .copied()
            .unwrap_or(self.tracks[0]);

        let physical = track.physical_start + (frame - track.stored_start);
        let hunk_no = physical / self.frames_per_hunk;
        let hunk_offset = ((physical % self.frames_per_hunk) * self.unit_bytes) as usize;

        if hunk_no != self.cached_hunk {
            let mut hunk = self.chd.hunk(hunk_no)?;
            self.compressed_buf.clear();
            hunk.read_hunk_in(&mut self.compressed_buf, &mut self.hunk_buf)?;
            self.cached_hunk = hunk_no;
        }

        self.frame_buf
            .copy_from_slice(&self.hunk_buf[hunk_offset..hunk_offset + RAW_SECTOR_SIZE]);

        // CHD stores CD-DA samples big-endian; the wire format is little
        if track.is_audio {
            for pair in self.frame_buf.chunks_exact_mut(2) {
                pair.swap(0, 1);
            }
        }
        Ok(())
    }

    pub fn seek(&mut self, offset: u64) -> u64 {
        if offset > self.size {
            return SEEK_FAIL;
        }
        self.offset = offset;
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn tell(&mut self) -> u64 {
        self.offset
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track_start(&self, track: usize) -> u32 {
        self.tracks
            .get(track)
            .map(|t| t.stored_start)
            .unwrap_or(0)
    }

    pub fn track_length(&self, track: usize) -> u32 {
        self.tracks.get(track).map(|t| t.frames).unwrap_or(0)
    }

    pub fn is_audio_track(&self, track: usize) -> bool {
        self.tracks.get(track).map(|t| t.is_audio).unwrap_or(false)
    }

    pub fn has_subchannel(&self) -> bool {
        self.unit_bytes as usize >= RAW_SECTOR_SIZE + SUBCHANNEL_SIZE
            && self.tracks.iter().any(|t| t.has_subcode)
    }

    /// Read the subcode portion of a frame (bytes 2352..2448 of the unit)
    pub fn read_subchannel(&mut self, lba: u32, out: &mut [u8; 96]) -> Result<(), ImageError> {
        if !self.has_subchannel() {
            return Err(ImageError::NoSubchannel);
        }

        let track = self
            .tracks
            .iter()
            .rfind(|t| lba >= t.stored_start)
            .copied()
            .unwrap_or(self.tracks[0]);
        let physical = track.physical_start + (lba - track.stored_start);
        let hunk_no = physical / self.frames_per_hunk;
        let hunk_offset = ((physical % self.frames_per_hunk) * self.unit_bytes) as usize;

        if hunk_no != self.cached_hunk {
            let mut hunk = self.chd.hunk(hunk_no)?;
            self.compressed_buf.clear();
            hunk.read_hunk_in(&mut self.compressed_buf, &mut self.hunk_buf)?;
            self.cached_hunk = hunk_no;
        }

        let start = hunk_offset + RAW_SECTOR_SIZE;
        out.copy_from_slice(&self.hunk_buf[start..start + SUBCHANNEL_SIZE]);
        Ok(())
    }

    pub fn cue_sheet(&self) -> &str {
        &self.cue_sheet
    }
}

#[derive(Debug, Clone, Copy)]
struct TrackMeta {
    number: u8,
    is_audio: bool,
    is_mode2: bool,
    frames: u32,
    pregap: u32,
    has_subcode: bool,
}

impl TrackMeta {
    /// Parse one `CDTRACK` metadata value of the form
    /// `TRACK:1 TYPE:MODE1_RAW SUBTYPE:NONE FRAMES:1234 PREGAP:0 ...`
    fn parse(ascii: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(ascii).ok()?;

        let mut number: Option<u8> = None;
        let mut track_type: Option<&str> = None;
        let mut subtype = "NONE";
        let mut frames: Option<u32> = None;
        let mut pregap = 0u32;

        for token in text.split_ascii_whitespace() {
            let Some((key, value)) = token.split_once(':') else {
                continue;
            };
            match key {
                "TRACK" => number = value.parse().ok(),
                "TYPE" => track_type = Some(value),
                "SUBTYPE" => subtype = value,
                "FRAMES" => frames = value.parse().ok(),
                "PREGAP" => pregap = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        let track_type = track_type?;
        Some(Self {
            number: number?,
            is_audio: track_type == "AUDIO",
            is_mode2: track_type.contains("MODE2"),
            frames: frames?,
            pregap,
            has_subcode: subtype != "NONE",
        })
    }
}

/// Regenerate a CUE sheet from the CHD track metadata
fn generate_cue(name: &str, tracks: &[ChdTrack]) -> String {
    let mut cue = format!("FILE \"{name}\" BINARY\n");
    for track in tracks {
        let mode = if track.is_audio {
            "AUDIO"
        } else if track.is_mode2 {
            "MODE2/2352"
        } else {
            "MODE1/2352"
        };
        cue.push_str(&format!("  TRACK {:02} {}\n", track.number, mode));

        if track.pregap > 0 {
            cue.push_str(&format!(
                "    PREGAP {:02}:{:02}:{:02}\n",
                track.pregap / (75 * 60),
                (track.pregap / 75) % 60,
                track.pregap % 75
            ));
        }

        let lba = track.stored_start;
        cue.push_str(&format!(
            "    INDEX 01 {:02}:{:02}:{:02}\n",
            lba / (75 * 60),
            (lba / 75) % 60,
            lba % 75
        ));
    }
    cue
}
