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

//! ISO and CUE/BIN disc images
//!
//! The simplest backend: a thin shim over one binary data file plus a CUE
//! sheet. For a plain `.iso` the cue sheet is synthesized at mount as a
//! single MODE1/2048 data track.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::super::cdrom::TrackList;
use super::super::error::ImageError;
use super::{ImageType, MediaType, SEEK_FAIL};

/// An ISO or CUE/BIN image
#[derive(Debug)]
pub struct CueBinFileDevice {
    file: File,
    size: u64,
    cue_sheet: String,
    file_type: ImageType,
    media_type: MediaType,
    // Flattened for the track-table interface
    tracks: TrackList,
}

impl CueBinFileDevice {
    /// Open a plain data image as a single MODE1/2048 track
    pub fn open_iso(path: &Path, media_type: MediaType) -> Result<Self, ImageError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.iso");
        let cue_sheet = format!(
            "FILE \"{name}\" BINARY\n  TRACK 01 MODE1/2048\n    INDEX 01 00:00:00\n"
        );
        Self::open_with_sheet(path, cue_sheet, ImageType::Iso, media_type)
    }

    /// Open a CUE sheet and the binary file it references
    ///
    /// The data file named on the first `FILE` line is resolved relative to
    /// the cue's directory. Multi-file sheets are parsed for track layout,
    /// but sector data is served from the first file.
    pub fn open_cue(path: &Path, media_type: MediaType) -> Result<Self, ImageError> {
        let cue_sheet = std::fs::read_to_string(path).map_err(|source| ImageError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let bin_name = bin_name_from_cue(&cue_sheet).ok_or_else(|| ImageError::Malformed {
            kind: "CUE",
            path: path.to_path_buf(),
            detail: "no FILE line".into(),
        })?;

        let bin_path = match path.parent() {
            Some(dir) => dir.join(&bin_name),
            None => Path::new(&bin_name).to_path_buf(),
        };

        Self::open_with_sheet(&bin_path, cue_sheet, ImageType::CueBin, media_type)
    }

    fn open_with_sheet(
        data_path: &Path,
        cue_sheet: String,
        file_type: ImageType,
        media_type: MediaType,
    ) -> Result<Self, ImageError> {
        let file = File::open(data_path).map_err(|source| ImageError::Open {
            path: data_path.to_path_buf(),
            source,
        })?;
        let size = file.metadata()?.len();
        let tracks = TrackList::from_cue_sheet(&cue_sheet, size);

        log::info!(
            "Image: {} is {} bytes, {} track(s)",
            data_path.display(),
            size,
            tracks.len()
        );

        Ok(Self {
            file,
            size,
            cue_sheet,
            file_type,
            media_type,
            tracks,
        })
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, ImageError> {
        Ok(self.file.read(buf)?)
    }

    pub fn seek(&mut self, offset: u64) -> u64 {
        match self.file.seek(SeekFrom::Start(offset)) {
            Ok(pos) => pos,
            Err(e) => {
                log::error!("Image: seek to {} failed: {}", offset, e);
                SEEK_FAIL
            }
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn tell(&mut self) -> u64 {
        self.file
            .stream_position()
            .unwrap_or(SEEK_FAIL)
    }

    pub fn file_type(&self) -> ImageType {
        self.file_type
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track_start(&self, track: usize) -> u32 {
        self.tracks
            .iter()
            .nth(track)
            .map(|t| t.data_start)
            .unwrap_or(0)
    }

    pub fn track_length(&self, track: usize) -> u32 {
        self.tracks
            .iter()
            .nth(track)
            .map(|t| self.tracks.track_length(t.track_number))
            .unwrap_or(0)
    }

    pub fn is_audio_track(&self, track: usize) -> bool {
        self.tracks
            .iter()
            .nth(track)
            .map(|t| t.track_mode == crate::core::cue::CueTrackMode::Audio)
            .unwrap_or(false)
    }

    pub fn cue_sheet(&self) -> &str {
        &self.cue_sheet
    }
}

/// Pull the file name out of the first `FILE "..."` line of a cue sheet
fn bin_name_from_cue(cue: &str) -> Option<String> {
    for line in cue.lines() {
        let line = line.trim_start();
        if line.len() >= 5 && line[..5].eq_ignore_ascii_case("FILE ") {
            let rest = &line[5..];
            let open = rest.find('"')?;
            let body = &rest[open + 1..];
            let close = body.find('"')?;
            let mut name = &body[..close];
            if name.starts_with("./") || name.starts_with(".\\") {
                name = &name[2..];
            }
            return Some(name.to_string());
        }
    }
    None
}
