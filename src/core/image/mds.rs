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

//! Alcohol 120% disc images (`.mds` + `.mdf`)
//!
//! The `.mds` descriptor is scanned for a `Filename=` entry naming the
//! `.mdf` data file, which is then presented as a single MODE1/2352 data
//! disc with a synthesized CUE sheet. When the descriptor names no file,
//! the sibling `.mdf` with the same stem is used. Multi-track and
//! multi-session MDS descriptors are not interpreted; such discs surface
//! only their first data file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::super::error::ImageError;
use super::SEEK_FAIL;

/// An MDS/MDF image
#[derive(Debug)]
pub struct MdsFileDevice {
    mdf_file: File,
    size: u64,
    cue_sheet: String,
}

impl MdsFileDevice {
    /// Open an MDS descriptor and the MDF data file it references
    pub fn open(mds_path: &Path) -> Result<Self, ImageError> {
        let descriptor = std::fs::read(mds_path).map_err(|source| ImageError::Open {
            path: mds_path.to_path_buf(),
            source,
        })?;

        let mdf_name = find_filename_entry(&descriptor);

        let mdf_path = match &mdf_name {
            Some(name) if name != "*.mdf" => match mds_path.parent() {
                Some(dir) => dir.join(name),
                None => Path::new(name).to_path_buf(),
            },
            // Either no entry or the conventional self-reference
            _ => mds_path.with_extension("mdf"),
        };

        let mdf_file = File::open(&mdf_path).map_err(|source| ImageError::Open {
            path: mdf_path.clone(),
            source,
        })?;
        let size = mdf_file.metadata()?.len();

        let display_name = mdf_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.mdf");
        let cue_sheet = format!(
            "FILE \"{display_name}\" BINARY\n  TRACK 01 MODE1/2352\n    INDEX 01 00:00:00\n"
        );

        log::info!(
            "Image: MDS {} -> {} ({} bytes)",
            mds_path.display(),
            mdf_path.display(),
            size
        );

        Ok(Self {
            mdf_file,
            size,
            cue_sheet,
        })
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, ImageError> {
        Ok(self.mdf_file.read(buf)?)
    }

    pub fn seek(&mut self, offset: u64) -> u64 {
        match self.mdf_file.seek(SeekFrom::Start(offset)) {
            Ok(pos) => pos,
            Err(e) => {
                log::error!("Image: MDF seek to {} failed: {}", offset, e);
                SEEK_FAIL
            }
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn tell(&mut self) -> u64 {
        self.mdf_file.stream_position().unwrap_or(SEEK_FAIL)
    }

    pub fn cue_sheet(&self) -> &str {
        &self.cue_sheet
    }
}

/// Scan the descriptor bytes for `Filename=...`, terminated by CR, LF or NUL
fn find_filename_entry(descriptor: &[u8]) -> Option<String> {
    const KEY: &[u8] = b"Filename=";

    let start = descriptor
        .windows(KEY.len())
        .position(|w| w == KEY)?
        + KEY.len();

    let rest = &descriptor[start..];
    let end = rest
        .iter()
        .position(|&b| b == b'\r' || b == b'\n' || b == 0)
        .unwrap_or(rest.len());

    let name = String::from_utf8_lossy(&rest[..end]).trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
