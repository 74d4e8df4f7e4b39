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

//! Disc image backends
//!
//! One mounted image at a time, behind a uniform read-cursor interface:
//! byte-addressable `read`/`seek`/`size`/`tell`, a track table, an optional
//! 96-byte subchannel stream, and a CUE sheet from which the TOC is
//! derived. The concrete formats:
//!
//! | Extension        | Backend                | Notes                          |
//! |------------------|------------------------|--------------------------------|
//! | `.iso`           | [`CueBinFileDevice`]   | synthetic single-track cue     |
//! | `.cue` + `.bin`  | [`CueBinFileDevice`]   | cue text drives the layout     |
//! | `.ccd` + `.img`  | [`CcdFileDevice`]      | optional `.sub` subchannel     |
//! | `.chd`           | [`ChdFileDevice`]      | MAME compressed hunks          |
//! | `.mds` + `.mdf`  | [`MdsFileDevice`]      | single MODE1/2352 track        |
//!
//! A `.dvd.` hint anywhere in the file name (e.g. `movie.dvd.iso`) marks
//! the medium as a DVD for capability reporting.

mod ccd;
mod chd;
mod cuebin;
mod mds;
#[cfg(test)]
mod tests;

pub use ccd::CcdFileDevice;
pub use chd::ChdFileDevice;
pub use cuebin::CueBinFileDevice;
pub use mds::MdsFileDevice;

use std::path::Path;

use super::error::ImageError;

/// Sentinel returned by [`ImageFile::seek`] on failure
pub const SEEK_FAIL: u64 = u64::MAX;

/// Kind of medium being emulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaType {
    /// No medium loaded
    #[default]
    None,
    /// CD-ROM (the default for every image)
    Cd,
    /// DVD-ROM (from the `.dvd.` file name hint or config override)
    Dvd,
}

/// On-disk format of the mounted image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    /// Plain ISO image
    Iso,
    /// CUE/BIN pair
    CueBin,
    /// CloneCD CCD/IMG/SUB
    Ccd,
    /// MAME compressed hunks of data
    Chd,
    /// Alcohol 120% MDS/MDF pair
    Mds,
}

/// A mounted disc image
///
/// A sum type over the format backends; the SCSI layer never learns which
/// variant is mounted. Exactly one image exists at a time: it is created by
/// a mount request, owned by the gadget for its lifetime, and dropped on
/// the next mount or shutdown.
#[derive(Debug)]
pub enum ImageFile {
    /// ISO or CUE/BIN image
    CueBin(CueBinFileDevice),
    /// CloneCD image
    Ccd(CcdFileDevice),
    /// CHD image
    Chd(ChdFileDevice),
    /// MDS/MDF image
    Mds(MdsFileDevice),
}

impl ImageFile {
    /// Open a disc image, dispatching on the file extension
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the image file (`.iso`, `.cue`, `.bin`, `.ccd`,
    ///   `.img`, `.chd` or `.mds`)
    ///
    /// # Returns
    ///
    /// - `Ok(ImageFile)` on success
    /// - `Err(ImageError)` if the format is unknown or any referenced file
    ///   fails to open or parse; the caller reverts to NO MEDIUM
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cdgadget::core::image::ImageFile;
    ///
    /// let image = ImageFile::open("games/chrono.cue").unwrap();
    /// assert!(image.track_count() > 0);
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let media = if has_dvd_hint(path) {
            MediaType::Dvd
        } else {
            MediaType::Cd
        };

        log::info!("Image: opening {} ({})", path.display(), ext);

        match ext.as_str() {
            "iso" => Ok(Self::CueBin(CueBinFileDevice::open_iso(path, media)?)),
            "cue" => Ok(Self::CueBin(CueBinFileDevice::open_cue(path, media)?)),
            "bin" => {
                // Prefer a sibling cue sheet; a lone .bin is treated as a
                // single-track data disc
                let cue = path.with_extension("cue");
                if cue.exists() {
                    Ok(Self::CueBin(CueBinFileDevice::open_cue(&cue, media)?))
                } else {
                    Ok(Self::CueBin(CueBinFileDevice::open_iso(path, media)?))
                }
            }
            "ccd" => Ok(Self::Ccd(CcdFileDevice::open(path)?)),
            "img" => Ok(Self::Ccd(CcdFileDevice::open(&path.with_extension("ccd"))?)),
            "chd" => Ok(Self::Chd(ChdFileDevice::open(path)?)),
            "mds" => Ok(Self::Mds(MdsFileDevice::open(path)?)),
            _ => Err(ImageError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Read at the current cursor, advancing it
    ///
    /// Returns the number of bytes read; fewer than requested means the
    /// cursor ran into the end of the image.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, ImageError> {
        match self {
            Self::CueBin(dev) => dev.read(buf),
            Self::Ccd(dev) => dev.read(buf),
            Self::Chd(dev) => dev.read(buf),
            Self::Mds(dev) => dev.read(buf),
        }
    }

    /// Move the cursor to an absolute byte offset
    ///
    /// Returns the new position, or [`SEEK_FAIL`] on failure.
    pub fn seek(&mut self, offset: u64) -> u64 {
        match self {
            Self::CueBin(dev) => dev.seek(offset),
            Self::Ccd(dev) => dev.seek(offset),
            Self::Chd(dev) => dev.seek(offset),
            Self::Mds(dev) => dev.seek(offset),
        }
    }

    /// Total size of the image data in bytes
    pub fn size(&self) -> u64 {
        match self {
            Self::CueBin(dev) => dev.size(),
            Self::Ccd(dev) => dev.size(),
            Self::Chd(dev) => dev.size(),
            Self::Mds(dev) => dev.size(),
        }
    }

    /// Current cursor position
    pub fn tell(&mut self) -> u64 {
        match self {
            Self::CueBin(dev) => dev.tell(),
            Self::Ccd(dev) => dev.tell(),
            Self::Chd(dev) => dev.tell(),
            Self::Mds(dev) => dev.tell(),
        }
    }

    /// On-disk format tag
    pub fn file_type(&self) -> ImageType {
        match self {
            Self::CueBin(dev) => dev.file_type(),
            Self::Ccd(_) => ImageType::Ccd,
            Self::Chd(_) => ImageType::Chd,
            Self::Mds(_) => ImageType::Mds,
        }
    }

    /// Medium kind for capability reporting
    pub fn media_type(&self) -> MediaType {
        match self {
            Self::CueBin(dev) => dev.media_type(),
            Self::Ccd(_) | Self::Chd(_) | Self::Mds(_) => MediaType::Cd,
        }
    }

    /// Number of tracks on the disc
    pub fn track_count(&self) -> usize {
        match self {
            Self::CueBin(dev) => dev.track_count(),
            Self::Ccd(dev) => dev.track_count(),
            Self::Chd(dev) => dev.track_count(),
            Self::Mds(_) => 1,
        }
    }

    /// Start LBA of a zero-based track index
    pub fn track_start(&self, track: usize) -> u32 {
        match self {
            Self::CueBin(dev) => dev.track_start(track),
            Self::Ccd(dev) => dev.track_start(track),
            Self::Chd(dev) => dev.track_start(track),
            Self::Mds(_) => 0,
        }
    }

    /// Length in sectors of a zero-based track index
    pub fn track_length(&self, track: usize) -> u32 {
        match self {
            Self::CueBin(dev) => dev.track_length(track),
            Self::Ccd(dev) => dev.track_length(track),
            Self::Chd(dev) => dev.track_length(track),
            Self::Mds(dev) => (dev.size() / 2352) as u32,
        }
    }

    /// True if a zero-based track index is CD-DA audio
    pub fn is_audio_track(&self, track: usize) -> bool {
        match self {
            Self::CueBin(dev) => dev.is_audio_track(track),
            Self::Ccd(dev) => dev.is_audio_track(track),
            Self::Chd(dev) => dev.is_audio_track(track),
            Self::Mds(_) => false,
        }
    }

    /// True if the image carries 96-byte subchannel frames
    pub fn has_subchannel(&self) -> bool {
        match self {
            Self::Ccd(dev) => dev.has_subchannel(),
            Self::Chd(dev) => dev.has_subchannel(),
            Self::CueBin(_) | Self::Mds(_) => false,
        }
    }

    /// Read the 96-byte subchannel frame for an LBA
    pub fn read_subchannel(&mut self, lba: u32, out: &mut [u8; 96]) -> Result<(), ImageError> {
        match self {
            Self::Ccd(dev) => dev.read_subchannel(lba, out),
            Self::Chd(dev) => dev.read_subchannel(lba, out),
            Self::CueBin(_) | Self::Mds(_) => Err(ImageError::NoSubchannel),
        }
    }

    /// CUE sheet describing the disc layout
    pub fn cue_sheet(&self) -> Option<&str> {
        match self {
            Self::CueBin(dev) => Some(dev.cue_sheet()),
            Self::Ccd(dev) => Some(dev.cue_sheet()),
            Self::Chd(dev) => Some(dev.cue_sheet()),
            Self::Mds(dev) => Some(dev.cue_sheet()),
        }
    }
}

/// True if the file name carries a `.dvd.` marker (e.g. `movie.dvd.iso`)
pub fn has_dvd_hint(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_ascii_lowercase().contains(".dvd."))
        .unwrap_or(false)
}
