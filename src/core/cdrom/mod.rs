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

//! CD utilities
//!
//! Pure helpers shared by the SCSI handlers and the update pump:
//!
//! - LBA ↔ MSF conversion (binary and BCD encodings; 75 frames per second,
//!   `lba + 150 == total MSF frames`)
//! - the 4-byte address word used in READ SUB-CHANNEL replies
//! - READ CD main-channel-selection (MCS) decoding into a transfer length
//!   and a skip offset within a 2352-byte raw sector
//! - per-track source blocksize / skip tables
//! - the [`TrackList`] flattened out of a CUE sheet at mount time, with
//!   track lookup by LBA or number, leadout and medium classification

#[cfg(test)]
mod tests;

use bitflags::bitflags;

use super::cue::{CueParser, CueTrackInfo, CueTrackMode};

/// Frames between the start of the lead-in and LBA 0
pub const LEADOUT_OFFSET: u32 = 150;

/// Size of a raw CD sector
pub const RAW_SECTOR_SIZE: usize = 2352;
/// Sync pattern length at the start of a raw sector
pub const SYNC_SIZE: usize = 12;
/// Mode 1 header length (MM SS FF mode)
pub const HEADER_SIZE: usize = 4;
/// User data payload of a Mode 1 sector
pub const USER_DATA_SIZE: usize = 2048;
/// EDC/ECC trailer of a Mode 1 sector
pub const EDC_ECC_SIZE: usize = 288;
/// One raw P-W subchannel frame
pub const SUBCHANNEL_SIZE: usize = 96;

/// Convert a binary value (0..=99) to BCD
#[inline]
pub fn dec_to_bcd(val: u8) -> u8 {
    ((val / 10) << 4) | (val % 10)
}

/// Convert a BCD value to binary
#[inline]
pub fn bcd_to_dec(val: u8) -> u8 {
    (val >> 4) * 10 + (val & 0x0F)
}

/// An MSF (minutes : seconds : frames) disc address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Msf {
    /// Minutes (0..=99)
    pub minute: u8,
    /// Seconds (0..=59)
    pub second: u8,
    /// Frames (0..=74)
    pub frame: u8,
}

/// Convert an LBA to MSF, including the 150-frame lead-in offset
///
/// # Example
///
/// ```
/// use cdgadget::core::cdrom::lba_to_msf;
///
/// let msf = lba_to_msf(0);
/// assert_eq!((msf.minute, msf.second, msf.frame), (0, 2, 0));
/// ```
pub fn lba_to_msf(lba: u32) -> Msf {
    let frames = lba + LEADOUT_OFFSET;
    Msf {
        minute: (frames / (60 * 75)) as u8,
        second: ((frames / 75) % 60) as u8,
        frame: (frames % 75) as u8,
    }
}

/// Convert an LBA to MSF with each component BCD-encoded
pub fn lba_to_msf_bcd(lba: u32) -> Msf {
    let msf = lba_to_msf(lba);
    Msf {
        minute: dec_to_bcd(msf.minute),
        second: dec_to_bcd(msf.second),
        frame: dec_to_bcd(msf.frame),
    }
}

/// Convert an MSF address to a total frame count
///
/// This is the raw total; callers subtract [`LEADOUT_OFFSET`] when an LBA
/// relative to the start of the data area is required.
#[inline]
pub fn msf_to_lba(minutes: u8, seconds: u8, frames: u8) -> u32 {
    u32::from(minutes) * 60 * 75 + u32::from(seconds) * 75 + u32::from(frames)
}

/// Build the 4-byte address word used in READ SUB-CHANNEL replies
///
/// The LBA form is plain big-endian. The MSF form packs the BCD components
/// in ascending byte order with a trailing pad byte; relative addresses are
/// computed by the caller before encoding.
pub fn get_address(lba: u32, msf: bool) -> [u8; 4] {
    if msf {
        let enc = lba_to_msf_bcd(lba);
        [enc.minute, enc.second, enc.frame, 0]
    } else {
        lba.to_be_bytes()
    }
}

bitflags! {
    /// READ CD main channel selection bits (CDB byte 9 bits 7..3)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mcs: u8 {
        /// Include the 12-byte sync pattern
        const SYNC = 0x10;
        /// Include the 4-byte sector header
        const HEADER = 0x08;
        /// Include the 2048-byte user data area
        const USER_DATA = 0x04;
        /// Include the 288-byte EDC/ECC trailer
        const EDC_ECC = 0x02;
        /// C2 error information (not supplied by this device)
        const C2_ERROR = 0x01;
    }
}

/// Bytes to transfer per sector for a given main channel selection
///
/// The sum of the selected regions of a 2352-byte raw sector.
pub fn sector_length_from_mcs(mcs: Mcs) -> u32 {
    let mut length = 0;
    if mcs.contains(Mcs::SYNC) {
        length += SYNC_SIZE as u32;
    }
    if mcs.contains(Mcs::HEADER) {
        length += HEADER_SIZE as u32;
    }
    if mcs.contains(Mcs::USER_DATA) {
        length += USER_DATA_SIZE as u32;
    }
    if mcs.contains(Mcs::EDC_ECC) {
        length += EDC_ECC_SIZE as u32;
    }
    length
}

/// Offset into a 2352-byte raw sector of the first selected region
pub fn skip_bytes_from_mcs(mcs: Mcs) -> u32 {
    if mcs.contains(Mcs::SYNC) {
        0
    } else if mcs.contains(Mcs::HEADER) {
        SYNC_SIZE as u32
    } else if mcs.contains(Mcs::USER_DATA) {
        (SYNC_SIZE + HEADER_SIZE) as u32
    } else if mcs.contains(Mcs::EDC_ECC) {
        (SYNC_SIZE + HEADER_SIZE + USER_DATA_SIZE) as u32
    } else {
        0
    }
}

/// Source sector size in the image for a track mode
pub fn blocksize_for_track(mode: CueTrackMode) -> u32 {
    match mode {
        CueTrackMode::Mode1_2048 => 2048,
        CueTrackMode::Mode1_2352 => 2352,
        CueTrackMode::Mode2_2352 => 2352,
        CueTrackMode::Audio => 2352,
        _ => 0,
    }
}

/// Offset of the 2048 user-data bytes within a source sector
pub fn skipbytes_for_track(mode: CueTrackMode) -> u32 {
    match mode {
        CueTrackMode::Mode1_2352 => 16,
        CueTrackMode::Mode2_2352 => 24,
        _ => 0,
    }
}

/// Track metadata flattened out of a CUE sheet at mount time
///
/// The SCSI handlers walk this array with an immutable borrow; nothing on
/// the per-command hot path re-parses the CUE sheet.
#[derive(Debug, Clone, Default)]
pub struct TrackList {
    tracks: Vec<CueTrackInfo>,
    leadout: u32,
}

impl TrackList {
    /// Flatten a CUE sheet into a track list
    ///
    /// # Arguments
    ///
    /// * `cue_sheet` - The CUE text describing the disc
    /// * `image_size` - Size in bytes of the underlying data file, used to
    ///   compute the length of the final track and thus the leadout
    pub fn from_cue_sheet(cue_sheet: &str, image_size: u64) -> Self {
        let mut parser = CueParser::new(cue_sheet);
        let mut tracks = Vec::new();
        while let Some(track) = parser.next_track() {
            tracks.push(track.clone());
        }

        let leadout = Self::compute_leadout(&tracks, image_size);
        Self { tracks, leadout }
    }

    /// Leadout LBA: the last track's data start plus however many sectors
    /// the file still holds from that track's offset, clamped to u32
    fn compute_leadout(tracks: &[CueTrackInfo], image_size: u64) -> u32 {
        let Some(last) = tracks.last() else {
            return 0;
        };

        if image_size < last.file_offset || last.sector_length == 0 {
            return last.data_start;
        }

        let remaining = image_size - last.file_offset;
        let blocks = (remaining / u64::from(last.sector_length)).min(u64::from(u32::MAX));
        last.data_start.saturating_add(blocks as u32)
    }

    /// Number of tracks on the disc
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// True if the sheet contained no tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Iterate over all tracks in disc order
    pub fn iter(&self) -> impl Iterator<Item = &CueTrackInfo> {
        self.tracks.iter()
    }

    /// First track, if any
    pub fn first(&self) -> Option<&CueTrackInfo> {
        self.tracks.first()
    }

    /// Last track, if any
    pub fn last(&self) -> Option<&CueTrackInfo> {
        self.tracks.last()
    }

    /// Highest track number on the disc (1 if the disc is empty)
    pub fn last_track_number(&self) -> u8 {
        self.tracks
            .iter()
            .map(|t| t.track_number)
            .max()
            .unwrap_or(1)
    }

    /// One past the last recorded sector
    pub fn leadout_lba(&self) -> u32 {
        self.leadout
    }

    /// Find the track containing an LBA
    ///
    /// LBA 0 shortcuts to the first track. An LBA before the first track's
    /// start resolves to no track; an LBA at or past the last track's start
    /// resolves to the last track.
    pub fn track_for_lba(&self, lba: u32) -> Option<&CueTrackInfo> {
        if lba == 0 {
            return self.tracks.first();
        }

        let mut last: Option<&CueTrackInfo> = None;
        for track in &self.tracks {
            if track.track_start == lba {
                return Some(track);
            }
            if lba < track.track_start {
                return last;
            }
            last = Some(track);
        }
        last
    }

    /// Find a track by its track number
    pub fn track_for_number(&self, number: u8) -> Option<&CueTrackInfo> {
        self.tracks.iter().find(|t| t.track_number == number)
    }

    /// Length of a track in sectors (distance to the next track or leadout)
    pub fn track_length(&self, number: u8) -> u32 {
        let Some(idx) = self.tracks.iter().position(|t| t.track_number == number) else {
            return 0;
        };
        let start = self.tracks[idx].data_start;
        match self.tracks.get(idx + 1) {
            Some(next) => next.data_start.saturating_sub(start),
            None => self.leadout.saturating_sub(start),
        }
    }

    /// MMC medium type byte: 0x01 data CD, 0x02 audio CD, 0x03 mixed
    pub fn medium_type(&self) -> u8 {
        for track in &self.tracks {
            if track.track_number == 1 && track.track_mode == CueTrackMode::Audio {
                return 0x02;
            }
            if track.track_number > 1 {
                return 0x03;
            }
        }
        0x01
    }

    /// Source blocksize of the disc's first track (fixed at mount)
    pub fn data_block_size(&self) -> u32 {
        self.tracks
            .first()
            .map(|t| blocksize_for_track(t.track_mode))
            .unwrap_or(2048)
    }

    /// Skip bytes of the disc's first track (fixed at mount)
    pub fn data_skip_bytes(&self) -> u32 {
        self.tracks
            .first()
            .map(|t| skipbytes_for_track(t.track_mode))
            .unwrap_or(0)
    }
}
