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

//! CUE sheet parser
//!
//! A lazy, forward-only parser over a CUE sheet string. Each call to
//! [`CueParser::next_track`] resolves the next complete `TRACK` entry,
//! placing it in the global disc address space while accounting for:
//!
//! - multi-`FILE` sheets, where each `FILE` line resets local timing;
//! - `PREGAP` (unstored silence: shifts the data start on disc but is not
//!   present in the data file);
//! - `INDEX 00` (stored pregap: present both on disc and in the file);
//! - `INDEX 01` (start of the track's data area).
//!
//! The parser does not own the sheet; it remains valid only as long as the
//! input string. `restart()` rewinds to the beginning.
//!
//! ```text
//! FILE "foo bar.bin" BINARY
//!   TRACK 01 MODE1/2048
//!     INDEX 01 00:00:00
//!   TRACK 02 AUDIO
//!     PREGAP 00:02:00
//!     INDEX 01 02:47:20
//! ```

#[cfg(test)]
mod tests;

/// File mode named on a `FILE` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CueFileMode {
    /// Raw little-endian binary data
    #[default]
    Binary,
    /// Raw big-endian binary data
    Motorola,
    /// MP3 audio file
    Mp3,
    /// WAVE audio file
    Wave,
    /// AIFF audio file
    Aiff,
}

/// Track mode named on a `TRACK` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CueTrackMode {
    /// CD-DA audio, 2352 bytes per sector
    #[default]
    Audio,
    /// CD+G karaoke, 2448 bytes per sector
    Cdg,
    /// Mode 1, user data only (2048 bytes per sector)
    Mode1_2048,
    /// Mode 1, raw sectors (2352 bytes per sector)
    Mode1_2352,
    /// Mode 2, user data only (2048 bytes per sector)
    Mode2_2048,
    /// Mode 2 form 2 user data (2324 bytes per sector)
    Mode2_2324,
    /// Mode 2 without sync/header (2336 bytes per sector)
    Mode2_2336,
    /// Mode 2, raw sectors (2352 bytes per sector)
    Mode2_2352,
    /// CD-I, 2336 bytes per sector
    Cdi2336,
    /// CD-I, raw sectors
    Cdi2352,
}

/// Everything known about one parsed track
///
/// Invariants upheld for every track the parser returns:
/// `track_start <= data_start`, and
/// `data_start - track_start == unstored_pregap_length + stored_pregap`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueTrackInfo {
    /// Source file name from the `FILE` line
    pub filename: String,
    /// 1-based index of the `FILE` line this track belongs to
    pub file_index: u32,
    /// File mode from the `FILE` line
    pub file_mode: CueFileMode,
    /// Byte offset of this track's INDEX 01 data within its file
    pub file_offset: u64,
    /// Track number (1..=99)
    pub track_number: u8,
    /// Track mode from the `TRACK` line
    pub track_mode: CueTrackMode,
    /// Sector length in bytes for BINARY/MOTOROLA files (0 otherwise)
    pub sector_length: u32,
    /// Frames of unstored `PREGAP` silence preceding this track
    pub unstored_pregap_length: u32,
    /// Cumulative frames of unstored data before this track
    pub cumulative_offset: u32,
    /// LBA at which this track's file starts
    pub file_start: u32,
    /// LBA of the data area (INDEX 01)
    pub data_start: u32,
    /// LBA of the beginning of the track (INDEX 00 if present)
    pub track_start: u32,
}

/// Lazy iterator over the tracks of a CUE sheet
///
/// # Example
///
/// ```
/// use cdgadget::core::cue::CueParser;
///
/// let sheet = "FILE \"disc.bin\" BINARY\n  TRACK 01 MODE1/2048\n    INDEX 01 00:00:00\n";
/// let mut parser = CueParser::new(sheet);
/// let track = parser.next_track().unwrap();
/// assert_eq!(track.track_number, 1);
/// assert_eq!(track.sector_length, 2048);
/// ```
#[derive(Debug)]
pub struct CueParser<'a> {
    sheet: &'a str,
    pos: usize,
    info: CueTrackInfo,
}

impl<'a> CueParser<'a> {
    /// Create a parser over a CUE sheet string
    pub fn new(sheet: &'a str) -> Self {
        Self {
            sheet,
            pos: 0,
            info: CueTrackInfo::default(),
        }
    }

    /// Restart parsing from the beginning of the sheet
    pub fn restart(&mut self) {
        self.pos = 0;
        self.info = CueTrackInfo::default();
    }

    /// Get information for the next track
    ///
    /// Returns `None` when there are no more tracks. The returned reference
    /// remains valid until the next call to `next_track()`.
    pub fn next_track(&mut self) -> Option<&CueTrackInfo> {
        self.next_track_with_file_size(0)
    }

    /// Same as [`next_track`](Self::next_track), but takes the size of the
    /// previous file into account when switching files. Needed for correct
    /// track positions when the sheet references multiple data files.
    pub fn next_track_with_file_size(&mut self, prev_file_size: u64) -> Option<&CueTrackInfo> {
        // Previous track state is needed to advance the file offset
        let mut prev_track_start = self.info.track_start;
        self.info.cumulative_offset += self.info.unstored_pregap_length;
        let mut prev_sector_length = sector_length(self.info.file_mode, self.info.track_mode);

        let mut got_file = false;
        let mut got_track = false;
        let mut got_data = false;
        // True if a stored period of silence (INDEX 00) was seen for this track
        let mut got_pause = false;

        while !(got_track && got_data) && self.start_line() {
            let rest = &self.sheet[self.pos..];

            if starts_with_ignore_case(rest, "FILE ") {
                if self.info.file_index > 0 && self.info.sector_length > 0 {
                    // Take the length of the last track in the previous file
                    // into account.
                    let last_track_blocks = prev_file_size.saturating_sub(self.info.file_offset)
                        / u64::from(self.info.sector_length);
                    self.info.file_start = self.info.data_start + last_track_blocks as u32;
                }

                let (filename, after) = read_quoted(&rest[5..]);
                self.info.filename = strip_dot_slash(filename).to_string();
                self.info.file_mode = parse_file_mode(after.trim_start());
                self.info.file_offset = 0;
                self.info.file_index += 1;
                self.info.track_mode = CueTrackMode::Audio;
                prev_track_start = 0;
                prev_sector_length = sector_length(self.info.file_mode, self.info.track_mode);
                got_file = true;
            } else if starts_with_ignore_case(rest, "TRACK ") {
                let after = rest[6..].trim_start();
                let (number, after) = parse_u32(after);
                self.info.track_number = number.min(u32::from(u8::MAX)) as u8;
                self.info.track_mode = parse_track_mode(after.trim_start());
                self.info.sector_length = sector_length(self.info.file_mode, self.info.track_mode);
                self.info.unstored_pregap_length = 0;
                self.info.data_start = 0;
                self.info.track_start = 0;
                got_track = true;
                got_data = false;
                got_pause = false;
            } else if starts_with_ignore_case(rest, "PREGAP ") {
                // Unstored pregap: offsets the data start on disc but does
                // not affect the offset in the data file.
                self.info.unstored_pregap_length = parse_time(rest[7..].trim_start());
            } else if starts_with_ignore_case(rest, "INDEX ") {
                let after = rest[6..].trim_start();
                let (index, after) = parse_u32(after);
                let time = parse_time(after.trim_start());

                if index == 0 {
                    // Stored pregap, present both on disc and in the file
                    self.info.track_start =
                        self.info.file_start + time + self.info.cumulative_offset;
                    got_pause = true;
                } else if index == 1 {
                    // Data content of the track
                    self.info.data_start =
                        self.info.file_start + time + self.info.cumulative_offset;
                    got_data = true;
                }
            }

            self.next_line();
        }

        if got_data && !got_pause {
            self.info.track_start = self.info.data_start;
            self.info.data_start += self.info.unstored_pregap_length;
        }

        if got_track && got_data {
            if !got_file {
                // Advance the file position by the length of the previous track
                let gap = self
                    .info
                    .track_start
                    .saturating_sub(prev_track_start + self.info.cumulative_offset);
                self.info.file_offset += u64::from(gap) * u64::from(prev_sector_length);
            }

            // Advance the file position by any stored pregap
            let stored_pregap = self
                .info
                .data_start
                .saturating_sub(self.info.track_start + self.info.unstored_pregap_length);
            self.info.file_offset += u64::from(stored_pregap) * u64::from(self.info.sector_length);

            Some(&self.info)
        } else {
            None
        }
    }

    /// Skip whitespace at the beginning of a line; false at end of input
    fn start_line(&mut self) -> bool {
        let bytes = self.sheet.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        self.pos < bytes.len()
    }

    /// Advance the parser to the start of the next line
    fn next_line(&mut self) {
        let bytes = self.sheet.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        while self.pos < bytes.len() && (bytes[self.pos] == b'\n' || bytes[self.pos] == b'\r') {
            self.pos += 1;
        }
    }
}

/// Case-insensitive prefix check on ASCII keywords
fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Read text delimited by double quotes; returns (content, rest-after-quote)
fn read_quoted(src: &str) -> (&str, &str) {
    let Some(open) = src.find('"') else {
        return ("", src);
    };
    // Stop at end of line if the closing quote is missing
    let body = &src[open + 1..];
    let end = body
        .find(|c| c == '"' || c == '\n')
        .unwrap_or(body.len());
    let content = &body[..end];
    let rest = if body[end..].starts_with('"') {
        &body[end + 1..]
    } else {
        &body[end..]
    };
    (content, rest)
}

/// Remove a leading `./` or `.\` from a filename
fn strip_dot_slash(filename: &str) -> &str {
    if filename.starts_with("./") || filename.starts_with(".\\") {
        &filename[2..]
    } else {
        filename
    }
}

/// Parse a decimal number, returning (value, rest)
fn parse_u32(src: &str) -> (u32, &str) {
    let end = src
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(src.len());
    let value = src[..end].parse().unwrap_or(0);
    (value, &src[end..])
}

/// Parse `mm:ss:ff` into a frame count (75 frames per second)
pub fn parse_time(src: &str) -> u32 {
    let (minutes, rest) = parse_u32(src);
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    let (seconds, rest) = parse_u32(rest);
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    let (frames, _) = parse_u32(rest);

    frames + 75 * (seconds + 60 * minutes)
}

/// Parse a file mode keyword, defaulting to BINARY
fn parse_file_mode(src: &str) -> CueFileMode {
    if starts_with_ignore_case(src, "BIN") {
        CueFileMode::Binary
    } else if starts_with_ignore_case(src, "MOTOROLA") {
        CueFileMode::Motorola
    } else if starts_with_ignore_case(src, "MP3") {
        CueFileMode::Mp3
    } else if starts_with_ignore_case(src, "WAV") {
        CueFileMode::Wave
    } else if starts_with_ignore_case(src, "AIFF") {
        CueFileMode::Aiff
    } else {
        CueFileMode::Binary
    }
}

/// Parse a track mode keyword, defaulting to MODE1/2048
fn parse_track_mode(src: &str) -> CueTrackMode {
    if starts_with_ignore_case(src, "AUDIO") {
        CueTrackMode::Audio
    } else if starts_with_ignore_case(src, "CDG") {
        CueTrackMode::Cdg
    } else if starts_with_ignore_case(src, "MODE1/2048") {
        CueTrackMode::Mode1_2048
    } else if starts_with_ignore_case(src, "MODE1/2352") {
        CueTrackMode::Mode1_2352
    } else if starts_with_ignore_case(src, "MODE2/2048") {
        CueTrackMode::Mode2_2048
    } else if starts_with_ignore_case(src, "MODE2/2324") {
        CueTrackMode::Mode2_2324
    } else if starts_with_ignore_case(src, "MODE2/2336") {
        CueTrackMode::Mode2_2336
    } else if starts_with_ignore_case(src, "MODE2/2352") {
        CueTrackMode::Mode2_2352
    } else if starts_with_ignore_case(src, "CDI/2336") {
        CueTrackMode::Cdi2336
    } else if starts_with_ignore_case(src, "CDI/2352") {
        CueTrackMode::Cdi2352
    } else {
        CueTrackMode::Mode1_2048
    }
}

/// Sector length in the data file for a (file mode, track mode) pair
///
/// Only BINARY and MOTOROLA files store raw sectors; compressed audio file
/// modes return 0.
pub fn sector_length(filemode: CueFileMode, trackmode: CueTrackMode) -> u32 {
    if filemode == CueFileMode::Binary || filemode == CueFileMode::Motorola {
        match trackmode {
            CueTrackMode::Audio => 2352,
            CueTrackMode::Cdg => 2448,
            CueTrackMode::Mode1_2048 => 2048,
            CueTrackMode::Mode1_2352 => 2352,
            CueTrackMode::Mode2_2048 => 2048,
            CueTrackMode::Mode2_2324 => 2324,
            CueTrackMode::Mode2_2336 => 2336,
            CueTrackMode::Mode2_2352 => 2352,
            CueTrackMode::Cdi2336 => 2336,
            CueTrackMode::Cdi2352 => 2352,
        }
    } else {
        0
    }
}
