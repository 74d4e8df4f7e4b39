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

//! CUE sheet parser tests

use super::*;

const SINGLE_TRACK: &str = "FILE \"image.iso\" BINARY\n\
                            \x20 TRACK 01 MODE1/2048\n\
                            \x20   INDEX 01 00:00:00\n";

const MIXED_MODE: &str = "FILE \"game.bin\" BINARY\n\
                          \x20 TRACK 01 MODE1/2352\n\
                          \x20   INDEX 01 00:00:00\n\
                          \x20 TRACK 02 AUDIO\n\
                          \x20   PREGAP 00:02:00\n\
                          \x20   INDEX 01 02:47:20\n\
                          \x20 TRACK 03 AUDIO\n\
                          \x20   INDEX 00 07:55:58\n\
                          \x20   INDEX 01 07:55:65\n";

#[test]
fn test_parse_time() {
    assert_eq!(parse_time("00:00:00"), 0);
    assert_eq!(parse_time("00:01:00"), 75);
    assert_eq!(parse_time("01:00:00"), 60 * 75);
    assert_eq!(parse_time("02:47:20"), 20 + 75 * (47 + 60 * 2));
}

#[test]
fn test_single_track() {
    let mut parser = CueParser::new(SINGLE_TRACK);
    let track = parser.next_track().unwrap();
    assert_eq!(track.filename, "image.iso");
    assert_eq!(track.track_number, 1);
    assert_eq!(track.track_mode, CueTrackMode::Mode1_2048);
    assert_eq!(track.sector_length, 2048);
    assert_eq!(track.track_start, 0);
    assert_eq!(track.data_start, 0);
    assert_eq!(track.file_offset, 0);
    assert!(parser.next_track().is_none());
}

#[test]
fn test_restart() {
    let mut parser = CueParser::new(SINGLE_TRACK);
    assert!(parser.next_track().is_some());
    assert!(parser.next_track().is_none());
    parser.restart();
    assert!(parser.next_track().is_some());
}

#[test]
fn test_unstored_pregap() {
    let mut parser = CueParser::new(MIXED_MODE);
    let t1 = parser.next_track().unwrap().clone();
    let t2 = parser.next_track().unwrap().clone();

    assert_eq!(t1.track_start, 0);
    assert_eq!(t1.data_start, 0);

    // Unstored pregap shifts data_start but not the file offset
    let index01 = 20 + 75 * (47 + 60 * 2);
    assert_eq!(t2.unstored_pregap_length, 150);
    assert_eq!(t2.track_start, index01);
    assert_eq!(t2.data_start, index01 + 150);
    assert_eq!(t2.file_offset, u64::from(index01) * 2352);
}

#[test]
fn test_stored_pregap() {
    let mut parser = CueParser::new(MIXED_MODE);
    parser.next_track();
    let t2 = parser.next_track().unwrap().clone();
    let t3 = parser.next_track().unwrap().clone();

    let index00 = 58 + 75 * (55 + 60 * 7) + t2.cumulative_offset + t2.unstored_pregap_length;
    let index01 = 65 + 75 * (55 + 60 * 7) + t3.cumulative_offset;
    assert_eq!(t3.track_start, index00);
    assert_eq!(t3.data_start, index01);
    // Stored pregap frames are present in the file
    assert_eq!(t3.data_start - t3.track_start, 7);
}

#[test]
fn test_track_invariants() {
    let mut parser = CueParser::new(MIXED_MODE);
    let mut last_number = 0;
    while let Some(track) = parser.next_track() {
        assert!(track.track_start <= track.data_start);
        let stored_pregap = track.data_start - track.track_start - track.unstored_pregap_length;
        assert_eq!(
            track.data_start - track.track_start,
            track.unstored_pregap_length + stored_pregap
        );
        assert!(track.track_number > last_number);
        last_number = track.track_number;
    }
    assert_eq!(last_number, 3);
}

#[test]
fn test_multi_file() {
    let sheet = "FILE \"track1.bin\" BINARY\n\
                 \x20 TRACK 01 MODE1/2352\n\
                 \x20   INDEX 01 00:00:00\n\
                 FILE \"track2.bin\" BINARY\n\
                 \x20 TRACK 02 AUDIO\n\
                 \x20   INDEX 01 00:00:00\n";

    let mut parser = CueParser::new(sheet);
    let t1 = parser.next_track_with_file_size(0).unwrap().clone();
    assert_eq!(t1.file_index, 1);
    assert_eq!(t1.data_start, 0);

    // 100 sectors of 2352 bytes in the first file
    let t2 = parser.next_track_with_file_size(100 * 2352).unwrap().clone();
    assert_eq!(t2.file_index, 2);
    assert_eq!(t2.filename, "track2.bin");
    assert_eq!(t2.data_start, 100);
    assert_eq!(t2.file_offset, 0);
}

#[test]
fn test_dot_slash_stripped() {
    let sheet = "FILE \"./disc.bin\" BINARY\n\
                 \x20 TRACK 01 AUDIO\n\
                 \x20   INDEX 01 00:00:00\n";
    let mut parser = CueParser::new(sheet);
    assert_eq!(parser.next_track().unwrap().filename, "disc.bin");
}

#[test]
fn test_keywords_case_insensitive() {
    let sheet = "file \"disc.bin\" binary\n\
                 \x20 track 01 mode1/2048\n\
                 \x20   index 01 00:00:00\n";
    let mut parser = CueParser::new(sheet);
    let track = parser.next_track().unwrap();
    assert_eq!(track.track_mode, CueTrackMode::Mode1_2048);
}

#[test]
fn test_sector_length_table() {
    assert_eq!(sector_length(CueFileMode::Binary, CueTrackMode::Audio), 2352);
    assert_eq!(sector_length(CueFileMode::Binary, CueTrackMode::Cdg), 2448);
    assert_eq!(
        sector_length(CueFileMode::Binary, CueTrackMode::Mode2_2324),
        2324
    );
    assert_eq!(
        sector_length(CueFileMode::Motorola, CueTrackMode::Mode1_2048),
        2048
    );
    // Compressed audio files have no fixed sector length
    assert_eq!(sector_length(CueFileMode::Mp3, CueTrackMode::Audio), 0);
}

#[test]
fn test_empty_sheet() {
    let mut parser = CueParser::new("");
    assert!(parser.next_track().is_none());
}

#[test]
fn test_garbage_lines_skipped() {
    let sheet = "REM COMMENT \"ripped with love\"\n\
                 FILE \"disc.bin\" BINARY\n\
                 \x20 TRACK 01 MODE1/2048\n\
                 \x20   FLAGS DCP\n\
                 \x20   INDEX 01 00:00:00\n";
    let mut parser = CueParser::new(sheet);
    assert_eq!(parser.next_track().unwrap().track_number, 1);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn arb_sheet() -> impl Strategy<Value = String> {
        // 1..=12 tracks, each with an index time strictly after the previous
        (1usize..=12, any::<bool>()).prop_map(|(count, audio_first)| {
            let mut sheet = String::from("FILE \"disc.bin\" BINARY\n");
            let mut frame = 0u32;
            for i in 0..count {
                let audio = (i % 2 == 0) == audio_first;
                let mode = if audio { "AUDIO" } else { "MODE1/2352" };
                sheet.push_str(&format!("  TRACK {:02} {}\n", i + 1, mode));
                if i > 0 && audio {
                    sheet.push_str("    PREGAP 00:02:00\n");
                }
                sheet.push_str(&format!(
                    "    INDEX 01 {:02}:{:02}:{:02}\n",
                    frame / (60 * 75),
                    (frame / 75) % 60,
                    frame % 75
                ));
                frame += 1000 + (i as u32) * 37;
            }
            sheet
        })
    }

    proptest! {
        #[test]
        fn track_numbers_strictly_increase(sheet in arb_sheet()) {
            let mut parser = CueParser::new(&sheet);
            let mut last = 0u8;
            while let Some(track) = parser.next_track() {
                prop_assert!(track.track_number > last);
                last = track.track_number;
            }
        }

        #[test]
        fn pregap_accounting_holds(sheet in arb_sheet()) {
            let mut parser = CueParser::new(&sheet);
            while let Some(track) = parser.next_track() {
                prop_assert!(track.track_start <= track.data_start);
                prop_assert!(track.data_start - track.track_start >= track.unstored_pregap_length);
            }
        }
    }
}
