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

//! CD utility tests

use super::*;

const MIXED_CUE: &str = "FILE \"game.bin\" BINARY\n\
                         \x20 TRACK 01 MODE1/2048\n\
                         \x20   INDEX 01 00:00:00\n\
                         \x20 TRACK 02 AUDIO\n\
                         \x20   INDEX 01 00:13:25\n";

#[test]
fn test_bcd_conversion() {
    assert_eq!(dec_to_bcd(0), 0x00);
    assert_eq!(dec_to_bcd(23), 0x23);
    assert_eq!(dec_to_bcd(99), 0x99);

    assert_eq!(bcd_to_dec(0x00), 0);
    assert_eq!(bcd_to_dec(0x23), 23);
    assert_eq!(bcd_to_dec(0x99), 99);
}

#[test]
fn test_lba_to_msf() {
    let msf = lba_to_msf(0);
    assert_eq!((msf.minute, msf.second, msf.frame), (0, 2, 0));

    let msf = lba_to_msf(75);
    assert_eq!((msf.minute, msf.second, msf.frame), (0, 3, 0));

    let msf = lba_to_msf(60 * 75 - 150);
    assert_eq!((msf.minute, msf.second, msf.frame), (1, 0, 0));
}

#[test]
fn test_msf_to_lba() {
    assert_eq!(msf_to_lba(0, 2, 0), 150);
    assert_eq!(msf_to_lba(0, 2, 0) - LEADOUT_OFFSET, 0);
    assert_eq!(msf_to_lba(1, 0, 0), 4500);
}

#[test]
fn test_lba_to_msf_bcd() {
    // LBA 0 is 00:02:00; in BCD the second reads 0x02
    let msf = lba_to_msf_bcd(0);
    assert_eq!((msf.minute, msf.second, msf.frame), (0x00, 0x02, 0x00));

    // 12:34:56 total MSF
    let lba = msf_to_lba(12, 34, 56) - LEADOUT_OFFSET;
    let msf = lba_to_msf_bcd(lba);
    assert_eq!((msf.minute, msf.second, msf.frame), (0x12, 0x34, 0x56));
}

#[test]
fn test_get_address() {
    assert_eq!(get_address(0x0003_E8FF, false), [0x00, 0x03, 0xE8, 0xFF]);
    // MSF form: BCD components in ascending byte order plus a pad
    assert_eq!(get_address(0, true), [0x00, 0x02, 0x00, 0x00]);
}

#[test]
fn test_mcs_full_raw() {
    let mcs = Mcs::SYNC | Mcs::HEADER | Mcs::USER_DATA | Mcs::EDC_ECC;
    assert_eq!(sector_length_from_mcs(mcs), 2352);
    assert_eq!(skip_bytes_from_mcs(mcs), 0);
}

#[test]
fn test_mcs_user_data_only() {
    assert_eq!(sector_length_from_mcs(Mcs::USER_DATA), 2048);
    assert_eq!(skip_bytes_from_mcs(Mcs::USER_DATA), 16);
}

#[test]
fn test_mcs_bounds_exhaustive() {
    // skip + transfer never exceeds a raw sector, for all 32 selections
    for raw in 0..32u8 {
        let mcs = Mcs::from_bits_truncate(raw);
        let transfer = sector_length_from_mcs(mcs);
        let skip = skip_bytes_from_mcs(mcs);
        assert!(
            skip + transfer <= RAW_SECTOR_SIZE as u32,
            "mcs={raw:#04x}: skip={skip} transfer={transfer}"
        );
    }
}

#[test]
fn test_track_tables() {
    use crate::core::cue::CueTrackMode;

    assert_eq!(blocksize_for_track(CueTrackMode::Mode1_2048), 2048);
    assert_eq!(blocksize_for_track(CueTrackMode::Mode1_2352), 2352);
    assert_eq!(blocksize_for_track(CueTrackMode::Audio), 2352);
    assert_eq!(skipbytes_for_track(CueTrackMode::Mode1_2048), 0);
    assert_eq!(skipbytes_for_track(CueTrackMode::Mode1_2352), 16);
    assert_eq!(skipbytes_for_track(CueTrackMode::Mode2_2352), 24);
}

#[test]
fn test_track_list_lookup() {
    // 1000 sectors of track 1 data, then audio
    let list = TrackList::from_cue_sheet(MIXED_CUE, 1000 * 2048 + 500 * 2352);

    assert_eq!(list.len(), 2);
    assert_eq!(list.last_track_number(), 2);

    assert_eq!(list.track_for_lba(0).unwrap().track_number, 1);
    assert_eq!(list.track_for_lba(500).unwrap().track_number, 1);
    assert_eq!(list.track_for_lba(1000).unwrap().track_number, 2);
    assert_eq!(list.track_for_lba(1400).unwrap().track_number, 2);

    assert_eq!(list.track_for_number(2).unwrap().data_start, 1000);
    assert!(list.track_for_number(3).is_none());
}

#[test]
fn test_leadout() {
    let list = TrackList::from_cue_sheet(MIXED_CUE, 1000 * 2048 + 500 * 2352);
    // Track 2 starts at LBA 1000 with file offset 1000*2048; the remaining
    // 500 raw sectors extend the disc to LBA 1500
    assert_eq!(list.leadout_lba(), 1500);
    assert_eq!(list.track_length(2), 500);
    assert_eq!(list.track_length(1), 1000);
}

#[test]
fn test_medium_type() {
    let list = TrackList::from_cue_sheet(MIXED_CUE, 1000 * 2048);
    assert_eq!(list.medium_type(), 0x03);

    let data_only = "FILE \"x.iso\" BINARY\n  TRACK 01 MODE1/2048\n    INDEX 01 00:00:00\n";
    let list = TrackList::from_cue_sheet(data_only, 2048 * 16);
    assert_eq!(list.medium_type(), 0x01);

    let audio_first = "FILE \"x.bin\" BINARY\n  TRACK 01 AUDIO\n    INDEX 01 00:00:00\n";
    let list = TrackList::from_cue_sheet(audio_first, 2352 * 16);
    assert_eq!(list.medium_type(), 0x02);
}

#[test]
fn test_empty_track_list() {
    let list = TrackList::from_cue_sheet("", 0);
    assert!(list.is_empty());
    assert_eq!(list.leadout_lba(), 0);
    assert!(list.track_for_lba(0).is_none());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn lba_msf_roundtrip(lba in 0u32..1_000_000) {
            let msf = lba_to_msf(lba);
            prop_assert_eq!(
                msf_to_lba(msf.minute, msf.second, msf.frame) - LEADOUT_OFFSET,
                lba
            );
        }

        #[test]
        // BCD minutes are two decimal digits, so the BCD variant only
        // covers discs up to 99 minutes
        fn lba_msf_bcd_roundtrip(lba in 0u32..440_000) {
            let msf = lba_to_msf_bcd(lba);
            let total = msf_to_lba(
                bcd_to_dec(msf.minute),
                bcd_to_dec(msf.second),
                bcd_to_dec(msf.frame),
            );
            prop_assert_eq!(total - LEADOUT_OFFSET, lba);
        }
    }
}
