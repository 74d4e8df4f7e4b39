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

//! Reply formatting tests for the identification and TOC commands

use super::*;
use crate::core::catalog::ImageCatalog;

#[test]
fn test_inquiry_vpd_supported_pages() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0x12, 0x01, 0x00, 0, 64], 64, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    assert_eq!(t.data, vec![0x05, 0x00, 0x00, 0x03, 0x00, 0x80, 0x83]);
}

#[test]
fn test_inquiry_vpd_serial() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0x12, 0x01, 0x80, 0, 64], 64, None);
    assert_eq!(&t.data[..4], &[0x05, 0x80, 0x00, 0x0B]);
    assert_eq!(&t.data[4..], b"USBODE00001");
}

#[test]
fn test_inquiry_vpd_device_identification() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0x12, 0x01, 0x83, 0, 64], 64, None);
    assert_eq!(&t.data[..7], &[0x05, 0x83, 0x00, 0x0B, 0x01, 0x00, 0x08]);
    assert_eq!(&t.data[7..], b"USBODE  ");
}

#[test]
fn test_inquiry_vpd_unknown_page() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0x12, 0x01, 0x55, 0, 64], 64, None);
    assert_eq!(t.csw.status, CswStatus::Fail);
}

#[test]
fn test_inquiry_full_reply_is_96_bytes() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0x12, 0x00, 0x00, 0, 96], 96, None);
    assert_eq!(t.data.len(), 96);
    assert_eq!(&t.data[16..32], b"CDROM EMULATOR  ");
    assert_eq!(&t.data[32..36], b"0001");
}

#[test]
fn test_mode_sense6_page_2a() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();

    let t = rig.execute(&[0x1A, 0, 0x2A, 0, 64, 0], 64, None);
    assert_eq!(t.csw.status, CswStatus::Ok);

    // 4-byte header, then the capabilities page
    assert_eq!(t.data[0] as usize, t.data.len() - 1);
    assert_eq!(t.data[1], 0x01); // data CD
    assert_eq!(t.data[4], 0x2A);
    assert_eq!(t.data[5], 0x12);
    // CD-DA supported and accurate
    assert_eq!(t.data[9], 0x03);
    // Loading mechanism: tray with eject and lock
    assert_eq!(t.data[10], 0x28);
}

#[test]
fn test_mode_sense10_header() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();

    let t = rig.execute(&[0x5A, 0, 0x2A, 0, 0, 0, 0, 0, 64], 64, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    let mode_len = u16::from_be_bytes([t.data[0], t.data[1]]) as usize;
    assert_eq!(mode_len, t.data.len() - 2);
    assert_eq!(t.data[8], 0x2A);
}

#[test]
fn test_mode_sense_all_pages() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();

    let t = rig.execute(&[0x1A, 0, 0x3F, 0, 255, 0], 255, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    // The Apple signature pages ride along in the all-pages reply
    let blob = t.data.windows(20).any(|w| w == b"APPLE COMPUTER, INC.");
    assert!(blob, "expected Apple vendor pages");
}

#[test]
fn test_mode_sense_saved_values_rejected() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0x1A, 0, 0xC0 | 0x01, 0, 64, 0], 64, None);
    assert_eq!(t.csw.status, CswStatus::Fail);

    let t = rig.execute(&[0x03, 0, 0, 0, 14], 14, None);
    assert_eq!(t.data[2], 0x05);
    assert_eq!(t.data[12], 0x39);
}

#[test]
fn test_mode_sense_unknown_page() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0x1A, 0, 0x2B, 0, 64, 0], 64, None);
    assert_eq!(t.csw.status, CswStatus::Fail);
}

#[test]
fn test_get_configuration_cd_profile() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();

    let t = rig.execute(&[0x46, 0x00, 0, 0, 0, 0, 0, 1, 0], 256, None);
    assert_eq!(t.csw.status, CswStatus::Ok);

    let data_len = u32::from_be_bytes([t.data[0], t.data[1], t.data[2], t.data[3]]) as usize;
    assert_eq!(data_len, t.data.len() - 4);
    // Current profile CD-ROM
    assert_eq!(&t.data[6..8], &[0x00, 0x08]);
    // Profile list feature first, current bit set on the CD profile
    assert_eq!(&t.data[8..10], &[0x00, 0x00]);
    assert_eq!(&t.data[12..15], &[0x00, 0x08, 0x01]);
}

#[test]
fn test_get_configuration_dvd_profile() {
    let mut rig = TestRig::new();
    let mut data = vec![0u8; 16 * 2048];
    data[0] = 1;
    let path = rig.write_file("movie.dvd.iso", &data);
    rig.mount_ready(&path);

    let t = rig.execute(&[0x46, 0x00, 0, 0, 0, 0, 0, 1, 0], 256, None);
    // Current profile DVD-ROM, DVD profile listed first and current
    assert_eq!(&t.data[6..8], &[0x00, 0x10]);
    assert_eq!(&t.data[12..15], &[0x00, 0x10, 0x01]);

    // CSS feature present somewhere in the list
    let has_css = t
        .data
        .windows(4)
        .any(|w| w == [0x01, 0x06, 0x03, 0x04]);
    assert!(has_css, "DVD media advertises the CSS feature");
}

#[test]
fn test_get_configuration_single_feature() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();

    // rt=0x02, feature 0x0103 (analogue audio play)
    let t = rig.execute(&[0x46, 0x02, 0x01, 0x03, 0, 0, 0, 1, 0], 256, None);
    assert_eq!(t.data.len(), 8 + 8);
    assert_eq!(&t.data[8..12], &[0x01, 0x03, 0x0B, 0x04]);
}

#[test]
fn test_read_toc_not_ready() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0x43, 0x02, 0, 0, 0, 0, 0, 0, 32, 0], 32, None);
    assert_eq!(t.csw.status, CswStatus::Fail);
}

#[test]
fn test_read_toc_msf_leadout_only() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();

    // Starting track 0xAA: only the leadout comes back
    let t = rig.execute(&[0x43, 0x02, 0, 0, 0, 0, 0xAA, 0, 32, 0], 32, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    let toc_len = u16::from_be_bytes([t.data[0], t.data[1]]);
    assert_eq!(toc_len, 2 + 8);
    assert_eq!(t.data[6], 0xAA);
    // 1024 sectors -> leadout at MSF 00:15:49 with the 150-frame offset
    assert_eq!(&t.data[8..12], &[0x00, 0x00, 0x0F, 0x31]);
}

#[test]
fn test_read_toc_session_info() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();

    let t = rig.execute(&[0x43, 0x00, 0x01, 0, 0, 0, 0, 0, 12, 0], 12, None);
    assert_eq!(t.data.len(), 12);
    assert_eq!(&t.data[0..4], &[0x00, 0x0A, 0x01, 0x01]);
    assert_eq!(t.data[5], 0x14);
    assert_eq!(&t.data[8..12], &[0, 0, 0, 0]);
}

#[test]
fn test_read_full_toc() {
    let mut rig = TestRig::new();
    rig.mount_mixed_cue();

    let t = rig.execute(&[0x43, 0x00, 0x02, 0, 0, 0, 0, 0, 255, 0], 255, None);
    assert_eq!(t.csw.status, CswStatus::Ok);

    // Header + A0/A1/A2 + 2 track descriptors, 11 bytes each
    assert_eq!(t.data.len(), 4 + 11 * 5);
    // A0 carries the first track number
    assert_eq!(t.data[4 + 3], 0xA0);
    assert_eq!(t.data[4 + 8], 0x01);
    // A1 carries the last track number
    assert_eq!(t.data[4 + 11 + 3], 0xA1);
    assert_eq!(t.data[4 + 11 + 8], 0x02);
    // A2 is the leadout
    assert_eq!(t.data[4 + 22 + 3], 0xA2);
}

#[test]
fn test_read_full_toc_matshita_bcd() {
    let mut rig = TestRig::new();
    rig.mount_mixed_cue();

    // Format 0 with control byte 0x80 means full TOC in BCD
    let t = rig.execute(&[0x43, 0x00, 0x00, 0, 0, 0, 0, 0, 255, 0x80], 255, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    assert_eq!(t.data[4 + 3], 0xA0);

    // Track 2 sits at LBA 1000 = 00:15:25 with offset, BCD-encoded
    let track2 = &t.data[4 + 33 + 11..4 + 33 + 22];
    assert_eq!(track2[3], 0x02);
    assert_eq!(&track2[8..11], &[0x00, 0x15, 0x25]);
}

#[test]
fn test_read_full_toc_bad_session() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();
    let t = rig.execute(&[0x43, 0x00, 0x02, 0, 0, 0, 2, 0, 255, 0], 255, None);
    assert_eq!(t.csw.status, CswStatus::Fail);
}

#[test]
fn test_read_disc_information() {
    let mut rig = TestRig::new();
    rig.mount_mixed_cue();

    let t = rig.execute(&[0x51, 0, 0, 0, 0, 0, 0, 0, 34, 0], 34, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    assert_eq!(&t.data[0..2], &[0x00, 0x20]);
    assert_eq!(t.data[2], 0x0E);
    assert_eq!(t.data[6], 2); // last track
    assert_eq!(t.data[8], 0x10); // data disc
}

#[test]
fn test_read_track_information_by_number() {
    let mut rig = TestRig::new();
    rig.mount_mixed_cue();

    let t = rig.execute(&[0x52, 0x01, 0, 0, 0, 2, 0, 0, 48, 0], 48, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    assert_eq!(t.data[2], 2);
    // Audio track: track mode and data mode both zero
    assert_eq!(t.data[5], 0x00);
    assert_eq!(t.data[6], 0x00);
    // Start address 1000
    assert_eq!(&t.data[8..12], &[0x00, 0x00, 0x03, 0xE8]);
}

#[test]
fn test_read_track_information_bad_track() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();
    let t = rig.execute(&[0x52, 0x01, 0, 0, 0, 9, 0, 0, 48, 0], 48, None);
    assert_eq!(t.csw.status, CswStatus::Fail);
}

#[test]
fn test_read_header_data_track() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();

    let t = rig.execute(&[0x44, 0x00, 0, 0, 0, 16, 0, 0, 8, 0], 8, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    assert_eq!(t.data[0], 1); // mode 1
    assert_eq!(&t.data[4..8], &[0, 0, 0, 16]);
}

#[test]
fn test_read_disc_structure_cd_short_circuit() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();

    // Physical format info on CD media: empty header, GOOD status
    let t = rig.execute(&[0xAD, 0, 0, 0, 0, 0, 0, 0x00, 0, 32], 32, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    assert_eq!(t.data, vec![0x00, 0x02, 0x00, 0x00]);
}

#[test]
fn test_read_disc_structure_dvd_physical() {
    let mut rig = TestRig::new();
    let mut data = vec![0u8; 16 * 2048];
    data[0] = 1;
    let path = rig.write_file("movie.dvd.iso", &data);
    rig.mount_ready(&path);

    let t = rig.execute(&[0xAD, 0, 0, 0, 0, 0, 0, 0x00, 0, 64], 64, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    assert_eq!(t.data.len(), 4 + 17);
    assert_eq!(t.data[4], 0x01); // book type DVD-ROM
}

#[test]
fn test_read_disc_structure_format_list() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();

    let t = rig.execute(&[0xAD, 0, 0, 0, 0, 0, 0, 0xFF, 0, 64], 64, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    // CD media lists copyright and the list itself
    assert_eq!(t.data.len(), 4 + 8);
    assert_eq!(t.data[4], 0x01);
    assert_eq!(t.data[8], 0xFF);
}

#[test]
fn test_report_key_canned() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0xA4, 0, 0, 0, 0, 0, 0, 0, 0, 8], 8, None);
    assert_eq!(t.data, vec![0x00, 0x06, 0x00, 0x00, 0x25, 0xFF, 0x01, 0x00]);
}

#[test]
fn test_toolbox_listing() {
    let mut rig = TestRig::new();
    rig.write_file("alpha.iso", &[0u8; 2048]);
    rig.write_file("beta.iso", &[0u8; 4096]);
    let dir = rig._dir.path().to_path_buf();
    rig.gadget.set_catalog(ImageCatalog::scan(&dir).unwrap());

    let t = rig.execute(&[0xD2], 1, None);
    assert_eq!(t.data, vec![2]);

    let t = rig.execute(&[0xD0], 80, None);
    assert_eq!(t.data.len(), 80);
    assert_eq!(t.data[0], 0);
    assert_eq!(&t.data[2..11], b"alpha.iso");
    assert_eq!(t.data[40], 1);
    assert_eq!(&t.data[42..50], b"beta.iso");
    // 40-bit size of beta.iso
    assert_eq!(&t.data[75..80], &[0, 0, 0, 0x10, 0]);
}

#[test]
fn test_toolbox_set_next_cd() {
    let mut rig = TestRig::new();
    rig.write_file("next.iso", &[0u8; 2048]);
    let dir = rig._dir.path().to_path_buf();
    rig.gadget.set_catalog(ImageCatalog::scan(&dir).unwrap());

    let t = rig.execute(&[0xD8, 0], 0, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    let pending = rig.gadget.take_mount_request().unwrap();
    assert!(pending.ends_with("next.iso"));

    // Out-of-range index fails
    let t = rig.execute(&[0xD8, 9], 0, None);
    assert_eq!(t.csw.status, CswStatus::Fail);
}

#[test]
fn test_toolbox_list_devices() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0xD9], 8, None);
    assert_eq!(t.data[0], 0x02);
    assert_eq!(t.data.len(), 8);
}
