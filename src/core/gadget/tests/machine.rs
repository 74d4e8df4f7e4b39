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

//! Transaction state machine tests

use super::*;

#[test]
fn test_starts_waiting_for_cbw() {
    let mut rig = TestRig::new();
    assert_eq!(rig.gadget.state(), TcdState::ReceiveCbw);
    assert_eq!(rig.gadget.port_mut().armed_out(), Some(31));
}

#[test]
fn test_malformed_cbw_stalls_both_endpoints() {
    let mut rig = TestRig::new();
    rig.gadget.receive_out(&[0u8; 31]); // zero signature
    assert_eq!(rig.gadget.state(), TcdState::InvalidCbw);
    assert!(rig.gadget.port_mut().is_stalled());
}

#[test]
fn test_short_cbw_stalls() {
    let mut rig = TestRig::new();
    rig.gadget.receive_out(&[0x55, 0x53, 0x42, 0x43, 0, 0]);
    assert_eq!(rig.gadget.state(), TcdState::InvalidCbw);
}

#[test]
fn test_unknown_opcode_gets_sense_20() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0xEE], 0, None);
    assert_eq!(t.csw.status, CswStatus::Fail);

    let t = rig.execute(&[0x03, 0, 0, 0, 14], 14, None);
    assert_eq!(t.data[2], 0x05);
    assert_eq!(t.data[12], 0x20);
    assert_eq!(t.data[13], 0x00);
}

#[test]
fn test_csw_echoes_tag() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0x1B], 0, None); // START STOP UNIT
    assert_eq!(t.csw.status, CswStatus::Ok);
    assert_eq!(t.csw.tag, 1);

    let t = rig.execute(&[0x1B], 0, None);
    assert_eq!(t.csw.tag, 2);
}

#[test]
fn test_returns_to_receive_cbw_after_transaction() {
    let mut rig = TestRig::new();
    rig.execute(&[0x1B], 0, None);
    assert_eq!(rig.gadget.state(), TcdState::ReceiveCbw);
    rig.execute(&[0x2F], 0, None);
    assert_eq!(rig.gadget.state(), TcdState::ReceiveCbw);
}

#[test]
fn test_no_medium_sequence() {
    // Scenario: TEST UNIT READY with nothing mounted, then REQUEST SENSE
    let mut rig = TestRig::new();

    let t = rig.execute(&[0x00], 0, None);
    assert_eq!(t.csw.status, CswStatus::Fail);

    let t = rig.execute(&[0x03, 0, 0, 0, 14], 14, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    assert_eq!(t.data[0], 0x70);
    assert_eq!(t.data[2], 0x02); // NOT READY
    assert_eq!(t.data[7], 0x0A);
    assert_eq!(t.data[12], 0x3A); // MEDIUM NOT PRESENT
    assert_eq!(t.data[13], 0x00);

    // NO MEDIUM keeps its sense latched for the next poll
    let t = rig.execute(&[0x03, 0, 0, 0, 14], 14, None);
    assert_eq!(t.data[12], 0x3A);
}

#[test]
fn test_unit_attention_one_shot() {
    // Mount -> first TUR fails 06/28/00 -> REQUEST SENSE reports and
    // clears it -> second TUR is GOOD
    let mut rig = TestRig::new();
    let mut data = vec![0u8; 16 * 2048];
    data[0] = 0xAB;
    let path = rig.write_file("disc.iso", &data);
    rig.mount(&path);

    let t = rig.execute(&[0x00], 0, None);
    assert_eq!(t.csw.status, CswStatus::Fail);

    let t = rig.execute(&[0x03, 0, 0, 0, 14], 14, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    assert_eq!(t.data[2], 0x06);
    assert_eq!(t.data[12], 0x28);
    assert_eq!(t.data[13], 0x00);

    let t = rig.execute(&[0x00], 0, None);
    assert_eq!(t.csw.status, CswStatus::Ok);

    // And the sense is gone
    let t = rig.execute(&[0x03, 0, 0, 0, 14], 14, None);
    assert_eq!(t.data[2], 0x00);
    assert_eq!(t.data[12], 0x00);
}

#[test]
fn test_media_settle_window() {
    use std::time::Duration;

    let mut rig = TestRig::new();
    rig.gadget.set_swap_settle(Duration::from_millis(50));

    let mut data = vec![0u8; 4 * 2048];
    data[0] = 1;
    let path = rig.write_file("disc.iso", &data);
    let opened = crate::core::image::ImageFile::open(&path).unwrap();
    let media = opened.media_type();
    *rig.image.lock().unwrap() = Some(opened);
    rig.gadget.on_media_inserted(media);

    // Inside the window the drive still reports no medium
    rig.gadget.update();
    assert_eq!(rig.gadget.media_state(), MediaState::NoMedium);
    let t = rig.execute(&[0x00], 0, None);
    assert_eq!(t.csw.status, CswStatus::Fail);

    std::thread::sleep(Duration::from_millis(60));
    rig.gadget.update();
    assert_eq!(rig.gadget.media_state(), MediaState::PresentUnitAttention);
}

#[test]
fn test_event_status_disc_changed_latch() {
    let mut rig = TestRig::new();
    let mut data = vec![0u8; 4 * 2048];
    data[0] = 1;
    let path = rig.write_file("disc.iso", &data);
    rig.mount(&path);

    // Media-class poll reports NewMedia once
    let t = rig.execute(&[0x4A, 0x01, 0, 0, 0x10, 0, 0, 0, 16], 16, None);
    assert_eq!(t.csw.status, CswStatus::Ok);
    assert_eq!(t.data[2], 0x04); // media class
    assert_eq!(t.data[4], 0x02); // NewMedia

    // The latch is consumed
    let t = rig.execute(&[0x4A, 0x01, 0, 0, 0x10, 0, 0, 0, 16], 16, None);
    assert_eq!(t.data[4], 0x00);
}

#[test]
fn test_event_status_async_rejected() {
    let mut rig = TestRig::new();
    let t = rig.execute(&[0x4A, 0x00, 0, 0, 0x10, 0, 0, 0, 16], 16, None);
    assert_eq!(t.csw.status, CswStatus::Fail);
}

#[test]
fn test_mode_select_accepts_payload() {
    let mut rig = TestRig::new();
    let payload = [0u8; 24];
    let t = rig.execute(&[0x55, 0x10, 0, 0, 0, 0, 0, 0, 24, 0], 24, Some(&payload));
    assert_eq!(t.csw.status, CswStatus::Ok);
    assert_eq!(rig.gadget.state(), TcdState::ReceiveCbw);
}

#[test]
fn test_dma_lease_cycle() {
    let mut buffer: DmaBuffer<64> = DmaBuffer::new();
    buffer.as_mut_slice()[0] = 0xAA;
    {
        let leased = buffer.lease(16);
        assert_eq!(leased[0], 0xAA);
        assert_eq!(leased.len(), 16);
    }
    buffer.release();
    buffer.as_mut_slice()[1] = 0xBB;
}

#[test]
fn test_media_removed_reverts_to_no_medium() {
    let mut rig = TestRig::new();
    rig.mount_test_iso();

    let t = rig.execute(&[0x00], 0, None);
    assert_eq!(t.csw.status, CswStatus::Ok);

    *rig.image.lock().unwrap() = None;
    rig.gadget.on_media_removed();

    let t = rig.execute(&[0x00], 0, None);
    assert_eq!(t.csw.status, CswStatus::Fail);
    let t = rig.execute(&[0x03, 0, 0, 0, 14], 14, None);
    assert_eq!(t.data[12], 0x3A);
}
