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

//! CBW/CSW framing and descriptor tests

use super::descriptors::*;
use super::*;

#[test]
fn test_cbw_roundtrip() {
    let cbw = Cbw {
        signature: CBW_SIGNATURE,
        tag: 0xDEADBEEF,
        data_transfer_length: 2048,
        flags: 0x80,
        lun: 0,
        cb_length: 10,
        cb: [
            0x28, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0,
        ],
    };

    let bytes = cbw.to_bytes();
    assert_eq!(bytes.len(), CBW_SIZE);
    assert_eq!(&bytes[0..4], &[0x55, 0x53, 0x42, 0x43]); // "USBC"

    let parsed = Cbw::parse(&bytes).unwrap();
    assert_eq!(parsed.tag, 0xDEADBEEF);
    assert_eq!(parsed.data_transfer_length, 2048);
    assert_eq!(parsed.direction(), TransferDir::In);
    assert_eq!(parsed.opcode(), 0x28);
}

#[test]
fn test_cbw_rejects_bad_signature() {
    let mut bytes = [0u8; CBW_SIZE];
    bytes[0] = 0xFF;
    assert!(Cbw::parse(&bytes).is_none());
}

#[test]
fn test_cbw_rejects_bad_length() {
    let bytes = [0u8; CBW_SIZE - 1];
    assert!(Cbw::parse(&bytes).is_none());
    let bytes = [0u8; CBW_SIZE + 3];
    assert!(Cbw::parse(&bytes).is_none());
}

#[test]
fn test_cbw_direction_out() {
    let cbw = Cbw {
        flags: 0x00,
        ..Default::default()
    };
    assert_eq!(cbw.direction(), TransferDir::Out);
}

#[test]
fn test_csw_layout() {
    let csw = Csw {
        tag: 0x0102_0304,
        data_residue: 16,
        status: CswStatus::Fail,
    };

    let bytes = csw.to_bytes();
    assert_eq!(bytes.len(), CSW_SIZE);
    assert_eq!(&bytes[0..4], &[0x55, 0x53, 0x42, 0x53]); // "USBS"
    assert_eq!(&bytes[4..8], &[0x04, 0x03, 0x02, 0x01]);
    assert_eq!(&bytes[8..12], &[16, 0, 0, 0]);
    assert_eq!(bytes[12], 1);

    let parsed = Csw::parse(&bytes).unwrap();
    assert_eq!(parsed.tag, 0x0102_0304);
    assert_eq!(parsed.data_residue, 16);
    assert_eq!(parsed.status, CswStatus::Fail);
}

#[test]
fn test_loopback_port() {
    let mut port = LoopbackPort::new();
    assert!(port.pop_in().is_none());

    port.submit_in(&[1, 2, 3]);
    port.submit_in(&[4]);
    assert_eq!(port.pop_in().unwrap(), vec![1, 2, 3]);
    assert_eq!(port.pop_in().unwrap(), vec![4]);

    port.arm_out(31);
    assert_eq!(port.armed_out(), Some(31));

    assert!(!port.is_stalled());
    port.stall(TransferDir::In);
    assert!(port.is_stalled());
    port.clear_stall();
    assert!(!port.is_stalled());
}

#[test]
fn test_device_descriptor() {
    let desc = device_descriptor();
    assert_eq!(desc[0], 18);
    assert_eq!(desc[1], 0x01);
    // VID 0x1d6b little-endian
    assert_eq!(desc[8], 0x6B);
    assert_eq!(desc[9], 0x1D);
}

#[test]
fn test_configuration_descriptors() {
    let fs = configuration_descriptor(true);
    let hs = configuration_descriptor(false);
    assert_eq!(fs.len(), 32);
    assert_eq!(hs.len(), 32);

    // Interface class triple: mass storage / SCSI / BBB
    assert_eq!(&fs[14..17], &[0x08, 0x02, 0x50]);

    // Bulk max packet differs: 64 vs 512
    assert_eq!(&fs[22..24], &[64, 0]);
    assert_eq!(&hs[22..24], &[0x00, 0x02]);
}

#[test]
fn test_string_descriptor() {
    let desc = string_descriptor("AB");
    assert_eq!(desc, vec![6, 0x03, b'A', 0, b'B', 0]);
}

#[test]
fn test_serial_format() {
    assert_eq!(format_serial(0x1234), "USBODE-00001234");
}
