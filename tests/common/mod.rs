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

//! Shared fixtures for the integration tests

use std::path::{Path, PathBuf};

use cdgadget::core::gadget::{CdGadget, TcdState};
use cdgadget::core::usb::{Cbw, Csw, LoopbackPort, TransferDir, CBW_SIGNATURE};

/// Write an ISO where sector n is filled with byte n
pub fn write_patterned_iso(dir: &Path, name: &str, sectors: usize) -> PathBuf {
    let path = dir.join(name);
    let mut data = vec![0u8; sectors * 2048];
    for (n, sector) in data.chunks_mut(2048).enumerate() {
        sector.fill(n as u8);
    }
    std::fs::write(&path, data).unwrap();
    path
}

/// Write a two-track CUE/BIN pair (data then audio at LBA 1000)
pub fn write_mixed_cue(dir: &Path) -> PathBuf {
    let mut data = vec![0u8; 1200 * 2048];
    for (n, sector) in data.chunks_mut(2048).enumerate() {
        sector.fill(n as u8);
    }
    std::fs::write(dir.join("game.bin"), data).unwrap();

    let cue_path = dir.join("game.cue");
    std::fs::write(
        &cue_path,
        "FILE \"game.bin\" BINARY\n\
         \x20 TRACK 01 MODE1/2048\n\
         \x20   INDEX 01 00:00:00\n\
         \x20 TRACK 02 AUDIO\n\
         \x20   INDEX 01 00:13:25\n",
    )
    .unwrap();
    cue_path
}

/// Drive one Bulk-Only transaction through the loopback port
pub fn transact(
    gadget: &mut CdGadget<LoopbackPort>,
    tag: u32,
    cdb: &[u8],
    transfer_length: u32,
) -> (Vec<u8>, Csw) {
    let mut cb = [0u8; 16];
    cb[..cdb.len()].copy_from_slice(cdb);
    let cbw = Cbw {
        signature: CBW_SIGNATURE,
        tag,
        data_transfer_length: transfer_length,
        flags: 0x80,
        lun: 0,
        cb_length: cdb.len() as u8,
        cb,
    };

    gadget.receive_out(&cbw.to_bytes());

    let mut data = Vec::new();
    for _ in 0..10_000 {
        match gadget.state() {
            TcdState::DataInRead => {
                if let Some(buf) = gadget.port_mut().pop_in() {
                    let len = buf.len();
                    data.extend(buf);
                    gadget.on_transfer_complete(TransferDir::In, len);
                } else {
                    gadget.update();
                }
            }
            TcdState::SentCsw => {
                let buf = gadget.port_mut().pop_in().expect("CSW queued");
                let csw = Csw::parse(&buf).expect("valid CSW");
                gadget.on_transfer_complete(TransferDir::In, buf.len());
                return (data, csw);
            }
            _ => {
                let buf = gadget.port_mut().pop_in().expect("IN payload queued");
                let len = buf.len();
                data.extend(buf);
                gadget.on_transfer_complete(TransferDir::In, len);
            }
        }
    }
    panic!("transaction did not complete");
}
