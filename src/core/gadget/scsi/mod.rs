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

//! SCSI/MMC command dispatch
//!
//! One jump table from opcode to handler. Handlers are methods on the
//! gadget, grouped by concern across the sibling files; each inspects the
//! CBW, consults the track list and the mounted image, and either starts
//! a data stage or completes the transaction. A handler signals failure
//! by returning a [`SenseTriple`]; the dispatcher latches it and answers
//! CHECK CONDITION in exactly one place, so sense state can never drift
//! out of sync with the CSW.

mod inquiry;
mod misc;
mod read;
mod toc;
mod toolbox;

use super::CdGadget;
use crate::core::usb::UsbPort;

/// A latched sense condition: sense key, ASC, ASCQ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SenseTriple {
    /// Sense key
    pub key: u8,
    /// Additional sense code
    pub asc: u8,
    /// Additional sense code qualifier
    pub ascq: u8,
}

impl SenseTriple {
    /// Construct a sense triple
    pub const fn new(key: u8, asc: u8, ascq: u8) -> Self {
        Self { key, asc, ascq }
    }

    /// True when no sense is latched
    pub fn is_clear(&self) -> bool {
        self.key == 0 && self.asc == 0 && self.ascq == 0
    }
}

/// Result type of a SCSI handler
pub type ScsiResult = Result<(), SenseTriple>;

/// Canonical sense triples used by this device
pub mod sense {
    use super::SenseTriple;

    /// NOT READY, LOGICAL UNIT NOT READY
    pub const LOGICAL_UNIT_NOT_READY: SenseTriple = SenseTriple::new(0x02, 0x04, 0x00);
    /// NOT READY, MEDIUM NOT PRESENT
    pub const MEDIUM_NOT_PRESENT: SenseTriple = SenseTriple::new(0x02, 0x3A, 0x00);
    /// MEDIUM ERROR, UNRECOVERED READ ERROR
    pub const UNRECOVERED_READ_ERROR: SenseTriple = SenseTriple::new(0x03, 0x11, 0x00);
    /// ILLEGAL REQUEST, INVALID COMMAND OPERATION CODE
    pub const INVALID_COMMAND: SenseTriple = SenseTriple::new(0x05, 0x20, 0x00);
    /// ILLEGAL REQUEST, LOGICAL BLOCK ADDRESS OUT OF RANGE
    pub const LBA_OUT_OF_RANGE: SenseTriple = SenseTriple::new(0x05, 0x21, 0x00);
    /// ILLEGAL REQUEST, INVALID FIELD IN CDB
    pub const INVALID_FIELD_IN_CDB: SenseTriple = SenseTriple::new(0x05, 0x24, 0x00);
    /// ILLEGAL REQUEST, SAVING PARAMETERS NOT SUPPORTED
    pub const SAVING_NOT_SUPPORTED: SenseTriple = SenseTriple::new(0x05, 0x39, 0x00);
    /// ILLEGAL REQUEST, ILLEGAL MODE FOR THIS TRACK
    pub const ILLEGAL_MODE_FOR_TRACK: SenseTriple = SenseTriple::new(0x05, 0x64, 0x00);
    /// UNIT ATTENTION, NOT READY TO READY CHANGE (MEDIA CHANGED)
    pub const MEDIA_CHANGED: SenseTriple = SenseTriple::new(0x06, 0x28, 0x00);
}

impl<P: UsbPort> CdGadget<P> {
    /// Decode the CBW's opcode and run the matching handler
    pub(super) fn handle_scsi_command(&mut self) {
        let opcode = self.cbw.opcode();
        if self.debug {
            log::debug!(
                "SCSI: opcode {:02x}, tag {:08x}, transfer {}",
                opcode,
                self.cbw.tag,
                self.cbw.data_transfer_length
            );
        }

        let result = match opcode {
            0x00 => self.test_unit_ready(),
            0x03 => self.request_sense(),
            0x12 => self.inquiry(),
            0x1A => self.mode_sense6(),
            0x1B => self.start_stop_unit(),
            0x1E => self.prevent_allow_medium_removal(),
            0x25 => self.read_capacity10(),
            0x28 => self.read10(),
            0x2B => self.seek10(),
            0x2F => self.verify10(),
            0x42 => self.read_sub_channel(),
            0x43 => self.read_toc(),
            0x44 => self.read_header(),
            0x45 => self.play_audio10(),
            0x46 => self.get_configuration(),
            0x47 => self.play_audio_msf(),
            0x4A => self.get_event_status_notification(),
            0x4B => self.pause_resume(),
            0x4E => self.stop_scan(),
            0x51 => self.read_disc_information(),
            0x52 => self.read_track_information(),
            0x55 => self.mode_select10(),
            0x5A => self.mode_sense10(),
            0xA4 => self.report_key(),
            0xA5 => self.play_audio12(),
            0xA8 => self.read12(),
            0xAC => self.get_performance(),
            0xAD => self.read_disc_structure(),
            0xBB => self.set_cd_speed(),
            0xBE => self.read_cd(),
            0xD0 | 0xD7 => self.toolbox_list_files(),
            0xD2 | 0xDA => self.toolbox_count_files(),
            0xD8 => self.toolbox_set_next_cd(),
            0xD9 => self.toolbox_list_devices(),
            _ => {
                log::warn!("SCSI: unknown command 0x{:02x}", opcode);
                Err(sense::INVALID_COMMAND)
            }
        };

        if let Err(sense) = result {
            self.send_check_condition(sense);
        }
    }
}
