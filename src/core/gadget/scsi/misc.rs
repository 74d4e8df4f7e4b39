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

//! Unit state and housekeeping commands
//!
//! TEST UNIT READY, START STOP UNIT, PREVENT/ALLOW MEDIUM REMOVAL, READ
//! CAPACITY, GET EVENT STATUS NOTIFICATION, GET PERFORMANCE, REPORT KEY,
//! VERIFY and SET CD SPEED.

use super::sense;
use super::ScsiResult;
use crate::core::gadget::{CdGadget, MediaState};
use crate::core::usb::UsbPort;

impl<P: UsbPort> CdGadget<P> {
    /// TEST UNIT READY (0x00)
    ///
    /// The one command every host polls. It is also where the unit
    /// attention contract starts: the first poll after a disc change
    /// answers CHECK CONDITION 06/28/00 and the host is expected to
    /// follow up with REQUEST SENSE.
    pub(super) fn test_unit_ready(&mut self) -> ScsiResult {
        if !self.cd_ready {
            self.media_state = MediaState::NoMedium;
            return Err(sense::MEDIUM_NOT_PRESENT);
        }

        if self.media_state == MediaState::PresentUnitAttention {
            log::info!("SCSI: TEST UNIT READY -> UNIT ATTENTION (media changed)");
            return Err(sense::MEDIA_CHANGED);
        }

        self.send_good_status();
        Ok(())
    }

    /// START STOP UNIT (0x1B): accepted, nothing to spin
    pub(super) fn start_stop_unit(&mut self) -> ScsiResult {
        let start = self.cbw.cb[4] & 1;
        let loej = (self.cbw.cb[4] >> 1) & 1;
        if self.debug {
            log::debug!("SCSI: START STOP UNIT start={} loej={}", start, loej);
        }
        self.send_good_status();
        Ok(())
    }

    /// PREVENT/ALLOW MEDIUM REMOVAL (0x1E): we lie and accept
    pub(super) fn prevent_allow_medium_removal(&mut self) -> ScsiResult {
        self.send_good_status();
        Ok(())
    }

    /// READ CAPACITY (0x25): last block and a 2048-byte block size
    pub(super) fn read_capacity10(&mut self) -> ScsiResult {
        if !self.cd_ready {
            return Err(sense::LOGICAL_UNIT_NOT_READY);
        }

        let last_block = self.tracks.leadout_lba().saturating_sub(1);
        let mut reply = [0u8; 8];
        reply[0..4].copy_from_slice(&last_block.to_be_bytes());
        reply[4..8].copy_from_slice(&2048u32.to_be_bytes());

        self.begin_data_in(&reply);
        Ok(())
    }

    /// GET EVENT STATUS NOTIFICATION (0x4A)
    ///
    /// Polled mode only. Media-class requests report NewMedia exactly once
    /// per disc change; the latch clears only when the allocation length
    /// was big enough for the host to actually see the event.
    pub(super) fn get_event_status_notification(&mut self) -> ScsiResult {
        let polled = self.cbw.cb[1] & 0x01;
        let notification_class = self.cbw.cb[4];
        let allocation_length = u16::from_be_bytes([self.cbw.cb[7], self.cbw.cb[8]]) as usize;

        if polled == 0 {
            log::info!("SCSI: async event notification not supported");
            return Err(sense::INVALID_FIELD_IN_CDB);
        }

        let mut reply = Vec::with_capacity(8);

        if notification_class & (1 << 4) != 0 {
            // Header: event data length 4, media class, media supported
            reply.extend_from_slice(&[0x00, 0x04, 0x04, 0x10]);

            if self.disc_changed {
                log::info!("SCSI: reporting NewMedia event");
                reply.push(0x02); // NewMedia
                reply.push(if self.cd_ready { 0x02 } else { 0x00 });
                reply.extend_from_slice(&[0x00, 0x00]);
                if allocation_length >= 8 {
                    self.disc_changed = false;
                }
            } else if self.cd_ready {
                reply.push(0x00); // no change
                reply.extend_from_slice(&[0x02, 0x00, 0x00]);
            } else {
                reply.push(0x03); // media removal
                reply.extend_from_slice(&[0x00, 0x00, 0x00]);
            }
        } else {
            // No supported class requested
            reply.extend_from_slice(&[0x00, 0x00, 0x00, 0x10]);
        }

        reply.truncate(allocation_length);
        self.begin_data_in(&reply);
        Ok(())
    }

    /// GET PERFORMANCE (0xAC): minimal fixed reply
    pub(super) fn get_performance(&mut self) -> ScsiResult {
        let reply: [u8; 20] = [
            0x00, 0x00, 0x00, 0x10, //
            0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x01, //
            0x00, 0x00, 0x00, 0x00,
        ];
        self.begin_data_in(&reply);
        Ok(())
    }

    /// REPORT KEY (0xA4): canned reply for the Windows 2000 probe
    pub(super) fn report_key(&mut self) -> ScsiResult {
        let reply = [0x00, 0x06, 0x00, 0x00, 0x25, 0xFF, 0x01, 0x00];
        self.begin_data_in(&reply);
        Ok(())
    }

    /// VERIFY (0x2F): nothing to verify on a read-only image
    pub(super) fn verify10(&mut self) -> ScsiResult {
        self.send_good_status();
        Ok(())
    }

    /// SET CD SPEED (0xBB): accepted and ignored
    pub(super) fn set_cd_speed(&mut self) -> ScsiResult {
        self.send_good_status();
        Ok(())
    }
}
