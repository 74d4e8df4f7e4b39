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

//! SCSI Toolbox vendor commands (0xD0..0xDA)
//!
//! A community protocol that lets retro hosts browse the image catalog on
//! the device itself and switch discs without touching the web interface.
//! File entries are 40 bytes: index, type, a 33-byte NUL-terminated name
//! and a 40-bit big-endian size.

use super::{sense, ScsiResult};
use crate::core::gadget::CdGadget;
use crate::core::usb::UsbPort;

/// Most entries a LIST FILES reply will carry
const MAX_ENTRIES: usize = 100;
/// Size of one file entry on the wire
const ENTRY_SIZE: usize = 40;

impl<P: UsbPort> CdGadget<P> {
    /// LIST DEVICES (0xD9): one CD device in slot 0
    pub(super) fn toolbox_list_devices(&mut self) -> ScsiResult {
        let reply = [0x02, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        self.begin_data_in(&reply);
        Ok(())
    }

    /// COUNT FILES (0xD2/0xDA): number of images in the catalog
    pub(super) fn toolbox_count_files(&mut self) -> ScsiResult {
        let count = self
            .catalog
            .as_ref()
            .map(|c| c.len().min(MAX_ENTRIES))
            .unwrap_or(0);
        log::info!("SCSI: toolbox reports {} image(s)", count);
        self.begin_data_in(&[count as u8]);
        Ok(())
    }

    /// LIST FILES (0xD0/0xD7): 40-byte entries for each image
    pub(super) fn toolbox_list_files(&mut self) -> ScsiResult {
        let Some(catalog) = self.catalog.as_ref() else {
            self.begin_data_in(&[]);
            return Ok(());
        };

        let mut reply = Vec::with_capacity(catalog.len().min(MAX_ENTRIES) * ENTRY_SIZE);
        for (index, entry) in catalog.iter().take(MAX_ENTRIES).enumerate() {
            let mut wire = [0u8; ENTRY_SIZE];
            wire[0] = index as u8;
            wire[1] = 0; // regular file

            // 32 characters of name plus a NUL
            let name = entry.name.as_bytes();
            let len = name.len().min(32);
            wire[2..2 + len].copy_from_slice(&name[..len]);

            // 40-bit big-endian size
            let size = entry.size.min(0xFF_FFFF_FFFF);
            wire[35] = (size >> 32) as u8;
            wire[36] = (size >> 24) as u8;
            wire[37] = (size >> 16) as u8;
            wire[38] = (size >> 8) as u8;
            wire[39] = size as u8;

            reply.extend_from_slice(&wire);
        }

        self.begin_data_in(&reply);
        Ok(())
    }

    /// SET NEXT CD (0xD8): request a mount of the image at an index
    ///
    /// The mount itself happens at task level; this only records the
    /// request for the system loop to pick up.
    pub(super) fn toolbox_set_next_cd(&mut self) -> ScsiResult {
        let index = self.cbw.cb[1] as usize;

        let path = self
            .catalog
            .as_ref()
            .and_then(|c| c.path_at(index))
            .ok_or(sense::INVALID_FIELD_IN_CDB)?;

        log::info!("SCSI: toolbox selecting image {} ({})", index, path.display());
        self.pending_mount = Some(path);
        self.send_good_status();
        Ok(())
    }
}
