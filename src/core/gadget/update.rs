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

//! Streaming-read update pump
//!
//! Long reads never happen inside a completion callback. A handler that
//! starts one leaves the gadget in `DataInRead`; [`CdGadget::update`],
//! called from the task loop, then refills the IN buffer one batch at a
//! time: seek, read, rebuild or slice each sector per the transfer mode,
//! append subchannel frames when asked, lease the buffer to the endpoint.
//! The completion callback sends the CSW after the final batch drains.

use super::scsi::sense;
use super::{CdGadget, MediaState, TcdState, TransferMode};
use crate::core::cdrom::{
    lba_to_msf_bcd, EDC_ECC_SIZE, HEADER_SIZE, RAW_SECTOR_SIZE, SUBCHANNEL_SIZE, SYNC_SIZE,
    USER_DATA_SIZE,
};
use crate::core::image::SEEK_FAIL;
use crate::core::usb::{CswStatus, UsbPort};

impl<P: UsbPort> CdGadget<P> {
    /// Run one slice of task-level work
    ///
    /// Settles a pending disc swap and, when a streaming read is in
    /// flight with no batch on the wire, produces the next batch.
    pub fn update(&mut self) {
        self.settle_disc_swap();

        if self.state == TcdState::DataInRead && !self.in_buffer.leased {
            self.pump_read();
        }
    }

    /// Complete a pending disc swap after the settle window
    ///
    /// The swap itself happened at mount; this flips the media state to
    /// "present, attention pending" so the next TEST UNIT READY starts
    /// the unit-attention handshake.
    fn settle_disc_swap(&mut self) {
        let Some(started) = self.pending_swap else {
            return;
        };
        if started.elapsed() < self.swap_settle {
            return;
        }

        self.pending_swap = None;
        self.cd_ready = true;
        self.media_state = MediaState::PresentUnitAttention;
        self.set_sense(sense::MEDIA_CHANGED);
        self.disc_changed = true;
        log::info!("Gadget: disc swap settled, unit attention pending");
    }

    /// Produce one batch of a streaming read
    fn pump_read(&mut self) {
        if !self.cd_ready {
            log::error!("Pump: device became not ready mid-transfer");
            self.send_check_condition(sense::LOGICAL_UNIT_NOT_READY);
            return;
        }

        // Clamp against the disc one more time; the leadout may have
        // moved under a disc swap
        let max_lba = self.tracks.leadout_lba();
        if self.block_address >= max_lba {
            log::error!(
                "Pump: LBA {} exceeds leadout {}, aborting",
                self.block_address,
                max_lba
            );
            self.send_check_condition(sense::LBA_OUT_OF_RANGE);
            return;
        }
        if self.block_address.saturating_add(self.num_blocks) > max_lba {
            self.num_blocks = max_lba - self.block_address;
        }

        let out_per_block = (self.transfer_block_size + self.sub_bytes) as usize;
        if self.block_size == 0 || out_per_block == 0 {
            log::error!("Pump: degenerate sector geometry");
            self.send_check_condition(sense::INVALID_FIELD_IN_CDB);
            return;
        }

        // Seek the image to the batch start
        let offset = u64::from(self.block_address) * u64::from(self.block_size);
        {
            let mut guard = self.image.lock().unwrap();
            let Some(image) = guard.as_mut() else {
                drop(guard);
                self.send_check_condition(sense::LOGICAL_UNIT_NOT_READY);
                return;
            };
            if image.seek(offset) == SEEK_FAIL {
                log::error!("Pump: seek to {} failed", offset);
                drop(guard);
                self.send_check_condition(sense::LOGICAL_UNIT_NOT_READY);
                return;
            }
        }

        // Choose the batch size: the per-speed block cap, shrunk until
        // the output (data plus subchannel) fits the IN window
        let (max_blocks, max_window) = self.batch_limits();
        let mut batch = (self.num_blocks as usize).min(max_blocks);
        self.num_blocks -= batch as u32;

        if batch * out_per_block > max_window {
            let safe = max_window / out_per_block;
            // Return the blocks this batch no longer covers
            self.num_blocks += (batch - safe) as u32;
            batch = safe;
        }

        let batch_bytes = batch * self.block_size as usize;
        if batch_bytes > self.file_chunk.len() {
            // Should be unreachable with the caps above
            log::error!("Pump: batch of {} bytes overflows staging", batch_bytes);
            self.send_check_condition(sense::UNRECOVERED_READ_ERROR);
            return;
        }

        // Read the whole batch from the image
        let read_count = {
            let mut guard = self.image.lock().unwrap();
            let Some(image) = guard.as_mut() else {
                drop(guard);
                self.send_check_condition(sense::LOGICAL_UNIT_NOT_READY);
                return;
            };
            match image.read(&mut self.file_chunk[..batch_bytes]) {
                Ok(n) => n,
                Err(e) => {
                    log::error!("Pump: read error at LBA {}: {}", self.block_address, e);
                    drop(guard);
                    self.send_check_condition(sense::UNRECOVERED_READ_ERROR);
                    return;
                }
            }
        };

        if read_count == 0 {
            log::error!("Pump: read returned nothing at LBA {}", self.block_address);
            self.send_check_condition(sense::LBA_OUT_OF_RANGE);
            return;
        }
        if read_count < batch_bytes {
            log::error!(
                "Pump: partial read {}/{} at LBA {}",
                read_count,
                batch_bytes,
                self.block_address
            );
            self.send_check_condition(sense::UNRECOVERED_READ_ERROR);
            return;
        }

        // Emit wire sectors into the IN buffer
        let block_size = self.block_size as usize;
        let transfer_size = self.transfer_block_size as usize;
        let skip = self.skip_bytes as usize;
        let mut total = 0usize;

        match self.transfer_mode {
            TransferMode::SimpleCopy => {
                let n = batch * transfer_size;
                self.in_buffer.as_mut_slice()[..n].copy_from_slice(&self.file_chunk[..n]);
                total = n;
            }
            TransferMode::SkipCopy => {
                for i in 0..batch {
                    let src = i * block_size + skip;
                    self.in_buffer.as_mut_slice()[total..total + transfer_size]
                        .copy_from_slice(&self.file_chunk[src..src + transfer_size]);
                    total += transfer_size;
                }
            }
            TransferMode::SectorRebuild => {
                let mut sector = [0u8; RAW_SECTOR_SIZE];
                for i in 0..batch {
                    rebuild_mode1_sector(
                        &mut sector,
                        self.block_address + i as u32,
                        &self.file_chunk[i * block_size..i * block_size + USER_DATA_SIZE],
                    );
                    self.in_buffer.as_mut_slice()[total..total + transfer_size]
                        .copy_from_slice(&sector[skip..skip + transfer_size]);
                    total += transfer_size;
                }
            }
        }

        // Per-sector subchannel append; a failed frame read zero-fills
        // rather than failing the whole batch
        if self.needs_subchannel {
            let sub_bytes = self.sub_bytes as usize;
            let mut frame = [0u8; SUBCHANNEL_SIZE];
            for i in 0..batch {
                let lba = self.block_address + i as u32;
                let ok = {
                    let mut guard = self.image.lock().unwrap();
                    match guard.as_mut() {
                        Some(image) => image.read_subchannel(lba, &mut frame).is_ok(),
                        None => false,
                    }
                };
                if !ok {
                    log::debug!("Pump: subchannel read failed at LBA {}, zero-filling", lba);
                    frame = [0u8; SUBCHANNEL_SIZE];
                }
                self.in_buffer.as_mut_slice()[total..total + sub_bytes]
                    .copy_from_slice(&frame[..sub_bytes]);
                total += sub_bytes;
            }
        }

        self.block_address += batch as u32;
        self.csw_status = CswStatus::Ok;

        log::trace!(
            "Pump: {} bytes on the wire ({:?}, mcs {:?}), next LBA {}, {} blocks remain",
            total,
            self.transfer_mode,
            self.mcs,
            self.block_address,
            self.num_blocks
        );

        // Hand the buffer to the endpoint; completion either lets the
        // next update() batch run or sends the CSW
        self.submit_in_buffer(total, TcdState::DataInRead);
    }
}

/// Synthesize a raw Mode 1 sector around 2048 bytes of user data
///
/// Layout: the 12-byte sync pattern `00 FF..FF 00`, a 4-byte header with
/// the BCD MSF of `lba + 150` and mode 1, the user data, then a zeroed
/// EDC/ECC trailer. Hosts asking for raw sectors from a cooked image get
/// something shaped exactly like the real thing, minus error correction.
pub(super) fn rebuild_mode1_sector(sector: &mut [u8; RAW_SECTOR_SIZE], lba: u32, user_data: &[u8]) {
    debug_assert_eq!(user_data.len(), USER_DATA_SIZE);

    // Sync pattern
    sector[0] = 0x00;
    sector[1..SYNC_SIZE - 1].fill(0xFF);
    sector[SYNC_SIZE - 1] = 0x00;

    // Header: MM SS FF mode, BCD
    let msf = lba_to_msf_bcd(lba);
    sector[SYNC_SIZE] = msf.minute;
    sector[SYNC_SIZE + 1] = msf.second;
    sector[SYNC_SIZE + 2] = msf.frame;
    sector[SYNC_SIZE + 3] = 0x01;

    // User data and a zeroed EDC/ECC trailer
    let data_start = SYNC_SIZE + HEADER_SIZE;
    sector[data_start..data_start + USER_DATA_SIZE].copy_from_slice(user_data);
    sector[data_start + USER_DATA_SIZE..data_start + USER_DATA_SIZE + EDC_ECC_SIZE].fill(0);
}
