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

//! Data reads and audio transport commands
//!
//! READ(10)/(12) and READ CD prepare the per-transaction geometry (source
//! block size, wire block size, skip offset, subchannel append) and hand
//! the transfer to the update pump. PLAY AUDIO(10)/(12)/MSF, SEEK,
//! PAUSE/RESUME and STOP/SCAN cross-wire to the CD-DA player task.

use super::{sense, ScsiResult};
use crate::core::cdrom::{
    blocksize_for_track, sector_length_from_mcs, skip_bytes_from_mcs, skipbytes_for_track,
    msf_to_lba, Mcs, LEADOUT_OFFSET,
};
use crate::core::cue::CueTrackMode;
use crate::core::gadget::{CdGadget, TcdState};
use crate::core::usb::UsbPort;

impl<P: UsbPort> CdGadget<P> {
    /// READ (10) (0x28)
    pub(super) fn read10(&mut self) -> ScsiResult {
        self.do_read(10)
    }

    /// READ (12) (0xA8)
    pub(super) fn read12(&mut self) -> ScsiResult {
        self.do_read(12)
    }

    /// Common body of READ(10)/READ(12): 2048-byte data sectors only
    fn do_read(&mut self, cdb_size: usize) -> ScsiResult {
        if !self.cd_ready {
            return Err(sense::LOGICAL_UNIT_NOT_READY);
        }

        let cb = self.cbw.cb;
        self.block_address = u32::from_be_bytes([cb[2], cb[3], cb[4], cb[5]]);
        self.num_blocks = if cdb_size == 12 {
            u32::from_be_bytes([cb[6], cb[7], cb[8], cb[9]])
        } else {
            u32::from(u16::from_be_bytes([cb[7], cb[8]]))
        };

        // Some hosts leave the count zero and size the transfer by bytes
        if self.num_blocks == 0 {
            self.num_blocks = 1 + self.host_request / 2048;
        }

        let max_lba = self.tracks.leadout_lba();
        if self.block_address >= max_lba {
            log::warn!(
                "SCSI: READ beyond disc: LBA {} (max {})",
                self.block_address,
                max_lba
            );
            return Err(sense::LBA_OUT_OF_RANGE);
        }

        if self.block_address.saturating_add(self.num_blocks) > max_lba {
            let truncated = max_lba - self.block_address;
            log::info!(
                "SCSI: READ truncated from {} to {} blocks",
                self.num_blocks,
                truncated
            );
            self.num_blocks = truncated;
        }

        if self.num_blocks == 0 {
            return Err(sense::LBA_OUT_OF_RANGE);
        }

        if self.debug {
            log::debug!(
                "SCSI: READ({}) LBA={} count={}",
                cdb_size,
                self.block_address,
                self.num_blocks
            );
        }

        self.transfer_block_size = 2048;
        self.block_size = self.data_block_size;
        self.skip_bytes = self.data_skip_bytes;
        self.sub_bytes = 0;
        self.needs_subchannel = false;
        self.mcs = Mcs::empty();
        self.derive_transfer_mode();

        self.state = TcdState::DataInRead;
        Ok(())
    }

    /// READ CD (0xBE)
    ///
    /// The complex read: an expected-sector-type filter, a main-channel
    /// selection deciding which slices of the 2352-byte sector go on the
    /// wire, and an optional per-sector subchannel append.
    pub(super) fn read_cd(&mut self) -> ScsiResult {
        if !self.cd_ready {
            return Err(sense::LOGICAL_UNIT_NOT_READY);
        }

        let cb = self.cbw.cb;
        let expected_sector_type = (cb[1] >> 2) & 0x07;
        self.block_address = u32::from_be_bytes([cb[2], cb[3], cb[4], cb[5]]);
        self.num_blocks = u32::from_be_bytes([0, cb[6], cb[7], cb[8]]);
        self.mcs = Mcs::from_bits_truncate((cb[9] >> 3) & 0x1F);
        let sub_channel_selection = cb[10] & 0x07;

        if self.debug {
            log::debug!(
                "SCSI: READ CD LBA={} blocks={} type={} mcs={:?} subchan={}",
                self.block_address,
                self.num_blocks,
                expected_sector_type,
                self.mcs,
                sub_channel_selection
            );
        }

        if sub_channel_selection != 0 && !self.has_subchannel {
            log::info!("SCSI: READ CD wants subchannel but image has none");
            return Err(sense::INVALID_FIELD_IN_CDB);
        }

        let (track_mode, track_sector_length) = match self.track_for_lba(self.block_address) {
            Some(track) => (track.track_mode, track.sector_length),
            None => (CueTrackMode::Audio, 2352),
        };

        // Cross-check the requested sector type against the track layout
        if expected_sector_type != 0 {
            let sector_type_ok = match expected_sector_type {
                1 => track_mode == CueTrackMode::Audio,
                2 => matches!(
                    track_mode,
                    CueTrackMode::Mode1_2048 | CueTrackMode::Mode1_2352
                ),
                3..=5 => track_mode == CueTrackMode::Mode2_2352,
                _ => false,
            };

            if !sector_type_ok {
                log::info!(
                    "SCSI: READ CD sector type {} does not match track mode {:?}",
                    expected_sector_type,
                    track_mode
                );
                return Err(sense::ILLEGAL_MODE_FOR_TRACK);
            }
        }

        // The whole request must land inside the image
        let read_end = (u64::from(self.block_address) + u64::from(self.num_blocks))
            * u64::from(track_sector_length);
        if read_end > self.image_size {
            log::warn!("SCSI: READ CD exceeds image size");
            return Err(sense::LBA_OUT_OF_RANGE);
        }

        match expected_sector_type {
            0x01 => {
                // CD-DA raw
                self.block_size = 2352;
                self.transfer_block_size = 2352;
                self.skip_bytes = 0;
            }
            0x02 => {
                // Mode 1 user data
                self.skip_bytes = skipbytes_for_track(track_mode);
                self.block_size = blocksize_for_track(track_mode);
                self.transfer_block_size = 2048;
            }
            0x03 => {
                // Mode 2 formless: strip sync + header
                self.skip_bytes = 16;
                self.block_size = 2352;
                self.transfer_block_size = 2336;
            }
            0x04 => {
                // Mode 2 form 1 user data
                self.skip_bytes = skipbytes_for_track(track_mode);
                self.block_size = blocksize_for_track(track_mode);
                self.transfer_block_size = 2048;
            }
            0x05 => {
                // Mode 2 form 2: strip sync + header + subheader
                self.block_size = 2352;
                self.skip_bytes = 24;
                self.transfer_block_size = 2328;
            }
            _ => {
                // Unspecified: combine the MCS with the track defaults
                if track_mode == CueTrackMode::Audio {
                    self.block_size = 2352;
                    self.transfer_block_size = 2352;
                    self.skip_bytes = 0;
                } else {
                    self.block_size = blocksize_for_track(track_mode);
                    self.transfer_block_size = sector_length_from_mcs(self.mcs);
                    self.skip_bytes = skip_bytes_from_mcs(self.mcs);
                }
            }
        }

        self.sub_bytes = match sub_channel_selection {
            0x00 => 0,
            0x01 => 96, // raw P-W
            0x02 => 16, // formatted Q
            _ => {
                log::info!(
                    "SCSI: READ CD unsupported subchannel selection {}",
                    sub_channel_selection
                );
                return Err(sense::INVALID_FIELD_IN_CDB);
            }
        };
        self.needs_subchannel = self.sub_bytes != 0;

        if self.num_blocks == 0 && self.transfer_block_size != 0 {
            self.num_blocks = 1 + self.host_request / self.transfer_block_size;
        }

        self.derive_transfer_mode();
        self.state = TcdState::DataInRead;
        Ok(())
    }

    /// PLAY AUDIO (10) (0x45)
    pub(super) fn play_audio10(&mut self) -> ScsiResult {
        self.do_play_audio(10)
    }

    /// PLAY AUDIO (12) (0xA5)
    pub(super) fn play_audio12(&mut self) -> ScsiResult {
        self.do_play_audio(12)
    }

    /// Common body of PLAY AUDIO: the LBA must sit inside an audio track
    fn do_play_audio(&mut self, cdb_size: usize) -> ScsiResult {
        let cb = self.cbw.cb;
        let lba = u32::from_be_bytes([cb[2], cb[3], cb[4], cb[5]]);
        let num_blocks = if cdb_size == 12 {
            u32::from_be_bytes([cb[6], cb[7], cb[8], cb[9]])
        } else {
            u32::from(u16::from_be_bytes([cb[7], cb[8]]))
        };

        log::info!(
            "SCSI: PLAY AUDIO({}) from {} for {} blocks",
            cdb_size,
            lba,
            num_blocks
        );

        if num_blocks > 0 {
            let is_audio = self
                .track_for_lba(lba)
                .map(|t| t.track_mode == CueTrackMode::Audio)
                .unwrap_or(false);

            if lba == 0xFFFF_FFFF {
                self.player.resume();
            } else if is_audio {
                self.player.play(lba, num_blocks);
            } else {
                return Err(sense::ILLEGAL_MODE_FOR_TRACK);
            }
        }

        self.send_good_status();
        Ok(())
    }

    /// PLAY AUDIO MSF (0x47)
    ///
    /// Start and end come as MSF triples. Equal start and end means
    /// pause; an all-ones start resumes.
    pub(super) fn play_audio_msf(&mut self) -> ScsiResult {
        let cb = self.cbw.cb;
        let start_is_wildcard = cb[3] == 0xFF && cb[4] == 0xFF && cb[5] == 0xFF;
        let start_lba = msf_to_lba(cb[3], cb[4], cb[5]).saturating_sub(LEADOUT_OFFSET);
        let end_lba = msf_to_lba(cb[6], cb[7], cb[8]).saturating_sub(LEADOUT_OFFSET);

        log::info!(
            "SCSI: PLAY AUDIO MSF {:02}:{:02}:{:02} -> {:02}:{:02}:{:02} (LBA {}..{})",
            cb[3],
            cb[4],
            cb[5],
            cb[6],
            cb[7],
            cb[8],
            start_lba,
            end_lba
        );

        if start_is_wildcard {
            self.player.resume();
            self.send_good_status();
            return Ok(());
        }

        if start_lba == end_lba {
            self.player.pause();
            self.send_good_status();
            return Ok(());
        }

        let is_audio = self
            .track_for_lba(start_lba)
            .map(|t| t.track_mode == CueTrackMode::Audio)
            .unwrap_or(false);
        if !is_audio {
            log::info!("SCSI: PLAY AUDIO MSF target is not an audio track");
            return Err(sense::ILLEGAL_MODE_FOR_TRACK);
        }

        self.player
            .play(start_lba, end_lba.saturating_sub(start_lba));
        self.send_good_status();
        Ok(())
    }

    /// SEEK (0x2B): repositions the audio player
    pub(super) fn seek10(&mut self) -> ScsiResult {
        let cb = self.cbw.cb;
        let lba = u32::from_be_bytes([cb[2], cb[3], cb[4], cb[5]]);
        if self.debug {
            log::debug!("SCSI: SEEK to LBA {}", lba);
        }
        self.player.seek(lba);
        self.send_good_status();
        Ok(())
    }

    /// PAUSE/RESUME (0x4B): byte 8 bit 0 selects
    pub(super) fn pause_resume(&mut self) -> ScsiResult {
        if self.cbw.cb[8] & 0x01 != 0 {
            self.player.resume();
        } else {
            self.player.pause();
        }
        self.send_good_status();
        Ok(())
    }

    /// STOP PLAY/SCAN (0x4E): halts audio
    pub(super) fn stop_scan(&mut self) -> ScsiResult {
        self.player.pause();
        self.send_good_status();
        Ok(())
    }
}
