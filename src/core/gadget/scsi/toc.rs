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

//! Table-of-contents and disc structure commands
//!
//! READ TOC in its standard, session, full/raw and ATIP shapes, READ DISC
//! INFORMATION, READ TRACK INFORMATION, READ HEADER, READ SUB-CHANNEL and
//! READ DISC STRUCTURE. Every descriptor here is assembled byte by byte;
//! hosts compare these against real drives, and a single wrong control
//! nibble is the difference between a mounted disc and a USB reset.

use super::{sense, ScsiResult};
use crate::core::cdrom::{get_address, lba_to_msf, lba_to_msf_bcd};
use crate::core::cue::{CueTrackInfo, CueTrackMode};
use crate::core::gadget::CdGadget;
use crate::core::image::MediaType;
use crate::core::usb::UsbPort;

/// ADR/control for a data track (ADR 1, data, copy permitted)
const ADR_CTRL_DATA: u8 = 0x14;
/// ADR/control for an audio track (ADR 1, audio)
const ADR_CTRL_AUDIO: u8 = 0x10;

fn adr_ctrl(track: &CueTrackInfo) -> u8 {
    if track.track_mode == CueTrackMode::Audio {
        ADR_CTRL_AUDIO
    } else {
        ADR_CTRL_DATA
    }
}

/// The 4 address bytes of a TOC entry: 00 MM SS FF or a big-endian LBA
fn toc_address(lba: u32, msf: bool) -> [u8; 4] {
    if msf {
        let enc = lba_to_msf(lba);
        [0, enc.minute, enc.second, enc.frame]
    } else {
        lba.to_be_bytes()
    }
}

impl<P: UsbPort> CdGadget<P> {
    /// READ TOC (0x43)
    pub(super) fn read_toc(&mut self) -> ScsiResult {
        if !self.cd_ready {
            return Err(sense::LOGICAL_UNIT_NOT_READY);
        }

        let cb = self.cbw.cb;
        let msf = (cb[1] >> 1) & 0x01 != 0;
        let mut format = cb[2] & 0x0F;
        let starting_track = cb[6];
        let allocation_length = u16::from_be_bytes([cb[7], cb[8]]) as usize;

        // Matshita/Panasonic hosts request format 0 with control 0x80,
        // meaning "full TOC with BCD addresses"
        let mut use_bcd = false;
        if format == 0 && cb[9] == 0x80 {
            format = 2;
            use_bcd = true;
            log::debug!("SCSI: Matshita vendor extension, full TOC in BCD");
        }

        if self.debug {
            log::debug!(
                "SCSI: READ TOC format={} msf={} start={} alloc={}",
                format,
                msf,
                starting_track,
                allocation_length
            );
        }

        match format {
            0 => self.do_read_toc(msf, starting_track, allocation_length),
            1 => self.do_read_session_info(msf, allocation_length),
            2 => self.do_read_full_toc(starting_track, allocation_length, use_bcd),
            4 => self.do_read_atip(allocation_length),
            _ => Err(sense::INVALID_FIELD_IN_CDB),
        }
    }

    /// Format 0x00: one 8-byte descriptor per track plus the leadout
    fn do_read_toc(&mut self, msf: bool, starting_track: u8, allocation: usize) -> ScsiResult {
        let mut entries: Vec<u8> = Vec::with_capacity((self.tracks.len() + 1) * 8);
        let mut track_count = 0u16;
        let mut first_track = 0u8;
        let mut last: Option<CueTrackInfo> = None;

        for track in self.tracks.iter() {
            if first_track == 0 {
                first_track = track.track_number;
            }

            // 0xAA as the starting track skips every real track and
            // leaves just the leadout
            if starting_track == 0 || starting_track <= track.track_number {
                entries.push(0);
                entries.push(adr_ctrl(track));
                entries.push(track.track_number);
                entries.push(0);
                entries.extend_from_slice(&toc_address(track.data_start, msf));
                track_count += 1;
            }
            last = Some(track.clone());
        }

        // The leadout entry is always present, numbered 0xAA and marked
        // as a data position
        entries.push(0);
        entries.push(ADR_CTRL_DATA);
        entries.push(0xAA);
        entries.push(0);
        entries.extend_from_slice(&toc_address(self.tracks.leadout_lba(), msf));
        track_count += 1;

        if starting_track != 0 && starting_track != 0xAA && track_count < 2 {
            return Err(sense::INVALID_FIELD_IN_CDB);
        }

        let toc_length = 2 + track_count * 8;
        let mut reply = Vec::with_capacity(4 + entries.len());
        reply.extend_from_slice(&toc_length.to_be_bytes());
        reply.push(first_track);
        reply.push(last.map(|t| t.track_number).unwrap_or(0));
        reply.extend_from_slice(&entries);

        reply.truncate(allocation);
        self.begin_data_in(&reply);
        Ok(())
    }

    /// Format 0x01: single-session summary
    fn do_read_session_info(&mut self, msf: bool, allocation: usize) -> ScsiResult {
        let mut reply = vec![
            0x00, 0x0A, // data length
            0x01, 0x01, // first and last session
            0x00, ADR_CTRL_DATA, 0x01, 0x00,
        ];

        let first_start = self.tracks.first().map(|t| t.data_start).unwrap_or(0);
        reply.extend_from_slice(&toc_address(first_start, msf));

        reply.truncate(allocation);
        self.begin_data_in(&reply);
        Ok(())
    }

    /// Format 0x02: raw TOC with A0/A1/A2 descriptors plus one per track
    fn do_read_full_toc(&mut self, session: u8, allocation: usize, use_bcd: bool) -> ScsiResult {
        if session > 1 {
            return Err(sense::INVALID_FIELD_IN_CDB);
        }

        let encode = |lba: u32| -> [u8; 3] {
            let enc = if use_bcd {
                lba_to_msf_bcd(lba)
            } else {
                lba_to_msf(lba)
            };
            [enc.minute, enc.second, enc.frame]
        };

        let first = self.tracks.first().cloned();
        let last = self.tracks.last().cloned();
        let first_ctrl = first.as_ref().map(adr_ctrl).unwrap_or(ADR_CTRL_DATA);
        let last_ctrl = last.as_ref().map(adr_ctrl).unwrap_or(ADR_CTRL_DATA);

        let mut body: Vec<u8> = Vec::with_capacity(33 + self.tracks.len() * 11);

        // A0: first track number
        body.extend_from_slice(&[0x01, first_ctrl, 0x00, 0xA0, 0x00, 0x00, 0x00, 0x00]);
        body.push(first.as_ref().map(|t| t.track_number).unwrap_or(1));
        body.extend_from_slice(&[0x00, 0x00]);

        // A1: last track number
        body.extend_from_slice(&[0x01, last_ctrl, 0x00, 0xA1, 0x00, 0x00, 0x00, 0x00]);
        body.push(last.as_ref().map(|t| t.track_number).unwrap_or(1));
        body.extend_from_slice(&[0x00, 0x00]);

        // A2: leadout position
        body.extend_from_slice(&[0x01, last_ctrl, 0x00, 0xA2, 0x00, 0x00, 0x00, 0x00]);
        body.extend_from_slice(&encode(self.tracks.leadout_lba()));

        // One raw descriptor per track: session, adr/ctrl, TNO 0, POINT,
        // unused ATIME, hour, then the PMSF address
        for track in self.tracks.iter() {
            body.extend_from_slice(&[
                0x01,
                adr_ctrl(track),
                0x00,
                track.track_number,
                0x00,
                0x00,
                0x00,
                0x00,
            ]);
            let enc = if use_bcd {
                lba_to_msf_bcd(track.data_start)
            } else {
                lba_to_msf(track.data_start)
            };
            body.extend_from_slice(&[enc.minute, enc.second, enc.frame]);
        }

        let toc_length = (body.len() + 2) as u16;
        let mut reply = Vec::with_capacity(4 + body.len());
        reply.extend_from_slice(&toc_length.to_be_bytes());
        reply.push(0x01); // first session
        reply.push(0x01); // last session
        reply.extend_from_slice(&body);

        reply.truncate(allocation);
        self.begin_data_in(&reply);
        Ok(())
    }

    /// Format 0x04: minimal ATIP, nothing recordable to describe
    fn do_read_atip(&mut self, allocation: usize) -> ScsiResult {
        let mut reply = vec![0x00, 0x02, 0x00, 0x00];
        reply.truncate(allocation);
        self.begin_data_in(&reply);
        Ok(())
    }

    /// READ DISC INFORMATION (0x51)
    pub(super) fn read_disc_information(&mut self) -> ScsiResult {
        if !self.cd_ready {
            return Err(sense::LOGICAL_UNIT_NOT_READY);
        }

        let allocation_length = u16::from_be_bytes([self.cbw.cb[7], self.cbw.cb[8]]) as usize;

        // Complete, last session complete, non-erasable
        let disc_type = match self.tracks.track_for_number(1) {
            Some(t) if t.track_mode == CueTrackMode::Audio => 0x00,
            _ => 0x10,
        };
        let leadout = self.tracks.leadout_lba();

        let mut reply = vec![0u8; 34];
        reply[0..2].copy_from_slice(&0x0020u16.to_be_bytes());
        reply[2] = 0x0E; // disc status: complete
        reply[3] = 0x01; // first track
        reply[4] = 0x01; // sessions
        reply[5] = 0x01; // first track in last session
        reply[6] = self.tracks.last_track_number();
        reply[8] = disc_type;
        reply[14..18].copy_from_slice(&leadout.to_be_bytes());
        reply[18..22].copy_from_slice(&leadout.to_be_bytes());

        reply.truncate(allocation_length);
        self.begin_data_in(&reply);
        Ok(())
    }

    /// READ TRACK INFORMATION (0x52)
    pub(super) fn read_track_information(&mut self) -> ScsiResult {
        if !self.cd_ready {
            return Err(sense::LOGICAL_UNIT_NOT_READY);
        }

        let cb = self.cbw.cb;
        let address_type = cb[1] & 0x03;
        let address = u32::from_be_bytes([cb[2], cb[3], cb[4], cb[5]]);
        let allocation_length = u16::from_be_bytes([cb[7], cb[8]]) as usize;

        let track = match address_type {
            0x00 => self.track_for_lba(address).cloned(),
            0x01 => self
                .tracks
                .track_for_number(address.min(255) as u8)
                .cloned(),
            0x02 => {
                // Session addressing; only session 1 exists
                if address == 1 {
                    self.tracks.first().cloned()
                } else {
                    None
                }
            }
            _ => None,
        };

        let Some(track) = track else {
            return Err(sense::INVALID_FIELD_IN_CDB);
        };

        let track_length = self.tracks.track_length(track.track_number);

        let mut reply = vec![0u8; 48];
        reply[0..2].copy_from_slice(&0x002Eu16.to_be_bytes());
        reply[2] = track.track_number;
        reply[3] = 0x01; // session
        if track.track_mode == CueTrackMode::Audio {
            reply[5] = 0x00; // two-channel audio
            reply[6] = 0x00;
        } else {
            reply[5] = 0x04; // data, uninterrupted
            reply[6] = 0x01; // mode 1
        }
        reply[8..12].copy_from_slice(&track.data_start.to_be_bytes());
        reply[24..28].copy_from_slice(&track_length.to_be_bytes());

        reply.truncate(allocation_length);
        self.begin_data_in(&reply);
        Ok(())
    }

    /// READ HEADER (0x44)
    ///
    /// MMC requires audio playback to stop before the header is read.
    pub(super) fn read_header(&mut self) -> ScsiResult {
        if !self.cd_ready {
            return Err(sense::LOGICAL_UNIT_NOT_READY);
        }

        self.player.pause();

        let cb = self.cbw.cb;
        let msf = cb[1] & 0x02 != 0;
        let lba = u32::from_be_bytes([cb[2], cb[3], cb[4], cb[5]]);
        let allocation_length = u16::from_be_bytes([cb[7], cb[8]]) as usize;

        let mode = match self.track_for_lba(lba) {
            Some(t) if t.track_mode == CueTrackMode::Audio => 0,
            _ => 1,
        };

        let mut reply = vec![mode, 0, 0, 0];
        reply.extend_from_slice(&toc_address(lba, msf));

        reply.truncate(allocation_length);
        self.begin_data_in(&reply);
        Ok(())
    }

    /// READ SUB-CHANNEL (0x42)
    ///
    /// Format 0x01 reports the audio status and current position of the
    /// player. Observing a stopped status here consumes it.
    pub(super) fn read_sub_channel(&mut self) -> ScsiResult {
        let cb = self.cbw.cb;
        let msf = (cb[1] >> 1) & 0x01 != 0;
        let mut parameter_list = cb[3];
        let allocation_length = u16::from_be_bytes([cb[7], cb[8]]) as usize;

        if parameter_list == 0x00 {
            // Reserved; assume the caller wants the current position
            parameter_list = 0x01;
        }

        let mut reply: Vec<u8> = Vec::with_capacity(16);

        match parameter_list {
            0x01 => {
                let status = self.player.status();

                // Header: reserved, audio status, data length
                reply.push(0x00);
                reply.push(status.state.audio_status());
                reply.extend_from_slice(&12u16.to_be_bytes());

                // Current position block
                reply.push(0x01); // format code
                let (adr_control, track_number, relative) = match self.track_for_lba(status.lba) {
                    Some(track) => (
                        adr_ctrl(track),
                        track.track_number,
                        status.lba.saturating_sub(track.track_start),
                    ),
                    None => (0x00, 0, 0),
                };
                reply.push(adr_control);
                reply.push(track_number);
                reply.push(0x01); // index
                reply.extend_from_slice(&get_address(status.lba, msf));
                reply.extend_from_slice(&get_address(relative, msf));
            }
            0x02 | 0x03 => {
                // Media catalog number / ISRC: not stored in any image
                // format we mount; an empty reply keeps hosts moving
            }
            _ => {}
        }

        reply.truncate(allocation_length);
        self.begin_data_in(&reply);
        Ok(())
    }

    /// READ DISC STRUCTURE (0xAD)
    ///
    /// DVD structures when DVD media is mounted. For CD media the
    /// DVD-specific formats return an empty header instead of CHECK
    /// CONDITION: MacOS resets the whole USB device otherwise.
    pub(super) fn read_disc_structure(&mut self) -> ScsiResult {
        let cb = self.cbw.cb;
        let format = cb[7];
        let allocation_length = u16::from_be_bytes([cb[8], cb[9]]) as usize;

        let is_dvd = self.media_type == MediaType::Dvd;

        if !is_dvd && matches!(format, 0x00 | 0x02 | 0x03 | 0x04) {
            log::debug!(
                "SCSI: READ DISC STRUCTURE format 0x{:02x} on CD media, empty reply",
                format
            );
            let mut reply = vec![0x00, 0x02, 0x00, 0x00];
            reply.truncate(allocation_length);
            self.begin_data_in(&reply);
            return Ok(());
        }

        let mut reply: Vec<u8> = Vec::with_capacity(32);

        match format {
            0x00 => {
                // Physical format information for a single-layer DVD-ROM
                let capacity: u32 = 2_298_496;
                let data_start: u32 = 0x030000;
                let data_end = data_start + capacity;

                let mut info = [0u8; 17];
                info[0] = 0x01; // book type DVD-ROM, part version 1
                info[1] = 0x20; // 120mm, max rate
                info[2] = 0x01; // one layer, PTP, embossed
                info[3] = 0x00; // densities
                info[4..7].copy_from_slice(&data_start.to_be_bytes()[1..4]);
                info[7..10].copy_from_slice(&data_end.to_be_bytes()[1..4]);
                // Layer 0 end stays zero for a single layer, no BCA

                reply.extend_from_slice(&(info.len() as u16).to_be_bytes());
                reply.extend_from_slice(&[0x00, 0x00]);
                reply.extend_from_slice(&info);
            }
            0x01 => {
                // Copyright information: advertise CSS on DVD media only.
                // No descrambling happens here; hosts just refuse to play
                // DVD-Video from drives that deny having CSS.
                let protection = if is_dvd { 0x01 } else { 0x00 };
                reply.extend_from_slice(&4u16.to_be_bytes());
                reply.extend_from_slice(&[0x00, 0x00]);
                reply.extend_from_slice(&[protection, 0x00, 0x00, 0x00]);
            }
            0x04 => {
                // Manufacturing information: 2048 bytes of nothing
                reply.extend_from_slice(&2048u16.to_be_bytes());
                reply.extend_from_slice(&[0x00, 0x00]);
                reply.extend_from_slice(&[0u8; 2048]);
            }
            0xFF => {
                // Structure list
                let formats: &[u8] = if is_dvd {
                    &[
                        0x00, 0x00, 0x00, 0x00, //
                        0x01, 0x00, 0x00, 0x00, //
                        0x04, 0x00, 0x00, 0x00, //
                        0xFF, 0x00, 0x00, 0x00,
                    ]
                } else {
                    &[
                        0x01, 0x00, 0x00, 0x00, //
                        0xFF, 0x00, 0x00, 0x00,
                    ]
                };
                reply.extend_from_slice(&(formats.len() as u16).to_be_bytes());
                reply.extend_from_slice(&[0x00, 0x00]);
                reply.extend_from_slice(formats);
            }
            _ => {
                reply.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
            }
        }

        reply.truncate(allocation_length);
        self.begin_data_in(&reply);
        Ok(())
    }
}
