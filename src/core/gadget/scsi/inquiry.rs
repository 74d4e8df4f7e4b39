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

//! Identification and mode commands
//!
//! INQUIRY (standard and VPD pages 0x00/0x80/0x83), REQUEST SENSE, MODE
//! SENSE(6)/(10) with the shared mode-page formatter, MODE SELECT(10) and
//! GET CONFIGURATION. Hosts fingerprint drives with these before a single
//! sector is read; the byte values here are load-bearing.

use super::{sense, ScsiResult};
use crate::core::gadget::{CdGadget, MediaState, TcdState};
use crate::core::image::MediaType;
use crate::core::usb::UsbPort;

/// Standard INQUIRY reply, 96 bytes
const INQUIRY_SIZE: usize = 96;

/// MMC profile numbers
const PROFILE_CDROM: u16 = 0x0008;
const PROFILE_DVD_ROM: u16 = 0x0010;

impl<P: UsbPort> CdGadget<P> {
    /// INQUIRY (0x12)
    pub(super) fn inquiry(&mut self) -> ScsiResult {
        let allocation_length = u16::from_be_bytes([self.cbw.cb[3], self.cbw.cb[4]]) as usize;

        if self.cbw.cb[1] & 0x01 == 0 {
            // Standard inquiry
            let mut reply = [0u8; INQUIRY_SIZE];
            reply[0] = 0x05; // CD/DVD peripheral
            reply[1] = 0x80; // removable medium
            reply[2] = 0x05; // SPC-3
            reply[3] = 0x02; // response data format
            reply[4] = 0x1F; // additional length
            reply[8..16].copy_from_slice(b"USBODE  ");
            reply[16..32].copy_from_slice(b"CDROM EMULATOR  ");
            reply[32..36].copy_from_slice(b"0001");

            let len = INQUIRY_SIZE.min(allocation_length);
            self.begin_data_in(&reply[..len]);
            return Ok(());
        }

        // Vital product data pages
        let page = self.cbw.cb[2];
        let reply: Vec<u8> = match page {
            0x00 => vec![0x05, 0x00, 0x00, 0x03, 0x00, 0x80, 0x83],
            0x80 => {
                let mut reply = vec![0x05, 0x80, 0x00, 0x0B];
                reply.extend_from_slice(b"USBODE00001");
                reply
            }
            0x83 => {
                // One T10 vendor-ID designator, ASCII code set
                let mut reply = vec![0x05, 0x83, 0x00, 0x0B, 0x01, 0x00, 0x08];
                reply.extend_from_slice(b"USBODE  ");
                reply
            }
            _ => {
                log::info!("SCSI: unsupported VPD page 0x{:02x}", page);
                return Err(sense::INVALID_FIELD_IN_CDB);
            }
        };

        let len = reply.len().min(allocation_length);
        self.begin_data_in(&reply[..len]);
        Ok(())
    }

    /// REQUEST SENSE (0x03)
    ///
    /// Reports and then clears the latched sense, except in NO MEDIUM
    /// where 02/3A/00 persists until a disc shows up. This is also the
    /// command that completes the unit-attention handshake.
    pub(super) fn request_sense(&mut self) -> ScsiResult {
        let allocation_length = self.cbw.cb[4] as usize;

        log::debug!(
            "SCSI: REQUEST SENSE reporting {:02x}/{:02x}/{:02x}",
            self.sense.key,
            self.sense.asc,
            self.sense.ascq
        );

        let mut reply = [0u8; 14];
        reply[0] = 0x70; // current error, fixed format
        reply[2] = self.sense.key;
        reply[7] = 0x0A; // additional sense length
        reply[12] = self.sense.asc;
        reply[13] = self.sense.ascq;

        let len = reply.len().min(allocation_length);
        self.in_buffer.as_mut_slice()[..len].copy_from_slice(&reply[..len]);
        self.submit_in_buffer(len, TcdState::SendReqSenseReply);

        match self.media_state {
            MediaState::PresentUnitAttention => {
                self.clear_sense();
                self.media_state = MediaState::PresentReady;
                log::info!("SCSI: unit attention acknowledged, medium ready");
            }
            MediaState::NoMedium => {
                // Keep 02/3A/00 latched for the next poll
            }
            MediaState::PresentReady => {
                self.clear_sense();
            }
        }
        Ok(())
    }

    /// MODE SELECT (10) (0x55): read the payload, change nothing
    pub(super) fn mode_select10(&mut self) -> ScsiResult {
        let transfer_length = u16::from_be_bytes([self.cbw.cb[7], self.cbw.cb[8]]) as usize;
        if self.debug {
            log::debug!("SCSI: MODE SELECT(10), {} bytes", transfer_length);
        }

        // The payload arrives through receive_out and is acknowledged there
        self.state = TcdState::DataOut;
        self.port
            .arm_out(transfer_length.min(crate::core::gadget::OUT_BUFFER_SIZE));
        Ok(())
    }

    /// MODE SENSE (6) (0x1A)
    pub(super) fn mode_sense6(&mut self) -> ScsiResult {
        self.mode_sense(6)
    }

    /// MODE SENSE (10) (0x5A)
    pub(super) fn mode_sense10(&mut self) -> ScsiResult {
        self.mode_sense(10)
    }

    fn mode_sense(&mut self, cdb_size: usize) -> ScsiResult {
        let page = self.cbw.cb[2] & 0x3F;
        let page_control = (self.cbw.cb[2] >> 6) & 0x03;
        let allocation_length = if cdb_size == 6 {
            self.cbw.cb[4] as usize
        } else {
            u16::from_be_bytes([self.cbw.cb[7], self.cbw.cb[8]]) as usize
        };

        // Saved values are not stored on this device
        if page_control == 0x03 {
            return Err(sense::SAVING_NOT_SUPPORTED);
        }

        let header_len = if cdb_size == 6 { 4 } else { 8 };
        let mut reply = vec![0u8; header_len];

        if page == 0x3F {
            // All pages, in the order a real drive reports them
            let pages: &[u8] = if cdb_size == 6 {
                &[0x01, 0x05, 0x0D, 0x08, 0x1A, 0x2A, 0x2D, 0x0E, 0x1C, 0x30, 0x31, 0x4E]
            } else {
                &[0x01, 0x05, 0x08, 0x0D, 0x1A, 0x1C, 0x2A, 0x2D, 0x0E, 0x30, 0x31, 0x4E]
            };
            for &p in pages {
                self.fill_mode_page(p, &mut reply);
            }
        } else {
            self.fill_mode_page(page, &mut reply);
            if reply.len() == header_len {
                return Err(sense::INVALID_FIELD_IN_CDB);
            }
        }

        // Fill in the header now that the length is known
        let medium_type = self.tracks.medium_type();
        if cdb_size == 6 {
            reply[0] = (reply.len() - 1) as u8;
            reply[1] = medium_type;
        } else {
            let mode_len = (reply.len() - 2) as u16;
            reply[0..2].copy_from_slice(&mode_len.to_be_bytes());
            reply[2] = medium_type;
        }

        reply.truncate(allocation_length);
        self.begin_data_in(&reply);
        Ok(())
    }

    /// Append one mode page to the reply; unknown pages append nothing
    fn fill_mode_page(&mut self, page: u8, reply: &mut Vec<u8>) {
        match page {
            0x01 => {
                // Read/write error recovery; no retries on an image
                reply.extend_from_slice(&[0u8; 12]);
            }
            0x05 => {
                // Write parameters, all zero: nothing here can burn
                reply.push(0x05);
                reply.push(0x32);
                reply.extend_from_slice(&[0u8; 50]);
            }
            0x08 => {
                // Caching
                reply.push(0x08);
                reply.push(0x12);
                reply.extend_from_slice(&[0u8; 18]);
            }
            0x0D => {
                // CD device parameters
                reply.extend_from_slice(&[0x0D, 0x06, 0x00, 0x00]);
                reply.extend_from_slice(&60u16.to_be_bytes());
                reply.extend_from_slice(&75u16.to_be_bytes());
            }
            0x0E => {
                // CD audio control: both ports wired, full volume.
                // Reporting the real player volume confuses hosts that
                // manage volume themselves, so this page always says 0xFF.
                let volume = 0xFF;
                reply.extend_from_slice(&[0x0E, 16, 0x05, 0, 0, 0, 0, 0]);
                reply.extend_from_slice(&[0x01, volume, 0x02, volume, 0x00, 0x00, 0x00, 0x00]);
            }
            0x1A => {
                // Power condition
                reply.push(0x1A);
                reply.push(0x0A);
                reply.extend_from_slice(&[0u8; 10]);
            }
            0x1C => {
                // Informational exceptions control
                reply.push(0x1C);
                reply.push(0x0A);
                reply.extend_from_slice(&[0u8; 10]);
            }
            0x2A => {
                // MM capabilities and mechanical status
                reply.push(0x2A);
                reply.push(0x12);
                // Read: no writables; play audio, CD-DA accurate; tray
                // loader with eject and lock
                reply.extend_from_slice(&[0x00, 0x00, 0x01, 0x03, 0x28, 0x03]);
                reply.extend_from_slice(&1378u16.to_be_bytes()); // max speed
                reply.extend_from_slice(&0x0100u16.to_be_bytes()); // volume levels
                reply.extend_from_slice(&0x0040u16.to_be_bytes()); // buffer KB
                reply.extend_from_slice(&1378u16.to_be_bytes()); // current speed
                reply.extend_from_slice(&[0x00, 0x00]);
                reply.extend_from_slice(&1378u16.to_be_bytes()); // max read speed
            }
            0x2D => {
                // CD timeout and protect
                reply.push(0x2D);
                reply.push(0x0A);
                reply.extend_from_slice(&[0u8; 10]);
            }
            0x30 | 0x31 => {
                // Apple vendor signature pages; classic Mac OS checks the
                // string before it will mount anything
                reply.push(page);
                reply.push(0x14);
                reply.extend_from_slice(b"APPLE COMPUTER, INC.");
            }
            0x4E => {
                // Mac OS 9 asks for 0x4E; a real Sony drive answers with
                // page 0x0E at maximum volume
                reply.extend_from_slice(&[0x0E, 0x0E, 0x02, 0, 0, 0, 0, 0]);
                reply.extend_from_slice(&[0x0F, 0xFF, 0x0F, 0xFF, 0, 0, 0, 0]);
            }
            _ => {
                log::debug!("SCSI: mode page 0x{:02x} not supported", page);
            }
        }
    }

    /// GET CONFIGURATION (0x46)
    ///
    /// The feature machine hosts use to discover what the drive can do.
    /// The profile list and the CD/DVD read features flip with the
    /// mounted media type.
    pub(super) fn get_configuration(&mut self) -> ScsiResult {
        let rt = self.cbw.cb[1] & 0x03;
        let feature = u16::from_be_bytes([self.cbw.cb[2], self.cbw.cb[3]]);
        let allocation_length = u16::from_be_bytes([self.cbw.cb[7], self.cbw.cb[8]]) as usize;

        let is_dvd = self.media_type == MediaType::Dvd;
        let mut body: Vec<u8> = Vec::with_capacity(96);

        match rt {
            0x00 | 0x01 => {
                self.push_profile_list(&mut body, is_dvd);
                push_feature_core(&mut body);
                push_feature_morphing(&mut body);
                push_feature_removable(&mut body);
                push_feature_random_readable(&mut body);
                push_feature_multiread(&mut body);
                if is_dvd {
                    push_feature_dvd_read(&mut body);
                } else {
                    push_feature_cd_read(&mut body);
                }
                push_feature_power_management(&mut body);
                if is_dvd {
                    push_feature_dvd_css(&mut body);
                }
                push_feature_audio_play(&mut body);
                push_feature_rt_streaming(&mut body);
            }
            0x02 => match feature {
                0x0000 => self.push_profile_list(&mut body, is_dvd),
                0x0001 => push_feature_core(&mut body),
                0x0002 => push_feature_morphing(&mut body),
                0x0003 => push_feature_removable(&mut body),
                0x0010 => push_feature_random_readable(&mut body),
                0x001D => push_feature_multiread(&mut body),
                0x001E => {
                    if !is_dvd {
                        push_feature_cd_read(&mut body);
                    }
                }
                0x001F => {
                    if is_dvd {
                        push_feature_dvd_read(&mut body);
                    }
                }
                0x0100 => push_feature_power_management(&mut body),
                0x0103 => push_feature_audio_play(&mut body),
                0x0106 => {
                    if is_dvd {
                        push_feature_dvd_css(&mut body);
                    }
                }
                0x0107 => push_feature_rt_streaming(&mut body),
                _ => {
                    log::debug!("SCSI: GET CONFIGURATION unhandled feature 0x{:04x}", feature);
                }
            },
            _ => return Err(sense::INVALID_FIELD_IN_CDB),
        }

        // Feature header: data length covers everything after the field
        let current_profile = if is_dvd { PROFILE_DVD_ROM } else { PROFILE_CDROM };
        let mut reply = Vec::with_capacity(8 + body.len());
        reply.extend_from_slice(&((body.len() + 4) as u32).to_be_bytes());
        reply.extend_from_slice(&[0x00, 0x00]);
        reply.extend_from_slice(&current_profile.to_be_bytes());
        reply.extend_from_slice(&body);

        reply.truncate(allocation_length);
        self.begin_data_in(&reply);
        Ok(())
    }

    /// Feature 0000h: profile list, current profile flagged
    fn push_profile_list(&self, body: &mut Vec<u8>, is_dvd: bool) {
        if is_dvd {
            // Combo drive, descending order: DVD-ROM then CD-ROM
            body.extend_from_slice(&[0x00, 0x00, 0x03, 0x08]);
            body.extend_from_slice(&PROFILE_DVD_ROM.to_be_bytes());
            body.extend_from_slice(&[0x01, 0x00]);
            body.extend_from_slice(&PROFILE_CDROM.to_be_bytes());
            body.extend_from_slice(&[0x00, 0x00]);
        } else {
            body.extend_from_slice(&[0x00, 0x00, 0x03, 0x04]);
            body.extend_from_slice(&PROFILE_CDROM.to_be_bytes());
            body.extend_from_slice(&[0x01, 0x00]);
        }
    }
}

/// Feature 0001h: core
fn push_feature_core(body: &mut Vec<u8>) {
    body.extend_from_slice(&[0x00, 0x01, 0x0B, 0x08]);
    body.extend_from_slice(&[0x00, 0x00, 0x00, 0x08]); // physical interface
    body.extend_from_slice(&[0x03, 0x00, 0x00, 0x00]); // INQ2 + DBE
}

/// Feature 0002h: morphing (operational change reporting)
fn push_feature_morphing(body: &mut Vec<u8>) {
    body.extend_from_slice(&[0x00, 0x02, 0x0B, 0x04, 0x02, 0x00, 0x00, 0x00]);
}

/// Feature 0003h: removable medium
fn push_feature_removable(body: &mut Vec<u8>) {
    body.extend_from_slice(&[0x00, 0x03, 0x0B, 0x04, 0x29, 0x00, 0x00, 0x00]);
}

/// Feature 0010h: random readable
fn push_feature_random_readable(body: &mut Vec<u8>) {
    body.extend_from_slice(&[0x00, 0x10, 0x03, 0x08]);
    body.extend_from_slice(&2048u32.to_be_bytes());
    body.extend_from_slice(&[0x00, 0x01, 0x00, 0x00]); // blocking 1, no PP
}

/// Feature 001Dh: multi-read
fn push_feature_multiread(body: &mut Vec<u8>) {
    body.extend_from_slice(&[0x00, 0x1D, 0x0B, 0x00]);
}

/// Feature 001Eh: CD read
fn push_feature_cd_read(body: &mut Vec<u8>) {
    body.extend_from_slice(&[0x00, 0x1E, 0x0B, 0x04, 0x00, 0x00, 0x00, 0x00]);
}

/// Feature 001Fh: DVD read
fn push_feature_dvd_read(body: &mut Vec<u8>) {
    body.extend_from_slice(&[0x00, 0x1F, 0x0B, 0x04, 0x01, 0x00, 0x00, 0x00]);
}

/// Feature 0100h: power management
fn push_feature_power_management(body: &mut Vec<u8>) {
    body.extend_from_slice(&[0x01, 0x00, 0x0B, 0x00]);
}

/// Feature 0103h: analogue audio play
fn push_feature_audio_play(body: &mut Vec<u8>) {
    body.extend_from_slice(&[0x01, 0x03, 0x0B, 0x04, 0x00, 0x00]);
    body.extend_from_slice(&0x0100u16.to_be_bytes()); // volume levels
}

/// Feature 0106h: DVD CSS (capability bit only; no key exchange happens)
fn push_feature_dvd_css(body: &mut Vec<u8>) {
    body.extend_from_slice(&[0x01, 0x06, 0x03, 0x04, 0x00, 0x00, 0x00, 0x01]);
}

/// Feature 0107h: real-time streaming
fn push_feature_rt_streaming(body: &mut Vec<u8>) {
    body.extend_from_slice(&[0x01, 0x07, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00]);
}
