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

//! The USB CD-ROM gadget
//!
//! [`CdGadget`] owns the Bulk-Only Transport transaction state machine.
//! Exactly one transaction is in flight at any time:
//!
//! ```text
//! Init/ReceiveCbw --CBW--> handler --+--> DataIn -----IN done----> SentCsw
//!                                    +--> DataInRead --batches---> SentCsw
//!                                    +--> DataOut ----OUT done---> SentCsw
//!                                    +--> SendReqSenseReply --IN-> SentCsw
//!                                    +--> SentCsw (no data stage)
//! SentCsw ----IN done----> ReceiveCbw (next CBW armed)
//! ```
//!
//! Completion callbacks ([`CdGadget::on_transfer_complete`],
//! [`CdGadget::receive_out`]) only advance the state machine and arm
//! endpoints; all image I/O happens in [`CdGadget::update`], called from
//! the task loop. Long reads stream through the update pump batch by
//! batch.
//!
//! Media presence is a tri-state: no medium, medium with a pending UNIT
//! ATTENTION, and medium ready. A mount latches the disc-changed event,
//! waits out a short settle window, then surfaces 06/28/00 to the next
//! TEST UNIT READY; the REQUEST SENSE that reports it completes the
//! transition to ready.

pub mod scsi;
mod update;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::catalog::ImageCatalog;
use super::cdrom::{Mcs, TrackList, RAW_SECTOR_SIZE};
use super::cue::CueTrackInfo;
use super::image::{ImageFile, MediaType};
use super::player::PlayerHandle;
use super::usb::{Cbw, Csw, CswStatus, TransferDir, UsbPort, CBW_SIZE};
use scsi::SenseTriple;

/// Sectors per bulk batch at high speed
pub const MAX_BLOCKS_HIGH_SPEED: usize = 16;
/// Sectors per bulk batch at full speed, kept small so classic hosts see
/// steady progress
pub const MAX_BLOCKS_FULL_SPEED: usize = 4;

/// IN buffer size (largest batch of raw sectors plus their subchannel)
pub const IN_BUFFER_SIZE: usize = MAX_BLOCKS_HIGH_SPEED * (RAW_SECTOR_SIZE + 96);
/// IN window at full speed
pub const IN_WINDOW_FULL_SPEED: usize = MAX_BLOCKS_FULL_SPEED * RAW_SECTOR_SIZE;
/// IN window at high speed
pub const IN_WINDOW_HIGH_SPEED: usize = MAX_BLOCKS_HIGH_SPEED * RAW_SECTOR_SIZE;
/// OUT buffer size (largest host payload, MODE SELECT)
pub const OUT_BUFFER_SIZE: usize = 2048;

/// Settle window between a mount request and MEDIUM PRESENT
pub const DISC_SWAP_SETTLE: Duration = Duration::from_millis(500);

/// Transaction state of the gadget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcdState {
    /// Powered but not yet armed
    Init,
    /// OUT endpoint armed for the next 31-byte CBW
    ReceiveCbw,
    /// Malformed CBW received; both endpoints stalled
    InvalidCbw,
    /// A formatted reply is in flight on the IN endpoint
    DataIn,
    /// Host payload expected on the OUT endpoint
    DataOut,
    /// The 13-byte CSW is in flight
    SentCsw,
    /// The 14-byte REQUEST SENSE reply is in flight
    SendReqSenseReply,
    /// Streaming read: the update pump refills the IN buffer per batch
    DataInRead,
    /// Streaming write (not used by this read-only device)
    DataOutWrite,
}

/// Media presence tri-state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    /// No disc present
    NoMedium,
    /// Disc present, host has not yet acknowledged the change
    PresentUnitAttention,
    /// Disc present and ready
    PresentReady,
}

/// How the update pump turns source sectors into wire bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Source and wire layout match; one straight copy
    SimpleCopy,
    /// Copy `transfer_block_size` bytes from `skip_bytes` into each sector
    SkipCopy,
    /// Synthesize a 2352-byte raw sector around stored user data
    SectorRebuild,
}

/// A cache-line aligned DMA buffer with an explicit lease
///
/// Submitting a transfer leases the buffer to the USB controller; writing
/// to it while leased is a bug the debug build catches. The completion
/// callback returns the lease.
#[derive(Debug)]
pub struct DmaBuffer<const N: usize> {
    data: Box<Aligned<N>>,
    leased: bool,
}

#[derive(Debug)]
#[repr(align(64))]
struct Aligned<const N: usize>([u8; N]);

impl<const N: usize> DmaBuffer<N> {
    fn new() -> Self {
        Self {
            data: Box::new(Aligned([0; N])),
            leased: false,
        }
    }

    /// Mutable access for the CPU; must not be leased to DMA
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        debug_assert!(!self.leased, "CPU write while DMA lease is out");
        &mut self.data.0
    }

    /// Lease the first `len` bytes to the controller
    pub fn lease(&mut self, len: usize) -> &[u8] {
        debug_assert!(!self.leased, "double lease");
        self.leased = true;
        &self.data.0[..len]
    }

    /// Return the lease after the transfer completes
    pub fn release(&mut self) {
        self.leased = false;
    }
}

/// The USB CD-ROM gadget core
///
/// Generic over the USB controller seam so tests and the self-probe mode
/// drive it through a loopback port.
pub struct CdGadget<P: UsbPort> {
    port: P,
    state: TcdState,
    full_speed: bool,

    image: Arc<Mutex<Option<ImageFile>>>,
    tracks: TrackList,
    media_state: MediaState,
    media_type: MediaType,
    cd_ready: bool,
    has_subchannel: bool,
    image_size: u64,

    cbw: Cbw,
    sense: SenseTriple,
    csw_status: CswStatus,
    host_request: u32,
    delivered: u32,

    // Per-transaction read geometry
    block_address: u32,
    num_blocks: u32,
    block_size: u32,
    transfer_block_size: u32,
    skip_bytes: u32,
    sub_bytes: u32,
    mcs: Mcs,
    transfer_mode: TransferMode,
    needs_subchannel: bool,

    // Fixed at mount from the first track
    data_block_size: u32,
    data_skip_bytes: u32,

    disc_changed: bool,
    pending_swap: Option<Instant>,
    swap_settle: Duration,

    in_buffer: DmaBuffer<IN_BUFFER_SIZE>,
    out_buffer: DmaBuffer<OUT_BUFFER_SIZE>,
    file_chunk: Vec<u8>,

    player: PlayerHandle,
    catalog: Option<ImageCatalog>,
    pending_mount: Option<PathBuf>,

    serial: String,
    debug: bool,
}

impl<P: UsbPort> CdGadget<P> {
    /// Create a gadget over a USB port and the shared image slot
    ///
    /// # Arguments
    ///
    /// * `port` - The USB controller seam
    /// * `full_speed` - True to size batches for a 12 Mbit/s host
    /// * `image` - Shared slot also read by the audio player
    /// * `player` - Control surface of the CD-DA player task
    pub fn new(
        port: P,
        full_speed: bool,
        image: Arc<Mutex<Option<ImageFile>>>,
        player: PlayerHandle,
    ) -> Self {
        Self {
            port,
            state: TcdState::Init,
            full_speed,
            image,
            tracks: TrackList::default(),
            media_state: MediaState::NoMedium,
            media_type: MediaType::None,
            cd_ready: false,
            has_subchannel: false,
            image_size: 0,
            cbw: Cbw::default(),
            sense: SenseTriple::default(),
            csw_status: CswStatus::Ok,
            host_request: 0,
            delivered: 0,
            block_address: 0,
            num_blocks: 0,
            block_size: 2048,
            transfer_block_size: 2048,
            skip_bytes: 0,
            sub_bytes: 0,
            mcs: Mcs::empty(),
            transfer_mode: TransferMode::SimpleCopy,
            needs_subchannel: false,
            data_block_size: 2048,
            data_skip_bytes: 0,
            disc_changed: false,
            pending_swap: None,
            swap_settle: DISC_SWAP_SETTLE,
            in_buffer: DmaBuffer::new(),
            out_buffer: DmaBuffer::new(),
            file_chunk: vec![0; IN_BUFFER_SIZE],
            player,
            catalog: None,
            pending_mount: None,
            serial: super::usb::descriptors::format_serial(0),
            debug: false,
        }
    }

    /// Arm the OUT endpoint for the first CBW
    pub fn start(&mut self) {
        self.state = TcdState::ReceiveCbw;
        self.port.arm_out(CBW_SIZE);
        log::info!("Gadget: {} ready, waiting for CBW", self.serial);
    }

    /// Enable verbose per-command logging
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Set the hardware serial reported through the string descriptors
    pub fn set_serial(&mut self, hardware_id: u32) {
        self.serial = super::usb::descriptors::format_serial(hardware_id);
    }

    /// Hardware serial in `USBODE-XXXXXXXX` form
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Override the disc-swap settle window
    pub fn set_swap_settle(&mut self, settle: Duration) {
        self.swap_settle = settle;
    }

    /// Attach the image catalog used by the SCSI Toolbox commands
    pub fn set_catalog(&mut self, catalog: ImageCatalog) {
        self.catalog = Some(catalog);
    }

    /// Take a pending Toolbox mount request, if one arrived
    pub fn take_mount_request(&mut self) -> Option<PathBuf> {
        self.pending_mount.take()
    }

    /// Current transaction state
    pub fn state(&self) -> TcdState {
        self.state
    }

    /// Current media presence
    pub fn media_state(&self) -> MediaState {
        self.media_state
    }

    /// Kind of medium currently mounted
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Access the port (the test harness pops IN payloads here)
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// A new image landed in the shared slot: recompute mount state
    ///
    /// The gadget stays NOT READY until the settle window elapses in
    /// [`update`](Self::update), after which the host sees UNIT ATTENTION.
    ///
    /// # Arguments
    ///
    /// * `media_type` - Media kind after any config override
    pub fn on_media_inserted(&mut self, media_type: MediaType) {
        let (cue, size, has_sub) = {
            let mut guard = self.image.lock().unwrap();
            let Some(image) = guard.as_mut() else {
                drop(guard);
                self.on_media_removed();
                return;
            };
            (
                image.cue_sheet().unwrap_or_default().to_string(),
                image.size(),
                image.has_subchannel(),
            )
        };

        self.tracks = TrackList::from_cue_sheet(&cue, size);
        self.image_size = size;
        self.has_subchannel = has_sub;
        self.media_type = media_type;
        self.data_block_size = self.tracks.data_block_size();
        self.data_skip_bytes = self.tracks.data_skip_bytes();

        self.cd_ready = false;
        self.media_state = MediaState::NoMedium;
        self.pending_swap = Some(Instant::now());

        log::info!(
            "Gadget: media inserted, {} track(s), leadout {}, blocksize {}",
            self.tracks.len(),
            self.tracks.leadout_lba(),
            self.data_block_size
        );
    }

    /// The image was ejected; revert to NO MEDIUM
    pub fn on_media_removed(&mut self) {
        self.cd_ready = false;
        self.media_state = MediaState::NoMedium;
        self.media_type = MediaType::None;
        self.tracks = TrackList::default();
        self.image_size = 0;
        self.has_subchannel = false;
        self.pending_swap = None;
        log::info!("Gadget: media removed");
    }

    /// OUT data arrived from the host
    ///
    /// In `ReceiveCbw` this is the next CBW; in `DataOut` it is a command
    /// payload (MODE SELECT). Called from the controller completion path,
    /// so it only advances the state machine.
    pub fn receive_out(&mut self, data: &[u8]) {
        match self.state {
            TcdState::Init | TcdState::ReceiveCbw => match Cbw::parse(data) {
                Some(cbw) => {
                    self.cbw = cbw;
                    self.host_request = cbw.data_transfer_length;
                    self.delivered = 0;
                    self.csw_status = CswStatus::Ok;
                    self.handle_scsi_command();
                }
                None => {
                    log::warn!("Gadget: invalid CBW ({} bytes), stalling", data.len());
                    self.state = TcdState::InvalidCbw;
                    self.csw_status = CswStatus::PhaseError;
                    self.port.stall(TransferDir::In);
                    self.port.stall(TransferDir::Out);
                }
            },
            TcdState::DataOut => {
                let len = data.len().min(OUT_BUFFER_SIZE);
                self.out_buffer.as_mut_slice()[..len].copy_from_slice(&data[..len]);
                self.process_out(len);
            }
            state => {
                log::warn!("Gadget: unexpected OUT data in state {:?}", state);
            }
        }
    }

    /// A bulk transfer completed
    ///
    /// This is the IRQ-path analogue: no image I/O, no payload logging;
    /// it releases the DMA lease, sends the CSW where due and re-arms the
    /// OUT endpoint after the CSW goes out.
    pub fn on_transfer_complete(&mut self, dir: TransferDir, len: usize) {
        log::trace!("Gadget: transfer complete {:?} {}", dir, len);

        match (self.state, dir) {
            (TcdState::DataIn, TransferDir::In) => {
                self.in_buffer.release();
                self.send_csw();
            }
            (TcdState::DataInRead, TransferDir::In) => {
                // More batches pending; update() re-arms from task level
                self.in_buffer.release();
                if self.num_blocks == 0 {
                    self.send_csw();
                }
            }
            (TcdState::SendReqSenseReply, TransferDir::In) => {
                self.in_buffer.release();
                self.send_csw();
            }
            (TcdState::SentCsw, TransferDir::In) => {
                self.state = TcdState::ReceiveCbw;
                self.port.arm_out(CBW_SIZE);
            }
            _ => {}
        }
    }

    /// MODE SELECT payload arrived; accept and complete the transaction
    fn process_out(&mut self, len: usize) {
        if self.debug {
            log::debug!("Gadget: accepted {} OUT bytes (ignored)", len);
        }
        self.send_csw();
    }

    /// Send the CSW for the current transaction
    pub(super) fn send_csw(&mut self) {
        let csw = Csw {
            tag: self.cbw.tag,
            data_residue: self.host_request.saturating_sub(self.delivered),
            status: self.csw_status,
        };
        self.port.submit_in(&csw.to_bytes());
        self.state = TcdState::SentCsw;
    }

    /// Complete with GOOD status and no data stage
    pub(super) fn send_good_status(&mut self) {
        self.csw_status = CswStatus::Ok;
        self.send_csw();
    }

    /// Latch sense data and complete with CHECK CONDITION
    pub(super) fn send_check_condition(&mut self, sense: SenseTriple) {
        log::debug!(
            "Gadget: CHECK CONDITION {:02x}/{:02x}/{:02x} for opcode {:02x}",
            sense.key,
            sense.asc,
            sense.ascq,
            self.cbw.opcode()
        );
        self.sense = sense;
        self.csw_status = CswStatus::Fail;
        self.send_csw();
    }

    /// Copy a formatted reply into the IN buffer and start the data stage
    pub(super) fn begin_data_in(&mut self, reply: &[u8]) {
        let len = reply.len().min(IN_BUFFER_SIZE);
        self.in_buffer.as_mut_slice()[..len].copy_from_slice(&reply[..len]);
        self.submit_in_buffer(len, TcdState::DataIn);
    }

    /// Lease `len` bytes of the IN buffer to the controller
    pub(super) fn submit_in_buffer(&mut self, len: usize, next: TcdState) {
        self.delivered = self.delivered.saturating_add(len as u32);
        let data = self.in_buffer.lease(len);
        self.port.submit_in(data);
        self.state = next;
    }

    pub(super) fn set_sense(&mut self, sense: SenseTriple) {
        self.sense = sense;
    }

    pub(super) fn clear_sense(&mut self) {
        self.sense = SenseTriple::default();
    }

    /// Track containing an LBA, from the mount-time track list
    pub(super) fn track_for_lba(&self, lba: u32) -> Option<&CueTrackInfo> {
        self.tracks.track_for_lba(lba)
    }

    /// Per-transaction batch limits for the current bus speed
    pub(super) fn batch_limits(&self) -> (usize, usize) {
        if self.full_speed {
            (MAX_BLOCKS_FULL_SPEED, IN_WINDOW_FULL_SPEED)
        } else {
            (MAX_BLOCKS_HIGH_SPEED, IN_WINDOW_HIGH_SPEED)
        }
    }

    /// Derive how the pump must copy sectors from the current geometry
    pub(super) fn derive_transfer_mode(&mut self) {
        self.transfer_mode = if self.transfer_block_size == self.block_size && self.skip_bytes == 0
        {
            TransferMode::SimpleCopy
        } else if self.transfer_block_size > self.block_size {
            TransferMode::SectorRebuild
        } else {
            TransferMode::SkipCopy
        };
    }
}
