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

//! CD-DA audio player
//!
//! A cooperative task that reads raw PCM sectors from the mounted image,
//! applies volume scaling and streams them to a [`SoundSink`]. CD audio is
//! 44.1 kHz 16-bit stereo stored in 2352-byte sectors of 588 frames each.
//!
//! The player is driven by [`CdPlayer::step`] from the main task loop and
//! controlled through a [`PlayerHandle`]: SCSI handlers send commands over
//! a channel and read back a published [`PlayerStatus`] snapshot without
//! ever touching the player directly. Reading a `StoppedOk`/`StoppedError`
//! status is destructive: the host sees it once through READ SUB-CHANNEL
//! and the state collapses to `None`.


use std::fs::File;
use std::io::Read;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use super::audio::{SoundSink, BYTES_PER_FRAME};
use super::image::{ImageFile, SEEK_FAIL};

/// Bytes in one CD-DA sector
pub const SECTOR_SIZE: usize = 2352;
/// Stereo frames in one CD-DA sector
pub const FRAMES_PER_SECTOR: usize = SECTOR_SIZE / BYTES_PER_FRAME;
/// Sectors buffered per refill pass
pub const BATCH_SIZE: usize = 16;
/// Staging buffer size in bytes
pub const BUFFER_SIZE_BYTES: usize = SECTOR_SIZE * BATCH_SIZE;

/// Q12 fixed point: 4096 == 1.0
const VOLUME_SCALE_BITS: u32 = 12;
/// Number of quantized volume steps
const VOLUME_STEPS: usize = 16;

/// Volume table, Q12 fixed point, indexed by the top 4 bits of the volume
const VOLUME_TABLE: [u16; VOLUME_STEPS] = [
    0, 273, 546, 819, 1092, 1365, 1638, 1911, 2184, 2457, 2730, 3003, 3276, 3549, 3822, 4096,
];

/// Playback state of the audio player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    /// Nothing to report
    #[default]
    None,
    /// Streaming audio to the sink
    Playing,
    /// Seek requested, playback will not start afterwards
    Seeking,
    /// Seek requested, playback starts when it lands
    SeekingPlaying,
    /// Finished the requested range (one-shot, collapses to `None`)
    StoppedOk,
    /// Stopped on a read or sink error (one-shot, collapses to `None`)
    StoppedError,
    /// Paused, position retained
    Paused,
}

impl PlayState {
    /// MMC audio-status byte reported through READ SUB-CHANNEL
    pub fn audio_status(self) -> u8 {
        match self {
            PlayState::Playing => 0x11,
            PlayState::Paused => 0x12,
            PlayState::StoppedOk => 0x13,
            PlayState::StoppedError => 0x14,
            _ => 0x15,
        }
    }
}

/// Commands accepted by the player task
#[derive(Debug, Clone, Copy)]
pub enum PlayerCommand {
    /// Start playback at an LBA for a number of sectors
    Play {
        /// Starting LBA
        lba: u32,
        /// Sectors to play
        num_blocks: u32,
    },
    /// Pause playback, retaining position
    Pause,
    /// Resume paused playback
    Resume,
    /// Seek without playing
    Seek {
        /// Target LBA
        lba: u32,
    },
    /// Stop playback entirely
    Stop,
    /// Set the output volume (0..=255; 0xFF bypasses scaling)
    SetVolume(u8),
}

/// Published player position and state
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerStatus {
    /// Playback state at the time of the snapshot
    pub state: PlayState,
    /// Current absolute LBA
    pub lba: u32,
}

#[derive(Debug, Default)]
struct Shared {
    state: PlayState,
    lba: u32,
}

/// Cheap, cloneable control surface handed to the SCSI layer
#[derive(Clone)]
pub struct PlayerHandle {
    commands: Sender<PlayerCommand>,
    shared: Arc<Mutex<Shared>>,
}

impl PlayerHandle {
    /// Start playback from `lba` for `num_blocks` sectors
    ///
    /// Two LBA values are magic, driven by the MMC PLAY AUDIO command:
    /// `0x0000_0000` is a no-op and `0xFFFF_FFFF` resumes paused playback.
    pub fn play(&self, lba: u32, num_blocks: u32) {
        let _ = self.commands.send(PlayerCommand::Play { lba, num_blocks });
    }

    /// Pause playback
    pub fn pause(&self) {
        let _ = self.commands.send(PlayerCommand::Pause);
    }

    /// Resume paused playback
    pub fn resume(&self) {
        let _ = self.commands.send(PlayerCommand::Resume);
    }

    /// Seek to an LBA without starting playback
    pub fn seek(&self, lba: u32) {
        let _ = self.commands.send(PlayerCommand::Seek { lba });
    }

    /// Stop playback
    pub fn stop(&self) {
        let _ = self.commands.send(PlayerCommand::Stop);
    }

    /// Set the output volume (0..=255)
    pub fn set_volume(&self, volume: u8) {
        let _ = self.commands.send(PlayerCommand::SetVolume(volume));
    }

    /// Read the latest published status
    ///
    /// `StoppedOk` and `StoppedError` are reported exactly once; after
    /// this call observes either, the state collapses to `None`.
    pub fn status(&self) -> PlayerStatus {
        let mut shared = self.shared.lock().unwrap();
        let status = PlayerStatus {
            state: shared.state,
            lba: shared.lba,
        };
        if matches!(shared.state, PlayState::StoppedOk | PlayState::StoppedError) {
            shared.state = PlayState::None;
        }
        status
    }
}

/// The CD-DA player task
pub struct CdPlayer {
    commands: Receiver<PlayerCommand>,
    shared: Arc<Mutex<Shared>>,
    image: Arc<Mutex<Option<ImageFile>>>,
    sink: Box<dyn SoundSink>,
    state: PlayState,
    address: u32,
    end_address: u32,
    volume: u8,
    chunk: Vec<u8>,
}

impl CdPlayer {
    /// Create a player over the shared image slot and a sound sink
    ///
    /// Returns the player together with the handle the SCSI layer uses.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::{Arc, Mutex};
    /// use cdgadget::core::audio::NullSink;
    /// use cdgadget::core::player::CdPlayer;
    ///
    /// let image = Arc::new(Mutex::new(None));
    /// let (mut player, handle) = CdPlayer::new(image, Box::new(NullSink::new()), 0xFF);
    /// handle.pause();
    /// player.step();
    /// ```
    pub fn new(
        image: Arc<Mutex<Option<ImageFile>>>,
        sink: Box<dyn SoundSink>,
        default_volume: u8,
    ) -> (Self, PlayerHandle) {
        let (tx, rx) = channel();
        let shared = Arc::new(Mutex::new(Shared::default()));

        let handle = PlayerHandle {
            commands: tx,
            shared: shared.clone(),
        };

        let player = Self {
            commands: rx,
            shared,
            image,
            sink,
            state: PlayState::None,
            address: 0,
            end_address: 0,
            volume: default_volume,
            chunk: vec![0; BUFFER_SIZE_BYTES],
        };

        (player, handle)
    }

    /// Current playback state
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Reset after a disc change: position 0, nothing to report
    pub fn reset(&mut self) {
        log::info!("CD Player: device changed, resetting");
        self.state = PlayState::None;
        self.address = 0;
        self.publish();
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                PlayerCommand::Play { lba, num_blocks } => self.play(lba, num_blocks),
                PlayerCommand::Pause => {
                    log::info!("CD Player: pausing");
                    self.state = PlayState::Paused;
                }
                PlayerCommand::Resume => {
                    log::info!("CD Player: resuming");
                    self.state = PlayState::Playing;
                }
                PlayerCommand::Seek { lba } => {
                    log::info!("CD Player: seeking to {}", lba);
                    self.address = lba;
                    self.state = PlayState::Seeking;
                }
                PlayerCommand::Stop => {
                    log::info!("CD Player: stopping");
                    self.state = PlayState::None;
                }
                PlayerCommand::SetVolume(volume) => self.volume = volume,
            }
        }
    }

    fn play(&mut self, lba: u32, num_blocks: u32) {
        log::info!("CD Player: playing from {} for {} blocks", lba, num_blocks);

        if lba == 0x0000_0000 {
            // Nothing; callers avoid handing us LBA zero
        } else if lba == 0xFFFF_FFFF {
            self.state = PlayState::Playing;
        } else {
            self.address = lba;
            self.end_address = lba.saturating_add(num_blocks);
            self.state = PlayState::SeekingPlaying;
        }
    }

    /// Run one cooperative slice of the play loop
    ///
    /// Drains pending commands, performs at most one seek or one sink
    /// refill, then publishes the status snapshot. The caller yields
    /// between steps.
    pub fn step(&mut self) {
        self.drain_commands();

        match self.state {
            PlayState::Seeking | PlayState::SeekingPlaying => self.do_seek(),
            PlayState::Playing => self.do_fill(),
            _ => {}
        }

        self.publish();
    }

    fn do_seek(&mut self) {
        let byte_offset = u64::from(self.address) * SECTOR_SIZE as u64;
        log::debug!("CD Player: seeking to byte {}", byte_offset);

        let mut guard = self.image.lock().unwrap();
        let Some(image) = guard.as_mut() else {
            log::error!("CD Player: no device to seek");
            self.state = PlayState::StoppedError;
            return;
        };

        if image.seek(byte_offset) != SEEK_FAIL {
            self.state = if self.state == PlayState::SeekingPlaying {
                log::debug!("CD Player: switching to PLAYING");
                PlayState::Playing
            } else {
                PlayState::StoppedOk
            };
        } else {
            log::error!("CD Player: error seeking to byte {}", byte_offset);
            self.state = PlayState::StoppedError;
        }
    }

    fn do_fill(&mut self) {
        // Fill whatever space the sink currently has
        let free_frames = self
            .sink
            .queue_size_frames()
            .saturating_sub(self.sink.queued_frames());
        let bytes_to_read = (free_frames * BYTES_PER_FRAME).min(self.chunk.len());
        if bytes_to_read == 0 {
            return;
        }

        let read_count = {
            let mut guard = self.image.lock().unwrap();
            let Some(image) = guard.as_mut() else {
                self.state = PlayState::StoppedError;
                return;
            };
            match image.read(&mut self.chunk[..bytes_to_read]) {
                Ok(n) => n,
                Err(e) => {
                    log::error!("CD Player: read error: {}", e);
                    self.state = PlayState::StoppedError;
                    return;
                }
            }
        };

        if read_count < bytes_to_read {
            log::error!(
                "CD Player: partial read ({} of {} bytes)",
                read_count,
                bytes_to_read
            );
            self.state = PlayState::StoppedError;
            return;
        }

        // DACs have no volume control, so scale the samples instead
        if self.volume != 0xFF {
            scale_volume(&mut self.chunk[..read_count], self.volume);
        }

        let written = self.sink.write(&self.chunk[..read_count]);
        if written != read_count {
            log::error!("CD Player: truncated sink write, audio dropped");
            self.state = PlayState::StoppedError;
            return;
        }

        self.address += (read_count / SECTOR_SIZE) as u32;

        if self.address >= self.end_address {
            log::info!("CD Player: finished playing");
            self.state = PlayState::StoppedOk;
        }
    }

    fn publish(&self) {
        let mut shared = self.shared.lock().unwrap();
        shared.state = self.state;
        shared.lba = self.address;
    }

    /// Play a known PCM file through the sink, for hardware bring-up
    ///
    /// Streams `path` (raw 44.1 kHz 16-bit stereo) until it ends. Returns
    /// false if the sink is inactive or the file cannot be read.
    pub fn sound_test(&mut self, path: &str) -> bool {
        if !self.sink.is_active() {
            log::error!("Sound test: sound is not active");
            return false;
        }

        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                log::error!("Sound test: can't open {}: {}", path, e);
                return false;
            }
        };

        loop {
            let free_frames = self
                .sink
                .queue_size_frames()
                .saturating_sub(self.sink.queued_frames());
            let bytes_to_read = (free_frames * BYTES_PER_FRAME).min(self.chunk.len());

            if bytes_to_read > 0 {
                let read = match file.read(&mut self.chunk[..bytes_to_read]) {
                    Ok(n) => n,
                    Err(e) => {
                        log::error!("Sound test: failed to read audio data: {}", e);
                        return false;
                    }
                };

                if read == 0 {
                    log::info!("Sound test: finished successfully");
                    return true;
                }

                if self.sink.write(&self.chunk[..read]) != read {
                    log::error!("Sound test: data dropped");
                    return false;
                }
            }

            std::thread::yield_now();
        }
    }
}

/// Scale 16-bit little-endian samples by the quantized volume
///
/// The volume byte is quantized to 16 steps through a Q12 fixed-point
/// table; each signed sample is multiplied and shifted back.
pub fn scale_volume(buffer: &mut [u8], volume: u8) {
    let index = (usize::from(volume) * (VOLUME_STEPS - 1)) >> 8;
    let scale = i32::from(VOLUME_TABLE[index]);

    for sample in buffer.chunks_exact_mut(2) {
        let value = i16::from_le_bytes([sample[0], sample[1]]);
        let scaled = (i32::from(value) * scale) >> VOLUME_SCALE_BITS;
        let bytes = (scaled as i16).to_le_bytes();
        sample[0] = bytes[0];
        sample[1] = bytes[1];
    }
}
