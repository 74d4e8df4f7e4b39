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

//! System integration
//!
//! Ties the configuration snapshot, image catalog, CD-DA player and the
//! gadget together and owns the mount surface. The outside world (web
//! interface, display manager, Toolbox commands) changes discs through
//! [`System::set_image`]; the cooperative loop drives everything through
//! [`System::run_step`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::audio::{NullSink, SoundSink};
use super::catalog::ImageCatalog;
use super::config::{Config, UsbSpeed};
use super::error::Result;
use super::gadget::CdGadget;
use super::image::ImageFile;
use super::player::{CdPlayer, PlayerHandle, PlayerStatus};
use super::usb::LoopbackPort;

/// The assembled gadget system
///
/// # Example
///
/// ```no_run
/// use cdgadget::core::config::Config;
/// use cdgadget::core::system::System;
///
/// let mut system = System::new(Config::default()).unwrap();
/// system.set_image("images/game.cue").unwrap();
/// loop {
///     system.run_step();
/// }
/// ```
pub struct System {
    config: Config,
    image: Arc<Mutex<Option<ImageFile>>>,
    gadget: CdGadget<LoopbackPort>,
    player: CdPlayer,
    player_handle: PlayerHandle,
    current_path: Option<PathBuf>,
}

impl System {
    /// Build the system from a configuration snapshot
    ///
    /// The sound sink is chosen by the `audio` feature: the cpal backend
    /// when available, a silent sink otherwise. The USB port here is the
    /// loopback used by the self-probe mode; hardware integrations embed
    /// [`CdGadget`] against their own controller instead.
    pub fn new(config: Config) -> Result<Self> {
        let image: Arc<Mutex<Option<ImageFile>>> = Arc::new(Mutex::new(None));

        let sink = make_sink();
        let (player, player_handle) = CdPlayer::new(image.clone(), sink, config.default_volume);

        let full_speed = config.usb_speed == UsbSpeed::Full;
        let mut gadget = CdGadget::new(
            LoopbackPort::new(),
            full_speed,
            image.clone(),
            player_handle.clone(),
        );
        gadget.set_debug(config.debug_logging);

        let catalog = ImageCatalog::scan(&config.images_dir)?;
        gadget.set_catalog(catalog);
        gadget.start();

        Ok(Self {
            config,
            image,
            gadget,
            player,
            player_handle,
            current_path: None,
        })
    }

    /// Mount a disc image
    ///
    /// Idempotent when the path matches the currently mounted image. On
    /// any successful change the media state walks the UNIT ATTENTION
    /// path: the change is latched for GET EVENT STATUS, the settle
    /// window runs, and the host re-probes. A failed mount leaves the
    /// drive with no medium.
    pub fn set_image<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();

        if self.current_path.as_deref() == Some(path) {
            log::info!("System: {} already mounted", path.display());
            return Ok(());
        }

        log::info!("System: mounting {}", path.display());

        let opened = match ImageFile::open(path) {
            Ok(image) => image,
            Err(e) => {
                // The old disc is gone either way
                *self.image.lock().unwrap() = None;
                self.gadget.on_media_removed();
                self.player_handle.stop();
                self.current_path = None;
                return Err(e.into());
            }
        };

        let media_type = self.config.apply_media_override(opened.media_type());
        *self.image.lock().unwrap() = Some(opened);
        self.current_path = Some(path.to_path_buf());

        self.player_handle.stop();
        self.player.reset();
        self.gadget.on_media_inserted(media_type);
        Ok(())
    }

    /// Unmount the current image
    pub fn eject(&mut self) {
        log::info!("System: ejecting");
        *self.image.lock().unwrap() = None;
        self.current_path = None;
        self.player_handle.stop();
        self.gadget.on_media_removed();
    }

    /// Path of the mounted image, if any
    pub fn current_image_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Latest audio player status snapshot
    pub fn audio_status(&self) -> PlayerStatus {
        self.player_handle.status()
    }

    /// Control surface of the audio player
    pub fn player_handle(&self) -> PlayerHandle {
        self.player_handle.clone()
    }

    /// The gadget, for protocol-level access (tests, probe mode)
    pub fn gadget_mut(&mut self) -> &mut CdGadget<LoopbackPort> {
        &mut self.gadget
    }

    /// Run one cooperative slice: gadget update pump, player step, and
    /// any disc switch requested through the SCSI Toolbox
    pub fn run_step(&mut self) {
        self.gadget.update();
        self.player.step();

        if let Some(path) = self.gadget.take_mount_request() {
            if let Err(e) = self.set_image(&path) {
                log::error!("System: toolbox mount of {} failed: {}", path.display(), e);
            }
        }
    }

    /// Play a PCM file straight through the sound sink
    pub fn sound_test(&mut self, path: &str) -> bool {
        self.player.sound_test(path)
    }
}

#[cfg(feature = "audio")]
fn make_sink() -> Box<dyn SoundSink> {
    match super::audio::AudioBackend::new() {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            log::warn!("System: no audio device ({}), playback is silent", e);
            Box::new(NullSink::new())
        }
    }
}

#[cfg(not(feature = "audio"))]
fn make_sink() -> Box<dyn SoundSink> {
    Box::new(NullSink::new())
}
