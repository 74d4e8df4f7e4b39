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

//! Startup configuration
//!
//! The gadget consumes a configuration snapshot once at startup: USB speed,
//! sound backend, default volume, debug-logging flag and an optional media
//! type override. The file is TOML with a single `[usbode]` table; a missing
//! file or missing keys fall back to defaults.
//!
//! ```toml
//! [usbode]
//! usb_speed = "high"
//! sound_device = "sndpwm"
//! default_volume = 255
//! debug_logging = false
//! media_type = "auto"
//! images_dir = "images"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::ConfigError;
use super::image::MediaType;

/// USB bus speed the gadget enumerates at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsbSpeed {
    /// Full speed (12 Mbit/s, 64-byte bulk packets)
    Full,
    /// High speed (480 Mbit/s, 512-byte bulk packets)
    High,
}

/// Sound backend selection for CD-DA playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SoundDevice {
    /// PWM output
    #[serde(rename = "sndpwm")]
    Pwm,
    /// I2S DAC
    #[serde(rename = "sndi2s")]
    I2s,
    /// HDMI audio
    #[serde(rename = "sndhdmi")]
    Hdmi,
    /// USB audio device
    #[serde(rename = "sndusb")]
    Usb,
}

/// Media type override from the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaOverride {
    /// Detect from the image file name (`.dvd.` hint)
    Auto,
    /// Force CD-ROM
    Cd,
    /// Force DVD-ROM
    Dvd,
}

/// Configuration snapshot consumed at startup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// USB bus speed
    pub usb_speed: UsbSpeed,

    /// Sound backend for CD-DA playback
    pub sound_device: SoundDevice,

    /// Default CD-DA volume (0..=255, 255 = unscaled)
    pub default_volume: u8,

    /// Verbose command-level logging
    pub debug_logging: bool,

    /// Media type override
    pub media_type: MediaOverride,

    /// Directory scanned for mountable disc images
    pub images_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            usb_speed: UsbSpeed::High,
            sound_device: SoundDevice::Pwm,
            default_volume: 0xFF,
            debug_logging: false,
            media_type: MediaOverride::Auto,
            images_dir: PathBuf::from("images"),
        }
    }
}

/// On-disk layout: the config lives in a `[usbode]` table
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    usbode: Config,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// A missing file yields the defaults; a present but malformed file is
    /// an error, so a typo does not silently reset the device behavior.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the config file (e.g. `config.toml`)
    ///
    /// # Returns
    ///
    /// - `Ok(Config)` with file values merged over defaults
    /// - `Err(ConfigError)` if the file exists but cannot be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("Config: no file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        log::info!(
            "Config: speed={:?}, sound={:?}, volume={}, debug={}",
            file.usbode.usb_speed,
            file.usbode.sound_device,
            file.usbode.default_volume,
            file.usbode.debug_logging
        );

        Ok(file.usbode)
    }

    /// Resolve the media override against a detected media type
    pub fn apply_media_override(&self, detected: MediaType) -> MediaType {
        match self.media_type {
            MediaOverride::Auto => detected,
            MediaOverride::Cd => MediaType::Cd,
            MediaOverride::Dvd => MediaType::Dvd,
        }
    }
}
