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

//! Core gadget components
//!
//! This module contains all components of the optical drive gadget:
//! - CUE sheet parser (track layout of a disc image)
//! - CD utilities (LBA/MSF conversion, track lookup, sector geometry)
//! - Disc image backends (ISO, CUE/BIN, CCD/IMG/SUB, CHD, MDS/MDF)
//! - CD-DA audio player and sound sinks
//! - USB plumbing (CBW/CSW framing, descriptors, port abstraction)
//! - The gadget itself (transaction state machine, SCSI/MMC dispatcher,
//!   streaming-read update pump)
//! - Image catalog (SCSI Toolbox file listing and disc switching)
//! - System integration

pub mod audio;
pub mod catalog;
pub mod cdrom;
pub mod config;
pub mod cue;
pub mod error;
pub mod gadget;
pub mod image;
pub mod player;
pub mod system;
pub mod usb;

// Re-export commonly used types
pub use catalog::ImageCatalog;
pub use config::Config;
pub use cue::{CueParser, CueTrackInfo, CueTrackMode};
pub use error::{ConfigError, GadgetError, ImageError, Result};
pub use gadget::CdGadget;
pub use image::ImageFile;
pub use player::{CdPlayer, PlayState, PlayerHandle};
pub use system::System;
