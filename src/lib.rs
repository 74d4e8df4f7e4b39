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

//! USB CD/DVD-ROM gadget core library
//!
//! This library implements the device side of a USB optical drive: it
//! enumerates as a Mass Storage Bulk-Only Transport device, answers the
//! SCSI/MMC command set a host uses to probe and read an optical drive,
//! and serves sectors out of disc image files (ISO, CUE/BIN, CCD/IMG/SUB,
//! CHD, MDS/MDF) stored on a local filesystem. CD-DA tracks can be played
//! through a sound backend and reported back through READ SUB-CHANNEL.
//!
//! # Example
//!
//! ```no_run
//! use cdgadget::core::config::Config;
//! use cdgadget::core::system::System;
//!
//! let mut system = System::new(Config::default()).unwrap();
//! system.set_image("games/image.iso").unwrap();
//!
//! // Drive the gadget and audio player cooperatively
//! loop {
//!     system.run_step();
//! }
//! ```

pub mod core;
