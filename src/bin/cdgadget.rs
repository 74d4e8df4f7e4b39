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

//! Gadget self-probe tool
//!
//! Mounts a disc image and replays the command sequence a host issues
//! when a drive appears (INQUIRY, TEST UNIT READY, READ CAPACITY, READ
//! TOC, a data read) against the gadget over its loopback port, printing
//! each reply. Useful for checking an image before plugging the device
//! into a real machine, and for exercising the sound path.

use clap::Parser;
use log::{error, info};

use cdgadget::core::config::Config;
use cdgadget::core::error::Result;
use cdgadget::core::gadget::{CdGadget, TcdState};
use cdgadget::core::system::System;
use cdgadget::core::usb::{Cbw, Csw, CswStatus, LoopbackPort, TransferDir, CBW_SIGNATURE};

/// USB CD-ROM gadget
#[derive(Parser)]
#[command(name = "cdgadget")]
#[command(about = "USB optical drive gadget", long_about = None)]
struct Args {
    /// Path to a disc image (.iso, .cue, .ccd, .chd, .mds)
    image: Option<String>,

    /// Path to the configuration file
    #[arg(short = 'c', long, default_value = "config.toml")]
    config: String,

    /// Play system/test.pcm through the sound backend and exit
    #[arg(long)]
    sound_test: bool,

    /// Number of cooperative loop steps to run after the probe
    #[arg(short = 'n', long, default_value = "1000")]
    steps: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    // Default level INFO; the config debug flag turns everything up
    env_logger::Builder::from_default_env()
        .filter_level(if config.debug_logging {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    info!("cdgadget v{}", env!("CARGO_PKG_VERSION"));

    let mut system = System::new(config)?;

    if args.sound_test {
        info!("Running sound test");
        let ok = system.sound_test("system/test.pcm");
        info!("Sound test {}", if ok { "passed" } else { "failed" });
        return Ok(());
    }

    if let Some(image) = &args.image {
        if let Err(e) = system.set_image(image) {
            error!("Failed to mount {}: {}", image, e);
            return Err(e);
        }
        info!("Mounted {}", image);
    }

    // Let the disc-swap window settle before probing
    let settle = std::time::Instant::now();
    while settle.elapsed() < std::time::Duration::from_millis(600) {
        system.run_step();
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    run_host_probe(system.gadget_mut());

    info!("Entering run loop for {} steps", args.steps);
    for _ in 0..args.steps {
        system.run_step();
        std::thread::yield_now();
    }

    Ok(())
}

/// Replay a typical host bring-up sequence and log each reply
fn run_host_probe(gadget: &mut CdGadget<LoopbackPort>) {
    info!("--- host probe ---");

    let (data, csw) = transact(gadget, &[0x12, 0, 0, 0, 0x24, 0], 36);
    info!(
        "INQUIRY: {:?}, vendor {:?}",
        csw.status,
        String::from_utf8_lossy(data.get(8..16).unwrap_or_default())
    );

    let (_, csw) = transact(gadget, &[0x00], 0);
    info!("TEST UNIT READY: {:?}", csw.status);

    if csw.status != CswStatus::Ok {
        let (sense, _) = transact(gadget, &[0x03, 0, 0, 0, 14], 14);
        info!(
            "REQUEST SENSE: {:02x}/{:02x}/{:02x}",
            sense.get(2).copied().unwrap_or(0),
            sense.get(12).copied().unwrap_or(0),
            sense.get(13).copied().unwrap_or(0)
        );

        // Retry after acknowledging a unit attention
        let (_, csw) = transact(gadget, &[0x00], 0);
        info!("TEST UNIT READY: {:?}", csw.status);
        if csw.status != CswStatus::Ok {
            info!("No medium; probe ends");
            return;
        }
    }

    let (data, csw) = transact(gadget, &[0x25, 0, 0, 0, 0, 0, 0, 0, 0, 0], 8);
    if csw.status == CswStatus::Ok && data.len() == 8 {
        let last = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let block = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        info!("READ CAPACITY: {} blocks of {} bytes", last + 1, block);
    }

    let (data, csw) = transact(gadget, &[0x43, 0x02, 0, 0, 0, 0, 0, 0x03, 0xFC, 0], 1020);
    if csw.status == CswStatus::Ok && data.len() >= 4 {
        info!(
            "READ TOC: tracks {}..{}, {} bytes",
            data[2],
            data[3],
            data.len()
        );
        for entry in data[4..].chunks_exact(8) {
            let lba = u32::from_be_bytes([entry[4], entry[5], entry[6], entry[7]]);
            info!(
                "  track {:3}: {} at LBA {}",
                entry[2],
                if entry[1] & 0x04 != 0 { "data " } else { "audio" },
                lba
            );
        }
    }

    // Read the volume descriptor sector of a data disc
    let (data, csw) = transact(gadget, &[0x28, 0, 0, 0, 0, 16, 0, 0, 1, 0], 2048);
    info!(
        "READ(10) LBA 16: {:?}, {} bytes{}",
        csw.status,
        data.len(),
        if data.get(1..6) == Some(&b"CD001"[..]) {
            " (ISO 9660 volume descriptor)"
        } else {
            ""
        }
    );

    info!("--- probe complete ---");
}

/// Run one Bulk-Only transaction against the loopback port
fn transact(
    gadget: &mut CdGadget<LoopbackPort>,
    cdb: &[u8],
    transfer_length: u32,
) -> (Vec<u8>, Csw) {
    static TAG: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(1);

    let mut cb = [0u8; 16];
    cb[..cdb.len()].copy_from_slice(cdb);
    let cbw = Cbw {
        signature: CBW_SIGNATURE,
        tag: TAG.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
        data_transfer_length: transfer_length,
        flags: 0x80,
        lun: 0,
        cb_length: cdb.len() as u8,
        cb,
    };

    gadget.receive_out(&cbw.to_bytes());

    let mut data = Vec::new();
    loop {
        match gadget.state() {
            TcdState::DataInRead => {
                if let Some(buf) = gadget.port_mut().pop_in() {
                    let len = buf.len();
                    data.extend(buf);
                    gadget.on_transfer_complete(TransferDir::In, len);
                } else {
                    gadget.update();
                }
            }
            TcdState::SentCsw => {
                let buf = gadget.port_mut().pop_in().expect("CSW queued");
                let csw = Csw::parse(&buf).expect("valid CSW");
                gadget.on_transfer_complete(TransferDir::In, buf.len());
                return (data, csw);
            }
            _ => {
                if let Some(buf) = gadget.port_mut().pop_in() {
                    let len = buf.len();
                    data.extend(buf);
                    gadget.on_transfer_complete(TransferDir::In, len);
                } else {
                    // A stalled or wedged transaction has no way forward
                    return (data, Csw::default());
                }
            }
        }
    }
}
