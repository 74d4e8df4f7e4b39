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

//! USB Bulk-Only Transport plumbing
//!
//! The Mass Storage Bulk-Only Transport frames every transaction with a
//! 31-byte Command Block Wrapper from the host and a 13-byte Command
//! Status Wrapper back from the device, both little-endian:
//!
//! ```text
//! CBW: dCBWSignature dCBWTag dCBWDataTransferLength bmCBWFlags bCBWLUN
//!      bCBWCBLength CBWCB[16]
//! CSW: dCSWSignature dCSWTag dCSWDataResidue bmCSWStatus
//! ```
//!
//! The [`UsbPort`] trait is the seam to the USB device controller: the
//! gadget arms transfers through it and the controller glue feeds
//! completions back into the gadget. [`LoopbackPort`] is an in-memory
//! controller used by the test harness and the self-probe mode of the
//! binary.

pub mod descriptors;
#[cfg(test)]
mod tests;

/// Size of a Command Block Wrapper on the wire
pub const CBW_SIZE: usize = 31;
/// Size of a Command Status Wrapper on the wire
pub const CSW_SIZE: usize = 13;

/// dCBWSignature value for a valid CBW ("USBC")
pub const CBW_SIGNATURE: u32 = 0x4342_5355;
/// dCSWSignature value ("USBS")
pub const CSW_SIGNATURE: u32 = 0x5342_5355;

/// Direction of a bulk transfer, seen from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDir {
    /// Device to host
    In,
    /// Host to device
    Out,
}

/// Command Status Wrapper status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CswStatus {
    /// Command passed
    #[default]
    Ok = 0,
    /// Command failed; sense data is latched
    Fail = 1,
    /// Protocol error; host should reset the transport
    PhaseError = 2,
}

/// A parsed Command Block Wrapper
#[derive(Debug, Clone, Copy)]
pub struct Cbw {
    /// dCBWSignature, must equal [`CBW_SIGNATURE`]
    pub signature: u32,
    /// dCBWTag, echoed in the CSW
    pub tag: u32,
    /// Bytes of data the host expects to transfer
    pub data_transfer_length: u32,
    /// bmCBWFlags; bit 7 set = data-in
    pub flags: u8,
    /// Logical unit number (always 0 on this device)
    pub lun: u8,
    /// Valid bytes in `cb` (1..=16)
    pub cb_length: u8,
    /// The SCSI command descriptor block
    pub cb: [u8; 16],
}

impl Default for Cbw {
    fn default() -> Self {
        Self {
            signature: 0,
            tag: 0,
            data_transfer_length: 0,
            flags: 0,
            lun: 0,
            cb_length: 0,
            cb: [0; 16],
        }
    }
}

impl Cbw {
    /// Parse a CBW from wire bytes
    ///
    /// Returns `None` when the length or signature is wrong; the caller
    /// stalls the endpoints and answers with a phase error.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() != CBW_SIZE {
            return None;
        }

        let signature = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if signature != CBW_SIGNATURE {
            return None;
        }

        let mut cb = [0u8; 16];
        cb.copy_from_slice(&data[15..31]);

        Some(Self {
            signature,
            tag: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            data_transfer_length: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            flags: data[12],
            lun: data[13],
            cb_length: data[14],
            cb,
        })
    }

    /// Direction of the data stage, from bit 7 of bmCBWFlags
    pub fn direction(&self) -> TransferDir {
        if self.flags & 0x80 != 0 {
            TransferDir::In
        } else {
            TransferDir::Out
        }
    }

    /// SCSI operation code (first CDB byte)
    pub fn opcode(&self) -> u8 {
        self.cb[0]
    }

    /// Serialize to wire bytes (used by the host-side test harness)
    pub fn to_bytes(&self) -> [u8; CBW_SIZE] {
        let mut out = [0u8; CBW_SIZE];
        out[0..4].copy_from_slice(&self.signature.to_le_bytes());
        out[4..8].copy_from_slice(&self.tag.to_le_bytes());
        out[8..12].copy_from_slice(&self.data_transfer_length.to_le_bytes());
        out[12] = self.flags;
        out[13] = self.lun;
        out[14] = self.cb_length;
        out[15..31].copy_from_slice(&self.cb);
        out
    }
}

/// A Command Status Wrapper
#[derive(Debug, Clone, Copy, Default)]
pub struct Csw {
    /// dCSWTag, echo of the CBW tag
    pub tag: u32,
    /// Bytes the host offered minus bytes actually delivered
    pub data_residue: u32,
    /// Transaction status
    pub status: CswStatus,
}

impl Csw {
    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> [u8; CSW_SIZE] {
        let mut out = [0u8; CSW_SIZE];
        out[0..4].copy_from_slice(&CSW_SIGNATURE.to_le_bytes());
        out[4..8].copy_from_slice(&self.tag.to_le_bytes());
        out[8..12].copy_from_slice(&self.data_residue.to_le_bytes());
        out[12] = self.status as u8;
        out
    }

    /// Parse wire bytes (used by the host-side test harness)
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() != CSW_SIZE {
            return None;
        }
        if u32::from_le_bytes([data[0], data[1], data[2], data[3]]) != CSW_SIGNATURE {
            return None;
        }
        let status = match data[12] {
            0 => CswStatus::Ok,
            1 => CswStatus::Fail,
            _ => CswStatus::PhaseError,
        };
        Some(Self {
            tag: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            data_residue: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            status,
        })
    }
}

/// Seam to the USB device controller's bulk endpoints
///
/// The gadget owns a `UsbPort` and arms transfers through it; the
/// controller glue (hardware driver or [`LoopbackPort`]) reports
/// completions by calling back into the gadget's `on_transfer_complete`
/// and `receive_out`.
pub trait UsbPort {
    /// Queue an IN payload toward the host
    fn submit_in(&mut self, data: &[u8]);

    /// Expect up to `len` OUT bytes from the host
    fn arm_out(&mut self, len: usize);

    /// Halt an endpoint until the host clears it
    fn stall(&mut self, dir: TransferDir);
}

/// In-memory USB port for tests and the self-probe mode
///
/// IN submissions queue up for the harness to pop; stalls and the armed
/// OUT length are recorded for assertions.
#[derive(Debug, Default)]
pub struct LoopbackPort {
    in_queue: std::collections::VecDeque<Vec<u8>>,
    armed_out: Option<usize>,
    in_stalled: bool,
    out_stalled: bool,
}

impl LoopbackPort {
    /// Create an idle port
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the oldest queued IN payload
    pub fn pop_in(&mut self) -> Option<Vec<u8>> {
        self.in_queue.pop_front()
    }

    /// Length of the currently armed OUT transfer, if any
    pub fn armed_out(&self) -> Option<usize> {
        self.armed_out
    }

    /// True if either endpoint is halted
    pub fn is_stalled(&self) -> bool {
        self.in_stalled || self.out_stalled
    }

    /// Clear halts, as a Bulk-Only Mass Storage Reset would
    pub fn clear_stall(&mut self) {
        self.in_stalled = false;
        self.out_stalled = false;
    }
}

impl UsbPort for LoopbackPort {
    fn submit_in(&mut self, data: &[u8]) {
        self.in_queue.push_back(data.to_vec());
    }

    fn arm_out(&mut self, len: usize) {
        self.armed_out = Some(len);
    }

    fn stall(&mut self, dir: TransferDir) {
        match dir {
            TransferDir::In => self.in_stalled = true,
            TransferDir::Out => self.out_stalled = true,
        }
    }
}
