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

//! USB descriptors
//!
//! The gadget enumerates as a Mass Storage Bulk-Only Transport device:
//! interface class 0x08 (Mass Storage), subclass 0x02 (SCSI), protocol
//! 0x50 (Bulk-Only). Two configurations exist, differing only in the bulk
//! max packet size: 64 bytes at full speed, 512 at high speed.

/// Vendor ID (Linux Foundation gadget range)
pub const VENDOR_ID: u16 = 0x1D6B;
/// Product ID for this gadget
pub const PRODUCT_ID: u16 = 0x0105;
/// Device release number (BCD)
pub const DEVICE_BCD: u16 = 0x0100;

/// Interface class: Mass Storage
pub const CLASS_MASS_STORAGE: u8 = 0x08;
/// Interface subclass: SCSI transparent command set
pub const SUBCLASS_SCSI: u8 = 0x02;
/// Interface protocol: Bulk-Only Transport
pub const PROTOCOL_BBB: u8 = 0x50;

/// Bulk IN endpoint address
pub const EP_BULK_IN: u8 = 0x81;
/// Bulk OUT endpoint address
pub const EP_BULK_OUT: u8 = 0x02;

/// Bulk max packet size at full speed
pub const MAX_PACKET_FULL_SPEED: u16 = 64;
/// Bulk max packet size at high speed
pub const MAX_PACKET_HIGH_SPEED: u16 = 512;

/// String descriptor indices
pub mod strings {
    /// iManufacturer
    pub const MANUFACTURER: u8 = 1;
    /// iProduct
    pub const PRODUCT: u8 = 2;
    /// iSerialNumber
    pub const SERIAL: u8 = 3;
}

/// Manufacturer string
pub const MANUFACTURER: &str = "USBODE";
/// Product string
pub const PRODUCT: &str = "USB Optical Drive";

/// The 18-byte device descriptor
pub fn device_descriptor() -> [u8; 18] {
    [
        18,   // bLength
        0x01, // bDescriptorType: DEVICE
        0x00,
        0x02, // bcdUSB 2.00
        0x00, // bDeviceClass: per interface
        0x00, // bDeviceSubClass
        0x00, // bDeviceProtocol
        64,   // bMaxPacketSize0
        (VENDOR_ID & 0xFF) as u8,
        (VENDOR_ID >> 8) as u8,
        (PRODUCT_ID & 0xFF) as u8,
        (PRODUCT_ID >> 8) as u8,
        (DEVICE_BCD & 0xFF) as u8,
        (DEVICE_BCD >> 8) as u8,
        strings::MANUFACTURER,
        strings::PRODUCT,
        strings::SERIAL,
        1, // bNumConfigurations
    ]
}

/// Configuration + interface + two bulk endpoint descriptors
///
/// # Arguments
///
/// * `full_speed` - Selects the 64-byte (full speed) or 512-byte (high
///   speed) bulk max packet size
pub fn configuration_descriptor(full_speed: bool) -> Vec<u8> {
    let max_packet = if full_speed {
        MAX_PACKET_FULL_SPEED
    } else {
        MAX_PACKET_HIGH_SPEED
    };

    let total_len: u16 = 9 + 9 + 7 + 7;
    let mut desc = Vec::with_capacity(total_len as usize);

    // Configuration descriptor
    desc.extend_from_slice(&[
        9,    // bLength
        0x02, // bDescriptorType: CONFIGURATION
        (total_len & 0xFF) as u8,
        (total_len >> 8) as u8,
        1,    // bNumInterfaces
        1,    // bConfigurationValue
        0,    // iConfiguration
        0x80, // bmAttributes: bus powered
        250,  // bMaxPower: 500 mA
    ]);

    // Interface descriptor
    desc.extend_from_slice(&[
        9,    // bLength
        0x04, // bDescriptorType: INTERFACE
        0,    // bInterfaceNumber
        0,    // bAlternateSetting
        2,    // bNumEndpoints
        CLASS_MASS_STORAGE,
        SUBCLASS_SCSI,
        PROTOCOL_BBB,
        0, // iInterface
    ]);

    // Bulk IN endpoint
    desc.extend_from_slice(&[
        7,    // bLength
        0x05, // bDescriptorType: ENDPOINT
        EP_BULK_IN,
        0x02, // bmAttributes: bulk
        (max_packet & 0xFF) as u8,
        (max_packet >> 8) as u8,
        0, // bInterval
    ]);

    // Bulk OUT endpoint
    desc.extend_from_slice(&[
        7,    // bLength
        0x05, // bDescriptorType: ENDPOINT
        EP_BULK_OUT,
        0x02, // bmAttributes: bulk
        (max_packet & 0xFF) as u8,
        (max_packet >> 8) as u8,
        0, // bInterval
    ]);

    desc
}

/// Encode a string descriptor as UTF-16LE with its header
pub fn string_descriptor(text: &str) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let mut desc = Vec::with_capacity(2 + units.len() * 2);
    desc.push((2 + units.len() * 2) as u8);
    desc.push(0x03); // bDescriptorType: STRING
    for unit in units {
        desc.extend_from_slice(&unit.to_le_bytes());
    }
    desc
}

/// Format a hardware serial as the gadget reports it
///
/// # Example
///
/// ```
/// use cdgadget::core::usb::descriptors::format_serial;
///
/// assert_eq!(format_serial(0xDEADBEEF), "USBODE-DEADBEEF");
/// ```
pub fn format_serial(hardware_id: u32) -> String {
    format!("USBODE-{hardware_id:08X}")
}
