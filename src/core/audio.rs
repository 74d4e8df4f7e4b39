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

//! Sound sinks for CD-DA playback
//!
//! The audio player writes raw 44.1 kHz 16-bit stereo PCM to a
//! [`SoundSink`]: a bounded queue of stereo frames drained by the output
//! hardware. The production sink is [`AudioBackend`], built on cpal (the
//! `audio` feature); tests use the in-memory [`NullSink`].

#[cfg(feature = "audio")]
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
#[cfg(feature = "audio")]
use std::sync::{Arc, Mutex};

/// CD audio sample rate
pub const SAMPLE_RATE: u32 = 44_100;
/// Bytes per stereo frame (two 16-bit samples)
pub const BYTES_PER_FRAME: usize = 4;

/// A bounded queue of stereo PCM frames drained by an output device
///
/// All byte counts are little-endian 16-bit stereo interleaved, 4 bytes
/// per frame.
pub trait SoundSink {
    /// Total capacity of the frame queue
    fn queue_size_frames(&self) -> usize;

    /// Frames currently queued and not yet played
    fn queued_frames(&self) -> usize;

    /// Queue PCM bytes for playback; returns the number of bytes accepted
    fn write(&mut self, data: &[u8]) -> usize;

    /// True while the output device is running
    fn is_active(&self) -> bool;
}

/// Frames a sink buffers before the player stops refilling
///
/// 16 sectors of 588 frames, the same window the gadget uses for bulk
/// reads.
pub const SINK_QUEUE_FRAMES: usize = 588 * 16;

/// In-memory sink used by tests and when no audio device exists
///
/// Frames are accepted into a bounded queue and discarded on
/// [`drain`](NullSink::drain); nothing is played.
#[derive(Debug, Default)]
pub struct NullSink {
    queue: VecDeque<(i16, i16)>,
    capacity: usize,
    /// Byte budget after which `write` starts refusing data (for tests)
    pub accept_limit: Option<usize>,
    accepted: usize,
}

impl NullSink {
    /// Create a sink with the default queue capacity
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: SINK_QUEUE_FRAMES,
            accept_limit: None,
            accepted: 0,
        }
    }

    /// Discard queued frames, as if the device had played them
    pub fn drain(&mut self) -> usize {
        let n = self.queue.len();
        self.queue.clear();
        n
    }

    /// Copy of the queued frames, for assertions
    pub fn frames(&self) -> Vec<(i16, i16)> {
        self.queue.iter().copied().collect()
    }
}

impl SoundSink for NullSink {
    fn queue_size_frames(&self) -> usize {
        self.capacity
    }

    fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let mut budget = data.len();
        if let Some(limit) = self.accept_limit {
            budget = budget.min(limit.saturating_sub(self.accepted));
        }
        let budget = budget - budget % BYTES_PER_FRAME;

        for frame in data[..budget].chunks_exact(BYTES_PER_FRAME) {
            let left = i16::from_le_bytes([frame[0], frame[1]]);
            let right = i16::from_le_bytes([frame[2], frame[3]]);
            self.queue.push_back((left, right));
        }
        self.accepted += budget;
        budget
    }

    fn is_active(&self) -> bool {
        true
    }
}

/// Audio output backend using cpal
///
/// Manages the output stream and frame buffering for real-time playback.
#[cfg(feature = "audio")]
pub struct AudioBackend {
    /// cpal audio output stream
    #[allow(dead_code)]
    stream: cpal::Stream,
    /// Queue of stereo frames (left, right) to be played
    frame_queue: Arc<Mutex<VecDeque<(i16, i16)>>>,
    /// Sample rate of the output device
    sample_rate: u32,
}

#[cfg(feature = "audio")]
impl AudioBackend {
    /// Create a new audio backend on the default output device
    ///
    /// # Errors
    ///
    /// Returns an error if no output device is available, the device is
    /// not stereo, or the stream cannot be built.
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("No audio output device available")?;

        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        if channels != 2 {
            return Err(format!(
                "CD audio requires stereo output, but device '{}' default config has {} channels",
                device.name().unwrap_or_else(|_| "Unknown".to_string()),
                channels
            )
            .into());
        }

        if sample_rate != SAMPLE_RATE {
            log::warn!(
                "Audio: device sample rate is {} Hz (expected {} Hz). CD audio pitch will be off.",
                sample_rate,
                SAMPLE_RATE
            );
        }

        log::info!(
            "Audio: using device '{}' at {} Hz, {} channels",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate,
            channels
        );

        let frame_queue = Arc::new(Mutex::new(VecDeque::new()));
        let queue_clone = frame_queue.clone();

        // Build output stream with f32 samples
        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut queue = queue_clone.lock().unwrap();

                for frame in data.chunks_mut(2) {
                    if let Some((left, right)) = queue.pop_front() {
                        frame[0] = f32::from(left) / 32768.0;
                        frame[1] = f32::from(right) / 32768.0;
                    } else {
                        // Output silence if the queue runs dry
                        frame[0] = 0.0;
                        frame[1] = 0.0;
                    }
                }
            },
            |err| log::error!("Audio stream error: {}", err),
            None,
        )?;

        stream.play()?;

        Ok(Self {
            stream,
            frame_queue,
            sample_rate,
        })
    }

    /// Get the sample rate of the audio output device
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(feature = "audio")]
impl SoundSink for AudioBackend {
    fn queue_size_frames(&self) -> usize {
        SINK_QUEUE_FRAMES
    }

    fn queued_frames(&self) -> usize {
        self.frame_queue.lock().unwrap().len()
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let accepted = data.len() - data.len() % BYTES_PER_FRAME;
        let mut queue = self.frame_queue.lock().unwrap();
        for frame in data[..accepted].chunks_exact(BYTES_PER_FRAME) {
            let left = i16::from_le_bytes([frame[0], frame[1]]);
            let right = i16::from_le_bytes([frame[2], frame[3]]);
            queue.push_back((left, right));
        }
        accepted
    }

    fn is_active(&self) -> bool {
        true
    }
}
