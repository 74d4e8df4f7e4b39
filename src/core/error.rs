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

//! Gadget error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type for gadget operations
pub type Result<T> = std::result::Result<T, GadgetError>;

/// Errors raised while opening or reading a disc image
#[derive(Debug, Error)]
pub enum ImageError {
    /// The file extension does not match any supported image format
    #[error("unsupported image format: {path}")]
    UnsupportedFormat {
        /// The path that was passed to the mount request
        path: PathBuf,
    },

    /// The image (or one of its sibling files) could not be opened
    #[error("failed to open '{path}': {source}")]
    Open {
        /// The file that failed to open
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The image metadata could not be parsed
    #[error("malformed {kind} file '{path}': {detail}")]
    Malformed {
        /// Format short name ("CUE", "CCD", "MDS", "CHD")
        kind: &'static str,
        /// The file that failed to parse
        path: PathBuf,
        /// What went wrong
        detail: String,
    },

    /// A read or seek on the underlying file failed
    #[error("image I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CHD library rejected the file or a hunk read failed
    #[error("CHD error: {0}")]
    Chd(#[from] chd::Error),

    /// Subchannel data was requested but the image has none
    #[error("image has no subchannel data")]
    NoSubchannel,
}

/// Errors raised while loading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read
    #[error("failed to read config '{path}': {source}")]
    Read {
        /// Path of the config file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has a bad value
    #[error("failed to parse config '{path}': {detail}")]
    Parse {
        /// Path of the config file
        path: PathBuf,
        /// Parser diagnostics
        detail: String,
    },
}

/// Top-level error type for gadget operations
#[derive(Debug, Error)]
pub enum GadgetError {
    /// Disc image error
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Sound backend error
    #[error("audio backend error: {0}")]
    Audio(String),

    /// Image catalog error (directory scan)
    #[error("catalog error: {0}")]
    Catalog(#[from] std::io::Error),
}
