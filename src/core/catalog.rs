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

//! Image catalog
//!
//! A sorted listing of the mountable images in a directory, consumed by
//! the SCSI Toolbox commands and by whoever drives disc selection. Only
//! the descriptor file of each multi-file format is listed (`.cue`, not
//! its `.bin`; `.ccd`, not its `.img`/`.sub`; `.mds`, not its `.mdf`).

use std::path::{Path, PathBuf};

/// Extensions that mount directly
const MOUNTABLE: [&str; 5] = ["iso", "cue", "chd", "ccd", "mds"];

/// One image in the catalog
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// File name shown to hosts
    pub name: String,
    /// Full path for mounting
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// A directory's worth of mountable disc images
#[derive(Debug, Default)]
pub struct ImageCatalog {
    entries: Vec<CatalogEntry>,
}

impl ImageCatalog {
    /// Scan a directory for disc images, sorted by name
    ///
    /// A missing directory yields an empty catalog rather than an error,
    /// so first boot with no image folder still enumerates.
    pub fn scan<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        let mut entries = Vec::new();

        let read_dir = match std::fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Catalog: image directory {} not found", dir.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };

        for entry in read_dir {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !MOUNTABLE.contains(&ext.to_ascii_lowercase().as_str()) {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            entries.push(CatalogEntry {
                name: name.to_string(),
                path: path.clone(),
                size: entry.metadata().map(|m| m.len()).unwrap_or(0),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        log::info!("Catalog: {} image(s) in {}", entries.len(), dir.display());

        Ok(Self { entries })
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the directory held no images
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate the entries in listing order
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Path of the image at a listing index
    pub fn path_at(&self, index: usize) -> Option<PathBuf> {
        self.entries.get(index).map(|e| e.path.clone())
    }
}
