//! Durable key generation metadata
// Copyright 2025 Francisco F. Pinochet
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


use crate::error::{KeyError, KeyResult};
use crate::key_types::KeyMetadataRecord;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Name of the metadata file inside the key folder
pub const METADATA_FILE: &str = "info";

/// Reads and rewrites the single metadata file of a key folder
///
/// There is no cross-process locking: only one process may rotate a folder.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new<P: AsRef<Path>>(folder: P) -> Self {
        Self {
            path: folder.as_ref().join(METADATA_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record; a missing file yields an empty record
    pub async fn load(&self) -> KeyResult<KeyMetadataRecord> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No key metadata yet");
                return Ok(KeyMetadataRecord::default());
            }
            Err(e) => return Err(e.into()),
        };

        let record: KeyMetadataRecord = serde_json::from_slice(&content).map_err(|e| {
            KeyError::CorruptMetadata(format!("{}: {}", self.path.display(), e))
        })?;
        record.validate()?;

        debug!(
            active_generation = record.active_generation_id,
            generations = record.generations.len(),
            "Loaded key metadata"
        );
        Ok(record)
    }

    /// Replace the record on disk
    ///
    /// Writes a sibling temp file, syncs it, then renames it over the old one.
    pub async fn save(&self, record: &KeyMetadataRecord) -> KeyResult<()> {
        let json = serde_json::to_vec_pretty(record)?;
        let tmp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, &self.path).await?;

        debug!(
            active_generation = record.active_generation_id,
            "Saved key metadata"
        );
        Ok(())
    }
}
