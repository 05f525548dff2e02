//! In-memory cache of master key generations backed by key files
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


use crate::cipher::{self, PassphraseParams};
use crate::error::{KeyError, KeyResult};
use crate::key_material::KeyMaterial;
use crate::key_types::GenerationId;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OnceCell};
use tokio::task;
use tracing::{debug, warn};
use zeroize::Zeroizing;

type Slot = Arc<OnceCell<Arc<KeyMaterial>>>;

/// Lazily loaded master keys, one file per generation
///
/// Each generation gets a single `OnceCell`, so concurrent misses on the same
/// id share one disk load.
pub struct KeyCache {
    folder: PathBuf,
    passphrase: Option<Zeroizing<String>>,
    kdf_params: PassphraseParams,
    slots: Mutex<HashMap<GenerationId, Slot>>,
}

impl KeyCache {
    pub fn new<P: AsRef<Path>>(
        folder: P,
        passphrase: Option<Zeroizing<String>>,
        kdf_params: PassphraseParams,
    ) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
            passphrase,
            kdf_params,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Path of the key file for a generation
    pub fn key_path(&self, id: GenerationId) -> PathBuf {
        self.folder.join(format!("{}.key", id))
    }

    async fn slot(&self, id: GenerationId) -> Slot {
        let mut slots = self.slots.lock().await;
        slots.entry(id).or_default().clone()
    }

    /// Get a generation's key, loading it from disk on first use
    pub async fn get(&self, id: GenerationId, protected: bool) -> KeyResult<Arc<KeyMaterial>> {
        let slot = self.slot(id).await;
        let key = slot
            .get_or_try_init(|| async { self.load(id, protected).await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(key))
    }

    async fn load(&self, id: GenerationId, protected: bool) -> KeyResult<KeyMaterial> {
        let path = self.key_path(id);
        let stored = match fs::read(&path).await {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(KeyError::KeyFileMissing(id)),
            Err(e) => return Err(e.into()),
        };

        let key = if protected {
            let passphrase = self.passphrase.clone().ok_or_else(|| {
                warn!(generation = id, "Key file is protected but no passphrase is configured");
                KeyError::AtRestDecryptionFailed(id)
            })?;
            // Argon2 runs off the async workers
            let plain = task::spawn_blocking(move || cipher::open_with_passphrase(&stored, &passphrase))
                .await
                .map_err(|e| KeyError::Decryption(format!("Key derivation task failed: {}", e)))
                .and_then(|opened| opened)
                .map_err(|e| {
                    warn!(generation = id, error = %e, "Failed to decrypt key file");
                    KeyError::AtRestDecryptionFailed(id)
                })?;
            KeyMaterial::deserialize(&plain)?
        } else {
            KeyMaterial::deserialize(&stored)?
        };

        debug!(generation = id, fingerprint = %key.fingerprint(), "Loaded master key from disk");
        Ok(key)
    }

    /// Write a new generation's key file and cache the key
    ///
    /// Generation files are never overwritten; an existing file is reported as
    /// [`KeyError::GenerationConflict`]. A file that fails to write is removed.
    pub async fn put(
        &self,
        id: GenerationId,
        key: KeyMaterial,
        protect: bool,
    ) -> KeyResult<Arc<KeyMaterial>> {
        let serialized = key.serialize();
        let stored = if protect {
            let passphrase = self.passphrase.clone().ok_or_else(|| {
                KeyError::Configuration("at-rest protection requested without a passphrase".to_string())
            })?;
            let params = self.kdf_params;
            let sealed = task::spawn_blocking(move || {
                cipher::seal_with_passphrase(&serialized, &passphrase, params)
            })
            .await
            .map_err(|e| KeyError::Encryption(format!("Key derivation task failed: {}", e)))??;
            Zeroizing::new(sealed)
        } else {
            serialized
        };

        let path = self.key_path(id);
        let file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(KeyError::GenerationConflict(id))
            }
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = write_synced(file, &stored).await {
            warn!(generation = id, error = %e, "Failed to write key file, removing it");
            if let Err(cleanup) = fs::remove_file(&path).await {
                warn!(generation = id, error = %cleanup, "Failed to remove partial key file");
            }
            return Err(e.into());
        }

        let key = Arc::new(key);
        let slot = Arc::new(OnceCell::new_with(Some(Arc::clone(&key))));
        self.slots.lock().await.insert(id, slot);

        debug!(generation = id, protected = protect, "Wrote master key file");
        Ok(key)
    }

    /// Drop a generation from the cache and delete its file
    ///
    /// Returns whether a file was removed.
    pub async fn discard(&self, id: GenerationId) -> KeyResult<bool> {
        self.slots.lock().await.remove(&id);
        match fs::remove_file(self.key_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Number of generations currently held in memory
    pub async fn cached_len(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }
}

async fn write_synced(mut file: fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.sync_all().await
}
