//! Versioned, rotating master keys stored in a local folder
//!
//! Folder layout:
//! - `info`: JSON metadata (active generation plus one entry per generation)
//! - `<id>.key`: serialized key material, optionally passphrase-protected
//!
//! Wrapped blobs carry the generation id as a 4-byte little-endian header so
//! data keys wrapped before a rotation stay recoverable.
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


use crate::cache::KeyCache;
use crate::cipher::{self, PassphraseParams};
use crate::encryptor::KeyEncryptor;
use crate::error::{KeyError, KeyResult};
use crate::key_material::KeyMaterial;
use crate::key_types::{GenerationId, KeyInfo, KeyMetadataRecord, UNINITIALIZED};
use crate::metadata::MetadataStore;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Size of the generation id header on wrapped blobs
pub const HEADER_LEN: usize = 4;

/// Options for opening a key folder
#[derive(Clone)]
pub struct FolderStoreOptions {
    pub folder: PathBuf,
    /// Protects key files at rest; `None` stores them in clear
    pub passphrase: Option<Zeroizing<String>>,
    pub kdf_params: PassphraseParams,
}

impl FolderStoreOptions {
    pub fn new<P: AsRef<Path>>(folder: P) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
            passphrase: None,
            kdf_params: PassphraseParams::default(),
        }
    }

    /// Set the at-rest passphrase; an empty string leaves key files unprotected
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        let passphrase = passphrase.into();
        self.passphrase = if passphrase.is_empty() {
            None
        } else {
            Some(Zeroizing::new(passphrase))
        };
        self
    }

    pub fn with_kdf_params(mut self, params: PassphraseParams) -> Self {
        self.kdf_params = params;
        self
    }
}

impl fmt::Debug for FolderStoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FolderStoreOptions")
            .field("folder", &self.folder)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("kdf_params", &self.kdf_params)
            .finish()
    }
}

struct ActiveGeneration {
    id: GenerationId,
    key: Arc<KeyMaterial>,
}

struct FolderState {
    record: KeyMetadataRecord,
    active: ActiveGeneration,
}

/// Folder-backed key encryptor with rotation
///
/// One instance per folder and process. Rotation and revocation are serialized
/// inside the process; separate processes sharing a folder must not rotate
/// concurrently.
pub struct FolderKeyEncryptor {
    folder: PathBuf,
    metadata: MetadataStore,
    cache: KeyCache,
    protect_at_rest: bool,
    state: RwLock<FolderState>,
    rotation_lock: Mutex<()>,
}

impl FolderKeyEncryptor {
    /// Open a key folder, creating generation 1 if it has never been initialized
    pub async fn open(options: FolderStoreOptions) -> KeyResult<Self> {
        fs::create_dir_all(&options.folder).await?;

        let protect_at_rest = options.passphrase.is_some();
        let metadata = MetadataStore::new(&options.folder);
        let cache = KeyCache::new(&options.folder, options.passphrase, options.kdf_params);

        let record = metadata.load().await?;
        let state = if record.is_initialized() {
            let info = record.active_info().cloned().ok_or_else(|| {
                KeyError::CorruptMetadata(format!(
                    "active generation {} is not listed",
                    record.active_generation_id
                ))
            })?;
            let key = cache.get(info.id, info.encrypted).await?;
            info!(
                folder = %options.folder.display(),
                generation = info.id,
                generations = record.generations.len(),
                "Opened key folder"
            );
            FolderState {
                record,
                active: ActiveGeneration { id: info.id, key },
            }
        } else {
            info!(folder = %options.folder.display(), "Initializing new key folder");
            provision_generation(&metadata, &cache, &record, protect_at_rest).await?
        };

        Ok(Self {
            folder: options.folder,
            metadata,
            cache,
            protect_at_rest,
            state: RwLock::new(state),
            rotation_lock: Mutex::new(()),
        })
    }

    /// Create a new master key generation and make it active
    ///
    /// Older generations stay on disk so their blobs still unwrap.
    pub async fn rotate(&self) -> KeyResult<GenerationId> {
        let _guard = self.rotation_lock.lock().await;

        let current = self.state.read().await.record.clone();
        let next = provision_generation(&self.metadata, &self.cache, &current, self.protect_at_rest)
            .await?;
        let id = next.active.id;
        *self.state.write().await = next;

        Ok(id)
    }

    /// Mark a non-active generation revoked
    ///
    /// Bookkeeping only: blobs under a revoked generation still unwrap.
    pub async fn revoke(&self, id: GenerationId) -> KeyResult<()> {
        let _guard = self.rotation_lock.lock().await;

        let mut record = self.state.read().await.record.clone();
        record.revoke(id)?;
        self.metadata.save(&record).await?;
        self.state.write().await.record = record;

        info!(generation = id, "Revoked master key generation");
        Ok(())
    }

    pub async fn active_generation(&self) -> GenerationId {
        self.state.read().await.active.id
    }

    /// Fingerprint of the active master key
    pub async fn active_fingerprint(&self) -> String {
        self.state.read().await.active.key.fingerprint()
    }

    /// All generations in id order
    pub async fn generations(&self) -> Vec<KeyInfo> {
        self.state.read().await.record.generations.values().cloned().collect()
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn protects_at_rest(&self) -> bool {
        self.protect_at_rest
    }
}

/// Write a fresh key as `current.active + 1`, then persist metadata pointing at it
///
/// The key file is removed again if the metadata write fails, so the active id
/// always refers to a key file that exists. A stray file for the new id that
/// metadata does not list is replaced.
async fn provision_generation(
    metadata: &MetadataStore,
    cache: &KeyCache,
    current: &KeyMetadataRecord,
    protect: bool,
) -> KeyResult<FolderState> {
    let id = current.next_generation_id()?;
    // A file for an id metadata never listed is left over from an interrupted
    // rotation; no blob can reference it.
    if current.get(id).is_none() && cache.discard(id).await? {
        warn!(generation = id, "Removed key file not listed in metadata");
    }
    let key = cache.put(id, KeyMaterial::generate(), protect).await?;

    let mut record = current.clone();
    record.activate(id, KeyInfo::new(id, protect));

    if let Err(e) = metadata.save(&record).await {
        warn!(generation = id, error = %e, "Metadata write failed, discarding new key file");
        if let Err(cleanup) = cache.discard(id).await {
            warn!(generation = id, error = %cleanup, "Failed to remove orphaned key file");
        }
        return Err(e);
    }

    info!(
        generation = id,
        fingerprint = %key.fingerprint(),
        protected = protect,
        "Activated new master key generation"
    );
    Ok(FolderState {
        record,
        active: ActiveGeneration { id, key },
    })
}

/// Split a wrapped blob into its generation id and sealed payload
pub fn split_header(wrapped: &[u8]) -> KeyResult<(GenerationId, &[u8])> {
    if wrapped.len() < HEADER_LEN {
        return Err(KeyError::MalformedBlob(format!(
            "{} bytes is shorter than the {}-byte header",
            wrapped.len(),
            HEADER_LEN
        )));
    }

    let (header, body) = wrapped.split_at(HEADER_LEN);
    let id = GenerationId::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if id == UNINITIALIZED {
        return Err(KeyError::MalformedBlob("generation 0 is not valid".to_string()));
    }
    Ok((id, body))
}

#[async_trait]
impl KeyEncryptor for FolderKeyEncryptor {
    async fn wrap(&self, key: &KeyMaterial) -> KeyResult<Vec<u8>> {
        let (id, master) = {
            let state = self.state.read().await;
            (state.active.id, Arc::clone(&state.active.key))
        };

        let sealed = cipher::seal(&key.serialize(), &master)?;
        let mut blob = Vec::with_capacity(HEADER_LEN + sealed.len());
        blob.extend_from_slice(&id.to_le_bytes());
        blob.extend_from_slice(&sealed);

        debug!(generation = id, "Wrapped data key");
        Ok(blob)
    }

    async fn unwrap(&self, wrapped: &[u8]) -> KeyResult<KeyMaterial> {
        let (id, body) = split_header(wrapped)?;

        let info = self
            .state
            .read()
            .await
            .record
            .get(id)
            .cloned()
            .ok_or(KeyError::UnknownGeneration(id))?;
        if info.revoked {
            warn!(generation = id, "Unwrapping with a revoked master key generation");
        }

        let master = self.cache.get(id, info.encrypted).await?;
        let plain = cipher::open(body, &master)?;
        let key = KeyMaterial::deserialize(&plain)?;

        debug!(generation = id, "Unwrapped data key");
        Ok(key)
    }

    fn backend_name(&self) -> &str {
        "folder"
    }
}
