//! Single clear-text master key for developer machines
//!
//! Not meant for production: the master key is stored unprotected and never rotates.
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


use crate::cipher;
use crate::encryptor::KeyEncryptor;
use crate::error::{KeyError, KeyResult};
use crate::key_material::KeyMaterial;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// File holding the developer master key
pub const MASTER_KEY_FILE: &str = "master.key";

pub struct DeveloperKeyEncryptor {
    master_key: KeyMaterial,
}

impl DeveloperKeyEncryptor {
    /// Load the master key from `folder`, generating it on first use
    pub async fn open<P: AsRef<Path>>(folder: P) -> KeyResult<Self> {
        let folder = folder.as_ref();
        fs::create_dir_all(folder).await?;
        let path = folder.join(MASTER_KEY_FILE);

        let master_key = match fs::read(&path).await {
            Ok(bytes) => KeyMaterial::deserialize(&Zeroizing::new(bytes))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    path = %path.display(),
                    "Generating clear-text developer master key. Do not use this in production!"
                );
                let key = KeyMaterial::generate();
                let mut file = fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .await
                    .map_err(|e| match e.kind() {
                        ErrorKind::AlreadyExists => KeyError::Configuration(format!(
                            "{} was created concurrently, reopen the encryptor",
                            path.display()
                        )),
                        _ => KeyError::Io(e),
                    })?;
                file.write_all(&key.serialize()).await?;
                file.sync_all().await?;
                key
            }
            Err(e) => return Err(e.into()),
        };

        info!(fingerprint = %master_key.fingerprint(), "Developer master key ready");
        Ok(Self { master_key })
    }
}

#[async_trait]
impl KeyEncryptor for DeveloperKeyEncryptor {
    async fn wrap(&self, key: &KeyMaterial) -> KeyResult<Vec<u8>> {
        cipher::seal(&key.serialize(), &self.master_key)
    }

    async fn unwrap(&self, wrapped: &[u8]) -> KeyResult<KeyMaterial> {
        let plain = cipher::open(wrapped, &self.master_key)?;
        KeyMaterial::deserialize(&plain)
    }

    fn backend_name(&self) -> &str {
        "developer"
    }
}
