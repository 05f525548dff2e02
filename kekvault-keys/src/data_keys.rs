//! High-level data key interface
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


use crate::encryptor::KeyEncryptor;
use crate::error::KeyResult;
use crate::key_material::KeyMaterial;
use std::sync::Arc;
use tracing::debug;

/// A freshly generated data key together with its wrapped form
pub struct DataKey {
    pub key: KeyMaterial,
    pub wrapped: Vec<u8>,
}

/// Issues and recovers data encryption keys through any [`KeyEncryptor`]
#[derive(Clone)]
pub struct DataKeyService {
    backend: Arc<dyn KeyEncryptor>,
}

impl DataKeyService {
    /// Create a new data key service with a key encryptor backend
    pub fn new(backend: Arc<dyn KeyEncryptor>) -> Self {
        Self { backend }
    }

    /// Generate a data key and wrap it; store `wrapped`, use `key`, then drop it
    pub async fn generate_data_key(&self) -> KeyResult<DataKey> {
        let key = KeyMaterial::generate();
        let wrapped = self.backend.wrap(&key).await?;
        debug!(backend = self.backend.backend_name(), "Generated data key");
        Ok(DataKey { key, wrapped })
    }

    /// Recover a data key from its wrapped form
    pub async fn decrypt_data_key(&self, wrapped: &[u8]) -> KeyResult<KeyMaterial> {
        self.backend.unwrap(wrapped).await
    }

    /// Re-wrap under the backend's current master key (e.g. after a rotation)
    pub async fn rewrap(&self, wrapped: &[u8]) -> KeyResult<Vec<u8>> {
        let key = self.backend.unwrap(wrapped).await?;
        self.backend.wrap(&key).await
    }

    pub fn backend(&self) -> &Arc<dyn KeyEncryptor> {
        &self.backend
    }
}
