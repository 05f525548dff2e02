//! Key encryptor backed by an external key vault
//!
//! The vault holds the master key; wrap and unwrap are forwarded to its
//! encrypt/decrypt operations under a named key. No local state is kept.
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
use crate::error::{KeyError, KeyResult};
use crate::key_material::KeyMaterial;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

/// Client for a remote key vault's encrypt/decrypt operations
///
/// Implementations own the transport and authentication.
#[async_trait]
pub trait RemoteKeyClient: Send + Sync {
    async fn encrypt(&self, key_name: &str, plaintext: &[u8]) -> KeyResult<Vec<u8>>;

    async fn decrypt(&self, key_name: &str, ciphertext: &[u8]) -> KeyResult<Vec<u8>>;
}

pub struct RemoteKeyEncryptor {
    client: Arc<dyn RemoteKeyClient>,
    key_name: String,
}

impl RemoteKeyEncryptor {
    pub fn new(client: Arc<dyn RemoteKeyClient>, key_name: impl Into<String>) -> KeyResult<Self> {
        let key_name = key_name.into();
        if key_name.is_empty() {
            return Err(KeyError::Configuration("remote key name must not be empty".to_string()));
        }
        Ok(Self { client, key_name })
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }
}

#[async_trait]
impl KeyEncryptor for RemoteKeyEncryptor {
    async fn wrap(&self, key: &KeyMaterial) -> KeyResult<Vec<u8>> {
        debug!(key_name = %self.key_name, "Wrapping data key with remote key");
        self.client.encrypt(&self.key_name, &key.serialize()).await
    }

    async fn unwrap(&self, wrapped: &[u8]) -> KeyResult<KeyMaterial> {
        debug!(key_name = %self.key_name, "Unwrapping data key with remote key");
        let plain = Zeroizing::new(self.client.decrypt(&self.key_name, wrapped).await?);
        KeyMaterial::deserialize(&plain)
    }

    fn backend_name(&self) -> &str {
        "remote"
    }
}
