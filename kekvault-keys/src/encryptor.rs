//! Key encryptor capability shared by every master key backend
//!
//! Implemented by:
//! - [`FolderKeyEncryptor`](crate::folder::FolderKeyEncryptor): versioned, rotating keys in a local folder
//! - [`DeveloperKeyEncryptor`](crate::developer::DeveloperKeyEncryptor): one clear-text key for developer machines
//! - [`RemoteKeyEncryptor`](crate::remote::RemoteKeyEncryptor): call-through to an external key vault
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


use crate::error::KeyResult;
use crate::key_material::KeyMaterial;
use async_trait::async_trait;

/// Wraps and unwraps data keys with a master key
#[async_trait]
pub trait KeyEncryptor: Send + Sync {
    /// Encrypt a data key; every call uses a fresh nonce
    async fn wrap(&self, key: &KeyMaterial) -> KeyResult<Vec<u8>>;

    /// Recover a data key from the output of [`KeyEncryptor::wrap`]
    async fn unwrap(&self, wrapped: &[u8]) -> KeyResult<KeyMaterial>;

    /// Short backend name for logs
    fn backend_name(&self) -> &str;
}
