//! Key-encrypting-key service for KEK vault
//!
//! Wraps data encryption keys with a master key so they can be stored or sent
//! safely. The master key can live in a versioned, rotating local folder, on a
//! developer machine, or in an external key vault; all three implement
//! [`KeyEncryptor`].
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


pub mod cache;
pub mod cipher;
pub mod data_keys;
pub mod developer;
pub mod encryptor;
pub mod error;
pub mod folder;
pub mod key_material;
pub mod key_types;
pub mod metadata;
pub mod remote;
pub mod service_integration;

pub use cipher::PassphraseParams;
pub use data_keys::{DataKey, DataKeyService};
pub use developer::DeveloperKeyEncryptor;
pub use encryptor::KeyEncryptor;
pub use error::{KeyError, KeyResult};
pub use folder::{FolderKeyEncryptor, FolderStoreOptions};
pub use key_material::KeyMaterial;
pub use key_types::{GenerationId, KeyInfo, KeyMetadataRecord};
pub use remote::{RemoteKeyClient, RemoteKeyEncryptor};
pub use service_integration::*;
