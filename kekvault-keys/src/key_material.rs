//! Symmetric key material handle
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
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

/// Format tag for AES-256-GCM key material
const FORMAT_AES_256_GCM: u8 = 0x01;

/// Length of the serialized form: format tag + key bytes
pub const SERIALIZED_LEN: usize = 1 + KEY_LEN;

/// An AES-256 key, zeroed when dropped
///
/// Used both for master keys (one per generation) and for the data keys they wrap.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: [u8; KEY_LEN],
}

impl KeyMaterial {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut key = Self {
            bytes: [0u8; KEY_LEN],
        };
        rand::thread_rng().fill_bytes(&mut key.bytes);
        key
    }

    /// Build from exactly [`KEY_LEN`] raw key bytes
    pub fn from_raw(raw: &[u8]) -> KeyResult<Self> {
        if raw.len() != KEY_LEN {
            return Err(KeyError::DeserializationFailed(format!(
                "expected {} raw key bytes, got {}",
                KEY_LEN,
                raw.len()
            )));
        }
        let mut key = Self {
            bytes: [0u8; KEY_LEN],
        };
        key.bytes.copy_from_slice(raw);
        Ok(key)
    }

    /// Serialize to the tagged byte form
    pub fn serialize(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(SERIALIZED_LEN));
        out.push(FORMAT_AES_256_GCM);
        out.extend_from_slice(&self.bytes);
        out
    }

    /// Parse the tagged byte form produced by [`KeyMaterial::serialize`]
    pub fn deserialize(data: &[u8]) -> KeyResult<Self> {
        if data.len() != SERIALIZED_LEN {
            return Err(KeyError::DeserializationFailed(format!(
                "expected {} bytes, got {}",
                SERIALIZED_LEN,
                data.len()
            )));
        }
        if data[0] != FORMAT_AES_256_GCM {
            return Err(KeyError::DeserializationFailed(format!(
                "unknown key format tag 0x{:02x}",
                data[0]
            )));
        }
        Self::from_raw(&data[1..])
    }

    /// Expose the raw key bytes
    ///
    /// The caller must not copy them anywhere that outlives this handle.
    pub fn expose_secret(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Short SHA-256 fingerprint, safe to log
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.bytes);
        hex::encode(&digest[..8])
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.bytes[..].ct_eq(&other.bytes[..]).into()
    }
}

impl Eq for KeyMaterial {}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("fingerprint", &self.fingerprint())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
