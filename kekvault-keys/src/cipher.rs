//! AES-256-GCM sealing, plain and passphrase-derived
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
use crate::key_material::{KeyMaterial, KEY_LEN};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::Zeroizing;

/// AES-GCM nonce length
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Salt length for passphrase derivation
pub const SALT_LEN: usize = 16;

/// m_cost, t_cost, p_cost as little-endian u32s
const PARAMS_LEN: usize = 12;

/// Upper bounds accepted for stored Argon2 parameters (1 GiB, 10 passes, 16 lanes)
pub const MAX_MEMORY_KIB: u32 = 1024 * 1024;
pub const MAX_TIME_COST: u32 = 10;
pub const MAX_PARALLELISM: u32 = 16;

/// Argon2id cost parameters for passphrase-protected data
///
/// Stored alongside each sealed payload so files stay readable if defaults change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassphraseParams {
    pub memory_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for PassphraseParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            time_cost: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl PassphraseParams {
    fn to_bytes(self) -> [u8; PARAMS_LEN] {
        let mut out = [0u8; PARAMS_LEN];
        out[0..4].copy_from_slice(&self.memory_kib.to_le_bytes());
        out[4..8].copy_from_slice(&self.time_cost.to_le_bytes());
        out[8..12].copy_from_slice(&self.parallelism.to_le_bytes());
        out
    }

    /// Reject costs outside the supported range before any derivation runs
    pub fn check(&self) -> Result<(), String> {
        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(format!("parallelism {} out of range", self.parallelism));
        }
        if self.time_cost == 0 || self.time_cost > MAX_TIME_COST {
            return Err(format!("time cost {} out of range", self.time_cost));
        }
        if self.memory_kib < 8 * self.parallelism || self.memory_kib > MAX_MEMORY_KIB {
            return Err(format!("memory cost {} KiB out of range", self.memory_kib));
        }
        Ok(())
    }

    fn from_bytes(bytes: &[u8; PARAMS_LEN]) -> Self {
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self {
            memory_kib: word(0),
            time_cost: word(4),
            parallelism: word(8),
        }
    }
}

/// Encrypt under `key` with a fresh random nonce; output is `nonce || ciphertext+tag`
pub fn seal(plaintext: &[u8], key: &KeyMaterial) -> KeyResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.expose_secret()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| KeyError::Encryption(format!("Encryption failed: {}", e)))?;

    let mut result = nonce.to_vec();
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt output of [`seal`]
pub fn open(sealed: &[u8], key: &KeyMaterial) -> KeyResult<Zeroizing<Vec<u8>>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(KeyError::Decryption("Encrypted data too short".to_string()));
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.expose_secret()));

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| KeyError::Decryption(format!("Decryption failed: {}", e)))?;

    Ok(Zeroizing::new(plaintext))
}

fn derive_key(
    passphrase: &str,
    salt: &[u8],
    params: PassphraseParams,
    err: fn(String) -> KeyError,
) -> KeyResult<KeyMaterial> {
    params
        .check()
        .map_err(|e| err(format!("Invalid Argon2 parameters: {}", e)))?;
    let argon_params = Params::new(
        params.memory_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| err(format!("Invalid Argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);
    let mut derived = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut derived[..])
        .map_err(|e| err(format!("Argon2 derivation failed: {}", e)))?;

    KeyMaterial::from_raw(&derived[..])
}

/// Encrypt under a key derived from `passphrase`
///
/// Output layout: `params (12) || salt (16) || nonce (12) || ciphertext+tag`.
pub fn seal_with_passphrase(
    plaintext: &[u8],
    passphrase: &str,
    params: PassphraseParams,
) -> KeyResult<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let key = derive_key(passphrase, &salt, params, KeyError::Encryption)?;
    let sealed = seal(plaintext, &key)?;

    let mut out = Vec::with_capacity(PARAMS_LEN + SALT_LEN + sealed.len());
    out.extend_from_slice(&params.to_bytes());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypt output of [`seal_with_passphrase`]
///
/// Stored parameters outside the [`PassphraseParams::check`] range fail with
/// [`KeyError::Decryption`] without deriving.
pub fn open_with_passphrase(sealed: &[u8], passphrase: &str) -> KeyResult<Zeroizing<Vec<u8>>> {
    if sealed.len() < PARAMS_LEN + SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(KeyError::Decryption("Encrypted data too short".to_string()));
    }

    let (header, rest) = sealed.split_at(PARAMS_LEN);
    let (salt, body) = rest.split_at(SALT_LEN);
    let mut param_bytes = [0u8; PARAMS_LEN];
    param_bytes.copy_from_slice(header);

    let params = PassphraseParams::from_bytes(&param_bytes);
    let key = derive_key(passphrase, salt, params, KeyError::Decryption)?;
    open(body, &key)
}

#[cfg(test)]
pub(crate) fn fast_params() -> PassphraseParams {
    PassphraseParams {
        memory_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}
