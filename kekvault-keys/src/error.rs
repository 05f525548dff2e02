//! Error types for key encryption
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


use crate::key_types::GenerationId;
use thiserror::Error;

/// Key encryption errors
///
/// None of these are retried internally; they surface to the caller as-is.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Corrupt key metadata: {0}")]
    CorruptMetadata(String),

    #[error("Key file missing for generation {0}")]
    KeyFileMissing(GenerationId),

    #[error("At-rest decryption failed for generation {0}")]
    AtRestDecryptionFailed(GenerationId),

    #[error("Key material deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Malformed wrapped key: {0}")]
    MalformedBlob(String),

    #[error("Unknown key generation: {0}")]
    UnknownGeneration(GenerationId),

    #[error("Key file for generation {0} already exists")]
    GenerationConflict(GenerationId),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("KMS error: {0}")]
    Kms(String),

    #[error("Key rotation error: {0}")]
    Rotation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for key operations
pub type KeyResult<T> = Result<T, KeyError>;
