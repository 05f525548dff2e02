//! Key generation type definitions
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
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Master key generation identifier. 0 means "not initialized".
pub type GenerationId = u32;

/// Generation id of a store that has never been rotated
pub const UNINITIALIZED: GenerationId = 0;

/// Descriptive information about one master key generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub id: GenerationId,
    /// Whether the key file is passphrase-protected at rest
    pub encrypted: bool,
    pub created_at: DateTime<Utc>,
    /// Advisory only; revoked generations still unwrap
    pub revoked: bool,
}

impl KeyInfo {
    pub fn new(id: GenerationId, encrypted: bool) -> Self {
        Self {
            id,
            encrypted,
            created_at: Utc::now(),
            revoked: false,
        }
    }
}

/// Durable record of all master key generations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadataRecord {
    pub active_generation_id: GenerationId,
    #[serde(default)]
    pub generations: BTreeMap<GenerationId, KeyInfo>,
}

impl KeyMetadataRecord {
    pub fn is_initialized(&self) -> bool {
        self.active_generation_id != UNINITIALIZED
    }

    /// Make `id` the active generation and record its info
    pub fn activate(&mut self, id: GenerationId, info: KeyInfo) {
        self.active_generation_id = id;
        self.generations.insert(id, info);
    }

    pub fn get(&self, id: GenerationId) -> Option<&KeyInfo> {
        self.generations.get(&id)
    }

    pub fn active_info(&self) -> Option<&KeyInfo> {
        self.get(self.active_generation_id)
    }

    /// Id the next rotation will allocate
    pub fn next_generation_id(&self) -> KeyResult<GenerationId> {
        self.active_generation_id
            .checked_add(1)
            .ok_or_else(|| KeyError::Rotation("generation id space exhausted".to_string()))
    }

    /// Mark a generation revoked
    pub fn revoke(&mut self, id: GenerationId) -> KeyResult<()> {
        if id == self.active_generation_id {
            return Err(KeyError::Rotation(format!(
                "cannot revoke active generation {}, rotate first",
                id
            )));
        }
        let info = self
            .generations
            .get_mut(&id)
            .ok_or(KeyError::UnknownGeneration(id))?;
        info.revoked = true;
        Ok(())
    }

    /// Check structural consistency of a record read from disk
    pub fn validate(&self) -> KeyResult<()> {
        for (id, info) in &self.generations {
            if *id == UNINITIALIZED || info.id != *id {
                return Err(KeyError::CorruptMetadata(format!(
                    "generation entry {} has id {}",
                    id, info.id
                )));
            }
        }

        if !self.is_initialized() {
            if !self.generations.is_empty() {
                return Err(KeyError::CorruptMetadata(
                    "generations present but no active generation".to_string(),
                ));
            }
            return Ok(());
        }

        if self.active_info().is_none() {
            return Err(KeyError::CorruptMetadata(format!(
                "active generation {} is not listed",
                self.active_generation_id
            )));
        }
        Ok(())
    }
}
