//! Service integration helpers for building key encryptors from configuration
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


use crate::data_keys::DataKeyService;
use crate::developer::DeveloperKeyEncryptor;
use crate::encryptor::KeyEncryptor;
use crate::error::KeyResult;
use crate::folder::{FolderKeyEncryptor, FolderStoreOptions};
use kekvault_config::{EncryptorMode, KekConfig};
use std::sync::Arc;
use tracing::{info, warn};

/// Folder options derived from the service configuration
pub fn folder_options(config: &KekConfig) -> FolderStoreOptions {
    let options = FolderStoreOptions::new(&config.folder);
    match config.passphrase() {
        Some(passphrase) => options.with_passphrase(passphrase),
        None => options,
    }
}

/// Open the folder key encryptor named by the configuration
pub async fn open_folder_encryptor(config: &KekConfig) -> KeyResult<FolderKeyEncryptor> {
    if config.passphrase().is_none() {
        warn!(
            folder = %config.folder.display(),
            "No KEK_PASSPHRASE set, new master keys will be stored unprotected"
        );
    }
    FolderKeyEncryptor::open(folder_options(config)).await
}

/// Initialize the key encryptor selected by `KEK_MODE`
pub async fn init_key_encryptor(config: &KekConfig) -> KeyResult<Arc<dyn KeyEncryptor>> {
    info!(
        folder = %config.folder.display(),
        mode = ?config.mode,
        "Initializing key encryptor"
    );

    let encryptor: Arc<dyn KeyEncryptor> = match config.mode {
        EncryptorMode::Folder => Arc::new(open_folder_encryptor(config).await?),
        EncryptorMode::Developer => Arc::new(DeveloperKeyEncryptor::open(&config.folder).await?),
    };
    Ok(encryptor)
}

/// Initialize a data key service for a service
pub async fn init_data_key_service(config: &KekConfig) -> KeyResult<DataKeyService> {
    Ok(DataKeyService::new(init_key_encryptor(config).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(folder: &std::path::Path, mode: &str, passphrase: &str) -> KekConfig {
        let mut vars = HashMap::new();
        vars.insert("KEK_FOLDER".to_string(), folder.display().to_string());
        vars.insert("KEK_MODE".to_string(), mode.to_string());
        vars.insert("KEK_PASSPHRASE".to_string(), passphrase.to_string());
        KekConfig::from_vars(vars).unwrap()
    }

    #[test]
    fn test_folder_options_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        assert!(folder_options(&config(dir.path(), "folder", "pw")).passphrase.is_some());
        assert!(folder_options(&config(dir.path(), "folder", "")).passphrase.is_none());
    }

    #[tokio::test]
    async fn test_init_folder_mode() {
        let dir = tempfile::tempdir().unwrap();
        let encryptor = init_key_encryptor(&config(dir.path(), "folder", "")).await.unwrap();

        assert_eq!(encryptor.backend_name(), "folder");
        assert!(dir.path().join("info").exists());
        assert!(dir.path().join("1.key").exists());
    }

    #[tokio::test]
    async fn test_init_developer_mode() {
        let dir = tempfile::tempdir().unwrap();
        let service = init_data_key_service(&config(dir.path(), "developer", ""))
            .await
            .unwrap();

        assert_eq!(service.backend().backend_name(), "developer");
        let data_key = service.generate_data_key().await.unwrap();
        assert_eq!(service.decrypt_data_key(&data_key.wrapped).await.unwrap(), data_key.key);
    }
}
