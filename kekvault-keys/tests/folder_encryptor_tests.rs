//! Folder Key Encryptor Integration Tests

use kekvault_keys::folder::HEADER_LEN;
use kekvault_keys::{
    FolderKeyEncryptor, FolderStoreOptions, KeyEncryptor, KeyError, KeyMaterial, PassphraseParams,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn fast_kdf() -> PassphraseParams {
    PassphraseParams {
        memory_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

fn options(dir: &Path, passphrase: &str) -> FolderStoreOptions {
    FolderStoreOptions::new(dir)
        .with_passphrase(passphrase)
        .with_kdf_params(fast_kdf())
}

async fn open(dir: &Path, passphrase: &str) -> FolderKeyEncryptor {
    FolderKeyEncryptor::open(options(dir, passphrase)).await.unwrap()
}

fn header(blob: &[u8]) -> u32 {
    u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]])
}

fn folder_entries(dir: &Path) -> BTreeSet<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn test_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let encryptor = open(dir.path(), "pw").await;

    for _ in 0..5 {
        let dek = KeyMaterial::generate();
        let blob = encryptor.wrap(&dek).await.unwrap();
        assert_eq!(encryptor.unwrap(&blob).await.unwrap(), dek);
    }
}

#[tokio::test]
async fn test_wrap_is_not_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let encryptor = open(dir.path(), "").await;

    let dek = KeyMaterial::generate();
    let first = encryptor.wrap(&dek).await.unwrap();
    let second = encryptor.wrap(&dek).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(encryptor.unwrap(&first).await.unwrap(), dek);
    assert_eq!(encryptor.unwrap(&second).await.unwrap(), dek);
}

#[tokio::test]
async fn test_fresh_folder_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let encryptor = open(dir.path(), "pw").await;
    assert_eq!(encryptor.active_generation().await, 1);

    let dek = KeyMaterial::generate();
    let old_blob = encryptor.wrap(&dek).await.unwrap();
    assert_eq!(&old_blob[..HEADER_LEN], &[1u8, 0, 0, 0]);

    assert_eq!(encryptor.rotate().await.unwrap(), 2);
    assert_eq!(encryptor.active_generation().await, 2);

    assert_eq!(encryptor.unwrap(&old_blob).await.unwrap(), dek);
    let new_blob = encryptor.wrap(&dek).await.unwrap();
    assert_eq!(header(&new_blob), 2);
    assert_eq!(encryptor.unwrap(&new_blob).await.unwrap(), dek);
}

#[tokio::test]
async fn test_rotation_preserves_history_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let k1 = KeyMaterial::generate();
    let k2 = KeyMaterial::generate();

    let (blob1, blob2) = {
        let encryptor = open(dir.path(), "pw").await;
        let blob1 = encryptor.wrap(&k1).await.unwrap();
        encryptor.rotate().await.unwrap();
        let blob2 = encryptor.wrap(&k2).await.unwrap();
        (blob1, blob2)
    };
    assert_ne!(header(&blob1), header(&blob2));

    let reopened = open(dir.path(), "pw").await;
    assert_eq!(reopened.active_generation().await, 2);
    assert_eq!(reopened.unwrap(&blob1).await.unwrap(), k1);
    assert_eq!(reopened.unwrap(&blob2).await.unwrap(), k2);

    let generations = reopened.generations().await;
    assert_eq!(generations.iter().map(|g| g.id).collect::<Vec<_>>(), vec![1, 2]);
    assert!(generations.iter().all(|g| g.encrypted && !g.revoked));
}

#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    {
        let encryptor = open(dir.path(), "").await;
        encryptor.rotate().await.unwrap();
    }
    let entries = folder_entries(dir.path());
    let info = std::fs::read(dir.path().join("info")).unwrap();

    for _ in 0..2 {
        let encryptor = open(dir.path(), "").await;
        assert_eq!(encryptor.active_generation().await, 2);
    }

    assert_eq!(folder_entries(dir.path()), entries);
    assert_eq!(std::fs::read(dir.path().join("info")).unwrap(), info);
}

#[tokio::test]
async fn test_fresh_folder_layout() {
    let dir = tempfile::tempdir().unwrap();
    let _encryptor = open(dir.path(), "").await;

    let expected: BTreeSet<String> = ["1.key", "info"].iter().map(|s| s.to_string()).collect();
    assert_eq!(folder_entries(dir.path()), expected);

    let info: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("info")).unwrap()).unwrap();
    assert_eq!(info["activeGenerationId"], 1);
    assert_eq!(info["generations"]["1"]["encrypted"], false);
}

#[tokio::test]
async fn test_at_rest_protection_with_passphrase() {
    let dir = tempfile::tempdir().unwrap();
    let encryptor = open(dir.path(), "correct horse").await;
    assert!(encryptor.protects_at_rest());

    let on_disk = std::fs::read(dir.path().join("1.key")).unwrap();
    assert!(KeyMaterial::deserialize(&on_disk).is_err());
    assert_ne!(on_disk.len(), KeyMaterial::generate().serialize().len());
}

#[tokio::test]
async fn test_no_passphrase_stores_plain_key() {
    let dir = tempfile::tempdir().unwrap();
    let encryptor = open(dir.path(), "").await;
    assert!(!encryptor.protects_at_rest());

    let on_disk = std::fs::read(dir.path().join("1.key")).unwrap();
    let stored = KeyMaterial::deserialize(&on_disk).unwrap();
    assert_eq!(stored.serialize().to_vec(), on_disk);
    assert_eq!(stored.fingerprint(), encryptor.active_fingerprint().await);
}

#[tokio::test]
async fn test_wrong_passphrase_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        open(dir.path(), "right").await;
    }

    let result = FolderKeyEncryptor::open(options(dir.path(), "wrong")).await;
    assert!(matches!(result, Err(KeyError::AtRestDecryptionFailed(1))));
}

#[tokio::test]
async fn test_tampered_plain_key_file_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let dek = KeyMaterial::generate();
    let blob = {
        let encryptor = open(dir.path(), "").await;
        let blob = encryptor.wrap(&dek).await.unwrap();
        encryptor.rotate().await.unwrap();
        blob
    };

    let path = dir.path().join("1.key");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[5] ^= 0xff;
    std::fs::write(&path, &bytes).unwrap();

    let encryptor = open(dir.path(), "").await;
    let result = encryptor.unwrap(&blob).await;
    assert!(matches!(
        result,
        Err(KeyError::Decryption(_)) | Err(KeyError::DeserializationFailed(_))
    ));
}

#[tokio::test]
async fn test_tampered_protected_key_file_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let dek = KeyMaterial::generate();
    let blob = {
        let encryptor = open(dir.path(), "pw").await;
        let blob = encryptor.wrap(&dek).await.unwrap();
        encryptor.rotate().await.unwrap();
        blob
    };

    let path = dir.path().join("1.key");
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    let encryptor = open(dir.path(), "pw").await;
    let result = encryptor.unwrap(&blob).await;
    assert!(matches!(result, Err(KeyError::AtRestDecryptionFailed(1))));
}

#[tokio::test]
async fn test_tampered_kdf_header_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let dek = KeyMaterial::generate();
    let blob = {
        let encryptor = open(dir.path(), "pw").await;
        let blob = encryptor.wrap(&dek).await.unwrap();
        encryptor.rotate().await.unwrap();
        blob
    };

    // high byte of the stored Argon2 time cost
    let path = dir.path().join("1.key");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[7] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    let encryptor = open(dir.path(), "pw").await;
    let result = tokio::time::timeout(Duration::from_secs(10), encryptor.unwrap(&blob))
        .await
        .expect("unwrap did not finish");
    assert!(matches!(result, Err(KeyError::AtRestDecryptionFailed(1))));
}

#[tokio::test]
async fn test_tampered_blob_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let encryptor = open(dir.path(), "").await;

    let mut blob = encryptor.wrap(&KeyMaterial::generate()).await.unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0x01;

    assert!(matches!(encryptor.unwrap(&blob).await, Err(KeyError::Decryption(_))));
}

#[tokio::test]
async fn test_malformed_blob() {
    let dir = tempfile::tempdir().unwrap();
    let encryptor = open(dir.path(), "").await;

    let short: [&[u8]; 3] = [&[], &[1], &[1, 0, 0]];
    for blob in short {
        assert!(matches!(
            encryptor.unwrap(blob).await,
            Err(KeyError::MalformedBlob(_))
        ));
    }
    assert!(matches!(
        encryptor.unwrap(&[0, 0, 0, 0, 1, 2, 3]).await,
        Err(KeyError::MalformedBlob(_))
    ));
}

#[tokio::test]
async fn test_malformed_blob_does_no_io() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("keys");
    let encryptor = open(&folder, "").await;

    std::fs::remove_dir_all(&folder).unwrap();
    assert!(matches!(
        encryptor.unwrap(&[7, 0]).await,
        Err(KeyError::MalformedBlob(_))
    ));
}

#[tokio::test]
async fn test_unknown_generation() {
    let dir = tempfile::tempdir().unwrap();
    let encryptor = open(dir.path(), "").await;

    let mut blob = encryptor.wrap(&KeyMaterial::generate()).await.unwrap();
    blob[..HEADER_LEN].copy_from_slice(&9u32.to_le_bytes());

    assert!(matches!(
        encryptor.unwrap(&blob).await,
        Err(KeyError::UnknownGeneration(9))
    ));
}

#[tokio::test]
async fn test_missing_key_file() {
    let dir = tempfile::tempdir().unwrap();
    let blob = {
        let encryptor = open(dir.path(), "").await;
        let blob = encryptor.wrap(&KeyMaterial::generate()).await.unwrap();
        encryptor.rotate().await.unwrap();
        blob
    };
    std::fs::remove_file(dir.path().join("1.key")).unwrap();

    let encryptor = open(dir.path(), "").await;
    assert!(matches!(
        encryptor.unwrap(&blob).await,
        Err(KeyError::KeyFileMissing(1))
    ));
}

#[tokio::test]
async fn test_missing_active_key_file_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    {
        open(dir.path(), "").await;
    }
    std::fs::remove_file(dir.path().join("1.key")).unwrap();

    let result = FolderKeyEncryptor::open(options(dir.path(), "")).await;
    assert!(matches!(result, Err(KeyError::KeyFileMissing(1))));
}

#[tokio::test]
async fn test_corrupt_metadata_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("info"), b"garbage").unwrap();

    let result = FolderKeyEncryptor::open(options(dir.path(), "")).await;
    assert!(matches!(result, Err(KeyError::CorruptMetadata(_))));
}

#[tokio::test]
async fn test_stray_key_file_does_not_block_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let dek = KeyMaterial::generate();
    let blob = {
        let encryptor = open(dir.path(), "").await;
        encryptor.wrap(&dek).await.unwrap()
    };
    // partial write from a rotation that never reached the metadata save
    std::fs::write(dir.path().join("2.key"), b"\x01part").unwrap();

    let encryptor = open(dir.path(), "").await;
    assert_eq!(encryptor.rotate().await.unwrap(), 2);
    assert_eq!(encryptor.active_generation().await, 2);
    assert_eq!(std::fs::read(dir.path().join("2.key")).unwrap().len(), 33);

    let fresh = KeyMaterial::generate();
    let new_blob = encryptor.wrap(&fresh).await.unwrap();
    assert_eq!(header(&new_blob), 2);

    let reopened = open(dir.path(), "").await;
    assert_eq!(reopened.unwrap(&new_blob).await.unwrap(), fresh);
    assert_eq!(reopened.unwrap(&blob).await.unwrap(), dek);
}

#[tokio::test]
async fn test_stray_protected_key_file_does_not_block_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let encryptor = open(dir.path(), "pw").await;
    std::fs::write(dir.path().join("2.key"), [0u8; 7]).unwrap();

    assert_eq!(encryptor.rotate().await.unwrap(), 2);
    let dek = KeyMaterial::generate();
    let blob = encryptor.wrap(&dek).await.unwrap();
    assert_eq!(open(dir.path(), "pw").await.unwrap(&blob).await.unwrap(), dek);
}

#[tokio::test]
async fn test_revoked_generation_still_unwraps() {
    let dir = tempfile::tempdir().unwrap();
    let encryptor = open(dir.path(), "").await;

    let dek = KeyMaterial::generate();
    let blob = encryptor.wrap(&dek).await.unwrap();
    encryptor.rotate().await.unwrap();

    assert!(matches!(encryptor.revoke(2).await, Err(KeyError::Rotation(_))));
    encryptor.revoke(1).await.unwrap();
    assert_eq!(encryptor.unwrap(&blob).await.unwrap(), dek);

    let reopened = open(dir.path(), "").await;
    let generations = reopened.generations().await;
    assert!(generations[0].revoked);
    assert!(!generations[1].revoked);
}

#[tokio::test]
async fn test_mixed_protection_across_generations() {
    let dir = tempfile::tempdir().unwrap();
    let dek = KeyMaterial::generate();
    let plain_blob = {
        let encryptor = open(dir.path(), "").await;
        encryptor.wrap(&dek).await.unwrap()
    };

    let encryptor = open(dir.path(), "pw").await;
    assert_eq!(encryptor.rotate().await.unwrap(), 2);

    let generations = encryptor.generations().await;
    assert!(!generations[0].encrypted);
    assert!(generations[1].encrypted);

    let reopened = open(dir.path(), "pw").await;
    assert_eq!(reopened.unwrap(&plain_blob).await.unwrap(), dek);
}

#[tokio::test]
async fn test_concurrent_wrap_unwrap_during_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let encryptor = Arc::new(open(dir.path(), "").await);

    let mut handles = Vec::new();
    for i in 0..16 {
        let encryptor = Arc::clone(&encryptor);
        handles.push(tokio::spawn(async move {
            if i % 4 == 0 {
                encryptor.rotate().await.unwrap();
            }
            let dek = KeyMaterial::generate();
            let blob = encryptor.wrap(&dek).await.unwrap();
            assert_eq!(encryptor.unwrap(&blob).await.unwrap(), dek);
            header(&blob)
        }));
    }

    for handle in handles {
        let generation = handle.await.unwrap();
        assert!((1..=5).contains(&generation));
    }
    assert_eq!(encryptor.active_generation().await, 5);
    assert_eq!(encryptor.generations().await.len(), 5);
}
