//! Administration tool for a KEK vault key folder
//!
//! Usage:
//!   kekvault-admin status
//!   kekvault-admin rotate
//!   kekvault-admin revoke <generation>
//!
//! The folder and passphrase come from `KEK_FOLDER` / `KEK_PASSPHRASE`.
//! Run it only while no other process is rotating the same folder.

use anyhow::{bail, Context};
use kekvault_config::KekConfig;
use kekvault_keys::{open_folder_encryptor, FolderKeyEncryptor, GenerationId};
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = KekConfig::from_env().context("Failed to load KEK_* configuration")?;
    kekvault_logging::init_from_config("kekvault-admin", &config)?;

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("status");

    let encryptor = open_folder_encryptor(&config)
        .await
        .with_context(|| format!("Failed to open key folder {}", config.folder.display()))?;

    match command {
        "status" => print_status(&encryptor).await,
        "rotate" => {
            let previous = encryptor.active_generation().await;
            let generation = encryptor.rotate().await.context("Rotation failed")?;
            info!(previous = previous, generation = generation, "Rotated master key");
            println!("✅ Rotated master key: generation {} -> {}", previous, generation);
            println!();
            print_status(&encryptor).await;
        }
        "revoke" => {
            let generation: GenerationId = args
                .get(1)
                .context("revoke needs a generation id")?
                .parse()
                .context("generation id must be a positive integer")?;
            encryptor.revoke(generation).await?;
            println!("✅ Marked generation {} revoked (existing blobs still unwrap)", generation);
        }
        other => bail!("Unknown command '{}', expected status, rotate or revoke", other),
    }

    Ok(())
}

async fn print_status(encryptor: &FolderKeyEncryptor) {
    println!("🔐 Key folder: {}", encryptor.folder().display());
    println!("{}", "=".repeat(50));
    println!(
        "Active generation: {} (fingerprint {})",
        encryptor.active_generation().await,
        encryptor.active_fingerprint().await
    );
    println!(
        "Protected at rest: {}",
        if encryptor.protects_at_rest() { "yes" } else { "no" }
    );
    println!();

    for info in encryptor.generations().await {
        println!(
            "  {:>4}  {}  encrypted={:<5}  revoked={}",
            info.id,
            info.created_at.to_rfc3339(),
            info.encrypted,
            info.revoked
        );
    }
}
