//! Keypair generation for ledger senders.
//!
//! Prints a fresh secp256k1 keypair as hex, and optionally drops the public
//! half into a key directory under the given key reference so the in-process
//! registry can resolve it.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use gateway_log_agent::crypto::EcdsaVerifier;

#[derive(Parser)]
#[command(name = "keygen")]
#[command(about = "Generate a secp256k1 keypair for a ledger sender")]
struct Cli {
    /// Key reference id to register the public key under
    #[arg(long)]
    key_ref: Option<String>,

    /// Key directory to write <key_ref>.pub into
    #[arg(long)]
    key_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let verifier = EcdsaVerifier::new();
    let (secret_hex, public_hex) = verifier.generate_keypair();

    println!("secret key: {}", secret_hex);
    println!("public key: {}", public_hex);

    if let (Some(key_ref), Some(key_dir)) = (cli.key_ref, cli.key_dir) {
        std::fs::create_dir_all(&key_dir)?;
        let path = key_dir.join(format!("{}.pub", key_ref));
        std::fs::write(&path, &public_hex)?;
        println!("public key written to {}", path.display());
    }

    Ok(())
}
