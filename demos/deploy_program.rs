//! Example: Deploying a program with the chunked loader
//!
//! This example uploads a compiled program to a local validator through the upgradeable loader
//! and makes the multisig program's config point at it.
//!
//! To run this example:
//! ```
//! cargo run --example deploy_program --features async -- path/to/program.so [--concurrent]
//! ```

use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use weighted_multisig_client::{
    client::MultisigClient,
    config::{ClientConfig, DEFAULT_URL},
    loader::{self, DeliveryMode, LoaderTransport},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("Weighted Multisig Client Example: Deploy Program\n");

    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("usage: deploy_program <program.so> [--concurrent]")?;
    let mode = if args.any(|a| a == "--concurrent") {
        DeliveryMode::Concurrent
    } else {
        DeliveryMode::Sequential
    };

    let data = std::fs::read(&path)?;
    println!("Program: {} ({} bytes)", path, data.len());
    println!(
        "At least {} signatures will be paid for",
        loader::min_num_signatures(data.len())
    );

    let client = MultisigClient::new(DEFAULT_URL.to_string(), Pubkey::default());

    // Fund a fresh payer on the local validator
    let payer = Keypair::new();
    let airdrop = client.rpc.request_airdrop(&payer.pubkey(), 10_000_000_000).await?;
    client.confirm(&airdrop).await?;
    println!("Payer funded: {}", payer.pubkey());

    let program = Keypair::new();
    let program_id = client
        .deploy_program(&payer, &payer, &program, &data, mode)
        .await?;
    println!("\nProgram deployed to {}", program_id);

    let config = ClientConfig::localnet(program_id);
    config.save("store/config.json")?;
    println!("Saved store/config.json");

    Ok(())
}
