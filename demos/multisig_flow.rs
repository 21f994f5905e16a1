//! Example: Complete multisig flow
//!
//! This example creates a two-member group on a local validator, funds its protected account,
//! proposes a transfer out of it and approves the proposal until it executes.
//!
//! The multisig program must already be deployed and recorded in `store/config.json`
//! (see the `deploy_program` example).
//!
//! To run this example:
//! ```
//! cargo run --example multisig_flow --features async
//! ```

use solana_sdk::{signature::Keypair, signer::Signer};
use weighted_multisig_client::{
    client::MultisigClient, loader::LoaderTransport, ClientConfig, GroupData, GroupMember,
    Proposition,
};

const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("Weighted Multisig Client Example: Complete Flow\n");

    let config = ClientConfig::load("store/config.json")?;
    let client = MultisigClient::from_config(&config);
    println!("Program: {}", client.program_id);

    let alice = Keypair::new();
    let bob = Keypair::new();
    for member in [&alice, &bob] {
        let sig = client.rpc.request_airdrop(&member.pubkey(), 2 * LAMPORTS_PER_SOL).await?;
        client.confirm(&sig).await?;
    }
    println!("Members funded: {} {}", alice.pubkey(), bob.pubkey());

    // Step 1: create the group
    let group = GroupData::new(
        vec![GroupMember::new(alice.pubkey(), 1), GroupMember::new(bob.pubkey(), 1)],
        2,
    );
    let (group_pda, protected) = client.create_group(&alice, group, None).await?;
    println!("\nStep 1: group {} with protected account {}", group_pda, protected);

    // Step 2: fund the protected account so it has something to transfer
    let sig = client.rpc.request_airdrop(&protected, LAMPORTS_PER_SOL).await?;
    client.confirm(&sig).await?;
    println!("Step 2: protected account funded");

    // Step 3: propose a transfer back to bob
    let proposition = Proposition::Transfer {
        destination: bob.pubkey(),
        amount: LAMPORTS_PER_SOL / 2,
    };
    let proposal = client.propose_action(&alice, &group_pda, &proposition).await?;
    println!("Step 3: proposal {}", proposal);

    for (address, pending) in client.get_proposals(&group_pda).await? {
        println!(
            "  pending {}: weight {} from {} approval(s)",
            address,
            pending.state.current_weight,
            pending.state.approvals()
        );
    }

    // Step 4: the author's weight already counts, bob's approval reaches the threshold
    let sig = client.approve(&bob, &proposal).await?;
    println!("Step 4: {} approved ({})", bob.pubkey(), sig);

    match client.get_proposal(&proposal).await {
        Err(e) if e.is_closed_account() => println!("\nProposal executed and finalized"),
        Ok(data) => println!("\nProposal still pending with weight {}", data.state.current_weight),
        Err(e) => return Err(e.into()),
    }

    let groups = client.get_groups(&bob.pubkey()).await?;
    println!("Bob belongs to {} group(s)", groups.len());

    Ok(())
}
