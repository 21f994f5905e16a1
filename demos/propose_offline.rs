//! Example: Building multisig instructions offline
//!
//! This example builds init, propose, approve and close instructions without touching the
//! network, then decodes the payloads back to show what the program will receive.
//!
//! To run this example:
//! ```
//! cargo run --example propose_offline
//! ```

use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use weighted_multisig_client::{
    instructions, pda, GroupData, InitInstruction, InstructionData, ProposalConfig,
    PropositionKind, Proposition, ProposeInstruction,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("Weighted Multisig Client Example: Offline Proposal\n");

    let program_id = Pubkey::new_unique();
    let alice = Keypair::new();
    let bob = Keypair::new();

    // Parse the group the way the command line receives it
    let members = format!("{}:1,{}:1", alice.pubkey(), bob.pubkey());
    let group = GroupData::from_member_list(&members, 2)?;
    let (group_pda, _) = pda::get_group_pda(&group, &program_id)?;
    let (protected, _) = pda::get_protected_pda(&group_pda, &program_id);
    println!("Group: {}", group_pda);
    println!("Protected: {}\n", protected);

    let init_ix = instructions::init(
        &alice.pubkey(),
        InitInstruction {
            group_data: group.clone(),
            lamports: 1_000_000,
            protected_account_config: None,
        },
        &program_id,
    )?;
    println!(
        "Init instruction: {} accounts, {} data bytes",
        init_ix.accounts.len(),
        init_ix.data.len()
    );

    // Kind names come from the command line
    let kind: PropositionKind = "transfer".parse()?;
    println!("\nProposing `{}`", kind);
    let proposition = Proposition::Transfer {
        destination: bob.pubkey(),
        amount: 500_000,
    };
    let propose = ProposeInstruction {
        instructions: proposition.resolve_proposed(&program_id, &protected)?,
        lamports: 2_000_000,
        salt: 1000,
    };
    let config = ProposalConfig::new(group_pda, alice.pubkey(), &propose);
    let (proposal, _) = pda::get_proposal_pda(&config, &program_id)?;

    let propose_ix = instructions::propose(&alice.pubkey(), &group_pda, propose, &program_id)?;
    println!("Proposal: {}", proposal);
    for (i, meta) in propose_ix.accounts.iter().enumerate() {
        println!(
            "  [{}] {} signer={} writable={}",
            i, meta.pubkey, meta.is_signer, meta.is_writable
        );
    }

    if let InstructionData::Propose(decoded) = InstructionData::decode(&propose_ix.data)? {
        println!(
            "Decoded propose payload: {} instruction(s), salt {}",
            decoded.instructions.len(),
            decoded.salt
        );
    }

    let approve_ix = instructions::approve(&bob.pubkey(), &proposal, &config, &program_id)?;
    println!("\nApprove instruction: {} accounts", approve_ix.accounts.len());

    let close_ix =
        instructions::close_proposal(&alice.pubkey(), &proposal, &alice.pubkey(), &program_id)?;
    println!("Close instruction: {} accounts", close_ix.accounts.len());

    println!("\nAll instructions built successfully!");
    Ok(())
}
