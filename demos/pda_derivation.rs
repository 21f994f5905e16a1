//! Example: PDA Derivation
//!
//! This example demonstrates how group, protected and proposal addresses are derived from the
//! content of the accounts themselves.
//!
//! To run this example:
//! ```
//! cargo run --example pda_derivation
//! ```

use solana_sdk::pubkey::Pubkey;
use weighted_multisig_client::{
    pda, GroupData, GroupMember, ProposalConfig, Proposition, ProposeInstruction,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Weighted Multisig Client Example: PDA Derivation\n");

    let program_id = Pubkey::new_unique();
    println!("Program ID: {}\n", program_id);

    // Two members of weight 1, both must approve
    let alice = Pubkey::new_unique();
    let bob = Pubkey::new_unique();
    let group = GroupData::new(vec![GroupMember::new(alice, 1), GroupMember::new(bob, 1)], 2);
    group.validate()?;

    let (group_pda, group_bump) = pda::get_group_pda(&group, &program_id)?;
    println!("Group PDA:");
    println!("  Address: {}", group_pda);
    println!("  Bump: {}", group_bump);
    println!("  Account space: {} bytes\n", group.account_space()?);

    let (protected_pda, protected_bump) = pda::get_protected_pda(&group_pda, &program_id);
    println!("Protected PDA:");
    println!("  Address: {}", protected_pda);
    println!("  Bump: {}\n", protected_bump);

    // Same proposal content, two salts
    let instructions = Proposition::Transfer {
        destination: Pubkey::new_unique(),
        amount: 1_000_000,
    }
    .resolve_proposed(&program_id, &protected_pda)?;

    for salt in [1000u64, 2000] {
        let propose = ProposeInstruction {
            instructions: instructions.clone(),
            lamports: 0,
            salt,
        };
        let config = ProposalConfig::new(group_pda, alice, &propose);
        let (proposal_pda, proposal_bump) = pda::get_proposal_pda(&config, &program_id)?;
        println!("Proposal PDA (salt {}):", salt);
        println!("  Address: {}", proposal_pda);
        println!("  Bump: {}", proposal_bump);
        println!("  Account space: {} bytes\n", config.account_space()?);
    }

    println!("All PDAs derived successfully!");
    Ok(())
}
