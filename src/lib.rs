//! # Weighted Multisig Client
//!
//! A Rust client library for the weighted multisig program on Solana.
//! Groups of members with individual weights control a protected vault account; any member can
//! propose a bundle of instructions, and once the accumulated weight of approving members reaches
//! the group threshold the program executes them on behalf of the vault.
//!
//! ## Features
//!
//! - **Content-Addressed Accounts**: group and proposal addresses are derived from a hash of their
//!   own encoded content, so any party can recompute them without a registry
//! - **Byte-Exact Codecs**: Borsh schemas matching the on-chain account and instruction layouts
//! - **Instruction Builders**: init, propose, approve and close with the account ordering the
//!   program expects
//! - **Propositions**: high-level actions (transfers, upgrades, token operations) resolved into
//!   instructions signed by the protected vault
//! - **Chunked Loader**: uploads program bytecode to an upgradeable loader buffer, sequentially or
//!   concurrently
//! - **Async Support**: Optional RPC-backed client behind the `async` feature
//!
//! ## Usage
//!
//! ```rust
//! use weighted_multisig_client::{pda, GroupData, GroupMember};
//! use solana_sdk::pubkey::Pubkey;
//!
//! let program_id = Pubkey::new_unique();
//! let group = GroupData::new(
//!     vec![
//!         GroupMember::new(Pubkey::new_unique(), 1),
//!         GroupMember::new(Pubkey::new_unique(), 1),
//!     ],
//!     2,
//! );
//! let (group_pda, _bump) = pda::get_group_pda(&group, &program_id).unwrap();
//! let (vault_pda, _bump) = pda::get_protected_pda(&group_pda, &program_id);
//! ```

pub mod accounts;
pub mod codec;
pub mod config;
pub mod error;
pub mod instructions;
pub mod loader;
pub mod pda;
pub mod proposition;
pub mod types;

#[cfg(feature = "async")]
pub mod client;

// Re-export commonly used types
#[cfg(feature = "async")]
pub use client::MultisigClient;
pub use accounts::{AccountType, GroupData, ProposalConfig, ProposalData, ProposalState};
pub use config::ClientConfig;
pub use error::{MultisigError, MultisigResult};
pub use instructions::{
    ApproveInstruction, CloseProposalInstruction, InitInstruction, InstructionData,
    ProposeInstruction,
};
pub use proposition::{Proposition, PropositionKind};
pub use types::{GroupMember, ProposedAccountMeta, ProposedInstruction, ProtectedAccountConfig};

/// Maximum number of group members; approvals are tracked in a `u64` bitmask
pub const MAX_MEMBERS: usize = 64;

/// Domain-separation tags prepended to every PDA seed list
pub mod seeds {
    pub const PDA_TAG_GROUP: &[u8] = &[0];
    pub const PDA_TAG_PROPOSAL: &[u8] = &[1];
    pub const PDA_TAG_PROTECTED: &[u8] = &[2];
}
