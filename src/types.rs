//! Core types for the weighted multisig protocol
//!
//! This module defines the building blocks shared by accounts and instructions: group members,
//! the optional protected account configuration, and the program-agnostic instruction capsule
//! stored inside proposals.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

/// A member of a group
///
/// The member's weight counts towards the group threshold when they approve a proposal.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct GroupMember {
    /// Public key of the member
    pub public_key: Pubkey,
    /// Approval weight of the member
    pub weight: u32,
}

impl GroupMember {
    /// Create a new member with the given weight
    pub fn new(public_key: Pubkey, weight: u32) -> Self {
        Self { public_key, weight }
    }
}

/// Parameters of the protected (vault) account created alongside a group
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProtectedAccountConfig {
    /// Amount of lamports to fund the protected account
    pub lamports: u64,
    /// Amount of space to allocate for the protected account
    pub space: u64,
    /// Program to be set as the owner of the protected account
    pub owner: Pubkey,
}

/// One account reference inside a proposed instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProposedAccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl From<&AccountMeta> for ProposedAccountMeta {
    fn from(meta: &AccountMeta) -> Self {
        Self {
            pubkey: meta.pubkey,
            is_signer: meta.is_signer,
            is_writable: meta.is_writable,
        }
    }
}

impl From<&ProposedAccountMeta> for AccountMeta {
    fn from(meta: &ProposedAccountMeta) -> Self {
        AccountMeta {
            pubkey: meta.pubkey,
            is_signer: meta.is_signer,
            is_writable: meta.is_writable,
        }
    }
}

/// A self-describing instruction stored in a proposal and executed by the program once approved
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProposedInstruction {
    /// Program to invoke
    pub program_id: Pubkey,
    /// Accounts passed to the program, in order
    pub accounts: Vec<ProposedAccountMeta>,
    /// Opaque instruction data
    pub data: Vec<u8>,
}

impl ProposedInstruction {
    /// Whether any of the instruction's accounts is `key`
    pub fn references(&self, key: &Pubkey) -> bool {
        self.accounts.iter().any(|meta| &meta.pubkey == key)
    }
}

impl From<Instruction> for ProposedInstruction {
    fn from(instruction: Instruction) -> Self {
        Self {
            program_id: instruction.program_id,
            accounts: instruction.accounts.iter().map(Into::into).collect(),
            data: instruction.data,
        }
    }
}

impl From<&ProposedInstruction> for Instruction {
    fn from(proposed: &ProposedInstruction) -> Self {
        Instruction {
            program_id: proposed.program_id,
            accounts: proposed.accounts.iter().map(Into::into).collect(),
            data: proposed.data.clone(),
        }
    }
}
