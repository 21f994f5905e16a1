//! Program Derived Address (PDA) utilities for the weighted multisig protocol
//!
//! Group and proposal addresses are content addressed: their seeds are a domain-separation tag
//! followed by the SHA-256 of the account's own encoded configuration. The protected vault is
//! derived from the group address. Bump search is delegated to `find_program_address`.

use solana_sdk::pubkey::Pubkey;

use crate::{
    accounts::{GroupData, ProposalConfig},
    codec,
    error::{MultisigError, MultisigResult},
    seeds::*,
};

/// Get the group PDA for a group configuration
///
/// # Arguments
/// * `group` - Members and threshold of the group
/// * `program_id` - The multisig program ID
///
/// # Returns
/// Tuple of (PDA pubkey, bump seed)
pub fn get_group_pda(group: &GroupData, program_id: &Pubkey) -> MultisigResult<(Pubkey, u8)> {
    let digest = codec::content_hash(group)?;
    Ok(Pubkey::find_program_address(
        &[PDA_TAG_GROUP, digest.as_ref()],
        program_id,
    ))
}

/// Get the protected (vault) PDA owned by a group
///
/// # Arguments
/// * `group_pda` - The group account public key
/// * `program_id` - The multisig program ID
///
/// # Returns
/// Tuple of (PDA pubkey, bump seed)
pub fn get_protected_pda(group_pda: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[PDA_TAG_PROTECTED, group_pda.as_ref()], program_id)
}

/// Get the proposal PDA for a proposal configuration
///
/// The salt is part of the hashed configuration, so proposals with identical instructions get
/// distinct addresses as long as the caller picks distinct salts.
///
/// # Arguments
/// * `config` - Group, instructions, author and salt of the proposal
/// * `program_id` - The multisig program ID
///
/// # Returns
/// Tuple of (PDA pubkey, bump seed)
pub fn get_proposal_pda(
    config: &ProposalConfig,
    program_id: &Pubkey,
) -> MultisigResult<(Pubkey, u8)> {
    let digest = codec::content_hash(config)?;
    Ok(Pubkey::find_program_address(
        &[PDA_TAG_PROPOSAL, digest.as_ref()],
        program_id,
    ))
}

/// Get the program data PDA the upgradeable loader keeps for a deployed program
pub fn get_program_data_pda(program: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[program.as_ref()], &solana_sdk_ids::bpf_loader_upgradeable::ID)
}

/// Address of a token account created from the protected vault with a seed
pub fn get_token_account_with_seed(protected: &Pubkey, seed: &str) -> MultisigResult<Pubkey> {
    Pubkey::create_with_seed(protected, seed, &spl_token_interface::ID)
        .map_err(|e| MultisigError::InvalidArgument(format!("token account seed `{seed}`: {e}")))
}
