//! Instruction builders for the weighted multisig protocol
//!
//! This module provides functions to build Solana instructions for the multisig program's four
//! operations. Each function derives the accounts it needs, lays them out in the exact order the
//! program reads them and encodes the tagged [`InstructionData`] payload.

use borsh::{BorshDeserialize, BorshSerialize};
use log::debug;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use solana_sdk_ids::system_program;

use crate::{
    accounts::{GroupData, ProposalConfig},
    codec,
    error::{MultisigError, MultisigResult},
    pda,
    types::{ProposedInstruction, ProtectedAccountConfig},
};

/// Arguments for initializing a group
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct InitInstruction {
    /// Members and threshold of the new group
    pub group_data: GroupData,
    /// Lamports moved from the payer into the group account
    pub lamports: u64,
    /// Protected account to create alongside the group, if any
    pub protected_account_config: Option<ProtectedAccountConfig>,
}

/// Arguments for proposing a bundle of instructions
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProposeInstruction {
    /// Instructions to run on behalf of the protected account once approved
    pub instructions: Vec<ProposedInstruction>,
    /// Lamports moved from the author into the proposal account
    pub lamports: u64,
    /// Salt mixed into the proposal address
    pub salt: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ApproveInstruction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CloseProposalInstruction;

/// Payload of every instruction sent to the multisig program
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum InstructionData {
    Init(InitInstruction),
    Propose(ProposeInstruction),
    Approve(ApproveInstruction),
    CloseProposal(CloseProposalInstruction),
}

impl InstructionData {
    pub fn approve() -> Self {
        InstructionData::Approve(ApproveInstruction)
    }

    pub fn close_proposal() -> Self {
        InstructionData::CloseProposal(CloseProposalInstruction)
    }

    /// Decode an instruction payload, rejecting unknown discriminants and trailing bytes
    pub fn decode(data: &[u8]) -> MultisigResult<Self> {
        borsh::from_slice(data).map_err(MultisigError::InvalidInstructionData)
    }

    pub fn encode(&self) -> MultisigResult<Vec<u8>> {
        codec::encode(self)
    }
}

/// Program ids of the nested instructions, read-only, one per instruction
fn nested_program_ids(
    instructions: &[ProposedInstruction],
) -> impl Iterator<Item = AccountMeta> + '_ {
    instructions
        .iter()
        .map(|ix| AccountMeta::new_readonly(ix.program_id, false))
}

/// Accounts of the nested instructions with signing stripped; the program signs for them itself
fn nested_accounts<'a>(
    instructions: &'a [ProposedInstruction],
    skip: Option<&'a Pubkey>,
) -> impl Iterator<Item = AccountMeta> + 'a {
    instructions
        .iter()
        .flat_map(|ix| ix.accounts.iter())
        .filter(move |meta| Some(&meta.pubkey) != skip)
        .map(|meta| AccountMeta {
            pubkey: meta.pubkey,
            is_signer: false,
            is_writable: meta.is_writable,
        })
}

/// Initialize a group and its protected account
///
/// # Arguments
/// * `payer` - Fee payer funding the group account (must sign)
/// * `args` - Group configuration, funding and optional protected account parameters
/// * `program_id` - The multisig program ID
pub fn init(
    payer: &Pubkey,
    args: InitInstruction,
    program_id: &Pubkey,
) -> MultisigResult<Instruction> {
    args.group_data.validate()?;

    let (group, _) = pda::get_group_pda(&args.group_data, program_id)?;
    let (protected, _) = pda::get_protected_pda(&group, program_id);
    debug!("init: group {} protected {}", group, protected);

    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new(group, false),
        AccountMeta::new_readonly(system_program::ID, false),
        AccountMeta::new(protected, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: InstructionData::Init(args).encode()?,
    })
}

/// Propose a bundle of instructions to a group
///
/// # Arguments
/// * `author` - Group member creating the proposal (must sign)
/// * `group` - Group account public key
/// * `args` - Instructions, proposal funding and salt
/// * `program_id` - The multisig program ID
pub fn propose(
    author: &Pubkey,
    group: &Pubkey,
    args: ProposeInstruction,
    program_id: &Pubkey,
) -> MultisigResult<Instruction> {
    if args.instructions.is_empty() {
        return Err(MultisigError::MissingArgument(
            "proposal needs at least one instruction".to_string(),
        ));
    }

    let config = ProposalConfig::new(*group, *author, &args);
    let (proposal, _) = pda::get_proposal_pda(&config, program_id)?;
    debug!("propose: proposal {} salt {}", proposal, args.salt);

    let mut accounts = vec![
        AccountMeta::new(*author, true),
        AccountMeta::new(*group, false),
        AccountMeta::new(proposal, false),
        AccountMeta::new_readonly(system_program::ID, false),
    ];
    accounts.extend(nested_program_ids(&args.instructions));
    accounts.extend(nested_accounts(&args.instructions, None));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: InstructionData::Propose(args).encode()?,
    })
}

/// Approve a pending proposal
///
/// The protected account is passed once in its fixed slot; any nested reference to it is
/// dropped. Other repeated keys are kept as they appear.
///
/// # Arguments
/// * `signer` - Approving group member (must sign)
/// * `proposal` - Proposal account public key
/// * `config` - Configuration read back from the proposal account
/// * `program_id` - The multisig program ID
pub fn approve(
    signer: &Pubkey,
    proposal: &Pubkey,
    config: &ProposalConfig,
    program_id: &Pubkey,
) -> MultisigResult<Instruction> {
    let (protected, _) = pda::get_protected_pda(&config.group, program_id);

    let mut accounts = vec![
        AccountMeta::new(*signer, true),
        AccountMeta::new(config.group, false),
        AccountMeta::new(*proposal, false),
        AccountMeta::new(protected, false),
    ];
    accounts.extend(nested_program_ids(&config.instructions));
    accounts.extend(nested_accounts(&config.instructions, Some(&protected)));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: InstructionData::approve().encode()?,
    })
}

/// Close a proposal and reclaim its lamports
///
/// # Arguments
/// * `signer` - Proposal author (must sign)
/// * `proposal` - Proposal account public key
/// * `destination` - Account receiving the proposal's lamports
/// * `program_id` - The multisig program ID
pub fn close_proposal(
    signer: &Pubkey,
    proposal: &Pubkey,
    destination: &Pubkey,
    program_id: &Pubkey,
) -> MultisigResult<Instruction> {
    let accounts = vec![
        AccountMeta::new(*signer, true),
        AccountMeta::new(*proposal, false),
        AccountMeta::new(*destination, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: InstructionData::close_proposal().encode()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GroupMember, ProposedAccountMeta};

    fn group() -> GroupData {
        GroupData::new(
            vec![
                GroupMember::new(Pubkey::new_unique(), 1),
                GroupMember::new(Pubkey::new_unique(), 1),
            ],
            2,
        )
    }

    fn meta(pubkey: Pubkey, is_signer: bool, is_writable: bool) -> ProposedAccountMeta {
        ProposedAccountMeta {
            pubkey,
            is_signer,
            is_writable,
        }
    }

    #[test]
    fn test_init_instruction() {
        let program_id = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let group_data = group();
        let args = InitInstruction {
            group_data: group_data.clone(),
            lamports: 1_000,
            protected_account_config: None,
        };

        let ix = init(&payer, args.clone(), &program_id).unwrap();
        let (group_pda, _) = pda::get_group_pda(&group_data, &program_id).unwrap();
        let (protected, _) = pda::get_protected_pda(&group_pda, &program_id);

        assert_eq!(ix.program_id, program_id);
        assert_eq!(
            ix.accounts,
            vec![
                AccountMeta::new(payer, true),
                AccountMeta::new(group_pda, false),
                AccountMeta::new_readonly(system_program::ID, false),
                AccountMeta::new(protected, false),
            ]
        );
        assert_eq!(ix.data[0], 0);
        assert_eq!(InstructionData::decode(&ix.data).unwrap(), InstructionData::Init(args));
    }

    #[test]
    fn test_init_rejects_invalid_group() {
        let args = InitInstruction {
            group_data: GroupData::new(vec![], 1),
            lamports: 0,
            protected_account_config: None,
        };
        let err = init(&Pubkey::new_unique(), args, &Pubkey::new_unique()).unwrap_err();
        assert!(err.is_usage_error());
    }

    #[test]
    fn test_propose_strips_signers() {
        let program_id = Pubkey::new_unique();
        let author = Pubkey::new_unique();
        let group_pda = Pubkey::new_unique();
        let nested_program = Pubkey::new_unique();
        let vault = Pubkey::new_unique();
        let target = Pubkey::new_unique();

        let args = ProposeInstruction {
            instructions: vec![ProposedInstruction {
                program_id: nested_program,
                accounts: vec![meta(vault, true, true), meta(target, false, false)],
                data: vec![1],
            }],
            lamports: 500,
            salt: 1000,
        };

        let ix = propose(&author, &group_pda, args.clone(), &program_id).unwrap();
        let config = ProposalConfig::new(group_pda, author, &args);
        let (proposal, _) = pda::get_proposal_pda(&config, &program_id).unwrap();

        assert_eq!(
            ix.accounts,
            vec![
                AccountMeta::new(author, true),
                AccountMeta::new(group_pda, false),
                AccountMeta::new(proposal, false),
                AccountMeta::new_readonly(system_program::ID, false),
                AccountMeta::new_readonly(nested_program, false),
                AccountMeta::new(vault, false),
                AccountMeta::new_readonly(target, false),
            ]
        );
        assert_eq!(ix.data[0], 1);
        assert_eq!(
            InstructionData::decode(&ix.data).unwrap(),
            InstructionData::Propose(args)
        );
    }

    #[test]
    fn test_propose_requires_instructions() {
        let args = ProposeInstruction {
            instructions: vec![],
            lamports: 0,
            salt: 1,
        };
        let err = propose(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            args,
            &Pubkey::new_unique(),
        )
        .unwrap_err();
        assert!(matches!(err, MultisigError::MissingArgument(_)));
    }

    #[test]
    fn test_approve_includes_protected_once() {
        let program_id = Pubkey::new_unique();
        let signer = Pubkey::new_unique();
        let proposal = Pubkey::new_unique();
        let group_pda = Pubkey::new_unique();
        let (protected, _) = pda::get_protected_pda(&group_pda, &program_id);
        let recipient = Pubkey::new_unique();
        let first_program = Pubkey::new_unique();
        let second_program = Pubkey::new_unique();

        let config = ProposalConfig {
            group: group_pda,
            instructions: vec![
                ProposedInstruction {
                    program_id: first_program,
                    accounts: vec![meta(protected, true, true), meta(recipient, false, true)],
                    data: vec![],
                },
                ProposedInstruction {
                    program_id: second_program,
                    accounts: vec![meta(protected, true, true), meta(recipient, false, true)],
                    data: vec![],
                },
            ],
            author: signer,
            salt: 1,
        };

        let ix = approve(&signer, &proposal, &config, &program_id).unwrap();

        assert_eq!(
            ix.accounts.iter().filter(|m| m.pubkey == protected).count(),
            1
        );
        assert_eq!(
            ix.accounts,
            vec![
                AccountMeta::new(signer, true),
                AccountMeta::new(group_pda, false),
                AccountMeta::new(proposal, false),
                AccountMeta::new(protected, false),
                AccountMeta::new_readonly(first_program, false),
                AccountMeta::new_readonly(second_program, false),
                AccountMeta::new(recipient, false),
                AccountMeta::new(recipient, false),
            ]
        );
        assert_eq!(ix.data, vec![2]);
    }

    #[test]
    fn test_close_proposal_instruction() {
        let program_id = Pubkey::new_unique();
        let signer = Pubkey::new_unique();
        let proposal = Pubkey::new_unique();
        let destination = Pubkey::new_unique();

        let ix = close_proposal(&signer, &proposal, &destination, &program_id).unwrap();
        assert_eq!(
            ix.accounts,
            vec![
                AccountMeta::new(signer, true),
                AccountMeta::new(proposal, false),
                AccountMeta::new(destination, false),
            ]
        );
        assert_eq!(ix.data, vec![3]);
        assert_eq!(
            InstructionData::decode(&ix.data).unwrap(),
            InstructionData::close_proposal()
        );
    }

    #[test]
    fn test_decode_rejects_unknown_discriminant() {
        assert!(matches!(
            InstructionData::decode(&[9]),
            Err(MultisigError::InvalidInstructionData(_))
        ));
        assert!(InstructionData::decode(&[2, 0]).is_err());
        assert!(InstructionData::decode(&[]).is_err());
    }
}
