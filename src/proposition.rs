//! High-level actions a group can propose
//!
//! A [`Proposition`] names what the group wants done; [`Proposition::resolve`] turns it into the
//! low-level instructions that the multisig program executes once the proposal is approved. The
//! group's protected account is always the implied source, payer or authority.

use std::{fmt, str::FromStr};

use log::debug;
use solana_program::program_pack::Pack;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use solana_system_interface::instruction as system_instruction;
use spl_token_interface::instruction::{self as token_instruction, AuthorityType};

use crate::{
    error::{MultisigError, MultisigResult},
    loader, pda,
    types::ProposedInstruction,
};

/// Size of an SPL token account
pub const TOKEN_ACCOUNT_SPACE: usize = spl_token_interface::state::Account::LEN;

/// Kind of a proposition, as named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropositionKind {
    Create,
    Transfer,
    Upgrade,
    UpgradeMultisig,
    DelegateUpgradeAuthority,
    DelegateMintAuthority,
    DelegateTokenAuthority,
    MintTo,
    CreateTokenAccount,
    TransferToken,
}

impl PropositionKind {
    pub const ALL: [PropositionKind; 10] = [
        PropositionKind::Create,
        PropositionKind::Transfer,
        PropositionKind::Upgrade,
        PropositionKind::UpgradeMultisig,
        PropositionKind::DelegateUpgradeAuthority,
        PropositionKind::DelegateMintAuthority,
        PropositionKind::DelegateTokenAuthority,
        PropositionKind::MintTo,
        PropositionKind::CreateTokenAccount,
        PropositionKind::TransferToken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropositionKind::Create => "create",
            PropositionKind::Transfer => "transfer",
            PropositionKind::Upgrade => "upgrade",
            PropositionKind::UpgradeMultisig => "upgrade-multisig",
            PropositionKind::DelegateUpgradeAuthority => "delegate-upgrade-authority",
            PropositionKind::DelegateMintAuthority => "delegate-mint-authority",
            PropositionKind::DelegateTokenAuthority => "delegate-token-authority",
            PropositionKind::MintTo => "mint-to",
            PropositionKind::CreateTokenAccount => "create-token-account",
            PropositionKind::TransferToken => "transfer-token",
        }
    }
}

impl fmt::Display for PropositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropositionKind {
    type Err = MultisigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // older tooling spells out the token account
        if s == "delegate-token-account-authority" {
            return Ok(PropositionKind::DelegateTokenAuthority);
        }

        PropositionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| MultisigError::UnsupportedProposition(s.to_string()))
    }
}

/// An action to be carried out by a group's protected account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposition {
    /// Fund and create the protected account itself; the final approver pays
    Create { lamports: u64, final_approver: Pubkey },
    /// Move lamports out of the protected account
    Transfer { destination: Pubkey, amount: u64 },
    /// Upgrade a program whose upgrade authority is the protected account
    Upgrade { program: Pubkey, buffer: Pubkey },
    /// Upgrade the multisig program itself
    UpgradeMultisig { buffer: Pubkey },
    DelegateUpgradeAuthority { target: Pubkey, new_authority: Pubkey },
    DelegateMintAuthority { target: Pubkey, new_authority: Pubkey },
    DelegateTokenAuthority { target: Pubkey, new_authority: Pubkey },
    /// Mint tokens of a mint whose authority is the protected account
    MintTo {
        mint: Pubkey,
        destination: Pubkey,
        amount: u64,
    },
    /// Create a token account owned by the protected account at an address seeded from it
    ///
    /// `lamports` must cover rent for [`TOKEN_ACCOUNT_SPACE`] bytes.
    CreateTokenAccount {
        mint: Pubkey,
        seed: String,
        lamports: u64,
    },
    TransferToken {
        source: Pubkey,
        destination: Pubkey,
        amount: u64,
    },
}

fn token_error(err: solana_program::program_error::ProgramError) -> MultisigError {
    MultisigError::ProgramError(err.to_string())
}

impl Proposition {
    pub fn kind(&self) -> PropositionKind {
        match self {
            Proposition::Create { .. } => PropositionKind::Create,
            Proposition::Transfer { .. } => PropositionKind::Transfer,
            Proposition::Upgrade { .. } => PropositionKind::Upgrade,
            Proposition::UpgradeMultisig { .. } => PropositionKind::UpgradeMultisig,
            Proposition::DelegateUpgradeAuthority { .. } => {
                PropositionKind::DelegateUpgradeAuthority
            }
            Proposition::DelegateMintAuthority { .. } => PropositionKind::DelegateMintAuthority,
            Proposition::DelegateTokenAuthority { .. } => PropositionKind::DelegateTokenAuthority,
            Proposition::MintTo { .. } => PropositionKind::MintTo,
            Proposition::CreateTokenAccount { .. } => PropositionKind::CreateTokenAccount,
            Proposition::TransferToken { .. } => PropositionKind::TransferToken,
        }
    }

    /// Instructions carrying out this proposition on behalf of `protected`
    ///
    /// # Arguments
    /// * `multisig_program_id` - The multisig program ID, target of
    ///   [`Proposition::UpgradeMultisig`]
    /// * `protected` - Protected account of the proposing group
    pub fn resolve(
        &self,
        multisig_program_id: &Pubkey,
        protected: &Pubkey,
    ) -> MultisigResult<Vec<Instruction>> {
        let token_program = &spl_token_interface::ID;

        let instructions = match self {
            Proposition::Create {
                lamports,
                final_approver,
            } => vec![system_instruction::create_account(
                final_approver,
                protected,
                *lamports,
                0,
                &solana_system_interface::program::ID,
            )],
            Proposition::Transfer {
                destination,
                amount,
            } => vec![system_instruction::transfer(protected, destination, *amount)],
            Proposition::Upgrade { program, buffer } => {
                vec![loader::upgrade_instruction(program, buffer, protected, protected)?]
            }
            Proposition::UpgradeMultisig { buffer } => vec![loader::upgrade_instruction(
                multisig_program_id,
                buffer,
                protected,
                protected,
            )?],
            Proposition::DelegateUpgradeAuthority {
                target,
                new_authority,
            } => vec![loader::set_upgrade_authority_instruction(
                target,
                protected,
                new_authority,
            )?],
            Proposition::DelegateMintAuthority {
                target,
                new_authority,
            } => vec![token_instruction::set_authority(
                token_program,
                target,
                Some(new_authority),
                AuthorityType::MintTokens,
                protected,
                &[],
            )
            .map_err(token_error)?],
            Proposition::DelegateTokenAuthority {
                target,
                new_authority,
            } => vec![token_instruction::set_authority(
                token_program,
                target,
                Some(new_authority),
                AuthorityType::AccountOwner,
                protected,
                &[],
            )
            .map_err(token_error)?],
            Proposition::MintTo {
                mint,
                destination,
                amount,
            } => vec![token_instruction::mint_to(
                token_program,
                mint,
                destination,
                protected,
                &[],
                *amount,
            )
            .map_err(token_error)?],
            Proposition::CreateTokenAccount {
                mint,
                seed,
                lamports,
            } => {
                let account = pda::get_token_account_with_seed(protected, seed)?;
                debug!("token account {} seeded with `{}`", account, seed);
                vec![
                    system_instruction::create_account_with_seed(
                        protected,
                        &account,
                        protected,
                        seed,
                        *lamports,
                        TOKEN_ACCOUNT_SPACE as u64,
                        token_program,
                    ),
                    token_instruction::initialize_account(token_program, &account, mint, protected)
                        .map_err(token_error)?,
                ]
            }
            Proposition::TransferToken {
                source,
                destination,
                amount,
            } => vec![token_instruction::transfer(
                token_program,
                source,
                destination,
                protected,
                &[],
                *amount,
            )
            .map_err(token_error)?],
        };

        Ok(instructions)
    }

    /// Same as [`Proposition::resolve`], converted into the capsules stored in a proposal
    pub fn resolve_proposed(
        &self,
        multisig_program_id: &Pubkey,
        protected: &Pubkey,
    ) -> MultisigResult<Vec<ProposedInstruction>> {
        Ok(self
            .resolve(multisig_program_id, protected)?
            .into_iter()
            .map(ProposedInstruction::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoaderInstruction;
    use solana_sdk::instruction::AccountMeta;
    use solana_sdk_ids::bpf_loader_upgradeable;

    fn vault() -> Pubkey {
        Pubkey::new_from_array([42u8; 32])
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in PropositionKind::ALL {
            assert_eq!(kind.as_str().parse::<PropositionKind>().unwrap(), kind);
        }
        assert_eq!(
            "delegate-token-account-authority"
                .parse::<PropositionKind>()
                .unwrap(),
            PropositionKind::DelegateTokenAuthority
        );

        let err = "burn".parse::<PropositionKind>().unwrap_err();
        assert!(matches!(err, MultisigError::UnsupportedProposition(ref s) if s == "burn"));
    }

    #[test]
    fn test_create_is_paid_by_final_approver() {
        let approver = Pubkey::new_unique();
        let proposition = Proposition::Create {
            lamports: 890_880,
            final_approver: approver,
        };
        assert_eq!(proposition.kind(), PropositionKind::Create);

        let ixs = proposition.resolve(&Pubkey::new_unique(), &vault()).unwrap();
        assert_eq!(
            ixs,
            vec![system_instruction::create_account(
                &approver,
                &vault(),
                890_880,
                0,
                &solana_system_interface::program::ID,
            )]
        );
    }

    #[test]
    fn test_transfer_from_protected() {
        let destination = Pubkey::new_unique();
        let ixs = Proposition::Transfer {
            destination,
            amount: 5,
        }
        .resolve(&Pubkey::new_unique(), &vault())
        .unwrap();

        assert_eq!(ixs.len(), 1);
        assert_eq!(ixs[0].accounts[0], AccountMeta::new(vault(), true));
        assert_eq!(ixs[0].accounts[1], AccountMeta::new(destination, false));
    }

    #[test]
    fn test_upgrade_multisig_targets_program_id() {
        let multisig_program = Pubkey::new_unique();
        let buffer = Pubkey::new_unique();

        let ixs = Proposition::UpgradeMultisig { buffer }
            .resolve(&multisig_program, &vault())
            .unwrap();
        let expected =
            loader::upgrade_instruction(&multisig_program, &buffer, &vault(), &vault()).unwrap();
        assert_eq!(ixs, vec![expected]);
        assert_eq!(ixs[0].program_id, bpf_loader_upgradeable::ID);
        assert_eq!(ixs[0].accounts[1].pubkey, multisig_program);

        let other = Pubkey::new_unique();
        let ixs = Proposition::Upgrade {
            program: other,
            buffer,
        }
        .resolve(&multisig_program, &vault())
        .unwrap();
        assert_eq!(ixs[0].accounts[1].pubkey, other);
    }

    #[test]
    fn test_delegate_upgrade_authority() {
        let target = Pubkey::new_unique();
        let next = Pubkey::new_unique();
        let ixs = Proposition::DelegateUpgradeAuthority {
            target,
            new_authority: next,
        }
        .resolve(&Pubkey::new_unique(), &vault())
        .unwrap();

        assert_eq!(
            bincode::deserialize::<LoaderInstruction>(&ixs[0].data).unwrap(),
            LoaderInstruction::SetAuthority
        );
        assert_eq!(ixs[0].accounts[1], AccountMeta::new_readonly(vault(), true));
        assert_eq!(ixs[0].accounts[2], AccountMeta::new_readonly(next, false));
    }

    #[test]
    fn test_token_authority_types() {
        let target = Pubkey::new_unique();
        let next = Pubkey::new_unique();

        let mint = Proposition::DelegateMintAuthority {
            target,
            new_authority: next,
        }
        .resolve(&Pubkey::new_unique(), &vault())
        .unwrap();
        let account = Proposition::DelegateTokenAuthority {
            target,
            new_authority: next,
        }
        .resolve(&Pubkey::new_unique(), &vault())
        .unwrap();

        let expected_mint = token_instruction::set_authority(
            &spl_token_interface::ID,
            &target,
            Some(&next),
            AuthorityType::MintTokens,
            &vault(),
            &[],
        )
        .unwrap();
        let expected_account = token_instruction::set_authority(
            &spl_token_interface::ID,
            &target,
            Some(&next),
            AuthorityType::AccountOwner,
            &vault(),
            &[],
        )
        .unwrap();
        assert_eq!(mint, vec![expected_mint]);
        assert_eq!(account, vec![expected_account]);
        assert_ne!(mint[0].data, account[0].data);
    }

    #[test]
    fn test_mint_and_transfer_token_use_protected_authority() {
        let mint = Pubkey::new_unique();
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();

        let minted = Proposition::MintTo {
            mint,
            destination,
            amount: 1_000,
        }
        .resolve(&Pubkey::new_unique(), &vault())
        .unwrap();
        assert_eq!(minted[0].program_id, spl_token_interface::ID);
        assert_eq!(minted[0].accounts[2], AccountMeta::new_readonly(vault(), true));

        let moved = Proposition::TransferToken {
            source,
            destination,
            amount: 10,
        }
        .resolve(&Pubkey::new_unique(), &vault())
        .unwrap();
        assert_eq!(moved[0].accounts[0].pubkey, source);
        assert_eq!(moved[0].accounts[2], AccountMeta::new_readonly(vault(), true));
    }

    #[test]
    fn test_create_token_account_with_seed() {
        let mint = Pubkey::new_unique();
        let proposition = Proposition::CreateTokenAccount {
            mint,
            seed: "treasury".to_string(),
            lamports: 2_039_280,
        };

        let ixs = proposition.resolve(&Pubkey::new_unique(), &vault()).unwrap();
        let account =
            Pubkey::create_with_seed(&vault(), "treasury", &spl_token_interface::ID).unwrap();

        assert_eq!(ixs.len(), 2);
        assert_eq!(
            ixs[0],
            system_instruction::create_account_with_seed(
                &vault(),
                &account,
                &vault(),
                "treasury",
                2_039_280,
                165,
                &spl_token_interface::ID,
            )
        );
        assert_eq!(
            ixs[1],
            token_instruction::initialize_account(
                &spl_token_interface::ID,
                &account,
                &mint,
                &vault(),
            )
            .unwrap()
        );

        let proposed = proposition
            .resolve_proposed(&Pubkey::new_unique(), &vault())
            .unwrap();
        assert_eq!(proposed.len(), 2);
        assert!(proposed[0].references(&account));
    }
}
