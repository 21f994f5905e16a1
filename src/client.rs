//! Async client helpers for the weighted multisig protocol
//!
//! This module provides high-level async functions for interacting with the multisig program.
//! It combines instruction building with RPC calls to make common operations easier, and serves
//! as the transport for the chunked program [`Loader`].
//!
//! # Features
//! This module is only available with the `async` feature enabled.

use std::time::{SystemTime, UNIX_EPOCH};

use log::info;
use solana_account_decoder_client_types::UiAccountEncoding;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcSendTransactionConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{
    account::Account,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};

use crate::{
    accounts::{self, GroupData, ProposalConfig, ProposalData},
    config::ClientConfig,
    error::{MultisigError, MultisigResult},
    instructions::{self, InitInstruction, ProposeInstruction},
    loader::{DeliveryMode, Loader, LoaderTransport},
    pda,
    proposition::{Proposition, TOKEN_ACCOUNT_SPACE},
    types::{ProposedInstruction, ProtectedAccountConfig},
};

/// High-level async client for the weighted multisig program
pub struct MultisigClient {
    /// RPC client for communicating with Solana
    pub rpc: RpcClient,
    /// Deployed multisig program
    pub program_id: Pubkey,
    /// Commitment used for reads and confirmations
    pub commitment: CommitmentConfig,
}

impl MultisigClient {
    /// Create a new client talking to `program_id` through `rpc_url`
    pub fn new(rpc_url: String, program_id: Pubkey) -> Self {
        Self::from_rpc_client(
            RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed()),
            program_id,
        )
    }

    /// Create a client from a loaded [`ClientConfig`]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            rpc: RpcClient::new_with_commitment(config.url.clone(), config.commitment_config()),
            program_id: config.program_id,
            commitment: config.commitment_config(),
        }
    }

    /// Create a client with an existing RpcClient
    pub fn from_rpc_client(rpc: RpcClient, program_id: Pubkey) -> Self {
        Self {
            rpc,
            program_id,
            commitment: CommitmentConfig::confirmed(),
        }
    }

    /// Fetch an account, `None` if it does not exist
    pub async fn get_account(&self, address: &Pubkey) -> MultisigResult<Option<Account>> {
        Ok(self
            .rpc
            .get_account_with_commitment(address, self.commitment)
            .await?
            .value)
    }

    async fn fetch_account(&self, address: &Pubkey) -> MultisigResult<Account> {
        self.get_account(address)
            .await?
            .ok_or_else(|| MultisigError::AccountNotFound(address.to_string()))
    }

    /// Fetch and decode a group account
    pub async fn get_group(&self, group: &Pubkey) -> MultisigResult<GroupData> {
        let account = self.fetch_account(group).await?;
        accounts::read_group_account(&account, &self.program_id)
    }

    /// Fetch and decode a proposal account
    ///
    /// A proposal that was executed or closed yields [`MultisigError::EmptyAccountData`].
    pub async fn get_proposal(&self, proposal: &Pubkey) -> MultisigResult<ProposalData> {
        let account = self.fetch_account(proposal).await?;
        accounts::read_proposal_account(&account, &self.program_id)
    }

    /// All groups `member` belongs to
    pub async fn get_groups(&self, member: &Pubkey) -> MultisigResult<Vec<(Pubkey, GroupData)>> {
        let found = self.scan(accounts::group_filter_bytes()).await?;

        let mut groups = Vec::new();
        for (address, account) in found {
            let group = accounts::read_group_account(&account, &self.program_id)?;
            if group.is_member(member) {
                groups.push((address, group));
            }
        }
        Ok(groups)
    }

    /// All live proposals of `group`
    pub async fn get_proposals(
        &self,
        group: &Pubkey,
    ) -> MultisigResult<Vec<(Pubkey, ProposalData)>> {
        let found = self.scan(accounts::proposal_filter_bytes(group)).await?;

        found
            .into_iter()
            .map(|(address, account)| {
                accounts::read_proposal_account(&account, &self.program_id)
                    .map(|proposal| (address, proposal))
            })
            .collect()
    }

    async fn scan(&self, prefix: Vec<u8>) -> MultisigResult<Vec<(Pubkey, Account)>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::Memcmp(Memcmp::new_raw_bytes(0, prefix))]),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.commitment),
                ..Default::default()
            },
            ..Default::default()
        };

        Ok(self
            .rpc
            .get_program_accounts_with_config(&self.program_id, config)
            .await?)
    }

    /// Get the group PDA for a group configuration
    pub fn get_group_pda(&self, group: &GroupData) -> MultisigResult<(Pubkey, u8)> {
        pda::get_group_pda(group, &self.program_id)
    }

    /// Get the protected account PDA of a group
    pub fn get_protected_pda(&self, group: &Pubkey) -> (Pubkey, u8) {
        pda::get_protected_pda(group, &self.program_id)
    }

    /// Rent-exempt balance for a token account created by a proposition
    pub async fn token_account_rent(&self) -> MultisigResult<u64> {
        Ok(self
            .rpc
            .get_minimum_balance_for_rent_exemption(TOKEN_ACCOUNT_SPACE)
            .await?)
    }

    // ========================================================================
    // High-level operations
    // ========================================================================

    /// Create a group and its protected account
    ///
    /// Does nothing if the group already exists.
    ///
    /// # Returns
    /// The group and protected account addresses
    pub async fn create_group(
        &self,
        payer: &Keypair,
        group: GroupData,
        protected_account_config: Option<ProtectedAccountConfig>,
    ) -> MultisigResult<(Pubkey, Pubkey)> {
        group.validate()?;

        let (group_pda, _) = self.get_group_pda(&group)?;
        let (protected, _) = self.get_protected_pda(&group_pda);
        info!("group account: {}", group_pda);
        info!("protected account: {}", protected);

        if let Some(existing) = self.get_account(&group_pda).await? {
            let existing = accounts::read_group_account(&existing, &self.program_id)?;
            info!(
                "group account already exists (threshold {}, {} members)",
                existing.threshold,
                existing.members.len()
            );
            return Ok((group_pda, protected));
        }

        let lamports = self
            .rpc
            .get_minimum_balance_for_rent_exemption(group.account_space()?)
            .await?;
        info!("{} lamports will be transferred to the new group account", lamports);

        let ix = instructions::init(
            &payer.pubkey(),
            InitInstruction {
                group_data: group,
                lamports,
                protected_account_config,
            },
            &self.program_id,
        )?;
        self.send_and_confirm_transaction(&[ix], &[payer]).await?;

        Ok((group_pda, protected))
    }

    /// Propose a bundle of instructions to a group
    ///
    /// The salt is the current wall-clock time in milliseconds. If the author's weight alone
    /// meets the threshold the program runs the instructions right away and no proposal account
    /// is left behind.
    ///
    /// # Returns
    /// The proposal account address
    pub async fn propose(
        &self,
        author: &Keypair,
        group: &Pubkey,
        instructions: Vec<ProposedInstruction>,
    ) -> MultisigResult<Pubkey> {
        let salt = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| MultisigError::InvalidArgument(format!("system clock: {e}")))?
            .as_millis() as u64;

        let mut args = ProposeInstruction {
            instructions,
            lamports: 0,
            salt,
        };
        let config = ProposalConfig::new(*group, author.pubkey(), &args);
        let (proposal, _) = pda::get_proposal_pda(&config, &self.program_id)?;
        args.lamports = self
            .rpc
            .get_minimum_balance_for_rent_exemption(config.account_space()?)
            .await?;

        let group_data = self.get_group(group).await?;
        if group_data.executes_immediately(&author.pubkey()) {
            info!("author weight meets the threshold; instructions execute immediately");
        }

        let ix = instructions::propose(&author.pubkey(), group, args, &self.program_id)?;
        self.send_and_confirm_transaction(&[ix], &[author]).await?;

        info!("created proposal {}", proposal);
        Ok(proposal)
    }

    /// Resolve a proposition against the group's protected account and propose it
    pub async fn propose_action(
        &self,
        author: &Keypair,
        group: &Pubkey,
        proposition: &Proposition,
    ) -> MultisigResult<Pubkey> {
        let (protected, _) = self.get_protected_pda(group);
        info!("proposing {} from protected account {}", proposition.kind(), protected);

        let instructions = proposition.resolve_proposed(&self.program_id, &protected)?;
        self.propose(author, group, instructions).await
    }

    /// Approve a pending proposal
    pub async fn approve(&self, signer: &Keypair, proposal: &Pubkey) -> MultisigResult<Signature> {
        let data = self.get_proposal(proposal).await?;
        info!("group account: {}", data.config.group);
        info!("protected account: {}", self.get_protected_pda(&data.config.group).0);

        let ix = instructions::approve(&signer.pubkey(), proposal, &data.config, &self.program_id)?;
        self.send_and_confirm_transaction(&[ix], &[signer]).await
    }

    /// Close a proposal and send its lamports to `destination`
    pub async fn close_proposal(
        &self,
        signer: &Keypair,
        proposal: &Pubkey,
        destination: &Pubkey,
    ) -> MultisigResult<Signature> {
        let data = self.get_proposal(proposal).await?;
        info!("closing proposal {} of group {}", proposal, data.config.group);

        let ix = instructions::close_proposal(
            &signer.pubkey(),
            proposal,
            destination,
            &self.program_id,
        )?;
        self.send_and_confirm_transaction(&[ix], &[signer]).await
    }

    /// Deploy a program through the upgradeable loader
    ///
    /// `authority` becomes the program's upgrade authority.
    pub async fn deploy_program(
        &self,
        payer: &Keypair,
        authority: &Keypair,
        program: &Keypair,
        data: &[u8],
        mode: DeliveryMode,
    ) -> MultisigResult<Pubkey> {
        Loader::new(self, payer, authority)
            .deploy(program, data, mode)
            .await
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    fn build_transaction(
        &self,
        instructions: &[Instruction],
        signers: &[&Keypair],
        recent_blockhash: solana_sdk::hash::Hash,
    ) -> MultisigResult<Transaction> {
        let payer = signers
            .first()
            .ok_or_else(|| MultisigError::MissingArgument("transaction signer".to_string()))?;

        let mut transaction = Transaction::new_with_payer(instructions, Some(&payer.pubkey()));
        transaction
            .try_sign(signers, recent_blockhash)
            .map_err(|e| MultisigError::TransactionFailed(e.to_string()))?;
        Ok(transaction)
    }

    fn send_config(&self) -> RpcSendTransactionConfig {
        RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.commitment.commitment),
            ..Default::default()
        }
    }

    /// Helper function to send and confirm a transaction
    async fn send_and_confirm_transaction(
        &self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> MultisigResult<Signature> {
        let recent_blockhash = self.rpc.get_latest_blockhash().await?;
        let transaction = self.build_transaction(instructions, signers, recent_blockhash)?;

        let signature = self
            .rpc
            .send_and_confirm_transaction_with_spinner_and_config(
                &transaction,
                self.commitment,
                self.send_config(),
            )
            .await?;
        info!("transaction {} confirmed", signature);
        Ok(signature)
    }
}

impl LoaderTransport for MultisigClient {
    async fn minimum_balance_for_rent_exemption(&self, space: usize) -> MultisigResult<u64> {
        Ok(self.rpc.get_minimum_balance_for_rent_exemption(space).await?)
    }

    async fn send_and_confirm(
        &self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> MultisigResult<Signature> {
        self.send_and_confirm_transaction(instructions, signers).await
    }

    async fn send(
        &self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> MultisigResult<Signature> {
        let recent_blockhash = self.rpc.get_latest_blockhash().await?;
        let transaction = self.build_transaction(instructions, signers, recent_blockhash)?;

        Ok(self
            .rpc
            .send_transaction_with_config(&transaction, self.send_config())
            .await?)
    }

    async fn confirm(&self, signature: &Signature) -> MultisigResult<()> {
        self.rpc
            .poll_for_signature_with_commitment(signature, self.commitment)
            .await?;

        match self
            .rpc
            .get_signature_status_with_commitment(signature, self.commitment)
            .await?
        {
            Some(Ok(())) => Ok(()),
            Some(Err(err)) => Err(MultisigError::TransactionFailed(format!("{signature}: {err}"))),
            None => Err(MultisigError::TransactionFailed(format!(
                "{signature}: not found after confirmation"
            ))),
        }
    }
}
