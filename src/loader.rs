//! Chunked program loader for the upgradeable BPF loader
//!
//! Deployment runs in three phases:
//!
//! 1. **Init**: create a buffer account of `37 + len` bytes owned by the loader and initialize
//!    it with the upload authority.
//! 2. **Write**: one `Write` instruction per [`CHUNK_SIZE`] slice of the program, at increasing
//!    offsets, covering the payload exactly.
//! 3. **Deploy**: create the 36-byte program account and deploy the buffer with room for the
//!    program to grow to three times its current size.
//!
//! Writes are delivered either one at a time ([`DeliveryMode::Sequential`]) or all at once
//! ([`DeliveryMode::Concurrent`]), where every transaction is submitted before any confirmation
//! is awaited. Any failure aborts the deployment; nothing is retried.

use futures::future::join_all;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
};
use solana_sdk_ids::{bpf_loader_upgradeable, system_program, sysvar};
use solana_system_interface::instruction as system_instruction;

use crate::{
    error::{MultisigError, MultisigResult},
    pda,
};

/// Program bytes carried by a single write transaction, keeping it under the packet size limit
pub const CHUNK_SIZE: usize = 900;

/// Buffer account header: state discriminant plus the optional authority
pub const BUFFER_METADATA_SIZE: usize = 37;

/// Size of an upgradeable program account
pub const PROGRAM_ACCOUNT_SIZE: usize = 36;

/// The deployed program may grow up to this multiple of its initial size
pub const MAX_DATA_LEN_MULTIPLIER: usize = 3;

/// Instructions of the upgradeable loader, bincode encoded (u32 variant tag, u64 lengths)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoaderInstruction {
    InitializeBuffer,
    Write { offset: u32, bytes: Vec<u8> },
    DeployWithMaxDataLen { max_data_len: u64 },
    Upgrade,
    SetAuthority,
    Close,
}

impl LoaderInstruction {
    pub fn pack(&self) -> MultisigResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// Size of the buffer account holding `data_len` program bytes
pub fn buffer_space(data_len: usize) -> usize {
    BUFFER_METADATA_SIZE + data_len
}

pub fn max_data_len(data_len: usize) -> usize {
    MAX_DATA_LEN_MULTIPLIER * data_len
}

/// Minimum number of signatures needed to deploy `data_len` bytes, retries excluded
///
/// Every transaction carries two signatures; on top of the writes there is one transaction to
/// create the buffer and one to deploy it.
pub fn min_num_signatures(data_len: usize) -> usize {
    2 * (data_len.div_ceil(CHUNK_SIZE) + 2)
}

fn check_payload(data: &[u8]) -> MultisigResult<()> {
    if data.is_empty() {
        return Err(MultisigError::MissingArgument("program data is empty".to_string()));
    }
    if u32::try_from(data.len()).is_err() {
        return Err(MultisigError::PayloadTooLarge(data.len()));
    }
    Ok(())
}

/// Create and initialize a buffer account for `data_len` program bytes
///
/// # Arguments
/// * `payer` - Funds the buffer account (must sign)
/// * `buffer` - New buffer account (must sign)
/// * `authority` - Authority allowed to write into and deploy the buffer
/// * `lamports` - Rent-exempt balance for [`buffer_space`]
/// * `data_len` - Length of the program
pub fn create_buffer_instructions(
    payer: &Pubkey,
    buffer: &Pubkey,
    authority: &Pubkey,
    lamports: u64,
    data_len: usize,
) -> MultisigResult<Vec<Instruction>> {
    Ok(vec![
        system_instruction::create_account(
            payer,
            buffer,
            lamports,
            buffer_space(data_len) as u64,
            &bpf_loader_upgradeable::ID,
        ),
        Instruction {
            program_id: bpf_loader_upgradeable::ID,
            accounts: vec![
                AccountMeta::new(*buffer, false),
                AccountMeta::new_readonly(*authority, false),
            ],
            data: LoaderInstruction::InitializeBuffer.pack()?,
        },
    ])
}

/// Write `bytes` into the buffer at `offset`
pub fn write_instruction(
    buffer: &Pubkey,
    authority: &Pubkey,
    offset: u32,
    bytes: Vec<u8>,
) -> MultisigResult<Instruction> {
    Ok(Instruction {
        program_id: bpf_loader_upgradeable::ID,
        accounts: vec![
            AccountMeta::new(*buffer, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data: LoaderInstruction::Write { offset, bytes }.pack()?,
    })
}

/// One write instruction per chunk of `data`, paired with its offset
pub fn write_instructions(
    buffer: &Pubkey,
    authority: &Pubkey,
    data: &[u8],
) -> MultisigResult<Vec<(u32, Instruction)>> {
    check_payload(data)?;

    data.chunks(CHUNK_SIZE)
        .enumerate()
        .map(|(idx, chunk)| {
            // fits: the whole payload length fits in a u32
            let offset = (idx * CHUNK_SIZE) as u32;
            Ok((offset, write_instruction(buffer, authority, offset, chunk.to_vec())?))
        })
        .collect()
}

/// Create the program account and deploy the buffer into it
///
/// # Arguments
/// * `payer` - Funds the program and program data accounts (must sign)
/// * `program` - New program account (must sign)
/// * `buffer` - Fully written buffer account
/// * `authority` - Buffer authority, becomes the upgrade authority (must sign)
/// * `lamports` - Rent-exempt balance for [`PROGRAM_ACCOUNT_SIZE`]
/// * `data_len` - Length of the program
pub fn deploy_instructions(
    payer: &Pubkey,
    program: &Pubkey,
    buffer: &Pubkey,
    authority: &Pubkey,
    lamports: u64,
    data_len: usize,
) -> MultisigResult<Vec<Instruction>> {
    let (program_data, _) = pda::get_program_data_pda(program);

    Ok(vec![
        system_instruction::create_account(
            payer,
            program,
            lamports,
            PROGRAM_ACCOUNT_SIZE as u64,
            &bpf_loader_upgradeable::ID,
        ),
        Instruction {
            program_id: bpf_loader_upgradeable::ID,
            accounts: vec![
                AccountMeta::new(*payer, true),
                AccountMeta::new(program_data, false),
                AccountMeta::new(*program, false),
                AccountMeta::new(*buffer, false),
                AccountMeta::new_readonly(sysvar::rent::ID, false),
                AccountMeta::new_readonly(sysvar::clock::ID, false),
                AccountMeta::new_readonly(system_program::ID, false),
                AccountMeta::new_readonly(*authority, true),
            ],
            data: LoaderInstruction::DeployWithMaxDataLen {
                max_data_len: max_data_len(data_len) as u64,
            }
            .pack()?,
        },
    ])
}

/// Replace a deployed program with the contents of `buffer`
///
/// # Arguments
/// * `program` - Program to upgrade
/// * `buffer` - Buffer holding the new program
/// * `spill` - Receives the buffer's lamports
/// * `authority` - Current upgrade authority (must sign)
pub fn upgrade_instruction(
    program: &Pubkey,
    buffer: &Pubkey,
    spill: &Pubkey,
    authority: &Pubkey,
) -> MultisigResult<Instruction> {
    let (program_data, _) = pda::get_program_data_pda(program);

    Ok(Instruction {
        program_id: bpf_loader_upgradeable::ID,
        accounts: vec![
            AccountMeta::new(program_data, false),
            AccountMeta::new(*program, false),
            AccountMeta::new(*buffer, false),
            AccountMeta::new(*spill, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
            AccountMeta::new_readonly(sysvar::clock::ID, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data: LoaderInstruction::Upgrade.pack()?,
    })
}

/// Hand the upgrade authority of `program` to `new_authority`
pub fn set_upgrade_authority_instruction(
    program: &Pubkey,
    current_authority: &Pubkey,
    new_authority: &Pubkey,
) -> MultisigResult<Instruction> {
    let (program_data, _) = pda::get_program_data_pda(program);

    Ok(Instruction {
        program_id: bpf_loader_upgradeable::ID,
        accounts: vec![
            AccountMeta::new(program_data, false),
            AccountMeta::new_readonly(*current_authority, true),
            AccountMeta::new_readonly(*new_authority, false),
        ],
        data: LoaderInstruction::SetAuthority.pack()?,
    })
}

/// How write transactions are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Send and confirm each chunk before the next one
    #[default]
    Sequential,
    /// Send every chunk, then await every confirmation
    Concurrent,
}

/// Submission and confirmation of transactions on behalf of the loader
///
/// The first signer pays the transaction fees.
#[allow(async_fn_in_trait)]
pub trait LoaderTransport {
    /// Rent-exempt balance for an account of `space` bytes
    async fn minimum_balance_for_rent_exemption(&self, space: usize) -> MultisigResult<u64>;

    /// Submit a transaction and wait until it is confirmed
    async fn send_and_confirm(
        &self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> MultisigResult<Signature>;

    /// Submit a transaction without waiting for confirmation
    async fn send(
        &self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> MultisigResult<Signature>;

    /// Wait until a previously sent transaction is confirmed
    async fn confirm(&self, signature: &Signature) -> MultisigResult<()>;
}

/// Drives a deployment over a [`LoaderTransport`]
pub struct Loader<'a, T: LoaderTransport> {
    transport: &'a T,
    payer: &'a Keypair,
    authority: &'a Keypair,
}

impl<'a, T: LoaderTransport> Loader<'a, T> {
    /// Create a loader paying fees from `payer` and writing with `authority`
    pub fn new(transport: &'a T, payer: &'a Keypair, authority: &'a Keypair) -> Self {
        Self {
            transport,
            payer,
            authority,
        }
    }

    /// Upload `data` into a fresh buffer and deploy it as `program`
    ///
    /// # Returns
    /// The address of the deployed program
    pub async fn deploy(
        &self,
        program: &Keypair,
        data: &[u8],
        mode: DeliveryMode,
    ) -> MultisigResult<Pubkey> {
        check_payload(data)?;

        let buffer = Keypair::new();
        self.init_buffer(&buffer, data.len()).await?;
        self.write_buffer(&buffer.pubkey(), data, mode).await?;
        self.deploy_buffer(program, &buffer.pubkey(), data.len()).await?;

        info!("program {} deployed", program.pubkey());
        Ok(program.pubkey())
    }

    /// Create and initialize `buffer` for `data_len` program bytes
    pub async fn init_buffer(&self, buffer: &Keypair, data_len: usize) -> MultisigResult<()> {
        info!("buffer account {}", buffer.pubkey());
        info!("authority account {}", self.authority.pubkey());

        let lamports = self
            .transport
            .minimum_balance_for_rent_exemption(buffer_space(data_len))
            .await?;
        let instructions = create_buffer_instructions(
            &self.payer.pubkey(),
            &buffer.pubkey(),
            &self.authority.pubkey(),
            lamports,
            data_len,
        )?;

        self.transport
            .send_and_confirm(&instructions, &[self.payer, buffer])
            .await?;
        info!("program buffer initialized");
        Ok(())
    }

    /// Write `data` into an initialized buffer
    pub async fn write_buffer(
        &self,
        buffer: &Pubkey,
        data: &[u8],
        mode: DeliveryMode,
    ) -> MultisigResult<()> {
        let writes = write_instructions(buffer, &self.authority.pubkey(), data)?;
        let signers = self.write_signers();

        match mode {
            DeliveryMode::Sequential => {
                for (offset, instruction) in &writes {
                    self.transport
                        .send_and_confirm(std::slice::from_ref(instruction), &signers)
                        .await?;
                    debug!("write progress: {}/{}", offset, data.len());
                }
            }
            DeliveryMode::Concurrent => {
                let sent = join_all(writes.iter().map(|(_, instruction)| {
                    self.transport
                        .send(std::slice::from_ref(instruction), &signers)
                }))
                .await;
                let signatures = sent.into_iter().collect::<MultisigResult<Vec<_>>>()?;
                info!("{} write transactions sent", signatures.len());

                let confirmed =
                    join_all(signatures.iter().map(|sig| self.transport.confirm(sig))).await;
                confirmed.into_iter().collect::<MultisigResult<Vec<_>>>()?;
                info!("write transactions confirmed");
            }
        }

        info!("buffer write complete");
        Ok(())
    }

    /// Deploy a fully written buffer as `program`
    pub async fn deploy_buffer(
        &self,
        program: &Keypair,
        buffer: &Pubkey,
        data_len: usize,
    ) -> MultisigResult<Signature> {
        let lamports = self
            .transport
            .minimum_balance_for_rent_exemption(PROGRAM_ACCOUNT_SIZE)
            .await?;
        let instructions = deploy_instructions(
            &self.payer.pubkey(),
            &program.pubkey(),
            buffer,
            &self.authority.pubkey(),
            lamports,
            data_len,
        )?;

        let mut signers = vec![self.payer, program];
        if self.authority.pubkey() != self.payer.pubkey() {
            signers.push(self.authority);
        }
        self.transport.send_and_confirm(&instructions, &signers).await
    }

    fn write_signers(&self) -> Vec<&'a Keypair> {
        if self.authority.pubkey() == self.payer.pubkey() {
            vec![self.payer]
        } else {
            vec![self.payer, self.authority]
        }
    }
}
