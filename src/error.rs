//! Error types for the weighted multisig client library

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Result type for multisig client operations
pub type MultisigResult<T> = Result<T, MultisigError>;

/// Errors that can occur when using the multisig client
#[derive(Debug, Error)]
pub enum MultisigError {
    /// Error from the Solana client
    #[error("Solana client error: {0}")]
    ClientError(#[from] solana_client::client_error::ClientError),

    /// Failed to serialize data
    #[error("Failed to serialize data: {0}")]
    SerializationError(std::io::Error),

    /// Failed to deserialize account data
    #[error("Failed to deserialize account data: {0}")]
    DeserializationError(std::io::Error),

    /// Instruction payload could not be decoded (unknown discriminant, truncated, ...)
    #[error("Invalid instruction data: {0}")]
    InvalidInstructionData(std::io::Error),

    /// Account is not owned by the expected program
    #[error("Invalid account owner: expected {expected}, found {actual}")]
    InvalidAccountOwner { expected: Pubkey, actual: Pubkey },

    /// Account data is empty or all zero, i.e. the account was closed or finalized
    #[error("Account data is empty (the account may be closed or finalized)")]
    EmptyAccountData,

    /// Leading type tag does not match the expected account kind
    #[error("Invalid account type: expected tag {expected}, found {actual}")]
    InvalidAccountType { expected: u8, actual: u8 },

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// A required caller-supplied value is missing
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// A caller-supplied value is malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Group threshold is zero
    #[error("Threshold can't be zero")]
    ZeroThreshold,

    /// Group has no members
    #[error("Group must have at least one member")]
    NoMembers,

    /// Group has more members than the approval bitmask can track
    #[error("Too many group members: {0} (at most {max})", max = crate::MAX_MEMBERS)]
    TooManyMembers(usize),

    /// A member was given zero weight
    #[error("Member weight can't be zero")]
    ZeroWeight,

    /// Member weights can never add up to the threshold
    #[error("Threshold {threshold} is unreachable with total weight {total_weight}")]
    UnreachableThreshold { threshold: u32, total_weight: u32 },

    /// Proposition kind is not known to the resolver
    #[error("Unsupported proposition: {0}")]
    UnsupportedProposition(String),

    /// Error returned by a program interface builder
    #[error("Program error: {0}")]
    ProgramError(String),

    /// Program bytecode does not fit the loader's u32 write offsets
    #[error("Program data too large for the loader: {0} bytes")]
    PayloadTooLarge(usize),

    /// A submitted transaction was rejected or failed on chain
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Configuration could not be read, parsed or written
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl MultisigError {
    /// Whether this error means the account no longer holds live data
    pub fn is_closed_account(&self) -> bool {
        matches!(self, MultisigError::EmptyAccountData)
    }

    /// Whether this error is a caller usage error raised before any derivation or encoding
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            MultisigError::MissingArgument(_)
                | MultisigError::InvalidArgument(_)
                | MultisigError::ZeroThreshold
                | MultisigError::NoMembers
                | MultisigError::TooManyMembers(_)
                | MultisigError::ZeroWeight
                | MultisigError::UnreachableThreshold { .. }
        )
    }
}

impl From<bincode::Error> for MultisigError {
    fn from(err: bincode::Error) -> Self {
        MultisigError::SerializationError(std::io::Error::other(err))
    }
}

impl From<serde_json::Error> for MultisigError {
    fn from(err: serde_json::Error) -> Self {
        MultisigError::ConfigError(err.to_string())
    }
}
