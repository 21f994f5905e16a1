//! Client configuration
//!
//! Stored as JSON, e.g.
//!
//! ```json
//! { "url": "http://127.0.0.1:8899", "programId": "<base58>", "commitment": "confirmed" }
//! ```
//!
//! `commitment` is optional and defaults to `confirmed`.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use solana_commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::pubkey::Pubkey;

use crate::error::{MultisigError, MultisigResult};

/// Local validator RPC endpoint
pub const DEFAULT_URL: &str = "http://127.0.0.1:8899";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// RPC endpoint of the cluster
    pub url: String,
    /// Deployed multisig program
    #[serde(with = "as_string")]
    pub program_id: Pubkey,
    /// Commitment used for reads and confirmations
    #[serde(default = "default_commitment", with = "as_string")]
    pub commitment: CommitmentLevel,
}

fn default_commitment() -> CommitmentLevel {
    CommitmentLevel::Confirmed
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, program_id: Pubkey) -> Self {
        Self {
            url: url.into(),
            program_id,
            commitment: default_commitment(),
        }
    }

    /// Config for a program deployed on a local validator
    pub fn localnet(program_id: Pubkey) -> Self {
        Self::new(DEFAULT_URL, program_id)
    }

    pub fn commitment_config(&self) -> CommitmentConfig {
        CommitmentConfig {
            commitment: self.commitment,
        }
    }

    pub fn from_json_str(json: &str) -> MultisigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> MultisigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a config file
    pub fn load(path: impl AsRef<Path>) -> MultisigResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| MultisigError::ConfigError(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Write the config file, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> MultisigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| MultisigError::ConfigError(format!("{}: {e}", parent.display())))?;
        }
        fs::write(path, self.to_json_string()?)
            .map_err(|e| MultisigError::ConfigError(format!("{}: {e}", path.display())))
    }
}

/// Serialize through `Display`/`FromStr`, e.g. keys as base58
mod as_string {
    use std::{fmt::Display, str::FromStr};

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<T: Display, S: Serializer>(
        value: &T,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
