//! Binary schema codec
//!
//! Every value exchanged with the multisig program is encoded with Borsh: struct fields in
//! declared order, little-endian fixed-width integers, 32-byte keys verbatim, `u32` length
//! prefixes for sequences, a one-byte presence flag for options, a one-byte discriminant for
//! enums and a single `0`/`1` byte for booleans. The derives on the protocol types are the
//! schema; this module owns the encode/decode entry points and maps failures onto
//! [`MultisigError`].
//!
//! Decoding is strict: truncated input, trailing bytes, unknown enum discriminants and boolean
//! bytes other than `0`/`1` are all rejected, and no partial value is ever returned.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::hash::{hash, Hash};

use crate::error::{MultisigError, MultisigResult};

/// Encode a value into its wire representation
pub fn encode<T: BorshSerialize>(value: &T) -> MultisigResult<Vec<u8>> {
    borsh::to_vec(value).map_err(MultisigError::SerializationError)
}

/// Decode exactly one value from `bytes`
pub fn decode<T: BorshDeserialize>(bytes: &[u8]) -> MultisigResult<T> {
    borsh::from_slice(bytes).map_err(MultisigError::DeserializationError)
}

/// Length of the encoded value in bytes, without allocating
pub fn encoded_len<T: BorshSerialize>(value: &T) -> MultisigResult<usize> {
    borsh::object_length(value).map_err(MultisigError::SerializationError)
}

/// SHA-256 of the encoded value; the content hash used to seed group and proposal addresses
pub fn content_hash<T: BorshSerialize>(value: &T) -> MultisigResult<Hash> {
    Ok(hash(&encode(value)?))
}
