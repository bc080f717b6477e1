//! Content hashing and identifier encodings
//!
//! Public payloads are addressed by CIDv0 (`Qm...`), a sha2-256 multihash.
//! The ledger only carries the 32-byte digest, written as `0x` followed by 64
//! hex digits, so both directions are provided here.

use std::str::FromStr;

use cid::multihash::Multihash;
use cid::{Cid, Version};
use multihash_codetable::{Code, MultihashDigest};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

const DIGEST_SIZE: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("Invalid IPFS hash: {0}")]
    InvalidIpfsHash(String),

    #[error("Invalid sha256 digest: {0}")]
    InvalidDigest(String),

    #[error("Invalid hex identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// `0x`-prefixed hex sha256 of raw bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("0x{}", hex::encode(digest))
}

/// Compact JSON serialization used for everything that gets hashed or stored.
///
/// `serde_json::Map` keeps keys sorted, so equal values serialize identically.
pub fn to_canonical_json(value: &Value) -> Result<Vec<u8>, ContentError> {
    serde_json::to_vec(value).map_err(|e| ContentError::SerializationError(e.to_string()))
}

/// Digest of a JSON value, used as the content hash of private structured content.
pub fn json_digest(value: &Value) -> Result<String, ContentError> {
    Ok(sha256_hex(&to_canonical_json(value)?))
}

/// CIDv0 address of a byte string.
pub fn ipfs_hash_for(data: &[u8]) -> Result<String, ContentError> {
    let cid = Cid::new_v0(Code::Sha2_256.digest(data))
        .map_err(|e| ContentError::InvalidIpfsHash(e.to_string()))?;
    Ok(cid.to_string())
}

/// Convert a CIDv0 address into the `0x` digest form recorded on the ledger.
pub fn ipfs_hash_to_sha256(ipfs_hash: &str) -> Result<String, ContentError> {
    let cid = Cid::from_str(ipfs_hash)
        .map_err(|e| ContentError::InvalidIpfsHash(format!("{}: {}", ipfs_hash, e)))?;

    let hash = cid.hash();
    if cid.version() != Version::V0
        || hash.code() != u64::from(Code::Sha2_256)
        || hash.digest().len() != DIGEST_SIZE
    {
        return Err(ContentError::InvalidIpfsHash(ipfs_hash.to_string()));
    }

    Ok(format!("0x{}", hex::encode(hash.digest())))
}

/// Convert a `0x` digest back into the CIDv0 address used to fetch it.
pub fn sha256_to_ipfs_hash(digest: &str) -> Result<String, ContentError> {
    let stripped = strip_hex_prefix(digest);
    let bytes =
        hex::decode(stripped).map_err(|_| ContentError::InvalidDigest(digest.to_string()))?;
    if bytes.len() != DIGEST_SIZE {
        return Err(ContentError::InvalidDigest(digest.to_string()));
    }

    let hash = Multihash::<64>::wrap(u64::from(Code::Sha2_256), &bytes)
        .map_err(|e| ContentError::InvalidDigest(format!("{}: {}", digest, e)))?;
    let cid = Cid::new_v0(hash).map_err(|e| ContentError::InvalidDigest(e.to_string()))?;
    Ok(cid.to_string())
}

/// Ledger form of an identifier: `0x` plus the 16 UUID bytes in hex.
pub fn uuid_to_hex(id: Uuid) -> String {
    format!("0x{}", id.simple())
}

pub fn hex_to_uuid(value: &str) -> Result<Uuid, ContentError> {
    let stripped = strip_hex_prefix(value);
    if stripped.len() != 32 {
        return Err(ContentError::InvalidIdentifier(value.to_string()));
    }
    let bytes =
        hex::decode(stripped).map_err(|_| ContentError::InvalidIdentifier(value.to_string()))?;
    Uuid::from_slice(&bytes).map_err(|_| ContentError::InvalidIdentifier(value.to_string()))
}

/// Where an unstructured private document is placed in the document exchange.
pub fn exchange_path(definition_name: &str, instance_id: Uuid, file_name: &str) -> String {
    format!("{}/{}/{}", definition_name, instance_id, file_name)
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}
