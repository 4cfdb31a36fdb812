mod block_validator;

pub use block_validator::{BlockValidator, ValidateSemanticsError, ValidateStructureError};

use super::transaction::Transaction;
use crate::canonical;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::time::SystemTime;

/// The previous hash carried by the genesis block in place of a real hash.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// The proof carried by the genesis block.
pub const GENESIS_PROOF: u64 = 100;

// Field declaration order is part of the canonical encoding
// and must stay alphabetical.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Block {
    index: u64,
    previous_hash: String,
    proof: u64,
    timestamp: f64,
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(
        index: u64,
        timestamp: f64,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: String,
    ) -> Self {
        Self {
            index,
            previous_hash,
            proof,
            timestamp,
            transactions,
        }
    }

    /// Seconds since the Unix epoch, with sub-second precision.
    pub fn current_timestamp() -> f64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    /// Returns the lowercase hex SHA-256 digest of the block's canonical encoding.
    ///
    /// Only stored fields are hashed, so the result depends on nothing but
    /// the block's contents.
    pub fn canonical_hash(&self) -> String {
        let bytes = canonical::to_canonical_vec(self).expect("Failed to encode block");
        hex::encode(Sha256::digest(bytes))
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 1
    }

    // getters

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn proof(&self) -> u64 {
        self.proof
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }
}
