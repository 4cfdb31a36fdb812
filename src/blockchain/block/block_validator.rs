use super::{Block, GENESIS_PREVIOUS_HASH};
use crate::proof;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidateStructureError {
    #[error("The block is at position {expected} but carries index {actual}")]
    InvalidIndex { expected: u64, actual: u64 },
    #[error("The genesis block's previous hash should be `{}`", GENESIS_PREVIOUS_HASH)]
    InvalidGenesisPreviousHash,
    #[error("The previous hash `{0}` is not a 64 character lowercase hex digest")]
    MalformedPreviousHash(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum ValidateSemanticsError {
    #[error("The previous hash does not match the preceding block's hash (expected {expected}, found {actual})")]
    HashMismatch { expected: String, actual: String },
    #[error("The proof {proof} is not valid for the preceding proof {last_proof}")]
    InvalidProof { last_proof: u64, proof: u64 },
}

pub struct BlockValidator;

impl BlockValidator {
    /// Validates whether a block is structurally correct at the given
    /// 1-based chain position.
    pub fn validate_structure(blk: &Block, position: u64) -> Result<(), ValidateStructureError> {
        use ValidateStructureError::*;

        if blk.index() != position {
            return Err(InvalidIndex {
                expected: position,
                actual: blk.index(),
            });
        }

        if blk.is_genesis() {
            if blk.previous_hash() != GENESIS_PREVIOUS_HASH {
                return Err(InvalidGenesisPreviousHash);
            }

            return Ok(());
        }

        let hash = blk.previous_hash();
        if hash.len() != 64 || !hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(MalformedPreviousHash(hash.to_string()));
        }

        Ok(())
    }

    /// Validates whether a block correctly follows `prev`.
    ///
    /// **Warning**: This function expects a structurally correct block.
    pub fn validate_semantics(blk: &Block, prev: &Block) -> Result<(), ValidateSemanticsError> {
        use ValidateSemanticsError::*;

        let expected = prev.canonical_hash();
        if blk.previous_hash() != expected {
            return Err(HashMismatch {
                expected,
                actual: blk.previous_hash().to_string(),
            });
        }

        if !proof::is_valid_proof(prev.proof(), blk.proof()) {
            return Err(InvalidProof {
                last_proof: prev.proof(),
                proof: blk.proof(),
            });
        }

        Ok(())
    }
}
