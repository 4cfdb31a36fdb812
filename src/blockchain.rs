pub mod block;
pub mod transaction;

use self::{
    block::{
        Block, BlockValidator, ValidateSemanticsError, ValidateStructureError,
        GENESIS_PREVIOUS_HASH, GENESIS_PROOF,
    },
    transaction::Transaction,
};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum LedgerError {
    #[error("The blockchain has no blocks")]
    EmptyChain,
    #[error("`{0}` is not a valid proof (expected a non-negative integer)")]
    MalformedProof(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum ValidateChainError {
    #[error("Block {index} is malformed: {source}")]
    InvalidStructure {
        index: u64,
        source: ValidateStructureError,
    },
    #[error("Block {index} does not follow its predecessor: {source}")]
    InvalidSemantics {
        index: u64,
        source: ValidateSemanticsError,
    },
}

/*
    The chain and the pending pool are kept in the same struct so that they
    are always mutated together: whoever holds `&mut Blockchain` (directly or
    through a single Mutex) sees a block creation as one indivisible step.
    The only way to obtain a Blockchain is `new()`, which always creates
    the genesis block.
*/

#[derive(Clone, Debug)]
pub struct Blockchain {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
}

impl Blockchain {
    pub fn new() -> Self {
        let mut blockchain = Self {
            blocks: vec![],
            pending: vec![],
        };

        blockchain.push_block(GENESIS_PREVIOUS_HASH.to_string(), GENESIS_PROOF);

        blockchain
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    // the constructor always creates the genesis block,
    // so EmptyChain is a broken invariant rather than an expected outcome
    pub fn last_block(&self) -> Result<&Block, LedgerError> {
        self.blocks.last().ok_or(LedgerError::EmptyChain)
    }

    pub fn last_proof(&self) -> Result<u64, LedgerError> {
        self.last_block().map(Block::proof)
    }

    /// Creates a block holding every pending transaction and appends it.
    ///
    /// When `previous_hash` is `None` or empty, the canonical hash
    /// of the current last block is used.
    pub fn create_block(
        &mut self,
        previous_hash: Option<&str>,
        proof: u64,
    ) -> Result<&Block, LedgerError> {
        let previous_hash = match previous_hash {
            Some(hash) if !hash.is_empty() => hash.to_string(),
            _ => self.last_block()?.canonical_hash(),
        };

        Ok(self.push_block(previous_hash, proof))
    }

    /// Adds a transaction to the pending pool.
    ///
    /// Returns the index of the block expected to hold it, i.e. the one after
    /// the current last block. This is only a prediction: if blocks get
    /// created by other callers before this transaction is mined, it may
    /// end up in a different one.
    pub fn submit_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: i64,
    ) -> Result<u64, LedgerError> {
        let tsx = Transaction::new(sender, recipient, amount);
        log::trace!("Pending transaction: {:?}", tsx);
        self.pending.push(tsx);

        Ok(self.last_block()?.index() + 1)
    }

    /// Checks the whole chain: block structure, hash linkage and proofs.
    pub fn validate(&self) -> Result<(), ValidateChainError> {
        for (position, blk) in (1u64..).zip(&self.blocks) {
            BlockValidator::validate_structure(blk, position).map_err(|source| {
                ValidateChainError::InvalidStructure {
                    index: blk.index(),
                    source,
                }
            })?;
        }

        self.blocks.windows(2).try_for_each(|pair| {
            BlockValidator::validate_semantics(&pair[1], &pair[0]).map_err(|source| {
                ValidateChainError::InvalidSemantics {
                    index: pair[1].index(),
                    source,
                }
            })
        })
    }

    fn push_block(&mut self, previous_hash: String, proof: u64) -> &Block {
        let blk = Block::new(
            self.blocks.len() as u64 + 1,
            Block::current_timestamp(),
            std::mem::take(&mut self.pending),
            proof,
            previous_hash,
        );

        log::debug!(
            "Created block {} with {} transactions",
            blk.index(),
            blk.transactions().len()
        );

        self.blocks.push(blk);
        &self.blocks[self.blocks.len() - 1]
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof;
    use std::{
        sync::{Arc, Mutex},
        thread,
    };

    fn mine(blockchain: &mut Blockchain) -> Block {
        let proof = proof::find_proof(blockchain.last_proof().unwrap());
        blockchain.create_block(None, proof).unwrap().clone()
    }

    #[test]
    fn test_genesis() {
        let blockchain = Blockchain::new();
        assert_eq!(blockchain.len(), 1);

        let genesis = blockchain.last_block().unwrap();
        assert_eq!(genesis.index(), 1);
        assert_eq!(genesis.proof(), GENESIS_PROOF);
        assert_eq!(genesis.previous_hash(), GENESIS_PREVIOUS_HASH);
        assert!(genesis.transactions().is_empty());
        assert!(blockchain.pending().is_empty());
    }

    #[test]
    fn test_empty_chain() {
        let blockchain = Blockchain {
            blocks: vec![],
            pending: vec![],
        };

        assert_eq!(blockchain.last_block(), Err(LedgerError::EmptyChain));

        let mut blockchain = blockchain;
        assert_eq!(
            blockchain.create_block(None, 0).map(|_| ()),
            Err(LedgerError::EmptyChain)
        );
    }

    #[test]
    fn test_submission_prediction() {
        let mut blockchain = Blockchain::new();
        assert_eq!(blockchain.submit_transaction("a", "b", 10), Ok(2));
        assert_eq!(blockchain.submit_transaction("b", "c", 5), Ok(2));

        blockchain.create_block(None, 0).unwrap();
        assert_eq!(blockchain.submit_transaction("c", "a", 1), Ok(3));
    }

    #[test]
    fn test_pool_drain() {
        let mut blockchain = Blockchain::new();
        blockchain.submit_transaction("a", "b", 10).unwrap();
        blockchain.submit_transaction("b", "c", -4).unwrap();

        let before = blockchain.pending().to_vec();
        let blk = blockchain.create_block(None, 7).unwrap().clone();

        assert!(blockchain.pending().is_empty());
        assert_eq!(blk.transactions(), &before[..]);
        assert_eq!(blk.index(), 2);
        assert_eq!(blk.proof(), 7);
    }

    #[test]
    fn test_committed_block_is_detached_from_pool() {
        let mut blockchain = Blockchain::new();
        blockchain.submit_transaction("a", "b", 10).unwrap();
        let blk = blockchain.create_block(None, 0).unwrap().clone();

        blockchain.submit_transaction("x", "y", 99).unwrap();

        assert_eq!(blockchain.blocks()[1], blk);
        assert_eq!(blockchain.blocks()[1].transactions().len(), 1);
        assert_eq!(blockchain.pending().len(), 1);
    }

    #[test]
    fn test_previous_hash() {
        let mut blockchain = Blockchain::new();
        let genesis_hash = blockchain.last_block().unwrap().canonical_hash();

        let blk = blockchain.create_block(None, 0).unwrap();
        assert_eq!(blk.previous_hash(), genesis_hash);

        // an empty hash counts as omitted
        let second_hash = blockchain.last_block().unwrap().canonical_hash();
        let blk = blockchain.create_block(Some(""), 0).unwrap();
        assert_eq!(blk.previous_hash(), second_hash);

        let blk = blockchain.create_block(Some("explicit"), 0).unwrap();
        assert_eq!(blk.previous_hash(), "explicit");
    }

    #[test]
    fn test_chain_linkage() {
        let mut blockchain = Blockchain::new();
        for i in 0..3 {
            blockchain.submit_transaction("a", "b", i).unwrap();
            mine(&mut blockchain);
        }

        assert_eq!(blockchain.len(), 4);
        for pair in blockchain.blocks().windows(2) {
            assert_eq!(pair[1].previous_hash(), pair[0].canonical_hash());
            assert_eq!(pair[1].index(), pair[0].index() + 1);
        }

        assert_eq!(blockchain.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_tampering() {
        let mut blockchain = Blockchain::new();
        mine(&mut blockchain);
        mine(&mut blockchain);
        assert_eq!(blockchain.validate(), Ok(()));

        // rewrite a committed transaction list
        let mut tampered = blockchain.clone();
        let blk = tampered.blocks[1].clone();
        tampered.blocks[1] = Block::new(
            blk.index(),
            blk.timestamp(),
            vec![Transaction::new("mallory", "mallory", 1000)],
            blk.proof(),
            blk.previous_hash().to_string(),
        );
        assert!(matches!(
            tampered.validate(),
            Err(ValidateChainError::InvalidSemantics {
                index: 3,
                source: ValidateSemanticsError::HashMismatch { .. }
            })
        ));

        // an arbitrary proof
        let mut bad_proof = blockchain.clone();
        bad_proof.create_block(None, 0).unwrap();
        assert!(matches!(
            bad_proof.validate(),
            Err(ValidateChainError::InvalidSemantics {
                index: 4,
                source: ValidateSemanticsError::InvalidProof { .. }
            })
        ));

        // a reordered chain
        let mut reordered = blockchain.clone();
        reordered.blocks.swap(1, 2);
        assert!(matches!(
            reordered.validate(),
            Err(ValidateChainError::InvalidStructure {
                index: 3,
                source: ValidateStructureError::InvalidIndex { .. }
            })
        ));
    }

    #[test]
    fn test_concurrent_submissions_are_never_split() {
        let blockchain = Arc::new(Mutex::new(Blockchain::new()));

        let submitters = (0..4)
            .map(|t| {
                let blockchain = Arc::clone(&blockchain);
                thread::spawn(move || {
                    for i in 0..50 {
                        let mut guard = blockchain.lock().unwrap();
                        guard.submit_transaction(format!("s{}", t), "r", i).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();

        let miner = {
            let blockchain = Arc::clone(&blockchain);
            thread::spawn(move || {
                for _ in 0..10 {
                    blockchain.lock().unwrap().create_block(None, 0).unwrap();
                    thread::yield_now();
                }
            })
        };

        for handle in submitters {
            handle.join().unwrap();
        }
        miner.join().unwrap();

        let mut guard = blockchain.lock().unwrap();
        guard.create_block(None, 0).unwrap();

        let committed = guard
            .blocks()
            .iter()
            .map(|blk| blk.transactions().len())
            .sum::<usize>();
        assert_eq!(committed, 200);
        assert!(guard.pending().is_empty());
    }
}
