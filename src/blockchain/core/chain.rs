use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

use super::hash::hash_block;
use super::validation::validate_chain;

/// Proof recorded in the genesis block. It is never checked against the
/// proof-of-work predicate; block 2 is searched relative to it.
pub const GENESIS_PROOF: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// 1-based position in the chain.
    pub index: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    /// Hex digest of the preceding block, `None` only for genesis.
    pub previous_hash: Option<String>,
}

impl Block {
    pub fn hash(&self) -> String {
        hash_block(self)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 1 && self.previous_hash.is_none()
    }
}

/// The append-only ledger: the sealed chain plus the pool feeding the next block.
///
/// Mutation goes through `&mut self`, so sharing a `Blockchain` between
/// callers requires a lock around it; the API keeps it behind an `RwLock`.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    mempool: Mempool,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Create a ledger holding only the genesis block.
    pub fn new() -> Self {
        let mut blockchain = Blockchain {
            blocks: Vec::new(),
            mempool: Mempool::new(),
        };
        blockchain.push_block(GENESIS_PROOF, None);
        blockchain
    }

    /// Seal the pending transactions into a new block and append it.
    ///
    /// When `previous_hash` is `None` the hash of the current last block is
    /// used. The pool is always drained, so every pending transaction ends up
    /// in exactly this block.
    pub fn new_block(&mut self, proof: u64, previous_hash: Option<String>) -> Block {
        let previous_hash = previous_hash.unwrap_or_else(|| self.last_block().hash());
        self.push_block(proof, Some(previous_hash)).clone()
    }

    fn push_block(&mut self, proof: u64, previous_hash: Option<String>) -> &Block {
        let block = Block {
            index: self.blocks.len() as u64 + 1,
            timestamp: chrono::Utc::now().timestamp_millis() as u64,
            transactions: self.mempool.drain(),
            proof,
            previous_hash,
        };

        tracing::debug!(
            index = block.index,
            proof = block.proof,
            transactions = block.transactions.len(),
            "block.sealed"
        );

        self.blocks.push(block);
        &self.blocks[self.blocks.len() - 1]
    }

    /// Queue a transaction and return the index of the block it will land in.
    pub fn new_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> u64 {
        self.add_transaction(Transaction::new(sender, recipient, amount))
    }

    /// Same as [`Blockchain::new_transaction`] for an already built transaction.
    pub fn add_transaction(&mut self, tx: Transaction) -> u64 {
        let pending = self.mempool.add_transaction(tx);
        let index = self.last_block().index + 1;
        tracing::debug!(pending, destined_for = index, "transaction.queued");
        index
    }

    pub fn last_block(&self) -> &Block {
        // The genesis block is pushed in `new` and blocks are never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.mempool.get_all_transactions()
    }

    /// Re-check index, hash-link and proof-of-work over the whole chain.
    pub fn validate(&self) -> Result<(), ChainError> {
        validate_chain(&self.blocks)
    }
}
