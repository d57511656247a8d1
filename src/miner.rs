//! Proof-of-work mining
//!
//! A proof `p` is valid for the previous proof `l` when
//! `sha256(format!("{l}{p}"))`, in hex, starts with [`DIFFICULTY_PREFIX`].
//! The difficulty is fixed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::blockchain::{Block, Blockchain};
use crate::error::ChainError;
use crate::transaction::Transaction;

/// Leading hex digits a challenge hash must show (16 bits).
pub const DIFFICULTY_PREFIX: &str = "0000";

/// Does `candidate` solve the puzzle posed by `last_proof`?
pub fn valid_proof(last_proof: u64, candidate: u64) -> bool {
    let digest = Sha256::digest(format!("{}{}", last_proof, candidate).as_bytes());
    hex::encode(digest).starts_with(DIFFICULTY_PREFIX)
}

/// Smallest proof that satisfies [`valid_proof`] for `last_proof`.
///
/// Blocks until a solution is found; there is no upper bound.
pub fn proof_of_work(last_proof: u64) -> u64 {
    let mut proof = 0;
    while !valid_proof(last_proof, proof) {
        proof += 1;
    }
    proof
}

/// [`proof_of_work`] that gives up with `None` once `cancel` is set.
///
/// The flag is checked before every candidate, so an uncancelled search
/// returns the same minimal proof.
pub fn proof_of_work_cancellable(last_proof: u64, cancel: &AtomicBool) -> Option<u64> {
    let mut proof = 0;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        if valid_proof(last_proof, proof) {
            return Some(proof);
        }
        proof += 1;
    }
}

/// Search for the next proof and seal a block with it.
///
/// The search runs on the blocking pool without holding the ledger lock, so
/// transactions keep flowing in while it runs. Sealing happens under a single
/// write guard; if another caller sealed a block in the meantime the proof is
/// stale and the search starts over against the new last block.
///
/// `reward`, when given, is queued right before sealing so it lands in the
/// mined block.
pub async fn mine_next_block(
    chain: &Arc<RwLock<Blockchain>>,
    cancel: Arc<AtomicBool>,
    reward: Option<Transaction>,
) -> Result<Block, ChainError> {
    loop {
        let (last_index, last_proof) = {
            let bc = chain.read().await;
            let last = bc.last_block();
            (last.index, last.proof)
        };

        let flag = cancel.clone();
        let search =
            tokio::task::spawn_blocking(move || proof_of_work_cancellable(last_proof, &flag));
        let proof = search
            .await
            .map_err(|e| ChainError::InvalidBlock(format!("Proof search task failed: {}", e)))?
            .ok_or(ChainError::MiningCancelled)?;

        let mut bc = chain.write().await;
        let last = bc.last_block();
        if last.index != last_index || last.proof != last_proof {
            tracing::debug!(
                expected = last_index,
                found = last.index,
                "proof went stale before sealing, retrying"
            );
            continue;
        }

        if let Some(tx) = reward.clone() {
            bc.add_transaction(tx);
        }
        let block = bc.new_block(proof, None);
        tracing::info!(
            index = block.index,
            proof = block.proof,
            transactions = block.transactions.len(),
            "block.mined"
        );
        return Ok(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_proof_checks_prefix() {
        let proof = proof_of_work(100);
        let digest = hex::encode(Sha256::digest(format!("100{}", proof).as_bytes()));
        assert!(digest.starts_with("0000"));
        assert!(valid_proof(100, proof));
    }

    #[test]
    fn test_proof_is_minimal() {
        for last_proof in [0u64, 1, 100, 35293] {
            let proof = proof_of_work(last_proof);
            assert!(valid_proof(last_proof, proof));
            assert!((0..proof).all(|p| !valid_proof(last_proof, p)));
        }
    }

    #[test]
    fn test_challenge_has_no_separator() {
        // "12" + "3" and "1" + "23" form the same challenge string.
        assert_eq!(valid_proof(12, 3), valid_proof(1, 23));
        assert_eq!(valid_proof(4, 56), valid_proof(45, 6));
    }

    #[test]
    fn test_cancellable_matches_plain_search() {
        let flag = AtomicBool::new(false);
        assert_eq!(proof_of_work_cancellable(100, &flag), Some(proof_of_work(100)));
    }

    #[test]
    fn test_cancelled_search_returns_none() {
        let flag = AtomicBool::new(true);
        assert_eq!(proof_of_work_cancellable(100, &flag), None);
    }

    #[tokio::test]
    async fn test_mine_next_block_seals_pool() {
        let chain = Arc::new(RwLock::new(Blockchain::new()));
        chain.write().await.new_transaction("A", "B", 5);

        let block = mine_next_block(&chain, Arc::new(AtomicBool::new(false)), None)
            .await
            .unwrap();

        let bc = chain.read().await;
        assert_eq!(block.index, 2);
        assert_eq!(block.transactions, vec![Transaction::new("A", "B", 5)]);
        assert!(valid_proof(100, block.proof));
        assert!(bc.mempool().is_empty());
        assert!(bc.validate().is_ok());
    }

    #[tokio::test]
    async fn test_mine_next_block_appends_reward_last() {
        let chain = Arc::new(RwLock::new(Blockchain::new()));
        chain.write().await.new_transaction("A", "B", 5);

        let reward = Transaction::reward("node", 1);
        let block = mine_next_block(&chain, Arc::new(AtomicBool::new(false)), Some(reward.clone()))
            .await
            .unwrap();

        assert_eq!(block.transactions, vec![Transaction::new("A", "B", 5), reward]);
    }

    #[tokio::test]
    async fn test_mine_next_block_cancelled() {
        let chain = Arc::new(RwLock::new(Blockchain::new()));
        chain.write().await.new_transaction("A", "B", 5);

        let result = mine_next_block(&chain, Arc::new(AtomicBool::new(true)), None).await;
        assert_eq!(result, Err(ChainError::MiningCancelled));

        let bc = chain.read().await;
        assert_eq!(bc.len(), 1);
        assert_eq!(bc.mempool().len(), 1);
    }
}
