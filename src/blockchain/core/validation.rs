use crate::error::ChainError;
use crate::miner::valid_proof;

use super::chain::Block;

/// Check that `blocks` forms a well-linked chain starting at genesis.
pub fn validate_chain(blocks: &[Block]) -> Result<(), ChainError> {
    let genesis = blocks.first().ok_or_else(|| {
        ChainError::InvalidBlock("Chain is empty; expected a genesis block.".to_string())
    })?;

    if genesis.index != 1 {
        return Err(ChainError::InvalidBlock(format!(
            "Genesis block must have index 1, but got {}.",
            genesis.index
        )));
    }
    if genesis.previous_hash.is_some() {
        return Err(ChainError::InvalidBlockLinkage);
    }

    for (position, pair) in blocks.windows(2).enumerate() {
        let (previous, block) = (&pair[0], &pair[1]);
        let expected_index = position as u64 + 2;

        if block.index != expected_index {
            return Err(ChainError::InvalidBlock(format!(
                "Invalid block index. Expected {}, but got {}.",
                expected_index, block.index
            )));
        }

        if block.previous_hash.as_deref() != Some(previous.hash().as_str()) {
            return Err(ChainError::InvalidBlockLinkage);
        }

        if !valid_proof(previous.proof, block.proof) {
            return Err(ChainError::InvalidProofOfWork);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Blockchain;
    use crate::miner::proof_of_work;

    fn mined_chain(blocks: usize) -> Vec<Block> {
        let mut chain = Blockchain::new();
        for i in 0..blocks {
            chain.new_transaction("A", "B", i as u64 + 1);
            let proof = proof_of_work(chain.last_block().proof);
            chain.new_block(proof, None);
        }
        chain.blocks().to_vec()
    }

    #[test]
    fn test_accepts_mined_chain() {
        assert!(validate_chain(&mined_chain(3)).is_ok());
    }

    #[test]
    fn test_genesis_only_chain_is_valid() {
        assert!(validate_chain(&mined_chain(0)).is_ok());
    }

    #[test]
    fn test_rejects_empty_chain() {
        assert!(matches!(validate_chain(&[]), Err(ChainError::InvalidBlock(_))));
    }

    #[test]
    fn test_rejects_tampered_transaction() {
        let mut blocks = mined_chain(3);
        blocks[1].transactions[0].amount = 1_000;
        assert_eq!(validate_chain(&blocks), Err(ChainError::InvalidBlockLinkage));
    }

    #[test]
    fn test_rejects_bad_proof() {
        let mut blocks = mined_chain(2);
        let last = blocks.len() - 1;
        let previous_proof = blocks[last - 1].proof;
        let bad = (0..).find(|p| !valid_proof(previous_proof, *p)).unwrap();
        blocks[last].proof = bad;
        assert_eq!(validate_chain(&blocks), Err(ChainError::InvalidProofOfWork));
    }

    #[test]
    fn test_rejects_wrong_index() {
        let mut blocks = mined_chain(2);
        blocks[2].index = 7;
        assert!(matches!(validate_chain(&blocks), Err(ChainError::InvalidBlock(_))));
    }
}
