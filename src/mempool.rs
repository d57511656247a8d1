//! Transaction pool for transactions not yet sealed into a block

use crate::transaction::Transaction;

/// Pending transactions in submission order.
///
/// The pool does no validation and allows duplicates. Only the ledger drains
/// it, when sealing a block.
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction, returning the pool size after insertion.
    pub fn add_transaction(&mut self, tx: Transaction) -> usize {
        self.transactions.push(tx);
        self.transactions.len()
    }

    /// Take every pending transaction, leaving the pool empty.
    pub fn drain(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.transactions)
    }

    /// Snapshot of the pending transactions.
    pub fn get_all_transactions(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_returns_size() {
        let mut pool = Mempool::new();
        assert_eq!(pool.add_transaction(Transaction::new("A", "B", 1)), 1);
        assert_eq!(pool.add_transaction(Transaction::new("A", "B", 1)), 2);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_drain_preserves_order_and_empties() {
        let mut pool = Mempool::new();
        let txs = vec![
            Transaction::new("A", "B", 1),
            Transaction::new("B", "C", 2),
            Transaction::new("C", "A", 3),
        ];
        for tx in &txs {
            pool.add_transaction(tx.clone());
        }

        assert_eq!(pool.drain(), txs);
        assert!(pool.is_empty());
        assert!(pool.drain().is_empty());
    }

    #[test]
    fn test_snapshot_does_not_drain() {
        let mut pool = Mempool::new();
        pool.add_transaction(Transaction::new("A", "B", 1));
        assert_eq!(pool.get_all_transactions().len(), 1);
        assert_eq!(pool.len(), 1);
    }
}
