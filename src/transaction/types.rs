/// Transaction types for powledger
use serde::{Deserialize, Serialize};

/// Sender used for the mining reward; it does not name a real account.
pub const REWARD_SENDER: &str = "0";

/// A value transfer waiting for, or sealed into, a block.
///
/// Fields are trusted as supplied; there is no signature or balance check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Reward paid to the node that sealed a block.
    pub fn reward(recipient: impl Into<String>, amount: u64) -> Self {
        Self::new(REWARD_SENDER, recipient, amount)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }
}
