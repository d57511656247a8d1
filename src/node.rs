//! Process bootstrap: tracing, node identity, ledger construction and the API server.

use crate::blockchain::Blockchain;
use crate::config::Config;
use crate::error::ChainError;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Random identifier for this node, 32 lowercase hex characters.
///
/// Used as the recipient of mining rewards. It carries no key material.
pub fn node_identifier() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Install the global fmt subscriber. `RUST_LOG` takes precedence over the
/// configured filter; calling this twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub struct Node {
    pub config: Config,
    pub node_id: String,
    pub blockchain: Arc<RwLock<Blockchain>>,
}

impl Node {
    /// Build the ledger and identity. The ledger lives for the whole process
    /// and starts from genesis on every run.
    pub fn init(config: Config) -> Self {
        let node_id = node_identifier();
        let blockchain = Arc::new(RwLock::new(Blockchain::new()));

        info!(
            node_id = %node_id,
            addr = %config.bind_address(),
            "Starting powledger node"
        );

        Self {
            config,
            node_id,
            blockchain,
        }
    }

    /// Run the API server until shutdown.
    #[cfg(feature = "api")]
    pub async fn start(self) -> Result<(), ChainError> {
        let api_node = Arc::new(crate::api::Node::new_shared(
            self.blockchain.clone(),
            self.node_id.clone(),
            &self.config.mining,
        ));

        if self.config.mining.autostart {
            if let Err(e) = api_node.start_mining().await {
                tracing::warn!("Failed to start background miner: {:?}", e);
            }
        }

        crate::api::run_api_server(api_node, &self.config.bind_address()).await
    }

    #[cfg(not(feature = "api"))]
    pub async fn start(self) -> Result<(), ChainError> {
        Err(ChainError::ConfigError("API feature not enabled in this build".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_identifier_shape() {
        let id = node_identifier();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, node_identifier());
    }

    #[tokio::test]
    async fn test_init_starts_from_genesis() {
        let node = Node::init(Config::default());
        let chain = node.blockchain.read().await;
        assert_eq!(chain.len(), 1);
        assert!(chain.last_block().is_genesis());
    }
}
