//! REST API server for powledger
//!
//! Thin HTTP boundary over the ledger: transaction submission, chain listing,
//! one-shot and continuous mining, plus health and request statistics.

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::{Block, Blockchain};
use crate::config::MiningConfig;
use crate::error::ChainError;
use crate::miner;
use crate::transaction::{parse_transaction_request, RequestRejection, Transaction};

/// How long `stop_mining` waits for the background miner to wind down.
const MINING_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Node state shared by every request handler
#[derive(Clone)]
pub struct Node {
    pub blockchain: Arc<RwLock<Blockchain>>,
    pub node_id: String,
    reward: Option<u64>,
    /// Mirrors `mining.is_some()`; only written while `mining` is locked.
    is_mining: Arc<AtomicBool>,
    blocks_mined: Arc<AtomicU64>,
    mining: Arc<Mutex<Option<MiningHandle>>>,
    api_stats: Arc<RwLock<ApiStats>>,
}

/// The running background miner: its cancel flag and task.
struct MiningHandle {
    cancel: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// API statistics and monitoring
#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    mining_starts: u64,
    mining_stops: u64,
    transactions_submitted: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

/// Sets the flag when dropped, so a search outlives neither its request nor
/// its mining loop.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Node {
    /// Create a new node owning `blockchain`
    pub fn new(blockchain: Blockchain, node_id: String, mining: &MiningConfig) -> Self {
        Self::new_shared(Arc::new(RwLock::new(blockchain)), node_id, mining)
    }

    /// Create an API node over a ledger that other services also hold.
    pub fn new_shared(
        blockchain: Arc<RwLock<Blockchain>>,
        node_id: String,
        mining: &MiningConfig,
    ) -> Self {
        Self {
            blockchain,
            node_id,
            reward: mining.reward_enabled.then_some(mining.reward),
            is_mining: Arc::new(AtomicBool::new(false)),
            blocks_mined: Arc::new(AtomicU64::new(0)),
            mining: Arc::new(Mutex::new(None)),
            api_stats: Arc::new(RwLock::new(ApiStats::new())),
        }
    }

    /// Check if the background miner is running
    pub fn is_mining(&self) -> bool {
        self.is_mining.load(Ordering::Relaxed)
    }

    /// Blocks sealed by this node since startup
    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    fn reward_transaction(&self) -> Option<Transaction> {
        self.reward
            .map(|amount| Transaction::reward(self.node_id.clone(), amount))
    }

    /// Mine exactly one block. The proof search is cancelled if the returned
    /// future is dropped.
    pub async fn mine_once(&self) -> Result<Block, ChainError> {
        let cancel = CancelOnDrop(Arc::new(AtomicBool::new(false)));
        let block =
            miner::mine_next_block(&self.blockchain, cancel.0.clone(), self.reward_transaction())
                .await?;
        self.blocks_mined.fetch_add(1, Ordering::SeqCst);
        Ok(block)
    }

    /// Start mining blocks back to back until [`Node::stop_mining`] is called
    pub async fn start_mining(&self) -> Result<(), ApiError> {
        let mut control = self.mining.lock().await;
        if control.is_some() {
            return Err(ApiError::MiningAlreadyRunning);
        }

        {
            let mut stats = self.api_stats.write().await;
            stats.mining_starts += 1;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let node = self.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            node.run_miner(task_cancel).await;
        });

        *control = Some(MiningHandle { cancel, task });
        self.is_mining.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn run_miner(&self, cancel: Arc<AtomicBool>) {
        tracing::info!(node_id = %self.node_id, "mining.started");

        while !cancel.load(Ordering::SeqCst) {
            let reward = self.reward_transaction();
            match miner::mine_next_block(&self.blockchain, cancel.clone(), reward).await {
                Ok(_) => {
                    self.blocks_mined.fetch_add(1, Ordering::SeqCst);
                }
                Err(ChainError::MiningCancelled) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "mining attempt failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }

            // Small delay between mining attempts
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        // Only clear the slot if it still belongs to this run; a stop followed
        // by a new start has already replaced it.
        let mut control = self.mining.lock().await;
        if control
            .as_ref()
            .is_some_and(|handle| Arc::ptr_eq(&handle.cancel, &cancel))
        {
            *control = None;
            self.is_mining.store(false, Ordering::SeqCst);
        }
        tracing::info!(blocks_mined = self.blocks_mined(), "mining.stopped");
    }

    /// Stop the background miner, cancelling any proof search in flight
    pub async fn stop_mining(&self) -> Result<(), ApiError> {
        let handle = {
            let mut control = self.mining.lock().await;
            let handle = control.take().ok_or(ApiError::MiningNotRunning)?;
            self.is_mining.store(false, Ordering::SeqCst);
            handle
        };

        {
            let mut stats = self.api_stats.write().await;
            stats.mining_stops += 1;
        }

        let MiningHandle { cancel, mut task } = handle;
        cancel.store(true, Ordering::SeqCst);

        if tokio::time::timeout(MINING_STOP_TIMEOUT, &mut task).await.is_err() {
            task.abort();
            tracing::warn!("mining task did not stop in time, aborted");
        }

        Ok(())
    }

    /// Get API statistics
    pub async fn get_stats(&self) -> ApiStatsResponse {
        let stats = self.api_stats.read().await;
        let uptime = stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0);

        ApiStatsResponse {
            total_requests: stats.total_requests,
            successful_requests: stats.successful_requests,
            failed_requests: stats.failed_requests,
            mining_starts: stats.mining_starts,
            mining_stops: stats.mining_stops,
            transactions_submitted: stats.transactions_submitted,
            uptime_seconds: uptime,
            blocks_mined: self.blocks_mined(),
            is_mining: self.is_mining(),
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    /// A required transaction field is absent.
    MissingValues,
    InvalidInput(String),
    MiningAlreadyRunning,
    MiningNotRunning,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingValues => {
                return (StatusCode::BAD_REQUEST, "Missing values").into_response();
            }
            ApiError::BlockchainError(ChainError::MiningCancelled) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ChainError::MiningCancelled.to_string(),
            ),
            ApiError::BlockchainError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::MiningAlreadyRunning => (
                StatusCode::CONFLICT,
                "Mining is already running".to_string(),
            ),
            ApiError::MiningNotRunning => {
                (StatusCode::CONFLICT, "Mining is not running".to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

impl From<RequestRejection> for ApiError {
    fn from(rejection: RequestRejection) -> Self {
        match rejection {
            RequestRejection::MissingValues(_) => ApiError::MissingValues,
            RequestRejection::NotAnObject => {
                ApiError::InvalidInput("Request body must be a JSON object".to_string())
            }
            RequestRejection::InvalidValue { field, reason } => {
                ApiError::InvalidInput(format!("Invalid values: {} {}", field, reason))
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: Option<String>,
}

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub mining_starts: u64,
    pub mining_stops: u64,
    pub transactions_submitted: u64,
    pub uptime_seconds: u64,
    pub blocks_mined: u64,
    pub is_mining: bool,
}

#[derive(Serialize)]
struct SuccessResponse {
    message: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Request statistics middleware
async fn stats_middleware(State(node): State<Arc<Node>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    let mut stats = node.api_stats.write().await;
    stats.record_request(success);

    response
}

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        // Ledger endpoints
        .route("/mine", get(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/chain", get(full_chain))
        .route("/chain/validate", get(validate_chain))
        .route("/mempool", get(get_mempool))
        // Mining endpoints
        .route("/mining/start", post(start_mining))
        .route("/mining/stop", post(stop_mining))
        .route("/mining/status", get(get_mining_status))
        // System endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        // logging before stats so we always record timing
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(node.clone(), stats_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serve the API on `addr` until Ctrl-C, then stop the miner.
pub async fn run_api_server(node: Arc<Node>, addr: &str) -> Result<(), ChainError> {
    let app = build_api_router(node.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, node_id = %node.node_id, "api server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if node.is_mining() {
        let _ = node.stop_mining().await;
    }
    tracing::info!("api server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn mine(State(node): State<Arc<Node>>) -> Result<Json<MineResponse>, ApiError> {
    let block = node.mine_once().await?;

    Ok(Json(MineResponse {
        message: "New Block Forged".to_string(),
        index: block.index,
        transactions: block.transactions,
        proof: block.proof,
        previous_hash: block.previous_hash,
    }))
}

/// The body is read as JSON whatever the declared content type.
async fn new_transaction(
    State(node): State<Arc<Node>>,
    body: Bytes,
) -> Result<(StatusCode, Json<SuccessResponse>), ApiError> {
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidInput(format!("Request body must be JSON: {}", e)))?;
    let tx = parse_transaction_request(&value)?;

    let index = node.blockchain.write().await.add_transaction(tx);

    {
        let mut stats = node.api_stats.write().await;
        stats.transactions_submitted += 1;
    }

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse {
            message: format!("Transaction will be added to Block {}", index),
        }),
    ))
}

async fn full_chain(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let blockchain = node.blockchain.read().await;
    let chain = blockchain.blocks().to_vec();
    let length = chain.len();
    Json(ChainResponse { chain, length })
}

async fn validate_chain(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let blockchain = node.blockchain.read().await;
    match blockchain.validate() {
        Ok(()) => Json(serde_json::json!({
            "valid": true,
            "length": blockchain.len()
        })),
        Err(e) => Json(serde_json::json!({
            "valid": false,
            "length": blockchain.len(),
            "error": e.to_string()
        })),
    }
}

async fn get_mempool(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let blockchain = node.blockchain.read().await;
    let transactions = blockchain.pending_transactions();
    Json(serde_json::json!({
        "count": transactions.len(),
        "transactions": transactions
    }))
}

async fn start_mining(State(node): State<Arc<Node>>) -> Result<Json<SuccessResponse>, ApiError> {
    node.start_mining().await?;

    Ok(Json(SuccessResponse {
        message: "Mining started successfully".to_string(),
    }))
}

async fn stop_mining(State(node): State<Arc<Node>>) -> Result<Json<SuccessResponse>, ApiError> {
    node.stop_mining().await?;

    Ok(Json(SuccessResponse {
        message: "Mining stopped successfully".to_string(),
    }))
}

async fn get_mining_status(State(node): State<Arc<Node>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "is_mining": node.is_mining(),
        "blocks_mined": node.blocks_mined(),
        "node_id": node.node_id
    }))
}

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let height = node.blockchain.read().await.len();
    Json(serde_json::json!({
        "status": "healthy",
        "height": height,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_api_stats(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let stats = node.get_stats().await;
    Json(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node() -> Node {
        let mining = MiningConfig {
            reward_enabled: false,
            ..MiningConfig::default()
        };
        Node::new(Blockchain::new(), "node-under-test".to_string(), &mining)
    }

    #[tokio::test]
    async fn test_restart_after_stalled_stop_keeps_control() {
        let node = test_node();

        // Keep the miner parked on the ledger lock so stop has to time out.
        let guard = node.blockchain.write().await;
        node.start_mining().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        node.stop_mining().await.unwrap();
        assert!(!node.is_mining());

        node.start_mining().await.unwrap();
        drop(guard);

        let mut waited = Duration::ZERO;
        while node.blocks_mined() == 0 && waited < Duration::from_secs(30) {
            tokio::time::sleep(Duration::from_millis(50)).await;
            waited += Duration::from_millis(50);
        }
        assert!(node.blocks_mined() >= 1);
        assert!(node.is_mining());

        node.stop_mining().await.unwrap();
        assert!(!node.is_mining());
        let mined = node.blocks_mined();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(node.blocks_mined(), mined);

        assert!(matches!(node.stop_mining().await, Err(ApiError::MiningNotRunning)));
        assert!(node.blockchain.read().await.validate().is_ok());
    }

    #[tokio::test]
    async fn test_quick_restart_is_not_cleared_by_old_task() {
        let node = test_node();

        node.start_mining().await.unwrap();
        node.stop_mining().await.unwrap();
        node.start_mining().await.unwrap();

        // Give any leftover task from the first run time to exit.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(node.is_mining());
        assert!(matches!(node.start_mining().await, Err(ApiError::MiningAlreadyRunning)));

        node.stop_mining().await.unwrap();
        assert!(!node.is_mining());
    }
}
