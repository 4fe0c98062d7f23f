//! Request/Response types for the queue API

use serde::{Deserialize, Serialize};
use waitroom_core::DEFAULT_QUEUE;

fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct UserQuery {
    #[serde(default = "default_queue")]
    pub queue: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowQuery {
    #[serde(default = "default_queue")]
    pub queue: String,
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowedQuery {
    #[serde(default = "default_queue")]
    pub queue: String,
    pub user_id: i64,
    pub token: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserResponse {
    /// One-based rank, or -1 if already promoted
    pub rank: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowUserResponse {
    pub requested_count: u64,
    pub allowed_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedUserResponse {
    pub allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankNumberResponse {
    pub rank: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub reason: String,
}
