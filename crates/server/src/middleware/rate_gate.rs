//! Per-user allow/deny check in front of expensive routes.

use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait RateGate: Send + Sync {
    /// Whether `user_id` may perform `action` right now.
    async fn check(&self, user_id: Uuid, action: &str) -> bool;
}

/// Admits every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl RateGate for AllowAll {
    async fn check(&self, _user_id: Uuid, _action: &str) -> bool {
        true
    }
}
