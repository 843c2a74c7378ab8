//! Persistence port for operator accounts.

use async_trait::async_trait;

use super::{OperatorAccount, OperatorId};

/// Durable storage for operator accounts.
///
/// Lookups return `Ok(None)` on a miss; `Err` is reserved for the store itself
/// failing. Implementations own their retry and timeout policy.
#[async_trait]
pub trait OperatorStore: Send + Sync {
    /// Insert a new account and return the id the store assigned to it.
    async fn save(&self, account: &OperatorAccount) -> anyhow::Result<OperatorId>;

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<OperatorAccount>>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<OperatorAccount>>;

    async fn find_by_id(&self, id: OperatorId) -> anyhow::Result<Option<OperatorAccount>>;
}
