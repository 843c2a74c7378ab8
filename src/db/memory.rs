//! Process-local operator store.
//!
//! Behaves like the SQL store as far as the auth service can tell: ids start at
//! 1 and increase, and duplicate usernames or emails are rejected the way the
//! unique indexes reject them. Used for tests and throwaway runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{OperatorAccount, OperatorId, OperatorStore};

#[derive(Default)]
struct Inner {
    last_id: i32,
    operators: BTreeMap<OperatorId, OperatorAccount>,
}

#[derive(Default)]
pub struct InMemoryOperatorStore {
    inner: RwLock<Inner>,
}

impl InMemoryOperatorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.operators.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OperatorStore for InMemoryOperatorStore {
    async fn save(&self, account: &OperatorAccount) -> anyhow::Result<OperatorId> {
        let mut inner = self.inner.write().await;

        if inner
            .operators
            .values()
            .any(|op| op.username() == account.username())
        {
            anyhow::bail!("UNIQUE constraint failed: operators.username");
        }
        if inner
            .operators
            .values()
            .any(|op| op.email() == account.email())
        {
            anyhow::bail!("UNIQUE constraint failed: operators.email");
        }

        inner.last_id += 1;
        let id = OperatorId::new(inner.last_id);
        inner.operators.insert(id, account.clone().with_id(id));

        Ok(id)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<OperatorAccount>> {
        let inner = self.inner.read().await;
        Ok(inner
            .operators
            .values()
            .find(|op| op.username() == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<OperatorAccount>> {
        let inner = self.inner.read().await;
        Ok(inner
            .operators
            .values()
            .find(|op| op.email() == email)
            .cloned())
    }

    async fn find_by_id(&self, id: OperatorId) -> anyhow::Result<Option<OperatorAccount>> {
        Ok(self.inner.read().await.operators.get(&id).cloned())
    }
}
