use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::domain::{OperatorAccount, OperatorId, OperatorStore, StoredOperator};
use crate::entities::{operators, prelude::*};

/// SQL-backed implementation of the operator store port.
pub struct SeaOrmOperatorStore {
    conn: DatabaseConnection,
}

impl SeaOrmOperatorStore {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: operators::Model) -> Result<OperatorAccount> {
        Ok(OperatorAccount::restore(StoredOperator {
            id: model.id,
            created_at: parse_timestamp(&model.created_at)?,
            updated_at: parse_timestamp(&model.updated_at)?,
            username: model.username,
            email: model.email,
            password_hash: model.password_hash,
            active: model.active,
        }))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp: {raw}"))
}

#[async_trait]
impl OperatorStore for SeaOrmOperatorStore {
    async fn save(&self, account: &OperatorAccount) -> Result<OperatorId> {
        let active_model = operators::ActiveModel {
            username: Set(account.username().to_string()),
            email: Set(account.email().to_string()),
            password_hash: Set(account.password_hash().to_string()),
            active: Set(account.is_active()),
            created_at: Set(account.created_at().to_rfc3339()),
            updated_at: Set(account.updated_at().to_rfc3339()),
            ..Default::default()
        };

        let res = Operators::insert(active_model)
            .exec(&self.conn)
            .await
            .context("Failed to insert operator")?;

        Ok(OperatorId::new(res.last_insert_id))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<OperatorAccount>> {
        let model = Operators::find()
            .filter(operators::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query operator by username")?;

        model.map(Self::map_model).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<OperatorAccount>> {
        let model = Operators::find()
            .filter(operators::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query operator by email")?;

        model.map(Self::map_model).transpose()
    }

    async fn find_by_id(&self, id: OperatorId) -> Result<Option<OperatorAccount>> {
        let model = Operators::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query operator by ID")?;

        model.map(Self::map_model).transpose()
    }
}
