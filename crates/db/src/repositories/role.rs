//! Role repository.

use std::sync::Arc;

use permit_hub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder,
};

use crate::entities::{Role, role};

/// Repository for role operations.
#[derive(Clone)]
pub struct RoleRepository {
    db: Arc<DatabaseConnection>,
}

impl RoleRepository {
    /// Create a new role repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a role by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<role::Model>> {
        self.find_by_id_in(self.db.as_ref(), id).await
    }

    /// Find a role by ID on the given connection.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<Option<role::Model>> {
        Role::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find roles by IDs. Unknown IDs are skipped.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<role::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Role::find()
            .filter(role::Column::Id.is_in(ids.iter().cloned()))
            .order_by(role::Column::Name, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all roles by name.
    pub async fn list(&self) -> AppResult<Vec<role::Model>> {
        Role::find()
            .order_by(role::Column::Name, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a role.
    pub async fn create(&self, model: role::ActiveModel) -> AppResult<role::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a role.
    pub async fn update(&self, model: role::ActiveModel) -> AppResult<role::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a role.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Role::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_by_ids_empty_skips_query() {
        // No results are appended: issuing a query would fail.
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = RoleRepository::new(db);
        let roles = repo.find_by_ids(&[]).await.unwrap();

        assert!(roles.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let role = role::Model {
            id: "clerk".to_string(),
            name: "Clerk".to_string(),
            created_at: Utc::now().into(),
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[role.clone()]])
                .into_connection(),
        );

        let repo = RoleRepository::new(db);
        let found = repo.find_by_id("clerk").await.unwrap();

        assert_eq!(found, Some(role));
    }
}
