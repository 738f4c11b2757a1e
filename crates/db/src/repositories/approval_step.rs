//! Approval step repository: the ordered approval flow of each permit type.

use std::sync::Arc;

use permit_hub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder,
};

use crate::entities::{
    ApprovalStep, ApprovalStepRole, Role, approval_step, approval_step_role, role,
};

/// An approval step together with the roles authorised on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepWithRoles {
    pub step: approval_step::Model,
    pub roles: Vec<role::Model>,
}

impl StepWithRoles {
    /// IDs of the authorised roles.
    #[must_use]
    pub fn role_ids(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.id.clone()).collect()
    }

    /// Whether a role is authorised on this step.
    #[must_use]
    pub fn authorises(&self, role_id: &str) -> bool {
        self.roles.iter().any(|r| r.id == role_id)
    }
}

/// Repository for approval step operations.
#[derive(Clone)]
pub struct ApprovalStepRepository {
    db: Arc<DatabaseConnection>,
}

impl ApprovalStepRepository {
    /// Create a new approval step repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Find a step by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<approval_step::Model>> {
        ApprovalStep::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all steps of a permit type, ordered by step order.
    pub async fn find_by_type(&self, permit_type_id: &str) -> AppResult<Vec<approval_step::Model>> {
        ApprovalStep::find()
            .filter(approval_step::Column::PermitTypeId.eq(permit_type_id))
            .order_by(approval_step::Column::StepOrder, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the step of a permit type at exactly this order.
    pub async fn find_by_order_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        permit_type_id: &str,
        step_order: i32,
    ) -> AppResult<Option<approval_step::Model>> {
        ApprovalStep::find()
            .filter(approval_step::Column::PermitTypeId.eq(permit_type_id))
            .filter(approval_step::Column::StepOrder.eq(step_order))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the step with the lowest order of a permit type.
    pub async fn find_first(&self, permit_type_id: &str) -> AppResult<Option<approval_step::Model>> {
        ApprovalStep::find()
            .filter(approval_step::Column::PermitTypeId.eq(permit_type_id))
            .order_by(approval_step::Column::StepOrder, Order::Asc)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the step with the greatest order of a permit type.
    pub async fn find_last(&self, permit_type_id: &str) -> AppResult<Option<approval_step::Model>> {
        ApprovalStep::find()
            .filter(approval_step::Column::PermitTypeId.eq(permit_type_id))
            .order_by(approval_step::Column::StepOrder, Order::Desc)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the step that follows `step_order`: strictly greater and minimal.
    pub async fn find_next_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        permit_type_id: &str,
        step_order: i32,
    ) -> AppResult<Option<approval_step::Model>> {
        ApprovalStep::find()
            .filter(approval_step::Column::PermitTypeId.eq(permit_type_id))
            .filter(approval_step::Column::StepOrder.gt(step_order))
            .order_by(approval_step::Column::StepOrder, Order::Asc)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the roles authorised on a step, ordered by name.
    pub async fn find_roles_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        step_id: &str,
    ) -> AppResult<Vec<role::Model>> {
        let links = ApprovalStepRole::find()
            .filter(approval_step_role::Column::StepId.eq(step_id))
            .find_also_related(Role)
            .order_by(role::Column::Name, Order::Asc)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(links.into_iter().filter_map(|(_, role)| role).collect())
    }

    /// Get the roles authorised on a step.
    pub async fn find_roles(&self, step_id: &str) -> AppResult<Vec<role::Model>> {
        self.find_roles_in(self.db.as_ref(), step_id).await
    }

    /// Load a step together with its roles.
    pub async fn with_roles_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        step: approval_step::Model,
    ) -> AppResult<StepWithRoles> {
        let roles = self.find_roles_in(conn, &step.id).await?;
        Ok(StepWithRoles { step, roles })
    }

    /// Get the full approval flow of a permit type with roles.
    pub async fn find_flow(&self, permit_type_id: &str) -> AppResult<Vec<StepWithRoles>> {
        let steps = self.find_by_type(permit_type_id).await?;
        let mut flow = Vec::with_capacity(steps.len());
        for step in steps {
            flow.push(self.with_roles_in(self.db.as_ref(), step).await?);
        }
        Ok(flow)
    }

    /// Create a step.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: approval_step::ActiveModel,
    ) -> AppResult<approval_step::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a step.
    pub async fn update_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: approval_step::ActiveModel,
    ) -> AppResult<approval_step::Model> {
        model
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a step and its role authorisations.
    pub async fn delete_in<C: ConnectionTrait>(&self, conn: &C, step_id: &str) -> AppResult<()> {
        self.delete_roles_in(conn, step_id).await?;
        ApprovalStep::delete_by_id(step_id)
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete every step (and role authorisation) of a permit type.
    pub async fn delete_by_type_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        permit_type_id: &str,
    ) -> AppResult<()> {
        let steps = ApprovalStep::find()
            .filter(approval_step::Column::PermitTypeId.eq(permit_type_id))
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for step in steps {
            self.delete_in(conn, &step.id).await?;
        }
        Ok(())
    }

    /// Authorise a role on a step.
    pub async fn add_role_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: approval_step_role::ActiveModel,
    ) -> AppResult<approval_step_role::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove every role authorisation of a step.
    pub async fn delete_roles_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        step_id: &str,
    ) -> AppResult<()> {
        ApprovalStepRole::delete_many()
            .filter(approval_step_role::Column::StepId.eq(step_id))
            .exec(conn)
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

    fn create_test_step(id: &str, order: i32, mode: &str) -> approval_step::Model {
        approval_step::Model {
            id: id.to_string(),
            permit_type_id: "pt1".to_string(),
            step_order: order,
            description: None,
            approval_mode: mode.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn create_test_role(id: &str) -> role::Model {
        role::Model {
            id: id.to_string(),
            name: id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_step_with_roles_authorises() {
        let step = StepWithRoles {
            step: create_test_step("s1", 0, "all"),
            roles: vec![create_test_role("health"), create_test_role("fire")],
        };

        assert!(step.authorises("health"));
        assert!(step.authorises("fire"));
        assert!(!step.authorises("clerk"));
        assert_eq!(step.role_ids(), vec!["health".to_string(), "fire".to_string()]);
    }

    #[tokio::test]
    async fn test_find_last_returns_step() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_step("s2", 2, "single")]])
                .into_connection(),
        );

        let repo = ApprovalStepRepository::new(db);
        let last = repo.find_last("pt1").await.unwrap().unwrap();

        assert_eq!(last.step_order, 2);
    }

    #[tokio::test]
    async fn test_find_next_none_after_last_step() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<approval_step::Model>::new()])
                .into_connection(),
        );

        let repo = ApprovalStepRepository::new(db);
        let next = repo.find_next_in(repo.db(), "pt1", 2).await.unwrap();

        assert!(next.is_none());
    }
}
