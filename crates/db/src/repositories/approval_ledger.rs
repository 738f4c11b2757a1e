//! Approval ledger repository: the audit log and the quorum-bearing decisions.
//!
//! Both relations are append-only; rows are only removed together with their request.

use std::sync::Arc;

use permit_hub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder,
};

use crate::entities::{
    ApprovalDecision, ApprovalLog, approval_decision, approval_log, approval_log::DecisionStatus,
};

/// Repository for approval log and decision operations.
#[derive(Clone)]
pub struct ApprovalLedgerRepository {
    db: Arc<DatabaseConnection>,
}

impl ApprovalLedgerRepository {
    /// Create a new approval ledger repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // ==================== Log Operations ====================

    /// Append a log row.
    pub async fn append_log_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: approval_log::ActiveModel,
    ) -> AppResult<approval_log::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the log of a request in decision order.
    pub async fn find_logs_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        request_id: &str,
    ) -> AppResult<Vec<approval_log::Model>> {
        ApprovalLog::find()
            .filter(approval_log::Column::RequestId.eq(request_id))
            .order_by(approval_log::Column::DecidedAt, Order::Asc)
            .order_by(approval_log::Column::Id, Order::Asc)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the log of a request in decision order.
    pub async fn find_logs(&self, request_id: &str) -> AppResult<Vec<approval_log::Model>> {
        self.find_logs_in(self.db.as_ref(), request_id).await
    }

    // ==================== Decision Operations ====================

    /// Append a decision row.
    pub async fn append_decision_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: approval_decision::ActiveModel,
    ) -> AppResult<approval_decision::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the approved decisions of a request at one step, in insertion order.
    pub async fn find_approved_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        request_id: &str,
        step_order: i32,
    ) -> AppResult<Vec<approval_decision::Model>> {
        ApprovalDecision::find()
            .filter(approval_decision::Column::RequestId.eq(request_id))
            .filter(approval_decision::Column::StepOrder.eq(step_order))
            .filter(approval_decision::Column::Status.eq(DecisionStatus::Approved))
            .order_by(approval_decision::Column::DecidedAt, Order::Asc)
            .order_by(approval_decision::Column::Id, Order::Asc)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get every decision of a request, in insertion order.
    pub async fn find_decisions(
        &self,
        request_id: &str,
    ) -> AppResult<Vec<approval_decision::Model>> {
        ApprovalDecision::find()
            .filter(approval_decision::Column::RequestId.eq(request_id))
            .order_by(approval_decision::Column::DecidedAt, Order::Asc)
            .order_by(approval_decision::Column::Id, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_decision(id: &str, role_id: &str) -> approval_decision::Model {
        approval_decision::Model {
            id: id.to_string(),
            request_id: "r1".to_string(),
            step_order: 0,
            role_id: role_id.to_string(),
            user_id: format!("user-{role_id}"),
            decided_at: Utc::now().into(),
            status: DecisionStatus::Approved,
            note: None,
        }
    }

    #[tokio::test]
    async fn test_find_approved_in() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_decision("d1", "health"),
                    create_test_decision("d2", "health"),
                ]])
                .into_connection(),
        );

        let repo = ApprovalLedgerRepository::new(db.clone());
        let decisions = repo.find_approved_in(db.as_ref(), "r1", 0).await.unwrap();

        assert_eq!(decisions.len(), 2);
        assert!(decisions.iter().all(|d| d.role_id == "health"));
    }
}
