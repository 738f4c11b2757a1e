//! Permit request repository: requests with their dynamic data and uploaded documents.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use permit_hub_common::{AppError, AppResult};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
};
use serde::{Deserialize, Serialize};

use crate::entities::{
    ApprovalDecision, ApprovalLog, FinalDocument, PermitRequest, RequestDynamicData,
    UploadedDocument, approval_decision, approval_log, final_document, permit_request,
    permit_request::RequestStatus, request_dynamic_data, uploaded_document,
};

const IN_FLIGHT: [RequestStatus; 2] = [RequestStatus::Submitted, RequestStatus::InProgress];

/// Sort key for listing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSortKey {
    #[default]
    CreatedAt,
    SubmittedAt,
    Code,
    Status,
}

impl RequestSortKey {
    const fn column(self) -> permit_request::Column {
        match self {
            Self::CreatedAt => permit_request::Column::CreatedAt,
            Self::SubmittedAt => permit_request::Column::SubmittedAt,
            Self::Code => permit_request::Column::Code,
            Self::Status => permit_request::Column::Status,
        }
    }
}

/// Filters for listing requests. All set filters must match.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub company_id: Option<String>,
    pub citizen_ids: Vec<String>,
    pub submitted_from: Option<DateTime<Utc>>,
    pub submitted_to: Option<DateTime<Utc>>,
    pub status: Option<RequestStatus>,
    pub permit_type_id: Option<String>,
    pub subdistrict_id: Option<String>,
}

impl RequestFilter {
    fn apply(&self, mut query: Select<PermitRequest>) -> Select<PermitRequest> {
        if let Some(company_id) = &self.company_id {
            query = query.filter(permit_request::Column::CompanyId.eq(company_id.as_str()));
        }
        if !self.citizen_ids.is_empty() {
            query = query.filter(permit_request::Column::CitizenId.is_in(self.citizen_ids.clone()));
        }
        if let Some(from) = self.submitted_from {
            query = query.filter(permit_request::Column::SubmittedAt.gte(from));
        }
        if let Some(to) = self.submitted_to {
            query = query.filter(permit_request::Column::SubmittedAt.lte(to));
        }
        if let Some(status) = self.status {
            query = query.filter(permit_request::Column::Status.eq(status));
        }
        if let Some(permit_type_id) = &self.permit_type_id {
            query = query.filter(permit_request::Column::PermitTypeId.eq(permit_type_id.as_str()));
        }
        if let Some(subdistrict_id) = &self.subdistrict_id {
            query = query.filter(permit_request::Column::SubdistrictId.eq(subdistrict_id.as_str()));
        }
        query
    }
}

/// Repository for permit request operations.
#[derive(Clone)]
pub struct PermitRequestRepository {
    db: Arc<DatabaseConnection>,
}

impl PermitRequestRepository {
    /// Create a new permit request repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    // ==================== Request Operations ====================

    /// Find a request by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<permit_request::Model>> {
        PermitRequest::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a request by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<permit_request::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Permit request not found: {id}")))
    }

    /// Load a request and take a row lock on it for the rest of the transaction.
    ///
    /// The lock clause is dropped on backends without row locks (SQLite), where
    /// the connection-level write lock serialises writers instead.
    pub async fn lock_by_id_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<permit_request::Model> {
        PermitRequest::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Permit request not found: {id}")))
    }

    /// List requests matching a filter, returning one page and the total count.
    pub async fn list(
        &self,
        filter: &RequestFilter,
        sort: RequestSortKey,
        order: Order,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<permit_request::Model>, u64)> {
        let total = filter
            .apply(PermitRequest::find())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let items = filter
            .apply(PermitRequest::find())
            .order_by(sort.column(), order)
            .order_by(permit_request::Column::Id, Order::Asc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((items, total))
    }

    /// Count requests of a permit type that are still awaiting decisions.
    pub async fn count_in_flight_by_type_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        permit_type_id: &str,
    ) -> AppResult<u64> {
        PermitRequest::find()
            .filter(permit_request::Column::PermitTypeId.eq(permit_type_id))
            .filter(permit_request::Column::Status.is_in(IN_FLIGHT))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the IDs of the approved or rejected requests of a permit type.
    pub async fn find_closed_ids_by_type_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        permit_type_id: &str,
    ) -> AppResult<Vec<String>> {
        PermitRequest::find()
            .select_only()
            .column(permit_request::Column::Id)
            .filter(permit_request::Column::PermitTypeId.eq(permit_type_id))
            .filter(permit_request::Column::Status.is_not_in(IN_FLIGHT))
            .into_tuple::<String>()
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a request.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: permit_request::ActiveModel,
    ) -> AppResult<permit_request::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a request.
    pub async fn update_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: permit_request::ActiveModel,
    ) -> AppResult<permit_request::Model> {
        model
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Overwrite the stored role set of an open request, but only while it is
    /// still at `step_order`. Returns whether a row was written.
    pub async fn set_step_roles_if_at(
        &self,
        id: &str,
        step_order: i32,
        role_ids: &[String],
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = PermitRequest::update_many()
            .col_expr(
                permit_request::Column::CurrentStepRoles,
                Expr::value(serde_json::json!(role_ids)),
            )
            .col_expr(
                permit_request::Column::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(now)),
            )
            .filter(permit_request::Column::Id.eq(id))
            .filter(permit_request::Column::CurrentStep.eq(step_order))
            .filter(permit_request::Column::Status.is_in(IN_FLIGHT))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Delete a request row. Owned rows must be removed first (see [`Self::delete_owned_in`]).
    pub async fn delete_in<C: ConnectionTrait>(&self, conn: &C, id: &str) -> AppResult<()> {
        PermitRequest::delete_by_id(id)
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Remove every row owned by a request: dynamic data, uploaded documents,
    /// the approval ledger and final documents.
    pub async fn delete_owned_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        request_id: &str,
    ) -> AppResult<()> {
        RequestDynamicData::delete_many()
            .filter(request_dynamic_data::Column::RequestId.eq(request_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        UploadedDocument::delete_many()
            .filter(uploaded_document::Column::RequestId.eq(request_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        ApprovalLog::delete_many()
            .filter(approval_log::Column::RequestId.eq(request_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        ApprovalDecision::delete_many()
            .filter(approval_decision::Column::RequestId.eq(request_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        FinalDocument::delete_many()
            .filter(final_document::Column::RequestId.eq(request_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    // ==================== Dynamic Data Operations ====================

    /// Find the dynamic data of a request.
    pub async fn find_dynamic_data_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        request_id: &str,
    ) -> AppResult<Option<request_dynamic_data::Model>> {
        RequestDynamicData::find()
            .filter(request_dynamic_data::Column::RequestId.eq(request_id))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the dynamic data of a request.
    pub async fn find_dynamic_data(
        &self,
        request_id: &str,
    ) -> AppResult<Option<request_dynamic_data::Model>> {
        self.find_dynamic_data_in(self.db.as_ref(), request_id).await
    }

    /// Insert the dynamic data of a request.
    pub async fn create_dynamic_data_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: request_dynamic_data::ActiveModel,
    ) -> AppResult<request_dynamic_data::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update the dynamic data of a request.
    pub async fn update_dynamic_data_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: request_dynamic_data::ActiveModel,
    ) -> AppResult<request_dynamic_data::Model> {
        model
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ==================== Uploaded Document Operations ====================

    /// Get the uploaded documents of a request, oldest first.
    pub async fn find_documents(
        &self,
        request_id: &str,
    ) -> AppResult<Vec<uploaded_document::Model>> {
        UploadedDocument::find()
            .filter(uploaded_document::Column::RequestId.eq(request_id))
            .order_by(uploaded_document::Column::CreatedAt, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert an uploaded document.
    pub async fn create_document_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: uploaded_document::ActiveModel,
    ) -> AppResult<uploaded_document::Model> {
        model
            .insert(conn)
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
    use serde_json::json;
    use std::collections::BTreeMap;

    fn create_test_request(id: &str, status: RequestStatus) -> permit_request::Model {
        permit_request::Model {
            id: id.to_string(),
            code: format!("PRM-20250601-{}", id.to_uppercase()),
            permit_type_id: "pt1".to_string(),
            citizen_id: "c1".to_string(),
            company_id: None,
            subdistrict_id: None,
            submitted_at: Utc::now().into(),
            current_step: 0,
            current_step_roles: json!(["clerk"]),
            status,
            approved_at: None,
            register_number: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<permit_request::Model>::new()])
                .into_connection(),
        );

        let repo = PermitRequestRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lock_by_id_returns_request() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_request("r1", RequestStatus::Submitted)]])
                .into_connection(),
        );

        let repo = PermitRequestRepository::new(db);
        let request = repo.lock_by_id_in(repo.db(), "r1").await.unwrap();

        assert_eq!(request.id, "r1");
        assert_eq!(request.current_role_ids(), vec!["clerk".to_string()]);
    }

    #[tokio::test]
    async fn test_count_in_flight_by_type() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[BTreeMap::from([(
                    "num_items",
                    sea_orm::Value::BigInt(Some(3)),
                )])]])
                .into_connection(),
        );

        let repo = PermitRequestRepository::new(db);
        let count = repo.count_in_flight_by_type_in(repo.db(), "pt1").await.unwrap();

        assert_eq!(count, 3);
    }

    #[test]
    fn test_sort_key_deserializes_snake_case() {
        let key: RequestSortKey = serde_json::from_str("\"submitted_at\"").unwrap();
        assert_eq!(key, RequestSortKey::SubmittedAt);
        assert_eq!(RequestSortKey::default(), RequestSortKey::CreatedAt);
    }
}
