//! Final document repository.

use std::sync::Arc;

use permit_hub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder,
};

use crate::entities::{FinalDocument, final_document};

/// Repository for final document operations.
#[derive(Clone)]
pub struct FinalDocumentRepository {
    db: Arc<DatabaseConnection>,
}

impl FinalDocumentRepository {
    /// Create a new final document repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get the final documents of a request, newest first.
    pub async fn find_by_request(
        &self,
        request_id: &str,
    ) -> AppResult<Vec<final_document::Model>> {
        FinalDocument::find()
            .filter(final_document::Column::RequestId.eq(request_id))
            .order_by(final_document::Column::GeneratedAt, Order::Desc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a final document.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: final_document::ActiveModel,
    ) -> AppResult<final_document::Model> {
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

    #[tokio::test]
    async fn test_find_by_request() {
        let document = final_document::Model {
            id: "f1".to_string(),
            request_id: "r1".to_string(),
            filename: "domicile-r1.json".to_string(),
            url: "/files/permits/r1/domicile-r1.json".to_string(),
            checksum: None,
            generated_by: "u1".to_string(),
            generated_at: Utc::now().into(),
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[document.clone()]])
                .into_connection(),
        );

        let repo = FinalDocumentRepository::new(db);
        let documents = repo.find_by_request("r1").await.unwrap();

        assert_eq!(documents, vec![document]);
    }
}
