//! Citizen repository.

use std::sync::Arc;

use permit_hub_common::{AppError, AppResult};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::{Citizen, citizen};

/// Repository for citizen operations.
#[derive(Clone)]
pub struct CitizenRepository {
    db: Arc<DatabaseConnection>,
}

impl CitizenRepository {
    /// Create a new citizen repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a citizen by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<citizen::Model>> {
        Citizen::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a citizen by national identity number.
    pub async fn find_by_nik_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        nik: &str,
    ) -> AppResult<Option<citizen::Model>> {
        Citizen::find()
            .filter(citizen::Column::Nik.eq(nik))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a citizen unless `nik` is already registered, then return the
    /// stored row for `nik`.
    ///
    /// A concurrent registration of the same identity number resolves to the
    /// row that won the unique index instead of failing.
    pub async fn insert_or_get_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        nik: &str,
        model: citizen::ActiveModel,
    ) -> AppResult<citizen::Model> {
        Citizen::insert(model)
            .on_conflict(
                OnConflict::column(citizen::Column::Nik)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_nik_in(conn, nik).await?.ok_or_else(|| {
            AppError::InvariantBroken(format!("Citizen {nik} vanished after insert"))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_by_nik() {
        let citizen = citizen::Model {
            id: "c1".to_string(),
            nik: "3201010101010001".to_string(),
            name: "Siti".to_string(),
            email: None,
            phone: None,
            address: None,
            created_at: Utc::now().into(),
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[citizen.clone()]])
                .into_connection(),
        );

        let repo = CitizenRepository::new(db.clone());
        let found = repo
            .find_by_nik_in(db.as_ref(), "3201010101010001")
            .await
            .unwrap();

        assert_eq!(found, Some(citizen));
    }
}
