//! Requirement repository.

use std::sync::Arc;

use permit_hub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder,
};

use crate::entities::{Requirement, requirement};

/// Repository for requirement operations.
#[derive(Clone)]
pub struct RequirementRepository {
    db: Arc<DatabaseConnection>,
}

impl RequirementRepository {
    /// Create a new requirement repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a requirement by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<requirement::Model>> {
        Requirement::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a requirement by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<requirement::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Requirement not found: {id}")))
    }

    /// Find a requirement by code within a subdistrict scope.
    pub async fn find_by_code(
        &self,
        code: &str,
        subdistrict_id: Option<&str>,
    ) -> AppResult<Option<requirement::Model>> {
        let query = Requirement::find().filter(requirement::Column::Code.eq(code));
        let query = match subdistrict_id {
            Some(subdistrict) => query.filter(requirement::Column::SubdistrictId.eq(subdistrict)),
            None => query.filter(requirement::Column::SubdistrictId.is_null()),
        };

        query
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List requirements available to a subdistrict (its own plus global ones).
    pub async fn list(&self, subdistrict_id: Option<&str>) -> AppResult<Vec<requirement::Model>> {
        let mut query = Requirement::find().order_by(requirement::Column::Code, Order::Asc);

        if let Some(subdistrict) = subdistrict_id {
            query = query.filter(
                Condition::any()
                    .add(requirement::Column::SubdistrictId.eq(subdistrict))
                    .add(requirement::Column::SubdistrictId.is_null()),
            );
        }

        query
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a requirement.
    pub async fn create(&self, model: requirement::ActiveModel) -> AppResult<requirement::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a requirement.
    pub async fn update(&self, model: requirement::ActiveModel) -> AppResult<requirement::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a requirement. Attachments to permit types cascade.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Requirement::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
