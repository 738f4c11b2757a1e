//! Permit type repository: permit types, their field definitions and requirement links.

use std::sync::Arc;

use permit_hub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    Order, QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

use crate::entities::{
    FieldDefinition, PermitType, PermitTypeRequirement, Requirement, field_definition, permit_type,
    permit_type_requirement, requirement,
};

/// Repository for permit type operations.
#[derive(Clone)]
pub struct PermitTypeRepository {
    db: Arc<DatabaseConnection>,
}

impl PermitTypeRepository {
    /// Create a new permit type repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    // ==================== Permit Type Operations ====================

    /// Find a permit type by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<permit_type::Model>> {
        self.find_by_id_in(self.db.as_ref(), id).await
    }

    /// Find a permit type by ID on the given connection.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<Option<permit_type::Model>> {
        PermitType::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Load a permit type and lock its row against concurrent deletes and
    /// submissions for the rest of the transaction.
    pub async fn lock_by_id_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<permit_type::Model> {
        PermitType::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Permit type not found: {id}")))
    }

    /// Load a permit type under a shared row lock, so it cannot be deleted
    /// before the transaction ends.
    pub async fn share_lock_by_id_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<permit_type::Model> {
        PermitType::find_by_id(id)
            .lock_shared()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Permit type not found: {id}")))
    }

    /// Get a permit type by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<permit_type::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Permit type not found: {id}")))
    }

    /// Find a permit type by slug.
    ///
    /// With a subdistrict, a type scoped to that subdistrict wins over a global
    /// type with the same slug. Without one, only global types match.
    pub async fn find_by_slug(
        &self,
        slug: &str,
        subdistrict_id: Option<&str>,
    ) -> AppResult<Option<permit_type::Model>> {
        let scope = match subdistrict_id {
            Some(subdistrict) => Condition::any()
                .add(permit_type::Column::SubdistrictId.eq(subdistrict))
                .add(permit_type::Column::SubdistrictId.is_null()),
            None => Condition::all().add(permit_type::Column::SubdistrictId.is_null()),
        };

        let candidates = PermitType::find()
            .filter(permit_type::Column::Slug.eq(slug))
            .filter(scope)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let (scoped, global): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|t| t.subdistrict_id.is_some());
        Ok(scoped.into_iter().next().or_else(|| global.into_iter().next()))
    }

    /// Check whether a slug is taken within exactly this subdistrict scope.
    pub async fn slug_taken(
        &self,
        slug: &str,
        subdistrict_id: Option<&str>,
        exclude_id: Option<&str>,
    ) -> AppResult<bool> {
        let mut query = PermitType::find().filter(permit_type::Column::Slug.eq(slug));

        query = match subdistrict_id {
            Some(subdistrict) => query.filter(permit_type::Column::SubdistrictId.eq(subdistrict)),
            None => query.filter(permit_type::Column::SubdistrictId.is_null()),
        };

        if let Some(id) = exclude_id {
            query = query.filter(permit_type::Column::Id.ne(id));
        }

        let existing = query
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(existing.is_some())
    }

    /// List permit types, optionally restricted to a subdistrict (plus global types).
    pub async fn list(&self, subdistrict_id: Option<&str>) -> AppResult<Vec<permit_type::Model>> {
        let mut query = PermitType::find().order_by(permit_type::Column::Name, Order::Asc);

        if let Some(subdistrict) = subdistrict_id {
            query = query.filter(
                Condition::any()
                    .add(permit_type::Column::SubdistrictId.eq(subdistrict))
                    .add(permit_type::Column::SubdistrictId.is_null()),
            );
        }

        query
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new permit type.
    pub async fn create(&self, model: permit_type::ActiveModel) -> AppResult<permit_type::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a permit type.
    pub async fn update(&self, model: permit_type::ActiveModel) -> AppResult<permit_type::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a permit type.
    pub async fn delete_in<C: ConnectionTrait>(&self, conn: &C, id: &str) -> AppResult<()> {
        PermitType::delete_by_id(id)
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Atomically bump and return the register sequence of a permit type.
    ///
    /// Must run inside the transaction that records the final approval so the
    /// number is only consumed when the approval commits.
    pub async fn next_register_seq_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        permit_type_id: &str,
    ) -> AppResult<i64> {
        let result = PermitType::update_many()
            .col_expr(
                permit_type::Column::RegisterSeq,
                Expr::col(permit_type::Column::RegisterSeq).add(1),
            )
            .filter(permit_type::Column::Id.eq(permit_type_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "Permit type not found: {permit_type_id}"
            )));
        }

        let permit_type = self
            .find_by_id_in(conn, permit_type_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Permit type not found: {permit_type_id}")))?;

        Ok(permit_type.register_seq)
    }

    // ==================== Field Definition Operations ====================

    /// Get field definitions of a permit type, in display order.
    pub async fn find_fields(
        &self,
        permit_type_id: &str,
    ) -> AppResult<Vec<field_definition::Model>> {
        FieldDefinition::find()
            .filter(field_definition::Column::PermitTypeId.eq(permit_type_id))
            .order_by(field_definition::Column::DisplayOrder, Order::Asc)
            .order_by(field_definition::Column::CreatedAt, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a field definition by ID.
    pub async fn find_field_by_id(&self, id: &str) -> AppResult<Option<field_definition::Model>> {
        FieldDefinition::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a field definition by key within a permit type.
    pub async fn find_field_by_key(
        &self,
        permit_type_id: &str,
        key: &str,
    ) -> AppResult<Option<field_definition::Model>> {
        FieldDefinition::find()
            .filter(field_definition::Column::PermitTypeId.eq(permit_type_id))
            .filter(field_definition::Column::Key.eq(key))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a field definition.
    pub async fn create_field(
        &self,
        model: field_definition::ActiveModel,
    ) -> AppResult<field_definition::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a field definition.
    pub async fn update_field(
        &self,
        model: field_definition::ActiveModel,
    ) -> AppResult<field_definition::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a field definition.
    pub async fn delete_field(&self, id: &str) -> AppResult<()> {
        FieldDefinition::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete every field definition of a permit type.
    pub async fn delete_fields_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        permit_type_id: &str,
    ) -> AppResult<()> {
        FieldDefinition::delete_many()
            .filter(field_definition::Column::PermitTypeId.eq(permit_type_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ==================== Requirement Link Operations ====================

    /// Get the requirements attached to a permit type, joined through the link
    /// record so each carries the per-type mandatory flag.
    pub async fn find_requirements(
        &self,
        permit_type_id: &str,
    ) -> AppResult<Vec<(permit_type_requirement::Model, requirement::Model)>> {
        let links = PermitTypeRequirement::find()
            .filter(permit_type_requirement::Column::PermitTypeId.eq(permit_type_id))
            .find_also_related(Requirement)
            .order_by(requirement::Column::Code, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(links
            .into_iter()
            .filter_map(|(link, requirement)| requirement.map(|r| (link, r)))
            .collect())
    }

    /// Find the link between a permit type and a requirement.
    pub async fn find_requirement_link(
        &self,
        permit_type_id: &str,
        requirement_id: &str,
    ) -> AppResult<Option<permit_type_requirement::Model>> {
        PermitTypeRequirement::find()
            .filter(permit_type_requirement::Column::PermitTypeId.eq(permit_type_id))
            .filter(permit_type_requirement::Column::RequirementId.eq(requirement_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a requirement link.
    pub async fn create_requirement_link(
        &self,
        model: permit_type_requirement::ActiveModel,
    ) -> AppResult<permit_type_requirement::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a requirement link.
    pub async fn update_requirement_link(
        &self,
        model: permit_type_requirement::ActiveModel,
    ) -> AppResult<permit_type_requirement::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove the link between a permit type and a requirement.
    pub async fn delete_requirement_link(
        &self,
        permit_type_id: &str,
        requirement_id: &str,
    ) -> AppResult<u64> {
        let result = PermitTypeRequirement::delete_many()
            .filter(permit_type_requirement::Column::PermitTypeId.eq(permit_type_id))
            .filter(permit_type_requirement::Column::RequirementId.eq(requirement_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Remove every requirement link of a permit type.
    pub async fn delete_requirement_links_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        permit_type_id: &str,
    ) -> AppResult<()> {
        PermitTypeRequirement::delete_many()
            .filter(permit_type_requirement::Column::PermitTypeId.eq(permit_type_id))
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

    fn create_test_type(id: &str, slug: &str, subdistrict_id: Option<&str>) -> permit_type::Model {
        permit_type::Model {
            id: id.to_string(),
            slug: slug.to_string(),
            name: "Domicile letter".to_string(),
            description: None,
            subdistrict_id: subdistrict_id.map(ToString::to_string),
            company_id: None,
            template_id: None,
            template_config: None,
            register_seq: 0,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_slug_returns_type() {
        let permit_type = create_test_type("pt1", "domicile", Some("sd1"));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[permit_type.clone()]])
                .into_connection(),
        );

        let repo = PermitTypeRepository::new(db);
        let found = repo.find_by_slug("domicile", Some("sd1")).await.unwrap();

        assert_eq!(found.unwrap().id, "pt1");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<permit_type::Model>::new()])
                .into_connection(),
        );

        let repo = PermitTypeRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_slug_taken() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_type("pt1", "domicile", None)]])
                .append_query_results([Vec::<permit_type::Model>::new()])
                .into_connection(),
        );

        let repo = PermitTypeRepository::new(db);

        assert!(repo.slug_taken("domicile", None, None).await.unwrap());
        assert!(!repo.slug_taken("domicile", None, Some("pt1")).await.unwrap());
    }
}
