//! Permit type entity: the template a request is submitted against.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "permit_type")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// URL-safe identifier, unique within a subdistrict.
    #[sea_orm(indexed)]
    pub slug: String,

    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Subdistrict this type is scoped to (None = available everywhere).
    #[sea_orm(nullable)]
    pub subdistrict_id: Option<String>,

    /// Owning company (tenant), if any.
    #[sea_orm(nullable)]
    pub company_id: Option<String>,

    /// Reference to the document template used by the renderer.
    #[sea_orm(nullable)]
    pub template_id: Option<String>,

    /// Renderer-specific template configuration.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub template_config: Option<Json>,

    /// Last register sequence number handed out for this type.
    #[sea_orm(default_value = 0)]
    pub register_seq: i64,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::field_definition::Entity")]
    FieldDefinitions,
    #[sea_orm(has_many = "super::approval_step::Entity")]
    ApprovalSteps,
    #[sea_orm(has_many = "super::permit_type_requirement::Entity")]
    Requirements,
    #[sea_orm(has_many = "super::permit_request::Entity")]
    Requests,
}

impl Related<super::field_definition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FieldDefinitions.def()
    }
}

impl Related<super::approval_step::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalSteps.def()
    }
}

impl Related<super::permit_type_requirement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requirements.def()
    }
}

impl Related<super::permit_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
