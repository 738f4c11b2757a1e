//! Role entity.
//!
//! Roles are owned by the identity system; this table mirrors the identifiers
//! and display names the approval flow needs to reference.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "role")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Display name, e.g. "clerk" or "head of subdistrict".
    pub name: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::approval_step_role::Entity")]
    StepRoles,
}

impl Related<super::approval_step_role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StepRoles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
