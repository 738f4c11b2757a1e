//! Approval log entity: one row per decision call, for audit.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Outcome of a single decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl From<bool> for DecisionStatus {
    fn from(approved: bool) -> Self {
        if approved { Self::Approved } else { Self::Rejected }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub request_id: String,

    pub step_order: i32,

    /// Name of the role the decider acted under.
    pub step_role: String,

    pub role_id: String,

    pub user_id: String,

    pub decided_at: DateTimeWithTimeZone,

    pub status: DecisionStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::permit_request::Entity",
        from = "Column::RequestId",
        to = "super::permit_request::Column::Id",
        on_delete = "Cascade"
    )]
    Request,
}

impl Related<super::permit_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Request.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
