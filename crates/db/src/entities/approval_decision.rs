//! Approval decision entity: approvals counted toward a step's quorum.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub use super::approval_log::DecisionStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_decision")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub request_id: String,

    pub step_order: i32,

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
