//! Final permit document produced on approval.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "final_document")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub request_id: String,

    pub filename: String,

    #[sea_orm(column_type = "Text")]
    pub url: String,

    /// MD5 of the rendered file, when the renderer reports one.
    #[sea_orm(nullable)]
    pub checksum: Option<String>,

    /// User whose decision triggered generation.
    pub generated_by: String,

    pub generated_at: DateTimeWithTimeZone,
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
