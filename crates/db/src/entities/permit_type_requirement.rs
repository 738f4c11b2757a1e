//! Link between a permit type and a requirement, carrying the per-type mandatory flag.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "permit_type_requirement")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub permit_type_id: String,

    #[sea_orm(indexed)]
    pub requirement_id: String,

    pub mandatory: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::permit_type::Entity",
        from = "Column::PermitTypeId",
        to = "super::permit_type::Column::Id",
        on_delete = "Cascade"
    )]
    PermitType,
    #[sea_orm(
        belongs_to = "super::requirement::Entity",
        from = "Column::RequirementId",
        to = "super::requirement::Column::Id",
        on_delete = "Cascade"
    )]
    Requirement,
}

impl Related<super::permit_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PermitType.def()
    }
}

impl Related<super::requirement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requirement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
