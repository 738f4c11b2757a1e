//! Approval step entity: one stage of a permit type's approval flow.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How many of a step's authorised roles must approve before it is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// The first approval by any authorised role satisfies the step.
    #[default]
    Single,
    /// Every authorised role must approve.
    All,
}

impl ApprovalMode {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::All => "all",
        }
    }

    /// Parse a stored mode. Anything other than `all` is treated as `single`.
    #[must_use]
    pub fn from_db(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Single
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_step")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub permit_type_id: String,

    /// Position in the flow; unique per permit type.
    pub step_order: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Raw approval mode; read through [`Model::mode`].
    pub approval_mode: String,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Effective approval mode of this step.
    #[must_use]
    pub fn mode(&self) -> ApprovalMode {
        ApprovalMode::from_db(&self.approval_mode)
    }
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
    #[sea_orm(has_many = "super::approval_step_role::Entity")]
    Roles,
}

impl Related<super::permit_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PermitType.def()
    }
}

impl Related<super::approval_step_role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Roles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_mode_falls_back_to_single() {
        assert_eq!(ApprovalMode::from_db("all"), ApprovalMode::All);
        assert_eq!(ApprovalMode::from_db(" ALL "), ApprovalMode::All);
        assert_eq!(ApprovalMode::from_db("single"), ApprovalMode::Single);
        assert_eq!(ApprovalMode::from_db("majority"), ApprovalMode::Single);
        assert_eq!(ApprovalMode::from_db(""), ApprovalMode::Single);
    }
}
