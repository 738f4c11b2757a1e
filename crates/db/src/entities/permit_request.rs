//! Permit request entity: a citizen's in-flight application.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a permit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum RequestStatus {
    #[sea_orm(string_value = "submitted")]
    #[default]
    Submitted,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl RequestStatus {
    /// Whether no further decisions are accepted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "permit_request")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Human-readable request code.
    #[sea_orm(unique)]
    pub code: String,

    #[sea_orm(indexed)]
    pub permit_type_id: String,

    #[sea_orm(indexed)]
    pub citizen_id: String,

    #[sea_orm(nullable)]
    pub company_id: Option<String>,

    #[sea_orm(nullable)]
    pub subdistrict_id: Option<String>,

    pub submitted_at: DateTimeWithTimeZone,

    /// Step order the request is waiting on.
    pub current_step: i32,

    /// Role IDs authorised on the current step (JSON array), denormalised for listing.
    #[sea_orm(column_type = "JsonBinary")]
    pub current_step_roles: Json,

    pub status: RequestStatus,

    #[sea_orm(nullable)]
    pub approved_at: Option<DateTimeWithTimeZone>,

    /// Register number assigned at final approval.
    #[sea_orm(nullable)]
    pub register_number: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Role IDs of the current step as stored on the request.
    #[must_use]
    pub fn current_role_ids(&self) -> Vec<String> {
        self.current_step_roles
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default()
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
    #[sea_orm(
        belongs_to = "super::citizen::Entity",
        from = "Column::CitizenId",
        to = "super::citizen::Column::Id",
        on_delete = "Cascade"
    )]
    Citizen,
    #[sea_orm(has_one = "super::request_dynamic_data::Entity")]
    DynamicData,
    #[sea_orm(has_many = "super::uploaded_document::Entity")]
    UploadedDocuments,
    #[sea_orm(has_many = "super::approval_log::Entity")]
    ApprovalLogs,
    #[sea_orm(has_many = "super::approval_decision::Entity")]
    ApprovalDecisions,
    #[sea_orm(has_many = "super::final_document::Entity")]
    FinalDocuments,
}

impl Related<super::permit_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PermitType.def()
    }
}

impl Related<super::citizen::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Citizen.def()
    }
}

impl Related<super::request_dynamic_data::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DynamicData.def()
    }
}

impl Related<super::uploaded_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadedDocuments.def()
    }
}

impl Related<super::approval_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalLogs.def()
    }
}

impl Related<super::approval_decision::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalDecisions.def()
    }
}

impl Related<super::final_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FinalDocuments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!RequestStatus::Submitted.is_terminal());
        assert!(!RequestStatus::InProgress.is_terminal());
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
    }
}
