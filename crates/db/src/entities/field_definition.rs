//! Field definition entity: one input a citizen supplies for a permit type.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Declared kind of a dynamic field.
///
/// Kinds are rendering hints; the engine only type-checks them when strict
/// field validation is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum FieldKind {
    #[sea_orm(string_value = "text")]
    #[default]
    Text,
    #[sea_orm(string_value = "textarea")]
    Textarea,
    #[sea_orm(string_value = "number")]
    Number,
    #[sea_orm(string_value = "email")]
    Email,
    #[sea_orm(string_value = "date")]
    Date,
    #[sea_orm(string_value = "date_range")]
    DateRange,
    #[sea_orm(string_value = "checkbox")]
    Checkbox,
    #[sea_orm(string_value = "select")]
    Select,
    #[sea_orm(string_value = "file")]
    File,
    #[sea_orm(string_value = "json")]
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "field_definition")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub permit_type_id: String,

    /// Key used in the dynamic submission payload; unique within a type.
    pub key: String,

    pub label: String,

    pub kind: FieldKind,

    pub required: bool,

    pub display_order: i32,

    /// Allowed values for `select` fields (JSON array of strings).
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub options: Option<Json>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Choices of a `select` field, ignoring malformed entries.
    #[must_use]
    pub fn choices(&self) -> Vec<String> {
        self.options
            .as_ref()
            .and_then(Json::as_array)
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
}

impl Related<super::permit_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PermitType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
