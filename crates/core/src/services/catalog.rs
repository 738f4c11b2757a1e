//! Catalog service: permit types, their field schemas, approval flows and requirements.
//!
//! The catalog is pure configuration. It holds no request state, but every
//! other service reads it live, so the uniqueness rules enforced here (slug per
//! subdistrict, field key per type, step order per type) are what keep the
//! evaluator's step resolution well defined.

use std::collections::BTreeSet;

use chrono::Utc;
use permit_hub_common::{AppError, AppResult, IdGenerator};
use permit_hub_db::entities::{
    approval_step::{self, ApprovalMode},
    approval_step_role,
    field_definition::{self, FieldKind},
    permit_type, permit_type_requirement, requirement, role,
};
use permit_hub_db::repositories::{
    ApprovalStepRepository, PermitRequestRepository, PermitTypeRepository, RequirementRepository,
    RoleRepository, StepWithRoles,
};
use regex::Regex;
use sea_orm::{Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

#[allow(clippy::unwrap_used)]
static SLUG_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").unwrap());

#[allow(clippy::unwrap_used)]
static FIELD_KEY_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Input for creating a role.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoleInput {
    /// Identifier issued by the identity system; generated when absent.
    #[validate(length(min = 1, max = 64))]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub name: String,
}

/// Input for creating a permit type.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePermitTypeInput {
    #[validate(length(min = 1, max = 64))]
    pub slug: String,
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    #[validate(length(max = 4096))]
    pub description: Option<String>,
    pub subdistrict_id: Option<String>,
    pub company_id: Option<String>,
    pub template_id: Option<String>,
    pub template_config: Option<serde_json::Value>,
}

/// Input for updating a permit type.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePermitTypeInput {
    #[validate(length(min = 1, max = 64))]
    pub slug: Option<String>,
    #[validate(length(min = 1, max = 256))]
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub template_id: Option<Option<String>>,
    pub template_config: Option<Option<serde_json::Value>>,
}

/// Input for adding a field definition.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateFieldInput {
    #[validate(length(min = 1, max = 64))]
    pub key: String,
    #[validate(length(min = 1, max = 256))]
    pub label: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Appended after the existing fields when absent.
    pub display_order: Option<i32>,
    pub choices: Option<Vec<String>>,
}

/// Input for updating a field definition. The key cannot change.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateFieldInput {
    #[validate(length(min = 1, max = 256))]
    pub label: Option<String>,
    pub kind: Option<FieldKind>,
    pub required: Option<bool>,
    pub display_order: Option<i32>,
    pub choices: Option<Option<Vec<String>>>,
}

/// Input for adding an approval step.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStepInput {
    /// Appended after the last step when absent.
    pub step_order: Option<i32>,
    #[validate(length(max = 4096))]
    pub description: Option<String>,
    #[serde(default)]
    pub approval_mode: ApprovalMode,
    pub role_ids: Vec<String>,
}

/// Input for updating an approval step. The order cannot change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStepInput {
    pub description: Option<Option<String>>,
    pub approval_mode: Option<ApprovalMode>,
    pub role_ids: Option<Vec<String>>,
}

/// Input for creating a requirement.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRequirementInput {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    #[validate(length(max = 4096))]
    pub description: Option<String>,
    pub subdistrict_id: Option<String>,
}

/// Input for updating a requirement.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRequirementInput {
    #[validate(length(min = 1, max = 64))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 256))]
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

/// An approval step with its effective mode and authorised roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalStepView {
    #[serde(flatten)]
    pub step: approval_step::Model,
    pub mode: ApprovalMode,
    pub roles: Vec<role::Model>,
}

impl From<StepWithRoles> for ApprovalStepView {
    fn from(value: StepWithRoles) -> Self {
        Self {
            mode: value.step.mode(),
            step: value.step,
            roles: value.roles,
        }
    }
}

/// A requirement as attached to one permit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachedRequirement {
    #[serde(flatten)]
    pub requirement: requirement::Model,
    pub mandatory: bool,
}

/// A permit type with everything a client needs before submitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermitTypeDetail {
    #[serde(flatten)]
    pub permit_type: permit_type::Model,
    pub fields: Vec<field_definition::Model>,
    pub steps: Vec<ApprovalStepView>,
    pub requirements: Vec<AttachedRequirement>,
}

/// Service for managing the permit catalog.
#[derive(Clone)]
pub struct CatalogService {
    permit_type_repo: PermitTypeRepository,
    step_repo: ApprovalStepRepository,
    role_repo: RoleRepository,
    requirement_repo: RequirementRepository,
    request_repo: PermitRequestRepository,
    id_gen: IdGenerator,
}

impl CatalogService {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(
        permit_type_repo: PermitTypeRepository,
        step_repo: ApprovalStepRepository,
        role_repo: RoleRepository,
        requirement_repo: RequirementRepository,
        request_repo: PermitRequestRepository,
    ) -> Self {
        Self {
            permit_type_repo,
            step_repo,
            role_repo,
            requirement_repo,
            request_repo,
            id_gen: IdGenerator::new(),
        }
    }

    // ==================== Role Operations ====================

    /// List all roles.
    pub async fn list_roles(&self) -> AppResult<Vec<role::Model>> {
        self.role_repo.list().await
    }

    /// Create a role.
    pub async fn create_role(&self, input: CreateRoleInput) -> AppResult<role::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let id = input.id.unwrap_or_else(|| self.id_gen.generate());
        if self.role_repo.find_by_id(&id).await?.is_some() {
            return Err(AppError::Conflict(format!("Role already exists: {id}")));
        }

        let model = role::ActiveModel {
            id: Set(id),
            name: Set(input.name),
            created_at: Set(Utc::now().into()),
        };

        let role = self.role_repo.create(model).await?;
        info!(role_id = %role.id, name = %role.name, "Role created");
        Ok(role)
    }

    /// Rename a role.
    pub async fn update_role(&self, id: &str, name: String) -> AppResult<role::Model> {
        if name.trim().is_empty() || name.len() > 128 {
            return Err(AppError::Validation(
                "Role name must be between 1 and 128 characters".to_string(),
            ));
        }

        let role = self
            .role_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Role not found: {id}")))?;

        let mut active: role::ActiveModel = role.into();
        active.name = Set(name);
        self.role_repo.update(active).await
    }

    /// Delete a role. Its step authorisations go with it.
    pub async fn delete_role(&self, id: &str) -> AppResult<()> {
        if self.role_repo.find_by_id(id).await?.is_none() {
            return Err(AppError::NotFound(format!("Role not found: {id}")));
        }

        self.role_repo.delete(id).await?;
        info!(role_id = %id, "Role deleted");
        Ok(())
    }

    // ==================== Permit Type Operations ====================

    /// Look up a permit type by slug with its fields, flow and requirements.
    ///
    /// A type scoped to `subdistrict_id` shadows a global type with the same slug.
    pub async fn get_permit_type(
        &self,
        slug: &str,
        subdistrict_id: Option<&str>,
    ) -> AppResult<PermitTypeDetail> {
        let permit_type = self
            .permit_type_repo
            .find_by_slug(slug, subdistrict_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Permit type not found: {slug}")))?;

        debug!(permit_type = %permit_type.id, slug = %slug, "Resolved permit type");
        self.detail(permit_type).await
    }

    /// Get a permit type by ID with its fields, flow and requirements.
    pub async fn get_permit_type_by_id(&self, id: &str) -> AppResult<PermitTypeDetail> {
        let permit_type = self.permit_type_repo.get_by_id(id).await?;
        self.detail(permit_type).await
    }

    /// Assemble the detail view of a permit type.
    pub async fn detail(&self, permit_type: permit_type::Model) -> AppResult<PermitTypeDetail> {
        let fields = self.permit_type_repo.find_fields(&permit_type.id).await?;
        let steps = self
            .step_repo
            .find_flow(&permit_type.id)
            .await?
            .into_iter()
            .map(ApprovalStepView::from)
            .collect();
        let requirements = self
            .permit_type_repo
            .find_requirements(&permit_type.id)
            .await?
            .into_iter()
            .map(|(link, requirement)| AttachedRequirement {
                requirement,
                mandatory: link.mandatory,
            })
            .collect();

        Ok(PermitTypeDetail {
            permit_type,
            fields,
            steps,
            requirements,
        })
    }

    /// List permit types available to a subdistrict.
    pub async fn list_permit_types(
        &self,
        subdistrict_id: Option<&str>,
    ) -> AppResult<Vec<permit_type::Model>> {
        self.permit_type_repo.list(subdistrict_id).await
    }

    /// Create a permit type.
    pub async fn create_permit_type(
        &self,
        input: CreatePermitTypeInput,
    ) -> AppResult<permit_type::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        validate_slug(&input.slug)?;

        if self
            .permit_type_repo
            .slug_taken(&input.slug, input.subdistrict_id.as_deref(), None)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Permit type slug already in use: {}",
                input.slug
            )));
        }

        let model = permit_type::ActiveModel {
            id: Set(self.id_gen.generate()),
            slug: Set(input.slug),
            name: Set(input.name),
            description: Set(input.description),
            subdistrict_id: Set(input.subdistrict_id),
            company_id: Set(input.company_id),
            template_id: Set(input.template_id),
            template_config: Set(input.template_config),
            register_seq: Set(0),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let permit_type = self.permit_type_repo.create(model).await?;
        info!(permit_type = %permit_type.id, slug = %permit_type.slug, "Permit type created");
        Ok(permit_type)
    }

    /// Update a permit type.
    pub async fn update_permit_type(
        &self,
        id: &str,
        input: UpdatePermitTypeInput,
    ) -> AppResult<permit_type::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let permit_type = self.permit_type_repo.get_by_id(id).await?;

        if let Some(ref slug) = input.slug {
            validate_slug(slug)?;
            if self
                .permit_type_repo
                .slug_taken(slug, permit_type.subdistrict_id.as_deref(), Some(id))
                .await?
            {
                return Err(AppError::Conflict(format!(
                    "Permit type slug already in use: {slug}"
                )));
            }
        }

        let mut active: permit_type::ActiveModel = permit_type.into();
        if let Some(slug) = input.slug {
            active.slug = Set(slug);
        }
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(template_id) = input.template_id {
            active.template_id = Set(template_id);
        }
        if let Some(template_config) = input.template_config {
            active.template_config = Set(template_config);
        }
        active.updated_at = Set(Some(Utc::now().into()));

        self.permit_type_repo.update(active).await
    }

    /// Delete a permit type with its fields, flow, requirement links and
    /// finished requests.
    ///
    /// Refused while any request of the type is still awaiting decisions.
    pub async fn delete_permit_type(&self, id: &str) -> AppResult<()> {
        let txn = self.permit_type_repo.db().begin().await?;
        let permit_type = self.permit_type_repo.lock_by_id_in(&txn, id).await?;

        let in_flight = self
            .request_repo
            .count_in_flight_by_type_in(&txn, id)
            .await?;
        if in_flight > 0 {
            return Err(AppError::Conflict(format!(
                "Permit type {} has {in_flight} request(s) in flight",
                permit_type.slug
            )));
        }

        for request_id in self
            .request_repo
            .find_closed_ids_by_type_in(&txn, id)
            .await?
        {
            self.request_repo.delete_owned_in(&txn, &request_id).await?;
            self.request_repo.delete_in(&txn, &request_id).await?;
        }
        self.step_repo.delete_by_type_in(&txn, id).await?;
        self.permit_type_repo.delete_fields_in(&txn, id).await?;
        self.permit_type_repo
            .delete_requirement_links_in(&txn, id)
            .await?;
        self.permit_type_repo.delete_in(&txn, id).await?;

        txn.commit().await?;

        info!(permit_type = %id, slug = %permit_type.slug, "Permit type deleted");
        Ok(())
    }

    // ==================== Field Definition Operations ====================

    /// List the field definitions of a permit type in display order.
    pub async fn list_fields(&self, permit_type_id: &str) -> AppResult<Vec<field_definition::Model>> {
        self.permit_type_repo.get_by_id(permit_type_id).await?;
        self.permit_type_repo.find_fields(permit_type_id).await
    }

    /// Add a field definition to a permit type.
    pub async fn add_field(
        &self,
        permit_type_id: &str,
        input: CreateFieldInput,
    ) -> AppResult<field_definition::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if !FIELD_KEY_RE.is_match(&input.key) {
            return Err(AppError::Validation(format!(
                "Invalid field key: {}",
                input.key
            )));
        }
        let choices = normalize_choices(input.kind, input.choices)?;

        let fields = self.list_fields(permit_type_id).await?;
        if fields.iter().any(|f| f.key == input.key) {
            return Err(AppError::Conflict(format!(
                "Field key already defined: {}",
                input.key
            )));
        }

        let display_order = input
            .display_order
            .unwrap_or_else(|| fields.iter().map(|f| f.display_order + 1).max().unwrap_or(0));

        let model = field_definition::ActiveModel {
            id: Set(self.id_gen.generate()),
            permit_type_id: Set(permit_type_id.to_string()),
            key: Set(input.key),
            label: Set(input.label),
            kind: Set(input.kind),
            required: Set(input.required),
            display_order: Set(display_order),
            options: Set(choices.map(|c| serde_json::json!(c))),
            created_at: Set(Utc::now().into()),
        };

        let field = self.permit_type_repo.create_field(model).await?;
        info!(permit_type = %permit_type_id, key = %field.key, "Field definition added");
        Ok(field)
    }

    /// Update a field definition.
    pub async fn update_field(
        &self,
        field_id: &str,
        input: UpdateFieldInput,
    ) -> AppResult<field_definition::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let field = self
            .permit_type_repo
            .find_field_by_id(field_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Field definition not found: {field_id}")))?;

        let kind = input.kind.unwrap_or(field.kind);
        let choices = match input.choices {
            Some(choices) => choices,
            None => Some(field.choices()).filter(|c| !c.is_empty()),
        };
        let choices = normalize_choices(kind, choices)?;

        let mut active: field_definition::ActiveModel = field.into();
        if let Some(label) = input.label {
            active.label = Set(label);
        }
        if let Some(required) = input.required {
            active.required = Set(required);
        }
        if let Some(display_order) = input.display_order {
            active.display_order = Set(display_order);
        }
        active.kind = Set(kind);
        active.options = Set(choices.map(|c| serde_json::json!(c)));

        self.permit_type_repo.update_field(active).await
    }

    /// Remove a field definition.
    pub async fn remove_field(&self, field_id: &str) -> AppResult<()> {
        if self
            .permit_type_repo
            .find_field_by_id(field_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "Field definition not found: {field_id}"
            )));
        }

        self.permit_type_repo.delete_field(field_id).await
    }

    // ==================== Approval Step Operations ====================

    /// List the approval flow of a permit type in step order.
    pub async fn list_steps(&self, permit_type_id: &str) -> AppResult<Vec<ApprovalStepView>> {
        self.permit_type_repo.get_by_id(permit_type_id).await?;
        Ok(self
            .step_repo
            .find_flow(permit_type_id)
            .await?
            .into_iter()
            .map(ApprovalStepView::from)
            .collect())
    }

    /// Get the step with the greatest order of a permit type.
    pub async fn last_step(&self, permit_type_id: &str) -> AppResult<Option<approval_step::Model>> {
        self.step_repo.find_last(permit_type_id).await
    }

    /// Add an approval step, either at an explicit order or after the last step.
    pub async fn add_step(
        &self,
        permit_type_id: &str,
        input: CreateStepInput,
    ) -> AppResult<ApprovalStepView> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        self.permit_type_repo.get_by_id(permit_type_id).await?;
        let roles = self.resolve_roles(&input.role_ids).await?;

        let step_order = match input.step_order {
            Some(order) if order < 0 => {
                return Err(AppError::Validation(format!(
                    "Step order must be non-negative: {order}"
                )));
            }
            Some(order) => order,
            None => self
                .last_step(permit_type_id)
                .await?
                .map_or(0, |last| last.step_order + 1),
        };

        if self
            .step_repo
            .find_by_order_in(self.step_repo.db(), permit_type_id, step_order)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Step order {step_order} already exists"
            )));
        }

        let txn = self.step_repo.db().begin().await?;

        let step = self
            .step_repo
            .create_in(
                &txn,
                approval_step::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    permit_type_id: Set(permit_type_id.to_string()),
                    step_order: Set(step_order),
                    description: Set(input.description),
                    approval_mode: Set(input.approval_mode.as_str().to_string()),
                    created_at: Set(Utc::now().into()),
                },
            )
            .await?;
        self.link_roles_in(&txn, &step.id, &roles).await?;

        txn.commit().await?;

        info!(
            permit_type = %permit_type_id,
            step_order,
            mode = step.approval_mode.as_str(),
            roles = roles.len(),
            "Approval step added"
        );
        Ok(StepWithRoles { step, roles }.into())
    }

    /// Update the description, mode or role set of an approval step.
    pub async fn update_step(
        &self,
        step_id: &str,
        input: UpdateStepInput,
    ) -> AppResult<ApprovalStepView> {
        let step = self
            .step_repo
            .find_by_id(step_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Approval step not found: {step_id}")))?;

        let roles = match input.role_ids {
            Some(ref role_ids) => Some(self.resolve_roles(role_ids).await?),
            None => None,
        };

        let txn = self.step_repo.db().begin().await?;

        let mut active: approval_step::ActiveModel = step.into();
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(mode) = input.approval_mode {
            active.approval_mode = Set(mode.as_str().to_string());
        }
        let step = self.step_repo.update_in(&txn, active).await?;

        if let Some(ref roles) = roles {
            self.step_repo.delete_roles_in(&txn, step_id).await?;
            self.link_roles_in(&txn, step_id, roles).await?;
        }

        let view = self.step_repo.with_roles_in(&txn, step).await?;
        txn.commit().await?;

        info!(step_id = %step_id, step_order = view.step.step_order, "Approval step updated");
        Ok(view.into())
    }

    /// Remove an approval step and its role authorisations.
    pub async fn remove_step(&self, step_id: &str) -> AppResult<()> {
        let step = self
            .step_repo
            .find_by_id(step_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Approval step not found: {step_id}")))?;

        let txn = self.step_repo.db().begin().await?;
        self.step_repo.delete_in(&txn, step_id).await?;
        txn.commit().await?;

        info!(
            permit_type = %step.permit_type_id,
            step_order = step.step_order,
            "Approval step removed"
        );
        Ok(())
    }

    /// Resolve a non-empty role set, failing on unknown roles.
    async fn resolve_roles(&self, role_ids: &[String]) -> AppResult<Vec<role::Model>> {
        let wanted: BTreeSet<&str> = role_ids.iter().map(String::as_str).collect();
        if wanted.is_empty() {
            return Err(AppError::Validation(
                "An approval step needs at least one role".to_string(),
            ));
        }

        let ids: Vec<String> = wanted.iter().map(ToString::to_string).collect();
        let roles = self.role_repo.find_by_ids(&ids).await?;
        if let Some(missing) = wanted
            .iter()
            .find(|id| !roles.iter().any(|r| r.id == **id))
        {
            return Err(AppError::NotFound(format!("Role not found: {missing}")));
        }

        Ok(roles)
    }

    async fn link_roles_in<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        step_id: &str,
        roles: &[role::Model],
    ) -> AppResult<()> {
        for role in roles {
            self.step_repo
                .add_role_in(
                    conn,
                    approval_step_role::ActiveModel {
                        id: Set(self.id_gen.generate()),
                        step_id: Set(step_id.to_string()),
                        role_id: Set(role.id.clone()),
                    },
                )
                .await?;
        }
        Ok(())
    }

    // ==================== Requirement Operations ====================

    /// List requirements available to a subdistrict.
    pub async fn list_requirements(
        &self,
        subdistrict_id: Option<&str>,
    ) -> AppResult<Vec<requirement::Model>> {
        self.requirement_repo.list(subdistrict_id).await
    }

    /// Create a requirement.
    pub async fn create_requirement(
        &self,
        input: CreateRequirementInput,
    ) -> AppResult<requirement::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self
            .requirement_repo
            .find_by_code(&input.code, input.subdistrict_id.as_deref())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Requirement code already in use: {}",
                input.code
            )));
        }

        let model = requirement::ActiveModel {
            id: Set(self.id_gen.generate()),
            code: Set(input.code),
            name: Set(input.name),
            description: Set(input.description),
            subdistrict_id: Set(input.subdistrict_id),
            created_at: Set(Utc::now().into()),
        };

        let requirement = self.requirement_repo.create(model).await?;
        info!(requirement_id = %requirement.id, code = %requirement.code, "Requirement created");
        Ok(requirement)
    }

    /// Update a requirement.
    pub async fn update_requirement(
        &self,
        id: &str,
        input: UpdateRequirementInput,
    ) -> AppResult<requirement::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let requirement = self.requirement_repo.get_by_id(id).await?;

        if let Some(ref code) = input.code
            && let Some(existing) = self
                .requirement_repo
                .find_by_code(code, requirement.subdistrict_id.as_deref())
                .await?
            && existing.id != requirement.id
        {
            return Err(AppError::Conflict(format!(
                "Requirement code already in use: {code}"
            )));
        }

        let mut active: requirement::ActiveModel = requirement.into();
        if let Some(code) = input.code {
            active.code = Set(code);
        }
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }

        self.requirement_repo.update(active).await
    }

    /// Delete a requirement, detaching it from every permit type.
    pub async fn delete_requirement(&self, id: &str) -> AppResult<()> {
        self.requirement_repo.get_by_id(id).await?;
        self.requirement_repo.delete(id).await?;
        info!(requirement_id = %id, "Requirement deleted");
        Ok(())
    }

    /// Attach a requirement to a permit type. Re-attaching updates the mandatory flag.
    pub async fn attach_requirement(
        &self,
        permit_type_id: &str,
        requirement_id: &str,
        mandatory: bool,
    ) -> AppResult<permit_type_requirement::Model> {
        self.permit_type_repo.get_by_id(permit_type_id).await?;
        self.requirement_repo.get_by_id(requirement_id).await?;

        let link = match self
            .permit_type_repo
            .find_requirement_link(permit_type_id, requirement_id)
            .await?
        {
            Some(link) => {
                let mut active: permit_type_requirement::ActiveModel = link.into();
                active.mandatory = Set(mandatory);
                self.permit_type_repo.update_requirement_link(active).await?
            }
            None => {
                self.permit_type_repo
                    .create_requirement_link(permit_type_requirement::ActiveModel {
                        id: Set(self.id_gen.generate()),
                        permit_type_id: Set(permit_type_id.to_string()),
                        requirement_id: Set(requirement_id.to_string()),
                        mandatory: Set(mandatory),
                    })
                    .await?
            }
        };

        info!(
            permit_type = %permit_type_id,
            requirement_id = %requirement_id,
            mandatory,
            "Requirement attached"
        );
        Ok(link)
    }

    /// Detach a requirement from a permit type.
    pub async fn detach_requirement(
        &self,
        permit_type_id: &str,
        requirement_id: &str,
    ) -> AppResult<()> {
        let removed = self
            .permit_type_repo
            .delete_requirement_link(permit_type_id, requirement_id)
            .await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!(
                "Requirement {requirement_id} is not attached to permit type {permit_type_id}"
            )));
        }
        Ok(())
    }
}

/// Check a permit type slug.
fn validate_slug(slug: &str) -> AppResult<()> {
    if slug.len() > 64 || !SLUG_RE.is_match(slug) {
        return Err(AppError::Validation(format!("Invalid slug: {slug}")));
    }
    Ok(())
}

/// Select fields need a non-empty list of distinct choices; other kinds carry none.
fn normalize_choices(
    kind: FieldKind,
    choices: Option<Vec<String>>,
) -> AppResult<Option<Vec<String>>> {
    if kind != FieldKind::Select {
        return Ok(None);
    }

    let mut seen = BTreeSet::new();
    let choices: Vec<String> = choices
        .unwrap_or_default()
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect();

    if choices.is_empty() {
        return Err(AppError::Validation(
            "Select fields need at least one choice".to_string(),
        ));
    }
    Ok(Some(choices))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::sync::Arc;

    fn service(db: DatabaseConnection) -> CatalogService {
        let db = Arc::new(db);
        CatalogService::new(
            PermitTypeRepository::new(db.clone()),
            ApprovalStepRepository::new(db.clone()),
            RoleRepository::new(db.clone()),
            RequirementRepository::new(db.clone()),
            PermitRequestRepository::new(db),
        )
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("domicile").is_ok());
        assert!(validate_slug("business-licence-2").is_ok());
        assert!(validate_slug("0-day").is_ok());
        assert!(validate_slug("-leading").is_err());
        assert!(validate_slug("Upper").is_err());
        assert!(validate_slug("with space").is_err());
        assert!(validate_slug(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_field_key_pattern() {
        assert!(FIELD_KEY_RE.is_match("purpose"));
        assert!(FIELD_KEY_RE.is_match("_business_name2"));
        assert!(!FIELD_KEY_RE.is_match("2nd_address"));
        assert!(!FIELD_KEY_RE.is_match("business-name"));
    }

    #[test]
    fn test_select_requires_choices() {
        assert!(normalize_choices(FieldKind::Select, None).is_err());
        assert!(normalize_choices(FieldKind::Select, Some(vec![" ".to_string()])).is_err());

        let choices = normalize_choices(
            FieldKind::Select,
            Some(vec!["shop".to_string(), "shop".to_string(), " cafe ".to_string()]),
        )
        .unwrap();
        assert_eq!(choices, Some(vec!["shop".to_string(), "cafe".to_string()]));

        // Non-select kinds drop choices.
        assert_eq!(
            normalize_choices(FieldKind::Text, Some(vec!["x".to_string()])).unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_create_permit_type_rejects_bad_slug() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let result = service
            .create_permit_type(CreatePermitTypeInput {
                slug: "Not A Slug".to_string(),
                name: "Domicile".to_string(),
                description: None,
                subdistrict_id: None,
                company_id: None,
                template_id: None,
                template_config: None,
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_permit_type_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<permit_type::Model>::new()])
            .into_connection();
        let service = service(db);

        let result = service.get_permit_type("domicile", None).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_add_step_requires_roles() {
        let permit_type = permit_type::Model {
            id: "pt1".to_string(),
            slug: "domicile".to_string(),
            name: "Domicile".to_string(),
            description: None,
            subdistrict_id: None,
            company_id: None,
            template_id: None,
            template_config: None,
            register_seq: 0,
            created_at: Utc::now().into(),
            updated_at: None,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[permit_type]])
            .into_connection();
        let service = service(db);

        let result = service
            .add_step(
                "pt1",
                CreateStepInput {
                    step_order: None,
                    description: None,
                    approval_mode: ApprovalMode::Single,
                    role_ids: vec![],
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
