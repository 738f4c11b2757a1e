//! Intake service: turns a citizen submission into a permit request.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use permit_hub_common::{AppError, AppResult, IdGenerator, PermitConfig};
use permit_hub_db::entities::{
    citizen, field_definition, field_definition::FieldKind, permit_request,
    permit_request::RequestStatus, request_dynamic_data, requirement,
    uploaded_document,
};
use permit_hub_db::repositories::{
    ApprovalStepRepository, CitizenRepository, PermitRequestRepository, PermitTypeRepository,
};
use sea_orm::{ConnectionTrait, Set, TransactionTrait};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use validator::{Validate, ValidateEmail};

/// Identity and contact data of the citizen applying.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CitizenInput {
    #[validate(length(min = 1, max = 32))]
    pub nik: String,
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 1024))]
    pub address: Option<String>,
}

/// A file already in storage, offered as a supporting document.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AttachmentInput {
    #[validate(length(min = 1, max = 256))]
    pub filename: String,
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    #[validate(length(min = 1, max = 64))]
    pub requirement_code: String,
    pub uploaded_by: Option<String>,
}

/// Input for submitting a permit request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePermitRequestInput {
    #[validate(nested)]
    pub citizen: CitizenInput,
    /// Answers keyed by field key.
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    #[validate(nested)]
    pub attachments: Vec<AttachmentInput>,
    pub company_id: Option<String>,
    /// Defaults to the permit type's subdistrict.
    pub subdistrict_id: Option<String>,
}

/// Coerce a submitted payload into a JSON object. `null` is an empty payload.
pub(crate) fn payload_object(payload: Value) -> AppResult<Map<String, Value>> {
    match payload {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(AppError::Validation(
            "Payload must be a JSON object keyed by field key".to_string(),
        )),
    }
}

/// Fail on the first required field that is absent or null, in display order.
pub(crate) fn check_required_fields(
    fields: &[field_definition::Model],
    payload: &Map<String, Value>,
) -> AppResult<()> {
    let missing = fields
        .iter()
        .filter(|f| f.required)
        .find(|f| payload.get(&f.key).is_none_or(Value::is_null));

    match missing {
        Some(field) => Err(AppError::MissingField {
            key: field.key.clone(),
            label: field.label.clone(),
        }),
        None => Ok(()),
    }
}

/// Validate a payload against a permit type's fields, honouring the strict-types option.
pub(crate) fn validate_payload(
    config: &PermitConfig,
    fields: &[field_definition::Model],
    payload: &Map<String, Value>,
) -> AppResult<()> {
    check_required_fields(fields, payload)?;
    if config.strict_field_types {
        check_field_types(fields, payload)?;
    }
    Ok(())
}

/// Check every present, non-null value against its field's kind.
pub(crate) fn check_field_types(
    fields: &[field_definition::Model],
    payload: &Map<String, Value>,
) -> AppResult<()> {
    for field in fields {
        let Some(value) = payload.get(&field.key).filter(|v| !v.is_null()) else {
            continue;
        };

        if !value_matches_kind(field, value) {
            return Err(AppError::Validation(format!(
                "Field '{}' ({}) is not a valid {}",
                field.label,
                field.key,
                kind_name(field.kind)
            )));
        }
    }
    Ok(())
}

fn value_matches_kind(field: &field_definition::Model, value: &Value) -> bool {
    match field.kind {
        FieldKind::Text | FieldKind::Textarea => value.is_string(),
        FieldKind::Number => {
            value.is_number() || value.as_str().is_some_and(|s| s.trim().parse::<f64>().is_ok())
        }
        FieldKind::Email => value.as_str().is_some_and(|s| s.validate_email()),
        FieldKind::Date => value.as_str().is_some_and(|s| parse_date(s).is_some()),
        FieldKind::DateRange => date_range(value).is_some_and(|(start, end)| start <= end),
        FieldKind::Checkbox => value.is_boolean(),
        FieldKind::Select => value
            .as_str()
            .is_some_and(|s| field.choices().iter().any(|c| c == s)),
        FieldKind::File => value.as_str().is_some_and(|s| !s.trim().is_empty()),
        FieldKind::Json => true,
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// A date range is `{"start": .., "end": ..}` or a two-element array.
fn date_range(value: &Value) -> Option<(NaiveDate, NaiveDate)> {
    let (start, end) = match value {
        Value::Object(map) => (map.get("start")?, map.get("end")?),
        Value::Array(items) if items.len() == 2 => (&items[0], &items[1]),
        _ => return None,
    };
    Some((parse_date(start.as_str()?)?, parse_date(end.as_str()?)?))
}

const fn kind_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "text",
        FieldKind::Textarea => "textarea",
        FieldKind::Number => "number",
        FieldKind::Email => "email",
        FieldKind::Date => "date",
        FieldKind::DateRange => "date range",
        FieldKind::Checkbox => "checkbox",
        FieldKind::Select => "choice",
        FieldKind::File => "file reference",
        FieldKind::Json => "JSON value",
    }
}

/// Service that validates and registers new permit requests.
#[derive(Clone)]
pub struct IntakeService {
    permit_type_repo: PermitTypeRepository,
    step_repo: ApprovalStepRepository,
    citizen_repo: CitizenRepository,
    request_repo: PermitRequestRepository,
    config: PermitConfig,
    id_gen: IdGenerator,
}

impl IntakeService {
    /// Create a new intake service.
    #[must_use]
    pub const fn new(
        permit_type_repo: PermitTypeRepository,
        step_repo: ApprovalStepRepository,
        citizen_repo: CitizenRepository,
        request_repo: PermitRequestRepository,
        config: PermitConfig,
    ) -> Self {
        Self {
            permit_type_repo,
            step_repo,
            citizen_repo,
            request_repo,
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Submit a permit request of the type `slug`.
    ///
    /// Everything is checked before the first write; the citizen upsert, the
    /// request, its dynamic data and its attachments are then stored in one
    /// transaction. The request starts `submitted` at the first step of the flow.
    pub async fn create_permit_request(
        &self,
        slug: &str,
        input: CreatePermitRequestInput,
    ) -> AppResult<permit_request::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let permit_type = self
            .permit_type_repo
            .find_by_slug(slug, input.subdistrict_id.as_deref())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Permit type not found: {slug}")))?;

        let payload = payload_object(input.payload)?;
        let fields = self.permit_type_repo.find_fields(&permit_type.id).await?;
        validate_payload(&self.config, &fields, &payload)?;

        let attached = self.permit_type_repo.find_requirements(&permit_type.id).await?;
        check_attachments(&attached, &input.attachments)?;
        if self.config.enforce_mandatory_requirements {
            check_mandatory_requirements(&attached, &input.attachments)?;
        }

        let first = self
            .step_repo
            .find_first(&permit_type.id)
            .await?
            .ok_or_else(|| {
                AppError::InvariantBroken(format!("Permit type {slug} has no approval steps"))
            })?;
        let first = self
            .step_repo
            .with_roles_in(self.step_repo.db(), first)
            .await?;

        let now = Utc::now();
        let txn = self.request_repo.db().begin().await?;
        self.permit_type_repo
            .share_lock_by_id_in(&txn, &permit_type.id)
            .await?;

        let citizen = self.upsert_citizen_in(&txn, input.citizen).await?;

        let request = self
            .request_repo
            .create_in(
                &txn,
                permit_request::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    code: Set(self.id_gen.generate_request_code(now)),
                    permit_type_id: Set(permit_type.id.clone()),
                    citizen_id: Set(citizen.id.clone()),
                    company_id: Set(input.company_id),
                    subdistrict_id: Set(input
                        .subdistrict_id
                        .or_else(|| permit_type.subdistrict_id.clone())),
                    submitted_at: Set(now.into()),
                    current_step: Set(first.step.step_order),
                    current_step_roles: Set(serde_json::json!(first.role_ids())),
                    status: Set(RequestStatus::Submitted),
                    approved_at: Set(None),
                    register_number: Set(None),
                    created_at: Set(now.into()),
                    updated_at: Set(None),
                },
            )
            .await?;

        self.request_repo
            .create_dynamic_data_in(
                &txn,
                request_dynamic_data::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    request_id: Set(request.id.clone()),
                    data: Set(Value::Object(payload)),
                    created_at: Set(now.into()),
                    updated_at: Set(None),
                },
            )
            .await?;

        for attachment in input.attachments {
            self.request_repo
                .create_document_in(
                    &txn,
                    uploaded_document::ActiveModel {
                        id: Set(self.id_gen.generate()),
                        request_id: Set(request.id.clone()),
                        filename: Set(attachment.filename),
                        url: Set(attachment.url),
                        uploaded_by: Set(attachment.uploaded_by),
                        requirement_code: Set(attachment.requirement_code),
                        created_at: Set(now.into()),
                    },
                )
                .await?;
        }

        txn.commit().await?;

        info!(
            request_id = %request.id,
            code = %request.code,
            permit_type = %permit_type.slug,
            citizen_id = %citizen.id,
            step_order = request.current_step,
            "Permit request submitted"
        );
        Ok(request)
    }

    /// Reuse the citizen with this identity number, or register a new one.
    async fn upsert_citizen_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: CitizenInput,
    ) -> AppResult<citizen::Model> {
        if let Some(existing) = self.citizen_repo.find_by_nik_in(conn, &input.nik).await? {
            if existing.name != input.name {
                debug!(
                    citizen_id = %existing.id,
                    stored = %existing.name,
                    submitted = %input.name,
                    "Citizen name differs from stored record, keeping stored record"
                );
            }
            return Ok(existing);
        }

        let id = self.id_gen.generate();
        let citizen = self
            .citizen_repo
            .insert_or_get_in(
                conn,
                &input.nik,
                citizen::ActiveModel {
                    id: Set(id.clone()),
                    nik: Set(input.nik.clone()),
                    name: Set(input.name),
                    email: Set(input.email),
                    phone: Set(input.phone),
                    address: Set(input.address),
                    created_at: Set(Utc::now().into()),
                },
            )
            .await?;

        if citizen.id == id {
            debug!(citizen_id = %citizen.id, "Citizen registered");
        } else {
            debug!(
                citizen_id = %citizen.id,
                "Citizen registered concurrently, reusing stored record"
            );
        }
        Ok(citizen)
    }
}

type AttachedRequirements = [(
    permit_hub_db::entities::permit_type_requirement::Model,
    requirement::Model,
)];

/// Every attachment must name a requirement attached to the type.
fn check_attachments(
    attached: &AttachedRequirements,
    attachments: &[AttachmentInput],
) -> AppResult<()> {
    let codes: BTreeSet<&str> = attached.iter().map(|(_, r)| r.code.as_str()).collect();

    match attachments
        .iter()
        .find(|a| !codes.contains(a.requirement_code.as_str()))
    {
        Some(attachment) => Err(AppError::Validation(format!(
            "Requirement '{}' is not attached to this permit type",
            attachment.requirement_code
        ))),
        None => Ok(()),
    }
}

/// Every mandatory requirement needs at least one attachment carrying its code.
fn check_mandatory_requirements(
    attached: &AttachedRequirements,
    attachments: &[AttachmentInput],
) -> AppResult<()> {
    let supplied: BTreeSet<&str> = attachments
        .iter()
        .map(|a| a.requirement_code.as_str())
        .collect();

    match attached
        .iter()
        .find(|(link, r)| link.mandatory && !supplied.contains(r.code.as_str()))
    {
        Some((_, requirement)) => Err(AppError::MissingField {
            key: requirement.code.clone(),
            label: requirement.name.clone(),
        }),
        None => Ok(()),
    }
}
