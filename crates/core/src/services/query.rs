//! Query service: request listing, request detail and administrative edits.

use chrono::Utc;
use permit_hub_common::{AppError, AppResult, IdGenerator, PermitConfig};
use permit_hub_db::entities::{
    approval_decision, approval_log, citizen, final_document, permit_request,
    request_dynamic_data, role, uploaded_document,
};
use permit_hub_db::repositories::{
    CitizenRepository, FinalDocumentRepository, PermitRequestRepository, RequestFilter,
    RequestSortKey, RoleRepository,
};
use sea_orm::{Order, Set, TransactionTrait};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::catalog::{CatalogService, PermitTypeDetail};
use super::intake::{payload_object, validate_payload};
use super::ledger::LedgerService;

const MAX_PER_PAGE: u64 = 100;
const DEFAULT_PER_PAGE: u64 = 20;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl From<Direction> for Order {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => Self::Asc,
            Direction::Desc => Self::Desc,
        }
    }
}

/// Which page of requests to read. Pages are 1-based.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    #[serde(default)]
    pub sort: RequestSortKey,
    #[serde(default)]
    pub direction: Direction,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
            sort: RequestSortKey::default(),
            direction: Direction::default(),
        }
    }
}

const fn default_page() -> u64 {
    1
}

const fn default_per_page() -> u64 {
    DEFAULT_PER_PAGE
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

/// A request with everything a reviewer needs to decide on it.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: permit_request::Model,
    pub permit_type: PermitTypeDetail,
    pub citizen: citizen::Model,
    /// Roles authorised on the current step.
    pub current_roles: Vec<role::Model>,
    pub approval_log: Vec<approval_log::Model>,
    pub uploaded_documents: Vec<uploaded_document::Model>,
    pub dynamic_data: Option<request_dynamic_data::Model>,
    pub final_documents: Vec<final_document::Model>,
}

/// Administrative edit of a request. Does not touch its approval state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRequestInput {
    #[serde(default, deserialize_with = "present")]
    pub company_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub subdistrict_id: Option<Option<String>>,
    /// Replaces the dynamic data; re-validated against the type's fields.
    pub payload: Option<Value>,
}

/// Distinguish an explicit `null` from an absent key.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Service for reading and administering requests.
#[derive(Clone)]
pub struct QueryService {
    request_repo: PermitRequestRepository,
    citizen_repo: CitizenRepository,
    role_repo: RoleRepository,
    document_repo: FinalDocumentRepository,
    catalog: CatalogService,
    ledger: LedgerService,
    config: PermitConfig,
    id_gen: IdGenerator,
}

impl QueryService {
    /// Create a new query service.
    #[must_use]
    pub const fn new(
        request_repo: PermitRequestRepository,
        citizen_repo: CitizenRepository,
        role_repo: RoleRepository,
        document_repo: FinalDocumentRepository,
        catalog: CatalogService,
        ledger: LedgerService,
        config: PermitConfig,
    ) -> Self {
        Self {
            request_repo,
            citizen_repo,
            role_repo,
            document_repo,
            catalog,
            ledger,
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// List requests matching `filter`.
    pub async fn list_requests(
        &self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> AppResult<Page<permit_request::Model>> {
        let per_page = page.per_page.clamp(1, MAX_PER_PAGE);
        let number = page.page.max(1);
        let offset = (number - 1).saturating_mul(per_page);

        let (items, total_items) = self
            .request_repo
            .list(filter, page.sort, page.direction.into(), per_page, offset)
            .await?;

        debug!(
            total = total_items,
            page = number,
            per_page = per_page,
            "Listed permit requests"
        );

        Ok(Page {
            items,
            page: number,
            per_page,
            total_items,
            total_pages: total_items.div_ceil(per_page),
        })
    }

    /// Get a request with its type, citizen, current roles, history and documents.
    ///
    /// A stale role set on an open request is brought back in line with the
    /// catalog; if that write fails the read still succeeds.
    pub async fn get_request(&self, id: &str) -> AppResult<RequestDetail> {
        let mut request = self.request_repo.get_by_id(id).await?;
        let permit_type = self
            .catalog
            .get_permit_type_by_id(&request.permit_type_id)
            .await?;
        let citizen = self
            .citizen_repo
            .find_by_id(&request.citizen_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Citizen not found: {}", request.citizen_id))
            })?;

        let current = permit_type
            .steps
            .iter()
            .find(|s| s.step.step_order == request.current_step);

        let current_roles = match current {
            Some(step) => {
                if !request.status.is_terminal() {
                    request = self.resync_roles(request, &step.roles).await;
                }
                step.roles.clone()
            }
            None => {
                warn!(
                    request_id = %request.id,
                    step_order = request.current_step,
                    "Current step missing from catalog"
                );
                self.role_repo.find_by_ids(&request.current_role_ids()).await?
            }
        };

        let approval_log = self.ledger.logs(&request.id).await?;
        let uploaded_documents = self.request_repo.find_documents(&request.id).await?;
        let dynamic_data = self.request_repo.find_dynamic_data(&request.id).await?;
        let final_documents = self.document_repo.find_by_request(&request.id).await?;

        Ok(RequestDetail {
            request,
            permit_type,
            citizen,
            current_roles,
            approval_log,
            uploaded_documents,
            dynamic_data,
            final_documents,
        })
    }

    async fn resync_roles(
        &self,
        request: permit_request::Model,
        roles: &[role::Model],
    ) -> permit_request::Model {
        let mut expected: Vec<String> = roles.iter().map(|r| r.id.clone()).collect();
        let mut stored = request.current_role_ids();
        expected.sort();
        stored.sort();
        if expected == stored {
            return request;
        }

        let now = Utc::now();
        match self
            .request_repo
            .set_step_roles_if_at(&request.id, request.current_step, &expected, now)
            .await
        {
            Ok(true) => {
                info!(request_id = %request.id, "Resynchronised current step roles");
                let mut request = request;
                request.current_step_roles = serde_json::json!(expected);
                request.updated_at = Some(now.into());
                request
            }
            Ok(false) => {
                debug!(
                    request_id = %request.id,
                    step_order = request.current_step,
                    "Request moved on before its roles were resynchronised"
                );
                request
            }
            Err(e) => {
                warn!(
                    request_id = %request.id,
                    error = %e,
                    "Failed to resynchronise current step roles"
                );
                request
            }
        }
    }

    /// Edit a request's scope or answers.
    pub async fn update_request(
        &self,
        id: &str,
        input: UpdateRequestInput,
    ) -> AppResult<permit_request::Model> {
        let request = self.request_repo.get_by_id(id).await?;

        let payload = match input.payload {
            Some(payload) => {
                let payload = payload_object(payload)?;
                let fields = self
                    .catalog
                    .list_fields(&request.permit_type_id)
                    .await?;
                validate_payload(&self.config, &fields, &payload)?;
                Some(payload)
            }
            None => None,
        };

        let now = Utc::now();
        let txn = self.request_repo.db().begin().await?;

        if let Some(payload) = payload {
            match self
                .request_repo
                .find_dynamic_data_in(&txn, &request.id)
                .await?
            {
                Some(existing) => {
                    let mut active: request_dynamic_data::ActiveModel = existing.into();
                    active.data = Set(Value::Object(payload));
                    active.updated_at = Set(Some(now.into()));
                    self.request_repo
                        .update_dynamic_data_in(&txn, active)
                        .await?;
                }
                None => {
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
                }
            }
        }

        let mut active: permit_request::ActiveModel = request.into();
        if let Some(company_id) = input.company_id {
            active.company_id = Set(company_id);
        }
        if let Some(subdistrict_id) = input.subdistrict_id {
            active.subdistrict_id = Set(subdistrict_id);
        }
        active.updated_at = Set(Some(now.into()));
        let request = self.request_repo.update_in(&txn, active).await?;

        txn.commit().await?;

        info!(request_id = %request.id, "Permit request updated");
        Ok(request)
    }

    /// Delete a request and everything it owns.
    pub async fn delete_request(&self, id: &str) -> AppResult<()> {
        let request = self.request_repo.get_by_id(id).await?;

        let txn = self.request_repo.db().begin().await?;
        self.request_repo.delete_owned_in(&txn, &request.id).await?;
        self.request_repo.delete_in(&txn, &request.id).await?;
        txn.commit().await?;

        info!(request_id = %request.id, code = %request.code, "Permit request deleted");
        Ok(())
    }

    /// The final documents of a request, newest first.
    pub async fn final_documents(&self, id: &str) -> AppResult<Vec<final_document::Model>> {
        let request = self.request_repo.get_by_id(id).await?;
        self.document_repo.find_by_request(&request.id).await
    }

    /// The quorum decisions recorded for a request.
    pub async fn decisions(
        &self,
        id: &str,
    ) -> AppResult<Vec<approval_decision::Model>> {
        let request = self.request_repo.get_by_id(id).await?;
        self.ledger.decisions(&request.id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use permit_hub_db::repositories::{
        ApprovalLedgerRepository, ApprovalStepRepository, PermitTypeRepository,
        RequirementRepository,
    };
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn service(db: DatabaseConnection) -> QueryService {
        let db = Arc::new(db);
        let catalog = CatalogService::new(
            PermitTypeRepository::new(db.clone()),
            ApprovalStepRepository::new(db.clone()),
            RoleRepository::new(db.clone()),
            RequirementRepository::new(db.clone()),
            PermitRequestRepository::new(db.clone()),
        );
        QueryService::new(
            PermitRequestRepository::new(db.clone()),
            CitizenRepository::new(db.clone()),
            RoleRepository::new(db.clone()),
            FinalDocumentRepository::new(db.clone()),
            catalog,
            LedgerService::new(ApprovalLedgerRepository::new(db)),
            PermitConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_list_requests_clamps_page_size() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[BTreeMap::from([(
                "num_items",
                sea_orm::Value::BigInt(Some(250)),
            )])]])
            .append_query_results([Vec::<permit_request::Model>::new()])
            .into_connection();

        let page = service(db)
            .list_requests(
                &RequestFilter::default(),
                PageRequest {
                    page: 0,
                    per_page: 1000,
                    ..PageRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 100);
        assert_eq!(page.total_items, 250);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test]
    async fn test_get_unknown_request() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<permit_request::Model>::new()])
            .into_connection();

        let result = service(db).get_request("missing").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_update_input_distinguishes_null() {
        let input: UpdateRequestInput =
            serde_json::from_value(serde_json::json!({"company_id": null})).unwrap();
        assert_eq!(input.company_id, Some(None));
        assert_eq!(input.subdistrict_id, None);
        assert!(input.payload.is_none());
    }

    #[test]
    fn test_page_request_defaults() {
        let page: PageRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 20);
        assert_eq!(page.sort, RequestSortKey::CreatedAt);
        assert_eq!(page.direction, Direction::Desc);
    }
}
