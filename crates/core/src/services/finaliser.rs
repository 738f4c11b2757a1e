//! Document finaliser: register numbers and final permit documents.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use permit_hub_common::{
    AppError, AppResult, IdGenerator, PermitConfig, StorageBackend, permit_document_key,
};
use permit_hub_db::entities::{
    approval_log, final_document, permit_request, permit_request::RequestStatus, permit_type,
};
use permit_hub_db::repositories::{
    ApprovalLedgerRepository, FinalDocumentRepository, PermitRequestRepository,
    PermitTypeRepository,
};
use sea_orm::{ConnectionTrait, Set};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Everything a renderer gets to produce the final permit.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    pub permit_type: permit_type::Model,
    pub request: permit_request::Model,
    pub dynamic_data: serde_json::Value,
    pub approvals: Vec<approval_log::Model>,
    pub register_number: String,
}

/// A rendered file as stored by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub filename: String,
    pub url: String,
    pub checksum: Option<String>,
    /// Storage key, when the renderer keeps the file in a [`StorageBackend`].
    pub storage_key: Option<String>,
}

/// Renders the final permit document of an approved request.
#[async_trait::async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Render and store the document, returning where it lives.
    async fn render(&self, context: &RenderContext) -> AppResult<RenderedDocument>;

    /// Throw away a rendered document whose approval did not commit.
    async fn discard(&self, _document: &RenderedDocument) -> AppResult<()> {
        Ok(())
    }
}

/// Renderer that writes the render context as a JSON document to storage.
pub struct StorageDocumentRenderer {
    storage: Arc<dyn StorageBackend>,
}

impl StorageDocumentRenderer {
    /// Create a renderer writing to the given storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }
}

#[async_trait::async_trait]
impl DocumentRenderer for StorageDocumentRenderer {
    async fn render(&self, context: &RenderContext) -> AppResult<RenderedDocument> {
        let body = serde_json::to_vec_pretty(context)
            .map_err(|e| AppError::Internal(format!("Failed to serialize permit: {e}")))?;

        let filename = format!("{}-{}.json", context.permit_type.slug, context.request.code);
        let key = permit_document_key(&context.request.id, &filename, Utc::now());

        let stored = self
            .storage
            .put(&key, &body, "application/json")
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to store permit: {e}")))?;

        Ok(RenderedDocument {
            filename,
            url: stored.url,
            checksum: Some(stored.checksum),
            storage_key: Some(stored.key),
        })
    }

    async fn discard(&self, document: &RenderedDocument) -> AppResult<()> {
        match &document.storage_key {
            Some(key) => self.storage.remove(key).await,
            None => Ok(()),
        }
    }
}

/// Result of finalising a request inside an open transaction.
#[derive(Debug, Clone)]
pub struct Finalised {
    pub request: permit_request::Model,
    pub document: final_document::Model,
    pub rendered: RenderedDocument,
}

/// Format a register number: `[{prefix}/]{SLUG}/{seq:06}/{year}`.
#[must_use]
pub fn format_register_number(prefix: Option<&str>, slug: &str, seq: i64, year: i32) -> String {
    let number = format!("{}/{seq:06}/{year}", slug.to_uppercase());
    match prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{prefix}/{number}"),
        None => number,
    }
}

/// Service that closes out approved requests.
#[derive(Clone)]
pub struct FinaliserService {
    permit_type_repo: PermitTypeRepository,
    request_repo: PermitRequestRepository,
    ledger_repo: ApprovalLedgerRepository,
    document_repo: FinalDocumentRepository,
    renderer: Arc<dyn DocumentRenderer>,
    register_prefix: Option<String>,
    id_gen: IdGenerator,
}

impl FinaliserService {
    /// Create a new finaliser service.
    #[must_use]
    pub fn new(
        permit_type_repo: PermitTypeRepository,
        request_repo: PermitRequestRepository,
        ledger_repo: ApprovalLedgerRepository,
        document_repo: FinalDocumentRepository,
        renderer: Arc<dyn DocumentRenderer>,
        config: &PermitConfig,
    ) -> Self {
        Self {
            permit_type_repo,
            request_repo,
            ledger_repo,
            document_repo,
            renderer,
            register_prefix: config.register_prefix.clone(),
            id_gen: IdGenerator::new(),
        }
    }

    /// Mark a request approved, assign its register number and emit the final document.
    ///
    /// Runs inside the caller's transaction: the register sequence is consumed
    /// and the document recorded only if that transaction commits.
    pub async fn finalise_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        request: permit_request::Model,
        generated_by: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Finalised> {
        let permit_type = self
            .permit_type_repo
            .find_by_id_in(conn, &request.permit_type_id)
            .await?
            .ok_or_else(|| {
                AppError::InvariantBroken(format!(
                    "Permit type {} of request {} is gone",
                    request.permit_type_id, request.id
                ))
            })?;

        let seq = self
            .permit_type_repo
            .next_register_seq_in(conn, &permit_type.id)
            .await?;
        let register_number = format_register_number(
            self.register_prefix.as_deref(),
            &permit_type.slug,
            seq,
            now.year(),
        );

        let mut active: permit_request::ActiveModel = request.into();
        active.status = Set(RequestStatus::Approved);
        active.approved_at = Set(Some(now.into()));
        active.register_number = Set(Some(register_number.clone()));
        active.updated_at = Set(Some(now.into()));
        let request = self.request_repo.update_in(conn, active).await?;

        let dynamic_data = self
            .request_repo
            .find_dynamic_data_in(conn, &request.id)
            .await?
            .map_or(serde_json::Value::Null, |d| d.data);
        let approvals = self.ledger_repo.find_logs_in(conn, &request.id).await?;

        let context = RenderContext {
            permit_type,
            request,
            dynamic_data,
            approvals,
            register_number,
        };
        let rendered = self.renderer.render(&context).await?;

        let document = match self
            .document_repo
            .create_in(
                conn,
                final_document::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    request_id: Set(context.request.id.clone()),
                    filename: Set(rendered.filename.clone()),
                    url: Set(rendered.url.clone()),
                    checksum: Set(rendered.checksum.clone()),
                    generated_by: Set(generated_by.to_string()),
                    generated_at: Set(now.into()),
                },
            )
            .await
        {
            Ok(document) => document,
            Err(e) => {
                self.discard(&rendered).await;
                return Err(e);
            }
        };

        info!(
            request_id = %context.request.id,
            permit_type = %context.permit_type.slug,
            register_number = %context.register_number,
            "Permit finalised"
        );
        Ok(Finalised {
            request: context.request,
            document,
            rendered,
        })
    }

    /// Remove a rendered file whose transaction rolled back.
    ///
    /// Failures are logged; the original error is what the caller reports.
    pub async fn discard(&self, rendered: &RenderedDocument) {
        if let Err(e) = self.renderer.discard(rendered).await {
            warn!(url = %rendered.url, error = %e, "Failed to discard rendered permit");
        } else {
            debug!(url = %rendered.url, "Discarded rendered permit");
        }
    }

    /// Final documents of a request, newest first.
    pub async fn documents(&self, request_id: &str) -> AppResult<Vec<final_document::Model>> {
        self.document_repo.find_by_request(request_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use permit_hub_common::LocalStorage;
    use serde_json::json;

    #[test]
    fn test_format_register_number() {
        assert_eq!(
            format_register_number(None, "domicile", 7, 2025),
            "DOMICILE/000007/2025"
        );
        assert_eq!(
            format_register_number(Some("KEC-01"), "business-licence", 123_456, 2026),
            "KEC-01/BUSINESS-LICENCE/123456/2026"
        );
        assert_eq!(
            format_register_number(Some("  "), "domicile", 1, 2025),
            "DOMICILE/000001/2025"
        );
    }

    #[tokio::test]
    async fn test_storage_renderer_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(
            dir.path().to_path_buf(),
            "http://files.test/permits".to_string(),
        ));
        let renderer = StorageDocumentRenderer::new(storage);

        let now = Utc::now();
        let context = RenderContext {
            permit_type: permit_type::Model {
                id: "pt1".to_string(),
                slug: "domicile".to_string(),
                name: "Domicile letter".to_string(),
                description: None,
                subdistrict_id: None,
                company_id: None,
                template_id: Some("tpl-domicile".to_string()),
                template_config: Some(json!({"paper": "A4"})),
                register_seq: 1,
                created_at: now.into(),
                updated_at: None,
            },
            request: permit_request::Model {
                id: "r1".to_string(),
                code: "PRM-20250601-ABCDEFGH".to_string(),
                permit_type_id: "pt1".to_string(),
                citizen_id: "c1".to_string(),
                company_id: None,
                subdistrict_id: None,
                submitted_at: now.into(),
                current_step: 0,
                current_step_roles: json!(["clerk"]),
                status: RequestStatus::Approved,
                approved_at: Some(now.into()),
                register_number: Some("DOMICILE/000001/2025".to_string()),
                created_at: now.into(),
                updated_at: None,
            },
            dynamic_data: json!({"purpose": "open shop"}),
            approvals: vec![],
            register_number: "DOMICILE/000001/2025".to_string(),
        };

        let rendered = renderer.render(&context).await.unwrap();

        assert_eq!(rendered.filename, "domicile-PRM-20250601-ABCDEFGH.json");
        assert!(rendered.url.starts_with("http://files.test/permits/"));
        assert_eq!(rendered.checksum.as_ref().map(String::len), Some(32));

        let key = rendered.url.trim_start_matches("http://files.test/permits/");
        let stored = std::fs::read(dir.path().join(key)).unwrap();
        let stored: serde_json::Value = serde_json::from_slice(&stored).unwrap();
        assert_eq!(stored["register_number"], "DOMICILE/000001/2025");
        assert_eq!(stored["dynamic_data"]["purpose"], "open shop");

        renderer.discard(&rendered).await.unwrap();
        assert!(!dir.path().join(key).exists());
        renderer.discard(&rendered).await.unwrap();
    }
}
