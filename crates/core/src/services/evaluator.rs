//! Evaluator service: applies one decision and advances the request's state machine.
//!
//! A request moves `(submitted, first) -> (in_progress, k) -> (approved, last)`,
//! or to `(rejected, k)` from any step. Every call runs in one transaction that
//! starts by locking the request row, so concurrent deciders on the same
//! request are serialised and exactly one of them observes a step's quorum.

use chrono::Utc;
use permit_hub_common::{AppError, AppResult};
use permit_hub_db::entities::{
    approval_log::DecisionStatus, approval_step::ApprovalMode, permit_request,
    permit_request::RequestStatus,
};
use permit_hub_db::repositories::{ApprovalStepRepository, PermitRequestRepository};
use sea_orm::{Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::finaliser::FinaliserService;
use super::ledger::{LedgerEntry, LedgerService};

/// An authenticated caller acting on a request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub role_id: Option<String>,
}

impl Caller {
    /// Create a caller acting under a role.
    #[must_use]
    pub fn new(user_id: impl Into<String>, role_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role_id: Some(role_id.into()),
        }
    }
}

/// Where a request stands after a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    pub request_id: String,
    pub status: RequestStatus,
    pub current_step: i32,
    /// Whether the request left the step it was at.
    pub advanced: bool,
    pub register_number: Option<String>,
}

impl DecisionOutcome {
    fn of(request: &permit_request::Model, advanced: bool) -> Self {
        Self {
            request_id: request.id.clone(),
            status: request.status,
            current_step: request.current_step,
            advanced,
            register_number: request.register_number.clone(),
        }
    }
}

/// Service that drives requests through their approval flow.
#[derive(Clone)]
pub struct EvaluatorService {
    request_repo: PermitRequestRepository,
    step_repo: ApprovalStepRepository,
    ledger: LedgerService,
    finaliser: FinaliserService,
}

impl EvaluatorService {
    /// Create a new evaluator service.
    #[must_use]
    pub const fn new(
        request_repo: PermitRequestRepository,
        step_repo: ApprovalStepRepository,
        ledger: LedgerService,
        finaliser: FinaliserService,
    ) -> Self {
        Self {
            request_repo,
            step_repo,
            ledger,
            finaliser,
        }
    }

    /// Apply one decision by `caller` to the request's current step.
    ///
    /// Fails with `NotFound` for an unknown request, `Conflict` once the
    /// request is approved or rejected, `InvariantBroken` when the current step
    /// is missing from the catalog, and `Unauthorized` when the caller's role is
    /// not authorised on that step. A failed call leaves no trace.
    pub async fn decide(
        &self,
        request_id: &str,
        caller: &Caller,
        note: Option<String>,
        approved: bool,
    ) -> AppResult<DecisionOutcome> {
        let txn = self.request_repo.db().begin().await?;

        let request = self.request_repo.lock_by_id_in(&txn, request_id).await?;

        if request.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Request {} is already {}",
                request.code,
                status_label(request.status)
            )));
        }

        let step = self
            .step_repo
            .find_by_order_in(&txn, &request.permit_type_id, request.current_step)
            .await?
            .ok_or_else(|| {
                AppError::InvariantBroken(format!(
                    "Request {} is at step {} which does not exist for its permit type",
                    request.code, request.current_step
                ))
            })?;
        let step = self.step_repo.with_roles_in(&txn, step).await?;

        let role_id = caller
            .role_id
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Caller carries no role".to_string()))?;
        let role = step
            .roles
            .iter()
            .find(|r| r.id == role_id)
            .ok_or_else(|| {
                AppError::Unauthorized(format!(
                    "Role {role_id} may not decide step {} of request {}",
                    step.step.step_order, request.code
                ))
            })?;

        let now = Utc::now();
        let entry = LedgerEntry {
            request_id: &request.id,
            step_order: step.step.step_order,
            role_id,
            role_name: &role.name,
            user_id: &caller.user_id,
            note: note.as_deref(),
            decided_at: now,
        };
        self.ledger
            .record_log_in(&txn, &entry, DecisionStatus::from(approved))
            .await?;

        if !approved {
            let mut active: permit_request::ActiveModel = request.into();
            active.status = Set(RequestStatus::Rejected);
            active.updated_at = Set(Some(now.into()));
            let request = self.request_repo.update_in(&txn, active).await?;
            txn.commit().await?;

            info!(
                request_id = %request.id,
                step_order = request.current_step,
                role_id = %role_id,
                "Request rejected"
            );
            return Ok(DecisionOutcome::of(&request, false));
        }

        self.ledger.record_approval_in(&txn, &entry).await?;

        let satisfied = match step.step.mode() {
            ApprovalMode::Single => true,
            ApprovalMode::All => {
                self.ledger
                    .is_step_satisfied_in(&txn, &request.id, &step)
                    .await?
            }
        };

        if !satisfied {
            txn.commit().await?;
            debug!(
                request_id = %request.id,
                step_order = request.current_step,
                role_id = %role_id,
                "Approval recorded, step awaits other roles"
            );
            return Ok(DecisionOutcome::of(&request, false));
        }

        let next = self
            .step_repo
            .find_next_in(&txn, &request.permit_type_id, request.current_step)
            .await?;

        let (request, rendered) = match next {
            Some(next) => {
                let next = self.step_repo.with_roles_in(&txn, next).await?;

                let mut active: permit_request::ActiveModel = request.into();
                active.current_step = Set(next.step.step_order);
                active.current_step_roles = Set(serde_json::json!(next.role_ids()));
                active.status = Set(RequestStatus::InProgress);
                active.updated_at = Set(Some(now.into()));
                let request = self.request_repo.update_in(&txn, active).await?;

                info!(
                    request_id = %request.id,
                    step_order = request.current_step,
                    role_id = %role_id,
                    "Request advanced"
                );
                (request, None)
            }
            None => {
                let finalised = self
                    .finaliser
                    .finalise_in(&txn, request, &caller.user_id, now)
                    .await?;
                (finalised.request, Some(finalised.rendered))
            }
        };

        if let Err(e) = txn.commit().await {
            if let Some(rendered) = &rendered {
                self.finaliser.discard(rendered).await;
            }
            return Err(e.into());
        }
        Ok(DecisionOutcome::of(&request, true))
    }
}

const fn status_label(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Submitted => "submitted",
        RequestStatus::InProgress => "in progress",
        RequestStatus::Approved => "approved",
        RequestStatus::Rejected => "rejected",
    }
}
