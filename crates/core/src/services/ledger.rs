//! Ledger service: the approval log and the decisions that count toward quorum.

use chrono::{DateTime, Utc};
use permit_hub_common::{AppResult, IdGenerator};
use permit_hub_db::entities::{
    approval_decision, approval_log,
    approval_log::DecisionStatus,
    approval_step::ApprovalMode,
};
use permit_hub_db::repositories::{ApprovalLedgerRepository, StepWithRoles};
use sea_orm::{ConnectionTrait, Set};

/// One decision about to be written to the ledger.
#[derive(Debug, Clone)]
pub struct LedgerEntry<'a> {
    pub request_id: &'a str,
    pub step_order: i32,
    pub role_id: &'a str,
    pub role_name: &'a str,
    pub user_id: &'a str,
    pub note: Option<&'a str>,
    pub decided_at: DateTime<Utc>,
}

/// Whether a step's quorum is met by the given approving roles.
///
/// `single` steps need one approval by any authorised role; `all` steps need
/// one by every authorised role. Repeated approvals by the same role count once.
#[must_use]
pub fn quorum_reached<'a>(
    mode: ApprovalMode,
    authorised: &[String],
    approving_roles: impl IntoIterator<Item = &'a str>,
) -> bool {
    let approving: Vec<&str> = approving_roles
        .into_iter()
        .filter(|role| authorised.iter().any(|a| a == *role))
        .collect();

    match mode {
        ApprovalMode::Single => !approving.is_empty(),
        ApprovalMode::All => {
            !authorised.is_empty()
                && authorised
                    .iter()
                    .all(|role| approving.contains(&role.as_str()))
        }
    }
}

/// Service over the append-only approval ledger.
#[derive(Clone)]
pub struct LedgerService {
    ledger_repo: ApprovalLedgerRepository,
    id_gen: IdGenerator,
}

impl LedgerService {
    /// Create a new ledger service.
    #[must_use]
    pub const fn new(ledger_repo: ApprovalLedgerRepository) -> Self {
        Self {
            ledger_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Append the audit row for a decision call.
    pub async fn record_log_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        entry: &LedgerEntry<'_>,
        status: DecisionStatus,
    ) -> AppResult<approval_log::Model> {
        self.ledger_repo
            .append_log_in(
                conn,
                approval_log::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    request_id: Set(entry.request_id.to_string()),
                    step_order: Set(entry.step_order),
                    step_role: Set(entry.role_name.to_string()),
                    role_id: Set(entry.role_id.to_string()),
                    user_id: Set(entry.user_id.to_string()),
                    decided_at: Set(entry.decided_at.into()),
                    status: Set(status),
                    note: Set(entry.note.map(ToString::to_string)),
                },
            )
            .await
    }

    /// Append an approval that counts toward the step's quorum.
    pub async fn record_approval_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        entry: &LedgerEntry<'_>,
    ) -> AppResult<approval_decision::Model> {
        self.ledger_repo
            .append_decision_in(
                conn,
                approval_decision::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    request_id: Set(entry.request_id.to_string()),
                    step_order: Set(entry.step_order),
                    role_id: Set(entry.role_id.to_string()),
                    user_id: Set(entry.user_id.to_string()),
                    decided_at: Set(entry.decided_at.into()),
                    status: Set(DecisionStatus::Approved),
                    note: Set(entry.note.map(ToString::to_string)),
                },
            )
            .await
    }

    /// Check whether the recorded approvals satisfy a step.
    pub async fn is_step_satisfied_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        request_id: &str,
        step: &StepWithRoles,
    ) -> AppResult<bool> {
        let approvals = self
            .ledger_repo
            .find_approved_in(conn, request_id, step.step.step_order)
            .await?;

        Ok(quorum_reached(
            step.step.mode(),
            &step.role_ids(),
            approvals.iter().map(|d| d.role_id.as_str()),
        ))
    }

    /// The audit log of a request in decision order.
    pub async fn logs(&self, request_id: &str) -> AppResult<Vec<approval_log::Model>> {
        self.ledger_repo.find_logs(request_id).await
    }

    /// Every quorum decision of a request in decision order.
    pub async fn decisions(&self, request_id: &str) -> AppResult<Vec<approval_decision::Model>> {
        self.ledger_repo.find_decisions(request_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(ids: &[&str]) -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_single_mode_any_authorised_role() {
        let authorised = roles(&["clerk", "head"]);

        assert!(quorum_reached(ApprovalMode::Single, &authorised, ["head"]));
        assert!(!quorum_reached(ApprovalMode::Single, &authorised, std::iter::empty()));
        assert!(!quorum_reached(ApprovalMode::Single, &authorised, ["mayor"]));
    }

    #[test]
    fn test_all_mode_needs_every_role() {
        let authorised = roles(&["health", "fire"]);

        assert!(!quorum_reached(ApprovalMode::All, &authorised, ["health"]));
        assert!(quorum_reached(ApprovalMode::All, &authorised, ["health", "fire"]));
        assert!(quorum_reached(ApprovalMode::All, &authorised, ["fire", "health", "fire"]));
    }

    #[test]
    fn test_all_mode_duplicates_count_once() {
        let authorised = roles(&["a", "b"]);

        assert!(!quorum_reached(ApprovalMode::All, &authorised, ["a", "a"]));
    }

    #[test]
    fn test_all_mode_ignores_unauthorised_roles() {
        let authorised = roles(&["a"]);

        assert!(quorum_reached(ApprovalMode::All, &authorised, ["x", "a"]));
        assert!(!quorum_reached(ApprovalMode::All, &[], ["x"]));
    }
}
