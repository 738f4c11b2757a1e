//! Database repositories.

mod approval_ledger;
mod approval_step;
mod citizen;
mod final_document;
mod permit_request;
mod permit_type;
mod requirement;
mod role;

pub use approval_ledger::ApprovalLedgerRepository;
pub use approval_step::{ApprovalStepRepository, StepWithRoles};
pub use citizen::CitizenRepository;
pub use final_document::FinalDocumentRepository;
pub use permit_request::{PermitRequestRepository, RequestFilter, RequestSortKey};
pub use permit_type::PermitTypeRepository;
pub use requirement::RequirementRepository;
pub use role::RoleRepository;
