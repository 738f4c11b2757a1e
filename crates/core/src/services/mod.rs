//! Permit engine services.

#![allow(missing_docs)]

pub mod catalog;
pub mod evaluator;
pub mod finaliser;
pub mod intake;
pub mod ledger;
pub mod query;

pub use catalog::{
    ApprovalStepView, AttachedRequirement, CatalogService, CreateFieldInput,
    CreatePermitTypeInput, CreateRequirementInput, CreateRoleInput, CreateStepInput,
    PermitTypeDetail, UpdateFieldInput, UpdatePermitTypeInput, UpdateRequirementInput,
    UpdateStepInput,
};
pub use evaluator::{Caller, DecisionOutcome, EvaluatorService};
pub use finaliser::{
    DocumentRenderer, Finalised, FinaliserService, RenderContext, RenderedDocument,
    StorageDocumentRenderer, format_register_number,
};
pub use intake::{AttachmentInput, CitizenInput, CreatePermitRequestInput, IntakeService};
pub use ledger::{LedgerEntry, LedgerService, quorum_reached};
pub use query::{Direction, Page, PageRequest, QueryService, RequestDetail, UpdateRequestInput};
