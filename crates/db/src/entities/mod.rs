//! Database entities.

#![allow(missing_docs)]

pub mod approval_decision;
pub mod approval_log;
pub mod approval_step;
pub mod approval_step_role;
pub mod citizen;
pub mod field_definition;
pub mod final_document;
pub mod permit_request;
pub mod permit_type;
pub mod permit_type_requirement;
pub mod request_dynamic_data;
pub mod requirement;
pub mod role;
pub mod uploaded_document;

pub use approval_decision::Entity as ApprovalDecision;
pub use approval_log::Entity as ApprovalLog;
pub use approval_step::Entity as ApprovalStep;
pub use approval_step_role::Entity as ApprovalStepRole;
pub use citizen::Entity as Citizen;
pub use field_definition::Entity as FieldDefinition;
pub use final_document::Entity as FinalDocument;
pub use permit_request::Entity as PermitRequest;
pub use permit_type::Entity as PermitType;
pub use permit_type_requirement::Entity as PermitTypeRequirement;
pub use request_dynamic_data::Entity as RequestDynamicData;
pub use requirement::Entity as Requirement;
pub use role::Entity as Role;
pub use uploaded_document::Entity as UploadedDocument;
