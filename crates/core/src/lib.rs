//! Permit workflow engine for permit-hub.
//!
//! Services are layered the same way the approval flow runs: the catalog
//! declares permit types, intake registers requests against them, and the
//! evaluator drives each request through its approval steps, recording every
//! decision in the ledger and handing approved requests to the finaliser.

pub mod services;

pub use services::*;

