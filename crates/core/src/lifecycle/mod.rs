//! Report lifecycle: stage registry, transition rules and access policy.
//!
//! Everything here is pure; the report service in [`crate::services`]
//! performs the I/O around it.

pub mod policy;
pub mod registry;
pub mod transition;

pub use policy::{Actor, Operation, authorize, is_creator, is_responsible_authority};
pub use registry::{
    ProgressInfo, STAGE_TABLE, StageInfo, canonical_status, normalize_stage, normalize_status,
    parse_status, progress_info, stage_for_status, stage_info, stage_of, status_for_stage,
    validate_report_state,
};
pub use transition::{EntryPoint, Party, TransitionError, validate_advance};
