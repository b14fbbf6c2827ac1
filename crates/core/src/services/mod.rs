//! Business logic services.

#![allow(missing_docs)]

pub mod report;
pub mod user;
pub mod validation;

pub use report::{
    CreateReportInput, LifecycleSettings, ListReportsInput, ReportPage, ReportService,
    ReporterSnapshot, parse_priority,
};
pub use user::{CreateUserInput, UpdateUserInput, UserService, hash_token};
pub use validation::FieldValidator;
