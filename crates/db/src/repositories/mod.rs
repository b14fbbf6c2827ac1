//! Repositories.

mod report;
mod user;

pub use report::{
    ReportFilter, ReportRepository, ReportSort, ReportStats, ReportStore, SortDirection,
};
pub use user::UserRepository;
