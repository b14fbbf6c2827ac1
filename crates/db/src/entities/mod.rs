//! Database entities.

pub mod app_user;
pub mod protocol_counter;
pub mod report;

pub use app_user::Entity as AppUser;
pub use protocol_counter::Entity as ProtocolCounter;
pub use report::Entity as Report;
