//! Access policy: who may do what to a report.

use aniseg_common::{AppError, AppResult};
use aniseg_db::entities::{app_user, app_user::Role, report};
use serde::Serialize;

use super::transition::{EntryPoint, Party, entry_granted};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// User id.
    pub id: String,
    /// Role at authentication time.
    pub role: Role,
    /// Recorded as the assigned authority's contact on acceptance.
    pub email: Option<String>,
}

impl Actor {
    /// Create an actor.
    #[must_use]
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            email: None,
        }
    }

    /// Attach a contact e-mail.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Authority or admin. Admin is a superset of authority.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self.role, Role::Authority | Role::Admin)
    }
}

impl From<&app_user::Model> for Actor {
    fn from(user: &app_user::Model) -> Self {
        Self {
            id: user.id.clone(),
            role: user.role,
            email: Some(user.email.clone()),
        }
    }
}

/// Operations gated by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// File a new report.
    Create,
    /// Take an unassigned report.
    Accept,
    /// Move a report one stage forward.
    Advance,
    /// Change a report's priority.
    SetPriority,
    /// Comment on a report.
    Comment,
    /// Attach files to a report.
    AddEvidence,
    /// Leave feedback on a concluded report.
    Feedback,
    /// Legacy status setter.
    SetStatus,
    /// Read a single report.
    View,
    /// Read dashboard counters.
    ViewStats,
    /// Provision, list and delete users.
    ManageUsers,
}

/// The actor created this report.
#[must_use]
pub fn is_creator(actor: &Actor, report: &report::Model) -> bool {
    report.created_by == actor.id
}

/// The actor is the authority that accepted this report.
#[must_use]
pub fn is_responsible_authority(actor: &Actor, report: &report::Model) -> bool {
    report.assigned_authority_id.as_deref() == Some(actor.id.as_str())
}

/// Every relation the actor holds to the report.
#[must_use]
pub fn parties(actor: &Actor, report: &report::Model) -> Vec<Party> {
    let mut parties = Vec::with_capacity(2);
    if is_creator(actor, report) {
        parties.push(Party::Creator);
    }
    if is_responsible_authority(actor, report) {
        parties.push(Party::ResponsibleAuthority);
    }
    match actor.role {
        Role::Admin => parties.push(Party::Admin),
        Role::Authority => parties.push(Party::Authority),
        Role::Citizen => {}
    }
    parties
}

/// Whether the policy allows `operation`. `report` is `None` for
/// operations that do not target an existing report.
#[must_use]
pub fn allows(actor: &Actor, operation: Operation, report: Option<&report::Model>) -> bool {
    let can_view = report.is_some_and(|r| actor.is_staff() || is_creator(actor, r));

    match operation {
        Operation::Create => true,
        Operation::Accept
        | Operation::SetPriority
        | Operation::ViewStats
        | Operation::ManageUsers => actor.is_staff(),
        Operation::View | Operation::Comment | Operation::AddEvidence => can_view,
        Operation::Feedback => report.is_some_and(|r| is_creator(actor, r)),
        Operation::Advance => {
            report.is_some_and(|r| entry_granted(EntryPoint::Advance, &parties(actor, r)))
        }
        Operation::SetStatus => {
            report.is_some_and(|r| entry_granted(EntryPoint::SetStatus, &parties(actor, r)))
        }
    }
}

/// [`allows`], as a result.
pub fn authorize(
    actor: &Actor,
    operation: Operation,
    report: Option<&report::Model>,
) -> AppResult<()> {
    if allows(actor, operation, report) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role {} may not perform {operation:?} here",
            actor.role.as_str()
        )))
    }
}
