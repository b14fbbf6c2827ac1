//! Transition validator and the single stage transition table.
//!
//! Both mutation entry points (stage advance and the legacy status
//! setter) are resolved against [`RULES`]; the resulting stage is then
//! projected onto its canonical status by the registry, so the two paths
//! cannot diverge.

use std::fmt;

use aniseg_common::{AppError, AppResult};
use aniseg_db::entities::report::Stage;

use super::registry::STAGE_COUNT;

/// Why a requested stage is not reachable from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// The requested stage is not `current + 1`.
    Skip {
        /// The only stage reachable from here.
        expected: i32,
    },
    /// The requested stage is not ahead of the current one.
    Backward {
        /// Stage the report is at.
        current: i32,
    },
    /// The report is already at stage 6.
    Terminal,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip { expected } => {
                write!(f, "stage skip not permitted, expected {expected}")
            }
            Self::Backward { current } => {
                write!(f, "backward transition not permitted from stage {current}")
            }
            Self::Terminal => f.write_str("already at terminal stage"),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        Self::IllegalTransition(err.to_string())
    }
}

/// Decide whether `requested` is the legal successor of `current`.
///
/// Legal iff `requested == current + 1` and `requested <= 6`.
pub const fn validate_advance(current: i32, requested: i32) -> Result<Stage, TransitionError> {
    if current >= STAGE_COUNT {
        return Err(TransitionError::Terminal);
    }
    if requested <= current {
        return Err(TransitionError::Backward { current });
    }
    if requested != current + 1 {
        return Err(TransitionError::Skip {
            expected: current + 1,
        });
    }
    match Stage::from_number(requested) {
        Some(stage) => Ok(stage),
        None => Err(TransitionError::Terminal),
    }
}

/// Which operation is asking to move the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// `advanceStage`: always targets `current + 1`.
    Advance,
    /// Legacy `setStatus`: target given as a status symbol.
    SetStatus,
}

/// How an actor relates to a particular report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    /// Created the report.
    Creator,
    /// The authority that accepted the report.
    ResponsibleAuthority,
    /// Holds the authority role but did not accept this report.
    Authority,
    /// Holds the admin role.
    Admin,
}

/// One allowed edge family: `party` may move a report from any stage in
/// `from..=until` to the next stage through `entry`.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Operation the rule applies to.
    pub entry: EntryPoint,
    /// Relation the actor must hold to the report.
    pub party: Party,
    /// First stage the edge may start from.
    pub from: Stage,
    /// Last stage the edge may start from.
    pub until: Stage,
}

impl Rule {
    const fn covers(&self, stage: Stage) -> bool {
        stage.number() >= self.from.number() && stage.number() <= self.until.number()
    }
}

const fn rule(entry: EntryPoint, party: Party, from: Stage, until: Stage) -> Rule {
    Rule {
        entry,
        party,
        from,
        until,
    }
}

/// Every legal forward edge. Stage 1 is left through acceptance or an
/// explicit advance; the status setter starts at stage 2.
pub const RULES: [Rule; 7] = [
    rule(EntryPoint::Advance, Party::Creator, Stage::Created, Stage::Resolved),
    rule(EntryPoint::Advance, Party::ResponsibleAuthority, Stage::Created, Stage::Resolved),
    rule(EntryPoint::Advance, Party::Admin, Stage::Created, Stage::Resolved),
    rule(EntryPoint::SetStatus, Party::ResponsibleAuthority, Stage::UnderReview, Stage::Resolved),
    rule(EntryPoint::SetStatus, Party::Authority, Stage::UnderReview, Stage::Resolved),
    rule(EntryPoint::SetStatus, Party::Admin, Stage::UnderReview, Stage::Resolved),
    // A citizen creator may only confirm a resolution.
    rule(EntryPoint::SetStatus, Party::Creator, Stage::Resolved, Stage::Resolved),
];

/// Whether any of `parties` may use `entry` at all.
#[must_use]
pub fn entry_granted(entry: EntryPoint, parties: &[Party]) -> bool {
    RULES
        .iter()
        .any(|r| r.entry == entry && parties.contains(&r.party))
}

/// Resolve a requested move against the transition table.
///
/// Returns the target stage when legal. Errors with
/// [`AppError::Forbidden`] when the actor's relation to the report does not
/// grant the edge, and [`AppError::IllegalTransition`] when the edge does
/// not exist for anyone.
pub fn resolve(
    entry: EntryPoint,
    parties: &[Party],
    current: Stage,
    requested: i32,
) -> AppResult<Stage> {
    if !entry_granted(entry, parties) {
        return Err(AppError::Forbidden(
            "not permitted to change the stage of this report".to_string(),
        ));
    }

    let target = validate_advance(current.number(), requested)?;

    let mut edge_exists = false;
    for r in RULES.iter().filter(|r| r.entry == entry && r.covers(current)) {
        if parties.contains(&r.party) {
            return Ok(target);
        }
        edge_exists = true;
    }

    if edge_exists {
        Err(AppError::Forbidden(format!(
            "not permitted to move this report from stage {}",
            current.number()
        )))
    } else {
        Err(AppError::IllegalTransition(format!(
            "stage {} cannot be left this way",
            current.number()
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_single_step_is_legal() {
        for n in 1..STAGE_COUNT {
            assert_eq!(validate_advance(n, n + 1).unwrap().number(), n + 1);
        }
    }

    #[test]
    fn test_skip_is_illegal() {
        let err = validate_advance(1, 3).unwrap_err();
        assert_eq!(err, TransitionError::Skip { expected: 2 });
        assert_eq!(err.to_string(), "stage skip not permitted, expected 2");
    }

    #[test]
    fn test_terminal_is_illegal() {
        let err = validate_advance(6, 7).unwrap_err();
        assert_eq!(err.to_string(), "already at terminal stage");
    }

    #[test]
    fn test_backward_is_never_legal() {
        for current in 1..=STAGE_COUNT {
            for requested in 1..=current {
                assert!(validate_advance(current, requested).is_err());
            }
        }
    }

    #[test]
    fn test_creator_may_only_confirm_through_set_status() {
        let creator = [Party::Creator];
        assert_eq!(
            resolve(EntryPoint::SetStatus, &creator, Stage::Resolved, 6).unwrap(),
            Stage::Concluded
        );
        assert!(matches!(
            resolve(EntryPoint::SetStatus, &creator, Stage::UnderReview, 3),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_outsider_is_forbidden_before_validation() {
        assert!(matches!(
            resolve(EntryPoint::Advance, &[], Stage::Created, 2),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            resolve(EntryPoint::SetStatus, &[], Stage::Resolved, 6),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_set_status_cannot_leave_stage_one() {
        assert!(matches!(
            resolve(EntryPoint::SetStatus, &[Party::Admin], Stage::Created, 2),
            Err(AppError::IllegalTransition(_))
        ));
    }

    #[test]
    fn test_unassigned_authority_cannot_advance() {
        assert!(matches!(
            resolve(EntryPoint::Advance, &[Party::Authority], Stage::UnderReview, 3),
            Err(AppError::Forbidden(_))
        ));
        assert!(resolve(EntryPoint::SetStatus, &[Party::Authority], Stage::UnderReview, 3).is_ok());
    }

    #[test]
    fn test_both_entry_points_reach_the_same_stage() {
        for n in 2..STAGE_COUNT {
            let current = Stage::from_number(n).unwrap();
            let parties = [Party::Admin];
            assert_eq!(
                resolve(EntryPoint::Advance, &parties, current, n + 1).unwrap(),
                resolve(EntryPoint::SetStatus, &parties, current, n + 1).unwrap()
            );
        }
    }

    #[test]
    fn test_terminal_stage_rejects_every_party() {
        let all = [
            Party::Creator,
            Party::ResponsibleAuthority,
            Party::Authority,
            Party::Admin,
        ];
        for entry in [EntryPoint::Advance, EntryPoint::SetStatus] {
            assert!(matches!(
                resolve(entry, &all, Stage::Concluded, 7),
                Err(AppError::IllegalTransition(_))
            ));
        }
    }
}
