//! Phase gate evaluation
//!
//! Pure functions over a role, the current phase and the session. Nothing
//! here mutates state, so statuses are recomputed on every query and a
//! reset precondition re-locks dependent phases immediately.

use serde::{Deserialize, Serialize};

use crate::domain::phase::PhaseStatus;
use crate::domain::session::SessionData;
use crate::types::{PhaseNumber, Role};

/// Status of phase `phase` for a session sitting on `current`.
///
/// Phases outside `1..=role.phase_count()` are reported as `Locked`.
pub fn phase_status(
    role: Role,
    current: PhaseNumber,
    session: &SessionData,
    phase: PhaseNumber,
) -> PhaseStatus {
    let phases = role.phases();
    if phase == 0 || phase > phases.len() {
        return PhaseStatus::Locked;
    }

    let earlier_complete = phases[..phase - 1]
        .iter()
        .all(|def| def.is_complete(session));
    if !earlier_complete {
        return PhaseStatus::Locked;
    }

    if phases[phase - 1].is_complete(session) {
        PhaseStatus::Completed
    } else if phase == current {
        PhaseStatus::Active
    } else {
        PhaseStatus::UnlockedIncomplete
    }
}

/// First phase whose predicate does not hold, `None` when all are complete.
///
/// Every phase before it is complete, so it is the furthest reachable
/// incomplete phase.
pub fn frontier(role: Role, session: &SessionData) -> Option<PhaseNumber> {
    role.phases()
        .iter()
        .position(|def| !def.is_complete(session))
        .map(|idx| idx + 1)
}

/// Whether every phase of the role is complete
pub fn is_terminal(role: Role, session: &SessionData) -> bool {
    frontier(role, session).is_none()
}

/// Snapshot of all gate statuses, for presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    /// Role evaluated
    pub role: Role,

    /// Phase the instance sits on
    pub current_phase: PhaseNumber,

    /// Status per phase; index 0 is phase 1
    pub statuses: Vec<PhaseStatus>,

    /// Every phase complete
    pub is_terminal: bool,
}

impl GateReport {
    /// Evaluate every phase of the role
    pub fn evaluate(role: Role, current: PhaseNumber, session: &SessionData) -> Self {
        let statuses = (1..=role.phase_count())
            .map(|p| phase_status(role, current, session, p))
            .collect();

        Self {
            role,
            current_phase: current,
            statuses,
            is_terminal: is_terminal(role, session),
        }
    }

    /// Status of a 1-indexed phase
    pub fn status(&self, phase: PhaseNumber) -> PhaseStatus {
        phase
            .checked_sub(1)
            .and_then(|idx| self.statuses.get(idx).copied())
            .unwrap_or(PhaseStatus::Locked)
    }

    /// Number of completed phases
    pub fn completed_count(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| **s == PhaseStatus::Completed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted_buyer() -> SessionData {
        let mut session = SessionData::buyer();
        if let SessionData::Buyer(b) = &mut session {
            b.registration.submitted = true;
        }
        session
    }

    #[test]
    fn test_fresh_buyer_statuses() {
        let session = SessionData::buyer();
        let report = GateReport::evaluate(Role::Buyer, 1, &session);

        assert_eq!(
            report.statuses,
            vec![
                PhaseStatus::Active,
                PhaseStatus::Locked,
                PhaseStatus::Locked,
                PhaseStatus::Locked
            ]
        );
        assert!(!report.is_terminal);
        assert_eq!(frontier(Role::Buyer, &session), Some(1));
    }

    #[test]
    fn test_completed_current_phase_reports_completed() {
        let session = submitted_buyer();
        assert_eq!(phase_status(Role::Buyer, 1, &session, 1), PhaseStatus::Completed);
        assert_eq!(phase_status(Role::Buyer, 1, &session, 2), PhaseStatus::UnlockedIncomplete);
        assert_eq!(phase_status(Role::Buyer, 2, &session, 2), PhaseStatus::Active);
        assert_eq!(phase_status(Role::Buyer, 1, &session, 3), PhaseStatus::Locked);
    }

    #[test]
    fn test_out_of_range_is_locked() {
        let session = submitted_buyer();
        assert_eq!(phase_status(Role::Buyer, 1, &session, 0), PhaseStatus::Locked);
        assert_eq!(phase_status(Role::Buyer, 1, &session, 5), PhaseStatus::Locked);

        let report = GateReport::evaluate(Role::Buyer, 1, &session);
        assert_eq!(report.status(0), PhaseStatus::Locked);
        assert_eq!(report.status(9), PhaseStatus::Locked);
    }

    #[test]
    fn test_reset_relocks_dependent_phases() {
        let mut session = submitted_buyer();
        if let SessionData::Buyer(b) = &mut session {
            b.verification.verified = true;
            b.selected_property = Some(crate::types::PropertyId("p1".to_string()));
        }
        assert_eq!(phase_status(Role::Buyer, 3, &session, 4), PhaseStatus::UnlockedIncomplete);

        if let SessionData::Buyer(b) = &mut session {
            b.verification.verified = false;
        }
        // Selection stays set but can no longer count
        assert_eq!(phase_status(Role::Buyer, 3, &session, 3), PhaseStatus::Locked);
        assert_eq!(phase_status(Role::Buyer, 3, &session, 4), PhaseStatus::Locked);
        assert_eq!(frontier(Role::Buyer, &session), Some(2));
    }

    #[test]
    fn test_terminal_buyer() {
        let mut session = submitted_buyer();
        if let SessionData::Buyer(b) = &mut session {
            b.verification.verified = true;
            b.selected_property = Some(crate::types::PropertyId("p1".to_string()));
            b.payment_completed = true;
        }

        let report = GateReport::evaluate(Role::Buyer, 4, &session);
        assert!(report.is_terminal);
        assert_eq!(report.completed_count(), 4);
        assert_eq!(frontier(Role::Buyer, &session), None);
    }
}
