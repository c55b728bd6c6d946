//! Navigation controller
//!
//! Moves the current phase of a workflow instance, guarded by the phase
//! gates. Refusals are values, not errors: a blocked move leaves the
//! instance untouched apart from a `navigation.blocked` event.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::events::NavigationBlocked;
use crate::domain::gate;
use crate::domain::phase::PhaseStatus;
use crate::domain::workflow_instance::{TransitionKind, WorkflowInstance};
use crate::error::WorkflowError;
use crate::types::PhaseNumber;

/// Why a navigation request did not move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    /// Already on the first or last phase
    AtBoundary,

    /// The target phase's gate does not allow the move
    GateViolation {
        /// Requested phase
        target: PhaseNumber,
        /// Its status at the time of the request
        status: PhaseStatus,
    },

    /// No such phase for this role
    OutOfRange {
        /// Requested phase
        target: PhaseNumber,
    },

    /// The target is the current phase
    AlreadyThere,
}

/// Result of a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavigationOutcome {
    /// The current phase changed
    Moved {
        /// Phase left
        from: PhaseNumber,
        /// Phase entered
        to: PhaseNumber,
    },

    /// Nothing changed
    Blocked(BlockReason),
}

impl NavigationOutcome {
    /// Whether the phase changed
    pub fn is_moved(&self) -> bool {
        matches!(self, NavigationOutcome::Moved { .. })
    }

    /// Gate refusals as `WorkflowError::GateViolation`, other blocks as
    /// validation errors
    pub fn into_result(self, from: PhaseNumber) -> Result<PhaseNumber, WorkflowError> {
        match self {
            NavigationOutcome::Moved { to, .. } => Ok(to),
            NavigationOutcome::Blocked(BlockReason::GateViolation { target, .. }) => {
                Err(WorkflowError::GateViolation { from, to: target })
            }
            NavigationOutcome::Blocked(BlockReason::OutOfRange { target }) => Err(
                WorkflowError::Validation(format!("Phase {} does not exist", target)),
            ),
            NavigationOutcome::Blocked(BlockReason::AtBoundary) => {
                Err(WorkflowError::Validation("No phase in that direction".to_string()))
            }
            NavigationOutcome::Blocked(BlockReason::AlreadyThere) => Ok(from),
        }
    }
}

impl WorkflowInstance {
    /// Move to the next phase unless it is locked
    pub fn advance(&mut self) -> NavigationOutcome {
        let current = self.current_phase();
        if current >= self.max_phase() {
            debug!(workflow_id = %self.id().0, current, "Advance refused at the last phase");
            return NavigationOutcome::Blocked(BlockReason::AtBoundary);
        }

        let target = current + 1;
        let status = self.phase_status(target);
        if status == PhaseStatus::Locked {
            return self.blocked_by_gate(target, status);
        }

        self.move_to(target, TransitionKind::Advance);
        NavigationOutcome::Moved { from: current, to: target }
    }

    /// Move to the previous phase; session data is not touched
    pub fn retreat(&mut self) -> NavigationOutcome {
        let current = self.current_phase();
        if current <= 1 {
            debug!(workflow_id = %self.id().0, "Retreat refused at the first phase");
            return NavigationOutcome::Blocked(BlockReason::AtBoundary);
        }

        self.move_to(current - 1, TransitionKind::Retreat);
        NavigationOutcome::Moved { from: current, to: current - 1 }
    }

    /// Jump to a completed phase or to the first incomplete one
    pub fn go_to(&mut self, target: PhaseNumber) -> NavigationOutcome {
        let current = self.current_phase();
        if target == 0 || target > self.max_phase() {
            debug!(workflow_id = %self.id().0, target, "Go-to refused: no such phase");
            return NavigationOutcome::Blocked(BlockReason::OutOfRange { target });
        }
        if target == current {
            return NavigationOutcome::Blocked(BlockReason::AlreadyThere);
        }

        let status = self.phase_status(target);
        let is_frontier = gate::frontier(self.role(), self.session()) == Some(target);
        if status != PhaseStatus::Completed && !is_frontier {
            return self.blocked_by_gate(target, status);
        }

        self.move_to(target, TransitionKind::GoTo);
        NavigationOutcome::Moved { from: current, to: target }
    }

    /// Whether `advance` would move right now
    pub fn can_advance(&self) -> bool {
        let current = self.current_phase();
        current < self.max_phase() && self.phase_status(current + 1) != PhaseStatus::Locked
    }

    fn blocked_by_gate(&mut self, target: PhaseNumber, status: PhaseStatus) -> NavigationOutcome {
        let from = self.current_phase();
        debug!(
            workflow_id = %self.id().0,
            from,
            target,
            status = %status,
            "Navigation blocked by gate"
        );

        self.record_event(Box::new(NavigationBlocked {
            workflow_instance_id: self.id().clone(),
            role: self.role(),
            from,
            target,
            timestamp: Utc::now(),
        }));

        NavigationOutcome::Blocked(BlockReason::GateViolation { target, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionData;
    use crate::types::PropertyId;

    fn buyer_through(phases: usize) -> WorkflowInstance {
        let mut instance = WorkflowInstance::buyer();
        if let SessionData::Buyer(b) = instance.session_mut() {
            b.registration.submitted = phases >= 1;
            b.verification.verified = phases >= 2;
            if phases >= 3 {
                b.selected_property = Some(PropertyId("p1".to_string()));
            }
            b.payment_completed = phases >= 4;
        }
        instance
    }

    #[test]
    fn test_advance_blocked_by_locked_phase() {
        let mut instance = WorkflowInstance::buyer();
        instance.take_events();

        let outcome = instance.advance();
        assert_eq!(
            outcome,
            NavigationOutcome::Blocked(BlockReason::GateViolation {
                target: 2,
                status: PhaseStatus::Locked
            })
        );
        assert_eq!(instance.current_phase(), 1);
        assert!(instance.phase_history().is_empty());

        let events = instance.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "navigation.blocked");
    }

    #[test]
    fn test_advance_and_retreat() {
        let mut instance = buyer_through(1);
        assert!(instance.can_advance());
        assert_eq!(instance.advance(), NavigationOutcome::Moved { from: 1, to: 2 });
        assert!(!instance.can_advance());
        assert!(!instance.advance().is_moved());

        assert_eq!(instance.retreat(), NavigationOutcome::Moved { from: 2, to: 1 });
        assert_eq!(instance.retreat(), NavigationOutcome::Blocked(BlockReason::AtBoundary));
        assert_eq!(instance.phase_history().len(), 2);
        assert_eq!(instance.phase_history()[1].kind, TransitionKind::Retreat);
    }

    #[test]
    fn test_advance_at_last_phase() {
        let mut instance = buyer_through(4);
        assert_eq!(instance.go_to(4), NavigationOutcome::Moved { from: 1, to: 4 });
        assert_eq!(instance.advance(), NavigationOutcome::Blocked(BlockReason::AtBoundary));
    }

    #[test]
    fn test_go_to_rules() {
        let mut instance = buyer_through(2);

        // Frontier is phase 3
        assert_eq!(instance.go_to(3), NavigationOutcome::Moved { from: 1, to: 3 });
        // Completed phases are always reachable
        assert_eq!(instance.go_to(1), NavigationOutcome::Moved { from: 3, to: 1 });
        assert!(matches!(
            instance.go_to(4),
            NavigationOutcome::Blocked(BlockReason::GateViolation { target: 4, status: PhaseStatus::Locked })
        ));
        assert_eq!(instance.go_to(0), NavigationOutcome::Blocked(BlockReason::OutOfRange { target: 0 }));
        assert_eq!(instance.go_to(5), NavigationOutcome::Blocked(BlockReason::OutOfRange { target: 5 }));
        assert_eq!(instance.go_to(1), NavigationOutcome::Blocked(BlockReason::AlreadyThere));
    }

    #[test]
    fn test_go_to_skips_nothing_incomplete() {
        // Phase 3 unlocked but incomplete, phase 4 locked behind it
        let mut instance = buyer_through(2);
        instance.go_to(2);
        assert!(!instance.go_to(4).is_moved());
        assert_eq!(instance.current_phase(), 2);
    }

    #[test]
    fn test_into_result() {
        let gate = NavigationOutcome::Blocked(BlockReason::GateViolation {
            target: 3,
            status: PhaseStatus::Locked,
        });
        assert_eq!(gate.into_result(1), Err(WorkflowError::GateViolation { from: 1, to: 3 }));
        assert_eq!(NavigationOutcome::Moved { from: 1, to: 2 }.into_result(1), Ok(2));
        assert_eq!(NavigationOutcome::Blocked(BlockReason::AlreadyThere).into_result(2), Ok(2));
    }

    #[test]
    fn test_current_phase_may_sit_on_relocked_phase() {
        let mut instance = buyer_through(3);
        instance.go_to(3);
        if let SessionData::Buyer(b) = instance.session_mut() {
            b.verification.verified = false;
        }

        // No rewind, but the phase reports locked and advance is refused
        assert_eq!(instance.current_phase(), 3);
        assert_eq!(instance.phase_status(3), PhaseStatus::Locked);
        assert!(!instance.advance().is_moved());
        assert_eq!(instance.retreat(), NavigationOutcome::Moved { from: 3, to: 2 });
    }
}
