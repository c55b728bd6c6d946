//! Sequence-guarded tracking of asynchronous operations
//!
//! Every call to an external collaborator is issued as an
//! [`OperationTicket`] carrying a per-kind sequence number. Only the
//! response to the latest ticket of a kind may change state; anything
//! older is stale and is dropped by the caller.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::error::{OperationError, WorkflowError};
use crate::types::OperationKind;

/// What happens when a call is issued while another of the same kind is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// The new call wins; the older response will be stale
    Supersede,

    /// The new call is refused with `OperationInFlight`
    Reject,
}

impl OperationKind {
    /// Concurrency policy of this kind
    pub fn policy(&self) -> ConcurrencyPolicy {
        match self {
            OperationKind::Payment => ConcurrencyPolicy::Reject,
            _ => ConcurrencyPolicy::Supersede,
        }
    }
}

/// State of one operation kind
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OperationState {
    /// Never issued, or cancelled
    #[default]
    Idle,

    /// Waiting on the response to `seq`
    Pending {
        /// Sequence number in flight
        seq: u64,
    },

    /// Response to `seq` succeeded and was written back
    Succeeded {
        /// Sequence number that succeeded
        seq: u64,
    },

    /// Response to `seq` failed; session untouched
    Failed {
        /// Sequence number that failed
        seq: u64,
        /// Failure kept for the phase view
        error: OperationError,
    },
}

impl OperationState {
    /// Whether a call is in flight
    pub fn is_pending(&self) -> bool {
        matches!(self, OperationState::Pending { .. })
    }

    /// Sequence number the state refers to, if any
    pub fn seq(&self) -> Option<u64> {
        match self {
            OperationState::Idle => None,
            OperationState::Pending { seq }
            | OperationState::Succeeded { seq }
            | OperationState::Failed { seq, .. } => Some(*seq),
        }
    }
}

/// Identifies one issued request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTicket {
    /// Operation kind
    pub kind: OperationKind,

    /// Per-kind sequence number, starting at 1
    pub seq: u64,

    /// When the ticket was issued
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct OperationSlot {
    last_seq: u64,
    state: OperationState,
}

/// Per-kind operation state of a workflow instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTracker {
    slots: BTreeMap<OperationKind, OperationSlot>,
}

static IDLE: OperationState = OperationState::Idle;

impl OperationTracker {
    /// Create a tracker with every kind idle
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket for `kind`, honouring its concurrency policy
    pub fn begin(&mut self, kind: OperationKind) -> Result<OperationTicket, WorkflowError> {
        let slot = self.slots.entry(kind).or_default();

        if slot.state.is_pending() && kind.policy() == ConcurrencyPolicy::Reject {
            return Err(WorkflowError::OperationInFlight(kind));
        }

        slot.last_seq += 1;
        slot.state = OperationState::Pending { seq: slot.last_seq };

        Ok(OperationTicket {
            kind,
            seq: slot.last_seq,
            issued_at: Utc::now(),
        })
    }

    /// Check that `ticket` is the one currently pending
    pub fn check_current(&self, ticket: &OperationTicket) -> Result<(), WorkflowError> {
        match self.state(ticket.kind) {
            OperationState::Pending { seq } if *seq == ticket.seq => Ok(()),
            _ => Err(WorkflowError::StaleResponse {
                kind: ticket.kind,
                seq: ticket.seq,
            }),
        }
    }

    /// Mark the pending ticket as succeeded
    pub fn succeed(&mut self, ticket: &OperationTicket) -> Result<(), WorkflowError> {
        self.check_current(ticket)?;
        self.set_state(ticket.kind, OperationState::Succeeded { seq: ticket.seq });
        Ok(())
    }

    /// Mark the pending ticket as failed
    pub fn fail(&mut self, ticket: &OperationTicket, error: OperationError) -> Result<(), WorkflowError> {
        self.check_current(ticket)?;
        self.set_state(
            ticket.kind,
            OperationState::Failed {
                seq: ticket.seq,
                error,
            },
        );
        Ok(())
    }

    /// Drop a pending call; its response will be stale. Returns whether
    /// anything was pending.
    pub fn cancel(&mut self, kind: OperationKind) -> bool {
        match self.slots.get_mut(&kind) {
            Some(slot) if slot.state.is_pending() => {
                slot.state = OperationState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Current state of a kind
    pub fn state(&self, kind: OperationKind) -> &OperationState {
        self.slots.get(&kind).map(|s| &s.state).unwrap_or(&IDLE)
    }

    /// Error of the last failed call of a kind, while it is the latest outcome
    pub fn last_error(&self, kind: OperationKind) -> Option<&OperationError> {
        match self.state(kind) {
            OperationState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Highest sequence number issued for a kind
    pub fn last_seq(&self, kind: OperationKind) -> u64 {
        self.slots.get(&kind).map_or(0, |s| s.last_seq)
    }

    /// Whether any call is in flight
    pub fn any_pending(&self) -> bool {
        self.slots.values().any(|s| s.state.is_pending())
    }

    fn set_state(&mut self, kind: OperationKind, state: OperationState) {
        self.slots.entry(kind).or_default().state = state;
    }
}

/// Outcome of a resolved call, ready for write-back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResponse<T> {
    /// Ticket the call was issued under
    pub ticket: OperationTicket,

    /// Collaborator result, or a timeout
    pub result: Result<T, OperationError>,
}

/// An issued request that has not been awaited yet.
///
/// Owns everything it needs, so it can be moved to another task and
/// resolved while the workflow instance keeps handling navigation.
pub struct PendingCall<T> {
    ticket: OperationTicket,
    timeout: Duration,
    future: BoxFuture<'static, Result<T, OperationError>>,
}

impl<T> fmt::Debug for PendingCall<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("ticket", &self.ticket)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<T> PendingCall<T> {
    /// Wrap a collaborator future
    pub fn new(
        ticket: OperationTicket,
        timeout: Duration,
        future: BoxFuture<'static, Result<T, OperationError>>,
    ) -> Self {
        Self {
            ticket,
            timeout,
            future,
        }
    }

    /// Ticket of this call
    pub fn ticket(&self) -> &OperationTicket {
        &self.ticket
    }

    /// Bounded wait applied by `resolve`
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Await the collaborator, failing with `Timeout` past the bounded wait
    pub async fn resolve(self) -> OperationResponse<T> {
        let result = match tokio::time::timeout(self.timeout, self.future).await {
            Ok(result) => result,
            Err(_) => {
                let millis = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                Err(OperationError::Timeout(millis))
            }
        };

        OperationResponse {
            ticket: self.ticket,
            result,
        }
    }
}
