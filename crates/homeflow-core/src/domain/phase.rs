//! Declared phase tables for each role
//!
//! A role's workflow is an ordered list of [`PhaseDefinition`]s. Each
//! definition carries the predicate that decides whether the phase is
//! complete for a given session. The tables are static and never change
//! at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::session::{AssignmentStatus, SessionData};
use crate::types::{PhaseNumber, Role};

/// Gate status of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// An earlier phase is incomplete
    Locked,

    /// Reachable, incomplete and not the current phase
    UnlockedIncomplete,

    /// The current phase, not yet complete
    Active,

    /// Completion predicate holds
    Completed,
}

impl PhaseStatus {
    /// Lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Locked => "locked",
            PhaseStatus::UnlockedIncomplete => "unlocked_incomplete",
            PhaseStatus::Active => "active",
            PhaseStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKey {
    /// Account details
    Registration,
    /// One-time-code check
    Verification,
    /// Buyer picks a listed property
    PropertySelection,
    /// Buyer pays
    Payment,
    /// Seller describes the property and uploads photos
    Listing,
    /// Seller uploads documents, accepts terms and gets an agent
    DocumentsAndAgent,
    /// Agent loads their worklist
    Assignments,
    /// Agent picks a property from the worklist
    AssignmentSelection,
    /// Agent confirms the assignment
    Acceptance,
}

/// One phase of a role's workflow
#[derive(Clone, Copy)]
pub struct PhaseDefinition {
    /// Stable identifier
    pub key: PhaseKey,

    /// Human readable label
    pub label: &'static str,

    /// Completion predicate, pure over the session
    pub completed_when: fn(&SessionData) -> bool,
}

impl fmt::Debug for PhaseDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseDefinition")
            .field("key", &self.key)
            .field("label", &self.label)
            .finish()
    }
}

impl PhaseDefinition {
    /// Evaluate the completion predicate
    pub fn is_complete(&self, session: &SessionData) -> bool {
        (self.completed_when)(session)
    }
}

fn registration_submitted(session: &SessionData) -> bool {
    session.registration().map_or(false, |r| r.submitted)
}

fn contact_verified(session: &SessionData) -> bool {
    session.verification().map_or(false, |v| v.verified)
}

fn buyer_property_selected(session: &SessionData) -> bool {
    session
        .as_buyer()
        .map_or(false, |b| b.selected_property.is_some())
}

fn buyer_paid(session: &SessionData) -> bool {
    session.as_buyer().map_or(false, |b| b.payment_completed)
}

fn listing_ready(session: &SessionData) -> bool {
    session
        .as_seller()
        .map_or(false, |s| s.listing.saved && !s.images.is_empty())
}

fn documents_and_agent_ready(session: &SessionData) -> bool {
    session.as_seller().map_or(false, |s| {
        !s.documents.is_empty() && s.terms_accepted && s.assigned_agent.is_some()
    })
}

fn worklist_loaded(session: &SessionData) -> bool {
    session
        .as_agent()
        .map_or(false, |a| !a.assigned_properties.is_empty())
}

fn assignment_selected(session: &SessionData) -> bool {
    session.as_agent().map_or(false, |a| {
        a.selected_property
            .as_ref()
            .map_or(false, |id| a.assigned(id).is_some())
    })
}

fn assignment_accepted(session: &SessionData) -> bool {
    session.as_agent().map_or(false, |a| {
        assignment_selected(session)
            && a.assignment
                .as_ref()
                .map_or(false, |m| m.status == AssignmentStatus::Accepted)
    })
}

static BUYER_PHASES: [PhaseDefinition; 4] = [
    PhaseDefinition {
        key: PhaseKey::Registration,
        label: "Registration",
        completed_when: registration_submitted,
    },
    PhaseDefinition {
        key: PhaseKey::Verification,
        label: "Verification",
        completed_when: contact_verified,
    },
    PhaseDefinition {
        key: PhaseKey::PropertySelection,
        label: "Property selection",
        completed_when: buyer_property_selected,
    },
    PhaseDefinition {
        key: PhaseKey::Payment,
        label: "Payment",
        completed_when: buyer_paid,
    },
];

static SELLER_PHASES: [PhaseDefinition; 4] = [
    PhaseDefinition {
        key: PhaseKey::Registration,
        label: "Registration",
        completed_when: registration_submitted,
    },
    PhaseDefinition {
        key: PhaseKey::Verification,
        label: "Verification",
        completed_when: contact_verified,
    },
    PhaseDefinition {
        key: PhaseKey::Listing,
        label: "Property listing",
        completed_when: listing_ready,
    },
    PhaseDefinition {
        key: PhaseKey::DocumentsAndAgent,
        label: "Documents & agent",
        completed_when: documents_and_agent_ready,
    },
];

static AGENT_PHASES: [PhaseDefinition; 3] = [
    PhaseDefinition {
        key: PhaseKey::Assignments,
        label: "Assignments",
        completed_when: worklist_loaded,
    },
    PhaseDefinition {
        key: PhaseKey::AssignmentSelection,
        label: "Select property",
        completed_when: assignment_selected,
    },
    PhaseDefinition {
        key: PhaseKey::Acceptance,
        label: "Accept assignment",
        completed_when: assignment_accepted,
    },
];

impl Role {
    /// Ordered phase table of this role
    pub fn phases(&self) -> &'static [PhaseDefinition] {
        match self {
            Role::Buyer => &BUYER_PHASES,
            Role::Seller => &SELLER_PHASES,
            Role::Agent => &AGENT_PHASES,
        }
    }

    /// Number of phases, the highest valid `PhaseNumber`
    pub fn phase_count(&self) -> PhaseNumber {
        self.phases().len()
    }

    /// Definition of a 1-indexed phase
    pub fn phase(&self, phase: PhaseNumber) -> Option<&'static PhaseDefinition> {
        phase.checked_sub(1).and_then(|idx| self.phases().get(idx))
    }

    /// 1-indexed position of a phase key in this role's table
    pub fn phase_number(&self, key: PhaseKey) -> Option<PhaseNumber> {
        self.phases()
            .iter()
            .position(|def| def.key == key)
            .map(|idx| idx + 1)
    }
}
