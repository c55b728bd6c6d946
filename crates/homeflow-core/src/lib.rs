//!
//! Homeflow Core - Stepped workflow engine for property onboarding
//!
//! This crate holds the per-role phase tables, the gate engine deciding
//! which phases are reachable, the navigation controller, and the
//! sequence-guarded adapter that applies the results of external calls
//! (verification codes, payments, agent assignment, directory pages) to a
//! workflow instance.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - workflow instance, session data, phases and gates
pub mod domain;

/// Application services - navigation, operations and collaborator wiring
pub mod application;

/// Engine configuration
pub mod config;

/// Core types
pub mod types;

/// Error types
pub mod error;

// Re-export key types
pub use config::{ConfigError, EngineConfig, LoggingConfig, OperationTimeouts};
pub use error::{OperationError, WorkflowError};
pub use types::{AgentId, OperationKind, PhaseNumber, PropertyId, Role, UploadRef, WorkflowInstanceId};

pub use application::navigation::{BlockReason, NavigationOutcome};
pub use application::operation::{
    ConcurrencyPolicy, OperationResponse, OperationState, OperationTicket, OperationTracker,
    PendingCall,
};
pub use application::workflow_service::{DomainEventHandler, LoggingEventHandler, WorkflowService};

pub use domain::collaborators::{
    AgentAssignmentService, Assignment, CodeCheck, CodeDispatch, DirectoryEntry, DirectoryPage,
    DirectoryQuery, DirectoryService, PaymentConfirmation, PaymentGateway, PaymentIntent,
    PaymentStatus, Priority, VerificationService,
};
pub use domain::events::DomainEvent;
pub use domain::gate::GateReport;
pub use domain::phase::{PhaseDefinition, PhaseKey, PhaseStatus};
pub use domain::session::{
    AgentSession, AssignmentMetadata, AssignmentStatus, BuyerSession, ListingDetails,
    PropertySummary, Registration, RegistrationForm, SellerSession, SessionData, Verification,
};
pub use domain::workflow_instance::{PhaseTransition, TransitionKind, WorkflowInstance};
