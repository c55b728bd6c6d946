/// Workflow instance aggregate
pub mod workflow_instance;

/// Domain events
pub mod events;

/// Session store: role-specific session data
pub mod session;

/// Per-role phase tables
pub mod phase;

/// Phase gate evaluation
pub mod gate;

/// Collaborator interfaces
pub mod collaborators;
