/// Workflow service
pub mod workflow_service;

/// Navigation controller
pub mod navigation;

/// Operation tickets, tracking and pending calls
pub mod operation;

/// Preconditions and write-back per operation kind
pub mod adapters;
