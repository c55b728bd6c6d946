use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WorkflowError;

/// 1-indexed position of a phase inside a role's workflow
pub type PhaseNumber = usize;

/// The role a workflow instance is run for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Purchases a listed property
    Buyer,

    /// Lists a property and hands it to an agent
    Seller,

    /// Works the properties assigned to them
    Agent,
}

impl Role {
    /// Lowercase name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
            Role::Agent => "agent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyer" => Ok(Role::Buyer),
            "seller" => Ok(Role::Seller),
            "agent" => Ok(Role::Agent),
            other => Err(WorkflowError::Validation(format!("Unknown role: {}", other))),
        }
    }
}

/// Value object: Workflow instance ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowInstanceId(pub String);

/// Value object: Property ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(pub String);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value object: Agent ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds of asynchronous operation a workflow can issue.
///
/// Each kind has its own request sequence and state; see
/// [`OperationTracker`](crate::application::operation::OperationTracker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Issue a one-time verification code to a contact
    SendCode,

    /// Check a one-time verification code
    VerifyCode,

    /// Create and confirm a payment intent
    Payment,

    /// Assign an agent to a property
    AssignAgent,

    /// Look up the agent currently assigned to a property
    LookupAssignment,

    /// Fetch a page of the role's directory
    FetchDirectory,
}

impl OperationKind {
    /// All operation kinds, in declaration order
    pub const ALL: [OperationKind; 6] = [
        OperationKind::SendCode,
        OperationKind::VerifyCode,
        OperationKind::Payment,
        OperationKind::AssignAgent,
        OperationKind::LookupAssignment,
        OperationKind::FetchDirectory,
    ];

    /// Stable snake_case name, used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::SendCode => "send_code",
            OperationKind::VerifyCode => "verify_code",
            OperationKind::Payment => "payment",
            OperationKind::AssignAgent => "assign_agent",
            OperationKind::LookupAssignment => "lookup_assignment",
            OperationKind::FetchDirectory => "fetch_directory",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a file held by the external upload store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRef {
    /// Original file name, unique within a session
    pub file_name: String,

    /// MIME type reported by the uploader
    pub content_type: String,

    /// Size in bytes
    pub size_bytes: u64,
}

impl UploadRef {
    /// Create a new upload reference
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size_bytes,
        }
    }
}
