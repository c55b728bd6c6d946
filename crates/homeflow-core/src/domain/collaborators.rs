//! Collaborator interfaces for the Homeflow engine
//!
//! The engine reaches every external system through the async traits in
//! this module. Implementations are expected to return within a bounded
//! time; the engine enforces its own timeout on top of that. See the
//! `homeflow-state-inmemory` crate for in-memory implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;

use crate::error::OperationError;
use crate::types::{AgentId, PropertyId, Role};

/// Receipt for an issued verification code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDispatch {
    /// Identifier to quote when checking the code
    pub request_id: String,
}

/// Result of checking a verification code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCheck {
    /// Whether the code matched
    pub verified: bool,
}

/// A created payment intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Secret used by the confirmation step
    pub client_secret: String,
}

/// Status reported by the payment confirmation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Funds captured
    Succeeded,

    /// Customer action (e.g. 3-D Secure) still required
    RequiresAction,

    /// Payment declined
    Failed,
}

/// Outcome of confirming a payment intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// Provider payment identifier
    pub payment_id: String,

    /// Final status
    pub status: PaymentStatus,
}

/// An agent assigned to a property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Property the agent works
    pub property_id: PropertyId,

    /// The assigned agent
    pub assigned_agent: AgentId,

    /// When the assignment was recorded
    pub assigned_at: DateTime<Utc>,
}

/// Urgency of an agent's assignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Can wait
    Low,

    /// Default urgency
    #[default]
    Normal,

    /// Should be picked up soon
    High,
}

/// A page request against a role directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryQuery {
    /// Role whose directory is listed: buyers see listings, sellers see
    /// agents, agents see their assigned properties
    pub role: Role,

    /// Equality filters on entry attributes
    pub filters: BTreeMap<String, String>,

    /// 1-indexed page number
    pub page: u32,

    /// Entries per page
    pub page_size: u32,
}

/// One entry of a directory page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Property or agent identifier
    pub id: String,

    /// Display title
    pub title: String,

    /// Location, when the entry is a property
    #[serde(default)]
    pub location: Option<String>,

    /// Asking price in cents, when the entry is a property
    #[serde(default)]
    pub price_cents: Option<u64>,

    /// Assignment priority, when listed for an agent
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// A page of directory entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryPage {
    /// Entries on this page
    pub items: Vec<DirectoryEntry>,

    /// Matching entries across all pages
    pub total: u64,

    /// 1-indexed page number
    pub page: u32,

    /// Number of pages for the query
    pub total_pages: u32,
}

/// One-time-code verification
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Issue a code to an email address or phone number
    async fn send_verification_code(&self, contact: &str) -> Result<CodeDispatch, OperationError>;

    /// Check a code against an earlier dispatch
    async fn verify_code(&self, request_id: &str, code: &str) -> Result<CodeCheck, OperationError>;
}

/// Payment authorization
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for an amount in cents
    async fn create_payment_intent(
        &self,
        amount_cents: u64,
        metadata: BTreeMap<String, String>,
    ) -> Result<PaymentIntent, OperationError>;

    /// Client-side confirmation of an intent
    async fn confirm_payment(&self, client_secret: &str) -> Result<PaymentConfirmation, OperationError>;
}

/// Agent assignment registry
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AgentAssignmentService: Send + Sync {
    /// Assign an agent to a property, replacing any previous assignment
    async fn assign_agent(
        &self,
        property_id: &PropertyId,
        agent_id: &AgentId,
    ) -> Result<Assignment, OperationError>;

    /// Current assignment for a property, if any
    async fn get_assigned_agent(
        &self,
        property_id: &PropertyId,
    ) -> Result<Option<Assignment>, OperationError>;
}

/// Read-only role directories used by selection phases
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// List one page of a role directory
    async fn list_directory(&self, query: DirectoryQuery) -> Result<DirectoryPage, OperationError>;
}
