//! Session store for workflow instances
//!
//! Holds the data a role accumulates while moving through its phases.
//! Every field here is either user input captured by a phase view or a
//! value written back by an operation adapter. Gate predicates only ever
//! read from these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::collaborators::{Assignment, DirectoryEntry, Priority};
use crate::error::WorkflowError;
use crate::types::{AgentId, PropertyId, Role, UploadRef};

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 8;

/// Registration input as typed into the phase 1 form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    /// Full name
    pub name: String,
    /// Email address
    pub email: String,
    /// Phone number
    pub phone: String,
    /// Password
    pub password: String,
    /// Password confirmation
    pub confirm_password: String,
}

/// Contact details shared by the buyer and seller flows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Full name
    pub name: String,

    /// Email address
    pub email: String,

    /// Phone number
    pub phone: String,

    /// Transient, never serialized
    #[serde(skip)]
    password: String,

    /// Transient, never serialized
    #[serde(skip)]
    confirm_password: String,

    /// Whether the registration form was accepted
    pub submitted: bool,
}

impl Registration {
    /// Current password input (empty once cleared)
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Current password confirmation input (empty once cleared)
    pub fn confirm_password(&self) -> &str {
        &self.confirm_password
    }

    /// Whether any credential input is still held
    pub fn has_credentials(&self) -> bool {
        !self.password.is_empty() || !self.confirm_password.is_empty()
    }

    /// Drop the transient credential fields
    pub(crate) fn clear_credentials(&mut self) {
        self.password.clear();
        self.confirm_password.clear();
    }

    /// Copy a form into the registration; returns which identity fields changed
    pub(crate) fn apply_form(&mut self, form: RegistrationForm) -> FormChanges {
        let changes = FormChanges {
            name: self.name != form.name,
            contact: self.email != form.email || self.phone != form.phone,
        };

        self.name = form.name;
        self.email = form.email;
        self.phone = form.phone;
        self.password = form.password;
        self.confirm_password = form.confirm_password;

        changes
    }

    /// Validate the captured fields, including the credentials
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::Validation("Name is required".to_string()));
        }
        validate_email(&self.email)?;
        validate_phone(&self.phone)?;

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(WorkflowError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.password != self.confirm_password {
            return Err(WorkflowError::Validation("Passwords do not match".to_string()));
        }

        Ok(())
    }
}

/// Which parts of the registration a form edit touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FormChanges {
    pub name: bool,
    pub contact: bool,
}

/// Check an email address has a `local@domain.tld` shape
pub fn validate_email(email: &str) -> Result<(), WorkflowError> {
    let invalid = || WorkflowError::Validation(format!("Invalid email address: {}", email));

    let (local, domain) = email.trim().split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || domain.contains(char::is_whitespace) {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

/// Check a phone number has 7 to 15 digits and only common separators
pub fn validate_phone(phone: &str) -> Result<(), WorkflowError> {
    let mut digits = 0usize;
    for c in phone.trim().chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '+' | '(' | ')' | '.' => {}
            _ => {
                return Err(WorkflowError::Validation(format!("Invalid phone number: {}", phone)));
            }
        }
    }

    if !(7..=15).contains(&digits) {
        return Err(WorkflowError::Validation(format!("Invalid phone number: {}", phone)));
    }
    Ok(())
}

/// Check a one-time code is 4 to 8 ASCII digits
pub fn validate_code(code: &str) -> Result<(), WorkflowError> {
    let len = code.len();
    if !(4..=8).contains(&len) || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WorkflowError::Validation("Verification code must be 4-8 digits".to_string()));
    }
    Ok(())
}

/// One-time-code verification progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Request identifier from the last successful code dispatch
    pub request_id: Option<String>,

    /// Code entered by the user
    pub otp: String,

    /// Whether the entered code was confirmed
    pub verified: bool,
}

impl Verification {
    pub(crate) fn reset(&mut self) {
        self.request_id = None;
        self.otp.clear();
        self.verified = false;
    }
}

/// Buyer session data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerSession {
    /// Account details
    pub registration: Registration,

    /// Contact verification
    pub verification: Verification,

    /// Property chosen in the selection phase
    pub selected_property: Option<PropertyId>,

    /// Set only by the payment adapter
    pub payment_completed: bool,

    /// Provider payment id, set together with `payment_completed`
    pub payment_id: Option<String>,

    /// Purchase terms accepted
    pub terms_accepted: bool,
}

/// Property details captured by the seller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDetails {
    /// Street address
    pub address: String,
    /// City
    pub city: String,
    /// Asking price in cents
    pub price_cents: u64,
    /// Free-form type (apartment, house, ...)
    pub property_type: String,
    /// Number of bedrooms
    pub bedrooms: u8,
    /// Number of bathrooms
    pub bathrooms: u8,
    /// Living area in square feet
    pub area_sqft: u32,
    /// Listing description
    pub description: String,
}

impl ListingDetails {
    /// Validate the fields the listing phase requires
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.address.trim().is_empty() {
            return Err(WorkflowError::Validation("Address is required".to_string()));
        }
        if self.city.trim().is_empty() {
            return Err(WorkflowError::Validation("City is required".to_string()));
        }
        if self.price_cents == 0 {
            return Err(WorkflowError::Validation("Price must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// The seller's listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Allocated on the first save
    pub property_id: Option<PropertyId>,

    /// Last saved details
    pub details: ListingDetails,

    /// Whether valid details were saved
    pub saved: bool,
}

/// Seller session data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerSession {
    /// Account details
    pub registration: Registration,

    /// Contact verification
    pub verification: Verification,

    /// Property listing
    pub listing: Listing,

    /// Listing photos
    pub images: Vec<UploadRef>,

    /// Ownership and disclosure documents
    pub documents: Vec<UploadRef>,

    /// Listing terms accepted
    pub terms_accepted: bool,

    /// Agent handling the listing, set by the assignment adapters
    pub assigned_agent: Option<Assignment>,
}

/// A property on an agent's worklist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySummary {
    /// Property identifier
    pub id: PropertyId,

    /// Display title
    pub title: String,

    /// Location
    pub location: String,

    /// Asking price in cents
    pub price_cents: u64,

    /// Assignment priority
    pub priority: Priority,
}

impl From<&DirectoryEntry> for PropertySummary {
    fn from(entry: &DirectoryEntry) -> Self {
        Self {
            id: PropertyId(entry.id.clone()),
            title: entry.title.clone(),
            location: entry.location.clone().unwrap_or_default(),
            price_cents: entry.price_cents.unwrap_or_default(),
            priority: entry.priority.unwrap_or_default(),
        }
    }
}

/// Lifecycle of the agent's current assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    /// Selected, not yet confirmed with the registry
    Pending,

    /// Confirmed by the assignment registry
    Accepted,
}

/// Metadata of the assignment the agent is working
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentMetadata {
    /// Set when the registry confirms the assignment
    pub assigned_date: Option<DateTime<Utc>>,

    /// Priority copied from the worklist entry
    pub priority: Priority,

    /// Current status
    pub status: AssignmentStatus,
}

/// Agent session data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSession {
    /// The agent running the flow
    pub agent_id: AgentId,

    /// Worklist, unique by property id, in directory order
    pub assigned_properties: Vec<PropertySummary>,

    /// Property picked from the worklist
    pub selected_property: Option<PropertyId>,

    /// Assignment being worked
    pub assignment: Option<AssignmentMetadata>,
}

impl AgentSession {
    /// Create an empty session for an agent
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            assigned_properties: Vec::new(),
            selected_property: None,
            assignment: None,
        }
    }

    /// Find a worklist entry by id
    pub fn assigned(&self, property_id: &PropertyId) -> Option<&PropertySummary> {
        self.assigned_properties.iter().find(|p| &p.id == property_id)
    }

    /// Replace the worklist, keeping the first occurrence of each id
    pub(crate) fn replace_worklist(&mut self, entries: &[DirectoryEntry]) {
        let mut worklist: Vec<PropertySummary> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !worklist.iter().any(|p| p.id.0 == entry.id) {
                worklist.push(PropertySummary::from(entry));
            }
        }
        self.assigned_properties = worklist;

        // A selection that fell off the worklist no longer counts
        if let Some(selected) = &self.selected_property {
            if self.assigned(selected).is_none() {
                self.selected_property = None;
                self.assignment = None;
            }
        }
    }
}

/// Role-specific session data of a workflow instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum SessionData {
    /// Buyer variant
    Buyer(BuyerSession),

    /// Seller variant
    Seller(SellerSession),

    /// Agent variant
    Agent(AgentSession),
}

impl SessionData {
    /// Fresh buyer session
    pub fn buyer() -> Self {
        SessionData::Buyer(BuyerSession::default())
    }

    /// Fresh seller session
    pub fn seller() -> Self {
        SessionData::Seller(SellerSession::default())
    }

    /// Fresh agent session
    pub fn agent(agent_id: AgentId) -> Self {
        SessionData::Agent(AgentSession::new(agent_id))
    }

    /// Role this session belongs to
    pub fn role(&self) -> Role {
        match self {
            SessionData::Buyer(_) => Role::Buyer,
            SessionData::Seller(_) => Role::Seller,
            SessionData::Agent(_) => Role::Agent,
        }
    }

    /// Buyer view of the session
    pub fn as_buyer(&self) -> Option<&BuyerSession> {
        match self {
            SessionData::Buyer(s) => Some(s),
            _ => None,
        }
    }

    /// Seller view of the session
    pub fn as_seller(&self) -> Option<&SellerSession> {
        match self {
            SessionData::Seller(s) => Some(s),
            _ => None,
        }
    }

    /// Agent view of the session
    pub fn as_agent(&self) -> Option<&AgentSession> {
        match self {
            SessionData::Agent(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn buyer_mut(&mut self) -> Result<&mut BuyerSession, WorkflowError> {
        let actual = self.role();
        match self {
            SessionData::Buyer(s) => Ok(s),
            _ => Err(WorkflowError::RoleMismatch { expected: Role::Buyer, actual }),
        }
    }

    pub(crate) fn seller_mut(&mut self) -> Result<&mut SellerSession, WorkflowError> {
        let actual = self.role();
        match self {
            SessionData::Seller(s) => Ok(s),
            _ => Err(WorkflowError::RoleMismatch { expected: Role::Seller, actual }),
        }
    }

    pub(crate) fn agent_mut(&mut self) -> Result<&mut AgentSession, WorkflowError> {
        let actual = self.role();
        match self {
            SessionData::Agent(s) => Ok(s),
            _ => Err(WorkflowError::RoleMismatch { expected: Role::Agent, actual }),
        }
    }

    /// Registration details, for the roles that register
    pub fn registration(&self) -> Option<&Registration> {
        match self {
            SessionData::Buyer(s) => Some(&s.registration),
            SessionData::Seller(s) => Some(&s.registration),
            SessionData::Agent(_) => None,
        }
    }

    /// Verification progress, for the roles that register
    pub fn verification(&self) -> Option<&Verification> {
        match self {
            SessionData::Buyer(s) => Some(&s.verification),
            SessionData::Seller(s) => Some(&s.verification),
            SessionData::Agent(_) => None,
        }
    }

    pub(crate) fn registration_mut(&mut self) -> Result<&mut Registration, WorkflowError> {
        match self {
            SessionData::Buyer(s) => Ok(&mut s.registration),
            SessionData::Seller(s) => Ok(&mut s.registration),
            SessionData::Agent(_) => Err(WorkflowError::RoleMismatch {
                expected: Role::Buyer,
                actual: Role::Agent,
            }),
        }
    }

    pub(crate) fn verification_mut(&mut self) -> Result<&mut Verification, WorkflowError> {
        match self {
            SessionData::Buyer(s) => Ok(&mut s.verification),
            SessionData::Seller(s) => Ok(&mut s.verification),
            SessionData::Agent(_) => Err(WorkflowError::RoleMismatch {
                expected: Role::Buyer,
                actual: Role::Agent,
            }),
        }
    }

    /// Drop transient credentials, if this role holds any
    pub(crate) fn clear_credentials(&mut self) {
        if let Ok(registration) = self.registration_mut() {
            registration.clear_credentials();
        }
    }
}
