//! Per-operation preconditions and write-back
//!
//! Each operation has a `prepare_*` step that checks preconditions and
//! captures the call inputs before any ticket is issued, and an `apply_*`
//! step that writes exactly the fields the operation owns once the
//! response is known. Neither step performs I/O; see
//! [`WorkflowService`](crate::application::workflow_service::WorkflowService)
//! for the collaborator calls in between.

use std::collections::BTreeMap;

use crate::application::operation::OperationResponse;
use crate::domain::collaborators::{
    Assignment, CodeCheck, CodeDispatch, DirectoryPage, DirectoryQuery, PaymentConfirmation,
    PaymentStatus, Priority,
};
use crate::domain::phase::PhaseKey;
use crate::domain::session::{validate_code, AssignmentMetadata, AssignmentStatus, SessionData};
use crate::domain::workflow_instance::WorkflowInstance;
use crate::error::{OperationError, WorkflowError};
use crate::types::{AgentId, PropertyId, Role};

/// Largest directory page a caller may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// Map a session-level refusal inside a write-back onto the operation error
fn rejected(err: WorkflowError) -> OperationError {
    OperationError::Validation(err.to_string())
}

impl WorkflowInstance {
    // ----- send code -----

    /// Contact to send a verification code to: the email, or the phone
    /// when no email was entered
    pub fn prepare_send_code(&self) -> Result<String, WorkflowError> {
        let registration = self.session().registration().ok_or(WorkflowError::RoleMismatch {
            expected: Role::Buyer,
            actual: self.role(),
        })?;

        // Codes are sent from the registration phase or resent from verification
        let verification_phase = self
            .role()
            .phase_number(PhaseKey::Verification)
            .unwrap_or(2);
        if self.current_phase() > verification_phase {
            return Err(WorkflowError::GateViolation {
                from: self.current_phase(),
                to: verification_phase,
            });
        }

        if self.session().verification().map_or(false, |v| v.verified) {
            return Err(WorkflowError::Validation("Contact already verified".to_string()));
        }

        let contact = if registration.email.trim().is_empty() {
            registration.phone.trim()
        } else {
            registration.email.trim()
        };
        if contact.is_empty() {
            return Err(WorkflowError::Validation(
                "An email address or phone number is required".to_string(),
            ));
        }

        Ok(contact.to_string())
    }

    /// Write back a code dispatch.
    ///
    /// Once the current call resolves, credentials are cleared whatever the
    /// outcome, unless the form is still being edited on phase 1. A stale
    /// response leaves the session untouched.
    pub fn apply_send_code(&mut self, response: OperationResponse<CodeDispatch>) -> Result<(), WorkflowError> {
        let current = self.operations().check_current(&response.ticket).is_ok();

        let outcome = self.settle(response, |instance, dispatch| {
            if dispatch.request_id.trim().is_empty() {
                return Err(OperationError::Validation("Empty verification request id".to_string()));
            }
            let verification = instance.session_mut().verification_mut().map_err(rejected)?;
            verification.request_id = Some(dispatch.request_id);
            verification.otp.clear();
            verification.verified = false;
            Ok(())
        });

        if current && !self.editing_registration() {
            self.clear_credentials();
        }
        outcome
    }

    // ----- verify code -----

    /// Request id and entered code for a verification check
    pub fn prepare_verify_code(&self) -> Result<(String, String), WorkflowError> {
        self.ensure_unlocked(PhaseKey::Verification)?;

        let verification = self.session().verification().ok_or(WorkflowError::RoleMismatch {
            expected: Role::Buyer,
            actual: self.role(),
        })?;
        if verification.verified {
            return Err(WorkflowError::Validation("Contact already verified".to_string()));
        }
        let request_id = verification
            .request_id
            .clone()
            .ok_or_else(|| WorkflowError::Validation("Request a verification code first".to_string()))?;
        validate_code(&verification.otp)?;

        Ok((request_id, verification.otp.clone()))
    }

    /// Write back a code check; a mismatch is a validation failure
    pub fn apply_verify_code(&mut self, response: OperationResponse<CodeCheck>) -> Result<(), WorkflowError> {
        self.settle(response, |instance, check| {
            if !check.verified {
                return Err(OperationError::Validation("Verification code is incorrect".to_string()));
            }
            instance.session_mut().verification_mut().map_err(rejected)?.verified = true;
            Ok(())
        })
    }

    // ----- payment -----

    /// Metadata for a payment of `amount_cents`
    pub fn prepare_payment(&self, amount_cents: u64) -> Result<BTreeMap<String, String>, WorkflowError> {
        let buyer = self.session().as_buyer().ok_or(WorkflowError::RoleMismatch {
            expected: Role::Buyer,
            actual: self.role(),
        })?;
        self.ensure_unlocked(PhaseKey::Payment)?;

        if buyer.payment_completed {
            return Err(WorkflowError::Validation("Payment already completed".to_string()));
        }
        let property_id = buyer
            .selected_property
            .as_ref()
            .ok_or_else(|| WorkflowError::Validation("Select a property first".to_string()))?;
        if !buyer.terms_accepted {
            return Err(WorkflowError::Validation("Terms must be accepted".to_string()));
        }
        if amount_cents == 0 {
            return Err(WorkflowError::Validation("Amount must be greater than zero".to_string()));
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("workflow_id".to_string(), self.id().0.clone());
        metadata.insert("property_id".to_string(), property_id.0.clone());
        metadata.insert("email".to_string(), buyer.registration.email.clone());
        Ok(metadata)
    }

    /// Write back a payment confirmation. Only a `Succeeded` status marks
    /// the payment complete.
    pub fn apply_payment(&mut self, response: OperationResponse<PaymentConfirmation>) -> Result<(), WorkflowError> {
        self.settle(response, |instance, confirmation| {
            match confirmation.status {
                PaymentStatus::Succeeded => {}
                PaymentStatus::RequiresAction => {
                    return Err(OperationError::Validation(
                        "Payment requires further customer action".to_string(),
                    ));
                }
                PaymentStatus::Failed => {
                    return Err(OperationError::Validation("Payment declined".to_string()));
                }
            }
            if confirmation.payment_id.trim().is_empty() {
                return Err(OperationError::Validation("Empty payment id".to_string()));
            }

            let buyer = instance.session_mut().buyer_mut().map_err(rejected)?;
            buyer.payment_completed = true;
            buyer.payment_id = Some(confirmation.payment_id);
            Ok(())
        })
    }

    // ----- agent assignment -----

    /// Property and agent for an assignment.
    ///
    /// Sellers assign `agent_id` to their saved listing; agents accept
    /// their selected property and may only name themselves.
    pub fn prepare_assign_agent(&self, agent_id: &AgentId) -> Result<(PropertyId, AgentId), WorkflowError> {
        if agent_id.0.trim().is_empty() {
            return Err(WorkflowError::Validation("Agent id is required".to_string()));
        }

        match self.session() {
            SessionData::Seller(seller) => {
                self.ensure_unlocked(PhaseKey::DocumentsAndAgent)?;
                let property_id = seller
                    .listing
                    .property_id
                    .clone()
                    .filter(|_| seller.listing.saved)
                    .ok_or_else(|| WorkflowError::Validation("Save the listing first".to_string()))?;
                Ok((property_id, agent_id.clone()))
            }
            SessionData::Agent(agent) => {
                self.ensure_unlocked(PhaseKey::Acceptance)?;
                if &agent.agent_id != agent_id {
                    return Err(WorkflowError::Validation(format!(
                        "Agent {} cannot accept on behalf of {}",
                        agent.agent_id, agent_id
                    )));
                }
                if matches!(&agent.assignment, Some(m) if m.status == AssignmentStatus::Accepted) {
                    return Err(WorkflowError::Validation("Assignment already accepted".to_string()));
                }
                let property_id = agent
                    .selected_property
                    .clone()
                    .ok_or_else(|| WorkflowError::Validation("Select a property first".to_string()))?;
                Ok((property_id, agent_id.clone()))
            }
            SessionData::Buyer(_) => Err(WorkflowError::RoleMismatch {
                expected: Role::Seller,
                actual: Role::Buyer,
            }),
        }
    }

    /// Write back a confirmed assignment
    pub fn apply_assign_agent(&mut self, response: OperationResponse<Assignment>) -> Result<(), WorkflowError> {
        self.settle(response, |instance, assignment| match instance.session_mut() {
            SessionData::Seller(seller) => {
                if seller.listing.property_id.as_ref() != Some(&assignment.property_id) {
                    return Err(mismatch(&assignment));
                }
                seller.assigned_agent = Some(assignment);
                Ok(())
            }
            SessionData::Agent(agent) => {
                if agent.selected_property.as_ref() != Some(&assignment.property_id)
                    || agent.agent_id != assignment.assigned_agent
                {
                    return Err(mismatch(&assignment));
                }
                let priority = agent
                    .assignment
                    .as_ref()
                    .map(|m| m.priority)
                    .or_else(|| agent.assigned(&assignment.property_id).map(|p| p.priority))
                    .unwrap_or(Priority::Normal);
                agent.assignment = Some(AssignmentMetadata {
                    assigned_date: Some(assignment.assigned_at),
                    priority,
                    status: AssignmentStatus::Accepted,
                });
                Ok(())
            }
            SessionData::Buyer(_) => Err(OperationError::Validation(
                "Buyers have no agent assignment".to_string(),
            )),
        })
    }

    /// Listing whose assignment should be looked up
    pub fn prepare_lookup_assignment(&self) -> Result<PropertyId, WorkflowError> {
        let seller = self.session().as_seller().ok_or(WorkflowError::RoleMismatch {
            expected: Role::Seller,
            actual: self.role(),
        })?;
        seller
            .listing
            .property_id
            .clone()
            .filter(|_| seller.listing.saved)
            .ok_or_else(|| WorkflowError::Validation("Save the listing first".to_string()))
    }

    /// Write back a looked-up assignment; nothing is written when none exists
    pub fn apply_lookup_assignment(
        &mut self,
        response: OperationResponse<Option<Assignment>>,
    ) -> Result<(), WorkflowError> {
        self.settle(response, |instance, found| {
            let seller = instance.session_mut().seller_mut().map_err(rejected)?;
            if let Some(assignment) = found {
                if seller.listing.property_id.as_ref() != Some(&assignment.property_id) {
                    return Err(mismatch(&assignment));
                }
                seller.assigned_agent = Some(assignment);
            }
            Ok(())
        })
    }

    // ----- directory -----

    /// Directory query for this role. Agents only ever see their own
    /// assignments.
    pub fn prepare_directory_query(
        &self,
        mut filters: BTreeMap<String, String>,
        page: u32,
        page_size: u32,
    ) -> Result<DirectoryQuery, WorkflowError> {
        if page == 0 {
            return Err(WorkflowError::Validation("Page numbers start at 1".to_string()));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(WorkflowError::Validation(format!(
                "Page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        if let Some(agent) = self.session().as_agent() {
            filters.insert("agent_id".to_string(), agent.agent_id.0.clone());
        }

        Ok(DirectoryQuery {
            role: self.role(),
            filters,
            page,
            page_size,
        })
    }

    /// Write back a directory page as the current candidates; agents also
    /// get it as their worklist
    pub fn apply_directory(&mut self, response: OperationResponse<DirectoryPage>) -> Result<(), WorkflowError> {
        self.settle(response, |instance, page| {
            if page.page == 0 {
                return Err(OperationError::Validation("Directory returned page 0".to_string()));
            }
            if let SessionData::Agent(agent) = instance.session_mut() {
                agent.replace_worklist(&page.items);
            }
            instance.set_candidates(page);
            Ok(())
        })
    }
}

fn mismatch(assignment: &Assignment) -> OperationError {
    OperationError::Validation(format!(
        "Assignment of {} to {} does not match this workflow",
        assignment.assigned_agent, assignment.property_id
    ))
}
