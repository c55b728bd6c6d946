//! Scripted walks through each role's workflow.

use anyhow::{bail, Context};
use std::collections::BTreeMap;
use tracing::info;

use homeflow_core::{
    AgentId, ListingDetails, PropertyId, RegistrationForm, Role, UploadRef, WorkflowInstance,
    WorkflowService,
};
use homeflow_state_inmemory::InMemoryCollaborators;

/// Amount the demo buyer pays, in cents
pub const DEPOSIT_CENTS: u64 = 1_500_000;

/// Agent the demo agent flow runs as
pub const DEMO_AGENT: &str = "agent-1";

fn registration(name: &str, email: &str) -> RegistrationForm {
    RegistrationForm {
        name: name.to_string(),
        email: email.to_string(),
        phone: "5550123456".to_string(),
        password: "demo-password-1".to_string(),
        confirm_password: "demo-password-1".to_string(),
    }
}

/// Walk `role` through every phase; returns the finished instance
pub async fn run(
    role: Role,
    collaborators: &InMemoryCollaborators,
    service: &WorkflowService,
) -> anyhow::Result<WorkflowInstance> {
    let instance = match role {
        Role::Buyer => run_buyer(collaborators, service).await?,
        Role::Seller => run_seller(collaborators, service).await?,
        Role::Agent => run_agent(service).await?,
    };

    if !instance.is_terminal() {
        bail!(
            "{} workflow stopped at phase {} of {}",
            role,
            instance.current_phase(),
            instance.max_phase()
        );
    }
    info!(
        workflow_id = %instance.id().0,
        role = %role,
        transitions = instance.phase_history().len(),
        "Demo workflow complete"
    );
    Ok(instance)
}

/// Registration and verification, shared by buyers and sellers
async fn register_and_verify(
    collaborators: &InMemoryCollaborators,
    service: &WorkflowService,
    instance: &mut WorkflowInstance,
    form: RegistrationForm,
) -> anyhow::Result<()> {
    let email = form.email.clone();
    instance.edit_registration(form)?;
    instance.submit_registration().context("Registration rejected")?;
    service
        .send_verification_code(instance)
        .await
        .context("Sending the verification code failed")?;
    advance(service, instance).await?;

    let code = collaborators
        .verification()
        .last_code_for(&email)
        .await
        .with_context(|| format!("No code was issued to {}", email))?;
    info!(contact = %email, "Entering the code received");
    instance.enter_otp(&code)?;
    service
        .verify_code(instance)
        .await
        .context("Verifying the code failed")?;
    advance(service, instance).await
}

async fn advance(service: &WorkflowService, instance: &mut WorkflowInstance) -> anyhow::Result<()> {
    let from = instance.current_phase();
    service
        .advance(instance)
        .await?
        .into_result(from)
        .with_context(|| format!("Could not leave phase {}", from))?;
    Ok(())
}

async fn run_buyer(
    collaborators: &InMemoryCollaborators,
    service: &WorkflowService,
) -> anyhow::Result<WorkflowInstance> {
    let mut instance = WorkflowInstance::buyer();
    register_and_verify(
        collaborators,
        service,
        &mut instance,
        registration("Robin Buyer", "robin@example.com"),
    )
    .await?;

    service
        .fetch_directory(&mut instance, BTreeMap::new(), 1)
        .await
        .context("Listing properties failed")?;
    let property = instance
        .candidates()
        .and_then(|page| page.items.first())
        .map(|entry| PropertyId(entry.id.clone()))
        .context("No properties listed")?;
    info!(property_id = %property, "Selecting property");
    instance.select_property(property)?;
    advance(service, &mut instance).await?;

    instance.accept_terms(true)?;
    service
        .pay(&mut instance, DEPOSIT_CENTS)
        .await
        .context("Payment failed")?;
    Ok(instance)
}

async fn run_seller(
    collaborators: &InMemoryCollaborators,
    service: &WorkflowService,
) -> anyhow::Result<WorkflowInstance> {
    let mut instance = WorkflowInstance::seller();
    register_and_verify(
        collaborators,
        service,
        &mut instance,
        registration("Casey Seller", "casey@example.com"),
    )
    .await?;

    let property = instance.save_listing(ListingDetails {
        address: "7 Quay Street".to_string(),
        city: "Bristol".to_string(),
        price_cents: 38_000_000,
        property_type: "apartment".to_string(),
        bedrooms: 2,
        bathrooms: 1,
        area_sqft: 820,
        description: "Second floor flat overlooking the harbour".to_string(),
    })?;
    info!(property_id = %property, "Listing saved");
    instance.attach_image(UploadRef::new("living-room.jpg", "image/jpeg", 240_000))?;
    advance(service, &mut instance).await?;

    instance.attach_document(UploadRef::new("title-deed.pdf", "application/pdf", 96_000))?;
    instance.accept_terms(true)?;
    service
        .fetch_directory(&mut instance, BTreeMap::new(), 1)
        .await
        .context("Listing agents failed")?;
    let agent = instance
        .candidates()
        .and_then(|page| page.items.first())
        .map(|entry| AgentId(entry.id.clone()))
        .context("No agents listed")?;
    service
        .assign_agent(&mut instance, &agent)
        .await
        .context("Agent assignment failed")?;
    Ok(instance)
}

async fn run_agent(service: &WorkflowService) -> anyhow::Result<WorkflowInstance> {
    let agent = AgentId(DEMO_AGENT.to_string());
    let mut instance = WorkflowInstance::agent(agent.clone());

    service
        .fetch_directory(&mut instance, BTreeMap::new(), 1)
        .await
        .context("Loading the worklist failed")?;
    advance(service, &mut instance).await?;

    let property = instance
        .session()
        .as_agent()
        .and_then(|a| a.assigned_properties.iter().max_by_key(|p| p.priority))
        .map(|p| p.id.clone())
        .context("Worklist is empty")?;
    info!(property_id = %property, "Selecting the most urgent assignment");
    instance.select_property(property)?;
    advance(service, &mut instance).await?;

    service
        .assign_agent(&mut instance, &agent)
        .await
        .context("Accepting the assignment failed")?;
    Ok(instance)
}
