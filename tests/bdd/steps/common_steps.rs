use cucumber::{given, then, when};
use std::collections::BTreeMap;

use homeflow_bdd_tests::fixtures;
use homeflow_core::{NavigationOutcome, PhaseStatus, WorkflowError, WorkflowInstance};

use crate::steps::world::HomeflowWorld;

fn parse_status(name: &str) -> PhaseStatus {
    match name {
        "locked" => PhaseStatus::Locked,
        "unlocked" => PhaseStatus::UnlockedIncomplete,
        "active" => PhaseStatus::Active,
        "completed" => PhaseStatus::Completed,
        other => panic!("unknown phase status {}", other),
    }
}

#[given("a new buyer workflow")]
async fn new_buyer(world: &mut HomeflowWorld) {
    world.start(WorkflowInstance::buyer());
}

#[given("a new seller workflow")]
async fn new_seller(world: &mut HomeflowWorld) {
    world.start(WorkflowInstance::seller());
}

#[when(expr = "the user registers as {string}")]
async fn register(world: &mut HomeflowWorld, email: String) {
    let (_, instance) = world.parts();
    instance
        .edit_registration(fixtures::registration(&email))
        .expect("registration form accepted");
    instance.submit_registration().expect("registration submitted");
}

#[when(expr = "the user fills in the registration form as {string}")]
async fn fill_in_registration(world: &mut HomeflowWorld, email: String) {
    let (_, instance) = world.parts();
    instance
        .edit_registration(fixtures::registration(&email))
        .expect("registration form accepted");
}

#[when("the user submits the registration")]
async fn submit_registration(world: &mut HomeflowWorld) {
    let (_, instance) = world.parts();
    let result = instance.submit_registration();
    world.record(result);
}

#[when("the user requests a verification code")]
async fn request_code(world: &mut HomeflowWorld) {
    let (service, instance) = world.parts();
    let result = service.send_verification_code(instance).await;
    world.record(result);
}

#[when(expr = "the user enters the code sent to {string}")]
async fn enter_code(world: &mut HomeflowWorld, contact: String) {
    let code = world
        .collaborators
        .verification()
        .last_code_for(&contact)
        .await
        .expect("a code was issued");
    let (service, instance) = world.parts();
    instance.enter_otp(&code).expect("code accepted for entry");
    let result = service.verify_code(instance).await;
    world.record(result);
}

// Issued codes are six digits, so a seven digit code never matches
const WRONG_CODE: &str = "1234567";

#[when("the user enters a wrong code")]
async fn enter_wrong_code(world: &mut HomeflowWorld) {
    let (service, instance) = world.parts();
    assert!(
        instance
            .session()
            .verification()
            .map_or(false, |v| v.request_id.is_some()),
        "a code was requested"
    );
    instance.enter_otp(WRONG_CODE).expect("code accepted for entry");
    let result = service.verify_code(instance).await;
    world.record(result);
}

#[when("the user advances")]
async fn advance(world: &mut HomeflowWorld) {
    let (service, instance) = world.parts();
    let outcome = service.advance(instance).await.expect("events published");
    world.last_outcome = Some(outcome);
}

#[when("the user retreats")]
async fn retreat(world: &mut HomeflowWorld) {
    let (service, instance) = world.parts();
    let outcome = service.retreat(instance).await.expect("events published");
    world.last_outcome = Some(outcome);
}

#[when(expr = "the user jumps to phase {int}")]
async fn jump(world: &mut HomeflowWorld, phase: usize) {
    let (service, instance) = world.parts();
    let outcome = service.go_to(instance, phase).await.expect("events published");
    world.last_outcome = Some(outcome);
}

#[when("the user lists the directory")]
async fn list_directory(world: &mut HomeflowWorld) {
    let (service, instance) = world.parts();
    service
        .fetch_directory(instance, BTreeMap::new(), 1)
        .await
        .expect("directory listed");
}

#[when("the user accepts the terms")]
async fn accept_terms(world: &mut HomeflowWorld) {
    let (_, instance) = world.parts();
    instance.accept_terms(true).expect("terms accepted");
}

#[then("the workflow is complete")]
async fn workflow_complete(world: &mut HomeflowWorld) {
    assert!(world.instance().is_terminal(), "{:?}", world);
}

#[then("the workflow is not complete")]
async fn workflow_not_complete(world: &mut HomeflowWorld) {
    assert!(!world.instance().is_terminal());
}

#[then(expr = "the current phase is {int}")]
async fn current_phase(world: &mut HomeflowWorld, phase: usize) {
    assert_eq!(world.instance().current_phase(), phase);
}

#[then(expr = "phase {int} is {word}")]
async fn phase_status(world: &mut HomeflowWorld, phase: usize, status: String) {
    assert_eq!(world.instance().phase_status(phase), parse_status(&status));
}

#[then("navigation is blocked")]
async fn navigation_blocked(world: &mut HomeflowWorld) {
    assert!(
        matches!(world.last_outcome, Some(NavigationOutcome::Blocked(_))),
        "{:?}",
        world.last_outcome
    );
}

#[then("navigation moved")]
async fn navigation_moved(world: &mut HomeflowWorld) {
    assert!(matches!(world.last_outcome, Some(NavigationOutcome::Moved { .. })));
}

#[then("the last action was rejected")]
async fn last_rejected(world: &mut HomeflowWorld) {
    assert!(world.last_error.is_some(), "expected an error");
}

#[then("the last action succeeded")]
async fn last_succeeded(world: &mut HomeflowWorld) {
    assert!(world.last_error.is_none(), "{:?}", world.last_error);
}

#[then("the last operation failed with a retryable error")]
async fn last_retryable(world: &mut HomeflowWorld) {
    match &world.last_error {
        Some(WorkflowError::AsyncOperation(error)) => assert!(error.is_retryable(), "{}", error),
        other => panic!("expected an operation failure, got {:?}", other),
    }
}

#[then("the session holds credentials")]
async fn holds_credentials(world: &mut HomeflowWorld) {
    let registration = world.instance().session().registration().expect("registration");
    assert!(registration.has_credentials());
}

#[then("the session holds no credentials")]
async fn holds_no_credentials(world: &mut HomeflowWorld) {
    let registration = world.instance().session().registration().expect("registration");
    assert!(!registration.has_credentials());
}

#[then("the contact is verified")]
async fn contact_verified(world: &mut HomeflowWorld) {
    let verified = world
        .instance()
        .session()
        .verification()
        .map_or(false, |v| v.verified);
    assert!(verified);
}
