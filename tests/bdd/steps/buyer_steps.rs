use cucumber::{given, then, when};
use std::collections::BTreeMap;

use homeflow_bdd_tests::fixtures;
use homeflow_core::{OperationError, PropertyId, WorkflowInstance};

use crate::steps::world::HomeflowWorld;

#[given(expr = "a buyer ready to pay for {string}")]
async fn buyer_ready_to_pay(world: &mut HomeflowWorld, property: String) {
    let email = "ready@example.com";
    world.start(WorkflowInstance::buyer());

    let (service, instance) = world.parts();
    instance.edit_registration(fixtures::registration(email)).expect("registration");
    instance.submit_registration().expect("submitted");
    service.send_verification_code(instance).await.expect("code sent");
    service.advance(instance).await.expect("events published");

    let code = world
        .collaborators
        .verification()
        .last_code_for(email)
        .await
        .expect("a code was issued");
    let (service, instance) = world.parts();
    instance.enter_otp(&code).expect("code entered");
    service.verify_code(instance).await.expect("code verified");
    service.advance(instance).await.expect("events published");

    service
        .fetch_directory(instance, BTreeMap::new(), 1)
        .await
        .expect("directory listed");
    instance.select_property(PropertyId(property)).expect("property selected");
    service.advance(instance).await.expect("events published");
    instance.accept_terms(true).expect("terms accepted");
    assert_eq!(instance.current_phase(), 4);
}

#[given("the payment gateway fails the next call")]
async fn gateway_fails(world: &mut HomeflowWorld) {
    world
        .collaborators
        .payments()
        .faults()
        .fail_next(OperationError::Network("gateway unavailable".to_string()))
        .await;
}

#[given("the payment gateway declines the next payment")]
async fn gateway_declines(world: &mut HomeflowWorld) {
    world.collaborators.payments().decline_next().await;
}

#[when(expr = "the user selects property {string}")]
async fn select_property(world: &mut HomeflowWorld, property: String) {
    let (_, instance) = world.parts();
    let result = instance.select_property(PropertyId(property));
    world.record(result);
}

#[when(expr = "the user pays {int} cents")]
async fn pay(world: &mut HomeflowWorld, amount_cents: u64) {
    let (service, instance) = world.parts();
    let result = service.pay(instance, amount_cents).await;
    world.record(result);
}

#[then(expr = "{int} payment(s) was/were captured")]
async fn payments_captured(world: &mut HomeflowWorld, count: usize) {
    assert_eq!(world.collaborators.payments().captured().await.len(), count);
}

#[then(expr = "the selected property is {string}")]
async fn selected_property(world: &mut HomeflowWorld, property: String) {
    let buyer = world.instance().session().as_buyer().expect("buyer session");
    assert_eq!(buyer.selected_property, Some(PropertyId(property)));
}
