use cucumber::{then, when};

use homeflow_bdd_tests::fixtures;
use homeflow_core::{AgentId, UploadRef};

use crate::steps::world::HomeflowWorld;

#[when(expr = "the seller saves a listing in {string} priced {int} cents")]
async fn save_listing(world: &mut HomeflowWorld, city: String, price_cents: u64) {
    let (_, instance) = world.parts();
    let result = instance.save_listing(fixtures::listing(&city, price_cents));
    world.record(result);
}

#[when(expr = "the seller attaches image {string}")]
async fn attach_image(world: &mut HomeflowWorld, file_name: String) {
    let (_, instance) = world.parts();
    let upload = UploadRef::new(file_name.as_str(), fixtures::content_type(&file_name), 150_000);
    let result = instance.attach_image(upload);
    world.record(result);
}

#[when(expr = "the seller attaches document {string}")]
async fn attach_document(world: &mut HomeflowWorld, file_name: String) {
    let (_, instance) = world.parts();
    let upload = UploadRef::new(file_name.as_str(), fixtures::content_type(&file_name), 64_000);
    let result = instance.attach_document(upload);
    world.record(result);
}

#[when(expr = "the seller assigns agent {string}")]
async fn assign_agent(world: &mut HomeflowWorld, agent: String) {
    let (service, instance) = world.parts();
    let result = service.assign_agent(instance, &AgentId(agent)).await;
    world.record(result);
}

#[then(expr = "the assigned agent is {string}")]
async fn assigned_agent(world: &mut HomeflowWorld, agent: String) {
    let seller = world.instance().session().as_seller().expect("seller session");
    let assigned = seller.assigned_agent.as_ref().map(|a| a.assigned_agent.clone());
    assert_eq!(assigned, Some(AgentId(agent)));
}

#[then("the listing has a property id")]
async fn listing_has_id(world: &mut HomeflowWorld) {
    let seller = world.instance().session().as_seller().expect("seller session");
    assert!(seller.listing.property_id.is_some());
}
