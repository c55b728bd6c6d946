use cucumber::{given, then, when};

use homeflow_core::{AgentId, AssignmentStatus, WorkflowInstance};

use crate::steps::world::HomeflowWorld;

#[given(expr = "a new workflow for agent {string}")]
async fn new_agent(world: &mut HomeflowWorld, agent: String) {
    world.start(WorkflowInstance::agent(AgentId(agent)));
}

#[when("the agent accepts the assignment")]
async fn accept_assignment(world: &mut HomeflowWorld) {
    let (service, instance) = world.parts();
    let agent_id = instance
        .session()
        .as_agent()
        .map(|a| a.agent_id.clone())
        .expect("agent session");
    let result = service.assign_agent(instance, &agent_id).await;
    world.record(result);
}

#[then(expr = "the worklist holds {int} properties")]
async fn worklist_size(world: &mut HomeflowWorld, count: usize) {
    let agent = world.instance().session().as_agent().expect("agent session");
    assert_eq!(agent.assigned_properties.len(), count);
}

#[then("the assignment is accepted")]
async fn assignment_accepted(world: &mut HomeflowWorld) {
    let agent = world.instance().session().as_agent().expect("agent session");
    let metadata = agent.assignment.as_ref().expect("assignment metadata");
    assert_eq!(metadata.status, AssignmentStatus::Accepted);
    assert!(metadata.assigned_date.is_some());
}

#[then("the assignment is pending")]
async fn assignment_pending(world: &mut HomeflowWorld) {
    let agent = world.instance().session().as_agent().expect("agent session");
    let status = agent.assignment.as_ref().map(|m| m.status);
    assert_eq!(status, Some(AssignmentStatus::Pending));
}
