// Runs every feature file under features/ against the in-memory collaborators

mod steps;

use cucumber::World;
use steps::world::HomeflowWorld;

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let features = concat!(env!("CARGO_MANIFEST_DIR"), "/features");
    HomeflowWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit(features)
        .await;
}
