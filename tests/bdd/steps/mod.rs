pub mod world;

mod agent_steps;
mod buyer_steps;
mod common_steps;
mod seller_steps;
