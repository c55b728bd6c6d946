//! Homeflow demo runner.
//!
//! Wires the workflow engine to the in-memory collaborators and walks one
//! role through its phases. The engine itself lives in `homeflow-core`.

pub mod demo;

pub use demo::run;
