// Analysis domain: the remote service contract and the deadline-bounded
// orchestration around it.

pub mod error;
pub mod gemini;
pub mod orchestrator;
pub mod service;
pub mod types;
