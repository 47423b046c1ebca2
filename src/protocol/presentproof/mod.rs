//! Present-proof 2.0: a verifier requests a presentation, the prover
//! answers with a presentation or a counter proposal.
mod models;
mod service;
mod states;

pub use models::*;
pub use service::{Action, Provider, Service, TransitionalPayload, NAME};
pub use states::{can_trigger_action_events, next_state, State, StateAction};
