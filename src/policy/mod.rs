//! Robot control policies.
//!
//! A policy is an opaque, long-running, blocking routine. The registry is a
//! closed set of policy kinds; invoking one always yields a
//! [`PolicyOutcome`] carrying a message the voice agent can read aloud.

mod params;
mod registry;
mod runner;

pub use params::{ParamsError, PickAndPlaceParams};
pub use registry::{
    PolicyKind, PolicyOutcome, PolicyRegistry, PICK_AND_PLACE_COMPLETED,
    PICK_AND_PLACE_ERROR_PREFIX,
};
pub use runner::{CommandRunner, InferenceError, InferenceRunner, PolicyConfig};
