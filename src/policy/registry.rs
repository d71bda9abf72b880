//! Name-to-policy resolution and invocation.

use super::{InferenceRunner, PickAndPlaceParams};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Completion message of the pick-and-place policy.
pub const PICK_AND_PLACE_COMPLETED: &str = "✓ COMPLETED: ACT pick-and-place finished.";

/// Prefix of every pick-and-place failure message.
pub const PICK_AND_PLACE_ERROR_PREFIX: &str = "ERROR (ACT): ";

/// Every policy the bridge can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// ACT carrot pick-and-place.
    PickAndPlace,
}

impl PolicyKind {
    /// All policies, in registration order.
    pub const ALL: [PolicyKind; 1] = [PolicyKind::PickAndPlace];

    /// Wire name used by clients and the tool manifest.
    pub fn name(self) -> &'static str {
        match self {
            PolicyKind::PickAndPlace => "run_pick_and_place",
        }
    }

    /// Resolves a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one policy invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    /// The policy ran to completion.
    Completed(String),
    /// The policy rejected its parameters or the inference routine failed.
    Failed(String),
}

impl PolicyOutcome {
    /// Human-readable message, suitable for relaying verbatim.
    pub fn message(&self) -> &str {
        match self {
            PolicyOutcome::Completed(m) | PolicyOutcome::Failed(m) => m,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PolicyOutcome::Completed(_))
    }
}

/// Registered policies and the routine that executes them.
#[derive(Clone)]
pub struct PolicyRegistry {
    runner: Arc<dyn InferenceRunner>,
}

impl PolicyRegistry {
    pub fn new(runner: Arc<dyn InferenceRunner>) -> Self {
        Self { runner }
    }

    /// Resolves a policy name.
    pub fn lookup(&self, name: &str) -> Option<PolicyKind> {
        PolicyKind::from_name(name)
    }

    /// Names of all registered policies.
    pub fn names(&self) -> Vec<&'static str> {
        PolicyKind::ALL.iter().map(|kind| kind.name()).collect()
    }

    /// Runs a policy to completion. Blocks.
    ///
    /// Never returns an error: parameter and inference failures become
    /// [`PolicyOutcome::Failed`].
    pub fn invoke(&self, kind: PolicyKind, params: &Map<String, Value>) -> PolicyOutcome {
        match kind {
            PolicyKind::PickAndPlace => self.pick_and_place(params),
        }
    }

    fn pick_and_place(&self, params: &Map<String, Value>) -> PolicyOutcome {
        let result = PickAndPlaceParams::from_map(params)
            .map_err(|e| e.to_string())
            .and_then(|params| {
                self.runner
                    .run_pick_and_place(&params)
                    .map_err(|e| e.to_string())
            });

        match result {
            Ok(()) => PolicyOutcome::Completed(PICK_AND_PLACE_COMPLETED.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "Pick-and-place failed");
                PolicyOutcome::Failed(format!("{PICK_AND_PLACE_ERROR_PREFIX}{e}"))
            }
        }
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("policies", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::InferenceError;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<PickAndPlaceParams>>,
        fail_with: Option<String>,
    }

    impl InferenceRunner for RecordingRunner {
        fn run_pick_and_place(&self, params: &PickAndPlaceParams) -> Result<(), InferenceError> {
            self.calls.lock().unwrap().push(params.clone());
            match &self.fail_with {
                Some(msg) => Err(InferenceError::Other(msg.clone())),
                None => Ok(()),
            }
        }
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_lookup() {
        let registry = PolicyRegistry::new(Arc::new(RecordingRunner::default()));
        assert_eq!(
            registry.lookup("run_pick_and_place"),
            Some(PolicyKind::PickAndPlace)
        );
        assert_eq!(registry.lookup("wave_hello"), None);
        assert_eq!(registry.names(), vec!["run_pick_and_place"]);
    }

    #[test]
    fn test_invoke_success() {
        let runner = Arc::new(RecordingRunner::default());
        let registry = PolicyRegistry::new(runner.clone());

        let outcome = registry.invoke(
            PolicyKind::PickAndPlace,
            &params(json!({"num_episodes": 1})),
        );
        assert_eq!(
            outcome,
            PolicyOutcome::Completed(PICK_AND_PLACE_COMPLETED.to_string())
        );
        assert_eq!(runner.calls.lock().unwrap()[0].num_episodes, Some(1));
    }

    #[test]
    fn test_inference_failure_becomes_message() {
        let registry = PolicyRegistry::new(Arc::new(RecordingRunner {
            fail_with: Some("follower arm not connected".into()),
            ..Default::default()
        }));

        let outcome = registry.invoke(PolicyKind::PickAndPlace, &Map::new());
        assert!(!outcome.is_completed());
        assert_eq!(
            outcome.message(),
            "ERROR (ACT): follower arm not connected"
        );
    }

    #[test]
    fn test_unknown_param_rejected_without_running() {
        let runner = Arc::new(RecordingRunner::default());
        let registry = PolicyRegistry::new(runner.clone());

        let outcome = registry.invoke(PolicyKind::PickAndPlace, &params(json!({"force": 9})));
        assert!(outcome.message().starts_with(PICK_AND_PLACE_ERROR_PREFIX));
        assert!(runner.calls.lock().unwrap().is_empty());
    }
}
