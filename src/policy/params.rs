//! Parameter sets accepted by each policy.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Parameters for the ACT pick-and-place policy.
///
/// Every field is optional; the inference routine supplies its own
/// defaults. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PickAndPlaceParams {
    /// Trained policy checkpoint to load.
    pub model_id: Option<String>,
    /// Number of episodes to run. Whole-valued floats such as `2.0` are accepted.
    #[serde(default, deserialize_with = "whole_number")]
    pub num_episodes: Option<u32>,
    /// Time budget for each episode in seconds.
    pub episode_time_s: Option<f64>,
    /// Natural-language task passed to the policy.
    pub task_description: Option<String>,
}

fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Option::<f64>::deserialize(deserializer)?
        .map(|n| {
            if n.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&n) {
                Ok(n as u32)
            } else {
                Err(de::Error::custom(format!(
                    "num_episodes must be a whole number, got {n}"
                )))
            }
        })
        .transpose()
}

/// Rejected parameter set.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid parameters: {0}")]
pub struct ParamsError(pub String);

impl PickAndPlaceParams {
    /// Parses a request's `params` object.
    ///
    /// Unknown keys are rejected.
    pub fn from_map(params: &Map<String, Value>) -> Result<Self, ParamsError> {
        let mut parsed: Self = serde_json::from_value(Value::Object(params.clone()))
            .map_err(|e| ParamsError(e.to_string()))?;

        parsed.model_id = parsed.model_id.filter(|s| !s.trim().is_empty());
        parsed.task_description = parsed.task_description.filter(|s| !s.trim().is_empty());

        if let Some(seconds) = parsed.episode_time_s {
            if !seconds.is_finite() || seconds <= 0.0 {
                return Err(ParamsError(format!(
                    "episode_time_s must be positive, got {seconds}"
                )));
            }
        }
        Ok(parsed)
    }

    /// Renders the parameters as command-line flags for the inference program.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(model_id) = &self.model_id {
            args.push("--model-id".to_string());
            args.push(model_id.clone());
        }
        if let Some(n) = self.num_episodes {
            args.push("--num-episodes".to_string());
            args.push(n.to_string());
        }
        if let Some(seconds) = self.episode_time_s {
            args.push("--episode-time-s".to_string());
            args.push(seconds.to_string());
        }
        if let Some(task) = &self.task_description {
            args.push("--task-description".to_string());
            args.push(task.clone());
        }
        args
    }
}
