//! Realtime session configuration: tool manifest and agent instructions.
//!
//! The manifest is the protocol between the conversational model and this
//! bridge. The model may only call the two tools declared here; it is never
//! given a way to move the arm other than the trained policy.

use crate::policy::PolicyKind;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Tool name for scene capture.
pub const CAPTURE_SCENE_TOOL: &str = "capture_scene";

const DEMO_INSTRUCTIONS: &str = "\
You control a single SO101 robot arm doing carrot pick-and-place.

Workspace: baby carrots on a plate and cutting board in front of the robot.

TOOLS:
- capture_scene(skip_analysis=true): quickly grab a fresh camera image.
- run_pick_and_place: use the ACT policy to move one carrot from plate to board.

RULES:
- Always ask the user for confirmation before calling run_pick_and_place.
- When the policy is running, motors are active; wait around 25 seconds for completion before assuming the task is done.
- After the function returns, call capture_scene(skip_analysis=true) to verify what happened, then describe it to the user.
- Never move the robot directly; only call the ACT policy.
";

const STEPWISE_INSTRUCTIONS: &str = "\
You control a single SO101 arm for carrot pick-and-place.
Ask before calling the ACT policy; wait for the function to complete (25 seconds) and then verify with capture_scene.
";

/// One function exposed to the conversational model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// The fixed tool manifest.
pub fn tool_manifest() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::function(
            CAPTURE_SCENE_TOOL,
            "Capture an image from the top camera. Use skip_analysis=true for speed.",
            json!({
                "type": "object",
                "properties": {
                    "skip_analysis": {
                        "type": "boolean",
                        "default": true,
                        "description": "If true, only capture and display; if false, also run GPT-4o analysis."
                    }
                },
                "required": []
            }),
        ),
        ToolDefinition::function(
            PolicyKind::PickAndPlace.name(),
            "Run ACT carrot pick-and-place policy.",
            json!({"type": "object", "properties": {}}),
        ),
    ]
}

/// System prompt for the realtime model.
///
/// Demo mode spells out the full workflow; otherwise the prompt is terse
/// and leaves per-step confirmation to the operator.
pub fn instructions(demo_mode: bool) -> &'static str {
    if demo_mode {
        DEMO_INSTRUCTIONS
    } else {
        STEPWISE_INSTRUCTIONS
    }
}

/// Options that shape a new realtime session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Run the full demo script instead of per-step confirmations.
    pub demo_mode: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { demo_mode: true }
    }
}

/// Body of a realtime client-secret request.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeSessionRequest {
    pub session: RealtimeSession,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeSession {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub model: String,
    pub audio: AudioConfig,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioConfig {
    pub output: AudioOutput,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioOutput {
    pub voice: String,
}

impl RealtimeSessionRequest {
    /// Builds the request for the given model and voice.
    pub fn new(model: &str, voice: &str, options: SessionOptions) -> Self {
        Self {
            session: RealtimeSession {
                kind: "realtime",
                model: model.to_string(),
                audio: AudioConfig {
                    output: AudioOutput {
                        voice: voice.to_string(),
                    },
                },
                instructions: instructions(options.demo_mode).to_string(),
                tools: tool_manifest(),
            },
        }
    }
}
