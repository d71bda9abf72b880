//! Request and response bodies of the HTTP surface.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub policies: Vec<String>,
}

/// `GET /camera/capture`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CaptureResponse {
    Success { image: String },
    Error { message: String },
}

/// `POST /session`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionResponse {
    Created { ephemeral_key: String, model: String },
    Failed { error: String, status_code: u16 },
}

/// `POST /analyze_image` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Base64 PNG. Absent or empty means "capture one now".
    #[serde(default)]
    pub image: Option<String>,
}

/// `POST /analyze_image`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalyzeResponse {
    Success {
        description: String,
        timestamp: String,
    },
    Error {
        message: String,
    },
}

/// `POST /robot/run_policy` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub policy_name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl PolicyRequest {
    pub fn new(policy_name: impl Into<String>) -> Self {
        Self {
            policy_name: policy_name.into(),
            params: Map::new(),
        }
    }
}

/// `POST /robot/run_policy`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PolicyResponse {
    Completed {
        policy: String,
        result: String,
    },
    Error {
        /// Set when the policy was found and ran.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<String>,
        message: String,
    },
}

impl PolicyResponse {
    pub fn error(message: impl Into<String>) -> Self {
        PolicyResponse::Error {
            policy: None,
            message: message.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PolicyResponse::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tagged_shapes() {
        assert_eq!(
            serde_json::to_value(CaptureResponse::Success { image: "AAAA".into() }).unwrap(),
            json!({"status": "success", "image": "AAAA"})
        );
        assert_eq!(
            serde_json::to_value(PolicyResponse::error("Unknown policy wave")).unwrap(),
            json!({"status": "error", "message": "Unknown policy wave"})
        );
        assert_eq!(
            serde_json::to_value(PolicyResponse::Completed {
                policy: "run_pick_and_place".into(),
                result: "done".into()
            })
            .unwrap(),
            json!({"status": "completed", "policy": "run_pick_and_place", "result": "done"})
        );
    }

    #[test]
    fn test_session_shapes_untagged() {
        assert_eq!(
            serde_json::to_value(SessionResponse::Failed {
                error: "bad key".into(),
                status_code: 401
            })
            .unwrap(),
            json!({"error": "bad key", "status_code": 401})
        );
        let parsed: SessionResponse =
            serde_json::from_value(json!({"ephemeral_key": "ek", "model": "m"})).unwrap();
        assert!(matches!(parsed, SessionResponse::Created { .. }));
    }

    #[test]
    fn test_policy_request_params_default() {
        let request: PolicyRequest =
            serde_json::from_value(json!({"policy_name": "run_pick_and_place"})).unwrap();
        assert!(request.params.is_empty());
    }
}
