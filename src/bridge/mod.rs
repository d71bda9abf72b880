//! Request orchestration.
//!
//! [`Bridge`] is the process-wide state behind every route. Each public
//! operation returns a tagged response and never an error: camera,
//! provider, journal and policy failures are all folded into the
//! `{status: "error", message}` shape the voice agent can relay.
//!
//! Only [`Bridge::run_policy`] goes through the concurrency gate. Scene
//! capture and analysis run independently of robot motion.

mod responses;

pub use responses::{
    AnalyzeRequest, AnalyzeResponse, CaptureResponse, HealthResponse, PolicyRequest,
    PolicyResponse, SessionResponse,
};

use crate::capture::{EncodedImage, SharedCamera};
use crate::gate::ConcurrencyGate;
use crate::journal::VisionJournal;
use crate::metrics::{BridgeMetrics, MetricsError, RunOutcome};
use crate::policy::{PolicyOutcome, PolicyRegistry};
use crate::provider::{ProviderClient, ProviderError, SessionOptions};
use std::sync::Arc;
use std::time::Instant;

/// Everything the bridge is assembled from.
pub struct BridgeComponents {
    pub registry: PolicyRegistry,
    pub gate: ConcurrencyGate,
    pub camera: SharedCamera,
    pub provider: ProviderClient,
    pub journal: VisionJournal,
    pub session: SessionOptions,
    pub metrics: BridgeMetrics,
}

/// Process-wide orchestrator.
#[derive(Clone)]
pub struct Bridge {
    registry: PolicyRegistry,
    gate: ConcurrencyGate,
    camera: SharedCamera,
    provider: ProviderClient,
    journal: Arc<VisionJournal>,
    session: SessionOptions,
    metrics: Arc<BridgeMetrics>,
}

impl Bridge {
    pub fn new(components: BridgeComponents) -> Self {
        Self {
            registry: components.registry,
            gate: components.gate,
            camera: components.camera,
            provider: components.provider,
            journal: Arc::new(components.journal),
            session: components.session,
            metrics: Arc::new(components.metrics),
        }
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn camera(&self) -> &SharedCamera {
        &self.camera
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        &self.metrics
    }

    /// Lists the registered policies. Always succeeds.
    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".to_string(),
            policies: self
                .registry
                .names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Captures one frame from the shared camera.
    pub async fn capture_scene(&self) -> CaptureResponse {
        match self.capture().await {
            Ok(image) => CaptureResponse::Success {
                image: image.to_base64(),
            },
            Err(message) => CaptureResponse::Error { message },
        }
    }

    async fn capture(&self) -> Result<EncodedImage, String> {
        let camera = self.camera.clone();
        let result = tokio::task::spawn_blocking(move || camera.capture_blocking())
            .await
            .map_err(|e| format!("Camera capture error: capture task failed: {e}"))
            .and_then(|r| r.map_err(|e| format!("Camera capture error: {e}")));

        match &result {
            Ok(image) => {
                tracing::debug!(sequence = image.sequence(), bytes = image.byte_len(), "Scene captured");
            }
            Err(message) => tracing::warn!(%message, "Scene capture failed"),
        }
        self.metrics.record_capture(result.is_ok());
        result
    }

    /// Requests an ephemeral key for a realtime voice session.
    pub async fn create_session(&self) -> SessionResponse {
        let result = self.provider.create_client_secret(self.session).await;
        self.metrics.record_session(result.is_ok());

        match result {
            Ok(ephemeral_key) => {
                tracing::info!(demo_mode = self.session.demo_mode, "Realtime session created");
                SessionResponse::Created {
                    ephemeral_key,
                    model: self.provider.config().realtime_model.clone(),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Realtime session request failed");
                let (error, status_code) = match e {
                    ProviderError::Upstream { status, body } => (body, status),
                    ProviderError::Timeout(_) => (e.to_string(), 504),
                    ProviderError::Transport(_) | ProviderError::MalformedResponse(_) => {
                        (e.to_string(), 502)
                    }
                };
                SessionResponse::Failed { error, status_code }
            }
        }
    }

    /// Describes a scene and journals the result.
    ///
    /// Without an image, a fresh one is captured first.
    pub async fn analyze_image(&self, request: AnalyzeRequest) -> AnalyzeResponse {
        let result = self.analyze(request.image.filter(|s| !s.trim().is_empty())).await;
        self.metrics.record_analysis(result.is_ok());

        match result {
            Ok((description, timestamp)) => AnalyzeResponse::Success {
                description,
                timestamp,
            },
            Err(message) => {
                tracing::warn!(%message, "Scene analysis failed");
                AnalyzeResponse::Error { message }
            }
        }
    }

    async fn analyze(&self, supplied: Option<String>) -> Result<(String, String), String> {
        let image = match supplied {
            Some(encoded) => EncodedImage::from_base64(&encoded).map_err(|e| e.to_string())?,
            None => self.capture().await?,
        };

        let description = self
            .provider
            .describe_image(&image.to_base64())
            .await
            .map_err(|e| match e {
                ProviderError::Upstream { body, .. } => body,
                other => other.to_string(),
            })?;

        let journal = Arc::clone(&self.journal);
        let text = description.clone();
        let timestamp = tokio::task::spawn_blocking(move || journal.record(&image, &text))
            .await
            .map_err(|e| format!("journal task failed: {e}"))?
            .map_err(|e| e.to_string())?;

        tracing::info!(timestamp = %timestamp, "Scene analyzed");
        Ok((description, timestamp))
    }

    /// Runs a registered policy under the concurrency gate.
    ///
    /// Unknown names are rejected before the gate is touched.
    pub async fn run_policy(&self, request: PolicyRequest) -> PolicyResponse {
        let Some(kind) = self.registry.lookup(&request.policy_name) else {
            tracing::warn!(policy = %request.policy_name, "Unknown policy requested");
            self.metrics.record_unknown_policy();
            return PolicyResponse::error(format!("Unknown policy {}", request.policy_name));
        };

        tracing::info!(policy = %kind, waiting = self.gate.waiting(), "Policy requested");
        let registry = self.registry.clone();
        let params = request.params;
        let result = self
            .gate
            .run_exclusive(move || {
                let started = Instant::now();
                let outcome = registry.invoke(kind, &params);
                (outcome, started.elapsed())
            })
            .await;

        let policy = kind.name().to_string();
        match result {
            Ok((PolicyOutcome::Completed(message), elapsed)) => {
                tracing::info!(policy = %kind, elapsed_s = elapsed.as_secs_f64(), "Policy completed");
                self.metrics
                    .record_policy_run(&policy, RunOutcome::Completed, Some(elapsed));
                PolicyResponse::Completed {
                    policy,
                    result: message,
                }
            }
            Ok((PolicyOutcome::Failed(message), elapsed)) => {
                tracing::warn!(policy = %kind, %message, "Policy failed");
                self.metrics
                    .record_policy_run(&policy, RunOutcome::Failed, Some(elapsed));
                PolicyResponse::Error {
                    policy: Some(policy),
                    message,
                }
            }
            Err(e) => {
                tracing::error!(policy = %kind, error = %e, "Policy task aborted");
                self.metrics
                    .record_policy_run(&policy, RunOutcome::Panicked, None);
                PolicyResponse::Error {
                    policy: Some(policy),
                    message: e.to_string(),
                }
            }
        }
    }

    /// Renders the metrics registry, refreshing the gate gauge first.
    pub fn render_metrics(&self) -> Result<String, MetricsError> {
        self.metrics.set_gate_waiting(self.gate.waiting());
        self.metrics.encode()
    }

    /// Releases the camera. Safe to call more than once; never fails.
    pub async fn shutdown(&self) {
        let camera = self.camera.clone();
        match tokio::task::spawn_blocking(move || camera.release()).await {
            Ok(Ok(true)) => tracing::info!("Bridge shut down"),
            Ok(Ok(false)) => tracing::debug!("Bridge already shut down"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Camera release failed during shutdown"),
            Err(e) => tracing::warn!(error = %e, "Camera release task failed during shutdown"),
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("registry", &self.registry)
            .field("gate", &self.gate)
            .field("camera", &self.camera)
            .field("session", &self.session)
            .finish()
    }
}
