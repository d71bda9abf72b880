//! Metrics collection and registry.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Outcome label of a policy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    Panicked,
}

impl RunOutcome {
    fn label(self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Failed => "failed",
            RunOutcome::Panicked => "panicked",
        }
    }
}

/// Prometheus metrics registry for the bridge.
pub struct BridgeMetrics {
    registry: Registry,

    // Policy metrics
    policy_runs: IntCounterVec,
    policy_unknown: IntCounter,
    policy_duration: Histogram,
    gate_waiting: IntGauge,

    // Camera and analysis metrics
    captures: IntCounter,
    capture_failures: IntCounter,
    analyses: IntCounter,
    analysis_failures: IntCounter,

    // Session metrics
    sessions: IntCounter,
    session_failures: IntCounter,
}

impl BridgeMetrics {
    /// Creates a new registry with all bridge metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let policy_runs = IntCounterVec::new(
            Opts::new("bridge_policy_runs_total", "Policy runs by outcome"),
            &["policy", "outcome"],
        )?;
        let policy_unknown = IntCounter::new(
            "bridge_policy_unknown_total",
            "Requests naming an unregistered policy",
        )?;
        let policy_duration = Histogram::with_opts(
            HistogramOpts::new(
                "bridge_policy_duration_seconds",
                "Time spent executing a policy while holding the gate",
            )
            .buckets(vec![1.0, 5.0, 10.0, 20.0, 30.0, 45.0, 60.0, 120.0]),
        )?;
        let gate_waiting = IntGauge::new(
            "bridge_gate_waiting",
            "Policy requests waiting for the concurrency gate",
        )?;

        let captures = IntCounter::new("bridge_camera_captures_total", "Successful captures")?;
        let capture_failures =
            IntCounter::new("bridge_camera_failures_total", "Failed camera captures")?;
        let analyses = IntCounter::new("bridge_analyses_total", "Successful scene analyses")?;
        let analysis_failures =
            IntCounter::new("bridge_analysis_failures_total", "Failed scene analyses")?;

        let sessions = IntCounter::new("bridge_sessions_total", "Realtime sessions created")?;
        let session_failures = IntCounter::new(
            "bridge_session_failures_total",
            "Realtime session requests rejected or failed",
        )?;

        registry.register(Box::new(policy_runs.clone()))?;
        registry.register(Box::new(policy_unknown.clone()))?;
        registry.register(Box::new(policy_duration.clone()))?;
        registry.register(Box::new(gate_waiting.clone()))?;
        registry.register(Box::new(captures.clone()))?;
        registry.register(Box::new(capture_failures.clone()))?;
        registry.register(Box::new(analyses.clone()))?;
        registry.register(Box::new(analysis_failures.clone()))?;
        registry.register(Box::new(sessions.clone()))?;
        registry.register(Box::new(session_failures.clone()))?;

        Ok(Self {
            registry,
            policy_runs,
            policy_unknown,
            policy_duration,
            gate_waiting,
            captures,
            capture_failures,
            analyses,
            analysis_failures,
            sessions,
            session_failures,
        })
    }

    /// Counts one gated run. `elapsed` is absent when the run panicked.
    pub fn record_policy_run(&self, policy: &str, outcome: RunOutcome, elapsed: Option<Duration>) {
        self.policy_runs
            .with_label_values(&[policy, outcome.label()])
            .inc();
        if let Some(elapsed) = elapsed {
            self.policy_duration.observe(elapsed.as_secs_f64());
        }
    }

    pub fn record_unknown_policy(&self) {
        self.policy_unknown.inc();
    }

    pub fn set_gate_waiting(&self, waiting: usize) {
        self.gate_waiting.set(waiting as i64);
    }

    pub fn record_capture(&self, ok: bool) {
        if ok {
            self.captures.inc();
        } else {
            self.capture_failures.inc();
        }
    }

    pub fn record_analysis(&self, ok: bool) {
        if ok {
            self.analyses.inc();
        } else {
            self.analysis_failures.inc();
        }
    }

    pub fn record_session(&self, ok: bool) {
        if ok {
            self.sessions.inc();
        } else {
            self.session_failures.inc();
        }
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for BridgeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeMetrics").finish_non_exhaustive()
    }
}
