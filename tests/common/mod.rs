#![allow(dead_code)]

use axum::{body::Body, extract::DefaultBodyLimit, http::Request, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // for oneshot
use voice_arm_bridge::{
    bridge::BridgeComponents,
    capture::{Camera, CameraError, CaptureConfig, EncodedImage, PLACEHOLDER_PNG},
    journal::{JournalConfig, VisionJournal},
    metrics::BridgeMetrics,
    policy::{InferenceError, InferenceRunner, PickAndPlaceParams},
    provider::{ProviderClient, ProviderConfig},
    Bridge, ConcurrencyGate, PolicyRegistry, SessionOptions, SharedCamera,
};

/// Fake policy: sleeps, and tracks how many runs are inside at once.
#[derive(Default)]
pub struct FakePolicy {
    pub sleep: Duration,
    pub current: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakePolicy {
    pub fn sleeping(ms: u64) -> Self {
        Self {
            sleep: Duration::from_millis(ms),
            ..Default::default()
        }
    }
}

impl InferenceRunner for FakePolicy {
    fn run_pick_and_place(&self, _params: &PickAndPlaceParams) -> Result<(), InferenceError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.sleep);
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fake camera that counts captures and can be made to fail.
pub struct FakeCamera {
    pub captures: Arc<AtomicUsize>,
    pub fail: bool,
    open: bool,
}

impl FakeCamera {
    pub fn working(captures: Arc<AtomicUsize>) -> Self {
        Self {
            captures,
            fail: false,
            open: false,
        }
    }

    pub fn broken(captures: Arc<AtomicUsize>) -> Self {
        Self {
            captures,
            fail: true,
            open: false,
        }
    }
}

impl Camera for FakeCamera {
    fn open(&mut self, _config: &CaptureConfig) -> Result<(), CameraError> {
        self.open = true;
        Ok(())
    }

    fn capture(&mut self) -> Result<EncodedImage, CameraError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CameraError::CaptureFailed("USB camera disconnected".into()));
        }
        Ok(EncodedImage::new(PLACEHOLDER_PNG.to_vec(), 1))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> Result<(), CameraError> {
        self.open = false;
        Ok(())
    }
}

/// Starts a fake model provider on a random local port.
///
/// Returns its `/v1` base URL.
pub async fn fake_provider() -> String {
    let router = Router::new()
        .route(
            "/v1/realtime/client_secrets",
            post(|Json(body): Json<Value>| async move {
                let tools = body["session"]["tools"].as_array().map_or(0, Vec::len);
                Json(json!({"value": format!("ek_tools_{tools}")}))
            }),
        )
        .route(
            "/v1/chat/completions",
            post(|Json(_body): Json<Value>| async {
                Json(json!({
                    "choices": [{"message": {"content": "One carrot left on the plate."}}]
                }))
            }),
        )
        .layer(DefaultBodyLimit::disable());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/v1")
}

pub struct TestBridge {
    pub bridge: Bridge,
    pub policy: Arc<FakePolicy>,
    pub captures: Arc<AtomicUsize>,
    pub journal_dir: tempfile::TempDir,
}

pub fn test_bridge(policy: FakePolicy, broken_camera: bool, api_base: &str) -> TestBridge {
    let policy = Arc::new(policy);
    let captures = Arc::new(AtomicUsize::new(0));
    let camera: Box<dyn Camera> = if broken_camera {
        Box::new(FakeCamera::broken(Arc::clone(&captures)))
    } else {
        Box::new(FakeCamera::working(Arc::clone(&captures)))
    };
    let journal_dir = tempfile::tempdir().unwrap();

    let bridge = Bridge::new(BridgeComponents {
        registry: PolicyRegistry::new(policy.clone()),
        gate: ConcurrencyGate::new(),
        camera: SharedCamera::new(camera, CaptureConfig::mock()),
        provider: ProviderClient::new(
            ProviderConfig {
                api_base: api_base.to_string(),
                ..Default::default()
            },
            "sk-test",
        )
        .unwrap(),
        journal: VisionJournal::new(&JournalConfig {
            dir: journal_dir.path().to_path_buf(),
        }),
        session: SessionOptions::default(),
        metrics: BridgeMetrics::new().unwrap(),
    });

    TestBridge {
        bridge,
        policy,
        captures,
        journal_dir,
    }
}

/// Sends one request through the router and decodes the JSON reply.
pub async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Value {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), axum::http::StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
