mod common;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use common::{LogCapture, MockBackend};
use hostpanel::{ApiError, DownloadState};
use serde_json::{Value, json};
use shared_http::api::KvQuant;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Request bodies and paths seen by the mock backend
#[derive(Clone, Default)]
struct Recorder {
    bodies: Arc<Mutex<Vec<Value>>>,
    paths: Arc<Mutex<Vec<String>>>,
    hits: Arc<AtomicUsize>,
}

impl Recorder {
    fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn test_fetch_hostname_and_os() {
    let router = Router::new()
        .route(
            "/system/hostname",
            get(|| async { Json(json!({"data": {"hostname": "desktop-01"}})) }),
        )
        .route("/system/os", get(|| async { Json(json!({"os": "Linux"})) }));
    let backend = MockBackend::spawn(router).await;
    let client = backend.client();

    assert_eq!(client.fetch_hostname().await.unwrap(), "desktop-01");
    assert_eq!(client.fetch_os().await.unwrap(), "Linux");
}

#[tokio::test]
async fn test_vram_usage_http_500_is_reported_not_raised() {
    let router = Router::new().route(
        "/system/vram-usage",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let backend = MockBackend::spawn(router).await;

    let err = backend.client().fetch_vram_usage().await.unwrap_err();

    assert!(matches!(&err, ApiError::Http { status } if *status == StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(
        format!("Error fetching VRAM usage: {}", err),
        "Error fetching VRAM usage: Network response was not ok"
    );
}

#[tokio::test]
async fn test_vram_usage_decodes() {
    let router = Router::new().route(
        "/system/vram-usage",
        get(|| async { Json(json!({"used_vram": 3072, "total_vram": 12288})) }),
    );
    let backend = MockBackend::spawn(router).await;

    let usage = backend.client().fetch_vram_usage().await.unwrap();
    assert_eq!(usage.used_vram, 3072);
    assert_eq!(usage.total_vram, 12288);
    assert_eq!(usage.used_percent(), 25);
}

#[tokio::test]
async fn test_unexpected_shape_is_a_decode_error() {
    let router = Router::new().route(
        "/system/vram-usage",
        get(|| async { Json(json!({"used": "lots"})) }),
    );
    let backend = MockBackend::spawn(router).await;

    let err = backend.client().fetch_vram_usage().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn test_run_script_posts_script_name() {
    let recorder = Recorder::default();
    let router = Router::new()
        .route(
            "/scripts/run",
            post(|State(rec): State<Recorder>, Json(body): Json<Value>| async move {
                rec.bodies.lock().unwrap().push(body);
                Json(json!({"message": "Backup started"}))
            }),
        )
        .with_state(recorder.clone());
    let backend = MockBackend::spawn(router).await;
    let logs = LogCapture::start();

    let response = backend.client().run_script("backup.sh").await.unwrap();

    assert_eq!(response.message.as_deref(), Some("Backup started"));
    assert_eq!(recorder.bodies(), vec![json!({"script": "backup.sh"})]);
    assert!(logs.contents().contains("Message: Backup started"));
}

#[tokio::test]
async fn test_power_actions_send_confirmation() {
    let recorder = Recorder::default();
    let record = |State(rec): State<Recorder>, Json(body): Json<Value>| async move {
        rec.bodies.lock().unwrap().push(body);
        Json(json!({"stdout": "", "stderr": ""}))
    };
    let router = Router::new()
        .route("/system/shutdown", post(record))
        .route("/system/start-desktop", post(record))
        .with_state(recorder.clone());
    let backend = MockBackend::spawn(router).await;
    let client = backend.client();

    let off = client.shut_down_desktop().await.unwrap();
    client.start_desktop().await.unwrap();

    // no message field; the body is kept for display
    assert!(off.message.is_none());
    assert!(off.summary().contains("stdout"));
    assert_eq!(
        recorder.bodies(),
        vec![json!({"script": "ValidData"}), json!({"script": "ValidData"})]
    );
}

#[tokio::test]
async fn test_scripts_are_grouped_by_folder() {
    let router = Router::new().route(
        "/scripts",
        get(|| async {
            Json(json!({"data": {
                "maintenance": ["backup.sh", "update.sh"],
                "llm": ["start_server.sh"]
            }}))
        }),
    );
    let backend = MockBackend::spawn(router).await;

    let catalog = backend.client().fetch_scripts().await.unwrap();

    let folders: Vec<&str> = catalog.keys().map(String::as_str).collect();
    assert_eq!(folders, vec!["llm", "maintenance"]);
    assert_eq!(catalog["maintenance"], vec!["backup.sh", "update.sh"]);
}

#[tokio::test]
async fn test_fetch_models() {
    let router = Router::new().route(
        "/koboldcpp/models",
        get(|| async { Json(json!({"models": ["/models/a.gguf", "/models/b.gguf"]})) }),
    );
    let backend = MockBackend::spawn(router).await;

    let models = backend.client().fetch_models().await.unwrap();
    assert_eq!(models, vec!["/models/a.gguf", "/models/b.gguf"]);
}

#[tokio::test]
async fn test_set_parameters_body() {
    let recorder = Recorder::default();
    let router = Router::new()
        .route(
            "/koboldcpp/set-parameters",
            post(|State(rec): State<Recorder>, Json(body): Json<Value>| async move {
                rec.bodies.lock().unwrap().push(body);
                Json(json!({}))
            }),
        )
        .with_state(recorder.clone());
    let backend = MockBackend::spawn(router).await;
    let client = backend.client();

    client
        .set_parameters("/models/a.gguf", 15360, None)
        .await
        .unwrap();
    client
        .set_parameters("/models/a.gguf", 8192, Some(KvQuant::Q8))
        .await
        .unwrap();

    assert_eq!(
        recorder.bodies(),
        vec![
            json!({"model_path": "/models/a.gguf", "context_length": 15360}),
            json!({"model_path": "/models/a.gguf", "context_length": 8192, "kv_quant": "q8"}),
        ]
    );
}

async fn record_download(State(rec): State<Recorder>, Json(body): Json<Value>) -> Json<Value> {
    rec.bodies.lock().unwrap().push(body);
    Json(json!({}))
}

#[tokio::test]
async fn test_download_runs_to_completion() {
    let recorder = Recorder::default();
    let router = Router::new()
        .route("/koboldcpp/download", post(record_download))
        .route(
            "/koboldcpp/download/progress/{job_id}",
            get(|State(rec): State<Recorder>, Path(job_id): Path<String>| async move {
                rec.paths.lock().unwrap().push(job_id);
                match rec.hits.fetch_add(1, Ordering::SeqCst) {
                    0 => Json(json!({"filename": "m.gguf", "progress_ratio": 0.3, "done": false, "error": null})),
                    1 => Json(json!({"filename": "m.gguf", "progress_ratio": 0.8, "done": false, "error": null})),
                    _ => Json(json!({"filename": "m.gguf", "progress_ratio": 1.0, "done": true, "error": null})),
                }
            }),
        )
        .with_state(recorder.clone());
    let backend = MockBackend::spawn(router).await;
    let client = backend.client();

    let job_id = client
        .start_download("unsloth/Tiny-GGUF", None, None)
        .await
        .unwrap();
    let watch = client.watch_download(job_id.clone()).unwrap();
    assert_eq!(watch.state(), DownloadState::Pending);

    let outcome = tokio::time::timeout(Duration::from_secs(5), watch.wait())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DownloadState::Done {
            filename: Some("m.gguf".to_string())
        }
    );
    assert_eq!(recorder.hits.load(Ordering::SeqCst), 3);
    assert!(recorder
        .paths
        .lock()
        .unwrap()
        .iter()
        .all(|p| p == job_id.as_str()));
    assert_eq!(
        recorder.bodies(),
        vec![json!({
            "hf_model": "unsloth/Tiny-GGUF",
            "branch": "main",
            "job_id": job_id.as_str(),
            "specific_file": ""
        })]
    );
}

#[tokio::test]
async fn test_download_reported_error_fails_the_job() {
    let recorder = Recorder::default();
    let router = Router::new()
        .route("/koboldcpp/download", post(record_download))
        .route(
            "/koboldcpp/download/progress/{job_id}",
            get(|| async { Json(json!({"progress_ratio": 0.0, "done": false, "error": "Repository not found"})) }),
        )
        .with_state(recorder.clone());
    let backend = MockBackend::spawn(router).await;
    let client = backend.client();

    let job_id = client
        .start_download("nobody/missing", Some("dev"), Some("x.gguf"))
        .await
        .unwrap();
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        client.watch_download(job_id).unwrap().wait(),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        DownloadState::Failed {
            message: "Repository not found".to_string()
        }
    );
    assert_eq!(recorder.bodies()[0]["branch"], "dev");
    assert_eq!(recorder.bodies()[0]["specific_file"], "x.gguf");
}

#[tokio::test]
async fn test_download_progress_http_failure_fails_the_job() {
    let router = Router::new()
        .route("/koboldcpp/download", post(|| async { Json(json!({})) }))
        .route(
            "/koboldcpp/download/progress/{job_id}",
            get(|| async { StatusCode::NOT_FOUND }),
        );
    let backend = MockBackend::spawn(router).await;
    let client = backend.client();

    let job_id = client.start_download("org/repo", None, None).await.unwrap();
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        client.watch_download(job_id).unwrap().wait(),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        DownloadState::Failed {
            message: "Network response was not ok".to_string()
        }
    );
}

#[tokio::test]
async fn test_download_start_failure_is_http_error() {
    let router = Router::new().route(
        "/koboldcpp/download",
        post(|| async { StatusCode::BAD_GATEWAY }),
    );
    let backend = MockBackend::spawn(router).await;

    let err = backend
        .client()
        .start_download("org/repo", None, None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
}

#[tokio::test]
async fn test_download_start_requires_json_acknowledgement() {
    let router = Router::new().route(
        "/koboldcpp/download",
        post(|| async { "queued" }),
    );
    let backend = MockBackend::spawn(router).await;

    let err = backend
        .client()
        .start_download("org/repo", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}
