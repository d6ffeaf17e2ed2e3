//! HTTP backend tests against an in-process fake processing service.

use std::collections::{HashMap, VecDeque};
use std::net::TcpListener as StdTcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use vidscribe_core::testing::fixtures;
use vidscribe_core::{
    BackendConfig, BackendError, FailureKind, HttpBackend, JobOrchestrator, JobStatus, StepReport,
    TranscriptionBackend,
};

/// A file part as the fake service received it.
#[derive(Debug, Clone)]
struct ReceivedUpload {
    field: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Canned responses plus everything the fake service received.
struct FakeService {
    upload_reply: (StatusCode, String),
    steps: VecDeque<(StatusCode, String)>,
    last_step: (StatusCode, String),
    results: HashMap<String, (StatusCode, String)>,
    uploads: Vec<ReceivedUpload>,
    step_requests: u32,
    result_requests: Vec<String>,
    upload_delay: Duration,
    step_delay: Duration,
}

impl Default for FakeService {
    fn default() -> Self {
        Self {
            upload_reply: (StatusCode::OK, r#"{"message":"accepted"}"#.to_string()),
            steps: VecDeque::new(),
            last_step: (StatusCode::OK, r#"{"logs":[]}"#.to_string()),
            results: HashMap::new(),
            uploads: Vec::new(),
            step_requests: 0,
            result_requests: Vec::new(),
            upload_delay: Duration::ZERO,
            step_delay: Duration::ZERO,
        }
    }
}

type SharedService = Arc<Mutex<FakeService>>;

async fn process_video(
    State(service): State<SharedService>,
    mut multipart: Multipart,
) -> (StatusCode, String) {
    let mut received = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let upload = ReceivedUpload {
            field: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            bytes: field.bytes().await.unwrap().to_vec(),
        };
        received.push(upload);
    }

    let delay = {
        let mut service = service.lock().unwrap();
        service.uploads.extend(received);
        service.upload_delay
    };
    tokio::time::sleep(delay).await;
    service.lock().unwrap().upload_reply.clone()
}

async fn current_step(State(service): State<SharedService>) -> (StatusCode, String) {
    let delay = {
        let mut service = service.lock().unwrap();
        service.step_requests += 1;
        service.step_delay
    };
    tokio::time::sleep(delay).await;

    let mut service = service.lock().unwrap();
    if let Some(next) = service.steps.pop_front() {
        service.last_step = next;
    }
    service.last_step.clone()
}

async fn results(
    State(service): State<SharedService>,
    Path(filename): Path<String>,
) -> (StatusCode, String) {
    let mut service = service.lock().unwrap();
    service.result_requests.push(filename.clone());
    service
        .results
        .get(&filename)
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, "not found".to_string()))
}

/// Start the fake service on a random port and return its base URL.
async fn spawn_fake(service: SharedService) -> String {
    let app = Router::new()
        .route("/process_video/", post(process_video))
        .route("/current_step/", get(current_step))
        .route("/results/{filename}", get(results))
        .with_state(service);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Read one HTTP request (headers plus a `Content-Length` body) off the stream.
async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                return;
            }
        }
    }
}

/// Serve a 200 response that promises more body than it sends, then hang up.
async fn spawn_truncating_service() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 500\r\n\r\n{\"tr")
                .await
                .unwrap();
            stream.shutdown().await.ok();
        }
    });

    format!("http://{}", addr)
}

fn http_backend(base_url: &str) -> HttpBackend {
    HttpBackend::new(BackendConfig {
        base_url: base_url.to_string(),
        request_timeout_secs: 5,
        upload_timeout_secs: 5,
        ..Default::default()
    })
    .unwrap()
}

async fn setup() -> (SharedService, HttpBackend) {
    let service = Arc::new(Mutex::new(FakeService::default()));
    let base_url = spawn_fake(Arc::clone(&service)).await;
    (service, http_backend(&base_url))
}

#[tokio::test]
async fn test_upload_sends_single_file_part() {
    let (service, backend) = setup().await;

    let ack = backend
        .upload("clip.mp4", fixtures::video_bytes())
        .await
        .unwrap();
    assert!(ack.transcript.is_none());
    assert!(ack.summary.is_none());

    let service = service.lock().unwrap();
    assert_eq!(service.uploads.len(), 1);
    let upload = &service.uploads[0];
    assert_eq!(upload.field, "file");
    assert_eq!(upload.file_name.as_deref(), Some("clip.mp4"));
    assert_eq!(upload.content_type.as_deref(), Some("video/mp4"));
    assert_eq!(upload.bytes, fixtures::video_bytes());
}

#[tokio::test]
async fn test_upload_uses_configured_mime_type() {
    let service = Arc::new(Mutex::new(FakeService::default()));
    let base_url = spawn_fake(Arc::clone(&service)).await;
    let backend = HttpBackend::new(BackendConfig {
        base_url,
        upload_mime_type: "video/quicktime".to_string(),
        ..Default::default()
    })
    .unwrap();

    backend.upload("clip.mov", vec![1, 2, 3]).await.unwrap();

    let service = service.lock().unwrap();
    assert_eq!(
        service.uploads[0].content_type.as_deref(),
        Some("video/quicktime")
    );
}

#[tokio::test]
async fn test_upload_ack_with_early_result_is_parsed() {
    let (service, backend) = setup().await;
    service.lock().unwrap().upload_reply = (
        StatusCode::OK,
        r#"{"transcript":"early","summary":null}"#.to_string(),
    );

    let ack = backend.upload("clip.mp4", vec![1]).await.unwrap();
    assert_eq!(ack.transcript.as_deref(), Some("early"));
    assert!(ack.summary.is_none());
}

#[tokio::test]
async fn test_upload_non_200_is_status_error() {
    let (service, backend) = setup().await;
    service.lock().unwrap().upload_reply =
        (StatusCode::INTERNAL_SERVER_ERROR, "disk full".to_string());

    let err = backend.upload("clip.mp4", vec![1]).await.unwrap_err();
    assert_eq!(
        err,
        BackendError::Status {
            status: 500,
            body: "disk full".to_string()
        }
    );
}

#[tokio::test]
async fn test_upload_created_is_not_success() {
    let (service, backend) = setup().await;
    service.lock().unwrap().upload_reply = (StatusCode::CREATED, "{}".to_string());

    let err = backend.upload("clip.mp4", vec![1]).await.unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 201, .. }));
}

#[tokio::test]
async fn test_current_step_parses_logs() {
    let (service, backend) = setup().await;
    service.lock().unwrap().steps.push_back((
        StatusCode::OK,
        r#"{"logs":["[Step 1] Video received.","[Step 2] Extracting audio."]}"#.to_string(),
    ));

    let report = backend.current_step().await.unwrap();
    assert_eq!(
        report,
        StepReport::Logs(fixtures::logs(&[
            "[Step 1] Video received.",
            "[Step 2] Extracting audio."
        ]))
    );
}

#[tokio::test]
async fn test_current_step_without_logs_array() {
    let (service, backend) = setup().await;
    {
        let mut service = service.lock().unwrap();
        service
            .steps
            .push_back((StatusCode::OK, r#"{"status":"busy"}"#.to_string()));
        service
            .steps
            .push_back((StatusCode::OK, r#"{"logs":null}"#.to_string()));
        service
            .steps
            .push_back((StatusCode::OK, "not json".to_string()));
    }

    for _ in 0..3 {
        assert_eq!(backend.current_step().await.unwrap(), StepReport::NoLogs);
    }
}

#[tokio::test]
async fn test_current_step_non_200_is_status_error() {
    let (service, backend) = setup().await;
    service
        .lock()
        .unwrap()
        .steps
        .push_back((StatusCode::SERVICE_UNAVAILABLE, "warming up".to_string()));

    let err = backend.current_step().await.unwrap_err();
    assert_eq!(
        err,
        BackendError::Status {
            status: 503,
            body: "warming up".to_string()
        }
    );
}

#[tokio::test]
async fn test_fetch_result_decodes_payload() {
    let (service, backend) = setup().await;
    service.lock().unwrap().results.insert(
        "clip.mp4".to_string(),
        (
            StatusCode::OK,
            r#"{"transcript":"hello world","summary":"greeting"}"#.to_string(),
        ),
    );

    let payload = backend.fetch_result("clip.mp4").await.unwrap();
    assert_eq!(payload, fixtures::result("hello world", "greeting"));
}

#[tokio::test]
async fn test_fetch_result_encodes_filename() {
    let (service, backend) = setup().await;
    service.lock().unwrap().results.insert(
        "my clip #2.mp4".to_string(),
        (StatusCode::OK, r#"{"transcript":"t","summary":"s"}"#.to_string()),
    );

    backend.fetch_result("my clip #2.mp4").await.unwrap();

    let service = service.lock().unwrap();
    assert_eq!(service.result_requests, vec!["my clip #2.mp4".to_string()]);
}

#[tokio::test]
async fn test_fetch_result_missing_fields() {
    let (service, backend) = setup().await;
    service.lock().unwrap().results.insert(
        "clip.mp4".to_string(),
        (StatusCode::OK, r#"{"transcript":null}"#.to_string()),
    );

    let payload = backend.fetch_result("clip.mp4").await.unwrap();
    assert!(payload.transcript.is_none());
    assert!(payload.summary.is_none());
}

#[tokio::test]
async fn test_fetch_result_bad_body_is_decode_error() {
    let (service, backend) = setup().await;
    service
        .lock()
        .unwrap()
        .results
        .insert("clip.mp4".to_string(), (StatusCode::OK, "<html>".to_string()));

    let err = backend.fetch_result("clip.mp4").await.unwrap_err();
    assert!(matches!(err, BackendError::Decode(_)));
}

#[tokio::test]
async fn test_fetch_result_not_found() {
    let (_service, backend) = setup().await;

    let err = backend.fetch_result("unknown.mp4").await.unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_unreachable_service_is_connection_error() {
    // Bind to reserve a free port, then drop the listener so nothing answers
    let port = StdTcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let backend = http_backend(&format!("http://127.0.0.1:{}", port));

    let err = backend.current_step().await.unwrap_err();
    assert!(matches!(err, BackendError::ConnectionFailed(_)));
}

#[tokio::test]
async fn test_orchestrator_over_http() {
    let service = Arc::new(Mutex::new(FakeService::default()));
    let base_url = spawn_fake(Arc::clone(&service)).await;
    {
        let mut service = service.lock().unwrap();
        service.steps.push_back((
            StatusCode::OK,
            r#"{"logs":["[Step 1] Video received."]}"#.to_string(),
        ));
        service.steps.push_back((
            StatusCode::OK,
            serde_json::json!({ "logs": fixtures::completed_logs() }).to_string(),
        ));
        service.results.insert(
            "talk.mp4".to_string(),
            (
                StatusCode::OK,
                r#"{"transcript":"full transcript","summary":null}"#.to_string(),
            ),
        );
    }

    let backend: Arc<dyn TranscriptionBackend> = Arc::new(http_backend(&base_url));
    let orchestrator = JobOrchestrator::new(backend, fixtures::fast_polling());

    let handle = orchestrator
        .submit(fixtures::video_bytes(), "talk.mp4")
        .await;
    let finished = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("job did not finish");

    assert_eq!(finished.status, JobStatus::Complete);
    assert_eq!(finished.log_lines, fixtures::completed_logs());
    let result = finished.result.unwrap();
    assert_eq!(result.transcript, "full transcript");
    assert_eq!(result.summary, "No summary available");
    assert_eq!(finished.poll_count, 2);

    let service = service.lock().unwrap();
    assert_eq!(service.uploads.len(), 1);
    assert_eq!(service.step_requests, 2);
    assert_eq!(service.result_requests, vec!["talk.mp4".to_string()]);
}

#[tokio::test]
async fn test_orchestrator_reports_upload_rejection() {
    let (service, backend) = setup().await;
    service.lock().unwrap().upload_reply =
        (StatusCode::UNPROCESSABLE_ENTITY, "bad container".to_string());

    let orchestrator = JobOrchestrator::new(Arc::new(backend), fixtures::fast_polling());
    let handle = orchestrator.submit(vec![1, 2, 3], "clip.avi").await;
    let finished = handle.wait().await;

    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.failure, Some(FailureKind::UploadFailed));
    assert_eq!(service.lock().unwrap().step_requests, 0);
}

#[tokio::test]
async fn test_upload_truncated_body_is_error() {
    let base_url = spawn_truncating_service().await;
    let backend = http_backend(&base_url);

    let result = backend.upload("clip.mp4", fixtures::video_bytes()).await;
    assert!(result.is_err(), "truncated upload reply accepted: {:?}", result);

    let orchestrator = JobOrchestrator::new(Arc::new(backend), fixtures::fast_polling());
    let finished = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator
            .submit(fixtures::video_bytes(), "clip.mp4")
            .await
            .wait(),
    )
    .await
    .expect("job did not finish");

    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.failure, Some(FailureKind::UploadFailed));
    assert_eq!(finished.poll_count, 0);
}

#[tokio::test]
async fn test_slow_status_hits_request_timeout() {
    let service = Arc::new(Mutex::new(FakeService::default()));
    service.lock().unwrap().step_delay = Duration::from_secs(3);
    let base_url = spawn_fake(Arc::clone(&service)).await;
    let backend = HttpBackend::new(BackendConfig {
        base_url,
        request_timeout_secs: 1,
        ..Default::default()
    })
    .unwrap();

    let err = backend.current_step().await.unwrap_err();
    assert_eq!(err, BackendError::Timeout);

    let orchestrator = JobOrchestrator::new(Arc::new(backend), fixtures::fast_polling());
    let finished = tokio::time::timeout(
        Duration::from_secs(10),
        orchestrator
            .submit(fixtures::video_bytes(), "clip.mp4")
            .await
            .wait(),
    )
    .await
    .expect("job did not finish");

    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.failure, Some(FailureKind::PollFailed));
    assert!(finished
        .error_message
        .as_deref()
        .unwrap()
        .contains("Request timeout"));
    assert_eq!(finished.poll_count, 1);
}

#[tokio::test]
async fn test_slow_upload_hits_upload_timeout() {
    let service = Arc::new(Mutex::new(FakeService::default()));
    service.lock().unwrap().upload_delay = Duration::from_secs(3);
    let base_url = spawn_fake(Arc::clone(&service)).await;
    let backend = HttpBackend::new(BackendConfig {
        base_url,
        request_timeout_secs: 30,
        upload_timeout_secs: 1,
        ..Default::default()
    })
    .unwrap();

    let orchestrator = JobOrchestrator::new(Arc::new(backend), fixtures::fast_polling());
    let finished = tokio::time::timeout(
        Duration::from_secs(10),
        orchestrator
            .submit(fixtures::video_bytes(), "clip.mp4")
            .await
            .wait(),
    )
    .await
    .expect("job did not finish");

    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.failure, Some(FailureKind::UploadFailed));
    assert!(finished
        .error_message
        .as_deref()
        .unwrap()
        .contains("Request timeout"));
    assert_eq!(service.lock().unwrap().step_requests, 0);
}
