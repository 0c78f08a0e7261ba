//! Mock HTTP tests for the KlingAI client and driver.

use std::time::Duration;

use imageauto::config::KlingApiConfig;
use imageauto::generator::{GenerationRequest, GenerationResult, GeneratorKind, VideoDriver};
use imageauto::kling::{Claims, Image2VideoRequest, KlingApiDriver, KlingClient, KlingError, RetryPolicy, TaskStatus};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header_regex, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

const ACCESS_KEY: &str = "test-access";
const SECRET_KEY: &str = "test-secret";

/// Matches requests carrying a bearer token signed with `SECRET_KEY`.
struct SignedBearer;

impl Match for SignedBearer {
    fn matches(&self, request: &Request) -> bool {
        let Some(value) = request
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };
        let Some(token) = value.strip_prefix("Bearer ") else {
            return false;
        };
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ACCESS_KEY]);
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(SECRET_KEY.as_bytes()),
            &validation,
        )
        .is_ok()
    }
}

fn settings(base_url: String) -> KlingApiConfig {
    KlingApiConfig {
        base_url,
        poll_interval_ms: 10,
        max_wait_secs: 5,
        ..KlingApiConfig::default()
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        rate_limit_retries: 2,
        network_retries: 1,
        backoff_base: Duration::from_millis(5),
        backoff_max: Duration::from_millis(20),
    }
}

fn client(server: &MockServer) -> KlingClient {
    KlingClient::new(
        ACCESS_KEY.to_string(),
        SECRET_KEY.to_string(),
        settings(server.uri()),
    )
    .unwrap()
    .with_retry_policy(fast_retry())
}

fn body() -> Image2VideoRequest {
    let request = GenerationRequest::builder("in.png", "ocean waves")
        .negative_prompt("blur")
        .duration(10)
        .allow_missing_image()
        .build()
        .unwrap();
    Image2VideoRequest::new("kling-v1", "aW1n".to_string(), &request)
}

fn task_json(status: &str, extra: serde_json::Value) -> serde_json::Value {
    let mut data = json!({"task_id": "task-1", "task_status": status});
    if let (Some(data), Some(extra)) = (data.as_object_mut(), extra.as_object()) {
        data.extend(extra.clone());
    }
    json!({"code": 0, "message": "SUCCEED", "data": data})
}

#[test]
fn test_empty_credentials_rejected() {
    let result = KlingClient::new(String::new(), "sk".into(), KlingApiConfig::default());
    assert!(matches!(result, Err(KlingError::MissingCredentials)));
    let result = KlingClient::new("ak".into(), "  ".into(), KlingApiConfig::default());
    assert!(matches!(result, Err(KlingError::MissingCredentials)));
}

#[test]
fn test_base_url_trailing_slash_trimmed() {
    let client = KlingClient::new(
        "ak".into(),
        "sk".into(),
        settings("https://api.example.com/".into()),
    )
    .unwrap();
    assert_eq!(client.base_url(), "https://api.example.com");
}

#[tokio::test]
async fn test_submit_sends_signed_token_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos/image2video"))
        .and(header_regex("Authorization", "^Bearer .+"))
        .and(SignedBearer)
        .and(body_partial_json(json!({
            "model_name": "kling-v1",
            "image": "aW1n",
            "prompt": "ocean waves",
            "negative_prompt": "blur",
            "mode": "std",
            "duration": "10"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json("submitted", json!({}))))
        .expect(1)
        .mount(&server)
        .await;

    let task_id = client(&server).submit(&body()).await.unwrap();
    assert_eq!(task_id, "task-1");
}

#[tokio::test]
async fn test_submit_envelope_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos/image2video"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1102,
            "message": "account balance not enough",
            "data": null
        })))
        .mount(&server)
        .await;

    let err = client(&server).submit(&body()).await.unwrap_err();
    match &err {
        KlingError::Envelope { code, message } => {
            assert_eq!(*code, 1102);
            assert_eq!(message, "account balance not enough");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(err.to_string(), "API error 1102: account balance not enough");
}

#[tokio::test]
async fn test_submit_retries_after_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos/image2video"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/videos/image2video"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json("submitted", json!({}))))
        .expect(1)
        .mount(&server)
        .await;

    let task_id = client(&server).submit_with_retry(&body()).await.unwrap();
    assert_eq!(task_id, "task-1");
}

#[tokio::test]
async fn test_submit_gives_up_after_rate_limit_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos/image2video"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server).submit_with_retry(&body()).await.unwrap_err();
    assert!(matches!(err, KlingError::RateLimit { .. }));
}

#[tokio::test]
async fn test_submit_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos/image2video"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad image"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).submit_with_retry(&body()).await.unwrap_err();
    assert!(matches!(err, KlingError::ApiError(_)));
}

#[tokio::test]
async fn test_poll_status_states() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/image2video/processing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json("processing", json!({}))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/image2video/done"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(
            "succeed",
            json!({"task_result": {"videos": [{"id": "v1", "url": "https://cdn/v.mp4"}]}}),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/image2video/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(
            "failed",
            json!({"task_status_msg": "content policy"}),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/image2video/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(
            "succeed",
            json!({"task_result": {"videos": []}}),
        )))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(
        client.poll_status("processing").await.unwrap(),
        TaskStatus::Processing
    );
    assert_eq!(
        client.poll_status("done").await.unwrap(),
        TaskStatus::Succeeded {
            video_url: "https://cdn/v.mp4".to_string()
        }
    );
    assert_eq!(
        client.poll_status("broken").await.unwrap(),
        TaskStatus::Failed {
            error: "content policy".to_string()
        }
    );
    assert!(matches!(
        client.poll_status("empty").await.unwrap(),
        TaskStatus::Failed { .. }
    ));
}

#[tokio::test]
async fn test_wait_for_video_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/image2video/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json("processing", json!({}))))
        .mount(&server)
        .await;

    let client = KlingClient::new(
        ACCESS_KEY.to_string(),
        SECRET_KEY.to_string(),
        KlingApiConfig {
            base_url: server.uri(),
            poll_interval_ms: 20,
            max_wait_secs: 0,
            ..KlingApiConfig::default()
        },
    )
    .unwrap();

    let err = client.wait_for_video("slow").await.unwrap_err();
    assert!(matches!(err, KlingError::Timeout { waited_secs: 0 }));
}

#[tokio::test]
async fn test_wait_for_video_stops_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/image2video/task-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(
            "failed",
            json!({"task_status_msg": "nsfw"}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).wait_for_video("task-1").await.unwrap_err();
    assert!(matches!(err, KlingError::TaskFailed(ref msg) if msg == "nsfw"));
}

#[tokio::test]
async fn test_download_video_writes_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/v.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("videos").join("out.mp4");
    let url = format!("{}/files/v.mp4", server.uri());
    let written = client(&server).download_video(&url, &dest).await.unwrap();
    assert_eq!(written, dest);
    assert_eq!(std::fs::metadata(&dest).unwrap().len(), 4096);
}

#[tokio::test]
async fn test_driver_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos/image2video"))
        .and(SignedBearer)
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json("submitted", json!({}))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/image2video/task-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(
            "succeed",
            json!({"task_result": {"videos": [{"url": format!("{}/files/v.mp4", server.uri())}]}}),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/v.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4-bytes".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("in.png");
    std::fs::write(&image, b"png").unwrap();
    let request = GenerationRequest::builder(&image, "waves").build().unwrap();

    let driver = KlingApiDriver::with_client(client(&server), dir.path().join("videos"));
    assert_eq!(driver.kind(), GeneratorKind::RemoteApi);

    let result = driver.generate(&request).await;
    let artifact = result.artifact_ref().expect("artifact");
    assert!(artifact.file_name.starts_with("klingai_"));
    assert!(artifact.file_name.ends_with(".mp4"));
    assert_eq!(artifact.size_bytes, 9);
}

#[tokio::test]
async fn test_driver_removes_empty_download() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos/image2video"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json("submitted", json!({}))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/image2video/task-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(
            "succeed",
            json!({"task_result": {"videos": [{"url": format!("{}/files/empty.mp4", server.uri())}]}}),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/empty.mp4"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("in.png");
    std::fs::write(&image, b"png").unwrap();
    let request = GenerationRequest::builder(&image, "waves").build().unwrap();
    let videos = dir.path().join("videos");

    let driver = KlingApiDriver::with_client(client(&server), videos.clone());
    let result = driver.generate(&request).await;
    let error = result.error_message().expect("failure");
    assert!(error.contains("empty"), "{}", error);

    let left: Vec<_> = std::fs::read_dir(&videos)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.file_name())
        .collect();
    assert!(left.is_empty(), "{:?}", left);
}

#[tokio::test]
async fn test_driver_rejects_oversize_image_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("big.png");
    std::fs::write(&image, vec![0u8; 2048]).unwrap();
    let request = GenerationRequest::builder(&image, "waves").build().unwrap();

    let client = KlingClient::new(
        ACCESS_KEY.to_string(),
        SECRET_KEY.to_string(),
        KlingApiConfig {
            base_url: server.uri(),
            max_image_bytes: 1024,
            ..KlingApiConfig::default()
        },
    )
    .unwrap();
    let driver = KlingApiDriver::with_client(client, dir.path().to_path_buf());

    match driver.generate(&request).await {
        GenerationResult::Failure(failure) => {
            assert!(failure.error.starts_with("KlingAI API:"), "{}", failure.error);
            assert!(failure.error.contains("1024"), "{}", failure.error);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}
