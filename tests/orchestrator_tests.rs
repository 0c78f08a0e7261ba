//! Fallback behaviour of the orchestrator and the media service.

use std::sync::Arc;

use async_trait::async_trait;
use imageauto::config::{AppConfig, Credentials};
use imageauto::editor::VideoEditor;
use imageauto::generator::{
    DispatchOptions, GenerationOutput, GenerationRequest, GenerationResult, GeneratorKind,
    GeneratorRegistry, Orchestrator, ValidationError, VideoDriver,
};
use imageauto::placeholder::{PlaceholderImageGenerator, PlaceholderVideoDriver};
use imageauto::service::{MediaService, VideoParams, VideoSettings};
use imageauto::storage::ContentStore;

use GeneratorKind::{BrowserAutomation, Placeholder, RemoteApi};

/// Shared invocation log across drivers.
#[derive(Clone, Default)]
struct Calls(Arc<std::sync::Mutex<Vec<GeneratorKind>>>);

impl Calls {
    fn record(&self, kind: GeneratorKind) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(kind);
        }
    }

    fn list(&self) -> Vec<GeneratorKind> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

struct Failing {
    kind: GeneratorKind,
    calls: Calls,
}

#[async_trait]
impl VideoDriver for Failing {
    fn kind(&self) -> GeneratorKind {
        self.kind
    }

    async fn generate(&self, _request: &GenerationRequest) -> GenerationResult {
        self.calls.record(self.kind);
        GenerationResult::failure(format!("{} is down", self.kind))
    }
}

struct Panicking {
    calls: Calls,
}

#[async_trait]
impl VideoDriver for Panicking {
    fn kind(&self) -> GeneratorKind {
        RemoteApi
    }

    async fn generate(&self, _request: &GenerationRequest) -> GenerationResult {
        self.calls.record(RemoteApi);
        panic!("driver bug");
    }
}

/// Real placeholder driver that also records its invocations.
struct CountingPlaceholder {
    inner: PlaceholderVideoDriver,
    calls: Calls,
}

#[async_trait]
impl VideoDriver for CountingPlaceholder {
    fn kind(&self) -> GeneratorKind {
        Placeholder
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        self.calls.record(Placeholder);
        self.inner.generate(request).await
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    calls: Calls,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            calls: Calls::default(),
        }
    }

    fn store(&self) -> ContentStore {
        let store = ContentStore::new(self.dir.path());
        store.ensure_layout().unwrap();
        store
    }

    fn failing(&self, kind: GeneratorKind) -> Box<dyn VideoDriver> {
        Box::new(Failing {
            kind,
            calls: self.calls.clone(),
        })
    }

    fn placeholder(&self) -> Box<dyn VideoDriver> {
        Box::new(CountingPlaceholder {
            inner: PlaceholderVideoDriver::new(self.store().videos_dir()),
            calls: self.calls.clone(),
        })
    }

    fn request(&self, duration: u32) -> GenerationRequest {
        let image = self.dir.path().join("input.png");
        if !image.exists() {
            image::RgbaImage::from_pixel(32, 24, image::Rgba([200, 40, 40, 255]))
                .save(&image)
                .unwrap();
        }
        GenerationRequest::builder(image, "waves crash on rocks")
            .duration(duration)
            .build()
            .unwrap()
    }
}

fn assert_artifact_exists(result: &GenerationResult) {
    let artifact = result.artifact_ref().expect("artifact result");
    let metadata = std::fs::metadata(&artifact.path).unwrap();
    assert!(metadata.len() > 0);
    assert_eq!(metadata.len(), artifact.size_bytes);
}

#[tokio::test]
async fn test_scenario_a_remote_failure_falls_back_to_placeholder() {
    let fx = Fixture::new();
    let registry = GeneratorRegistry::builder()
        .driver(fx.failing(RemoteApi))
        .driver(fx.placeholder())
        .build();
    let orchestrator = Orchestrator::new(registry);

    let result = orchestrator
        .generate(&fx.request(5), DispatchOptions::default())
        .await;

    let provenance = result.provenance().expect("success");
    assert_eq!(provenance.generator_type, Placeholder);
    assert_eq!(provenance.fallback_from, Some(RemoteApi));
    assert_eq!(provenance.attempts, 2);
    assert_eq!(fx.calls.list(), vec![RemoteApi, Placeholder]);
    assert_artifact_exists(&result);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["generator_type"], "placeholder");
    assert_eq!(json["fallback_from"], "klingai_api");
}

#[tokio::test]
async fn test_scenario_b_unregistered_kind_is_substituted() {
    let fx = Fixture::new();
    let registry = GeneratorRegistry::builder().driver(fx.placeholder()).build();
    let orchestrator = Orchestrator::new(registry);

    let result = orchestrator
        .generate(&fx.request(5), DispatchOptions::requested(RemoteApi))
        .await;

    let provenance = result.provenance().expect("success");
    assert_eq!(provenance.generator_type, Placeholder);
    assert_eq!(provenance.fallback_from, Some(RemoteApi));
    assert_eq!(fx.calls.list(), vec![Placeholder]);
}

#[tokio::test]
async fn test_scenario_c_three_attempts_end_at_placeholder() {
    let fx = Fixture::new();
    let registry = GeneratorRegistry::builder()
        .driver(fx.failing(RemoteApi))
        .driver(fx.failing(BrowserAutomation))
        .driver(fx.placeholder())
        .build();
    let orchestrator = Orchestrator::new(registry);

    let result = orchestrator
        .generate(&fx.request(10), DispatchOptions::default())
        .await;

    assert_eq!(fx.calls.list(), vec![RemoteApi, BrowserAutomation, Placeholder]);
    let provenance = result.provenance().expect("success");
    assert_eq!(provenance.generator_type, Placeholder);
    assert_eq!(provenance.attempts, 3);
    assert_artifact_exists(&result);
}

#[tokio::test]
async fn test_scenario_d_unsupported_duration_invokes_nothing() {
    let fx = Fixture::new();
    let store = fx.store();
    let registry = GeneratorRegistry::builder()
        .driver(fx.failing(RemoteApi))
        .driver(fx.placeholder())
        .build();
    let service = MediaService::new(
        Orchestrator::new(registry),
        Box::new(PlaceholderImageGenerator::new(store.images_dir())),
        VideoEditor::new("ffmpeg", store.edited_dir()),
        store,
    );

    let image = fx.request(5).image_path().to_path_buf();
    let mut params = VideoParams::new(image, "waves");
    params.settings = VideoSettings {
        duration: Some(7),
        ..VideoSettings::default()
    };

    let err = service.generate_video(params).await.unwrap_err();
    assert_eq!(err, ValidationError::UnsupportedDuration(7));
    assert!(fx.calls.list().is_empty());
}

#[tokio::test]
async fn test_failing_first_choice_records_fallback_with_two_calls() {
    let fx = Fixture::new();
    let registry = GeneratorRegistry::builder()
        .driver(fx.failing(BrowserAutomation))
        .driver(fx.placeholder())
        .build();
    let orchestrator = Orchestrator::new(registry);

    let result = orchestrator
        .generate(&fx.request(5), DispatchOptions::default())
        .await;

    let provenance = result.provenance().expect("success");
    assert_eq!(provenance.fallback_from, Some(BrowserAutomation));
    assert_eq!(provenance.generator_type, Placeholder);
    assert_eq!(fx.calls.list().len(), 2);
}

#[tokio::test]
async fn test_fallback_disabled_makes_exactly_one_call() {
    let fx = Fixture::new();
    let registry = GeneratorRegistry::builder()
        .driver(fx.failing(RemoteApi))
        .driver(fx.placeholder())
        .build();
    let orchestrator = Orchestrator::new(registry);

    let result = orchestrator
        .generate(&fx.request(5), DispatchOptions::default().without_fallback())
        .await;

    assert_eq!(result.error_message(), Some("klingai_api is down"));
    assert_eq!(fx.calls.list(), vec![RemoteApi]);
}

#[tokio::test]
async fn test_panicking_driver_becomes_failure_and_falls_back() {
    let fx = Fixture::new();
    let registry = GeneratorRegistry::builder()
        .driver(Box::new(Panicking {
            calls: fx.calls.clone(),
        }))
        .driver(fx.placeholder())
        .build();
    let orchestrator = Orchestrator::new(registry);

    let result = orchestrator
        .generate(&fx.request(5), DispatchOptions::requested(RemoteApi).without_fallback())
        .await;
    let error = result.error_message().expect("failure");
    assert!(error.contains("crashed"), "{}", error);
    assert!(error.contains("driver bug"), "{}", error);

    let result = orchestrator
        .generate(&fx.request(5), DispatchOptions::default())
        .await;
    assert!(result.is_success());
    assert_eq!(fx.calls.list(), vec![RemoteApi, RemoteApi, Placeholder]);
}

#[tokio::test]
async fn test_exhausted_failure_keeps_every_error() {
    let fx = Fixture::new();
    let registry = GeneratorRegistry::builder()
        .driver(fx.failing(RemoteApi))
        .driver(fx.failing(BrowserAutomation))
        .build();
    let orchestrator = Orchestrator::new(registry);

    match orchestrator
        .generate(&fx.request(5), DispatchOptions::default())
        .await
    {
        GenerationResult::Failure(failure) => {
            assert_eq!(failure.error, "klingai_web is down");
            assert_eq!(failure.previous_errors.len(), 1);
            assert_eq!(failure.previous_errors[0].error, "klingai_api is down");
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_placeholder_succeeds_without_input_image() {
    let fx = Fixture::new();
    let driver = PlaceholderVideoDriver::new(fx.store().videos_dir());
    let request = GenerationRequest::builder(fx.dir.path().join("absent.png"), "fog")
        .allow_missing_image()
        .build()
        .unwrap();

    let result = driver.generate(&request).await;
    assert_artifact_exists(&result);
    let artifact = result.artifact_ref().unwrap();
    assert!(artifact.file_name.starts_with("test_video_"));
    assert!(artifact.file_name.ends_with(".gif"));
}

fn config_with_all_credentials() -> AppConfig {
    let mut config = AppConfig::default();
    config.credentials = Credentials {
        kling_access_key: Some("ak".into()),
        kling_secret_key: Some("sk".into()),
        kling_email: Some("me@example.com".into()),
        kling_password: Some("pw".into()),
    };
    config
}

#[test]
fn test_registry_from_config_prefers_remote_api() {
    let fx = Fixture::new();
    let registry = GeneratorRegistry::from_config(&config_with_all_credentials(), &fx.store());
    assert_eq!(registry.kinds(), vec![RemoteApi, BrowserAutomation, Placeholder]);
    assert_eq!(registry.default_kind(), Some(RemoteApi));
}

#[test]
fn test_forced_placeholder_wins_over_credentials() {
    let fx = Fixture::new();
    let mut config = config_with_all_credentials();
    config.generators.forced = Some("placeholder".into());

    let registry = GeneratorRegistry::from_config(&config, &fx.store());
    assert!(registry.contains(RemoteApi));
    assert_eq!(registry.default_kind(), Some(Placeholder));
}

#[test]
fn test_placeholder_only_mode_registers_only_placeholder() {
    let fx = Fixture::new();
    let mut config = config_with_all_credentials();
    config.generators.use_placeholder = true;

    let registry = GeneratorRegistry::from_config(&config, &fx.store());
    assert_eq!(registry.kinds(), vec![Placeholder]);
}

#[test]
fn test_registry_without_credentials_has_placeholder() {
    let fx = Fixture::new();
    let registry = GeneratorRegistry::from_config(&AppConfig::default(), &fx.store());
    assert_eq!(registry.default_kind(), Some(Placeholder));
    assert_eq!(registry.status_report().available_generators, 1);
}

#[tokio::test]
async fn test_awaiting_manual_completion_is_distinguishable() {
    struct Primed;

    #[async_trait]
    impl VideoDriver for Primed {
        fn kind(&self) -> GeneratorKind {
            BrowserAutomation
        }

        async fn generate(&self, _request: &GenerationRequest) -> GenerationResult {
            GenerationResult::awaiting_manual_completion("ready in browser")
        }
    }

    let fx = Fixture::new();
    let orchestrator = Orchestrator::new(GeneratorRegistry::builder().driver(Box::new(Primed)).build());
    let result = orchestrator
        .generate(&fx.request(5), DispatchOptions::default())
        .await;

    assert!(result.is_success());
    assert!(result.artifact_ref().is_none());
    match result {
        GenerationResult::Success(success) => assert!(matches!(
            success.output,
            GenerationOutput::AwaitingManualCompletion { .. }
        )),
        other => panic!("unexpected {:?}", other),
    }
}
