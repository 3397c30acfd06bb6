//! Integration tests for the art QR pipeline

use image::{Rgba, RgbaImage};
use proptest::prelude::*;
use qr_art_core::events::NullSink;
use qr_art_core::provider::ProviderFuture;
use qr_art_core::{
    export, ArtQrPipeline, Background, BackgroundRequest, BackgroundSource, Color, Compositor, EncodingRequest,
    ArtStyle, ErrorCorrectionLevel, ErrorKind, EventSink, ExportError, ExportFormat, FetchConfig, GeneratedImage,
    GenerationRequest, GenerationSession, Gradient, ImageProvider, PipelineConfig, PipelineEvent,
    PollinationsProvider, ProviderError, QrArtError, ScanVerifier,
};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// Приёмник, сохраняющий события
#[derive(Default)]
struct CollectingSink(Mutex<Vec<PipelineEvent>>);

impl CollectingSink {
    fn events(&self) -> Vec<PipelineEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl EventSink for CollectingSink {
    fn report(&self, event: &PipelineEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

/// Провайдер с заранее заданным ответом
struct FixedProvider(Result<GeneratedImage, ProviderError>);

impl ImageProvider for FixedProvider {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn generate<'a>(&'a self, _prompt: &'a str) -> ProviderFuture<'a> {
        let answer = self.0.clone();
        Box::pin(async move { answer })
    }
}

/// Провайдер, который никогда не отвечает
struct HangingProvider;

impl ImageProvider for HangingProvider {
    fn name(&self) -> &'static str {
        "hanging"
    }

    fn generate<'a>(&'a self, _prompt: &'a str) -> ProviderFuture<'a> {
        Box::pin(std::future::pending())
    }
}

fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn http_response(body: &[u8], extra_headers: &str) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n",
        body.len(),
        extra_headers
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

/// Локальный HTTP-сервер с фиксированным ответом
async fn serve(response: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}/bg.png", addr)
}

/// Сервер, который принимает соединение и молчит
async fn serve_silence() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                drop(socket);
            });
        }
    });
    format!("http://{}/slow.png", addr)
}

fn pipeline(fetch: FetchConfig) -> ArtQrPipeline {
    let config = PipelineConfig {
        fetch,
        verify_scan: true,
        ..PipelineConfig::default()
    };
    ArtQrPipeline::new(config).unwrap()
}

fn quick_fetch() -> FetchConfig {
    FetchConfig {
        timeout_ms: 300,
        connect_timeout_ms: 300,
        ..FetchConfig::default()
    }
}

#[test]
fn test_round_trip_over_gradient() {
    init_logger();
    let request = EncodingRequest::new(
        "https://example.com",
        ErrorCorrectionLevel::H,
        Color::from_hex("#000000").unwrap(),
        Color::from_hex("#FFFFFFFF").unwrap(),
    );
    let background = Background::from_gradient(&Gradient::default(), 512);

    let result = Compositor::default().art(&request, Some(&background)).unwrap();
    assert_eq!((result.width(), result.height()), (512, 512));

    let scanned = ScanVerifier::new().verify(&result, "https://example.com").unwrap();
    assert_eq!(scanned.content, "https://example.com");
}

#[test]
fn test_over_capacity_payload() {
    let payload = "a".repeat(2000);
    let err = Compositor::default().art(&EncodingRequest::art(payload), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
}

#[test]
fn test_empty_payload() {
    let err = Compositor::default().art(&EncodingRequest::art(""), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

fn assert_scans_back(payload: &str) {
    let background = Background::from_gradient(&Gradient::default(), 512);
    let result = Compositor::default()
        .art(&EncodingRequest::art(payload), Some(&background))
        .unwrap();
    let scanned = ScanVerifier::new().verify(&result, payload).unwrap();
    assert_eq!(scanned.content, payload, "{} bytes", payload.len());
}

#[test]
fn test_dense_payloads_scan_back() {
    init_logger();
    // От средних версий до предела уровня H (1273 байта)
    for len in [530, 745, 800, 1000, 1273] {
        let payload: String = (0..len).map(|i| (b'!' + (i % 90) as u8) as char).collect();
        assert_scans_back(&payload);
    }
}

#[test]
fn test_every_style_preset_scans() {
    let background = Background::from_gradient(&Gradient::default(), 512);
    for style in ArtStyle::ALL {
        let request = EncodingRequest::styled("https://example.com", style);
        let result = Compositor::default().art(&request, Some(&background)).unwrap();
        let scanned = ScanVerifier::new().verify(&result, "https://example.com");
        assert!(scanned.is_ok(), "{:?}: {:?}", style, scanned);
    }
}

#[test]
fn test_inverted_colors_are_rejected() {
    let request = EncodingRequest::new("inverted", ErrorCorrectionLevel::H, Color::WHITE, Color::BLACK);
    let err = Compositor::default().art(&request, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_ascii_output_scans_back(payload in "[!-~][ -~]{0,1272}") {
        assert_scans_back(&payload);
    }

    #[test]
    fn prop_unicode_output_scans_back(payload in "[^\\s\\p{C}]\\PC{0,300}") {
        // До 301 символа по 4 байта: не больше ёмкости уровня H
        prop_assume!(payload.len() <= 1273);
        assert_scans_back(&payload);
    }
}

#[tokio::test]
async fn test_gradient_source_is_verified() {
    init_logger();
    let sink = Arc::new(CollectingSink::default());
    let pipeline = pipeline(FetchConfig::default()).with_sink(sink.clone());

    let request = GenerationRequest::new(
        EncodingRequest::art("https://example.com/menu"),
        BackgroundRequest::Source {
            source: BackgroundSource::Gradient(Gradient::default()),
        },
    );
    let generation = pipeline.generate(&request).await.unwrap();
    assert!(generation.background_error.is_none());
    assert_eq!(generation.scan.unwrap().content, "https://example.com/menu");

    let events = sink.events();
    assert!(events.contains(&PipelineEvent::BackgroundResolved { source: "gradient".to_string() }));
    assert!(events.iter().any(|e| matches!(e, PipelineEvent::Composed { width: 512, .. })));
}

#[tokio::test]
async fn test_external_image_is_used() {
    let url = serve(http_response(&png_bytes(512, 512, [20, 120, 40, 255]), "")).await;
    let request = GenerationRequest::new(
        EncodingRequest::art("external"),
        BackgroundRequest::Source {
            source: BackgroundSource::ExternalImage { url },
        },
    );

    let generation = pipeline(quick_fetch()).generate(&request).await.unwrap();
    assert!(generation.background_error.is_none());
    assert_eq!(generation.result.image().get_pixel(2, 2).0, [20, 120, 40, 255]);
    assert!(export(&generation.result, ExportFormat::Png).is_ok());
}

#[tokio::test]
async fn test_fetch_timeout_falls_back_to_gradient() {
    init_logger();
    let url = serve_silence().await;
    let sink = Arc::new(CollectingSink::default());
    let pipeline = pipeline(quick_fetch()).with_sink(sink.clone());

    let request = GenerationRequest::new(
        EncodingRequest::art("still scannable"),
        BackgroundRequest::Source {
            source: BackgroundSource::ExternalImage { url },
        },
    );

    let started = std::time::Instant::now();
    let generation = pipeline.generate(&request).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    let err = generation.background_error.expect("fallback expected");
    assert_eq!(ErrorKind::from(&err), ErrorKind::Fetch);
    assert_eq!(generation.scan.unwrap().content, "still scannable");

    let fallback = Background::from_gradient(&Gradient::default(), 512);
    assert_eq!(generation.result.image().get_pixel(2, 2), fallback.image().get_pixel(2, 2));
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, PipelineEvent::BackgroundFallback { kind: ErrorKind::Fetch, .. })));
}

#[tokio::test]
async fn test_undecodable_background() {
    let url = serve(http_response(b"<html>not an image</html>", "")).await;
    let request = GenerationRequest::new(
        EncodingRequest::art("decode fallback"),
        BackgroundRequest::Source {
            source: BackgroundSource::ExternalImage { url },
        },
    );

    let generation = pipeline(quick_fetch()).generate(&request).await.unwrap();
    let err = generation.background_error.unwrap();
    assert_eq!(ErrorKind::from(&err), ErrorKind::Decode);
}

#[tokio::test]
async fn test_cross_origin_background_blocks_export() {
    let body = png_bytes(16, 16, [200, 200, 10, 255]);
    let config = FetchConfig {
        enforce_cors: true,
        ..quick_fetch()
    };

    let tainted_url = serve(http_response(&body, "")).await;
    let request = GenerationRequest::new(
        EncodingRequest::art("tainted"),
        BackgroundRequest::Source {
            source: BackgroundSource::ExternalImage { url: tainted_url },
        },
    );
    let generation = pipeline(config.clone()).generate(&request).await.unwrap();
    assert!(!generation.result.origin_clean());
    assert_eq!(export(&generation.result, ExportFormat::Png), Err(ExportError::Blocked));

    let foreign_url = serve(http_response(&body, "Access-Control-Allow-Origin: https://other.example\r\n")).await;
    let request = GenerationRequest::new(
        EncodingRequest::art("foreign"),
        BackgroundRequest::Source {
            source: BackgroundSource::ExternalImage { url: foreign_url },
        },
    );
    let generation = pipeline(config.clone()).generate(&request).await.unwrap();
    assert!(!generation.result.origin_clean());
    assert_eq!(export(&generation.result, ExportFormat::Png), Err(ExportError::Blocked));

    let clean_url = serve(http_response(&body, "Access-Control-Allow-Origin: *\r\n")).await;
    let request = GenerationRequest::new(
        EncodingRequest::art("clean"),
        BackgroundRequest::Source {
            source: BackgroundSource::ExternalImage { url: clean_url },
        },
    );
    let generation = pipeline(config).generate(&request).await.unwrap();
    assert!(generation.result.origin_clean());
    assert!(export(&generation.result, ExportFormat::Jpeg).is_ok());
}

#[tokio::test]
async fn test_pollinations_against_local_server() {
    let url = serve(http_response(&png_bytes(512, 512, [90, 10, 160, 255]), "")).await;
    let base = url.trim_end_matches("/bg.png").to_string();
    let pipeline = pipeline(quick_fetch()).with_provider(PollinationsProvider::new().with_base_url(base));

    let request = GenerationRequest::new(
        EncodingRequest::art("https://example.com/ai"),
        BackgroundRequest::Ai {
            prompt: "cherry blossoms".to_string(),
            style: ArtStyle::Watercolor,
            required: true,
        },
    );
    let generation = pipeline.generate(&request).await.unwrap();
    assert!(generation.background_error.is_none());
    assert_eq!(generation.result.image().get_pixel(1, 1).0, [90, 10, 160, 255]);
}

#[tokio::test]
async fn test_optional_ai_failure_falls_back() {
    let pipeline = pipeline(FetchConfig::default())
        .with_provider(FixedProvider(Err(ProviderError::RateLimited { status: 429 })));
    let request = GenerationRequest::new(
        EncodingRequest::art("rate limited"),
        BackgroundRequest::Ai {
            prompt: "sunset".to_string(),
            style: Default::default(),
            required: false,
        },
    );

    let generation = pipeline.generate(&request).await.unwrap();
    assert_eq!(ErrorKind::from(&generation.background_error.unwrap()), ErrorKind::Provider);
}

#[tokio::test]
async fn test_missing_provider() {
    let request = GenerationRequest::new(
        EncodingRequest::art("no provider"),
        BackgroundRequest::Ai {
            prompt: "forest".to_string(),
            style: Default::default(),
            required: true,
        },
    );
    let err = pipeline(FetchConfig::default()).generate(&request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
}

#[tokio::test]
async fn test_required_ai_failure_keeps_last_result() {
    let pipeline = ArtQrPipeline::new(PipelineConfig::default())
        .unwrap()
        .with_sink(Arc::new(NullSink))
        .with_provider(FixedProvider(Err(ProviderError::Unauthorized { status: 401 })));
    let session = GenerationSession::new(pipeline);

    let ok = GenerationRequest::new(EncodingRequest::art("first"), BackgroundRequest::None);
    let first = session.generate(&ok).await.unwrap();

    let failing = GenerationRequest::new(
        EncodingRequest::art("second"),
        BackgroundRequest::Ai {
            prompt: "ocean".to_string(),
            style: Default::default(),
            required: true,
        },
    );
    let err = session.generate(&failing).await.unwrap_err();
    assert!(matches!(err, QrArtError::Background(_)));
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert_eq!(session.last().unwrap().result, first.result);
}

#[tokio::test]
async fn test_concurrent_generation_is_busy() {
    let pipeline = ArtQrPipeline::new(PipelineConfig::default())
        .unwrap()
        .with_provider(HangingProvider);
    let session = Arc::new(GenerationSession::new(pipeline));

    let slow = GenerationRequest::new(
        EncodingRequest::art("slow"),
        BackgroundRequest::Ai {
            prompt: "mountains".to_string(),
            style: Default::default(),
            required: false,
        },
    );
    let background = {
        let session = session.clone();
        tokio::spawn(async move { session.generate(&slow).await })
    };

    while !session.is_busy() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let quick = GenerationRequest::new(EncodingRequest::art("quick"), BackgroundRequest::None);
    assert_eq!(session.generate(&quick).await.unwrap_err(), QrArtError::Busy);

    // Отмена: задача прерывается, сессия снова свободна
    background.abort();
    let _ = background.await;
    assert!(!session.is_busy());
    assert!(session.generate(&quick).await.is_ok());
}

#[tokio::test]
async fn test_openai_error_mapping() {
    use qr_art_core::provider::{OpenAiConfig, OpenAiProvider};

    let body = br#"{"error":{"message":"Rate limit reached for images","type":"requests"}}"#;
    let mut response = format!(
        "HTTP/1.1 429 Too Many Requests\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    let endpoint = serve(response).await;

    let provider = OpenAiProvider::with_config(
        "sk-test",
        OpenAiConfig {
            endpoint,
            timeout_ms: 2_000,
            ..OpenAiConfig::default()
        },
    );
    let err = provider.generate("a lighthouse").await.unwrap_err();
    assert_eq!(err, ProviderError::RateLimited { status: 429 });
}
