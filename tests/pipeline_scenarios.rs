//! End-to-end behavior of capture, optimize and validate

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use mailpreview::config::{CaptureOptions, CaptureOverrides, ScreenshotConfig};
use mailpreview::optimize::optimize_with_report;
use mailpreview::rendering::codec;
use mailpreview::rendering::images::{FetchedImage, ImageSource};
use mailpreview::rewrite::external_image_sources;
use mailpreview::surface::{Container, Document};
use mailpreview::{
    validate, Capturer, Error, ImageFormat, Rasterizer, ScreenshotData, ScreenshotPipeline, SoftwareRasterizer,
    ValidationFailure,
};

/// Image host that accepts the request and never answers
struct NeverLoads;

#[async_trait]
impl ImageSource for NeverLoads {
    async fn fetch(&self, _url: &str) -> mailpreview::Result<FetchedImage> {
        futures::future::pending::<()>().await;
        unreachable!("pending never resolves")
    }
}

/// Rasterizer failing its first `failures` calls and recording what it saw
struct FlakyRasterizer {
    failures: usize,
    calls: AtomicUsize,
    document: Document,
    attached_during_call: Mutex<Vec<usize>>,
    contents: Mutex<Vec<String>>,
}

impl FlakyRasterizer {
    fn new(failures: usize, document: Document) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
            document,
            attached_during_call: Mutex::new(Vec::new()),
            contents: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Rasterizer for FlakyRasterizer {
    async fn rasterize(&self, container: &Container, options: &CaptureOptions) -> mailpreview::Result<ScreenshotData> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.attached_during_call
            .lock()
            .unwrap()
            .push(self.document.attached_count());
        self.contents.lock().unwrap().push(container.content.clone());
        if n < self.failures {
            return Err(Error::RenderError(format!("simulated failure #{}", n + 1)));
        }
        let img = RgbaImage::from_pixel(64, 32, Rgba([250, 250, 250, 255]));
        let bytes = codec::encode(&img, options.format, options.quality)?;
        Ok(ScreenshotData::from_encoded(&bytes, options.format, 64, 32))
    }
}

const REMOTE_TEMPLATE: &str =
    r#"<h1>News</h1><img src="https://cdn.example.com/hero.png" width="300" height="100"><p>Body</p>"#;

#[tokio::test]
async fn plain_paragraph_at_defaults() {
    let pipeline = ScreenshotPipeline::new(SoftwareRasterizer::offline());
    let preview = pipeline
        .capture_validated("<p>Hello</p>", &CaptureOverrides::default())
        .await
        .expect("capture");
    assert_eq!(preview.mime_type, "image/png");
    assert!(preview.width <= 1200);
    assert!(preview.height <= 1600);
    assert!(preview.size <= 1_048_576);
}

#[tokio::test(start_paused = true)]
async fn stalled_image_times_out_and_capture_succeeds() {
    let rasterizer = SoftwareRasterizer::new(Arc::new(NeverLoads));
    let capturer = Capturer::new(rasterizer);
    let started = tokio::time::Instant::now();

    let shot = capturer
        .capture_html(
            r#"<p>Before</p><img src="https://blocked.example/x.png"><p>After</p>"#,
            &CaptureOverrides::default(),
        )
        .await
        .expect("capture should fall back to a placeholder");

    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(shot.format, ImageFormat::Png);
    assert!(shot.width <= 1200 && shot.height <= 1600);
    assert_eq!(capturer.document().attached_count(), 0);
}

#[test]
fn oversized_capture_is_fitted_then_validated() {
    let big = RgbaImage::from_fn(3000, 4000, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255]));
    let bytes = codec::encode(&big, ImageFormat::Png, 0.92).unwrap();
    let mut shot = ScreenshotData::from_encoded(&bytes, ImageFormat::Png, 3000, 4000);
    shot.size = 2_000_000;

    let config = ScreenshotConfig::default();
    let report = optimize_with_report(shot, &config).unwrap();
    assert!(report.resized);
    assert!(report.data.width <= 1200 && report.data.height <= 1600);

    match validate(&report.data, &config) {
        Ok(v) => assert!(v.size <= 1_048_576),
        Err(ValidationFailure::TooLarge { size, max_size }) => assert!(size > max_size),
        Err(other) => panic!("unexpected validation failure: {}", other),
    }
}

#[tokio::test]
async fn failed_capture_retries_once_with_cors_safe_markup() {
    let document = Document::new();
    let rasterizer = Arc::new(FlakyRasterizer::new(1, document.clone()));
    let capturer = Capturer::with_document(rasterizer.clone(), document.clone());

    let shot = capturer
        .capture_html(REMOTE_TEMPLATE, &CaptureOverrides::default())
        .await
        .expect("retry should succeed");
    assert_eq!((shot.width, shot.height), (64, 32));

    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 2);
    assert_eq!(*rasterizer.attached_during_call.lock().unwrap(), vec![1, 1]);
    let contents = rasterizer.contents.lock().unwrap();
    assert_eq!(contents[0], REMOTE_TEMPLATE);
    assert!(external_image_sources(&contents[1]).is_empty());
    assert!(contents[1].contains("Image"));
    assert_eq!(document.attached_count(), 0);
}

#[tokio::test]
async fn failed_retry_reports_both_errors_and_cleans_up() {
    let document = Document::new();
    let rasterizer = Arc::new(FlakyRasterizer::new(usize::MAX, document.clone()));
    let capturer = Capturer::with_document(rasterizer.clone(), document.clone());

    let err = capturer
        .capture_html(REMOTE_TEMPLATE, &CaptureOverrides::default())
        .await
        .unwrap_err();
    match &err {
        Error::CaptureFailed { original, fallback } => {
            assert!(original.contains("#1"));
            assert!(fallback.contains("#2"));
        }
        other => panic!("expected CaptureFailed, got {:?}", other),
    }
    assert!(err.is_capture_failure());
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 2);
    assert_eq!(document.attached_count(), 0);
}

#[tokio::test]
async fn pipeline_surfaces_capture_failure() {
    let document = Document::new();
    let rasterizer = FlakyRasterizer::new(usize::MAX, document.clone());
    let pipeline = ScreenshotPipeline::with_document(rasterizer, ScreenshotConfig::default(), document.clone());
    let err = pipeline
        .capture_validated("<p>x</p>", &CaptureOverrides::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CaptureFailed { .. }));
    assert_eq!(document.attached_count(), 0);
}
