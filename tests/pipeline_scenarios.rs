//! End-to-end pipeline scenarios
//!
//! These run the full decode, operation and encode path against synthetic
//! sources with the deterministic fixture remover standing in for the
//! segmentation service.

mod common;

use common::{
    blue_bias, decode_rgba, fixture_processor, portrait_jpeg, portrait_png,
    portrait_png_with_profile, processor_with, ring_pixels,
};
use image::{ImageDecoder, ImageReader};
use pfpgen::{
    backends::mock::{FailingRemover, FixtureRemover, SlowRemover},
    parse_operations_str, Adjustment, Dimensions, ErrorKind, FilterPreset, Operation,
    OutputFormat, PipelineConfig, PipelineStage, Platform, ProcessRequest, Shape, ShapeSpec,
    SocialTarget,
};
use serde_json::json;
use std::{io::Cursor, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

const FULL_PIPELINE: &str = r##"[
    "removeBackground",
    {"adjustments": {"brightness": 10, "contrast": 5}},
    {"filter": "warm"},
    {"addBackground": {"type": "color", "value": "#336699"}},
    {"cropToShape": {"shape": "circle", "size": 400}}
]"##;

fn icc_of(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .unwrap()
        .into_decoder()
        .unwrap();
    decoder.icc_profile().unwrap()
}

#[tokio::test]
async fn test_full_pipeline_produces_circular_avatar() {
    let (processor, remover) = fixture_processor();
    let source = portrait_jpeg(800, 600);
    let operations = parse_operations_str(FULL_PIPELINE).unwrap();

    let result = processor.process_bytes(&source, &operations).await.unwrap();
    assert_eq!(result.format, OutputFormat::Png);
    assert_eq!(result.dimensions, Dimensions::square(400));
    assert_eq!(remover.call_count(), 1);
    assert_eq!(result.metadata.operation_count, 5);

    let output = decode_rgba(&result.bytes);
    assert_eq!(output.dimensions(), (400, 400));

    // Corners lie outside the circle
    for (x, y) in [(0, 0), (399, 0), (0, 399), (399, 399)] {
        assert_eq!(output.get_pixel(x, y).0[3], 0, "corner ({}, {})", x, y);
    }
    assert!(ring_pixels(&output, 203.0, 300.0).iter().all(|p| p[3] == 0));

    // Inside the circle everything is opaque
    let inside = ring_pixels(&output, 0.0, 196.0);
    assert!(inside.iter().all(|p| p[3] == 255));

    // The subject disk maps to radius 160; the ring around it is the backdrop
    for pixel in ring_pixels(&output, 172.0, 194.0) {
        assert!((i16::from(pixel[0]) - 0x33).abs() <= 6, "{:?}", pixel);
        assert!((i16::from(pixel[1]) - 0x66).abs() <= 6, "{:?}", pixel);
        assert!((i16::from(pixel[2]) - 0x99).abs() <= 6, "{:?}", pixel);
    }

    // The subject itself is still warm
    let center = output.get_pixel(200, 200).0;
    assert_eq!(center[3], 255);
    assert!(center[0] > center[2]);
}

#[tokio::test]
async fn test_full_pipeline_shifts_toward_blue() {
    let (processor, _) = fixture_processor();
    let source = portrait_jpeg(800, 600);

    let plain = processor
        .process_bytes(
            &source,
            &[Operation::CropToShape(ShapeSpec::new(Shape::Circle, 400).unwrap())],
        )
        .await
        .unwrap();
    let styled = processor
        .process_bytes(&source, &parse_operations_str(FULL_PIPELINE).unwrap())
        .await
        .unwrap();

    let plain = decode_rgba(&plain.bytes);
    let styled = decode_rgba(&styled.bytes);
    let before = blue_bias(&ring_pixels(&plain, 0.0, 196.0));
    let after = blue_bias(&ring_pixels(&styled, 0.0, 196.0));
    assert!(
        after - before > 20.0,
        "expected a blue shift, got {} -> {}",
        before,
        after
    );
}

#[tokio::test]
async fn test_pipeline_is_deterministic() {
    let source = portrait_jpeg(320, 240);
    let operations = parse_operations_str(
        r##"["removeBackground",
            {"adjustments": {"saturation": 20, "hue": 15, "sharpening": 1.2}},
            {"filter": "vintage"},
            {"addBackground": {"type": "gradient", "value": "#ff8800 0%, #0088ff 100%"}},
            {"cropToShape": {"shape": "star", "size": 200}},
            {"applyTemplate": {"platform": "instagram"}}]"##,
    )
    .unwrap();

    let (first_processor, _) = fixture_processor();
    let (second_processor, _) = fixture_processor();

    let (first, second) = tokio::join!(
        first_processor.process_bytes(&source, &operations),
        second_processor.process_bytes(&source, &operations),
    );
    let first = first.unwrap();
    let second = second.unwrap();
    let third = first_processor
        .process_bytes(&source, &operations)
        .await
        .unwrap();

    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.bytes, third.bytes);
    assert_eq!(first.digest(), third.digest());
}

#[tokio::test]
async fn test_out_of_domain_adjustment_fails_without_output() {
    let err = parse_operations_str(r#"[{"adjustments": {"contrast": 500}}]"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(err.operation_index(), Some(0));

    let (processor, remover) = fixture_processor();
    let bad = Adjustment {
        contrast: Some(500.0),
        ..Adjustment::default()
    };
    let err = processor
        .process_bytes(&portrait_png(64, 64), &[Operation::Adjustments(bad)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(err.operation_index(), Some(0));
    assert!(err.to_string().contains("operation #0"));
    assert_eq!(remover.call_count(), 0);
}

#[tokio::test]
async fn test_remover_failure_stops_pipeline() {
    let processor = processor_with(
        Arc::new(FailingRemover::new("model overloaded")),
        PipelineConfig::default(),
    );
    let operations = [
        Operation::Filter(FilterPreset::Soft),
        Operation::RemoveBackground,
        Operation::CropToShape(ShapeSpec::new(Shape::Circle, 64).unwrap()),
    ];

    let err = processor
        .process_bytes(&portrait_png(96, 96), &operations)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
    assert_eq!(err.operation_index(), Some(1));
    assert!(err.message().contains("model overloaded"));
}

#[tokio::test]
async fn test_remover_timeout_is_reported() {
    let config = PipelineConfig::builder()
        .removal_timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let processor = processor_with(Arc::new(SlowRemover::new(Duration::from_secs(5))), config);

    let err = processor
        .process_bytes(&portrait_png(32, 32), &[Operation::RemoveBackground])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceTimeout);
    assert_eq!(err.operation_index(), Some(0));
}

#[tokio::test]
async fn test_cancellation_discards_in_flight_stage() {
    let processor = processor_with(
        Arc::new(SlowRemover::new(Duration::from_millis(300))),
        PipelineConfig::default(),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let operations = [
        Operation::RemoveBackground,
        Operation::Filter(FilterPreset::Dramatic),
    ];
    let err = processor
        .process_bytes_with_cancellation(&portrait_png(32, 32), &operations, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(err.operation_index(), Some(0));
}

#[tokio::test]
async fn test_process_request_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("upload.png");
    std::fs::write(&source_path, portrait_png(300, 200)).unwrap();
    let backdrop_path = dir.path().join("backdrop.png");
    std::fs::write(&backdrop_path, portrait_png(50, 50)).unwrap();

    let request = ProcessRequest {
        image_url: source_path.to_string_lossy().to_string(),
        operations: vec![
            json!("removeBackground"),
            json!({"addBackground": {
                "type": "image",
                "value": backdrop_path.to_string_lossy(),
                "blur": 2.0
            }}),
            json!({"cropToShape": {"shape": "square", "size": 150}}),
        ],
    };

    let (processor, remover) = fixture_processor();
    let result = processor.process_request(&request).await.unwrap();
    assert_eq!(result.dimensions, Dimensions::square(150));
    assert_eq!(remover.call_count(), 1);

    // The image backdrop fills the canvas, so the square crop is fully opaque
    let output = decode_rgba(&result.bytes);
    assert!(output.pixels().all(|p| p.0[3] == 255));
}

#[tokio::test]
async fn test_process_request_failures() {
    let (processor, remover) = fixture_processor();

    let missing = ProcessRequest {
        image_url: "/definitely/not/here.png".to_string(),
        operations: vec![json!({"filter": "cool"})],
    };
    let err = processor.process_request(&missing).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(err.stage, PipelineStage::SourceLoad);

    // Operations are rejected before the source is even looked at
    let bad_ops = ProcessRequest {
        image_url: "/definitely/not/here.png".to_string(),
        operations: vec![json!("removeBackground"), json!({"filter": "rainbow"})],
    };
    let err = processor.process_request(&bad_ops).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownFilter);
    assert_eq!(err.operation_index(), Some(1));
    assert_eq!(remover.call_count(), 0);
}

#[tokio::test]
async fn test_missing_background_image_is_source_unavailable() {
    let (processor, _) = fixture_processor();
    let operations = parse_operations_str(
        r#"[{"addBackground": {"type": "image", "value": "/nope/backdrop.jpg"}}]"#,
    )
    .unwrap();

    let err = processor
        .process_bytes(&portrait_png(40, 40), &operations)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(err.operation_index(), Some(0));
}

#[tokio::test]
async fn test_template_overrides_apply() {
    let config = PipelineConfig::builder()
        .template_size(Platform::Instagram, Dimensions::new(320, 320))
        .build()
        .unwrap();
    let processor = processor_with(Arc::new(FixtureRemover::new()), config);

    let operations = [
        Operation::CropToShape(ShapeSpec::new(Shape::Circle, 128).unwrap()),
        Operation::ApplyTemplate(SocialTarget {
            platform: Platform::Instagram,
        }),
    ];
    let result = processor
        .process_bytes(&portrait_png(200, 200), &operations)
        .await
        .unwrap();
    assert_eq!(result.dimensions, Dimensions::square(320));

    let operations = [Operation::ApplyTemplate(SocialTarget {
        platform: Platform::LinkedIn,
    })];
    let result = processor
        .process_bytes(&portrait_png(200, 100), &operations)
        .await
        .unwrap();
    assert_eq!(result.dimensions, Dimensions::square(400));
}

#[tokio::test]
async fn test_color_profile_round_trip() {
    let icc = common::fake_srgb_profile();
    let source = portrait_png_with_profile(64, 64, icc.clone());
    assert_eq!(icc_of(&source).as_deref(), Some(icc.as_slice()));

    let operations = [
        Operation::Filter(FilterPreset::Professional),
        Operation::CropToShape(ShapeSpec::new(Shape::RoundedSquare, 48).unwrap()),
    ];

    let (processor, _) = fixture_processor();
    let result = processor.process_bytes(&source, &operations).await.unwrap();
    assert_eq!(icc_of(&result.bytes).as_deref(), Some(icc.as_slice()));

    let config = PipelineConfig::builder()
        .preserve_color_profiles(false)
        .build()
        .unwrap();
    let processor = processor_with(Arc::new(FixtureRemover::new()), config);
    let result = processor.process_bytes(&source, &operations).await.unwrap();
    assert!(icc_of(&result.bytes).is_none());
}

#[tokio::test]
async fn test_output_formats() {
    let source = portrait_png(120, 120);
    let operations = [Operation::CropToShape(
        ShapeSpec::new(Shape::Heart, 100).unwrap(),
    )];

    let config = PipelineConfig::builder()
        .output_format(OutputFormat::Jpeg)
        .jpeg_quality(80)
        .build()
        .unwrap();
    let processor = processor_with(Arc::new(FixtureRemover::new()), config);
    let result = processor.process_bytes(&source, &operations).await.unwrap();
    assert_eq!(result.format, OutputFormat::Jpeg);
    assert_eq!(
        image::guess_format(&result.bytes).unwrap(),
        image::ImageFormat::Jpeg
    );
    // Transparent corners are flattened onto white
    let corner = decode_rgba(&result.bytes).get_pixel(0, 0).0;
    assert!(corner[0] > 240 && corner[1] > 240 && corner[2] > 240);

    let config = PipelineConfig::builder()
        .output_format(OutputFormat::WebP)
        .build()
        .unwrap();
    let processor = processor_with(Arc::new(FixtureRemover::new()), config);
    let result = processor.process_bytes(&source, &operations).await.unwrap();
    assert_eq!(
        image::guess_format(&result.bytes).unwrap(),
        image::ImageFormat::WebP
    );
    let decoded = decode_rgba(&result.bytes);
    assert_eq!(decoded.dimensions(), (100, 100));
    assert_eq!(decoded.get_pixel(0, 0).0[3], 0);
}
