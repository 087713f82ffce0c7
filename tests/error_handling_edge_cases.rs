//! Error handling and edge case tests
//!
//! Covers malformed operation lists, unknown names, configuration limits and
//! degenerate images.

mod common;

use common::{decode_rgba, fixture_processor, portrait_png, processor_with};
use pfpgen::{
    backends::mock::FixtureRemover, generate_from_bytes, parse_operations, parse_operations_str,
    Dimensions, ErrorKind, Operation, OperationKind, OutputFormat, PipelineConfig, PipelineStage,
    Platform, ProcessingStatus, UnavailableRemover,
};
use serde_json::json;
use std::{io::Write, sync::Arc};

#[test]
fn test_unknown_names_report_kind_and_index() {
    let cases = [
        (r#"[{"filter": "warm"}, {"filter": "rainbow"}]"#, ErrorKind::UnknownFilter, 1),
        (
            r#"[{"cropToShape": {"shape": "triangle", "size": 100}}]"#,
            ErrorKind::InvalidShape,
            0,
        ),
        (
            r#"["removeBackground", {"filter": "soft"}, {"applyTemplate": {"platform": "myspace"}}]"#,
            ErrorKind::UnknownPlatform,
            2,
        ),
        (
            r#"[{"addBackground": {"type": "hologram", "value": "x"}}]"#,
            ErrorKind::InvalidBackgroundType,
            0,
        ),
    ];

    for (json, kind, index) in cases {
        let err = parse_operations_str(json).unwrap_err();
        assert_eq!(err.kind(), kind, "{}", json);
        assert_eq!(err.operation_index(), Some(index), "{}", json);
        assert!(matches!(err.stage, PipelineStage::Operation { .. }));
    }
}

#[test]
fn test_error_message_lists_accepted_values() {
    let err = parse_operations_str(r#"[{"filter": "rainbow"}]"#).unwrap_err();
    let message = err.message();
    assert!(message.contains("rainbow"));
    assert!(message.contains("vintage"));
}

#[test]
fn test_malformed_operations_are_parse_errors() {
    let err = parse_operations(&[json!("removeBackground"), json!({"explode": true})]).unwrap_err();
    assert_eq!(err.stage, PipelineStage::Parse { index: 1 });
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = parse_operations(&[json!({"adjustments": {"brightness": "loud"}})]).unwrap_err();
    assert_eq!(err.stage, PipelineStage::Parse { index: 0 });

    let err = parse_operations(&[json!({"adjustments": {"vibrance": 3}})]).unwrap_err();
    assert_eq!(err.stage, PipelineStage::Parse { index: 0 });

    let err = parse_operations_str(r#"{"filter": "warm"}"#).unwrap_err();
    assert_eq!(err.stage, PipelineStage::Parse { index: 0 });
}

#[test]
fn test_out_of_domain_values() {
    let cases = [
        (r#"[{"adjustments": {"brightness": -101}}]"#, OperationKind::Adjustments),
        (r#"[{"adjustments": {"saturation": 150}}]"#, OperationKind::Adjustments),
        (r#"[{"adjustments": {"gamma": 0}}]"#, OperationKind::Adjustments),
        (r#"[{"adjustments": {"blur": -1}}]"#, OperationKind::Adjustments),
        (r#"[{"cropToShape": {"shape": "circle", "size": 0}}]"#, OperationKind::CropToShape),
        (
            r##"[{"addBackground": {"type": "color", "value": "#12345"}}]"##,
            OperationKind::AddBackground,
        ),
        (
            r#"[{"addBackground": {"type": "image", "value": "a.png", "blur": -2}}]"#,
            OperationKind::AddBackground,
        ),
        (r#"[{"adjustments": {"blur": 1e9}}]"#, OperationKind::Adjustments),
        (r#"[{"adjustments": {"sharpening": 1001}}]"#, OperationKind::Adjustments),
        (
            r#"[{"addBackground": {"type": "image", "value": "a.png", "blur": 1e9}}]"#,
            OperationKind::AddBackground,
        ),
        (
            r#"[{"addBackground": {"type": "color", "value": "white", "width": 4294967295, "height": 4294967295}}]"#,
            OperationKind::AddBackground,
        ),
        (
            r#"[{"addBackground": {"type": "color", "value": "white", "width": 100000, "height": 100000}}]"#,
            OperationKind::AddBackground,
        ),
    ];

    for (json, operation) in cases {
        let err = parse_operations_str(json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{}", json);
        assert_eq!(
            err.stage,
            PipelineStage::Operation {
                index: 0,
                operation
            },
            "{}",
            json
        );
    }
}

#[test]
fn test_boundary_values_are_accepted() {
    let ops = parse_operations_str(
        r#"[{"adjustments": {"brightness": -100, "contrast": 100, "saturation": -100, "hue": 360}},
            {"filter": {"name": "none"}},
            {"cropToShape": {"shape": "rounded", "size": 1}}]"#,
    )
    .unwrap();
    assert_eq!(ops.len(), 3);
}

#[tokio::test]
async fn test_oversized_background_fails_before_any_stage() {
    let (processor, remover) = fixture_processor();
    let mut ops = parse_operations(&[
        json!("removeBackground"),
        json!({"addBackground": {"type": "color", "value": "white"}}),
    ])
    .unwrap();
    if let Operation::AddBackground(spec) = &mut ops[1] {
        spec.width = Some(u32::MAX);
        spec.height = Some(u32::MAX);
    }

    let err = processor
        .process_bytes(&portrait_png(16, 16), &ops)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(err.operation_index(), Some(1));
    assert_eq!(remover.call_count(), 0);
}

#[tokio::test]
async fn test_subnormal_and_largest_sigmas_process() {
    let (processor, _) = fixture_processor();
    let ops = parse_operations_str(
        r#"[{"adjustments": {"blur": 1e-40, "sharpening": 2e-38}},
            {"addBackground": {"type": "color", "value": "orange"}},
            {"adjustments": {"blur": 1000}}]"#,
    )
    .unwrap();
    let result = processor.process_bytes(&portrait_png(12, 12), &ops).await.unwrap();
    assert_eq!(result.dimensions, Dimensions::square(12));
}

#[tokio::test]
async fn test_empty_operation_list_reencodes_source() {
    let (processor, _) = fixture_processor();
    let source = portrait_png(37, 23);
    let result = processor.process_bytes(&source, &[]).await.unwrap();
    assert_eq!(result.dimensions, Dimensions::new(37, 23));
    assert_eq!(decode_rgba(&result.bytes), decode_rgba(&source));
}

#[tokio::test]
async fn test_undecodable_sources() {
    let (processor, _) = fixture_processor();

    for bytes in [Vec::new(), b"GIF89a-not-really".to_vec()] {
        let err = processor.process_bytes(&bytes, &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
        assert_eq!(err.stage, PipelineStage::Decode);
    }

    let mut truncated = portrait_png(64, 64);
    truncated.truncate(truncated.len() / 3);
    let err = processor.process_bytes(&truncated, &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
}

#[tokio::test]
async fn test_single_pixel_image() {
    let (processor, remover) = fixture_processor();
    let ops = parse_operations_str(
        r##"["removeBackground",
            {"filter": "dramatic"},
            {"addBackground": {"type": "pattern", "value": "dots"}},
            {"cropToShape": {"shape": "heart", "size": 400}}]"##,
    )
    .unwrap();

    let result = processor.process_bytes(&portrait_png(1, 1), &ops).await.unwrap();
    assert_eq!(result.dimensions, Dimensions::square(1));
    assert_eq!(remover.call_count(), 1);
}

#[tokio::test]
async fn test_oversized_source_is_downscaled() {
    let config = PipelineConfig::builder()
        .max_image_dimension(Some(100))
        .build()
        .unwrap();
    let processor = processor_with(Arc::new(FixtureRemover::new()), config);
    let result = processor
        .process_bytes(&portrait_png(400, 200), &[])
        .await
        .unwrap();
    assert_eq!(result.dimensions, Dimensions::new(100, 50));
}

#[tokio::test]
async fn test_unknown_pattern_falls_back() {
    let (processor, _) = fixture_processor();
    let ops = parse_operations_str(
        r#"["removeBackground", {"addBackground": {"type": "pattern", "value": "plaid"}}]"#,
    )
    .unwrap();
    let result = processor.process_bytes(&portrait_png(40, 40), &ops).await.unwrap();

    let output = decode_rgba(&result.bytes);
    assert_eq!(output.get_pixel(0, 0).0, [255, 255, 255, 255]);
}

#[tokio::test]
async fn test_removal_without_service() {
    let ops = parse_operations_str(r#"["removeBackground"]"#).unwrap();
    let err = generate_from_bytes(
        &portrait_png(16, 16),
        &ops,
        PipelineConfig::default(),
        Arc::new(UnavailableRemover),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
    assert_eq!(err.operation_index(), Some(0));
}

#[test]
fn test_invalid_configurations() {
    let out_of_range = PipelineConfig {
        jpeg_quality: 101,
        ..PipelineConfig::default()
    };
    assert!(out_of_range.validate().is_err());
    assert!(PipelineConfig::builder()
        .removal_timeout(std::time::Duration::ZERO)
        .build()
        .is_err());
    assert!(PipelineConfig::builder().max_source_bytes(0).build().is_err());
    assert!(PipelineConfig::builder()
        .max_image_dimension(Some(0))
        .build()
        .is_err());
    assert!(PipelineConfig::builder()
        .template_size(Platform::Facebook, Dimensions::new(0, 400))
        .build()
        .is_err());
}

#[test]
fn test_config_file_errors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"output_format": "gif"}}"#).unwrap();
    let err = PipelineConfig::from_json_file(file.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"output_format": "jpeg", "jpeg_quality": 140}}"#).unwrap();
    assert!(PipelineConfig::from_json_file(file.path()).is_err());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"output_format": "webp"}}"#).unwrap();
    let config = PipelineConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.output_format, OutputFormat::WebP);

    assert!(PipelineConfig::from_json_file("/no/such/config.json").is_err());
}

#[test]
fn test_processing_status_wire_form() {
    assert_eq!(
        serde_json::to_string(&ProcessingStatus::Completed).unwrap(),
        r#""COMPLETED""#
    );
    let status: ProcessingStatus = serde_json::from_str(r#""FAILED""#).unwrap();
    assert!(status.is_terminal());
    assert!(!ProcessingStatus::default().is_terminal());
}
