#![allow(missing_docs)]

use uploadgear::{
    FileDescriptor, UploadError, UploadOptions, Uploader, Violation,
    preflight::{check_content_type, parse_descriptor, validate_descriptor},
};

fn jpg_only() -> UploadOptions {
    UploadOptions {
        allowed_extensions: vec!["jpg".to_owned()],
        max_total_bytes: Some(10_000),
        max_file_bytes: Some(5_000),
        ..UploadOptions::default()
    }
}

#[test]
fn disallowed_declared_extension_is_reported() {
    let report = validate_descriptor(br#"{"file1": {"name": "a.txt", "size": 5}}"#, &jpg_only())
        .expect("descriptor should decode");

    assert!(!report.is_empty());
    let message = report.to_string();
    assert!(message.contains("a.txt"), "{message}");
    assert!(message.contains("txt"), "{message}");
}

#[test]
fn allowed_declared_file_passes() {
    let report = validate_descriptor(br#"{"file1": {"name": "a.jpg", "size": 5}}"#, &jpg_only())
        .expect("descriptor should decode");

    assert!(report.is_empty(), "unexpected violations: {report}");
}

#[test]
fn arrays_are_flattened_in_document_order() {
    let descriptors = parse_descriptor(
        br#"{
            "photos": [{"name": "b.jpg", "size": 2}, {"name": "a.jpg", "size": 1}],
            "cover": {"name": "c.jpg", "size": 3}
        }"#,
    )
    .expect("descriptor should decode");

    assert_eq!(
        descriptors,
        vec![
            ("photos".to_owned(), FileDescriptor::new("b.jpg", 2)),
            ("photos".to_owned(), FileDescriptor::new("a.jpg", 1)),
            ("cover".to_owned(), FileDescriptor::new("c.jpg", 3)),
        ]
    );
}

#[test]
fn declared_sizes_drive_per_file_and_aggregate_checks() {
    let report = validate_descriptor(
        br#"{"a": [{"name": "x.jpg", "size": 6000}, {"name": "y.jpg", "size": 4500}]}"#,
        &jpg_only(),
    )
    .expect("descriptor should decode");

    assert_eq!(report.len(), 2);
    assert!(matches!(
        &report.violations()[0],
        Violation::FileTooLarge { file_name, size: 6000, max_file_bytes: 5000 } if file_name == "x.jpg"
    ));
    assert!(matches!(
        report.violations()[1],
        Violation::TotalTooLarge {
            total: 10_500,
            max_total_bytes: 10_000
        }
    ));
}

#[test]
fn malformed_descriptor_is_invalid() {
    for body in [
        &br#"["a.jpg"]"#[..],
        br#"{"a": {"name": "a.jpg"}}"#,
        br#"{"a": {"name": "a.jpg", "size": -1}}"#,
        b"not json",
    ] {
        let err = validate_descriptor(body, &jpg_only()).expect_err("must fail");
        assert!(matches!(err, UploadError::InvalidDescriptor(_)));
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
    }
}

#[test]
fn content_type_must_be_json() {
    check_content_type(Some("application/json; charset=utf-8")).expect("json should pass");

    for content_type in [None, Some("text/plain"), Some("multipart/form-data; boundary=x")] {
        let err = check_content_type(content_type).expect_err("must fail");
        assert!(matches!(err, UploadError::InvalidContentType(_)));
    }
}

#[test]
fn uploader_preflight_rejects_with_combined_report() {
    let uploader = Uploader::new(jpg_only()).expect("options should validate");
    let body = br#"{"a": {"name": "a.txt", "size": 1}, "b": {"name": "b.png", "size": 1}}"#;

    let err = uploader
        .preflight(Some("application/json"), body)
        .expect_err("must be rejected");

    assert_eq!(err.status_code(), http::StatusCode::UNPROCESSABLE_ENTITY);
    let report = err.report().expect("rejection carries a report");
    assert_eq!(report.len(), 2);
    let message = err.to_string();
    assert!(message.contains("a.txt") && message.contains("b.png"), "{message}");

    uploader
        .preflight(Some("application/json"), br#"{"a": {"name": "a.jpg", "size": 1}}"#)
        .expect("valid descriptor should pass");
}
