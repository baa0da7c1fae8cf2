#![allow(missing_docs)]

use uploadgear::{
    FileDescriptor, UploadOptions, Violation,
    validator::{extension_allowed, extension_of, validate},
};

fn options_with(allowed: &[&str], max_file: Option<u64>, max_total: Option<u64>) -> UploadOptions {
    UploadOptions {
        allowed_extensions: allowed.iter().map(|ext| (*ext).to_owned()).collect(),
        max_file_bytes: max_file,
        max_total_bytes: max_total,
        ..UploadOptions::default()
    }
}

#[test]
fn extension_is_substring_after_last_dot() {
    assert_eq!(extension_of("photo.jpg"), Some("jpg"));
    assert_eq!(extension_of("archive.tar.gz"), Some("gz"));
    assert_eq!(extension_of("trailing."), Some(""));
    assert_eq!(extension_of("README"), None);
}

#[test]
fn extension_matching_is_case_sensitive() {
    let allowed = vec!["jpg".to_owned()];
    assert!(extension_allowed("a.jpg", &allowed));
    assert!(!extension_allowed("a.JPG", &allowed));
    assert!(extension_allowed("anything", &[]));
}

#[test]
fn accepts_files_within_policy() {
    let options = options_with(&["jpg", "png"], Some(1000), Some(2000));
    let files = [FileDescriptor::new("a.jpg", 900), FileDescriptor::new("b.png", 900)];

    let report = validate(&files, 1800, &options);
    assert!(report.is_empty(), "unexpected violations: {report}");
}

#[test]
fn disallowed_extension_names_file_and_extension() {
    let options = options_with(&["jpg"], None, None);
    let report = validate(&[FileDescriptor::new("notes.txt", 5)], 5, &options);

    assert_eq!(report.len(), 1);
    assert!(matches!(
        &report.violations()[0],
        Violation::DisallowedExtension { file_name, extension, .. }
            if file_name == "notes.txt" && extension == "txt"
    ));
    let message = report.to_string();
    assert!(message.contains("notes.txt"));
    assert!(message.contains("`txt`"));
}

#[test]
fn file_without_dot_is_missing_extension() {
    let options = options_with(&["jpg"], None, None);
    let report = validate(&[FileDescriptor::new("Makefile", 1)], 1, &options);

    assert!(matches!(
        &report.violations()[0],
        Violation::MissingExtension { file_name, .. } if file_name == "Makefile"
    ));
}

#[test]
fn oversized_file_message_cites_size_and_limit() {
    let options = options_with(&[], Some(1000), None);
    let report = validate(&[FileDescriptor::new("big.bin", 1500)], 1500, &options);

    assert_eq!(report.len(), 1);
    let message = report.to_string();
    assert!(message.contains("big.bin"));
    assert!(message.contains("1500"));
    assert!(message.contains("1000"));
}

#[test]
fn every_violation_is_reported_in_order() {
    let options = options_with(&["jpg"], Some(10), Some(15));
    let files = [
        FileDescriptor::new("a.exe", 20),
        FileDescriptor::new("b.jpg", 5),
        FileDescriptor::new("c.jpg", 12),
    ];

    let report = validate(&files, 37, &options);
    let messages = report.messages();

    assert_eq!(messages.len(), 4);
    assert!(messages[0].contains("a.exe") && messages[0].contains("exe"));
    assert!(messages[1].contains("a.exe") && messages[1].contains("20"));
    assert!(messages[2].contains("c.jpg") && messages[2].contains("12"));
    assert!(matches!(
        report.violations()[3],
        Violation::TotalTooLarge {
            total: 37,
            max_total_bytes: 15
        }
    ));
    assert_eq!(report.to_string(), messages.join("; "));
}

#[test]
fn aggregate_limit_is_inclusive() {
    let options = options_with(&[], None, Some(100));
    let files = [FileDescriptor::new("a", 60), FileDescriptor::new("b", 40)];

    assert!(validate(&files, 100, &options).is_empty());
    assert_eq!(validate(&files, 101, &options).len(), 1);
}
