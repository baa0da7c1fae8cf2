#![allow(missing_docs)]

use http::{HeaderMap, HeaderValue, header};
use uploadgear::{
    FileMeta, PartKind,
    parser::{parse_content_disposition, parse_part_headers},
};

fn headers(disposition: &[u8], content_type: Option<&'static str>) -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_bytes(disposition).expect("header value should build"),
    );
    if let Some(content_type) = content_type {
        map.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    map
}

#[test]
fn file_part_yields_storage_metadata() {
    let parsed = parse_part_headers(&headers(
        b"form-data; name=\"avatar\"; filename=\"face.png\"",
        Some("image/png"),
    ))
    .expect("part headers should parse");

    assert_eq!(parsed.kind(), PartKind::File);
    assert_eq!(
        parsed.file_meta(),
        Some(FileMeta {
            field_name: "avatar".to_owned(),
            file_name: "face.png".to_owned(),
            content_type: "image/png".to_owned(),
        })
    );
}

#[test]
fn part_without_filename_is_a_scalar_field() {
    let parsed = parse_part_headers(&headers(b"form-data; name=title", None))
        .expect("part headers should parse");

    assert_eq!(parsed.field_name, "title");
    assert_eq!(parsed.kind(), PartKind::Field);
    assert_eq!(parsed.file_meta(), None);
    assert_eq!(parsed.content_type, mime::APPLICATION_OCTET_STREAM);
}

#[test]
fn empty_filename_still_marks_a_file_part() {
    let parsed = parse_part_headers(&headers(b"form-data; name=\"doc\"; filename=\"\"", None))
        .expect("part headers should parse");

    assert_eq!(parsed.kind(), PartKind::File);
    assert_eq!(parsed.file_name.as_deref(), Some(""));
}

#[test]
fn raw_utf8_filename_is_accepted() {
    let parsed = parse_part_headers(&headers(
        "form-data; name=\"doc\"; filename=\"résumé 2024.pdf\"".as_bytes(),
        Some("application/pdf"),
    ))
    .expect("part headers should parse");

    assert_eq!(parsed.file_name.as_deref(), Some("résumé 2024.pdf"));
}

#[test]
fn plain_filename_is_not_percent_decoded() {
    let parsed = parse_content_disposition("form-data; name=\"f\"; filename=\"100%.txt\"")
        .expect("header should parse");
    assert_eq!(parsed.file_name.as_deref(), Some("100%.txt"));
}

#[test]
fn extended_filename_wins_and_is_decoded() {
    let parsed = parse_content_disposition(
        "form-data; name=\"upload\"; filename=\"fallback.txt\"; filename*=UTF-8''r%C3%A9al%20name.txt",
    )
    .expect("header should parse");
    assert_eq!(parsed.file_name.as_deref(), Some("réal name.txt"));
}

#[test]
fn quoted_values_keep_semicolons_and_windows_paths() {
    let parsed = parse_content_disposition(
        "form-data; name=\"a;b\"; filename=\"C:\\Users\\me\\say \\\"hi\\\".txt\"",
    )
    .expect("header should parse");

    assert_eq!(parsed.name, "a;b");
    assert_eq!(
        parsed.file_name.as_deref(),
        Some("C:\\Users\\me\\say \"hi\".txt")
    );
}

#[test]
fn malformed_dispositions_are_rejected() {
    let cases = [
        ("attachment; name=\"x\"", "must be `form-data`"),
        ("form-data; filename=\"a.txt\"", "missing a `name`"),
        ("form-data; name=\"\"", "missing a `name`"),
        ("form-data; name", "malformed Content-Disposition parameter"),
        ("form-data; name=\"open", "unterminated"),
        ("form-data; name=x; filename*=latin1''a.txt", "unsupported filename* charset"),
        ("form-data; name=x; filename*=UTF-8''bad%2", "percent-encoding"),
        ("form-data; name=x; filename*=a.txt", "malformed filename*"),
    ];

    for (value, fragment) in cases {
        let err = parse_content_disposition(value).expect_err("must fail");
        let message = err.to_string();
        assert!(
            message.contains(fragment),
            "`{value}` failed with `{message}`, expected `{fragment}`"
        );
    }
}

#[test]
fn missing_disposition_or_bad_content_type_fails() {
    let err = parse_part_headers(&HeaderMap::new()).expect_err("must fail");
    assert!(err.to_string().contains("missing Content-Disposition"));

    let err = parse_part_headers(&headers(b"form-data; name=f", Some("not-a/type?")))
        .expect_err("must fail");
    assert!(err.to_string().contains("invalid part Content-Type"));
}
