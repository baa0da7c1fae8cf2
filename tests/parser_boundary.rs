#![allow(missing_docs)]

use uploadgear::parser::extract_multipart_boundary;

#[test]
fn accepted_content_types_yield_their_boundary() {
    let cases = [
        ("multipart/form-data; boundary=abc123", "abc123"),
        ("multipart/form-data; boundary=\"my-boundary\"", "my-boundary"),
        ("Multipart/Form-Data; boundary=XyZ", "XyZ"),
        ("multipart/form-data; charset=utf-8; boundary=----WebKitForm7MA4YWxk", "----WebKitForm7MA4YWxk"),
        ("multipart/form-data; boundary=abc%2D123", "abc-123"),
    ];

    for (content_type, expected) in cases {
        let boundary = extract_multipart_boundary(content_type)
            .unwrap_or_else(|err| panic!("`{content_type}` should parse: {err}"));
        assert_eq!(boundary, expected, "content type `{content_type}`");
    }
}

#[test]
fn rejected_content_types_explain_why() {
    let long = format!("multipart/form-data; boundary={}", "a".repeat(71));
    let cases = [
        ("application/json", "multipart/form-data"),
        ("text/plain; boundary=abc", "multipart/form-data"),
        ("multipart/form-data", "missing multipart boundary"),
        ("multipart/form-data; boundary=abc@123", "invalid"),
        (long.as_str(), "cannot exceed 70"),
        ("multipart/form-data; boundary=abc%2", "percent-encoding"),
        ("not a mime", "invalid Content-Type"),
    ];

    for (content_type, fragment) in cases {
        let err = extract_multipart_boundary(content_type).expect_err("must fail");
        let message = err.to_string();
        assert!(
            message.contains(fragment),
            "`{content_type}` failed with `{message}`, expected `{fragment}`"
        );
    }
}
