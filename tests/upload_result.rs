#![allow(missing_docs)]

use std::path::PathBuf;

use bytes::Bytes;
use futures::stream;
use http::{HeaderMap, HeaderValue, header};
use uploadgear::{
    FormFields, RequestContext, StoredFile, UploadError, UploadOptions, UploadRequest,
    UploadResult, Uploaded, Uploader,
};

fn stored(field: &str, name: &str) -> StoredFile {
    StoredFile {
        field_name: field.to_owned(),
        original_filename: name.to_owned(),
        content_type: "image/png".to_owned(),
        size: 3,
        id: format!("id-{name}"),
        relative_url: format!("uploads/id-{name}/{name}"),
        absolute_path: PathBuf::from("/srv/uploads").join(format!("id-{name}")).join(name),
        in_memory: None,
    }
}

#[test]
fn single_submission_stays_a_singleton() {
    let result: UploadResult = [("avatar", stored("avatar", "a.png"))].into_iter().collect();

    assert!(matches!(result.get("avatar"), Some(Uploaded::Single(_))));
    assert_eq!(
        result.get("avatar").map(|uploaded| uploaded.files().len()),
        Some(1)
    );
}

#[test]
fn repeats_promote_to_sequences_in_order() {
    let mut result = UploadResult::new();
    result.push("photos", stored("photos", "1.png"));
    result.push("cover", stored("cover", "c.png"));
    result.push("photos", stored("photos", "2.png"));
    result.push("photos", stored("photos", "3.png"));

    let photos = result.get("photos").expect("photos present");
    assert!(photos.as_single().is_none());
    let names: Vec<&str> = photos
        .files()
        .iter()
        .map(|file| file.original_filename.as_str())
        .collect();
    assert_eq!(names, ["1.png", "2.png", "3.png"]);

    assert_eq!(result.len(), 2);
    assert_eq!(result.files().count(), 4);
    let fields: Vec<&str> = result.iter().map(|(name, _)| name).collect();
    assert_eq!(fields, ["photos", "cover"]);
}

#[test]
fn serializes_singletons_as_objects_and_repeats_as_arrays() {
    let mut result = UploadResult::new();
    result.push("one", stored("one", "a.png"));
    result.push("many", stored("many", "b.png"));
    result.push("many", stored("many", "c.png"));

    let json = serde_json::to_value(&result).expect("result should serialize");

    assert!(json["one"].is_object());
    assert_eq!(json["one"]["original_filename"], "a.png");
    assert_eq!(json["one"]["relative_url"], "uploads/id-a.png/a.png");
    assert!(json["one"].get("in_memory").is_none());
    assert_eq!(json["many"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["many"][1]["original_filename"], "c.png");
}

fn multipart_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("multipart/form-data; boundary=B"),
    );
    headers
}

fn body_stream() -> impl futures::Stream<Item = Result<Bytes, UploadError>> + Send + 'static {
    let body = concat!(
        "--B\r\n",
        "Content-Disposition: form-data; name=\"caption\"\r\n",
        "\r\n",
        "sunset\r\n",
        "--B\r\n",
        "Content-Disposition: form-data; name=\"image\"; filename=\"s.png\"\r\n",
        "Content-Type: image/png\r\n",
        "\r\n",
        "png\r\n",
        "--B--\r\n"
    );
    stream::iter([Ok::<Bytes, UploadError>(Bytes::from_static(body.as_bytes()))])
}

#[tokio::test]
async fn handle_attaches_result_to_request_context() {
    let options = UploadOptions {
        persist_to_disk: false,
        retain_in_memory: true,
        relative_to_working_dir: false,
        ..UploadOptions::default()
    };
    let uploader = Uploader::new(options).expect("options should validate");
    let mut context = RequestContext::new(multipart_headers(), body_stream());

    assert!(context.upload_result().is_none());
    uploader
        .handle(&mut context)
        .await
        .expect("upload should succeed");

    let result = context.upload_result().expect("result attached");
    let image = result
        .get("image")
        .and_then(Uploaded::as_single)
        .expect("image stored");
    assert_eq!(image.content_type, "image/png");
    assert_eq!(image.in_memory.as_deref(), Some(&b"png"[..]));
    assert_eq!(
        context.form_fields().and_then(|fields| fields.get("caption")),
        Some("sunset")
    );

    let err = uploader
        .handle(&mut context)
        .await
        .expect_err("body can only be consumed once");
    assert!(matches!(err, UploadError::BodyConsumed));
}

#[tokio::test]
async fn rejected_upload_attaches_nothing() {
    let options = UploadOptions {
        allowed_extensions: vec!["jpg".to_owned()],
        persist_to_disk: false,
        relative_to_working_dir: false,
        ..UploadOptions::default()
    };
    let uploader = Uploader::new(options).expect("options should validate");
    let mut context = RequestContext::new(multipart_headers(), body_stream());

    let err = uploader
        .handle(&mut context)
        .await
        .expect_err("png must be rejected");

    assert!(err.to_string().contains("s.png"));
    assert!(context.upload_result().is_none());
    assert!(context.extensions().get::<FormFields>().is_none());
}

#[tokio::test]
async fn content_length_header_is_honoured() {
    let options = UploadOptions {
        max_total_bytes: Some(16),
        persist_to_disk: false,
        relative_to_working_dir: false,
        ..UploadOptions::default()
    };
    let uploader = Uploader::new(options).expect("options should validate");
    let mut headers = multipart_headers();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("4096"));
    let mut context = RequestContext::new(headers, body_stream());

    assert_eq!(context.header(&header::CONTENT_LENGTH), Some("4096"));
    let err = uploader
        .handle(&mut context)
        .await
        .expect_err("declared length exceeds the limit");
    assert!(err.to_string().contains("4096"));
}
