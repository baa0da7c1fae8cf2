//! Axum integration: upload and pre-flight middleware.
//!
//! ```ignore
//! let uploader = Arc::new(Uploader::builder().allowed_extensions(["png"]).build()?);
//! let app = Router::new()
//!     .route("/upload", post(handler))
//!     .layer(middleware::from_fn_with_state(uploader, upload_middleware::<DiskWriter>));
//! ```

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{HeaderName, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::StreamExt;

use crate::{
    BodyStream, ParseError, StorageWriter, UploadError, UploadOutput, UploadRequest, Uploader,
};

/// Largest pre-flight JSON body read by [`preflight_middleware`].
pub const MAX_PREFLIGHT_BODY_BYTES: usize = 64 * 1024;

/// Rejection response for a failed upload or pre-flight check.
#[derive(Debug)]
pub struct UploadRejection(pub UploadError);

impl IntoResponse for UploadRejection {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let violations: Vec<String> = self
            .0
            .report()
            .map(|report| report.messages())
            .unwrap_or_default();
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "violations": violations,
        });
        (status, Json(body)).into_response()
    }
}

impl From<UploadError> for UploadRejection {
    fn from(err: UploadError) -> Self {
        Self(err)
    }
}

struct AxumUpload {
    parts: Parts,
    body: Option<BodyStream>,
}

impl UploadRequest for AxumUpload {
    fn header(&self, name: &HeaderName) -> Option<&str> {
        self.parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    fn take_body(&mut self) -> Option<BodyStream> {
        self.body.take()
    }

    fn attach(&mut self, output: UploadOutput) {
        self.parts.extensions.insert(output.files);
        self.parts.extensions.insert(output.fields);
    }
}

fn body_stream(body: Body) -> BodyStream {
    Box::pin(body.into_data_stream().map(|item| {
        item.map_err(|err| ParseError::new(format!("axum body stream error: {err}")).into())
    }))
}

/// Processes a multipart upload before the wrapped handler runs.
///
/// Accepted uploads reach the handler with [`crate::UploadResult`] and
/// [`crate::FormFields`] in the request extensions and an empty body. Any
/// failure short-circuits with an [`UploadRejection`] response.
pub async fn upload_middleware<W>(
    State(uploader): State<Arc<Uploader<W>>>,
    request: Request,
    next: Next,
) -> Response
where
    W: StorageWriter,
{
    let (parts, body) = request.into_parts();
    let mut upload = AxumUpload {
        parts,
        body: Some(body_stream(body)),
    };

    if let Err(err) = uploader.handle(&mut upload).await {
        return UploadRejection(err).into_response();
    }

    next.run(Request::from_parts(upload.parts, Body::empty()))
        .await
}

/// Validates a JSON upload descriptor before the wrapped handler runs.
///
/// The body is buffered (up to [`MAX_PREFLIGHT_BODY_BYTES`]) and handed to the
/// handler unchanged when every declared file passes.
pub async fn preflight_middleware<W>(
    State(uploader): State<Arc<Uploader<W>>>,
    request: Request,
    next: Next,
) -> Response
where
    W: Send + Sync + 'static,
{
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_PREFLIGHT_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let err = ParseError::new(format!("failed to read pre-flight body: {err}"));
            return UploadRejection(err.into()).into_response();
        }
    };

    let content_type = parts
        .headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    if let Err(err) = uploader.preflight(content_type, &bytes) {
        return UploadRejection(err).into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
