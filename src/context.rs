//! Request-context capability consumed by [`crate::Uploader::handle`].

use std::{fmt, pin::Pin};

use bytes::Bytes;
use futures::Stream;
use http::{Extensions, HeaderMap, HeaderName};

use crate::{
    error::UploadError,
    result::{FormFields, UploadOutput, UploadResult},
};

/// Boxed request body stream.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, UploadError>> + Send + 'static>>;

/// What the upload pipeline needs from a host request.
pub trait UploadRequest: Send {
    /// Looks up a header value; non-ASCII values are treated as absent.
    fn header(&self, name: &HeaderName) -> Option<&str>;

    /// Takes the body stream. Returns `None` once it has been taken.
    fn take_body(&mut self) -> Option<BodyStream>;

    /// Stores the upload output for downstream handlers.
    fn attach(&mut self, output: UploadOutput);
}

/// Framework-neutral [`UploadRequest`] built from headers and a body stream.
///
/// Attached output lands in typed [`Extensions`] slots: [`UploadResult`] and
/// [`FormFields`].
pub struct RequestContext {
    headers: HeaderMap,
    body: Option<BodyStream>,
    extensions: Extensions,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl RequestContext {
    /// Creates a context from request headers and a body stream.
    pub fn new<S>(headers: HeaderMap, body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, UploadError>> + Send + 'static,
    {
        Self {
            headers,
            body: Some(Box::pin(body)),
            extensions: Extensions::new(),
        }
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Typed request-scoped values.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable typed request-scoped values.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Stored files, once an upload has been handled.
    pub fn upload_result(&self) -> Option<&UploadResult> {
        self.extensions.get::<UploadResult>()
    }

    /// Scalar form fields, once an upload has been handled.
    pub fn form_fields(&self) -> Option<&FormFields> {
        self.extensions.get::<FormFields>()
    }

    /// Consumes the context, returning its extensions.
    pub fn into_extensions(self) -> Extensions {
        self.extensions
    }
}

impl UploadRequest for RequestContext {
    fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn take_body(&mut self) -> Option<BodyStream> {
        self.body.take()
    }

    fn attach(&mut self, output: UploadOutput) {
        self.extensions.insert(output.files);
        self.extensions.insert(output.fields);
    }
}
