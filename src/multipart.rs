use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::{
    error::{ParseError, UploadError},
    parser::{MultipartStream, PartEvent, extract_multipart_boundary},
    part::Part,
};

/// Multipart body reader yielding parts in arrival order.
///
/// Each [`Part`] borrows the reader; its body must be read (or the part
/// dropped) before the next part is requested. Unread body bytes are
/// skipped automatically.
#[derive(Debug)]
pub struct Multipart<S> {
    inner: MultipartStream<S>,
    in_part: bool,
}

impl<S> Multipart<S> {
    /// Creates a multipart reader from an already extracted boundary and a chunk source.
    pub fn new(boundary: impl Into<String>, stream: S) -> Result<Self, ParseError> {
        Ok(Self {
            inner: MultipartStream::new(boundary, stream)?,
            in_part: false,
        })
    }

    /// Creates a multipart reader from a raw `Content-Type` header value.
    ///
    /// Fails with [`UploadError::InvalidContentType`] when the value is not
    /// `multipart/form-data` with a valid boundary.
    pub fn from_content_type(content_type: &str, stream: S) -> Result<Self, UploadError> {
        let boundary =
            extract_multipart_boundary(content_type).map_err(UploadError::InvalidContentType)?;
        Ok(Self::new(boundary, stream)?)
    }

    /// Total number of raw body bytes read from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.inner.bytes_read()
    }
}

impl<S> Multipart<S>
where
    S: Stream<Item = Result<Bytes, UploadError>> + Unpin,
{
    /// Advances to the next part, or returns `None` after the closing boundary.
    pub async fn next_part(&mut self) -> Result<Option<Part<'_, S>>, UploadError> {
        while self.in_part {
            self.next_chunk().await?;
        }

        match self.inner.next().await {
            None => Ok(None),
            Some(Ok(PartEvent::Start(headers))) => {
                self.in_part = true;
                Ok(Some(Part::new(headers, self)))
            }
            Some(Ok(_)) => Err(ParseError::new("multipart body data outside of a part").into()),
            Some(Err(err)) => Err(err),
        }
    }

    /// Reads the next body chunk of the current part; `None` marks its end.
    pub(crate) async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
        if !self.in_part {
            return Ok(None);
        }

        match self.inner.next().await {
            Some(Ok(PartEvent::Data(chunk))) => Ok(Some(chunk)),
            Some(Ok(PartEvent::End)) => {
                self.in_part = false;
                Ok(None)
            }
            Some(Ok(PartEvent::Start(_))) => {
                Err(ParseError::new("part started before previous part ended").into())
            }
            Some(Err(err)) => Err(err),
            None => Err(UploadError::IncompleteStream),
        }
    }
}
