use bytes::{Bytes, BytesMut};
use futures::Stream;

use crate::{
    error::{ParseError, UploadError},
    multipart::Multipart,
    parser::headers::{PartHeaders, PartKind},
};

/// One part of a multipart body whose bytes are still on the wire.
///
/// The body is a single-consumption stream: read it with [`Part::chunk`],
/// or collect it with [`Part::bytes`] / [`Part::text`].
#[derive(Debug)]
pub struct Part<'a, S> {
    headers: PartHeaders,
    multipart: &'a mut Multipart<S>,
    size: u64,
    finished: bool,
}

impl<'a, S> Part<'a, S> {
    pub(crate) fn new(headers: PartHeaders, multipart: &'a mut Multipart<S>) -> Self {
        Self {
            headers,
            multipart,
            size: 0,
            finished: false,
        }
    }

    /// Returns the form field name for this part.
    pub fn field_name(&self) -> &str {
        &self.headers.field_name
    }

    /// Returns the original filename, if this part is a file.
    pub fn file_name(&self) -> Option<&str> {
        self.headers.file_name.as_deref()
    }

    /// Returns the declared content type for this part.
    pub fn content_type(&self) -> &mime::Mime {
        &self.headers.content_type
    }

    /// Returns parsed part headers.
    pub fn headers(&self) -> &PartHeaders {
        &self.headers
    }

    /// Returns whether this part is a file or a scalar field.
    pub fn kind(&self) -> PartKind {
        self.headers.kind()
    }

    /// Body bytes read so far. Final once the body has been fully read.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns `true` once the whole body has been read.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<S> Part<'_, S>
where
    S: Stream<Item = Result<Bytes, UploadError>> + Unpin,
{
    /// Reads the next body chunk; `None` once the body is exhausted.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
        if self.finished {
            return Ok(None);
        }

        match self.multipart.next_chunk().await? {
            Some(chunk) => {
                self.size = self.size.saturating_add(chunk.len() as u64);
                Ok(Some(chunk))
            }
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Reads the full part body as bytes.
    pub async fn bytes(&mut self) -> Result<Bytes, UploadError> {
        self.collect(None).await
    }

    /// Reads the full part body as UTF-8 text, failing once it grows past `limit` bytes.
    pub async fn text_limited(&mut self, limit: Option<u64>) -> Result<String, UploadError> {
        let bytes = self.collect(limit).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ParseError::new("part body is not valid UTF-8").into())
    }

    /// Reads the full part body and decodes it as UTF-8 text.
    pub async fn text(&mut self) -> Result<String, UploadError> {
        self.text_limited(None).await
    }

    async fn collect(&mut self, limit: Option<u64>) -> Result<Bytes, UploadError> {
        if self.finished || self.size > 0 {
            return Err(ParseError::new("part body was already consumed").into());
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            if let Some(max_field_bytes) = limit {
                if self.size > max_field_bytes {
                    return Err(UploadError::FieldTooLarge {
                        field: self.headers.field_name.clone(),
                        max_field_bytes,
                    });
                }
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}
