use std::{
    pin::Pin,
    task::{Context, Poll},
};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{self},
};

use crate::{
    error::{ParseError, UploadError},
    parser::headers::{PartHeaders, parse_part_headers},
};

const MAX_HEADER_BLOCK_LEN: usize = 16 * 1024;

/// Incremental output of [`MultipartStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartEvent {
    /// A new part begins.
    Start(PartHeaders),
    /// A slice of the current part's body.
    Data(Bytes),
    /// The current part's body is complete.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    StartBoundary,
    Headers,
    Body,
    End,
    Failed,
}

/// Incremental multipart parser over a chunked byte stream.
///
/// Body bytes are released as soon as they can no longer be part of a
/// delimiter, so at most one header block plus a delimiter-sized tail is
/// held in memory.
#[derive(Debug)]
pub struct MultipartStream<S> {
    stream: S,
    boundary_line: Vec<u8>,
    boundary_end_line: Vec<u8>,
    delimiter: Vec<u8>,
    buffer: BytesMut,
    state: ParseState,
    upstream_done: bool,
    bytes_read: u64,
}

impl<S> MultipartStream<S> {
    /// Creates a new streaming parser for a known multipart boundary.
    pub fn new(boundary: impl Into<String>, stream: S) -> Result<Self, ParseError> {
        let boundary = boundary.into();
        validate_boundary_input(&boundary)?;

        Ok(Self {
            stream,
            boundary_line: format!("--{boundary}").into_bytes(),
            boundary_end_line: format!("--{boundary}--").into_bytes(),
            delimiter: format!("\r\n--{boundary}").into_bytes(),
            buffer: BytesMut::new(),
            state: ParseState::StartBoundary,
            upstream_done: false,
            bytes_read: 0,
        })
    }

    /// Total number of raw body bytes pulled from the upstream source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<S> Stream for MultipartStream<S>
where
    S: Stream<Item = Result<Bytes, UploadError>> + Unpin,
{
    type Item = Result<PartEvent, UploadError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match self.parse_available() {
                ParseOutcome::Emit(item) => return Poll::Ready(Some(item)),
                ParseOutcome::Done => return Poll::Ready(None),
                ParseOutcome::NeedMore => {}
            }

            if self.upstream_done {
                self.state = ParseState::Failed;
                return Poll::Ready(Some(Err(UploadError::IncompleteStream)));
            }

            match Pin::new(&mut self.stream).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.bytes_read = self.bytes_read.saturating_add(chunk.len() as u64);
                    self.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(err))) => {
                    self.state = ParseState::Failed;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    self.upstream_done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S> MultipartStream<S> {
    fn fail(&mut self, message: &str) -> ParseOutcome {
        self.state = ParseState::Failed;
        ParseOutcome::Emit(Err(ParseError::new(message).into()))
    }

    fn parse_available(&mut self) -> ParseOutcome {
        loop {
            match self.state {
                ParseState::StartBoundary => {
                    let Some(line) = take_line(&mut self.buffer) else {
                        return if self.upstream_done {
                            self.fail("missing opening boundary")
                        } else {
                            ParseOutcome::NeedMore
                        };
                    };

                    if line[..] == self.boundary_line[..] {
                        self.state = ParseState::Headers;
                        continue;
                    }

                    if line[..] == self.boundary_end_line[..] {
                        self.state = ParseState::End;
                        continue;
                    }

                    return self.fail("malformed opening boundary");
                }
                ParseState::Headers => {
                    let (raw, consumed) = if self.buffer.starts_with(b"\r\n") {
                        (Vec::new(), 2)
                    } else if let Some(split) = find_subslice(&self.buffer, b"\r\n\r\n") {
                        (self.buffer[..split].to_vec(), split + 4)
                    } else if self.buffer.len() > MAX_HEADER_BLOCK_LEN {
                        return self.fail("part headers too large");
                    } else {
                        return ParseOutcome::NeedMore;
                    };
                    let _ = self.buffer.split_to(consumed);

                    let headers =
                        match parse_header_block(&raw).and_then(|h| parse_part_headers(&h)) {
                            Ok(headers) => headers,
                            Err(err) => {
                                self.state = ParseState::Failed;
                                return ParseOutcome::Emit(Err(err.into()));
                            }
                        };

                    self.state = ParseState::Body;
                    return ParseOutcome::Emit(Ok(PartEvent::Start(headers)));
                }
                ParseState::Body => {
                    let Some(split) = find_subslice(&self.buffer, &self.delimiter) else {
                        // Everything except a possible delimiter prefix at the tail is body.
                        let keep = self.delimiter.len() - 1;
                        if self.buffer.len() > keep {
                            let release = self.buffer.len() - keep;
                            let chunk = self.buffer.split_to(release).freeze();
                            return ParseOutcome::Emit(Ok(PartEvent::Data(chunk)));
                        }
                        return ParseOutcome::NeedMore;
                    };

                    if split > 0 {
                        let chunk = self.buffer.split_to(split).freeze();
                        return ParseOutcome::Emit(Ok(PartEvent::Data(chunk)));
                    }

                    let suffix = &self.buffer[self.delimiter.len()..];
                    let (consumed, is_terminal) = if suffix.starts_with(b"\r\n") {
                        (self.delimiter.len() + 2, false)
                    } else if suffix.starts_with(b"--\r\n") {
                        (self.delimiter.len() + 4, true)
                    } else if !self.upstream_done
                        && suffix.len() < 4
                        && (b"--\r\n".starts_with(suffix) || b"\r\n".starts_with(suffix))
                    {
                        return ParseOutcome::NeedMore;
                    } else if self.upstream_done && suffix.starts_with(b"--") {
                        (self.buffer.len(), true)
                    } else {
                        return self.fail("malformed multipart boundary");
                    };

                    let _ = self.buffer.split_to(consumed);
                    self.state = if is_terminal {
                        ParseState::End
                    } else {
                        ParseState::Headers
                    };

                    return ParseOutcome::Emit(Ok(PartEvent::End));
                }
                ParseState::End | ParseState::Failed => return ParseOutcome::Done,
            }
        }
    }
}

#[derive(Debug)]
enum ParseOutcome {
    NeedMore,
    Emit(Result<PartEvent, UploadError>),
    Done,
}

fn parse_header_block(raw: &[u8]) -> Result<HeaderMap, ParseError> {
    let text = std::str::from_utf8(raw).map_err(|_| ParseError::new("part headers must be UTF-8"))?;
    let mut headers = HeaderMap::new();

    for line in text.split("\r\n") {
        if line.is_empty() {
            continue;
        }

        let Some((raw_name, raw_value)) = line.split_once(':') else {
            return Err(ParseError::new("invalid part header line"));
        };

        let name = raw_name
            .trim()
            .parse::<HeaderName>()
            .map_err(|_| ParseError::new("invalid part header name"))?;
        let value = HeaderValue::from_str(raw_value.trim())
            .map_err(|_| ParseError::new("invalid part header value"))?;
        headers.append(name, value);
    }

    if !headers.contains_key(header::CONTENT_DISPOSITION) {
        return Err(ParseError::new("missing Content-Disposition header"));
    }

    Ok(headers)
}

fn take_line(buffer: &mut BytesMut) -> Option<Bytes> {
    let split = find_subslice(buffer, b"\r\n")?;
    let line = buffer.split_to(split).freeze();
    let _ = buffer.split_to(2);
    Some(line)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }

    haystack.windows(needle.len()).position(|window| window == needle)
}

fn validate_boundary_input(boundary: &str) -> Result<(), ParseError> {
    if boundary.is_empty() {
        return Err(ParseError::new("multipart boundary cannot be empty"));
    }

    if boundary.contains('\r') || boundary.contains('\n') {
        return Err(ParseError::new("multipart boundary cannot contain CRLF"));
    }

    Ok(())
}
