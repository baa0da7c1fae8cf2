//! Upload pipeline: receive parts, validate the whole request, then store or reject.

use bytes::Bytes;
use futures::Stream;

use crate::{
    config::UploadOptions,
    error::UploadError,
    multipart::Multipart,
    part::Part,
    result::{FormFields, UploadOutput, UploadResult},
    storage::{PartSink, StagedFile, StorageWriter},
    validator::{self, FileDescriptor, ValidationReport, Violation, extension_allowed},
};

/// Progress of one upload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    /// Reading parts from the body.
    Receiving,
    /// Checking the received parts against the options.
    Validating,
    /// At least one check failed; nothing is stored.
    Rejected,
    /// Committing accepted files in arrival order.
    Storing,
    /// Result assembled.
    Done,
}

type StagedOf<W> = <<W as StorageWriter>::Sink as PartSink>::Staged;

struct Pending<F> {
    field_name: String,
    file: F,
}

struct Received<F> {
    staged: Vec<Pending<F>>,
    descriptors: Vec<FileDescriptor>,
    fields: Vec<(String, String)>,
    total: u64,
}

impl<F: StagedFile> Received<F> {
    fn new() -> Self {
        Self {
            staged: Vec::new(),
            descriptors: Vec::new(),
            fields: Vec::new(),
            total: 0,
        }
    }

    async fn discard(self) {
        for pending in self.staged {
            pending.file.discard().await;
        }
    }
}

enum PartFlow {
    Complete,
    // Aggregate limit crossed; the rest of the body is not read.
    Truncated,
}

pub(crate) struct UploadPipeline<'a, W> {
    options: &'a UploadOptions,
    writer: &'a W,
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    stage: UploadStage,
}

impl<'a, W> UploadPipeline<'a, W>
where
    W: StorageWriter,
{
    pub(crate) fn new(options: &'a UploadOptions, writer: &'a W) -> Self {
        Self {
            options,
            writer,
            stage: UploadStage::Receiving,
        }
    }

    fn transition(&mut self, next: UploadStage) {
        #[cfg(feature = "tracing")]
        tracing::debug!(from = ?self.stage, to = ?next, "upload pipeline: stage transition");
        self.stage = next;
    }

    pub(crate) async fn run<S>(
        mut self,
        content_type: Option<&str>,
        content_length: Option<u64>,
        body: S,
    ) -> Result<UploadOutput, UploadError>
    where
        S: Stream<Item = Result<Bytes, UploadError>> + Unpin,
    {
        let content_type = content_type
            .ok_or_else(|| UploadError::invalid_content_type("missing Content-Type header"))?;
        let mut multipart = Multipart::from_content_type(content_type, body)?;

        if let (Some(length), Some(max_total_bytes)) = (content_length, self.options.max_total_bytes) {
            if length > max_total_bytes {
                let mut report = ValidationReport::new();
                report.push(Violation::TotalTooLarge {
                    total: length,
                    max_total_bytes,
                });
                return Err(self.reject(report));
            }
        }

        let mut received = Received::new();
        if let Err(err) = self.receive(&mut multipart, &mut received).await {
            received.discard().await;
            return Err(err);
        }

        self.transition(UploadStage::Validating);
        let report = validator::validate(&received.descriptors, received.total, self.options);
        if !report.is_empty() {
            received.discard().await;
            return Err(self.reject(report));
        }

        self.transition(UploadStage::Storing);
        let mut files = UploadResult::new();
        let mut staged = received.staged.into_iter();
        while let Some(pending) = staged.next() {
            match pending.file.commit().await {
                Ok(stored) => files.push(pending.field_name, stored),
                Err(err) => {
                    for rest in staged {
                        rest.file.discard().await;
                    }
                    return Err(err.into());
                }
            }
        }

        self.transition(UploadStage::Done);
        Ok(UploadOutput {
            files,
            fields: FormFields(received.fields),
        })
    }

    fn reject(&mut self, report: ValidationReport) -> UploadError {
        self.transition(UploadStage::Rejected);

        #[cfg(feature = "tracing")]
        tracing::warn!(
            violations = report.len(),
            reason = %report,
            "upload pipeline: request rejected"
        );

        UploadError::Rejected(report)
    }

    async fn receive<S>(
        &self,
        multipart: &mut Multipart<S>,
        received: &mut Received<StagedOf<W>>,
    ) -> Result<(), UploadError>
    where
        S: Stream<Item = Result<Bytes, UploadError>> + Unpin,
    {
        // Scalar values are buffered, so they are never left unbounded
        // while an aggregate limit is configured.
        let field_limit = self
            .options
            .max_field_bytes
            .or(self.options.max_total_bytes);

        while let Some(mut part) = multipart.next_part().await? {
            let Some(meta) = part.headers().file_meta() else {
                let field_name = part.field_name().to_owned();
                let value = part.text_limited(field_limit).await?;
                received.fields.push((field_name, value));
                continue;
            };

            // Browsers send an empty filename for an unselected file input.
            if meta.file_name.is_empty() {
                continue;
            }
            let index = received.descriptors.len();
            received
                .descriptors
                .push(FileDescriptor::new(meta.file_name.clone(), 0));

            // Disallowed extensions are drained without ever touching storage.
            let mut sink = if extension_allowed(&meta.file_name, &self.options.allowed_extensions) {
                Some(self.writer.begin(&meta).await?)
            } else {
                None
            };

            let flow = match self.stream_part(&mut part, &mut sink, received, index).await {
                Ok(flow) => flow,
                Err(err) => {
                    if let Some(active) = sink {
                        active.abort().await;
                    }
                    return Err(err);
                }
            };

            match (flow, sink) {
                (PartFlow::Truncated, Some(active)) => {
                    active.abort().await;
                    return Ok(());
                }
                (PartFlow::Truncated, None) => return Ok(()),
                (PartFlow::Complete, Some(active)) => {
                    let file = active.finish().await?;
                    received.staged.push(Pending {
                        field_name: meta.field_name,
                        file,
                    });
                }
                (PartFlow::Complete, None) => {}
            }
        }

        Ok(())
    }

    async fn stream_part<S>(
        &self,
        part: &mut Part<'_, S>,
        sink: &mut Option<W::Sink>,
        received: &mut Received<StagedOf<W>>,
        index: usize,
    ) -> Result<PartFlow, UploadError>
    where
        S: Stream<Item = Result<Bytes, UploadError>> + Unpin,
    {
        while let Some(chunk) = part.chunk().await? {
            received.total = received.total.saturating_add(chunk.len() as u64);
            received.descriptors[index].size = part.size();

            if self
                .options
                .max_total_bytes
                .is_some_and(|max_total_bytes| received.total > max_total_bytes)
            {
                return Ok(PartFlow::Truncated);
            }

            // Keep counting an oversized part so the report can cite its real size.
            if self
                .options
                .max_file_bytes
                .is_some_and(|max_file_bytes| part.size() > max_file_bytes)
            {
                if let Some(oversized) = sink.take() {
                    oversized.abort().await;
                }
                continue;
            }

            if let Some(active) = sink.as_mut() {
                active.write_chunk(&chunk).await?;
            }
        }

        Ok(PartFlow::Complete)
    }
}
