#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core crate surface for `uploadgear`.
//!
//! [`Uploader`] reads a `multipart/form-data` body, validates every file part
//! against extension and size policy, and only then stores accepted files
//! under collision-free generated paths. [`Uploader::preflight`] runs the same
//! checks against a JSON description of the files before any byte is sent.

/// Fluent builder API.
pub mod builder;
/// Upload configuration.
pub mod config;
/// Request-context capability.
pub mod context;
/// Error types exposed by this crate.
pub mod error;
/// Multipart body reader.
pub mod multipart;
/// Multipart part API.
pub mod part;
/// Low-level parser components.
pub mod parser;
/// Upload state machine.
pub mod pipeline;
/// Pre-flight descriptor validation.
pub mod preflight;
/// Upload result model.
pub mod result;
/// Storage writer traits and implementations.
pub mod storage;
/// Extension and size checks.
pub mod validator;

#[cfg(feature = "axum")]
pub mod axum;

pub use builder::UploaderBuilder;
pub use config::{UploadOptions, WriteMode};
pub use context::{BodyStream, RequestContext, UploadRequest};
pub use error::{ConfigError, ParseError, StorageError, UploadError};
pub use multipart::Multipart;
pub use parser::PartKind;
pub use part::Part;
pub use pipeline::UploadStage;
pub use result::{FormFields, UploadOutput, UploadResult, Uploaded};
pub use storage::{
    DiskWriter, FileMeta, GeneratedPath, PartSink, PathGenerator, StagedFile, StorageWriter,
    StoredFile,
};
pub use validator::{FileDescriptor, ValidationReport, Violation};

use bytes::Bytes;
use futures::Stream;
use http::header;

use crate::pipeline::UploadPipeline;

/// Main `uploadgear` entry point.
#[derive(Debug)]
pub struct Uploader<W = DiskWriter> {
    options: UploadOptions,
    writer: W,
}

impl Uploader<DiskWriter> {
    /// Creates an uploader writing to disk as described by `options`.
    pub fn new(options: UploadOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let writer = DiskWriter::from_options(&options);
        Ok(Self { options, writer })
    }

    /// Creates a fluent builder with permissive defaults.
    pub fn builder() -> UploaderBuilder {
        UploaderBuilder::default()
    }
}

impl<W> Uploader<W> {
    /// Creates an uploader with a custom storage writer.
    pub fn with_writer(options: UploadOptions, writer: W) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self { options, writer })
    }

    /// Returns the active options.
    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Returns the configured storage writer.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Validates a pre-flight JSON body of declared file names and sizes.
    pub fn preflight(&self, content_type: Option<&str>, body: &[u8]) -> Result<(), UploadError> {
        preflight::preflight(content_type, body, &self.options)
    }
}

impl<W> Uploader<W>
where
    W: StorageWriter,
{
    /// Reads, validates and stores one multipart body.
    ///
    /// Nothing is committed unless every check passes; a rejected request
    /// returns [`UploadError::Rejected`] with the complete violation list.
    pub async fn process<S>(
        &self,
        content_type: Option<&str>,
        content_length: Option<u64>,
        body: S,
    ) -> Result<UploadOutput, UploadError>
    where
        S: Stream<Item = Result<Bytes, UploadError>> + Unpin,
    {
        UploadPipeline::new(&self.options, &self.writer)
            .run(content_type, content_length, body)
            .await
    }

    /// Runs [`Uploader::process`] against a request context and attaches the output.
    ///
    /// On error nothing is attached and the caller must not run downstream handling.
    pub async fn handle<R>(&self, request: &mut R) -> Result<(), UploadError>
    where
        R: UploadRequest,
    {
        let content_type = request.header(&header::CONTENT_TYPE).map(ToOwned::to_owned);
        let content_length = request
            .header(&header::CONTENT_LENGTH)
            .and_then(|value| value.trim().parse::<u64>().ok());
        let body = request.take_body().ok_or(UploadError::BodyConsumed)?;

        let output = self
            .process(content_type.as_deref(), content_length, body)
            .await?;
        request.attach(output);
        Ok(())
    }
}
