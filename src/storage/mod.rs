//! Storage writer abstractions and the built-in disk writer.

use std::path::PathBuf;

use bytes::Bytes;
use serde::Serialize;

use crate::error::StorageError;

/// Disk-backed storage writer implementation.
pub mod disk;
/// Collision-free storage path generation.
pub mod path;

pub use disk::DiskWriter;
pub use path::{GeneratedPath, PathGenerator, encode_url_path, sanitize_filename};

/// Metadata describing a file part before any of its bytes are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Multipart field name.
    pub field_name: String,
    /// Original filename from the multipart part.
    pub file_name: String,
    /// Content type declared on the file part.
    pub content_type: String,
}

/// Metadata describing a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// Multipart field name.
    pub field_name: String,
    /// Filename as sent by the client.
    pub original_filename: String,
    /// Content type declared on the file part.
    pub content_type: String,
    /// Stored size in bytes.
    pub size: u64,
    /// Unique identifier embedded in the storage path.
    pub id: String,
    /// Percent-encoded relative path, suitable for building URLs.
    pub relative_url: String,
    /// Filesystem location of the file.
    pub absolute_path: PathBuf,
    /// Copy of the file bytes when in-memory retention is enabled.
    #[serde(skip)]
    pub in_memory: Option<Bytes>,
}

/// Storage backend that receives file parts while a request is being read.
///
/// The pipeline opens one [`PartSink`] per accepted file part, feeds it the
/// part's body chunks and finally either commits or discards the resulting
/// [`StagedFile`] depending on whole-request validation.
#[async_trait::async_trait]
pub trait StorageWriter: Send + Sync + 'static {
    /// Sink type receiving one file's bytes.
    type Sink: PartSink;

    /// Opens a sink for a file part about to be received.
    async fn begin(&self, meta: &FileMeta) -> Result<Self::Sink, StorageError>;
}

/// Receives the body of a single file part.
#[async_trait::async_trait]
pub trait PartSink: Send {
    /// File produced once the body has been fully received.
    type Staged: StagedFile;

    /// Appends one body chunk.
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError>;

    /// Completes the body and returns the staged file.
    async fn finish(self) -> Result<Self::Staged, StorageError>;

    /// Drops everything written so far.
    async fn abort(self);
}

/// A fully received file awaiting the request-level verdict.
#[async_trait::async_trait]
pub trait StagedFile: Send {
    /// Received size in bytes.
    fn size(&self) -> u64;

    /// Makes the file permanent and describes where it ended up.
    async fn commit(self) -> Result<StoredFile, StorageError>;

    /// Releases every resource held by the staged file.
    async fn discard(self);
}
