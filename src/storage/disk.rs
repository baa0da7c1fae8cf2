use std::{
    io,
    path::{Path, PathBuf},
};

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use tempfile::TempPath;
use tokio::{fs::File, io::AsyncWriteExt};

use super::{
    FileMeta, GeneratedPath, PartSink, PathGenerator, StagedFile, StorageWriter, StoredFile,
};
use crate::{
    config::{UploadOptions, WriteMode},
    error::StorageError,
};

// Retries when a concurrent cleanup prunes a shared timestamp directory
// between creating it and opening the file.
const CREATE_ATTEMPTS: usize = 3;

/// Disk-backed storage writer.
///
/// In [`WriteMode::BufferThenMove`] bodies are spooled into temporary files
/// and moved under the storage root on commit. In [`WriteMode::DirectStream`]
/// the final path is reserved when the part starts and bytes go straight there.
#[derive(Debug, Clone)]
pub struct DiskWriter {
    paths: PathGenerator,
    mode: WriteMode,
    staging_dir: PathBuf,
    persist_to_disk: bool,
    retain_in_memory: bool,
}

impl DiskWriter {
    /// Creates a writer configured from upload options.
    pub fn from_options(options: &UploadOptions) -> Self {
        Self {
            paths: PathGenerator::from_options(options),
            mode: options.write_mode,
            staging_dir: options.staging_dir(),
            persist_to_disk: options.persist_to_disk,
            retain_in_memory: options.retain_in_memory,
        }
    }

    /// Active write strategy.
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Path generator used for final locations.
    pub fn paths(&self) -> &PathGenerator {
        &self.paths
    }

    async fn open_spool(&self) -> Result<(File, TempPath), StorageError> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|err| StorageError::io("create directory", &self.staging_dir, err))?;

        let spool = tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(&self.staging_dir)
            .map_err(|err| StorageError::io("create staging file", &self.staging_dir, err))?;
        let (file, temp_path) = spool.into_parts();
        Ok((File::from_std(file), temp_path))
    }

    async fn create_final(&self, file_name: &str) -> Result<(File, GeneratedPath), StorageError> {
        let mut attempt = 1;
        loop {
            let generated = self.paths.generate(file_name).await?;
            match File::create(&generated.absolute_path).await {
                Ok(file) => return Ok((file, generated)),
                Err(err) if err.kind() == io::ErrorKind::NotFound && attempt < CREATE_ATTEMPTS => {
                    attempt += 1;
                }
                Err(err) => {
                    return Err(StorageError::io("create file", &generated.absolute_path, err));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl StorageWriter for DiskWriter {
    type Sink = DiskSink;

    async fn begin(&self, meta: &FileMeta) -> Result<Self::Sink, StorageError> {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            field_name = meta.field_name.as_str(),
            file_name = meta.file_name.as_str(),
            content_type = meta.content_type.as_str(),
            mode = ?self.mode,
            "disk writer: begin file part"
        );

        let (file, location) = match self.mode {
            WriteMode::DirectStream => {
                let (file, generated) = self.create_final(&meta.file_name).await?;
                (file, Location::Final(generated))
            }
            WriteMode::BufferThenMove => {
                let (file, temp_path) = self.open_spool().await?;
                (file, Location::Spool(temp_path))
            }
        };

        Ok(DiskSink {
            file,
            location,
            meta: meta.clone(),
            paths: self.paths.clone(),
            persist_to_disk: self.persist_to_disk,
            size: 0,
            memory: self.retain_in_memory.then(BytesMut::new),
        })
    }
}

#[derive(Debug)]
enum Location {
    Final(GeneratedPath),
    Spool(TempPath),
}

impl Location {
    fn path(&self) -> &Path {
        match self {
            Self::Final(generated) => generated.absolute_path.as_path(),
            Self::Spool(temp_path) => &**temp_path,
        }
    }

    async fn release(self, paths: &PathGenerator) {
        match self {
            Self::Final(generated) => {
                let _ = tokio::fs::remove_file(&generated.absolute_path).await;
                paths.release(&generated).await;
            }
            // Dropping the temp path deletes the spool file.
            Self::Spool(temp_path) => drop(temp_path),
        }
    }
}

/// Sink writing one file part to disk.
#[derive(Debug)]
pub struct DiskSink {
    file: File,
    location: Location,
    meta: FileMeta,
    paths: PathGenerator,
    persist_to_disk: bool,
    size: u64,
    memory: Option<BytesMut>,
}

#[async_trait::async_trait]
impl PartSink for DiskSink {
    type Staged = DiskStagedFile;

    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|err| StorageError::io("write file", self.location.path(), err))?;
        self.size = self.size.saturating_add(chunk.len() as u64);
        if let Some(memory) = self.memory.as_mut() {
            memory.extend_from_slice(chunk);
        }
        Ok(())
    }

    async fn finish(mut self) -> Result<Self::Staged, StorageError> {
        if let Err(err) = self.file.flush().await {
            let err = StorageError::io("flush file", self.location.path(), err);
            drop(self.file);
            self.location.release(&self.paths).await;
            return Err(err);
        }
        drop(self.file);

        Ok(DiskStagedFile {
            location: self.location,
            meta: self.meta,
            paths: self.paths,
            persist_to_disk: self.persist_to_disk,
            size: self.size,
            memory: self.memory.map(BytesMut::freeze),
        })
    }

    async fn abort(self) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            file_name = self.meta.file_name.as_str(),
            written = self.size,
            "disk writer: aborting file part"
        );

        drop(self.file);
        self.location.release(&self.paths).await;
    }
}

/// File part fully written to disk, waiting for commit or discard.
#[derive(Debug)]
pub struct DiskStagedFile {
    location: Location,
    meta: FileMeta,
    paths: PathGenerator,
    persist_to_disk: bool,
    size: u64,
    memory: Option<Bytes>,
}

#[async_trait::async_trait]
impl StagedFile for DiskStagedFile {
    fn size(&self) -> u64 {
        self.size
    }

    async fn commit(self) -> Result<StoredFile, StorageError> {
        let generated = match self.location {
            Location::Final(generated) => {
                if !self.persist_to_disk {
                    remove_file(&generated.absolute_path).await?;
                    self.paths.release(&generated).await;
                }
                generated
            }
            Location::Spool(temp_path) if !self.persist_to_disk => {
                drop(temp_path);
                self.paths.plan(&self.meta.file_name, Utc::now())?
            }
            Location::Spool(temp_path) => {
                let generated = self.paths.generate(&self.meta.file_name).await?;
                move_into_place(temp_path, &generated.absolute_path).await?;
                generated
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            field_name = self.meta.field_name.as_str(),
            id = generated.id.as_str(),
            size = self.size,
            persisted = self.persist_to_disk,
            path = %generated.absolute_path.display(),
            "disk writer: committed file"
        );

        Ok(StoredFile {
            field_name: self.meta.field_name,
            original_filename: self.meta.file_name,
            content_type: self.meta.content_type,
            size: self.size,
            id: generated.id,
            relative_url: generated.relative_url,
            absolute_path: generated.absolute_path,
            in_memory: self.memory,
        })
    }

    async fn discard(self) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            file_name = self.meta.file_name.as_str(),
            path = %self.location.path().display(),
            "disk writer: discarding staged file"
        );

        self.location.release(&self.paths).await;
    }
}

async fn move_into_place(temp_path: TempPath, target: &Path) -> Result<(), StorageError> {
    if tokio::fs::rename(&temp_path, target).await.is_ok() {
        let _ = temp_path.keep();
        return Ok(());
    }

    // Staging dir on another filesystem.
    tokio::fs::copy(&temp_path, target)
        .await
        .map_err(|err| StorageError::io("copy staged file", target, err))?;
    drop(temp_path);
    Ok(())
}

async fn remove_file(path: &Path) -> Result<(), StorageError> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|err| StorageError::io("remove file", path, err))
}
