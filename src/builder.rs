use std::path::PathBuf;

use crate::{
    Uploader,
    config::{UploadOptions, WriteMode},
    error::ConfigError,
    storage::DiskWriter,
};

/// Builder for configuring an [`Uploader`].
#[derive(Debug, Clone, Default)]
pub struct UploaderBuilder {
    options: UploadOptions,
}

impl UploaderBuilder {
    /// Creates a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current options snapshot.
    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Replaces all options.
    pub fn with_options(mut self, options: UploadOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the directory generated paths are rooted at.
    pub fn storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.options.storage_root = root.into();
        self
    }

    /// Restricts uploads to the given extensions (case-sensitive, without the dot).
    pub fn allowed_extensions<I, E>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        self.options.allowed_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the aggregate size ceiling for all files of a request.
    pub fn max_total_bytes(mut self, max: u64) -> Self {
        self.options.max_total_bytes = Some(max);
        self
    }

    /// Sets the size ceiling for a single file.
    pub fn max_file_bytes(mut self, max: u64) -> Self {
        self.options.max_file_bytes = Some(max);
        self
    }

    /// Sets the size ceiling for a scalar form field.
    pub fn max_field_bytes(mut self, max: u64) -> Self {
        self.options.max_field_bytes = Some(max);
        self
    }

    /// Keeps (`true`) or removes (`false`) files after writing.
    pub fn persist_to_disk(mut self, persist: bool) -> Self {
        self.options.persist_to_disk = persist;
        self
    }

    /// Keeps a copy of each file's bytes on the stored metadata.
    pub fn retain_in_memory(mut self, retain: bool) -> Self {
        self.options.retain_in_memory = retain;
        self
    }

    /// Resolves generated paths against the working directory.
    pub fn relative_to_working_dir(mut self, relative: bool) -> Self {
        self.options.relative_to_working_dir = relative;
        self
    }

    /// Toggles `year/month/day/hour/minute/second` directories.
    pub fn timestamp_subdirectories(mut self, enabled: bool) -> Self {
        self.options.timestamp_subdirectories = enabled;
        self
    }

    /// Selects the storage write strategy.
    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.options.write_mode = mode;
        self
    }

    /// Sets the spool directory for [`WriteMode::BufferThenMove`].
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.staging_dir = Some(dir.into());
        self
    }

    /// Validates builder options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.options.validate()
    }

    /// Finalizes and returns validated options.
    pub fn build_options(self) -> Result<UploadOptions, ConfigError> {
        self.options.validate()?;
        Ok(self.options)
    }

    /// Builds an uploader backed by [`DiskWriter`].
    pub fn build(self) -> Result<Uploader<DiskWriter>, ConfigError> {
        Uploader::new(self.options)
    }

    /// Builds an uploader backed by a custom storage writer.
    pub fn build_with_writer<W>(self, writer: W) -> Result<Uploader<W>, ConfigError> {
        Uploader::with_writer(self.options, writer)
    }
}
