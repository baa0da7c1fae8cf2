use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;

/// How file bytes travel from the request body to their final location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Spool each file part into a temporary file and move it into place
    /// only after the whole request passed validation.
    #[default]
    BufferThenMove,
    /// Write each file part straight to its generated path while it is
    /// received. Files of a rejected request are removed afterwards.
    DirectStream,
}

/// Upload pipeline configuration.
///
/// Every field has a permissive default: unrestricted extensions, unbounded
/// sizes, files persisted under `uploads/` in timestamped directories.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UploadOptions {
    /// Directory under which generated paths are rooted.
    pub storage_root: PathBuf,
    /// Allowed filename extensions, compared case-sensitively. Empty means unrestricted.
    pub allowed_extensions: Vec<String>,
    /// Maximum aggregate size of all file parts in one request.
    pub max_total_bytes: Option<u64>,
    /// Maximum size of a single file part.
    pub max_file_bytes: Option<u64>,
    /// Maximum size of a scalar (non-file) form field. Falls back to
    /// `max_total_bytes` when unset.
    pub max_field_bytes: Option<u64>,
    /// Keep written files on disk. When `false` files are removed right after writing.
    pub persist_to_disk: bool,
    /// Keep a copy of each file's bytes on the resulting [`crate::StoredFile`].
    pub retain_in_memory: bool,
    /// Resolve generated paths against the process working directory.
    pub relative_to_working_dir: bool,
    /// Insert `year/month/day/hour/minute/second` directories before the unique id.
    pub timestamp_subdirectories: bool,
    /// Storage writer strategy.
    pub write_mode: WriteMode,
    /// Directory for temporary spool files in [`WriteMode::BufferThenMove`].
    /// Defaults to the system temp directory.
    pub staging_dir: Option<PathBuf>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("uploads"),
            allowed_extensions: Vec::new(),
            max_total_bytes: None,
            max_file_bytes: None,
            max_field_bytes: None,
            persist_to_disk: true,
            retain_in_memory: false,
            relative_to_working_dir: true,
            timestamp_subdirectories: true,
            write_mode: WriteMode::default(),
            staging_dir: None,
        }
    }
}

impl UploadOptions {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks option consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStorageRoot);
        }

        if self.allowed_extensions.iter().any(String::is_empty) {
            return Err(ConfigError::EmptyExtension);
        }

        check_positive("max_total_bytes", self.max_total_bytes)?;
        check_positive("max_file_bytes", self.max_file_bytes)?;
        check_positive("max_field_bytes", self.max_field_bytes)?;

        if let (Some(value), Some(max_total_bytes)) = (self.max_file_bytes, self.max_total_bytes) {
            if value > max_total_bytes {
                return Err(ConfigError::LimitExceedsTotalSize {
                    value,
                    max_total_bytes,
                });
            }
        }

        Ok(())
    }

    /// Staging directory used by [`WriteMode::BufferThenMove`].
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

fn check_positive(limit: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    if value == Some(0) {
        return Err(ConfigError::InvalidLimitValue { limit });
    }
    Ok(())
}
