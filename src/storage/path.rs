use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Datelike, Timelike, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use uuid::Uuid;

use crate::{config::UploadOptions, error::StorageError};

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Storage location chosen for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPath {
    /// Random unique identifier embedded in the path.
    pub id: String,
    /// Path relative to where the storage root is declared.
    pub relative_path: PathBuf,
    /// `relative_path` with every segment percent-encoded and `/` separators.
    pub relative_url: String,
    /// Filesystem path the file is written to.
    pub absolute_path: PathBuf,
}

/// Produces collision-free storage paths of the form
/// `root/Y/M/D/h/m/s/<uuid>/<filename>` (or `root/<uuid>/<filename>`).
///
/// Timestamp segments are taken from the UTC clock and are not zero-padded,
/// so a file stored at 09:05:02 UTC on 7 March 2024 lands under
/// `root/2024/3/7/9/5/2/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathGenerator {
    root: PathBuf,
    timestamp_subdirectories: bool,
    relative_to_working_dir: bool,
}

impl PathGenerator {
    /// Creates a generator rooted at `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        timestamp_subdirectories: bool,
        relative_to_working_dir: bool,
    ) -> Self {
        Self {
            root: root.into(),
            timestamp_subdirectories,
            relative_to_working_dir,
        }
    }

    /// Creates a generator from upload options.
    pub fn from_options(options: &UploadOptions) -> Self {
        Self::new(
            options.storage_root.clone(),
            options.timestamp_subdirectories,
            options.relative_to_working_dir,
        )
    }

    /// Storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Chooses a path for `file_name` at instant `now` without touching the filesystem.
    pub fn plan(&self, file_name: &str, now: DateTime<Utc>) -> Result<GeneratedPath, StorageError> {
        let id = Uuid::new_v4().to_string();
        let mut relative_path = self.root.clone();

        if self.timestamp_subdirectories {
            for segment in [
                now.year().to_string(),
                now.month().to_string(),
                now.day().to_string(),
                now.hour().to_string(),
                now.minute().to_string(),
                now.second().to_string(),
            ] {
                relative_path.push(segment);
            }
        }

        relative_path.push(&id);
        relative_path.push(sanitize_filename(file_name));

        let absolute_path = if self.relative_to_working_dir {
            let cwd = std::env::current_dir()
                .map_err(|err| StorageError::io("resolve working directory", ".", err))?;
            cwd.join(&relative_path)
        } else {
            relative_path.clone()
        };

        Ok(GeneratedPath {
            relative_url: encode_url_path(&relative_path),
            id,
            relative_path,
            absolute_path,
        })
    }

    /// Chooses a path for `file_name` and creates its parent directories.
    pub async fn generate(&self, file_name: &str) -> Result<GeneratedPath, StorageError> {
        let generated = self.plan(file_name, Utc::now())?;

        if let Some(parent) = generated.absolute_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| StorageError::io("create directory", parent, err))?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            id = generated.id.as_str(),
            path = %generated.absolute_path.display(),
            "path generator: reserved storage path"
        );

        Ok(generated)
    }

    /// Removes the directories [`PathGenerator::generate`] created for
    /// `generated` once its file is gone.
    ///
    /// Walks up from the id directory and stops below the storage root or at
    /// the first directory that is still in use.
    pub async fn release(&self, generated: &GeneratedPath) {
        let root_depth = self.root.components().count();
        let created = generated
            .relative_path
            .components()
            .count()
            .saturating_sub(root_depth + 1);

        let mut dir = generated.absolute_path.parent();
        for _ in 0..created {
            let Some(current) = dir else {
                break;
            };
            if tokio::fs::remove_dir(current).await.is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}

/// Joins the components of `path` with `/`, percent-encoding each segment.
pub fn encode_url_path(path: &Path) -> String {
    let mut out = String::new();

    for component in path.components() {
        let segment = match component {
            Component::Prefix(_) => continue,
            Component::RootDir => {
                out.push('/');
                continue;
            }
            Component::CurDir => ".".to_owned(),
            Component::ParentDir => "..".to_owned(),
            Component::Normal(raw) => {
                utf8_percent_encode(&raw.to_string_lossy(), PATH_SEGMENT).to_string()
            }
        };

        if !out.is_empty() && !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(&segment);
    }

    out
}

/// Reduces an uploaded filename to a single safe path segment.
///
/// Directory components are dropped and characters reserved by common
/// filesystems are replaced with `_`. Spaces and non-ASCII text are kept.
pub fn sanitize_filename(input: &str) -> String {
    let base = input.rsplit(['/', '\\']).next().unwrap_or(input);

    let sanitized: String = base
        .chars()
        .map(|ch| {
            if ch.is_control() || matches!(ch, ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                ch
            }
        })
        .collect();

    let sanitized = sanitized.trim_end_matches(['.', ' ']);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return "file".to_owned();
    }

    sanitized.to_owned()
}
