use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::UploadOptions;

/// Name and size of one file, either measured from a received part or
/// declared by a client ahead of the transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Original filename.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

impl FileDescriptor {
    /// Creates a descriptor.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// A single failed upload check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// The filename extension is not in the allow-list.
    #[error(
        "file `{file_name}` has disallowed extension `{extension}` (allowed: {})",
        .allowed.join(", ")
    )]
    DisallowedExtension {
        /// Offending filename.
        file_name: String,
        /// Extension found after the last `.`.
        extension: String,
        /// Configured allow-list.
        allowed: Vec<String>,
    },
    /// The filename has no `.` while an allow-list is configured.
    #[error("file `{file_name}` has no extension (allowed: {})", .allowed.join(", "))]
    MissingExtension {
        /// Offending filename.
        file_name: String,
        /// Configured allow-list.
        allowed: Vec<String>,
    },
    /// A single file is larger than `max_file_bytes`.
    #[error(
        "file `{file_name}` is {size} bytes, exceeding the per-file limit of {max_file_bytes} bytes"
    )]
    FileTooLarge {
        /// Offending filename.
        file_name: String,
        /// Actual or declared size.
        size: u64,
        /// Configured limit.
        max_file_bytes: u64,
    },
    /// All files together are larger than `max_total_bytes`.
    #[error("total upload size of {total} bytes exceeds the limit of {max_total_bytes} bytes")]
    TotalTooLarge {
        /// Actual or declared aggregate size.
        total: u64,
        /// Configured limit.
        max_total_bytes: u64,
    },
}

/// Ordered list of violations. Empty means the upload is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    /// Creates an empty (accepting) report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a violation.
    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Returns `true` when no check failed.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Violations in detection order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Human-readable messages in detection order.
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, violation) in self.violations.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl IntoIterator for ValidationReport {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

/// Returns the substring after the last `.` of `file_name`, if any.
pub fn extension_of(file_name: &str) -> Option<&str> {
    file_name.rsplit_once('.').map(|(_, extension)| extension)
}

/// Returns `true` when `file_name` passes the extension allow-list.
///
/// An empty allow-list accepts everything. Matching is exact and case-sensitive.
pub fn extension_allowed(file_name: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }

    extension_of(file_name).is_some_and(|extension| allowed.iter().any(|a| a == extension))
}

/// Runs every extension, per-file size and aggregate size check.
///
/// Checks never short-circuit: the report lists each failure, per file in
/// input order, followed by the aggregate check.
pub fn validate(parts: &[FileDescriptor], total: u64, options: &UploadOptions) -> ValidationReport {
    let mut report = ValidationReport::new();

    for part in parts {
        if let Some(violation) = check_extension(&part.name, &options.allowed_extensions) {
            report.push(violation);
        }

        if let Some(max_file_bytes) = options.max_file_bytes {
            if part.size > max_file_bytes {
                report.push(Violation::FileTooLarge {
                    file_name: part.name.clone(),
                    size: part.size,
                    max_file_bytes,
                });
            }
        }
    }

    if let Some(max_total_bytes) = options.max_total_bytes {
        if total > max_total_bytes {
            report.push(Violation::TotalTooLarge {
                total,
                max_total_bytes,
            });
        }
    }

    #[cfg(feature = "tracing")]
    if !report.is_empty() {
        tracing::debug!(
            files = parts.len(),
            total = total,
            violations = report.len(),
            "validator: upload rejected"
        );
    }

    report
}

fn check_extension(file_name: &str, allowed: &[String]) -> Option<Violation> {
    if extension_allowed(file_name, allowed) {
        return None;
    }

    Some(match extension_of(file_name) {
        Some(extension) => Violation::DisallowedExtension {
            file_name: file_name.to_owned(),
            extension: extension.to_owned(),
            allowed: allowed.to_vec(),
        },
        None => Violation::MissingExtension {
            file_name: file_name.to_owned(),
            allowed: allowed.to_vec(),
        },
    })
}
