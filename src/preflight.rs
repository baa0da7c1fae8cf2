//! Pre-flight validation of client-declared uploads.
//!
//! The JSON body maps each form field to one descriptor or an array of
//! descriptors: `{"avatar": {"name": "a.png", "size": 512}}`. Declared sizes
//! are trusted as-is and nothing touches the filesystem.

use std::fmt;

use serde::{
    Deserialize, Deserializer,
    de::{MapAccess, Visitor},
};

use crate::{
    config::UploadOptions,
    error::UploadError,
    validator::{self, FileDescriptor, ValidationReport},
};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DescriptorEntry {
    One(FileDescriptor),
    Many(Vec<FileDescriptor>),
}

// Keeps object keys in document order.
struct DescriptorMap(Vec<(String, DescriptorEntry)>);

impl<'de> Deserialize<'de> for DescriptorMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = DescriptorMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping field names to file descriptors")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, DescriptorEntry>()? {
                    entries.push(entry);
                }
                Ok(DescriptorMap(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Decodes a pre-flight body into `(field name, descriptor)` pairs in document order.
pub fn parse_descriptor(json: &[u8]) -> Result<Vec<(String, FileDescriptor)>, UploadError> {
    let DescriptorMap(entries) = serde_json::from_slice(json)?;

    let mut descriptors = Vec::new();
    for (field, entry) in entries {
        match entry {
            DescriptorEntry::One(descriptor) => descriptors.push((field, descriptor)),
            DescriptorEntry::Many(many) => descriptors.extend(
                many.into_iter()
                    .map(|descriptor| (field.clone(), descriptor)),
            ),
        }
    }

    Ok(descriptors)
}

/// Runs the upload checks against declared names and sizes.
pub fn validate_descriptor(
    json: &[u8],
    options: &UploadOptions,
) -> Result<ValidationReport, UploadError> {
    let descriptors: Vec<FileDescriptor> = parse_descriptor(json)?
        .into_iter()
        .map(|(_, descriptor)| descriptor)
        .collect();
    let total = descriptors
        .iter()
        .fold(0u64, |total, descriptor| total.saturating_add(descriptor.size));

    Ok(validator::validate(&descriptors, total, options))
}

/// Ensures the request declares a JSON body.
pub fn check_content_type(content_type: Option<&str>) -> Result<(), UploadError> {
    let raw = content_type
        .ok_or_else(|| UploadError::invalid_content_type("missing Content-Type header"))?;
    let mime = raw
        .parse::<mime::Mime>()
        .map_err(|_| UploadError::invalid_content_type("invalid Content-Type header"))?;

    if mime.essence_str() != mime::APPLICATION_JSON.essence_str() {
        return Err(UploadError::invalid_content_type(
            "Content-Type must be application/json",
        ));
    }

    Ok(())
}

/// Full pre-flight check: content type, decoding and validation.
///
/// Any violation becomes [`UploadError::Rejected`] carrying the whole report.
pub fn preflight(
    content_type: Option<&str>,
    body: &[u8],
    options: &UploadOptions,
) -> Result<(), UploadError> {
    check_content_type(content_type)?;
    let report = validate_descriptor(body, options)?;

    if report.is_empty() {
        return Ok(());
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        violations = report.len(),
        reason = %report,
        "preflight: declared upload rejected"
    );

    Err(UploadError::Rejected(report))
}
