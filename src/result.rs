use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::storage::StoredFile;

/// Files stored for one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Uploaded {
    /// The field carried exactly one file.
    Single(StoredFile),
    /// The field repeated; files are in submission order.
    Multiple(Vec<StoredFile>),
}

impl Uploaded {
    /// Returns the files as a slice regardless of arity.
    pub fn files(&self) -> &[StoredFile] {
        match self {
            Self::Single(file) => std::slice::from_ref(file),
            Self::Multiple(files) => files,
        }
    }

    /// Returns the single file, or `None` when the field repeated.
    pub fn as_single(&self) -> Option<&StoredFile> {
        match self {
            Self::Single(file) => Some(file),
            Self::Multiple(_) => None,
        }
    }

    fn append(self, file: StoredFile) -> Self {
        match self {
            Self::Single(first) => Self::Multiple(vec![first, file]),
            Self::Multiple(mut files) => {
                files.push(file);
                Self::Multiple(files)
            }
        }
    }
}

/// Stored files keyed by form field name, in first-seen field order.
///
/// Serializes as a JSON object: a field sent once maps to a file object, a
/// repeated field maps to an array.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadResult {
    entries: Vec<(String, Uploaded)>,
}

impl UploadResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a file, promoting the field to a sequence when it repeats.
    pub fn push(&mut self, field_name: impl Into<String>, file: StoredFile) {
        let field_name = field_name.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field_name) {
            Some((_, uploaded)) => {
                let previous = std::mem::replace(uploaded, Uploaded::Multiple(Vec::new()));
                *uploaded = previous.append(file);
            }
            None => self.entries.push((field_name, Uploaded::Single(file))),
        }
    }

    /// Looks up the files stored for `field_name`.
    pub fn get(&self, field_name: &str) -> Option<&Uploaded> {
        self.entries
            .iter()
            .find(|(name, _)| name == field_name)
            .map(|(_, uploaded)| uploaded)
    }

    /// Iterates fields in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Uploaded)> {
        self.entries
            .iter()
            .map(|(name, uploaded)| (name.as_str(), uploaded))
    }

    /// Iterates every stored file in arrival order within each field.
    pub fn files(&self) -> impl Iterator<Item = &StoredFile> {
        self.entries.iter().flat_map(|(_, uploaded)| uploaded.files())
    }

    /// Number of distinct fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no file was stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N> FromIterator<(N, StoredFile)> for UploadResult
where
    N: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, StoredFile)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |mut result, (field_name, file)| {
                result.push(field_name, file);
                result
            })
    }
}

impl Serialize for UploadResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, uploaded) in &self.entries {
            map.serialize_entry(name, uploaded)?;
        }
        map.end()
    }
}

/// Scalar (non-file) form fields in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FormFields(pub Vec<(String, String)>);

impl FormFields {
    /// Returns the first value submitted for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Everything a successful upload produces.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadOutput {
    /// Stored files keyed by field.
    pub files: UploadResult,
    /// Scalar form fields.
    pub fields: FormFields,
}
