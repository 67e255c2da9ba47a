//! Raw remote entries and their classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Package type the drive uses for OneNote notebooks.
pub const ONENOTE_PACKAGE: &str = "oneNote";

/// Folder-specific metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    #[serde(default)]
    pub child_count: Option<u64>,
}

/// File-specific metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Marks an item the drive treats as a single unit (e.g. a notebook).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFacet {
    #[serde(rename = "type", default)]
    pub package_type: Option<String>,
}

/// Shape of a remote entry, derived from which facets it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemShape {
    Folder,
    File,
    Item,
}

/// An entry returned by a backend call.
///
/// Backend-neutral: both APIs decode into this. Immutable once received.
#[derive(Debug, Clone)]
pub struct RemoteItem {
    /// Identifier, unique within the parent.
    pub id: String,
    pub name: String,
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub folder: Option<FolderFacet>,
    pub file: Option<FileFacet>,
    pub package: Option<PackageFacet>,
    /// The entry as the backend sent it.
    pub payload: serde_json::Value,
}

impl RemoteItem {
    /// Classify by facet presence.
    ///
    /// Order matters: the folder facet is checked first and wins over a
    /// file facet on the same entry. Notebooks count as files.
    pub fn shape(&self) -> ItemShape {
        match (&self.folder, &self.file) {
            (Some(_), _) => ItemShape::Folder,
            (None, Some(_)) => ItemShape::File,
            (None, None) if self.is_notebook() => ItemShape::File,
            (None, None) => ItemShape::Item,
        }
    }

    /// Whether the entry carries a file facet.
    pub fn is_file(&self) -> bool {
        self.file.is_some()
    }

    /// Whether the entry carries a folder facet.
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }

    /// Whether the entry is a OneNote notebook package.
    pub fn is_notebook(&self) -> bool {
        self.package
            .as_ref()
            .and_then(|p| p.package_type.as_deref())
            == Some(ONENOTE_PACKAGE)
    }
}
