//! Typed wrappers over remote entries.

use chrono::{DateTime, Utc};
use std::ops::Deref;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use drivekit_common::Result;

use crate::item::{ItemShape, RemoteItem};
use crate::provider::{DriveClient, RequestBuilder};

/// A remote entry bound to the session it came from.
#[derive(Debug, Clone)]
pub struct StorageItem {
    client: Arc<dyn DriveClient>,
    request_builder: RequestBuilder,
    item: RemoteItem,
}

impl StorageItem {
    pub fn new(client: Arc<dyn DriveClient>, request_builder: RequestBuilder, item: RemoteItem) -> Self {
        Self {
            client,
            request_builder,
            item,
        }
    }

    /// Wrap an entry with a request builder scoped to its own id.
    pub fn from_remote(client: &Arc<dyn DriveClient>, item: RemoteItem) -> Self {
        let request_builder = RequestBuilder::item(client, &item.id);
        Self::new(client.clone(), request_builder, item)
    }

    pub fn client(&self) -> &Arc<dyn DriveClient> {
        &self.client
    }

    pub fn request_builder(&self) -> &RequestBuilder {
        &self.request_builder
    }

    pub fn remote_item(&self) -> &RemoteItem {
        &self.item
    }

    pub fn id(&self) -> &str {
        &self.item.id
    }

    pub fn name(&self) -> &str {
        &self.item.name
    }

    pub fn size(&self) -> Option<u64> {
        self.item.size
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.item.last_modified
    }

    pub fn is_file(&self) -> bool {
        self.item.is_file()
    }

    pub fn is_folder(&self) -> bool {
        self.item.is_folder()
    }

    pub fn is_notebook(&self) -> bool {
        self.item.is_notebook()
    }

    /// Delete the entry on the drive.
    pub async fn delete(&self, cancel: &CancellationToken) -> Result<()> {
        self.request_builder.delete(cancel).await
    }

    /// Same session and builder, fresh metadata.
    pub(crate) fn with_item(&self, item: RemoteItem) -> Self {
        Self::new(self.client.clone(), self.request_builder.clone(), item)
    }
}

/// A file (or notebook) on the drive.
#[derive(Debug, Clone)]
pub struct StorageFile(StorageItem);

impl StorageFile {
    pub fn new(item: StorageItem) -> Self {
        Self(item)
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.0.item.file.as_ref().and_then(|f| f.mime_type.as_deref())
    }

    pub fn into_item(self) -> StorageItem {
        self.0
    }

    /// Rename the file.
    pub async fn rename(&self, desired_name: &str, cancel: &CancellationToken) -> Result<StorageFile> {
        let item = self.0.request_builder.rename(desired_name, cancel).await?;
        Ok(StorageFile(self.0.with_item(item)))
    }
}

impl Deref for StorageFile {
    type Target = StorageItem;

    fn deref(&self) -> &StorageItem {
        &self.0
    }
}

/// A folder on the drive.
#[derive(Debug, Clone)]
pub struct StorageFolder(StorageItem);

impl StorageFolder {
    pub fn new(item: StorageItem) -> Self {
        Self(item)
    }

    /// Number of children as last reported by the drive.
    pub fn child_count(&self) -> Option<u64> {
        self.0.item.folder.as_ref().and_then(|f| f.child_count)
    }

    pub fn into_item(self) -> StorageItem {
        self.0
    }
}

impl Deref for StorageFolder {
    type Target = StorageItem;

    fn deref(&self) -> &StorageItem {
        &self.0
    }
}

/// A classified remote entry.
#[derive(Debug, Clone)]
pub enum TypedItem {
    File(StorageFile),
    Folder(StorageFolder),
    Item(StorageItem),
}

impl TypedItem {
    /// Classify `item` by [`RemoteItem::shape`] and wrap it.
    pub fn new(client: Arc<dyn DriveClient>, request_builder: RequestBuilder, item: RemoteItem) -> Self {
        Self::classify(StorageItem::new(client, request_builder, item))
    }

    /// Classify an already-bound entry.
    pub fn classify(item: StorageItem) -> Self {
        match item.item.shape() {
            ItemShape::Folder => TypedItem::Folder(StorageFolder(item)),
            ItemShape::File => TypedItem::File(StorageFile(item)),
            ItemShape::Item => TypedItem::Item(item),
        }
    }

    pub fn shape(&self) -> ItemShape {
        match self {
            TypedItem::File(_) => ItemShape::File,
            TypedItem::Folder(_) => ItemShape::Folder,
            TypedItem::Item(_) => ItemShape::Item,
        }
    }

    pub fn as_item(&self) -> &StorageItem {
        match self {
            TypedItem::File(file) => file,
            TypedItem::Folder(folder) => folder,
            TypedItem::Item(item) => item,
        }
    }

    pub fn into_item(self) -> StorageItem {
        match self {
            TypedItem::File(file) => file.0,
            TypedItem::Folder(folder) => folder.0,
            TypedItem::Item(item) => item,
        }
    }

    pub fn into_file(self) -> Option<StorageFile> {
        match self {
            TypedItem::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn into_folder(self) -> Option<StorageFolder> {
        match self {
            TypedItem::Folder(folder) => Some(folder),
            _ => None,
        }
    }
}

impl From<TypedItem> for StorageItem {
    fn from(item: TypedItem) -> Self {
        item.into_item()
    }
}
