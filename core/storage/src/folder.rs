//! Folder operations.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use drivekit_common::{Error, ItemPath, Result};

use crate::collection::ItemsCollection;
use crate::model::{StorageFile, StorageFolder, StorageItem, TypedItem};
use crate::options::{CreationCollisionOption, ListOptions};
use crate::provider::{DriveClient, RequestBuilder};
use crate::request_source::RequestSource;

/// Page size used by [`StorageFolder::get_files`] when none is given.
pub const DEFAULT_FILES_TOP: u32 = 20;

/// Page size used by [`StorageFolder::get_folders`] when none is given.
pub const DEFAULT_FOLDERS_TOP: u32 = 100;

/// Largest page requested by [`StorageFolder::get_items_range`].
const RANGE_PAGE_SIZE: u32 = 200;

impl StorageFolder {
    /// Fetch the drive's root folder.
    ///
    /// The returned folder addresses the root by id, so path lookups below
    /// it use the `items/{id}:/…:` form.
    pub async fn root(client: &Arc<dyn DriveClient>, cancel: &CancellationToken) -> Result<StorageFolder> {
        let item = RequestBuilder::root(client).get(cancel).await?;
        debug!(api = %client.api(), id = %item.id, "Resolved drive root");

        TypedItem::classify(StorageItem::from_remote(client, item))
            .into_folder()
            .ok_or_else(|| Error::InvalidInput("Drive root is not a folder".to_string()))
    }

    /// First page of this folder's children, up to `top` entries.
    pub async fn get_items(
        &self,
        top: u32,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> Result<ItemsCollection> {
        let request = self.request_builder().children_request(top, options);
        let page = request.get(cancel).await?;
        Ok(ItemsCollection::from_page(self.client(), page))
    }

    /// Files among the first `top` children (default 20).
    pub async fn get_files(
        &self,
        top: Option<u32>,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<StorageFile>> {
        let page = self
            .get_items(top.unwrap_or(DEFAULT_FILES_TOP), options, cancel)
            .await?;
        Ok(page.files())
    }

    /// Folders among the first `top` children (default 100).
    pub async fn get_folders(
        &self,
        top: Option<u32>,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<StorageFolder>> {
        let page = self
            .get_items(top.unwrap_or(DEFAULT_FOLDERS_TOP), options, cancel)
            .await?;
        Ok(page.folders())
    }

    /// Children `start_index .. start_index + max_items` in listing order.
    ///
    /// The listing is read from the start, page by page, until enough
    /// entries have been seen.
    ///
    /// # Postconditions
    /// - At most `max_items` entries; fewer when the listing ends first
    /// - Empty for `max_items == 0` without a round trip
    pub async fn get_items_range(
        &self,
        start_index: usize,
        max_items: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<StorageItem>> {
        if max_items == 0 {
            return Ok(Vec::new());
        }

        let wanted = start_index.saturating_add(max_items);
        let page_size = u32::try_from(wanted)
            .unwrap_or(RANGE_PAGE_SIZE)
            .clamp(1, RANGE_PAGE_SIZE);

        let mut seen = Vec::new();
        let mut next = Some(self.get_items(page_size, &ListOptions::default(), cancel).await?);
        while let Some(page) = next {
            next = if seen.len() + page.len() < wanted {
                page.next_page(cancel).await?
            } else {
                None
            };
            seen.extend(page.into_items());
        }

        Ok(seen.into_iter().skip(start_index).take(max_items).collect())
    }

    /// Incremental source over this folder's children.
    pub fn items_source<T>(&self, options: ListOptions) -> RequestSource<T> {
        RequestSource::new(self.request_builder().clone(), options)
    }

    /// Look up an entry by a path relative to this folder.
    ///
    /// # Errors
    /// - `InvalidInput` for a malformed path
    /// - `NotFound` when no entry exists at `path`
    pub async fn get_item(&self, path: &str, cancel: &CancellationToken) -> Result<TypedItem> {
        let path = ItemPath::parse(path)?;
        let item = self.request_builder().item_by_path(&path)?.get(cancel).await?;
        Ok(TypedItem::classify(StorageItem::from_remote(self.client(), item)))
    }

    /// Look up a file by a path relative to this folder.
    ///
    /// # Errors
    /// - `InvalidInput` when the entry is not a file
    pub async fn get_file(&self, path: &str, cancel: &CancellationToken) -> Result<StorageFile> {
        self.get_item(path, cancel)
            .await?
            .into_file()
            .ok_or_else(|| Error::InvalidInput(format!("Not a file: {}", path)))
    }

    /// Look up a folder by a path relative to this folder.
    ///
    /// # Errors
    /// - `InvalidInput` when the entry is not a folder
    pub async fn get_folder(&self, path: &str, cancel: &CancellationToken) -> Result<StorageFolder> {
        self.get_item(path, cancel)
            .await?
            .into_folder()
            .ok_or_else(|| Error::InvalidInput(format!("Not a folder: {}", path)))
    }

    /// Create a child folder.
    ///
    /// # Preconditions
    /// - `desired_name` is a single path component
    ///
    /// # Postconditions
    /// - With [`CreationCollisionOption::GenerateUniqueName`] the returned
    ///   folder's name may differ from `desired_name`
    ///
    /// # Errors
    /// - `InvalidInput` for an empty name or one containing a separator
    /// - `AlreadyExists` when the name is taken and `collision` is
    ///   [`CreationCollisionOption::FailIfExists`]
    pub async fn create_folder(
        &self,
        desired_name: &str,
        collision: CreationCollisionOption,
        cancel: &CancellationToken,
    ) -> Result<StorageFolder> {
        ItemPath::root().join(desired_name)?;

        let item = self
            .request_builder()
            .create_folder(desired_name, collision, cancel)
            .await?;
        info!(parent = %self.id(), name = %item.name, "Created folder");

        TypedItem::classify(StorageItem::from_remote(self.client(), item))
            .into_folder()
            .ok_or_else(|| Error::InvalidInput(format!("Created entry is not a folder: {}", desired_name)))
    }

    /// Rename this folder.
    pub async fn rename(&self, desired_name: &str, cancel: &CancellationToken) -> Result<StorageFolder> {
        ItemPath::root().join(desired_name)?;
        let item = self.request_builder().rename(desired_name, cancel).await?;
        Ok(StorageFolder::new(self.with_item(item)))
    }
}
