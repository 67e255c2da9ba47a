//! Materialized pages of folder children and their enumerator.

use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use drivekit_common::{Error, Result};

use crate::model::{StorageFile, StorageFolder, StorageItem, TypedItem};
use crate::provider::{ChildrenPage, ChildrenRequest, DriveClient};

/// Forward-only, restartable cursor over a borrowed list of items.
///
/// Position starts "before first"; the first [`advance`](Self::advance)
/// moves to index 0.
#[derive(Debug)]
pub struct ItemsEnumerator<'a> {
    items: &'a [StorageItem],
    position: Option<usize>,
}

impl<'a> ItemsEnumerator<'a> {
    pub fn new(items: &'a [StorageItem]) -> Self {
        Self {
            items,
            position: None,
        }
    }

    /// Move to the next element. Returns whether it exists.
    ///
    /// # Postconditions
    /// - Once past the end, every further call returns `false`
    pub fn advance(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p.saturating_add(1));
        // Stop one past the end so repeated calls stay out of bounds.
        self.position = Some(next.min(self.items.len()));
        next < self.items.len()
    }

    /// Element at the current position.
    ///
    /// Files and notebooks surface as `File`, everything else as `Folder`.
    ///
    /// # Preconditions
    /// - The last [`advance`](Self::advance) returned `true`
    ///
    /// # Postconditions
    /// - The position is unchanged; repeated calls return the same element
    ///
    /// # Errors
    /// - `InvalidState` when the position is not on an element
    pub fn current(&self) -> Result<TypedItem> {
        let item = self
            .position
            .and_then(|p| self.items.get(p))
            .ok_or_else(|| Error::InvalidState("Enumerator is not positioned on an item".to_string()))?;

        let item = item.clone();
        if item.is_file() || item.is_notebook() {
            Ok(TypedItem::File(StorageFile::new(item)))
        } else {
            Ok(TypedItem::Folder(StorageFolder::new(item)))
        }
    }

    /// Back to "before first". Nothing is reloaded.
    pub fn reset(&mut self) {
        self.position = None;
    }

    /// Drop this enumerator's view of the list.
    ///
    /// # Postconditions
    /// - `advance()` returns `false` and `current()` fails with `InvalidState`
    /// - The caller's list is untouched
    pub fn dispose(&mut self) {
        self.items = &[];
        self.position = None;
    }
}

impl Iterator for ItemsEnumerator<'_> {
    type Item = TypedItem;

    fn next(&mut self) -> Option<TypedItem> {
        if self.advance() {
            self.current().ok()
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let consumed = self.position.map_or(0, |p| p + 1).min(self.items.len());
        let remaining = self.items.len() - consumed;
        (remaining, Some(remaining))
    }
}

/// One page of a folder listing.
pub struct ItemsCollection {
    items: Vec<StorageItem>,
    next_page_request: Option<Box<dyn ChildrenRequest>>,
    client: Arc<dyn DriveClient>,
}

impl ItemsCollection {
    /// Bind a fetched page to the session it came from.
    pub fn from_page(client: &Arc<dyn DriveClient>, page: ChildrenPage) -> Self {
        let items = page
            .items
            .into_iter()
            .map(|item| StorageItem::from_remote(client, item))
            .collect();

        Self {
            items,
            next_page_request: page.next_page_request,
            client: client.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[StorageItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<StorageItem> {
        self.items
    }

    pub fn enumerator(&self) -> ItemsEnumerator<'_> {
        ItemsEnumerator::new(&self.items)
    }

    pub fn iter(&self) -> ItemsEnumerator<'_> {
        self.enumerator()
    }

    /// Files and notebooks in this page.
    pub fn files(&self) -> Vec<StorageFile> {
        self.items
            .iter()
            .cloned()
            .filter_map(|item| TypedItem::classify(item).into_file())
            .collect()
    }

    /// Folders in this page.
    pub fn folders(&self) -> Vec<StorageFolder> {
        self.items
            .iter()
            .cloned()
            .filter_map(|item| TypedItem::classify(item).into_folder())
            .collect()
    }

    /// Whether the listing continues past this page.
    pub fn has_more(&self) -> bool {
        self.next_page_request.is_some()
    }

    /// Fetch the page after this one.
    ///
    /// Returns `None` when this was the last page.
    pub async fn next_page(&self, cancel: &CancellationToken) -> Result<Option<ItemsCollection>> {
        let Some(request) = &self.next_page_request else {
            return Ok(None);
        };

        debug!(url = %request.request_url(), "Fetching next page");
        let page = request.get(cancel).await?;
        Ok(Some(ItemsCollection::from_page(&self.client, page)))
    }
}

impl<'a> IntoIterator for &'a ItemsCollection {
    type Item = TypedItem;
    type IntoIter = ItemsEnumerator<'a>;

    fn into_iter(self) -> ItemsEnumerator<'a> {
        self.enumerator()
    }
}

impl fmt::Debug for ItemsCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemsCollection")
            .field("items", &self.items.len())
            .field("has_more", &self.has_more())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::fixtures::remote;
    use crate::item::ItemShape;
    use crate::memory::MemoryTransport;
    use crate::model::fixtures::{client, storage_item};
    use crate::onedrive::OneDriveClient;
    use crate::options::{ListOptions, OrderBy};
    use proptest::prelude::*;

    fn items(client: &Arc<dyn DriveClient>, shapes: &[(bool, bool, bool)]) -> Vec<StorageItem> {
        shapes
            .iter()
            .enumerate()
            .map(|(i, (folder, file, notebook))| {
                storage_item(client, remote(&i.to_string(), *folder, *file, *notebook))
            })
            .collect()
    }

    #[test]
    fn test_current_before_first_advance_fails() {
        let client = client();
        let list = items(&client, &[(true, false, false)]);
        let enumerator = ItemsEnumerator::new(&list);

        assert!(matches!(enumerator.current(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_enumeration_classification() {
        let client = client();
        let list = items(
            &client,
            &[
                (true, false, false),
                (false, true, false),
                (false, false, true),
                (false, false, false),
                (true, true, false),
            ],
        );

        let shapes: Vec<ItemShape> = ItemsEnumerator::new(&list).map(|t| t.shape()).collect();
        assert_eq!(
            shapes,
            vec![
                ItemShape::Folder,
                ItemShape::File,
                ItemShape::File,
                ItemShape::Folder,
                ItemShape::File,
            ]
        );
    }

    #[test]
    fn test_empty_list() {
        let list: Vec<StorageItem> = Vec::new();
        let mut enumerator = ItemsEnumerator::new(&list);

        assert!(!enumerator.advance());
        assert!(enumerator.current().is_err());
    }

    #[test]
    fn test_reset_restarts() {
        let client = client();
        let list = items(&client, &[(false, true, false), (true, false, false)]);
        let mut enumerator = ItemsEnumerator::new(&list);

        while enumerator.advance() {}
        enumerator.reset();
        assert!(enumerator.current().is_err());

        assert!(enumerator.advance());
        let first = enumerator.current().unwrap();
        assert_eq!(first.shape(), ItemShape::File);
        assert_eq!(first.as_item().id(), "0");
    }

    #[test]
    fn test_dispose_leaves_list_intact() {
        let client = client();
        let list = items(&client, &[(true, false, false), (false, true, false)]);
        let mut enumerator = ItemsEnumerator::new(&list);
        assert!(enumerator.advance());

        enumerator.dispose();
        assert!(!enumerator.advance());
        assert!(matches!(enumerator.current(), Err(Error::InvalidState(_))));

        assert_eq!(list.len(), 2);
        assert_eq!(list[1].id(), "1");
    }

    #[test]
    fn test_size_hint_tracks_position() {
        let client = client();
        let list = items(&client, &[(true, false, false); 3]);
        let mut enumerator = ItemsEnumerator::new(&list);

        assert_eq!(enumerator.size_hint(), (3, Some(3)));
        enumerator.next();
        assert_eq!(enumerator.size_hint(), (2, Some(2)));
        enumerator.by_ref().for_each(drop);
        assert_eq!(enumerator.size_hint(), (0, Some(0)));
    }

    proptest! {
        #[test]
        fn test_advance_length_law(shapes in prop::collection::vec(any::<(bool, bool, bool)>(), 0..24)) {
            let client = client();
            let list = items(&client, &shapes);
            let mut enumerator = ItemsEnumerator::new(&list);

            for (_, file, notebook) in &shapes {
                prop_assert!(enumerator.advance());
                let expected = if *file || *notebook { ItemShape::File } else { ItemShape::Folder };
                prop_assert_eq!(enumerator.current().unwrap().shape(), expected);
            }

            prop_assert!(!enumerator.advance());
            prop_assert!(matches!(enumerator.current(), Err(Error::InvalidState(_))));
            prop_assert!(!enumerator.advance());
        }
    }

    #[tokio::test]
    async fn test_collection_pages() {
        let transport = Arc::new(MemoryTransport::new());
        let root = transport.root_id();
        transport.add_folder(&root, "a").unwrap();
        transport.add_file(&root, "b.txt", 1).unwrap();
        transport.add_notebook(&root, "c").unwrap();

        let client: Arc<dyn DriveClient> = Arc::new(OneDriveClient::new(transport.clone()).unwrap());
        let cancel = CancellationToken::new();
        let request = client.children_request(&client.item_url(&root), 2, &ListOptions::ordered(OrderBy::Name));
        let first = ItemsCollection::from_page(&client, request.get(&cancel).await.unwrap());

        assert_eq!(first.len(), 2);
        assert!(first.has_more());
        assert_eq!(first.folders().len(), 1);
        assert_eq!(first.files().len(), 1);

        let names: Vec<String> = (&first).into_iter().map(|t| t.as_item().name().to_string()).collect();
        assert_eq!(names, vec!["a", "b.txt"]);

        let second = first.next_page(&cancel).await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert!(second.items()[0].is_notebook());
        assert!(!second.has_more());
        assert!(second.next_page(&cancel).await.unwrap().is_none());
        assert_eq!(transport.request_count(), 2);
    }
}
