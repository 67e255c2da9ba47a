//! Incremental loading of a folder's children.
//!
//! [`RequestSource`] walks a folder listing one page per call, following
//! the continuation the backend hands back with each page. It knows nothing
//! about which API it talks to: the [`RequestBuilder`] it is created with
//! decides that.

use async_trait::async_trait;
use futures::stream::{self, Stream};
use std::fmt;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use drivekit_common::{Error, Result};

use crate::item::RemoteItem;
use crate::model::{StorageItem, TypedItem};
use crate::options::ListOptions;
use crate::provider::{ChildrenRequest, RequestBuilder};

/// Where a [`RequestSource`] is in its listing.
pub enum PagingState {
    /// No page requested yet.
    Uninitialized,
    /// Holds the request for the next page.
    Paging(Box<dyn ChildrenRequest>),
    /// The last page has been returned.
    Exhausted,
}

impl fmt::Debug for PagingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagingState::Uninitialized => f.write_str("Uninitialized"),
            PagingState::Paging(request) => f
                .debug_tuple("Paging")
                .field(&request.request_url().as_str())
                .finish(),
            PagingState::Exhausted => f.write_str("Exhausted"),
        }
    }
}

/// A source that hands out a listing page by page.
#[async_trait]
pub trait IncrementalSource<T: Send>: Send {
    /// Fetch the next page.
    ///
    /// `page_index` is accepted for callers that track it; paging is
    /// sequential and the value is not used.
    ///
    /// Returns `None` once the listing is exhausted or when `cancel` is
    /// already cancelled.
    ///
    /// # Preconditions
    /// - `page_size` only takes effect on the first call; later pages follow
    ///   the server's continuation
    ///
    /// # Postconditions
    /// - `Some(items)` may be empty only if more pages follow
    /// - A final page with no items yields `None` directly
    /// - After the first `None` from exhaustion, no further fetches are made
    ///
    /// # Errors
    /// - Backend failures, unchanged. The cursor does not move, so calling
    ///   again repeats the same request.
    async fn get_paged_items(
        &mut self,
        page_index: u32,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<T>>>;
}

/// Paged listing of one folder's children, converted to `T`.
pub struct RequestSource<T> {
    request_builder: RequestBuilder,
    options: ListOptions,
    state: PagingState,
    _marker: PhantomData<fn() -> T>,
}

impl<T> RequestSource<T> {
    /// List the children of the item `request_builder` points at.
    ///
    /// Ordering and filter are fixed here. Nothing is fetched until the
    /// first page is requested.
    ///
    /// # Postconditions
    /// - The source starts in [`PagingState::Uninitialized`]
    pub fn new(request_builder: RequestBuilder, options: ListOptions) -> Self {
        Self {
            request_builder,
            options,
            state: PagingState::Uninitialized,
            _marker: PhantomData,
        }
    }

    pub fn state(&self) -> &PagingState {
        &self.state
    }

    /// Whether the last page has been returned.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, PagingState::Exhausted)
    }

    fn convert(&self, item: RemoteItem) -> T
    where
        T: From<TypedItem>,
    {
        let item = StorageItem::from_remote(self.request_builder.client(), item);
        T::from(TypedItem::classify(item))
    }
}

impl<T> RequestSource<T>
where
    T: From<TypedItem> + Send + 'static,
{
    /// Yield every remaining page as a stream.
    ///
    /// The stream ends when the listing is exhausted, when `cancel` fires
    /// between pages, or right after the first error.
    pub fn into_stream(
        self,
        page_size: u32,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<Vec<T>>> + Send {
        stream::try_unfold((self, cancel, 0u32), move |(mut source, cancel, index)| async move {
            let page = source.get_paged_items(index, page_size, &cancel).await?;
            Ok::<_, Error>(page.map(|items| (items, (source, cancel, index.saturating_add(1)))))
        })
    }
}

#[async_trait]
impl<T> IncrementalSource<T> for RequestSource<T>
where
    T: From<TypedItem> + Send + 'static,
{
    async fn get_paged_items(
        &mut self,
        _page_index: u32,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<T>>> {
        if cancel.is_cancelled() {
            debug!("Page request cancelled before fetch");
            return Ok(None);
        }

        if matches!(self.state, PagingState::Uninitialized) {
            let request = self.request_builder.children_request(page_size, &self.options);
            debug!(url = %request.request_url(), page_size, "Starting listing");
            self.state = PagingState::Paging(request);
        }

        let PagingState::Paging(request) = &self.state else {
            return Ok(None);
        };

        let page = match request.get(cancel).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %request.request_url(), error = %e, "Page fetch failed");
                return Err(e);
            }
        };

        debug!(count = page.items.len(), more = page.next_page_request.is_some(), "Fetched page");
        if page.items.is_empty() && page.next_page_request.is_none() {
            info!(url = %self.request_builder.request_url(), "Listing exhausted on empty page");
            self.state = PagingState::Exhausted;
            return Ok(None);
        }

        self.state = match page.next_page_request {
            Some(next) => PagingState::Paging(next),
            None => {
                info!(url = %self.request_builder.request_url(), "Listing exhausted");
                PagingState::Exhausted
            }
        };

        let items = page.items.into_iter().map(|item| self.convert(item)).collect();
        Ok(Some(items))
    }
}

impl<T> fmt::Debug for RequestSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSource")
            .field("request_builder", &self.request_builder)
            .field("options", &self.options)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphClient;
    use crate::item::{fixtures, ItemShape};
    use crate::memory::MemoryTransport;
    use crate::onedrive::OneDriveClient;
    use crate::options::OrderBy;
    use crate::provider::{ChildrenPage, DriveClient};
    use crate::transport::Transport;
    use futures::TryStreamExt;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use url::Url;

    /// Pages to hand out in order; `true` means another page follows.
    type Script = Arc<Mutex<VecDeque<(Vec<RemoteItem>, bool)>>>;

    #[derive(Debug)]
    struct ScriptedRequest {
        url: Url,
        pages: Script,
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChildrenRequest for ScriptedRequest {
        fn request_url(&self) -> &Url {
            &self.url
        }

        async fn get(&self, _cancel: &CancellationToken) -> Result<ChildrenPage> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let (items, more) = self
                .pages
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::Network("script ran out of pages".to_string()))?;
            let next_page_request = more.then(|| {
                Box::new(ScriptedRequest {
                    url: self.url.clone(),
                    pages: self.pages.clone(),
                    fetches: self.fetches.clone(),
                }) as Box<dyn ChildrenRequest>
            });
            Ok(ChildrenPage {
                items,
                next_page_request,
            })
        }
    }

    /// Client whose listings replay a fixed script.
    #[derive(Debug)]
    struct ScriptedClient {
        inner: OneDriveClient,
        pages: Script,
        fetches: Arc<AtomicUsize>,
    }

    impl ScriptedClient {
        fn new(pages: Vec<(Vec<RemoteItem>, bool)>) -> Arc<Self> {
            Arc::new(Self {
                inner: OneDriveClient::new(Arc::new(MemoryTransport::new())).unwrap(),
                pages: Arc::new(Mutex::new(pages.into())),
                fetches: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl DriveClient for ScriptedClient {
        fn api(&self) -> crate::options::DriveApi {
            self.inner.api()
        }

        fn root_url(&self) -> Url {
            self.inner.root_url()
        }

        fn item_url(&self, id: &str) -> Url {
            self.inner.item_url(id)
        }

        fn children_request(
            &self,
            item_url: &Url,
            _page_size: u32,
            _options: &ListOptions,
        ) -> Box<dyn ChildrenRequest> {
            Box::new(ScriptedRequest {
                url: item_url.clone(),
                pages: self.pages.clone(),
                fetches: self.fetches.clone(),
            })
        }

        fn decode_item(&self, value: Value) -> Result<RemoteItem> {
            self.inner.decode_item(value)
        }

        fn transport(&self) -> Arc<dyn Transport> {
            self.inner.transport()
        }
    }

    fn files(ids: &[&str]) -> Vec<RemoteItem> {
        ids.iter()
            .map(|id| fixtures::remote(id, false, true, false))
            .collect()
    }

    fn drive_with_files(count: usize) -> Arc<MemoryTransport> {
        let transport = Arc::new(MemoryTransport::new());
        let root = transport.root_id();
        for i in 0..count {
            transport.add_file(&root, &format!("file-{}.txt", i), i as u64).unwrap();
        }
        transport
    }

    fn source(client: Arc<dyn DriveClient>, root: &str) -> RequestSource<TypedItem> {
        RequestSource::new(RequestBuilder::item(&client, root), ListOptions::default())
    }

    fn onedrive(transport: &Arc<MemoryTransport>) -> Arc<dyn DriveClient> {
        Arc::new(OneDriveClient::new(transport.clone()).unwrap())
    }

    fn names(items: &[TypedItem]) -> Vec<String> {
        items.iter().map(|t| t.as_item().name().to_string()).collect()
    }

    #[tokio::test]
    async fn test_two_pages_then_exhausted() {
        let transport = drive_with_files(4);
        let mut source = source(onedrive(&transport), &transport.root_id());
        let cancel = CancellationToken::new();

        let first = source.get_paged_items(0, 2, &cancel).await.unwrap().unwrap();
        assert_eq!(names(&first), vec!["file-0.txt", "file-1.txt"]);
        assert!(matches!(source.state(), PagingState::Paging(_)));

        let second = source.get_paged_items(1, 2, &cancel).await.unwrap().unwrap();
        assert_eq!(names(&second), vec!["file-2.txt", "file-3.txt"]);
        assert!(source.is_exhausted());

        assert!(source.get_paged_items(2, 2, &cancel).await.unwrap().is_none());
        assert!(source.get_paged_items(3, 2, &cancel).await.unwrap().is_none());
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_terminal_empty_page_ends_listing() {
        let client = ScriptedClient::new(vec![
            (files(&["a", "b"]), true),
            (files(&["c"]), true),
            (Vec::new(), false),
        ]);
        let mut source = source(client.clone(), "root-id");
        let cancel = CancellationToken::new();

        assert_eq!(source.get_paged_items(0, 2, &cancel).await.unwrap().unwrap().len(), 2);
        assert_eq!(source.get_paged_items(1, 2, &cancel).await.unwrap().unwrap().len(), 1);

        assert!(source.get_paged_items(2, 2, &cancel).await.unwrap().is_none());
        assert!(source.is_exhausted());
        assert_eq!(client.fetches(), 3);

        assert!(source.get_paged_items(3, 2, &cancel).await.unwrap().is_none());
        assert_eq!(client.fetches(), 3);
    }

    #[tokio::test]
    async fn test_empty_page_with_continuation_is_returned() {
        let client = ScriptedClient::new(vec![
            (Vec::new(), true),
            (files(&["late"]), false),
        ]);
        let mut source = source(client.clone(), "root-id");
        let cancel = CancellationToken::new();

        let first = source.get_paged_items(0, 10, &cancel).await.unwrap().unwrap();
        assert!(first.is_empty());
        assert!(matches!(source.state(), PagingState::Paging(_)));

        let second = source.get_paged_items(1, 10, &cancel).await.unwrap().unwrap();
        assert_eq!(names(&second), vec!["late-name"]);
        assert!(source.is_exhausted());
        assert_eq!(client.fetches(), 2);
    }

    #[tokio::test]
    async fn test_empty_folder_yields_no_page() {
        let transport = Arc::new(MemoryTransport::new());
        let mut listing = source(onedrive(&transport), &transport.root_id());
        let cancel = CancellationToken::new();

        assert!(listing.get_paged_items(0, 10, &cancel).await.unwrap().is_none());
        assert!(listing.is_exhausted());

        let pages: Vec<Vec<TypedItem>> = source(onedrive(&transport), &transport.root_id())
            .into_stream(10, cancel)
            .try_collect()
            .await
            .unwrap();
        assert!(pages.is_empty());
    }

    #[tokio::test]
    async fn test_page_size_bound_on_first_fetch() {
        let transport = drive_with_files(5);
        let mut source = source(onedrive(&transport), &transport.root_id());
        let cancel = CancellationToken::new();

        let first = source.get_paged_items(0, 2, &cancel).await.unwrap().unwrap();
        let second = source.get_paged_items(1, 50, &cancel).await.unwrap().unwrap();
        let third = source.get_paged_items(2, 50, &cancel).await.unwrap().unwrap();

        assert_eq!((first.len(), second.len(), third.len()), (2, 2, 1));
        assert!(source.is_exhausted());
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch_keeps_state() {
        let transport = drive_with_files(3);
        let mut source = source(onedrive(&transport), &transport.root_id());

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert!(source.get_paged_items(0, 2, &cancelled).await.unwrap().is_none());
        assert!(matches!(source.state(), PagingState::Uninitialized));
        assert_eq!(transport.request_count(), 0);

        let live = CancellationToken::new();
        let first = source.get_paged_items(0, 2, &live).await.unwrap().unwrap();
        assert_eq!(names(&first), vec!["file-0.txt", "file-1.txt"]);
    }

    #[tokio::test]
    async fn test_failure_keeps_cursor() {
        let transport = drive_with_files(4);
        let mut source = source(onedrive(&transport), &transport.root_id());
        let cancel = CancellationToken::new();

        source.get_paged_items(0, 2, &cancel).await.unwrap();
        transport.fail_next(Error::Network("connection reset".to_string()));

        let err = source.get_paged_items(1, 2, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(matches!(source.state(), PagingState::Paging(_)));

        let retried = source.get_paged_items(1, 2, &cancel).await.unwrap().unwrap();
        assert_eq!(names(&retried), vec!["file-2.txt", "file-3.txt"]);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].url, requests[2].url);
    }

    #[tokio::test]
    async fn test_failure_on_first_call_keeps_request() {
        let transport = drive_with_files(1);
        let mut source = source(onedrive(&transport), &transport.root_id());
        let cancel = CancellationToken::new();

        transport.fail_next(Error::Authentication("token expired".to_string()));
        assert!(source.get_paged_items(0, 10, &cancel).await.is_err());
        assert!(matches!(source.state(), PagingState::Paging(_)));

        let page = source.get_paged_items(0, 10, &cancel).await.unwrap().unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(transport.requests()[0].url, transport.requests()[1].url);
    }

    #[tokio::test]
    async fn test_items_are_classified() {
        let transport = Arc::new(MemoryTransport::new());
        let root = transport.root_id();
        transport.add_folder(&root, "a").unwrap();
        transport.add_file(&root, "b", 1).unwrap();
        transport.add_notebook(&root, "c").unwrap();
        transport.add_raw(&root, serde_json::json!({"name": "d"})).unwrap();
        transport
            .add_raw(&root, serde_json::json!({"name": "e", "folder": {}, "file": {}}))
            .unwrap();

        let client = onedrive(&transport);
        let mut source = source(client.clone(), &root);
        let items = source
            .get_paged_items(0, 10, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        let shapes: Vec<ItemShape> = items.iter().map(TypedItem::shape).collect();
        assert_eq!(
            shapes,
            vec![
                ItemShape::Folder,
                ItemShape::File,
                ItemShape::File,
                ItemShape::Item,
                ItemShape::Folder,
            ]
        );

        let first = items[0].as_item();
        assert_eq!(
            first.request_builder().request_url(),
            &client.item_url(first.id())
        );
    }

    #[tokio::test]
    async fn test_converts_to_storage_item() {
        let transport = drive_with_files(2);
        let client = onedrive(&transport);
        let mut source: RequestSource<StorageItem> =
            RequestSource::new(RequestBuilder::item(&client, &transport.root_id()), ListOptions::default());

        let items = source
            .get_paged_items(0, 10, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(StorageItem::is_file));
    }

    #[tokio::test]
    async fn test_graph_backend_with_ordering() {
        let transport = Arc::new(MemoryTransport::new());
        let root = transport.root_id();
        for name in ["gamma", "alpha", "beta"] {
            transport.add_folder(&root, name).unwrap();
        }

        let client: Arc<dyn DriveClient> = Arc::new(GraphClient::new(transport.clone()).unwrap());
        let mut source: RequestSource<TypedItem> =
            RequestSource::new(RequestBuilder::root(&client), ListOptions::ordered(OrderBy::Name));
        let cancel = CancellationToken::new();

        let first = source.get_paged_items(0, 2, &cancel).await.unwrap().unwrap();
        let second = source.get_paged_items(1, 2, &cancel).await.unwrap().unwrap();
        assert_eq!(names(&first), vec!["alpha", "beta"]);
        assert_eq!(names(&second), vec!["gamma"]);

        let url = &transport.requests()[0].url;
        assert!(url.path().starts_with("/v1.0/me/drive/root/children"));
        assert!(url.query().unwrap_or_default().contains("orderby=name"));
    }

    #[tokio::test]
    async fn test_into_stream_collects_all_pages() {
        let transport = drive_with_files(5);
        let source = source(onedrive(&transport), &transport.root_id());

        let pages: Vec<Vec<TypedItem>> = source
            .into_stream(2, CancellationToken::new())
            .try_collect()
            .await
            .unwrap();

        let sizes: Vec<usize> = pages.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_into_stream_stops_after_error() {
        let transport = drive_with_files(5);
        transport.fail_next(Error::Network("unreachable".to_string()));
        let source = source(onedrive(&transport), &transport.root_id());

        let results: Vec<Result<Vec<TypedItem>>> =
            futures::StreamExt::collect(source.into_stream(2, CancellationToken::new())).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
