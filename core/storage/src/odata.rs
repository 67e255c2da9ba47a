//! OData conventions shared by both drive APIs.
//!
//! The OneDrive API and Microsoft Graph speak the same protocol: items
//! addressed under a drive path, `children` collections paged with
//! `@odata.nextLink`. [`ODataClient`] implements that once; each API only
//! supplies a [`Dialect`] naming its item DTO, endpoint and drive path.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use drivekit_common::{Error, ItemPath, Result};

use crate::item::RemoteItem;
use crate::options::{DriveApi, ListOptions};
use crate::provider::{ChildrenPage, ChildrenRequest, DriveClient};
use crate::transport::{ApiRequest, Transport};

/// Continuation link key in a collection page.
pub const NEXT_LINK: &str = "@odata.nextLink";

/// Characters escaped in path-addressed segments. `:` is included since
/// it delimits the path in `items/{id}:/a/b:`.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Parse and validate an API base URL.
pub fn parse_base_url(base: &str) -> Result<Url> {
    let url = Url::parse(base)
        .map_err(|e| Error::InvalidInput(format!("Invalid base URL '{}': {}", base, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::InvalidInput(format!(
            "Base URL '{}' cannot have path segments",
            base
        )));
    }
    Ok(url)
}

/// Append path segments, each percent-encoded.
pub fn join_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Address a path below the item at `item_url` (`…/items/{id}:/a/b:`).
pub fn path_url(item_url: &Url, path: &ItemPath) -> Result<Url> {
    if path.is_root() {
        return Ok(item_url.clone());
    }

    let encoded: Vec<String> = path
        .components()
        .iter()
        .map(|c| utf8_percent_encode(c, PATH_SEGMENT).to_string())
        .collect();
    let raw = format!(
        "{}:/{}:",
        item_url.as_str().trim_end_matches('/'),
        encoded.join("/")
    );

    Url::parse(&raw).map_err(|e| Error::InvalidInput(format!("Invalid item path '{}': {}", path, e)))
}

/// URL of the first children page of an item.
pub fn children_url(item_url: &Url, page_size: u32, options: &ListOptions) -> Url {
    let mut url = join_segments(item_url, &["children"]);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("$top", &page_size.to_string());
        if let Some(order_by) = options.order_by.as_query() {
            query.append_pair("$orderby", order_by);
        }
        if let Some(filter) = &options.filter {
            query.append_pair("$filter", filter);
        }
    }
    url
}

/// Parse a continuation link.
pub fn next_link_url(next_link: Option<String>) -> Result<Option<Url>> {
    next_link
        .map(|link| {
            Url::parse(&link)
                .map_err(|e| Error::Serialization(format!("Invalid next page link '{}': {}", link, e)))
        })
        .transpose()
}

/// An item DTO that can be flattened into a [`RemoteItem`].
pub trait IntoRemote: DeserializeOwned + Send + 'static {
    /// Convert, keeping `payload` as the raw entry.
    fn into_remote(self, payload: Value) -> RemoteItem;
}

/// Decode one item payload through the DTO `I`.
pub fn decode_item<I: IntoRemote>(value: Value) -> Result<RemoteItem> {
    let item: I = serde_json::from_value(value.clone())?;
    Ok(item.into_remote(value))
}

/// One page of a `children` collection.
#[derive(Debug, Deserialize)]
pub struct CollectionPage {
    #[serde(rename = "@odata.context", default)]
    pub context: Option<String>,
    #[serde(rename = "@odata.count", default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub value: Vec<Value>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// Children request decoding entries through the DTO `I`.
///
/// Next-page requests are always of the same type, so a listing never
/// switches wire shape halfway through.
pub struct ChildrenCollectionRequest<I> {
    url: Url,
    transport: Arc<dyn Transport>,
    _item: PhantomData<fn() -> I>,
}

impl<I> ChildrenCollectionRequest<I> {
    pub fn new(url: Url, transport: Arc<dyn Transport>) -> Self {
        Self {
            url,
            transport,
            _item: PhantomData,
        }
    }
}

#[async_trait]
impl<I: IntoRemote> ChildrenRequest for ChildrenCollectionRequest<I> {
    fn request_url(&self) -> &Url {
        &self.url
    }

    async fn get(&self, cancel: &CancellationToken) -> Result<ChildrenPage> {
        let value = self
            .transport
            .send(ApiRequest::get(self.url.clone()), cancel)
            .await?;
        let page: CollectionPage = serde_json::from_value(value)?;

        let items = page
            .value
            .into_iter()
            .map(decode_item::<I>)
            .collect::<Result<Vec<_>>>()?;

        let next_page_request = next_link_url(page.next_link)?.map(|url| {
            Box::new(ChildrenCollectionRequest::<I>::new(url, self.transport.clone()))
                as Box<dyn ChildrenRequest>
        });

        Ok(ChildrenPage {
            items,
            next_page_request,
        })
    }
}

impl<I> fmt::Debug for ChildrenCollectionRequest<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildrenCollectionRequest")
            .field("url", &self.url.as_str())
            .finish()
    }
}

/// What distinguishes one drive API from the other.
pub trait Dialect: Send + Sync + 'static {
    /// Item DTO in this API's wire shape.
    type Item: IntoRemote;

    const API: DriveApi;

    /// Public endpoint.
    const BASE_URL: &'static str;

    /// Segments between the endpoint and `root` / `items/{id}`.
    const DRIVE_PATH: &'static [&'static str];
}

/// Drive session for the API described by `D`.
pub struct ODataClient<D> {
    base_url: Url,
    transport: Arc<dyn Transport>,
    _dialect: PhantomData<fn() -> D>,
}

impl<D: Dialect> ODataClient<D> {
    /// Create a client for the API's public endpoint.
    pub fn new(transport: Arc<dyn Transport>) -> Result<Self> {
        Self::with_base_url(D::BASE_URL, transport)
    }

    /// Create a client for a custom endpoint (national clouds, proxies).
    ///
    /// # Errors
    /// - `base_url` is not a valid base URL
    pub fn with_base_url(base_url: &str, transport: Arc<dyn Transport>) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            transport,
            _dialect: PhantomData,
        })
    }

    fn drive_url(&self, tail: &[&str]) -> Url {
        join_segments(&join_segments(&self.base_url, D::DRIVE_PATH), tail)
    }
}

impl<D: Dialect> DriveClient for ODataClient<D> {
    fn api(&self) -> DriveApi {
        D::API
    }

    fn root_url(&self) -> Url {
        self.drive_url(&["root"])
    }

    fn item_url(&self, id: &str) -> Url {
        self.drive_url(&["items", id])
    }

    fn children_request(
        &self,
        item_url: &Url,
        page_size: u32,
        options: &ListOptions,
    ) -> Box<dyn ChildrenRequest> {
        Box::new(ChildrenCollectionRequest::<D::Item>::new(
            children_url(item_url, page_size, options),
            self.transport.clone(),
        ))
    }

    fn decode_item(&self, value: Value) -> Result<RemoteItem> {
        decode_item::<D::Item>(value)
    }

    fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }
}

impl<D: Dialect> fmt::Debug for ODataClient<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ODataClient")
            .field("api", &D::API)
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}
