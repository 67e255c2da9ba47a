//! Drive client capability and request builders.
//!
//! A [`DriveClient`] is the session handle for one remote API. Everything
//! API-specific (URL layout, wire DTOs, the children request type) sits
//! behind it, so the paging core never branches on which API is in use.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use drivekit_common::{ItemPath, Result};

use crate::item::RemoteItem;
use crate::odata;
use crate::options::{CreationCollisionOption, DriveApi, ListOptions};
use crate::transport::{ApiRequest, Transport};

/// One page of children plus the request for the page after it.
pub struct ChildrenPage {
    pub items: Vec<RemoteItem>,
    /// Absent when the listing is complete.
    pub next_page_request: Option<Box<dyn ChildrenRequest>>,
}

impl fmt::Debug for ChildrenPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildrenPage")
            .field("items", &self.items.len())
            .field("has_next", &self.next_page_request.is_some())
            .finish()
    }
}

/// A request for one page of a folder's children.
///
/// Each API has its own implementation; a request only ever hands out
/// next-page requests of its own kind.
#[async_trait]
pub trait ChildrenRequest: Send + Sync + fmt::Debug {
    /// URL this request will fetch.
    fn request_url(&self) -> &Url;

    /// Perform one round trip.
    ///
    /// Safe to repeat: the request is not consumed, so a failed call can be
    /// retried with identical parameters.
    ///
    /// # Errors
    /// - Network/authentication/server errors from the transport
    /// - Malformed page payloads
    async fn get(&self, cancel: &CancellationToken) -> Result<ChildrenPage>;
}

/// Session handle for one remote drive API.
pub trait DriveClient: Send + Sync + fmt::Debug {
    /// Which API this client speaks.
    fn api(&self) -> DriveApi;

    /// URL of the drive root item.
    fn root_url(&self) -> Url;

    /// URL of the item with the given identifier.
    fn item_url(&self, id: &str) -> Url;

    /// Build the first children request for the item at `item_url`.
    fn children_request(
        &self,
        item_url: &Url,
        page_size: u32,
        options: &ListOptions,
    ) -> Box<dyn ChildrenRequest>;

    /// Decode one item payload in this API's wire shape.
    fn decode_item(&self, value: Value) -> Result<RemoteItem>;

    /// Transport used for every call of this session.
    fn transport(&self) -> Arc<dyn Transport>;
}

/// Handle scoped to one remote item.
#[derive(Clone)]
pub struct RequestBuilder {
    client: Arc<dyn DriveClient>,
    url: Url,
}

impl RequestBuilder {
    /// Builder for the drive root.
    pub fn root(client: &Arc<dyn DriveClient>) -> Self {
        Self {
            client: client.clone(),
            url: client.root_url(),
        }
    }

    /// Builder for the item with the given identifier.
    pub fn item(client: &Arc<dyn DriveClient>, id: &str) -> Self {
        Self {
            client: client.clone(),
            url: client.item_url(id),
        }
    }

    /// Builder for a path relative to this item.
    ///
    /// # Errors
    /// - The resulting URL is invalid
    pub fn item_by_path(&self, path: &ItemPath) -> Result<Self> {
        Ok(Self {
            client: self.client.clone(),
            url: odata::path_url(&self.url, path)?,
        })
    }

    pub fn client(&self) -> &Arc<dyn DriveClient> {
        &self.client
    }

    pub fn request_url(&self) -> &Url {
        &self.url
    }

    /// First children request for this item.
    pub fn children_request(&self, page_size: u32, options: &ListOptions) -> Box<dyn ChildrenRequest> {
        self.client.children_request(&self.url, page_size, options)
    }

    /// Fetch the item's metadata.
    pub async fn get(&self, cancel: &CancellationToken) -> Result<RemoteItem> {
        let value = self
            .client
            .transport()
            .send(ApiRequest::get(self.url.clone()), cancel)
            .await?;
        self.client.decode_item(value)
    }

    /// Create a child folder.
    ///
    /// # Errors
    /// - `AlreadyExists` when the name is taken and `collision` is `FailIfExists`
    pub async fn create_folder(
        &self,
        name: &str,
        collision: CreationCollisionOption,
        cancel: &CancellationToken,
    ) -> Result<RemoteItem> {
        let body = serde_json::json!({
            "name": name,
            "folder": {},
            "@microsoft.graph.conflictBehavior": collision.conflict_behavior(),
        });
        let url = odata::join_segments(&self.url, &["children"]);
        let value = self
            .client
            .transport()
            .send(ApiRequest::post(url, body), cancel)
            .await?;
        self.client.decode_item(value)
    }

    /// Rename the item.
    pub async fn rename(&self, name: &str, cancel: &CancellationToken) -> Result<RemoteItem> {
        let body = serde_json::json!({ "name": name });
        let value = self
            .client
            .transport()
            .send(ApiRequest::patch(self.url.clone(), body), cancel)
            .await?;
        self.client.decode_item(value)
    }

    /// Delete the item.
    pub async fn delete(&self, cancel: &CancellationToken) -> Result<()> {
        self.client
            .transport()
            .send(ApiRequest::delete(self.url.clone()), cancel)
            .await?;
        Ok(())
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("api", &self.client.api())
            .field("url", &self.url.as_str())
            .finish()
    }
}
