//! Microsoft Graph backend (`graph.microsoft.com`).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::item::{FileFacet, FolderFacet, PackageFacet, RemoteItem};
use crate::odata::{Dialect, IntoRemote, ODataClient};
use crate::options::DriveApi;

/// Microsoft Graph v1.0 base URL.
pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Reference to an item's parent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub drive_id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Item metadata in the Graph `driveItem` shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub parent_reference: Option<ItemReference>,
    #[serde(default)]
    pub folder: Option<FolderFacet>,
    #[serde(default)]
    pub file: Option<FileFacet>,
    #[serde(default)]
    pub package: Option<PackageFacet>,
}

impl IntoRemote for DriveItem {
    fn into_remote(self, payload: Value) -> RemoteItem {
        RemoteItem {
            id: self.id,
            name: self.name.unwrap_or_default(),
            size: self.size,
            last_modified: self.last_modified_date_time,
            folder: self.folder,
            file: self.file,
            package: self.package,
            payload,
        }
    }
}

/// Microsoft Graph, scoped to the signed-in user's drive (`/me/drive`).
#[derive(Debug, Clone, Copy)]
pub struct Graph;

impl Dialect for Graph {
    type Item = DriveItem;
    const API: DriveApi = DriveApi::Graph;
    const BASE_URL: &'static str = GRAPH_API_BASE;
    const DRIVE_PATH: &'static [&'static str] = &["me", "drive"];
}

/// Session against Microsoft Graph.
pub type GraphClient = ODataClient<Graph>;
