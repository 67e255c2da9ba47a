//! Legacy OneDrive API backend (`api.onedrive.com`).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::item::{FileFacet, FolderFacet, PackageFacet, RemoteItem};
use crate::odata::{Dialect, IntoRemote, ODataClient};
use crate::options::DriveApi;

/// OneDrive API base URL.
pub const ONEDRIVE_API_BASE: &str = "https://api.onedrive.com/v1.0";

/// Item metadata in the OneDrive API shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub last_modified_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub c_tag: Option<String>,
    #[serde(default)]
    pub folder: Option<FolderFacet>,
    #[serde(default)]
    pub file: Option<FileFacet>,
    #[serde(default)]
    pub package: Option<PackageFacet>,
}

impl IntoRemote for Item {
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

/// The OneDrive API: items live under `/drive`.
#[derive(Debug, Clone, Copy)]
pub struct OneDrive;

impl Dialect for OneDrive {
    type Item = Item;
    const API: DriveApi = DriveApi::OneDrive;
    const BASE_URL: &'static str = ONEDRIVE_API_BASE;
    const DRIVE_PATH: &'static [&'static str] = &["drive"];
}

/// Session against the OneDrive API.
pub type OneDriveClient = ODataClient<OneDrive>;
