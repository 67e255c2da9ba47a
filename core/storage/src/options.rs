//! Listing options and API selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use drivekit_common::Error;

/// Which remote API a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveApi {
    /// Legacy OneDrive API (`api.onedrive.com`).
    OneDrive,
    /// Microsoft Graph (`graph.microsoft.com`).
    Graph,
}

impl DriveApi {
    /// Registry name of the API.
    pub fn name(&self) -> &'static str {
        match self {
            DriveApi::OneDrive => "onedrive",
            DriveApi::Graph => "graph",
        }
    }
}

impl fmt::Display for DriveApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DriveApi {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onedrive" => Ok(DriveApi::OneDrive),
            "graph" => Ok(DriveApi::Graph),
            other => Err(Error::InvalidInput(format!(
                "Unknown drive API '{}', expected 'onedrive' or 'graph'",
                other
            ))),
        }
    }
}

/// Sort order of a children listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBy {
    /// Server default order; no `$orderby` is sent.
    #[default]
    None,
    /// By item name.
    Name,
    /// By size in bytes.
    Size,
    /// By last modification time.
    LastModified,
}

impl OrderBy {
    /// Value for the `$orderby` query parameter.
    pub fn as_query(&self) -> Option<&'static str> {
        match self {
            OrderBy::None => None,
            OrderBy::Name => Some("name"),
            OrderBy::Size => Some("size"),
            OrderBy::LastModified => Some("lastModifiedDateTime"),
        }
    }
}

impl FromStr for OrderBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(OrderBy::None),
            "name" => Ok(OrderBy::Name),
            "size" => Ok(OrderBy::Size),
            "modified" => Ok(OrderBy::LastModified),
            other => Err(Error::InvalidInput(format!("Unknown sort order '{}'", other))),
        }
    }
}

/// Parameters shared by every page of one listing.
///
/// Fixed for the lifetime of a listing; the filter is passed through to
/// the server unmodified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub order_by: OrderBy,
    pub filter: Option<String>,
}

impl ListOptions {
    /// Options with the given order and no filter.
    pub fn ordered(order_by: OrderBy) -> Self {
        Self {
            order_by,
            filter: None,
        }
    }

    /// Set the filter expression.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// What to do when a created item's name is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreationCollisionOption {
    #[default]
    FailIfExists,
    ReplaceExisting,
    GenerateUniqueName,
}

impl CreationCollisionOption {
    /// Value for `@microsoft.graph.conflictBehavior`.
    pub fn conflict_behavior(&self) -> &'static str {
        match self {
            CreationCollisionOption::FailIfExists => "fail",
            CreationCollisionOption::ReplaceExisting => "replace",
            CreationCollisionOption::GenerateUniqueName => "rename",
        }
    }
}

impl FromStr for CreationCollisionOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(CreationCollisionOption::FailIfExists),
            "replace" => Ok(CreationCollisionOption::ReplaceExisting),
            "rename" => Ok(CreationCollisionOption::GenerateUniqueName),
            other => Err(Error::InvalidInput(format!(
                "Unknown collision option '{}'",
                other
            ))),
        }
    }
}
