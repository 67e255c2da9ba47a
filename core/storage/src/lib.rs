//! OneDrive and Microsoft Graph drive access for drivekit.
//!
//! This crate lists and manipulates the contents of a cloud drive through
//! either the legacy OneDrive API or Microsoft Graph. The API is chosen by
//! injecting a [`DriveClient`]; everything above it is shared.
//!
//! # Design Principles
//! - Backend isolation: URL layout and wire shapes live in `onedrive`/`graph`
//! - Async operations: every round trip is async and cancellable
//! - Incremental loading: large folders are read page by page

pub mod collection;
pub mod config;
pub mod folder;
pub mod graph;
pub mod item;
pub mod memory;
pub mod model;
pub mod odata;
pub mod onedrive;
pub mod options;
pub mod provider;
pub mod registry;
pub mod request_source;
pub mod transport;

pub use collection::{ItemsCollection, ItemsEnumerator};
pub use config::{create_graph_client, create_onedrive_client, DriveConfig};
pub use folder::{DEFAULT_FILES_TOP, DEFAULT_FOLDERS_TOP};
pub use graph::GraphClient;
pub use item::{ItemShape, RemoteItem};
pub use memory::MemoryTransport;
pub use model::{StorageFile, StorageFolder, StorageItem, TypedItem};
pub use onedrive::OneDriveClient;
pub use options::{CreationCollisionOption, DriveApi, ListOptions, OrderBy};
pub use provider::{ChildrenPage, ChildrenRequest, DriveClient, RequestBuilder};
pub use registry::{create_default_registry, ClientFactory, ClientRegistry};
pub use request_source::{IncrementalSource, PagingState, RequestSource};
pub use transport::{AccessTokenProvider, ApiRequest, HttpTransport, StaticTokenProvider, Transport};
