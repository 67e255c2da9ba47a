//! drivekit CLI - Command line access to OneDrive and Microsoft Graph drives.
//!
//! Lists folders page by page, looks up entries by path and performs
//! simple folder management against the signed-in user's drive.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::{Stream, TryStreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use drivekit_common::{AccessToken, Error, ItemPath};
use drivekit_storage::{
    create_default_registry, CreationCollisionOption, DriveApi, DriveClient, DriveConfig,
    ListOptions, OrderBy, RequestSource, StorageFolder, StorageItem, TypedItem,
};

#[derive(Parser)]
#[command(name = "drivekit")]
#[command(about = "drivekit - OneDrive and Microsoft Graph drive access")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON file with the drive configuration.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Drive API: "onedrive" or "graph".
    #[arg(short, long, global = true, default_value = "graph")]
    api: DriveApi,

    /// Access token (ignored when --config is given).
    #[arg(long, global = true, env = "DRIVEKIT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Override the API endpoint.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the contents of a folder.
    Ls {
        /// Folder path (default: root).
        #[arg(default_value = "/")]
        path: String,

        /// Entries per page.
        #[arg(short = 'n', long, default_value_t = 100)]
        page_size: u32,

        /// Ordering: "none", "name", "size" or "modified".
        #[arg(short, long, default_value = "none")]
        order: OrderBy,

        /// OData filter expression passed to the server.
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// List a slice of a folder by index.
    Range {
        /// Folder path.
        path: String,

        /// Index of the first entry.
        #[arg(short, long, default_value_t = 0)]
        start: usize,

        /// Number of entries.
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },

    /// Show an entry's metadata.
    Stat {
        /// Entry path.
        path: String,
    },

    /// Create a folder.
    Mkdir {
        /// Path of the folder to create.
        path: String,

        /// On name collision: "fail", "replace" or "rename".
        #[arg(long, default_value = "fail")]
        collision: CreationCollisionOption,
    },

    /// Rename an entry.
    Rename {
        /// Entry path.
        path: String,

        /// New name.
        name: String,
    },

    /// Delete an entry.
    Rm {
        /// Entry path.
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let client = connect(&cli)?;
    let root = StorageFolder::root(&client, &cancel)
        .await
        .context("Failed to open drive root")?;

    match cli.command {
        Commands::Ls {
            path,
            page_size,
            order,
            filter,
        } => {
            let options = ListOptions {
                order_by: order,
                filter,
            };
            cmd_ls(&root, &path, page_size, options, &cancel).await
        }

        Commands::Range { path, start, count } => {
            cmd_range(&root, &path, start, count, &cancel).await
        }

        Commands::Stat { path } => cmd_stat(&root, &path, &cancel).await,

        Commands::Mkdir { path, collision } => cmd_mkdir(&root, &path, collision, &cancel).await,

        Commands::Rename { path, name } => cmd_rename(&root, &path, &name, &cancel).await,

        Commands::Rm { path } => cmd_rm(&root, &path, &cancel).await,
    }
}

/// Build the drive client from the config file or the command line.
fn connect(cli: &Cli) -> Result<Arc<dyn DriveClient>> {
    let config: serde_json::Value = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&raw).context("Config file is not valid JSON")?
        }
        None => {
            let token = cli
                .token
                .clone()
                .context("No access token: pass --token, set DRIVEKIT_TOKEN or use --config")?;
            let mut config = DriveConfig::new(AccessToken::new(token));
            config.base_url = cli.base_url.clone();
            serde_json::to_value(&config)?
        }
    };

    info!("Connecting to {}", cli.api);
    create_default_registry()
        .resolve(cli.api.name(), config)
        .context("Failed to create drive client")
}

async fn folder_at(root: &StorageFolder, path: &str, cancel: &CancellationToken) -> Result<StorageFolder> {
    if path.trim_matches('/').is_empty() {
        return Ok(root.clone());
    }
    root.get_folder(path, cancel)
        .await
        .with_context(|| format!("Failed to open folder {}", path))
}

/// Split `a/b/c` into (`a/b`, `c`).
fn split_parent(path: &str) -> Result<(String, String)> {
    let parsed = ItemPath::parse(path).with_context(|| format!("Invalid path {}", path))?;
    match (parsed.parent(), parsed.name()) {
        (Some(parent), Some(name)) => Ok((parent.to_string(), name.to_string())),
        _ => anyhow::bail!("Path must name an entry below the root"),
    }
}

fn print_item(item: &TypedItem) {
    let kind = match item {
        TypedItem::Folder(_) => 'd',
        TypedItem::File(file) if file.is_notebook() => 'n',
        TypedItem::File(_) => 'f',
        TypedItem::Item(_) => '-',
    };
    print_row(kind, item.as_item());
}

fn print_row(kind: char, item: &StorageItem) {
    let size = item.size().map(|s| s.to_string()).unwrap_or_default();
    let modified = item
        .last_modified()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    println!("{} {:>12}  {:16}  {}", kind, size, modified, item.name());
}

/// List a folder, one page at a time.
async fn cmd_ls(
    root: &StorageFolder,
    path: &str,
    page_size: u32,
    options: ListOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let folder = folder_at(root, path, cancel).await?;
    let source: RequestSource<TypedItem> = folder.items_source(options);

    let pages = source.into_stream(page_size, cancel.clone());
    let (total, cancelled) = drain_pages(pages, cancel, |page: &[TypedItem]| {
        page.iter().for_each(print_item)
    })
    .await?;

    if cancelled {
        warn!("Listing cancelled after {} entries", total);
    } else {
        println!("\n{} entries", total);
    }
    Ok(())
}

/// Feed each page to `on_page` until the listing ends.
///
/// Returns the number of entries seen and whether cancellation cut the
/// listing short, either between pages or during a fetch.
async fn drain_pages<T, S>(
    pages: S,
    cancel: &CancellationToken,
    mut on_page: impl FnMut(&[T]),
) -> Result<(usize, bool)>
where
    S: Stream<Item = drivekit_common::Result<Vec<T>>>,
{
    let mut pages = Box::pin(pages);
    let mut total = 0usize;
    loop {
        match pages.try_next().await {
            Ok(Some(page)) => {
                total += page.len();
                on_page(&page);
            }
            Ok(None) => break,
            Err(Error::Cancelled) => return Ok((total, true)),
            Err(e) => return Err(e).context("Failed to list folder"),
        }
    }
    Ok((total, cancel.is_cancelled()))
}

async fn cmd_range(
    root: &StorageFolder,
    path: &str,
    start: usize,
    count: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let folder = folder_at(root, path, cancel).await?;
    let items = folder
        .get_items_range(start, count, cancel)
        .await
        .context("Failed to list folder")?;

    for item in items {
        print_item(&TypedItem::classify(item));
    }
    Ok(())
}

async fn cmd_stat(root: &StorageFolder, path: &str, cancel: &CancellationToken) -> Result<()> {
    let item = root
        .get_item(path, cancel)
        .await
        .with_context(|| format!("Failed to look up {}", path))?;

    let entry = item.as_item();
    println!("Name:     {}", entry.name());
    println!("ID:       {}", entry.id());
    println!("Kind:     {:?}", item.shape());
    if let Some(size) = entry.size() {
        println!("Size:     {}", size);
    }
    if let Some(modified) = entry.last_modified() {
        println!("Modified: {}", modified.to_rfc3339());
    }
    match &item {
        TypedItem::Folder(folder) => {
            if let Some(children) = folder.child_count() {
                println!("Children: {}", children);
            }
        }
        TypedItem::File(file) => {
            if let Some(mime) = file.mime_type() {
                println!("Type:     {}", mime);
            }
        }
        TypedItem::Item(_) => {}
    }
    Ok(())
}

async fn cmd_mkdir(
    root: &StorageFolder,
    path: &str,
    collision: CreationCollisionOption,
    cancel: &CancellationToken,
) -> Result<()> {
    let (parent, name) = split_parent(path)?;
    let parent = folder_at(root, &parent, cancel).await?;
    let folder = parent
        .create_folder(&name, collision, cancel)
        .await
        .with_context(|| format!("Failed to create {}", path))?;

    println!("Created {} ({})", folder.name(), folder.id());
    Ok(())
}

async fn cmd_rename(root: &StorageFolder, path: &str, name: &str, cancel: &CancellationToken) -> Result<()> {
    split_parent(path)?;
    let renamed = match root.get_item(path, cancel).await? {
        TypedItem::Folder(folder) => folder.rename(name, cancel).await?.into_item(),
        TypedItem::File(file) => file.rename(name, cancel).await?.into_item(),
        TypedItem::Item(item) => {
            anyhow::bail!("Cannot rename {}: not a file or folder", item.name())
        }
    };

    println!("Renamed to {}", renamed.name());
    Ok(())
}

async fn cmd_rm(root: &StorageFolder, path: &str, cancel: &CancellationToken) -> Result<()> {
    split_parent(path)?;
    let item = root.get_item(path, cancel).await?;
    item.as_item()
        .delete(cancel)
        .await
        .with_context(|| format!("Failed to delete {}", path))?;

    println!("Deleted {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_split_parent() {
        assert_eq!(
            split_parent("/Documents/2024/report.pdf").unwrap(),
            ("Documents/2024".to_string(), "report.pdf".to_string())
        );
        assert_eq!(
            split_parent("Photos/").unwrap(),
            (String::new(), "Photos".to_string())
        );
        assert!(split_parent("/").is_err());
        assert!(split_parent("a//b").is_err());
    }

    #[tokio::test]
    async fn test_drain_pages_counts_entries() {
        let pages = stream::iter(vec![Ok(vec![1, 2]), Ok(vec![]), Ok(vec![3])]);
        let mut seen = Vec::new();

        let (total, cancelled) = drain_pages(pages, &CancellationToken::new(), |page: &[i32]| {
            seen.extend_from_slice(page)
        })
        .await
        .unwrap();

        assert_eq!(total, 3);
        assert!(!cancelled);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_drain_pages_in_flight_cancel_is_not_a_failure() {
        let cancel = CancellationToken::new();
        let pages = stream::iter(vec![Ok(vec![1, 2]), Err(Error::Cancelled)]);

        let (total, cancelled) = drain_pages(pages, &cancel, |_: &[i32]| {}).await.unwrap();

        assert_eq!(total, 2);
        assert!(cancelled);
    }

    #[tokio::test]
    async fn test_drain_pages_reports_cancel_between_pages() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let pages = stream::iter(Vec::<drivekit_common::Result<Vec<i32>>>::new());

        let (total, cancelled) = drain_pages(pages, &cancel, |_: &[i32]| {}).await.unwrap();

        assert_eq!(total, 0);
        assert!(cancelled);
    }

    #[tokio::test]
    async fn test_drain_pages_propagates_failures() {
        let pages = stream::iter(vec![
            Ok(vec![1]),
            Err(Error::Network("503".to_string())),
        ]);

        let err = drain_pages(pages, &CancellationToken::new(), |_: &[i32]| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to list folder"));
    }
}
