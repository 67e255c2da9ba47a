//! In-memory drive for testing.
//!
//! [`MemoryTransport`] answers the subset of the drive REST surface the
//! backends use, for either API's URL layout: item lookup by id or path,
//! paged `children` listing with `@odata.nextLink`, folder creation,
//! rename and delete. `$filter` is accepted and ignored.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use percent_encoding::percent_decode_str;
use reqwest::Method;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use drivekit_common::{Error, Result};

use crate::odata::NEXT_LINK;
use crate::transport::{ApiRequest, Transport};

/// Page size used when a listing does not send `$top`.
pub const DEFAULT_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone)]
struct Entry {
    item: Value,
    parent: Option<String>,
    children: Vec<String>,
}

impl Entry {
    fn name(&self) -> &str {
        self.item.get("name").and_then(Value::as_str).unwrap_or_default()
    }

    fn is_folder(&self) -> bool {
        self.item.get("folder").is_some()
    }
}

#[derive(Debug)]
struct MemoryDrive {
    root_id: String,
    entries: HashMap<String, Entry>,
}

impl MemoryDrive {
    fn entry(&self, id: &str) -> Result<&Entry> {
        self.entries
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("Item not found: {}", id)))
    }

    fn child_named(&self, parent_id: &str, name: &str) -> Option<String> {
        self.entries.get(parent_id).and_then(|parent| {
            parent
                .children
                .iter()
                .find(|child| self.entries.get(child.as_str()).map(|e| e.name()) == Some(name))
                .cloned()
        })
    }

    fn render(&self, id: &str) -> Result<Value> {
        let entry = self.entry(id)?;
        let mut item = entry.item.clone();
        if let Some(folder) = item.get_mut("folder").and_then(Value::as_object_mut) {
            folder.insert("childCount".to_string(), json!(entry.children.len()));
        }
        Ok(item)
    }

    fn insert(&mut self, parent_id: &str, mut item: Value) -> Result<String> {
        let parent = self.entry(parent_id)?;
        if !parent.is_folder() {
            return Err(Error::InvalidInput(format!("Parent is not a folder: {}", parent_id)));
        }

        let name = item
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::InvalidInput("Item requires a name".to_string()))?
            .to_string();
        if self.child_named(parent_id, &name).is_some() {
            return Err(Error::AlreadyExists(format!("Name already exists: {}", name)));
        }

        let object = item
            .as_object_mut()
            .ok_or_else(|| Error::InvalidInput("Item must be a JSON object".to_string()))?;
        let id = match object.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        if self.entries.contains_key(&id) {
            return Err(Error::AlreadyExists(format!("Item id already exists: {}", id)));
        }
        object.insert("id".to_string(), json!(id));
        object.insert("parentReference".to_string(), json!({ "id": parent_id }));
        object
            .entry("lastModifiedDateTime")
            .or_insert_with(|| json!(now()));

        self.entries.insert(
            id.clone(),
            Entry {
                item,
                parent: Some(parent_id.to_string()),
                children: Vec::new(),
            },
        );
        if let Some(parent) = self.entries.get_mut(parent_id) {
            parent.children.push(id.clone());
        }

        Ok(id)
    }

    fn remove(&mut self, id: &str) {
        if let Some(entry) = self.entries.remove(id) {
            if let Some(parent) = entry.parent.as_ref().and_then(|p| self.entries.get_mut(p)) {
                parent.children.retain(|c| c != id);
            }
            for child in entry.children {
                self.remove(&child);
            }
        }
    }

    fn unique_name(&self, parent_id: &str, name: &str) -> String {
        let (stem, ext) = match name.rfind('.') {
            Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
            _ => (name, ""),
        };
        (1..)
            .map(|n| format!("{} {}{}", stem, n, ext))
            .find(|candidate| self.child_named(parent_id, candidate).is_none())
            .unwrap_or_else(|| name.to_string())
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

fn compare_by(key: &str, a: &Value, b: &Value) -> Ordering {
    match key {
        "size" => {
            let size = |v: &Value| v.get("size").and_then(Value::as_u64).unwrap_or(0);
            size(a).cmp(&size(b))
        }
        other => {
            let field = |v: &Value| v.get(other).and_then(Value::as_str).unwrap_or_default().to_string();
            field(a).cmp(&field(b))
        }
    }
}

/// In-memory implementation of [`Transport`].
pub struct MemoryTransport {
    drive: RwLock<MemoryDrive>,
    failures: Mutex<VecDeque<Error>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MemoryTransport {
    /// Create a drive containing only its root folder.
    pub fn new() -> Self {
        let root_id = Uuid::new_v4().to_string();
        let root = Entry {
            item: json!({
                "id": root_id,
                "name": "root",
                "folder": {},
                "root": {},
                "lastModifiedDateTime": now(),
            }),
            parent: None,
            children: Vec::new(),
        };

        let mut entries = HashMap::new();
        entries.insert(root_id.clone(), root);

        Self {
            drive: RwLock::new(MemoryDrive { root_id, entries }),
            failures: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryDrive> {
        self.drive.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryDrive> {
        self.drive.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_log(&self) -> MutexGuard<'_, Vec<ApiRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Identifier of the root folder.
    pub fn root_id(&self) -> String {
        self.read().root_id.clone()
    }

    /// Add a folder under `parent_id`.
    pub fn add_folder(&self, parent_id: &str, name: &str) -> Result<String> {
        self.add_raw(parent_id, json!({ "name": name, "folder": {} }))
    }

    /// Add a file of `size` bytes under `parent_id`.
    pub fn add_file(&self, parent_id: &str, name: &str, size: u64) -> Result<String> {
        self.add_raw(
            parent_id,
            json!({
                "name": name,
                "size": size,
                "file": { "mimeType": "application/octet-stream" },
            }),
        )
    }

    /// Add a OneNote notebook package under `parent_id`.
    pub fn add_notebook(&self, parent_id: &str, name: &str) -> Result<String> {
        self.add_raw(parent_id, json!({ "name": name, "package": { "type": "oneNote" } }))
    }

    /// Add an item with arbitrary facets.
    ///
    /// `id`, `parentReference` and `lastModifiedDateTime` are filled in
    /// when absent.
    pub fn add_raw(&self, parent_id: &str, item: Value) -> Result<String> {
        self.write().insert(parent_id, item)
    }

    /// Whether an item with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.read().entries.contains_key(id)
    }

    /// Names of the children of `parent_id`, in insertion order.
    pub fn child_names(&self, parent_id: &str) -> Vec<String> {
        let drive = self.read();
        drive
            .entries
            .get(parent_id)
            .map(|parent| {
                parent
                    .children
                    .iter()
                    .filter_map(|c| drive.entries.get(c).map(|e| e.name().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Make the next request fail with `error`.
    pub fn fail_next(&self, error: Error) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Every request received so far, including failed ones.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.request_log().clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.request_log().len()
    }

    /// Resolve the addressed item id and the trailing segments.
    fn resolve(&self, url: &Url) -> Result<(String, Vec<String>)> {
        let drive = self.read();
        let raw: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();

        let anchor = raw
            .iter()
            .position(|s| *s == "items" || *s == "root" || s.starts_with("root:"))
            .ok_or_else(|| Error::NotFound(format!("No item addressed by {}", url)))?;

        let (head, mut rest) = if raw[anchor] == "items" {
            let id = raw
                .get(anchor + 1)
                .ok_or_else(|| Error::NotFound(format!("Missing item id in {}", url)))?;
            (id.to_string(), &raw[anchor + 2..])
        } else {
            (raw[anchor].replacen("root", &drive.root_id, 1), &raw[anchor + 1..])
        };

        let id = match head.strip_suffix(':') {
            None => decode(&head),
            Some(base) => {
                let mut current = decode(base);
                let end = rest
                    .iter()
                    .position(|s| s.ends_with(':'))
                    .ok_or_else(|| Error::InvalidInput(format!("Unterminated item path in {}", url)))?;

                for (index, segment) in rest[..=end].iter().enumerate() {
                    let segment: &str = if index == end {
                        segment.trim_end_matches(':')
                    } else {
                        segment
                    };
                    let name = decode(segment);
                    current = drive.child_named(&current, &name).ok_or_else(|| {
                        Error::NotFound(format!("Path component not found: {}", name))
                    })?;
                }
                rest = &rest[end + 1..];
                current
            }
        };

        drive.entry(&id)?;
        Ok((id, rest.iter().map(|s| decode(s)).collect()))
    }

    fn list_children(&self, id: &str, url: &Url) -> Result<Value> {
        let drive = self.read();
        let entry = drive.entry(id)?;

        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let top = query
            .get("$top")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .max(1);
        let skip = query
            .get("$skiptoken")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        let mut children = entry
            .children
            .iter()
            .map(|child| drive.render(child))
            .collect::<Result<Vec<_>>>()?;

        if let Some(order_by) = query.get("$orderby") {
            let mut parts = order_by.split_whitespace();
            let key = parts.next().unwrap_or("name");
            let descending = parts.next() == Some("desc");
            children.sort_by(|a, b| {
                let ordering = compare_by(key, a, b);
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let page: Vec<Value> = children.iter().skip(skip).take(top).cloned().collect();
        let mut response = json!({
            "@odata.context": format!("{}#children", url.origin().ascii_serialization()),
            "value": page,
        });

        if skip + top < children.len() {
            let mut next = url.clone();
            {
                let mut pairs = next.query_pairs_mut();
                pairs.clear();
                for (key, value) in url.query_pairs() {
                    if key != "$skiptoken" {
                        pairs.append_pair(&key, &value);
                    }
                }
                pairs.append_pair("$skiptoken", &(skip + top).to_string());
            }
            response[NEXT_LINK] = json!(next.as_str());
        }

        Ok(response)
    }

    fn create_folder(&self, parent_id: &str, body: Option<&Value>) -> Result<Value> {
        let body = body.ok_or_else(|| Error::InvalidInput("Missing request body".to_string()))?;
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidInput("Missing folder name".to_string()))?;
        let behavior = body
            .get("@microsoft.graph.conflictBehavior")
            .and_then(Value::as_str)
            .unwrap_or("fail");

        let mut drive = self.write();
        let mut name = name.to_string();
        if let Some(existing) = drive.child_named(parent_id, &name) {
            match behavior {
                "replace" => drive.remove(&existing),
                "rename" => name = drive.unique_name(parent_id, &name),
                _ => {
                    return Err(Error::AlreadyExists(format!(
                        "Name already exists: {}",
                        name
                    )))
                }
            }
        }

        let id = drive.insert(parent_id, json!({ "name": name, "folder": {} }))?;
        drive.render(&id)
    }

    fn rename(&self, id: &str, body: Option<&Value>) -> Result<Value> {
        let name = body
            .and_then(|b| b.get("name"))
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::InvalidInput("Missing new name".to_string()))?
            .to_string();

        let mut drive = self.write();
        let parent = drive
            .entry(id)?
            .parent
            .clone()
            .ok_or_else(|| Error::InvalidInput("Cannot rename the root folder".to_string()))?;
        if let Some(other) = drive.child_named(&parent, &name) {
            if other != id {
                return Err(Error::AlreadyExists(format!("Name already exists: {}", name)));
            }
        }

        if let Some(entry) = drive.entries.get_mut(id) {
            entry.item["name"] = json!(name);
            entry.item["lastModifiedDateTime"] = json!(now());
        }
        drive.render(id)
    }

    fn delete(&self, id: &str) -> Result<Value> {
        let mut drive = self.write();
        if id == drive.root_id {
            return Err(Error::InvalidInput("Cannot delete the root folder".to_string()));
        }
        drive.remove(id);
        Ok(Value::Null)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<Value> {
        self.request_log().push(request.clone());

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let injected = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(error) = injected {
            return Err(error);
        }

        let (id, rest) = self.resolve(&request.url)?;
        let method = &request.method;
        let children = matches!(rest.as_slice(), [segment] if segment == "children");

        if *method == Method::GET && rest.is_empty() {
            self.read().render(&id)
        } else if *method == Method::GET && children {
            self.list_children(&id, &request.url)
        } else if *method == Method::POST && children {
            self.create_folder(&id, request.body.as_ref())
        } else if *method == Method::PATCH && rest.is_empty() {
            self.rename(&id, request.body.as_ref())
        } else if *method == Method::DELETE && rest.is_empty() {
            self.delete(&id)
        } else {
            Err(Error::Network(format!(
                "Unsupported request: {} {}",
                method, request.url
            )))
        }
    }
}
