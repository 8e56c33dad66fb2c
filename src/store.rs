//! Document store.
//!
//! Documents are JSON objects grouped into named collections.  Every operation selects documents
//! with a filter object: a document matches when each filter field is present in it with an equal
//! value.  The empty filter matches everything.

use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::{collections::HashMap, path::PathBuf};
use tokio::sync::{Mutex, RwLock};

pub type Document = Value;

/// Field holding a document's unique id
pub const ID_FIELD: &str = "_id";

#[serenity::async_trait]
pub trait Store: Send + Sync {
    async fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Document>>;
    async fn find_all(&self, collection: &str, filter: &Value) -> Result<Vec<Document>>;
    /// Returns the id of the new document, assigning one if it has none
    async fn insert(&self, collection: &str, doc: Document) -> Result<String>;
    /// Replaces every matching document, keeping their ids.  Returns how many were replaced.
    async fn update(&self, collection: &str, filter: &Value, doc: Document) -> Result<u64>;
    /// Returns how many documents were removed
    async fn delete(&self, collection: &str, filter: &Value) -> Result<u64>;
    /// Replaces the first matching document, or inserts when none matches
    async fn upsert(&self, collection: &str, filter: &Value, doc: Document) -> Result<()>;
}

/// Serde conveniences on top of any `Store`
#[serenity::async_trait]
pub trait TypedStore: Store {
    async fn find_one_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &Value,
    ) -> Result<Option<T>> {
        self.find_one(collection, filter)
            .await?
            .map(|doc| serde_json::from_value(doc).map_err(Into::into))
            .transpose()
    }

    async fn find_all_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &Value,
    ) -> Result<Vec<T>> {
        self.find_all(collection, filter)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(Into::into))
            .collect()
    }

    async fn insert_as<T: Serialize + Sync>(&self, collection: &str, doc: &T) -> Result<String> {
        self.insert(collection, serde_json::to_value(doc)?).await
    }

    async fn update_as<T: Serialize + Sync>(
        &self,
        collection: &str,
        filter: &Value,
        doc: &T,
    ) -> Result<u64> {
        self.update(collection, filter, serde_json::to_value(doc)?)
            .await
    }

    async fn upsert_as<T: Serialize + Sync>(
        &self,
        collection: &str,
        filter: &Value,
        doc: &T,
    ) -> Result<()> {
        self.upsert(collection, filter, serde_json::to_value(doc)?)
            .await
    }
}

impl<S: Store + ?Sized> TypedStore for S {}

fn fields_match(doc: &Map<String, Value>, filter: &Value) -> bool {
    match filter.as_object() {
        Some(wanted) => wanted.iter().all(|(key, want)| doc.get(key) == Some(want)),
        None => false,
    }
}

fn as_object(doc: Document) -> Result<Map<String, Value>> {
    match doc {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("Documents must be JSON objects, got `{}`", other)),
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

type Collections = HashMap<String, Vec<Map<String, Value>>>;

/// Store which lives and dies with the process
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_collections(collections: Collections) -> Self {
        Self {
            collections: RwLock::new(collections),
        }
    }

    async fn snapshot(&self) -> Collections {
        self.collections.read().await.clone()
    }
}

#[serenity::async_trait]
impl Store for MemoryStore {
    async fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|docs| {
            docs.iter()
                .find(|doc| fields_match(doc, filter))
                .map(|doc| Value::Object(doc.clone()))
        }))
    }

    async fn find_all(&self, collection: &str, filter: &Value) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| fields_match(doc, filter))
                    .map(|doc| Value::Object(doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<String> {
        let mut doc = as_object(doc)?;
        let id = match doc.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) => id.to_owned(),
            None => {
                let id = new_id();
                doc.insert(ID_FIELD.to_owned(), Value::String(id.clone()));
                id
            }
        };

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_owned()).or_default();
        if docs
            .iter()
            .any(|existing| existing.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str()))
        {
            return Err(anyhow!(
                "Document `{}` already exists in `{}`",
                id,
                collection
            ));
        }
        docs.push(doc);
        Ok(id)
    }

    async fn update(&self, collection: &str, filter: &Value, doc: Document) -> Result<u64> {
        let doc = as_object(doc)?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut replaced = 0;
        for existing in docs.iter_mut() {
            if !fields_match(existing, filter) {
                continue;
            }
            let id = existing.get(ID_FIELD).cloned();
            *existing = doc.clone();
            if let Some(id) = id {
                existing.insert(ID_FIELD.to_owned(), id);
            }
            replaced += 1;
        }
        Ok(replaced)
    }

    async fn delete(&self, collection: &str, filter: &Value) -> Result<u64> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = docs.len();
        docs.retain(|doc| !fields_match(doc, filter));
        Ok((before - docs.len()) as u64)
    }

    async fn upsert(&self, collection: &str, filter: &Value, doc: Document) -> Result<()> {
        let mut doc = as_object(doc)?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_owned()).or_default();

        match docs
            .iter_mut()
            .find(|existing| fields_match(existing, filter))
        {
            Some(existing) => {
                if let Some(id) = existing.get(ID_FIELD).cloned() {
                    doc.insert(ID_FIELD.to_owned(), id);
                }
                *existing = doc;
            }
            None => {
                if !doc.contains_key(ID_FIELD) {
                    doc.insert(ID_FIELD.to_owned(), Value::String(new_id()));
                }
                docs.push(doc);
            }
        }
        Ok(())
    }
}

/// `MemoryStore` which persists every mutation to a JSON file
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
    // Held from snapshot to rename.
    save_lock: Mutex<()>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist yet.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let collections = match tokio::fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data).map_err(|e| {
                anyhow!(
                    "Could not parse store at `{}`: {}",
                    path.to_string_lossy(),
                    e
                )
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Collections::new(),
            Err(e) => {
                return Err(anyhow!(
                    "Could not read store at `{}`: {}",
                    path.to_string_lossy(),
                    e
                ))
            }
        };

        Ok(Self {
            path,
            inner: MemoryStore::from_collections(collections),
            save_lock: Mutex::new(()),
        })
    }

    async fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let contents = serde_json::to_vec_pretty(&self.inner.snapshot().await)
            .map_err(|e| anyhow!("Could not serialize store: {}", e))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                anyhow!(
                    "Could not create directory `{}`: {}",
                    parent.to_string_lossy(),
                    e
                )
            })?;
        }

        // Create a temporary file in the same directory.
        let tmp_path = self.path.with_extension("json.new");

        tokio::fs::write(&tmp_path, contents).await.map_err(|e| {
            anyhow!(
                "Could not write store to temporary file `{}`: {}",
                tmp_path.to_string_lossy(),
                e
            )
        })?;

        // Atomically rename the temporary file over the target file.
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            anyhow!(
                "Could not rename temporary file `{}` to `{}`: {}",
                tmp_path.to_string_lossy(),
                self.path.to_string_lossy(),
                e
            )
        })?;

        Ok(())
    }
}

#[serenity::async_trait]
impl Store for FileStore {
    async fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Document>> {
        self.inner.find_one(collection, filter).await
    }

    async fn find_all(&self, collection: &str, filter: &Value) -> Result<Vec<Document>> {
        self.inner.find_all(collection, filter).await
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<String> {
        let id = self.inner.insert(collection, doc).await?;
        self.save().await?;
        Ok(id)
    }

    async fn update(&self, collection: &str, filter: &Value, doc: Document) -> Result<u64> {
        let replaced = self.inner.update(collection, filter, doc).await?;
        if replaced > 0 {
            self.save().await?;
        }
        Ok(replaced)
    }

    async fn delete(&self, collection: &str, filter: &Value) -> Result<u64> {
        let removed = self.inner.delete(collection, filter).await?;
        if removed > 0 {
            self.save().await?;
        }
        Ok(removed)
    }

    async fn upsert(&self, collection: &str, filter: &Value, doc: Document) -> Result<()> {
        self.inner.upsert(collection, filter, doc).await?;
        self.save().await
    }
}
