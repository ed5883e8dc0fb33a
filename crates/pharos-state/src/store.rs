//! StateStore — redb-backed inventory persistence.
//!
//! Provides a typed collection API (`insert`, `get`, `find`, `update`,
//! `remove`) over every [`Document`] type. Values are JSON-serialized into
//! redb's `&[u8]` value columns. Each call runs in its own transaction, so
//! single-document writes are atomic; nothing spans documents.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, Table};
use serde_json::Value;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::id::{is_valid_id, new_id};
use crate::query::{Filter, Patch};
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type DocTable<'txn> = Table<'txn, &'static str, &'static [u8]>;

/// Thread-safe inventory store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Connection))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Connection))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Connection))?;
        for collection in Collection::ALL {
            txn.open_table(collection.table())
                .map_err(map_err!(Operation))?;
        }
        txn.commit().map_err(map_err!(Operation))?;
        Ok(())
    }

    /// Run `f` against one collection inside a write transaction and commit.
    fn write<T>(
        &self,
        collection: Collection,
        f: impl FnOnce(&mut DocTable<'_>) -> StateResult<T>,
    ) -> StateResult<T> {
        let txn = self.db.begin_write().map_err(map_err!(Connection))?;
        let out = {
            let mut table = txn
                .open_table(collection.table())
                .map_err(map_err!(Operation))?;
            f(&mut table)?
        };
        txn.commit().map_err(map_err!(Operation))?;
        Ok(out)
    }

    // ── Collection API ─────────────────────────────────────────────

    /// Insert a new document, assigning an `_id` when it has none.
    ///
    /// Fails with `DuplicateKey` if the id or any unique field is taken.
    pub fn insert<D: Document>(&self, mut doc: D) -> StateResult<D> {
        let collection = D::COLLECTION;
        if doc.id().is_empty() {
            doc.set_id(new_id());
        } else if !is_valid_id(doc.id()) {
            return Err(StateError::InvalidId(doc.id().to_string()));
        }

        let id = doc.id().to_string();
        let value = serde_json::to_value(&doc).map_err(map_err!(Serialize))?;
        let bytes = serde_json::to_vec(&value).map_err(map_err!(Serialize))?;

        self.write(collection, |table| {
            if table
                .get(id.as_str())
                .map_err(map_err!(Operation))?
                .is_some()
            {
                return Err(StateError::DuplicateKey {
                    collection: collection.name(),
                    field: "_id".to_string(),
                    value: id.clone(),
                });
            }
            check_unique(table, collection, &value, &id)?;
            table
                .insert(id.as_str(), bytes.as_slice())
                .map_err(map_err!(Operation))?;
            Ok(())
        })?;

        debug!(collection = collection.name(), %id, "document inserted");
        Ok(doc)
    }

    /// Get a document by id.
    pub fn get<D: Document>(&self, id: &str) -> StateResult<D> {
        let collection = D::COLLECTION;
        if !is_valid_id(id) {
            return Err(StateError::InvalidId(id.to_string()));
        }

        let txn = self.db.begin_read().map_err(map_err!(Connection))?;
        let table = txn
            .open_table(collection.table())
            .map_err(map_err!(Operation))?;
        let guard = table
            .get(id)
            .map_err(map_err!(Operation))?
            .ok_or_else(|| StateError::not_found(collection.name(), id))?;
        let doc: D = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
        Ok(doc)
    }

    /// List every document matching `filter`.
    pub fn find<D: Document>(&self, filter: &Filter) -> StateResult<Vec<D>> {
        let txn = self.db.begin_read().map_err(map_err!(Connection))?;
        let table = txn
            .open_table(D::COLLECTION.table())
            .map_err(map_err!(Operation))?;
        scan(&table, filter)?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(map_err!(Deserialize)))
            .collect()
    }

    /// List every document of a collection.
    pub fn list<D: Document>(&self) -> StateResult<Vec<D>> {
        self.find(&Filter::all())
    }

    /// Apply `patches` to one document atomically and return the result.
    pub fn update<D: Document>(&self, id: &str, patches: &[Patch]) -> StateResult<D> {
        self.update_changed(id, patches).map(|(doc, _)| doc)
    }

    /// Like [`update`](Self::update), also reporting whether the patches
    /// changed the stored document.
    ///
    /// The check runs in the same transaction as the write, so of several
    /// callers adding the same set member exactly one sees `true`.
    pub fn update_changed<D: Document>(
        &self,
        id: &str,
        patches: &[Patch],
    ) -> StateResult<(D, bool)> {
        let collection = D::COLLECTION;
        if !is_valid_id(id) {
            return Err(StateError::InvalidId(id.to_string()));
        }

        let (updated, changed) = self.write(collection, |table| {
            let mut doc = load(table, collection, id)?;
            let before = doc.clone();
            let obj = doc
                .as_object_mut()
                .ok_or_else(|| StateError::Deserialize(format!("{id} is not an object")))?;
            for patch in patches {
                patch.apply(obj)?;
            }

            let typed: D =
                serde_json::from_value(doc.clone()).map_err(map_err!(Deserialize))?;
            if doc == before {
                return Ok((typed, false));
            }
            check_unique(table, collection, &doc, id)?;
            let bytes = serde_json::to_vec(&doc).map_err(map_err!(Serialize))?;
            table
                .insert(id, bytes.as_slice())
                .map_err(map_err!(Operation))?;
            Ok((typed, true))
        })?;

        debug!(collection = collection.name(), %id, patches = patches.len(), changed, "document updated");
        Ok((updated, changed))
    }

    /// Decrement an integer field, removing the document instead when the
    /// value would fall below one.
    ///
    /// Returns the updated document, or `None` if it was removed.
    pub fn decrement_or_remove<D: Document>(
        &self,
        id: &str,
        field: &str,
    ) -> StateResult<Option<D>> {
        let collection = D::COLLECTION;
        if !is_valid_id(id) {
            return Err(StateError::InvalidId(id.to_string()));
        }

        self.write(collection, |table| {
            let mut doc = load(table, collection, id)?;
            let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);

            if current <= 1 {
                table.remove(id).map_err(map_err!(Operation))?;
                debug!(collection = collection.name(), %id, "document released");
                return Ok(None);
            }

            let obj = doc
                .as_object_mut()
                .ok_or_else(|| StateError::Deserialize(format!("{id} is not an object")))?;
            Patch::inc(field, -1).apply(obj)?;
            let typed: D =
                serde_json::from_value(doc.clone()).map_err(map_err!(Deserialize))?;
            let bytes = serde_json::to_vec(&doc).map_err(map_err!(Serialize))?;
            table
                .insert(id, bytes.as_slice())
                .map_err(map_err!(Operation))?;
            Ok(Some(typed))
        })
    }

    /// Pull `value` from a set-valued field, removing the document instead
    /// when the set ends up empty.
    ///
    /// Returns the updated document, or `None` if it was removed.
    pub fn pull_or_remove<D: Document>(
        &self,
        id: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> StateResult<Option<D>> {
        let collection = D::COLLECTION;
        if !is_valid_id(id) {
            return Err(StateError::InvalidId(id.to_string()));
        }
        let pull = Patch::pull(field, value);

        self.write(collection, |table| {
            let mut doc = load(table, collection, id)?;
            let obj = doc
                .as_object_mut()
                .ok_or_else(|| StateError::Deserialize(format!("{id} is not an object")))?;
            pull.apply(obj)?;

            let empty = obj
                .get(field)
                .and_then(Value::as_array)
                .is_none_or(|items| items.is_empty());
            if empty {
                table.remove(id).map_err(map_err!(Operation))?;
                debug!(collection = collection.name(), %id, %field, "document emptied and removed");
                return Ok(None);
            }

            let typed: D =
                serde_json::from_value(doc.clone()).map_err(map_err!(Deserialize))?;
            let bytes = serde_json::to_vec(&doc).map_err(map_err!(Serialize))?;
            table
                .insert(id, bytes.as_slice())
                .map_err(map_err!(Operation))?;
            Ok(Some(typed))
        })
    }

    /// Remove a document by id.
    pub fn remove<D: Document>(&self, id: &str) -> StateResult<()> {
        let collection = D::COLLECTION;
        if !is_valid_id(id) {
            return Err(StateError::InvalidId(id.to_string()));
        }

        self.write(collection, |table| {
            let existed = table.remove(id).map_err(map_err!(Operation))?.is_some();
            if existed {
                Ok(())
            } else {
                Err(StateError::not_found(collection.name(), id))
            }
        })?;

        debug!(collection = collection.name(), %id, "document removed");
        Ok(())
    }
}

fn load(table: &DocTable<'_>, collection: Collection, id: &str) -> StateResult<Value> {
    let bytes = table
        .get(id)
        .map_err(map_err!(Operation))?
        .map(|guard| guard.value().to_vec())
        .ok_or_else(|| StateError::not_found(collection.name(), id))?;
    serde_json::from_slice(&bytes).map_err(map_err!(Deserialize))
}

fn scan(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    filter: &Filter,
) -> StateResult<Vec<Value>> {
    let mut results = Vec::new();
    for entry in table.iter().map_err(map_err!(Operation))? {
        let (_, value) = entry.map_err(map_err!(Operation))?;
        let doc: Value = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        if filter.matches(&doc) {
            results.push(doc);
        }
    }
    Ok(results)
}

/// Reject `doc` if another document already holds one of its unique values.
fn check_unique(
    table: &DocTable<'_>,
    collection: Collection,
    doc: &Value,
    own_id: &str,
) -> StateResult<()> {
    for field in collection.unique_fields() {
        let Some(value) = doc.get(*field) else {
            continue;
        };
        let clash = scan(table, &Filter::all().eq(field, value.clone()))?
            .iter()
            .any(|other| other.get("_id").and_then(Value::as_str) != Some(own_id));
        if clash {
            return Err(StateError::DuplicateKey {
                collection: collection.name(),
                field: field.to_string(),
                value: value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()),
            });
        }
    }
    Ok(())
}
