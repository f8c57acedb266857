// Copyright Rouven Bauer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde_json::{json, Value};

use crate::database::Database;
use crate::error::{ArangoError, Result};
use crate::executor::ExecutionResult;
use crate::formatter;
use crate::request::{Method, Request};

const ERR_DOCUMENT_NOT_FOUND: i64 = 1202;
const ERR_INDEX_NOT_FOUND: i64 = 1212;

/// Wrapper for one collection: its settings, indexes and documents.
///
/// Document writes carry a javascript form of themselves plus collection
/// access hints, so the same calls work unchanged on a transaction handle.
#[derive(Debug, Clone)]
pub struct Collection {
    db: Database,
    name: String,
}

impl Collection {
    pub(crate) fn new(db: Database, name: &str) -> Self {
        Self {
            db,
            name: name.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ------------------------------------------------------------------
    // settings
    // ------------------------------------------------------------------

    pub fn properties(&self) -> Result<ExecutionResult<Value>> {
        let request = Request::new(
            Method::Get,
            format!("/_api/collection/{}/properties", self.name),
        );
        self.db.execute_with("collection.properties", request, |resp| {
            Ok(formatter::format_collection(&resp.body()))
        })
    }

    /// Change the collection's mutable settings.
    pub fn configure(
        &self,
        sync: Option<bool>,
        schema: Option<Value>,
    ) -> Result<ExecutionResult<Value>> {
        let mut data = json!({});
        if let Some(sync) = sync {
            data["waitForSync"] = Value::Bool(sync);
        }
        if let Some(schema) = schema {
            data["schema"] = schema;
        }
        let request = Request::new(
            Method::Put,
            format!("/_api/collection/{}/properties", self.name),
        )
        .with_data(data);
        self.db.execute_with("collection.configure", request, |resp| {
            Ok(formatter::format_collection(&resp.body()))
        })
    }

    pub fn count(&self) -> Result<ExecutionResult<u64>> {
        let request = Request::new(
            Method::Get,
            format!("/_api/collection/{}/count", self.name),
        );
        self.db.execute_with("collection.count", request, |resp| {
            resp.body()
                .get("count")
                .and_then(Value::as_u64)
                .ok_or_else(|| ArangoError::deserialization("count response carries no count"))
        })
    }

    /// Storage figures for the collection (document counts, sizes, cache
    /// usage).
    pub fn statistics(&self) -> Result<ExecutionResult<Value>> {
        let request = Request::new(
            Method::Get,
            format!("/_api/collection/{}/figures", self.name),
        );
        self.db.execute_with("collection.statistics", request, |resp| {
            let body = resp.body();
            let figures = body.get("figures").cloned().unwrap_or(body);
            Ok(formatter::format_body(&figures))
        })
    }

    /// Current revision of the collection, changing on every write.
    pub fn revision(&self) -> Result<ExecutionResult<String>> {
        let request = Request::new(
            Method::Get,
            format!("/_api/collection/{}/revision", self.name),
        );
        self.db.execute_with("collection.revision", request, |resp| {
            resp.body()
                .get("revision")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| {
                    ArangoError::deserialization("revision response carries no revision")
                })
        })
    }

    /// Checksum over the collection's documents.
    pub fn checksum(
        &self,
        with_rev: bool,
        with_data: bool,
    ) -> Result<ExecutionResult<String>> {
        let request = Request::new(
            Method::Get,
            format!("/_api/collection/{}/checksum", self.name),
        )
        .with_param_bool("withRevisions", with_rev)
        .with_param_bool("withData", with_data);
        self.db.execute_with("collection.checksum", request, |resp| {
            resp.body()
                .get("checksum")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| {
                    ArangoError::deserialization("checksum response carries no checksum")
                })
        })
    }

    /// Remove every document, keeping the collection and its indexes.
    pub fn truncate(&self) -> Result<ExecutionResult<bool>> {
        let request = Request::new(
            Method::Put,
            format!("/_api/collection/{}/truncate", self.name),
        );
        self.db
            .execute_with("collection.truncate", request, |_| Ok(true))
    }

    /// Rename the collection. The wrapper follows the new name once the
    /// server confirmed it; a failed rename keeps addressing the old one.
    pub fn rename(&mut self, new_name: &str) -> Result<ExecutionResult<Value>> {
        let request = Request::new(
            Method::Put,
            format!("/_api/collection/{}/rename", self.name),
        )
        .with_data(json!({ "name": new_name }));
        let result = self.db.execute_with("collection.rename", request, |resp| {
            Ok(formatter::format_collection(&resp.body()))
        })?;
        if matches!(result, ExecutionResult::Value(_)) {
            self.name = new_name.to_owned();
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // indexes
    // ------------------------------------------------------------------

    pub fn indexes(&self) -> Result<ExecutionResult<Vec<Value>>> {
        let request = Request::new(Method::Get, "/_api/index")
            .with_param("collection", self.name.clone());
        self.db
            .execute_with("index.list", request, |resp| match resp.body().get("indexes") {
                Some(Value::Array(items)) => {
                    Ok(items.iter().map(formatter::format_index).collect())
                }
                _ => Err(ArangoError::deserialization("expected index array")),
            })
    }

    /// Create an index. `index` uses the server's camelCase field names,
    /// e.g. `{"type": "persistent", "fields": ["email"], "unique": true}`.
    pub fn add_index(&self, index: Value) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Post, "/_api/index")
            .with_param("collection", self.name.clone())
            .with_data(index);
        self.db.execute_with("index.create", request, |resp| {
            Ok(formatter::format_index(&resp.body()))
        })
    }

    pub fn delete_index(
        &self,
        index_id: &str,
        ignore_missing: bool,
    ) -> Result<ExecutionResult<bool>> {
        // index ids are "collection/number"; accept the bare number too
        let index_id = if index_id.contains('/') {
            index_id.to_owned()
        } else {
            format!("{}/{index_id}", self.name)
        };
        let request = Request::new(Method::Delete, format!("/_api/index/{index_id}"));
        if ignore_missing {
            self.db.execute_tolerant(
                "index.delete",
                request,
                &[ERR_INDEX_NOT_FOUND],
                false,
                |_| Ok(true),
            )
        } else {
            self.db.execute_with("index.delete", request, |_| Ok(true))
        }
    }

    // ------------------------------------------------------------------
    // documents
    // ------------------------------------------------------------------

    /// Whether a document with `key` exists.
    pub fn has(&self, key: &str) -> Result<ExecutionResult<bool>> {
        validate_key(key)?;
        let request = Request::new(
            Method::Get,
            format!("/_api/document/{}/{key}", self.name),
        );
        self.db.execute_tolerant(
            "document.has",
            request,
            &[ERR_DOCUMENT_NOT_FOUND],
            false,
            |_| Ok(true),
        )
    }

    /// Fetch a document, `None` when there is no document with `key`.
    pub fn get(&self, key: &str) -> Result<ExecutionResult<Option<Value>>> {
        validate_key(key)?;
        let request = Request::new(
            Method::Get,
            format!("/_api/document/{}/{key}", self.name),
        )
        .with_command(format!(
            "db._collection({:?}).document({:?})",
            self.name, key
        ))
        .with_read(&[&self.name]);
        self.db.execute_tolerant(
            "document.get",
            request,
            &[ERR_DOCUMENT_NOT_FOUND],
            None,
            |resp| Ok(Some(resp.body())),
        )
    }

    /// Insert a document. Returns its metadata (`_id`, `_key`, `_rev`), plus
    /// the full document under `"new"` with `return_new`.
    pub fn insert(
        &self,
        document: Value,
        sync: Option<bool>,
        return_new: bool,
    ) -> Result<ExecutionResult<Value>> {
        let command = format!(
            "db._collection({:?}).insert({})",
            self.name,
            self.db.conn().serialize(&document)?
        );
        let mut request = Request::new(
            Method::Post,
            format!("/_api/document/{}", self.name),
        )
        .with_param_bool("returnNew", return_new)
        .with_data(document)
        .with_command(command)
        .with_write(&[&self.name]);
        if let Some(sync) = sync {
            request = request.with_param_bool("waitForSync", sync);
        }
        self.db
            .execute_with("document.insert", request, |resp| Ok(resp.body()))
    }

    /// Patch an existing document; `document` must carry `_key`.
    ///
    /// `keep_none` controls whether explicit nulls delete fields, `merge`
    /// whether sub-objects are merged or replaced.
    pub fn update(
        &self,
        document: Value,
        keep_none: bool,
        merge: bool,
        sync: Option<bool>,
        return_new: bool,
    ) -> Result<ExecutionResult<Value>> {
        let key = document_key(&document)?;
        let command = format!(
            "db._collection({:?}).update({:?}, {}, {{keepNull: {}, mergeObjects: {}}})",
            self.name,
            key,
            self.db.conn().serialize(&document)?,
            keep_none,
            merge,
        );
        let mut request = Request::new(
            Method::Patch,
            format!("/_api/document/{}/{key}", self.name),
        )
        .with_param_bool("keepNull", keep_none)
        .with_param_bool("mergeObjects", merge)
        .with_param_bool("returnNew", return_new)
        .with_data(document)
        .with_command(command)
        .with_write(&[&self.name]);
        if let Some(sync) = sync {
            request = request.with_param_bool("waitForSync", sync);
        }
        self.db
            .execute_with("document.update", request, |resp| Ok(resp.body()))
    }

    /// Replace an existing document wholesale; `document` must carry `_key`.
    pub fn replace(
        &self,
        document: Value,
        sync: Option<bool>,
        return_new: bool,
    ) -> Result<ExecutionResult<Value>> {
        let key = document_key(&document)?;
        let command = format!(
            "db._collection({:?}).replace({:?}, {})",
            self.name,
            key,
            self.db.conn().serialize(&document)?,
        );
        let mut request = Request::new(
            Method::Put,
            format!("/_api/document/{}/{key}", self.name),
        )
        .with_param_bool("returnNew", return_new)
        .with_data(document)
        .with_command(command)
        .with_write(&[&self.name]);
        if let Some(sync) = sync {
            request = request.with_param_bool("waitForSync", sync);
        }
        self.db
            .execute_with("document.replace", request, |resp| Ok(resp.body()))
    }

    /// Delete a document by key. Returns `false` instead of failing when it
    /// does not exist and `ignore_missing` is set.
    pub fn delete(
        &self,
        key: &str,
        ignore_missing: bool,
        sync: Option<bool>,
    ) -> Result<ExecutionResult<bool>> {
        validate_key(key)?;
        let mut request = Request::new(
            Method::Delete,
            format!("/_api/document/{}/{key}", self.name),
        )
        .with_command(format!(
            "db._collection({:?}).remove({:?})",
            self.name, key
        ))
        .with_write(&[&self.name]);
        if let Some(sync) = sync {
            request = request.with_param_bool("waitForSync", sync);
        }
        if ignore_missing {
            self.db.execute_tolerant(
                "document.delete",
                request,
                &[ERR_DOCUMENT_NOT_FOUND],
                false,
                |_| Ok(true),
            )
        } else {
            self.db.execute_with("document.delete", request, |_| Ok(true))
        }
    }
}

/// Document keys end up in URL paths, so a separator would silently address
/// a different document.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ArangoError::invalid_input("document key must not be empty"));
    }
    if key.contains('/') {
        return Err(ArangoError::invalid_input(format!(
            "document key {key:?} must not contain '/'"
        )));
    }
    Ok(())
}

fn document_key(document: &Value) -> Result<String> {
    let key = document
        .get("_key")
        .and_then(Value::as_str)
        .ok_or_else(|| ArangoError::invalid_input("document carries no string _key field"))?;
    validate_key(key)?;
    Ok(key.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation_rejects_path_separators() {
        assert!(validate_key("abc123").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("users/abc").is_err());
    }

    #[test]
    fn document_key_requires_string_key_field() {
        assert_eq!(document_key(&json!({"_key": "k1", "x": 1})).unwrap(), "k1");
        assert!(document_key(&json!({"x": 1})).is_err());
        assert!(document_key(&json!({"_key": 42})).is_err());
    }
}
