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

pub mod aql;
pub mod backup;
pub mod collection;
pub mod cursor;
pub mod graph;
pub mod replication;

use std::ops::Deref;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::connection::Connection;
use crate::error::{ArangoError, Result, ServerError};
use crate::executor::{
    BatchExecutor, ExecutionContext, ExecutionResult, Executor, ResponseHandler,
    TransactionExecutor,
};
use crate::formatter;
use crate::request::{Method, Request};
use crate::response::Response;
use aql::Aql;
use backup::Backup;
use collection::Collection;
use graph::Graph;
use replication::Replication;

const ERR_DATABASE_NOT_FOUND: i64 = 1228;
const ERR_COLLECTION_NOT_FOUND: i64 = 1203;
const ERR_GRAPH_NOT_FOUND: i64 = 1924;
const ERR_USER_NOT_FOUND: i64 = 1703;

/// A handle onto one database, bound to one execution context.
///
/// Handles are cheap to clone; clones of a batch or transaction handle feed
/// the same queue. The sibling handles minted by [`Database::begin_async`],
/// [`Database::begin_batch`] and [`Database::begin_transaction`] leave the
/// original handle untouched.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Connection,
    executor: Executor,
}

impl Database {
    pub(crate) fn new(conn: Connection) -> Self {
        let executor = Executor::new_default(conn.clone());
        Self { conn, executor }
    }

    fn with_executor(conn: Connection, executor: Executor) -> Self {
        Self { conn, executor }
    }

    /// Name of the database this handle points at.
    pub fn name(&self) -> &str {
        self.conn.db_name()
    }

    /// Which execution context requests on this handle run in.
    pub fn context(&self) -> ExecutionContext {
        self.executor.context()
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `request`, mapping successful responses through `map` and failing
    /// ones into a [`ServerError`] tagged with `operation`.
    pub(crate) fn execute_with<T, F>(
        &self,
        operation: &'static str,
        request: Request,
        map: F,
    ) -> Result<ExecutionResult<T>>
    where
        T: Send + 'static,
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        let context = request.clone();
        let handler: ResponseHandler<T> = Arc::new(move |resp: Response| {
            if !resp.is_success {
                return Err(ServerError::new(operation, &resp, &context).into());
            }
            map(&resp)
        });
        self.executor.execute(request, handler)
    }

    /// Like [`Self::execute_with`], but responses carrying one of
    /// `absent_codes` produce `missing` instead of an error. Backs the
    /// `ignore_missing` flavor of delete/get operations.
    pub(crate) fn execute_tolerant<T, F>(
        &self,
        operation: &'static str,
        request: Request,
        absent_codes: &'static [i64],
        missing: T,
        map: F,
    ) -> Result<ExecutionResult<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        let context = request.clone();
        let handler: ResponseHandler<T> = Arc::new(move |resp: Response| {
            if !resp.is_success {
                if resp
                    .error_code
                    .is_some_and(|code| absent_codes.contains(&code))
                {
                    return Ok(missing.clone());
                }
                return Err(ServerError::new(operation, &resp, &context).into());
            }
            map(&resp)
        });
        self.executor.execute(request, handler)
    }

    // ------------------------------------------------------------------
    // sibling handles
    // ------------------------------------------------------------------

    /// A sibling handle whose requests run server-side in the background.
    ///
    /// With `return_result` the server stores each outcome and every call
    /// yields an [`crate::job::AsyncJob`]; without it requests are
    /// fire-and-forget.
    pub fn begin_async(&self, return_result: bool) -> Database {
        Database::with_executor(
            self.conn.clone(),
            Executor::new_async(self.conn.clone(), return_result),
        )
    }

    /// A sibling handle that queues requests locally and ships them in one
    /// multipart round trip on [`BatchDatabase::commit`].
    pub fn begin_batch(&self, return_result: bool) -> BatchDatabase {
        let executor = BatchExecutor::new(self.conn.clone(), return_result);
        BatchDatabase {
            db: Database::with_executor(
                self.conn.clone(),
                Executor::Batch(Arc::clone(&executor)),
            ),
            executor,
        }
    }

    /// A sibling handle that queues document operations and commits them as
    /// one server-side transaction.
    pub fn begin_transaction(&self, options: TransactionOptions) -> TransactionDatabase {
        let executor = TransactionExecutor::new(
            self.conn.clone(),
            options.return_result,
            options.sync,
            options.lock_timeout,
        );
        TransactionDatabase {
            db: Database::with_executor(
                self.conn.clone(),
                Executor::Transaction(Arc::clone(&executor)),
            ),
            executor,
        }
    }

    // ------------------------------------------------------------------
    // wrapper accessors
    // ------------------------------------------------------------------

    pub fn aql(&self) -> Aql {
        Aql::new(self.clone())
    }

    pub fn backup(&self) -> Backup {
        Backup::new(self.clone())
    }

    pub fn replication(&self) -> Replication {
        Replication::new(self.clone())
    }

    pub fn collection(&self, name: &str) -> Collection {
        Collection::new(self.clone(), name)
    }

    pub fn graph(&self, name: &str) -> Graph {
        Graph::new(self.clone(), name)
    }

    // ------------------------------------------------------------------
    // server & database management
    // ------------------------------------------------------------------

    /// Server version string, or the full version object with `details`.
    pub fn version(&self, details: bool) -> Result<ExecutionResult<Value>> {
        let request =
            Request::new(Method::Get, "/_api/version").with_param_bool("details", details);
        self.execute_with("database.version", request, move |resp| {
            let body = resp.body();
            if details {
                Ok(body)
            } else {
                Ok(body.get("version").cloned().unwrap_or(Value::Null))
            }
        })
    }

    /// Storage engine details.
    pub fn engine(&self) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Get, "/_api/engine");
        self.execute_with("database.engine", request, |resp| {
            Ok(formatter::format_body(&resp.body()))
        })
    }

    /// Properties of the database this handle points at.
    pub fn properties(&self) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Get, "/_api/database/current");
        self.execute_with("database.properties", request, |resp| {
            Ok(formatter::format_database(&resp.result_field()))
        })
    }

    /// Names of all databases. Only available on `_system`.
    pub fn databases(&self) -> Result<ExecutionResult<Vec<String>>> {
        let request = Request::new(Method::Get, "/_api/database");
        self.execute_with("database.list", request, |resp| {
            deserialize_string_list(resp.result_field())
        })
    }

    pub fn has_database(&self, name: &str) -> Result<ExecutionResult<bool>> {
        let name = name.to_owned();
        let request = Request::new(Method::Get, "/_api/database");
        self.execute_with("database.has", request, move |resp| {
            Ok(deserialize_string_list(resp.result_field())?.contains(&name))
        })
    }

    /// Create a database, optionally with `users` granted access up front.
    pub fn create_database(
        &self,
        name: &str,
        users: Option<Vec<DatabaseUser>>,
    ) -> Result<ExecutionResult<bool>> {
        let mut data = json!({ "name": name });
        if let Some(users) = users {
            data["users"] = Value::Array(
                users
                    .into_iter()
                    .map(|user| {
                        json!({
                            "username": user.username,
                            "passwd": user.password,
                            "active": user.active,
                        })
                    })
                    .collect(),
            );
        }
        let request = Request::new(Method::Post, "/_api/database").with_data(data);
        self.execute_with("database.create", request, |_| Ok(true))
    }

    /// Drop a database. Returns `false` instead of failing when it does not
    /// exist and `ignore_missing` is set.
    pub fn delete_database(
        &self,
        name: &str,
        ignore_missing: bool,
    ) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Delete, format!("/_api/database/{name}"));
        if ignore_missing {
            self.execute_tolerant(
                "database.delete",
                request,
                &[ERR_DATABASE_NOT_FOUND],
                false,
                |_| Ok(true),
            )
        } else {
            self.execute_with("database.delete", request, |_| Ok(true))
        }
    }

    /// Cheap end-to-end check that the host is reachable and the credentials
    /// are accepted.
    pub fn verify_connectivity(&self) -> Result<()> {
        self.version(false)?.value().map(|_| ())
    }

    // ------------------------------------------------------------------
    // collection management
    // ------------------------------------------------------------------

    /// All collections in the database, system ones included.
    pub fn collections(&self) -> Result<ExecutionResult<Vec<Value>>> {
        let request = Request::new(Method::Get, "/_api/collection");
        self.execute_with("collection.list", request, |resp| {
            match resp.result_field() {
                Value::Array(items) => {
                    Ok(items.iter().map(formatter::format_collection).collect())
                }
                other => Err(ArangoError::deserialization(format!(
                    "expected collection array, got {other}"
                ))),
            }
        })
    }

    pub fn has_collection(&self, name: &str) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Get, format!("/_api/collection/{name}"));
        self.execute_tolerant(
            "collection.has",
            request,
            &[ERR_COLLECTION_NOT_FOUND],
            false,
            |_| Ok(true),
        )
    }

    /// Create a collection. `properties` are merged verbatim into the
    /// creation body (`waitForSync`, `keyOptions`, `numberOfShards`, ...).
    pub fn create_collection(
        &self,
        name: &str,
        edge: bool,
        properties: Option<Value>,
    ) -> Result<ExecutionResult<Value>> {
        let mut data = Map::new();
        if let Some(Value::Object(properties)) = properties {
            data = properties;
        }
        data.insert("name".into(), Value::String(name.into()));
        data.insert("type".into(), json!(if edge { 3 } else { 2 }));
        let request =
            Request::new(Method::Post, "/_api/collection").with_data(Value::Object(data));
        self.execute_with("collection.create", request, |resp| {
            Ok(formatter::format_collection(&resp.body()))
        })
    }

    pub fn delete_collection(
        &self,
        name: &str,
        ignore_missing: bool,
    ) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Delete, format!("/_api/collection/{name}"));
        if ignore_missing {
            self.execute_tolerant(
                "collection.delete",
                request,
                &[ERR_COLLECTION_NOT_FOUND],
                false,
                |_| Ok(true),
            )
        } else {
            self.execute_with("collection.delete", request, |_| Ok(true))
        }
    }

    // ------------------------------------------------------------------
    // graph management
    // ------------------------------------------------------------------

    pub fn graphs(&self) -> Result<ExecutionResult<Vec<Value>>> {
        let request = Request::new(Method::Get, "/_api/gharial");
        self.execute_with("graph.list", request, |resp| {
            match resp.body().get("graphs") {
                Some(Value::Array(items)) => {
                    Ok(items.iter().map(formatter::format_graph).collect())
                }
                _ => Err(ArangoError::deserialization("expected graph array")),
            }
        })
    }

    pub fn has_graph(&self, name: &str) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Get, format!("/_api/gharial/{name}"));
        self.execute_tolerant("graph.has", request, &[ERR_GRAPH_NOT_FOUND], false, |_| {
            Ok(true)
        })
    }

    pub fn create_graph(
        &self,
        name: &str,
        edge_definitions: &[graph::EdgeDefinition],
        orphan_collections: &[&str],
    ) -> Result<ExecutionResult<Value>> {
        let data = json!({
            "name": name,
            "edgeDefinitions": edge_definitions,
            "orphanCollections": orphan_collections,
        });
        let request = Request::new(Method::Post, "/_api/gharial").with_data(data);
        self.execute_with("graph.create", request, |resp| {
            Ok(formatter::format_graph(
                resp.body().get("graph").unwrap_or(&Value::Null),
            ))
        })
    }

    /// Drop a graph; with `drop_collections` its collections go too.
    pub fn delete_graph(
        &self,
        name: &str,
        drop_collections: bool,
        ignore_missing: bool,
    ) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Delete, format!("/_api/gharial/{name}"))
            .with_param_bool("dropCollections", drop_collections);
        if ignore_missing {
            self.execute_tolerant(
                "graph.delete",
                request,
                &[ERR_GRAPH_NOT_FOUND],
                false,
                |_| Ok(true),
            )
        } else {
            self.execute_with("graph.delete", request, |_| Ok(true))
        }
    }

    // ------------------------------------------------------------------
    // users & permissions
    // ------------------------------------------------------------------

    pub fn users(&self) -> Result<ExecutionResult<Vec<Value>>> {
        let request = Request::new(Method::Get, "/_api/user");
        self.execute_with("user.list", request, |resp| match resp.result_field() {
            Value::Array(items) => Ok(items.iter().map(formatter::format_user).collect()),
            _ => Err(ArangoError::deserialization("expected user array")),
        })
    }

    pub fn user(&self, username: &str) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Get, format!("/_api/user/{username}"));
        self.execute_with("user.get", request, |resp| {
            Ok(formatter::format_user(&resp.body()))
        })
    }

    pub fn has_user(&self, username: &str) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Get, format!("/_api/user/{username}"));
        self.execute_tolerant("user.has", request, &[ERR_USER_NOT_FOUND], false, |_| {
            Ok(true)
        })
    }

    pub fn create_user(
        &self,
        username: &str,
        password: &str,
        active: bool,
        extra: Option<Value>,
    ) -> Result<ExecutionResult<Value>> {
        let mut data = json!({
            "user": username,
            "passwd": password,
            "active": active,
        });
        if let Some(extra) = extra {
            data["extra"] = extra;
        }
        let request = Request::new(Method::Post, "/_api/user").with_data(data);
        self.execute_with("user.create", request, |resp| {
            Ok(formatter::format_user(&resp.body()))
        })
    }

    /// Partially update a user; `None` fields are left as they are.
    pub fn update_user(
        &self,
        username: &str,
        password: Option<&str>,
        active: Option<bool>,
        extra: Option<Value>,
    ) -> Result<ExecutionResult<Value>> {
        let mut data = Map::new();
        if let Some(password) = password {
            data.insert("passwd".into(), Value::String(password.into()));
        }
        if let Some(active) = active {
            data.insert("active".into(), Value::Bool(active));
        }
        if let Some(extra) = extra {
            data.insert("extra".into(), extra);
        }
        let request = Request::new(Method::Patch, format!("/_api/user/{username}"))
            .with_data(Value::Object(data));
        self.execute_with("user.update", request, |resp| {
            Ok(formatter::format_user(&resp.body()))
        })
    }

    pub fn delete_user(
        &self,
        username: &str,
        ignore_missing: bool,
    ) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Delete, format!("/_api/user/{username}"));
        if ignore_missing {
            self.execute_tolerant("user.delete", request, &[ERR_USER_NOT_FOUND], false, |_| {
                Ok(true)
            })
        } else {
            self.execute_with("user.delete", request, |_| Ok(true))
        }
    }

    /// The user's access levels per database, e.g. `{"_system": "rw"}`.
    pub fn permissions(&self, username: &str) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Get, format!("/_api/user/{username}/database"))
            .with_param_bool("full", true);
        self.execute_with("permission.list", request, |resp| Ok(resp.result_field()))
    }

    /// The user's access level (`"rw"`, `"ro"` or `"none"`) for one database.
    pub fn permission(&self, username: &str, database: &str) -> Result<ExecutionResult<String>> {
        let request = Request::new(
            Method::Get,
            format!("/_api/user/{username}/database/{database}"),
        );
        self.execute_with("permission.get", request, |resp| {
            match resp.result_field() {
                Value::String(level) => Ok(level),
                _ => Err(ArangoError::deserialization("expected access level string")),
            }
        })
    }

    pub fn update_permission(
        &self,
        username: &str,
        database: &str,
        grant: &str,
    ) -> Result<ExecutionResult<bool>> {
        let request = Request::new(
            Method::Put,
            format!("/_api/user/{username}/database/{database}"),
        )
        .with_data(json!({ "grant": grant }));
        self.execute_with("permission.update", request, |_| Ok(true))
    }

    /// Clear an explicit grant so the default access level applies again.
    pub fn reset_permission(
        &self,
        username: &str,
        database: &str,
    ) -> Result<ExecutionResult<bool>> {
        let request = Request::new(
            Method::Delete,
            format!("/_api/user/{username}/database/{database}"),
        );
        self.execute_with("permission.reset", request, |_| Ok(true))
    }

    // ------------------------------------------------------------------
    // raw javascript transactions
    // ------------------------------------------------------------------

    /// Run a server-side javascript transaction in one request. This is the
    /// escape hatch for logic the queuing transaction handle cannot express.
    pub fn execute_transaction(
        &self,
        action: &str,
        options: JsTransactionOptions,
    ) -> Result<ExecutionResult<Value>> {
        let mut collections = Map::new();
        if !options.read.is_empty() {
            collections.insert("read".into(), json!(options.read));
        }
        if !options.write.is_empty() {
            collections.insert("write".into(), json!(options.write));
        }
        if !options.exclusive.is_empty() {
            collections.insert("exclusive".into(), json!(options.exclusive));
        }
        let mut data = json!({
            "collections": Value::Object(collections),
            "action": action,
        });
        if let Some(params) = options.params {
            data["params"] = params;
        }
        if let Some(sync) = options.sync {
            data["waitForSync"] = Value::Bool(sync);
        }
        if let Some(lock_timeout) = options.lock_timeout {
            data["lockTimeout"] = json!(lock_timeout);
        }
        let request = Request::new(Method::Post, "/_api/transaction").with_data(data);
        self.execute_with("transaction.execute", request, |resp| {
            Ok(resp.result_field())
        })
    }
}

fn deserialize_string_list(value: Value) -> Result<Vec<String>> {
    serde_json::from_value(value)
        .map_err(|err| ArangoError::deserialization(format!("expected string array: {err}")))
}

/// Initial user grant for [`Database::create_database`].
#[derive(Debug, Clone)]
pub struct DatabaseUser {
    pub username: String,
    pub password: String,
    pub active: bool,
}

/// Options for the queuing transaction handle.
#[derive(Debug, Clone)]
pub struct TransactionOptions {
    /// Whether queued calls hand back jobs that resolve on commit.
    pub return_result: bool,
    /// `waitForSync` on the server-side transaction.
    pub sync: Option<bool>,
    /// Seconds to wait for collection locks, `0` for indefinite.
    pub lock_timeout: Option<u64>,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            return_result: true,
            sync: None,
            lock_timeout: None,
        }
    }
}

/// Options for [`Database::execute_transaction`].
#[derive(Debug, Clone, Default)]
pub struct JsTransactionOptions {
    pub read: Vec<String>,
    pub write: Vec<String>,
    pub exclusive: Vec<String>,
    /// Bound into the action as the `params` argument.
    pub params: Option<Value>,
    pub sync: Option<bool>,
    pub lock_timeout: Option<u64>,
}

/// Database handle whose requests are queued for one multipart round trip.
///
/// Dereferences to [`Database`], so the whole API surface is available; every
/// call returns a queued job (or nothing, if `return_result` was off) until
/// [`BatchDatabase::commit`] ships the queue.
#[derive(Debug, Clone)]
pub struct BatchDatabase {
    db: Database,
    executor: Arc<BatchExecutor>,
}

impl BatchDatabase {
    /// Ship the queued requests in one request and resolve their jobs.
    /// Returns the number of jobs resolved, which excludes entries queued
    /// with result tracking off. Single-use.
    pub fn commit(&self) -> Result<usize> {
        self.executor.commit()
    }

    pub fn queued_requests(&self) -> usize {
        self.executor.queued_requests()
    }
}

impl Deref for BatchDatabase {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

/// Database handle whose document operations are queued and committed as one
/// server-side transaction.
#[derive(Debug, Clone)]
pub struct TransactionDatabase {
    db: Database,
    executor: Arc<TransactionExecutor>,
}

impl TransactionDatabase {
    /// Commit the queued operations atomically and resolve their jobs.
    /// Returns the number of jobs resolved, which excludes entries queued
    /// with result tracking off. Single-use.
    pub fn commit(&self) -> Result<usize> {
        self.executor.commit()
    }

    pub fn queued_requests(&self) -> usize {
        self.executor.queued_requests()
    }
}

impl Deref for TransactionDatabase {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}
