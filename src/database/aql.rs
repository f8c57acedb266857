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

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::database::cursor::Cursor;
use crate::database::Database;
use crate::error::{ArangoError, Result};
use crate::executor::ExecutionResult;
use crate::formatter;
use crate::request::{Method, Request};

const ERR_QUERY_NOT_FOUND: i64 = 1591;
const ERR_FUNCTION_NOT_FOUND: i64 = 1582;

/// Wrapper for AQL queries and AQL user functions.
#[derive(Debug, Clone)]
pub struct Aql {
    db: Database,
}

/// Knobs for [`Aql::execute`]. Fields map one to one onto the cursor API's
/// creation body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AqlQueryOptions {
    /// Ask the server for the total result count.
    pub count: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    /// Cursor lifetime between batch fetches, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
    /// Per-query memory limit in bytes, `0` for unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u64>,
    /// Allow reading from cluster followers. Travels as the
    /// `x-arango-allow-dirty-read` header rather than in the body.
    #[serde(skip)]
    pub allow_dirty_read: bool,
}

impl Aql {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the query results cache wrapper.
    pub fn cache(&self) -> AqlQueryCache {
        AqlQueryCache {
            db: self.db.clone(),
        }
    }

    /// Run a query and stream its results through a [`Cursor`].
    pub fn execute(
        &self,
        query: &str,
        bind_vars: Option<Value>,
        options: AqlQueryOptions,
    ) -> Result<ExecutionResult<Cursor>> {
        let mut data = serde_json::to_value(&options)
            .map_err(|err| ArangoError::serialization(&err))?;
        data["query"] = Value::String(query.into());
        if let Some(bind_vars) = bind_vars {
            data["bindVars"] = bind_vars;
        }
        let mut request = Request::new(Method::Post, "/_api/cursor").with_data(data);
        if options.allow_dirty_read {
            request = request.with_header("x-arango-allow-dirty-read", "true");
        }
        let conn = self.db.conn().clone();
        self.db.execute_with("aql.execute", request, move |resp| {
            Cursor::from_body(conn.clone(), &resp.body())
        })
    }

    /// Inspect the execution plan without running the query. Returns one plan,
    /// or all generated plans with `all_plans`.
    pub fn explain(
        &self,
        query: &str,
        bind_vars: Option<Value>,
        all_plans: bool,
        max_plans: Option<u32>,
    ) -> Result<ExecutionResult<Value>> {
        let mut options = Map::new();
        options.insert("allPlans".into(), Value::Bool(all_plans));
        if let Some(max_plans) = max_plans {
            options.insert("maxNumberOfPlans".into(), json!(max_plans));
        }
        let mut data = json!({ "query": query, "options": options });
        if let Some(bind_vars) = bind_vars {
            data["bindVars"] = bind_vars;
        }
        let request = Request::new(Method::Post, "/_api/explain").with_data(data);
        self.db.execute_with("aql.explain", request, move |resp| {
            let body = resp.body();
            let plans = if all_plans {
                body.get("plans").cloned()
            } else {
                body.get("plan").cloned()
            };
            plans.ok_or_else(|| ArangoError::deserialization("explain response carries no plan"))
        })
    }

    /// Parse the query and report bind parameters and referenced collections.
    pub fn validate(&self, query: &str) -> Result<ExecutionResult<Value>> {
        let request =
            Request::new(Method::Post, "/_api/query").with_data(json!({ "query": query }));
        self.db.execute_with("aql.validate", request, |resp| {
            Ok(formatter::format_body(&resp.body()))
        })
    }

    /// Kill a running query by id. Returns `false` when the query is gone
    /// already and `ignore_missing` is set.
    pub fn kill(&self, query_id: &str, ignore_missing: bool) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Delete, format!("/_api/query/{query_id}"));
        if ignore_missing {
            self.db
                .execute_tolerant("aql.kill", request, &[ERR_QUERY_NOT_FOUND], false, |_| {
                    Ok(true)
                })
        } else {
            self.db.execute_with("aql.kill", request, |_| Ok(true))
        }
    }

    /// Queries currently running on the server.
    pub fn queries(&self) -> Result<ExecutionResult<Vec<Value>>> {
        let request = Request::new(Method::Get, "/_api/query/current");
        self.db
            .execute_with("aql.queries", request, |resp| match resp.body() {
                Value::Array(items) => Ok(items.iter().map(formatter::format_aql_query).collect()),
                _ => Err(ArangoError::deserialization("expected query array")),
            })
    }

    /// Finished queries that exceeded the slow query threshold.
    pub fn slow_queries(&self) -> Result<ExecutionResult<Vec<Value>>> {
        let request = Request::new(Method::Get, "/_api/query/slow");
        self.db
            .execute_with("aql.slow_queries", request, |resp| match resp.body() {
                Value::Array(items) => Ok(items.iter().map(formatter::format_aql_query).collect()),
                _ => Err(ArangoError::deserialization("expected query array")),
            })
    }

    pub fn clear_slow_queries(&self) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Delete, "/_api/query/slow");
        self.db
            .execute_with("aql.clear_slow_queries", request, |_| Ok(true))
    }

    /// Current query tracking configuration.
    pub fn tracking(&self) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Get, "/_api/query/properties");
        self.db.execute_with("aql.tracking", request, |resp| {
            Ok(formatter::format_aql_tracking(&resp.body()))
        })
    }

    /// Replace the query tracking configuration. `properties` uses the
    /// server's camelCase field names (`maxSlowQueries`, `trackBindVars`, ...).
    pub fn set_tracking(&self, properties: Value) -> Result<ExecutionResult<Value>> {
        let request =
            Request::new(Method::Put, "/_api/query/properties").with_data(properties);
        self.db.execute_with("aql.set_tracking", request, |resp| {
            Ok(formatter::format_aql_tracking(&resp.body()))
        })
    }

    /// Registered AQL user functions.
    pub fn functions(&self) -> Result<ExecutionResult<Vec<Value>>> {
        let request = Request::new(Method::Get, "/_api/aqlfunction");
        self.db
            .execute_with("aql.functions", request, |resp| match resp.result_field() {
                Value::Array(items) => {
                    Ok(items.iter().map(formatter::format_aql_function).collect())
                }
                _ => Err(ArangoError::deserialization("expected function array")),
            })
    }

    /// Register (or overwrite) an AQL user function. Returns whether the
    /// function is new.
    pub fn create_function(&self, name: &str, code: &str) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Post, "/_api/aqlfunction")
            .with_data(json!({ "name": name, "code": code }));
        self.db.execute_with("aql.create_function", request, |resp| {
            Ok(resp
                .body()
                .get("isNewlyCreated")
                .and_then(Value::as_bool)
                .unwrap_or(false))
        })
    }

    /// Unregister an AQL user function, or a whole namespace with `group`.
    pub fn delete_function(
        &self,
        name: &str,
        group: bool,
        ignore_missing: bool,
    ) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Delete, format!("/_api/aqlfunction/{name}"))
            .with_param_bool("group", group);
        if ignore_missing {
            self.db.execute_tolerant(
                "aql.delete_function",
                request,
                &[ERR_FUNCTION_NOT_FOUND],
                false,
                |_| Ok(true),
            )
        } else {
            self.db
                .execute_with("aql.delete_function", request, |_| Ok(true))
        }
    }
}

/// Wrapper for the AQL query results cache.
#[derive(Debug, Clone)]
pub struct AqlQueryCache {
    db: Database,
}

impl AqlQueryCache {
    pub fn properties(&self) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Get, "/_api/query-cache/properties");
        self.db.execute_with("aql_cache.properties", request, |resp| {
            Ok(formatter::format_aql_cache(&resp.body()))
        })
    }

    /// Update cache properties; `properties` uses the server's camelCase
    /// names (`mode`, `maxResults`, ...).
    pub fn set_properties(&self, properties: Value) -> Result<ExecutionResult<Value>> {
        let request =
            Request::new(Method::Put, "/_api/query-cache/properties").with_data(properties);
        self.db
            .execute_with("aql_cache.set_properties", request, |resp| {
                Ok(formatter::format_aql_cache(&resp.body()))
            })
    }

    /// Queries currently held in the cache for this database.
    pub fn entries(&self) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Get, "/_api/query-cache/entries");
        self.db
            .execute_with("aql_cache.entries", request, |resp| Ok(resp.body()))
    }

    pub fn clear(&self) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Delete, "/_api/query-cache");
        self.db.execute_with("aql_cache.clear", request, |_| Ok(true))
    }
}
