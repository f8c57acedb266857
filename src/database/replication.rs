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

use serde_json::{json, Map, Value};

use crate::database::Database;
use crate::error::{ArangoError, Result};
use crate::executor::ExecutionResult;
use crate::formatter;
use crate::request::{Method, Request};

/// Wrapper for the replication module: inventory, dumps, the write-ahead
/// logger and the applier.
#[derive(Debug, Clone)]
pub struct Replication {
    db: Database,
}

/// One chunk of a collection dump.
///
/// The payload is JSON lines, one markers object per line, and is left
/// undecoded. The pagination markers come from response headers.
#[derive(Debug, Clone)]
pub struct DumpBatch {
    /// Raw JSON-lines payload.
    pub content: String,
    /// Whether another chunk is available after `last_included`.
    pub check_more: bool,
    /// Tick of the last marker in this chunk; feed it back as `from_tick`.
    pub last_included: Option<String>,
}

impl Replication {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Collections and indexes available for replication, with the state of
    /// the write-ahead log.
    pub fn inventory(
        &self,
        batch_id: &str,
        include_system: bool,
    ) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Get, "/_api/replication/inventory")
            .with_param("batchId", batch_id)
            .with_param_bool("includeSystem", include_system);
        self.db.execute_with("replication.inventory", request, |resp| {
            Ok(formatter::format_body(&resp.body()))
        })
    }

    /// Open a dump batch, which pins the datafiles the dump reads from.
    /// Returns the batch id.
    pub fn create_dump_batch(&self, ttl: u64) -> Result<ExecutionResult<String>> {
        let request = Request::new(Method::Post, "/_api/replication/batch")
            .with_data(json!({ "ttl": ttl }));
        self.db
            .execute_with("replication.create_dump_batch", request, |resp| {
                resp.body()
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        ArangoError::deserialization("batch response carries no id")
                    })
            })
    }

    /// Reset a dump batch's time to live before it expires.
    pub fn extend_dump_batch(&self, batch_id: &str, ttl: u64) -> Result<ExecutionResult<bool>> {
        let request = Request::new(
            Method::Put,
            format!("/_api/replication/batch/{batch_id}"),
        )
        .with_data(json!({ "ttl": ttl }));
        self.db
            .execute_with("replication.extend_dump_batch", request, |_| Ok(true))
    }

    pub fn delete_dump_batch(&self, batch_id: &str) -> Result<ExecutionResult<bool>> {
        let request = Request::new(
            Method::Delete,
            format!("/_api/replication/batch/{batch_id}"),
        );
        self.db
            .execute_with("replication.delete_dump_batch", request, |_| Ok(true))
    }

    /// Fetch one chunk of a collection's data. Loop while
    /// [`DumpBatch::check_more`] holds, passing `last_included` back in as
    /// `from_tick`.
    pub fn dump(
        &self,
        collection: &str,
        batch_id: &str,
        from_tick: Option<&str>,
        chunk_size: Option<u64>,
    ) -> Result<ExecutionResult<DumpBatch>> {
        let mut request = Request::new(Method::Get, "/_api/replication/dump")
            .with_param("collection", collection)
            .with_param("batchId", batch_id)
            .without_deserialization();
        if let Some(from_tick) = from_tick {
            request = request.with_param("from", from_tick);
        }
        if let Some(chunk_size) = chunk_size {
            request = request.with_param("chunkSize", chunk_size.to_string());
        }
        self.db.execute_with("replication.dump", request, |resp| {
            Ok(DumpBatch {
                content: resp.raw_body.clone(),
                check_more: resp
                    .header("x-arango-replication-checkmore")
                    .map(|more| more == "true")
                    .unwrap_or(false),
                last_included: resp
                    .header("x-arango-replication-lastincluded")
                    .map(str::to_owned),
            })
        })
    }

    /// State of the write-ahead logger on this server.
    pub fn logger_state(&self) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Get, "/_api/replication/logger-state");
        self.db
            .execute_with("replication.logger_state", request, |resp| {
                Ok(formatter::format_replication_logger_state(&resp.body()))
            })
    }

    /// Earliest tick the write-ahead logger can still serve.
    pub fn logger_first_tick(&self) -> Result<ExecutionResult<String>> {
        let request = Request::new(Method::Get, "/_api/replication/logger-first-tick");
        self.db
            .execute_with("replication.logger_first_tick", request, |resp| {
                resp.body()
                    .get("firstTick")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        ArangoError::deserialization("response carries no firstTick")
                    })
            })
    }

    /// This server's globally unique replication id.
    pub fn server_id(&self) -> Result<ExecutionResult<String>> {
        let request = Request::new(Method::Get, "/_api/replication/server-id");
        self.db.execute_with("replication.server_id", request, |resp| {
            resp.body()
                .get("serverId")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| ArangoError::deserialization("response carries no serverId"))
        })
    }

    // ------------------------------------------------------------------
    // applier
    // ------------------------------------------------------------------

    pub fn applier_config(&self) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Get, "/_api/replication/applier-config");
        self.db
            .execute_with("replication.applier_config", request, |resp| {
                Ok(formatter::format_replication_applier_config(&resp.body()))
            })
    }

    /// Replace the applier configuration. `config` uses the server's
    /// camelCase field names (`endpoint`, `autoStart`, `chunkSize`, ...).
    pub fn set_applier_config(&self, config: Value) -> Result<ExecutionResult<Value>> {
        let request =
            Request::new(Method::Put, "/_api/replication/applier-config").with_data(config);
        self.db
            .execute_with("replication.set_applier_config", request, |resp| {
                Ok(formatter::format_replication_applier_config(&resp.body()))
            })
    }

    pub fn applier_state(&self) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Get, "/_api/replication/applier-state");
        self.db
            .execute_with("replication.applier_state", request, |resp| {
                Ok(formatter::format_replication_applier_state(&resp.body()))
            })
    }

    /// Start the applier, optionally from a specific tick.
    pub fn start_applier(&self, from_tick: Option<&str>) -> Result<ExecutionResult<Value>> {
        let mut request = Request::new(Method::Put, "/_api/replication/applier-start")
            .with_data(Value::Object(Map::new()));
        if let Some(from_tick) = from_tick {
            request = request.with_param("from", from_tick);
        }
        self.db
            .execute_with("replication.start_applier", request, |resp| {
                Ok(formatter::format_replication_applier_state(&resp.body()))
            })
    }

    pub fn stop_applier(&self) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Put, "/_api/replication/applier-stop")
            .with_data(Value::Object(Map::new()));
        self.db
            .execute_with("replication.stop_applier", request, |resp| {
                Ok(formatter::format_replication_applier_state(&resp.body()))
            })
    }
}
