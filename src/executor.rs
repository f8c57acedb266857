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

pub mod job;
pub(crate) mod multipart;

use std::collections::BTreeSet;
use std::sync::Arc;

use itertools::Itertools;
use log::debug;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::connection::Connection;
use crate::error::{ArangoError, Result, ServerError};
use crate::request::{Method, Request};
use crate::response::Response;
use job::{AsyncJob, QueuedJob};

/// Maps a raw [`Response`] to a typed result, or fails with the
/// operation-specific server error. Shared (`Arc`) because async jobs may
/// run it more than once across `result()` retries.
pub(crate) type ResponseHandler<T> = Arc<dyn Fn(Response) -> Result<T> + Send + Sync>;

/// Resolves one queued job once its per-part response is available.
type PartResolver = Box<dyn FnOnce(Response) + Send>;

pub(crate) const MULTIPART_BOUNDARY: &str = "XXXsubpartXXX";

/// What an API call handed to an executor came back as.
///
/// Which variant a given database handle produces is fixed when the handle
/// is built (default, async, batch or transaction execution context).
#[derive(Debug)]
pub enum ExecutionResult<T> {
    /// The synchronous executor ran the request; here is the typed result.
    Value(T),
    /// The async executor stored the request server-side; poll the job.
    AsyncJob(AsyncJob<T>),
    /// A batch/transaction executor queued the request; the job resolves
    /// on `commit()`.
    QueuedJob(QueuedJob<T>),
    /// Dispatched (or queued) with result-tracking disabled.
    Queued,
}

impl<T> ExecutionResult<T> {
    /// The immediate value, for handles built with the default executor.
    ///
    /// Server and decoding failures surface from the operation's own
    /// `Result`; this only fails when the handle dispatches deferred.
    pub fn value(self) -> Result<T> {
        match self {
            Self::Value(value) => Ok(value),
            _ => Err(ArangoError::state(
                "no immediate value: the operation was dispatched through a deferred executor",
            )),
        }
    }

    pub fn async_job(self) -> Result<AsyncJob<T>> {
        match self {
            Self::AsyncJob(job) => Ok(job),
            _ => Err(ArangoError::state(
                "no async job: the operation was not dispatched through an async executor \
                 with result tracking",
            )),
        }
    }

    pub fn queued_job(self) -> Result<QueuedJob<T>> {
        match self {
            Self::QueuedJob(job) => Ok(job),
            _ => Err(ArangoError::state(
                "no queued job: the operation was not queued on a batch or transaction \
                 executor with result tracking",
            )),
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// Execution context of a database handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExecutionContext {
    Default,
    Async,
    Batch,
    Transaction,
}

/// Decides how and when an API request is actually sent.
///
/// A closed set of strategies selected once at handle construction; the
/// queuing variants are shared so every wrapper cloned off the same handle
/// feeds the same queue.
#[derive(Debug, Clone)]
pub enum Executor {
    Default(DefaultExecutor),
    Async(AsyncExecutor),
    Batch(Arc<BatchExecutor>),
    Transaction(Arc<TransactionExecutor>),
}

impl Executor {
    pub(crate) fn new_default(conn: Connection) -> Self {
        Self::Default(DefaultExecutor { conn })
    }

    pub(crate) fn new_async(conn: Connection, return_result: bool) -> Self {
        Self::Async(AsyncExecutor {
            conn,
            return_result,
        })
    }

    pub(crate) fn context(&self) -> ExecutionContext {
        match self {
            Self::Default(_) => ExecutionContext::Default,
            Self::Async(_) => ExecutionContext::Async,
            Self::Batch(_) => ExecutionContext::Batch,
            Self::Transaction(_) => ExecutionContext::Transaction,
        }
    }

    pub(crate) fn execute<T: Send + 'static>(
        &self,
        request: Request,
        handler: ResponseHandler<T>,
    ) -> Result<ExecutionResult<T>> {
        match self {
            Self::Default(executor) => executor.execute(request, handler),
            Self::Async(executor) => executor.execute(request, handler),
            Self::Batch(executor) => executor.execute(request, handler),
            Self::Transaction(executor) => executor.execute(request, handler),
        }
    }
}

/// Sends the request immediately and runs the handler on the response.
#[derive(Debug, Clone)]
pub struct DefaultExecutor {
    conn: Connection,
}

impl DefaultExecutor {
    fn execute<T>(
        &self,
        request: Request,
        handler: ResponseHandler<T>,
    ) -> Result<ExecutionResult<T>> {
        let resp = self.conn.send_request(&request)?;
        handler(resp).map(ExecutionResult::Value)
    }
}

/// Tags the request for server-side fire-and-forget execution.
#[derive(Debug, Clone)]
pub struct AsyncExecutor {
    conn: Connection,
    return_result: bool,
}

impl AsyncExecutor {
    fn execute<T>(
        &self,
        request: Request,
        handler: ResponseHandler<T>,
    ) -> Result<ExecutionResult<T>> {
        let request = request.with_header(
            "x-arango-async",
            if self.return_result { "store" } else { "true" },
        );
        let resp = self.conn.send_request(&request)?;
        if !resp.is_success {
            // the dispatch itself failed; there is no job to hand out
            return Err(ServerError::new("async.execute", &resp, &request).into());
        }
        if !self.return_result {
            return Ok(ExecutionResult::Queued);
        }
        let job_id = resp.header("x-arango-async-id").ok_or_else(|| {
            ArangoError::state("server accepted the async request but returned no job id")
        })?;
        Ok(ExecutionResult::AsyncJob(AsyncJob::new(
            self.conn.clone(),
            job_id,
            handler,
        )))
    }
}

struct BatchEntry {
    content_id: String,
    request: Request,
    resolver: Option<PartResolver>,
}

impl std::fmt::Debug for BatchEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEntry")
            .field("content_id", &self.content_id)
            .field("request", &self.request)
            .finish()
    }
}

#[derive(Debug)]
struct BatchState {
    committed: bool,
    queue: Vec<BatchEntry>,
}

/// Queues requests and sends them as one multipart call on `commit()`.
///
/// Commit is single-use; queuing onto (or re-committing) a committed batch
/// fails deterministically. One instance belongs to one logical unit of
/// work; the mutex only keeps queue mutation itself sound.
#[derive(Debug)]
pub struct BatchExecutor {
    conn: Connection,
    return_result: bool,
    state: Mutex<BatchState>,
}

impl BatchExecutor {
    pub(crate) fn new(conn: Connection, return_result: bool) -> Arc<Self> {
        Arc::new(Self {
            conn,
            return_result,
            state: Mutex::new(BatchState {
                committed: false,
                queue: Vec::new(),
            }),
        })
    }

    /// Number of requests currently queued.
    pub fn queued_requests(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn execute<T: Send + 'static>(
        &self,
        request: Request,
        handler: ResponseHandler<T>,
    ) -> Result<ExecutionResult<T>> {
        let mut state = self.state.lock();
        if state.committed {
            return Err(ArangoError::state("batch already committed"));
        }
        let content_id = (state.queue.len() + 1).to_string();

        if !self.return_result {
            state.queue.push(BatchEntry {
                content_id,
                request,
                resolver: None,
            });
            return Ok(ExecutionResult::Queued);
        }

        let job = QueuedJob::new();
        let cell = job.state_cell();
        let resolver: PartResolver = Box::new(move |resp: Response| {
            job::resolve(&cell, handler(resp));
        });
        state.queue.push(BatchEntry {
            content_id,
            request,
            resolver: Some(resolver),
        });
        Ok(ExecutionResult::QueuedJob(job))
    }

    /// Send every queued request in one multipart call and resolve the jobs.
    ///
    /// Returns the number of jobs resolved. An empty queue is a no-op. On a
    /// commit-level failure (HTTP error, part/queue count mismatch) all jobs
    /// stay pending and the error propagates.
    pub fn commit(&self) -> Result<usize> {
        let entries = {
            let mut state = self.state.lock();
            if state.committed {
                return Err(ArangoError::state("batch already committed"));
            }
            state.committed = true;
            std::mem::take(&mut state.queue)
        };
        if entries.is_empty() {
            return Ok(0);
        }
        debug!("committing batch of {} requests", entries.len());

        let mut parts = Vec::with_capacity(entries.len());
        for entry in &entries {
            let body = match &entry.request.data {
                Some(data) => Some(self.conn.serialize(data)?),
                None => None,
            };
            parts.push(multipart::RequestPart {
                content_id: entry.content_id.clone(),
                payload: multipart::stringify_request(&entry.request, body.as_deref()),
            });
        }

        let request = Request::new(Method::Post, "/_api/batch")
            .with_header(
                "content-type",
                format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            )
            .with_raw_data(multipart::encode(MULTIPART_BOUNDARY, &parts))
            .without_deserialization();
        let resp = self.conn.send_request(&request)?;
        if !resp.is_success {
            return Err(ServerError::new("batch.commit", &resp, &request).into());
        }

        let parts = multipart::decode(MULTIPART_BOUNDARY, &resp.raw_body)?;
        if parts.len() != entries.len() {
            return Err(ArangoError::state(format!(
                "expected {} batch response parts, got {}",
                entries.len(),
                parts.len()
            )));
        }

        // Correlate by content id when the server echoes them; fall back to
        // queue position otherwise (part order is not a documented server
        // guarantee).
        let by_id = parts.iter().all(|part| part.content_id.is_some());
        let mut resolved = 0;
        for (index, entry) in entries.into_iter().enumerate() {
            let part = if by_id {
                parts
                    .iter()
                    .find(|part| part.content_id.as_deref() == Some(entry.content_id.as_str()))
            } else {
                parts.get(index)
            };
            let Some(resolver) = entry.resolver else {
                continue;
            };
            match part {
                Some(part) => {
                    let decoded = if entry.request.deserialize_body && !part.body.is_empty() {
                        self.conn.deserialize(&part.body).ok()
                    } else {
                        None
                    };
                    let response = Response::from_decoded(
                        entry.request.method,
                        entry.request.endpoint_with_params(),
                        part.status_code,
                        part.status_text.clone(),
                        part.headers.clone(),
                        part.body.clone(),
                        decoded,
                    );
                    resolver(response);
                    resolved += 1;
                }
                None => {
                    // count matched but this id never came back
                    resolver(Response::from_decoded(
                        entry.request.method,
                        entry.request.endpoint_with_params(),
                        0,
                        "",
                        vec![],
                        "",
                        None,
                    ));
                    resolved += 1;
                }
            }
        }
        Ok(resolved)
    }
}

struct TransactionEntry {
    job_id: Uuid,
    method: Method,
    endpoint: String,
    command: String,
    read: Vec<String>,
    write: Vec<String>,
    exclusive: Vec<String>,
    resolver: Option<PartResolver>,
}

impl std::fmt::Debug for TransactionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionEntry")
            .field("job_id", &self.job_id)
            .field("method", &self.method)
            .field("endpoint", &self.endpoint)
            .field("command", &self.command)
            .finish()
    }
}

#[derive(Debug)]
struct TransactionState {
    committed: bool,
    queue: Vec<TransactionEntry>,
}

/// Queues requests and commits them as one server-side transaction.
///
/// Only requests that declare collection hints and carry a JS command are
/// expressible; everything else is rejected at queue time. At commit the
/// declared collections are unioned into the lock declaration and each
/// command's result is keyed by its job id so the composite result can be
/// distributed back.
#[derive(Debug)]
pub struct TransactionExecutor {
    conn: Connection,
    return_result: bool,
    sync: Option<bool>,
    lock_timeout: Option<u64>,
    state: Mutex<TransactionState>,
}

impl TransactionExecutor {
    pub(crate) fn new(
        conn: Connection,
        return_result: bool,
        sync: Option<bool>,
        lock_timeout: Option<u64>,
    ) -> Arc<Self> {
        Arc::new(Self {
            conn,
            return_result,
            sync,
            lock_timeout,
            state: Mutex::new(TransactionState {
                committed: false,
                queue: Vec::new(),
            }),
        })
    }

    pub fn queued_requests(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn execute<T: Send + 'static>(
        &self,
        request: Request,
        handler: ResponseHandler<T>,
    ) -> Result<ExecutionResult<T>> {
        let mut state = self.state.lock();
        if state.committed {
            return Err(ArangoError::state("transaction already committed"));
        }
        if !request.has_collection_hints() {
            return Err(ArangoError::state(
                "request declares no read or write collections and cannot run \
                 inside a transaction",
            ));
        }
        let Some(command) = request.command.clone() else {
            return Err(ArangoError::state(
                "request has no script form and cannot run inside a transaction",
            ));
        };

        let job = QueuedJob::new();
        let job_id = job.id();
        let resolver: Option<PartResolver> = if self.return_result {
            let cell = job.state_cell();
            Some(Box::new(move |resp: Response| {
                job::resolve(&cell, handler(resp));
            }))
        } else {
            None
        };
        state.queue.push(TransactionEntry {
            job_id,
            method: request.method,
            endpoint: request.endpoint.clone(),
            command,
            read: request.read.clone(),
            write: request.write.clone(),
            exclusive: request.exclusive.clone(),
            resolver,
        });
        if self.return_result {
            Ok(ExecutionResult::QueuedJob(job))
        } else {
            Ok(ExecutionResult::Queued)
        }
    }

    /// Commit the queued operations atomically and resolve the jobs from
    /// the composite result. Single-use, like [`BatchExecutor::commit`].
    pub fn commit(&self) -> Result<usize> {
        let entries = {
            let mut state = self.state.lock();
            if state.committed {
                return Err(ArangoError::state("transaction already committed"));
            }
            state.committed = true;
            std::mem::take(&mut state.queue)
        };
        if entries.is_empty() {
            return Ok(0);
        }
        debug!("committing transaction of {} operations", entries.len());

        let union = |pick: fn(&TransactionEntry) -> &Vec<String>| -> Vec<String> {
            entries
                .iter()
                .flat_map(|entry| pick(entry).iter().cloned())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };
        let read = union(|entry| &entry.read);
        let write = union(|entry| &entry.write);
        let exclusive = union(|entry| &entry.exclusive);

        let mut collections = serde_json::Map::new();
        if !read.is_empty() {
            collections.insert("read".into(), json!(read));
        }
        if !write.is_empty() {
            collections.insert("write".into(), json!(write));
        }
        if !exclusive.is_empty() {
            collections.insert("exclusive".into(), json!(exclusive));
        }

        let mut data = json!({
            "collections": Value::Object(collections),
            "action": synthesize_action(&entries),
        });
        if let Some(sync) = self.sync {
            data["waitForSync"] = json!(sync);
        }
        if let Some(timeout) = self.lock_timeout {
            data["lockTimeout"] = json!(timeout);
        }

        let request = Request::new(Method::Post, "/_api/transaction").with_data(data);
        let resp = self.conn.send_request(&request)?;
        if !resp.is_success {
            return Err(ServerError::new("transaction.commit", &resp, &request).into());
        }

        let composite = resp.result_field();
        let mut resolved = 0;
        for entry in entries {
            let Some(resolver) = entry.resolver else {
                continue;
            };
            match composite.get(entry.job_id.to_string()) {
                Some(value) => {
                    let raw = value.to_string();
                    let response = Response::from_decoded(
                        entry.method,
                        entry.endpoint,
                        200,
                        "OK",
                        vec![],
                        raw,
                        Some(value.clone()),
                    );
                    resolver(response);
                }
                None => {
                    // resolve as error rather than leaving the job dangling
                    let response = Response::from_decoded(
                        entry.method,
                        entry.endpoint,
                        0,
                        format!("transaction result for job {} missing", entry.job_id),
                        vec![],
                        "",
                        None,
                    );
                    resolver(response);
                }
            }
            resolved += 1;
        }
        Ok(resolved)
    }
}

/// Render the queued commands as one JS action whose return value is an
/// object keyed by job id.
fn synthesize_action(entries: &[TransactionEntry]) -> String {
    let assignments = entries
        .iter()
        .map(|entry| format!("result[\"{}\"] = {};", entry.job_id, entry.command))
        .join(" ");
    format!(
        "function () {{ var db = require(\"internal\").db; var result = {{}}; {} return result; }}",
        assignments
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(command: &str) -> TransactionEntry {
        TransactionEntry {
            job_id: Uuid::new_v4(),
            method: Method::Post,
            endpoint: "/_api/document/foo".into(),
            command: command.into(),
            read: vec![],
            write: vec!["foo".into()],
            exclusive: vec![],
            resolver: None,
        }
    }

    #[test]
    fn action_assigns_each_command_to_its_job_id() {
        let entries = vec![
            entry("db._collection(\"foo\").insert({\"a\":1})"),
            entry("db._collection(\"foo\").remove(\"k\")"),
        ];
        let action = synthesize_action(&entries);
        assert!(action.starts_with("function () { var db = require(\"internal\").db;"));
        assert!(action.ends_with("return result; }"));
        for e in &entries {
            assert!(action.contains(&format!("result[\"{}\"] = {};", e.job_id, e.command)));
        }
    }

    #[test]
    fn execution_result_accessors_reject_wrong_arm() {
        let value: ExecutionResult<i64> = ExecutionResult::Value(3);
        assert_eq!(value.value().unwrap(), 3);
        let value: ExecutionResult<i64> = ExecutionResult::Value(3);
        assert!(matches!(value.queued_job(), Err(ArangoError::State { .. })));
        let queued: ExecutionResult<i64> = ExecutionResult::Queued;
        assert!(queued.is_queued());
        assert!(matches!(queued.value(), Err(ArangoError::State { .. })));
    }
}
