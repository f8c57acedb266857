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

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::connection::Connection;
use crate::error::{ArangoError, Result, ServerError};
use crate::executor::ResponseHandler;
use crate::request::{Method, Request};

/// Lifecycle of a job handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued (or still in the server's async queue); no result yet.
    Pending,
    /// A result is attached.
    Done,
    /// An error was captured in place of a result; surfaced by `result()`.
    Error,
}

#[derive(Debug)]
pub(crate) enum JobState<T> {
    Pending,
    Done(T),
    Failed(ArangoError),
}

/// Handle for a request queued on a batch or transaction executor.
///
/// Resolved exactly once, by the owning executor's `commit()`. Terminal
/// states never transition again. `status()` never blocks and there is no
/// waiting primitive; callers poll.
pub struct QueuedJob<T> {
    id: Uuid,
    state: Arc<Mutex<JobState<T>>>,
}

impl<T> fmt::Debug for QueuedJob<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedJob")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

impl<T> QueuedJob<T> {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(Mutex::new(JobState::Pending)),
        }
    }

    /// Locally generated correlation id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        match &*self.state.lock() {
            JobState::Pending => JobStatus::Pending,
            JobState::Done(_) => JobStatus::Done,
            JobState::Failed(_) => JobStatus::Error,
        }
    }

    /// Shared view of the state cell, held by the executor's resolver until
    /// commit.
    pub(crate) fn state_cell(&self) -> Arc<Mutex<JobState<T>>> {
        Arc::clone(&self.state)
    }
}

impl<T: Clone> QueuedJob<T> {
    /// The result, or the captured error, of this job.
    ///
    /// Fails with [`ArangoError::JobPending`] while the owning executor has
    /// not committed (never returns a stale or default value).
    pub fn result(&self) -> Result<T> {
        match &*self.state.lock() {
            JobState::Pending => Err(ArangoError::job_pending(format!(
                "job {} is not committed yet",
                self.id
            ))),
            JobState::Done(value) => Ok(value.clone()),
            JobState::Failed(err) => Err(err.clone()),
        }
    }
}

pub(crate) fn resolve<T>(state: &Mutex<JobState<T>>, outcome: Result<T>) {
    let mut guard = state.lock();
    // terminal states are final
    if matches!(*guard, JobState::Pending) {
        *guard = match outcome {
            Ok(value) => JobState::Done(value),
            Err(err) => JobState::Failed(err),
        };
    }
}

/// Handle for a request the server executes asynchronously
/// (`x-arango-async: store`).
///
/// Unlike [`QueuedJob`], the status and result live on the server and every
/// accessor here is a fresh HTTP call.
pub struct AsyncJob<T> {
    conn: Connection,
    id: String,
    handler: ResponseHandler<T>,
}

impl<T> fmt::Debug for AsyncJob<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncJob").field("id", &self.id).finish()
    }
}

impl<T> AsyncJob<T> {
    pub(crate) fn new(conn: Connection, id: impl Into<String>, handler: ResponseHandler<T>) -> Self {
        Self {
            conn,
            id: id.into(),
            handler,
        }
    }

    /// Server-assigned async job id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Poll the job status.
    ///
    /// Once the result has been fetched via [`result()`](Self::result) the
    /// server forgets the job and this lookup fails.
    pub fn status(&self) -> Result<JobStatus> {
        let request = Request::new(Method::Get, format!("/_api/job/{}", self.id));
        let resp = self.conn.send_request(&request)?;
        if resp.status_code == 204 {
            Ok(JobStatus::Pending)
        } else if resp.is_success {
            Ok(JobStatus::Done)
        } else if resp.status_code == 404 {
            Err(ServerError::with_message(
                "async_job.status",
                &resp,
                &request,
                format!("job {} not found", self.id),
            )
            .into())
        } else {
            Err(ServerError::new("async_job.status", &resp, &request).into())
        }
    }

    /// Fetch the stored response and run the handler on it.
    ///
    /// The server deletes the stored response on retrieval; a second call
    /// fails with "not found". If the wrapped operation itself failed, its
    /// error surfaces here.
    pub fn result(&self) -> Result<T> {
        let request = Request::new(Method::Put, format!("/_api/job/{}", self.id));
        let resp = self.conn.send_request(&request)?;
        // the echo header tells a fetched result apart from a bare 204
        if resp.header("x-arango-async-id").is_some() {
            return (self.handler)(resp);
        }
        let message = if resp.status_code == 204 {
            format!("job {} not done", self.id)
        } else if resp.status_code == 404 {
            format!("job {} not found", self.id)
        } else {
            resp.error_message
                .clone()
                .unwrap_or_else(|| resp.status_text.clone())
        };
        Err(ServerError::with_message("async_job.result", &resp, &request, message).into())
    }

    /// Cancel the job. Only possible while the server has not taken it out
    /// of its queue.
    pub fn cancel(&self, ignore_missing: bool) -> Result<bool> {
        let request = Request::new(Method::Put, format!("/_api/job/{}/cancel", self.id));
        let resp = self.conn.send_request(&request)?;
        if resp.is_success {
            Ok(true)
        } else if resp.status_code == 404 && ignore_missing {
            Ok(false)
        } else {
            Err(ServerError::new("async_job.cancel", &resp, &request).into())
        }
    }

    /// Delete the job result from the server without fetching it.
    pub fn clear(&self, ignore_missing: bool) -> Result<bool> {
        let request = Request::new(Method::Delete, format!("/_api/job/{}", self.id));
        let resp = self.conn.send_request(&request)?;
        if resp.is_success {
            Ok(true)
        } else if resp.status_code == 404 && ignore_missing {
            Ok(false)
        } else {
            Err(ServerError::new("async_job.clear", &resp, &request).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_job_result_before_resolution_fails() {
        let job: QueuedJob<i64> = QueuedJob::new();
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(matches!(job.result(), Err(ArangoError::JobPending { .. })));
    }

    #[test]
    fn queued_job_resolves_once() {
        let job: QueuedJob<i64> = QueuedJob::new();
        let cell = job.state_cell();
        resolve(&cell, Ok(7));
        assert_eq!(job.status(), JobStatus::Done);
        assert_eq!(job.result().unwrap(), 7);
        // a second resolution attempt must not overwrite the terminal state
        resolve(&cell, Err(ArangoError::state("late")));
        assert_eq!(job.result().unwrap(), 7);
    }

    #[test]
    fn queued_job_captures_errors() {
        let job: QueuedJob<i64> = QueuedJob::new();
        resolve(&job.state_cell(), Err(ArangoError::state("boom")));
        assert_eq!(job.status(), JobStatus::Error);
        assert!(matches!(job.result(), Err(ArangoError::State { .. })));
        // repeatable
        assert!(matches!(job.result(), Err(ArangoError::State { .. })));
    }
}
