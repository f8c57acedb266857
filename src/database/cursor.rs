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

use std::collections::VecDeque;

use log::debug;
use serde_json::Value;

use crate::connection::Connection;
use crate::error::{ArangoError, Result, ServerError};
use crate::request::{Method, Request};

/// Streams an AQL result set, fetching follow-up batches lazily.
///
/// The first batch arrives embedded in the query response; further batches
/// are pulled with `PUT /_api/cursor/{id}` as iteration drains them. Server
/// side, an exhausted cursor is gone already; [`Cursor::close`] only matters
/// for cursors abandoned early.
#[derive(Debug)]
pub struct Cursor {
    conn: Connection,
    id: Option<String>,
    batch: VecDeque<Value>,
    has_more: bool,
    count: Option<u64>,
    cached: bool,
    stats: Option<Value>,
    closed: bool,
}

impl Cursor {
    pub(crate) fn from_body(conn: Connection, body: &Value) -> Result<Self> {
        let result = match body.get("result") {
            Some(Value::Array(items)) => items.clone(),
            _ => {
                return Err(ArangoError::deserialization(
                    "cursor response carries no result array",
                ))
            }
        };
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let has_more = body.get("hasMore").and_then(Value::as_bool).unwrap_or(false);
        debug!(
            "cursor opened: id={:?} first_batch={} has_more={}",
            id,
            result.len(),
            has_more
        );
        Ok(Self {
            conn,
            id,
            batch: result.into(),
            has_more,
            count: body.get("count").and_then(Value::as_u64),
            cached: body.get("cached").and_then(Value::as_bool).unwrap_or(false),
            stats: body.pointer("/extra/stats").cloned(),
            closed: false,
        })
    }

    /// Server-side cursor id, present only while more batches remain.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Total result count, if the query was executed with `count`.
    ///
    /// Deliberately not called `count` so that it cannot be shadowed by
    /// [`Iterator::count`].
    pub fn total_count(&self) -> Option<u64> {
        self.count
    }

    /// Whether the first batch was served from the query results cache.
    pub fn cached(&self) -> bool {
        self.cached
    }

    /// Execution statistics from the query response, if any.
    pub fn stats(&self) -> Option<&Value> {
        self.stats.as_ref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more || !self.batch.is_empty()
    }

    fn fetch_next_batch(&mut self) -> Result<()> {
        let Some(id) = self.id.clone() else {
            self.has_more = false;
            return Ok(());
        };
        let request = Request::new(Method::Put, format!("/_api/cursor/{id}"));
        let resp = self.conn.send_request(&request)?;
        if !resp.is_success {
            return Err(ServerError::new("cursor.next", &resp, &request).into());
        }
        let body = resp.body();
        match body.get("result") {
            Some(Value::Array(items)) => self.batch.extend(items.iter().cloned()),
            _ => {
                return Err(ArangoError::deserialization(
                    "cursor batch carries no result array",
                ))
            }
        }
        self.has_more = body.get("hasMore").and_then(Value::as_bool).unwrap_or(false);
        if !self.has_more {
            // the server deletes drained cursors itself
            self.id = None;
            self.closed = true;
        }
        Ok(())
    }

    /// Delete the server-side cursor. Returns `false` when there was nothing
    /// left to close. A cursor the server no longer knows is an error unless
    /// `ignore_missing` is set.
    pub fn close(&mut self, ignore_missing: bool) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        self.closed = true;
        let Some(id) = self.id.take() else {
            return Ok(false);
        };
        self.has_more = false;
        let request = Request::new(Method::Delete, format!("/_api/cursor/{id}"));
        let resp = self.conn.send_request(&request)?;
        if !resp.is_success {
            if resp.status_code == 404 && ignore_missing {
                return Ok(false);
            }
            return Err(ServerError::new("cursor.close", &resp, &request).into());
        }
        Ok(true)
    }
}

impl Iterator for Cursor {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.batch.is_empty() && self.has_more {
            if let Err(err) = self.fetch_next_batch() {
                self.has_more = false;
                return Some(Err(err));
            }
        }
        self.batch.pop_front().map(Ok)
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if !self.closed && self.id.is_some() {
            // leaked cursors expire on the server after their TTL anyway
            if let Err(err) = self.close(true) {
                debug!("closing abandoned cursor failed: {err}");
            }
        }
    }
}
