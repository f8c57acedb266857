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

#![doc(test(attr(deny(dead_code))))]
#![doc(test(attr(deny(unused))))]

//! # ArangoDB HTTP Driver
//!
//! This crate provides a typed client for ArangoDB's REST API.
//! Its defining feature is that the same API surface runs in four execution
//! contexts: immediately (default), server-side in the background (async),
//! queued into one multipart round trip (batch), or queued into one atomic
//! server-side transaction.
//!
//! ## Basic Example
//! ```no_run
//! use arango::{ArangoClient, Auth};
//!
//! # fn main() -> arango::Result<()> {
//! let client = ArangoClient::new("http://localhost:8529")?;
//! let db = client.db("_system", Auth::basic("root", "passwd"))?;
//!
//! let version = db.version(false)?.value()?;
//! println!("server version: {version}");
//!
//! let accounts = db.collection("accounts");
//! accounts.insert(serde_json::json!({"_key": "a1", "balance": 0}), None, false)?
//!     .value()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Queued Execution
//! ```no_run
//! # use arango::{ArangoClient, Auth};
//! # fn main() -> arango::Result<()> {
//! # let client = ArangoClient::new("http://localhost:8529")?;
//! # let db = client.db("_system", Auth::basic("root", "passwd"))?;
//! // queue three inserts, ship them in one request
//! let batch = db.begin_batch(true);
//! let accounts = batch.collection("accounts");
//! let jobs = (0..3)
//!     .map(|i| {
//!         accounts
//!             .insert(serde_json::json!({ "_key": format!("k{i}") }), None, false)?
//!             .queued_job()
//!     })
//!     .collect::<arango::Result<Vec<_>>>()?;
//! batch.commit()?;
//! for job in &jobs {
//!     let meta = job.result()?;
//!     println!("inserted {}", meta["_key"]);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod connection;
pub mod database;
mod error;
mod executor;
mod formatter;
mod request;
mod response;

pub use client::{ArangoClient, HostStrategy};
pub use connection::auth::Auth;
pub use error::{ArangoError, Result, ServerError};
pub use request::{Method, Request};
pub use response::Response;

/// Execution contexts and results.
pub mod execution {
    pub use super::executor::{ExecutionContext, ExecutionResult};
}

/// Job handles for async, batch and transaction execution.
pub mod job {
    pub use super::executor::job::{AsyncJob, JobStatus, QueuedJob};
}

/// Host resolution strategies for multi-host deployments.
pub mod resolver {
    pub use super::connection::resolver::{HostResolver, ResolveHost};
}

/// AQL queries, user functions and the query results cache.
pub mod aql {
    pub use super::database::aql::{Aql, AqlQueryCache, AqlQueryOptions};
    pub use super::database::cursor::Cursor;
}

/// Collections, indexes and documents.
pub mod collection {
    pub use super::database::collection::Collection;
}

/// Named graphs, vertices and edges.
pub mod graph {
    pub use super::database::graph::{EdgeDefinition, Graph};
}

/// Hot backups and their remote transfers.
pub mod backup {
    pub use super::database::backup::Backup;
}

/// Replication inventory, dumps, logger and applier.
pub mod replication {
    pub use super::database::replication::{DumpBatch, Replication};
}
