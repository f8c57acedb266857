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

pub mod auth;
pub mod resolver;
pub mod transport;

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use log::debug;
use serde_json::Value;
use url::Url;

use crate::error::{ArangoError, Result};
use crate::request::Request;
use crate::response::Response;
use auth::Auth;
use resolver::{HostResolver, ResolveHost};
use transport::HttpTransport;

/// Injectable JSON serializer/deserializer pair.
pub trait JsonCodec: Debug + Send + Sync {
    fn serialize(&self, value: &Value) -> Result<String>;
    fn deserialize(&self, text: &str) -> Result<Value>;
}

/// Default codec backed by `serde_json`.
#[derive(Debug, Default)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn serialize(&self, value: &Value) -> Result<String> {
        serde_json::to_string(value).map_err(|err| ArangoError::serialization(&err))
    }

    fn deserialize(&self, text: &str) -> Result<Value> {
        serde_json::from_str(text).map_err(|err| ArangoError::deserialization(err.to_string()))
    }
}

/// Connection to one database on one (or several) ArangoDB hosts.
///
/// Owns the transport session, the target database name and the
/// serialization hooks. Cheap to clone; all clones share the same resolver
/// state and transport.
#[derive(Debug, Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

#[derive(Debug)]
struct ConnectionInner {
    url_prefixes: Vec<String>,
    db_name: String,
    auth: Auth,
    resolver: HostResolver,
    transport: Arc<dyn HttpTransport>,
    codec: Arc<dyn JsonCodec>,
}

impl Connection {
    pub(crate) fn new(
        hosts: Vec<Url>,
        db_name: impl Into<String>,
        auth: Auth,
        resolver: HostResolver,
        transport: Arc<dyn HttpTransport>,
        codec: Arc<dyn JsonCodec>,
    ) -> Self {
        let db_name = db_name.into();
        let url_prefixes = hosts
            .iter()
            .map(|host| {
                format!(
                    "{}/_db/{}",
                    host.as_str().trim_end_matches('/'),
                    db_name
                )
            })
            .collect();
        Self {
            inner: Arc::new(ConnectionInner {
                url_prefixes,
                db_name,
                auth,
                resolver,
                transport,
                codec,
            }),
        }
    }

    pub fn db_name(&self) -> &str {
        &self.inner.db_name
    }

    pub(crate) fn serialize(&self, value: &Value) -> Result<String> {
        self.inner.codec.serialize(value)
    }

    pub(crate) fn deserialize(&self, text: &str) -> Result<Value> {
        self.inner.codec.deserialize(text)
    }

    /// Send a request to the next resolved host and parse the response.
    ///
    /// Exactly one round trip; transport failures propagate without any
    /// retry or re-dispatch.
    pub fn send_request(&self, request: &Request) -> Result<Response> {
        let host_index = self.inner.resolver.get_host_index(&HashSet::new());
        let url = format!(
            "{}{}",
            self.inner.url_prefixes[host_index],
            request.endpoint_with_params()
        );

        let mut headers = request.headers.clone();
        if request.header("authorization").is_none() {
            if let Some(value) = self.inner.auth.header_value() {
                headers.push(("authorization".into(), value));
            }
        }

        let serialized_body;
        let body = match (&request.raw_data, &request.data) {
            (Some(raw), _) => Some(raw.as_str()),
            (None, Some(data)) => {
                serialized_body = self.serialize(data)?;
                Some(serialized_body.as_str())
            }
            (None, None) => None,
        };

        debug!("C: {} {}", request.method, url);
        let raw = self
            .inner
            .transport
            .send_request(request.method, &url, &headers, body)?;
        debug!("S: [{}] {} {}", raw.status_code, request.method, url);

        let decoded = if request.deserialize_body && !raw.body.is_empty() {
            self.deserialize(&raw.body).ok()
        } else {
            None
        };
        Ok(Response::from_decoded(
            request.method,
            url,
            raw.status_code,
            raw.status_text,
            raw.headers,
            raw.body,
            decoded,
        ))
    }
}
