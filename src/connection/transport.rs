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

use std::fmt::Debug;

use log::warn;

use crate::error::{ArangoError, Result};
use crate::request::Method;

/// Raw response as seen by the transport, before any JSON handling.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// The injectable HTTP client seam.
///
/// One call, one blocking round trip. Implementations must return non-2xx
/// responses as data; only transport-level failures (connect, socket, TLS)
/// map to `Err`. Tests script this trait instead of running a server.
pub trait HttpTransport: Debug + Send + Sync {
    fn send_request(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: Option<&str>,
    ) -> Result<TransportResponse>;
}

/// Default transport backed by a [`ureq::Agent`].
#[derive(Debug)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            // non-2xx statuses are data, the response handlers decide
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.new_agent(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for UreqTransport {
    fn send_request(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: Option<&str>,
    ) -> Result<TransportResponse> {
        let transport_err = |err: ureq::Error| ArangoError::transport(err.to_string());

        let mut response = match method {
            Method::Get | Method::Head | Method::Delete => {
                if body.is_some() {
                    warn!("dropping request body on {} {}", method, url);
                }
                let mut builder = match method {
                    Method::Get => self.agent.get(url),
                    Method::Head => self.agent.head(url),
                    _ => self.agent.delete(url),
                };
                for (name, value) in headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call().map_err(transport_err)?
            }
            Method::Post | Method::Put | Method::Patch => {
                let mut builder = match method {
                    Method::Post => self.agent.post(url),
                    Method::Put => self.agent.put(url),
                    _ => self.agent.patch(url),
                };
                for (name, value) in headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match body {
                    Some(body) => builder.send(body.as_bytes()).map_err(transport_err)?,
                    None => builder.send_empty().map_err(transport_err)?,
                }
            }
        };

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| ArangoError::transport(err.to_string()))?;

        Ok(TransportResponse {
            status_code: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
