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

use serde_json::Value;

/// Default value of the `x-arango-driver` header, computed by `build.rs`.
pub(crate) const DRIVER_HEADER: &str = env!("ARANGO_DEFAULT_DRIVER_HEADER");

/// HTTP verb of a [`Request`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One API request, described as plain data.
///
/// Built by the API wrapper methods, then handed to an executor which
/// decides when the HTTP call actually happens. Immutable once built; the
/// builder methods consume `self`.
///
/// The collection hints (`read`/`write`/`exclusive`) and the `command`
/// string are only consulted by the transaction executor, which uses them
/// to synthesize the server-side lock declarations and the scripted action.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub endpoint: String,
    /// Lower-cased header names mapped to values.
    pub headers: Vec<(String, String)>,
    /// Query parameters, already rendered to strings.
    pub params: Vec<(String, String)>,
    /// JSON payload, serialized immediately before dispatch.
    pub data: Option<Value>,
    /// Pre-serialized payload for endpoints that take a raw body
    /// (e.g. the batch API's multipart document).
    pub raw_data: Option<String>,
    pub read: Vec<String>,
    pub write: Vec<String>,
    pub exclusive: Vec<String>,
    /// JS rendition of this operation, for use inside a transaction.
    pub command: Option<String>,
    /// Whether the response body should be parsed as JSON.
    pub deserialize_body: bool,
}

impl Request {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            headers: vec![
                ("charset".into(), "utf-8".into()),
                ("content-type".into(), "application/json".into()),
                ("x-arango-driver".into(), DRIVER_HEADER.into()),
            ],
            params: Vec::new(),
            data: None,
            raw_data: None,
            read: Vec::new(),
            write: Vec::new(),
            exclusive: Vec::new(),
            command: None,
            deserialize_body: true,
        }
    }

    /// Set a header, replacing any existing value for the same name.
    /// Names are normalized to lowercase.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub(crate) fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        self.headers.retain(|(existing, _)| *existing != name);
        self.headers.push((name, value.into()));
    }

    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Booleans render as `"1"`/`"0"` on the wire, matching the server's
    /// numeric parsing of flag parameters.
    pub fn with_param_bool(self, key: &str, value: bool) -> Self {
        self.with_param(key, if value { "1" } else { "0" })
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub(crate) fn with_raw_data(mut self, data: impl Into<String>) -> Self {
        self.raw_data = Some(data.into());
        self
    }

    pub fn with_read(mut self, collections: &[&str]) -> Self {
        self.read = collections.iter().map(|c| (*c).into()).collect();
        self
    }

    pub fn with_write(mut self, collections: &[&str]) -> Self {
        self.write = collections.iter().map(|c| (*c).into()).collect();
        self
    }

    pub fn with_exclusive(mut self, collections: &[&str]) -> Self {
        self.exclusive = collections.iter().map(|c| (*c).into()).collect();
        self
    }

    pub(crate) fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Leave the response body untouched (e.g. replication dumps, which
    /// return JSON lines rather than a single document).
    pub fn without_deserialization(mut self) -> Self {
        self.deserialize_body = false;
        self
    }

    /// Whether this request declares any collection hints, i.e. whether it
    /// is expressible inside a transaction.
    pub(crate) fn has_collection_hints(&self) -> bool {
        !(self.read.is_empty() && self.write.is_empty() && self.exclusive.is_empty())
    }

    /// Endpoint plus rendered query string.
    pub(crate) fn endpoint_with_params(&self) -> String {
        if self.params.is_empty() {
            return self.endpoint.clone();
        }
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.params {
            serializer.append_pair(key, value);
        }
        format!("{}?{}", self.endpoint, serializer.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_carries_default_headers() {
        let request = Request::new(Method::Get, "/_api/version");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("charset"), Some("utf-8"));
        assert!(request.header("x-arango-driver").is_some());
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let request =
            Request::new(Method::Post, "/_api/cursor").with_header("X-Arango-Async", "store");
        assert_eq!(request.header("x-arango-async"), Some("store"));
        let replaced = request.with_header("x-arango-async", "true");
        assert_eq!(replaced.header("X-ARANGO-ASYNC"), Some("true"));
        assert_eq!(
            replaced
                .headers
                .iter()
                .filter(|(name, _)| name == "x-arango-async")
                .count(),
            1
        );
    }

    #[test]
    fn bool_params_render_numeric() {
        let request = Request::new(Method::Get, "/_api/collection")
            .with_param_bool("excludeSystem", true)
            .with_param_bool("withRevisions", false);
        assert_eq!(
            request.endpoint_with_params(),
            "/_api/collection?excludeSystem=1&withRevisions=0"
        );
    }

    #[test]
    fn params_are_percent_encoded() {
        let request =
            Request::new(Method::Get, "/_api/index").with_param("collection", "my coll/edge");
        assert_eq!(
            request.endpoint_with_params(),
            "/_api/index?collection=my+coll%2Fedge"
        );
    }

    #[test]
    fn collection_hints_detection() {
        let bare = Request::new(Method::Get, "/_api/version");
        assert!(!bare.has_collection_hints());
        let hinted = Request::new(Method::Post, "/_api/document/foo").with_write(&["foo"]);
        assert!(hinted.has_collection_hints());
    }
}
