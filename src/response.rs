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

use crate::request::Method;

/// One parsed HTTP response.
///
/// Created once per round trip (or per multipart part) and never mutated
/// afterwards. The body is JSON-decoded eagerly unless the originating
/// request opted out; a body that fails to parse is kept raw and the decoded
/// form stays empty, matching the server's habit of returning non-JSON
/// payloads for some endpoints.
#[derive(Debug, Clone)]
pub struct Response {
    pub method: Method,
    pub url: String,
    pub status_code: u16,
    pub status_text: String,
    /// Lower-cased header names mapped to values.
    pub headers: Vec<(String, String)>,
    pub raw_body: String,
    /// JSON-decoded body, when decoding was requested and succeeded.
    pub body: Option<Value>,
    /// ArangoDB's `errorNum`, when the body is an object carrying one.
    pub error_code: Option<i64>,
    /// ArangoDB's `errorMessage`, when the body is an object carrying one.
    pub error_message: Option<String>,
    /// Status in the 2xx range and no server-reported error code.
    pub is_success: bool,
}

impl Response {
    /// Convenience constructor that decodes the body with `serde_json`.
    /// The connection goes through [`Response::from_decoded`] instead so the
    /// injected codec is honored.
    #[cfg(test)]
    pub(crate) fn from_parts(
        method: Method,
        url: impl Into<String>,
        status_code: u16,
        status_text: impl Into<String>,
        headers: Vec<(String, String)>,
        raw_body: impl Into<String>,
        deserialize: bool,
    ) -> Self {
        let raw_body = raw_body.into();
        let body = if deserialize && !raw_body.is_empty() {
            serde_json::from_str::<Value>(&raw_body).ok()
        } else {
            None
        };
        Self::from_decoded(
            method,
            url,
            status_code,
            status_text,
            headers,
            raw_body,
            body,
        )
    }

    pub(crate) fn from_decoded(
        method: Method,
        url: impl Into<String>,
        status_code: u16,
        status_text: impl Into<String>,
        headers: Vec<(String, String)>,
        raw_body: impl Into<String>,
        body: Option<Value>,
    ) -> Self {
        let raw_body = raw_body.into();
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        let (error_code, error_message) = match &body {
            Some(Value::Object(map)) => (
                map.get("errorNum").and_then(Value::as_i64),
                map.get("errorMessage")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            ),
            _ => (None, None),
        };

        let http_ok = (200..300).contains(&status_code);
        Self {
            method,
            url: url.into(),
            status_code,
            status_text: status_text.into(),
            headers,
            raw_body,
            body,
            error_code,
            error_message,
            is_success: http_ok && error_code.is_none(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| value.as_str())
    }

    /// The decoded body, or `Value::Null` when there is none.
    pub fn body(&self) -> Value {
        self.body.clone().unwrap_or(Value::Null)
    }

    /// The `result` field of the decoded body, or `Value::Null`.
    pub(crate) fn result_field(&self) -> Value {
        match &self.body {
            Some(Value::Object(map)) => map.get("result").cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(status: u16, body: &str) -> Response {
        Response::from_parts(
            Method::Get,
            "http://localhost:8529/_db/test/_api/version",
            status,
            "OK",
            vec![("X-Arango-Async-Id".into(), "12345".into())],
            body,
            true,
        )
    }

    #[test]
    fn success_without_error_fields() {
        let response = parse(200, r#"{"server":"arango","version":"3.11.4"}"#);
        assert!(response.is_success);
        assert_eq!(response.error_code, None);
        assert_eq!(response.body()["version"], "3.11.4");
    }

    #[test]
    fn error_num_makes_2xx_unsuccessful() {
        let response = parse(200, r#"{"error":true,"errorNum":600,"errorMessage":"bad"}"#);
        assert!(!response.is_success);
        assert_eq!(response.error_code, Some(600));
        assert_eq!(response.error_message.as_deref(), Some("bad"));
    }

    #[test]
    fn non_json_body_is_kept_raw() {
        let response = Response::from_parts(
            Method::Get,
            "http://localhost:8529/_db/test/_api/replication/dump",
            200,
            "OK",
            vec![],
            "{\"_key\":\"1\"}\n{\"_key\":\"2\"}\n",
            false,
        );
        assert!(response.body.is_none());
        assert!(response.raw_body.starts_with("{\"_key\":\"1\"}"));
        assert!(response.is_success);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = parse(202, "");
        assert_eq!(response.header("x-arango-async-id"), Some("12345"));
        assert_eq!(response.header("X-Arango-Async-Id"), Some("12345"));
        assert_eq!(response.header("missing"), None);
    }
}
