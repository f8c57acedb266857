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

//! Codec for the batch API's multipart convention.
//!
//! Each part carries `Content-Type: application/x-arango-batchpart`, a
//! `Content-Id` correlating it to a queued job, and — after a blank line —
//! an embedded HTTP message (request line or status line, headers, blank
//! line, body). Off-by-one errors here silently corrupt job-to-response
//! correlation, hence the explicit grammar and its own test suite.

use log::warn;

use crate::error::{ArangoError, Result};
use crate::request::Request;

pub(crate) const PART_CONTENT_TYPE: &str = "application/x-arango-batchpart";

/// One encoded request part: correlation id plus the embedded HTTP message.
#[derive(Debug)]
pub(crate) struct RequestPart {
    pub content_id: String,
    pub payload: String,
}

/// One decoded response part.
#[derive(Debug, PartialEq)]
pub(crate) struct ResponsePart {
    pub content_id: Option<String>,
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Render a queued request as an embedded HTTP/1.1 message.
pub(crate) fn stringify_request(request: &Request, body: Option<&str>) -> String {
    let mut out = format!(
        "{} {} HTTP/1.1\r\n",
        request.method,
        request.endpoint_with_params()
    );
    for (name, value) in &request.headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    if let Some(body) = body {
        out.push_str(body);
    }
    out
}

/// Encode the queued parts into one multipart document.
pub(crate) fn encode(boundary: &str, parts: &[RequestPart]) -> String {
    let mut out = String::new();
    for part in parts {
        out.push_str("--");
        out.push_str(boundary);
        out.push_str("\r\n");
        out.push_str("Content-Type: ");
        out.push_str(PART_CONTENT_TYPE);
        out.push_str("\r\n");
        out.push_str("Content-Id: ");
        out.push_str(&part.content_id);
        out.push_str("\r\n\r\n");
        out.push_str(&part.payload);
        out.push_str("\r\n");
    }
    out.push_str("--");
    out.push_str(boundary);
    out.push_str("--\r\n\r\n");
    out
}

/// Decode a multipart response body into its parts, in document order.
pub(crate) fn decode(boundary: &str, body: &str) -> Result<Vec<ResponsePart>> {
    let delimiter = format!("--{}", boundary);
    let mut segments: Vec<&str> = body.split(delimiter.as_str()).collect();
    if segments.len() < 2 {
        return Err(malformed("boundary not found in response body"));
    }
    // preamble before the first delimiter, terminator after the last
    let terminator = segments.pop().expect("at least two segments");
    if !terminator.starts_with("--") {
        return Err(malformed("multipart terminator missing"));
    }
    segments.remove(0);

    segments.into_iter().map(|s| decode_part(s)).collect()
}

fn decode_part(segment: &str) -> Result<ResponsePart> {
    let segment = segment
        .strip_prefix("\r\n")
        .ok_or_else(|| malformed("part delimiter not followed by CRLF"))?;
    let (part_headers, embedded) = split_block(segment)
        .ok_or_else(|| malformed("part headers not terminated by blank line"))?;

    let mut content_id = None;
    for line in part_headers.split("\r\n") {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-id") {
                content_id = Some(value.trim().to_string());
            }
        }
    }
    if content_id.is_none() {
        warn!("multipart response part carries no content id");
    }

    let (head, body) = split_block(embedded)
        .ok_or_else(|| malformed("embedded response head not terminated by blank line"))?;
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let mut status_fields = status_line.splitn(3, ' ');
    let version = status_fields.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(malformed(format!("bad status line {:?}", status_line)));
    }
    let status_code = status_fields
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| malformed(format!("bad status code in {:?}", status_line)))?;
    let status_text = status_fields.next().unwrap_or_default().to_string();

    let headers = lines
        .filter_map(|line| {
            line.split_once(':')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        })
        .collect();

    let body = body.strip_suffix("\r\n").unwrap_or(body).to_string();
    Ok(ResponsePart {
        content_id,
        status_code,
        status_text,
        headers,
        body,
    })
}

/// Split a block at the first blank line (CRLF CRLF).
fn split_block(text: &str) -> Option<(&str, &str)> {
    text.split_once("\r\n\r\n")
}

fn malformed(message: impl Into<String>) -> ArangoError {
    ArangoError::Deserialization {
        message: format!("malformed multipart body: {}", message.into()),
    }
}

#[cfg(test)]
mod tests {
    use crate::request::Method;

    use super::*;

    const BOUNDARY: &str = "XXXsubpartXXX";

    fn sample_response_body() -> String {
        let mut body = String::new();
        for (id, status, payload) in [
            ("1", "202 Accepted", r#"{"_key":"a"}"#),
            ("2", "202 Accepted", r#"{"_key":"b"}"#),
            ("3", "404 Not Found", r#"{"error":true,"errorNum":1202}"#),
        ] {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Type: {PART_CONTENT_TYPE}\r\nContent-Id: {id}\r\n\r\n\
                 HTTP/1.1 {status}\r\nContent-Type: application/json; charset=utf-8\r\n\r\n\
                 {payload}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n\r\n"));
        body
    }

    #[test]
    fn decode_splits_parts_in_order() {
        let parts = decode(BOUNDARY, &sample_response_body()).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].content_id.as_deref(), Some("1"));
        assert_eq!(parts[0].status_code, 202);
        assert_eq!(parts[0].status_text, "Accepted");
        assert_eq!(parts[0].body, r#"{"_key":"a"}"#);
        assert_eq!(parts[2].status_code, 404);
        assert_eq!(parts[2].body, r#"{"error":true,"errorNum":1202}"#);
    }

    #[test]
    fn decode_keeps_embedded_headers() {
        let parts = decode(BOUNDARY, &sample_response_body()).unwrap();
        assert_eq!(
            parts[1].headers,
            vec![(
                "Content-Type".to_string(),
                "application/json; charset=utf-8".to_string()
            )]
        );
    }

    #[test]
    fn decode_rejects_missing_terminator() {
        let body = sample_response_body().replace(&format!("--{BOUNDARY}--\r\n\r\n"), "");
        let err = decode(BOUNDARY, &body).unwrap_err();
        assert!(matches!(err, ArangoError::Deserialization { .. }));
    }

    #[test]
    fn decode_rejects_foreign_boundary() {
        let err = decode("otherboundary", &sample_response_body()).unwrap_err();
        assert!(matches!(err, ArangoError::Deserialization { .. }));
    }

    #[test]
    fn encode_decode_round_trip() {
        let parts = vec![
            RequestPart {
                content_id: "1".into(),
                payload: "GET /_api/version HTTP/1.1\r\n\r\n".into(),
            },
            RequestPart {
                content_id: "2".into(),
                payload: "POST /_api/document/foo HTTP/1.1\r\n\r\n{\"x\":1}".into(),
            },
        ];
        let encoded = encode(BOUNDARY, &parts);
        assert!(encoded.ends_with(&format!("--{BOUNDARY}--\r\n\r\n")));
        assert_eq!(encoded.matches(PART_CONTENT_TYPE).count(), 2);
        assert!(encoded.contains("Content-Id: 1\r\n"));
        assert!(encoded.contains("Content-Id: 2\r\n"));
    }

    #[test]
    fn stringify_request_renders_embedded_http_message() {
        let request = Request::new(Method::Post, "/_api/document/foo")
            .with_param_bool("returnNew", true);
        let text = stringify_request(&request, Some(r#"{"_key":"k"}"#));
        assert!(text.starts_with("POST /_api/document/foo?returnNew=1 HTTP/1.1\r\n"));
        assert!(text.contains("content-type: application/json\r\n"));
        assert!(text.ends_with("\r\n\r\n{\"_key\":\"k\"}"));
    }
}
