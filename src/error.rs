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

use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::request::{Method, Request};
use crate::response::Response;

/// Errors the driver can produce.
///
/// Every variant owns its payload (no borrowed sources), which keeps the
/// whole type [`Clone`]: queued jobs capture the error they resolved to and
/// hand a copy to each [`result()`](crate::job::QueuedJob::result) call.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ArangoError {
    /// used when
    ///  * input is rejected before any network call.
    ///    E.g., an empty host list, a malformed document key, a random host
    ///    resolver over a single host.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    /// used when
    ///  * the HTTP round trip itself fails (connection refused, broken
    ///    socket, TLS failure). The driver never retries; see the host
    ///    resolvers for picking a different host on a manual re-attempt.
    #[error("connection failed: {message}")]
    Transport { message: String },
    /// used when
    ///  * a request body cannot be rendered to JSON.
    #[error("serialization failed: {message}")]
    Serialization { message: String },
    /// used when
    ///  * a response body that should be JSON cannot be parsed.
    #[error("deserialization failed: {message}")]
    Deserialization { message: String },
    /// used when
    ///  * the server answered with a non-success status or an `errorNum`
    ///    body for some operation.
    #[error("{0}")]
    Server(ServerError),
    /// used when
    ///  * an executor is driven through an invalid lifecycle transition.
    ///    E.g., queuing onto a committed batch, committing twice, queuing a
    ///    request without collection hints into a transaction.
    #[error("invalid executor state: {message}")]
    State { message: String },
    /// used when
    ///  * a job's result is requested while the job is still pending.
    #[error("job result not available: {message}")]
    JobPending { message: String },
}

impl ArangoError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub(crate) fn serialization(err: &serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }

    pub(crate) fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization {
            message: message.into(),
        }
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    pub(crate) fn job_pending(message: impl Into<String>) -> Self {
        Self::JobPending {
            message: message.into(),
        }
    }

    /// The server-reported numeric error code, if this is a server error
    /// that carried one.
    pub fn error_code(&self) -> Option<i64> {
        match self {
            Self::Server(err) => err.error_code,
            _ => None,
        }
    }

    /// The HTTP status code, if this is a server error.
    pub fn http_code(&self) -> Option<u16> {
        match self {
            Self::Server(err) => Some(err.http_code),
            _ => None,
        }
    }
}

impl From<ServerError> for ArangoError {
    fn from(err: ServerError) -> Self {
        Self::Server(err)
    }
}

/// A failure reported by the ArangoDB server for one operation.
///
/// Carries the operation tag the failing API method passed in (e.g.,
/// `"document.insert"`), so callers match on the tag instead of an
/// exception-subtype zoo.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ServerError {
    /// Which driver operation produced this error.
    pub operation: &'static str,
    /// HTTP method of the originating request.
    pub method: Method,
    /// Full URL the request was sent to.
    pub url: String,
    /// Endpoint path of the originating request.
    pub endpoint: String,
    /// HTTP status code of the response.
    pub http_code: u16,
    /// HTTP status text of the response.
    pub http_text: String,
    /// ArangoDB's `errorNum`, when the body carried one.
    pub error_code: Option<i64>,
    /// Human-readable error message.
    pub message: String,
}

impl ServerError {
    /// Build a server error from the failing response and its request.
    pub(crate) fn new(operation: &'static str, response: &Response, request: &Request) -> Self {
        let message = response
            .error_message
            .clone()
            .unwrap_or_else(|| response.status_text.clone());
        Self::with_message(operation, response, request, message)
    }

    pub(crate) fn with_message(
        operation: &'static str,
        response: &Response,
        request: &Request,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            method: request.method,
            url: response.url.clone(),
            endpoint: request.endpoint.clone(),
            http_code: response.status_code,
            http_text: response.status_text.clone(),
            error_code: response.error_code,
            message: message.into(),
        }
    }
}

impl Display for ServerError {
    /// Renders the stable, greppable form `[HTTP <code>][ERR <num>] <msg>`,
    /// or `[HTTP <code>] <msg>` when the server sent no error number.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.error_code {
            Some(num) => write!(f, "[HTTP {}][ERR {}] {}", self.http_code, num, self.message),
            None => write!(f, "[HTTP {}] {}", self.http_code, self.message),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArangoError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_response() -> (Response, Request) {
        let request = Request::new(Method::Get, "/_api/collection/missing");
        let response = Response::from_parts(
            Method::Get,
            "http://localhost:8529/_db/test/_api/collection/missing",
            404,
            "Not Found",
            vec![],
            r#"{"error":true,"errorNum":1203,"errorMessage":"collection not found","code":404}"#,
            true,
        );
        (response, request)
    }

    #[test]
    fn server_error_message_format_with_error_num() {
        let (response, request) = failing_response();
        let err = ServerError::new("collection.get", &response, &request);
        assert_eq!(err.to_string(), "[HTTP 404][ERR 1203] collection not found");
    }

    #[test]
    fn server_error_message_format_without_error_num() {
        let request = Request::new(Method::Get, "/_api/version");
        let response = Response::from_parts(
            Method::Get,
            "http://localhost:8529/_db/test/_api/version",
            401,
            "Unauthorized",
            vec![],
            "",
            true,
        );
        let err = ServerError::new("misc.version", &response, &request);
        assert_eq!(err.to_string(), "[HTTP 401] Unauthorized");
    }

    #[test]
    fn server_error_carries_request_context() {
        let (response, request) = failing_response();
        let err = ServerError::new("collection.get", &response, &request);
        assert_eq!(err.operation, "collection.get");
        assert_eq!(err.endpoint, "/_api/collection/missing");
        assert_eq!(err.http_code, 404);
        assert_eq!(err.error_code, Some(1203));
    }
}
