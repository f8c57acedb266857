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

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::database::Database;
use crate::error::{ArangoError, Result};
use crate::executor::ExecutionResult;
use crate::formatter;
use crate::request::{Method, Request};

const ERR_DOCUMENT_NOT_FOUND: i64 = 1202;

/// One edge collection and the vertex collections it may connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    #[serde(rename = "collection")]
    pub edge_collection: String,
    #[serde(rename = "from")]
    pub from_vertex_collections: Vec<String>,
    #[serde(rename = "to")]
    pub to_vertex_collections: Vec<String>,
}

/// Wrapper for one named graph and its vertices and edges, backed by the
/// graph module's own endpoints rather than the plain document API, so the
/// server maintains edge consistency.
#[derive(Debug, Clone)]
pub struct Graph {
    db: Database,
    name: String,
}

impl Graph {
    pub(crate) fn new(db: Database, name: &str) -> Self {
        Self {
            db,
            name: name.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Get, format!("/_api/gharial/{}", self.name));
        self.db.execute_with("graph.properties", request, |resp| {
            Ok(formatter::format_graph(
                resp.body().get("graph").unwrap_or(&Value::Null),
            ))
        })
    }

    // ------------------------------------------------------------------
    // vertex collections
    // ------------------------------------------------------------------

    pub fn vertex_collections(&self) -> Result<ExecutionResult<Vec<String>>> {
        let request = Request::new(
            Method::Get,
            format!("/_api/gharial/{}/vertex", self.name),
        );
        self.db
            .execute_with("graph.vertex_collections", request, |resp| {
                let mut names: Vec<String> =
                    serde_json::from_value(resp.body().get("collections").cloned().unwrap_or(
                        Value::Null,
                    ))
                    .map_err(|err| {
                        ArangoError::deserialization(format!("expected name array: {err}"))
                    })?;
                names.sort_unstable();
                Ok(names)
            })
    }

    /// Add a vertex collection to the graph, creating it if necessary.
    pub fn create_vertex_collection(&self, name: &str) -> Result<ExecutionResult<Value>> {
        let request = Request::new(
            Method::Post,
            format!("/_api/gharial/{}/vertex", self.name),
        )
        .with_data(json!({ "collection": name }));
        self.db
            .execute_with("graph.create_vertex_collection", request, |resp| {
                Ok(formatter::format_graph(
                    resp.body().get("graph").unwrap_or(&Value::Null),
                ))
            })
    }

    /// Remove a vertex collection from the graph; with `purge` the
    /// collection itself is dropped too.
    pub fn delete_vertex_collection(
        &self,
        name: &str,
        purge: bool,
    ) -> Result<ExecutionResult<bool>> {
        let request = Request::new(
            Method::Delete,
            format!("/_api/gharial/{}/vertex/{name}", self.name),
        )
        .with_param_bool("dropCollection", purge);
        self.db
            .execute_with("graph.delete_vertex_collection", request, |_| Ok(true))
    }

    // ------------------------------------------------------------------
    // edge definitions
    // ------------------------------------------------------------------

    pub fn edge_definitions(&self) -> Result<ExecutionResult<Vec<EdgeDefinition>>> {
        let request = Request::new(Method::Get, format!("/_api/gharial/{}", self.name));
        self.db
            .execute_with("graph.edge_definitions", request, |resp| {
                let definitions = resp
                    .body()
                    .pointer("/graph/edgeDefinitions")
                    .cloned()
                    .unwrap_or(Value::Array(Vec::new()));
                serde_json::from_value(definitions).map_err(|err| {
                    ArangoError::deserialization(format!("bad edge definition: {err}"))
                })
            })
    }

    pub fn create_edge_definition(
        &self,
        definition: &EdgeDefinition,
    ) -> Result<ExecutionResult<Value>> {
        let request = Request::new(
            Method::Post,
            format!("/_api/gharial/{}/edge", self.name),
        )
        .with_data(json!(definition));
        self.db
            .execute_with("graph.create_edge_definition", request, |resp| {
                Ok(formatter::format_graph(
                    resp.body().get("graph").unwrap_or(&Value::Null),
                ))
            })
    }

    pub fn replace_edge_definition(
        &self,
        definition: &EdgeDefinition,
    ) -> Result<ExecutionResult<Value>> {
        let request = Request::new(
            Method::Put,
            format!(
                "/_api/gharial/{}/edge/{}",
                self.name, definition.edge_collection
            ),
        )
        .with_data(json!(definition));
        self.db
            .execute_with("graph.replace_edge_definition", request, |resp| {
                Ok(formatter::format_graph(
                    resp.body().get("graph").unwrap_or(&Value::Null),
                ))
            })
    }

    /// Remove an edge definition; with `purge` its edge collection is
    /// dropped too.
    pub fn delete_edge_definition(
        &self,
        edge_collection: &str,
        purge: bool,
    ) -> Result<ExecutionResult<bool>> {
        let request = Request::new(
            Method::Delete,
            format!("/_api/gharial/{}/edge/{edge_collection}", self.name),
        )
        .with_param_bool("dropCollections", purge);
        self.db
            .execute_with("graph.delete_edge_definition", request, |_| Ok(true))
    }

    // ------------------------------------------------------------------
    // vertices
    // ------------------------------------------------------------------

    pub fn insert_vertex(
        &self,
        collection: &str,
        vertex: Value,
    ) -> Result<ExecutionResult<Value>> {
        let request = Request::new(
            Method::Post,
            format!("/_api/gharial/{}/vertex/{collection}", self.name),
        )
        .with_data(vertex);
        self.db.execute_with("vertex.insert", request, |resp| {
            Ok(resp.body().get("vertex").cloned().unwrap_or(Value::Null))
        })
    }

    /// Fetch a vertex, `None` when it does not exist.
    pub fn vertex(&self, collection: &str, key: &str) -> Result<ExecutionResult<Option<Value>>> {
        let request = Request::new(
            Method::Get,
            format!("/_api/gharial/{}/vertex/{collection}/{key}", self.name),
        );
        self.db.execute_tolerant(
            "vertex.get",
            request,
            &[ERR_DOCUMENT_NOT_FOUND],
            None,
            |resp| Ok(resp.body().get("vertex").cloned()),
        )
    }

    pub fn update_vertex(
        &self,
        collection: &str,
        key: &str,
        patch: Value,
    ) -> Result<ExecutionResult<Value>> {
        let request = Request::new(
            Method::Patch,
            format!("/_api/gharial/{}/vertex/{collection}/{key}", self.name),
        )
        .with_data(patch);
        self.db.execute_with("vertex.update", request, |resp| {
            Ok(resp.body().get("vertex").cloned().unwrap_or(Value::Null))
        })
    }

    /// Replace a vertex wholesale.
    pub fn replace_vertex(
        &self,
        collection: &str,
        key: &str,
        vertex: Value,
    ) -> Result<ExecutionResult<Value>> {
        let request = Request::new(
            Method::Put,
            format!("/_api/gharial/{}/vertex/{collection}/{key}", self.name),
        )
        .with_data(vertex);
        self.db.execute_with("vertex.replace", request, |resp| {
            Ok(resp.body().get("vertex").cloned().unwrap_or(Value::Null))
        })
    }

    pub fn delete_vertex(
        &self,
        collection: &str,
        key: &str,
        ignore_missing: bool,
    ) -> Result<ExecutionResult<bool>> {
        let request = Request::new(
            Method::Delete,
            format!("/_api/gharial/{}/vertex/{collection}/{key}", self.name),
        );
        if ignore_missing {
            self.db.execute_tolerant(
                "vertex.delete",
                request,
                &[ERR_DOCUMENT_NOT_FOUND],
                false,
                |_| Ok(true),
            )
        } else {
            self.db.execute_with("vertex.delete", request, |_| Ok(true))
        }
    }

    // ------------------------------------------------------------------
    // edges
    // ------------------------------------------------------------------

    /// Insert an edge; `edge` must carry `_from` and `_to` document ids.
    pub fn insert_edge(&self, collection: &str, edge: Value) -> Result<ExecutionResult<Value>> {
        for endpoint in ["_from", "_to"] {
            if edge.get(endpoint).and_then(Value::as_str).is_none() {
                return Err(ArangoError::invalid_input(format!(
                    "edge carries no string {endpoint} field"
                )));
            }
        }
        let request = Request::new(
            Method::Post,
            format!("/_api/gharial/{}/edge/{collection}", self.name),
        )
        .with_data(edge);
        self.db.execute_with("edge.insert", request, |resp| {
            Ok(resp.body().get("edge").cloned().unwrap_or(Value::Null))
        })
    }

    /// Fetch an edge, `None` when it does not exist.
    pub fn edge(&self, collection: &str, key: &str) -> Result<ExecutionResult<Option<Value>>> {
        let request = Request::new(
            Method::Get,
            format!("/_api/gharial/{}/edge/{collection}/{key}", self.name),
        );
        self.db.execute_tolerant(
            "edge.get",
            request,
            &[ERR_DOCUMENT_NOT_FOUND],
            None,
            |resp| Ok(resp.body().get("edge").cloned()),
        )
    }

    pub fn update_edge(
        &self,
        collection: &str,
        key: &str,
        patch: Value,
    ) -> Result<ExecutionResult<Value>> {
        let request = Request::new(
            Method::Patch,
            format!("/_api/gharial/{}/edge/{collection}/{key}", self.name),
        )
        .with_data(patch);
        self.db.execute_with("edge.update", request, |resp| {
            Ok(resp.body().get("edge").cloned().unwrap_or(Value::Null))
        })
    }

    /// Replace an edge wholesale; `edge` must carry `_from` and `_to`.
    pub fn replace_edge(
        &self,
        collection: &str,
        key: &str,
        edge: Value,
    ) -> Result<ExecutionResult<Value>> {
        for endpoint in ["_from", "_to"] {
            if edge.get(endpoint).and_then(Value::as_str).is_none() {
                return Err(ArangoError::invalid_input(format!(
                    "edge carries no string {endpoint} field"
                )));
            }
        }
        let request = Request::new(
            Method::Put,
            format!("/_api/gharial/{}/edge/{collection}/{key}", self.name),
        )
        .with_data(edge);
        self.db.execute_with("edge.replace", request, |resp| {
            Ok(resp.body().get("edge").cloned().unwrap_or(Value::Null))
        })
    }

    pub fn delete_edge(
        &self,
        collection: &str,
        key: &str,
        ignore_missing: bool,
    ) -> Result<ExecutionResult<bool>> {
        let request = Request::new(
            Method::Delete,
            format!("/_api/gharial/{}/edge/{collection}/{key}", self.name),
        );
        if ignore_missing {
            self.db.execute_tolerant(
                "edge.delete",
                request,
                &[ERR_DOCUMENT_NOT_FOUND],
                false,
                |_| Ok(true),
            )
        } else {
            self.db.execute_with("edge.delete", request, |_| Ok(true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_definition_serializes_with_server_field_names() {
        let definition = EdgeDefinition {
            edge_collection: "knows".into(),
            from_vertex_collections: vec!["people".into()],
            to_vertex_collections: vec!["people".into()],
        };
        assert_eq!(
            json!(&definition),
            json!({"collection": "knows", "from": ["people"], "to": ["people"]})
        );
    }
}
