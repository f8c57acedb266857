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

//! Pure functions mapping raw server JSON onto the driver's snake_case
//! field convention.
//!
//! Formatters rename and subset; they never invent values. The only fields
//! ever dropped without a rename are the server's `code`/`error` envelope
//! bookkeeping.

use serde_json::{Map, Value};

type Object = Map<String, Value>;

fn as_object(body: &Value) -> Option<&Object> {
    body.as_object()
}

/// Copy `from` into `result` under `to`, when present.
fn put(result: &mut Object, to: &str, body: &Object, from: &str) {
    if let Some(value) = body.get(from) {
        result.insert(to.into(), value.clone());
    }
}

/// Strip the `code`/`error` envelope and keep everything else as-is.
pub(crate) fn format_body(body: &Value) -> Value {
    match as_object(body) {
        Some(map) => {
            let mut result = map.clone();
            result.remove("code");
            result.remove("error");
            Value::Object(result)
        }
        None => body.clone(),
    }
}

pub(crate) fn format_database(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "id", map, "id");
    put(&mut result, "name", map, "name");
    put(&mut result, "path", map, "path");
    put(&mut result, "system", map, "isSystem");
    put(&mut result, "sharding", map, "sharding");
    put(&mut result, "replication_factor", map, "replicationFactor");
    put(&mut result, "write_concern", map, "writeConcern");
    Value::Object(result)
}

pub(crate) fn format_collection(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "id", map, "id");
    put(&mut result, "name", map, "name");
    put(&mut result, "system", map, "isSystem");
    put(&mut result, "global_id", map, "globallyUniqueId");
    if let Some(kind) = map.get("type").and_then(Value::as_i64) {
        result.insert("edge".into(), Value::Bool(kind == 3));
    }
    put(&mut result, "status", map, "status");
    put(&mut result, "count", map, "count");
    put(&mut result, "sync", map, "waitForSync");
    put(&mut result, "schema", map, "schema");
    if let Some(key_options) = map.get("keyOptions") {
        result.insert("key_options".into(), format_key_options(key_options));
    }
    put(&mut result, "shard_count", map, "numberOfShards");
    put(&mut result, "shard_fields", map, "shardKeys");
    put(&mut result, "replication_factor", map, "replicationFactor");
    put(&mut result, "write_concern", map, "writeConcern");
    put(&mut result, "revision", map, "revision");
    put(&mut result, "checksum", map, "checksum");
    put(&mut result, "cache", map, "cacheEnabled");
    Value::Object(result)
}

pub(crate) fn format_key_options(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "key_generator", map, "type");
    put(&mut result, "key_increment", map, "increment");
    put(&mut result, "key_offset", map, "offset");
    put(&mut result, "user_keys", map, "allowUserKeys");
    put(&mut result, "key_last_value", map, "lastValue");
    Value::Object(result)
}

pub(crate) fn format_index(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    if let Some(id) = map.get("id").and_then(Value::as_str) {
        // "collection/5" -> "5"
        let id = id.split_once('/').map(|(_, tail)| tail).unwrap_or(id);
        result.insert("id".into(), Value::String(id.into()));
    }
    put(&mut result, "name", map, "name");
    put(&mut result, "type", map, "type");
    put(&mut result, "fields", map, "fields");
    put(&mut result, "unique", map, "unique");
    put(&mut result, "sparse", map, "sparse");
    put(&mut result, "deduplicate", map, "deduplicate");
    put(&mut result, "min_length", map, "minLength");
    put(&mut result, "geo_json", map, "geoJson");
    put(&mut result, "selectivity", map, "selectivityEstimate");
    put(&mut result, "new", map, "isNewlyCreated");
    put(&mut result, "expiry_time", map, "expireAfter");
    put(&mut result, "in_background", map, "inBackground");
    Value::Object(result)
}

pub(crate) fn format_aql_query(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "id", map, "id");
    put(&mut result, "query", map, "query");
    put(&mut result, "bind_vars", map, "bindVars");
    put(&mut result, "runtime", map, "runTime");
    put(&mut result, "started", map, "started");
    put(&mut result, "state", map, "state");
    put(&mut result, "stream", map, "stream");
    put(&mut result, "user", map, "user");
    put(&mut result, "database", map, "database");
    put(&mut result, "peak_memory_usage", map, "peakMemoryUsage");
    Value::Object(result)
}

pub(crate) fn format_aql_tracking(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "enabled", map, "enabled");
    put(&mut result, "max_query_string_length", map, "maxQueryStringLength");
    put(&mut result, "max_slow_queries", map, "maxSlowQueries");
    put(&mut result, "slow_query_threshold", map, "slowQueryThreshold");
    put(&mut result, "track_bind_vars", map, "trackBindVars");
    put(&mut result, "track_slow_queries", map, "trackSlowQueries");
    Value::Object(result)
}

pub(crate) fn format_aql_cache(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "mode", map, "mode");
    put(&mut result, "max_results", map, "maxResults");
    put(&mut result, "max_results_size", map, "maxResultsSize");
    put(&mut result, "max_entry_size", map, "maxEntrySize");
    put(&mut result, "include_system", map, "includeSystem");
    Value::Object(result)
}

pub(crate) fn format_aql_function(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "name", map, "name");
    put(&mut result, "code", map, "code");
    put(&mut result, "is_deterministic", map, "isDeterministic");
    Value::Object(result)
}

pub(crate) fn format_graph(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "id", map, "_id");
    put(&mut result, "key", map, "_key");
    put(&mut result, "revision", map, "_rev");
    put(&mut result, "name", map, "name");
    if !result.contains_key("name") {
        put(&mut result, "name", map, "_key");
    }
    put(&mut result, "orphan_collections", map, "orphanCollections");
    if let Some(definitions) = map.get("edgeDefinitions").and_then(Value::as_array) {
        result.insert(
            "edge_definitions".into(),
            Value::Array(definitions.iter().map(format_edge_definition).collect()),
        );
    }
    put(&mut result, "shard_count", map, "numberOfShards");
    put(&mut result, "replication_factor", map, "replicationFactor");
    Value::Object(result)
}

pub(crate) fn format_edge_definition(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "edge_collection", map, "collection");
    put(&mut result, "from_vertex_collections", map, "from");
    put(&mut result, "to_vertex_collections", map, "to");
    Value::Object(result)
}

pub(crate) fn format_backup(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "backup_id", map, "id");
    put(&mut result, "datetime", map, "datetime");
    put(&mut result, "size_in_bytes", map, "sizeInBytes");
    put(&mut result, "nr_db_servers", map, "nrDBServers");
    put(&mut result, "nr_files", map, "nrFiles");
    put(&mut result, "nr_pieces_present", map, "nrPiecesPresent");
    put(&mut result, "version", map, "version");
    put(&mut result, "available", map, "available");
    put(&mut result, "potentially_inconsistent", map, "potentiallyInconsistent");
    Value::Object(result)
}

pub(crate) fn format_backup_transfer(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "backup_id", map, "BackupId");
    put(&mut result, "cancelled", map, "Cancelled");
    put(&mut result, "timestamp", map, "Timestamp");
    put(&mut result, "dbservers", map, "DBServers");
    Value::Object(result)
}

pub(crate) fn format_replication_logger_state(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    if let Some(state) = map.get("state").and_then(Value::as_object) {
        put(&mut result, "running", state, "running");
        put(&mut result, "last_log_tick", state, "lastLogTick");
        put(
            &mut result,
            "last_uncommitted_log_tick",
            state,
            "lastUncommittedLogTick",
        );
        put(&mut result, "total_events", state, "totalEvents");
        put(&mut result, "time", state, "time");
    }
    if let Some(server) = map.get("server").and_then(Value::as_object) {
        put(&mut result, "server_version", server, "version");
        put(&mut result, "server_id", server, "serverId");
    }
    put(&mut result, "clients", map, "clients");
    Value::Object(result)
}

pub(crate) fn format_replication_applier_config(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "endpoint", map, "endpoint");
    put(&mut result, "database", map, "database");
    put(&mut result, "username", map, "username");
    put(&mut result, "max_connect_retries", map, "maxConnectRetries");
    put(&mut result, "connect_timeout", map, "connectTimeout");
    put(&mut result, "request_timeout", map, "requestTimeout");
    put(&mut result, "chunk_size", map, "chunkSize");
    put(&mut result, "auto_start", map, "autoStart");
    put(&mut result, "adaptive_polling", map, "adaptivePolling");
    put(&mut result, "include_system", map, "includeSystem");
    put(&mut result, "auto_resync", map, "autoResync");
    put(&mut result, "verbose", map, "verbose");
    Value::Object(result)
}

pub(crate) fn format_replication_applier_state(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "endpoint", map, "endpoint");
    put(&mut result, "database", map, "database");
    if let Some(server) = map.get("server").and_then(Value::as_object) {
        put(&mut result, "server_version", server, "version");
        put(&mut result, "server_id", server, "serverId");
    }
    if let Some(state) = map.get("state").and_then(Value::as_object) {
        put(&mut result, "running", state, "running");
        put(
            &mut result,
            "last_applied_continuous_tick",
            state,
            "lastAppliedContinuousTick",
        );
        put(
            &mut result,
            "last_processed_continuous_tick",
            state,
            "lastProcessedContinuousTick",
        );
        put(
            &mut result,
            "last_available_continuous_tick",
            state,
            "lastAvailableContinuousTick",
        );
        put(&mut result, "progress", state, "progress");
        put(&mut result, "time", state, "time");
    }
    Value::Object(result)
}

pub(crate) fn format_user(body: &Value) -> Value {
    let Some(map) = as_object(body) else {
        return body.clone();
    };
    let mut result = Object::new();
    put(&mut result, "username", map, "user");
    put(&mut result, "active", map, "active");
    put(&mut result, "extra", map, "extra");
    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn aql_cache_round_trips_renamed_fields() {
        let body = json!({
            "mode": "demand",
            "maxResults": 128,
            "maxResultsSize": 268435456u64,
            "maxEntrySize": 16777216,
            "includeSystem": false,
            "code": 200,
            "error": false
        });
        let formatted = format_aql_cache(&body);
        assert_eq!(formatted["max_results"], body["maxResults"]);
        assert_eq!(formatted["max_results_size"], body["maxResultsSize"]);
        assert_eq!(formatted["include_system"], body["includeSystem"]);
    }

    #[test]
    fn formatters_drop_only_envelope_bookkeeping() {
        let body = json!({
            "id": "123",
            "name": "accounts",
            "isSystem": false,
            "waitForSync": true,
            "code": 200,
            "error": false
        });
        for formatted in [format_collection(&body), format_body(&body)] {
            let map = formatted.as_object().unwrap();
            assert!(!map.contains_key("code"));
            assert!(!map.contains_key("error"));
            assert_eq!(map["name"], "accounts");
        }
    }

    #[test]
    fn index_id_strips_collection_prefix() {
        let body = json!({"id": "accounts/12345", "type": "hash", "fields": ["email"]});
        let formatted = format_index(&body);
        assert_eq!(formatted["id"], "12345");
    }

    #[test]
    fn graph_formats_nested_edge_definitions() {
        let body = json!({
            "_id": "_graphs/social",
            "_key": "social",
            "_rev": "_Z",
            "orphanCollections": [],
            "edgeDefinitions": [
                {"collection": "knows", "from": ["people"], "to": ["people"]}
            ]
        });
        let formatted = format_graph(&body);
        assert_eq!(formatted["name"], "social");
        assert_eq!(formatted["edge_definitions"][0]["edge_collection"], "knows");
        assert_eq!(
            formatted["edge_definitions"][0]["from_vertex_collections"],
            json!(["people"])
        );
    }

    #[test]
    fn collection_type_maps_to_edge_flag() {
        let doc = json!({"name": "d", "type": 2});
        let edge = json!({"name": "e", "type": 3});
        assert_eq!(format_collection(&doc)["edge"], false);
        assert_eq!(format_collection(&edge)["edge"], true);
    }
}
