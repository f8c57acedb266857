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

//! Driver-level tests against a scripted transport. No server required:
//! every test enqueues the raw responses it expects the server to produce
//! and asserts on both the driver's results and the requests it sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use arango::aql::AqlQueryOptions;
use arango::connection::transport::{HttpTransport, TransportResponse};
use arango::database::{Database, TransactionOptions};
use arango::job::JobStatus;
use arango::{ArangoClient, ArangoError, Auth, HostStrategy, Method};

#[derive(Debug, Clone)]
struct SentRequest {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl SentRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn json_body(&self) -> Value {
        serde_json::from_str(self.body.as_deref().unwrap_or_default()).unwrap()
    }
}

/// Transport double: hands out pre-scripted responses in order and records
/// everything sent through it.
#[derive(Debug, Default)]
struct ScriptedTransport {
    sent: Mutex<Vec<SentRequest>>,
    responses: Mutex<VecDeque<TransportResponse>>,
}

impl ScriptedTransport {
    fn expect(&self, status_code: u16, status_text: &str, headers: &[(&str, &str)], body: &str) {
        self.responses.lock().unwrap().push_back(TransportResponse {
            status_code,
            status_text: status_text.to_string(),
            headers: headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            body: body.to_string(),
        });
    }

    fn expect_json(&self, status_code: u16, status_text: &str, body: &Value) {
        self.expect(
            status_code,
            status_text,
            &[("content-type", "application/json")],
            &body.to_string(),
        );
    }

    fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    fn send_request(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: Option<&str>,
    ) -> arango::Result<TransportResponse> {
        self.sent.lock().unwrap().push(SentRequest {
            method,
            url: url.to_string(),
            headers: headers.to_vec(),
            body: body.map(str::to_owned),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ArangoError::Transport {
                message: format!("no scripted response left for {method} {url}"),
            })
    }
}

fn scripted_db() -> (Arc<ScriptedTransport>, Database) {
    let _ = env_logger::builder().is_test(true).try_init();
    let transport = Arc::new(ScriptedTransport::default());
    let db = ArangoClient::new("http://localhost:8529")
        .unwrap()
        .with_transport(Arc::clone(&transport) as Arc<dyn HttpTransport>)
        .db("test", Auth::basic("root", "passwd"))
        .unwrap();
    (transport, db)
}

#[test]
fn version_call_carries_default_and_auth_headers() {
    let (transport, db) = scripted_db();
    transport.expect_json(
        200,
        "OK",
        &json!({"server": "arango", "license": "community", "version": "3.11.4"}),
    );

    let version = db.version(false).unwrap().value().unwrap();
    assert_eq!(version, "3.11.4");

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::Get);
    assert_eq!(
        sent[0].url,
        "http://localhost:8529/_db/test/_api/version?details=0"
    );
    assert_eq!(sent[0].header("content-type"), Some("application/json"));
    assert_eq!(
        sent[0].header("authorization"),
        Some("Basic cm9vdDpwYXNzd2Q=")
    );
    assert!(sent[0].header("x-arango-driver").is_some());
}

#[test]
fn server_failures_surface_as_tagged_errors() {
    let (transport, db) = scripted_db();
    transport.expect_json(
        404,
        "Not Found",
        &json!({
            "error": true,
            "errorNum": 1203,
            "errorMessage": "collection or view not found",
            "code": 404
        }),
    );

    // in the default context server failures come straight out of the call
    let err = db.collection("missing").properties().unwrap_err();
    match err {
        ArangoError::Server(server_err) => {
            assert_eq!(server_err.operation, "collection.properties");
            assert_eq!(server_err.http_code, 404);
            assert_eq!(server_err.error_code, Some(1203));
            assert_eq!(server_err.endpoint, "/_api/collection/missing/properties");
            assert_eq!(
                server_err.to_string(),
                "[HTTP 404][ERR 1203] collection or view not found"
            );
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[test]
fn ignore_missing_only_swallows_the_documented_code() {
    let (transport, db) = scripted_db();
    transport.expect_json(
        404,
        "Not Found",
        &json!({"error": true, "errorNum": 1203, "errorMessage": "not found", "code": 404}),
    );
    let deleted = db
        .delete_collection("gone", true)
        .unwrap()
        .value()
        .unwrap();
    assert!(!deleted);

    // a different error code must still fail, ignore_missing or not
    transport.expect_json(
        404,
        "Not Found",
        &json!({"error": true, "errorNum": 1228, "errorMessage": "database not found", "code": 404}),
    );
    let err = db.delete_collection("gone", true).unwrap_err();
    assert!(matches!(err, ArangoError::Server(_)));
}

#[test]
fn fire_and_forget_async_requests_return_no_job() {
    let (transport, db) = scripted_db();
    transport.expect(202, "Accepted", &[], "");

    let async_db = db.begin_async(false);
    let outcome = async_db.version(false).unwrap();
    assert!(outcome.is_queued());

    let sent = transport.sent();
    assert_eq!(sent[0].header("x-arango-async"), Some("true"));
}

#[test]
fn stored_async_requests_yield_pollable_jobs() {
    let (transport, db) = scripted_db();
    transport.expect(202, "Accepted", &[("x-arango-async-id", "265413601")], "");

    let async_db = db.begin_async(true);
    let job = async_db.version(false).unwrap().async_job().unwrap();
    assert_eq!(job.id(), "265413601");
    assert_eq!(
        transport.sent()[0].header("x-arango-async"),
        Some("store")
    );

    // still in the server queue
    transport.expect(204, "No Content", &[], "");
    assert_eq!(job.status().unwrap(), JobStatus::Pending);

    // done: the result endpoint echoes the job id and the stored response
    transport.expect(
        200,
        "OK",
        &[
            ("x-arango-async-id", "265413601"),
            ("content-type", "application/json"),
        ],
        &json!({"server": "arango", "version": "3.11.4"}).to_string(),
    );
    assert_eq!(job.result().unwrap(), "3.11.4");

    let sent = transport.sent();
    assert_eq!(sent[1].method, Method::Get);
    assert!(sent[1].url.ends_with("/_api/job/265413601"));
    assert_eq!(sent[2].method, Method::Put);
    assert!(sent[2].url.ends_with("/_api/job/265413601"));
}

/// Render one part of a batch response the way arangod does.
fn batch_part(boundary: &str, content_id: &str, status: &str, body: &Value) -> String {
    format!(
        "--{boundary}\r\nContent-Type: application/x-arango-batchpart\r\nContent-Id: \
         {content_id}\r\n\r\nHTTP/1.1 {status}\r\nContent-Type: application/json; \
         charset=utf-8\r\n\r\n{body}\r\n"
    )
}

#[test]
fn batch_round_trip_resolves_jobs_by_content_id() {
    let (transport, db) = scripted_db();
    let batch = db.begin_batch(true);
    let accounts = batch.collection("accounts");

    let jobs = (1..=3)
        .map(|i| {
            accounts
                .insert(json!({"_key": format!("k{i}")}), None, false)
                .unwrap()
                .queued_job()
                .unwrap()
        })
        .collect::<Vec<_>>();
    assert_eq!(batch.queued_requests(), 3);
    for job in &jobs {
        assert!(matches!(
            job.result(),
            Err(ArangoError::JobPending { .. })
        ));
    }

    // parts deliberately out of queue order: correlation must go by id
    let boundary = "XXXsubpartXXX";
    let mut body = String::new();
    for content_id in ["2", "1", "3"] {
        body.push_str(&batch_part(
            boundary,
            content_id,
            "202 Accepted",
            &json!({
                "_id": format!("accounts/k{content_id}"),
                "_key": format!("k{content_id}"),
                "_rev": "_rev",
            }),
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n\r\n"));
    transport.expect(
        200,
        "OK",
        &[(
            "content-type",
            "multipart/form-data; boundary=XXXsubpartXXX",
        )],
        &body,
    );

    assert_eq!(batch.commit().unwrap(), 3);
    for (i, job) in jobs.iter().enumerate() {
        let meta = job.result().unwrap();
        assert_eq!(meta["_key"], format!("k{}", i + 1));
    }

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].url.ends_with("/_api/batch"));
    assert_eq!(
        sent[0].header("content-type"),
        Some("multipart/form-data; boundary=XXXsubpartXXX")
    );
    let payload = sent[0].body.as_deref().unwrap();
    assert!(payload.contains("POST /_api/document/accounts?returnNew=0 HTTP/1.1"));
    assert!(payload.contains("Content-Id: 3"));

    // the batch is spent now
    assert!(matches!(
        accounts.insert(json!({"_key": "late"}), None, false),
        Err(ArangoError::State { .. })
    ));
    assert!(matches!(batch.commit(), Err(ArangoError::State { .. })));
}

#[test]
fn batch_part_count_mismatch_fails_and_leaves_jobs_pending() {
    let (transport, db) = scripted_db();
    let batch = db.begin_batch(true);
    let accounts = batch.collection("accounts");

    let first = accounts
        .insert(json!({"_key": "a"}), None, false)
        .unwrap()
        .queued_job()
        .unwrap();
    let second = accounts
        .insert(json!({"_key": "b"}), None, false)
        .unwrap()
        .queued_job()
        .unwrap();

    let boundary = "XXXsubpartXXX";
    let mut body = batch_part(boundary, "1", "202 Accepted", &json!({"_key": "a"}));
    body.push_str(&format!("--{boundary}--\r\n\r\n"));
    transport.expect(200, "OK", &[], &body);

    assert!(matches!(batch.commit(), Err(ArangoError::State { .. })));
    assert_eq!(first.status(), JobStatus::Pending);
    assert_eq!(second.status(), JobStatus::Pending);
}

#[test]
fn transaction_unions_collection_hints_and_distributes_results() {
    let (transport, db) = scripted_db();
    let txn = db.begin_transaction(TransactionOptions::default());

    let insert_job = txn
        .collection("foo")
        .insert(json!({"_key": "k1"}), None, false)
        .unwrap()
        .queued_job()
        .unwrap();
    let get_job = txn
        .collection("bar")
        .get("k2")
        .unwrap()
        .queued_job()
        .unwrap();
    assert_eq!(txn.queued_requests(), 2);

    let mut composite = serde_json::Map::new();
    composite.insert(
        insert_job.id().to_string(),
        json!({"_id": "foo/k1", "_key": "k1", "_rev": "_r1"}),
    );
    composite.insert(
        get_job.id().to_string(),
        json!({"_key": "k2", "balance": 7}),
    );
    transport.expect_json(
        200,
        "OK",
        &json!({"code": 200, "error": false, "result": composite}),
    );
    assert_eq!(txn.commit().unwrap(), 2);

    assert_eq!(insert_job.result().unwrap()["_key"], "k1");
    assert_eq!(
        get_job.result().unwrap(),
        Some(json!({"_key": "k2", "balance": 7}))
    );

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].url.ends_with("/_api/transaction"));
    let body = sent[0].json_body();
    assert_eq!(body["collections"]["write"], json!(["foo"]));
    assert_eq!(body["collections"]["read"], json!(["bar"]));
    let action = body["action"].as_str().unwrap();
    assert!(action.starts_with("function ()"));
    assert!(action.contains(&insert_job.id().to_string()));
    assert!(action.contains(r#"db._collection("foo").insert({"_key":"k1"})"#));
    assert!(action.contains(r#"db._collection("bar").document("k2")"#));
}

#[test]
fn transactions_reject_requests_without_a_script_form() {
    let (_transport, db) = scripted_db();
    let txn = db.begin_transaction(TransactionOptions::default());

    // server admin calls have no collection hints and no JS rendition
    assert!(matches!(
        txn.version(false),
        Err(ArangoError::State { .. })
    ));
    assert_eq!(txn.queued_requests(), 0);
}

#[test]
fn cursors_fetch_follow_up_batches_lazily() {
    let (transport, db) = scripted_db();
    transport.expect_json(
        201,
        "Created",
        &json!({
            "result": [1, 2],
            "hasMore": true,
            "id": "c7",
            "count": 3,
            "code": 201,
            "error": false
        }),
    );
    transport.expect_json(
        200,
        "OK",
        &json!({"result": [3], "hasMore": false, "id": "c7"}),
    );

    let options = AqlQueryOptions {
        count: true,
        batch_size: Some(2),
        ..Default::default()
    };
    let cursor = db
        .aql()
        .execute("FOR x IN xs RETURN x", None, options)
        .unwrap()
        .value()
        .unwrap();
    assert_eq!(cursor.total_count(), Some(3));

    let values = cursor.collect::<arango::Result<Vec<_>>>().unwrap();
    assert_eq!(values, vec![json!(1), json!(2), json!(3)]);

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].json_body()["query"], "FOR x IN xs RETURN x");
    assert_eq!(sent[0].json_body()["batchSize"], 2);
    assert_eq!(sent[1].method, Method::Put);
    assert!(sent[1].url.ends_with("/_api/cursor/c7"));
    // the drained cursor is gone server-side; no close must be sent
}

#[test]
fn failed_renames_keep_the_wrapper_on_the_old_name() {
    let (transport, db) = scripted_db();
    let mut coll = db.collection("accounts");

    transport.expect_json(
        409,
        "Conflict",
        &json!({"error": true, "errorNum": 1207, "errorMessage": "duplicate name", "code": 409}),
    );
    assert!(coll.rename("taken").is_err());
    assert_eq!(coll.name(), "accounts");

    transport.expect_json(
        200,
        "OK",
        &json!({"id": "42", "name": "ledger", "status": 3, "type": 2, "code": 200}),
    );
    coll.rename("ledger").unwrap().value().unwrap();
    assert_eq!(coll.name(), "ledger");

    let sent = transport.sent();
    // the retry still addresses the old name
    assert!(sent[1].url.ends_with("/_api/collection/accounts/rename"));
}

#[test]
fn collection_introspection_wrappers_hit_their_endpoints() {
    let (transport, db) = scripted_db();
    let coll = db.collection("accounts");

    transport.expect_json(
        200,
        "OK",
        &json!({"figures": {"documentsSize": 1024, "indexes": {"count": 2}}, "code": 200}),
    );
    let stats = coll.statistics().unwrap().value().unwrap();
    assert_eq!(stats["documentsSize"], 1024);

    transport.expect_json(200, "OK", &json!({"revision": "_hV2oH9q", "code": 200}));
    assert_eq!(coll.revision().unwrap().value().unwrap(), "_hV2oH9q");

    transport.expect_json(200, "OK", &json!({"checksum": "27043112", "code": 200}));
    assert_eq!(coll.checksum(true, false).unwrap().value().unwrap(), "27043112");

    let sent = transport.sent();
    assert!(sent[0].url.ends_with("/_api/collection/accounts/figures"));
    assert!(sent[1].url.ends_with("/_api/collection/accounts/revision"));
    assert!(sent[2]
        .url
        .ends_with("/_api/collection/accounts/checksum?withRevisions=1&withData=0"));
}

#[test]
fn edge_replacement_validates_endpoints_and_uses_put() {
    let (transport, db) = scripted_db();
    let graph = db.graph("social");

    assert!(matches!(
        graph.replace_edge("knows", "k1", json!({"weight": 2})),
        Err(ArangoError::InvalidInput { .. })
    ));

    transport.expect_json(
        202,
        "Accepted",
        &json!({"edge": {"_key": "k1", "_rev": "_r2"}, "code": 202, "error": false}),
    );
    let edge = graph
        .replace_edge(
            "knows",
            "k1",
            json!({"_from": "people/a", "_to": "people/b", "weight": 2}),
        )
        .unwrap()
        .value()
        .unwrap();
    assert_eq!(edge["_key"], "k1");

    let sent = transport.sent();
    assert_eq!(sent[0].method, Method::Put);
    assert!(sent[0].url.ends_with("/_api/gharial/social/edge/knows/k1"));
}

#[test]
fn dump_batches_can_be_extended() {
    let (transport, db) = scripted_db();
    transport.expect(204, "No Content", &[], "");

    let extended = db
        .replication()
        .extend_dump_batch("75393", 300)
        .unwrap()
        .value()
        .unwrap();
    assert!(extended);

    let sent = transport.sent();
    assert_eq!(sent[0].method, Method::Put);
    assert!(sent[0].url.ends_with("/_api/replication/batch/75393"));
    assert_eq!(sent[0].json_body()["ttl"], 300);
}

#[test]
fn closing_a_live_cursor_respects_ignore_missing() {
    let (transport, db) = scripted_db();
    let open_cursor = |transport: &ScriptedTransport| {
        transport.expect_json(
            201,
            "Created",
            &json!({"result": [1], "hasMore": true, "id": "c9", "cached": false}),
        );
        db.aql()
            .execute("FOR x IN xs RETURN x", None, AqlQueryOptions::default())
            .unwrap()
            .value()
            .unwrap()
    };
    let gone = json!({"error": true, "errorNum": 1600, "errorMessage": "cursor not found", "code": 404});

    let mut cursor = open_cursor(&transport);
    assert!(!cursor.cached());
    transport.expect_json(404, "Not Found", &gone);
    assert!(cursor.close(false).is_err());

    let mut cursor = open_cursor(&transport);
    transport.expect_json(404, "Not Found", &gone);
    assert!(!cursor.close(true).unwrap());

    // closed either way; drop must not issue further requests
    drop(cursor);
    assert_eq!(transport.sent().len(), 4);
}

#[test]
fn round_robin_strategy_rotates_hosts() {
    let _ = env_logger::builder().is_test(true).try_init();
    let transport = Arc::new(ScriptedTransport::default());
    let db = ArangoClient::new("http://host-a:8529,http://host-b:8529")
        .unwrap()
        .with_host_strategy(HostStrategy::RoundRobin)
        .with_transport(Arc::clone(&transport) as Arc<dyn HttpTransport>)
        .db("test", Auth::None)
        .unwrap();

    for _ in 0..3 {
        transport.expect_json(200, "OK", &json!({"version": "3.11.4"}));
        db.version(false).unwrap().value().unwrap();
    }

    let hosts: Vec<_> = transport
        .sent()
        .iter()
        .map(|request| request.url.split("/_db/").next().unwrap().to_string())
        .collect();
    assert_eq!(
        hosts,
        vec![
            "http://host-a:8529",
            "http://host-b:8529",
            "http://host-a:8529"
        ]
    );
}
