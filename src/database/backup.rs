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

use serde_json::{json, Map, Value};

use crate::database::Database;
use crate::error::{ArangoError, Result};
use crate::executor::ExecutionResult;
use crate::formatter;
use crate::request::{Method, Request};

/// Wrapper for hot backups (`/_admin/backup`). Enterprise-only server side;
/// the endpoints answer 404 elsewhere.
#[derive(Debug, Clone)]
pub struct Backup {
    db: Database,
}

impl Backup {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Take a consistent hot backup of the whole deployment.
    ///
    /// `timeout` is how long the server may wait for a global write lock;
    /// with `allow_inconsistent` it backs up anyway when the lock cannot be
    /// obtained in time.
    pub fn create(
        &self,
        label: Option<&str>,
        timeout: Option<f64>,
        allow_inconsistent: bool,
        force: bool,
    ) -> Result<ExecutionResult<Value>> {
        let mut data = Map::new();
        if let Some(label) = label {
            data.insert("label".into(), Value::String(label.into()));
        }
        if let Some(timeout) = timeout {
            data.insert("timeout".into(), json!(timeout));
        }
        if allow_inconsistent {
            data.insert("allowInconsistent".into(), Value::Bool(true));
        }
        if force {
            data.insert("force".into(), Value::Bool(true));
        }
        let request = Request::new(Method::Post, "/_admin/backup/create")
            .with_data(Value::Object(data));
        self.db.execute_with("backup.create", request, |resp| {
            Ok(formatter::format_backup(&resp.result_field()))
        })
    }

    /// All backups known to the deployment.
    pub fn list(&self) -> Result<ExecutionResult<Vec<Value>>> {
        let request = Request::new(Method::Post, "/_admin/backup/list");
        self.db.execute_with("backup.list", request, |resp| {
            backups_from_list(&resp.result_field())
        })
    }

    /// One backup's details.
    pub fn get(&self, backup_id: &str) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Post, "/_admin/backup/list")
            .with_data(json!({ "id": backup_id }));
        let backup_id = backup_id.to_owned();
        self.db.execute_with("backup.get", request, move |resp| {
            resp.result_field()
                .pointer(&format!("/list/{backup_id}"))
                .map(formatter::format_backup)
                .ok_or_else(|| {
                    ArangoError::deserialization(format!("backup {backup_id} not in listing"))
                })
        })
    }

    pub fn delete(&self, backup_id: &str) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Post, "/_admin/backup/delete")
            .with_data(json!({ "id": backup_id }));
        self.db.execute_with("backup.delete", request, |_| Ok(true))
    }

    /// Restore the deployment from a backup. The server restarts into the
    /// restored state.
    pub fn restore(&self, backup_id: &str) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Post, "/_admin/backup/restore")
            .with_data(json!({ "id": backup_id }));
        self.db.execute_with("backup.restore", request, |resp| {
            Ok(formatter::format_body(&resp.result_field()))
        })
    }

    /// Start shipping a backup to a remote repository. Returns the upload id
    /// to poll with [`Backup::upload_status`].
    pub fn upload(
        &self,
        backup_id: &str,
        repository: &str,
        config: Value,
    ) -> Result<ExecutionResult<String>> {
        let request = Request::new(Method::Post, "/_admin/backup/upload").with_data(json!({
            "id": backup_id,
            "remoteRepository": repository,
            "config": config,
        }));
        self.db.execute_with("backup.upload", request, |resp| {
            transfer_id(&resp.result_field(), "uploadId")
        })
    }

    pub fn upload_status(&self, upload_id: &str) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Post, "/_admin/backup/upload")
            .with_data(json!({ "uploadId": upload_id }));
        self.db.execute_with("backup.upload_status", request, |resp| {
            Ok(formatter::format_backup_transfer(&resp.result_field()))
        })
    }

    pub fn abort_upload(&self, upload_id: &str) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Post, "/_admin/backup/upload")
            .with_data(json!({ "uploadId": upload_id, "abort": true }));
        self.db
            .execute_with("backup.abort_upload", request, |_| Ok(true))
    }

    /// Start fetching a backup from a remote repository. Returns the
    /// download id to poll with [`Backup::download_status`].
    pub fn download(
        &self,
        backup_id: &str,
        repository: &str,
        config: Value,
    ) -> Result<ExecutionResult<String>> {
        let request = Request::new(Method::Post, "/_admin/backup/download").with_data(json!({
            "id": backup_id,
            "remoteRepository": repository,
            "config": config,
        }));
        self.db.execute_with("backup.download", request, |resp| {
            transfer_id(&resp.result_field(), "downloadId")
        })
    }

    pub fn download_status(&self, download_id: &str) -> Result<ExecutionResult<Value>> {
        let request = Request::new(Method::Post, "/_admin/backup/download")
            .with_data(json!({ "downloadId": download_id }));
        self.db
            .execute_with("backup.download_status", request, |resp| {
                Ok(formatter::format_backup_transfer(&resp.result_field()))
            })
    }

    pub fn abort_download(&self, download_id: &str) -> Result<ExecutionResult<bool>> {
        let request = Request::new(Method::Post, "/_admin/backup/download")
            .with_data(json!({ "downloadId": download_id, "abort": true }));
        self.db
            .execute_with("backup.abort_download", request, |_| Ok(true))
    }
}

/// The listing keys backups by id; fold the id into each entry.
fn backups_from_list(result: &Value) -> Result<Vec<Value>> {
    match result.get("list") {
        Some(Value::Object(list)) => Ok(list
            .iter()
            .map(|(id, body)| {
                let mut formatted = formatter::format_backup(body);
                if let Value::Object(map) = &mut formatted {
                    map.entry("backup_id")
                        .or_insert_with(|| Value::String(id.clone()));
                }
                formatted
            })
            .collect()),
        _ => Err(ArangoError::deserialization("backup listing carries no list")),
    }
}

fn transfer_id(result: &Value, field: &str) -> Result<String> {
    // older servers hand the id back as a number
    match result.get(field) {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(ArangoError::deserialization(format!(
            "transfer response carries no {field}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_folds_ids_into_entries() {
        let result = json!({
            "list": {
                "2024-01-01T00.00.00Z_abc": {
                    "datetime": "2024-01-01T00:00:00Z",
                    "sizeInBytes": 1024,
                    "nrFiles": 3,
                    "version": "3.11.0",
                    "available": true
                }
            }
        });
        let backups = backups_from_list(&result).unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0]["backup_id"], "2024-01-01T00.00.00Z_abc");
        assert_eq!(backups[0]["size_in_bytes"], 1024);
    }

    #[test]
    fn transfer_id_is_required() {
        assert_eq!(
            transfer_id(&json!({"uploadId": "42"}), "uploadId").unwrap(),
            "42"
        );
        assert!(transfer_id(&json!({}), "downloadId").is_err());
    }
}
