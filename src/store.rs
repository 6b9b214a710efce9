use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Url;
use reqwest::blocking::{Client, Response, multipart};
use tracing::debug;

use crate::errors::{AppError, AppResult, fallback_message};
use crate::listing::{ErrorBody, ListResponse, RawObject, entries_from_objects};
use crate::paths::is_folder_key;
use crate::tree::collect_subtree;

/// Operations the browser needs from a bucket. Keys are full object paths,
/// folder keys end with a separator.
pub trait ObjectStore: Send + Sync {
    fn store_name(&self) -> &'static str;
    fn bucket(&self) -> &str;
    fn list(&self, prefix: &str) -> AppResult<Vec<RawObject>>;
    fn upload(&self, local_path: &Path, object_name: &str) -> AppResult<()>;
    fn download(&self, object_name: &str) -> AppResult<Vec<u8>>;
    fn download_url(&self, object_name: &str) -> String;
    fn delete(&self, object_name: &str) -> AppResult<()>;
    fn rename(&self, source_name: &str, target_name: &str) -> AppResult<()>;
    fn create_folder(&self, folder_name: &str) -> AppResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSpec {
    Gateway {
        base_url: String,
        bucket: String,
        timeout: Duration,
    },
    Memory {
        bucket: String,
        seed_demo: bool,
    },
}

pub fn store_from_spec(spec: &StoreSpec) -> AppResult<Arc<dyn ObjectStore>> {
    match spec {
        StoreSpec::Gateway {
            base_url,
            bucket,
            timeout,
        } => Ok(Arc::new(GatewayStore::new(base_url, bucket, *timeout)?)),
        StoreSpec::Memory { bucket, seed_demo } => {
            let store = MemoryStore::new(bucket.clone());
            if *seed_demo {
                store.seed_demo();
            }
            Ok(Arc::new(store))
        }
    }
}

pub struct GatewayStore {
    client: Client,
    base_url: Url,
    bucket: String,
}

impl GatewayStore {
    pub fn new(base_url: &str, bucket: &str, timeout: Duration) -> AppResult<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|err| AppError::validation("connect", format!("bad gateway url: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::validation(
                "connect",
                format!("gateway url must be http or https: {base_url}"),
            ));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::network("connect", err))?;
        Ok(Self {
            client,
            base_url: parsed,
            bucket: bucket.to_string(),
        })
    }

    fn endpoint(&self, name: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name);
        }
        url
    }

    fn send(
        &self,
        operation: &'static str,
        request: reqwest::blocking::RequestBuilder,
    ) -> AppResult<Response> {
        let response = request
            .send()
            .map_err(|err| AppError::network(operation, err))?;
        let status = response.status();
        debug!(operation, status = status.as_u16(), "gateway responded");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(remote_failure(operation, status.as_u16(), &body))
    }
}

/// Builds the error for a non-success gateway response from its body.
pub fn remote_failure(operation: &'static str, status: u16, body: &str) -> AppError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|decoded| decoded.error)
        .filter(|message| !message.trim().is_empty());

    match message {
        Some(message) => AppError::remote(operation, status, message),
        None if operation == "create-folder" && matches!(status, 404 | 405 | 501) => {
            AppError::unsupported(operation, "gateway has no folder endpoint")
        }
        None => AppError::remote(operation, status, fallback_message(operation)),
    }
}

impl ObjectStore for GatewayStore {
    fn store_name(&self) -> &'static str {
        "gateway"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list(&self, prefix: &str) -> AppResult<Vec<RawObject>> {
        debug!(prefix, "listing");
        let request = self
            .client
            .get(self.endpoint("list"))
            .query(&[("bucket", self.bucket.as_str()), ("prefix", prefix)]);
        let response = self.send("list", request)?;
        let bytes = response
            .bytes()
            .map_err(|err| AppError::network("list", err))?;
        let decoded: ListResponse = serde_json::from_slice(&bytes).map_err(|source| {
            AppError::Decode {
                operation: "list",
                source,
            }
        })?;
        Ok(decoded.files)
    }

    fn upload(&self, local_path: &Path, object_name: &str) -> AppResult<()> {
        debug!(object_name, path = %local_path.display(), "uploading");
        let form = multipart::Form::new()
            .text("bucket", self.bucket.clone())
            .text("object_name", object_name.to_string())
            .file("file", local_path)
            .map_err(|err| AppError::local_io("upload", local_path, err))?;
        let request = self.client.post(self.endpoint("upload")).multipart(form);
        self.send("upload", request)?;
        Ok(())
    }

    fn download(&self, object_name: &str) -> AppResult<Vec<u8>> {
        let url = self.download_url(object_name);
        debug!(%url, "downloading");
        let response = self.send("download", self.client.get(url.as_str()))?;
        let bytes = response
            .bytes()
            .map_err(|err| AppError::network("download", err))?;
        Ok(bytes.to_vec())
    }

    fn download_url(&self, object_name: &str) -> String {
        let mut url = self.endpoint("download");
        url.query_pairs_mut()
            .append_pair("bucket", &self.bucket)
            .append_pair("object_name", object_name);
        url.to_string()
    }

    fn delete(&self, object_name: &str) -> AppResult<()> {
        debug!(object_name, "deleting");
        let request = self.client.delete(self.endpoint("delete")).query(&[
            ("bucket", self.bucket.as_str()),
            ("object_name", object_name),
        ]);
        self.send("delete", request)?;
        Ok(())
    }

    fn rename(&self, source_name: &str, target_name: &str) -> AppResult<()> {
        debug!(source_name, target_name, "renaming");
        let request = self.client.post(self.endpoint("rename")).query(&[
            ("bucket", self.bucket.as_str()),
            ("source_name", source_name),
            ("target_name", target_name),
        ]);
        self.send("rename", request)?;
        Ok(())
    }

    fn create_folder(&self, folder_name: &str) -> AppResult<()> {
        debug!(folder_name, "creating folder");
        let request = self.client.post(self.endpoint("create-folder")).query(&[
            ("bucket", self.bucket.as_str()),
            ("folder_name", folder_name),
        ]);
        self.send("create-folder", request)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MemoryObject {
    bytes: Vec<u8>,
    modified_at: DateTime<Utc>,
}

/// In-process bucket. Listings are recursive under the prefix and deletes
/// take the whole subtree of the target.
pub struct MemoryStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, MemoryObject>>,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn put_bytes(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.objects().insert(
            key.to_string(),
            MemoryObject {
                bytes: bytes.into(),
                modified_at: Utc::now(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }

    fn seed_demo(&self) {
        self.put_bytes("docs/", Vec::new());
        self.put_bytes("docs/readme.pdf", b"%PDF-1.4 demo".to_vec());
        self.put_bytes("docs/2024/q1-report.docx", b"quarterly".to_vec());
        self.put_bytes("media/intro.mp4", vec![0_u8; 2048]);
        self.put_bytes("media/theme.mp3", vec![0_u8; 512]);
        self.put_bytes("img.png", vec![0_u8; 900]);
        self.put_bytes("notes.txt", b"remember the milk".to_vec());
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<String, MemoryObject>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn has_prefix(objects: &BTreeMap<String, MemoryObject>, prefix: &str) -> bool {
        objects.keys().any(|key| key.starts_with(prefix))
    }
}

impl ObjectStore for MemoryStore {
    fn store_name(&self) -> &'static str {
        "memory"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list(&self, prefix: &str) -> AppResult<Vec<RawObject>> {
        let objects = self.objects();
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| RawObject {
                name: key.clone(),
                size: Some(object.bytes.len() as u64),
                last_modified: Some(object.modified_at.to_rfc3339()),
            })
            .collect())
    }

    fn upload(&self, local_path: &Path, object_name: &str) -> AppResult<()> {
        if object_name.is_empty() || is_folder_key(object_name) {
            return Err(AppError::validation(
                "upload",
                format!("object name must name a file: '{object_name}'"),
            ));
        }
        let bytes =
            fs::read(local_path).map_err(|err| AppError::local_io("upload", local_path, err))?;
        self.put_bytes(object_name, bytes);
        Ok(())
    }

    fn download(&self, object_name: &str) -> AppResult<Vec<u8>> {
        self.objects()
            .get(object_name)
            .map(|object| object.bytes.clone())
            .ok_or_else(|| AppError::not_found("download", object_name))
    }

    fn download_url(&self, object_name: &str) -> String {
        format!("memory://{}/{object_name}", self.bucket)
    }

    fn delete(&self, object_name: &str) -> AppResult<()> {
        let mut objects = self.objects();
        let exists = objects.contains_key(object_name)
            || (is_folder_key(object_name) && Self::has_prefix(&objects, object_name));
        if !exists {
            return Err(AppError::not_found("delete", object_name));
        }

        let raw: Vec<RawObject> = objects
            .keys()
            .map(|key| RawObject {
                name: key.clone(),
                size: None,
                last_modified: None,
            })
            .collect();
        let listing = entries_from_objects("", &raw, Utc::now());
        let doomed = collect_subtree(&listing, object_name);
        objects.retain(|key, _| !doomed.contains(key));
        debug!(object_name, removed = doomed.len(), "memory delete");
        Ok(())
    }

    fn rename(&self, source_name: &str, target_name: &str) -> AppResult<()> {
        if source_name == target_name {
            return Err(AppError::validation(
                "rename",
                "source and target names are the same",
            ));
        }

        let mut objects = self.objects();
        let moved: Vec<String> = if is_folder_key(source_name) {
            objects
                .keys()
                .filter(|key| key.starts_with(source_name))
                .cloned()
                .collect()
        } else if objects.contains_key(source_name) {
            vec![source_name.to_string()]
        } else {
            Vec::new()
        };
        if moved.is_empty() {
            return Err(AppError::not_found("rename", source_name));
        }
        if objects.contains_key(target_name)
            || (is_folder_key(target_name) && Self::has_prefix(&objects, target_name))
        {
            return Err(AppError::conflict(
                "rename",
                target_name,
                "target already exists",
            ));
        }

        for key in moved {
            if let Some(mut object) = objects.remove(&key) {
                object.modified_at = Utc::now();
                let renamed = format!("{target_name}{}", &key[source_name.len()..]);
                objects.insert(renamed, object);
            }
        }
        Ok(())
    }

    fn create_folder(&self, folder_name: &str) -> AppResult<()> {
        if !is_folder_key(folder_name) {
            return Err(AppError::validation(
                "create-folder",
                format!("folder name must end with a separator: '{folder_name}'"),
            ));
        }
        let mut objects = self.objects();
        if objects.contains_key(folder_name) {
            return Err(AppError::conflict(
                "create-folder",
                folder_name,
                "folder already exists",
            ));
        }
        objects.insert(
            folder_name.to_string(),
            MemoryObject {
                bytes: Vec::new(),
                modified_at: Utc::now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    use super::{GatewayStore, MemoryStore, ObjectStore, remote_failure};
    use crate::errors::AppError;

    fn memory_with(keys: &[&str]) -> MemoryStore {
        let store = MemoryStore::new("test");
        for key in keys {
            store.put_bytes(key, b"x".to_vec());
        }
        store
    }

    /// Serves exactly one canned HTTP response on a local port.
    fn one_shot_server(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let addr = listener.local_addr().expect("stub addr");
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buffer = [0_u8; 4096];
                let mut request = Vec::new();
                while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                    match stream.read(&mut buffer) {
                        Ok(0) | Err(_) => break,
                        Ok(read) => request.extend_from_slice(&buffer[..read]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn remote_failure_prefers_gateway_message() {
        let err = remote_failure("list", 500, r#"{"error":"bucket not found"}"#);
        assert_eq!(err.user_message(), "bucket not found");
    }

    #[test]
    fn remote_failure_falls_back_without_error_field() {
        let err = remote_failure("delete", 500, "<html>boom</html>");
        assert_eq!(err.user_message(), "Delete failed");
        let err = remote_failure("rename", 400, r#"{"message":"nope"}"#);
        assert_eq!(err.user_message(), "Rename failed");
    }

    #[test]
    fn missing_folder_endpoint_is_unsupported() {
        let err = remote_failure("create-folder", 404, "<h1>Not Found</h1>");
        assert!(matches!(err, AppError::Unsupported { .. }), "got {err:?}");
        let err = remote_failure("create-folder", 500, r#"{"error":"disk full"}"#);
        assert!(matches!(err, AppError::Remote { .. }), "got {err:?}");
    }

    #[test]
    fn gateway_list_surfaces_error_body() {
        let base = one_shot_server("500 Internal Server Error", r#"{"error":"bucket not found"}"#);
        let store = GatewayStore::new(&base, "test", Duration::from_secs(5)).expect("store");
        let err = store.list("").expect_err("list must fail");
        assert!(matches!(err, AppError::Remote { status: 500, .. }), "got {err:?}");
        assert_eq!(err.user_message(), "bucket not found");
    }

    #[test]
    fn gateway_list_decodes_files() {
        let base = one_shot_server(
            "200 OK",
            r#"{"bucket":"test","prefix":"","files":[{"name":"img.png","size":900,"last_modified":"2024-05-01T10:00:00+00:00"}]}"#,
        );
        let store = GatewayStore::new(&base, "test", Duration::from_secs(5)).expect("store");
        let files = store.list("").expect("list ok");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "img.png");
        assert_eq!(files[0].size, Some(900));
    }

    #[test]
    fn gateway_list_without_files_is_a_decode_error() {
        let base = one_shot_server("200 OK", r#"{"message":"maintenance"}"#);
        let store = GatewayStore::new(&base, "test", Duration::from_secs(5)).expect("store");
        let err = store.list("").expect_err("body without files must fail");
        assert!(
            matches!(err, AppError::Decode { operation: "list", .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn gateway_rejects_non_http_url() {
        assert!(GatewayStore::new("ftp://host", "test", Duration::from_secs(1)).is_err());
        assert!(GatewayStore::new("not a url", "test", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn download_url_carries_bucket_and_key() {
        let store =
            GatewayStore::new("http://127.0.0.1:5000", "test", Duration::from_secs(1)).expect("store");
        let url = store.download_url("docs/a b.pdf");
        assert!(url.starts_with("http://127.0.0.1:5000/download?"), "{url}");
        assert!(url.contains("bucket=test"), "{url}");
        assert!(url.contains("object_name=docs%2Fa+b.pdf"), "{url}");
    }

    #[test]
    fn memory_list_is_prefix_filtered() {
        let store = memory_with(&["docs/", "docs/a.txt", "docsx/b.txt", "img.png"]);
        let names: Vec<_> = store
            .list("docs/")
            .expect("list")
            .into_iter()
            .map(|object| object.name)
            .collect();
        assert_eq!(names, vec!["docs/", "docs/a.txt"]);
    }

    #[test]
    fn memory_delete_takes_whole_subtree() {
        let store = memory_with(&[
            "docs/",
            "docs/a.txt",
            "docs/2024/q1.pdf",
            "docsx/b.txt",
            "img.png",
        ]);
        store.delete("docs/").expect("delete folder");
        assert_eq!(store.keys(), vec!["docsx/b.txt", "img.png"]);
    }

    #[test]
    fn memory_delete_missing_key_fails() {
        let store = memory_with(&["img.png"]);
        let err = store.delete("ghost.txt").expect_err("missing");
        assert!(matches!(err, AppError::NotFound { .. }));
        assert!(store.contains("img.png"));
    }

    #[test]
    fn memory_rename_moves_folder_contents() {
        let store = memory_with(&["docs/", "docs/a.txt", "img.png"]);
        store.rename("docs/", "papers/").expect("rename folder");
        assert_eq!(store.keys(), vec!["img.png", "papers/", "papers/a.txt"]);
    }

    #[test]
    fn memory_rename_refuses_existing_target() {
        let store = memory_with(&["a.txt", "b.txt"]);
        let err = store.rename("a.txt", "b.txt").expect_err("conflict");
        assert!(matches!(err, AppError::Conflict { .. }));
        let err = store.rename("a.txt", "a.txt").expect_err("same name");
        assert!(err.is_validation());
    }

    #[test]
    fn memory_create_folder_once() {
        let store = MemoryStore::new("test");
        store.create_folder("reports/").expect("create");
        assert!(store.contains("reports/"));
        let err = store.create_folder("reports/").expect_err("duplicate");
        assert!(matches!(err, AppError::Conflict { .. }));
    }
}
