use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::model::{Entry, JobKind};
use crate::paths::{compose_folder_prefix, compose_object_path, display_name, is_folder_key, leaf_name};
use crate::store::ObjectStore;

/// One remote change, fully resolved to object keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Rename { source: String, target: String },
    CreateFolder { folder: String },
    Upload { local_path: PathBuf, object_name: String },
    Delete { object_name: String },
    Download { object_name: String, directory: PathBuf },
}

impl Mutation {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Rename { .. } => JobKind::Rename,
            Self::CreateFolder { .. } => JobKind::CreateFolder,
            Self::Upload { .. } => JobKind::Upload,
            Self::Delete { .. } => JobKind::Delete,
            Self::Download { .. } => JobKind::Download,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Self::Rename { source, .. } => source,
            Self::CreateFolder { folder } => folder,
            Self::Upload { object_name, .. }
            | Self::Delete { object_name }
            | Self::Download { object_name, .. } => object_name,
        }
    }

    pub fn success_message(&self) -> String {
        match self {
            Self::Rename { source, target } => format!("renamed {source} -> {target}"),
            Self::CreateFolder { folder } => format!("folder created: {folder}"),
            Self::Upload { object_name, .. } => format!("uploaded: {object_name}"),
            Self::Delete { object_name } => format!("deleted: {object_name}"),
            Self::Download {
                object_name,
                directory,
            } => format!("downloaded {object_name} into {}", directory.display()),
        }
    }
}

pub fn plan_rename(current_prefix: &str, entry: &Entry, new_name: &str) -> AppResult<Mutation> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(AppError::validation("rename", "new name is required"));
    }

    let target_leaf = if entry.is_folder() {
        compose_folder_prefix(new_name)
    } else {
        new_name.to_string()
    };
    if target_leaf.is_empty() {
        return Err(AppError::validation("rename", "new name is required"));
    }
    if !entry.is_folder() && is_folder_key(&target_leaf) {
        return Err(AppError::validation(
            "rename",
            "a file name cannot end with a separator",
        ));
    }

    let source = compose_object_path(current_prefix, &entry.name);
    let target = compose_object_path(current_prefix, &target_leaf);
    if source == target {
        return Err(AppError::validation(
            "rename",
            "source and target names are the same",
        ));
    }
    Ok(Mutation::Rename { source, target })
}

pub fn plan_create_folder(current_prefix: &str, name: &str) -> AppResult<Mutation> {
    let normalized = compose_folder_prefix(name.trim());
    if normalized.is_empty() {
        return Err(AppError::validation("create-folder", "folder name is required"));
    }
    Ok(Mutation::CreateFolder {
        folder: compose_object_path(current_prefix, &normalized),
    })
}

/// Uploads `local_path` into the current folder, under `name` when given
/// or under the local file name otherwise.
pub fn plan_upload(current_prefix: &str, local_path: &Path, name: Option<&str>) -> AppResult<Mutation> {
    let metadata = match fs::metadata(local_path) {
        Ok(metadata) => metadata,
        Err(_) => {
            return Err(AppError::validation(
                "upload",
                format!("no such local file: {}", local_path.display()),
            ));
        }
    };
    if metadata.is_dir() {
        return Err(AppError::validation("upload", "folders cannot be uploaded"));
    }

    let file_name = match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => local_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| AppError::validation("upload", "a file must be selected"))?,
    };
    if is_folder_key(&file_name) {
        return Err(AppError::validation(
            "upload",
            "object name cannot end with a separator",
        ));
    }

    Ok(Mutation::Upload {
        local_path: local_path.to_path_buf(),
        object_name: compose_object_path(current_prefix, &file_name),
    })
}

pub fn plan_delete(current_prefix: &str, entry: &Entry) -> Mutation {
    Mutation::Delete {
        object_name: compose_object_path(current_prefix, &entry.name),
    }
}

pub fn plan_download(entry: &Entry, download_dir: &Path) -> AppResult<Mutation> {
    if entry.is_folder() {
        return Err(AppError::validation(
            "download",
            "folders cannot be downloaded",
        ));
    }
    Ok(Mutation::Download {
        object_name: entry.id.clone(),
        directory: download_dir.to_path_buf(),
    })
}

/// `name` for the first attempt, then `stem_N.ext` for later ones.
fn download_candidate(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem}_{attempt}.{extension}"),
        _ => format!("{name}_{attempt}"),
    }
}

/// Writes `bytes` into `dir` under `name`, or under the first numbered
/// variant that does not exist. The file is created exclusively, so two
/// downloads racing for the same name never overwrite each other.
pub fn write_new_file(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let mut attempt = 0_u32;
    loop {
        let candidate = dir.join(download_candidate(name, attempt));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut file) => {
                file.write_all(bytes)?;
                return Ok(candidate);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(err) => return Err(err),
        }
    }
}

pub fn execute(store: &dyn ObjectStore, mutation: &Mutation) -> AppResult<()> {
    match mutation {
        Mutation::Rename { source, target } => store.rename(source, target)?,
        Mutation::CreateFolder { folder } => store.create_folder(folder)?,
        Mutation::Upload {
            local_path,
            object_name,
        } => store.upload(local_path, object_name)?,
        Mutation::Delete { object_name } => store.delete(object_name)?,
        Mutation::Download {
            object_name,
            directory,
        } => {
            info!(url = %store.download_url(object_name), "fetching download reference");
            let bytes = store.download(object_name)?;
            let written = write_new_file(directory, display_name(leaf_name(object_name)), &bytes)
                .map_err(|err| AppError::local_io("download", directory.clone(), err))?;
            info!(path = %written.display(), "download written");
        }
    }
    info!(kind = mutation.kind().label(), target = mutation.target(), "mutation applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use chrono::Utc;

    use super::{
        Mutation, execute, plan_create_folder, plan_delete, plan_download, plan_rename,
        plan_upload, write_new_file,
    };
    use crate::model::Entry;
    use crate::store::{MemoryStore, ObjectStore};

    fn entry(key: &str) -> Entry {
        Entry::from_key(key, 3, Utc::now())
    }

    fn temp_dir(name: &str) -> PathBuf {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("valid time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("bucketfm_ops_test_{timestamp}_{name}"));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn rename_with_empty_name_is_rejected() {
        let err = plan_rename("docs/", &entry("docs/a.txt"), "   ").expect_err("empty name");
        assert!(err.is_validation());
    }

    #[test]
    fn rename_composes_paths_in_current_folder() {
        let planned = plan_rename("docs/", &entry("docs/a.txt"), "b.txt").expect("plan");
        assert_eq!(
            planned,
            Mutation::Rename {
                source: "docs/a.txt".to_string(),
                target: "docs/b.txt".to_string(),
            }
        );
    }

    #[test]
    fn folder_rename_keeps_folder_shape() {
        let planned = plan_rename("", &entry("reports/"), "/archive/").expect("plan");
        assert_eq!(
            planned,
            Mutation::Rename {
                source: "reports/".to_string(),
                target: "archive/".to_string(),
            }
        );
    }

    #[test]
    fn rename_to_same_name_is_rejected() {
        let err = plan_rename("", &entry("a.txt"), "a.txt").expect_err("same");
        assert!(err.is_validation());
        let err = plan_rename("", &entry("a.txt"), "b/").expect_err("file as folder");
        assert!(err.is_validation());
    }

    #[test]
    fn create_folder_normalizes_name() {
        let planned = plan_create_folder("docs/", "/2024/").expect("plan");
        assert_eq!(
            planned,
            Mutation::CreateFolder {
                folder: "docs/2024/".to_string()
            }
        );
        assert!(plan_create_folder("", "/").expect_err("only separator").is_validation());
        assert!(plan_create_folder("", "  ").expect_err("blank").is_validation());
    }

    #[test]
    fn upload_requires_a_local_file() {
        let dir = temp_dir("upload_requires");
        let err = plan_upload("", &dir, None).expect_err("directory");
        assert!(err.is_validation());
        let err = plan_upload("", &dir.join("missing.bin"), None).expect_err("missing");
        assert!(err.is_validation());

        let file = dir.join("photo.png");
        fs::write(&file, b"png").expect("write file");
        let planned = plan_upload("media/", &file, None).expect("plan");
        assert_eq!(planned.target(), "media/photo.png");
        let renamed = plan_upload("media/", &file, Some("cover.png")).expect("plan");
        assert_eq!(renamed.target(), "media/cover.png");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn delete_targets_one_object_path() {
        assert_eq!(
            plan_delete("docs/", &entry("docs/2024/")),
            Mutation::Delete {
                object_name: "docs/2024/".to_string()
            }
        );
    }

    #[test]
    fn download_refuses_folders_and_avoids_overwrites() {
        let dir = temp_dir("download_paths");
        assert!(plan_download(&entry("docs/"), &dir).is_err());

        fs::write(dir.join("a.txt"), b"old").expect("write existing");
        let first = write_new_file(&dir, "a.txt", b"one").expect("first");
        let second = write_new_file(&dir, "a.txt", b"two").expect("second");
        assert_eq!(first, dir.join("a_1.txt"));
        assert_eq!(second, dir.join("a_2.txt"));
        assert_eq!(fs::read(dir.join("a.txt")).expect("read"), b"old");
        assert_eq!(write_new_file(&dir, "README", b"x").expect("plain"), dir.join("README"));
        assert_eq!(write_new_file(&dir, "README", b"y").expect("plain"), dir.join("README_1"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn queued_downloads_of_one_object_keep_both_copies() {
        let dir = temp_dir("download_twice");
        let store = MemoryStore::new("test");
        store.put_bytes("docs/a.txt", b"hello".to_vec());

        let first = plan_download(&entry("docs/a.txt"), &dir).expect("plan");
        let second = plan_download(&entry("docs/a.txt"), &dir).expect("plan");
        execute(&store, &first).expect("first download");
        execute(&store, &second).expect("second download");

        assert_eq!(fs::read(dir.join("a.txt")).expect("read"), b"hello");
        assert_eq!(fs::read(dir.join("a_1.txt")).expect("read"), b"hello");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn execute_round_trip_against_memory_store() {
        let dir = temp_dir("execute_memory");
        let store = MemoryStore::new("test");
        let local = dir.join("notes.txt");
        fs::write(&local, b"hello").expect("write local");

        execute(&store, &plan_create_folder("", "docs").expect("plan")).expect("mkdir");
        execute(&store, &plan_upload("docs/", &local, None).expect("plan")).expect("upload");
        assert!(store.contains("docs/notes.txt"));

        let listed = entry("docs/notes.txt");
        execute(&store, &plan_rename("docs/", &listed, "todo.txt").expect("plan")).expect("rename");
        assert!(store.contains("docs/todo.txt"));

        let download = plan_download(&entry("docs/todo.txt"), &dir).expect("plan");
        execute(&store, &download).expect("download");
        assert_eq!(fs::read(dir.join("todo.txt")).expect("read"), b"hello");

        execute(&store, &plan_delete("", &entry("docs/"))).expect("delete");
        assert!(store.list("").expect("list").is_empty());

        let _ = fs::remove_dir_all(dir);
    }
}
