use crate::{config::StorageConfig, error::StorageError};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};
use tracing::debug;

pub const POSTS_BUCKET: &str = "posts";
pub const AVATARS_BUCKET: &str = "avatars";

/// Blob storage for item photos and avatars. `put` returns the public URL of the object.
pub trait ObjectStorage: Send + Sync {
    fn put(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<String, StorageError>;
    fn delete(&self, bucket: &str, path: &str) -> Result<(), StorageError>;
}

fn check_bucket(bucket: &str) -> Result<(), StorageError> {
    if bucket.is_empty()
        || !bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(StorageError::InvalidBucket(bucket.to_owned()));
    }
    Ok(())
}

/// Only plain relative paths are accepted, nothing that could step outside the bucket.
fn check_object_path(path: &str) -> Result<PathBuf, StorageError> {
    let candidate = Path::new(path);
    if path.is_empty()
        || !candidate
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
    {
        return Err(StorageError::InvalidPath(path.to_owned()));
    }
    Ok(candidate.to_path_buf())
}

/// Objects live at `{root}/{bucket}/{path}` and are served back under `public_url`.
pub struct FileSystemStorage {
    root: PathBuf,
    public_url: String,
}

impl FileSystemStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.root.to_owned(),
            public_url: config.public_url.trim_end_matches('/').to_owned(),
        }
    }

    fn object_location(&self, bucket: &str, path: &str) -> Result<PathBuf, StorageError> {
        check_bucket(bucket)?;
        Ok(self.root.join(bucket).join(check_object_path(path)?))
    }
}

impl ObjectStorage for FileSystemStorage {
    fn put(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let location = self.object_location(bucket, path)?;
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&location, bytes)?;
        debug!("Stored {} bytes at {}", bytes.len(), location.display());
        Ok(format!("{}/{}/{}", self.public_url, bucket, path))
    }

    fn delete(&self, bucket: &str, path: &str) -> Result<(), StorageError> {
        let location = self.object_location(bucket, path)?;
        fs::remove_file(&location)?;
        debug!("Removed {}", location.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(root: &Path) -> FileSystemStorage {
        FileSystemStorage::new(&StorageConfig {
            root: root.to_path_buf(),
            public_url: "http://localhost:8886/storage/".into(),
        })
    }

    #[test]
    fn put_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let url = storage.put(POSTS_BUCKET, "user/photo.jpg", b"jpeg").unwrap();
        assert_eq!(url, "http://localhost:8886/storage/posts/user/photo.jpg");
        assert_eq!(
            fs::read(dir.path().join("posts/user/photo.jpg")).unwrap(),
            b"jpeg"
        );
        storage.delete(POSTS_BUCKET, "user/photo.jpg").unwrap();
        assert!(!dir.path().join("posts/user/photo.jpg").exists());
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        assert!(matches!(
            storage.put(POSTS_BUCKET, "../outside.jpg", b"x"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            storage.put(POSTS_BUCKET, "/etc/passwd", b"x"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            storage.put("Posts", "a.jpg", b"x"),
            Err(StorageError::InvalidBucket(_))
        ));
    }

    #[test]
    fn deleting_missing_object_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(storage(dir.path()).delete(AVATARS_BUCKET, "gone.png").is_err());
    }
}
