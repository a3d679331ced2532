//! Blob-style file storage for product images and contracts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::FunctionsError;
use crate::models::{FileInfo, UploadResponse};

/// The two kinds of file the storefront keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Image,
    Contract,
}

impl FileKind {
    /// Storage container holding files of this kind.
    pub fn container(&self) -> &'static str {
        match self {
            FileKind::Image => "product-images",
            FileKind::Contract => "contracts",
        }
    }

    /// Path segment used in URLs (`images` / `contracts`).
    pub fn segment(&self) -> &'static str {
        match self {
            FileKind::Image => "images",
            FileKind::Contract => "contracts",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "images" | "image" => Some(FileKind::Image),
            "contracts" | "contract" => Some(FileKind::Contract),
            _ => None,
        }
    }
}

/// Rejects names that could escape their container.
pub fn validate_file_name(name: &str) -> Result<(), FunctionsError> {
    let name = name.trim();
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.contains('\0')
    {
        return Err(FunctionsError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// Generates `image_<uuid>.<ext>`, keeping the uploaded extension when it is sane.
pub fn image_file_name(original: Option<&str>) -> String {
    let ext = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string());
    format!("image_{}.{ext}", Uuid::new_v4())
}

/// Content type served for a stored file, by extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}

/// Metadata of a stored file, before a public URL is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Storage for named files grouped in containers.
///
/// Callers validate names with [`validate_file_name`] first.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Writes `data`, replacing any file with the same name.
    async fn put(&self, container: &str, name: &str, data: Bytes) -> Result<StoredFile, FunctionsError>;

    /// Files in `container`, newest first.
    async fn list(&self, container: &str) -> Result<Vec<StoredFile>, FunctionsError>;

    async fn get(&self, container: &str, name: &str) -> Result<Option<Bytes>, FunctionsError>;

    /// Returns whether a file was deleted.
    async fn delete(&self, container: &str, name: &str) -> Result<bool, FunctionsError>;
}

fn newest_first(files: &mut [StoredFile]) {
    files.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Files kept in memory; used by tests and when no storage root is configured.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileStore {
    files: Arc<RwLock<HashMap<(String, String), (Bytes, DateTime<Utc>)>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn put(&self, container: &str, name: &str, data: Bytes) -> Result<StoredFile, FunctionsError> {
        let now = Utc::now();
        let size = data.len() as u64;
        self.files
            .write()
            .await
            .insert((container.to_string(), name.to_string()), (data, now));
        Ok(StoredFile {
            name: name.to_string(),
            size,
            last_modified: now,
        })
    }

    async fn list(&self, container: &str) -> Result<Vec<StoredFile>, FunctionsError> {
        let files = self.files.read().await;
        let mut listed: Vec<StoredFile> = files
            .iter()
            .filter(|((c, _), _)| c == container)
            .map(|((_, name), (data, modified))| StoredFile {
                name: name.clone(),
                size: data.len() as u64,
                last_modified: *modified,
            })
            .collect();
        newest_first(&mut listed);
        Ok(listed)
    }

    async fn get(&self, container: &str, name: &str) -> Result<Option<Bytes>, FunctionsError> {
        let files = self.files.read().await;
        Ok(files
            .get(&(container.to_string(), name.to_string()))
            .map(|(data, _)| data.clone()))
    }

    async fn delete(&self, container: &str, name: &str) -> Result<bool, FunctionsError> {
        let mut files = self.files.write().await;
        Ok(files
            .remove(&(container.to_string(), name.to_string()))
            .is_some())
    }
}

/// Files on the local disk, one directory per container under `root`.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, container: &str, name: &str) -> PathBuf {
        self.root.join(container).join(name)
    }

    async fn describe(path: &Path, name: &str) -> Result<StoredFile, FunctionsError> {
        let metadata = tokio::fs::metadata(path).await?;
        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(StoredFile {
            name: name.to_string(),
            size: metadata.len(),
            last_modified,
        })
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, container: &str, name: &str, data: Bytes) -> Result<StoredFile, FunctionsError> {
        tokio::fs::create_dir_all(self.root.join(container)).await?;
        let path = self.path(container, name);
        tokio::fs::write(&path, &data).await?;
        Self::describe(&path, name).await
    }

    async fn list(&self, container: &str) -> Result<Vec<StoredFile>, FunctionsError> {
        let dir = self.root.join(container);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            files.push(Self::describe(&entry.path(), &name).await?);
        }
        newest_first(&mut files);
        Ok(files)
    }

    async fn get(&self, container: &str, name: &str) -> Result<Option<Bytes>, FunctionsError> {
        match tokio::fs::read(self.path(container, name)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, container: &str, name: &str) -> Result<bool, FunctionsError> {
        match tokio::fs::remove_file(self.path(container, name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Upload, listing and download of product images and contracts.
#[derive(Clone)]
pub struct FileManagement {
    files: Arc<dyn FileStore>,
    public_base_url: String,
}

impl FileManagement {
    pub fn new(files: Arc<dyn FileStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            files,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Public URL a stored file is downloadable from. The name is
    /// percent-encoded as a single path segment.
    pub fn file_url(&self, kind: FileKind, name: &str) -> String {
        format!(
            "{}/api/files/{}/{}",
            self.public_base_url,
            kind.segment(),
            urlencoding::encode(name)
        )
    }

    /// Stores a product image under a generated `image_<uuid>` name.
    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload_image(
        &self,
        original_name: Option<&str>,
        data: Bytes,
    ) -> Result<UploadResponse, FunctionsError> {
        let name = image_file_name(original_name);
        self.upload(FileKind::Image, &name, data).await
    }

    /// Stores a contract under its own file name.
    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload_contract(&self, name: &str, data: Bytes) -> Result<UploadResponse, FunctionsError> {
        self.upload(FileKind::Contract, name.trim(), data).await
    }

    async fn upload(&self, kind: FileKind, name: &str, data: Bytes) -> Result<UploadResponse, FunctionsError> {
        validate_file_name(name)?;
        let stored = self.files.put(kind.container(), name, data).await?;
        metrics::counter!("files_uploaded_total", "kind" => kind.segment()).increment(1);
        tracing::info!(container = kind.container(), file = %stored.name, size = stored.size, "file uploaded");
        Ok(UploadResponse {
            file_url: self.file_url(kind, &stored.name),
            file_name: stored.name,
        })
    }

    pub async fn list(&self, kind: FileKind) -> Result<Vec<FileInfo>, FunctionsError> {
        let files = self.files.list(kind.container()).await?;
        Ok(files
            .into_iter()
            .map(|f| FileInfo {
                url: self.file_url(kind, &f.name),
                name: f.name,
                size: f.size,
                last_modified: f.last_modified,
            })
            .collect())
    }

    pub async fn download(&self, kind: FileKind, name: &str) -> Result<Bytes, FunctionsError> {
        validate_file_name(name)?;
        self.files
            .get(kind.container(), name)
            .await?
            .ok_or_else(|| FunctionsError::FileNotFound(name.to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, kind: FileKind, name: &str) -> Result<bool, FunctionsError> {
        validate_file_name(name)?;
        let deleted = self.files.delete(kind.container(), name).await?;
        if deleted {
            tracing::info!(container = kind.container(), file = name, "file deleted");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> FileManagement {
        FileManagement::new(Arc::new(InMemoryFileStore::new()), "http://files.local/")
    }

    #[test]
    fn traversal_names_are_rejected() {
        for bad in ["../etc/passwd", "a/b.pdf", "a\\b.pdf", "..", "", "  "] {
            assert!(validate_file_name(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(validate_file_name("contract-2024.pdf").is_ok());
    }

    #[test]
    fn image_names_keep_a_sane_extension() {
        let png = image_file_name(Some("Photo.PNG"));
        assert!(png.starts_with("image_") && png.ends_with(".png"));
        assert!(image_file_name(None).ends_with(".jpg"));
        assert!(image_file_name(Some("weird.ex/t")).ends_with(".jpg"));
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("terms.pdf"), "application/pdf");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }

    #[tokio::test]
    async fn upload_list_download_delete() {
        let files = manager();
        let uploaded = files
            .upload_image(Some("lamp.png"), Bytes::from_static(b"png-bytes"))
            .await
            .unwrap();
        assert_eq!(
            uploaded.file_url,
            format!("http://files.local/api/files/images/{}", uploaded.file_name)
        );

        let listed = files.list(FileKind::Image).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size, 9);
        assert!(files.list(FileKind::Contract).await.unwrap().is_empty());

        let data = files.download(FileKind::Image, &uploaded.file_name).await.unwrap();
        assert_eq!(&data[..], b"png-bytes");

        assert!(files.delete(FileKind::Image, &uploaded.file_name).await.unwrap());
        assert!(!files.delete(FileKind::Image, &uploaded.file_name).await.unwrap());
        assert!(matches!(
            files.download(FileKind::Image, &uploaded.file_name).await,
            Err(FunctionsError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn contracts_keep_their_name() {
        let files = manager();
        let uploaded = files
            .upload_contract("supplier.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        assert_eq!(uploaded.file_name, "supplier.pdf");
        assert_eq!(uploaded.file_url, "http://files.local/api/files/contracts/supplier.pdf");
        assert!(matches!(
            files.upload_contract("../escape.pdf", Bytes::new()).await,
            Err(FunctionsError::InvalidFileName(_))
        ));
    }

    #[tokio::test]
    async fn contract_urls_are_percent_encoded() {
        let files = manager();
        let uploaded = files
            .upload_contract("Q1 terms #2?.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        assert_eq!(uploaded.file_name, "Q1 terms #2?.pdf");
        assert_eq!(
            uploaded.file_url,
            "http://files.local/api/files/contracts/Q1%20terms%20%232%3F.pdf"
        );
        let listed = files.list(FileKind::Contract).await.unwrap();
        assert_eq!(listed[0].url, uploaded.file_url);
    }

    #[tokio::test]
    async fn local_store_round_trip() {
        let root = std::env::temp_dir().join(format!("storefront-files-{}", Uuid::new_v4()));
        let store = LocalFileStore::new(&root);

        assert!(store.list("contracts").await.unwrap().is_empty());
        let stored = store
            .put("contracts", "a.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(stored.size, 5);
        assert_eq!(store.list("contracts").await.unwrap().len(), 1);
        assert_eq!(
            store.get("contracts", "a.txt").await.unwrap().as_deref(),
            Some(&b"hello"[..])
        );
        assert!(store.delete("contracts", "a.txt").await.unwrap());
        assert!(store.get("contracts", "a.txt").await.unwrap().is_none());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
