//! In-process blob store

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use safetransfer_core::types::{DownloadInfo, FileId, FileInfo, UploadForm};
use safetransfer_core::{SafeTransferError, SafeTransferResult};
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    files: Vec<(FileInfo, DownloadInfo)>,
    uploads: usize,
    failing_reads: u32,
    reads: usize,
}

/// Keeps uploads in memory, in upload order.
///
/// Test hooks: `tamper` rewrites a stored payload, `fail_next_reads`
/// makes the next GETs fail with `Transport`.
#[derive(Default)]
pub struct MemoryBlobStore {
    inner: Mutex<Inner>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful uploads so far.
    pub fn upload_count(&self) -> usize {
        self.lock().uploads
    }

    /// Read requests (list and download-info), failed ones included.
    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    /// Store a file that was uploaded outside this session.
    pub fn insert(&self, info: FileInfo, download: DownloadInfo) {
        self.lock().files.push((info, download));
    }

    /// Modify a stored payload in place. Returns false if the id is unknown.
    pub fn tamper(&self, file_id: &FileId, f: impl FnOnce(&mut DownloadInfo)) -> bool {
        let mut inner = self.lock();
        match inner.files.iter_mut().find(|(info, _)| &info.file_id == file_id) {
            Some((_, download)) => {
                f(download);
                true
            }
            None => false,
        }
    }

    pub fn fail_next_reads(&self, count: u32) {
        self.lock().failing_reads = count;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin_read(&self, what: &str) -> SafeTransferResult<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.reads += 1;
        if inner.failing_reads > 0 {
            inner.failing_reads -= 1;
            return Err(SafeTransferError::Transport(format!(
                "{what}: connection reset by peer"
            )));
        }
        Ok(inner)
    }
}

#[async_trait]
impl crate::store::BlobStore for MemoryBlobStore {
    async fn upload(&self, form: UploadForm) -> SafeTransferResult<FileInfo> {
        let info = FileInfo {
            file_id: FileId(Uuid::new_v4().to_string()),
            ipfs_cid: None,
            original_file_hash: form.original_file_hash.clone(),
            file_name: Some(form.filename.clone()),
            file_type: Some(form.file_type.clone()),
        };
        let download = form.to_download_info();

        let mut inner = self.lock();
        inner.files.push((info.clone(), download));
        inner.uploads += 1;
        debug!(file_id = %info.file_id, "stored upload in memory");
        Ok(info)
    }

    async fn list_mine(&self) -> SafeTransferResult<Vec<FileInfo>> {
        let inner = self.begin_read("list files")?;
        Ok(inner.files.iter().map(|(info, _)| info.clone()).collect())
    }

    async fn download_info(&self, file_id: &FileId) -> SafeTransferResult<DownloadInfo> {
        let inner = self.begin_read("download info")?;
        inner
            .files
            .iter()
            .find(|(info, _)| &info.file_id == file_id)
            .map(|(_, download)| download.clone())
            .ok_or_else(|| {
                SafeTransferError::Transport(format!(
                    "download info failed (404 Not Found): file {file_id} not found"
                ))
            })
    }
}
