use async_trait::async_trait;
use safetransfer_core::types::{DownloadInfo, FileId, FileInfo, UploadForm};
use safetransfer_core::SafeTransferResult;

/// The file API as the client pipelines use it.
///
/// Implementations perform no retries; failures come back as `Transport`
/// and the caller decides.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `POST /files/upload`. Never retried automatically.
    async fn upload(&self, form: UploadForm) -> SafeTransferResult<FileInfo>;

    /// `GET /files/my`
    async fn list_mine(&self) -> SafeTransferResult<Vec<FileInfo>>;

    /// `GET /files/{fileId}/download-info`
    async fn download_info(&self, file_id: &FileId) -> SafeTransferResult<DownloadInfo>;
}
