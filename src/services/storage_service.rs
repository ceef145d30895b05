use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};
use crate::models::UploadResponse;
use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "mp4", "pdf"];

#[derive(Clone)]
pub struct StorageService {
    config: StorageConfig,
}

impl StorageService {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn max_file_size(&self) -> usize {
        self.config.max_file_size
    }

    /// 保存上传文件到 `<upload_dir>/<yyyymmdd>/<uuid>.<ext>`
    pub async fn save(&self, original_name: &str, data: &[u8]) -> AppResult<UploadResponse> {
        let ext = validate_extension(original_name)?;
        if data.is_empty() {
            return Err(AppError::ValidationError("Empty file".to_string()));
        }
        if data.len() > self.config.max_file_size {
            return Err(AppError::ValidationError(format!(
                "File too large (max {} bytes)",
                self.config.max_file_size
            )));
        }

        let date_dir = Utc::now().format("%Y%m%d").to_string();
        let filename = format!("{}.{ext}", Uuid::new_v4());

        let dir: PathBuf = Path::new(&self.config.upload_dir).join(&date_dir);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&filename), data).await?;

        let url = format!(
            "{}/{date_dir}/{filename}",
            self.config.public_base_url.trim_end_matches('/')
        );
        log::info!("Stored upload {original_name} as {date_dir}/{filename} ({} bytes)", data.len());

        Ok(UploadResponse {
            url,
            filename,
            size: data.len(),
        })
    }
}

/// 返回小写扩展名
pub fn validate_extension(filename: &str) -> AppResult<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| AppError::ValidationError("File has no extension".to_string()))?;

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(AppError::ValidationError(format!(
            "File type .{ext} is not allowed"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(dir: &Path, max: usize) -> StorageService {
        StorageService::new(StorageConfig {
            upload_dir: dir.to_string_lossy().to_string(),
            public_base_url: "/uploads/".to_string(),
            max_file_size: max,
        })
    }

    #[test]
    fn test_validate_extension() {
        assert_eq!(validate_extension("a.PNG").unwrap(), "png");
        assert_eq!(validate_extension("cover.final.jpeg").unwrap(), "jpeg");
        assert!(validate_extension("run.exe").is_err());
        assert!(validate_extension("noext").is_err());
    }

    #[tokio::test]
    async fn test_save_writes_file_under_date_dir() {
        let root = std::env::temp_dir().join(format!("aifans-upload-{}", Uuid::new_v4()));
        let svc = service(&root, 1024);

        let resp = svc.save("photo.png", b"\x89PNG data").await.unwrap();
        assert_eq!(resp.size, 9);
        assert!(resp.filename.ends_with(".png"));

        let date_dir = Utc::now().format("%Y%m%d").to_string();
        assert_eq!(resp.url, format!("/uploads/{date_dir}/{}", resp.filename));
        let stored = tokio::fs::read(root.join(&date_dir).join(&resp.filename))
            .await
            .unwrap();
        assert_eq!(stored, b"\x89PNG data");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_save_rejects_oversized() {
        let root = std::env::temp_dir().join(format!("aifans-upload-{}", Uuid::new_v4()));
        let svc = service(&root, 4);
        let err = svc.save("doc.pdf", b"12345").await;
        assert!(matches!(err, Err(AppError::ValidationError(_))));
    }
}
