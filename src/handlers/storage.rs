use crate::error::AppError;
use crate::middlewares::require_user_id;
use crate::models::*;
use crate::services::StorageService;
use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use futures_util::StreamExt;
use serde_json::json;

/// 读取 multipart 中名为 file 的字段，超过大小上限立即中止
async fn read_file_field(
    mut payload: Multipart,
    max_size: usize,
) -> Result<(String, Vec<u8>), AppError> {
    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::ValidationError(format!("Invalid multipart body: {e}")))?;
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string)
            .ok_or_else(|| AppError::ValidationError("Missing filename".to_string()))?;

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|e| AppError::ValidationError(format!("Upload interrupted: {e}")))?;
            if data.len() + chunk.len() > max_size {
                return Err(AppError::ValidationError(format!(
                    "File too large (max {max_size} bytes)"
                )));
            }
            data.extend_from_slice(&chunk);
        }
        return Ok((filename, data));
    }

    Err(AppError::ValidationError("Missing file field".to_string()))
}

#[utoipa::path(
    post,
    path = "/api/storage/upload",
    tag = "storage",
    request_body(content = String, content_type = "multipart/form-data", description = "file 字段"),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "上传成功", body = UploadResponse),
        (status = 400, description = "文件类型或大小不符合要求"),
        (status = 401, description = "未授权")
    )
)]
pub async fn upload(
    storage_service: web::Data<StorageService>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    let (filename, data) = match read_file_field(payload, storage_service.max_file_size()).await {
        Ok(file) => file,
        Err(e) => return Ok(e.error_response()),
    };

    match storage_service.save(&filename, &data).await {
        Ok(uploaded) => {
            log::info!("User {user_id} uploaded {}", uploaded.filename);
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": uploaded
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn storage_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/storage").route("/upload", web::post().to(upload)));
}
