use crate::models::*;
use crate::services::AnnouncementService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/announcements",
    tag = "announcement",
    responses(
        (status = 200, description = "当前公告", body = [AnnouncementResponse])
    )
)]
pub async fn list_announcements(
    announcement_service: web::Data<AnnouncementService>,
) -> Result<HttpResponse> {
    match announcement_service.list_active().await {
        Ok(items) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": items
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn announcement_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/announcements", web::get().to(list_announcements));
}
