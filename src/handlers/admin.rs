use crate::error::AppResult;
use crate::middlewares::require_user_id;
use crate::models::*;
use crate::services::{AnnouncementService, ContentService, PaymentService, UserService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

/// 校验登录用户为管理员并返回其 ID
async fn require_admin(req: &HttpRequest, user_service: &UserService) -> AppResult<i64> {
    let user_id = require_user_id(req)?;
    user_service.require_admin(user_id).await?;
    Ok(user_id)
}

macro_rules! admin_guard {
    ($req:expr, $user_service:expr) => {
        match require_admin(&$req, &$user_service).await {
            Ok(id) => id,
            Err(e) => return Ok(e.error_response()),
        }
    };
}

#[utoipa::path(
    get,
    path = "/api/admin/announcements",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "全部公告", body = [AnnouncementResponse]),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn list_announcements(
    user_service: web::Data<UserService>,
    announcement_service: web::Data<AnnouncementService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    admin_guard!(req, user_service);

    match announcement_service.list_all().await {
        Ok(items) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": items
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/announcements",
    tag = "admin",
    request_body = CreateAnnouncementRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建成功", body = AnnouncementResponse),
        (status = 400, description = "请求参数错误"),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn create_announcement(
    user_service: web::Data<UserService>,
    announcement_service: web::Data<AnnouncementService>,
    req: HttpRequest,
    request: web::Json<CreateAnnouncementRequest>,
) -> Result<HttpResponse> {
    let admin_id = admin_guard!(req, user_service);

    match announcement_service
        .create(admin_id, request.into_inner())
        .await
    {
        Ok(item) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": item
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/announcements/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "公告ID")
    ),
    request_body = UpdateAnnouncementRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新成功", body = AnnouncementResponse),
        (status = 404, description = "公告不存在")
    )
)]
pub async fn update_announcement(
    user_service: web::Data<UserService>,
    announcement_service: web::Data<AnnouncementService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateAnnouncementRequest>,
) -> Result<HttpResponse> {
    admin_guard!(req, user_service);

    match announcement_service
        .update(path.into_inner(), request.into_inner())
        .await
    {
        Ok(item) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": item
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/announcements/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "公告ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功", body = MessageResponse),
        (status = 404, description = "公告不存在")
    )
)]
pub async fn delete_announcement(
    user_service: web::Data<UserService>,
    announcement_service: web::Data<AnnouncementService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    admin_guard!(req, user_service);

    match announcement_service.delete(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": MessageResponse {
                message: "公告已删除".to_string()
            }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/contents",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("perPage" = Option<u32>, Query, description = "每页数量"),
        ("kind" = Option<crate::entities::ContentKind>, Query, description = "内容类型"),
        ("keyword" = Option<String>, Query, description = "标题关键字"),
        ("status" = Option<crate::entities::ContentStatus>, Query, description = "内容状态")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "内容列表"),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn list_contents(
    user_service: web::Data<UserService>,
    content_service: web::Data<ContentService>,
    req: HttpRequest,
    query: web::Query<ContentQuery>,
) -> Result<HttpResponse> {
    admin_guard!(req, user_service);

    match content_service.list_admin(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/contents/{id}/status",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "内容ID")
    ),
    request_body = UpdateContentStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "审核状态已更新", body = ContentResponse),
        (status = 404, description = "内容不存在")
    )
)]
pub async fn update_content_status(
    user_service: web::Data<UserService>,
    content_service: web::Data<ContentService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateContentStatusRequest>,
) -> Result<HttpResponse> {
    admin_guard!(req, user_service);

    match content_service
        .set_status(path.into_inner(), request.status)
        .await
    {
        Ok(content) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": content
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("perPage" = Option<u32>, Query, description = "每页数量"),
        ("keyword" = Option<String>, Query, description = "用户名或昵称"),
        ("role" = Option<crate::entities::UserRole>, Query, description = "角色")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "用户列表"),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn list_users(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse> {
    admin_guard!(req, user_service);

    match user_service.list_users(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "用户ID")
    ),
    request_body = UpdateRoleRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "角色已更新", body = UserResponse),
        (status = 400, description = "请求参数错误"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn update_user_role(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse> {
    let admin_id = admin_guard!(req, user_service);

    match user_service
        .update_user_role(admin_id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": user
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/memberships/expire",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "到期会员已降级"),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn expire_memberships(
    user_service: web::Data<UserService>,
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    admin_guard!(req, user_service);

    match payment_service.check_expired_memberships().await {
        Ok(count) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {
                "expired_count": count
            },
            "message": "会员到期检查完成"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/announcements", web::get().to(list_announcements))
            .route("/announcements", web::post().to(create_announcement))
            .route("/announcements/{id}", web::put().to(update_announcement))
            .route("/announcements/{id}", web::delete().to(delete_announcement))
            .route("/contents", web::get().to(list_contents))
            .route("/contents/{id}/status", web::put().to(update_content_status))
            .route("/users", web::get().to(list_users))
            .route("/users/{id}/role", web::put().to(update_user_role))
            .route("/memberships/expire", web::post().to(expire_memberships)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{UserRole, user_entity as users};
    use crate::middlewares::AuthMiddleware;
    use crate::utils::JwtService;
    use actix_web::{App, test as actix_test};
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::sync::Arc;

    fn user(id: i64, role: UserRole) -> users::Model {
        users::Model {
            id,
            username: format!("user{id}"),
            nickname: format!("用户{id}"),
            avatar_url: None,
            password_hash: "hash".to_string(),
            role,
            premium_expiry_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn jwt() -> JwtService {
        JwtService::new("test-secret", 3600, 86400)
    }

    async fn put_role(
        db: DatabaseConnection,
        token: Option<String>,
    ) -> Result<actix_web::dev::ServiceResponse, actix_web::Error> {
        let app = actix_test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt()))
                .app_data(web::Data::new(UserService::new(Arc::new(db))))
                .service(web::scope("/api").configure(admin_config)),
        )
        .await;

        let mut req = actix_test::TestRequest::put()
            .uri("/api/admin/users/7/role")
            .set_json(json!({ "role": "LIFETIME" }));
        if let Some(token) = token {
            req = req.insert_header(("Authorization", format!("Bearer {token}")));
        }
        actix_test::try_call_service(&app, req.to_request()).await
    }

    #[actix_web::test]
    async fn test_admin_routes_reject_non_admin() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(1, UserRole::Premium)]])
            .into_connection();
        let token = jwt().generate_access_token(1, "user1").unwrap();

        let resp = put_role(db, Some(token)).await.unwrap();
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    #[actix_web::test]
    async fn test_admin_routes_require_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        assert!(put_role(db, None).await.is_err());
    }

    #[actix_web::test]
    async fn test_admin_updates_user_role() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(1, UserRole::Admin)]])
            .append_query_results([vec![user(7, UserRole::Normal)]])
            .append_query_results([vec![user(7, UserRole::Lifetime)]])
            .into_connection();
        let token = jwt().generate_access_token(1, "user1").unwrap();

        let resp = put_role(db, Some(token)).await.unwrap();
        assert!(resp.status().is_success());
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["role"], "LIFETIME");
    }
}
