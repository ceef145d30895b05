use crate::entities::ReactionKind;
use crate::middlewares::{get_current_user_id, require_user_id};
use crate::models::*;
use crate::services::ContentService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/contents",
    tag = "content",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("perPage" = Option<u32>, Query, description = "每页数量"),
        ("kind" = Option<crate::entities::ContentKind>, Query, description = "内容类型"),
        ("keyword" = Option<String>, Query, description = "标题关键字")
    ),
    responses(
        (status = 200, description = "已发布内容列表")
    )
)]
pub async fn list_contents(
    content_service: web::Data<ContentService>,
    query: web::Query<ContentQuery>,
) -> Result<HttpResponse> {
    match content_service.list_public(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/contents/mine",
    tag = "content",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("perPage" = Option<u32>, Query, description = "每页数量"),
        ("kind" = Option<crate::entities::ContentKind>, Query, description = "内容类型"),
        ("status" = Option<crate::entities::ContentStatus>, Query, description = "内容状态")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "我的内容"),
        (status = 401, description = "未授权")
    )
)]
pub async fn list_my_contents(
    content_service: web::Data<ContentService>,
    req: HttpRequest,
    query: web::Query<ContentQuery>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match content_service.list_mine(user_id, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/contents/{id}",
    tag = "content",
    params(
        ("id" = i64, Path, description = "内容ID")
    ),
    responses(
        (status = 200, description = "内容详情", body = ContentResponse),
        (status = 404, description = "内容不存在")
    )
)]
pub async fn get_content(
    content_service: web::Data<ContentService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let viewer = get_current_user_id(&req);

    match content_service.get(path.into_inner(), viewer).await {
        Ok(content) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": content
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/contents",
    tag = "content",
    request_body = CreateContentRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建成功", body = ContentResponse),
        (status = 400, description = "请求参数错误"),
        (status = 401, description = "未授权")
    )
)]
pub async fn create_content(
    content_service: web::Data<ContentService>,
    req: HttpRequest,
    request: web::Json<CreateContentRequest>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match content_service.create(user_id, request.into_inner()).await {
        Ok(content) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": content
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/contents/{id}",
    tag = "content",
    params(
        ("id" = i64, Path, description = "内容ID")
    ),
    request_body = UpdateContentRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新成功", body = ContentResponse),
        (status = 403, description = "无权限"),
        (status = 404, description = "内容不存在")
    )
)]
pub async fn update_content(
    content_service: web::Data<ContentService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateContentRequest>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match content_service
        .update(user_id, path.into_inner(), request.into_inner())
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
    delete,
    path = "/api/contents/{id}",
    tag = "content",
    params(
        ("id" = i64, Path, description = "内容ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功", body = MessageResponse),
        (status = 403, description = "无权限"),
        (status = 404, description = "内容不存在")
    )
)]
pub async fn delete_content(
    content_service: web::Data<ContentService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match content_service.delete(user_id, path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": MessageResponse {
                message: "内容已删除".to_string()
            }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

async fn react(
    content_service: &ContentService,
    req: &HttpRequest,
    content_id: i64,
    reaction: ReactionKind,
    active: bool,
) -> Result<HttpResponse> {
    let user_id = require_user_id(req)?;

    match content_service
        .react(user_id, content_id, reaction, active)
        .await
    {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": result
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/contents/{id}/like",
    tag = "content",
    params(
        ("id" = i64, Path, description = "内容ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "点赞成功", body = ReactionResponse),
        (status = 404, description = "内容不存在")
    )
)]
pub async fn like(
    content_service: web::Data<ContentService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    react(&content_service, &req, path.into_inner(), ReactionKind::Like, true).await
}

#[utoipa::path(
    delete,
    path = "/api/contents/{id}/like",
    tag = "content",
    params(
        ("id" = i64, Path, description = "内容ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "取消点赞", body = ReactionResponse)
    )
)]
pub async fn unlike(
    content_service: web::Data<ContentService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    react(&content_service, &req, path.into_inner(), ReactionKind::Like, false).await
}

#[utoipa::path(
    post,
    path = "/api/contents/{id}/favorite",
    tag = "content",
    params(
        ("id" = i64, Path, description = "内容ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "收藏成功", body = ReactionResponse),
        (status = 404, description = "内容不存在")
    )
)]
pub async fn favorite(
    content_service: web::Data<ContentService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    react(&content_service, &req, path.into_inner(), ReactionKind::Favorite, true).await
}

#[utoipa::path(
    delete,
    path = "/api/contents/{id}/favorite",
    tag = "content",
    params(
        ("id" = i64, Path, description = "内容ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "取消收藏", body = ReactionResponse)
    )
)]
pub async fn unfavorite(
    content_service: web::Data<ContentService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    react(&content_service, &req, path.into_inner(), ReactionKind::Favorite, false).await
}

pub fn content_config(cfg: &mut web::ServiceConfig) {
    // /mine 需要在 /{id} 之前注册
    cfg.service(
        web::scope("/contents")
            .route("", web::get().to(list_contents))
            .route("", web::post().to(create_content))
            .route("/mine", web::get().to(list_my_contents))
            .route("/{id}", web::get().to(get_content))
            .route("/{id}", web::put().to(update_content))
            .route("/{id}", web::delete().to(delete_content))
            .route("/{id}/like", web::post().to(like))
            .route("/{id}/like", web::delete().to(unlike))
            .route("/{id}/favorite", web::post().to(favorite))
            .route("/{id}/favorite", web::delete().to(unfavorite)),
    );
}
