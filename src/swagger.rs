use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{ContentKind, ContentStatus, OrderStatus, ReactionKind, UserRole};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::user::get_profile,
        handlers::user::update_profile,
        handlers::payment::list_products,
        handlers::payment::create_order,
        handlers::payment::get_order_status,
        handlers::payment::list_orders,
        handlers::webhook::alipay_notify,
        handlers::content::list_contents,
        handlers::content::list_my_contents,
        handlers::content::get_content,
        handlers::content::create_content,
        handlers::content::update_content,
        handlers::content::delete_content,
        handlers::content::like,
        handlers::content::unlike,
        handlers::content::favorite,
        handlers::content::unfavorite,
        handlers::announcement::list_announcements,
        handlers::admin::list_announcements,
        handlers::admin::create_announcement,
        handlers::admin::update_announcement,
        handlers::admin::delete_announcement,
        handlers::admin::list_contents,
        handlers::admin::update_content_status,
        handlers::admin::list_users,
        handlers::admin::update_user_role,
        handlers::admin::expire_memberships,
        handlers::storage::upload,
    ),
    components(
        schemas(
            UserRole,
            OrderStatus,
            ContentKind,
            ContentStatus,
            ReactionKind,
            RegisterRequest,
            LoginRequest,
            RefreshTokenRequest,
            UpdateUserRequest,
            UserResponse,
            AuthResponse,
            UserQuery,
            UpdateRoleRequest,
            CreateOrderRequest,
            CreateOrderResponse,
            ProductResponse,
            OrderResponse,
            OrderQuery,
            NotificationAck,
            CreateContentRequest,
            UpdateContentRequest,
            UpdateContentStatusRequest,
            ContentQuery,
            ContentResponse,
            ReactionResponse,
            CreateAnnouncementRequest,
            UpdateAnnouncementRequest,
            AnnouncementResponse,
            UploadResponse,
            MessageResponse,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication API"),
        (name = "user", description = "User profile API"),
        (name = "payment", description = "Membership purchase via Alipay"),
        (name = "content", description = "Notes, posts, resources and other user content"),
        (name = "announcement", description = "Site announcements"),
        (name = "admin", description = "Administration API"),
        (name = "storage", description = "File upload API"),
    ),
    info(
        title = "AIfans Backend API",
        version = "1.0.0",
        description = "AIfans Backend REST API documentation"
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_payment_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/payments/create-order"));
        assert!(paths.contains_key("/api/payments/order-status/{orderId}"));
        assert!(paths.contains_key("/api/payments/alipay/notify"));
        assert!(paths.contains_key("/api/contents/{id}/like"));
    }

    #[test]
    fn test_openapi_admin_filters_reference_entity_schemas() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/admin/contents"));
        assert!(doc.paths.paths.contains_key("/api/admin/users"));

        let json = doc.to_json().unwrap();
        assert!(json.contains("ContentStatus"));
        assert!(json.contains("UserRole"));
    }
}
