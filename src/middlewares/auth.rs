use crate::error::AppError;
use crate::utils::JwtService;
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

// 公开路径配置
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
    // 仅 GET 公开的前缀，携带有效 token 时仍会解析出用户
    read_only_prefixes: Vec<&'static str>,
    excluded_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            // 完全匹配的公开路径
            exact_paths: vec![
                "/swagger-ui",
                "/swagger-ui/",
                "/api-docs/openapi.json",
                "/api/payments/products",
                "/api/payments/alipay/notify",
            ],
            // 前缀匹配的公开路径
            prefix_paths: vec!["/swagger-ui/", "/api-docs/", "/api/auth/"],
            read_only_prefixes: vec!["/api/contents", "/api/announcements"],
            // 需要排除的路径（即使在公开前缀下也需要认证）
            excluded_paths: vec!["/api/contents/mine"],
        }
    }

    fn is_public_path(&self, method: &Method, path: &str) -> bool {
        // 首先检查是否在排除列表中
        if self
            .excluded_paths
            .iter()
            .any(|&excluded| path.starts_with(excluded))
        {
            return false;
        }

        // 检查完全匹配
        if self.exact_paths.contains(&path) {
            return true;
        }

        // 检查前缀匹配
        if self
            .prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
        {
            return true;
        }

        *method == Method::GET
            && self
                .read_only_prefixes
                .iter()
                .any(|&prefix| path.starts_with(prefix))
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    public_paths: PublicPaths,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS {
            return Box::pin(self.service.call(req));
        }

        let claims_user = bearer_token(&req).map(|token| {
            self.jwt_service
                .verify_access_token(token)
                .and_then(|claims| claims.user_id())
        });

        if self.public_paths.is_public_path(req.method(), req.path()) {
            // 公开路径上 token 可选，无效 token 按匿名处理
            if let Some(Ok(user_id)) = claims_user {
                req.extensions_mut().insert(user_id);
            }
            return Box::pin(self.service.call(req));
        }

        match claims_user {
            Some(Ok(user_id)) => {
                // 将用户ID添加到请求扩展中
                req.extensions_mut().insert(user_id);
                Box::pin(self.service.call(req))
            }
            Some(Err(_)) => {
                let error = AppError::AuthError("Invalid access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
            None => {
                let error = AppError::AuthError("Missing access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

/// 公开路径上可能为空
pub fn get_current_user_id(req: &HttpRequest) -> Option<i64> {
    req.extensions().get::<i64>().copied()
}

/// 需要登录的接口使用，中间件已保证存在
pub fn require_user_id(req: &HttpRequest) -> Result<i64, AppError> {
    get_current_user_id(req).ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, test as actix_test, web};

    #[test]
    fn test_public_paths() {
        let paths = PublicPaths::new();
        assert!(paths.is_public_path(&Method::POST, "/api/auth/login"));
        assert!(paths.is_public_path(&Method::POST, "/api/payments/alipay/notify"));
        assert!(paths.is_public_path(&Method::GET, "/api/contents"));
        assert!(paths.is_public_path(&Method::GET, "/api/contents/12"));
        assert!(paths.is_public_path(&Method::GET, "/api/announcements"));

        assert!(!paths.is_public_path(&Method::POST, "/api/contents"));
        assert!(!paths.is_public_path(&Method::GET, "/api/contents/mine"));
        assert!(!paths.is_public_path(&Method::POST, "/api/payments/create-order"));
        assert!(!paths.is_public_path(&Method::GET, "/api/admin/users"));
    }

    async fn whoami(req: HttpRequest) -> HttpResponse {
        HttpResponse::Ok().body(format!("{:?}", get_current_user_id(&req)))
    }

    #[actix_web::test]
    async fn test_middleware_rejects_and_passes() {
        let jwt = JwtService::new("test-secret", 3600, 86400);
        let token = jwt.generate_access_token(42, "alice_01").unwrap();
        let app = actix_test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt))
                .route("/api/users/me", web::get().to(whoami))
                .route("/api/contents", web::get().to(whoami)),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/api/users/me").to_request();
        let resp = actix_test::try_call_service(&app, req).await;
        assert!(resp.is_err());

        let req = actix_test::TestRequest::get()
            .uri("/api/users/me")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, web::Bytes::from_static(b"Some(42)"));

        // 公开接口：无 token 为匿名，带 token 识别用户
        let req = actix_test::TestRequest::get().uri("/api/contents").to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, web::Bytes::from_static(b"None"));

        let req = actix_test::TestRequest::get()
            .uri("/api/contents")
            .insert_header(("Authorization", "Bearer garbage"))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, web::Bytes::from_static(b"None"));
    }
}
