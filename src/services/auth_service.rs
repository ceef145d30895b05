use crate::entities::{UserRole, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::*;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthService {
    pool: Arc<DatabaseConnection>,
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(pool: Arc<DatabaseConnection>, jwt_service: JwtService) -> Self {
        Self { pool, jwt_service }
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        let username = request.username.trim().to_string();
        validate_username(&username)?;
        validate_password(&request.password)?;
        let nickname = match request.nickname.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => {
                validate_nickname(n)?;
                n.to_string()
            }
            _ => username.clone(),
        };

        // 检查用户名是否已注册
        let existing = users::Entity::find()
            .filter(users::Column::Username.eq(username.as_str()))
            .one(&*self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("用户名已存在".to_string()));
        }

        let password_hash = hash_password(&request.password)?;
        let now = Utc::now();
        let user = users::ActiveModel {
            username: Set(username),
            nickname: Set(nickname),
            avatar_url: Set(None),
            password_hash: Set(password_hash),
            role: Set(UserRole::Normal),
            premium_expiry_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;

        log::info!("User registered: id={} username={}", user.id, user.username);
        self.issue_tokens(user)
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(request.username.trim()))
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::AuthError("用户名或密码错误".to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::AuthError("用户名或密码错误".to_string()));
        }

        self.issue_tokens(user)
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(refresh_token)?;
        let user_id = claims.user_id()?;

        let user = users::Entity::find_by_id(user_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::AuthError("用户不存在".to_string()))?;

        self.issue_tokens(user)
    }

    fn issue_tokens(&self, user: users::Model) -> AppResult<AuthResponse> {
        let access_token = self
            .jwt_service
            .generate_access_token(user.id, &user.username)?;
        let refresh_token = self
            .jwt_service
            .generate_refresh_token(user.id, &user.username)?;

        Ok(AuthResponse {
            user: UserResponse::from(user),
            access_token,
            refresh_token,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn jwt() -> JwtService {
        JwtService::new("test-secret", 3600, 86400)
    }

    fn stored_user(password: &str) -> users::Model {
        users::Model {
            id: 7,
            username: "alice_01".to_string(),
            nickname: "爱丽丝".to_string(),
            avatar_url: None,
            password_hash: hash_password(password).unwrap(),
            role: UserRole::Normal,
            premium_expiry_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_login_success_issues_tokens() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored_user("password123")]])
            .into_connection();
        let svc = AuthService::new(Arc::new(db), jwt());

        let resp = svc
            .login(LoginRequest {
                username: "alice_01".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(resp.user.id, 7);
        assert_eq!(resp.expires_in, 3600);
        let claims = jwt().verify_access_token(&resp.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored_user("password123")]])
            .into_connection();
        let svc = AuthService::new(Arc::new(db), jwt());

        let err = svc
            .login(LoginRequest {
                username: "alice_01".to_string(),
                password: "password999".to_string(),
            })
            .await;
        assert!(matches!(err, Err(AppError::AuthError(_))));
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored_user("password123")]])
            .into_connection();
        let svc = AuthService::new(Arc::new(db), jwt());

        let err = svc
            .register(RegisterRequest {
                username: "alice_01".to_string(),
                password: "password123".to_string(),
                nickname: None,
            })
            .await;
        assert!(matches!(err, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = AuthService::new(Arc::new(db), jwt());
        let access = jwt().generate_access_token(7, "alice_01").unwrap();
        assert!(svc.refresh_token(&access).await.is_err());
    }
}
