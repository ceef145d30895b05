use crate::entities::{UserRole, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::{PaginatedResponse, PaginationParams, like_contains, validate_nickname};
use chrono::Utc;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct UserService {
    pool: Arc<DatabaseConnection>,
}

impl UserService {
    pub fn new(pool: Arc<DatabaseConnection>) -> Self {
        Self { pool }
    }

    async fn find_user(&self, user_id: i64) -> AppResult<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// 获取当前用户资料
    pub async fn get_user_profile(&self, user_id: i64) -> AppResult<UserResponse> {
        Ok(UserResponse::from(self.find_user(user_id).await?))
    }

    /// 更新昵称与头像
    pub async fn update_user_profile(
        &self,
        user_id: i64,
        request: UpdateUserRequest,
    ) -> AppResult<UserResponse> {
        if request.nickname.is_none() && request.avatar_url.is_none() {
            return Err(AppError::ValidationError("No fields to update".to_string()));
        }
        if let Some(nickname) = &request.nickname {
            validate_nickname(nickname)?;
        }
        if let Some(url) = &request.avatar_url
            && url.len() > 512
        {
            return Err(AppError::ValidationError("Avatar URL too long".to_string()));
        }

        let mut model = self.find_user(user_id).await?.into_active_model();
        if let Some(nickname) = request.nickname {
            model.nickname = Set(nickname.trim().to_string());
        }
        if let Some(url) = request.avatar_url {
            // 空字符串表示清除头像
            model.avatar_url = Set(if url.is_empty() { None } else { Some(url) });
        }
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.pool).await?;

        Ok(UserResponse::from(updated))
    }

    pub async fn is_admin(&self, user_id: i64) -> AppResult<bool> {
        Ok(users::Entity::find_by_id(user_id)
            .one(&*self.pool)
            .await?
            .is_some_and(|u| u.role == UserRole::Admin))
    }

    /// 管理端接口的权限校验
    pub async fn require_admin(&self, user_id: i64) -> AppResult<()> {
        if self.is_admin(user_id).await? {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    /// 管理端：用户列表
    pub async fn list_users(&self, query: &UserQuery) -> AppResult<PaginatedResponse<UserResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut select = users::Entity::find();
        if let Some(keyword) = query.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(
                        Expr::col((users::Entity, users::Column::Username))
                            .like(like_contains(keyword)),
                    )
                    .add(
                        Expr::col((users::Entity, users::Column::Nickname))
                            .like(like_contains(keyword)),
                    ),
            );
        }
        if let Some(role) = query.role {
            select = select.filter(users::Column::Role.eq(role));
        }

        let total = select.clone().count(&*self.pool).await?;
        let models = select
            .order_by_desc(users::Column::CreatedAt)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&*self.pool)
            .await?;
        let items = models.into_iter().map(UserResponse::from).collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    /// 管理端：调整用户角色
    pub async fn update_user_role(
        &self,
        operator_id: i64,
        user_id: i64,
        request: UpdateRoleRequest,
    ) -> AppResult<UserResponse> {
        if operator_id == user_id && request.role != UserRole::Admin {
            return Err(AppError::ValidationError(
                "Cannot revoke your own admin role".to_string(),
            ));
        }
        if request.role == UserRole::Premium && request.premium_expiry_date.is_none() {
            return Err(AppError::ValidationError(
                "premiumExpiryDate is required for PREMIUM".to_string(),
            ));
        }

        let mut model = self.find_user(user_id).await?.into_active_model();
        model.role = Set(request.role);
        model.premium_expiry_date = Set(match request.role {
            UserRole::Premium => request.premium_expiry_date,
            _ => None,
        });
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.pool).await?;

        log::info!(
            "User {user_id} role set to {} by admin {operator_id}",
            updated.role
        );
        Ok(UserResponse::from(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

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

    #[tokio::test]
    async fn test_require_admin() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(1, UserRole::Admin)]])
            .append_query_results([vec![user(2, UserRole::Premium)]])
            .into_connection();
        let svc = UserService::new(Arc::new(db));

        assert!(svc.require_admin(1).await.is_ok());
        assert!(matches!(
            svc.require_admin(2).await,
            Err(AppError::PermissionDenied)
        ));
    }

    #[tokio::test]
    async fn test_list_users_keyword_is_literal() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![BTreeMap::from([(
                "num_items",
                Value::BigInt(Some(1)),
            )])]])
            .append_query_results([vec![user(7, UserRole::Normal)]])
            .into_connection();
        let db = Arc::new(db);
        let svc = UserService::new(db.clone());

        let page = svc
            .list_users(&UserQuery {
                keyword: Some("a_b".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 1);
        drop(svc);

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        let sql = format!("{log:?}");
        assert!(sql.contains("ESCAPE"));
        assert!(sql.contains(r"a\\_b"));
    }

    #[tokio::test]
    async fn test_update_profile_requires_fields() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = UserService::new(Arc::new(db));
        let err = svc
            .update_user_profile(
                1,
                UpdateUserRequest {
                    nickname: None,
                    avatar_url: None,
                },
            )
            .await;
        assert!(matches!(err, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_cannot_demote_self() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = UserService::new(Arc::new(db));
        let err = svc
            .update_user_role(
                1,
                1,
                UpdateRoleRequest {
                    role: UserRole::Normal,
                    premium_expiry_date: None,
                },
            )
            .await;
        assert!(matches!(err, Err(AppError::ValidationError(_))));
    }
}
