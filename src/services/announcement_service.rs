use crate::entities::announcement_entity as announcements;
use crate::error::{AppError, AppResult};
use crate::models::*;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AnnouncementService {
    pool: Arc<DatabaseConnection>,
}

impl AnnouncementService {
    pub fn new(pool: Arc<DatabaseConnection>) -> Self {
        Self { pool }
    }

    /// 前台公告：只返回启用的，最新在前
    pub async fn list_active(&self) -> AppResult<Vec<AnnouncementResponse>> {
        let items = announcements::Entity::find()
            .filter(announcements::Column::IsActive.eq(true))
            .order_by_desc(announcements::Column::CreatedAt)
            .all(&*self.pool)
            .await?;
        Ok(items.into_iter().map(AnnouncementResponse::from).collect())
    }

    pub async fn list_all(&self) -> AppResult<Vec<AnnouncementResponse>> {
        let items = announcements::Entity::find()
            .order_by_desc(announcements::Column::CreatedAt)
            .all(&*self.pool)
            .await?;
        Ok(items.into_iter().map(AnnouncementResponse::from).collect())
    }

    pub async fn create(
        &self,
        admin_id: i64,
        request: CreateAnnouncementRequest,
    ) -> AppResult<AnnouncementResponse> {
        let title = validate_title(&request.title)?;
        if request.body.trim().is_empty() {
            return Err(AppError::ValidationError("Body cannot be empty".to_string()));
        }

        let now = Utc::now();
        let model = announcements::ActiveModel {
            title: Set(title),
            body: Set(request.body),
            is_active: Set(request.is_active.unwrap_or(true)),
            created_by: Set(admin_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;

        log::info!("Announcement {} created by admin {admin_id}", model.id);
        Ok(AnnouncementResponse::from(model))
    }

    pub async fn update(
        &self,
        id: i64,
        request: UpdateAnnouncementRequest,
    ) -> AppResult<AnnouncementResponse> {
        let existing = announcements::Entity::find_by_id(id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

        let mut model = existing.into_active_model();
        if let Some(title) = &request.title {
            model.title = Set(validate_title(title)?);
        }
        if let Some(body) = request.body {
            if body.trim().is_empty() {
                return Err(AppError::ValidationError("Body cannot be empty".to_string()));
            }
            model.body = Set(body);
        }
        if let Some(is_active) = request.is_active {
            model.is_active = Set(is_active);
        }
        model.updated_at = Set(Utc::now());

        Ok(AnnouncementResponse::from(model.update(&*self.pool).await?))
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let result = announcements::Entity::delete_by_id(id)
            .exec(&*self.pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Announcement not found".to_string()));
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > 200 {
        return Err(AppError::ValidationError(
            "Title must be 1-200 characters".to_string(),
        ));
    }
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn announcement(id: i64) -> announcements::Model {
        announcements::Model {
            id,
            title: "系统维护通知".to_string(),
            body: "今晚 23:00 维护".to_string(),
            is_active: true,
            created_by: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_defaults_to_active() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![announcement(1)]])
            .into_connection();
        let svc = AnnouncementService::new(Arc::new(db));

        let resp = svc
            .create(
                1,
                CreateAnnouncementRequest {
                    title: "系统维护通知".to_string(),
                    body: "今晚 23:00 维护".to_string(),
                    is_active: None,
                },
            )
            .await
            .unwrap();
        assert!(resp.is_active);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_body() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = AnnouncementService::new(Arc::new(db));
        let err = svc
            .create(
                1,
                CreateAnnouncementRequest {
                    title: "标题".to_string(),
                    body: "  ".to_string(),
                    is_active: None,
                },
            )
            .await;
        assert!(matches!(err, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let svc = AnnouncementService::new(Arc::new(db));
        assert!(matches!(svc.delete(9).await, Err(AppError::NotFound(_))));
    }
}
