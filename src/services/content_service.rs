use crate::entities::{
    ContentStatus, ReactionKind, content_entity as contents, content_reaction_entity as reactions,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::UserService;
use crate::utils::{PaginatedResponse, PaginationParams, like_contains};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use std::sync::Arc;

const MAX_TITLE_CHARS: usize = 200;
const MAX_TAGS: usize = 10;
const MAX_TAG_CHARS: usize = 20;

#[derive(Clone)]
pub struct ContentService {
    pool: Arc<DatabaseConnection>,
    user_service: UserService,
}

impl ContentService {
    pub fn new(pool: Arc<DatabaseConnection>) -> Self {
        Self {
            user_service: UserService::new(pool.clone()),
            pool,
        }
    }

    async fn find_content(&self, content_id: i64) -> AppResult<contents::Model> {
        contents::Entity::find_by_id(content_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Content not found".to_string()))
    }

    /// 作者本人或管理员
    async fn ensure_can_edit(&self, content: &contents::Model, user_id: i64) -> AppResult<()> {
        if content.user_id == user_id || self.user_service.is_admin(user_id).await? {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    pub async fn create(
        &self,
        user_id: i64,
        request: CreateContentRequest,
    ) -> AppResult<ContentResponse> {
        let title = validate_title(&request.title)?;
        validate_body(&request.body)?;
        let tags = normalize_tags(request.tags)?;
        let status = author_status(request.status.unwrap_or(ContentStatus::Published))?;

        let now = Utc::now();
        let content = contents::ActiveModel {
            user_id: Set(user_id),
            kind: Set(request.kind),
            title: Set(title),
            body: Set(request.body),
            cover_url: Set(request.cover_url.filter(|u| !u.is_empty())),
            tags: Set(Some(serde_json::to_value(tags)?)),
            status: Set(status),
            like_count: Set(0),
            favorite_count: Set(0),
            view_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;

        log::info!(
            "Content {} created by user {user_id}, status {}",
            content.id,
            content.status
        );
        Ok(ContentResponse::from(content))
    }

    /// 已发布内容所有人可见；其余状态仅作者与管理员可见，对其他人表现为不存在
    pub async fn get(&self, content_id: i64, viewer: Option<i64>) -> AppResult<ContentResponse> {
        let mut content = self.find_content(content_id).await?;

        if content.status != ContentStatus::Published {
            let allowed = match viewer {
                Some(uid) if uid == content.user_id => true,
                Some(uid) => self.user_service.is_admin(uid).await?,
                None => false,
            };
            if !allowed {
                return Err(AppError::NotFound("Content not found".to_string()));
            }
            return Ok(ContentResponse::from(content));
        }

        contents::Entity::update_many()
            .col_expr(
                contents::Column::ViewCount,
                Expr::col(contents::Column::ViewCount).add(1),
            )
            .filter(contents::Column::Id.eq(content_id))
            .exec(&*self.pool)
            .await?;
        content.view_count += 1;

        Ok(ContentResponse::from(content))
    }

    pub async fn list_public(
        &self,
        query: &ContentQuery,
    ) -> AppResult<PaginatedResponse<ContentResponse>> {
        let select = contents::Entity::find()
            .filter(contents::Column::Status.eq(ContentStatus::Published));
        self.paginate(apply_filters(select, query, false), query).await
    }

    pub async fn list_mine(
        &self,
        user_id: i64,
        query: &ContentQuery,
    ) -> AppResult<PaginatedResponse<ContentResponse>> {
        let select = contents::Entity::find().filter(contents::Column::UserId.eq(user_id));
        self.paginate(apply_filters(select, query, true), query).await
    }

    /// 管理端：所有内容，可按状态过滤
    pub async fn list_admin(
        &self,
        query: &ContentQuery,
    ) -> AppResult<PaginatedResponse<ContentResponse>> {
        self.paginate(apply_filters(contents::Entity::find(), query, true), query)
            .await
    }

    async fn paginate(
        &self,
        select: Select<contents::Entity>,
        query: &ContentQuery,
    ) -> AppResult<PaginatedResponse<ContentResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let total = select.clone().count(&*self.pool).await?;
        let items = select
            .order_by_desc(contents::Column::CreatedAt)
            .order_by_desc(contents::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(ContentResponse::from)
            .collect();
        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn update(
        &self,
        user_id: i64,
        content_id: i64,
        request: UpdateContentRequest,
    ) -> AppResult<ContentResponse> {
        let content = self.find_content(content_id).await?;
        self.ensure_can_edit(&content, user_id).await?;

        let current_status = content.status;
        let mut model = content.into_active_model();
        if let Some(title) = &request.title {
            model.title = Set(validate_title(title)?);
        }
        if let Some(body) = request.body {
            validate_body(&body)?;
            model.body = Set(body);
        }
        if let Some(url) = request.cover_url {
            model.cover_url = Set(if url.is_empty() { None } else { Some(url) });
        }
        if let Some(tags) = request.tags {
            model.tags = Set(Some(serde_json::to_value(normalize_tags(tags)?)?));
        }
        if let Some(status) = request.status {
            model.status = Set(author_status_change(current_status, status)?);
        }
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.pool).await?;

        Ok(ContentResponse::from(updated))
    }

    pub async fn delete(&self, user_id: i64, content_id: i64) -> AppResult<()> {
        let content = self.find_content(content_id).await?;
        self.ensure_can_edit(&content, user_id).await?;

        // 互动记录由外键级联删除
        contents::Entity::delete_by_id(content_id)
            .exec(&*self.pool)
            .await?;
        log::info!("Content {content_id} deleted by user {user_id}");
        Ok(())
    }

    /// 管理端审核：任意状态间切换
    pub async fn set_status(
        &self,
        content_id: i64,
        status: ContentStatus,
    ) -> AppResult<ContentResponse> {
        let mut model = self.find_content(content_id).await?.into_active_model();
        model.status = Set(status);
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.pool).await?;

        log::info!("Content {content_id} status set to {status}");
        Ok(ContentResponse::from(updated))
    }

    /// 点赞/收藏（active = true）或取消。重复操作幂等，计数只随记录的增删变化
    pub async fn react(
        &self,
        user_id: i64,
        content_id: i64,
        reaction: ReactionKind,
        active: bool,
    ) -> AppResult<ReactionResponse> {
        let txn = self.pool.begin().await?;

        let content = contents::Entity::find_by_id(content_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            // 下架后仍允许取消点赞/收藏
            .filter(|c| !active || c.status == ContentStatus::Published)
            .ok_or_else(|| AppError::NotFound("Content not found".to_string()))?;

        let existing = reactions::Entity::find()
            .filter(reactions::Column::UserId.eq(user_id))
            .filter(reactions::Column::ContentId.eq(content_id))
            .filter(reactions::Column::Reaction.eq(reaction))
            .one(&txn)
            .await?;

        let current = match reaction {
            ReactionKind::Like => content.like_count,
            ReactionKind::Favorite => content.favorite_count,
        };

        let delta = match (existing, active) {
            (None, true) => {
                reactions::ActiveModel {
                    user_id: Set(user_id),
                    content_id: Set(content_id),
                    reaction: Set(reaction),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
                1
            }
            (Some(row), false) => {
                reactions::Entity::delete_by_id(row.id).exec(&txn).await?;
                -1
            }
            _ => 0,
        };

        let count = (current + delta).max(0);
        if delta != 0 {
            let mut model = content.into_active_model();
            match reaction {
                ReactionKind::Like => model.like_count = Set(count),
                ReactionKind::Favorite => model.favorite_count = Set(count),
            }
            model.update(&txn).await?;
        }

        txn.commit().await?;
        Ok(ReactionResponse {
            content_id,
            reaction,
            active,
            count,
        })
    }
}

fn apply_filters(
    mut select: Select<contents::Entity>,
    query: &ContentQuery,
    with_status: bool,
) -> Select<contents::Entity> {
    if let Some(kind) = query.kind {
        select = select.filter(contents::Column::Kind.eq(kind));
    }
    if let Some(keyword) = query
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        select = select.filter(
            Expr::col((contents::Entity, contents::Column::Title)).like(like_contains(keyword)),
        );
    }
    if with_status && let Some(status) = query.status {
        select = select.filter(contents::Column::Status.eq(status));
    }
    select
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    let len = title.chars().count();
    if len == 0 || len > MAX_TITLE_CHARS {
        return Err(AppError::ValidationError(format!(
            "Title must be 1-{MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_body(body: &str) -> AppResult<()> {
    if body.trim().is_empty() {
        return Err(AppError::ValidationError("Body cannot be empty".to_string()));
    }
    Ok(())
}

/// 去空白、去重，限制数量与长度
fn normalize_tags(tags: Vec<String>) -> AppResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_CHARS {
            return Err(AppError::ValidationError(format!(
                "Tag too long (max {MAX_TAG_CHARS} characters)"
            )));
        }
        out.push(tag.to_string());
    }
    if out.len() > MAX_TAGS {
        return Err(AppError::ValidationError(format!(
            "At most {MAX_TAGS} tags allowed"
        )));
    }
    Ok(out)
}

/// 作者只能保存草稿或直接发布，其余状态由管理员设置
fn author_status(status: ContentStatus) -> AppResult<ContentStatus> {
    match status {
        ContentStatus::Draft | ContentStatus::Published => Ok(status),
        other => Err(AppError::ValidationError(format!(
            "Status {other} can only be set by an admin"
        ))),
    }
}

/// 审核中、被驳回或被隐藏的内容只能由管理员改变状态
fn author_status_change(
    current: ContentStatus,
    requested: ContentStatus,
) -> AppResult<ContentStatus> {
    match current {
        ContentStatus::Draft | ContentStatus::Published => author_status(requested),
        _ => Err(AppError::PermissionDenied),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ContentKind, UserRole, user_entity as users};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait};

    fn content(user_id: i64, status: ContentStatus) -> contents::Model {
        contents::Model {
            id: 5,
            user_id,
            kind: ContentKind::Note,
            title: "今日灵感".to_string(),
            body: "正文".to_string(),
            cover_url: None,
            tags: Some(serde_json::json!(["ai", "绘画"])),
            status,
            like_count: 2,
            favorite_count: 0,
            view_count: 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

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

    fn reaction_row() -> reactions::Model {
        reactions::Model {
            id: 1,
            user_id: 1,
            content_id: 5,
            reaction: ReactionKind::Like,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(vec![
            " ai ".to_string(),
            "ai".to_string(),
            "".to_string(),
            "绘画".to_string(),
        ])
        .unwrap();
        assert_eq!(tags, vec!["ai".to_string(), "绘画".to_string()]);

        assert!(normalize_tags(vec!["x".repeat(21)]).is_err());
        assert!(normalize_tags((0..11).map(|i| format!("t{i}")).collect()).is_err());
    }

    #[test]
    fn test_author_status() {
        assert!(author_status(ContentStatus::Draft).is_ok());
        assert!(author_status(ContentStatus::Published).is_ok());
        assert!(author_status(ContentStatus::Hidden).is_err());
        assert!(author_status(ContentStatus::Pending).is_err());
    }

    #[test]
    fn test_author_status_change_respects_moderation() {
        assert_eq!(
            author_status_change(ContentStatus::Draft, ContentStatus::Published).unwrap(),
            ContentStatus::Published
        );
        for moderated in [
            ContentStatus::Hidden,
            ContentStatus::Rejected,
            ContentStatus::Pending,
        ] {
            assert!(matches!(
                author_status_change(moderated, ContentStatus::Published),
                Err(AppError::PermissionDenied)
            ));
        }
    }

    #[test]
    fn test_keyword_filter_escapes_wildcards() {
        let query = ContentQuery {
            keyword: Some("100%".to_string()),
            ..Default::default()
        };
        let sql = apply_filters(contents::Entity::find(), &query, false)
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains("LIKE"));
        assert!(sql.contains("ESCAPE"));
    }

    #[tokio::test]
    async fn test_owner_cannot_republish_hidden_content() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![content(2, ContentStatus::Hidden)]])
            .into_connection();
        let svc = ContentService::new(Arc::new(db));

        let err = svc
            .update(
                2,
                5,
                UpdateContentRequest {
                    title: None,
                    body: None,
                    cover_url: None,
                    tags: None,
                    status: Some(ContentStatus::Published),
                },
            )
            .await;
        assert!(matches!(err, Err(AppError::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_unlike_hidden_content_is_allowed() {
        let mut updated = content(2, ContentStatus::Hidden);
        updated.like_count = 1;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![content(2, ContentStatus::Hidden)]])
            .append_query_results([vec![reaction_row()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![updated]])
            .into_connection();
        let svc = ContentService::new(Arc::new(db));

        let resp = svc.react(1, 5, ReactionKind::Like, false).await.unwrap();
        assert!(!resp.active);
        assert_eq!(resp.count, 1);
    }

    #[tokio::test]
    async fn test_like_hidden_content_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![content(2, ContentStatus::Hidden)]])
            .into_connection();
        let svc = ContentService::new(Arc::new(db));

        let err = svc.react(1, 5, ReactionKind::Like, true).await;
        assert!(matches!(err, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_title() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = ContentService::new(Arc::new(db));
        let err = svc
            .create(
                1,
                CreateContentRequest {
                    kind: ContentKind::Post,
                    title: "   ".to_string(),
                    body: "正文".to_string(),
                    cover_url: None,
                    tags: vec![],
                    status: None,
                },
            )
            .await;
        assert!(matches!(err, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_get_published_increments_view_count() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![content(2, ContentStatus::Published)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let svc = ContentService::new(Arc::new(db));

        let resp = svc.get(5, None).await.unwrap();
        assert_eq!(resp.view_count, 11);
        assert_eq!(resp.tags, vec!["ai".to_string(), "绘画".to_string()]);
    }

    #[tokio::test]
    async fn test_get_draft_hidden_from_others() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![content(2, ContentStatus::Draft)]])
            .append_query_results([vec![user(3, UserRole::Premium)]])
            .into_connection();
        let svc = ContentService::new(Arc::new(db));

        let err = svc.get(5, Some(3)).await;
        assert!(matches!(err, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_draft_visible_to_owner() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![content(2, ContentStatus::Draft)]])
            .into_connection();
        let svc = ContentService::new(Arc::new(db));

        let resp = svc.get(5, Some(2)).await.unwrap();
        assert_eq!(resp.status, ContentStatus::Draft);
        assert_eq!(resp.view_count, 10);
    }

    #[tokio::test]
    async fn test_delete_requires_owner_or_admin() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![content(2, ContentStatus::Published)]])
            .append_query_results([vec![user(3, UserRole::Normal)]])
            .into_connection();
        let svc = ContentService::new(Arc::new(db));

        let err = svc.delete(3, 5).await;
        assert!(matches!(err, Err(AppError::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_like_inserts_reaction_and_bumps_counter() {
        let mut liked = content(2, ContentStatus::Published);
        liked.like_count = 3;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![content(2, ContentStatus::Published)]])
            .append_query_results([Vec::<reactions::Model>::new()])
            .append_query_results([vec![reaction_row()]])
            .append_query_results([vec![liked]])
            .into_connection();
        let svc = ContentService::new(Arc::new(db));

        let resp = svc.react(1, 5, ReactionKind::Like, true).await.unwrap();
        assert!(resp.active);
        assert_eq!(resp.count, 3);
    }

    #[tokio::test]
    async fn test_repeated_like_is_idempotent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![content(2, ContentStatus::Published)]])
            .append_query_results([vec![reaction_row()]])
            .into_connection();
        let svc = ContentService::new(Arc::new(db));

        let resp = svc.react(1, 5, ReactionKind::Like, true).await.unwrap();
        assert_eq!(resp.count, 2);
    }

    #[tokio::test]
    async fn test_unfavorite_without_reaction_keeps_zero() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![content(2, ContentStatus::Published)]])
            .append_query_results([Vec::<reactions::Model>::new()])
            .into_connection();
        let svc = ContentService::new(Arc::new(db));

        let resp = svc
            .react(1, 5, ReactionKind::Favorite, false)
            .await
            .unwrap();
        assert!(!resp.active);
        assert_eq!(resp.count, 0);
    }
}
