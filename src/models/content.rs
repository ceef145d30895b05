use crate::entities::{ContentKind, ContentStatus, ReactionKind, content_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateContentRequest {
    pub kind: ContentKind,
    #[schema(example = "今日灵感")]
    pub title: String,
    pub body: String,
    pub cover_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// 仅允许 draft 或 published，缺省为 published
    pub status: Option<ContentStatus>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContentRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub cover_url: Option<String>,
    pub tags: Option<Vec<String>>,
    /// 作者只能在 draft 与 published 之间切换
    pub status: Option<ContentStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContentStatusRequest {
    pub status: ContentStatus,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub kind: Option<ContentKind>,
    /// 标题模糊搜索
    pub keyword: Option<String>,
    /// 仅对"我的内容"与管理端生效
    pub status: Option<ContentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentResponse {
    pub id: i64,
    pub user_id: i64,
    pub kind: ContentKind,
    pub title: String,
    pub body: String,
    pub cover_url: Option<String>,
    pub tags: Vec<String>,
    pub status: ContentStatus,
    pub like_count: i64,
    pub favorite_count: i64,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReactionResponse {
    pub content_id: i64,
    pub reaction: ReactionKind,
    /// 当前用户是否处于该互动状态
    pub active: bool,
    pub count: i64,
}

impl From<content_entity::Model> for ContentResponse {
    fn from(m: content_entity::Model) -> Self {
        let tags = m
            .tags
            .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
            .unwrap_or_default();
        Self {
            id: m.id,
            user_id: m.user_id,
            kind: m.kind,
            title: m.title,
            body: m.body,
            cover_url: m.cover_url,
            tags,
            status: m.status,
            like_count: m.like_count,
            favorite_count: m.favorite_count,
            view_count: m.view_count,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
