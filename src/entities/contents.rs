use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "content_kind")]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    #[sea_orm(string_value = "note")]
    Note,
    #[sea_orm(string_value = "inspiration")]
    Inspiration,
    #[sea_orm(string_value = "post")]
    Post,
    #[sea_orm(string_value = "resource")]
    Resource,
    #[sea_orm(string_value = "request")]
    Request,
    #[sea_orm(string_value = "screening")]
    Screening,
    #[sea_orm(string_value = "spirit_post")]
    SpiritPost,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "content_status")]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "published")]
    Published,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "hidden")]
    Hidden,
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentStatus::Draft => write!(f, "draft"),
            ContentStatus::Pending => write!(f, "pending"),
            ContentStatus::Published => write!(f, "published"),
            ContentStatus::Rejected => write!(f, "rejected"),
            ContentStatus::Hidden => write!(f, "hidden"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "contents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub kind: ContentKind,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub cover_url: Option<String>,
    pub tags: Option<Json>,
    pub status: ContentStatus,
    pub like_count: i64,
    pub favorite_count: i64,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
