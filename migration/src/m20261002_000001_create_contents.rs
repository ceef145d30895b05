use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

/// 笔记、灵感、帖子、资源、需求、放映、精神帖共用一张内容表，按 kind 区分
#[derive(DeriveIden)]
enum Contents {
    Table,
    Id,
    UserId,
    Kind,
    Title,
    Body,
    CoverUrl,
    Tags,
    Status,
    LikeCount,
    FavoriteCount,
    ViewCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ContentReactions {
    Table,
    Id,
    UserId,
    ContentId,
    Reaction,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("content_kind"))
                    .values(vec![
                        Alias::new("note"),
                        Alias::new("inspiration"),
                        Alias::new("post"),
                        Alias::new("resource"),
                        Alias::new("request"),
                        Alias::new("screening"),
                        Alias::new("spirit_post"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("content_status"))
                    .values(vec![
                        Alias::new("draft"),
                        Alias::new("pending"),
                        Alias::new("published"),
                        Alias::new("rejected"),
                        Alias::new("hidden"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("reaction_kind"))
                    .values(vec![Alias::new("like"), Alias::new("favorite")])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Contents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Contents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Contents::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Contents::Kind)
                            .custom(Alias::new("content_kind"))
                            .not_null(),
                    )
                    .col(ColumnDef::new(Contents::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Contents::Body).text().not_null())
                    .col(ColumnDef::new(Contents::CoverUrl).string_len(512).null())
                    .col(ColumnDef::new(Contents::Tags).json_binary().null())
                    .col(
                        ColumnDef::new(Contents::Status)
                            .custom(Alias::new("content_status"))
                            .not_null()
                            .default("published"),
                    )
                    .col(
                        ColumnDef::new(Contents::LikeCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Contents::FavoriteCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Contents::ViewCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Contents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Contents::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contents_user_id")
                            .from(Contents::Table, Contents::UserId)
                            .to(Alias::new("users"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_contents_kind_status_created_at")
                    .table(Contents::Table)
                    .col(Contents::Kind)
                    .col(Contents::Status)
                    .col(Contents::CreatedAt)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_contents_user_id")
                    .table(Contents::Table)
                    .col(Contents::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ContentReactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContentReactions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ContentReactions::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(ContentReactions::ContentId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContentReactions::Reaction)
                            .custom(Alias::new("reaction_kind"))
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContentReactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_content_reactions_content_id")
                            .from(ContentReactions::Table, ContentReactions::ContentId)
                            .to(Contents::Table, Contents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 每个用户对同一内容每种互动最多一条
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_content_reactions_unique")
                    .table(ContentReactions::Table)
                    .col(ContentReactions::UserId)
                    .col(ContentReactions::ContentId)
                    .col(ContentReactions::Reaction)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContentReactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Contents::Table).to_owned())
            .await?;
        for name in ["reaction_kind", "content_status", "content_kind"] {
            manager
                .drop_type(Type::drop().name(Alias::new(name)).to_owned())
                .await?;
        }
        Ok(())
    }
}
