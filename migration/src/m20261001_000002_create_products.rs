use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    Title,
    Description,
    Price,
    MembershipDays,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 初始商品（价格单位：分）:
/// - 1 月度会员 ¥30.00，30 天
/// - 2 年度会员 ¥298.00，365 天
/// - 3 终身会员 ¥698.00，membership_days 为空表示终身
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Products::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Products::Title).string_len(128).not_null())
                    .col(ColumnDef::new(Products::Description).text().null())
                    .col(ColumnDef::new(Products::Price).big_integer().not_null())
                    .col(ColumnDef::new(Products::MembershipDays).integer().null())
                    .col(
                        ColumnDef::new(Products::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        let seed = Query::insert()
            .into_table(Products::Table)
            .columns([
                Products::Title,
                Products::Description,
                Products::Price,
                Products::MembershipDays,
            ])
            .values_panic([
                "月度会员".into(),
                "解锁全部会员内容 30 天".into(),
                3000i64.into(),
                Some(30i32).into(),
            ])
            .values_panic([
                "年度会员".into(),
                "解锁全部会员内容 365 天".into(),
                29800i64.into(),
                Some(365i32).into(),
            ])
            .values_panic([
                "终身会员".into(),
                "永久解锁全部会员内容".into(),
                69800i64.into(),
                Option::<i32>::None.into(),
            ])
            .to_owned();
        manager.exec_stmt(seed).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await
    }
}
