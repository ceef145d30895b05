use sea_orm_migration::prelude::*;

/// 已验签的支付宝异步通知，notify_id 唯一用于防重放
#[derive(DeriveIden)]
enum PaymentNotifications {
    Table,
    Id,
    NotifyId,
    OutTradeNo,
    TradeStatus,
    RawPayload,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentNotifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentNotifications::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PaymentNotifications::NotifyId)
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(PaymentNotifications::OutTradeNo)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentNotifications::TradeStatus)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentNotifications::RawPayload).json_binary().null())
                    .col(
                        ColumnDef::new(PaymentNotifications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_payment_notifications_out_trade_no")
                    .table(PaymentNotifications::Table)
                    .col(PaymentNotifications::OutTradeNo)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentNotifications::Table).to_owned())
            .await
    }
}
