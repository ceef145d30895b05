//! 会员购买：下单、支付宝异步通知、订单查询、会员到期与对账。
//!
//! 订单状态只允许 PENDING -> SUCCESS / FAILED。SUCCESS 为终态；
//! FAILED 仅在支付宝确认已付款时（超时后才付款）改为 SUCCESS。

use crate::entities::{
    OrderStatus, UserRole, order_entity as orders, payment_notification_entity as notifications,
    product_entity as products, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::external::{
    PAY_TIMEOUT_MINUTES, PagePayRequest, PaymentGateway, TradeQueryResult, TradeStatus,
};
use crate::models::*;
use crate::utils::{PaginatedResponse, PaginationParams, generate_out_trade_no, yuan_to_cents};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveEnum, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 同一用户对同一商品的待支付订单在该时间内复用，避免重复下单
const ORDER_REUSE_MINUTES: i64 = 15;
/// 对账只处理创建超过该时间的订单，给异步通知留出到达时间
const RECONCILE_MIN_AGE_MINUTES: i64 = 2;
/// 支付宝异步通知最长重试约 25 小时，超出后不再查询，未支付订单直接关闭
const RECONCILE_MAX_AGE_HOURS: i64 = 24;
const RECONCILE_BATCH: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    Settle { trade_no: Option<String> },
    Close,
    Keep,
}

#[derive(Clone)]
pub struct PaymentService {
    pool: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(pool: Arc<DatabaseConnection>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { pool, gateway }
    }

    pub async fn list_products(&self) -> AppResult<Vec<ProductResponse>> {
        let items = products::Entity::find()
            .filter(products::Column::IsActive.eq(true))
            .order_by_asc(products::Column::Price)
            .all(&*self.pool)
            .await?;
        Ok(items.into_iter().map(ProductResponse::from).collect())
    }

    /// 创建订单并生成支付宝电脑网站支付链接
    pub async fn create_order(
        &self,
        user_id: i64,
        request: CreateOrderRequest,
    ) -> AppResult<CreateOrderResponse> {
        let product = products::Entity::find_by_id(request.product_id)
            .one(&*self.pool)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        let reuse_since = Utc::now() - Duration::minutes(ORDER_REUSE_MINUTES);
        let existing = orders::Entity::find()
            .filter(orders::Column::UserId.eq(user_id))
            .filter(orders::Column::ProductId.eq(product.id))
            .filter(orders::Column::Status.eq(OrderStatus::Pending))
            .filter(orders::Column::CreatedAt.gte(reuse_since))
            .order_by_desc(orders::Column::CreatedAt)
            .one(&*self.pool)
            .await?;

        let order = match existing {
            Some(order) => {
                log::info!(
                    "Reusing pending order {} for user {user_id}, product {}",
                    order.out_trade_no,
                    product.id
                );
                order
            }
            None => {
                let now = Utc::now();
                orders::ActiveModel {
                    out_trade_no: Set(generate_out_trade_no()),
                    user_id: Set(user_id),
                    product_id: Set(product.id),
                    amount: Set(product.price),
                    status: Set(OrderStatus::Pending),
                    trade_no: Set(None),
                    paid_at: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(&*self.pool)
                .await?
            }
        };

        let pay_request = PagePayRequest {
            out_trade_no: order.out_trade_no.clone(),
            amount_cents: order.amount,
            subject: product.title.clone(),
            body: product.description.clone(),
        };

        match self.gateway.page_pay_url(&pay_request) {
            Ok(payment_url) => {
                log::info!(
                    "Order {} created for user {user_id}, amount {}",
                    order.out_trade_no,
                    order.amount
                );
                Ok(CreateOrderResponse {
                    order_id: order.id,
                    payment_url,
                })
            }
            Err(e) => {
                log::error!("Alipay page pay failed for order {}: {e}", order.out_trade_no);
                let out_trade_no = order.out_trade_no.clone();
                if let Err(mark_err) = close_order(&*self.pool, order).await {
                    log::error!("Failed to mark order {out_trade_no} as failed: {mark_err}");
                }
                Err(AppError::ValidationError("创建订单失败".to_string()))
            }
        }
    }

    /// 处理支付宝异步通知。返回值直接作为响应体，处理异常不会以 5xx 暴露给支付宝。
    pub async fn handle_alipay_notification(
        &self,
        notify_data: &BTreeMap<String, String>,
    ) -> NotificationAck {
        if !self.gateway.verify_notify(notify_data) {
            log::warn!(
                "Alipay notification signature verification failed: out_trade_no={:?}",
                notify_data.get("out_trade_no")
            );
            return NotificationAck::fail("签名验证失败");
        }

        match self.process_verified_notification(notify_data).await {
            Ok(ack) => ack,
            Err(e) => {
                log::error!("Failed to process Alipay notification: {e}");
                NotificationAck::fail("通知处理失败")
            }
        }
    }

    async fn process_verified_notification(
        &self,
        notify_data: &BTreeMap<String, String>,
    ) -> AppResult<NotificationAck> {
        let out_trade_no = notify_data
            .get("out_trade_no")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::ValidationError("Missing out_trade_no".to_string()))?;
        let trade_status =
            TradeStatus::parse(notify_data.get("trade_status").map(String::as_str).unwrap_or(""));
        let notify_id = notify_data
            .get("notify_id")
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("{out_trade_no}:{trade_status}"));

        log::info!("Alipay notification {notify_id}: {out_trade_no} {trade_status}");

        if notify_data.get("app_id").map(String::as_str) != Some(self.gateway.app_id()) {
            log::warn!(
                "Alipay notification {notify_id} for {out_trade_no} has foreign app_id {:?}",
                notify_data.get("app_id")
            );
            return Ok(NotificationAck::fail("应用ID不匹配"));
        }

        let txn = self.pool.begin().await?;

        let seen = notifications::Entity::find()
            .filter(notifications::Column::NotifyId.eq(notify_id.as_str()))
            .one(&txn)
            .await?;
        if seen.is_some() {
            log::info!("Duplicate Alipay notification {notify_id}, skipped");
            return Ok(NotificationAck::ok());
        }

        let Some(order) = orders::Entity::find()
            .filter(orders::Column::OutTradeNo.eq(out_trade_no.as_str()))
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            log::warn!("Alipay notification for unknown order {out_trade_no}");
            return Ok(NotificationAck::fail("订单不存在"));
        };

        if let Some(total) = notify_data.get("total_amount")
            && yuan_to_cents(total) != Some(order.amount)
        {
            log::warn!(
                "Alipay notification amount mismatch for {out_trade_no}: notified {total}, expected {}",
                order.amount
            );
            return Ok(NotificationAck::fail("订单金额不匹配"));
        }

        notifications::ActiveModel {
            notify_id: Set(notify_id),
            out_trade_no: Set(out_trade_no.clone()),
            trade_status: Set(trade_status.to_string()),
            raw_payload: Set(Some(serde_json::to_value(notify_data)?)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        match trade_status {
            ref s if s.is_paid() => {
                let trade_no = notify_data.get("trade_no").cloned();
                settle_order(&txn, order, trade_no).await?;
            }
            TradeStatus::TradeClosed => {
                close_order(&txn, order).await?;
            }
            other => {
                log::info!("Alipay trade {out_trade_no} is {other}, nothing to apply");
            }
        }

        txn.commit().await?;
        Ok(NotificationAck::ok())
    }

    /// 查询订单状态，只允许订单所有者查看
    pub async fn get_order_status(&self, order_id: i64, user_id: i64) -> AppResult<OrderResponse> {
        let order = orders::Entity::find_by_id(order_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        if order.user_id != user_id {
            return Err(AppError::AuthError("无权查看该订单".to_string()));
        }

        Ok(OrderResponse::from(order))
    }

    pub async fn list_orders(
        &self,
        user_id: i64,
        query: &OrderQuery,
    ) -> AppResult<PaginatedResponse<OrderResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut select = orders::Entity::find().filter(orders::Column::UserId.eq(user_id));
        if let Some(status) = query.status {
            select = select.filter(orders::Column::Status.eq(status));
        }

        let total = select.clone().count(&*self.pool).await?;
        let items = select
            .order_by_desc(orders::Column::CreatedAt)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(OrderResponse::from)
            .collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    /// 将已过期的 PREMIUM 会员降级为 NORMAL，返回处理人数。
    /// LIFETIME 与 ADMIN 不受影响。
    pub async fn check_expired_memberships(&self) -> AppResult<u64> {
        let now = Utc::now();
        let result = users::Entity::update_many()
            .col_expr(users::Column::Role, UserRole::Normal.as_enum())
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Role.eq(UserRole::Premium))
            .filter(users::Column::PremiumExpiryDate.lt(now))
            .exec(&*self.pool)
            .await?;

        let expired_count = result.rows_affected;
        if expired_count > 0 {
            log::info!("Downgraded {expired_count} expired premium memberships");
        }
        Ok(expired_count)
    }

    /// 主动查询长时间未收到通知的待支付订单
    pub async fn reconcile_pending_orders(&self) -> AppResult<u64> {
        let now = Utc::now();
        let mut changed = self.close_stale_pending_orders(now).await?;

        let pending = orders::Entity::find()
            .filter(orders::Column::Status.eq(OrderStatus::Pending))
            .filter(orders::Column::CreatedAt.lte(now - Duration::minutes(RECONCILE_MIN_AGE_MINUTES)))
            .filter(orders::Column::CreatedAt.gte(now - Duration::hours(RECONCILE_MAX_AGE_HOURS)))
            .order_by_asc(orders::Column::CreatedAt)
            .limit(RECONCILE_BATCH)
            .all(&*self.pool)
            .await?;

        for order in pending {
            let result = match self.gateway.query_trade(&order.out_trade_no).await {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("Alipay trade query failed for {}: {e}", order.out_trade_no);
                    continue;
                }
            };
            let action = reconcile_action(&order, &result, now);
            if action == ReconcileAction::Keep {
                continue;
            }
            if self.apply_reconcile_action(order.id, action).await? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// 超出对账窗口仍为 PENDING 的订单在本地关闭
    async fn close_stale_pending_orders(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = orders::Entity::update_many()
            .col_expr(orders::Column::Status, OrderStatus::Failed.as_enum())
            .col_expr(orders::Column::UpdatedAt, Expr::value(now))
            .filter(orders::Column::Status.eq(OrderStatus::Pending))
            .filter(orders::Column::CreatedAt.lt(now - Duration::hours(RECONCILE_MAX_AGE_HOURS)))
            .exec(&*self.pool)
            .await?;

        if result.rows_affected > 0 {
            log::info!(
                "Closed {} pending orders older than {RECONCILE_MAX_AGE_HOURS}h",
                result.rows_affected
            );
        }
        Ok(result.rows_affected)
    }

    async fn apply_reconcile_action(&self, order_id: i64, action: ReconcileAction) -> AppResult<bool> {
        let txn = self.pool.begin().await?;
        let Some(order) = orders::Entity::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            return Ok(false);
        };

        let changed = match action {
            ReconcileAction::Settle { trade_no } => {
                log::info!("Reconcile: order {} paid at Alipay", order.out_trade_no);
                settle_order(&txn, order, trade_no).await?
            }
            ReconcileAction::Close => {
                log::info!("Reconcile: order {} closed", order.out_trade_no);
                close_order(&txn, order).await?
            }
            ReconcileAction::Keep => false,
        };

        txn.commit().await?;
        Ok(changed)
    }
}

/// 根据支付宝查询结果决定对账动作
pub fn reconcile_action(
    order: &orders::Model,
    result: &TradeQueryResult,
    now: DateTime<Utc>,
) -> ReconcileAction {
    match result {
        TradeQueryResult::Found {
            trade_no,
            trade_status,
            total_amount,
        } if trade_status.is_paid() => {
            if let Some(total) = total_amount
                && yuan_to_cents(total) != Some(order.amount)
            {
                log::warn!(
                    "Reconcile: amount mismatch for {}: alipay {total}, expected {}",
                    order.out_trade_no,
                    order.amount
                );
                return ReconcileAction::Keep;
            }
            ReconcileAction::Settle {
                trade_no: trade_no.clone(),
            }
        }
        TradeQueryResult::Found {
            trade_status: TradeStatus::TradeClosed,
            ..
        } => ReconcileAction::Close,
        TradeQueryResult::NotExist
            if order.created_at + Duration::minutes(PAY_TIMEOUT_MINUTES) < now =>
        {
            ReconcileAction::Close
        }
        _ => ReconcileAction::Keep,
    }
}

/// 购买后的会员角色与到期时间。
/// membership_days 为空表示终身；ADMIN 保持不变；续费在未过期的到期时间上累加。
pub fn membership_after_purchase(
    role: UserRole,
    expiry: Option<DateTime<Utc>>,
    membership_days: Option<i32>,
    now: DateTime<Utc>,
) -> (UserRole, Option<DateTime<Utc>>) {
    match (role, membership_days) {
        (UserRole::Admin, _) => (UserRole::Admin, expiry),
        (UserRole::Lifetime, _) | (_, None) => (UserRole::Lifetime, None),
        (role, Some(days)) => {
            let base = match (role, expiry) {
                (UserRole::Premium, Some(e)) if e > now => e,
                _ => now,
            };
            (
                UserRole::Premium,
                Some(base + Duration::days(i64::from(days))),
            )
        }
    }
}

/// PENDING/FAILED -> SUCCESS 并发放会员；已成功的订单不重复处理
async fn settle_order<C: ConnectionTrait>(
    db: &C,
    order: orders::Model,
    trade_no: Option<String>,
) -> AppResult<bool> {
    if order.status == OrderStatus::Success {
        log::info!("Order {} already settled", order.out_trade_no);
        return Ok(false);
    }
    if order.status == OrderStatus::Failed {
        log::warn!(
            "Order {} was marked failed but Alipay reports it paid, settling",
            order.out_trade_no
        );
    }

    let product = products::Entity::find_by_id(order.product_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let now = Utc::now();
    let user_id = order.user_id;
    let mut am = order.into_active_model();
    am.status = Set(OrderStatus::Success);
    if trade_no.is_some() {
        am.trade_no = Set(trade_no);
    }
    am.paid_at = Set(Some(now));
    am.updated_at = Set(now);
    am.update(db).await?;

    grant_membership(db, user_id, &product, now).await?;
    Ok(true)
}

/// 仅 PENDING 订单可以关闭
async fn close_order<C: ConnectionTrait>(db: &C, order: orders::Model) -> AppResult<bool> {
    if order.status != OrderStatus::Pending {
        return Ok(false);
    }
    let mut am = order.into_active_model();
    am.status = Set(OrderStatus::Failed);
    am.updated_at = Set(Utc::now());
    am.update(db).await?;
    Ok(true)
}

async fn grant_membership<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    product: &products::Model,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let user = users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let (role, expiry) =
        membership_after_purchase(user.role, user.premium_expiry_date, product.membership_days, now);
    log::info!(
        "Granting membership to user {user_id}: {} -> {role}, expiry {expiry:?}",
        user.role
    );

    let mut am = user.into_active_model();
    am.role = Set(role);
    am.premium_expiry_date = Set(expiry);
    am.updated_at = Set(now);
    am.update(db).await?;
    Ok(())
}
