//! Background scheduled tasks for the application.
//!
//! Membership expiry checks and reconciliation of pending Alipay orders.
//! Call `spawn_all` once during startup to launch them.

use crate::services::PaymentService;
use std::time::Duration;

const MEMBERSHIP_EXPIRY_INTERVAL: Duration = Duration::from_secs(3600);
const RECONCILE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Spawn all background tasks.
///
/// Both jobs are idempotent and detached via `tokio::spawn`; this does not block.
pub fn spawn_all(payment_service: PaymentService) {
    // 会员过期检查（每小时）
    {
        let svc = payment_service.clone();
        tokio::spawn(async move {
            loop {
                match svc.check_expired_memberships().await {
                    Ok(n) if n > 0 => log::info!("Expired memberships processed: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to expire memberships: {e:?}"),
                }
                tokio::time::sleep(MEMBERSHIP_EXPIRY_INTERVAL).await;
            }
        });
    }

    // 待支付订单对账（每 5 分钟），补偿丢失的异步通知
    {
        let svc = payment_service;
        tokio::spawn(async move {
            loop {
                match svc.reconcile_pending_orders().await {
                    Ok(n) if n > 0 => log::info!("Pending orders reconciled: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to reconcile pending orders: {e:?}"),
                }
                tokio::time::sleep(RECONCILE_INTERVAL).await;
            }
        });
    }
}
