use crate::models::NotificationAck;
use crate::services::PaymentService;
use actix_web::{HttpResponse, Result, web};
use log::{info, warn};
use std::collections::BTreeMap;

/// 支付宝异步通知
///
/// 通知以 application/x-www-form-urlencoded 提交。无论处理结果如何都返回 200，
/// 由响应体中的 success 字段表示是否受理。
#[utoipa::path(
    post,
    path = "/api/payments/alipay/notify",
    tag = "payment",
    request_body(content = String, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "通知处理结果", body = NotificationAck)
    )
)]
pub async fn alipay_notify(
    body: web::Bytes,
    payment_service: web::Data<PaymentService>,
) -> Result<HttpResponse> {
    let notify_data: BTreeMap<String, String> = url::form_urlencoded::parse(&body)
        .into_owned()
        .collect();

    if notify_data.is_empty() {
        warn!("Received empty Alipay notification");
        return Ok(HttpResponse::Ok().json(NotificationAck::fail("签名验证失败")));
    }

    info!(
        "Received Alipay notification: out_trade_no={:?} trade_status={:?}",
        notify_data.get("out_trade_no"),
        notify_data.get("trade_status")
    );

    let ack = payment_service
        .handle_alipay_notification(&notify_data)
        .await;
    Ok(HttpResponse::Ok().json(ack))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppResult;
    use crate::external::{PagePayRequest, PaymentGateway, TradeQueryResult};
    use actix_web::{App, test};
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    struct RejectingGateway;

    #[async_trait]
    impl PaymentGateway for RejectingGateway {
        fn app_id(&self) -> &str {
            "2021000000000001"
        }

        fn page_pay_url(&self, _req: &PagePayRequest) -> AppResult<String> {
            Ok(String::new())
        }

        fn verify_notify(&self, _params: &BTreeMap<String, String>) -> bool {
            false
        }

        async fn query_trade(&self, _out_trade_no: &str) -> AppResult<TradeQueryResult> {
            Ok(TradeQueryResult::NotExist)
        }
    }

    #[actix_web::test]
    async fn test_invalid_signature_is_rejected_in_body() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = PaymentService::new(Arc::new(db), Arc::new(RejectingGateway));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .route("/api/payments/alipay/notify", web::post().to(alipay_notify)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/payments/alipay/notify")
            .insert_header(("content-type", "application/x-www-form-urlencoded"))
            .set_payload("out_trade_no=AF1&trade_status=TRADE_SUCCESS&sign=bad")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "签名验证失败");
    }
}
