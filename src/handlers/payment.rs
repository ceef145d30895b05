use crate::handlers::webhook::alipay_notify;
use crate::middlewares::require_user_id;
use crate::models::*;
use crate::services::PaymentService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/payments/products",
    tag = "payment",
    responses(
        (status = 200, description = "会员商品列表", body = [ProductResponse])
    )
)]
pub async fn list_products(payment_service: web::Data<PaymentService>) -> Result<HttpResponse> {
    match payment_service.list_products().await {
        Ok(products) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": products
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/payments/create-order",
    tag = "payment",
    request_body = CreateOrderRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建订单成功", body = CreateOrderResponse),
        (status = 400, description = "创建订单失败"),
        (status = 401, description = "未授权"),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn create_order(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    request: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match payment_service
        .create_order(user_id, request.into_inner())
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/payments/order-status/{orderId}",
    tag = "payment",
    params(
        ("orderId" = i64, Path, description = "订单ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "订单状态", body = OrderResponse),
        (status = 401, description = "未授权或非本人订单"),
        (status = 404, description = "订单不存在")
    )
)]
pub async fn get_order_status(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match payment_service
        .get_order_status(path.into_inner(), user_id)
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/payments/orders",
    tag = "payment",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("perPage" = Option<u32>, Query, description = "每页数量"),
        ("status" = Option<crate::entities::OrderStatus>, Query, description = "订单状态")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "订单列表"),
        (status = 401, description = "未授权")
    )
)]
pub async fn list_orders(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    query: web::Query<OrderQuery>,
) -> Result<HttpResponse> {
    let user_id = require_user_id(&req)?;

    match payment_service.list_orders(user_id, &query).await {
        Ok(orders) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": orders
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn payment_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payments")
            .route("/products", web::get().to(list_products))
            .route("/create-order", web::post().to(create_order))
            .route("/order-status/{order_id}", web::get().to(get_order_status))
            .route("/orders", web::get().to(list_orders))
            .route("/alipay/notify", web::post().to(alipay_notify)),
    );
}
